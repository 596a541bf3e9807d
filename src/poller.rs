//! Lifecycle poller.
//!
//! A [`LifecyclePoller`] is a small state machine that repeatedly fetches a
//! resource until its lifecycle state lands in a target set. It is driven
//! lazily: each call to [`LifecyclePoller::next`] performs at most one fetch,
//! sleeping first if an earlier observation was still transitional.
//!
//! ```
//! use std::time::Duration;
//! use hemmer_provider_oci::testing::FakeCloud;
//! use hemmer_provider_oci::{
//!     LifecyclePoller, LifecycleTargets, Observation, PollInterval, ProviderError, RemoteResource,
//!     ResourceClient, ResourceId,
//! };
//!
//! # tokio_test::block_on(async {
//! let cloud = FakeCloud::new();
//! let id = ResourceId::new("ocid1.snapshot.oc1..nightly")?;
//! cloud.insert(RemoteResource::new(id.clone(), "CREATING"));
//! cloud.script(id.as_str(), ["CREATING", "ACTIVE"]);
//!
//! let targets = LifecycleTargets::new(["CREATING"], ["ACTIVE"]);
//! let mut poller = LifecyclePoller::new(id.as_str(), || cloud.get(&id), targets, Duration::from_secs(60))
//!     .with_interval(PollInterval::Fixed(Duration::from_millis(1)));
//!
//! let mut pending = 0;
//! while let Some(observation) = poller.next().await {
//!     match observation? {
//!         Observation::Pending(_) => pending += 1,
//!         done => assert_eq!(done.state().unwrap().as_str(), "ACTIVE"),
//!     }
//! }
//! assert_eq!(pending, 1);
//! # Ok::<(), ProviderError>(())
//! # }).unwrap();
//! ```
//!
//! Dropping a poller part-way through has no side effects.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::ProviderError;
use crate::lifecycle::{LifecycleState, LifecycleTargets, StateMatch};
use crate::types::RemoteResource;

/// Default interval between two fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How a poller treats a resource that disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollMode {
    /// Waiting for a create or update; a missing resource is an error.
    #[default]
    Converge,
    /// Waiting for a delete; a missing resource means the delete finished.
    Delete,
}

/// Sleep strategy between fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollInterval {
    /// The same delay every time.
    Fixed(Duration),
    /// A delay that grows by `multiplier` up to `max`.
    Backoff {
        /// First delay.
        initial: Duration,
        /// Upper bound.
        max: Duration,
        /// Growth factor.
        multiplier: f64,
    },
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::Fixed(DEFAULT_POLL_INTERVAL)
    }
}

impl PollInterval {
    fn first(&self) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Backoff { initial, .. } => *initial,
        }
    }

    fn after(&self, current: Duration) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Backoff {
                max, multiplier, ..
            } => Duration::from_secs_f64((current.as_secs_f64() * multiplier).min(max.as_secs_f64())),
        }
    }
}

/// One element of the observation sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The resource is still in a transitional state.
    Pending(RemoteResource),
    /// The resource reached a target state. Ends the sequence.
    Reached(RemoteResource),
    /// The resource no longer exists. Ends a delete poll.
    Gone,
}

impl Observation {
    /// The observed remote snapshot, if any.
    pub fn resource(&self) -> Option<&RemoteResource> {
        match self {
            Self::Pending(r) | Self::Reached(r) => Some(r),
            Self::Gone => None,
        }
    }

    /// Consume the observation, returning the remote snapshot if any.
    pub fn into_resource(self) -> Option<RemoteResource> {
        match self {
            Self::Pending(r) | Self::Reached(r) => Some(r),
            Self::Gone => None,
        }
    }

    /// The observed lifecycle state, if any.
    pub fn state(&self) -> Option<&LifecycleState> {
        self.resource().map(|r| &r.state)
    }

    /// Whether this observation ends the sequence successfully.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Waiting,
    Finished,
}

/// Deadline-bounded, lazily driven lifecycle poll.
pub struct LifecyclePoller<F> {
    resource: String,
    fetch: F,
    targets: LifecycleTargets,
    mode: PollMode,
    interval: PollInterval,
    timeout: Duration,
    phase: Phase,
    started: Option<Instant>,
    next_delay: Duration,
    last_state: Option<LifecycleState>,
    fetches: u32,
}

impl<F, Fut> LifecyclePoller<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RemoteResource, ProviderError>>,
{
    /// Create a poller. Nothing is fetched until [`next`](Self::next) is called.
    pub fn new(
        resource: impl Into<String>,
        fetch: F,
        targets: LifecycleTargets,
        timeout: Duration,
    ) -> Self {
        let interval = PollInterval::default();
        Self {
            resource: resource.into(),
            fetch,
            targets,
            mode: PollMode::Converge,
            interval,
            timeout,
            phase: Phase::NotStarted,
            started: None,
            next_delay: interval.first(),
            last_state: None,
            fetches: 0,
        }
    }

    /// Set how a missing resource is treated.
    pub fn with_mode(mut self, mode: PollMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the sleep strategy between fetches.
    pub fn with_interval(mut self, interval: PollInterval) -> Self {
        self.interval = interval;
        self.next_delay = interval.first();
        self
    }

    /// Number of fetches performed so far.
    pub fn fetches(&self) -> u32 {
        self.fetches
    }

    /// The most recently observed state.
    pub fn last_state(&self) -> Option<&LifecycleState> {
        self.last_state.as_ref()
    }

    fn timeout_error(&self, now: Instant) -> ProviderError {
        let elapsed = self
            .started
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default();
        ProviderError::Timeout {
            resource: self.resource.clone(),
            last_state: self
                .last_state
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            elapsed,
        }
    }

    fn finish<T>(&mut self, item: T) -> Option<T> {
        self.phase = Phase::Finished;
        Some(item)
    }

    /// Produce the next observation.
    ///
    /// Returns `None` once the sequence has ended with a terminal observation
    /// or an error.
    pub async fn next(&mut self) -> Option<Result<Observation, ProviderError>> {
        match self.phase {
            Phase::Finished => return None,
            Phase::NotStarted => {
                self.started = Some(Instant::now());
            },
            Phase::Waiting => {
                let now = Instant::now();
                let deadline = self.started.unwrap_or(now) + self.timeout;
                if now >= deadline {
                    let err = self.timeout_error(now);
                    debug!(resource = %self.resource, error = %err, "Lifecycle poll timed out");
                    return self.finish(Err(err));
                }
                let delay = self.next_delay.min(deadline - now);
                trace!(resource = %self.resource, delay_ms = delay.as_millis() as u64, "Sleeping before next poll");
                tokio::time::sleep(delay).await;
                self.next_delay = self.interval.after(self.next_delay);
            },
        }

        self.phase = Phase::Waiting;
        self.fetches += 1;
        let deadline = self.started.unwrap_or_else(Instant::now) + self.timeout;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let result = match tokio::time::timeout(remaining, (self.fetch)()).await {
            Ok(result) => result,
            Err(_) => {
                let err = self.timeout_error(Instant::now());
                debug!(resource = %self.resource, error = %err, "Fetch outlived the poll deadline");
                return self.finish(Err(err));
            },
        };

        let remote = match result {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() && self.mode == PollMode::Delete => {
                debug!(resource = %self.resource, "Resource is gone");
                return self.finish(Ok(Observation::Gone));
            },
            Err(e) => return self.finish(Err(e)),
        };

        debug!(
            resource = %self.resource,
            state = %remote.state,
            fetch = self.fetches,
            "Observed lifecycle state"
        );
        self.last_state = Some(remote.state.clone());

        match self.targets.classify(&remote.state) {
            StateMatch::Reached => self.finish(Ok(Observation::Reached(remote))),
            StateMatch::Pending => Some(Ok(Observation::Pending(remote))),
            StateMatch::Unexpected => {
                let err = ProviderError::UnexpectedState {
                    resource: self.resource.clone(),
                    state: remote.state.to_string(),
                    expected: self.targets.expected(),
                };
                self.finish(Err(err))
            },
        }
    }

    /// Drive the sequence to its end and return the terminal observation.
    pub async fn wait(mut self) -> Result<Observation, ProviderError> {
        while let Some(observation) = self.next().await {
            let observation = observation?;
            if observation.is_terminal() {
                return Ok(observation);
            }
        }
        Err(self.timeout_error(Instant::now()))
    }
}
