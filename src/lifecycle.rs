//! Lifecycle states and convergence targets.
//!
//! OCI resources report a service-defined lifecycle state string. The client
//! never drives transitions itself; it only watches for the remote state to
//! land in one of the states a [`LifecycleTargets`] accepts.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A service-reported lifecycle state, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LifecycleState(String);

impl LifecycleState {
    /// `CREATING`
    pub const CREATING: &'static str = "CREATING";
    /// `PROVISIONING`
    pub const PROVISIONING: &'static str = "PROVISIONING";
    /// `AVAILABLE`
    pub const AVAILABLE: &'static str = "AVAILABLE";
    /// `ACTIVE`
    pub const ACTIVE: &'static str = "ACTIVE";
    /// `UPDATING`
    pub const UPDATING: &'static str = "UPDATING";
    /// `DELETING`
    pub const DELETING: &'static str = "DELETING";
    /// `DELETED`
    pub const DELETED: &'static str = "DELETED";
    /// `TERMINATING`
    pub const TERMINATING: &'static str = "TERMINATING";
    /// `TERMINATED`
    pub const TERMINATED: &'static str = "TERMINATED";
    /// `FAILED`
    pub const FAILED: &'static str = "FAILED";

    /// Create a state from any string; the value is upper-cased.
    pub fn new(state: impl AsRef<str>) -> Self {
        Self(state.as_ref().trim().to_ascii_uppercase())
    }

    /// The state as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LifecycleState {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LifecycleState {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// An unordered set of lifecycle states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSet(BTreeSet<LifecycleState>);

impl StateSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from state names.
    pub fn of<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(states.into_iter().map(LifecycleState::new).collect())
    }

    /// Whether the set contains the state.
    pub fn contains(&self, state: &LifecycleState) -> bool {
        self.0.contains(state)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the states in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &LifecycleState> {
        self.0.iter()
    }

    /// Comma-separated rendering used in error messages.
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(LifecycleState::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What a poller waits for after one CRUD call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleTargets {
    /// Transitional states that keep the poll going.
    ///
    /// When empty, any state outside `target` and `failed` is treated as
    /// transitional.
    #[serde(default)]
    pub pending: StateSet,
    /// Terminal states that end the poll successfully.
    pub target: StateSet,
    /// Terminal states that end the poll with an error.
    #[serde(default)]
    pub failed: StateSet,
}

/// Outcome of matching one observed state against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMatch {
    /// The state is one of the targets.
    Reached,
    /// The state is transitional.
    Pending,
    /// The state is a failure state or outside the expected transition.
    Unexpected,
}

impl LifecycleTargets {
    /// Targets with explicit pending and target states.
    pub fn new<P, T, S1, S2>(pending: P, target: T) -> Self
    where
        P: IntoIterator<Item = S1>,
        T: IntoIterator<Item = S2>,
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        Self {
            pending: StateSet::of(pending),
            target: StateSet::of(target),
            failed: StateSet::new(),
        }
    }

    /// Set the failure states.
    pub fn with_failed<I, S>(mut self, failed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.failed = StateSet::of(failed);
        self
    }

    /// `PROVISIONING -> AVAILABLE`, the most common create transition.
    pub fn provisioning() -> Self {
        Self::new(
            [LifecycleState::CREATING, LifecycleState::PROVISIONING],
            [LifecycleState::AVAILABLE, LifecycleState::ACTIVE],
        )
        .with_failed([LifecycleState::FAILED])
    }

    /// `UPDATING -> AVAILABLE`.
    pub fn updating() -> Self {
        Self::new(
            [LifecycleState::UPDATING],
            [LifecycleState::AVAILABLE, LifecycleState::ACTIVE],
        )
        .with_failed([LifecycleState::FAILED])
    }

    /// `TERMINATING -> TERMINATED`, with `DELETING -> DELETED` accepted too.
    pub fn terminating() -> Self {
        Self::new(
            [LifecycleState::TERMINATING, LifecycleState::DELETING],
            [LifecycleState::TERMINATED, LifecycleState::DELETED],
        )
        .with_failed([LifecycleState::FAILED])
    }

    /// Classify an observed state.
    pub fn classify(&self, state: &LifecycleState) -> StateMatch {
        if self.target.contains(state) {
            StateMatch::Reached
        } else if self.failed.contains(state) {
            StateMatch::Unexpected
        } else if self.pending.is_empty() || self.pending.contains(state) {
            StateMatch::Pending
        } else {
            StateMatch::Unexpected
        }
    }

    /// States a caller may legitimately observe, for error messages.
    pub fn expected(&self) -> String {
        if self.pending.is_empty() {
            self.target.joined()
        } else {
            format!("{}, {}", self.pending.joined(), self.target.joined())
        }
    }
}
