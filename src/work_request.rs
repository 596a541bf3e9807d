//! Work request tracking.
//!
//! Asynchronous OCI operations return a work request handle. The driver waits
//! for the work request to succeed before it starts polling the resource
//! itself, reusing [`LifecyclePoller`] with the work request's status as the
//! lifecycle state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::ResourceClient;
use crate::error::ProviderError;
use crate::lifecycle::LifecycleTargets;
use crate::poller::{LifecyclePoller, PollInterval};
use crate::retry::RetryPolicy;
use crate::types::{RemoteResource, ResourceId};

/// Status of a work request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequestStatus {
    /// Queued.
    Accepted,
    /// Running.
    InProgress,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancellation in progress.
    Canceling,
    /// Cancelled.
    Canceled,
}

impl WorkRequestStatus {
    /// The wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
        }
    }
}

/// A resource touched by a work request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequestResource {
    /// Entity type, e.g. `autonomousVmCluster`.
    pub entity_type: String,
    /// What happened to it, e.g. `CREATED`.
    pub action_type: String,
    /// The resource identifier.
    pub identifier: String,
}

/// A work request as returned by `GetWorkRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    /// The work request identifier.
    pub id: String,
    /// Current status.
    pub status: WorkRequestStatus,
    /// Progress in percent.
    #[serde(default)]
    pub percent_complete: f32,
    /// Resources affected by the operation.
    #[serde(default)]
    pub resources: Vec<WorkRequestResource>,
}

impl WorkRequest {
    /// The identifier of the affected resource of the given entity type.
    pub fn affected(&self, entity_type: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.entity_type.eq_ignore_ascii_case(entity_type))
            .map(|r| r.identifier.as_str())
    }

    fn to_remote(&self) -> Result<RemoteResource, ProviderError> {
        let resources = serde_json::to_value(&self.resources)?;
        Ok(RemoteResource::new(ResourceId::new(&self.id)?, self.status.as_str())
            .with_attribute("percent_complete", json!(self.percent_complete))
            .with_attribute("resources", resources))
    }

    fn from_remote(remote: &RemoteResource) -> Option<Vec<WorkRequestResource>> {
        remote
            .attributes
            .get("resources")
            .cloned()
            .and_then(|v: Value| serde_json::from_value(v).ok())
    }
}

/// Work request status targets.
pub fn work_request_targets() -> LifecycleTargets {
    LifecycleTargets::new(["ACCEPTED", "IN_PROGRESS", "CANCELING"], ["SUCCEEDED"])
        .with_failed(["FAILED", "CANCELED"])
}

/// Wait for a work request to succeed.
///
/// Returns the identifier of the affected `entity_type` resource when the
/// work request lists one. `FAILED` and `CANCELED` map to
/// [`ProviderError::WorkRequestFailed`].
pub async fn wait_for_work_request(
    client: &dyn ResourceClient,
    work_request_id: &str,
    entity_type: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    interval: PollInterval,
) -> Result<Option<ResourceId>, ProviderError> {
    info!(work_request = %work_request_id, "Waiting for work request");

    let fetch = move || async move {
        let wr = policy
            .execute("GetWorkRequest", move || client.get_work_request(work_request_id))
            .await?;
        wr.to_remote()
    };

    let observation = LifecyclePoller::new(
        work_request_id,
        fetch,
        work_request_targets(),
        timeout,
    )
    .with_interval(interval)
    .wait()
    .await
    .map_err(|e| match e {
        ProviderError::UnexpectedState { resource, state, .. } => {
            ProviderError::WorkRequestFailed { id: resource, status: state }
        },
        other => other,
    })?;

    let affected = observation
        .resource()
        .and_then(WorkRequest::from_remote)
        .and_then(|resources| {
            resources
                .into_iter()
                .find(|r| r.entity_type.eq_ignore_ascii_case(entity_type))
        })
        .map(|r| ResourceId::new(r.identifier))
        .transpose()?;

    debug!(work_request = %work_request_id, affected = ?affected, "Work request succeeded");
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_value(WorkRequestStatus::InProgress).unwrap();
        assert_eq!(json, "IN_PROGRESS");
        assert_eq!(WorkRequestStatus::InProgress.as_str(), "IN_PROGRESS");
        let back: WorkRequestStatus = serde_json::from_value(json!("CANCELED")).unwrap();
        assert_eq!(back, WorkRequestStatus::Canceled);
    }

    #[test]
    fn test_affected_lookup() {
        let wr = WorkRequest {
            id: "wr-1".to_string(),
            status: WorkRequestStatus::Succeeded,
            percent_complete: 100.0,
            resources: vec![WorkRequestResource {
                entity_type: "autonomousVmCluster".to_string(),
                action_type: "CREATED".to_string(),
                identifier: "ocid1.avmc".to_string(),
            }],
        };
        assert_eq!(wr.affected("AutonomousVmCluster"), Some("ocid1.avmc"));
        assert_eq!(wr.affected("database"), None);
    }

    #[test]
    fn test_targets() {
        use crate::lifecycle::StateMatch;
        let t = work_request_targets();
        assert_eq!(t.classify(&"SUCCEEDED".into()), StateMatch::Reached);
        assert_eq!(t.classify(&"IN_PROGRESS".into()), StateMatch::Pending);
        assert_eq!(t.classify(&"FAILED".into()), StateMatch::Unexpected);
    }
}
