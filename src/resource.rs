//! Declarative resource metadata.
//!
//! A [`ResourceDefinition`] describes everything the generic
//! [`CrudDriver`](crate::driver::CrudDriver) needs to manage one resource
//! type: its schema, the lifecycle targets of each operation, per-operation
//! timeouts, and whether the service reports progress through work requests.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::lifecycle::LifecycleTargets;
use crate::poller::PollInterval;
use crate::schema::Schema;
use crate::types::{ID_ATTRIBUTE, STATE_ATTRIBUTE};

/// Default deadline for each operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// A resource operation that converges on a lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create
    Create,
    /// Update
    Update,
    /// Delete
    Delete,
}

impl Operation {
    /// Lower-case name, as used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Create deadline.
    pub create: Duration,
    /// Update deadline.
    pub update: Duration,
    /// Delete deadline.
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(DEFAULT_TIMEOUT)
    }
}

impl Timeouts {
    /// The same deadline for every operation.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            update: timeout,
            delete: timeout,
        }
    }

    /// The deadline for `operation`.
    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Metadata for one managed resource type.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    /// Type name, e.g. `oci_file_storage_snapshot`.
    pub type_name: String,
    /// Service name used for retry logging, e.g. `file_storage`.
    pub service: String,
    /// Attribute schema, including `id` and `state`.
    pub schema: Schema,
    /// States observed while creating.
    pub create_targets: LifecycleTargets,
    /// States observed while updating.
    pub update_targets: LifecycleTargets,
    /// States observed while deleting.
    pub delete_targets: LifecycleTargets,
    /// Operation deadlines.
    pub timeouts: Timeouts,
    /// Interval between lifecycle polls.
    pub poll_interval: PollInterval,
    /// Work request entity type, when the service uses work requests.
    pub work_request_entity: Option<String>,
}

impl ResourceDefinition {
    /// A definition with the common OCI lifecycle targets and default timeouts.
    ///
    /// `id` and `state` are added to the schema.
    pub fn new(type_name: impl Into<String>, service: impl Into<String>, schema: Schema) -> Self {
        Self {
            type_name: type_name.into(),
            service: service.into(),
            schema: schema.with_lifecycle(),
            create_targets: LifecycleTargets::provisioning(),
            update_targets: LifecycleTargets::updating(),
            delete_targets: LifecycleTargets::terminating(),
            timeouts: Timeouts::default(),
            poll_interval: PollInterval::default(),
            work_request_entity: None,
        }
    }

    /// Override the create targets.
    pub fn with_create_targets(mut self, targets: LifecycleTargets) -> Self {
        self.create_targets = targets;
        self
    }

    /// Override the update targets.
    pub fn with_update_targets(mut self, targets: LifecycleTargets) -> Self {
        self.update_targets = targets;
        self
    }

    /// Override the delete targets.
    pub fn with_delete_targets(mut self, targets: LifecycleTargets) -> Self {
        self.delete_targets = targets;
        self
    }

    /// Override the deadlines.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, interval: PollInterval) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wait for work requests of `entity_type` before polling the resource.
    pub fn with_work_requests(mut self, entity_type: impl Into<String>) -> Self {
        self.work_request_entity = Some(entity_type.into());
        self
    }

    /// Whether operations report progress through work requests.
    pub fn uses_work_requests(&self) -> bool {
        self.work_request_entity.is_some()
    }

    /// The lifecycle targets of `operation`.
    pub fn targets(&self, operation: Operation) -> &LifecycleTargets {
        match operation {
            Operation::Create => &self.create_targets,
            Operation::Update => &self.update_targets,
            Operation::Delete => &self.delete_targets,
        }
    }

    /// Whether `state` means the resource no longer exists.
    pub fn is_gone(&self, state: &crate::lifecycle::LifecycleState) -> bool {
        self.delete_targets.target.contains(state)
    }

    /// The attributes sent with a Create call.
    ///
    /// Nulls, `id`, `state` and computed-only attributes are dropped.
    pub fn request_attributes(&self, attributes: &Map<String, Value>) -> Map<String, Value> {
        attributes
            .iter()
            .filter(|(k, v)| {
                !v.is_null()
                    && k.as_str() != ID_ATTRIBUTE
                    && k.as_str() != STATE_ATTRIBUTE
                    && !self
                        .schema
                        .attribute(k)
                        .map(|a| a.flags.is_computed_only())
                        .unwrap_or(false)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use crate::schema::Attribute;
    use serde_json::json;

    fn definition() -> ResourceDefinition {
        ResourceDefinition::new(
            "oci_file_storage_snapshot",
            "file_storage",
            Schema::v0()
                .with_attribute("file_system_id", Attribute::required_string().with_force_new())
                .with_attribute("name", Attribute::required_string())
                .with_attribute("time_created", Attribute::computed_string()),
        )
    }

    #[test]
    fn test_defaults() {
        let def = definition();
        assert_eq!(def.timeouts, Timeouts::uniform(DEFAULT_TIMEOUT));
        assert_eq!(def.timeouts.get(Operation::Delete), Duration::from_secs(1200));
        assert!(!def.uses_work_requests());
        assert!(def.schema.attribute("id").is_some());
        assert!(def.schema.attribute("state").is_some());
        assert!(def.is_gone(&LifecycleState::from("DELETED")));
        assert!(!def.is_gone(&LifecycleState::from("AVAILABLE")));
    }

    #[test]
    fn test_builders() {
        let def = definition()
            .with_work_requests("snapshot")
            .with_timeouts(Timeouts {
                create: Duration::from_secs(60),
                ..Timeouts::default()
            });
        assert!(def.uses_work_requests());
        assert_eq!(def.timeouts.get(Operation::Create), Duration::from_secs(60));
        assert_eq!(def.timeouts.get(Operation::Update), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_request_attributes() {
        let attrs = json!({
            "id": "ocid1.snap",
            "state": "AVAILABLE",
            "file_system_id": "ocid1.fs",
            "name": "nightly",
            "time_created": "2024-01-01T00:00:00Z",
            "freeform_tags": null
        });
        let request = definition().request_attributes(attrs.as_object().unwrap());
        assert_eq!(
            Value::Object(request),
            json!({"file_system_id": "ocid1.fs", "name": "nightly"})
        );
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Update.to_string(), "update");
    }
}
