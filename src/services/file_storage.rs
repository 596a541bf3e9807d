//! File Storage: snapshots.
//!
//! Snapshots are created synchronously and settle from `CREATING` to
//! `ACTIVE`; only tags can change in place.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::client::ResourceClient;
use crate::data_source::DataSourceDefinition;
use crate::lifecycle::LifecycleTargets;
use crate::resource::ResourceDefinition;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::types::ID_ATTRIBUTE;

/// Service name.
pub const SERVICE: &str = "file_storage";

/// Resource type name.
pub const SNAPSHOT: &str = "oci_file_storage_snapshot";

/// Data source type name.
pub const SNAPSHOTS: &str = "oci_file_storage_snapshots";

fn snapshot_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "file_system_id",
            Attribute::required_string()
                .with_force_new()
                .with_description("The OCID of the file system to take a snapshot of."),
        )
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("Name of the snapshot, unique within the file system."),
        )
        .with_attribute(
            "defined_tags",
            Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::optional_computed()),
        )
        .with_attribute("freeform_tags", Attribute::tags())
        .with_attribute("is_clone_source", Attribute::computed_bool())
        .with_attribute("lifecycle_details", Attribute::computed_string())
        .with_attribute("provenance_id", Attribute::computed_string())
        .with_attribute("time_created", Attribute::computed_string())
}

/// `oci_file_storage_snapshot`
pub fn snapshot() -> ResourceDefinition {
    ResourceDefinition::new(SNAPSHOT, SERVICE, snapshot_schema())
        .with_create_targets(
            LifecycleTargets::new(["CREATING"], ["ACTIVE", "AVAILABLE"]).with_failed(["FAILED"]),
        )
        .with_update_targets(LifecycleTargets::new(["UPDATING"], ["ACTIVE", "AVAILABLE"]))
        .with_delete_targets(
            LifecycleTargets::new(["DELETING"], ["DELETED"]).with_failed(["FAILED"]),
        )
}

/// `oci_file_storage_snapshots`
pub fn snapshots() -> DataSourceDefinition {
    DataSourceDefinition::new(SNAPSHOTS, SERVICE, "snapshots", &snapshot().schema)
        .with_request_attribute("file_system_id", Attribute::required_string())
        .with_request_attribute(ID_ATTRIBUTE, Attribute::optional_computed_string())
        .with_request_attribute("state", Attribute::optional_string())
}

/// Register the File Storage types against one client.
pub fn register(catalog: &mut Catalog, client: Arc<dyn ResourceClient>) {
    catalog.register_resource(snapshot(), client.clone());
    catalog.register_data_source(snapshots(), client);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LifecycleState, StateMatch};
    use crate::resource::DEFAULT_TIMEOUT;

    #[test]
    fn test_snapshot_definition() {
        let def = snapshot();
        assert_eq!(def.type_name, SNAPSHOT);
        assert!(!def.uses_work_requests());
        assert_eq!(def.timeouts.create, DEFAULT_TIMEOUT);
        assert!(def.schema.is_force_new("file_system_id"));
        assert!(def.schema.is_force_new("name"));
        assert!(!def.schema.is_force_new("freeform_tags"));
        assert!(def.schema.attribute("time_created").unwrap().flags.is_computed_only());
        assert_eq!(
            def.create_targets.classify(&LifecycleState::from("CREATING")),
            StateMatch::Pending
        );
        assert_eq!(
            def.create_targets.classify(&LifecycleState::from("ACTIVE")),
            StateMatch::Reached
        );
    }

    #[test]
    fn test_snapshots_data_source() {
        let ds = snapshots();
        assert_eq!(ds.items_key(), Some("snapshots"));
        assert!(ds.schema.attribute("file_system_id").unwrap().flags.required);
        assert!(ds.schema.attribute(ID_ATTRIBUTE).unwrap().flags.optional);
        let config = serde_json::json!({"file_system_id": "ocid1.fs", "id": "ocid1.snapshot"});
        let params = ds.list_parameters(config.as_object().unwrap());
        assert_eq!(params[ID_ATTRIBUTE], "ocid1.snapshot");
    }
}
