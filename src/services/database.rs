//! Database: autonomous VM clusters on Exadata Cloud@Customer.
//!
//! Every mutation returns a work request, and provisioning takes hours, so
//! the deadlines are far above the defaults.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::client::ResourceClient;
use crate::data_source::DataSourceDefinition;
use crate::poller::PollInterval;
use crate::resource::{ResourceDefinition, Timeouts};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};

/// Service name.
pub const SERVICE: &str = "database";

/// Resource type name.
pub const AUTONOMOUS_VM_CLUSTER: &str = "oci_database_autonomous_vm_cluster";

/// Data source type name reading one cluster.
pub const AUTONOMOUS_VM_CLUSTER_LOOKUP: &str = AUTONOMOUS_VM_CLUSTER;

/// Data source type name listing clusters.
pub const AUTONOMOUS_VM_CLUSTERS: &str = "oci_database_autonomous_vm_clusters";

/// Work request entity type of an autonomous VM cluster.
pub const ENTITY_TYPE: &str = "autonomousVmCluster";

fn named_list() -> NestedBlock {
    NestedBlock::list(Block::new().with_attribute("name", Attribute::required_string()))
}

fn maintenance_window() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("preference", Attribute::required_string())
            .with_attribute(
                "hours_of_day",
                Attribute::new(AttributeType::list(AttributeType::Int64), AttributeFlags::optional()),
            )
            .with_attribute(
                "weeks_of_month",
                Attribute::new(AttributeType::list(AttributeType::Int64), AttributeFlags::optional()),
            )
            .with_attribute("lead_time_in_weeks", Attribute::optional_computed_int64())
            .with_block("days_of_week", named_list())
            .with_block("months", named_list()),
    )
    .with_max_items(1)
}

fn autonomous_vm_cluster_schema() -> Schema {
    Schema::v0()
        .with_attribute("compartment_id", Attribute::required_string())
        .with_attribute("display_name", Attribute::required_string())
        .with_attribute("exadata_infrastructure_id", Attribute::required_string().with_force_new())
        .with_attribute("vm_cluster_network_id", Attribute::required_string().with_force_new())
        .with_attribute(
            "autonomous_data_storage_size_in_tbs",
            Attribute::required_float64().with_force_new(),
        )
        .with_attribute("cpu_core_count_per_node", Attribute::required_int64().with_force_new())
        .with_attribute(
            "memory_per_oracle_compute_unit_in_gbs",
            Attribute::required_int64().with_force_new(),
        )
        .with_attribute("total_container_databases", Attribute::required_int64().with_force_new())
        .with_attribute(
            "is_local_backup_enabled",
            Attribute::optional_computed_bool().with_force_new(),
        )
        .with_attribute("license_model", Attribute::optional_computed_string())
        .with_attribute("time_zone", Attribute::optional_computed_string().with_force_new())
        .with_attribute(
            "defined_tags",
            Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::optional_computed()),
        )
        .with_attribute("freeform_tags", Attribute::tags())
        .with_attribute("available_cpus", Attribute::computed_int64())
        .with_attribute("cpus_enabled", Attribute::computed_int64())
        .with_attribute("data_storage_size_in_tbs", Attribute::computed_int64())
        .with_attribute("memory_size_in_gbs", Attribute::computed_int64())
        .with_attribute("lifecycle_details", Attribute::computed_string())
        .with_attribute("time_created", Attribute::computed_string())
        .with_block("maintenance_window_details", maintenance_window())
}

/// `oci_database_autonomous_vm_cluster`
pub fn autonomous_vm_cluster() -> ResourceDefinition {
    ResourceDefinition::new(AUTONOMOUS_VM_CLUSTER, SERVICE, autonomous_vm_cluster_schema())
        .with_work_requests(ENTITY_TYPE)
        .with_timeouts(Timeouts {
            create: Duration::from_secs(12 * 60 * 60),
            update: Duration::from_secs(6 * 60 * 60),
            delete: Duration::from_secs(2 * 60 * 60),
        })
        .with_poll_interval(PollInterval::Backoff {
            initial: Duration::from_secs(10),
            max: Duration::from_secs(60),
            multiplier: 1.5,
        })
}

/// `oci_database_autonomous_vm_clusters`
pub fn autonomous_vm_clusters() -> DataSourceDefinition {
    DataSourceDefinition::new(
        AUTONOMOUS_VM_CLUSTERS,
        SERVICE,
        "autonomous_vm_clusters",
        &autonomous_vm_cluster().schema,
    )
    .with_request_attribute("compartment_id", Attribute::required_string())
    .with_request_attribute("display_name", Attribute::optional_string())
    .with_request_attribute("exadata_infrastructure_id", Attribute::optional_string())
    .with_request_attribute("state", Attribute::optional_string())
}

/// `oci_database_autonomous_vm_cluster` as a data source.
pub fn autonomous_vm_cluster_lookup() -> DataSourceDefinition {
    DataSourceDefinition::lookup(
        AUTONOMOUS_VM_CLUSTER_LOOKUP,
        "autonomous_vm_cluster_id",
        &autonomous_vm_cluster(),
    )
}

/// Register the Database types against one client.
pub fn register(catalog: &mut Catalog, client: Arc<dyn ResourceClient>) {
    catalog.register_resource(autonomous_vm_cluster(), client.clone());
    catalog.register_data_source(autonomous_vm_cluster_lookup(), client.clone());
    catalog.register_data_source(autonomous_vm_clusters(), client);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    fn config() -> serde_json::Value {
        json!({
            "compartment_id": "ocid1.compartment",
            "display_name": "autonomousVmCluster",
            "exadata_infrastructure_id": "ocid1.exadatainfrastructure",
            "vm_cluster_network_id": "ocid1.vmclusternetwork",
            "autonomous_data_storage_size_in_tbs": 1.0,
            "cpu_core_count_per_node": 6,
            "memory_per_oracle_compute_unit_in_gbs": 12,
            "total_container_databases": 2,
            "freeform_tags": {"Department": "Finance"},
            "maintenance_window_details": [{
                "preference": "CUSTOM_PREFERENCE",
                "days_of_week": [{"name": "MONDAY"}],
                "hours_of_day": [0],
                "lead_time_in_weeks": 1,
                "months": [{"name": "JANUARY"}, {"name": "APRIL"}, {"name": "JULY"}, {"name": "OCTOBER"}],
                "weeks_of_month": [1]
            }]
        })
    }

    #[test]
    fn test_definition_uses_work_requests() {
        let def = autonomous_vm_cluster();
        assert!(def.uses_work_requests());
        assert_eq!(def.work_request_entity.as_deref(), Some(ENTITY_TYPE));
        assert_eq!(def.timeouts.create, Duration::from_secs(43_200));
    }

    #[test]
    fn test_schema_accepts_full_config() {
        let diags = validate(&autonomous_vm_cluster().schema, &config());
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_schema_limits_maintenance_windows() {
        let mut cfg = config();
        let window = cfg["maintenance_window_details"][0].clone();
        cfg["maintenance_window_details"] = json!([window.clone(), window]);
        assert!(!validate(&autonomous_vm_cluster().schema, &cfg).is_empty());
    }

    #[test]
    fn test_lookup_schema() {
        let ds = autonomous_vm_cluster_lookup();
        assert_eq!(ds.items_key(), None);
        assert_eq!(ds.service, SERVICE);
        assert!(ds.schema.attribute("autonomous_vm_cluster_id").unwrap().flags.required);
        assert!(ds.schema.attribute("display_name").unwrap().flags.is_computed_only());
        assert!(ds
            .schema
            .attribute("maintenance_window_details")
            .unwrap()
            .flags
            .is_computed_only());
        assert_eq!(validate(&ds.schema, &json!({})).len(), 1);
    }

    #[test]
    fn test_update_in_place_attributes() {
        let schema = autonomous_vm_cluster().schema;
        assert!(!schema.is_force_new("display_name"));
        assert!(!schema.is_force_new("compartment_id"));
        assert!(schema.is_force_new("cpu_core_count_per_node"));
    }
}
