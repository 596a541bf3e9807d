//! Concrete OCI resource and data source types.

pub mod database;
pub mod file_storage;

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::client::ResourceClient;

/// Clients for each supported service.
#[derive(Clone)]
pub struct ServiceClients {
    /// File Storage client.
    pub file_storage: Arc<dyn ResourceClient>,
    /// Database client.
    pub database: Arc<dyn ResourceClient>,
}

impl ServiceClients {
    /// The same client for every service.
    pub fn shared(client: Arc<dyn ResourceClient>) -> Self {
        Self {
            file_storage: client.clone(),
            database: client,
        }
    }
}

/// A catalog of every supported type.
pub fn catalog(clients: ServiceClients) -> Catalog {
    let mut catalog = Catalog::new();
    file_storage::register(&mut catalog, clients.file_storage);
    database::register(&mut catalog, clients.database);
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCloud;

    #[test]
    fn test_catalog_lists_every_type() {
        let catalog = catalog(ServiceClients::shared(Arc::new(FakeCloud::new())));
        assert_eq!(
            catalog.resource_types(),
            vec![
                database::AUTONOMOUS_VM_CLUSTER.to_string(),
                file_storage::SNAPSHOT.to_string(),
            ]
        );
        assert_eq!(
            catalog.data_source_types(),
            vec![
                database::AUTONOMOUS_VM_CLUSTER_LOOKUP.to_string(),
                database::AUTONOMOUS_VM_CLUSTERS.to_string(),
                file_storage::SNAPSHOTS.to_string(),
            ]
        );
    }
}
