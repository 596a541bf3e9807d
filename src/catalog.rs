//! Registry of resource and data source types.
//!
//! Each entry pairs a definition with the client that talks to its service.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::ResourceClient;
use crate::config::ProviderConfig;
use crate::data_source::DataSourceDefinition;
use crate::error::ProviderError;
use crate::resource::ResourceDefinition;
use crate::schema::ProviderSchema;

/// A registered resource type.
#[derive(Clone)]
pub struct ResourceEntry {
    /// The resource definition.
    pub definition: Arc<ResourceDefinition>,
    /// Client for the resource's service.
    pub client: Arc<dyn ResourceClient>,
}

/// A registered data source type.
#[derive(Clone)]
pub struct DataSourceEntry {
    /// The data source definition.
    pub definition: Arc<DataSourceDefinition>,
    /// Client for the data source's service.
    pub client: Arc<dyn ResourceClient>,
}

/// Every type a provider serves, keyed by type name.
#[derive(Clone, Default)]
pub struct Catalog {
    resources: BTreeMap<String, ResourceEntry>,
    data_sources: BTreeMap<String, DataSourceEntry>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource type, replacing any earlier registration.
    pub fn register_resource(&mut self, definition: ResourceDefinition, client: Arc<dyn ResourceClient>) {
        self.resources.insert(
            definition.type_name.clone(),
            ResourceEntry {
                definition: Arc::new(definition),
                client,
            },
        );
    }

    /// Register a data source type, replacing any earlier registration.
    pub fn register_data_source(&mut self, definition: DataSourceDefinition, client: Arc<dyn ResourceClient>) {
        self.data_sources.insert(
            definition.type_name.clone(),
            DataSourceEntry {
                definition: Arc::new(definition),
                client,
            },
        );
    }

    /// Look up a resource type.
    pub fn resource(&self, type_name: &str) -> Result<&ResourceEntry, ProviderError> {
        self.resources.get(type_name).ok_or_else(|| {
            ProviderError::UnknownResource(format!("Unknown resource type: {}", type_name))
        })
    }

    /// Look up a data source type.
    pub fn data_source(&self, type_name: &str) -> Result<&DataSourceEntry, ProviderError> {
        self.data_sources.get(type_name).ok_or_else(|| {
            ProviderError::UnknownResource(format!("Unknown data source type: {}", type_name))
        })
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.data_sources.keys().cloned().collect()
    }

    /// The schema of every registered type plus the provider configuration.
    pub fn provider_schema(&self) -> ProviderSchema {
        let schema = self
            .resources
            .iter()
            .fold(ProviderSchema::new(), |schema, (name, entry)| {
                schema.with_resource(name.clone(), entry.definition.schema.clone())
            });
        self.data_sources
            .iter()
            .fold(schema, |schema, (name, entry)| {
                schema.with_data_source(name.clone(), entry.definition.schema.clone())
            })
            .with_provider_config(ProviderConfig::schema())
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
