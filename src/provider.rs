//! The provider surface.
//!
//! [`ProviderService`] is the set of operations a plugin host calls.
//! [`OciProvider`] implements it by dispatching each call through the
//! [`Catalog`]: resources go to a fresh [`CrudDriver`], data sources to their
//! [`DataSourceDefinition`](crate::data_source::DataSourceDefinition).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hemmer_provider_oci::services::ServiceClients;
//! use hemmer_provider_oci::testing::FakeCloud;
//! use hemmer_provider_oci::{OciProvider, ProviderService};
//!
//! let provider = OciProvider::with_clients(ServiceClients::shared(Arc::new(FakeCloud::new())));
//! assert!(provider
//!     .metadata()
//!     .resources
//!     .contains(&"oci_file_storage_snapshot".to_string()));
//! ```

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::config::ProviderConfig;
use crate::driver::CrudDriver;
use crate::error::ProviderError;
use crate::plan::plan;
use crate::schema::{summarize, Diagnostic, ProviderSchema};
use crate::services::{self, ServiceClients};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};
use crate::validation::validate;

/// Operations a provider exposes to its host.
///
/// States travel as JSON objects keyed by attribute name.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Names of every resource and data source type, sorted.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    /// Returns diagnostics (errors and warnings).
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    /// Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource; `Null` when it is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(&self, data_source_type: &str, _config: Value) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// The OCI provider.
///
/// Until [`configure`](ProviderService::configure) succeeds, operations run
/// with the default [`ProviderConfig`].
#[derive(Debug)]
pub struct OciProvider {
    catalog: Catalog,
    config: RwLock<Option<ProviderConfig>>,
}

impl OciProvider {
    /// A provider serving the types in `catalog`.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            config: RwLock::new(None),
        }
    }

    /// A provider serving every supported type.
    pub fn with_clients(clients: ServiceClients) -> Self {
        Self::new(services::catalog(clients))
    }

    /// The registered types.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The active configuration.
    pub async fn config(&self) -> ProviderConfig {
        self.config.read().await.clone().unwrap_or_default()
    }

    /// Whether `configure` has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.config.read().await.is_some()
    }

    async fn driver(&self, resource_type: &str) -> Result<CrudDriver, ProviderError> {
        let entry = self.catalog.resource(resource_type)?;
        let config = self.config().await;
        Ok(CrudDriver::from_config(
            entry.definition.clone(),
            entry.client.clone(),
            &config,
        ))
    }

    fn check_config(config: &Value) -> Result<(ProviderConfig, Vec<Diagnostic>), ProviderError> {
        let mut diagnostics = match config {
            Value::Null => Vec::new(),
            config => validate(&ProviderConfig::schema(), config),
        };
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok((ProviderConfig::default(), diagnostics));
        }
        let parsed = ProviderConfig::from_value(config.clone())?.with_env_fallbacks();
        diagnostics.extend(parsed.validate());
        Ok((parsed, diagnostics))
    }
}

#[async_trait::async_trait]
impl ProviderService for OciProvider {
    fn schema(&self) -> ProviderSchema {
        self.catalog.provider_schema()
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.catalog.resource_types(),
            data_sources: self.catalog.data_source_types(),
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Self::check_config(&config).map(|(_, diagnostics)| diagnostics)
    }

    #[instrument(skip_all, name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let (parsed, diagnostics) = Self::check_config(&config)?;
        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(diagnostics = %summarize(&diagnostics), "Provider configuration rejected");
            return Ok(diagnostics);
        }

        info!(
            region = parsed.region.as_deref().unwrap_or_default(),
            auto_retries = !parsed.disable_auto_retries,
            "Provider configured"
        );
        *self.config.write().await = Some(parsed);
        Ok(diagnostics)
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let entry = self.catalog.resource(resource_type)?;
        Ok(validate(&entry.definition.schema, &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let entry = self.catalog.resource(resource_type)?;
        plan(&entry.definition.schema, prior_state.as_ref(), &proposed_state)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let mut driver = self.driver(resource_type).await?;
        let created = driver.create(&planned_state).await?;
        Ok(created.to_value())
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let mut driver = self.driver(resource_type).await?;
        let current = driver.read(&current_state).await?;
        Ok(current.map(|d| d.to_value()).unwrap_or(Value::Null))
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let mut driver = self.driver(resource_type).await?;
        let updated = driver.update(&prior_state, &planned_state).await?;
        Ok(updated.to_value())
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let mut driver = self.driver(resource_type).await?;
        driver.delete(&current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let mut driver = self.driver(resource_type).await?;
        let imported = driver.import(id).await?;
        Ok(vec![ImportedResource::new(resource_type, imported.to_value())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let entry = self.catalog.data_source(data_source_type)?;
        Ok(validate(&entry.definition.schema, &config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let entry = self.catalog.data_source(data_source_type)?;
        let policy = self
            .config()
            .await
            .retry_policy(&entry.definition.service, false);
        entry
            .definition
            .read(entry.client.as_ref(), &policy, &config)
            .await
    }
}
