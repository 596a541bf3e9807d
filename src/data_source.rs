//! Read-only data sources.
//!
//! A list data source turns a `List*` API into a data source: request
//! attributes from the configuration become list parameters, every page is
//! fetched, `filter` blocks narrow the result, and the items are returned
//! under a single computed list attribute.
//!
//! A lookup data source reads one resource by identifier and returns its
//! attributes alongside the configuration.

use std::collections::HashSet;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::client::{ListRequest, ResourceClient};
use crate::error::ProviderError;
use crate::resource::ResourceDefinition;
use crate::retry::RetryPolicy;
use crate::schema::{Attribute, AttributeFlags, AttributeType, NestedBlock, Schema};
use crate::types::{ResourceId, ID_ATTRIBUTE};
use crate::validation::ensure_valid;

/// Name of the filter block.
pub const FILTER_BLOCK: &str = "filter";

/// What a data source reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceKind {
    /// Every item of a list call, under `items_key`.
    List {
        /// Attribute holding the returned items, e.g. `snapshots`.
        items_key: String,
    },
    /// One resource, identified by the value of `id_attribute`.
    Lookup {
        /// Configuration attribute holding the identifier.
        id_attribute: String,
    },
}

/// Metadata for one data source.
#[derive(Debug, Clone)]
pub struct DataSourceDefinition {
    /// Type name, e.g. `oci_file_storage_snapshots`.
    pub type_name: String,
    /// Service name used for retry logging.
    pub service: String,
    /// List or lookup.
    pub kind: DataSourceKind,
    /// Configuration attributes passed to the list call.
    pub request_attributes: Vec<String>,
    /// Page size hint for the list call.
    pub page_limit: Option<u32>,
    /// Full data source schema.
    pub schema: Schema,
}

impl DataSourceDefinition {
    /// A data source listing items shaped like `item_schema`.
    pub fn new(
        type_name: impl Into<String>,
        service: impl Into<String>,
        items_key: impl Into<String>,
        item_schema: &Schema,
    ) -> Self {
        let items_key = items_key.into();
        let schema = Schema::v0()
            .with_attribute(ID_ATTRIBUTE, Attribute::computed_string())
            .with_attribute(
                items_key.clone(),
                Attribute::new(
                    AttributeType::list(item_schema.item_type()),
                    AttributeFlags::computed(),
                ),
            )
            .with_block(FILTER_BLOCK, NestedBlock::filters());

        Self {
            type_name: type_name.into(),
            service: service.into(),
            kind: DataSourceKind::List { items_key },
            request_attributes: Vec::new(),
            page_limit: None,
            schema,
        }
    }

    /// A data source reading one `resource` by the identifier in `id_attribute`.
    ///
    /// The schema is the resource schema with every field computed, plus the
    /// required identifier attribute.
    pub fn lookup(
        type_name: impl Into<String>,
        id_attribute: impl Into<String>,
        resource: &ResourceDefinition,
    ) -> Self {
        let id_attribute = id_attribute.into();
        let schema = resource
            .schema
            .to_computed()
            .with_attribute(id_attribute.clone(), Attribute::required_string());

        Self {
            type_name: type_name.into(),
            service: resource.service.clone(),
            kind: DataSourceKind::Lookup {
                id_attribute: id_attribute.clone(),
            },
            request_attributes: vec![id_attribute],
            page_limit: None,
            schema,
        }
    }

    /// The attribute holding list items, for list data sources.
    pub fn items_key(&self) -> Option<&str> {
        match &self.kind {
            DataSourceKind::List { items_key } => Some(items_key),
            DataSourceKind::Lookup { .. } => None,
        }
    }

    /// Add a configuration attribute that is passed to the list call.
    pub fn with_request_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        let name = name.into();
        self.schema = self.schema.with_attribute(name.clone(), attr);
        self.request_attributes.push(name);
        self
    }

    /// Set the page size hint.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// The list parameters taken from `config`.
    pub fn list_parameters(&self, config: &Map<String, Value>) -> Map<String, Value> {
        self.request_attributes
            .iter()
            .filter_map(|name| {
                config
                    .get(name)
                    .filter(|v| !v.is_null())
                    .map(|v| (name.clone(), v.clone()))
            })
            .collect()
    }

    /// Read the data source.
    ///
    /// Returns the configuration with `id` and the read attributes filled in.
    #[instrument(skip_all, name = "data_source.read", fields(data_source = %self.type_name))]
    pub async fn read(
        &self,
        client: &dyn ResourceClient,
        policy: &RetryPolicy,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        ensure_valid(&self.type_name, &self.schema, config)?;
        let config = config.as_object().cloned().unwrap_or_default();

        match &self.kind {
            DataSourceKind::List { items_key } => self.read_list(client, policy, config, items_key).await,
            DataSourceKind::Lookup { id_attribute } => {
                read_one(client, policy, config, id_attribute).await
            },
        }
    }

    async fn read_list(
        &self,
        client: &dyn ResourceClient,
        policy: &RetryPolicy,
        config: Map<String, Value>,
        items_key: &str,
    ) -> Result<Value, ProviderError> {
        let filters = Filter::parse_all(config.get(FILTER_BLOCK))?;
        let mut request = ListRequest::new(self.list_parameters(&config));
        request.limit = self.page_limit;

        let items = list_all(client, policy, request.clone()).await?;
        let total = items.len();
        let items = apply_filters(items, &filters);
        debug!(total, kept = items.len(), "Listed items");

        let mut output = config;
        output.insert(
            ID_ATTRIBUTE.to_string(),
            Value::String(data_source_id(&self.type_name, &request.parameters, &filters)),
        );
        output.insert(items_key.to_string(), Value::Array(items));
        Ok(Value::Object(output))
    }
}

async fn read_one(
    client: &dyn ResourceClient,
    policy: &RetryPolicy,
    config: Map<String, Value>,
    id_attribute: &str,
) -> Result<Value, ProviderError> {
    let id = config
        .get(id_attribute)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation(format!("'{}' must be a string", id_attribute)))?;
    let id = ResourceId::new(id)?;

    let remote = policy.execute("Get", || client.get(&id)).await?;
    debug!(id = %id, state = %remote.state, "Read resource");

    let mut output = config;
    if let Value::Object(fields) = remote.to_value() {
        output.extend(fields);
    }
    Ok(Value::Object(output))
}

/// Fetch every page of a list call.
///
/// Each page call runs under `policy`. A page token that repeats is an error
/// rather than an endless loop.
pub async fn list_all(
    client: &dyn ResourceClient,
    policy: &RetryPolicy,
    request: ListRequest,
) -> Result<Vec<Value>, ProviderError> {
    let mut items = Vec::new();
    let mut request = request;
    let mut seen = HashSet::new();

    loop {
        let page = policy.execute("List", || client.list(&request)).await?;
        items.extend(page.items.iter().map(|r| r.to_value()));

        match page.next_page {
            None => return Ok(items),
            Some(token) => {
                if !seen.insert(token.clone()) {
                    return Err(ProviderError::UnexpectedState {
                        resource: "list".to_string(),
                        state: format!("page token {} repeated", token),
                        expected: "a new page token".to_string(),
                    });
                }
                request = request.for_page(Some(token));
            },
        }
    }
}

/// One `filter` block.
#[derive(Debug, Clone, Deserialize)]
pub struct Filter {
    /// Item attribute to test; dotted paths reach into nested objects.
    pub name: String,
    /// Accepted values.
    pub values: Vec<String>,
    /// Treat `values` as regular expressions.
    #[serde(default)]
    pub regex: bool,
    #[serde(skip)]
    patterns: Vec<Regex>,
}

impl Filter {
    /// An exact-match filter.
    pub fn exact(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            regex: false,
            patterns: Vec::new(),
        }
    }

    /// A regular expression filter.
    pub fn regex(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ProviderError> {
        let mut filter = Self::exact(name, values);
        filter.regex = true;
        filter.compile()?;
        Ok(filter)
    }

    /// Parse the `filter` blocks of a configuration.
    pub fn parse_all(value: Option<&Value>) -> Result<Vec<Filter>, ProviderError> {
        let blocks = match value {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(v) => v,
        };
        let mut filters: Vec<Filter> = serde_json::from_value(blocks.clone())
            .map_err(|e| ProviderError::Validation(format!("invalid filter block: {}", e)))?;
        for filter in &mut filters {
            filter.compile()?;
        }
        Ok(filters)
    }

    fn compile(&mut self) -> Result<(), ProviderError> {
        if !self.regex {
            return Ok(());
        }
        self.patterns = self
            .values
            .iter()
            .map(|v| {
                Regex::new(v).map_err(|e| {
                    ProviderError::Validation(format!("invalid regex '{}' in filter {}: {}", v, self.name, e))
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Whether `item` passes this filter.
    ///
    /// An item without the attribute never passes. For list attributes any
    /// element may match.
    pub fn matches(&self, item: &Value) -> bool {
        let Some(value) = lookup(item, &self.name) else {
            return false;
        };
        scalars(value).iter().any(|candidate| {
            if self.regex {
                self.patterns.iter().any(|p| p.is_match(candidate))
            } else {
                self.values.iter().any(|v| v == candidate)
            }
        })
    }
}

/// Keep the items that pass every filter.
pub fn apply_filters(items: Vec<Value>, filters: &[Filter]) -> Vec<Value> {
    if filters.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| filters.iter().all(|f| f.matches(item)))
        .collect()
}

/// Deterministic identifier for one data source read.
///
/// The same type, parameters and filters always produce the same id.
pub fn data_source_id(type_name: &str, parameters: &Map<String, Value>, filters: &[Filter]) -> String {
    let mut canonical = Map::new();
    canonical.insert("parameters".to_string(), Value::Object(parameters.clone()));
    canonical.insert(
        "filters".to_string(),
        Value::Array(
            filters
                .iter()
                .map(|f| serde_json::json!({"name": f.name, "values": f.values, "regex": f.regex}))
                .collect(),
        ),
    );
    let bytes = Value::Object(canonical).to_string();
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, bytes.as_bytes());
    format!("{}-{}", type_name, uuid)
}

fn lookup<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(item, |v, key| v.get(key))
}

fn scalars(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(scalars).collect(),
        Value::Null | Value::Object(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use crate::testing::{FakeCall, FakeCloud};
    use crate::types::{RemoteResource, ResourceId};
    use serde_json::json;
    use std::time::Duration;

    fn item_schema() -> Schema {
        Schema::v0()
            .with_attribute("file_system_id", Attribute::required_string())
            .with_attribute("name", Attribute::required_string())
            .with_lifecycle()
    }

    fn definition() -> DataSourceDefinition {
        DataSourceDefinition::new("oci_file_storage_snapshots", "file_storage", "snapshots", &item_schema())
            .with_request_attribute("file_system_id", Attribute::required_string())
            .with_request_attribute("state", Attribute::optional_string())
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::for_service("file_storage", false)
            .with_delays(Duration::from_millis(1), Duration::from_millis(5))
            .with_jitter(false)
    }

    fn seed(cloud: &FakeCloud) {
        for (i, name) in ["nightly-1", "nightly-2", "weekly-1", "nightly-3", "adhoc"].iter().enumerate() {
            cloud.insert(
                RemoteResource::new(
                    ResourceId::new(format!("ocid1.snap.{}", i)).unwrap(),
                    if i == 4 { LifecycleState::DELETED } else { LifecycleState::AVAILABLE },
                )
                .with_attribute("file_system_id", json!("ocid1.fs"))
                .with_attribute("name", json!(name)),
            );
        }
        cloud.insert(
            RemoteResource::new(ResourceId::new("ocid1.snap.other").unwrap(), "AVAILABLE")
                .with_attribute("file_system_id", json!("ocid1.fs2"))
                .with_attribute("name", json!("nightly-x")),
        );
    }

    #[test]
    fn test_schema() {
        let def = definition();
        assert!(def.schema.attribute("snapshots").unwrap().flags.is_computed_only());
        assert!(def.schema.block.blocks.contains_key(FILTER_BLOCK));
        assert_eq!(def.request_attributes, ["file_system_id", "state"]);
    }

    #[tokio::test]
    async fn test_read_follows_pages() {
        let cloud = FakeCloud::new().with_page_size(2);
        seed(&cloud);

        let out = definition()
            .read(&cloud, &policy(), &json!({"file_system_id": "ocid1.fs"}))
            .await
            .unwrap();

        assert_eq!(out["snapshots"].as_array().unwrap().len(), 5);
        assert_eq!(out["file_system_id"], "ocid1.fs");
        assert!(out["id"].as_str().unwrap().starts_with("oci_file_storage_snapshots-"));
        assert_eq!(cloud.calls(FakeCall::List), 3);
    }

    #[tokio::test]
    async fn test_read_passes_state_parameter() {
        let cloud = FakeCloud::new();
        seed(&cloud);

        let out = definition()
            .read(&cloud, &policy(), &json!({"file_system_id": "ocid1.fs", "state": "AVAILABLE"}))
            .await
            .unwrap();
        assert_eq!(out["snapshots"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_read_applies_filters() {
        let cloud = FakeCloud::new();
        seed(&cloud);

        let config = json!({
            "file_system_id": "ocid1.fs",
            "filter": [
                {"name": "name", "values": ["^nightly-\\d$"], "regex": true},
                {"name": "state", "values": ["AVAILABLE"]}
            ]
        });
        let out = definition().read(&cloud, &policy(), &config).await.unwrap();
        let names: Vec<_> = out["snapshots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["nightly-1", "nightly-2", "nightly-3"]);
    }

    #[tokio::test]
    async fn test_read_retries_list() {
        let cloud = FakeCloud::new();
        seed(&cloud);
        cloud.fail(FakeCall::List, 500, 1);

        let out = definition()
            .read(&cloud, &policy(), &json!({"file_system_id": "ocid1.fs"}))
            .await
            .unwrap();
        assert_eq!(out["snapshots"].as_array().unwrap().len(), 5);
        assert_eq!(cloud.calls(FakeCall::List), 2);
    }

    #[tokio::test]
    async fn test_read_requires_request_attributes() {
        let cloud = FakeCloud::new();
        let err = definition().read(&cloud, &policy(), &json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(cloud.calls(FakeCall::List), 0);
    }

    fn lookup() -> DataSourceDefinition {
        let resource = ResourceDefinition::new("oci_file_storage_snapshot", "file_storage", item_schema());
        DataSourceDefinition::lookup("oci_file_storage_snapshot", "snapshot_id", &resource)
    }

    #[tokio::test]
    async fn test_lookup_reads_one_resource() {
        let cloud = FakeCloud::new();
        seed(&cloud);
        cloud.fail(FakeCall::Get, 503, 1);

        let out = lookup()
            .read(&cloud, &policy(), &json!({"snapshot_id": "ocid1.snap.2"}))
            .await
            .unwrap();

        assert_eq!(out["snapshot_id"], "ocid1.snap.2");
        assert_eq!(out["id"], "ocid1.snap.2");
        assert_eq!(out["name"], "weekly-1");
        assert_eq!(out["state"], "AVAILABLE");
        assert_eq!(cloud.calls(FakeCall::Get), 2);
        assert_eq!(cloud.calls(FakeCall::List), 0);
    }

    #[tokio::test]
    async fn test_lookup_missing_resource() {
        let cloud = FakeCloud::new();
        let err = lookup()
            .read(&cloud, &policy(), &json!({"snapshot_id": "ocid1.snap.none"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = lookup().read(&cloud, &policy(), &json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(cloud.calls(FakeCall::Get), 1);
    }

    #[test]
    fn test_filter_semantics() {
        let item = json!({"name": "a", "tags": ["x", "y"], "size": 10, "nested": {"k": "v"}});

        assert!(Filter::exact("name", ["a", "b"]).matches(&item));
        assert!(!Filter::exact("name", ["b"]).matches(&item));
        assert!(Filter::exact("tags", ["y"]).matches(&item));
        assert!(Filter::exact("size", ["10"]).matches(&item));
        assert!(Filter::exact("nested.k", ["v"]).matches(&item));
        assert!(!Filter::exact("missing", ["a"]).matches(&item));
        assert!(Filter::regex("name", ["^[a-c]$"]).unwrap().matches(&item));
    }

    #[test]
    fn test_invalid_regex() {
        let err = Filter::parse_all(Some(&json!([{"name": "n", "values": ["("], "regex": true}]))).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_data_source_id_is_deterministic() {
        let params = json!({"file_system_id": "ocid1.fs"}).as_object().cloned().unwrap();
        let a = data_source_id("oci_x", &params, &[]);
        let b = data_source_id("oci_x", &params, &[]);
        assert_eq!(a, b);

        let other = json!({"file_system_id": "ocid1.fs2"}).as_object().cloned().unwrap();
        assert_ne!(a, data_source_id("oci_x", &other, &[]));
        assert_ne!(a, data_source_id("oci_x", &params, &[Filter::exact("name", ["n"])]));
    }

    #[tokio::test]
    async fn test_repeated_page_token() {
        use crate::client::{ListPage, Submission};
        use async_trait::async_trait;

        struct Stuck;

        #[async_trait]
        impl ResourceClient for Stuck {
            async fn create(&self, _: &Map<String, Value>) -> Result<Submission, ProviderError> {
                unreachable!()
            }
            async fn get(&self, _: &ResourceId) -> Result<RemoteResource, ProviderError> {
                unreachable!()
            }
            async fn update(&self, _: &ResourceId, _: &Map<String, Value>) -> Result<Submission, ProviderError> {
                unreachable!()
            }
            async fn delete(&self, _: &ResourceId) -> Result<Submission, ProviderError> {
                unreachable!()
            }
            async fn list(&self, _: &ListRequest) -> Result<ListPage, ProviderError> {
                Ok(ListPage {
                    items: Vec::new(),
                    next_page: Some("same".to_string()),
                })
            }
        }

        let err = list_all(&Stuck, &policy(), ListRequest::new(Map::new())).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedState { .. }));
    }
}
