//! Testing utilities for the driver and provider.
//!
//! [`FakeCloud`] is an in-memory [`ResourceClient`] whose resources walk
//! through scripted lifecycle states, with injectable failures and call
//! counters. [`ProviderTester`] drives a [`ProviderService`] through whole
//! lifecycles without a plugin host.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hemmer_provider_oci::testing::{FakeCall, FakeCloud};
//! use hemmer_provider_oci::{CrudDriver, ResourceDefinition};
//! use hemmer_provider_oci::schema::{Attribute, Schema};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let cloud = Arc::new(FakeCloud::new());
//! let definition = ResourceDefinition::new(
//!     "oci_example_thing",
//!     "example",
//!     Schema::v0().with_attribute("name", Attribute::required_string()),
//! );
//!
//! let mut driver = CrudDriver::new(Arc::new(definition), cloud.clone())
//!     .with_poll_interval(hemmer_provider_oci::PollInterval::Fixed(std::time::Duration::ZERO));
//! let created = driver.create(&json!({"name": "thing"})).await.unwrap();
//!
//! assert_eq!(created.state.unwrap().as_str(), "AVAILABLE");
//! assert_eq!(cloud.calls(FakeCall::Create), 1);
//! # });
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::{ListPage, ListRequest, ResourceClient, Submission};
use crate::error::ProviderError;
use crate::lifecycle::LifecycleState;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, RemoteResource, ResourceId, ID_ATTRIBUTE, STATE_ATTRIBUTE};
use crate::work_request::{WorkRequest, WorkRequestResource, WorkRequestStatus};

/// Remote operations counted and failed by [`FakeCloud`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeCall {
    /// `create`
    Create,
    /// `get`
    Get,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `list`
    List,
    /// `get_work_request`
    GetWorkRequest,
}

struct FakeResource {
    state: LifecycleState,
    attributes: Map<String, Value>,
    script: VecDeque<LifecycleState>,
}

impl FakeResource {
    fn advance(&mut self) {
        if let Some(next) = self.script.pop_front() {
            self.state = next;
        }
    }

    fn snapshot(&self, id: &str) -> Result<RemoteResource, ProviderError> {
        let mut remote = RemoteResource::new(ResourceId::new(id)?, self.state.clone());
        remote.attributes = self.attributes.clone();
        Ok(remote)
    }

    fn is_deleted(&self) -> bool {
        matches!(
            self.state.as_str(),
            LifecycleState::DELETED | LifecycleState::TERMINATED
        )
    }
}

struct FakeWorkRequest {
    status: WorkRequestStatus,
    script: VecDeque<WorkRequestStatus>,
    resource: WorkRequestResource,
}

struct Injected {
    status: u16,
    remaining: u32,
}

struct Inner {
    resources: BTreeMap<String, FakeResource>,
    work_requests: HashMap<String, FakeWorkRequest>,
    next_id: u64,
    create_states: Vec<LifecycleState>,
    update_states: Vec<LifecycleState>,
    delete_states: Vec<LifecycleState>,
    work_request_entity: Option<String>,
    work_request_states: Vec<WorkRequestStatus>,
    page_size: usize,
    failures: HashMap<FakeCall, Injected>,
    calls: HashMap<FakeCall, u32>,
}

/// In-memory, scripted cloud.
///
/// By default a created resource reports `PROVISIONING` and then
/// `AVAILABLE`, an update goes through `UPDATING`, and a delete through
/// `DELETING` to `DELETED`. Each `get` consumes one scripted state; once a
/// script is exhausted the last state sticks.
pub struct FakeCloud {
    prefix: String,
    inner: Mutex<Inner>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloud {
    /// A cloud with the default lifecycle scripts.
    pub fn new() -> Self {
        Self {
            prefix: "ocid1.fake".to_string(),
            inner: Mutex::new(Inner {
                resources: BTreeMap::new(),
                work_requests: HashMap::new(),
                next_id: 1,
                create_states: states(["PROVISIONING", "AVAILABLE"]),
                update_states: states(["UPDATING", "AVAILABLE"]),
                delete_states: states(["DELETING", "DELETED"]),
                work_request_entity: None,
                work_request_states: vec![
                    WorkRequestStatus::Accepted,
                    WorkRequestStatus::InProgress,
                    WorkRequestStatus::Succeeded,
                ],
                page_size: 50,
                failures: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    /// Use `prefix` for generated identifiers.
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// States a new resource walks through; the first is returned by `create`.
    pub fn with_create_states<I, S>(self, script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock().create_states = states(script);
        self
    }

    /// States an updated resource walks through.
    pub fn with_update_states<I, S>(self, script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock().update_states = states(script);
        self
    }

    /// States a deleted resource walks through.
    pub fn with_delete_states<I, S>(self, script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock().delete_states = states(script);
        self
    }

    /// Answer mutations with work requests affecting `entity_type`.
    ///
    /// `create` then returns only the work request; the resource identifier
    /// is reported among the work request's resources.
    pub fn with_work_requests(self, entity_type: impl Into<String>) -> Self {
        self.lock().work_request_entity = Some(entity_type.into());
        self
    }

    /// Statuses each new work request walks through.
    pub fn with_work_request_states(self, script: Vec<WorkRequestStatus>) -> Self {
        self.lock().work_request_states = script;
        self
    }

    /// Maximum number of items per `list` page.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Add an existing resource.
    pub fn insert(&self, resource: RemoteResource) {
        self.lock().resources.insert(
            resource.id.to_string(),
            FakeResource {
                state: resource.state,
                attributes: resource.attributes,
                script: VecDeque::new(),
            },
        );
    }

    /// Replace the remaining state script of one resource.
    pub fn script<I, S>(&self, id: &str, script: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(resource) = self.lock().resources.get_mut(id) {
            resource.script = states(script).into();
        }
    }

    /// Fail the next `times` calls of `call` with an HTTP `status`.
    ///
    /// `u32::MAX` fails every call.
    pub fn fail(&self, call: FakeCall, status: u16, times: u32) {
        self.lock().failures.insert(
            call,
            Injected {
                status,
                remaining: times,
            },
        );
    }

    /// Number of calls of the given kind so far.
    pub fn calls(&self, call: FakeCall) -> u32 {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// The current state of a resource, without consuming its script.
    pub fn state_of(&self, id: &str) -> Option<LifecycleState> {
        self.lock().resources.get(id).map(|r| r.state.clone())
    }

    /// The stored attributes of a resource.
    pub fn attributes_of(&self, id: &str) -> Option<Map<String, Value>> {
        self.lock().resources.get(id).map(|r| r.attributes.clone())
    }

    /// Number of stored resources, deleted ones included.
    pub fn len(&self) -> usize {
        self.lock().resources.len()
    }

    /// Whether no resource has ever been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call and return an injected failure, if one is armed.
    fn enter(inner: &mut Inner, call: FakeCall) -> Result<(), ProviderError> {
        *inner.calls.entry(call).or_insert(0) += 1;

        let Some(injected) = inner.failures.get_mut(&call) else {
            return Ok(());
        };
        if injected.remaining == 0 {
            return Ok(());
        }
        if injected.remaining != u32::MAX {
            injected.remaining -= 1;
        }
        Err(ProviderError::from_status(
            injected.status,
            status_code_name(injected.status),
            format!("injected failure for {:?}", call),
        ))
    }

    fn allocate_id(&self, inner: &mut Inner, kind: &str) -> String {
        let id = format!("{}.{}.{}", self.prefix, kind, inner.next_id);
        inner.next_id += 1;
        id
    }

    fn open_work_request(&self, inner: &mut Inner, action: &str, identifier: &str) -> Option<String> {
        let entity_type = inner.work_request_entity.clone()?;
        let id = self.allocate_id(inner, "workrequest");
        let mut script: VecDeque<WorkRequestStatus> = inner.work_request_states.iter().copied().collect();
        let status = script.pop_front().unwrap_or(WorkRequestStatus::Succeeded);
        inner.work_requests.insert(
            id.clone(),
            FakeWorkRequest {
                status,
                script,
                resource: WorkRequestResource {
                    entity_type,
                    action_type: action.to_string(),
                    identifier: identifier.to_string(),
                },
            },
        );
        Some(id)
    }
}

#[async_trait]
impl ResourceClient for FakeCloud {
    async fn create(&self, attributes: &Map<String, Value>) -> Result<Submission, ProviderError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, FakeCall::Create)?;

        let id = self.allocate_id(&mut inner, "resource");
        let mut script: VecDeque<LifecycleState> = inner.create_states.iter().cloned().collect();
        let state = script
            .pop_front()
            .unwrap_or_else(|| LifecycleState::new(LifecycleState::AVAILABLE));
        let resource = FakeResource {
            state,
            attributes: attributes.clone(),
            script,
        };
        let snapshot = resource.snapshot(&id)?;
        inner.resources.insert(id.clone(), resource);

        match self.open_work_request(&mut inner, "CREATED", &id) {
            Some(wr) => Ok(Submission::work_request(wr)),
            None => Ok(Submission::resource(snapshot)),
        }
    }

    async fn get(&self, id: &ResourceId) -> Result<RemoteResource, ProviderError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, FakeCall::Get)?;

        let resource = inner
            .resources
            .get_mut(id.as_str())
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        resource.advance();
        resource.snapshot(id.as_str())
    }

    async fn update(
        &self,
        id: &ResourceId,
        changes: &Map<String, Value>,
    ) -> Result<Submission, ProviderError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, FakeCall::Update)?;

        let mut script: VecDeque<LifecycleState> = inner.update_states.iter().cloned().collect();
        let resource = match inner.resources.get_mut(id.as_str()) {
            Some(r) if !r.is_deleted() => r,
            _ => return Err(ProviderError::NotFound(id.to_string())),
        };
        for (k, v) in changes {
            if v.is_null() {
                resource.attributes.remove(k);
            } else {
                resource.attributes.insert(k.clone(), v.clone());
            }
        }
        if let Some(first) = script.pop_front() {
            resource.state = first;
        }
        resource.script = script;
        let snapshot = resource.snapshot(id.as_str())?;

        match self.open_work_request(&mut inner, "UPDATED", id.as_str()) {
            Some(wr) => Ok(Submission::resource(snapshot).with_work_request(wr)),
            None => Ok(Submission::resource(snapshot)),
        }
    }

    async fn delete(&self, id: &ResourceId) -> Result<Submission, ProviderError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, FakeCall::Delete)?;

        let mut script: VecDeque<LifecycleState> = inner.delete_states.iter().cloned().collect();
        let resource = match inner.resources.get_mut(id.as_str()) {
            Some(r) if !r.is_deleted() => r,
            _ => return Err(ProviderError::NotFound(id.to_string())),
        };
        if let Some(first) = script.pop_front() {
            resource.state = first;
        }
        resource.script = script;

        match self.open_work_request(&mut inner, "DELETED", id.as_str()) {
            Some(wr) => Ok(Submission::work_request(wr)),
            None => Ok(Submission::accepted()),
        }
    }

    async fn list(&self, request: &ListRequest) -> Result<ListPage, ProviderError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, FakeCall::List)?;

        let offset = match &request.page {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ProviderError::Validation(format!("invalid page token '{}'", token)))?,
            None => 0,
        };
        let page_size = request
            .limit
            .map(|l| l as usize)
            .unwrap_or(inner.page_size)
            .min(inner.page_size)
            .max(1);

        let matching: Vec<RemoteResource> = inner
            .resources
            .iter()
            .filter(|(id, r)| {
                request
                    .parameters
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .all(|(k, v)| match k.as_str() {
                        ID_ATTRIBUTE => v.as_str() == Some(id.as_str()),
                        STATE_ATTRIBUTE => v.as_str() == Some(r.state.as_str()),
                        _ => r.attributes.get(k) == Some(v),
                    })
            })
            .map(|(id, r)| r.snapshot(id))
            .collect::<Result<_, _>>()?;

        let items: Vec<RemoteResource> = matching.iter().skip(offset).take(page_size).cloned().collect();
        let next = offset + items.len();
        let next_page = if next < matching.len() {
            Some(next.to_string())
        } else {
            None
        };

        Ok(ListPage { items, next_page })
    }

    async fn get_work_request(&self, id: &str) -> Result<WorkRequest, ProviderError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, FakeCall::GetWorkRequest)?;

        let wr = inner
            .work_requests
            .get_mut(id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        if let Some(next) = wr.script.pop_front() {
            wr.status = next;
        }
        let percent_complete = match wr.status {
            WorkRequestStatus::Succeeded => 100.0,
            WorkRequestStatus::InProgress => 50.0,
            _ => 0.0,
        };
        Ok(WorkRequest {
            id: id.to_string(),
            status: wr.status,
            percent_complete,
            resources: vec![wr.resource.clone()],
        })
    }
}

fn states<I, S>(script: I) -> Vec<LifecycleState>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    script.into_iter().map(LifecycleState::new).collect()
}

fn status_code_name(status: u16) -> &'static str {
    match status {
        400 => "InvalidParameter",
        404 => "NotAuthorizedOrNotFound",
        409 => "Conflict",
        429 => "TooManyRequests",
        501 => "MethodNotImplemented",
        503 => "ServiceUnavailable",
        _ => "InternalServerError",
    }
}

/// A test harness for provider implementations.
///
/// This wraps a [`ProviderService`] implementation and provides simplified
/// methods for testing without a plugin host.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource; `Null` when it is gone.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Read data from a data source.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: plan → create → read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self.create(resource_type, plan_result.planned_state).await?;
        self.read(resource_type, created_state).await
    }

    /// Run a full update lifecycle: plan → update → read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Run a full delete lifecycle: plan → delete → read.
    ///
    /// Fails unless the final read reports the resource as gone.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state.clone()).await?;

        let after = self.read(resource_type, current_state).await?;
        if after.is_null() {
            Ok(())
        } else {
            Err(ProviderError::UnexpectedState {
                resource: resource_type.to_string(),
                state: after["state"].as_str().unwrap_or("UNKNOWN").to_string(),
                expected: "resource to be gone".to_string(),
            })
        }
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;
        let updated_state = self
            .lifecycle_update(resource_type, created_state, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated_state.clone()).await?;
        Ok(updated_state)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(|d| d.is_error()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates a resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes the given attribute.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a state reports the given lifecycle state.
///
/// # Panics
///
/// Panics if `state["state"]` differs.
pub fn assert_lifecycle_state(state: &Value, expected: &str) {
    assert_eq!(
        state.get("state").and_then(Value::as_str),
        Some(expected),
        "Expected lifecycle state {} in {}",
        expected,
        state
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
