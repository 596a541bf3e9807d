//! The CRUD driver.
//!
//! One [`CrudDriver`] manages one resource instance through an explicit state
//! machine:
//!
//! ```text
//! NotCreated -> Creating -> Polling(Create) -> Created
//! Created    -> Updating -> Polling(Update) -> Created
//! Created    -> Deleting -> Polling(Delete) -> Deleted
//! ```
//!
//! Every remote call runs under the driver's [`RetryPolicy`]. Mutations that
//! return a work request wait for it before the resource itself is polled.
//! The driver never reports success while the remote state is non-terminal.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::{ResourceClient, Submission};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::plan::{changed_values, diff_attributes, merge};
use crate::poller::{LifecyclePoller, Observation, PollInterval, PollMode};
use crate::resource::{Operation, ResourceDefinition};
use crate::retry::RetryPolicy;
use crate::types::{ResourceDescriptor, ResourceId};
use crate::validation::ensure_valid;
use crate::work_request::wait_for_work_request;

/// Where a resource instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No remote resource exists yet.
    NotCreated,
    /// The Create call is in flight.
    Creating,
    /// The Update call is in flight.
    Updating,
    /// The Delete call is in flight.
    Deleting,
    /// Waiting for the remote lifecycle to settle.
    Polling(Operation),
    /// The remote resource exists and is settled.
    Created,
    /// The remote resource is gone.
    Deleted,
    /// An operation failed; the descriptor keeps whatever the remote committed.
    Failed(Operation),
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCreated => f.write_str("not_created"),
            Self::Creating => f.write_str("creating"),
            Self::Updating => f.write_str("updating"),
            Self::Deleting => f.write_str("deleting"),
            Self::Polling(op) => write!(f, "polling({})", op),
            Self::Created => f.write_str("created"),
            Self::Deleted => f.write_str("deleted"),
            Self::Failed(op) => write!(f, "failed({})", op),
        }
    }
}

/// Drives one resource instance of a [`ResourceDefinition`].
pub struct CrudDriver {
    definition: Arc<ResourceDefinition>,
    client: Arc<dyn ResourceClient>,
    policy: RetryPolicy,
    work_request_policy: RetryPolicy,
    poll_interval: PollInterval,
    state: DriverState,
    descriptor: ResourceDescriptor,
}

impl CrudDriver {
    /// A driver with the service's default retry policies.
    pub fn new(definition: Arc<ResourceDefinition>, client: Arc<dyn ResourceClient>) -> Self {
        let policy = RetryPolicy::for_service(&definition.service, false);
        let work_request_policy = RetryPolicy::for_service(&definition.service, true);
        let poll_interval = definition.poll_interval;
        Self {
            definition,
            client,
            policy,
            work_request_policy,
            poll_interval,
            state: DriverState::NotCreated,
            descriptor: ResourceDescriptor::default(),
        }
    }

    /// A driver whose retry and poll settings come from provider configuration.
    pub fn from_config(
        definition: Arc<ResourceDefinition>,
        client: Arc<dyn ResourceClient>,
        config: &ProviderConfig,
    ) -> Self {
        let policy = config.retry_policy(&definition.service, false);
        let work_request_policy = config.retry_policy(&definition.service, true);
        let mut driver = Self::new(definition, client)
            .with_retry_policy(policy)
            .with_work_request_policy(work_request_policy);
        if let Some(interval) = config.poll_interval() {
            driver.poll_interval = interval;
        }
        driver
    }

    /// Retry policy for resource calls.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retry policy for work request polling.
    pub fn with_work_request_policy(mut self, policy: RetryPolicy) -> Self {
        self.work_request_policy = policy;
        self
    }

    /// Interval between lifecycle polls.
    pub fn with_poll_interval(mut self, interval: PollInterval) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Current state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The local view of the resource.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// The resource definition.
    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    /// Create the resource and wait for it to become available.
    ///
    /// The configuration is validated first; an invalid configuration fails
    /// with [`ProviderError::Validation`] without any remote call.
    #[instrument(skip_all, name = "driver.create", fields(resource_type = %self.definition.type_name))]
    pub async fn create(&mut self, planned: &Value) -> Result<ResourceDescriptor, ProviderError> {
        if self.state != DriverState::NotCreated {
            return Err(ProviderError::Validation(format!(
                "cannot create {}: instance is {}",
                self.definition.type_name, self.state
            )));
        }
        ensure_valid(&self.definition.type_name, &self.definition.schema, planned)?;

        let mut descriptor = ResourceDescriptor::from_value(planned)?;
        descriptor.state = None;
        let request = self.definition.request_attributes(&descriptor.attributes);
        self.descriptor = ResourceDescriptor::planned(descriptor.attributes);

        self.enter(DriverState::Creating);
        let result = self.run_create(&request).await;
        self.settle(Operation::Create, result)
    }

    async fn run_create(&mut self, request: &Map<String, Value>) -> Result<ResourceDescriptor, ProviderError> {
        let submission = self
            .call("Create", || self.client.create(request))
            .await?;

        if let Some(remote) = &submission.resource {
            self.descriptor.assign_id(remote.id.clone())?;
        }
        if let Some(affected) = self.await_work_request(&submission, Operation::Create).await? {
            self.descriptor.assign_id(affected)?;
        }
        let id = match self.descriptor.id() {
            Some(id) => id.clone(),
            None => {
                return Err(ProviderError::Validation(format!(
                    "create of {} returned no identifier",
                    self.definition.type_name
                )))
            },
        };
        info!(id = %id, "Resource created, waiting for it to become available");

        self.enter(DriverState::Polling(Operation::Create));
        let observation = self.poll(&id, Operation::Create).await?;
        self.absorb(&observation)?;
        Ok(self.descriptor.clone())
    }

    /// Refresh the resource.
    ///
    /// Returns `None` when the resource no longer exists, either because the
    /// service answers 404 or because it reports a deleted state.
    #[instrument(skip_all, name = "driver.read", fields(resource_type = %self.definition.type_name))]
    pub async fn read(&mut self, current: &Value) -> Result<Option<ResourceDescriptor>, ProviderError> {
        let id = self.load(current)?;

        let result = self.call("Get", || self.client.get(&id)).await;
        match result {
            Ok(remote) if self.definition.is_gone(&remote.state) => {
                info!(id = %id, state = %remote.state, "Resource is deleted");
                self.enter(DriverState::Deleted);
                Ok(None)
            },
            Ok(remote) => {
                self.descriptor.absorb(&remote)?;
                Ok(Some(self.descriptor.clone()))
            },
            Err(e) if e.is_not_found() => {
                info!(id = %id, "Resource no longer exists");
                self.enter(DriverState::Deleted);
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Bring the resource to the planned attributes.
    ///
    /// Makes no remote call when nothing changed. A change to a force-new
    /// attribute fails: it has to be planned as a replacement.
    #[instrument(skip_all, name = "driver.update", fields(resource_type = %self.definition.type_name))]
    pub async fn update(&mut self, prior: &Value, planned: &Value) -> Result<ResourceDescriptor, ProviderError> {
        ensure_valid(&self.definition.type_name, &self.definition.schema, planned)?;
        let id = self.load(prior)?;

        let proposed = ResourceDescriptor::from_value(planned)?;
        if let Some(planned_id) = proposed.id() {
            self.descriptor.assign_id(planned_id.clone())?;
        }

        let schema = &self.definition.schema;
        let target = merge(schema, &self.descriptor.attributes, &proposed.attributes);
        let changes = diff_attributes(schema, &self.descriptor.attributes, &target);

        if changes.is_empty() {
            debug!(id = %id, "No changes to apply");
            return Ok(self.descriptor.clone());
        }
        if let Some(change) = changes.iter().find(|c| schema.is_force_new(&c.path)) {
            return Err(ProviderError::Validation(format!(
                "changing '{}' of {} requires replacement",
                change.path, self.definition.type_name
            )));
        }

        let body = changed_values(&changes);
        debug!(id = %id, changed = ?body.keys().collect::<Vec<_>>(), "Applying changes");

        self.enter(DriverState::Updating);
        let result = self.run_update(&id, &body, target).await;
        self.settle(Operation::Update, result)
    }

    async fn run_update(
        &mut self,
        id: &ResourceId,
        body: &Map<String, Value>,
        target: Map<String, Value>,
    ) -> Result<ResourceDescriptor, ProviderError> {
        let submission = self
            .call("Update", || self.client.update(id, body))
            .await?;
        self.descriptor.attributes = target;
        self.await_work_request(&submission, Operation::Update).await?;

        self.enter(DriverState::Polling(Operation::Update));
        let observation = self.poll(id, Operation::Update).await?;
        self.absorb(&observation)?;
        Ok(self.descriptor.clone())
    }

    /// Delete the resource and wait until it is gone.
    ///
    /// A resource that is already gone, or was never created, counts as
    /// deleted.
    #[instrument(skip_all, name = "driver.delete", fields(resource_type = %self.definition.type_name))]
    pub async fn delete(&mut self, current: &Value) -> Result<(), ProviderError> {
        self.descriptor = ResourceDescriptor::from_value(current)?;
        let id = match self.descriptor.id() {
            Some(id) => id.clone(),
            None => {
                debug!("No identifier in state, nothing to delete");
                self.enter(DriverState::Deleted);
                return Ok(());
            },
        };
        self.state = DriverState::Created;

        self.enter(DriverState::Deleting);
        let result = self.run_delete(&id).await;
        self.settle(Operation::Delete, result)
    }

    async fn run_delete(&mut self, id: &ResourceId) -> Result<(), ProviderError> {
        let result = self.call("Delete", || self.client.delete(id)).await;
        let submission = match result {
            Ok(submission) => submission,
            Err(e) if e.is_not_found() => {
                info!(id = %id, "Resource already deleted");
                return Ok(());
            },
            Err(e) => return Err(e),
        };
        self.await_work_request(&submission, Operation::Delete).await?;

        self.enter(DriverState::Polling(Operation::Delete));
        let observation = self.poll(id, Operation::Delete).await?;
        self.descriptor.state = observation.state().cloned();
        Ok(())
    }

    /// Adopt an existing resource by identifier.
    #[instrument(skip_all, name = "driver.import", fields(resource_type = %self.definition.type_name))]
    pub async fn import(&mut self, id: &str) -> Result<ResourceDescriptor, ProviderError> {
        let id = ResourceId::new(id)?;
        let remote = self.call("Get", || self.client.get(&id)).await?;
        if self.definition.is_gone(&remote.state) {
            return Err(ProviderError::NotFound(format!(
                "{} {} is {}",
                self.definition.type_name, id, remote.state
            )));
        }

        self.descriptor = ResourceDescriptor::default();
        self.descriptor.absorb(&remote)?;
        self.enter(DriverState::Created);
        info!(id = %id, "Resource imported");
        Ok(self.descriptor.clone())
    }

    fn enter(&mut self, next: DriverState) {
        debug!(from = %self.state, to = %next, "Driver transition");
        self.state = next;
    }

    fn settle<T>(&mut self, operation: Operation, result: Result<T, ProviderError>) -> Result<T, ProviderError> {
        match &result {
            Ok(_) => {
                let done = match operation {
                    Operation::Delete => DriverState::Deleted,
                    _ => DriverState::Created,
                };
                self.enter(done);
                info!(operation = %operation, id = ?self.descriptor.id().map(|i| i.to_string()), "Operation complete");
            },
            Err(e) => {
                warn!(
                    operation = %operation,
                    id = ?self.descriptor.id().map(|i| i.to_string()),
                    error = %e,
                    "Operation failed"
                );
                self.enter(DriverState::Failed(operation));
            },
        }
        result
    }

    /// Load a descriptor from state and require its identifier.
    fn load(&mut self, current: &Value) -> Result<ResourceId, ProviderError> {
        self.descriptor = ResourceDescriptor::from_value(current)?;
        let id = self.descriptor.require_id()?.clone();
        self.state = DriverState::Created;
        Ok(id)
    }

    fn absorb(&mut self, observation: &Observation) -> Result<(), ProviderError> {
        if let Some(remote) = observation.resource() {
            self.descriptor.absorb(remote)?;
        }
        Ok(())
    }

    async fn call<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.policy.execute(operation, f).await
    }

    async fn await_work_request(
        &self,
        submission: &Submission,
        operation: Operation,
    ) -> Result<Option<ResourceId>, ProviderError> {
        let (Some(work_request_id), Some(entity_type)) = (
            submission.work_request_id.as_deref(),
            self.definition.work_request_entity.as_deref(),
        ) else {
            return Ok(None);
        };

        wait_for_work_request(
            self.client.as_ref(),
            work_request_id,
            entity_type,
            &self.work_request_policy,
            self.definition.timeouts.get(operation),
            self.poll_interval,
        )
        .await
    }

    async fn poll(&self, id: &ResourceId, operation: Operation) -> Result<Observation, ProviderError> {
        let client = self.client.as_ref();
        let policy = &self.policy;
        let fetch = move || async move { policy.execute("Get", move || client.get(id)).await };

        let mode = match operation {
            Operation::Delete => PollMode::Delete,
            _ => PollMode::Converge,
        };

        LifecyclePoller::new(
            id.as_str(),
            fetch,
            self.definition.targets(operation).clone(),
            self.definition.timeouts.get(operation),
        )
        .with_mode(mode)
        .with_interval(self.poll_interval)
        .wait()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleTargets;
    use crate::resource::Timeouts;
    use crate::schema::{Attribute, Schema};
    use crate::testing::{FakeCall, FakeCloud};
    use crate::types::RemoteResource;
    use serde_json::json;
    use std::time::Duration;

    fn definition() -> ResourceDefinition {
        ResourceDefinition::new(
            "oci_file_storage_snapshot",
            "file_storage",
            Schema::v0()
                .with_attribute("file_system_id", Attribute::required_string().with_force_new())
                .with_attribute("name", Attribute::required_string().with_force_new())
                .with_attribute("freeform_tags", Attribute::tags())
                .with_attribute("time_created", Attribute::computed_string()),
        )
        .with_delete_targets(LifecycleTargets::new(["DELETING"], ["DELETED"]))
    }

    fn driver_for(definition: ResourceDefinition, cloud: &Arc<FakeCloud>) -> CrudDriver {
        CrudDriver::new(Arc::new(definition), cloud.clone())
            .with_retry_policy(
                RetryPolicy::for_service("file_storage", false)
                    .with_delays(Duration::from_millis(10), Duration::from_millis(100))
                    .with_jitter(false),
            )
            .with_poll_interval(PollInterval::Fixed(Duration::from_secs(1)))
    }

    fn snapshot_config() -> Value {
        json!({"file_system_id": "ocid1.fs", "name": "nightly"})
    }

    async fn created(cloud: &Arc<FakeCloud>) -> Value {
        let mut driver = driver_for(definition(), cloud);
        driver.create(&snapshot_config()).await.unwrap().to_value()
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_polls_until_available() {
        let cloud = Arc::new(FakeCloud::new().with_create_states(["CREATING", "CREATING", "AVAILABLE"]));
        let mut driver = driver_for(definition(), &cloud);

        let descriptor = driver.create(&snapshot_config()).await.unwrap();

        assert_eq!(driver.state(), DriverState::Created);
        assert_eq!(descriptor.state.as_ref().unwrap().as_str(), "AVAILABLE");
        assert_eq!(descriptor.attributes["name"], "nightly");
        assert!(descriptor.id().is_some());
        assert_eq!(cloud.calls(FakeCall::Create), 1);
        assert_eq!(cloud.calls(FakeCall::Get), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_already_available_fetches_once() {
        let cloud = Arc::new(FakeCloud::new().with_create_states(["AVAILABLE"]));
        let mut driver = driver_for(definition(), &cloud);

        driver.create(&snapshot_config()).await.unwrap();
        assert_eq!(cloud.calls(FakeCall::Get), 1);
    }

    #[tokio::test]
    async fn test_create_invalid_config_makes_no_call() {
        let cloud = Arc::new(FakeCloud::new());
        let mut driver = driver_for(definition(), &cloud);

        let err = driver.create(&json!({"name": "nightly"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(cloud.calls(FakeCall::Create), 0);
        assert_eq!(driver.state(), DriverState::NotCreated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_retries_exactly_max_attempts() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.fail(FakeCall::Create, 503, u32::MAX);
        let mut driver = driver_for(definition(), &cloud);
        driver.policy = driver.policy.clone().with_max_attempts(3);

        let err = driver.create(&snapshot_config()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(cloud.calls(FakeCall::Create), 3);
        assert_eq!(driver.state(), DriverState::Failed(Operation::Create));
        assert!(driver.descriptor().id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_recovers_from_throttling() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.fail(FakeCall::Create, 429, 2);
        let mut driver = driver_for(definition(), &cloud);

        driver.create(&snapshot_config()).await.unwrap();
        assert_eq!(cloud.calls(FakeCall::Create), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out() {
        let cloud = Arc::new(FakeCloud::new().with_create_states(["PROVISIONING"]));
        let def = definition().with_timeouts(Timeouts::uniform(Duration::from_secs(10)));
        let mut driver = driver_for(def, &cloud);

        let err = driver.create(&snapshot_config()).await.unwrap_err();
        match err {
            ProviderError::Timeout { last_state, .. } => assert_eq!(last_state, "PROVISIONING"),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(driver.state(), DriverState::Failed(Operation::Create));
        // The committed identifier survives the failure.
        assert!(driver.descriptor().id().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out_while_get_is_retried() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.fail(FakeCall::Get, 503, u32::MAX);
        let def = definition().with_timeouts(Timeouts::uniform(Duration::from_secs(5)));
        let mut driver = CrudDriver::new(Arc::new(def), cloud.clone())
            .with_retry_policy(RetryPolicy::for_service("file_storage", false).with_jitter(false));

        let started = tokio::time::Instant::now();
        let err = driver.create(&snapshot_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }), "got {:?}", err);
        assert!(tokio::time::Instant::now() - started < Duration::from_secs(6));
        assert!(cloud.calls(FakeCall::Get) < crate::retry::DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failed_state() {
        let cloud = Arc::new(FakeCloud::new().with_create_states(["PROVISIONING", "FAILED"]));
        let mut driver = driver_for(definition(), &cloud);

        let err = driver.create(&snapshot_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedState { ref state, .. } if state == "FAILED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_twice_rejected() {
        let cloud = Arc::new(FakeCloud::new());
        let mut driver = driver_for(definition(), &cloud);
        driver.create(&snapshot_config()).await.unwrap();

        assert!(driver.create(&snapshot_config()).await.is_err());
        assert_eq!(cloud.calls(FakeCall::Create), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_through_work_request() {
        let cloud = Arc::new(FakeCloud::new().with_work_requests("snapshot"));
        let def = definition().with_work_requests("snapshot");
        let mut driver = driver_for(def, &cloud);
        driver.work_request_policy = driver.work_request_policy.clone().with_jitter(false);

        let descriptor = driver.create(&snapshot_config()).await.unwrap();
        assert!(descriptor.id().unwrap().as_str().starts_with("ocid1.fake.resource"));
        assert_eq!(cloud.calls(FakeCall::GetWorkRequest), 2);
        assert_eq!(descriptor.state.unwrap().as_str(), "AVAILABLE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_work_request() {
        use crate::work_request::WorkRequestStatus;

        let cloud = Arc::new(
            FakeCloud::new()
                .with_work_requests("snapshot")
                .with_work_request_states(vec![WorkRequestStatus::InProgress, WorkRequestStatus::Failed]),
        );
        let mut driver = driver_for(definition().with_work_requests("snapshot"), &cloud);

        let err = driver.create(&snapshot_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::WorkRequestFailed { ref status, .. } if status == "FAILED"));
        assert_eq!(cloud.calls(FakeCall::Get), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_refreshes_and_detects_deletion() {
        let cloud = Arc::new(FakeCloud::new());
        let state = created(&cloud).await;
        let id = state["id"].as_str().unwrap().to_string();

        let mut driver = driver_for(definition(), &cloud);
        let refreshed = driver.read(&state).await.unwrap().unwrap();
        assert_eq!(refreshed.to_value(), state);

        cloud.script(&id, ["DELETED"]);
        assert!(driver.read(&state).await.unwrap().is_none());
        assert_eq!(driver.state(), DriverState::Deleted);
    }

    #[tokio::test]
    async fn test_read_missing_resource() {
        let cloud = Arc::new(FakeCloud::new());
        let mut driver = driver_for(definition(), &cloud);

        let gone = driver
            .read(&json!({"id": "ocid1.gone", "name": "x"}))
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_applies_changes() {
        let cloud = Arc::new(FakeCloud::new());
        let prior = created(&cloud).await;
        let id = prior["id"].as_str().unwrap().to_string();

        let mut planned = prior.clone();
        planned["freeform_tags"] = json!({"Department": "Finance"});

        let mut driver = driver_for(definition(), &cloud);
        let updated = driver.update(&prior, &planned).await.unwrap();

        assert_eq!(updated.attributes["freeform_tags"], json!({"Department": "Finance"}));
        assert_eq!(updated.state.unwrap().as_str(), "AVAILABLE");
        assert_eq!(cloud.calls(FakeCall::Update), 1);
        assert_eq!(
            cloud.attributes_of(&id).unwrap()["freeform_tags"],
            json!({"Department": "Finance"})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_without_changes_makes_no_call() {
        let cloud = Arc::new(FakeCloud::new());
        let prior = created(&cloud).await;
        let mut driver = driver_for(definition(), &cloud);

        let result = driver.update(&prior, &snapshot_config()).await.unwrap();
        assert_eq!(result.to_value(), prior);
        assert_eq!(cloud.calls(FakeCall::Update), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_force_new_rejected() {
        let cloud = Arc::new(FakeCloud::new());
        let prior = created(&cloud).await;
        let mut driver = driver_for(definition(), &cloud);

        let err = driver
            .update(&prior, &json!({"file_system_id": "ocid1.fs", "name": "renamed"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(ref m) if m.contains("name")));
        assert_eq!(cloud.calls(FakeCall::Update), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_rejects_identifier_change() {
        let cloud = Arc::new(FakeCloud::new());
        let prior = created(&cloud).await;
        let mut planned = prior.clone();
        planned["id"] = json!("ocid1.other");

        let mut driver = driver_for(definition(), &cloud);
        assert!(driver.update(&prior, &planned).await.is_err());
        assert_eq!(cloud.calls(FakeCall::Update), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_converges_to_deleted() {
        let cloud = Arc::new(FakeCloud::new().with_delete_states(["DELETING", "DELETING", "DELETED"]));
        let state = created(&cloud).await;
        let id = ResourceId::new(state["id"].as_str().unwrap()).unwrap();

        let mut driver = driver_for(definition(), &cloud);
        driver.delete(&state).await.unwrap();
        assert_eq!(driver.state(), DriverState::Deleted);

        let after = cloud.get(&id).await;
        assert!(after.map(|r| r.state.as_str() == "DELETED").unwrap_or_else(|e| e.is_not_found()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_already_deleted_is_benign() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.insert(RemoteResource::new(ResourceId::new("ocid1.snap").unwrap(), "DELETED"));
        let mut driver = driver_for(definition(), &cloud);

        driver.delete(&json!({"id": "ocid1.snap"})).await.unwrap();
        driver.delete(&json!({"id": "ocid1.never-existed"})).await.unwrap();

        assert_eq!(cloud.calls(FakeCall::Delete), 2);
        assert_eq!(cloud.calls(FakeCall::Get), 0);
        assert_eq!(driver.state(), DriverState::Deleted);
    }

    #[tokio::test]
    async fn test_delete_without_identifier() {
        let cloud = Arc::new(FakeCloud::new());
        let mut driver = driver_for(definition(), &cloud);

        driver.delete(&json!({"name": "never created"})).await.unwrap();
        assert_eq!(cloud.calls(FakeCall::Delete), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_times_out() {
        let cloud = Arc::new(FakeCloud::new().with_delete_states(["DELETING"]));
        let state = created(&cloud).await;
        let def = definition().with_timeouts(Timeouts::uniform(Duration::from_secs(5)));
        let mut driver = driver_for(def, &cloud);

        let err = driver.delete(&state).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
        assert_eq!(driver.state(), DriverState::Failed(Operation::Delete));
    }

    #[tokio::test(start_paused = true)]
    async fn test_import() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.insert(
            RemoteResource::new(ResourceId::new("ocid1.snap").unwrap(), "AVAILABLE")
                .with_attribute("name", json!("imported")),
        );
        let mut driver = driver_for(definition(), &cloud);

        let descriptor = driver.import("ocid1.snap").await.unwrap();
        assert_eq!(descriptor.attributes["name"], "imported");
        assert_eq!(driver.state(), DriverState::Created);

        let mut other = driver_for(definition(), &cloud);
        assert!(other.import("ocid1.missing").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(DriverState::Polling(Operation::Delete).to_string(), "polling(delete)");
        assert_eq!(DriverState::NotCreated.to_string(), "not_created");
    }
}
