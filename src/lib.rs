//! Hemmer Provider for Oracle Cloud Infrastructure
//!
//! This crate drives OCI resources through their asynchronous lifecycles.
//! Every create, update and delete submits a request and then converges:
//! it polls the resource, or the work request tracking it, until the
//! reported lifecycle state reaches a target, fails, or a deadline passes.
//!
//! # Overview
//!
//! - **Retry policy** ([`RetryPolicy`]): bounded exponential backoff with
//!   jitter around every remote call, retrying throttling and server errors
//! - **Lifecycle poller** ([`LifecyclePoller`]): waits for a lifecycle state
//!   in a target set, with pending and failure sets and a timeout
//! - **CRUD driver** ([`CrudDriver`]): create, read, update, delete and
//!   import of one resource instance on top of a [`ResourceClient`]
//! - **Work requests**: long-running operations that report progress
//!   through a separate work request resource
//! - **Data sources**: paginated list calls with `filter` blocks
//! - **Provider** ([`OciProvider`]): the [`ProviderService`] operations,
//!   dispatched through a [`Catalog`] of resource and data source types
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hemmer_provider_oci::services::file_storage;
//! use hemmer_provider_oci::testing::FakeCloud;
//! use hemmer_provider_oci::{CrudDriver, PollInterval};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let cloud = Arc::new(FakeCloud::new().with_create_states(["CREATING", "ACTIVE"]));
//! let mut driver = CrudDriver::new(Arc::new(file_storage::snapshot()), cloud)
//!     .with_poll_interval(PollInterval::Fixed(Duration::ZERO));
//!
//! let snapshot = driver
//!     .create(&json!({"file_system_id": "ocid1.filesystem.oc1..fs", "name": "nightly"}))
//!     .await
//!     .unwrap();
//! assert!(snapshot.id().is_some());
//! assert_eq!(snapshot.state.unwrap().as_str(), "ACTIVE");
//! # });
//! ```
//!
//! # Logging
//!
//! Operations emit `tracing` events; see [`logging`] for the subscriber
//! setup and the `RUST_LOG` directives.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod client;
pub mod config;
pub mod data_source;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod plan;
pub mod poller;
pub mod provider;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod services;
pub mod testing;
pub mod types;
pub mod validation;
pub mod work_request;

// Re-export main types at crate root
pub use catalog::Catalog;
pub use client::{ListPage, ListRequest, ResourceClient, Submission};
pub use config::ProviderConfig;
pub use data_source::{DataSourceDefinition, Filter};
pub use driver::{CrudDriver, DriverState};
pub use error::ProviderError;
pub use lifecycle::{LifecycleState, LifecycleTargets, StateSet};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use poller::{LifecyclePoller, Observation, PollInterval, PollMode};
pub use provider::{OciProvider, ProviderService};
pub use resource::{Operation, ResourceDefinition, Timeouts};
pub use retry::RetryPolicy;
pub use schema::ProviderSchema;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, RemoteResource,
    ResourceDescriptor, ResourceId,
};
pub use validation::{is_valid, validate, validate_result};
pub use work_request::{wait_for_work_request, WorkRequest, WorkRequestStatus};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
