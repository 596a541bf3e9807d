//! The remote API seam.
//!
//! A [`ResourceClient`] is the only thing the driver knows about the remote
//! service. An SDK-backed implementation translates these calls into HTTP
//! requests; tests use [`crate::testing::FakeCloud`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::types::{RemoteResource, ResourceId};
use crate::work_request::WorkRequest;

/// What a mutating call handed back.
///
/// Synchronous APIs return the resource right away; asynchronous ones only
/// return a work request handle. Some return both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// The resource as returned by the call, if any.
    pub resource: Option<RemoteResource>,
    /// The work request tracking the operation, if any.
    pub work_request_id: Option<String>,
}

impl Submission {
    /// A synchronous response carrying the resource.
    pub fn resource(resource: RemoteResource) -> Self {
        Self {
            resource: Some(resource),
            work_request_id: None,
        }
    }

    /// An asynchronous response carrying only a work request id.
    pub fn work_request(id: impl Into<String>) -> Self {
        Self {
            resource: None,
            work_request_id: Some(id.into()),
        }
    }

    /// A response with no body (typical for delete).
    pub fn accepted() -> Self {
        Self::default()
    }

    /// Attach a work request id to a response.
    pub fn with_work_request(mut self, id: impl Into<String>) -> Self {
        self.work_request_id = Some(id.into());
        self
    }
}

/// Parameters of one List call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Request attributes (e.g. `compartment_id`, `file_system_id`, `state`).
    pub parameters: Map<String, Value>,
    /// Page token from the previous response.
    pub page: Option<String>,
    /// Maximum number of items per page.
    pub limit: Option<u32>,
}

impl ListRequest {
    /// A first-page request.
    pub fn new(parameters: Map<String, Value>) -> Self {
        Self {
            parameters,
            page: None,
            limit: None,
        }
    }

    /// The same request for another page.
    pub fn for_page(&self, page: Option<String>) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }
}

/// One page of a List response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    /// Items on this page.
    pub items: Vec<RemoteResource>,
    /// Token for the next page (`opc-next-page`), if more remain.
    pub next_page: Option<String>,
}

/// Remote operations for one resource type.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Create the resource from its configured attributes.
    async fn create(&self, attributes: &Map<String, Value>) -> Result<Submission, ProviderError>;

    /// Fetch the current state of a resource.
    async fn get(&self, id: &ResourceId) -> Result<RemoteResource, ProviderError>;

    /// Apply changed attributes to an existing resource.
    async fn update(
        &self,
        id: &ResourceId,
        changes: &Map<String, Value>,
    ) -> Result<Submission, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, id: &ResourceId) -> Result<Submission, ProviderError>;

    /// List resources matching the request parameters.
    async fn list(&self, request: &ListRequest) -> Result<ListPage, ProviderError> {
        let _ = request;
        Err(ProviderError::Unimplemented("list".to_string()))
    }

    /// Fetch the status of a work request.
    async fn get_work_request(&self, id: &str) -> Result<WorkRequest, ProviderError> {
        Err(ProviderError::Unimplemented(format!("get_work_request({})", id)))
    }
}
