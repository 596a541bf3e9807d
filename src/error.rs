//! Error types for the OCI provider.
//!
//! Every failure surfaced by the driver is classified into one of these
//! kinds. The retry policy only ever retries [`ProviderError::RemoteService`]
//! errors whose status signals throttling or a server fault.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while converging a resource.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote service answered with an error status.
    #[error("Service error {status} ({code}): {message}")]
    RemoteService {
        /// HTTP status code returned by the service.
        status: u16,
        /// Service-specific error code (e.g. `TooManyRequests`).
        code: String,
        /// Human-readable message from the service.
        message: String,
        /// The `opc-request-id` of the failing call, if known.
        opc_request_id: Option<String>,
    },

    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A lifecycle poll passed its deadline without reaching a target state.
    #[error("Timed out after {elapsed:?} waiting for {resource} (last state: {last_state})")]
    Timeout {
        /// The resource or work request being polled.
        resource: String,
        /// The last observed lifecycle state.
        last_state: String,
        /// How long the poll ran.
        elapsed: Duration,
    },

    /// The request was malformed or the configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The resource reached a state outside the expected transition.
    #[error("Unexpected lifecycle state {state} for {resource}, expected one of [{expected}]")]
    UnexpectedState {
        /// The resource being polled.
        resource: String,
        /// The observed state.
        state: String,
        /// Comma-separated list of acceptable states.
        expected: String,
    },

    /// An asynchronous work request finished unsuccessfully.
    #[error("Work request {id} finished with status {status}")]
    WorkRequestFailed {
        /// The work request identifier.
        id: String,
        /// Final status (`FAILED` or `CANCELED`).
        status: String,
    },

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not implemented by the remote client.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Build an error from a raw service response status.
    ///
    /// 404 maps to [`ProviderError::NotFound`], 400 and 422 to
    /// [`ProviderError::Validation`]; everything else stays a
    /// [`ProviderError::RemoteService`] error.
    ///
    /// # Examples
    ///
    /// ```
    /// use hemmer_provider_oci::ProviderError;
    ///
    /// let err = ProviderError::from_status(404, "NotAuthorizedOrNotFound", "gone");
    /// assert!(err.is_not_found());
    ///
    /// let err = ProviderError::from_status(503, "ServiceUnavailable", "busy");
    /// assert!(err.is_retryable());
    /// ```
    pub fn from_status(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            400 | 422 => Self::Validation(format!("{}: {}", code, message)),
            _ => Self::RemoteService {
                status,
                code,
                message,
                opc_request_id: None,
            },
        }
    }

    /// Attach an `opc-request-id` to a remote service error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_request_id(self, request_id: impl Into<String>) -> Self {
        match self {
            Self::RemoteService {
                status,
                code,
                message,
                ..
            } => Self::RemoteService {
                status,
                code,
                message,
                opc_request_id: Some(request_id.into()),
            },
            other => other,
        }
    }

    /// The HTTP-like status code for this error, when one applies.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteService { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Validation(_) => Some(400),
            _ => None,
        }
    }

    /// Whether the error signals throttling or a transient server fault.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteService { status, .. } => {
                *status == 429 || (*status >= 500 && *status != 501)
            },
            _ => false,
        }
    }

    /// Whether the error means the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::RemoteService { message, .. } => message,
            Self::NotFound(msg) => msg,
            Self::Timeout { resource, .. } => resource,
            Self::Validation(msg) => msg,
            Self::UnexpectedState { state, .. } => state,
            Self::WorkRequestFailed { status, .. } => status,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Unimplemented(msg) => msg,
        }
    }
}
