//! Provider configuration.
//!
//! The `configure` call hands the provider a JSON object. It is deserialized
//! into a [`ProviderConfig`], completed from the environment, and validated.
//! Retry and polling behaviour for every driver derives from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::poller::PollInterval;
use crate::retry::RetryPolicy;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Environment variable consulted when `region` is not configured.
pub const REGION_ENV: &str = "OCI_REGION";

/// Environment variable consulted when `tenancy_ocid` is not configured.
pub const TENANCY_ENV: &str = "OCI_TENANCY_OCID";

/// Upper bound for the attempt count derived from `retry_duration_seconds`.
const MAX_DERIVED_ATTEMPTS: u32 = 100;

/// Settings from the provider block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Region identifier, e.g. `us-phoenix-1`.
    pub region: Option<String>,
    /// Tenancy OCID.
    pub tenancy_ocid: Option<String>,
    /// User OCID for API key authentication.
    pub user_ocid: Option<String>,
    /// API key fingerprint.
    pub fingerprint: Option<String>,
    /// Path to the API signing key.
    pub private_key_path: Option<String>,
    /// Profile in `~/.oci/config`.
    pub config_file_profile: Option<String>,
    /// Minimum time to keep retrying throttled or failing calls.
    pub retry_duration_seconds: Option<u64>,
    /// Make every remote call exactly once.
    pub disable_auto_retries: bool,
    /// Explicit attempt bound; overrides `retry_duration_seconds`.
    pub max_retry_attempts: Option<u32>,
    /// Fixed interval between lifecycle polls.
    pub poll_interval_seconds: Option<u64>,
}

impl ProviderConfig {
    /// Parse the provider block. `null` yields the defaults.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider configuration: {}", e)))
    }

    /// Fill unset fields from the process environment.
    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from an arbitrary lookup.
    pub fn with_fallbacks<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.region.is_none() {
            self.region = lookup(REGION_ENV).filter(|v| !v.is_empty());
        }
        if self.tenancy_ocid.is_none() {
            self.tenancy_ocid = lookup(TENANCY_ENV).filter(|v| !v.is_empty());
        }
        self
    }

    /// Check the configuration; returns errors and warnings.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if self.region.as_deref().map(str::is_empty).unwrap_or(true) {
            diagnostics.push(
                Diagnostic::error("Missing region")
                    .with_detail(format!("Set `region` or the {} environment variable", REGION_ENV))
                    .with_attribute("region"),
            );
        }
        if self.max_retry_attempts == Some(0) {
            diagnostics.push(
                Diagnostic::error("max_retry_attempts must be at least 1")
                    .with_attribute("max_retry_attempts"),
            );
        }
        if self.retry_duration_seconds == Some(0) {
            diagnostics.push(
                Diagnostic::error("retry_duration_seconds must be at least 1")
                    .with_attribute("retry_duration_seconds"),
            );
        }
        if self.poll_interval_seconds == Some(0) {
            diagnostics.push(
                Diagnostic::error("poll_interval_seconds must be at least 1")
                    .with_attribute("poll_interval_seconds"),
            );
        }
        if self.disable_auto_retries
            && (self.max_retry_attempts.is_some() || self.retry_duration_seconds.is_some())
        {
            diagnostics.push(
                Diagnostic::warning("Retry settings are ignored")
                    .with_detail("disable_auto_retries is set"),
            );
        }
        if self.user_ocid.is_some() != self.fingerprint.is_some() {
            diagnostics.push(
                Diagnostic::warning("Incomplete API key authentication")
                    .with_detail("user_ocid and fingerprint are used together"),
            );
        }

        diagnostics
    }

    /// The retry policy for calls to `service`.
    pub fn retry_policy(&self, service: &str, work_request: bool) -> RetryPolicy {
        let policy = RetryPolicy::for_service(service, work_request);

        if self.disable_auto_retries {
            return policy.with_max_attempts(1);
        }
        if let Some(attempts) = self.max_retry_attempts {
            return policy.with_max_attempts(attempts);
        }
        if let Some(secs) = self.retry_duration_seconds {
            let attempts = attempts_covering(&policy, Duration::from_secs(secs));
            return policy.with_max_attempts(attempts);
        }
        policy
    }

    /// The configured poll interval, if any.
    pub fn poll_interval(&self) -> Option<PollInterval> {
        self.poll_interval_seconds
            .filter(|s| *s > 0)
            .map(|s| PollInterval::Fixed(Duration::from_secs(s)))
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute("region", Attribute::optional_string())
            .with_attribute("tenancy_ocid", Attribute::optional_string())
            .with_attribute("user_ocid", Attribute::optional_string())
            .with_attribute("fingerprint", Attribute::optional_string())
            .with_attribute("private_key_path", Attribute::optional_string().sensitive())
            .with_attribute("config_file_profile", Attribute::optional_string())
            .with_attribute(
                "retry_duration_seconds",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional()),
            )
            .with_attribute(
                "disable_auto_retries",
                Attribute::new(AttributeType::Bool, AttributeFlags::optional()),
            )
            .with_attribute(
                "max_retry_attempts",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional()),
            )
            .with_attribute(
                "poll_interval_seconds",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional()),
            )
    }
}

/// Smallest attempt count whose cumulative backoff reaches `budget`.
fn attempts_covering(policy: &RetryPolicy, budget: Duration) -> u32 {
    let mut waited = Duration::ZERO;
    let mut attempts = 1;
    while waited < budget && attempts < MAX_DERIVED_ATTEMPTS {
        waited += policy.delay_for(attempts);
        attempts += 1;
    }
    attempts
}
