//! Logging setup.
//!
//! Drivers, pollers and retries emit `tracing` events; these helpers install a
//! subscriber writing to **stderr**, leaving stdout to the plugin host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `hemmer_provider_oci=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Every poll observation and retry
//! RUST_LOG=hemmer_provider_oci=debug ./provider
//!
//! # Sleep durations between polls as well
//! RUST_LOG=hemmer_provider_oci::poller=trace ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directives used when `RUST_LOG` is not set.
///
/// This crate logs at `level`; everything else only at `warn`.
pub fn default_directives(level: &str) -> String {
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer::<S>()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber at `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level, used when `RUST_LOG` is
/// not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this does not panic, which makes it safe to call
/// from every test.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
