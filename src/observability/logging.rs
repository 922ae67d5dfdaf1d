//! # Logging
//!
//! `tracing` subscriber setup.
//!
//! The filter comes from `RUST_LOG` and defaults to `ingress_operator=info`.
//! `LOG_FORMAT=json` selects one JSON object per line, anything else the
//! human-readable text format.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "ingress_operator=info";

/// Install the global subscriber
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(log_format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log_format.eq_ignore_ascii_case("json") {
        builder
            .json()
            .with_current_span(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install JSON tracing subscriber: {e}"))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
    }
}
