//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No secrets** (passwords, bearer tokens, OAuth credentials) may appear in
//!   any span attribute or log field. Tokens are logged through
//!   [`token_fingerprint`] only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence.

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace::Tracer, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: JSON log lines filtered by `log_level`,
/// plus span export when `otlp_endpoint` is set.
///
/// # Errors
///
/// Returns an error if the OTLP pipeline or the subscriber cannot be installed.
pub fn init_telemetry(otlp_endpoint: Option<&str>, log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let spans = otlp_endpoint
        .map(span_tracer)
        .transpose()?
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_current_span(false))
        .with(spans)
        .try_init()
        .context("failed to initialise tracing subscriber")
}

fn span_tracer(endpoint: &str) -> Result<Tracer> {
    let resource = Resource::new([
        KeyValue::new(SERVICE_NAME, "marketplace-api"),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ]);
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
        .install_batch(runtime::Tokio)
        .context("failed to install OTLP span pipeline")
}

/// Short, non-reversible identifier for a bearer token, safe to log.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = token_fingerprint("abc");
        assert_eq!(a.len(), 8);
        assert_eq!(a, token_fingerprint("abc"));
        assert_ne!(a, token_fingerprint("abd"));
        assert!(!a.contains("abc"));
    }
}
