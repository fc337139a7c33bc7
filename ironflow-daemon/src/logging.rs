//! Tracing setup from the `[general]` section.
//!
//! `json` emits one JSON object per line, `pretty` is for terminals. When
//! `RUST_LOG` is set it replaces the configured level entirely; otherwise the
//! configured level applies to ironflow crates and the HTTP stack is held
//! at `warn` so per-request logs do not drown flow logs.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ironflow_core::config::GeneralConfig;

const QUIET_TARGETS: &[&str] = &["hyper=warn", "axum=warn", "tower=warn"];

fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    QUIET_TARGETS
        .iter()
        .try_fold(EnvFilter::try_new(level)?, |filter, directive| {
            let directive: Directive = directive.parse()?;
            Ok::<_, anyhow::Error>(filter.add_directive(directive))
        })
}

/// Install the global subscriber. Call once, before the first event.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = build_filter(&config.log_level)
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        "pretty" => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };
    installed.context("failed to install tracing subscriber")
}
