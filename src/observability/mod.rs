// src/observability/mod.rs
//! Tracing and metrics setup
//!
//! - **Tracing**: `tracing-subscriber` registry with an `EnvFilter`
//!   (`RUST_LOG` first, then the configured level) and a pretty or JSON
//!   formatter
//! - **Metrics**: optional Prometheus exporter for the counters and
//!   histograms recorded along the request pipeline

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::config::{LoggingConfig, MetricsConfig};
use crate::utils::errors::{EngineError, Result};

/// Outcome counter, labelled by `outcome`
pub const REQUESTS_TOTAL: &str = "hub_mock_requests_total";

/// Bridge round-trip latency, labelled by `message`
pub const BRIDGE_ROUNDTRIP_SECONDS: &str = "hub_mock_bridge_roundtrip_seconds";

/// Build the log filter: `RUST_LOG` wins over the configured level
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| EngineError::ConfigError(format!("Invalid log level '{}': {}", config.level, e))),
    }
}

/// Install the global tracing subscriber. A subscriber installed earlier
/// (e.g. by a test harness) is left in place.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    match result {
        Ok(()) => info!("Logging initialized at level {}", config.level),
        Err(_) => debug!("Logging already initialized, skipping"),
    }
    Ok(())
}

/// Install the Prometheus exporter when enabled
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        debug!("Metrics exporter disabled");
        return Ok(());
    }

    let addr: std::net::SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| EngineError::ConfigError(format!("Invalid metrics address: {}", e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| EngineError::ConfigError(format!("Failed to install metrics exporter: {}", e)))?;

    metrics::describe_counter!(REQUESTS_TOTAL, "Intercepted calls by terminal outcome");
    metrics::describe_histogram!(
        BRIDGE_ROUNDTRIP_SECONDS,
        metrics::Unit::Seconds,
        "Time from posting a message to a session until its reply"
    );

    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}
