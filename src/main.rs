// src/main.rs
//! Innovation Hub Mock Server
//!
//! Serves the hub API from an in-memory dataset through the interception
//! layer, passing everything it does not mock through to the real upstream.

use anyhow::{Context, Result};
use hub_mock_engine::interception::clients::ClientRegistry;
use hub_mock_engine::interception::http_interceptor::{HttpInterceptor, HttpInterceptorConfig};
use hub_mock_engine::interception::interceptor::Interceptor;
use hub_mock_engine::interception::upstream::HyperUpstream;
use hub_mock_engine::mock::{hub_routes, SyntheticDataset};
use hub_mock_engine::observability::{init_metrics, init_tracing};
use hub_mock_engine::utils::config::EngineConfig;
use hub_mock_engine::{BuildInfo, MockSession};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so logging honours it
    let config = EngineConfig::load().context("Failed to load configuration")?;

    // Initialize observability (tracing, metrics)
    init_tracing(&config.logging)?;
    init_metrics(&config.metrics)?;

    let build = BuildInfo::current();
    info!(
        "Starting Innovation Hub Mock Server v{} ({})",
        build.version, build.git_hash
    );
    info!("Configuration loaded: {:?}", config);

    // Mock backend
    let dataset = Arc::new(SyntheticDataset::seeded());
    let routes = Arc::new(hub_routes(Arc::clone(&dataset))?);
    info!("{}", routes.describe());

    // Interception layer
    if config.upstream.base_url.is_none() {
        warn!("No upstream configured; unmocked requests will fail with 502");
    }
    let upstream = Arc::new(HyperUpstream::new(config.upstream.base_url.as_deref())?);
    let interceptor = Arc::new(Interceptor::new(
        &config.interceptor,
        Arc::new(ClientRegistry::new()),
        upstream,
    )?);
    interceptor.install();

    // Built-in page session the front end mocks on behalf of
    let session = MockSession::connect(
        Arc::clone(&interceptor),
        config.interceptor.session_url.clone(),
        routes,
    );
    session.start().await.context("Failed to enable mocking")?;

    let mut front_config = HttpInterceptorConfig::new(config.listen_addr()?);
    front_config.public_origin = config.server_origin();
    let front = Arc::new(HttpInterceptor::new(front_config, Arc::new(session)));

    // Graceful shutdown handler
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, cleaning up...");
                signal.cancel();
            }
            Err(e) => error!("Failed to install CTRL+C signal handler: {}", e),
        }
    });

    match front.start(shutdown).await {
        Ok(()) => {
            interceptor.unregister();
            info!("Server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
