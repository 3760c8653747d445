// src/lib.rs
//! Innovation Hub Mock Engine Library
//!
//! Local network interception and mock-response layer for the innovation
//! hub app. Outgoing calls of page sessions are intercepted and answered
//! from an in-memory dataset, or passed through to the real network.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **interception**: interceptor lifecycle, bypass rules, routing, HTTP front end
//! - **bridge**: request/reply messaging between interceptor and sessions
//! - **client**: page sessions and their activation handshake
//! - **mock**: synthetic dataset and hub API handlers
//! - **observability**: tracing and metrics
//! - **utils**: configuration and errors

// Public module exports
pub mod bridge;
pub mod client;
pub mod interception;
pub mod mock;
pub mod observability;
pub mod utils;

// Re-export commonly used types
pub use client::MockSession;
pub use interception::{HttpInterceptor, Interceptor, InterceptedRequest, RoutingTable};
pub use mock::{hub_routes, SyntheticDataset};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Engine build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}
