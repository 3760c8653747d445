// src/interception/mod.rs
//! Request interception layer
//!
//! Intercepts every outgoing call of the page sessions it controls and
//! decides whether the real network or a session's mock routes answer it:
//!
//! - **Interceptor**: lifecycle, bypass rules, owning-session resolution
//! - **Clients**: registry of open page sessions
//! - **Request / Response**: snapshots of calls and their outcomes
//! - **Routing Table**: method + path patterns mapped to mock handlers
//! - **Upstream**: the real network, for bypass and passthrough
//! - **HTTP Interceptor**: hyper front end serving real HTTP calls
//!
//! # Architecture
//!
//! ```text
//! HTTP caller
//!     │
//!     └─ HttpInterceptor → MockSession::stream → Interceptor
//!                                                 ├─ bypass ──────▶ Upstream
//!                                                 └─ REQUEST ─▶ session RoutingTable
//!                                                                ├─ mock response
//!                                                                └─ not found ─▶ Upstream
//! ```

pub mod clients;
pub mod http_interceptor;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod routing_table;
pub mod upstream;

// Re-export commonly used types
pub use clients::{ClientHandle, ClientKind, ClientRegistry};
pub use http_interceptor::{HttpInterceptor, HttpInterceptorConfig};
pub use interceptor::{
    BypassReason, FetchDecision, Interceptor, LifecycleState, PassthroughReason, Resolution,
    SessionState,
};
pub use request::{
    ClientId, CorrelationId, InterceptedRequest, RequestCache, RequestCredentials, RequestMode,
    RequestRedirect,
};
pub use response::{FetchResponse, MockResponse, StreamBody, StreamedResponse};
pub use routing_table::{PathPattern, Route, RouteReply, RouteRequest, RoutingTable, Validate};
pub use upstream::{HyperUpstream, Upstream};
