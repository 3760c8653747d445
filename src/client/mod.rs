// src/client/mod.rs
//! Page-side half of the mock layer
//!
//! A `MockSession` is one open page. It registers with the interceptor,
//! runs the activation handshake and answers forwarded requests from its
//! route table.
//!
//! ```text
//! MockSession::start
//!   ├─ INTEGRITY_CHECK_REQUEST ─▶ INTEGRITY_CHECK_RESPONSE(checksum)
//!   └─ MOCK_ACTIVATE ───────────▶ MOCKING_ENABLED
//!
//! REQUEST ─▶ RoutingTable::resolve ─┬─ MOCK_RESPONSE
//!                                   ├─ MOCK_NOT_FOUND
//!                                   └─ NETWORK_ERROR
//! ```

pub mod session;

pub use session::MockSession;
