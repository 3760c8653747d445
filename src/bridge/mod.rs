// src/bridge/mod.rs
//! Message bridge between the interceptor and page sessions
//!
//! - **Messages**: tagged control, request-forwarding and reply messages
//! - **Channel**: single-use reply ports with bounded waits
//!
//! ```text
//! Interceptor ── Envelope{REQUEST, port} ──▶ Session inbox
//!      ▲                                        │
//!      └──────── MOCK_RESPONSE / MOCK_NOT_FOUND ┘
//!                / NETWORK_ERROR (over port)
//! ```

pub mod channel;
pub mod messages;

pub use channel::{MessageBridge, CONTROL_TIMEOUT, REQUEST_TIMEOUT};
pub use messages::{
    ClientMessage, ClientReply, Envelope, NetworkErrorPayload, PortReply, ReplyPort,
    RequestPayload, ResponsePayload, WorkerMessage,
};
