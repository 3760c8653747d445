// src/bridge/messages.rs
//! Tagged messages exchanged between the interceptor and page sessions
//!
//! Every message carries a `type` discriminator. Interceptor messages put
//! their data under `payload`, client replies under `data`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::oneshot;

use crate::interception::request::{
    CorrelationId, InterceptedRequest, RequestCache, RequestCredentials, RequestMode,
    RequestRedirect,
};
use crate::interception::response::{FetchResponse, MockResponse};

/// Messages a page session posts to the interceptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    KeepaliveRequest,
    IntegrityCheckRequest,
    MockActivate,
    MockDeactivate,
    ClientClosed,
}

/// Messages the interceptor posts to a page session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    KeepaliveResponse,
    IntegrityCheckResponse(String),
    MockingEnabled,
    Request(RequestPayload),
    Response(ResponsePayload),
}

impl WorkerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeepaliveResponse => "KEEPALIVE_RESPONSE",
            Self::IntegrityCheckResponse(_) => "INTEGRITY_CHECK_RESPONSE",
            Self::MockingEnabled => "MOCKING_ENABLED",
            Self::Request(_) => "REQUEST",
            Self::Response(_) => "RESPONSE",
        }
    }
}

/// Replies a page session sends back over a reply port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientReply {
    MockResponse(MockResponse),
    MockNotFound,
    NetworkError(NetworkErrorPayload),
    /// Acknowledges a control message
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkErrorPayload {
    pub name: String,
    pub message: String,
}

/// What actually travels over a reply port: a reply, or an error marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortReply {
    Error { error: String },
    Message(ClientReply),
}

/// Forwarded request metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub id: CorrelationId,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub cache: RequestCache,
    pub mode: RequestMode,
    pub credentials: RequestCredentials,
    pub destination: String,
    pub integrity: String,
    pub redirect: RequestRedirect,
    pub referrer: String,
    pub referrer_policy: String,
    pub body: Bytes,
    pub keepalive: bool,
}

impl RequestPayload {
    pub fn from_request(id: &CorrelationId, request: &InterceptedRequest) -> Self {
        Self {
            id: id.clone(),
            url: request.url.clone(),
            method: request.method.as_str().to_string(),
            headers: request.header_map(),
            cache: request.cache,
            mode: request.mode,
            credentials: request.credentials,
            destination: request.destination.clone(),
            integrity: request.integrity.clone(),
            redirect: request.redirect,
            referrer: request.referrer.clone(),
            referrer_policy: request.referrer_policy.clone(),
            body: request.body.clone(),
            keepalive: request.keepalive,
        }
    }

    /// Path component of the forwarded URL, without the query string
    pub fn path(&self) -> String {
        self.url
            .parse::<hyper::Uri>()
            .map(|uri| uri.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }
}

/// Snapshot of a finished response, sent for response life-cycle events.
/// `body` is `None` only for statuses that cannot carry one; an empty body
/// is `Some("")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub request_id: CorrelationId,
    #[serde(rename = "type")]
    pub response_type: String,
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    pub body: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl ResponsePayload {
    pub fn from_response(request_id: &CorrelationId, response_type: &str, response: &FetchResponse) -> Self {
        Self {
            request_id: request_id.clone(),
            response_type: response_type.to_string(),
            ok: response.ok(),
            status: response.status.as_u16(),
            status_text: response.status_text.clone(),
            body: if response.has_null_body_status() {
                None
            } else {
                Some(response.text())
            },
            headers: response.header_map(),
        }
    }
}

/// Single-use reply port handed to the receiving session
#[derive(Debug)]
pub struct ReplyPort(oneshot::Sender<PortReply>);

impl ReplyPort {
    pub(crate) fn new(sender: oneshot::Sender<PortReply>) -> Self {
        Self(sender)
    }

    /// Send a reply; returns `false` when the sender stopped waiting
    pub fn reply(self, reply: ClientReply) -> bool {
        self.0.send(PortReply::Message(reply)).is_ok()
    }

    /// Send an error-marked reply
    pub fn reject(self, error: impl Into<String>) -> bool {
        self.0
            .send(PortReply::Error {
                error: error.into(),
            })
            .is_ok()
    }
}

/// A posted message together with its reply port
#[derive(Debug)]
pub struct Envelope {
    pub message: WorkerMessage,
    pub port: ReplyPort,
}
