// src/interception/interceptor.rs
//! Request interceptor
//!
//! Sits between page sessions and the network. Tracks its own lifecycle
//! (`Installing → Active → Redundant`) and the set of sessions that opted into
//! mocking, decides per request whether to bypass or handle it, and turns the
//! owning session's reply into a real response.
//!
//! # Request pipeline
//!
//! ```text
//! fetch ─▶ classify ─┬─ Bypass ──────────────────────────────▶ network
//!                    └─ Intercept(id) ─▶ resolve owning client
//!                                          ├─ none / inactive / bypass header ─▶ passthrough
//!                                          └─ REQUEST over bridge
//!                                               ├─ MOCK_RESPONSE ─▶ mocked response
//!                                               ├─ MOCK_NOT_FOUND ─▶ passthrough
//!                                               └─ NETWORK_ERROR ─▶ error
//! ```

use dashmap::DashSet;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bridge::channel::MessageBridge;
use crate::bridge::messages::{ClientMessage, ClientReply, RequestPayload, ResponsePayload, WorkerMessage};
use crate::interception::clients::{ClientHandle, ClientKind, ClientRegistry};
use crate::interception::request::{
    normalize_url, origin_of, ClientId, CorrelationId, InterceptedRequest, RequestCache, RequestMode,
};
use crate::interception::response::{FetchResponse, MockResponse, StreamedResponse};
use crate::interception::upstream::Upstream;
use crate::observability::REQUESTS_TOTAL;
use crate::utils::config::InterceptorSettings;
use crate::utils::errors::{EngineError, Result};

/// Registration lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Installing,
    Active,
    /// Unregistered; no longer intercepts
    Redundant,
}

/// Per-session mocking state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Controlling,
    Idle,
}

/// Why a request was not intercepted at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    NotActive,
    EventStream,
    Navigation,
    CacheOnlyInspection,
    NoActiveClients,
}

/// Why an intercepted request went to the real network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    NoOwningClient,
    ClientInactive,
    BypassHeader,
    RouteNotFound,
    UnexpectedReply,
}

/// First-stage decision for an outgoing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    Bypass(BypassReason),
    Intercept(CorrelationId),
}

/// Terminal outcome of resolving an intercepted request
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Passthrough(PassthroughReason),
    Mock(MockResponse),
    NetworkError { name: String, message: String },
}

/// The interception process
pub struct Interceptor {
    origin: String,
    bypass_header: String,
    integrity_checksum: String,
    state: RwLock<LifecycleState>,
    active_clients: DashSet<ClientId>,
    clients: Arc<ClientRegistry>,
    bridge: MessageBridge,
    upstream: Arc<dyn Upstream>,
}

impl Interceptor {
    /// Create an interceptor in the `Installing` state
    pub fn new(
        settings: &InterceptorSettings,
        clients: Arc<ClientRegistry>,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self> {
        let origin_uri: hyper::Uri = settings
            .origin
            .parse()
            .map_err(|e| EngineError::ConfigError(format!("Invalid interceptor origin: {}", e)))?;
        let origin = origin_of(&origin_uri).ok_or_else(|| {
            EngineError::ConfigError(format!("Interceptor origin must be absolute: {}", settings.origin))
        })?;

        Ok(Self {
            origin,
            bypass_header: settings.bypass_header.to_ascii_lowercase(),
            integrity_checksum: settings.integrity_checksum.clone(),
            state: RwLock::new(LifecycleState::Installing),
            active_clients: DashSet::new(),
            clients,
            bridge: MessageBridge::new(settings.control_timeout(), settings.request_timeout()),
            upstream,
        })
    }

    /// Install and activate without waiting for a reload, then claim every
    /// open session
    pub fn install(&self) {
        let previous = {
            let mut state = self.state.write();
            std::mem::replace(&mut *state, LifecycleState::Active)
        };
        info!(
            "Interceptor activated for {} (was {:?}), claimed {} open clients",
            self.origin,
            previous,
            self.clients.len()
        );
    }

    /// Stop intercepting future requests
    pub fn unregister(&self) {
        *self.state.write() = LifecycleState::Redundant;
        self.active_clients.clear();
        info!("Interceptor for {} unregistered", self.origin);
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Checksum reported to integrity checks
    pub fn integrity_checksum(&self) -> &str {
        &self.integrity_checksum
    }

    pub fn bridge(&self) -> &MessageBridge {
        &self.bridge
    }

    pub fn active_client_count(&self) -> usize {
        self.active_clients.len()
    }

    pub fn is_mocking(&self, id: &ClientId) -> bool {
        self.active_clients.contains(id)
    }

    /// Mocking state of an open session
    pub fn session_state(&self, id: &ClientId) -> Option<SessionState> {
        self.clients.get(id)?;
        Some(if self.is_mocking(id) {
            SessionState::Controlling
        } else {
            SessionState::Idle
        })
    }

    /// Handle a control message posted by a session. Messages from unknown
    /// sessions are ignored.
    pub fn post_message(&self, source: &ClientId, message: ClientMessage) {
        let Some(client) = self.clients.get(source) else {
            debug!("Ignoring {:?} from unknown client {}", message, source);
            return;
        };

        match message {
            ClientMessage::KeepaliveRequest => {
                self.notify(&client, WorkerMessage::KeepaliveResponse);
            }
            ClientMessage::IntegrityCheckRequest => {
                self.notify(
                    &client,
                    WorkerMessage::IntegrityCheckResponse(self.integrity_checksum.clone()),
                );
            }
            ClientMessage::MockActivate => {
                self.active_clients.insert(source.clone());
                info!("Mocking enabled for client {}", source);
                self.notify(&client, WorkerMessage::MockingEnabled);
            }
            ClientMessage::MockDeactivate => {
                self.active_clients.remove(source);
                info!("Mocking disabled for client {}", source);
            }
            ClientMessage::ClientClosed => {
                self.active_clients.remove(source);

                let remaining = self
                    .clients
                    .match_all(ClientKind::Window)
                    .into_iter()
                    .filter(|other| other.id() != source)
                    .count();

                debug!("Client {} closed, {} window clients remain", source, remaining);
                if remaining == 0 {
                    self.unregister();
                }
            }
        }
    }

    /// Fire-and-forget control message to a session. Delivery runs on the
    /// current tokio runtime; without one the message is dropped.
    fn notify(&self, client: &ClientHandle, message: WorkerMessage) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                "No runtime to deliver {} to client {}, dropping it",
                message.kind(),
                client.id()
            );
            return;
        };

        let bridge = self.bridge.clone();
        let client = client.clone();
        runtime.spawn(async move {
            let kind = message.kind();
            if let Err(e) = bridge.send_control(&client, message).await {
                debug!("{} to client {} was not acknowledged: {}", kind, client.id(), e);
            }
        });
    }

    /// Decide whether to intercept a request at all
    pub fn classify(&self, request: &InterceptedRequest) -> FetchDecision {
        if self.state() != LifecycleState::Active {
            return FetchDecision::Bypass(BypassReason::NotActive);
        }

        if request.accepts_event_stream() {
            return FetchDecision::Bypass(BypassReason::EventStream);
        }

        if request.mode == RequestMode::Navigate {
            return FetchDecision::Bypass(BypassReason::Navigation);
        }

        // Triggered by devtools inspection and cannot be satisfied here
        if request.cache == RequestCache::OnlyIfCached && request.mode != RequestMode::SameOrigin {
            return FetchDecision::Bypass(BypassReason::CacheOnlyInspection);
        }

        if self.active_clients.is_empty() {
            return FetchDecision::Bypass(BypassReason::NoActiveClients);
        }

        FetchDecision::Intercept(CorrelationId::generate())
    }

    /// Find the session that should answer `request`.
    ///
    /// Same-origin requests go to the first active window whose location is
    /// the request URL, in the order sessions were opened. Both URLs are
    /// compared in normalized form (see `normalize_url`). Two
    /// sessions showing the same URL cannot be told apart; the earlier one
    /// wins. Other requests go to the session that issued them.
    pub fn resolve_main_client(&self, request: &InterceptedRequest) -> Option<ClientHandle> {
        if request.origin().as_deref() == Some(self.origin.as_str()) {
            let target = normalize_url(&request.url)?;
            return self
                .clients
                .match_all(ClientKind::Window)
                .into_iter()
                .filter(|client| self.active_clients.contains(client.id()))
                .find(|client| normalize_url(&client.url()).as_deref() == Some(target.as_str()));
        }

        request
            .client_id
            .as_ref()
            .and_then(|id| self.clients.get(id))
    }

    /// Resolve an intercepted request against its owning session
    pub async fn resolve(
        &self,
        request: &InterceptedRequest,
        id: &CorrelationId,
    ) -> Result<(Option<ClientHandle>, Resolution)> {
        let Some(client) = self.resolve_main_client(request) else {
            return Ok((None, Resolution::Passthrough(PassthroughReason::NoOwningClient)));
        };

        // The session has not armed mocking yet (e.g. initial asset loads)
        if !self.active_clients.contains(client.id()) {
            return Ok((Some(client), Resolution::Passthrough(PassthroughReason::ClientInactive)));
        }

        if request.header(&self.bypass_header) == Some("true") {
            return Ok((Some(client), Resolution::Passthrough(PassthroughReason::BypassHeader)));
        }

        let payload = RequestPayload::from_request(id, request);
        let reply = self
            .bridge
            .send_request(&client, WorkerMessage::Request(payload))
            .await?;

        let resolution = match reply {
            ClientReply::MockResponse(response) => Resolution::Mock(response),
            ClientReply::MockNotFound => Resolution::Passthrough(PassthroughReason::RouteNotFound),
            ClientReply::NetworkError(error) => Resolution::NetworkError {
                name: error.name,
                message: error.message,
            },
            ClientReply::Ack => Resolution::Passthrough(PassthroughReason::UnexpectedReply),
        };

        Ok((Some(client), resolution))
    }

    /// Perform an outgoing call through the interceptor
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<FetchResponse> {
        match self.classify(&request) {
            FetchDecision::Bypass(reason) => {
                self.record_bypass(&request, reason);
                self.upstream.fetch(request).await
            }
            FetchDecision::Intercept(id) => self.intercept(request, id).await,
        }
    }

    /// Like `fetch`, but bypassed calls hand back the network response as
    /// soon as its head arrives so event streams are not buffered.
    /// Intercepted calls are still materialized in full.
    pub async fn stream(&self, request: InterceptedRequest) -> Result<StreamedResponse> {
        match self.classify(&request) {
            FetchDecision::Bypass(reason) => {
                self.record_bypass(&request, reason);
                self.upstream.stream(request).await
            }
            FetchDecision::Intercept(id) => self.intercept(request, id).await.map(StreamedResponse::from),
        }
    }

    fn record_bypass(&self, request: &InterceptedRequest, reason: BypassReason) {
        debug!("Bypassing {} {} ({:?})", request.method, request.url, reason);
        metrics::counter!(REQUESTS_TOTAL, "outcome" => "bypass").increment(1);
    }

    async fn intercept(&self, request: InterceptedRequest, id: CorrelationId) -> Result<FetchResponse> {
        debug!("Intercepted {} {} as {}", request.method, request.url, id);

        match self.handle_request(request, &id).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_bypass_failure() => {
                warn!(
                    "Bypass a network request {} that failed to fetch resource: {}",
                    id, e
                );
                metrics::counter!(REQUESTS_TOTAL, "outcome" => "bypass_failed").increment(1);
                Ok(FetchResponse::bad_gateway(&e.to_string()))
            }
            Err(e) => {
                metrics::counter!(REQUESTS_TOTAL, "outcome" => "error").increment(1);
                Err(e)
            }
        }
    }

    async fn handle_request(&self, request: InterceptedRequest, id: &CorrelationId) -> Result<FetchResponse> {
        let (client, resolution) = self.resolve(&request, id).await?;

        let (response, response_type) = match resolution {
            Resolution::Passthrough(reason) => {
                debug!("Passing {} through ({:?})", id, reason);
                metrics::counter!(REQUESTS_TOTAL, "outcome" => "passthrough").increment(1);
                (self.passthrough(request).await?, "basic")
            }
            Resolution::Mock(mock) => {
                metrics::counter!(REQUESTS_TOTAL, "outcome" => "mocked").increment(1);
                (FetchResponse::from_mock(mock)?, "default")
            }
            Resolution::NetworkError { name, message } => {
                debug!("Client raised {} for {}", name, id);
                metrics::counter!(REQUESTS_TOTAL, "outcome" => "network_error").increment(1);
                return Err(EngineError::network(name, message));
            }
        };

        if let Some(client) = client.filter(|client| self.active_clients.contains(client.id())) {
            let snapshot = ResponsePayload::from_response(id, response_type, &response);
            self.notify(&client, WorkerMessage::Response(snapshot));
        }

        Ok(response)
    }

    /// Send an intercepted request to the real network, without the bypass
    /// header so cross-origin preflight checks still pass
    async fn passthrough(&self, mut request: InterceptedRequest) -> Result<FetchResponse> {
        request.headers.remove(self.bypass_header.as_str());
        self.upstream.fetch(request).await
    }
}
