// src/client/session.rs
//! Page session
//!
//! One open page of the app. Owns a route table, answers the interceptor's
//! forwarded requests from it, and drives the activation handshake.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::messages::{
    ClientMessage, ClientReply, Envelope, NetworkErrorPayload, ResponsePayload, WorkerMessage,
};
use crate::interception::clients::{ClientHandle, ClientKind};
use crate::interception::interceptor::Interceptor;
use crate::interception::request::{ClientId, InterceptedRequest};
use crate::interception::response::{FetchResponse, StreamedResponse};
use crate::interception::routing_table::{RouteReply, RoutingTable};
use crate::utils::errors::{EngineError, Result};

/// Capacity of the response event stream; slow subscribers lose the oldest
const RESPONSE_EVENT_CAPACITY: usize = 64;

/// Local view of the handshake state, updated by the inbox loop
struct SessionSignals {
    mocking: watch::Sender<bool>,
    checksum: watch::Sender<Option<String>>,
    responses: broadcast::Sender<ResponsePayload>,
}

/// A page session connected to an interceptor
pub struct MockSession {
    handle: ClientHandle,
    interceptor: Arc<Interceptor>,
    signals: Arc<SessionSignals>,
    inbox_task: JoinHandle<()>,
}

impl MockSession {
    /// Open a window session at `url` answering requests from `routes`
    pub fn connect(interceptor: Arc<Interceptor>, url: impl Into<String>, routes: Arc<RoutingTable>) -> Self {
        let (handle, inbox) = interceptor.clients().open(ClientKind::Window, url);

        let (mocking, _) = watch::channel(false);
        let (checksum, _) = watch::channel(None);
        let (responses, _) = broadcast::channel(RESPONSE_EVENT_CAPACITY);
        let signals = Arc::new(SessionSignals {
            mocking,
            checksum,
            responses,
        });

        let inbox_task = tokio::spawn(run_inbox(
            handle.id().clone(),
            inbox,
            routes,
            Arc::clone(&signals),
        ));

        Self {
            handle,
            interceptor,
            signals,
            inbox_task,
        }
    }

    pub fn id(&self) -> &ClientId {
        self.handle.id()
    }

    pub fn url(&self) -> String {
        self.handle.url()
    }

    /// Whether the interceptor confirmed mocking for this session
    pub fn is_mocking(&self) -> bool {
        *self.signals.mocking.borrow()
    }

    /// Check the interceptor build, then opt into mocking and wait for the
    /// `MOCKING_ENABLED` confirmation
    pub async fn start(&self) -> Result<()> {
        let timeout = self.interceptor.bridge().control_timeout();

        let mut checksum = self.signals.checksum.subscribe();
        self.interceptor
            .post_message(self.id(), ClientMessage::IntegrityCheckRequest);
        let reported = wait_for(&mut checksum, timeout, |value| value.is_some())
            .await?
            .unwrap_or_default();
        if reported != self.interceptor.integrity_checksum() {
            // Still usable, but the page and the interceptor disagree on the build
            warn!(
                "Interceptor integrity check failed for client {}: got {}, expected {}",
                self.id(),
                reported,
                self.interceptor.integrity_checksum()
            );
        }

        let mut mocking = self.signals.mocking.subscribe();
        self.interceptor
            .post_message(self.id(), ClientMessage::MockActivate);
        wait_for(&mut mocking, timeout, |enabled| *enabled).await?;

        info!("Mocking enabled for session {} at {}", self.id(), self.url());
        Ok(())
    }

    /// Opt out of mocking; later requests go to the real network
    pub fn stop(&self) {
        self.interceptor
            .post_message(self.id(), ClientMessage::MockDeactivate);
        self.signals.mocking.send_replace(false);
    }

    /// Change the session's current location
    pub fn navigate(&self, url: impl Into<String>) {
        self.handle.set_url(url);
    }

    /// Issue an outgoing call from this session
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<FetchResponse> {
        self.interceptor
            .fetch(request.from_client(self.id().clone()))
            .await
    }

    /// Issue an outgoing call whose bypassed response body is forwarded as
    /// it arrives
    pub async fn stream(&self, request: InterceptedRequest) -> Result<StreamedResponse> {
        self.interceptor
            .stream(request.from_client(self.id().clone()))
            .await
    }

    /// Stream of `RESPONSE` events for requests this session owned
    pub fn response_events(&self) -> broadcast::Receiver<ResponsePayload> {
        self.signals.responses.subscribe()
    }

    /// Close the page: tell the interceptor, then leave the client list
    pub fn close(self) {
        self.interceptor
            .post_message(self.id(), ClientMessage::ClientClosed);
        self.interceptor.clients().remove(self.id());
        debug!("Session {} closed", self.id());
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.inbox_task.abort();
    }
}

async fn wait_for<T, F>(receiver: &mut watch::Receiver<T>, timeout: Duration, ready: F) -> Result<T>
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    match tokio::time::timeout(timeout, receiver.wait_for(ready)).await {
        Ok(Ok(value)) => Ok(value.clone()),
        Ok(Err(_)) => Err(EngineError::PortClosed("Session inbox stopped".into())),
        Err(_) => Err(EngineError::BridgeTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Answer everything the interceptor posts to this session
async fn run_inbox(
    id: ClientId,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    routes: Arc<RoutingTable>,
    signals: Arc<SessionSignals>,
) {
    while let Some(Envelope { message, port }) = inbox.recv().await {
        let reply = match message {
            WorkerMessage::Request(payload) => match routes.resolve(&payload) {
                Ok(Some(RouteReply::Respond(response))) => ClientReply::MockResponse(response),
                Ok(Some(RouteReply::NetworkError { name, message })) => {
                    ClientReply::NetworkError(NetworkErrorPayload { name, message })
                }
                Ok(Some(RouteReply::Passthrough)) | Ok(None) => ClientReply::MockNotFound,
                Err(e) => {
                    warn!("Handler for {} {} failed: {}", payload.method, payload.url, e);
                    port.reject(e.to_string());
                    continue;
                }
            },
            WorkerMessage::MockingEnabled => {
                signals.mocking.send_replace(true);
                ClientReply::Ack
            }
            WorkerMessage::IntegrityCheckResponse(checksum) => {
                signals.checksum.send_replace(Some(checksum));
                ClientReply::Ack
            }
            WorkerMessage::KeepaliveResponse => ClientReply::Ack,
            WorkerMessage::Response(snapshot) => {
                // No subscribers is fine
                let _ = signals.responses.send(snapshot);
                ClientReply::Ack
            }
        };

        if !port.reply(reply) {
            debug!("Interceptor stopped waiting on client {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::clients::ClientRegistry;
    use crate::interception::interceptor::LifecycleState;
    use crate::interception::response::MockResponse;
    use crate::interception::upstream::test_support::RecordingUpstream;
    use crate::utils::config::InterceptorSettings;
    use hyper::StatusCode;

    const ORIGIN: &str = "http://localhost:5173";
    const API: &str = "http://localhost:3000";

    fn interceptor_with(settings: InterceptorSettings) -> (Arc<Interceptor>, RecordingUpstream) {
        let upstream = RecordingUpstream::default();
        let interceptor = Interceptor::new(
            &settings,
            Arc::new(ClientRegistry::new()),
            Arc::new(upstream.clone()),
        )
        .unwrap();
        interceptor.install();
        (Arc::new(interceptor), upstream)
    }

    fn interceptor() -> (Arc<Interceptor>, RecordingUpstream) {
        interceptor_with(InterceptorSettings {
            origin: ORIGIN.to_string(),
            ..InterceptorSettings::default()
        })
    }

    fn routes() -> Arc<RoutingTable> {
        let mut table = RoutingTable::new();
        table
            .get("/ping", |_| Ok(MockResponse::text(200, "pong").into()))
            .unwrap();
        table
            .get("/offline", |_| {
                Ok(RouteReply::NetworkError {
                    name: "TypeError".into(),
                    message: "Failed to fetch".into(),
                })
            })
            .unwrap();
        table.get("/real", |_| Ok(RouteReply::Passthrough)).unwrap();
        table
            .get("/broken", |_| Err(EngineError::InvalidRequest("handler blew up".into())))
            .unwrap();
        Arc::new(table)
    }

    #[tokio::test]
    async fn test_start_enables_mocking() {
        let (interceptor, _) = interceptor();
        let session = MockSession::connect(Arc::clone(&interceptor), format!("{}/", ORIGIN), routes());
        assert!(!session.is_mocking());

        session.start().await.unwrap();
        assert!(session.is_mocking());
        assert!(interceptor.is_mocking(session.id()));
    }

    #[tokio::test]
    async fn test_integrity_mismatch_still_starts() {
        let (interceptor, _) = interceptor_with(InterceptorSettings {
            origin: ORIGIN.to_string(),
            integrity_checksum: "something-else".into(),
            ..InterceptorSettings::default()
        });
        let session = MockSession::connect(Arc::clone(&interceptor), ORIGIN, routes());
        session.start().await.unwrap();
        assert!(session.is_mocking());
    }

    #[tokio::test]
    async fn test_routes_answer_fetches() {
        let (interceptor, upstream) = interceptor();
        let session = MockSession::connect(interceptor, ORIGIN, routes());
        session.start().await.unwrap();

        let response = session
            .fetch(InterceptedRequest::get(format!("{}/ping", API)))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "pong");
        assert_eq!(upstream.count(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_and_passthrough_routes_reach_network() {
        let (interceptor, upstream) = interceptor();
        let session = MockSession::connect(interceptor, ORIGIN, routes());
        session.start().await.unwrap();

        for path in ["/missing", "/real"] {
            let response = session
                .fetch(InterceptedRequest::get(format!("{}{}", API, path)))
                .await
                .unwrap();
            assert_eq!(response.text(), "from network");
        }
        assert_eq!(upstream.count(), 2);
    }

    #[tokio::test]
    async fn test_network_error_route_fails_the_call() {
        let (interceptor, _) = interceptor();
        let session = MockSession::connect(interceptor, ORIGIN, routes());
        session.start().await.unwrap();

        let err = session
            .fetch(InterceptedRequest::get(format!("{}/offline", API)))
            .await
            .unwrap_err();
        assert_eq!(err.network_name(), Some("TypeError"));
    }

    #[tokio::test]
    async fn test_failing_handler_rejects() {
        let (interceptor, _) = interceptor();
        let session = MockSession::connect(interceptor, ORIGIN, routes());
        session.start().await.unwrap();

        let err = session
            .fetch(InterceptedRequest::get(format!("{}/broken", API)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ClientError(message) if message.contains("handler blew up")));
    }

    #[tokio::test]
    async fn test_stop_returns_to_network() {
        let (interceptor, upstream) = interceptor();
        let session = MockSession::connect(Arc::clone(&interceptor), ORIGIN, routes());
        session.start().await.unwrap();
        session.stop();
        assert!(!session.is_mocking());
        assert!(!interceptor.is_mocking(session.id()));

        let response = session
            .fetch(InterceptedRequest::get(format!("{}/ping", API)))
            .await
            .unwrap();
        assert_eq!(response.text(), "from network");
        assert_eq!(upstream.count(), 1);
    }

    #[tokio::test]
    async fn test_response_events_published() {
        let (interceptor, _) = interceptor();
        let session = MockSession::connect(interceptor, ORIGIN, routes());
        session.start().await.unwrap();
        let mut events = session.response_events();

        session
            .fetch(InterceptedRequest::get(format!("{}/ping", API)))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.status, 200);
        assert!(event.ok);
        assert_eq!(event.body.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_navigate_changes_owner_resolution() {
        let (interceptor, _) = interceptor();
        let session = MockSession::connect(Arc::clone(&interceptor), format!("{}/", ORIGIN), routes());
        session.start().await.unwrap();

        let page = format!("{}/ping", ORIGIN);
        assert!(interceptor
            .resolve_main_client(&InterceptedRequest::get(&page))
            .is_none());

        session.navigate(&page);
        let owner = interceptor
            .resolve_main_client(&InterceptedRequest::get(&page))
            .unwrap();
        assert_eq!(owner.id(), session.id());
    }

    #[tokio::test]
    async fn test_closing_last_session_unregisters() {
        let (interceptor, _) = interceptor();
        let first = MockSession::connect(Arc::clone(&interceptor), ORIGIN, routes());
        let second = MockSession::connect(Arc::clone(&interceptor), ORIGIN, routes());
        first.start().await.unwrap();
        second.start().await.unwrap();

        first.close();
        assert_eq!(interceptor.state(), LifecycleState::Active);
        assert_eq!(interceptor.clients().len(), 1);

        second.close();
        assert_eq!(interceptor.state(), LifecycleState::Redundant);
        assert!(interceptor.clients().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_times_out_without_interceptor_reply() {
        let (interceptor, _) = interceptor();
        let session = MockSession::connect(Arc::clone(&interceptor), ORIGIN, routes());

        // Once unregistered the session is no longer known to the interceptor
        interceptor.clients().remove(session.id());
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, EngineError::BridgeTimeout { timeout_ms: 1000 }));
    }
}
