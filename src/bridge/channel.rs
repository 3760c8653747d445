// src/bridge/channel.rs
//! Per-call reply channel between the interceptor and a page session
//!
//! Each `send` opens a fresh `oneshot` port, posts the message with the port
//! attached and waits for exactly one reply. The port is dropped after the
//! reply or the timeout, so a late reply can never reach another call.

use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::bridge::messages::{ClientReply, Envelope, PortReply, ReplyPort, WorkerMessage};
use crate::interception::clients::ClientHandle;
use crate::observability::BRIDGE_ROUNDTRIP_SECONDS;
use crate::utils::errors::{EngineError, Result};

/// Default wait for control message replies
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default wait for forwarded request replies
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Message bridge with configurable default timeouts
#[derive(Debug, Clone)]
pub struct MessageBridge {
    control_timeout: Duration,
    request_timeout: Duration,
}

impl Default for MessageBridge {
    fn default() -> Self {
        Self::new(CONTROL_TIMEOUT, REQUEST_TIMEOUT)
    }
}

impl MessageBridge {
    pub fn new(control_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            control_timeout,
            request_timeout,
        }
    }

    pub fn control_timeout(&self) -> Duration {
        self.control_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Send a control message with the control timeout
    pub async fn send_control(&self, client: &ClientHandle, message: WorkerMessage) -> Result<ClientReply> {
        self.send(client, message, self.control_timeout).await
    }

    /// Forward a request message with the request timeout
    pub async fn send_request(&self, client: &ClientHandle, message: WorkerMessage) -> Result<ClientReply> {
        self.send(client, message, self.request_timeout).await
    }

    /// Post `message` to `client` and wait up to `timeout` for its reply
    pub async fn send(
        &self,
        client: &ClientHandle,
        message: WorkerMessage,
        timeout: Duration,
    ) -> Result<ClientReply> {
        let kind = message.kind();
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            port: ReplyPort::new(tx),
        };

        trace!("Posting {} to client {}", kind, client.id());
        if client.post(envelope).is_err() {
            return Err(EngineError::PortClosed(format!(
                "Client {} is no longer listening",
                client.id()
            )));
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, rx).await;
        metrics::histogram!(BRIDGE_ROUNDTRIP_SECONDS, "message" => kind)
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Err(_) => {
                debug!("Client {} did not answer {} within {:?}", client.id(), kind, timeout);
                Err(EngineError::BridgeTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(_)) => Err(EngineError::PortClosed(format!(
                "Client {} dropped the reply port for {}",
                client.id(),
                kind
            ))),
            Ok(Ok(PortReply::Error { error })) => Err(EngineError::ClientError(error)),
            Ok(Ok(PortReply::Message(reply))) => Ok(reply),
        }
    }
}
