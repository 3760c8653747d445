// src/interception/clients.rs
//! Registry of open page sessions
//!
//! Plays the role of the browser's client list: the interceptor looks up
//! sessions by id, enumerates open windows, and posts messages into a
//! session's inbox.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bridge::messages::Envelope;
use crate::interception::request::ClientId;

/// Kind of browsing context a session runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Window,
    Worker,
}

/// Handle to an open session, cheap to clone
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    kind: ClientKind,
    url: Arc<RwLock<String>>,
    inbox: mpsc::UnboundedSender<Envelope>,

    /// Registration order, used to keep enumeration deterministic
    seq: u64,
}

impl ClientHandle {
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    /// Current location of the session
    pub fn url(&self) -> String {
        self.url.read().clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.write() = url.into();
    }

    /// Post an envelope into the session inbox
    pub(crate) fn post(&self, envelope: Envelope) -> Result<(), Envelope> {
        self.inbox.send(envelope).map_err(|err| err.0)
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}

/// All sessions currently open
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientId, ClientHandle>,
    next_seq: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session and return its handle plus the inbox receiver
    pub fn open(
        &self,
        kind: ClientKind,
        url: impl Into<String>,
    ) -> (ClientHandle, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ClientHandle {
            id: ClientId::generate(),
            kind,
            url: Arc::new(RwLock::new(url.into())),
            inbox: tx,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        debug!("Opened {:?} client {} at {}", kind, handle.id, handle.url());
        self.clients.insert(handle.id.clone(), handle.clone());
        (handle, rx)
    }

    pub fn get(&self, id: &ClientId) -> Option<ClientHandle> {
        self.clients.get(id).map(|entry| entry.value().clone())
    }

    /// Open sessions of the given kind, in the order they were opened
    pub fn match_all(&self, kind: ClientKind) -> Vec<ClientHandle> {
        let mut clients: Vec<ClientHandle> = self
            .clients
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.value().clone())
            .collect();
        clients.sort_by_key(|client| client.seq);
        clients
    }

    pub fn remove(&self, id: &ClientId) -> Option<ClientHandle> {
        let removed = self.clients.remove(id).map(|(_, handle)| handle);
        if removed.is_some() {
            debug!("Removed client {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
