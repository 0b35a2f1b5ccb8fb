//! Per-connection event serialization.
//!
//! Engine callbacks and relay messages for one connection are funneled into a
//! single unbounded queue. A [`ConnectionInbox`] drains it and runs each event
//! to completion on its [`Coordinator`] before taking the next, so negotiation
//! state is only ever touched by one handler at a time. Different connections
//! have independent inboxes.

use std::collections::HashMap;
use std::fmt;

use duet_common::{Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::coordinator::Coordinator;
use crate::engine::{EngineEvent, TransportEngine};
use crate::sink::SignalSink;

/// Stable identifier of one negotiated connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One unit of work for a connection's coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Engine(EngineEvent),
    /// Raw text of a relay message.
    SignalReceived(String),
}

/// Cloneable, non-blocking entry point into a connection's queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

/// Receiving end of a connection's queue.
#[derive(Debug)]
pub struct ConnectionInbox {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

/// Create the queue for a new connection.
pub fn channel(id: ConnectionId) -> (ConnectionHandle, ConnectionInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ConnectionHandle { id: id.clone(), tx },
        ConnectionInbox { id, rx },
    )
}

impl ConnectionHandle {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn dispatch(&self, event: ConnectionEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::internal(format!("connection {} is closed", self.id)))
    }

    pub fn engine_event(&self, event: EngineEvent) -> Result<()> {
        self.dispatch(ConnectionEvent::Engine(event))
    }

    pub fn signal_received(&self, raw: impl Into<String>) -> Result<()> {
        self.dispatch(ConnectionEvent::SignalReceived(raw.into()))
    }
}

impl ConnectionInbox {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Process events until every handle is dropped, then hand the
    /// coordinator back.
    pub async fn run<E, S>(mut self, mut coordinator: Coordinator<E, S>) -> Coordinator<E, S>
    where
        E: TransportEngine,
        S: SignalSink,
    {
        info!(connection = %self.id, role = %coordinator.role(), "connection started");
        while let Some(event) = self.rx.recv().await {
            coordinator.handle(event).await;
        }
        info!(connection = %self.id, "connection finished");
        coordinator
    }

    pub fn spawn<E, S>(self, coordinator: Coordinator<E, S>) -> JoinHandle<Coordinator<E, S>>
    where
        E: TransportEngine + 'static,
        S: SignalSink + 'static,
    {
        tokio::spawn(self.run(coordinator))
    }
}

/// Arena of live connections keyed by id.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle previously registered under the same id, if any.
    pub fn register(&mut self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(handle.id().clone(), handle)
    }

    pub fn dispatch(&self, id: &ConnectionId, event: ConnectionEvent) -> Result<()> {
        let handle = self
            .connections
            .get(id)
            .ok_or_else(|| Error::internal(format!("unknown connection {id}")))?;
        handle.dispatch(event)
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
