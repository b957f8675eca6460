//! Client handles and lifecycle events
//!
//! A `ClientHandle` is a live, stateful connection to one store node.
//! It is usable once it has emitted `ClientEvent::Ready`; errors and
//! disconnects may be emitted at any time afterwards.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use redis::Value;
use tokio::sync::broadcast;

use super::Engine;
use crate::utils::CommandError;

/// Capacity of each handle's lifecycle channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle events emitted by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Ready,
    Error(String),
    Reconnecting,
    Warning(String),
    /// Disconnected, either on request or by the server
    End,
}

/// Sending half of a handle's lifecycle channel
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventEmitter {
    /// Create an emitter together with a first subscriber
    ///
    /// The subscriber exists before any event can be sent, so nothing
    /// emitted by a freshly spawned connect task is lost.
    pub fn channel() -> (Self, broadcast::Receiver<ClientEvent>) {
        let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Emit an event; having no subscribers is not an error
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

/// Engine-specific half of a client handle
///
/// `call_method` resolves a per-command method by name, the way a client
/// library exposes `get`, `set`, ... (and `getAsync` for engines with a
/// suffixed deferred variant). `raw_call` is the single low-level entry
/// point taking `[command, ...args]`.
#[async_trait]
pub trait EngineClient: Send + Sync + 'static {
    /// Whether the client exposes a per-command method under this name
    fn has_method(&self, method: &str) -> bool;

    async fn call_method(&self, method: &str, args: Vec<Vec<u8>>)
        -> Result<Value, CommandError>;

    async fn raw_call(&self, argv: Vec<Vec<u8>>) -> Result<Value, CommandError>;

    /// Release the underlying connection
    async fn close(&self) {}
}

/// Live connection to one store node
#[derive(Clone)]
pub struct ClientHandle {
    engine: Engine,
    client: Arc<dyn EngineClient>,
    events: EventEmitter,
}

impl ClientHandle {
    pub fn new(engine: Engine, client: Arc<dyn EngineClient>, events: EventEmitter) -> Self {
        Self {
            engine,
            client,
            events,
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Register for lifecycle events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Emit a lifecycle event on this handle
    pub fn emit(&self, event: ClientEvent) {
        self.events.emit(event);
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.client.has_method(method)
    }

    pub async fn call_method(
        &self,
        method: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<Value, CommandError> {
        if !self.client.has_method(method) {
            return Err(CommandError::UnknownMethod {
                engine: self.engine.to_string(),
                method: method.to_string(),
            });
        }
        self.client.call_method(method, args).await
    }

    pub async fn raw_call(&self, argv: Vec<Vec<u8>>) -> Result<Value, CommandError> {
        self.client.raw_call(argv).await
    }

    /// Close the connection and emit `End`
    pub async fn close(&self) {
        self.client.close().await;
        self.events.emit(ClientEvent::End);
    }

    /// True when both handles refer to the same underlying client
    pub fn same_client(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// A freshly created handle plus the subscriber that observes its
/// first lifecycle events
pub struct PendingClient {
    pub handle: ClientHandle,
    pub events: broadcast::Receiver<ClientEvent>,
}

impl PendingClient {
    pub fn new(engine: Engine, client: Arc<dyn EngineClient>) -> (Self, EventEmitter) {
        let (emitter, events) = EventEmitter::channel();
        let handle = ClientHandle::new(engine, client, emitter.clone());
        (Self { handle, events }, emitter)
    }
}
