//! Shared test helpers: an adapter whose clients follow a script

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::CallingConvention;
use crate::config::ResolvedConfig;
use crate::engine::{
    ClientEvent, Engine, EngineAdapter, EngineClient, MockAdapter, MockKeyspace, PendingClient,
};

/// Lifecycle behavior of one scripted client
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit "ready" after the delay
    Ready(Duration),
    /// Emit "error" after the delay, never "ready"
    Error(Duration),
    /// Never emit anything
    Silent,
    /// Emit "ready", then "error" after a further delay
    ReadyThenError(Duration, Duration),
}

/// Adapter handing out clients that follow `scripts` in order
///
/// Once the scripts run out, the last one repeats. Commands on the
/// resulting handles run against an in-process keyspace.
pub struct ScriptedAdapter {
    engine: Engine,
    scripts: Vec<Script>,
    attempts: AtomicU32,
    inner: MockAdapter,
    created: Mutex<Vec<crate::engine::ClientHandle>>,
}

impl ScriptedAdapter {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self::for_engine(Engine::RedisMock, scripts)
    }

    pub fn for_engine(engine: Engine, scripts: Vec<Script>) -> Self {
        Self {
            engine,
            scripts,
            attempts: AtomicU32::new(0),
            inner: MockAdapter::with_keyspace(Arc::new(MockKeyspace::new())),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Number of clients created so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every handle created so far, oldest first
    pub fn created(&self) -> Vec<crate::engine::ClientHandle> {
        self.created.lock().clone()
    }
}

impl EngineAdapter for ScriptedAdapter {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn create_client(&self, config: &ResolvedConfig) -> PendingClient {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) as usize;
        let script = self
            .scripts
            .get(n)
            .or_else(|| self.scripts.last())
            .cloned()
            .unwrap_or(Script::Silent);

        // Reuse the mock client for command execution, but drive the
        // lifecycle from the script instead of the mock's own "ready"
        let client: Arc<dyn EngineClient> = Arc::new(Passthrough {
            engine: self.engine,
            inner: self.inner.create_client(config).handle,
        });
        let (pending, emitter) = PendingClient::new(self.engine, client);
        self.created.lock().push(pending.handle.clone());

        tokio::spawn(async move {
            match script {
                Script::Ready(after) => {
                    tokio::time::sleep(after).await;
                    emitter.emit(ClientEvent::Ready);
                }
                Script::Error(after) => {
                    tokio::time::sleep(after).await;
                    emitter.emit(ClientEvent::Error("ECONNREFUSED".to_string()));
                }
                Script::Silent => {}
                Script::ReadyThenError(ready_after, error_after) => {
                    tokio::time::sleep(ready_after).await;
                    emitter.emit(ClientEvent::Ready);
                    tokio::time::sleep(error_after).await;
                    emitter.emit(ClientEvent::Error("ECONNRESET".to_string()));
                }
            }
        });

        pending
    }
}

struct Passthrough {
    engine: Engine,
    inner: crate::engine::ClientHandle,
}

#[async_trait::async_trait]
impl EngineClient for Passthrough {
    fn has_method(&self, method: &str) -> bool {
        if self.engine.calling_convention() == CallingConvention::Direct
            && method.ends_with(crate::client::ASYNC_SUFFIX)
        {
            return false;
        }
        self.inner.has_method(method)
    }

    async fn call_method(
        &self,
        method: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<redis::Value, crate::utils::CommandError> {
        self.inner.call_method(method, args).await
    }

    async fn raw_call(
        &self,
        argv: Vec<Vec<u8>>,
    ) -> Result<redis::Value, crate::utils::CommandError> {
        self.inner.raw_call(argv).await
    }
}
