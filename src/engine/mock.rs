//! `redis-mock` engine: in-process clients over a shared keyspace

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::Value;

use super::handle::{ClientEvent, EngineClient, PendingClient};
use super::keyspace::MockKeyspace;
use super::{Engine, EngineAdapter};
use crate::client::{strip_async_suffix, ASYNC_SUFFIX};
use crate::config::ResolvedConfig;
use crate::utils::CommandError;

/// Adapter creating mock clients
///
/// Every client created by one adapter shares its keyspace, so writes
/// made through one node are visible through every other node.
#[derive(Clone, Default)]
pub struct MockAdapter {
    keyspace: Arc<MockKeyspace>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyspace(keyspace: Arc<MockKeyspace>) -> Self {
        Self { keyspace }
    }

    pub fn keyspace(&self) -> &Arc<MockKeyspace> {
        &self.keyspace
    }
}

impl EngineAdapter for MockAdapter {
    fn engine(&self) -> Engine {
        Engine::RedisMock
    }

    fn create_client(&self, config: &ResolvedConfig) -> PendingClient {
        let client = Arc::new(MockClient {
            keyspace: self.keyspace.clone(),
            db: config.db,
            closed: AtomicBool::new(false),
        });
        let (pending, emitter) = PendingClient::new(Engine::RedisMock, client);
        tokio::spawn(async move {
            emitter.emit(ClientEvent::Ready);
        });
        pending
    }
}

struct MockClient {
    keyspace: Arc<MockKeyspace>,
    db: i64,
    closed: AtomicBool,
}

#[async_trait]
impl EngineClient for MockClient {
    /// Answers both `get` and `getAsync`
    fn has_method(&self, method: &str) -> bool {
        !method.is_empty() && method != ASYNC_SUFFIX
    }

    async fn call_method(
        &self,
        method: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<Value, CommandError> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(strip_async_suffix(method).as_bytes().to_vec());
        argv.extend(args);
        self.raw_call(argv).await
    }

    async fn raw_call(&self, argv: Vec<Vec<u8>>) -> Result<Value, CommandError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CommandError::NotConnected(Engine::RedisMock.to_string()));
        }
        self.keyspace.execute(self.db, &argv)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
