//! Network engines backed by the `redis` crate
//!
//! - `ioredis`: auto-reconnecting `ConnectionManager`, direct methods
//! - `redis`: `MultiplexedConnection`, methods plus `<command>Async`
//! - `redis-fast-driver`: `MultiplexedConnection`, raw argv calls only

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{
    Cmd, ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo, RedisResult,
    Value,
};
use parking_lot::Mutex;
use tracing::debug;

use super::handle::{ClientEvent, ClientHandle, EngineClient, EventEmitter, PendingClient};
use super::{Engine, EngineAdapter};
use crate::client::{strip_async_suffix, CallingConvention, ASYNC_SUFFIX};
use crate::config::ResolvedConfig;
use crate::utils::CommandError;

/// Adapter for the engines that talk to a real server
#[derive(Debug, Clone, Copy)]
pub struct NetworkAdapter {
    engine: Engine,
}

impl NetworkAdapter {
    /// `redis-mock` has no network backing and maps to `redis`;
    /// use `MockAdapter` for the in-process engine.
    pub fn new(engine: Engine) -> Self {
        let engine = match engine {
            Engine::RedisMock => Engine::Redis,
            other => other,
        };
        Self { engine }
    }
}

impl EngineAdapter for NetworkAdapter {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn create_client(&self, config: &ResolvedConfig) -> PendingClient {
        let (emitter, events) = EventEmitter::channel();
        let client = Arc::new(NetworkClient {
            engine: self.engine,
            conn: Mutex::new(None),
            closed: AtomicBool::new(false),
            events: emitter.clone(),
        });
        let handle = ClientHandle::new(self.engine, client.clone(), emitter);

        let info = connection_info(config);
        tokio::spawn(async move {
            let outcome = match info {
                Ok(info) => client.establish(info).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => client.events.emit(ClientEvent::Ready),
                Err(e) => {
                    debug!("{} connect failed: {}", client.engine, e);
                    client.events.emit(ClientEvent::Error(e.to_string()));
                }
            }
        });

        PendingClient { handle, events }
    }
}

/// Build `redis` connection info from a resolved config
fn connection_info(config: &ResolvedConfig) -> RedisResult<ConnectionInfo> {
    if let (None, Some(url)) = (&config.host, &config.url) {
        return url.as_str().into_connection_info();
    }

    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(
            config.host_or_default().to_string(),
            config.port_or_default(),
        ),
        redis: RedisConnectionInfo {
            db: config.db,
            username: config.username.clone(),
            password: config.password.clone(),
            ..Default::default()
        },
    })
}

#[derive(Clone)]
enum NodeConnection {
    Managed(ConnectionManager),
    Multiplexed(MultiplexedConnection),
}

impl NodeConnection {
    async fn query(&self, cmd: &Cmd) -> RedisResult<Value> {
        match self {
            NodeConnection::Managed(conn) => {
                let mut conn = conn.clone();
                cmd.query_async(&mut conn).await
            }
            NodeConnection::Multiplexed(conn) => {
                let mut conn = conn.clone();
                cmd.query_async(&mut conn).await
            }
        }
    }
}

struct NetworkClient {
    engine: Engine,
    /// Taken on close so the underlying connection is released
    conn: Mutex<Option<NodeConnection>>,
    closed: AtomicBool,
    events: EventEmitter,
}

impl NetworkClient {
    /// Connect and verify the server answers PING
    async fn establish(&self, info: ConnectionInfo) -> RedisResult<()> {
        let client = redis::Client::open(info)?;
        let conn = match self.engine {
            Engine::Ioredis => NodeConnection::Managed(ConnectionManager::new(client).await?),
            _ => NodeConnection::Multiplexed(client.get_multiplexed_async_connection().await?),
        };
        let _pong: Value = conn.query(&redis::cmd("PING")).await?;

        let mut slot = self.conn.lock();
        if !self.closed.load(Ordering::Acquire) {
            *slot = Some(conn);
        }
        Ok(())
    }

    async fn execute(&self, argv: Vec<Vec<u8>>) -> Result<Value, CommandError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CommandError::NotConnected(self.engine.to_string()));
        }
        let conn = self
            .conn
            .lock()
            .clone()
            .ok_or_else(|| CommandError::NotConnected(self.engine.to_string()))?;

        let mut cmd = Cmd::new();
        for part in &argv {
            cmd.arg(part.as_slice());
        }

        conn.query(&cmd).await.map_err(|e| {
            if e.is_connection_dropped() || e.is_io_error() {
                self.events.emit(ClientEvent::Error(e.to_string()));
                if self.engine == Engine::Ioredis {
                    self.events.emit(ClientEvent::Reconnecting);
                }
            }
            CommandError::Redis(e)
        })
    }
}

#[async_trait]
impl EngineClient for NetworkClient {
    fn has_method(&self, method: &str) -> bool {
        exposes_method(self.engine.calling_convention(), method)
    }

    async fn call_method(
        &self,
        method: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<Value, CommandError> {
        let command = strip_async_suffix(method);
        let mut argv: Vec<Vec<u8>> = command
            .split_whitespace()
            .map(|word| word.to_ascii_uppercase().into_bytes())
            .collect();
        argv.extend(args);
        self.execute(argv).await
    }

    async fn raw_call(&self, argv: Vec<Vec<u8>>) -> Result<Value, CommandError> {
        if argv.is_empty() {
            return Err(CommandError::InvalidArgument("empty raw call".to_string()));
        }
        self.execute(argv).await
    }

    async fn close(&self) {
        let mut slot = self.conn.lock();
        self.closed.store(true, Ordering::Release);
        // In-flight commands hold their own clone and finish normally
        slot.take();
    }
}

/// Method names a handle of the given convention answers
///
/// Direct clients only know bare command names. Suffixed clients also
/// know `<command>Async`. Raw-dispatch clients forward any name.
fn exposes_method(convention: CallingConvention, method: &str) -> bool {
    if method.trim().is_empty() || method == ASYNC_SUFFIX {
        return false;
    }
    match convention {
        CallingConvention::Direct => !method.ends_with(ASYNC_SUFFIX),
        CallingConvention::Suffixed | CallingConvention::RawDispatch => true,
    }
}
