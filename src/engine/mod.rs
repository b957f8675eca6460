//! Engine adapters
//!
//! An engine is a specific underlying client library. Each adapter
//! normalizes one engine into a uniform capability: create a client
//! handle for a config, and report which calling convention its
//! handles use for commands.
//!
//! Supported engines:
//! - `ioredis`: direct per-command methods
//! - `redis`: per-command methods plus `<command>Async` variants
//! - `redis-fast-driver`: a single raw-call entry point
//! - `redis-mock`: in-process keyspace, `<command>Async` variants

pub mod handle;
pub mod keyspace;
pub mod mock;
pub mod network;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use handle::{ClientEvent, ClientHandle, EngineClient, EventEmitter, PendingClient};
pub use keyspace::MockKeyspace;
pub use mock::MockAdapter;
pub use network::NetworkAdapter;

use crate::client::CallingConvention;
use crate::config::ResolvedConfig;
use crate::utils::ConnectionError;

/// Engine selector (closed set of supported client libraries)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Ioredis,
    RedisMock,
    Redis,
    RedisFastDriver,
}

impl Engine {
    pub const ALL: [Engine; 4] = [
        Engine::Ioredis,
        Engine::RedisMock,
        Engine::Redis,
        Engine::RedisFastDriver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Ioredis => "ioredis",
            Engine::RedisMock => "redis-mock",
            Engine::Redis => "redis",
            Engine::RedisFastDriver => "redis-fast-driver",
        }
    }

    /// Calling convention used by this engine's handles
    pub fn calling_convention(&self) -> CallingConvention {
        match self {
            Engine::Ioredis => CallingConvention::Direct,
            Engine::Redis | Engine::RedisMock => CallingConvention::Suffixed,
            Engine::RedisFastDriver => CallingConvention::RawDispatch,
        }
    }

    /// Whether `<command>Async` names are native on this engine
    pub fn supports_native_async(&self) -> bool {
        self.calling_convention() == CallingConvention::Suffixed
    }

    /// Build the adapter for this engine
    pub fn adapter(&self) -> Arc<dyn EngineAdapter> {
        match self {
            Engine::RedisMock => Arc::new(MockAdapter::new()),
            Engine::Ioredis | Engine::Redis | Engine::RedisFastDriver => {
                Arc::new(NetworkAdapter::new(*self))
            }
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Engine::ALL
            .iter()
            .copied()
            .find(|engine| engine.as_str() == s)
            .ok_or_else(|| ConnectionError::UnsupportedEngine(s.to_string()))
    }
}

/// Uniform capability over one underlying client library
pub trait EngineAdapter: Send + Sync {
    fn engine(&self) -> Engine;

    fn calling_convention(&self) -> CallingConvention {
        self.engine().calling_convention()
    }

    fn supports_native_async(&self) -> bool {
        self.calling_convention() == CallingConvention::Suffixed
    }

    /// Create a client that starts connecting immediately
    ///
    /// Must be called from within a tokio runtime. The returned
    /// subscriber observes the client's "ready" or "error" outcome.
    fn create_client(&self, config: &ResolvedConfig) -> PendingClient;
}

/// Select an adapter by engine tag, failing fast on unknown tags
pub fn select_adapter(tag: &str) -> Result<Arc<dyn EngineAdapter>, ConnectionError> {
    Ok(tag.parse::<Engine>()?.adapter())
}
