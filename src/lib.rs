//! redis-connection library
//!
//! Resilient connections to a Redis-compatible store over interchangeable
//! client engines, with bounded retry and read/write routing across a
//! primary and its replicas.
//!
//! ```no_run
//! use redis_connection::{build_single_client, ClientOptions, CommandsExt};
//!
//! # async fn demo() -> redis_connection::Result<()> {
//! let client = build_single_client(ClientOptions::default()).await?;
//! client.set("greeting", "hello").await?;
//! let value = client.get("greeting").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod engine;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use client::{
    build_single_client, CallingConvention, Client, ClientOptions, Invocable, RedisConnection,
};
pub use cluster::{build_cluster, Cluster, ClusterNode, ClusterOptions};
pub use commands::{CommandClassifier, CommandTable, Commands, CommandsExt};
pub use config::{ClusterSpec, RedisConfig, ResolvedConfig, RetryPolicy};
pub use engine::{select_adapter, ClientEvent, ClientHandle, Engine, EngineAdapter};
pub use utils::{CommandError, ConnectionError, Diagnostics, Error, Result};
