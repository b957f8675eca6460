//! Error types for redis-connection

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Top-level library error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Connection establishment errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Engine tag outside the supported set; raised at construction
    #[error("Unsupported Redis engine: {0}")]
    UnsupportedEngine(String),

    #[error("Invalid connection URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A single attempt did not reach "ready" in time
    #[error("connection timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The underlying client reported an error before "ready"
    #[error("client error: {0}")]
    Client(String),

    /// The client dropped its event channel without settling
    #[error("connection closed before ready")]
    Closed,

    #[error("max reconnection attempts ({attempts}) reached")]
    RetryExhausted { attempts: u32 },
}

/// Command invocation errors
#[derive(Error, Debug)]
pub enum CommandError {
    /// The handle has no method under the resolved name
    #[error("{engine} client has no method '{method}'")]
    UnknownMethod { engine: String, method: String },

    #[error("{0} client is not connected")]
    NotConnected(String),

    #[error("no replica available to serve read-only command '{0}'")]
    NoReplicaAvailable(String),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// Error reply produced by an in-process engine
    #[error("ERR {0}")]
    Server(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
