//! Client module: connecting to a node and calling commands on it

pub mod connection;
pub mod dispatch;
pub mod establish;
pub mod retry;

pub use connection::{build_single_client, Client, ClientOptions, RedisConnection};
pub use dispatch::{
    strip_async_suffix, CallingConvention, CommandFuture, Invocable, InvocationTarget,
    ASYNC_SUFFIX,
};
pub use establish::attempt_connect;
pub use retry::connect_with_retry;
