//! Configuration module

pub mod cli;
pub mod cluster_spec;
pub mod connection_config;
pub mod retry_policy;

pub use cli::CliArgs;
pub use cluster_spec::ClusterSpec;
pub use connection_config::{RedisConfig, ResolvedConfig, DEFAULT_PORT};
pub use retry_policy::RetryPolicy;
