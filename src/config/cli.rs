//! Command-line argument parsing for the smoke-test binary

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::{ClusterSpec, RedisConfig, RetryPolicy};
use crate::utils::Error;

/// Connect to a store (single node or primary/replica cluster) and run a
/// get/set/get/expire round trip
#[derive(Parser, Debug, Clone)]
#[command(name = "redis-connection")]
#[command(version, about, long_about = None)]
#[command(disable_help_flag = true)]
pub struct CliArgs {
    /// Print help information
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: (),

    // ===== Connection Options =====
    /// Connection URL, e.g. redis://:secret@host:6379/2
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Server hostname (overrides the URL host)
    #[arg(short = 'h', long = "host")]
    pub host: Option<String>,

    /// Server port (overrides the URL port)
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Logical database index
    #[arg(short = 'n', long = "db")]
    pub db: Option<i64>,

    /// Password for AUTH
    #[arg(short = 'a', long = "password")]
    pub password: Option<String>,

    /// Replica URL (can be specified multiple times; enables cluster mode)
    #[arg(long = "replica", action = clap::ArgAction::Append)]
    pub replicas: Vec<String>,

    /// JSON cluster spec (overrides the connection options above)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    // ===== Engine Options =====
    /// Client engine: ioredis, redis, redis-fast-driver or redis-mock
    #[arg(short = 'e', long = "engine", default_value = "redis")]
    pub engine: String,

    /// Reconnection attempts after the first failure
    #[arg(long = "max-attempts", default_value_t = 6)]
    pub max_attempts: u32,

    /// Per-attempt connect timeout in seconds
    #[arg(short = 't', long = "timeout", default_value_t = 5.0)]
    pub timeout_secs: f64,

    // ===== Smoke Test =====
    /// Key used for the round trip
    #[arg(short = 'k', long = "key", default_value = "redis-connection:smoke")]
    pub key: String,

    // ===== Output Options =====
    /// Quiet mode (errors only)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Verbose output (per-attempt and per-command diagnostics)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl CliArgs {
    /// Primary connection settings from the discrete flags
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.url.clone(),
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            password: self.password.clone(),
            ..RedisConfig::default()
        }
    }

    /// Retry policy from `--max-attempts` and `--timeout`
    pub fn retry_policy(&self) -> Result<RetryPolicy, Error> {
        let policy = RetryPolicy {
            max_reconnection_attempts: self.max_attempts,
            max_delay_between_reconnections: self.timeout_secs,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn attempt_timeout(&self) -> Result<Duration, Error> {
        Ok(self.retry_policy()?.attempt_timeout())
    }

    /// Cluster topology, if one was requested
    ///
    /// A `--config` file wins; otherwise `--replica` flags turn the
    /// connection options into the primary of a cluster.
    pub fn cluster_spec(&self) -> Result<Option<ClusterSpec>, Error> {
        if let Some(ref path) = self.config {
            return ClusterSpec::from_file(path).map(Some);
        }
        if self.replicas.is_empty() {
            return Ok(None);
        }

        let replicas = self
            .replicas
            .iter()
            .map(|url| RedisConfig {
                db: self.db,
                password: self.password.clone(),
                ..RedisConfig::from_url(url.as_str())
            })
            .collect();

        Ok(Some(
            ClusterSpec::new(self.redis_config(), replicas)
                .with_engine(self.engine.clone())
                .with_options(self.retry_policy()?),
        ))
    }
}
