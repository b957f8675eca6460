//! Primary/replica topology description

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{RedisConfig, RetryPolicy};
use crate::utils::Error;

fn default_engine() -> String {
    "redis".to_string()
}

/// Topology plus the settings used to connect to it
///
/// Loadable from JSON, e.g.
/// ```json
/// {
///   "primary": {"url": "redis://primary:6379/1"},
///   "replicas": [{"url": "redis://replica-1:6379/1"}],
///   "engine": "ioredis",
///   "options": {"maxReconnectionAttempts": 3}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub primary: RedisConfig,
    #[serde(default)]
    pub replicas: Vec<RedisConfig>,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub default_redis_db: i64,
    #[serde(default)]
    pub options: RetryPolicy,
}

impl ClusterSpec {
    pub fn new(primary: RedisConfig, replicas: Vec<RedisConfig>) -> Self {
        Self {
            primary,
            replicas,
            engine: default_engine(),
            default_redis_db: 0,
            options: RetryPolicy::default(),
        }
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_options(mut self, options: RetryPolicy) -> Self {
        self.options = options;
        self
    }

    /// Load a spec from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid cluster spec {:?}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_minimal() {
        let spec: ClusterSpec =
            serde_json::from_str(r#"{"primary": {"url": "redis://p:6379"}}"#).unwrap();
        assert_eq!(spec.engine, "redis");
        assert!(spec.replicas.is_empty());
        assert_eq!(spec.default_redis_db, 0);
        assert_eq!(spec.options, RetryPolicy::default());
    }

    #[test]
    fn test_parse_full() {
        let spec: ClusterSpec = serde_json::from_str(
            r#"{
                "primary": {"host": "p", "port": 6379},
                "replicas": [{"url": "redis://r1:6379"}, {"url": "redis://r2:6379"}],
                "engine": "redis-mock",
                "defaultRedisDb": 2,
                "options": {"maxReconnectionAttempts": 1, "maxDelayBetweenReconnections": 0.5}
            }"#,
        )
        .unwrap();

        assert_eq!(spec.replicas.len(), 2);
        assert_eq!(spec.engine, "redis-mock");
        assert_eq!(spec.default_redis_db, 2);
        assert_eq!(spec.options.max_reconnection_attempts, 1);
        assert_eq!(spec.options.attempt_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_file_rejects_bad_timeout() {
        let path = std::env::temp_dir().join(format!(
            "redis-connection-spec-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{"primary": {}, "options": {"maxDelayBetweenReconnections": -1}}"#,
        )
        .unwrap();

        let err = ClusterSpec::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("positive")));
    }

    #[test]
    fn test_from_missing_file() {
        let err = ClusterSpec::from_file(Path::new("/nonexistent/cluster.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
