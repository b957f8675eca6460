//! Single-node connection and the client it produces

use std::sync::Arc;

use crate::cluster::{build_cluster_with, Cluster, ClusterOptions};
use crate::commands::Commands;
use crate::config::{RedisConfig, ResolvedConfig, RetryPolicy};
use crate::engine::{select_adapter, ClientHandle, Engine, EngineAdapter};
use crate::utils::{CommandError, ConnectionError, Diagnostics, Error};

use super::dispatch::{CallingConvention, Invocable};
use super::retry::connect_with_retry;

/// Connection settings for one store node, bound to an engine
///
/// The configuration is resolved once at construction and never
/// changes afterwards.
#[derive(Clone)]
pub struct RedisConnection {
    config: ResolvedConfig,
    adapter: Arc<dyn EngineAdapter>,
    diagnostics: Diagnostics,
}

impl RedisConnection {
    /// Create a connection for `engine`
    ///
    /// Fails immediately on an unsupported engine tag or a malformed URL.
    pub fn new(
        config: &RedisConfig,
        default_db: i64,
        engine: &str,
        diagnostics: Diagnostics,
    ) -> Result<Self, Error> {
        let adapter = select_adapter(engine)?;
        Self::with_adapter(config, default_db, adapter, diagnostics)
    }

    /// Create a connection over an already-selected adapter
    pub fn with_adapter(
        config: &RedisConfig,
        default_db: i64,
        adapter: Arc<dyn EngineAdapter>,
        diagnostics: Diagnostics,
    ) -> Result<Self, Error> {
        let config = config.resolve(default_db)?;
        Ok(Self {
            config,
            adapter,
            diagnostics,
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn engine(&self) -> Engine {
        self.adapter.engine()
    }

    pub fn adapter(&self) -> &Arc<dyn EngineAdapter> {
        &self.adapter
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Whether `<command>Async` names are native on this engine
    pub fn engine_supports_async(&self) -> bool {
        self.adapter.supports_native_async()
    }

    /// Connect, retrying per `policy`
    pub async fn connect(&self, policy: RetryPolicy) -> Result<Client, ConnectionError> {
        let handle =
            connect_with_retry(self.adapter.as_ref(), &self.config, policy, &self.diagnostics)
                .await?;
        Ok(Client::new(
            handle,
            self.adapter.calling_convention(),
            self.diagnostics.clone(),
        ))
    }

    /// Build and connect a single client
    pub async fn client(options: ClientOptions) -> Result<Client, Error> {
        build_single_client(options).await
    }

    /// Build and connect a primary/replica cluster
    pub async fn elasti_cluster(options: ClusterOptions) -> Result<Cluster, Error> {
        let adapter = select_adapter(&options.engine)?;
        build_cluster_with(options, adapter).await
    }
}

impl std::fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnection")
            .field("config", &self.config)
            .field("engine", &self.engine())
            .finish()
    }
}

/// A connected handle plus the convention used to call commands on it
#[derive(Debug, Clone)]
pub struct Client {
    handle: ClientHandle,
    convention: CallingConvention,
    diagnostics: Diagnostics,
}

impl Client {
    pub fn new(
        handle: ClientHandle,
        convention: CallingConvention,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            handle,
            convention,
            diagnostics,
        }
    }

    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    pub fn calling_convention(&self) -> CallingConvention {
        self.convention
    }

    pub fn engine(&self) -> Engine {
        self.handle.engine()
    }

    pub fn engine_supports_async(&self) -> bool {
        self.convention == CallingConvention::Suffixed
    }

    pub async fn close(&self) {
        self.handle.close().await;
    }
}

impl Commands for Client {
    fn command(&self, requested: &str) -> Result<Invocable, CommandError> {
        Ok(self
            .convention
            .resolve(&self.handle, requested, &self.diagnostics))
    }
}

/// Options for `build_single_client`
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub redis_config: RedisConfig,
    pub default_redis_db: i64,
    pub engine: String,
    pub verbose: Diagnostics,
    pub options: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            redis_config: RedisConfig::default(),
            default_redis_db: 0,
            engine: Engine::Redis.as_str().to_string(),
            verbose: Diagnostics::tracing(),
            options: RetryPolicy::default(),
        }
    }
}

/// Resolve, select the engine and connect one client
pub async fn build_single_client(options: ClientOptions) -> Result<Client, Error> {
    options.options.validate()?;
    let connection = RedisConnection::new(
        &options.redis_config,
        options.default_redis_db,
        &options.engine,
        options.verbose,
    )?;
    Ok(connection.connect(options.options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandsExt;
    use crate::testutil::{Script, ScriptedAdapter};
    use redis::Value;
    use std::time::Duration;

    fn mock_options() -> ClientOptions {
        ClientOptions {
            engine: "redis-mock".to_string(),
            verbose: Diagnostics::disabled(),
            ..ClientOptions::default()
        }
    }

    #[test]
    fn test_unsupported_engine_fails_at_construction() {
        let err = RedisConnection::new(
            &RedisConfig::default(),
            0,
            "memcached",
            Diagnostics::disabled(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::UnsupportedEngine(ref e)) if e == "memcached"
        ));
    }

    #[test]
    fn test_config_resolved_at_construction() {
        let conn = RedisConnection::new(
            &RedisConfig::from_url("redis://cache:1234/5"),
            0,
            "redis",
            Diagnostics::disabled(),
        )
        .unwrap();
        assert_eq!(conn.config().host.as_deref(), Some("cache"));
        assert_eq!(conn.config().port, Some(1234));
        assert_eq!(conn.config().db, 5);
        assert!(conn.config().url.is_none());
        assert!(conn.engine_supports_async());
    }

    #[tokio::test]
    async fn test_single_client_round_trip() {
        let client = build_single_client(mock_options()).await.unwrap();
        assert!(client.engine_supports_async());

        assert_eq!(client.set("k", "v").await.unwrap(), Value::Okay);
        assert_eq!(
            client.invoke("getAsync", &["k"]).await.unwrap(),
            Value::BulkString(b"v".to_vec())
        );
        assert_eq!(client.expire("k", 10).await.unwrap(), Value::Int(1));
    }

    #[tokio::test]
    async fn test_client_factory_surfaces_engine_error() {
        let err = RedisConnection::client(ClientOptions {
            engine: "nope".to_string(),
            ..mock_options()
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::UnsupportedEngine(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_timeout_rejected_before_connecting() {
        let err = build_single_client(ClientOptions {
            options: RetryPolicy {
                max_reconnection_attempts: 1,
                max_delay_between_reconnections: 0.0,
            },
            ..mock_options()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_exhaustion_reports_attempts() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![Script::Error(
            Duration::from_millis(5),
        )]));
        let conn = RedisConnection::with_adapter(
            &RedisConfig::default(),
            0,
            adapter.clone(),
            Diagnostics::disabled(),
        )
        .unwrap();

        let err = conn
            .connect(RetryPolicy::new(2, Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert_eq!(err, ConnectionError::RetryExhausted { attempts: 3 });
        assert_eq!(adapter.attempts(), 3);
    }

    async fn connect_as(engine: Engine, script: Script) -> (Client, Arc<ScriptedAdapter>) {
        let adapter = Arc::new(ScriptedAdapter::for_engine(engine, vec![script]));
        let conn = RedisConnection::with_adapter(
            &RedisConfig::from_host("127.0.0.1", 6379),
            0,
            adapter.clone(),
            Diagnostics::disabled(),
        )
        .unwrap();
        let client = conn.connect(RetryPolicy::default()).await.unwrap();
        (client, adapter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_every_engine_both_names() {
        for engine in Engine::ALL {
            let (client, _) = connect_as(engine, Script::Ready(Duration::from_millis(1))).await;

            assert_eq!(client.invoke("set", &["k", "plain"]).await.unwrap(), Value::Okay);
            assert_eq!(
                client.invoke("get", &["k"]).await.unwrap(),
                Value::BulkString(b"plain".to_vec()),
                "engine {}",
                engine
            );

            client.invoke("setAsync", &["k", "deferred"]).await.unwrap();
            assert_eq!(
                client.invoke("getAsync", &["k"]).await.unwrap(),
                Value::BulkString(b"deferred".to_vec()),
                "engine {}",
                engine
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_targets_per_engine() {
        use crate::client::InvocationTarget;

        let cases = [
            (Engine::Ioredis, InvocationTarget::Method("get".to_string())),
            (Engine::Redis, InvocationTarget::Method("getAsync".to_string())),
            (Engine::RedisMock, InvocationTarget::Method("getAsync".to_string())),
            (Engine::RedisFastDriver, InvocationTarget::Raw("get".to_string())),
        ];

        for (engine, expected) in cases {
            let (client, _) = connect_as(engine, Script::Ready(Duration::from_millis(1))).await;
            let invocable = client.command("getAsync").unwrap();
            assert_eq!(invocable.command(), "get");
            assert_eq!(invocable.target(), &expected, "engine {}", engine);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_ready_leaves_client_usable() {
        let (client, adapter) = connect_as(
            Engine::Redis,
            Script::ReadyThenError(Duration::from_millis(5), Duration::from_millis(5)),
        )
        .await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(adapter.attempts(), 1);
        assert_eq!(client.set("k", "v").await.unwrap(), Value::Okay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_engine_accepts_suffixed_requests() {
        let adapter = Arc::new(ScriptedAdapter::for_engine(
            Engine::Ioredis,
            vec![Script::Ready(Duration::from_millis(1))],
        ));
        let conn = RedisConnection::with_adapter(
            &RedisConfig::default(),
            0,
            adapter,
            Diagnostics::disabled(),
        )
        .unwrap();
        let client = conn.connect(RetryPolicy::default()).await.unwrap();
        assert!(!client.engine_supports_async());

        client.invoke("setAsync", &["k", "1"]).await.unwrap();
        assert_eq!(client.incr("k").await.unwrap(), Value::Int(2));
    }
}
