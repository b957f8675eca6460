//! Primary/replica routing through the public API

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use redis::Value;
use redis_connection::{
    build_cluster, Cluster, ClusterOptions, ClusterSpec, CommandClassifier, CommandError,
    Commands, CommandsExt, ConnectionError, Diagnostics, Error, RedisConfig, RedisConnection,
    RetryPolicy,
};

fn topology(replicas: usize) -> ClusterOptions {
    ClusterOptions {
        master: RedisConfig::from_url("redis://primary:6379/2"),
        slaves: (1..=replicas)
            .map(|i| RedisConfig::from_url(format!("redis://replica-{}:6379/2", i)))
            .collect(),
        engine: "redis-mock".to_string(),
        verbose: Diagnostics::disabled(),
        ..ClusterOptions::default()
    }
}

async fn mock_cluster(replicas: usize) -> Cluster {
    RedisConnection::elasti_cluster(topology(replicas))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reads_spread_over_replicas_writes_hit_primary() {
    let cluster = mock_cluster(2).await;
    let primary = cluster.primary().client.handle().clone();
    let mut hits: HashMap<String, usize> = HashMap::new();

    for _ in 0..500 {
        let inv = cluster.command("getAsync").unwrap();
        assert!(!inv.handle().same_client(&primary));
        let node = cluster
            .replicas()
            .iter()
            .find(|n| n.client.handle().same_client(inv.handle()))
            .unwrap();
        *hits.entry(node.display_name.clone()).or_default() += 1;

        let inv = cluster.command("setAsync").unwrap();
        assert!(inv.handle().same_client(&primary));
    }

    assert_eq!(hits.len(), 2, "{:?}", hits);
    assert!(hits.values().all(|&n| n > 100), "{:?}", hits);
}

#[tokio::test]
async fn test_set_then_get_through_cluster() {
    let cluster = mock_cluster(2).await;

    cluster.invoke("set", &["k", "plain"]).await.unwrap();
    assert_eq!(
        cluster.invoke("getAsync", &["k"]).await.unwrap(),
        Value::BulkString(b"plain".to_vec())
    );
}

#[tokio::test]
async fn test_no_replicas_rejects_reads_only() {
    let cluster = mock_cluster(0).await;

    assert!(cluster.replicas().is_empty());
    assert!(matches!(
        cluster.get("k").await,
        Err(CommandError::NoReplicaAvailable(_))
    ));
    assert_eq!(cluster.set("k", "v").await.unwrap(), Value::Okay);
    assert_eq!(
        cluster.ping().await.unwrap(),
        Value::SimpleString("PONG".to_string())
    );
}

#[tokio::test]
async fn test_unreachable_replica_fails_whole_build() {
    // Port 1 on localhost refuses connections
    let options = ClusterOptions {
        master: RedisConfig::from_host("127.0.0.1", 1),
        slaves: vec![RedisConfig::from_host("127.0.0.1", 1)],
        engine: "redis".to_string(),
        options: RetryPolicy::new(1, Duration::from_secs(2)),
        ..topology(0)
    };
    let err = RedisConnection::elasti_cluster(options).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Connection(ConnectionError::RetryExhausted { attempts: 2 })
    ));
}

#[tokio::test]
async fn test_custom_classifier() {
    struct EverythingReads;
    impl CommandClassifier for EverythingReads {
        fn is_read_only(&self, _command: &str) -> bool {
            true
        }
    }

    let options = topology(1).with_classifier(Arc::new(EverythingReads));
    let cluster = RedisConnection::elasti_cluster(options).await.unwrap();

    assert_eq!(cluster.route("set").unwrap().display_name, "slave 1");
}

#[tokio::test]
async fn test_mock_cluster_from_spec() {
    let spec: ClusterSpec = serde_json::from_str(
        r#"{
            "primary": {"url": "redis://primary:6379"},
            "replicas": [{"url": "redis://r1:6379"}, {"url": "redis://r2:6379"}],
            "engine": "redis-mock",
            "defaultRedisDb": 4
        }"#,
    )
    .unwrap();

    let cluster = build_cluster(&spec, Diagnostics::disabled()).await.unwrap();
    for node in cluster.nodes() {
        assert_eq!(node.connection.config().db, 4);
    }

    cluster.set("counter", "41").await.unwrap();
    cluster.incr("counter").await.unwrap();
    assert_eq!(
        cluster.get("counter").await.unwrap(),
        Value::BulkString(b"42".to_vec())
    );

    cluster.close().await;
    assert!(matches!(
        cluster.get("counter").await,
        Err(CommandError::NotConnected(_))
    ));
}

#[tokio::test]
async fn test_bad_timeout_in_spec_is_rejected() {
    let parsed = serde_json::from_str::<ClusterSpec>(
        r#"{"primary": {}, "options": {"maxDelayBetweenReconnections": 0}}"#,
    );
    assert!(parsed.is_err());
}
