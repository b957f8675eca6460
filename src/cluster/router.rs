//! Read/write routing across a primary and its replicas

use std::fmt;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tokio::sync::broadcast::error::RecvError;

use super::node::{replica_name, ClusterNode, PRIMARY_NAME};
use crate::client::{strip_async_suffix, Client, Invocable, RedisConnection};
use crate::commands::{CommandClassifier, CommandTable, Commands};
use crate::config::{ClusterSpec, RedisConfig, RetryPolicy};
use crate::engine::{select_adapter, ClientEvent, Engine, EngineAdapter};
use crate::utils::{CommandError, ConnectionError, Diagnostics, Error};

/// Options for building a cluster
#[derive(Clone)]
pub struct ClusterOptions {
    pub master: RedisConfig,
    pub slaves: Vec<RedisConfig>,
    pub default_redis_db: i64,
    pub engine: String,
    pub verbose: Diagnostics,
    pub options: RetryPolicy,
    pub classifier: Arc<dyn CommandClassifier>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            master: RedisConfig::default(),
            slaves: Vec::new(),
            default_redis_db: 0,
            engine: Engine::Redis.as_str().to_string(),
            verbose: Diagnostics::tracing(),
            options: RetryPolicy::default(),
            classifier: Arc::new(CommandTable),
        }
    }
}

impl ClusterOptions {
    pub fn from_spec(spec: &ClusterSpec, verbose: Diagnostics) -> Self {
        Self {
            master: spec.primary.clone(),
            slaves: spec.replicas.clone(),
            default_redis_db: spec.default_redis_db,
            engine: spec.engine.clone(),
            verbose,
            options: spec.options,
            classifier: Arc::new(CommandTable),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn CommandClassifier>) -> Self {
        self.classifier = classifier;
        self
    }
}

impl fmt::Debug for ClusterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterOptions")
            .field("master", &self.master)
            .field("slaves", &self.slaves)
            .field("default_redis_db", &self.default_redis_db)
            .field("engine", &self.engine)
            .field("options", &self.options)
            .finish()
    }
}

/// Connected primary/replica topology
///
/// Every command is routed by name: read-only commands to a replica
/// chosen uniformly at random, all others to the primary. Nodes are
/// never reconnected or failed over once the cluster is built.
pub struct Cluster {
    primary: ClusterNode,
    replicas: Vec<ClusterNode>,
    classifier: Arc<dyn CommandClassifier>,
    diagnostics: Diagnostics,
}

impl Cluster {
    pub fn primary(&self) -> &ClusterNode {
        &self.primary
    }

    pub fn replicas(&self) -> &[ClusterNode] {
        &self.replicas
    }

    /// Primary first, then replicas in order
    pub fn nodes(&self) -> impl Iterator<Item = &ClusterNode> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }

    /// Node that would receive `requested`
    ///
    /// Read-only commands require at least one replica.
    pub fn route(&self, requested: &str) -> Result<&ClusterNode, CommandError> {
        let command = strip_async_suffix(requested);
        self.diagnostics.info(format_args!(
            "redisCommand: {}",
            command.to_ascii_uppercase()
        ));

        if self.classifier.is_read_only(command) {
            if self.replicas.is_empty() {
                return Err(CommandError::NoReplicaAvailable(command.to_string()));
            }
            self.diagnostics.info(format_args!(
                "Sending {} to random read-only replica",
                command
            ));
            Ok(&self.replicas[fastrand::usize(..self.replicas.len())])
        } else {
            self.diagnostics
                .info(format_args!("Sending {} to primary", command));
            Ok(&self.primary)
        }
    }

    /// Disconnect every node
    pub async fn close(&self) {
        join_all(self.nodes().map(|node| node.client.close())).await;
    }
}

impl Commands for Cluster {
    fn command(&self, requested: &str) -> Result<Invocable, CommandError> {
        self.route(requested)?.client.command(requested)
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("primary", &self.primary.display_name)
            .field(
                "replicas",
                &self
                    .replicas
                    .iter()
                    .map(|n| n.display_name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Build a cluster from a topology spec
pub async fn build_cluster(spec: &ClusterSpec, verbose: Diagnostics) -> Result<Cluster, Error> {
    let options = ClusterOptions::from_spec(spec, verbose);
    let adapter = select_adapter(&options.engine)?;
    build_cluster_with(options, adapter).await
}

/// Build a cluster over an already-selected adapter
///
/// All nodes connect concurrently. If any node exhausts its retries the
/// whole build fails and no partial cluster is returned.
pub async fn build_cluster_with(
    options: ClusterOptions,
    adapter: Arc<dyn EngineAdapter>,
) -> Result<Cluster, Error> {
    options.options.validate()?;
    let diagnostics = options.verbose;
    let policy = options.options;

    let mut members = Vec::with_capacity(options.slaves.len() + 1);
    members.push((PRIMARY_NAME.to_string(), &options.master));
    for (i, config) in options.slaves.iter().enumerate() {
        members.push((replica_name(i + 1), config));
    }

    let connections = members
        .into_iter()
        .map(|(name, config)| {
            let connection = RedisConnection::with_adapter(
                config,
                options.default_redis_db,
                adapter.clone(),
                diagnostics.clone(),
            )?;
            Ok((name, connection))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut nodes = try_join_all(
        connections
            .into_iter()
            .map(|(name, connection)| connect_node(name, connection, policy)),
    )
    .await?;

    let primary = nodes.remove(0);
    Ok(Cluster {
        primary,
        replicas: nodes,
        classifier: options.classifier,
        diagnostics,
    })
}

async fn connect_node(
    display_name: String,
    connection: RedisConnection,
    policy: RetryPolicy,
) -> Result<ClusterNode, ConnectionError> {
    let diagnostics = connection.diagnostics().clone();

    diagnostics.info(format_args!("Connecting to {}...", display_name));
    let client = connection.connect(policy).await?;
    diagnostics.info(format_args!("Connected to {}", display_name));

    if diagnostics.is_enabled() {
        observe_lifecycle(display_name.clone(), &client, diagnostics);
    }

    Ok(ClusterNode {
        display_name,
        connection,
        client,
    })
}

/// Log a node's lifecycle events until it disconnects
///
/// Purely diagnostic: nothing here triggers a reconnect.
fn observe_lifecycle(name: String, client: &Client, diagnostics: Diagnostics) {
    let mut events = client.handle().subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Reconnecting) => {
                    diagnostics.info(format_args!("redis event [{}] reconnecting", name));
                }
                Ok(ClientEvent::Warning(w)) => {
                    diagnostics.info(format_args!("redis event [{}] warning: {}", name, w));
                }
                Ok(ClientEvent::Error(e)) => {
                    diagnostics.info(format_args!("redis event [{}] error: {}", name, e));
                }
                Ok(ClientEvent::End) => {
                    diagnostics.info(format_args!("redis event [{}] end (disconnect)", name));
                    break;
                }
                Ok(ClientEvent::Ready) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}
