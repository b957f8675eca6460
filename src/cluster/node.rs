//! Cluster node representation

use crate::client::{Client, RedisConnection};

/// Display name of the primary node
pub const PRIMARY_NAME: &str = "master";

/// Display name of the Nth replica (1-indexed)
pub fn replica_name(n: usize) -> String {
    format!("slave {}", n)
}

/// One connected member of a primary/replica topology
///
/// Nodes are fixed once the cluster is built; nothing reconnects or
/// replaces them afterwards.
#[derive(Debug, Clone)]
pub struct ClusterNode {
    /// `master` or `slave N`
    pub display_name: String,
    pub connection: RedisConnection,
    pub client: Client,
}

impl ClusterNode {
    pub fn is_primary(&self) -> bool {
        self.display_name == PRIMARY_NAME
    }

    /// Get node address as string
    pub fn address(&self) -> String {
        self.connection.config().to_string()
    }
}
