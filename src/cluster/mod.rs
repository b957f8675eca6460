//! Primary/replica topology and command routing
//!
//! A cluster connects to one primary and any number of replicas, then
//! routes each command by name: read-only commands go to a random
//! replica, everything else to the primary.

pub mod node;
pub mod router;

pub use node::{replica_name, ClusterNode, PRIMARY_NAME};
pub use router::{build_cluster, build_cluster_with, Cluster, ClusterOptions};
