//! Wire types shared with the rest of the log cluster.
//!
//! All three structs round-trip through JSON in the coordination store.
//! Fields this crate does not know about are captured in a flattened
//! `extra` map so a read-modify-write cycle preserves them.

use serde::Deserialize;
use serde::Serialize;

/// A signed Merkle tree head.
///
/// The controller treats the signature and root hash as opaque bytes; only
/// `tree_size` and `timestamp` participate in selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedTreeHead {
    /// Number of entries in the tree this head attests to.
    pub tree_size: u64,
    /// Millisecond wall-clock timestamp assigned by the signer.
    pub timestamp: u64,
    /// SHA-256 root hash of the tree at `tree_size`.
    #[serde(default)]
    pub sha256_root_hash: Vec<u8>,
    /// Signature over the tree head.
    #[serde(default)]
    pub tree_head_signature: Vec<u8>,
    /// Fields produced by other cluster components, preserved on round-trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SignedTreeHead {
    /// Build a tree head carrying only the ordered fields.
    pub fn new(tree_size: u64, timestamp: u64) -> Self {
        Self {
            tree_size,
            timestamp,
            ..Self::default()
        }
    }

    /// Whether `self` may be published after `other` under the cluster's
    /// monotonicity rules: strictly newer timestamp, tree no smaller.
    pub fn strictly_succeeds(&self, other: &Self) -> bool {
        self.timestamp > other.timestamp && self.tree_size >= other.tree_size
    }
}

/// The state one node publishes under `/nodes/<node_id>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterNodeState {
    /// Identifier of the publishing node.
    pub node_id: String,
    /// Hostname peers use to fetch entries from this node.
    #[serde(default)]
    pub hostname: String,
    /// Port of this node's log frontend.
    #[serde(default)]
    pub log_port: u16,
    /// The newest STH this node's local tree has been signed at, if any.
    /// Absent until the node's signer has produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_sth: Option<SignedTreeHead>,
    /// Fields produced by other cluster components, preserved on round-trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClusterNodeState {
    /// The endpoint peers should fetch entries from.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.log_port)
    }
}

/// Cluster-wide serving policy, written by operators under
/// `/cluster_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Minimum number of nodes that must cover an STH before it can serve.
    #[serde(default = "default_minimum_serving_nodes")]
    pub minimum_serving_nodes: u32,
    /// Minimum fraction of the cluster, in `[0, 1]`, that must cover an
    /// STH before it can serve.
    #[serde(default = "default_minimum_serving_fraction")]
    pub minimum_serving_fraction: f64,
    /// Fields produced by other cluster components, preserved on round-trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_minimum_serving_nodes() -> u32 {
    1
}

fn default_minimum_serving_fraction() -> f64 {
    1.0
}

impl Default for ClusterConfig {
    /// The strictest policy: every node must cover the Serving STH. Used
    /// whenever `/cluster_config` is absent.
    fn default() -> Self {
        Self {
            minimum_serving_nodes: default_minimum_serving_nodes(),
            minimum_serving_fraction: default_minimum_serving_fraction(),
            extra: serde_json::Map::new(),
        }
    }
}

impl ClusterConfig {
    /// Build a config from the two policy knobs.
    pub fn new(minimum_serving_nodes: u32, minimum_serving_fraction: f64) -> Self {
        Self {
            minimum_serving_nodes,
            minimum_serving_fraction,
            extra: serde_json::Map::new(),
        }
    }

    /// Number of covering nodes required when `reporting` nodes have
    /// published an STH.
    pub fn required_nodes(&self, reporting: usize) -> usize {
        let by_fraction = (self.minimum_serving_fraction * reporting as f64).ceil() as usize;
        (self.minimum_serving_nodes as usize).max(by_fraction)
    }
}
