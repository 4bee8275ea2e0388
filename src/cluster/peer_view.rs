//! The peer view: this node's picture of every node in the cluster.
//!
//! Fed exclusively by the `/nodes/` watch. Entries are owned by the view;
//! every consumer (selector, fetcher registration) gets value copies, so
//! nothing observed under the lock outlives it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use tracing::debug;
use tracing::warn;

use crate::api::KeyValue;
use crate::constants::NODES_PREFIX;

use super::fetcher::PeerFetcher;
use super::types::ClusterNodeState;

/// Node id addressed by a `/nodes/<id>` key, if the key is well-formed.
pub(crate) fn node_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(NODES_PREFIX).filter(|id| !id.is_empty())
}

/// Mapping from node id to the most recent state observed for that node.
#[derive(Default)]
pub(crate) struct PeerView {
    peers: Mutex<HashMap<String, ClusterNodeState>>,
}

impl PeerView {
    /// Apply a create/update event. Returns whether the view changed.
    ///
    /// A malformed payload is discarded with a warning, leaving any prior
    /// entry for the node intact. A newly seen node is registered with
    /// the fetcher exactly once.
    pub(crate) fn apply_put(&self, key: &str, raw: &str, fetcher: &dyn PeerFetcher) -> bool {
        let Some(node_id) = node_id_from_key(key) else {
            warn!(key, "ignoring node state under malformed key");
            return false;
        };
        let state: ClusterNodeState = match serde_json::from_str(raw) {
            Ok(state) => state,
            Err(error) => {
                warn!(key, %error, "discarding malformed node state");
                return false;
            }
        };

        let endpoint = state.endpoint();
        let is_new;
        {
            let mut peers = self.lock();
            match peers.get(node_id) {
                Some(existing) if *existing == state => return false,
                existing => is_new = existing.is_none(),
            }
            peers.insert(node_id.to_string(), state);
        }

        if is_new {
            debug!(node_id, %endpoint, "registering newly seen peer");
            fetcher.add_peer(node_id, &endpoint);
        }
        true
    }

    /// Apply a delete event. Returns whether the view changed.
    pub(crate) fn apply_delete(&self, key: &str, fetcher: &dyn PeerFetcher) -> bool {
        let Some(node_id) = node_id_from_key(key) else {
            return false;
        };
        let removed = self.lock().remove(node_id).is_some();
        if removed {
            debug!(node_id, "peer left the cluster");
            fetcher.remove_peer(node_id);
        }
        removed
    }

    /// Replace the view with a fresh listing after a watch disconnect.
    ///
    /// The fetcher is informed of the difference between the old and new
    /// peer sets; nodes present in both keep their registration.
    pub(crate) fn resync(&self, entries: &[KeyValue], fetcher: &dyn PeerFetcher) {
        let mut fresh: HashMap<String, ClusterNodeState> = HashMap::new();
        for entry in entries {
            let Some(node_id) = node_id_from_key(&entry.key) else {
                warn!(key = %entry.key, "ignoring node state under malformed key");
                continue;
            };
            match serde_json::from_str::<ClusterNodeState>(&entry.value) {
                Ok(state) => {
                    fresh.insert(node_id.to_string(), state);
                }
                Err(error) => warn!(key = %entry.key, %error, "discarding malformed node state"),
            }
        }

        let mut added: Vec<(String, String)> = Vec::new();
        let mut removed: Vec<String> = Vec::new();
        {
            let mut peers = self.lock();
            for (node_id, state) in &fresh {
                if !peers.contains_key(node_id) {
                    added.push((node_id.clone(), state.endpoint()));
                }
            }
            for node_id in peers.keys() {
                if !fresh.contains_key(node_id) {
                    removed.push(node_id.clone());
                }
            }
            *peers = fresh;
        }

        debug!(added = added.len(), removed = removed.len(), "peer view resynchronized");
        for (node_id, endpoint) in &added {
            fetcher.add_peer(node_id, endpoint);
        }
        for node_id in &removed {
            fetcher.remove_peer(node_id);
        }
    }

    /// A stable copy of every peer's state at this instant.
    pub(crate) fn snapshot(&self) -> Vec<ClusterNodeState> {
        self.lock().values().cloned().collect()
    }

    /// The state last observed for `node_id`, if any.
    pub(crate) fn get(&self, node_id: &str) -> Option<ClusterNodeState> {
        self.lock().get(node_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClusterNodeState>> {
        self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
