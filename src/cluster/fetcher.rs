//! Peer fetcher registration interface.
//!
//! The fetcher continuously pulls entries from other nodes; the peer view
//! tells it which peers exist. Registration happens exactly once per peer
//! lifecycle: `add_peer` when a node first appears under `/nodes/`,
//! `remove_peer` when its entry expires or is deleted.

use std::sync::Arc;
use std::sync::Mutex;

/// Consumer of peer lifecycle transitions.
pub trait PeerFetcher: Send + Sync {
    /// A peer appeared; start fetching entries from `endpoint`.
    fn add_peer(&self, node_id: &str, endpoint: &str);

    /// A peer left the cluster; stop fetching from it.
    fn remove_peer(&self, node_id: &str);
}

impl<T: PeerFetcher + ?Sized> PeerFetcher for Arc<T> {
    fn add_peer(&self, node_id: &str, endpoint: &str) {
        (**self).add_peer(node_id, endpoint)
    }

    fn remove_peer(&self, node_id: &str) {
        (**self).remove_peer(node_id)
    }
}

/// A peer lifecycle transition observed by [`RecordingPeerFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetcherEvent {
    /// `add_peer(node_id, endpoint)` was called.
    Added {
        /// The registered peer.
        node_id: String,
        /// Its fetch endpoint.
        endpoint: String,
    },
    /// `remove_peer(node_id)` was called.
    Removed {
        /// The deregistered peer.
        node_id: String,
    },
}

/// [`PeerFetcher`] test double that records every call.
#[derive(Default)]
pub struct RecordingPeerFetcher {
    events: Mutex<Vec<FetcherEvent>>,
}

impl RecordingPeerFetcher {
    /// Create an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All recorded transitions, in call order.
    pub fn events(&self) -> Vec<FetcherEvent> {
        self.lock().clone()
    }

    /// Node ids passed to `add_peer`, in call order.
    pub fn added(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                FetcherEvent::Added { node_id, .. } => Some(node_id.clone()),
                FetcherEvent::Removed { .. } => None,
            })
            .collect()
    }

    /// Node ids passed to `remove_peer`, in call order.
    pub fn removed(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                FetcherEvent::Removed { node_id } => Some(node_id.clone()),
                FetcherEvent::Added { .. } => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FetcherEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PeerFetcher for RecordingPeerFetcher {
    fn add_peer(&self, node_id: &str, endpoint: &str) {
        self.lock().push(FetcherEvent::Added {
            node_id: node_id.into(),
            endpoint: endpoint.into(),
        });
    }

    fn remove_peer(&self, node_id: &str) {
        self.lock().push(FetcherEvent::Removed { node_id: node_id.into() });
    }
}
