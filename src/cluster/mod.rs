//! Cluster coordination: node state, Serving STH selection, election.

mod controller;
mod database;
mod election;
mod error;
mod fetcher;
mod peer_view;
mod selector;
mod types;

pub use controller::ClusterStateController;
pub use controller::RetryConfig;
pub use database::InMemoryTreeDatabase;
pub use database::TreeDatabase;
pub use election::MasterElection;
pub use election::SimulatedElection;
pub use error::ClusterError;
pub use error::DatabaseError;
pub use error::SelectionError;
pub use fetcher::FetcherEvent;
pub use fetcher::PeerFetcher;
pub use fetcher::RecordingPeerFetcher;
pub use selector::select_serving_sth;
pub use types::ClusterConfig;
pub use types::ClusterNodeState;
pub use types::SignedTreeHead;
