//! Cluster state controller for a distributed Certificate Transparency log.
//!
//! A CT log runs as a fleet of homogeneous nodes, each persisting an
//! append-only Merkle tree and signing tree heads at its own pace. The
//! cluster must nevertheless present external clients with a single,
//! monotonically advancing Serving STH. This crate implements the
//! control-plane component that makes that happen: every node runs a
//! [`ClusterStateController`] which
//!
//! - publishes the node's own newest tree head into a shared coordination
//!   store,
//! - watches every peer's state and the cluster-wide serving policy,
//! - selects the Serving STH the cluster can safely present (largest tree
//!   covered by enough nodes, never regressing, never reusing a
//!   timestamp), and
//! - joins the master election exactly while the local tree can serve the
//!   published STH; the elected master commits the selection with a
//!   compare-and-swap.
//!
//! The coordination store, local certificate database, peer fetcher and
//! election primitive are all consumed behind traits ([`CoordinationStore`],
//! [`TreeDatabase`], [`PeerFetcher`], [`MasterElection`]); deterministic
//! in-memory implementations back the test suite and simulations.

#![warn(missing_docs)]

pub mod api;
pub mod cluster;
pub mod constants;

pub use api::CoordinationStore;
pub use api::DeterministicCoordinationStore;
pub use api::StoreError;
pub use cluster::ClusterConfig;
pub use cluster::ClusterError;
pub use cluster::ClusterNodeState;
pub use cluster::ClusterStateController;
pub use cluster::InMemoryTreeDatabase;
pub use cluster::MasterElection;
pub use cluster::PeerFetcher;
pub use cluster::RecordingPeerFetcher;
pub use cluster::RetryConfig;
pub use cluster::SelectionError;
pub use cluster::SignedTreeHead;
pub use cluster::SimulatedElection;
pub use cluster::TreeDatabase;
pub use cluster::select_serving_sth;
