//! Error types for the cluster state controller.

use snafu::Snafu;
use thiserror::Error;

use crate::api::StoreError;

/// Why the selector could not produce a Serving STH.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SelectionError {
    /// Fewer nodes are reporting state than the policy's minimum.
    #[snafu(display("not enough nodes reporting tree heads: have {have}, need {need}"))]
    InsufficientNodes {
        /// Nodes currently reporting an STH.
        have: usize,
        /// The configured minimum.
        need: usize,
    },

    /// No reported STH is covered by enough nodes.
    #[snafu(display("no tree head is covered by {required} of {nodes} nodes"))]
    InsufficientCoverage {
        /// Covering nodes required by the policy.
        required: usize,
        /// Nodes currently reporting an STH.
        nodes: usize,
    },
}

/// Failure writing to the node's local certificate database.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// The write could not be applied.
    #[error("tree head database failure: {reason}")]
    Failed {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors surfaced by [`ClusterStateController`](super::ClusterStateController)
/// operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClusterError {
    /// A coordination store operation failed beyond the retry budget.
    #[snafu(display("coordination store operation failed: {source}"))]
    Store {
        /// The underlying store error.
        source: StoreError,
    },

    /// A stored payload could not be decoded.
    #[snafu(display("malformed payload under '{key}': {source}"))]
    Codec {
        /// The key whose value failed to decode.
        key: String,
        /// The decode error.
        source: serde_json::Error,
    },
}
