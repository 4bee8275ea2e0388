//! Fixed limits and well-known coordination store paths.
//!
//! Constants are immutable and enforced at compile time. Every retry and
//! queue in the crate is bounded by one of the limits below.

/// Coordination store prefix under which every node publishes its state.
///
/// The full key for a node is `NODES_PREFIX` followed by the node id.
pub const NODES_PREFIX: &str = "/nodes/";

/// Coordination store key holding the cluster-wide serving configuration.
pub const CLUSTER_CONFIG_KEY: &str = "/cluster_config";

/// Coordination store key holding the current Serving STH.
///
/// Written only by the current master, via compare-and-swap on the
/// previously published value.
pub const SERVING_STH_KEY: &str = "/serving_sth";

/// Maximum attempts for a single coordination store write.
///
/// Applies to transient store failures only; compare-and-swap conflicts
/// are never retried (the winning value arrives through the watch).
pub const STORE_RETRY_BUDGET: u32 = 5;

/// Initial backoff between store write retries, in milliseconds.
pub const RETRY_INITIAL_BACKOFF_MS: u64 = 10;

/// Upper bound on the backoff between store write retries, in milliseconds.
pub const RETRY_MAX_BACKOFF_MS: u64 = 1_000;

/// Maximum concurrent watch subscriptions a single store will serve.
///
/// A controller opens three; the bound exists to keep a runaway consumer
/// from growing the watcher table without limit.
pub const MAX_WATCH_SUBSCRIPTIONS: usize = 64;
