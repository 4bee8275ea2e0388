//! Request and response types for the coordination store surface.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::mpsc;

/// A key-value entry as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// UTF-8 key path.
    pub key: String,
    /// Serialized value. The controller treats values as opaque strings
    /// and decodes them with typed accessors at the edges.
    pub value: String,
}

/// Read a single key.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// The key to read.
    pub key: String,
}

impl ReadRequest {
    /// Build a read request for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Result of a successful read.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The entry found under the requested key.
    pub kv: KeyValue,
}

/// A single mutation applied to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    /// Unconditionally set `key` to `value` (last writer wins).
    Put {
        /// Target key.
        key: String,
        /// New serialized value.
        value: String,
    },
    /// Set `key` to `new_value` only if the current value equals
    /// `expected` (`None` = key must be absent).
    CompareAndSwap {
        /// Target key.
        key: String,
        /// Value the key must currently hold, or `None` for "absent".
        expected: Option<String>,
        /// New serialized value.
        new_value: String,
    },
    /// Remove `key`. Removing an absent key succeeds.
    Delete {
        /// Target key.
        key: String,
    },
}

impl WriteCommand {
    /// The key this command targets.
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::CompareAndSwap { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// A write request wrapping one command.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// The mutation to apply.
    pub command: WriteCommand,
}

impl WriteRequest {
    /// Convenience constructor for an unconditional put.
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Put {
                key: key.into(),
                value: value.into(),
            },
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Sequence number the store assigned to this write. Strictly
    /// increasing across all writes to one store.
    pub sequence: u64,
}

/// Subscribe to changes under a key prefix.
#[derive(Debug, Clone)]
pub struct WatchRequest {
    /// Prefix to watch. An exact key is watched by passing the key itself.
    pub prefix: String,
}

impl WatchRequest {
    /// Build a watch request for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

/// A single change delivered on a watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A key under the watched prefix was created or updated.
    Put {
        /// Affected key.
        key: String,
        /// The new serialized value.
        value: String,
    },
    /// A key under the watched prefix was removed.
    Delete {
        /// Affected key.
        key: String,
    },
}

/// A live watch subscription: a consistent initial listing plus a stream
/// of every subsequent change under the prefix, in store write order.
///
/// The `enqueued` counter is incremented by the store for the initial
/// entries and for every event pushed into the channel; consumers that
/// track their own processed count against it can tell when the stream
/// has been fully drained without wall-clock waits.
///
/// Dropping the receiver (or the store closing the sender) ends the
/// subscription; consumers treat a closed stream as a disconnect and
/// resynchronize with a fresh subscription.
#[derive(Debug)]
pub struct WatchSubscription {
    /// Entries under the prefix at subscription time.
    pub initial: Vec<KeyValue>,
    /// Stream of subsequent changes.
    pub events: mpsc::UnboundedReceiver<WatchEvent>,
    /// Count of initial entries plus events enqueued so far.
    pub enqueued: Arc<AtomicU64>,
}
