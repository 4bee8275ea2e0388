//! The coordination store trait.

use async_trait::async_trait;

use super::error::StoreError;
use super::types::ReadRequest;
use super::types::ReadResult;
use super::types::WatchRequest;
use super::types::WatchSubscription;
use super::types::WriteRequest;
use super::types::WriteResult;

/// Strongly-consistent key-value store with ordered watches and
/// compare-and-swap writes.
///
/// This is the interface the cluster state controller consumes; the
/// production backend (etcd, a Raft KV, ...) lives outside this crate.
/// Implementations must deliver watch events for a given subscription in
/// store write order, and must make [`watch`](CoordinationStore::watch)
/// atomic with respect to writes: no change may fall between the initial
/// listing and the first streamed event.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Read a single key.
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, StoreError>;

    /// Apply a single mutation.
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, StoreError>;

    /// Subscribe to changes under a prefix, receiving the current entries
    /// up front.
    async fn watch(&self, request: WatchRequest) -> Result<WatchSubscription, StoreError>;
}

#[async_trait]
impl<T: CoordinationStore + ?Sized> CoordinationStore for std::sync::Arc<T> {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, StoreError> {
        (**self).read(request).await
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, StoreError> {
        (**self).write(request).await
    }

    async fn watch(&self, request: WatchRequest) -> Result<WatchSubscription, StoreError> {
        (**self).watch(request).await
    }
}
