//! Local certificate database interface.
//!
//! The controller only touches the tree-head corner of the node's local
//! database: it persists every Serving STH it publishes or observes so
//! the node can keep serving after losing the coordination store.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::DatabaseError;
use super::types::SignedTreeHead;

/// Tree-head persistence consumed by the controller.
#[async_trait]
pub trait TreeDatabase: Send + Sync {
    /// The most recently stored tree head, if any.
    async fn latest_tree_head(&self) -> Result<Option<SignedTreeHead>, DatabaseError>;

    /// Persist `sth` as the latest tree head, superseding the previous one.
    async fn store_tree_head(&self, sth: &SignedTreeHead) -> Result<(), DatabaseError>;
}

#[async_trait]
impl<T: TreeDatabase + ?Sized> TreeDatabase for Arc<T> {
    async fn latest_tree_head(&self) -> Result<Option<SignedTreeHead>, DatabaseError> {
        (**self).latest_tree_head().await
    }

    async fn store_tree_head(&self, sth: &SignedTreeHead) -> Result<(), DatabaseError> {
        (**self).store_tree_head(sth).await
    }
}

/// In-memory [`TreeDatabase`] for tests.
#[derive(Default)]
pub struct InMemoryTreeDatabase {
    latest: Mutex<Option<SignedTreeHead>>,
}

impl InMemoryTreeDatabase {
    /// Create an empty database.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TreeDatabase for InMemoryTreeDatabase {
    async fn latest_tree_head(&self) -> Result<Option<SignedTreeHead>, DatabaseError> {
        Ok(self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone())
    }

    async fn store_tree_head(&self, sth: &SignedTreeHead) -> Result<(), DatabaseError> {
        *self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(sth.clone());
        Ok(())
    }
}
