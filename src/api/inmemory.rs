//! In-memory implementation of [`CoordinationStore`] for tests.
//!
//! Deterministic, non-persistent, watch-capable. Mirrors the behavior a
//! production backend must provide (linearizable writes, CAS on value
//! equality, watches delivered in write order, atomic list+watch) without
//! network or disk I/O, plus two fault hooks:
//!
//! - [`fail_next_writes`](DeterministicCoordinationStore::fail_next_writes)
//!   makes the next N writes fail as transient, to exercise retry paths;
//! - [`drop_watchers`](DeterministicCoordinationStore::drop_watchers)
//!   severs every live subscription, to exercise resynchronization.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::constants::MAX_WATCH_SUBSCRIPTIONS;

use super::error::StoreError;
use super::store::CoordinationStore;
use super::types::KeyValue;
use super::types::ReadRequest;
use super::types::ReadResult;
use super::types::WatchEvent;
use super::types::WatchRequest;
use super::types::WatchSubscription;
use super::types::WriteCommand;
use super::types::WriteRequest;
use super::types::WriteResult;

struct Watcher {
    prefix: String,
    sender: mpsc::UnboundedSender<WatchEvent>,
    enqueued: Arc<AtomicU64>,
}

#[derive(Default)]
struct StoreInner {
    entries: BTreeMap<String, String>,
    watchers: Vec<Watcher>,
    sequence: u64,
    fail_writes: u32,
}

/// In-memory deterministic [`CoordinationStore`].
#[derive(Default)]
pub struct DeterministicCoordinationStore {
    inner: Mutex<StoreInner>,
}

impl DeterministicCoordinationStore {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `count` writes fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().fail_writes = count;
    }

    /// Sever every live watch subscription.
    ///
    /// Receivers observe end-of-stream, which consumers treat as a
    /// transient disconnect and answer with a fresh list+watch.
    pub fn drop_watchers(&self) {
        self.lock().watchers.clear();
    }

    /// Number of live watch subscriptions.
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.lock();
        inner.watchers.retain(|w| !w.sender.is_closed());
        inner.watchers.len()
    }

    /// Total writes applied so far.
    pub fn write_count(&self) -> u64 {
        self.lock().sequence
    }

    /// Current raw value under `key`, if any.
    pub fn value(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StoreInner {
    fn notify(&mut self, event: WatchEvent) {
        let key = match &event {
            WatchEvent::Put { key, .. } | WatchEvent::Delete { key } => key.clone(),
        };
        self.watchers.retain(|watcher| {
            if !key.starts_with(&watcher.prefix) {
                return true;
            }
            watcher.enqueued.fetch_add(1, Ordering::Release);
            watcher.sender.send(event.clone()).is_ok()
        });
    }
}

#[async_trait]
impl CoordinationStore for DeterministicCoordinationStore {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, StoreError> {
        let inner = self.lock();
        match inner.entries.get(&request.key) {
            Some(value) => Ok(ReadResult {
                kv: KeyValue {
                    key: request.key,
                    value: value.clone(),
                },
            }),
            None => Err(StoreError::NotFound { key: request.key }),
        }
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, StoreError> {
        let mut inner = self.lock();
        if inner.fail_writes > 0 {
            inner.fail_writes -= 1;
            return Err(StoreError::Unavailable {
                reason: "injected write failure".into(),
            });
        }

        match request.command {
            WriteCommand::Put { key, value } => {
                inner.entries.insert(key.clone(), value.clone());
                inner.notify(WatchEvent::Put { key, value });
            }
            WriteCommand::CompareAndSwap {
                key,
                expected,
                new_value,
            } => {
                let current = inner.entries.get(&key).cloned();
                if current != expected {
                    return Err(StoreError::CompareAndSwapFailed {
                        key,
                        expected,
                        actual: current,
                    });
                }
                inner.entries.insert(key.clone(), new_value.clone());
                inner.notify(WatchEvent::Put {
                    key,
                    value: new_value,
                });
            }
            WriteCommand::Delete { key } => {
                if inner.entries.remove(&key).is_some() {
                    inner.notify(WatchEvent::Delete { key });
                }
            }
        }

        inner.sequence += 1;
        Ok(WriteResult {
            sequence: inner.sequence,
        })
    }

    async fn watch(&self, request: WatchRequest) -> Result<WatchSubscription, StoreError> {
        let mut inner = self.lock();
        inner.watchers.retain(|w| !w.sender.is_closed());
        if inner.watchers.len() >= MAX_WATCH_SUBSCRIPTIONS {
            return Err(StoreError::TooManyWatchers {
                limit: MAX_WATCH_SUBSCRIPTIONS,
            });
        }

        let initial: Vec<KeyValue> = inner
            .entries
            .range(request.prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&request.prefix))
            .map(|(key, value)| KeyValue {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        let (sender, events) = mpsc::unbounded_channel();
        let enqueued = Arc::new(AtomicU64::new(initial.len() as u64));
        inner.watchers.push(Watcher {
            prefix: request.prefix,
            sender,
            enqueued: enqueued.clone(),
        });

        Ok(WatchSubscription {
            initial,
            events,
            enqueued,
        })
    }
}
