//! The cluster state controller.
//!
//! One long-lived controller runs inside every log node. It publishes the
//! node's own state under `/nodes/<id>`, watches every peer, the cluster
//! config and the Serving STH, re-runs the selector after every input
//! change, keeps election membership in step with whether this node can
//! serve the published STH, and, when master, publishes the selection
//! via compare-and-swap.
//!
//! Concurrency: one dispatch task per watch plus one for election
//! transitions. State is guarded by short-lived `std::sync` locks taken
//! in a fixed order (local state, peer view, config, selector); no lock
//! is ever held across an await, so store, database and election calls
//! all happen outside them.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rand::Rng;
use snafu::ResultExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::api::CoordinationStore;
use crate::api::StoreError;
use crate::api::WatchEvent;
use crate::api::WatchRequest;
use crate::api::WatchSubscription;
use crate::api::WriteCommand;
use crate::api::WriteRequest;
use crate::api::WriteResult;
use crate::constants::CLUSTER_CONFIG_KEY;
use crate::constants::NODES_PREFIX;
use crate::constants::RETRY_INITIAL_BACKOFF_MS;
use crate::constants::RETRY_MAX_BACKOFF_MS;
use crate::constants::SERVING_STH_KEY;
use crate::constants::STORE_RETRY_BUDGET;

use super::database::TreeDatabase;
use super::election::MasterElection;
use super::error::ClusterError;
use super::error::CodecSnafu;
use super::error::SelectionError;
use super::error::StoreSnafu;
use super::fetcher::PeerFetcher;
use super::peer_view::PeerView;
use super::selector::select_serving_sth;
use super::types::ClusterConfig;
use super::types::ClusterNodeState;
use super::types::SignedTreeHead;

/// Retry policy for coordination store writes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts for one write.
    pub budget: u32,
    /// Initial backoff between attempts, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on the backoff, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            budget: STORE_RETRY_BUDGET,
            initial_backoff_ms: RETRY_INITIAL_BACKOFF_MS,
            max_backoff_ms: RETRY_MAX_BACKOFF_MS,
        }
    }
}

/// The Serving STH as last observed in the store, kept with its raw
/// serialized form so a later CAS can expect the exact stored bytes.
struct ObservedServingSth {
    sth: SignedTreeHead,
    raw: String,
}

#[derive(Default)]
struct SelectorState {
    serving: Option<ObservedServingSth>,
    last_selected: Option<SignedTreeHead>,
    last_failure: Option<SelectionError>,
}

/// Per-subscription delivery accounting backing [`ClusterStateController::flush`].
#[derive(Clone)]
struct ProgressPair {
    enqueued: Arc<AtomicU64>,
    processed: Arc<AtomicU64>,
}

impl ProgressPair {
    fn drained(&self) -> bool {
        self.enqueued.load(Ordering::Acquire) == self.processed.load(Ordering::Acquire)
    }

    fn mark_processed(&self) {
        self.processed.fetch_add(1, Ordering::Release);
    }
}

struct Inner {
    node_id: String,
    store: Arc<dyn CoordinationStore>,
    database: Arc<dyn TreeDatabase>,
    election: Arc<dyn MasterElection>,
    fetcher: Arc<dyn PeerFetcher>,
    retry: RetryConfig,
    local_state: Mutex<ClusterNodeState>,
    peers: PeerView,
    config: RwLock<ClusterConfig>,
    selector: Mutex<SelectorState>,
    election_joined: Mutex<bool>,
    observed_master: AtomicBool,
    progress: Mutex<Vec<ProgressPair>>,
    cancel: CancellationToken,
}

/// Control-plane component coordinating one node's view of the cluster.
pub struct ClusterStateController {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClusterStateController {
    /// Start a controller for `node_id`.
    ///
    /// Subscribes to the node, config and Serving STH keys and spawns the
    /// dispatch tasks. The controller publishes nothing about the local
    /// node until [`new_tree_head`](Self::new_tree_head) or
    /// [`set_node_host_port`](Self::set_node_host_port) is called.
    pub async fn start(
        node_id: impl Into<String>,
        store: Arc<dyn CoordinationStore>,
        database: Arc<dyn TreeDatabase>,
        election: Arc<dyn MasterElection>,
        fetcher: Arc<dyn PeerFetcher>,
        retry: RetryConfig,
    ) -> Result<Self, ClusterError> {
        let node_id = node_id.into();
        let inner = Arc::new(Inner {
            local_state: Mutex::new(ClusterNodeState {
                node_id: node_id.clone(),
                ..ClusterNodeState::default()
            }),
            node_id,
            store,
            database,
            election,
            fetcher,
            retry,
            peers: PeerView::default(),
            config: RwLock::new(ClusterConfig::default()),
            selector: Mutex::new(SelectorState::default()),
            election_joined: Mutex::new(false),
            observed_master: AtomicBool::new(false),
            progress: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        });

        let nodes = inner.store.watch(WatchRequest::new(NODES_PREFIX)).await.context(StoreSnafu)?;
        let config = inner.store.watch(WatchRequest::new(CLUSTER_CONFIG_KEY)).await.context(StoreSnafu)?;
        let serving = inner.store.watch(WatchRequest::new(SERVING_STH_KEY)).await.context(StoreSnafu)?;

        let nodes_progress = inner.register_progress(&nodes);
        let config_progress = inner.register_progress(&config);
        let serving_progress = inner.register_progress(&serving);
        let transitions = inner.election.transitions();

        let tasks = vec![
            tokio::spawn(run_node_watch(inner.clone(), nodes, nodes_progress)),
            tokio::spawn(run_config_watch(inner.clone(), config, config_progress)),
            tokio::spawn(run_serving_watch(inner.clone(), serving, serving_progress)),
            tokio::spawn(run_election_watch(inner.clone(), transitions)),
        ];

        info!(node_id = %inner.node_id, "cluster state controller started");
        Ok(Self {
            inner,
            tasks: Mutex::new(tasks),
        })
    }

    /// Record a freshly signed local tree head and republish the node's
    /// state.
    ///
    /// The local state is updated even when the store write exhausts its
    /// retry budget; the next invocation republishes it.
    pub async fn new_tree_head(&self, sth: SignedTreeHead) -> Result<(), ClusterError> {
        debug!(tree_size = sth.tree_size, timestamp = sth.timestamp, "recording new local tree head");
        {
            self.inner.local_lock().newest_sth = Some(sth);
        }
        let result = self.inner.publish_local_state().await;
        self.inner.evaluate().await;
        result
    }

    /// Update the host and port peers should fetch from and republish the
    /// node's state.
    pub async fn set_node_host_port(&self, hostname: impl Into<String>, log_port: u16) -> Result<(), ClusterError> {
        {
            let mut local = self.inner.local_lock();
            local.hostname = hostname.into();
            local.log_port = log_port;
        }
        let result = self.inner.publish_local_state().await;
        self.inner.evaluate().await;
        result
    }

    /// A copy of the local node's current state.
    pub fn local_node_state(&self) -> ClusterNodeState {
        self.inner.local_lock().clone()
    }

    /// The Serving STH the selector last settled on, or why it has none.
    ///
    /// Exposed on every node, master or not, for observability and tests.
    pub fn calculated_serving_sth(&self) -> Result<SignedTreeHead, SelectionError> {
        let need = self.inner.config_read().minimum_serving_nodes.max(1) as usize;
        let sel = self.inner.selector_lock();
        if let Some(sth) = &sel.last_selected {
            return Ok(sth.clone());
        }
        match &sel.last_failure {
            Some(failure) => Err(failure.clone()),
            None => Err(SelectionError::InsufficientNodes { have: 0, need }),
        }
    }

    /// The Serving STH last observed in the coordination store.
    pub fn serving_sth(&self) -> Option<SignedTreeHead> {
        self.inner.selector_lock().serving.as_ref().map(|observed| observed.sth.clone())
    }

    /// Copies of every peer state currently in the view.
    pub fn peer_states(&self) -> Vec<ClusterNodeState> {
        self.inner.peers.snapshot()
    }

    /// The state last observed for one peer.
    pub fn peer_state(&self, node_id: &str) -> Option<ClusterNodeState> {
        self.inner.peers.get(node_id)
    }

    /// Wait until every event enqueued so far has been fully processed.
    ///
    /// Test hook replacing wall-clock waits: settles only once all watch
    /// streams are drained twice in a row, so writes cascaded by event
    /// handling (a publication and its own watch echo) settle too.
    pub async fn flush(&self) {
        loop {
            if self.settled() {
                tokio::task::yield_now().await;
                if self.settled() {
                    return;
                }
            } else {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }

    /// Stop the controller: cancel the watches, drain the dispatch tasks
    /// and leave the election. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        let leave = {
            let mut joined = self.inner.joined_lock();
            std::mem::replace(&mut *joined, false)
        };
        if leave {
            self.inner.election.stop_election().await;
        }
        info!(node_id = %self.inner.node_id, "cluster state controller stopped");
    }

    fn settled(&self) -> bool {
        let streams_drained = self
            .inner
            .progress_lock()
            .iter()
            .all(ProgressPair::drained);
        let mastership_observed = self.inner.election.is_master() == self.inner.observed_master.load(Ordering::Acquire);
        streams_drained && mastership_observed
    }
}

impl Drop for ClusterStateController {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl Inner {
    fn local_lock(&self) -> MutexGuard<'_, ClusterNodeState> {
        self.local_state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn selector_lock(&self) -> MutexGuard<'_, SelectorState> {
        self.selector.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn joined_lock(&self) -> MutexGuard<'_, bool> {
        self.election_joined.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn progress_lock(&self) -> MutexGuard<'_, Vec<ProgressPair>> {
        self.progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn config_read(&self) -> ClusterConfig {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn register_progress(&self, subscription: &WatchSubscription) -> ProgressPair {
        let pair = ProgressPair {
            enqueued: subscription.enqueued.clone(),
            processed: Arc::new(AtomicU64::new(0)),
        };
        self.progress_lock().push(pair.clone());
        pair
    }

    fn replace_progress(&self, old: &ProgressPair, new: ProgressPair) {
        let mut pairs = self.progress_lock();
        match pairs.iter_mut().find(|pair| Arc::ptr_eq(&pair.enqueued, &old.enqueued)) {
            Some(pair) => *pair = new,
            None => pairs.push(new),
        }
    }

    /// React to an input change: reconcile election membership, re-run
    /// the selector, and, when master, publish the selection.
    async fn evaluate(&self) {
        self.update_election_membership().await;
        if let Some(candidate) = self.run_selector() {
            if self.election.is_master() {
                self.publish_selected(&candidate).await;
            }
        }
    }

    /// Join the election iff the local tree is at least as large as the
    /// published Serving STH; leave otherwise. No membership action is
    /// taken until a Serving STH has been observed.
    async fn update_election_membership(&self) {
        let local = self.local_lock().newest_sth.clone();
        let serving = self.selector_lock().serving.as_ref().map(|observed| observed.sth.clone());
        let Some(serving) = serving else { return };

        let desired = local.is_some_and(|sth| sth.tree_size >= serving.tree_size);
        let transition = {
            let mut joined = self.joined_lock();
            if *joined == desired {
                None
            } else {
                *joined = desired;
                Some(desired)
            }
        };
        match transition {
            Some(true) => {
                info!(node_id = %self.node_id, serving_tree_size = serving.tree_size, "joining master election");
                self.election.start_election().await;
            }
            Some(false) => {
                info!(node_id = %self.node_id, serving_tree_size = serving.tree_size, "leaving master election: local tree is behind");
                self.election.stop_election().await;
            }
            None => {}
        }
    }

    /// Run the selector over a snapshot of peers and config. Returns the
    /// current selection, if there is one.
    fn run_selector(&self) -> Option<SignedTreeHead> {
        let peers = self.peers.snapshot();
        let config = self.config_read();
        let mut sel = self.selector_lock();
        let serving = sel.serving.as_ref().map(|observed| observed.sth.clone());
        match select_serving_sth(&peers, &config, serving.as_ref(), sel.last_selected.as_ref()) {
            Ok(sth) => {
                if sel.last_selected.as_ref() != Some(&sth) {
                    debug!(tree_size = sth.tree_size, timestamp = sth.timestamp, "selected serving STH candidate");
                }
                sel.last_failure = None;
                sel.last_selected = Some(sth.clone());
                Some(sth)
            }
            Err(error) => {
                debug!(%error, "serving STH selection yielded nothing");
                sel.last_failure = Some(error);
                sel.last_selected.clone()
            }
        }
    }

    /// CAS-publish `candidate` as the Serving STH.
    ///
    /// Publication requires strict succession over the observed published
    /// value; anything else is held back. A lost CAS race is not retried:
    /// the winning value arrives through the watch.
    async fn publish_selected(&self, candidate: &SignedTreeHead) {
        let expected = {
            let sel = self.selector_lock();
            match sel.serving.as_ref() {
                Some(current) if *candidate == current.sth => return,
                Some(current) => {
                    if !candidate.strictly_succeeds(&current.sth) {
                        debug!(
                            candidate_tree_size = candidate.tree_size,
                            candidate_timestamp = candidate.timestamp,
                            serving_tree_size = current.sth.tree_size,
                            serving_timestamp = current.sth.timestamp,
                            "holding publication: candidate does not strictly succeed the serving STH"
                        );
                        return;
                    }
                    Some(current.raw.clone())
                }
                None => None,
            }
        };

        let new_value = match serde_json::to_string(candidate) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "failed to encode serving STH");
                return;
            }
        };

        let request = WriteRequest {
            command: WriteCommand::CompareAndSwap {
                key: SERVING_STH_KEY.to_string(),
                expected,
                new_value,
            },
        };
        match self.write_with_retry(request).await {
            Ok(_) => {
                info!(
                    tree_size = candidate.tree_size,
                    timestamp = candidate.timestamp,
                    "published serving STH"
                );
            }
            Err(StoreError::CompareAndSwapFailed { .. }) => {
                warn!("lost serving STH publication race; adopting the winner from the watch");
            }
            Err(error) => {
                warn!(%error, "serving STH publication failed");
            }
        }
    }

    /// Write the local node state under `/nodes/<id>`.
    async fn publish_local_state(&self) -> Result<(), ClusterError> {
        let key = format!("{}{}", NODES_PREFIX, self.node_id);
        let raw = {
            let state = self.local_lock().clone();
            serde_json::to_string(&state).context(CodecSnafu { key: key.clone() })?
        };
        match self.write_with_retry(WriteRequest::put(key.clone(), raw)).await {
            Ok(_) => {
                debug!(key = %key, "published local node state");
                Ok(())
            }
            Err(source) => {
                warn!(key = %key, %source, "failed to publish local node state; will retry on the next update");
                Err(source).context(StoreSnafu)
            }
        }
    }

    /// Apply a write with bounded retries and jittered exponential
    /// backoff. Only transient failures are retried.
    async fn write_with_retry(&self, request: WriteRequest) -> Result<WriteResult, StoreError> {
        let mut backoff_ms = self.retry.initial_backoff_ms;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.write(request.clone()).await {
                Ok(result) => return Ok(result),
                Err(error) if error.is_transient() && attempt < self.retry.budget => {
                    let jitter = rand::rng().random_range(0..backoff_ms / 2 + 1);
                    debug!(
                        key = request.command.key(),
                        attempt,
                        backoff_ms = backoff_ms + jitter,
                        %error,
                        "store write failed, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms + jitter)).await;
                    backoff_ms = (backoff_ms * 2).min(self.retry.max_backoff_ms);
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Update the cluster config from a raw payload (`None` = key absent
    /// or deleted, which restores the strict defaults). Returns whether
    /// the config changed.
    fn apply_config(&self, raw: Option<&str>) -> bool {
        let fresh = match raw {
            Some(raw) => match serde_json::from_str::<ClusterConfig>(raw) {
                Ok(config) => config,
                Err(error) => {
                    warn!(%error, "discarding malformed cluster config");
                    return false;
                }
            },
            None => ClusterConfig::default(),
        };
        let mut config = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *config == fresh {
            return false;
        }
        info!(
            minimum_serving_nodes = fresh.minimum_serving_nodes,
            minimum_serving_fraction = fresh.minimum_serving_fraction,
            "cluster config updated"
        );
        *config = fresh;
        true
    }

    /// Adopt a Serving STH observed in the store: remember it (with its
    /// raw form, for later CAS), and persist it to the local database.
    /// Returns whether it was new.
    async fn handle_serving_put(&self, raw: String) -> bool {
        let sth: SignedTreeHead = match serde_json::from_str(&raw) {
            Ok(sth) => sth,
            Err(error) => {
                warn!(%error, "discarding malformed serving STH");
                return false;
            }
        };
        {
            let mut sel = self.selector_lock();
            if sel.serving.as_ref().map(|observed| observed.raw.as_str()) == Some(raw.as_str()) {
                return false;
            }
            sel.serving = Some(ObservedServingSth { sth: sth.clone(), raw });
        }
        info!(tree_size = sth.tree_size, timestamp = sth.timestamp, "observed serving STH");
        if let Err(error) = self.database.store_tree_head(&sth).await {
            warn!(%error, "failed to persist serving STH; will retry on the next observation");
        }
        true
    }

    /// Re-establish a watch after a disconnect, backing off between
    /// attempts. Returns `None` on shutdown.
    async fn resubscribe(&self, prefix: &str, progress: &mut ProgressPair) -> Option<WatchSubscription> {
        let mut backoff_ms = self.retry.initial_backoff_ms;
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            match self.store.watch(WatchRequest::new(prefix)).await {
                Ok(subscription) => {
                    info!(prefix, "watch re-established");
                    let fresh = ProgressPair {
                        enqueued: subscription.enqueued.clone(),
                        processed: Arc::new(AtomicU64::new(0)),
                    };
                    self.replace_progress(progress, fresh.clone());
                    *progress = fresh;
                    return Some(subscription);
                }
                Err(StoreError::Closed) => return None,
                Err(error) => {
                    warn!(prefix, %error, "watch resubscription failed, backing off");
                    tokio::select! {
                        _ = self.cancel.cancelled() => return None,
                        _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
                    }
                    backoff_ms = (backoff_ms * 2).min(self.retry.max_backoff_ms);
                }
            }
        }
    }
}

/// Dispatch loop for the `/nodes/` prefix watch.
async fn run_node_watch(inner: Arc<Inner>, mut subscription: WatchSubscription, mut progress: ProgressPair) {
    for entry in std::mem::take(&mut subscription.initial) {
        if inner.peers.apply_put(&entry.key, &entry.value, &inner.fetcher) {
            inner.evaluate().await;
        }
        progress.mark_processed();
    }
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            event = subscription.events.recv() => match event {
                Some(WatchEvent::Put { key, value }) => {
                    if inner.peers.apply_put(&key, &value, &inner.fetcher) {
                        inner.evaluate().await;
                    }
                    progress.mark_processed();
                }
                Some(WatchEvent::Delete { key }) => {
                    if inner.peers.apply_delete(&key, &inner.fetcher) {
                        inner.evaluate().await;
                    }
                    progress.mark_processed();
                }
                None => {
                    // Transient disconnect: resynchronize from a fresh
                    // list+watch and diff the peer sets.
                    let Some(fresh) = inner.resubscribe(NODES_PREFIX, &mut progress).await else {
                        return;
                    };
                    subscription = fresh;
                    inner.peers.resync(&subscription.initial, &inner.fetcher);
                    for _ in 0..subscription.initial.len() {
                        progress.mark_processed();
                    }
                    subscription.initial.clear();
                    inner.evaluate().await;
                }
            }
        }
    }
}

/// Dispatch loop for the `/cluster_config` watch.
async fn run_config_watch(inner: Arc<Inner>, mut subscription: WatchSubscription, mut progress: ProgressPair) {
    loop {
        let initial = std::mem::take(&mut subscription.initial);
        let mut changed = if initial.is_empty() {
            // Key absent: fall back to the strict defaults.
            inner.apply_config(None)
        } else {
            false
        };
        for entry in initial {
            if inner.apply_config(Some(&entry.value)) {
                changed = true;
            }
            progress.mark_processed();
        }
        if changed {
            inner.evaluate().await;
        }

        loop {
            tokio::select! {
                _ = inner.cancel.cancelled() => return,
                event = subscription.events.recv() => match event {
                    Some(WatchEvent::Put { value, .. }) => {
                        if inner.apply_config(Some(&value)) {
                            inner.evaluate().await;
                        }
                        progress.mark_processed();
                    }
                    Some(WatchEvent::Delete { .. }) => {
                        if inner.apply_config(None) {
                            inner.evaluate().await;
                        }
                        progress.mark_processed();
                    }
                    None => break,
                }
            }
        }

        let Some(fresh) = inner.resubscribe(CLUSTER_CONFIG_KEY, &mut progress).await else {
            return;
        };
        subscription = fresh;
    }
}

/// Dispatch loop for the `/serving_sth` watch.
async fn run_serving_watch(inner: Arc<Inner>, mut subscription: WatchSubscription, mut progress: ProgressPair) {
    loop {
        for entry in std::mem::take(&mut subscription.initial) {
            if inner.handle_serving_put(entry.value).await {
                inner.evaluate().await;
            }
            progress.mark_processed();
        }

        loop {
            tokio::select! {
                _ = inner.cancel.cancelled() => return,
                event = subscription.events.recv() => match event {
                    Some(WatchEvent::Put { value, .. }) => {
                        if inner.handle_serving_put(value).await {
                            inner.evaluate().await;
                        }
                        progress.mark_processed();
                    }
                    Some(WatchEvent::Delete { key }) => {
                        warn!(key = %key, "serving STH key deleted; retaining the last observed value");
                        progress.mark_processed();
                    }
                    None => break,
                }
            }
        }

        let Some(fresh) = inner.resubscribe(SERVING_STH_KEY, &mut progress).await else {
            return;
        };
        subscription = fresh;
    }
}

/// Dispatch loop for mastership transitions.
async fn run_election_watch(inner: Arc<Inner>, mut transitions: watch::Receiver<bool>) {
    let current = *transitions.borrow_and_update();
    if current {
        inner.evaluate().await;
    }
    inner.observed_master.store(current, Ordering::Release);

    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            changed = transitions.changed() => {
                if changed.is_err() {
                    return;
                }
                let is_master = *transitions.borrow_and_update();
                info!(node_id = %inner.node_id, is_master, "mastership changed");
                if is_master {
                    // A fresh master publishes the current selection
                    // without waiting for another input change.
                    inner.evaluate().await;
                }
                inner.observed_master.store(is_master, Ordering::Release);
            }
        }
    }
}
