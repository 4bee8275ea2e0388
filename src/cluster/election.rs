//! Master election interface.
//!
//! The election primitive itself (an etcd-style lease-backed election)
//! lives outside this crate; the controller only joins or leaves the
//! election and reacts to mastership transitions. Both calls are
//! idempotent: starting a started election or stopping a stopped one is
//! a no-op.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::watch;

/// The master election primitive consumed by the controller.
#[async_trait]
pub trait MasterElection: Send + Sync {
    /// Join the election. No-op when already participating.
    async fn start_election(&self);

    /// Leave the election, relinquishing mastership if held. No-op when
    /// not participating.
    async fn stop_election(&self);

    /// Whether this node is currently the master.
    fn is_master(&self) -> bool;

    /// Stream of mastership transitions. The current value is always the
    /// latest `is_master` state.
    fn transitions(&self) -> watch::Receiver<bool>;
}

#[async_trait]
impl<T: MasterElection + ?Sized> MasterElection for Arc<T> {
    async fn start_election(&self) {
        (**self).start_election().await
    }

    async fn stop_election(&self) {
        (**self).stop_election().await
    }

    fn is_master(&self) -> bool {
        (**self).is_master()
    }

    fn transitions(&self) -> watch::Receiver<bool> {
        (**self).transitions()
    }
}

/// Deterministic in-process [`MasterElection`] for tests and simulation.
///
/// Mastership is scripted: it never changes on its own, only through
/// [`set_master`](SimulatedElection::set_master). Leaving the election
/// drops mastership, as the real primitive would.
pub struct SimulatedElection {
    participating: AtomicBool,
    master: watch::Sender<bool>,
    start_calls: AtomicU64,
    stop_calls: AtomicU64,
}

impl Default for SimulatedElection {
    fn default() -> Self {
        let (master, _) = watch::channel(false);
        Self {
            participating: AtomicBool::new(false),
            master,
            start_calls: AtomicU64::new(0),
            stop_calls: AtomicU64::new(0),
        }
    }
}

impl SimulatedElection {
    /// Create an election in which this node is not participating.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create an election in which this node is permanently the master.
    ///
    /// Mirrors the "always master" fixtures used to test publication
    /// paths in isolation from real elections.
    pub fn always_master() -> Arc<Self> {
        let election = Self::default();
        election.participating.store(true, Ordering::Release);
        election.master.send_replace(true);
        Arc::new(election)
    }

    /// Script a mastership transition.
    pub fn set_master(&self, is_master: bool) {
        self.master.send_replace(is_master);
    }

    /// Whether the node currently participates in the election.
    pub fn participating(&self) -> bool {
        self.participating.load(Ordering::Acquire)
    }

    /// Number of effective `start_election` transitions.
    pub fn start_calls(&self) -> u64 {
        self.start_calls.load(Ordering::Acquire)
    }

    /// Number of effective `stop_election` transitions.
    pub fn stop_calls(&self) -> u64 {
        self.stop_calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MasterElection for SimulatedElection {
    async fn start_election(&self) {
        if !self.participating.swap(true, Ordering::AcqRel) {
            self.start_calls.fetch_add(1, Ordering::Release);
        }
    }

    async fn stop_election(&self) {
        if self.participating.swap(false, Ordering::AcqRel) {
            self.stop_calls.fetch_add(1, Ordering::Release);
            self.master.send_replace(false);
        }
    }

    fn is_master(&self) -> bool {
        *self.master.borrow()
    }

    fn transitions(&self) -> watch::Receiver<bool> {
        self.master.subscribe()
    }
}
