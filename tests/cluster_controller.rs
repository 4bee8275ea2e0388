//! End-to-end controller tests against the deterministic store.
//!
//! Peers other than the controller's own node are simulated by writing
//! their state straight into the store, the way each of their controllers
//! would. `flush()` drains every pending watch event between steps, so no
//! test ever sleeps on the wall clock.

use std::sync::Arc;

use alder::ClusterConfig;
use alder::ClusterNodeState;
use alder::ClusterStateController;
use alder::CoordinationStore;
use alder::DeterministicCoordinationStore;
use alder::InMemoryTreeDatabase;
use alder::MasterElection;
use alder::PeerFetcher;
use alder::RecordingPeerFetcher;
use alder::RetryConfig;
use alder::SelectionError;
use alder::SignedTreeHead;
use alder::SimulatedElection;
use alder::TreeDatabase;
use alder::api::ReadRequest;
use alder::api::WriteCommand;
use alder::api::WriteRequest;
use alder::constants::CLUSTER_CONFIG_KEY;
use alder::constants::NODES_PREFIX;
use alder::constants::SERVING_STH_KEY;

struct Node {
    store: Arc<DeterministicCoordinationStore>,
    database: Arc<InMemoryTreeDatabase>,
    election: Arc<SimulatedElection>,
    fetcher: Arc<RecordingPeerFetcher>,
    controller: ClusterStateController,
}

impl Node {
    async fn start(
        store: &Arc<DeterministicCoordinationStore>,
        node_id: &str,
        election: Arc<SimulatedElection>,
    ) -> Self {
        let database = InMemoryTreeDatabase::new();
        let fetcher = RecordingPeerFetcher::new();
        let controller = ClusterStateController::start(
            node_id,
            store.clone() as Arc<dyn CoordinationStore>,
            database.clone() as Arc<dyn TreeDatabase>,
            election.clone() as Arc<dyn MasterElection>,
            fetcher.clone() as Arc<dyn PeerFetcher>,
            RetryConfig::default(),
        )
        .await
        .unwrap();
        Self {
            store: store.clone(),
            database,
            election,
            fetcher,
            controller,
        }
    }

    /// The Serving STH currently committed to the store.
    async fn published_serving_sth(&self) -> SignedTreeHead {
        let raw = self.store.read(ReadRequest::new(SERVING_STH_KEY)).await.unwrap();
        serde_json::from_str(&raw.kv.value).unwrap()
    }
}

fn sth(tree_size: u64, timestamp: u64) -> SignedTreeHead {
    SignedTreeHead::new(tree_size, timestamp)
}

fn node_state(node_id: &str, tree_size: u64, timestamp: u64) -> ClusterNodeState {
    ClusterNodeState {
        node_id: node_id.into(),
        hostname: node_id.into(),
        log_port: 9001,
        newest_sth: Some(sth(tree_size, timestamp)),
        ..ClusterNodeState::default()
    }
}

async fn publish_peer(store: &Arc<DeterministicCoordinationStore>, node_id: &str, tree_size: u64, timestamp: u64) {
    let state = node_state(node_id, tree_size, timestamp);
    store
        .write(WriteRequest::put(
            format!("{NODES_PREFIX}{node_id}"),
            serde_json::to_string(&state).unwrap(),
        ))
        .await
        .unwrap();
}

async fn set_config(store: &Arc<DeterministicCoordinationStore>, minimum_nodes: u32, minimum_fraction: f64) {
    let config = ClusterConfig::new(minimum_nodes, minimum_fraction);
    store
        .write(WriteRequest::put(CLUSTER_CONFIG_KEY, serde_json::to_string(&config).unwrap()))
        .await
        .unwrap();
}

async fn set_serving_sth(store: &Arc<DeterministicCoordinationStore>, serving: &SignedTreeHead) {
    store
        .write(WriteRequest::put(SERVING_STH_KEY, serde_json::to_string(serving).unwrap()))
        .await
        .unwrap();
}

#[tokio::test]
async fn serving_sth_advances_under_fifty_percent_coverage() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    set_config(&store, 1, 0.5).await;
    node.controller.flush().await;

    publish_peer(&store, "node1", 100, 100).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 100);
    assert_eq!(node.published_serving_sth().await.tree_size, 100);

    // Half of two nodes cover 200.
    publish_peer(&store, "node2", 200, 200).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 200);
    assert_eq!(node.published_serving_sth().await.tree_size, 200);

    // Only a third of the cluster covers 300.
    publish_peer(&store, "node3", 300, 300).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 200);
    assert_eq!(node.published_serving_sth().await.tree_size, 200);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn serving_sth_holds_under_seventy_percent_coverage() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    set_config(&store, 1, 0.7).await;
    node.controller.flush().await;

    publish_peer(&store, "node1", 100, 100).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 100);

    publish_peer(&store, "node2", 200, 200).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 100);

    publish_peer(&store, "node3", 300, 300).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 100);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn two_node_minimum_with_sixty_percent_fraction() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    set_config(&store, 2, 0.6).await;
    node.controller.flush().await;

    publish_peer(&store, "node1", 100, 100).await;
    node.controller.flush().await;
    assert_eq!(
        node.controller.calculated_serving_sth().unwrap_err(),
        SelectionError::InsufficientNodes { have: 1, need: 2 }
    );

    publish_peer(&store, "node2", 200, 200).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 100);

    publish_peer(&store, "node3", 300, 300).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 200);
    assert_eq!(node.published_serving_sth().await.tree_size, 200);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn serving_sth_never_regresses_when_peers_fall_back() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    set_config(&store, 1, 0.5).await;
    node.controller.flush().await;

    for peer in ["node1", "node2", "node3"] {
        publish_peer(&store, peer, 200, 200).await;
    }
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await.tree_size, 200);

    publish_peer(&store, "node1", 100, 100).await;
    node.controller.flush().await;
    assert_eq!(node.controller.calculated_serving_sth().unwrap().tree_size, 200);
    assert_eq!(node.published_serving_sth().await.tree_size, 200);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn largest_sth_with_identical_timestamp_wins() {
    let store = DeterministicCoordinationStore::new();
    // Not master: this exercises pure selection, without publication.
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;
    set_config(&store, 1, 0.5).await;
    node.controller.flush().await;

    publish_peer(&store, "node1", 1000, 1000).await;
    publish_peer(&store, "node2", 1001, 1000).await;
    publish_peer(&store, "node3", 999, 1004).await;
    node.controller.flush().await;

    let selected = node.controller.calculated_serving_sth().unwrap();
    assert_eq!((selected.tree_size, selected.timestamp), (1001, 1000));

    node.controller.shutdown().await;
}

#[tokio::test]
async fn published_timestamp_is_never_reused() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    set_config(&store, 3, 1.0).await;
    node.controller.flush().await;

    publish_peer(&store, "node1", 10, 1002).await;
    publish_peer(&store, "node2", 11, 1000).await;
    publish_peer(&store, "node3", 9, 1002).await;
    node.controller.flush().await;

    // Full coverage exists only at the smallest tree head.
    let first = node.published_serving_sth().await;
    assert_eq!((first.tree_size, first.timestamp), (9, 1002));

    // The only fully covered head is now 10@1002, but its timestamp is
    // already in use with different content.
    publish_peer(&store, "node3", 13, 1004).await;
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await, first);

    // 11@1000 would be a regression.
    publish_peer(&store, "node3", 13, 1003).await;
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await, first);

    // Fresh heads let the cluster move forward again.
    publish_peer(&store, "node2", 13, 1006).await;
    publish_peer(&store, "node1", 13, 1006).await;
    node.controller.flush().await;
    let advanced = node.published_serving_sth().await;
    assert_eq!((advanced.tree_size, advanced.timestamp), (13, 1006));

    node.controller.shutdown().await;
}

#[tokio::test]
async fn config_changes_recalculate_the_serving_sth() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    set_config(&store, 0, 0.5).await;
    node.controller.flush().await;

    publish_peer(&store, "node1", 100, 100).await;
    publish_peer(&store, "node2", 200, 200).await;
    publish_peer(&store, "node3", 300, 300).await;
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await.tree_size, 200);

    // Tightening the policy may not shrink the serving STH.
    set_config(&store, 0, 0.9).await;
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await.tree_size, 200);

    // Relaxing it unlocks the largest head.
    set_config(&store, 0, 0.3).await;
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await.tree_size, 300);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn deleting_the_config_restores_the_strict_default() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    set_config(&store, 1, 0.3).await;
    node.controller.flush().await;

    publish_peer(&store, "node1", 100, 100).await;
    publish_peer(&store, "node2", 200, 200).await;
    publish_peer(&store, "node3", 300, 300).await;
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await.tree_size, 300);

    store
        .write(WriteRequest {
            command: WriteCommand::Delete {
                key: CLUSTER_CONFIG_KEY.into(),
            },
        })
        .await
        .unwrap();
    node.controller.flush().await;

    // Under the default full-coverage policy a lone fresh head no longer
    // advances the serving STH; with the deleted 30% policy it would.
    publish_peer(&store, "node3", 500, 500).await;
    node.controller.flush().await;
    assert_eq!(node.published_serving_sth().await.tree_size, 300);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn node_joins_and_leaves_the_election_with_its_data() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;

    node.controller.new_tree_head(sth(2344, 10_000)).await.unwrap();
    node.controller.flush().await;
    // No serving STH yet: no membership action.
    assert!(!node.election.participating());

    // The serving STH matches the local tree: join.
    set_serving_sth(&store, &sth(2344, 10_000)).await;
    node.controller.flush().await;
    assert!(node.election.participating());
    assert_eq!(node.election.start_calls(), 1);

    // The cluster moves past this node: leave.
    set_serving_sth(&store, &sth(2346, 10_001)).await;
    node.controller.flush().await;
    assert!(!node.election.participating());
    assert_eq!(node.election.stop_calls(), 1);

    // The local tree catches up: rejoin.
    node.controller.new_tree_head(sth(2346, 10_002)).await.unwrap();
    node.controller.flush().await;
    assert!(node.election.participating());
    assert_eq!(node.election.start_calls(), 2);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn observed_serving_sth_is_persisted_to_the_database() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;

    let serving = sth(2000, 10_000);
    set_serving_sth(&store, &serving).await;
    node.controller.flush().await;

    assert_eq!(node.database.latest_tree_head().await.unwrap(), Some(serving));

    node.controller.shutdown().await;
}

#[tokio::test]
async fn follower_adopts_the_masters_serving_sth() {
    let store = DeterministicCoordinationStore::new();
    let master = Node::start(&store, "node1", SimulatedElection::always_master()).await;
    let follower = Node::start(&store, "node2", SimulatedElection::new()).await;
    set_config(&store, 1, 0.5).await;
    master.controller.flush().await;
    follower.controller.flush().await;

    publish_peer(&store, "node1", 100, 100).await;
    publish_peer(&store, "node2", 200, 200).await;
    master.controller.flush().await;
    follower.controller.flush().await;

    let serving = master.published_serving_sth().await;
    assert_eq!(serving.tree_size, 200);
    assert_eq!(follower.controller.serving_sth(), Some(serving.clone()));
    assert_eq!(follower.database.latest_tree_head().await.unwrap(), Some(serving));

    master.controller.shutdown().await;
    follower.controller.shutdown().await;
}

#[tokio::test]
async fn set_node_host_port_republishes_and_registers_once() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;

    node.controller.set_node_host_port("myhostname", 9999).await.unwrap();
    node.controller.new_tree_head(sth(100, 100)).await.unwrap();
    node.controller.flush().await;

    // The node observes itself through the watch like any other peer.
    let seen = node.controller.peer_state("node1").unwrap();
    assert_eq!(seen.hostname, "myhostname");
    assert_eq!(seen.log_port, 9999);
    assert_eq!(seen.newest_sth.unwrap().tree_size, 100);

    // Republishing did not re-register the peer with the fetcher.
    assert_eq!(node.fetcher.added(), vec!["node1"]);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn repeated_identical_tree_head_costs_one_extra_write() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;

    node.controller.new_tree_head(sth(234, 1000)).await.unwrap();
    node.controller.flush().await;
    let value_after_first = store.value("/nodes/node1").unwrap();
    let writes_after_first = store.write_count();

    node.controller.new_tree_head(sth(234, 1000)).await.unwrap();
    node.controller.flush().await;

    assert_eq!(store.write_count(), writes_after_first + 1);
    assert_eq!(store.value("/nodes/node1").unwrap(), value_after_first);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn published_node_state_round_trips_byte_identical() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;

    node.controller.set_node_host_port("log-1.example.net", 9001).await.unwrap();
    node.controller.new_tree_head(sth(2344, 10_000)).await.unwrap();
    node.controller.flush().await;

    let written = store.value("/nodes/node1").unwrap();
    let observed = node.controller.peer_state("node1").unwrap();
    assert_eq!(serde_json::to_string(&observed).unwrap(), written);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn malformed_peer_payload_preserves_the_previous_entry() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;
    set_config(&store, 1, 1.0).await;

    publish_peer(&store, "node2", 100, 100).await;
    node.controller.flush().await;
    assert_eq!(node.controller.peer_state("node2").unwrap().newest_sth.unwrap().tree_size, 100);

    store
        .write(WriteRequest::put(format!("{NODES_PREFIX}node2"), "{corrupt"))
        .await
        .unwrap();
    node.controller.flush().await;

    let state = node.controller.peer_state("node2").unwrap();
    assert_eq!(state.newest_sth.unwrap().tree_size, 100);

    node.controller.shutdown().await;
}

#[tokio::test]
async fn watch_disconnect_resynchronizes_the_peer_view() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;

    publish_peer(&store, "node2", 100, 100).await;
    publish_peer(&store, "node3", 200, 200).await;
    node.controller.flush().await;
    assert_eq!(node.controller.peer_states().len(), 2);

    // Sever every watch, then change the world while nobody is looking.
    store.drop_watchers();
    store
        .write(WriteRequest {
            command: WriteCommand::Delete {
                key: format!("{NODES_PREFIX}node3"),
            },
        })
        .await
        .unwrap();
    publish_peer(&store, "node4", 300, 300).await;

    // Wait for all three watches to come back, then drain.
    let mut waited = 0;
    while store.watcher_count() < 3 {
        waited += 1;
        assert!(waited < 10_000, "watches failed to resubscribe");
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    node.controller.flush().await;

    assert!(node.controller.peer_state("node3").is_none());
    assert_eq!(node.controller.peer_state("node4").unwrap().newest_sth.unwrap().tree_size, 300);
    assert!(node.fetcher.added().contains(&"node4".to_string()));
    assert!(node.fetcher.removed().contains(&"node3".to_string()));

    node.controller.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_every_watch() {
    let store = DeterministicCoordinationStore::new();
    let node = Node::start(&store, "node1", SimulatedElection::new()).await;
    assert_eq!(store.watcher_count(), 3);

    node.controller.shutdown().await;
    assert_eq!(store.watcher_count(), 0);
}
