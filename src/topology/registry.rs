use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::state::{TopoState, TopoStateCell};
use crate::common::utils::{millis_to_datetime, now_millis};

/// Liveness record of a registered compute graph node.
#[derive(Debug)]
pub struct ComputeGraphNodeState {
    pub node_id: String,
    pub rank_id: i64,
    last_update: AtomicI64,
}

impl ComputeGraphNodeState {
    fn new(node_id: String, rank_id: i64) -> Self {
        Self {
            node_id,
            rank_id,
            last_update: AtomicI64::new(now_millis()),
        }
    }

    fn touch(&self) {
        self.last_update.store(now_millis(), Ordering::Release);
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        millis_to_datetime(self.last_update.load(Ordering::Acquire))
    }
}

/// Outcome of an unregistration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnregisterStatus {
    Success,
    InvalidNode,
    UninitializedTopology,
}

struct Nodes {
    nodes: HashMap<String, Arc<ComputeGraphNodeState>>,
    next_rank_id: i64,
}

/// Membership table of the cluster.
///
/// Register and unregister hold the write lock for the whole
/// check-mutate-transition sequence; heartbeats and size queries share the read lock.
pub struct NodeRegistry {
    inner: RwLock<Nodes>,
    total_node_num: usize,
    topo_state: Arc<TopoStateCell>,
}

impl NodeRegistry {
    pub fn new(total_node_num: usize, topo_state: Arc<TopoStateCell>) -> Self {
        Self {
            inner: RwLock::new(Nodes {
                nodes: HashMap::new(),
                next_rank_id: 0,
            }),
            total_node_num,
            topo_state,
        }
    }

    pub fn total_node_num(&self) -> usize {
        self.total_node_num
    }

    /// Adds `node_id` and returns its rank, or `None` if it is already
    /// registered or the topology has already finished.
    pub async fn register(&self, node_id: &str) -> Option<i64> {
        let mut inner = self.inner.write().await;
        if self.topo_state.load() == TopoState::Finished {
            tracing::error!(
                "Rejecting registration of node {} because the topology has finished.",
                node_id
            );
            return None;
        }
        if inner.nodes.contains_key(node_id) {
            tracing::error!("The node: {} has been registered before.", node_id);
            return None;
        }
        inner.next_rank_id += 1;
        let rank_id = inner.next_rank_id;
        inner.nodes.insert(
            node_id.to_string(),
            Arc::new(ComputeGraphNodeState::new(node_id.to_string(), rank_id)),
        );
        if inner.nodes.len() == self.total_node_num {
            self.topo_state
                .transition(TopoState::Initializing, TopoState::Initialized);
        }
        let state = self.topo_state.load();
        if state == TopoState::Failed {
            tracing::warn!(
                "Node {} registered after the topology failed to initialize",
                node_id
            );
        }
        tracing::info!(
            "The new node: {} is registered successfully with rank {} ({}/{}).",
            node_id,
            rank_id,
            inner.nodes.len(),
            self.total_node_num
        );
        Some(rank_id)
    }

    pub async fn unregister(&self, node_id: &str) -> UnregisterStatus {
        let mut inner = self.inner.write().await;
        let state = self.topo_state.load();
        if state != TopoState::Initialized {
            tracing::error!(
                "Unable to process unregistration of node {} because the topology is {}",
                node_id,
                state
            );
            return UnregisterStatus::UninitializedTopology;
        }
        if inner.nodes.remove(node_id).is_none() {
            tracing::error!(
                "Received unregistration from invalid compute graph node: {}",
                node_id
            );
            return UnregisterStatus::InvalidNode;
        }
        tracing::info!(
            "The node: {} is unregistered, {} nodes remain.",
            node_id,
            inner.nodes.len()
        );
        if inner.nodes.is_empty() {
            self.topo_state
                .transition(TopoState::Initialized, TopoState::Finished);
        }
        UnregisterStatus::Success
    }

    /// True when the topology is `Finished` and no node is registered.
    /// Checked under the write lock so no registration can interleave.
    pub async fn is_drained(&self) -> bool {
        let inner = self.inner.write().await;
        self.topo_state.load() == TopoState::Finished && inner.nodes.is_empty()
    }

    /// Refreshes the node's timestamp. Unknown nodes are only logged.
    pub async fn heartbeat(&self, node_id: &str) {
        let inner = self.inner.read().await;
        match inner.nodes.get(node_id) {
            Some(node) => node.touch(),
            None => tracing::error!("Heartbeat from invalid node: {}.", node_id),
        }
    }

    pub async fn size(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    pub async fn contains(&self, node_id: &str) -> bool {
        self.inner.read().await.nodes.contains_key(node_id)
    }

    pub async fn last_update(&self, node_id: &str) -> Option<DateTime<Utc>> {
        let inner = self.inner.read().await;
        inner.nodes.get(node_id).map(|node| node.last_update())
    }

    /// Ids of nodes whose last heartbeat is older than `node_timeout`, sorted.
    pub async fn timed_out_nodes(&self, node_timeout: Duration) -> Vec<String> {
        let now = now_millis();
        let timeout_ms = i64::try_from(node_timeout.as_millis()).unwrap_or(i64::MAX);
        let inner = self.inner.read().await;
        let mut expired: Vec<String> = inner
            .nodes
            .values()
            .filter(|node| now - node.last_update.load(Ordering::Acquire) > timeout_ms)
            .map(|node| node.node_id.clone())
            .collect();
        expired.sort();
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(total: usize) -> (NodeRegistry, Arc<TopoStateCell>) {
        let state = Arc::new(TopoStateCell::new());
        (NodeRegistry::new(total, state.clone()), state)
    }

    #[tokio::test]
    async fn test_register_reaches_initialized_on_last_node() {
        let (registry, state) = registry(3);
        assert_eq!(registry.register("a").await, Some(1));
        assert_eq!(registry.register("b").await, Some(2));
        assert_eq!(state.load(), TopoState::Initializing);
        assert_eq!(registry.register("c").await, Some(3));
        assert_eq!(state.load(), TopoState::Initialized);
        assert_eq!(registry.size().await, 3);
    }

    #[tokio::test]
    async fn test_duplicate_register_changes_nothing() {
        let (registry, _) = registry(4);
        assert_eq!(registry.register("a").await, Some(1));
        assert_eq!(registry.register("a").await, None);
        assert_eq!(registry.size().await, 1);
        assert_eq!(registry.register("b").await, Some(2));
    }

    #[tokio::test]
    async fn test_unregister_rejected_while_initializing() {
        let (registry, state) = registry(2);
        registry.register("a").await;
        assert_eq!(
            registry.unregister("a").await,
            UnregisterStatus::UninitializedTopology
        );
        assert_eq!(
            registry.unregister("ghost").await,
            UnregisterStatus::UninitializedTopology
        );
        assert!(registry.contains("a").await);
        assert_eq!(state.load(), TopoState::Initializing);
    }

    #[tokio::test]
    async fn test_ranks_not_reused_after_unregister() {
        let (registry, state) = registry(2);
        assert_eq!(registry.register("a").await, Some(1));
        assert_eq!(registry.register("b").await, Some(2));
        assert_eq!(registry.unregister("a").await, UnregisterStatus::Success);
        assert_eq!(state.load(), TopoState::Initialized);
        assert_eq!(registry.register("a").await, Some(3));
    }

    #[tokio::test]
    async fn test_unregister_all_finishes() {
        let (registry, state) = registry(2);
        registry.register("a").await;
        registry.register("b").await;
        assert_eq!(registry.unregister("c").await, UnregisterStatus::InvalidNode);
        assert_eq!(registry.unregister("a").await, UnregisterStatus::Success);
        assert_eq!(state.load(), TopoState::Initialized);
        assert_eq!(registry.unregister("b").await, UnregisterStatus::Success);
        assert_eq!(state.load(), TopoState::Finished);
        assert_eq!(registry.size().await, 0);
        assert_eq!(
            registry.unregister("b").await,
            UnregisterStatus::UninitializedTopology
        );
    }

    #[tokio::test]
    async fn test_register_rejected_after_finished() {
        let (registry, state) = registry(1);
        assert_eq!(registry.register("a").await, Some(1));
        assert_eq!(registry.unregister("a").await, UnregisterStatus::Success);
        assert_eq!(state.load(), TopoState::Finished);
        assert!(registry.is_drained().await);

        assert_eq!(registry.register("b").await, None);
        assert_eq!(registry.size().await, 0);
        assert!(registry.is_drained().await);
    }

    #[tokio::test]
    async fn test_not_drained_before_finished() {
        let (registry, _) = registry(2);
        assert!(!registry.is_drained().await);
        registry.register("a").await;
        assert!(!registry.is_drained().await);
    }

    #[tokio::test]
    async fn test_register_after_failure_keeps_failed() {
        let (registry, state) = registry(1);
        assert!(state.transition(TopoState::Initializing, TopoState::Failed));
        assert_eq!(registry.register("late").await, Some(1));
        assert_eq!(state.load(), TopoState::Failed);
    }

    #[tokio::test]
    async fn test_heartbeat_refreshes_and_ignores_unknown() {
        let (registry, _) = registry(2);
        registry.register("a").await;
        let before = registry.last_update("a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.heartbeat("a").await;
        let after = registry.last_update("a").await.unwrap();
        assert!(after > before);

        registry.heartbeat("ghost").await;
        assert_eq!(registry.size().await, 1);
        assert!(!registry.contains("ghost").await);
    }

    #[tokio::test]
    async fn test_timed_out_nodes() {
        let (registry, _) = registry(3);
        registry.register("b").await;
        registry.register("a").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        registry.register("c").await;
        assert_eq!(
            registry.timed_out_nodes(Duration::from_millis(20)).await,
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(registry
            .timed_out_nodes(Duration::from_secs(60))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_huge_node_timeout_does_not_wrap() {
        let (registry, _) = registry(1);
        registry.register("fresh").await;
        assert!(registry
            .timed_out_nodes(Duration::from_millis(u64::MAX))
            .await
            .is_empty());
        assert!(registry
            .timed_out_nodes(Duration::MAX)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_registration_assigns_unique_ranks() {
        let (registry, state) = registry(32);
        let registry = Arc::new(registry);
        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(&format!("node-{}", i)).await
            }));
        }
        let mut ranks = Vec::new();
        for task in tasks {
            ranks.push(task.await.unwrap().unwrap());
        }
        ranks.sort();
        assert_eq!(ranks, (1..=32).collect::<Vec<i64>>());
        assert_eq!(state.load(), TopoState::Initialized);
    }
}
