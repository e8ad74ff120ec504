use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::registry::NodeRegistry;
use super::state::{TopoState, TopoStateCell};

/// Background task that drives the topology state machine.
pub struct LivenessMonitor {
    registry: Arc<NodeRegistry>,
    topo_state: Arc<TopoStateCell>,
    start_time: Instant,
    init_timeout: Duration,
    interval: Duration,
    node_timeout: Duration,
    enabled: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
}

/// Handle used to stop a running [`LivenessMonitor`].
pub struct MonitorHandle {
    enabled: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Clears the enable flag, interrupts the current sleep and waits for the loop to exit.
    pub async fn stop(self) {
        self.enabled.store(false, Ordering::Release);
        self.wakeup.notify_one();
        if let Err(e) = self.task.await {
            tracing::error!("Topology monitor exited abnormally: {}", e);
        }
    }
}

impl LivenessMonitor {
    pub fn new(
        registry: Arc<NodeRegistry>,
        topo_state: Arc<TopoStateCell>,
        start_time: Instant,
        init_timeout: Duration,
        interval: Duration,
        node_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            topo_state,
            start_time,
            init_timeout,
            interval,
            node_timeout,
            enabled: Arc::new(AtomicBool::new(true)),
            wakeup: Arc::new(Notify::new()),
        }
    }

    pub fn spawn(self) -> MonitorHandle {
        let enabled = self.enabled.clone();
        let wakeup = self.wakeup.clone();
        let task = tokio::spawn(self.run());
        MonitorHandle {
            enabled,
            wakeup,
            task,
        }
    }

    async fn run(self) {
        tracing::debug!("Topology monitor started, interval {:?}", self.interval);
        while self.enabled.load(Ordering::Acquire) {
            self.update_topo_state().await;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.wakeup.notified() => {}
            }
        }
        tracing::debug!("Topology monitor stopped");
    }

    /// One evaluation of the state machine.
    pub async fn update_topo_state(&self) {
        match self.topo_state.load() {
            TopoState::Initializing => {
                if self.start_time.elapsed() > self.init_timeout {
                    tracing::error!(
                        "Failed to initialize the cluster topology after waiting for {} milliseconds.",
                        self.init_timeout.as_millis()
                    );
                    self.topo_state
                        .transition(TopoState::Initializing, TopoState::Failed);
                    return;
                }

                let size = self.registry.size().await;
                let total = self.registry.total_node_num();
                if size == total {
                    if self
                        .topo_state
                        .transition(TopoState::Initializing, TopoState::Initialized)
                    {
                        tracing::info!("The cluster topology has been constructed successfully");
                    }
                    return;
                }
                tracing::info!(
                    "The cluster topology is in the process of constructing, current alive node num: ({}/{})",
                    size,
                    total
                );
            }
            TopoState::Initialized => {
                if self.registry.size().await == 0 {
                    self.topo_state
                        .transition(TopoState::Initialized, TopoState::Finished);
                    return;
                }
                let expired = self.registry.timed_out_nodes(self.node_timeout).await;
                if !expired.is_empty() {
                    tracing::warn!(
                        "{} nodes have not sent a heartbeat within {:?}: {:?}",
                        expired.len(),
                        self.node_timeout,
                        expired
                    );
                }
            }
            TopoState::Finished | TopoState::Failed => {}
        }
    }
}
