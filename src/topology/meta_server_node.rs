use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::dispatcher::{MessageDispatcher, MessageHandler};
use super::metadata::MetadataStore;
use super::monitor::{LivenessMonitor, MonitorHandle};
use super::registry::NodeRegistry;
use super::state::{TopoState, TopoStateCell};
use crate::common::{Error, Result, TopologyConfig};
use crate::transport::{InboundHandler, TcpServer};

/// The coordination service every compute graph node registers with.
pub struct MetaServerNode {
    config: TopologyConfig,
    topo_state: Arc<TopoStateCell>,
    registry: Arc<NodeRegistry>,
    metadata: Arc<MetadataStore>,
    dispatcher: Arc<MessageDispatcher>,
    tcp_server: Mutex<Option<TcpServer>>,
    topo_monitor: Mutex<Option<MonitorHandle>>,
    local_addr: OnceLock<SocketAddr>,
}

impl MetaServerNode {
    pub fn new(config: TopologyConfig) -> Self {
        let topo_state = Arc::new(TopoStateCell::new());
        let registry = Arc::new(NodeRegistry::new(config.total_node_num, topo_state.clone()));
        let metadata = Arc::new(MetadataStore::new());
        let dispatcher = Arc::new(MessageDispatcher::new(registry.clone(), metadata.clone()));
        Self {
            config,
            topo_state,
            registry,
            metadata,
            dispatcher,
            tcp_server: Mutex::new(None),
            topo_monitor: Mutex::new(None),
            local_addr: OnceLock::new(),
        }
    }

    /// Binds the listening address, starts serving and spawns the topology monitor.
    pub async fn initialize(&self) -> bool {
        match self.try_initialize().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to initialize the meta server node: {}", e);
                false
            }
        }
    }

    async fn try_initialize(&self) -> Result<()> {
        let mut tcp_server = self.tcp_server.lock().await;
        if tcp_server.is_some() || self.local_addr.get().is_some() {
            return Err(Error::Internal(
                "The meta server node has already been initialized".to_string(),
            ));
        }
        self.config.validate()?;

        let server = TcpServer::bind(self.config.socket_addr()?).await?;
        self.dispatcher.set_url(server.url());
        let handler: Arc<dyn InboundHandler> = self.dispatcher.clone();
        server.start(handler).await?;
        let _ = self.local_addr.set(server.local_addr());

        let monitor = LivenessMonitor::new(
            self.registry.clone(),
            self.topo_state.clone(),
            Instant::now(),
            self.config.init_timeout(),
            self.config.monitor_interval(),
            self.config.node_timeout(),
        );
        *self.topo_monitor.lock().await = Some(monitor.spawn());

        tracing::info!(
            "Meta server node listening on {}, waiting for {} nodes",
            server.url(),
            self.config.total_node_num
        );
        *tcp_server = Some(server);
        Ok(())
    }

    /// True once every expected node has registered, including after they all left.
    pub fn initialized(&self) -> bool {
        matches!(
            self.topo_state.load(),
            TopoState::Initialized | TopoState::Finished
        )
    }

    /// Stops serving and joins the monitor.
    ///
    /// Unless `force` is set this refuses (returns false) while the topology
    /// is not `Finished` or any compute graph node is still registered.
    pub async fn finalize(&self, force: bool) -> bool {
        if !force && !self.registry.is_drained().await {
            let state = self.topo_state.load();
            tracing::warn!(
                "The meta server node can not be finalized because there are still {} alive nodes (topology {}).",
                self.registry.size().await,
                state
            );
            return false;
        }

        let state = self.topo_state.load();
        if let Some(server) = self.tcp_server.lock().await.take() {
            server.finalize().await;
        }
        if let Some(monitor) = self.topo_monitor.lock().await.take() {
            monitor.stop().await;
        }
        tracing::info!("Meta server node finalized with topology {}", state);
        true
    }

    pub fn topology_state(&self) -> TopoState {
        self.topo_state.load()
    }

    pub async fn alive_node_num(&self) -> usize {
        self.registry.size().await
    }

    /// Address actually bound, available after a successful [`initialize`](Self::initialize).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub async fn register_message_handler(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> bool {
        self.dispatcher.register_message_handler(name, handler).await
    }
}
