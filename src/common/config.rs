use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use super::{Error, Result};

/// Settings of a meta-server node.
#[derive(Debug, Deserialize, Clone)]
pub struct TopologyConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Expected number of compute graph nodes in the cluster.
    pub total_node_num: usize,
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// A node whose last heartbeat is older than this is reported as timed out.
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,
}

impl TopologyConfig {
    pub fn new<S: Into<String>>(listen_addr: S, total_node_num: usize) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            total_node_num,
            init_timeout_ms: default_init_timeout_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            node_timeout_ms: default_node_timeout_ms(),
        }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: TopologyConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("toml: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_node_num == 0 {
            return Err(Error::Config(
                "total_node_num must be greater than zero".to_string(),
            ));
        }
        if self.monitor_interval_ms == 0 {
            return Err(Error::Config(
                "monitor_interval_ms must be greater than zero".to_string(),
            ));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            Error::Config(format!("Invalid listen address '{}': {}", self.listen_addr, e))
        })
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8118".to_string()
}

fn default_init_timeout_ms() -> u64 {
    300_000
}

fn default_monitor_interval_ms() -> u64 {
    3_000
}

fn default_node_timeout_ms() -> u64 {
    30_000
}
