use std::time::Duration;

use clap::{Parser, Subcommand};
use topomesh::{
    cmd::{handler::handle_meta_command, meta_command::MetaCommands},
    common::{Error, TopologyConfig},
    MetaServerNode, TopoState,
};

#[derive(Parser)]
#[command(name = "topomesh")]
#[command(version, about = "Cluster topology meta-server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the meta-server node
    Server {
        /// Path to configuration file
        #[arg(long)]
        config_path: Option<String>,

        /// Listening address (overrides the config file)
        #[arg(long)]
        addr: Option<String>,

        /// Expected number of compute graph nodes (overrides the config file)
        #[arg(long)]
        total_node_num: Option<usize>,

        /// Initialization timeout in milliseconds
        #[arg(long)]
        init_timeout_ms: Option<u64>,

        /// Topology monitor interval in milliseconds
        #[arg(long)]
        monitor_interval_ms: Option<u64>,

        /// Heartbeat age in milliseconds after which a node is reported as timed out
        #[arg(long)]
        node_timeout_ms: Option<u64>,
    },
    /// Talk to a running meta-server
    Meta {
        #[command(subcommand)]
        meta_command: MetaCommands,

        /// Server address to connect to
        #[arg(short, long, default_value = "127.0.0.1:8118")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Server {
            config_path,
            addr,
            total_node_num,
            init_timeout_ms,
            monitor_interval_ms,
            node_timeout_ms,
        } => {
            let config = build_config(
                config_path,
                addr,
                total_node_num,
                init_timeout_ms,
                monitor_interval_ms,
                node_timeout_ms,
            )?;
            tracing::debug!("Loaded config: {:?}", config);
            run_server(config).await
        }
        Commands::Meta {
            meta_command,
            server,
        } => handle_meta_command(meta_command, &server).await,
    }
}

/// Loads the config file (if any) and applies command line overrides on top.
fn build_config(
    config_path: Option<String>,
    addr: Option<String>,
    total_node_num: Option<usize>,
    init_timeout_ms: Option<u64>,
    monitor_interval_ms: Option<u64>,
    node_timeout_ms: Option<u64>,
) -> anyhow::Result<TopologyConfig> {
    let mut config = match (config_path, total_node_num) {
        (Some(path), _) => TopologyConfig::from_file(&path)?,
        (None, Some(total)) => TopologyConfig::new("127.0.0.1:8118", total),
        (None, None) => anyhow::bail!("Either --config-path or --total-node-num is required"),
    };
    if let Some(addr) = addr {
        config.listen_addr = addr;
    }
    if let Some(total) = total_node_num {
        config.total_node_num = total;
    }
    if let Some(ms) = init_timeout_ms {
        config.init_timeout_ms = ms;
    }
    if let Some(ms) = monitor_interval_ms {
        config.monitor_interval_ms = ms;
    }
    if let Some(ms) = node_timeout_ms {
        config.node_timeout_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

/// Serves until the topology finishes, fails, or the process is interrupted.
async fn run_server(config: TopologyConfig) -> anyhow::Result<()> {
    tracing::info!("Starting meta server node...");
    let interval = config.monitor_interval();
    let node = MetaServerNode::new(config);
    if !node.initialize().await {
        return Err(Error::Internal("Failed to initialize the meta server node".to_string()).into());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::warn!("Interrupted, shutting down with topology {}", node.topology_state());
                node.finalize(true).await;
                return Ok(());
            }
            _ = tokio::time::sleep(interval.min(Duration::from_secs(1))) => {}
        }
        match node.topology_state() {
            TopoState::Finished => {
                node.finalize(false).await;
                tracing::info!("All compute graph nodes have finished, exiting");
                return Ok(());
            }
            TopoState::Failed => {
                node.finalize(true).await;
                anyhow::bail!("The cluster topology failed to initialize");
            }
            TopoState::Initializing | TopoState::Initialized => {}
        }
    }
}
