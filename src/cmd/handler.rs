use bytes::Bytes;

use crate::{client::TopologyClient, cmd::meta_command::MetaCommands, protocol::MessageName};

pub async fn handle_meta_command(command: MetaCommands, server: &str) -> anyhow::Result<()> {
    let client = TopologyClient::new(server).await?;
    match command {
        MetaCommands::Put { name, value } => {
            if name.is_empty() {
                anyhow::bail!("Metadata name must not be empty");
            }
            client.write_metadata(&name, Bytes::from(value)).await?;
            println!("Wrote metadata {}", name);
        }
        MetaCommands::Get { name } => match client.read_metadata(&name).await? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => anyhow::bail!("Metadata {} not found", name),
        },
        MetaCommands::Register { node_id } => {
            let resp = client.register(&node_id).await?;
            if !resp.success {
                anyhow::bail!("Node {} is already registered", node_id);
            }
            println!(
                "Registered {} with rank {} (cluster size {})",
                node_id, resp.rank_id, resp.node_num
            );
        }
        MetaCommands::Unregister { node_id } => match client.unregister(&node_id).await? {
            MessageName::Success => println!("Unregistered {}", node_id),
            MessageName::InvalidNode => anyhow::bail!("Node {} is not registered", node_id),
            MessageName::UninitTopo => {
                anyhow::bail!("The cluster topology has not been initialized yet")
            }
            other => anyhow::bail!("Unexpected status {}", other),
        },
        MetaCommands::Heartbeat { node_id } => {
            client.heartbeat(&node_id).await?;
            println!("Heartbeat sent for {}", node_id);
        }
        MetaCommands::Send { name, body } => {
            match client.send(&name, Bytes::from(body)).await? {
                Some(reply) => println!("{}", String::from_utf8_lossy(&reply)),
                None => println!("(no reply)"),
            }
        }
    }
    Ok(())
}
