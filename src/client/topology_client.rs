use bytes::Bytes;
use prost::Message as _;
use tokio::sync::Mutex;

use crate::{
    common::error::{Error, Result},
    protocol::{
        HeartbeatMessage, Message, MessageName, MetadataMessage, RegistrationMessage,
        RegistrationRespMessage, UnregistrationMessage,
    },
    transport::TcpClient,
};

/// Typed client of the meta-server wire protocol.
pub struct TopologyClient {
    client: Mutex<TcpClient>,
}

impl TopologyClient {
    pub async fn new(server_addr: &str) -> Result<Self> {
        let client = TcpClient::connect(server_addr).await.map_err(|e| {
            Error::Transport(format!("Failed to connect to meta server {}: {}", server_addr, e))
        })?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    async fn call(&self, message: Message) -> Result<Option<Message>> {
        let mut client = self.client.lock().await;
        client.send(message).await
    }

    pub async fn register(&self, node_id: &str) -> Result<RegistrationRespMessage> {
        let body = RegistrationMessage {
            node_id: node_id.to_string(),
        };
        let reply = self
            .call(Message::system(MessageName::Registration, body.encode_to_vec()))
            .await?
            .ok_or_else(|| Error::Transport("No reply to registration".to_string()))?;
        Ok(RegistrationRespMessage::decode(reply.body)?)
    }

    /// Returns the status carried by the reply: `Success`, `InvalidNode` or `UninitTopo`.
    pub async fn unregister(&self, node_id: &str) -> Result<MessageName> {
        let body = UnregistrationMessage {
            node_id: node_id.to_string(),
        };
        let reply = self
            .call(Message::system(MessageName::Unregistration, body.encode_to_vec()))
            .await?
            .ok_or_else(|| Error::Transport("No reply to unregistration".to_string()))?;
        reply
            .system_name()
            .ok_or_else(|| Error::Transport(format!("Unexpected reply name: {}", reply.name)))
    }

    pub async fn heartbeat(&self, node_id: &str) -> Result<()> {
        let body = HeartbeatMessage {
            node_id: node_id.to_string(),
        };
        self.call(Message::system(MessageName::Heartbeat, body.encode_to_vec()))
            .await?;
        Ok(())
    }

    pub async fn write_metadata(&self, name: &str, value: Bytes) -> Result<()> {
        let body = MetadataMessage {
            name: name.to_string(),
            value,
        };
        self.call(Message::system(MessageName::WriteMetadata, body.encode_to_vec()))
            .await?;
        Ok(())
    }

    pub async fn read_metadata(&self, name: &str) -> Result<Option<Bytes>> {
        let body = MetadataMessage {
            name: name.to_string(),
            value: Bytes::new(),
        };
        let reply = self
            .call(Message::system(MessageName::ReadMetadata, body.encode_to_vec()))
            .await?
            .ok_or_else(|| Error::Transport("No reply to metadata read".to_string()))?;
        match reply.system_name() {
            Some(MessageName::ValidMetadata) => Ok(Some(MetadataMessage::decode(reply.body)?.value)),
            Some(MessageName::InvalidMetadata) => Ok(None),
            _ => Err(Error::Transport(format!(
                "Unexpected reply name: {}",
                reply.name
            ))),
        }
    }

    /// Sends a user defined message and returns the handler's output, if any.
    pub async fn send(&self, name: &str, body: Bytes) -> Result<Option<Bytes>> {
        let reply = self.call(Message::new(name, body)).await?;
        Ok(reply.map(|message| message.body))
    }
}
