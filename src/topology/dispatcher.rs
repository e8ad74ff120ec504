use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message as _;
use tokio::sync::RwLock;

use super::metadata::MetadataStore;
use super::registry::{NodeRegistry, UnregisterStatus};
use crate::common::Result;
use crate::protocol::{
    is_system_message, HeartbeatMessage, Message, MessageName, MetadataMessage,
    RegistrationMessage, RegistrationRespMessage, UnregistrationMessage,
};
use crate::transport::InboundHandler;

/// Handler of a user defined message. An empty result means "no reply".
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: &[u8]) -> Vec<u8>;
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    async fn handle(&self, body: &[u8]) -> Vec<u8> {
        self(body)
    }
}

/// Routes inbound messages to the built-in system handlers or to user handlers.
pub struct MessageDispatcher {
    registry: Arc<NodeRegistry>,
    metadata: Arc<MetadataStore>,
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
    url: OnceLock<String>,
}

impl MessageDispatcher {
    pub fn new(registry: Arc<NodeRegistry>, metadata: Arc<MetadataStore>) -> Self {
        Self {
            registry,
            metadata,
            handlers: RwLock::new(HashMap::new()),
            url: OnceLock::new(),
        }
    }

    /// Sets the address stamped on replies. Only the first call has an effect.
    pub fn set_url(&self, url: String) {
        let _ = self.url.set(url);
    }

    fn url(&self) -> &str {
        self.url.get().map(String::as_str).unwrap_or_default()
    }

    /// Registers a handler for `name`. Existing handlers are never replaced
    /// and all-digit names are refused since they route to system handlers.
    pub async fn register_message_handler(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> bool {
        if is_system_message(name) {
            tracing::error!(
                "The message name: {} is reserved for system messages",
                name
            );
            return false;
        }
        let mut handlers = self.handlers.write().await;
        if handlers.contains_key(name) {
            tracing::error!("The message name: {} has already been registered", name);
            return false;
        }
        handlers.insert(name.to_string(), handler);
        true
    }

    pub async fn dispatch(&self, message: Message) -> Option<Message> {
        if is_system_message(&message.name) {
            match message.system_name() {
                Some(name) => self.dispatch_system(name, message.body).await,
                None => {
                    tracing::error!("Unknown system message name: {}", message.name);
                    None
                }
            }
        } else {
            self.dispatch_user(message).await
        }
    }

    async fn dispatch_system(&self, name: MessageName, body: Bytes) -> Option<Message> {
        let result = match name {
            MessageName::Registration => self.process_register(body).await,
            MessageName::Unregistration => self.process_unregister(body).await,
            MessageName::Heartbeat => self.process_heartbeat(body).await,
            MessageName::WriteMetadata => self.process_write_metadata(body).await,
            MessageName::ReadMetadata => self.process_read_metadata(body).await,
            other => {
                tracing::error!("Unknown system message name: {}", other);
                return None;
            }
        };
        match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Failed to process {} message: {}", name, e);
                None
            }
        }
    }

    async fn dispatch_user(&self, message: Message) -> Option<Message> {
        // Clone the handler out so the table lock is not held while it runs.
        let handler = self.handlers.read().await.get(&message.name).cloned();
        let Some(handler) = handler else {
            tracing::error!("Unknown message name: {}", message.name);
            return None;
        };
        let result = handler.handle(&message.body).await;
        if result.is_empty() {
            return None;
        }
        Some(self.reply(message.name, result))
    }

    fn reply<N: Into<String>, B: Into<Bytes>>(&self, name: N, body: B) -> Message {
        Message::new(name, body).with_from(self.url())
    }

    async fn process_register(&self, body: Bytes) -> Result<Option<Message>> {
        let registration = RegistrationMessage::decode(body)?;
        let node_id = registration.node_id;
        let rank_id = if node_id.is_empty() {
            tracing::error!("Received registration with an empty node id.");
            None
        } else {
            self.registry.register(&node_id).await
        };

        let reply = match rank_id {
            Some(rank_id) => {
                let resp = RegistrationRespMessage {
                    success: true,
                    rank_id,
                    node_num: self.registry.total_node_num() as i64,
                };
                self.reply(MessageName::Success.wire_name(), resp.encode_to_vec())
            }
            None => {
                let resp = RegistrationRespMessage {
                    success: false,
                    ..Default::default()
                };
                self.reply(MessageName::InvalidNode.wire_name(), resp.encode_to_vec())
            }
        };
        Ok(Some(reply))
    }

    async fn process_unregister(&self, body: Bytes) -> Result<Option<Message>> {
        let unregistration = UnregistrationMessage::decode(body)?;
        let status = match self.registry.unregister(&unregistration.node_id).await {
            UnregisterStatus::Success => MessageName::Success,
            UnregisterStatus::InvalidNode => MessageName::InvalidNode,
            UnregisterStatus::UninitializedTopology => MessageName::UninitTopo,
        };
        Ok(Some(self.reply(status.wire_name(), status.wire_name())))
    }

    async fn process_heartbeat(&self, body: Bytes) -> Result<Option<Message>> {
        let heartbeat = HeartbeatMessage::decode(body)?;
        self.registry.heartbeat(&heartbeat.node_id).await;
        Ok(None)
    }

    async fn process_write_metadata(&self, body: Bytes) -> Result<Option<Message>> {
        let meta = MetadataMessage::decode(body)?;
        self.metadata.write(&meta.name, meta.value).await;
        Ok(None)
    }

    async fn process_read_metadata(&self, body: Bytes) -> Result<Option<Message>> {
        let mut meta = MetadataMessage::decode(body)?;
        let result = match self.metadata.read(&meta.name).await {
            Some(value) => {
                meta.value = value;
                MessageName::ValidMetadata
            }
            None => {
                meta.value = Bytes::new();
                MessageName::InvalidMetadata
            }
        };
        Ok(Some(self.reply(result.wire_name(), meta.encode_to_vec())))
    }
}

#[async_trait]
impl InboundHandler for MessageDispatcher {
    async fn handle_message(&self, message: Message) -> Option<Message> {
        tracing::trace!("Dispatching message {} from {}", message.name, message.from);
        self.dispatch(message).await
    }
}
