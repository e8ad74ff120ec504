//! Point-to-point message transport over TCP
//!
//! Frames are a big-endian `u32` length followed by a protobuf [`Envelope`].
//! Every request frame is answered by exactly one response frame so that a
//! client can pair them without correlation ids.
//!
//! [`Envelope`]: crate::protocol::Envelope

pub mod client;
pub mod frame;
pub mod server;

use async_trait::async_trait;

use crate::protocol::Message;

pub use client::TcpClient;
pub use server::TcpServer;

/// Callback invoked for every inbound message. `None` means "no reply".
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    async fn handle_message(&self, message: Message) -> Option<Message>;
}

pub fn tcp_url(addr: &std::net::SocketAddr) -> String {
    format!("tcp://{}", addr)
}
