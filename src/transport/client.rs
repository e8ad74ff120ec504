use tokio::net::{TcpStream, ToSocketAddrs};

use super::frame::{read_frame, write_frame};
use super::tcp_url;
use crate::common::{Error, Result};
use crate::protocol::Message;

/// Synchronous request/response client: one outstanding message at a time.
pub struct TcpClient {
    stream: TcpStream,
    local_url: String,
}

impl TcpClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to connect: {}", e)))?;
        stream.set_nodelay(true)?;
        let local_url = tcp_url(&stream.local_addr()?);
        Ok(Self { stream, local_url })
    }

    /// Sends `message` and waits for its reply; `Ok(None)` is the "no reply" answer.
    pub async fn send(&mut self, message: Message) -> Result<Option<Message>> {
        let message = message.with_from(self.local_url.clone());
        write_frame(&mut self.stream, &Message::into_envelope(Some(message))).await?;
        match read_frame(&mut self.stream).await? {
            Some(envelope) => Ok(Message::from_envelope(envelope)),
            None => Err(Error::Transport(
                "Connection closed before reply".to_string(),
            )),
        }
    }
}
