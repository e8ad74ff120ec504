use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::frame::{read_frame, write_frame};
use super::{tcp_url, InboundHandler};
use crate::common::{Error, Result};
use crate::protocol::Message;

/// TCP server that hands every inbound frame to an [`InboundHandler`] and
/// writes back its reply.
pub struct TcpServer {
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TcpServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, _) = watch::channel(false);
        tracing::debug!("TCP server bound to {}", local_addr);
        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            accept_task: Mutex::new(None),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        tcp_url(&self.local_addr)
    }

    /// Starts accepting connections. Can only be called once.
    pub async fn start(&self, handler: Arc<dyn InboundHandler>) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Transport("TCP server already started".to_string()))?;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let task = tokio::spawn(accept_loop(listener, handler, shutdown_rx));
        *self.accept_task.lock().await = Some(task);
        tracing::info!("TCP server listening on {}", self.local_addr);
        Ok(())
    }

    /// Stops accepting and closes open connections once their in-flight message is answered.
    pub async fn finalize(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.accept_task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::error!("TCP accept loop on {} exited abnormally: {}", self.local_addr, e);
            }
        }
        self.listener.lock().await.take();
        tracing::info!("TCP server on {} stopped", self.local_addr);
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn InboundHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!("Accepted connection from {}", peer);
                    let handler = handler.clone();
                    let shutdown_rx = shutdown_rx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, handler, shutdown_rx).await {
                            tracing::warn!("Connection from {} closed with error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            },
            _ = shutdown_rx.changed() => break,
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    handler: Arc<dyn InboundHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    if *shutdown_rx.borrow() {
        return Ok(());
    }
    loop {
        let envelope = tokio::select! {
            frame = read_frame(&mut stream) => match frame? {
                Some(envelope) => envelope,
                None => return Ok(()),
            },
            _ = shutdown_rx.changed() => return Ok(()),
        };
        let reply = match Message::from_envelope(envelope) {
            Some(message) => handler.handle_message(message).await,
            None => {
                tracing::error!("Received message without a name");
                None
            }
        };
        write_frame(&mut stream, &Message::into_envelope(reply)).await?;
    }
}
