//! WebSocket egress – fans the live event stream out to dashboards.
//!
//! [`WsEgress`] serves a lightweight WebSocket endpoint where external
//! clients (web dashboards, loggers) subscribe to the bus firehose as
//! newline-delimited JSON. Clients are read-only consumers; inbound frames
//! other than `Close` are ignored. A lagged or closed client never stalls
//! the pipeline – each client runs on its own task over its own broadcast
//! receiver.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use phonelink_types::BridgeError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::bus::EventBus;

/// WebSocket fan-out server over the bus firehose.
#[derive(Clone)]
pub struct WsEgress {
    bus: Arc<EventBus>,
}

impl WsEgress {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Accept clients on `addr` until shutdown is signalled.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connection`] if the listener cannot be bound.
    pub async fn run(
        self,
        addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Connection(format!("egress bind {addr}: {e}")))?;
        info!(%addr, "event stream egress listening");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested, egress listener stopping");
                        break;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let egress = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = egress.handle_client(stream, peer).await {
                                error!(peer = %peer, error = %e, "egress client error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "egress accept error");
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), BridgeError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| BridgeError::Connection(format!("ws handshake from {peer}: {e}")))?;
        info!(peer = %peer, "egress client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut events = self.bus.subscribe_all();

        loop {
            tokio::select! {
                result = events.recv() => {
                    match result {
                        Ok(event) => {
                            let json = serde_json::to_string(&event)
                                .map_err(|e| BridgeError::Channel(e.to_string()))?;
                            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %peer, lagged_by = n, "egress client lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                message = ws_rx.next() => {
                    match message {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        // Dashboards are read-only consumers.
                        Some(Ok(_)) => {}
                    }
                }
            }
        }

        info!(peer = %peer, "egress client disconnected");
        Ok(())
    }
}
