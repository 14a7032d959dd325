//! Transport Client – one resilient connection to the phone sensor server.
//!
//! [`TransportClient::connect_and_run`] walks an ordered list of transport
//! kinds until one connects, then delivers raw frames onto an `mpsc` channel
//! consumed by the ingest task. Two transports map to the same delivery
//! contract:
//!
//! - [`TransportKind::WebSocket`] – the framed connection the phone normally
//!   serves, optionally over TLS. Phones on a LAN present self-signed
//!   certificates, so certificate validation is disabled (explicit trust-all
//!   policy).
//! - [`TransportKind::Tcp`] – a plain streaming socket carrying
//!   newline-delimited JSON, used as fallback.
//!
//! One call walks the preference list exactly once; re-invoking it is an
//! external decision, not an internal backoff loop. Transport errors are
//! logged and end the receive loop without terminating the process, and the
//! shared [`ConnectionState`] is guaranteed to read `connected = false` on
//! every exit path.

use std::str::FromStr;

use futures_util::StreamExt;
use phonelink_types::BridgeError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, connect_async_tls_with_config};
use tracing::{info, warn};

use crate::state::ConnectionState;

/// A transport variant the client can try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    WebSocket,
    Tcp,
}

impl FromStr for TransportKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "tcp" | "stream" => Ok(TransportKind::Tcp),
            other => Err(BridgeError::Config(format!(
                "unknown transport kind '{other}' (expected 'websocket' or 'tcp')"
            ))),
        }
    }
}

/// Marks the link down when the receive loop exits, however it exits.
struct LinkDownGuard(ConnectionState);

impl Drop for LinkDownGuard {
    fn drop(&mut self) {
        self.0.mark_disconnected();
    }
}

/// Client side of the phone connection.
pub struct TransportClient {
    endpoint: String,
    state: ConnectionState,
    frames: mpsc::Sender<String>,
    shutdown: watch::Receiver<bool>,
}

impl TransportClient {
    /// `endpoint` is a host:port or URL; the scheme is adapted per transport
    /// (`wss://host` for WebSocket over TLS, bare `host:port` for TCP).
    pub fn new(
        endpoint: impl Into<String>,
        state: ConnectionState,
        frames: mpsc::Sender<String>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            state,
            frames,
            shutdown,
        }
    }

    /// Try each transport in `order` until one connects, then run its receive
    /// loop until the peer closes, an I/O error occurs, or shutdown is
    /// signalled.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connection`] only when *every* variant in
    /// `order` fails to establish a connection. A connection that is
    /// established and later lost is a normal termination (`Ok`); the
    /// supervisor decides whether to call again.
    pub async fn connect_and_run(&mut self, order: &[TransportKind]) -> Result<(), BridgeError> {
        let mut last_error =
            BridgeError::Connection("empty transport preference list".to_string());

        for kind in order {
            info!(transport = ?kind, endpoint = %self.endpoint, "attempting connection");
            let result = match kind {
                TransportKind::WebSocket => self.run_websocket().await,
                TransportKind::Tcp => self.run_tcp().await,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(transport = ?kind, error = %e, "transport failed to connect");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    // ────────────────────────────────────────────────────────────────────────
    // WebSocket variant
    // ────────────────────────────────────────────────────────────────────────

    async fn run_websocket(&mut self) -> Result<(), BridgeError> {
        let url = websocket_url(&self.endpoint);

        // Trust-all TLS: phones on a LAN serve self-signed certificates.
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| BridgeError::Connection(format!("tls connector: {e}")))?;

        let (mut ws, _response) =
            connect_async_tls_with_config(&url, None, false, Some(Connector::NativeTls(tls)))
                .await
                .map_err(|e| BridgeError::Connection(format!("websocket connect {url}: {e}")))?;

        self.state.mark_connected();
        info!(%url, "websocket connection established");
        let _guard = LinkDownGuard(self.state.clone());

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("shutdown requested, closing websocket");
                        break;
                    }
                }
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if !self.deliver(text.as_str().to_string()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => {
                            if !self.deliver(text).await {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("websocket closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong handled by the library
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive error");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Plain TCP streaming variant
    // ────────────────────────────────────────────────────────────────────────

    async fn run_tcp(&mut self) -> Result<(), BridgeError> {
        let addr = tcp_addr(&self.endpoint);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| BridgeError::Connection(format!("tcp connect {addr}: {e}")))?;

        self.state.mark_connected();
        info!(%addr, "tcp stream connection established");
        let _guard = LinkDownGuard(self.state.clone());

        let mut lines = BufReader::new(stream).lines();
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("shutdown requested, closing tcp stream");
                        break;
                    }
                }
                line = lines.next_line() => match line {
                    Ok(Some(text)) => {
                        if !self.deliver(text).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("tcp stream closed by peer");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "tcp receive error");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Refresh the freshness clock and hand the raw frame to the ingest
    /// channel. Returns `false` when the ingest side is gone and the receive
    /// loop should stop.
    async fn deliver(&self, raw: String) -> bool {
        self.state.mark_frame();
        if self.frames.send(raw).await.is_err() {
            warn!("frame channel closed, stopping receive loop");
            return false;
        }
        true
    }
}

/// Normalize an endpoint into a WebSocket URL, mapping http(s) schemes to
/// their ws(s) counterparts and defaulting bare host:port to `ws://`.
fn websocket_url(endpoint: &str) -> String {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        endpoint.to_string()
    } else if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{endpoint}")
    }
}

/// Reduce an endpoint to the host:port a plain TCP socket connects to.
fn tcp_addr(endpoint: &str) -> String {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    without_scheme
        .split_once('/')
        .map(|(host, _)| host)
        .unwrap_or(without_scheme)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn transport_kind_parses_known_names() {
        assert_eq!("websocket".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert_eq!("WS".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert_eq!("tcp".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn websocket_url_maps_schemes() {
        assert_eq!(websocket_url("192.168.1.11:3000"), "ws://192.168.1.11:3000");
        assert_eq!(websocket_url("https://phone:3000"), "wss://phone:3000");
        assert_eq!(websocket_url("http://phone:3000"), "ws://phone:3000");
        assert_eq!(websocket_url("wss://phone:3000"), "wss://phone:3000");
    }

    #[test]
    fn tcp_addr_strips_scheme_and_path() {
        assert_eq!(tcp_addr("ws://phone:3000/stream"), "phone:3000");
        assert_eq!(tcp_addr("phone:3000"), "phone:3000");
        assert_eq!(tcp_addr("https://phone:3000"), "phone:3000");
    }

    fn make_client(
        endpoint: String,
    ) -> (
        TransportClient,
        mpsc::Receiver<String>,
        ConnectionState,
        watch::Sender<bool>,
    ) {
        let state = ConnectionState::new();
        let (frames_tx, frames_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let client = TransportClient::new(endpoint, state.clone(), frames_tx, shutdown_rx);
        (client, frames_rx, state, shutdown_tx)
    }

    #[tokio::test]
    async fn tcp_transport_delivers_newline_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(b"{\"battery\":{\"level\":0.8}}\n{\"type\":\"welcome\"}\n")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });

        let (mut client, mut frames, state, _shutdown) = make_client(addr.to_string());
        client.connect_and_run(&[TransportKind::Tcp]).await.unwrap();
        server.await.unwrap();

        assert_eq!(frames.recv().await.unwrap(), r#"{"battery":{"level":0.8}}"#);
        assert_eq!(frames.recv().await.unwrap(), r#"{"type":"welcome"}"#);

        let snap = state.snapshot();
        assert!(!snap.connected, "link must be down after peer close");
        assert!(snap.data_age.is_some(), "frames were received");
    }

    #[tokio::test]
    async fn all_transports_failing_reports_connection_error() {
        // Bind and immediately drop a listener to get a dead port.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (mut client, _frames, state, _shutdown) = make_client(addr.to_string());
        let result = client
            .connect_and_run(&[TransportKind::WebSocket, TransportKind::Tcp])
            .await;

        assert!(matches!(result, Err(BridgeError::Connection(_))));
        assert!(!state.snapshot().connected);
    }

    #[tokio::test]
    async fn websocket_failure_falls_back_to_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // First accept is the doomed websocket handshake: close it.
            let (first, _) = listener.accept().await.unwrap();
            drop(first);
            // Second accept serves the TCP fallback.
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"{\"gps\":{\"latitude\":1.0}}\n").await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let (mut client, mut frames, _state, _shutdown) = make_client(addr.to_string());
        client
            .connect_and_run(&[TransportKind::WebSocket, TransportKind::Tcp])
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(frames.recv().await.unwrap(), r#"{"gps":{"latitude":1.0}}"#);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_receive_loop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Server accepts and then stays silent.
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let state = ConnectionState::new();
        let (frames_tx, _frames_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut client =
            TransportClient::new(addr.to_string(), state.clone(), frames_tx, shutdown_rx);

        let handle = tokio::spawn(async move {
            client.connect_and_run(&[TransportKind::Tcp]).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(state.snapshot().connected);

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("loop must stop promptly")
            .unwrap();
        assert!(result.is_ok());
        assert!(!state.snapshot().connected);
        server.abort();
    }
}
