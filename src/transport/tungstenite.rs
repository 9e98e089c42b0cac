//! Bundled tokio transport binding.
//!
//! Backs a [`Connection`](crate::Connection) with `tokio-tungstenite`. The
//! binding spawns a tokio task per connect attempt that performs the
//! handshake and then services an internal command channel alongside the
//! socket stream; all outcomes flow back through the bridge.
//!
//! Wire framing, masking, and the HTTP upgrade stay tungstenite's job; this
//! module only adapts its stream to the transport capability interface.
//!
//! # Runtime
//!
//! [`TungsteniteTransport::connect`] must be called from within a tokio
//! runtime context.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as HandshakeRequest;
use tokio_tungstenite::tungstenite::http::header::{
    HeaderName, HeaderValue, SEC_WEBSOCKET_PROTOCOL,
};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, warn};

use crate::connection::Bridge;
use crate::error::{Error, Result};
use crate::transport::{ConnectRequest, Transport, TransportEvent};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands pushed from the connection into the event loop.
enum Command {
    SendText(String),
    SendBytes(Vec<u8>),
    SendPing(String),
    Shutdown,
}

// ============================================================================
// TungsteniteTransport
// ============================================================================

/// Transport over `tokio-tungstenite`.
///
/// One instance services one connect attempt; the connection builds a fresh
/// instance per open through the registered builder.
#[derive(Debug, Default)]
pub struct TungsteniteTransport {
    /// Optional bound on the connect attempt. `None` preserves the
    /// historical behavior of waiting indefinitely.
    connect_timeout: Option<Duration>,
    /// Accept any TLS certificate on `wss` connects.
    trust_all: bool,
    /// Command channel into the event loop, present once connect was issued.
    command_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    /// Connected flag maintained by the event loop.
    connected: Arc<AtomicBool>,
}

impl TungsteniteTransport {
    /// Creates a transport with default settings: no connect timeout,
    /// standard certificate validation.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the connect attempt to `timeout`.
    ///
    /// Expiry surfaces like any other connect failure: one `Error` event on
    /// the owning connection.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables certificate and hostname validation on `wss` connects.
    ///
    /// This is the trust-all override; it accepts ANY certificate chain.
    /// Use only against endpoints you control.
    #[inline]
    #[must_use]
    pub fn trust_all_certificates(mut self) -> Self {
        self.trust_all = true;
        self
    }

    /// Registers this binding as the process-wide transport builder.
    ///
    /// Call once at startup; afterwards
    /// [`create_connection`](crate::create_connection) produces connections
    /// backed by this transport.
    pub fn link() {
        crate::factory::set_transport_builder(|| {
            Box::new(Self::new()) as Box<dyn Transport>
        });
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for TungsteniteTransport {
    fn connect(&self, request: ConnectRequest, bridge: Bridge) -> Result<()> {
        let handshake = build_handshake_request(&request)?;

        let connector = build_connector(self.trust_all)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.command_tx.lock() = Some(command_tx);

        let connected = Arc::clone(&self.connected);
        let connect_timeout = self.connect_timeout;

        tokio::spawn(async move {
            run_event_loop(
                handshake,
                connector,
                connect_timeout,
                command_rx,
                bridge,
                connected,
            )
            .await;
        });

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send_text(&self, text: String) -> Result<()> {
        self.push(Command::SendText(text))
    }

    fn send_bytes(&self, bytes: Vec<u8>) -> Result<()> {
        self.push(Command::SendBytes(bytes))
    }

    fn send_ping(&self, payload: String) -> Result<()> {
        self.push(Command::SendPing(payload))
    }

    fn shutdown(&self) -> Result<()> {
        // A dead event loop means the connection is already down; that is
        // not a shutdown fault.
        if let Some(tx) = self.command_tx.lock().take() {
            let _ = tx.send(Command::Shutdown);
        }
        Ok(())
    }
}

impl TungsteniteTransport {
    fn push(&self, command: Command) -> Result<()> {
        let guard = self.command_tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(Error::send("transport was never connected"));
        };
        tx.send(command)
            .map_err(|_| Error::send("connection is closed"))
    }
}

// ============================================================================
// Handshake Request
// ============================================================================

/// Builds the HTTP upgrade request from a connect request.
fn build_handshake_request(request: &ConnectRequest) -> Result<HandshakeRequest> {
    let mut handshake = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::connect(format!("invalid handshake request: {e}")))?;

    if let Some(protocol) = request.protocol.as_deref() {
        let value = HeaderValue::from_str(protocol)
            .map_err(|e| Error::connect(format!("invalid subprotocol {protocol:?}: {e}")))?;
        handshake.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    for (name, value) in request.headers.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::connect(format!("invalid header name {name:?}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| Error::connect(format!("invalid value for header {name:?}: {e}")))?;
        handshake.headers_mut().insert(header_name, header_value);
    }

    Ok(handshake)
}

/// Builds the TLS connector for the trust-all override.
///
/// `None` leaves tungstenite's default validation in place.
fn build_connector(trust_all: bool) -> Result<Option<Connector>> {
    if !trust_all {
        return Ok(None);
    }

    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| Error::connect(format!("failed to build trust-all connector: {e}")))?;

    Ok(Some(Connector::NativeTls(tls)))
}

// ============================================================================
// Event Loop
// ============================================================================

/// Connects and services the socket until shutdown or stream end.
async fn run_event_loop(
    handshake: HandshakeRequest,
    connector: Option<Connector>,
    connect_timeout: Option<Duration>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    bridge: Bridge,
    connected: Arc<AtomicBool>,
) {
    let connect = connect_async_tls_with_config(handshake, None, false, connector);

    let connect_result = match connect_timeout {
        Some(limit) => match tokio::time::timeout(limit, connect).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "connect timed out");
                bridge.deliver(TransportEvent::Failed {
                    message: Some(format!(
                        "connect timed out after {}ms",
                        limit.as_millis()
                    )),
                });
                return;
            }
        },
        None => connect.await,
    };

    let ws_stream: WsStream = match connect_result {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(error = %e, "connect failed");
            bridge.deliver(TransportEvent::Failed {
                message: Some(e.to_string()),
            });
            return;
        }
    };

    debug!("websocket connected");
    connected.store(true, Ordering::Release);
    bridge.deliver(TransportEvent::Opened);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Inbound frames from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        bridge.deliver(TransportEvent::Message(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        bridge.deliver(TransportEvent::Message(text));
                    }

                    Some(Ok(Message::Pong(payload))) => {
                        let text = String::from_utf8_lossy(&payload).into_owned();
                        bridge.deliver(TransportEvent::Pong(text));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "closed by remote");
                        let reason = frame
                            .map(|f| f.reason.as_str().to_owned())
                            .filter(|reason| !reason.is_empty());
                        bridge.deliver(TransportEvent::Closed { reason });
                        break;
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "websocket stream error");
                        bridge.deliver(TransportEvent::Failed {
                            message: Some(e.to_string()),
                        });
                        break;
                    }

                    None => {
                        debug!("websocket stream ended");
                        bridge.deliver(TransportEvent::Closed { reason: None });
                        break;
                    }

                    // Pings are answered by tungstenite itself.
                    _ => {}
                }
            }

            // Commands from the connection
            command = command_rx.recv() => {
                match command {
                    Some(Command::SendText(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            bridge.deliver(TransportEvent::SendFailed {
                                message: e.to_string(),
                            });
                        }
                    }

                    Some(Command::SendBytes(bytes)) => {
                        if let Err(e) = ws_write.send(Message::Binary(bytes.into())).await {
                            bridge.deliver(TransportEvent::SendFailed {
                                message: e.to_string(),
                            });
                        }
                    }

                    Some(Command::SendPing(payload)) => {
                        let frame = Message::Ping(payload.into_bytes().into());
                        if let Err(e) = ws_write.send(frame).await {
                            bridge.deliver(TransportEvent::SendFailed {
                                message: e.to_string(),
                            });
                        }
                    }

                    Some(Command::Shutdown) => {
                        debug!("shutdown command received");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!("command channel closed");
                        break;
                    }
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    debug!("event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================
