//! Transport capability layer.
//!
//! A transport is the platform collaborator that performs the actual network
//! I/O and wire-protocol framing for one WebSocket connection. The core
//! state machine ([`Connection`](crate::Connection)) is transport-agnostic:
//! it drives any implementation of the [`Transport`] trait and receives
//! asynchronous outcomes through a [`Bridge`](crate::connection::Bridge).
//!
//! # Command Model
//!
//! Transport commands are fire-and-forget. A synchronous `Err` from a
//! command is converted by the connection into an `Error` event; everything
//! asynchronous (connect success or failure, inbound frames, remote close)
//! arrives as a [`TransportEvent`] delivered through the bridge, on whatever
//! thread or task the transport runs its I/O on.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `tungstenite` | Bundled tokio binding over `tokio-tungstenite` |

// ============================================================================
// Submodules
// ============================================================================

/// Bundled tokio transport binding.
pub mod tungstenite;

// ============================================================================
// Re-exports
// ============================================================================

pub use tungstenite::TungsteniteTransport;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::connection::Bridge;
use crate::error::Result;
use crate::headers::Headers;

// ============================================================================
// TransportEvent
// ============================================================================

/// Inbound events a transport delivers to its connection.
///
/// Binary message frames are decoded to text before delivery; the connection
/// surface is text-only on the inbound side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connect attempt succeeded.
    Opened,
    /// The peer closed the connection, or the stream ended.
    Closed {
        /// Close reason, when the peer supplied one.
        reason: Option<String>,
    },
    /// The transport failed (connect error or mid-stream fault).
    Failed {
        /// Failure description, when the transport has one.
        message: Option<String>,
    },
    /// An asynchronous submission fault (an awaited write failed).
    ///
    /// Surfaces as an `Error` event only; unlike [`TransportEvent::Failed`]
    /// it does not tear the connection down.
    SendFailed {
        /// Description of the submission fault.
        message: String,
    },
    /// An inbound message, decoded to text.
    Message(String),
    /// A native pong frame, payload decoded to text.
    Pong(String),
}

// ============================================================================
// ConnectRequest
// ============================================================================

/// Everything a transport needs to initiate one connect attempt.
///
/// The URL arrives already normalized to a WebSocket scheme (`ws`/`wss`).
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Endpoint to connect to.
    pub url: Url,
    /// Optional WebSocket subprotocol to negotiate.
    pub protocol: Option<String>,
    /// Handshake headers (already merged with any auth token).
    pub headers: Headers,
}

// ============================================================================
// Transport
// ============================================================================

/// Capability set a platform transport must supply.
///
/// Exactly one connection owns a transport instance at a time, and a
/// transport instance services at most one connect attempt; the connection
/// builds a fresh instance per open.
///
/// Methods take `&self`; an implementation keeps its mutable state behind
/// its own synchronization. The connection attaches the transport to its
/// slot before issuing `connect` and never holds its internal locks while
/// calling any of these methods, so an implementation is free to deliver
/// bridge events synchronously from inside them.
pub trait Transport: Send + Sync {
    /// Initiates an asynchronous connect attempt.
    ///
    /// The outcome is delivered through `bridge` as
    /// [`TransportEvent::Opened`] or [`TransportEvent::Failed`]; subsequent
    /// inbound traffic follows on the same bridge. Delivery may happen
    /// synchronously, before this method returns.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults detected synchronously (for example,
    /// a malformed handshake request).
    fn connect(&self, request: ConnectRequest, bridge: Bridge) -> Result<()>;

    /// Returns `true` while the transport considers itself connected.
    fn is_connected(&self) -> bool;

    /// Submits a text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission cannot be queued.
    fn send_text(&self, text: String) -> Result<()>;

    /// Submits a binary message.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission cannot be queued.
    fn send_bytes(&self, bytes: Vec<u8>) -> Result<()>;

    /// Requests a transport-level ping.
    ///
    /// The payload is best-effort: a binding may substitute a fixed marker,
    /// so it is not guaranteed to round-trip verbatim in the pong.
    ///
    /// # Errors
    ///
    /// Returns an error if the ping cannot be queued.
    fn send_ping(&self, payload: String) -> Result<()>;

    /// Requests connection shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown request cannot be issued.
    fn shutdown(&self) -> Result<()>;
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("is_connected", &self.is_connected())
            .finish()
    }
}

// ============================================================================
// TransportBuilder
// ============================================================================

/// Constructor producing a fresh transport per connect attempt.
pub type TransportBuilder = Arc<dyn Fn() -> Box<dyn Transport> + Send + Sync>;
