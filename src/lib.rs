//! ws-link - Platform-agnostic client WebSocket connection core.
//!
//! This library provides one connection state machine and event contract
//! that any platform transport can back, presenting a uniform API to
//! application code.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐        commands         ┌─────────────────┐
//! │  Application    │────────────────────────►│   Connection    │
//! │                 │◄────────────────────────│ (state machine) │
//! │  subscribers    │         events          └────────┬────────┘
//! └─────────────────┘                                  │ Bridge
//!                                             ┌────────▼────────┐
//!                                             │    Transport    │
//!                                             │ (platform I/O)  │
//!                                             └─────────────────┘
//! ```
//!
//! The [`Connection`] owns at most one [`Transport`] at a time and mediates
//! every lifecycle transition: open/close sequencing, handshake headers,
//! ping/pong keep-alive, and safe teardown while transport events arrive
//! concurrently from an I/O context. Faults never propagate to the caller:
//! they surface exclusively through the `Error` event, so a connection
//! without an error subscriber silently swallows them.
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_link::{TungsteniteTransport, create_connection};
//!
//! #[tokio::main]
//! async fn main() -> ws_link::Result<()> {
//!     // Register the bundled transport once at startup.
//!     TungsteniteTransport::link();
//!
//!     let connection = create_connection()?;
//!     connection.on_opened(|| println!("open"));
//!     connection.on_message(|text| println!("got: {text}"));
//!     connection.on_error(|error| eprintln!("fault: {error}"));
//!
//!     connection.open("wss://echo.example/socket");
//!     // ... later:
//!     connection.send_text("hello");
//!     connection.dispose();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | Connection state machine and [`OpenOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Event kinds and [`Subscription`] handles |
//! | [`factory`] | Process-wide transport registration |
//! | [`headers`] | Handshake header collection |
//! | [`transport`] | Transport capability interface and bundled binding |
//!
//! # Behavior Notes
//!
//! - No reconnection policy: a failed connection stays down until the caller
//!   opens it again.
//! - Sends are fire-and-forget; with no transport attached they are silently
//!   dropped.
//! - Inbound text exactly equal to `"pong"` is routed to the `Pong` event,
//!   for bindings that simulate keep-alive over the message channel.

// ============================================================================
// Modules
// ============================================================================

/// Connection state machine.
///
/// The core type exposed to application code: [`Connection`], its
/// [`OpenOptions`], and the [`Bridge`](connection::Bridge) transports
/// deliver events through.
pub mod connection;

/// Error types and result aliases.
///
/// All faults surface as [`enum@Error`] values carried by `Error` events.
pub mod error;

/// Event dispatch: kinds, subscriptions, per-kind subscriber lists.
pub mod events;

/// Process-wide transport registration and connection creation.
pub mod factory;

/// Handshake header collection with case-insensitive names.
pub mod headers;

/// Transport capability interface and the bundled tokio binding.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{Connection, OpenOptions};

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{EventKind, Subscription};

// Factory functions
pub use factory::{create_connection, reset_transport_builder, set_transport_builder};

// Header types
pub use headers::Headers;

// Transport types
pub use transport::{ConnectRequest, Transport, TransportBuilder, TransportEvent, TungsteniteTransport};
