//! Process-wide connection factory.
//!
//! One writable slot holds the transport builder for the current platform.
//! Platform startup registers it once (for the bundled binding,
//! [`TungsteniteTransport::link`](crate::transport::TungsteniteTransport::link));
//! application code then creates connections through [`create_connection`]
//! without knowing which transport backs them.
//!
//! Registration is last-write-wins and never reset during normal operation;
//! tests reset it explicitly with [`reset_transport_builder`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportBuilder};

// ============================================================================
// Registry
// ============================================================================

/// The process-wide builder slot.
static BUILDER: RwLock<Option<TransportBuilder>> = RwLock::new(None);

/// Registers the transport builder backing new connections.
///
/// Last write wins. Typically called once at platform startup.
pub fn set_transport_builder(
    builder: impl Fn() -> Box<dyn Transport> + Send + Sync + 'static,
) {
    debug!("transport builder registered");
    *BUILDER.write() = Some(Arc::new(builder));
}

/// Clears the registered transport builder.
///
/// Intended for tests; production code registers once and never resets.
pub fn reset_transport_builder() {
    *BUILDER.write() = None;
}

/// Creates a fresh [`Connection`] backed by the registered builder.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if no builder was ever registered.
pub fn create_connection() -> Result<Connection> {
    let builder = BUILDER
        .read()
        .as_ref()
        .map(Arc::clone)
        .ok_or_else(|| Error::configuration("no transport builder registered"))?;

    Ok(Connection::from_builder(builder))
}

// ============================================================================
// Tests
// ============================================================================
