//! Error types for ws-link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Propagation Policy
//!
//! Public [`Connection`](crate::Connection) operations never return errors to
//! the caller. Every fault raised inside an operation is caught at that
//! operation's boundary and redirected to the connection's `Error` event.
//! A connection without an `Error` subscriber silently swallows faults.
//!
//! The types here are what those `Error` events carry, and what the factory
//! and transport layers return from their fallible entry points.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Handshake | [`Error::Connect`], [`Error::InvalidUrl`] |
//! | Runtime | [`Error::Transport`], [`Error::Send`], [`Error::Shutdown`] |
//! | Setup | [`Error::Configuration`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Fallback description when a transport reports a failure without one.
pub(crate) const GENERIC_TRANSPORT_FAILURE: &str = "unknown websocket error";

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// Connect attempt failed before the transport took over.
    ///
    /// Raised when URL or header construction throws, or the connect call
    /// itself fails synchronously.
    #[error("Connect failed: {message}")]
    Connect {
        /// Description of the connect failure.
        message: String,
    },

    /// The endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// The transport reported a failure.
    ///
    /// Carried by the `Error` event when the native failure callback fires.
    /// When the transport gives no description, the message is a generic
    /// fallback string.
    #[error("Transport failure: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// A text, binary, or ping submission failed.
    #[error("Send failed: {message}")]
    Send {
        /// Description of the send failure.
        message: String,
    },

    /// The close or dispose path failed.
    #[error("Shutdown failed: {message}")]
    Shutdown {
        /// Description of the shutdown failure.
        message: String,
    },

    // ========================================================================
    // Setup Errors
    // ========================================================================
    /// No transport builder has been registered.
    ///
    /// Returned by [`create_connection`](crate::create_connection) when the
    /// process-wide registry was never initialized.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connect error.
    #[inline]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a transport failure error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a transport failure error from an optional description.
    ///
    /// Falls back to a generic description when the transport gave none.
    #[inline]
    pub fn transport_or_generic(message: Option<String>) -> Self {
        Self::Transport {
            message: message.unwrap_or_else(|| GENERIC_TRANSPORT_FAILURE.to_owned()),
        }
    }

    /// Creates a send error.
    #[inline]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    /// Creates a shutdown error.
    #[inline]
    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns `true` if this is a connection-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Transport { .. } | Self::InvalidUrl(_)
        )
    }

    /// Returns `true` if this is a send error.
    #[inline]
    #[must_use]
    pub fn is_send_error(&self) -> bool {
        matches!(self, Self::Send { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connect("refused");
        assert_eq!(err.to_string(), "Connect failed: refused");
    }

    #[test]
    fn test_transport_fallback_description() {
        let err = Error::transport_or_generic(None);
        assert_eq!(
            err.to_string(),
            format!("Transport failure: {GENERIC_TRANSPORT_FAILURE}")
        );

        let err = Error::transport_or_generic(Some("reset by peer".into()));
        assert_eq!(err.to_string(), "Transport failure: reset by peer");
    }

    #[test]
    fn test_is_configuration() {
        assert!(Error::configuration("no builder").is_configuration());
        assert!(!Error::send("nope").is_configuration());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connect("refused").is_connection_error());
        assert!(Error::transport("reset").is_connection_error());
        assert!(!Error::shutdown("late").is_connection_error());
    }

    #[test]
    fn test_from_url_error() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
