//! Error types for the WebSocket client.
//!
//! Errors discovered on the worker thread are stored on the handle and
//! surfaced through the `on_disconnected` callback; errors discovered
//! synchronously in the host API are returned immediately and also stored.
//! Only the most recent error is retained.

use thiserror::Error;

/// Result type alias for WebSocket client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification, stable across releases.
///
/// Every [`Error`] maps to exactly one kind; hosts that only care about
/// the category can match on this instead of the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Pre-connect validation failed (missing scheme/host/port/path/callback).
    MissedParameter,
    /// DNS resolution or TCP connect failed.
    Connect,
    /// A `wss://` endpoint was requested. Reserved for a future TLS transport.
    TlsNotSupported,
    /// Socket read or write failed while the connection was up.
    ReadWriteSocket,
    /// The HTTP upgrade response was malformed or rejected the upgrade.
    ParseHandshake,
    /// The peer violated the RFC 6455 framing rules.
    ProtocolError,
}

/// Errors that can occur during connection setup or operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A required connection parameter was not provided before `connect`.
    #[error("missing connection parameter: {0}")]
    MissedParameter(&'static str),

    /// DNS resolution or the TCP connect itself failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// TLS endpoints are not supported by this build.
    #[error("wss endpoints are not supported")]
    TlsNotSupported,

    /// Socket I/O failed while the connection was open or closing.
    #[error("socket I/O failed: {0}")]
    ReadWriteSocket(String),

    /// The server's handshake response was invalid or refused the upgrade.
    #[error("handshake failed: {reason}")]
    ParseHandshake {
        /// HTTP status from the response line, when one could be parsed.
        http_status: Option<u16>,
        /// Human-readable description of what was wrong.
        reason: String,
    },

    /// The peer sent a frame that violates RFC 6455.
    #[error("protocol violation: {0}")]
    ProtocolError(String),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::MissedParameter(_) => ErrorKind::MissedParameter,
            Error::Connect(_) => ErrorKind::Connect,
            Error::TlsNotSupported => ErrorKind::TlsNotSupported,
            Error::ReadWriteSocket(_) => ErrorKind::ReadWriteSocket,
            Error::ParseHandshake { .. } => ErrorKind::ParseHandshake,
            Error::ProtocolError(_) => ErrorKind::ProtocolError,
        }
    }

    /// HTTP status attached to a handshake failure, if one was parsed.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Error::ParseHandshake { http_status, .. } => *http_status,
            _ => None,
        }
    }

    /// Build a handshake error without an HTTP status.
    pub(crate) fn handshake(reason: impl Into<String>) -> Self {
        Error::ParseHandshake {
            http_status: None,
            reason: reason.into(),
        }
    }

    /// Build a handshake error carrying the HTTP status from the response line.
    pub(crate) fn handshake_status(status: u16, reason: impl Into<String>) -> Self {
        Error::ParseHandshake {
            http_status: Some(status),
            reason: reason.into(),
        }
    }

    /// Build a protocol violation error.
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Error::ProtocolError(reason.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ReadWriteSocket(err.to_string())
    }
}
