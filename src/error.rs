//! Error types for the coordinator client

use std::sync::Arc;

use thiserror::Error;

/// Main error type for the coordinator client
///
/// The type is `Clone` so that every caller sharing a single-flight connect
/// attempt observes the very same failure. Foreign error sources are held
/// behind an `Arc` for that reason.
#[derive(Error, Debug, Clone)]
pub enum CoordError {
    /// A request was issued before the transport finished its handshake
    #[error("Transport not started")]
    TransportNotStarted,

    /// The server process failed or exited before `initialize` completed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The remote side answered with an error (message passed through verbatim)
    #[error("{0}")]
    Remote(String),

    /// A tool call returned `isError: true`
    #[error("Tool error: {0}")]
    Tool(String),

    /// The request was settled because the transport was torn down
    #[error("Client stopped")]
    ClientStopped,

    /// An inbound line could not be decoded
    #[error("Parse error: {message}")]
    Parse {
        /// Decoder message
        message: String,
        /// Offending line (possibly truncated)
        line: Option<String>,
    },

    /// The operation needs a live connection
    #[error("Not connected")]
    NotConnected,

    /// The server executable could not be located
    #[error("Coordination server not found: {0}")]
    ServerNotFound(String),

    /// Spawning the server process failed
    #[error("Failed to start coordination server: {0}")]
    Spawn(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    /// JSON encode/decode error outside of line framing
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The peer sent something that violates the expected message shape
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for coordinator client operations
pub type Result<T> = std::result::Result<T, CoordError>;

impl From<std::io::Error> for CoordError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for CoordError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

/// Longest line excerpt kept inside a [`CoordError::Parse`]
const PARSE_EXCERPT_LEN: usize = 256;

impl CoordError {
    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Create a remote error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a parse error, keeping a bounded excerpt of the line
    pub fn parse(msg: impl Into<String>, line: Option<&str>) -> Self {
        let line = line.map(|l| {
            if l.len() <= PARSE_EXCERPT_LEN {
                l.to_string()
            } else {
                let mut cut = PARSE_EXCERPT_LEN;
                while !l.is_char_boundary(cut) {
                    cut -= 1;
                }
                format!("{}...", &l[..cut])
            }
        });
        Self::Parse {
            message: msg.into(),
            line,
        }
    }

    /// Create a server-not-found error
    pub fn server_not_found(what: impl Into<String>) -> Self {
        Self::ServerNotFound(what.into())
    }

    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether this error came from the remote operation surface
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Tool(_))
    }
}
