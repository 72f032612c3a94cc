//! Control connection error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the engine.
#[derive(Debug, Error)]
pub enum LiquidsoapError {
    /// The control connection could not be opened.
    #[error("failed to connect to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Opening the control connection took too long.
    #[error("timed out connecting to {endpoint} after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// I/O failure on an established connection.
    #[error("control connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine closed the stream before the reply terminator arrived.
    #[error("control connection closed after {received} bytes without a reply terminator")]
    UnexpectedEof { received: usize },

    /// No complete reply within the per-command bound.
    #[error("command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// Command/reply pairing is broken; the connection cannot be reused.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An earlier failure left the connection unusable.
    #[error("control connection unusable after earlier failure: {0}")]
    Poisoned(String),

    /// The connection was closed locally (quit or teardown).
    #[error("control connection is closed")]
    Closed,
}

impl LiquidsoapError {
    /// Whether the error leaves the byte stream in an unknown state.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::UnexpectedEof { .. } | Self::Timeout { .. } | Self::Protocol(_)
        )
    }

    /// Whether replies were paired with the wrong commands. Requires a restart.
    pub fn is_desync(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}
