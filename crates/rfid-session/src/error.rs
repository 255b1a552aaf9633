//! Error types for transports and reader sessions

use std::io;
use std::time::Duration;

use rfid_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by a [`Transport`](crate::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be opened
    #[error("failed to open {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Opening the endpoint did not finish within the setup window
    #[error("timed out opening {endpoint} after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// Write attempted without an open connection
    #[error("not connected")]
    NotConnected,

    /// I/O error on an open connection
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by a [`ReaderSession`](crate::ReaderSession)
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No qualifying frame arrived before the deadline
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Another request is still awaiting its response
    #[error("a request is already pending")]
    RequestPending,

    /// The reader went away while a response was awaited
    #[error("connection lost{}", .0.as_ref().map(|r| format!(": {}", r)).unwrap_or_default())]
    ConnectionLost(Option<String>),

    /// The session has been closed
    #[error("session closed")]
    Closed,

    /// Command could not be built or the response could not be interpreted
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Whether the request simply went unanswered
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout(_))
    }
}
