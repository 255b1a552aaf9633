//! Error types for reader detection

use rfid_session::TransportError;
use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Failed to open serial port
    #[error("failed to open port {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Transport failure after the port was opened
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}
