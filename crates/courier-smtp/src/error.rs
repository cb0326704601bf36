//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A connect, read or write did not finish in time.
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// TCP connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// STARTTLS was refused or the TLS handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// The server did not advertise AUTH in its EHLO reply.
    #[error("Server does not support authentication")]
    AuthUnsupported,

    /// Credentials were rejected.
    #[error("Authentication failed {code}: {message}")]
    AuthFailed {
        /// Reply code (e.g., 535).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }
}
