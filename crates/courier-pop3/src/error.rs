//! Error types for the POP3 library.

use thiserror::Error;

/// Errors that can occur during POP3 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connect, read or write did not finish in time.
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// TCP connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// STLS was refused or the TLS handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// USER or PASS was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server answered `-ERR`.
    #[error("Server returned -ERR: {0}")]
    ServerError(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
