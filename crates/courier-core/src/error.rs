//! Error types for the mail engine.
//!
//! Protocol crates report their own errors; the `From` conversions here fold
//! them into the taxonomy the facade reports to its caller.

use thiserror::Error;

/// Errors that can occur in mail operations.
#[derive(Debug, Error)]
pub enum MailError {
    /// Malformed input caught before any network I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// DNS failure, refused connection, timeout or a dropped socket.
    #[error("Connection error: {0}")]
    Connection(String),

    /// STARTTLS/STLS refused or TLS handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Credentials rejected or authentication not offered.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Unexpected status at a command step.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// One message could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Required settings are missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The local sendmail program failed.
    #[error("Local mail transport error: {0}")]
    LocalTransport(String),
}

/// Result type alias using [`MailError`].
pub type Result<T> = std::result::Result<T, MailError>;

impl From<courier_smtp::Error> for MailError {
    fn from(err: courier_smtp::Error) -> Self {
        use courier_smtp::Error as E;
        let text = err.to_string();
        match err {
            E::Io(_) | E::Timeout(_) | E::Connection(_) | E::ConnectionClosed => {
                Self::Connection(text)
            }
            E::Tls(_) => Self::Tls(text),
            E::AuthUnsupported | E::AuthFailed { .. } => Self::Auth(text),
            E::InvalidAddress(_) => Self::Validation(text),
            E::SmtpError { .. } | E::Protocol(_) => Self::Protocol(text),
        }
    }
}

impl From<courier_pop3::Error> for MailError {
    fn from(err: courier_pop3::Error) -> Self {
        use courier_pop3::Error as E;
        let text = err.to_string();
        match err {
            E::Io(_) | E::Timeout(_) | E::Connection(_) | E::ConnectionClosed => {
                Self::Connection(text)
            }
            E::Tls(_) => Self::Tls(text),
            E::Auth(_) => Self::Auth(text),
            E::ServerError(_) | E::Protocol(_) => Self::Protocol(text),
        }
    }
}

impl From<courier_mime::Error> for MailError {
    fn from(err: courier_mime::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_errors_map_to_taxonomy() {
        assert!(matches!(
            MailError::from(courier_smtp::Error::smtp_error(550, "no such user")),
            MailError::Protocol(_)
        ));
        assert!(matches!(
            MailError::from(courier_smtp::Error::AuthUnsupported),
            MailError::Auth(_)
        ));
        assert!(matches!(
            MailError::from(courier_smtp::Error::Timeout("read")),
            MailError::Connection(_)
        ));
        assert!(matches!(
            MailError::from(courier_smtp::Error::Tls("handshake".into())),
            MailError::Tls(_)
        ));
    }

    #[test]
    fn test_pop3_errors_map_to_taxonomy() {
        assert!(matches!(
            MailError::from(courier_pop3::Error::Auth("bad".into())),
            MailError::Auth(_)
        ));
        assert!(matches!(
            MailError::from(courier_pop3::Error::ServerError("busy".into())),
            MailError::Protocol(_)
        ));
        assert!(matches!(
            MailError::from(courier_pop3::Error::ConnectionClosed),
            MailError::Connection(_)
        ));
    }

    #[test]
    fn test_message_keeps_source_text() {
        let err = MailError::from(courier_smtp::Error::smtp_error(550, "no such user"));
        assert_eq!(err.to_string(), "Protocol error: SMTP error 550: no such user");
    }
}
