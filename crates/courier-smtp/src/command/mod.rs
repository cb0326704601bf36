//! SMTP command builder.

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (optional, for SASL-IR)
        initial_response: Option<String>,
    },
    /// Base64 answer to a `334` challenge
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
        /// BODY parameter (7BIT, 8BITMIME)
        body: Option<String>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_str().as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }
            Self::AuthResponse(response) => buf.extend_from_slice(response.as_bytes()),
            Self::MailFrom { from, body } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.push(b'>');
                if let Some(body_type) = body {
                    buf.extend_from_slice(b" BODY=");
                    buf.extend_from_slice(body_type.as_bytes());
                }
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::Data => buf.extend_from_slice(b"DATA"),
            Self::Quit => buf.extend_from_slice(b"QUIT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns the command as it may appear in logs, with AUTH payloads
    /// masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Auth { mechanism, .. } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse(_) => "<auth response>".to_string(),
            other => String::from_utf8_lossy(&other.serialize())
                .trim_end()
                .to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_serialize() {
        let cases = [
            (
                Command::Ehlo {
                    hostname: "client.example.com".into(),
                },
                "EHLO client.example.com\r\n",
            ),
            (Command::StartTls, "STARTTLS\r\n"),
            (
                Command::Auth {
                    mechanism: AuthMechanism::Login,
                    initial_response: None,
                },
                "AUTH LOGIN\r\n",
            ),
            (Command::AuthResponse("dXNlcg==".into()), "dXNlcg==\r\n"),
            (
                Command::MailFrom {
                    from: addr("sender@example.com"),
                    body: None,
                },
                "MAIL FROM:<sender@example.com>\r\n",
            ),
            (
                Command::MailFrom {
                    from: addr("sender@example.com"),
                    body: Some("8BITMIME".into()),
                },
                "MAIL FROM:<sender@example.com> BODY=8BITMIME\r\n",
            ),
            (
                Command::RcptTo {
                    to: addr("recipient@example.com"),
                },
                "RCPT TO:<recipient@example.com>\r\n",
            ),
            (Command::Data, "DATA\r\n"),
            (Command::Quit, "QUIT\r\n"),
        ];
        for (command, expected) in cases {
            assert_eq!(String::from_utf8(command.serialize()).unwrap(), expected);
        }
    }

    #[test]
    fn test_redacted_hides_credentials() {
        let auth = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".into()),
        };
        assert_eq!(auth.redacted(), "AUTH PLAIN");
        assert_eq!(Command::AuthResponse("c2VjcmV0".into()).redacted(), "<auth response>");
        assert_eq!(Command::Quit.redacted(), "QUIT");
    }
}
