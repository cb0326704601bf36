//! Type-state SMTP client.
//!
//! Every transition consumes the client. On error the client is dropped,
//! which closes the socket, so no session outlives a failed step.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Upper bound on lines in one reply.
const MAX_REPLY_LINES: usize = 512;

/// Type-state marker for a greeted connection.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    helo: String,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the greeting is not a `220` reply.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::Protocol(format!(
                "Unexpected greeting {}: {}",
                greeting.code,
                greeting.message_text()
            )));
        }

        // Extract hostname from greeting (first word after code)
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(server = %hostname, "SMTP greeting received");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            helo: String::new(),
            _state: PhantomData,
        })
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.helo = client_hostname.to_string();
        self.refresh_extensions().await?;
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS, then repeats EHLO
    /// since capabilities may change once encrypted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the server does not answer `220` or the
    /// handshake fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            tracing::warn!(server = %self.server_info.hostname, "STARTTLS not advertised, trying anyway");
        }
        let reply = self.send_command(Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(Error::Tls(format!(
                "STARTTLS rejected {}: {}",
                reply.code,
                reply.message_text()
            )));
        }

        self.stream = self.stream.upgrade_to_tls(hostname).await?;
        tracing::debug!(%hostname, "STARTTLS upgrade complete");

        self.refresh_extensions().await?;
        Ok(self)
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// Sends `AUTH LOGIN`, then the base64 username and password in answer
    /// to `334` challenges. Any 2xx reply counts as success, including a
    /// server that accepts right after `AUTH LOGIN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthUnsupported`] if EHLO did not advertise AUTH, or
    /// [`Error::AuthFailed`] if the server rejects a step.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        if !self.server_info.supports_auth() {
            return Err(Error::AuthUnsupported);
        }
        let mechanisms = self.server_info.auth_mechanisms();
        if !mechanisms.contains(&AuthMechanism::Login) {
            tracing::debug!(?mechanisms, "AUTH LOGIN not advertised, trying anyway");
        }

        let steps = [
            Command::AuthResponse(STANDARD.encode(username.as_bytes())),
            Command::AuthResponse(STANDARD.encode(password.as_bytes())),
        ];
        let mut reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;

        for step in steps {
            if reply.is_success() {
                break;
            }
            if reply.code != ReplyCode::AUTH_CONTINUE {
                return Err(auth_failed(reply));
            }
            reply = self.send_command(step).await?;
        }

        if !reply.is_success() {
            return Err(auth_failed(reply));
        }
        tracing::debug!(%username, "SMTP authentication succeeded");

        Ok(self.transition())
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer `250`.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.start_transaction(from).await?;
        Ok(self.transition())
    }

    async fn refresh_extensions(&mut self) -> Result<()> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: self.helo.clone(),
            })
            .await?
            .expect_success()?;

        // Skip the first line, which is the server greeting
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        Ok(())
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer `250`.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.start_transaction(from).await?;
        Ok(self.transition())
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command is not accepted.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        self.send_command(Command::RcptTo { to })
            .await?
            .expect_success()?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command is not accepted.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.send_command(Command::RcptTo { to })
            .await?
            .expect_success()?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer `354`.
    pub async fn data(mut self) -> Result<Client<Data>> {
        self.send_command(Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails or the server does not answer `250`.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        let framed = frame_message(message);
        self.stream.write_all(&framed).await?;

        let reply = read_reply(&mut self.stream).await?;
        let reply = reply.expect_code(ReplyCode::OK)?;
        tracing::debug!(bytes = framed.len(), reply = %reply.message_text(), "message accepted");

        Ok(self.transition())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::trace!(command = %cmd.redacted(), "SMTP >>");
        self.stream.write_all(&cmd.serialize()).await?;
        let reply = read_reply(&mut self.stream).await?;
        tracing::trace!(code = reply.code.as_u16(), "SMTP <<");
        Ok(reply)
    }

    async fn start_transaction(&mut self, from: Address) -> Result<()> {
        let body = self
            .server_info
            .supports(&Extension::EightBitMime)
            .then(|| "8BITMIME".to_string());
        self.send_command(Command::MailFrom { from, body })
            .await?
            .expect_code(ReplyCode::OK)?;
        Ok(())
    }

    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            helo: self.helo,
            _state: PhantomData,
        }
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails. The socket is closed
    /// either way.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(Error::Protocol("Reply has too many lines".into()));
        }
    }

    parse_reply(&lines)
}

fn auth_failed(reply: Reply) -> Error {
    Error::AuthFailed {
        code: reply.code.as_u16(),
        message: reply.message_text(),
    }
}

/// Frames message content for the DATA phase.
pub(crate) fn frame_message(message: &[u8]) -> Vec<u8> {
    let body = message
        .strip_suffix(b"\r\n")
        .or_else(|| message.strip_suffix(b"\n"))
        .unwrap_or(message);

    let mut framed = Vec::with_capacity(body.len() + body.len() / 32 + 8);
    for line in body.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() == Some(&b'.') {
            framed.push(b'.');
        }
        framed.extend_from_slice(line);
        framed.extend_from_slice(b"\r\n");
    }
    framed.extend_from_slice(b".\r\n");
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_normalizes_line_endings() {
        assert_eq!(
            frame_message(b"Subject: x\n\nline one\r\nline two"),
            b"Subject: x\r\n\r\nline one\r\nline two\r\n.\r\n"
        );
    }

    #[test]
    fn test_frame_dot_stuffs() {
        assert_eq!(
            frame_message(b"a\r\n.\r\n..b\r\n"),
            b"a\r\n..\r\n...b\r\n.\r\n"
        );
    }

    #[test]
    fn test_frame_empty_message() {
        assert_eq!(frame_message(b""), b"\r\n.\r\n");
    }
}
