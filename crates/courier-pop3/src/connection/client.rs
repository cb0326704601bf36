//! Type-state POP3 client.
//!
//! The POP3 states are:
//!
//! - `Authorization`: after the greeting, until USER/PASS succeed
//! - `Transaction`: mailbox access (STAT, LIST, RETR)
//!
//! `quit` consumes the client in either state. Dropping a client closes the
//! socket without QUIT, so the server does not delete anything.

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use super::framed::FramedStream;
use super::stream::Pop3Stream;
use crate::command::Command;
use crate::parser::{Status, parse_list, parse_stat};
use crate::types::{MailboxStat, MessageHandle};
use crate::{Error, Result};

/// Marker type for the authorization state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorization;

/// Marker type for the transaction state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transaction;

/// POP3 client connection with type-state.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: FramedStream<S>,
    greeting: String,
    _state: PhantomData<State>,
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream and reads the greeting.
    ///
    /// Any greeting line is accepted; servers that open with something
    /// other than `+OK` are logged and given the benefit of the doubt.
    ///
    /// # Errors
    ///
    /// Returns an error if no greeting line arrives.
    pub async fn from_stream(stream: S, timeout: Duration) -> Result<Self> {
        let mut framed = FramedStream::new(stream, timeout);
        let greeting = framed.read_status_line().await?;
        match Status::parse(&greeting) {
            Ok(Status::Ok(_)) => tracing::debug!(%greeting, "POP3 greeting received"),
            _ => tracing::warn!(%greeting, "unusual POP3 greeting"),
        }

        Ok(Self {
            stream: framed,
            greeting,
            _state: PhantomData,
        })
    }

    /// Authenticates with USER and PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if either step is not answered with `+OK`.
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Transaction>> {
        for command in [
            Command::User(username.to_string()),
            Command::Pass(password.to_string()),
        ] {
            match self.command(&command).await? {
                Status::Ok(_) => {}
                Status::Err(text) => return Err(Error::Auth(text)),
            }
        }
        tracing::debug!(%username, "POP3 login succeeded");

        Ok(Client {
            stream: self.stream,
            greeting: self.greeting,
            _state: PhantomData,
        })
    }
}

impl Client<Pop3Stream, Authorization> {
    /// Upgrades the connection with STLS (RFC 2595).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the server refuses or the handshake fails.
    pub async fn stls(mut self, host: &str) -> Result<Self> {
        if let Status::Err(text) = self.command(&Command::Stls).await? {
            return Err(Error::Tls(format!("STLS rejected: {text}")));
        }

        let timeout = self.stream.timeout();
        let stream = self.stream.into_inner().upgrade_to_tls(host, timeout).await?;
        tracing::debug!(%host, "STLS upgrade complete");

        Ok(Self {
            stream: FramedStream::new(stream, timeout),
            greeting: self.greeting,
            _state: PhantomData,
        })
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and total size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerError`] on `-ERR` or [`Error::Protocol`] if the
    /// reply is malformed.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        let text = self.command(&Command::Stat).await?.into_result()?;
        parse_stat(&text)
    }

    /// Lists every message with its sequence number and size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerError`] on `-ERR` or [`Error::Protocol`] if a
    /// scan line is malformed.
    pub async fn list(&mut self) -> Result<Vec<MessageHandle>> {
        self.command(&Command::List).await?.into_result()?;
        let lines = self.stream.read_multiline().await?;
        parse_list(&lines)
    }

    /// Retrieves one message as raw bytes with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerError`] if the server answers `-ERR`; the
    /// session stays usable in that case.
    pub async fn retr(&mut self, seq: u32) -> Result<Vec<u8>> {
        self.command(&Command::Retr(seq)).await?.into_result()?;
        let lines = self.stream.read_multiline().await?;
        Ok(lines.join(&b"\r\n"[..]))
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server greeting line.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Sends QUIT and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT is not answered with `+OK`. The socket is
    /// closed either way.
    pub async fn quit(mut self) -> Result<()> {
        self.command(&Command::Quit).await?.into_result()?;
        Ok(())
    }

    async fn command(&mut self, command: &Command) -> Result<Status> {
        tracing::trace!(command = %command.redacted(), "POP3 >>");
        self.stream.write_command(&command.serialize()).await?;
        let line = self.stream.read_status_line().await?;
        Status::parse(&line)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_login_and_stat() {
        let mock = Builder::new()
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS s3cret\r\n")
            .read(b"+OK maildrop locked\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK 2 320\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        assert_eq!(client.greeting(), "+OK POP3 ready");
        let mut client = client.login("alice", "s3cret").await.unwrap();
        let stat = client.stat().await.unwrap();
        assert_eq!(stat.count, 2);
        assert_eq!(stat.size, 320);
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_password() {
        let mock = Builder::new()
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS wrong\r\n")
            .read(b"-ERR invalid password\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        let err = client.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Auth(text) if text == "invalid password"));
    }

    #[tokio::test]
    async fn test_unknown_user_stops_before_pass() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER nobody\r\n")
            .read(b"-ERR no such mailbox\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        assert!(matches!(
            client.login("nobody", "x").await,
            Err(Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_retr() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER u\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS p\r\n")
            .read(b"+OK\r\n")
            .write(b"LIST\r\n")
            .read(b"+OK 2 messages\r\n1 120\r\n2 200\r\n.\r\n")
            .write(b"RETR 2\r\n")
            .read(b"+OK 200 octets\r\nSubject: hi\r\n\r\n..dot line\r\nbody\r\n.\r\n")
            .write(b"RETR 9\r\n")
            .read(b"-ERR no such message\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        let mut client = client.login("u", "p").await.unwrap();

        let handles = client.list().await.unwrap();
        assert_eq!(
            handles,
            vec![
                MessageHandle { seq: 1, size: 120 },
                MessageHandle { seq: 2, size: 200 }
            ]
        );

        let raw = client.retr(2).await.unwrap();
        assert_eq!(raw, b"Subject: hi\r\n\r\n.dot line\r\nbody");

        assert!(matches!(client.retr(9).await, Err(Error::ServerError(_))));
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_refused() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER u\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS p\r\n")
            .read(b"+OK\r\n")
            .write(b"LIST\r\n")
            .read(b"-ERR mailbox busy\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        let mut client = client.login("u", "p").await.unwrap();
        assert!(matches!(client.list().await, Err(Error::ServerError(_))));
    }

    #[tokio::test]
    async fn test_greeting_is_not_checked_strictly() {
        let mock = Builder::new().read(b"hello there\r\n").build();
        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        assert_eq!(client.greeting(), "hello there");
    }

    #[tokio::test]
    async fn test_no_greeting() {
        let mock = Builder::new().build();
        assert!(matches!(
            Client::from_stream(mock, TIMEOUT).await,
            Err(Error::ConnectionClosed)
        ));
    }
}
