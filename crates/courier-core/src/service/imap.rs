//! IMAP connection probe.
//!
//! Only enough of IMAP4rev1 to check a server and credentials: greeting,
//! optional STARTTLS, LOGIN and LOGOUT. Mailbox access is not supported.

use std::future::Future;
use std::io;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::settings::{ConnectionConfig, Encryption, Service};
use crate::{MailError, Result};

/// Maximum number of untagged lines read while waiting for a tagged reply.
const MAX_RESPONSE_LINES: usize = 256;

/// Connects, checks the greeting, logs in and logs out.
///
/// Returns the server greeting text for display.
///
/// # Errors
///
/// Returns [`MailError::Connection`] or [`MailError::Tls`] if the server is
/// unreachable, [`MailError::Protocol`] for an unexpected greeting, and
/// [`MailError::Auth`] if LOGIN is rejected.
pub async fn test_connection(config: &ConnectionConfig) -> Result<String> {
    let tcp = open_tcp(config).await?;

    if config.implicit_tls(Service::Imap) {
        let tls = handshake(&config.host, tcp, config.timeout).await?;
        let mut session = Probe::new(tls, config.timeout);
        let greeting = session.greeting().await?;
        session.login_logout(config).await?;
        return Ok(greeting);
    }

    let mut session = Probe::new(tcp, config.timeout);
    let greeting = session.greeting().await?;
    if config.encryption == Encryption::Tls {
        session
            .tagged("a0", "STARTTLS")
            .await
            .map_err(|e| MailError::Tls(format!("STARTTLS rejected: {e}")))?;
        let tls = handshake(&config.host, session.into_inner(), config.timeout).await?;
        let mut session = Probe::new(tls, config.timeout);
        session.login_logout(config).await?;
    } else {
        session.login_logout(config).await?;
    }
    Ok(greeting)
}

struct Probe<S> {
    reader: BufReader<S>,
    timeout: Duration,
}

impl<S> Probe<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(stream: S, timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            timeout,
        }
    }

    fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    async fn greeting(&mut self) -> Result<String> {
        let line = self.read_line().await?;
        if line.starts_with("* OK") || line.starts_with("* PREAUTH") {
            tracing::debug!(greeting = %line, "IMAP greeting received");
            Ok(line)
        } else {
            Err(MailError::Protocol(format!("Unexpected IMAP greeting: {line}")))
        }
    }

    async fn login_logout(&mut self, config: &ConnectionConfig) -> Result<()> {
        let login = format!(
            "LOGIN {} {}",
            quote(&config.username),
            quote(&config.password)
        );
        tracing::trace!(command = "a1 LOGIN", username = %config.username, "IMAP >>");
        match self.tagged("a1", &login).await {
            Ok(()) => {}
            Err(MailError::Protocol(text)) => return Err(MailError::Auth(text)),
            Err(e) => return Err(e),
        }
        tracing::debug!(username = %config.username, "IMAP login succeeded");

        if let Err(e) = self.tagged("a2", "LOGOUT").await {
            tracing::debug!(error = %e, "IMAP LOGOUT failed");
        }
        Ok(())
    }

    /// Sends a tagged command and waits for its tagged completion, skipping
    /// untagged data. `NO` and `BAD` become [`MailError::Protocol`].
    async fn tagged(&mut self, tag: &str, command: &str) -> Result<()> {
        let line = format!("{tag} {command}\r\n");
        let stream = self.reader.get_mut();
        timed(self.timeout, "write", async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await
        })
        .await?;

        for _ in 0..MAX_RESPONSE_LINES {
            let reply = self.read_line().await?;
            let Some(status) = reply
                .strip_prefix(tag)
                .and_then(|rest| rest.strip_prefix(' '))
            else {
                continue;
            };
            return if status.get(..2).is_some_and(|s| s.eq_ignore_ascii_case("OK")) {
                Ok(())
            } else {
                Err(MailError::Protocol(status.to_string()))
            };
        }
        Err(MailError::Protocol(format!("No tagged reply to {tag}")))
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = timed(self.timeout, "read", self.reader.read_line(&mut line)).await?;
        if read == 0 {
            return Err(MailError::Connection("Connection closed by server".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Encodes an IMAP quoted string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

async fn timed<T>(
    timeout: Duration,
    what: &str,
    future: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(MailError::Connection(format!("{what}: {e}"))),
        Err(_) => Err(MailError::Connection(format!("Timed out during {what}"))),
    }
}

async fn open_tcp(config: &ConnectionConfig) -> Result<TcpStream> {
    let addr = format!("{}:{}", config.host, config.port);
    tracing::debug!(%addr, "opening IMAP probe");
    timed(
        config.timeout,
        &format!("connect to {addr}"),
        TcpStream::connect(&addr),
    )
    .await
}

async fn handshake(host: &str, tcp: TcpStream, timeout: Duration) -> Result<TlsStream<TcpStream>> {
    let connector = courier_pop3::create_tls_connector();
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| MailError::Tls(format!("Invalid DNS name {host}: {e}")))?;
    match tokio::time::timeout(timeout, connector.connect(server_name, tcp)).await {
        Ok(Ok(tls)) => Ok(tls),
        Ok(Err(e)) => Err(MailError::Tls(e.to_string())),
        Err(_) => Err(MailError::Connection("Timed out during TLS handshake".to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(Service::Imap, "imap.example.com", Encryption::None)
            .with_credentials("user", "pa\"ss")
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[tokio::test]
    async fn test_login_logout() {
        let mock = Builder::new()
            .read(b"* OK IMAP4rev1 ready\r\n")
            .write(b"a1 LOGIN \"user\" \"pa\\\"ss\"\r\n")
            .read(b"* CAPABILITY IMAP4rev1\r\na1 OK LOGIN completed\r\n")
            .write(b"a2 LOGOUT\r\n")
            .read(b"* BYE\r\na2 OK LOGOUT completed\r\n")
            .build();

        let mut probe = Probe::new(mock, TIMEOUT);
        assert_eq!(probe.greeting().await.unwrap(), "* OK IMAP4rev1 ready");
        probe.login_logout(&config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"a1 LOGIN \"user\" \"pa\\\"ss\"\r\n")
            .read(b"a1 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();

        let mut probe = Probe::new(mock, TIMEOUT);
        probe.greeting().await.unwrap();
        let err = probe.login_logout(&config()).await.unwrap_err();
        assert!(matches!(err, MailError::Auth(text) if text.starts_with("NO")));
    }

    #[tokio::test]
    async fn test_handshake_rejects_invalid_host_name() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tcp = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let err = handshake("not a host", tcp, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, MailError::Tls(text) if text.contains("not a host")));
    }

    #[tokio::test]
    async fn test_bad_greeting() {
        let mock = Builder::new().read(b"220 smtp.example.com ESMTP\r\n").build();
        let mut probe = Probe::new(mock, TIMEOUT);
        assert!(matches!(probe.greeting().await, Err(MailError::Protocol(_))));
    }
}
