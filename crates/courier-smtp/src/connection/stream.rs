//! Low-level SMTP stream handling.
//!
//! Every connect, read and write is bounded by the stream's timeout. The
//! socket is closed when the stream is dropped.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// Longest reply line accepted before the server is considered broken.
const MAX_LINE_LENGTH: usize = 8192;

#[derive(Debug)]
enum Transport {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

/// SMTP stream (TCP or TLS) with a per-operation timeout.
#[derive(Debug)]
pub struct SmtpStream {
    transport: Transport,
    timeout: Duration,
}

impl SmtpStream {
    /// Reads a line from the stream, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on EOF, [`Error::Timeout`] if no
    /// line arrives in time, [`Error::Protocol`] once a line passes
    /// `MAX_LINE_LENGTH` bytes, or an I/O error.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let limit = MAX_LINE_LENGTH as u64 + 1;
        let read = match &mut self.transport {
            Transport::Tcp(reader) => {
                let bounded = (&mut *reader).take(limit);
                with_timeout(self.timeout, "read", read_bounded(bounded, &mut line)).await?
            }
            Transport::Tls(reader) => {
                let bounded = (&mut **reader).take(limit);
                with_timeout(self.timeout, "read", read_bounded(bounded, &mut line)).await?
            }
        };
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol(format!(
                "Reply line exceeds {MAX_LINE_LENGTH} bytes"
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        match &mut self.transport {
            Transport::Tcp(reader) => {
                let stream = reader.get_mut();
                with_timeout(timeout, "write", async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await
            }
            Transport::Tls(reader) => {
                let stream = reader.get_mut();
                with_timeout(timeout, "write", async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await
            }
        }
    }

    /// Upgrades a TCP stream to TLS in place (after `STARTTLS`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the stream is already encrypted or the
    /// handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self.transport {
            Transport::Tcp(reader) => reader.into_inner(),
            Transport::Tls(_) => return Err(Error::Tls("Already using TLS".into())),
        };

        let transport = handshake(hostname, tcp_stream, self.timeout).await?;
        Ok(Self {
            transport,
            timeout: self.timeout,
        })
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the host cannot be reached, or
/// [`Error::Timeout`] if the connect does not finish within `timeout`.
pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
    let stream = open_tcp(hostname, port, timeout).await?;
    Ok(SmtpStream {
        transport: Transport::Tcp(BufReader::new(stream)),
        timeout,
    })
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
    let tcp_stream = open_tcp(hostname, port, timeout).await?;
    let transport = handshake(hostname, tcp_stream, timeout).await?;
    Ok(SmtpStream { transport, timeout })
}

async fn open_tcp(hostname: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{hostname}:{port}");
    tracing::debug!(%addr, "connecting to SMTP server");
    with_timeout(timeout, "connect", TcpStream::connect(&addr))
        .await
        .map_err(|e| match e {
            Error::Io(io) => Error::Connection(format!("{addr}: {io}")),
            other => other,
        })
}

async fn handshake(hostname: &str, tcp_stream: TcpStream, timeout: Duration) -> Result<Transport> {
    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Tls(format!("Invalid hostname: {hostname}")))?;

    let tls_stream = with_timeout(timeout, "TLS handshake", connector.connect(server_name, tcp_stream))
        .await
        .map_err(|e| match e {
            Error::Io(io) => Error::Tls(io.to_string()),
            other => other,
        })?;
    Ok(Transport::Tls(Box::new(BufReader::new(tls_stream))))
}

async fn read_bounded<R>(mut reader: R, line: &mut String) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    reader.read_line(line).await
}

async fn with_timeout<T>(
    timeout: Duration,
    operation: &'static str,
    future: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::Timeout(operation)),
    }
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
