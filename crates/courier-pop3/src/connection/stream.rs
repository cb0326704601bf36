//! Stream types for POP3 connections.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum Pop3Stream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl Pop3Stream {
    /// Upgrades a plaintext stream to TLS (after `STLS`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the stream is already encrypted or the
    /// handshake fails.
    pub async fn upgrade_to_tls(self, host: &str, timeout: Duration) -> Result<Self> {
        match self {
            Self::Plain(tcp) => handshake(host, tcp, timeout).await,
            Self::Tls(_) => Err(Error::Tls("Stream is already TLS".to_string())),
        }
    }
}

impl AsyncRead for Pop3Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Pop3Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Connects to a server with TLS from the start (port 995).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or times out.
pub async fn connect_tls(host: &str, port: u16, timeout: Duration) -> Result<Pop3Stream> {
    let tcp = open_tcp(host, port, timeout).await?;
    handshake(host, tcp, timeout).await
}

/// Connects to a server without TLS (for STLS or testing).
///
/// # Errors
///
/// Returns an error if the connection fails or times out.
pub async fn connect_plain(host: &str, port: u16, timeout: Duration) -> Result<Pop3Stream> {
    Ok(Pop3Stream::Plain(open_tcp(host, port, timeout).await?))
}

async fn open_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    tracing::debug!(%addr, "connecting to POP3 server");
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(tcp)) => Ok(tcp),
        Ok(Err(e)) => Err(Error::Connection(format!("{addr}: {e}"))),
        Err(_) => Err(Error::Timeout("connect")),
    }
}

async fn handshake(host: &str, tcp: TcpStream, timeout: Duration) -> Result<Pop3Stream> {
    let connector = create_tls_connector();
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Tls(format!("Invalid DNS name {host}: {e}")))?;
    match tokio::time::timeout(timeout, connector.connect(server_name, tcp)).await {
        Ok(Ok(tls)) => Ok(Pop3Stream::Tls(Box::new(tls))),
        Ok(Err(e)) => Err(Error::Tls(e.to_string())),
        Err(_) => Err(Error::Timeout("TLS handshake")),
    }
}
