//! Framed I/O for the POP3 protocol.
//!
//! POP3 uses CRLF-terminated lines. Multi-line bodies end with a line
//! holding a single `.` and have leading dots doubled ("byte-stuffed").

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum multi-line body size to prevent memory exhaustion.
const MAX_BODY_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Line-oriented POP3 stream with a per-operation timeout.
#[derive(Debug)]
pub struct FramedStream<S> {
    reader: BufReader<S>,
    timeout: Duration,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            timeout,
        }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    /// Returns the per-operation timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads one line without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on EOF, [`Error::Timeout`] if no
    /// line arrives in time.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let read = match tokio::time::timeout(
            self.timeout,
            (&mut self.reader)
                .take(MAX_LINE_LENGTH as u64 + 1)
                .read_until(b'\n', &mut line),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(Error::Timeout("read")),
        };

        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol("line too long".to_string()));
        }

        if line.ends_with(b"\n") {
            line.pop();
        }
        if line.ends_with(b"\r") {
            line.pop();
        }
        Ok(line)
    }

    /// Reads a status line as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn read_status_line(&mut self) -> Result<String> {
        let line = self.read_line().await?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Reads a dot-terminated body, un-stuffing leading dots.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails before the terminating `.`
    /// or the body exceeds the size limit.
    pub async fn read_multiline(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        let mut total = 0usize;
        loop {
            let line = self.read_line().await?;
            if line == b"." {
                break;
            }
            total += line.len() + 2;
            if total > MAX_BODY_SIZE {
                return Err(Error::Protocol(format!(
                    "response body exceeds {MAX_BODY_SIZE} bytes"
                )));
            }
            let line = match line.strip_prefix(b".") {
                Some(unstuffed) => unstuffed.to_vec(),
                None => line,
            };
            lines.push(line);
        }
        Ok(lines)
    }

    /// Writes a command and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        match tokio::time::timeout(self.timeout, write).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout("write")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let mock = Builder::new().read(b"+OK hello\r\n+OK bare lf\n").build();
        let mut framed = FramedStream::new(mock, TIMEOUT);
        assert_eq!(framed.read_line().await.unwrap(), b"+OK hello");
        assert_eq!(framed.read_line().await.unwrap(), b"+OK bare lf");
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock, TIMEOUT);
        assert!(matches!(
            framed.read_line().await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_multiline_unstuffs() {
        let mock = Builder::new()
            .read(b"Subject: x\r\n\r\n..leading dot\r\n...\r\nend\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock, TIMEOUT);
        let lines = framed.read_multiline().await.unwrap();
        assert_eq!(
            lines,
            vec![
                b"Subject: x".to_vec(),
                b"".to_vec(),
                b".leading dot".to_vec(),
                b"..".to_vec(),
                b"end".to_vec()
            ]
        );
    }

    #[tokio::test]
    async fn test_read_multiline_split_reads() {
        let mock = Builder::new()
            .read(b"line o")
            .read(b"ne\r\nline two\r")
            .read(b"\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock, TIMEOUT);
        let lines = framed.read_multiline().await.unwrap();
        assert_eq!(lines, vec![b"line one".to_vec(), b"line two".to_vec()]);
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"STAT\r\n").build();
        let mut framed = FramedStream::new(mock, TIMEOUT);
        framed.write_command(b"STAT\r\n").await.unwrap();
    }
}
