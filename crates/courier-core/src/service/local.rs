//! Local mail delivery through a sendmail-compatible program.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{MailError, Result};

/// Default sendmail program, resolved through `PATH`.
pub const DEFAULT_SENDMAIL: &str = "sendmail";

/// Bound on the whole hand-off to the local program.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pipes a rendered message into `<program> -t -i`.
///
/// `-t` takes recipients from the message headers and `-i` keeps a lone `.`
/// line from ending the input early.
///
/// # Errors
///
/// Returns [`MailError::LocalTransport`] if the program cannot be started,
/// times out or exits unsuccessfully.
pub async fn send(program: &str, message: &[u8]) -> Result<()> {
    tracing::debug!(%program, "handing message to local mailer");
    let mut child = Command::new(program)
        .args(["-t", "-i"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MailError::LocalTransport(format!("{program}: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(message).await {
            Ok(()) => {}
            // The exit status below reports why the program stopped reading.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!(%program, "local mailer closed its input early");
            }
            Err(e) => return Err(MailError::LocalTransport(format!("{program}: {e}"))),
        }
    }

    let output = tokio::time::timeout(DEFAULT_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| MailError::LocalTransport(format!("{program}: timed out")))?
        .map_err(|e| MailError::LocalTransport(format!("{program}: {e}")))?;

    if output.status.success() {
        tracing::info!(%program, "message handed to local mailer");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(MailError::LocalTransport(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_exit() {
        send("true", b"To: a@example.com\r\n\r\nhi").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_exit() {
        let err = send("false", b"To: a@example.com\r\n\r\nhi")
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::LocalTransport(_)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = send("/nonexistent/courier-sendmail", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::LocalTransport(text) if text.contains("courier-sendmail")));
    }
}
