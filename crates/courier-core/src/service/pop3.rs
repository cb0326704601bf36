//! POP3 retrieval.

use courier_mime::Message;
use courier_pop3::{Client, MailboxStat, Pop3Stream, Transaction, connect_plain, connect_tls};

use crate::Result;
use crate::settings::{ConnectionConfig, Encryption, Service};

/// Fetches and parses the `limit` most recent messages, newest first.
///
/// A message the server refuses to return or that cannot be parsed is
/// logged and skipped. Messages are left on the server.
///
/// # Errors
///
/// Returns an error if connecting, logging in or listing fails; the batch
/// is abandoned in that case.
pub async fn fetch_recent(config: &ConnectionConfig, limit: usize) -> Result<Vec<Message>> {
    let mut client = open(config).await?;
    let handles = client.list().await?;
    let selected = courier_pop3::select_recent(&handles, limit);
    tracing::debug!(
        available = handles.len(),
        selected = selected.len(),
        "POP3 messages listed"
    );

    let mut messages = Vec::with_capacity(selected.len());
    for handle in selected {
        let raw = match client.retr(handle.seq).await {
            Ok(raw) => raw,
            Err(courier_pop3::Error::ServerError(text)) => {
                tracing::warn!(seq = handle.seq, %text, "RETR refused, skipping message");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match courier_mime::parser::parse(&raw) {
            Ok(message) => messages.push(message),
            Err(e) => tracing::warn!(seq = handle.seq, error = %e, "skipping unparsable message"),
        }
    }

    if let Err(e) = client.quit().await {
        tracing::debug!(error = %e, "POP3 QUIT failed");
    }
    Ok(messages)
}

/// Logs in and reads the maildrop summary.
///
/// # Errors
///
/// Returns an error if connecting, logging in or STAT fails.
pub async fn test_connection(config: &ConnectionConfig) -> Result<MailboxStat> {
    let mut client = open(config).await?;
    let stat = client.stat().await?;
    client.quit().await?;
    Ok(stat)
}

async fn open(config: &ConnectionConfig) -> Result<Client<Pop3Stream, Transaction>> {
    tracing::debug!(host = %config.host, port = config.port, "opening POP3 session");
    let implicit = config.implicit_tls(Service::Pop3);
    let stream = if implicit {
        connect_tls(&config.host, config.port, config.timeout).await?
    } else {
        connect_plain(&config.host, config.port, config.timeout).await?
    };

    let mut client = Client::from_stream(stream, config.timeout).await?;
    if config.encryption == Encryption::Tls && !implicit {
        client = client.stls(&config.host).await?;
    }
    Ok(client.login(&config.username, &config.password).await?)
}
