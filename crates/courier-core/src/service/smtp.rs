//! SMTP delivery.

use courier_smtp::connection::{connect, connect_tls};
use courier_smtp::{Address, Client, Connected, SmtpConnection};

use crate::Result;
use crate::settings::{ConnectionConfig, Encryption, Service};

/// Sends one message to one recipient.
///
/// The session is connect, EHLO, optional STARTTLS, AUTH LOGIN when a
/// username is configured, then MAIL FROM, RCPT TO and DATA. Any unexpected
/// reply aborts the send and drops the connection.
///
/// # Errors
///
/// Returns the classified error of the first failing step.
pub async fn send(
    config: &ConnectionConfig,
    helo: &str,
    from: Address,
    to: Address,
    message: &[u8],
) -> Result<()> {
    let client = open(config, helo).await?;

    let client = if config.username.is_empty() {
        client.mail_from(from).await?
    } else {
        client
            .auth_login(&config.username, &config.password)
            .await?
            .mail_from(from)
            .await?
    };

    let client = client
        .rcpt_to(to)
        .await?
        .data()
        .await?
        .send_message(message)
        .await?;
    tracing::info!(host = %config.host, "message accepted for delivery");

    // The message is already queued; a failed QUIT does not undo that.
    if let Err(e) = client.quit().await {
        tracing::debug!(error = %e, "QUIT after delivery failed");
    }
    Ok(())
}

/// Connects, authenticates if configured, and disconnects.
///
/// Returns a short description of the server for display.
///
/// # Errors
///
/// Returns the classified error of the first failing step.
pub async fn test_connection(config: &ConnectionConfig, helo: &str) -> Result<String> {
    let client = open(config, helo).await?;
    let hostname = client.server_info().hostname.clone();

    if config.username.is_empty() {
        client.quit().await?;
    } else {
        client
            .auth_login(&config.username, &config.password)
            .await?
            .quit()
            .await?;
    }

    Ok(format!(
        "Connected to {}:{} ({hostname}, {})",
        config.host,
        config.port,
        config.encryption.display_name()
    ))
}

async fn open(config: &ConnectionConfig, helo: &str) -> Result<Client<Connected>> {
    tracing::debug!(host = %config.host, port = config.port, "opening SMTP session");
    let implicit = config.implicit_tls(Service::Smtp);
    let stream = if implicit {
        connect_tls(&config.host, config.port, config.timeout).await?
    } else {
        connect(&config.host, config.port, config.timeout).await?
    };

    let client = Client::from_stream(stream).await?.ehlo(helo).await?;
    if config.encryption == Encryption::Tls && !implicit {
        return Ok(client.starttls(&config.host).await?);
    }
    Ok(client)
}
