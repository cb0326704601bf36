//! The mail engine facade.

use std::path::PathBuf;
use std::sync::Arc;

use courier_mime::{Message, MessageBuilder, OutgoingMessage};
use courier_smtp::Address;
use serde::{Deserialize, Serialize};

use crate::service;
use crate::settings::{Cache, ConfigProvider, ConnectionConfig, MailSettings, Service};
use crate::{MailError, Result};

/// Per-call options for [`Mailer::send_email`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Send the body as `text/html`.
    pub is_html: bool,
    /// Sender address; defaults to the configured `from_email`.
    pub from_email: Option<String>,
    /// Sender display name; defaults to the configured `from_name`.
    pub from_name: Option<String>,
    /// Optional `Reply-To` address.
    pub reply_to: Option<String>,
}

impl SendOptions {
    /// Options for an HTML message.
    #[must_use]
    pub fn html() -> Self {
        Self {
            is_html: true,
            ..Self::default()
        }
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from_email(mut self, address: impl Into<String>) -> Self {
        self.from_email = Some(address.into());
        self
    }

    /// Sets the sender display name.
    #[must_use]
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    /// Sets the `Reply-To` address.
    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }
}

/// Outcome of [`Mailer::receive_emails`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveResult {
    /// Whether the batch was fetched.
    pub success: bool,
    /// Parsed messages, newest first.
    pub emails: Vec<Message>,
    /// Failure description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of a connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    /// Whether the server accepted the connection and credentials.
    pub success: bool,
    /// Human-readable detail.
    pub message: String,
}

impl ConnectionTestResult {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn failed(service: Service, err: &MailError) -> Self {
        tracing::warn!(%service, error = %err, "connection test failed");
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}

/// How a message leaves the system, chosen once per send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStrategy {
    /// Speak SMTP to the configured server.
    Smtp(ConnectionConfig),
    /// Hand the message to the local sendmail program.
    LocalMail,
}

impl DeliveryStrategy {
    /// Chooses local delivery when no SMTP host is configured.
    #[must_use]
    pub fn select(smtp: &ConnectionConfig) -> Self {
        if smtp.is_unconfigured() {
            Self::LocalMail
        } else {
            Self::Smtp(smtp.clone())
        }
    }
}

/// Mail engine entry point.
///
/// Settings come from the injected [`ConfigProvider`] and are cached
/// through the injected [`Cache`]. Each call runs one sequential exchange
/// with its own connection; a `Mailer` can be shared across tasks.
#[derive(Clone)]
pub struct Mailer {
    config: Arc<dyn ConfigProvider>,
    cache: Arc<dyn Cache>,
    sendmail: PathBuf,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("sendmail", &self.sendmail)
            .finish_non_exhaustive()
    }
}

impl Mailer {
    /// Creates a mailer over the host's settings and cache.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigProvider>, cache: Arc<dyn Cache>) -> Self {
        Self {
            config,
            cache,
            sendmail: PathBuf::from(service::local::DEFAULT_SENDMAIL),
        }
    }

    /// Overrides the program used for local delivery.
    #[must_use]
    pub fn with_sendmail(mut self, program: impl Into<PathBuf>) -> Self {
        self.sendmail = program.into();
        self
    }

    /// Returns the current settings, reading through the cache.
    #[must_use]
    pub fn settings(&self) -> MailSettings {
        if let Some(json) = self.cache.get(MailSettings::CACHE_KEY) {
            match serde_json::from_str(&json) {
                Ok(settings) => return settings,
                Err(e) => tracing::warn!(error = %e, "discarding unreadable cached mail settings"),
            }
        }

        let settings = MailSettings::from_provider(self.config.as_ref());
        match serde_json::to_string(&settings) {
            Ok(json) => self
                .cache
                .set(MailSettings::CACHE_KEY, json, MailSettings::CACHE_TTL),
            Err(e) => tracing::warn!(error = %e, "could not cache mail settings"),
        }
        settings
    }

    /// Drops cached settings so the next call reads the provider again.
    pub fn invalidate_settings(&self) {
        self.cache.forget(MailSettings::CACHE_KEY);
    }

    /// Sends one message. Failures are logged and reported as `false`.
    pub async fn send_email(&self, to: &str, subject: &str, body: &str, options: SendOptions) -> bool {
        match self.try_send_email(to, subject, body, options).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%to, error = %e, "send failed");
                false
            }
        }
    }

    /// Sends one message and reports why it failed.
    ///
    /// Addresses are validated before any connection is opened.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Validation`] for a malformed recipient or
    /// sender, otherwise the classified error of the delivery attempt.
    pub async fn try_send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: SendOptions,
    ) -> Result<()> {
        let settings = self.settings();
        let from = options
            .from_email
            .unwrap_or_else(|| settings.default_sender().to_string());
        let from_name = options.from_name.unwrap_or_else(|| settings.from_name.clone());

        let recipient = validate("recipient", to)?;
        let sender = validate("sender", &from)?;
        if let Some(reply_to) = &options.reply_to {
            validate("reply-to", reply_to)?;
        }

        let mut builder = MessageBuilder::new()
            .from(sender.as_str())
            .to(recipient.as_str())
            .subject(subject);
        if !from_name.trim().is_empty() {
            builder = builder.from_name(from_name.trim());
        }
        if let Some(reply_to) = options.reply_to {
            builder = builder.reply_to(reply_to);
        }
        builder = if options.is_html {
            builder.html_body(body)
        } else {
            builder.text_body(body)
        };
        let message: OutgoingMessage = builder.build();
        let rendered = message.to_rfc5322();

        match DeliveryStrategy::select(&settings.smtp) {
            DeliveryStrategy::Smtp(smtp) => {
                tracing::debug!(host = %smtp.host, port = smtp.port, %to, "sending via SMTP");
                service::smtp::send(&smtp, &settings.helo, sender, recipient, rendered.as_bytes())
                    .await
            }
            DeliveryStrategy::LocalMail => {
                tracing::debug!(%to, "no SMTP host configured, using local mailer");
                let program = self.sendmail.to_string_lossy();
                service::local::send(&program, rendered.as_bytes()).await
            }
        }
    }

    /// Fetches up to `limit` of the most recent messages over POP3.
    ///
    /// Connection and login failures abort the batch. A message that
    /// cannot be retrieved or parsed is skipped.
    pub async fn receive_emails(&self, limit: usize) -> ReceiveResult {
        let settings = self.settings();
        if settings.pop3.is_unconfigured() {
            return ReceiveResult {
                success: false,
                emails: Vec::new(),
                message: Some("POP3 is not configured".to_string()),
            };
        }

        match service::pop3::fetch_recent(&settings.pop3, limit).await {
            Ok(emails) => {
                tracing::info!(count = emails.len(), "received messages");
                ReceiveResult {
                    success: true,
                    emails,
                    message: None,
                }
            }
            Err(e) => {
                tracing::warn!(host = %settings.pop3.host, error = %e, "receive failed");
                ReceiveResult {
                    success: false,
                    emails: Vec::new(),
                    message: Some(e.to_string()),
                }
            }
        }
    }

    /// Checks that the SMTP server is reachable and accepts the credentials.
    pub async fn test_smtp_connection(&self) -> ConnectionTestResult {
        let settings = self.settings();
        if settings.smtp.is_unconfigured() {
            return ConnectionTestResult::ok(
                "No SMTP host configured; mail is delivered by the local mailer".to_string(),
            );
        }
        match service::smtp::test_connection(&settings.smtp, &settings.helo).await {
            Ok(message) => ConnectionTestResult::ok(message),
            Err(e) => ConnectionTestResult::failed(Service::Smtp, &e),
        }
    }

    /// Checks that the POP3 server is reachable and accepts the credentials.
    pub async fn test_pop3_connection(&self) -> ConnectionTestResult {
        let settings = self.settings();
        if let Err(e) = require_host(Service::Pop3, &settings.pop3) {
            return ConnectionTestResult::failed(Service::Pop3, &e);
        }
        match service::pop3::test_connection(&settings.pop3).await {
            Ok(stat) => ConnectionTestResult::ok(format!(
                "Connected to {}:{}, {} message(s) in mailbox",
                settings.pop3.host, settings.pop3.port, stat.count
            )),
            Err(e) => ConnectionTestResult::failed(Service::Pop3, &e),
        }
    }

    /// Checks that the IMAP server is reachable and accepts the credentials.
    pub async fn test_imap_connection(&self) -> ConnectionTestResult {
        let settings = self.settings();
        if let Err(e) = require_host(Service::Imap, &settings.imap) {
            return ConnectionTestResult::failed(Service::Imap, &e);
        }
        match service::imap::test_connection(&settings.imap).await {
            Ok(greeting) => ConnectionTestResult::ok(format!(
                "Connected to {}:{}: {greeting}",
                settings.imap.host, settings.imap.port
            )),
            Err(e) => ConnectionTestResult::failed(Service::Imap, &e),
        }
    }
}

fn validate(role: &str, address: &str) -> Result<Address> {
    Address::new(address.trim())
        .map_err(|_| MailError::Validation(format!("Invalid {role} address: {address:?}")))
}

fn require_host(service: Service, config: &ConnectionConfig) -> Result<()> {
    if config.is_unconfigured() {
        Err(MailError::Config(format!("{service} host is not configured")))
    } else {
        Ok(())
    }
}
