//! Settings model types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::{ConfigProvider, keys};

/// Transport encryption mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    /// Plaintext.
    #[default]
    None,
    /// Plaintext connect, then STARTTLS (SMTP, IMAP) or STLS (POP3).
    Tls,
    /// Implicit TLS from the first byte.
    Ssl,
}

impl Encryption {
    /// Parses a setting value. Unknown or empty values mean [`Encryption::None`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" | "starttls" => Self::Tls,
            "ssl" => Self::Ssl,
            _ => Self::None,
        }
    }

    /// Get display name for the encryption mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "STARTTLS",
            Self::Ssl => "SSL/TLS",
        }
    }
}

/// A mail service the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Outgoing mail.
    Smtp,
    /// Incoming mail.
    Pop3,
    /// Connection test only.
    Imap,
}

impl Service {
    /// Get default port for the encryption mode.
    #[must_use]
    pub const fn default_port(self, encryption: Encryption) -> u16 {
        match (self, encryption) {
            (Self::Smtp, Encryption::None) => courier_smtp::ports::SMTP,
            (Self::Smtp, Encryption::Tls) => courier_smtp::ports::SUBMISSION,
            (Self::Smtp, Encryption::Ssl) => courier_smtp::ports::SUBMISSIONS,
            (Self::Pop3, Encryption::None | Encryption::Tls) => courier_pop3::ports::POP3,
            (Self::Pop3, Encryption::Ssl) => courier_pop3::ports::POP3S,
            (Self::Imap, Encryption::None | Encryption::Tls) => 143,
            (Self::Imap, Encryption::Ssl) => 993,
        }
    }

    /// Returns the per-socket timeout used for this service.
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        match self {
            Self::Smtp => courier_smtp::DEFAULT_TIMEOUT,
            Self::Pop3 | Self::Imap => courier_pop3::DEFAULT_TIMEOUT,
        }
    }

    const fn keys(self) -> [&'static str; 5] {
        match self {
            Self::Smtp => [
                keys::SMTP_HOST,
                keys::SMTP_PORT,
                keys::SMTP_ENCRYPTION,
                keys::SMTP_USERNAME,
                keys::SMTP_PASSWORD,
            ],
            Self::Pop3 => [
                keys::POP3_HOST,
                keys::POP3_PORT,
                keys::POP3_ENCRYPTION,
                keys::POP3_USERNAME,
                keys::POP3_PASSWORD,
            ],
            Self::Imap => [
                keys::IMAP_HOST,
                keys::IMAP_PORT,
                keys::IMAP_ENCRYPTION,
                keys::IMAP_USERNAME,
                keys::IMAP_PASSWORD,
            ],
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Smtp => "SMTP",
            Self::Pop3 => "POP3",
            Self::Imap => "IMAP",
        })
    }
}

/// Server connection settings for one call.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Encryption mode.
    pub encryption: Encryption,
    /// Username for authentication; empty skips authentication where allowed.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Bound on each connect, read and write.
    pub timeout: Duration,
}

impl ConnectionConfig {
    /// Creates a configuration with the service's default port and timeout.
    #[must_use]
    pub fn new(service: Service, host: impl Into<String>, encryption: Encryption) -> Self {
        Self {
            host: host.into(),
            port: service.default_port(encryption),
            encryption,
            username: String::new(),
            password: String::new(),
            timeout: service.default_timeout(),
        }
    }

    /// Reads a service's settings from the provider.
    ///
    /// A missing, zero or unparsable port falls back to the default for
    /// the encryption mode.
    #[must_use]
    pub fn from_provider(service: Service, provider: &dyn ConfigProvider) -> Self {
        let [host, port, encryption, username, password] = service.keys();
        let get = |key: &str| provider.get(key).unwrap_or_default();

        let encryption = Encryption::parse(&get(encryption));
        let port = get(port)
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|&port| port != 0)
            .unwrap_or_else(|| service.default_port(encryption));

        Self {
            host: get(host).trim().to_string(),
            port,
            encryption,
            username: get(username).trim().to_string(),
            password: get(password),
            timeout: service.default_timeout(),
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the per-socket timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if no host is configured.
    #[must_use]
    pub fn is_unconfigured(&self) -> bool {
        self.host.is_empty()
    }

    /// Returns true if the connection is wrapped in TLS from the start.
    ///
    /// SMTP on port 465 is always implicit TLS; other services follow the
    /// encryption setting.
    #[must_use]
    pub fn implicit_tls(&self, service: Service) -> bool {
        self.encryption == Encryption::Ssl
            || (service == Service::Smtp && self.port == courier_smtp::ports::SUBMISSIONS)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field("password", &"****")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Everything the engine reads from the host's settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailSettings {
    /// Outgoing server.
    pub smtp: ConnectionConfig,
    /// Incoming server.
    pub pop3: ConnectionConfig,
    /// IMAP server (connection test only).
    pub imap: ConnectionConfig,
    /// Name sent with EHLO.
    pub helo: String,
    /// Default sender address.
    pub from_email: String,
    /// Default sender display name.
    pub from_name: String,
}

impl MailSettings {
    /// Cache key for the assembled settings.
    pub const CACHE_KEY: &'static str = "mail_settings";

    /// How long assembled settings stay cached.
    pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

    /// Assembles settings from the provider.
    #[must_use]
    pub fn from_provider(provider: &dyn ConfigProvider) -> Self {
        let helo = provider
            .get(keys::SMTP_HELO)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());

        Self {
            smtp: ConnectionConfig::from_provider(Service::Smtp, provider),
            pop3: ConnectionConfig::from_provider(Service::Pop3, provider),
            imap: ConnectionConfig::from_provider(Service::Imap, provider),
            helo,
            from_email: provider
                .get(keys::FROM_EMAIL)
                .unwrap_or_default()
                .trim()
                .to_string(),
            from_name: provider.get(keys::FROM_NAME).unwrap_or_default(),
        }
    }

    /// Returns the default sender: `from_email`, else the SMTP username.
    #[must_use]
    pub fn default_sender(&self) -> &str {
        if self.from_email.is_empty() {
            &self.smtp.username
        } else {
            &self.from_email
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::settings::MapConfig;
    use proptest::prelude::*;

    #[test]
    fn test_encryption_parse() {
        assert_eq!(Encryption::parse("tls"), Encryption::Tls);
        assert_eq!(Encryption::parse(" SSL "), Encryption::Ssl);
        assert_eq!(Encryption::parse("none"), Encryption::None);
        assert_eq!(Encryption::parse(""), Encryption::None);
        assert_eq!(Encryption::parse("quantum"), Encryption::None);
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(Service::Smtp.default_port(Encryption::None), 25);
        assert_eq!(Service::Smtp.default_port(Encryption::Tls), 587);
        assert_eq!(Service::Smtp.default_port(Encryption::Ssl), 465);
        assert_eq!(Service::Pop3.default_port(Encryption::Tls), 110);
        assert_eq!(Service::Pop3.default_port(Encryption::Ssl), 995);
        assert_eq!(Service::Imap.default_port(Encryption::None), 143);
        assert_eq!(Service::Imap.default_port(Encryption::Ssl), 993);
    }

    #[test]
    fn test_from_provider() {
        let config = MapConfig::new()
            .with(keys::SMTP_HOST, " smtp.example.com ")
            .with(keys::SMTP_PORT, "2525")
            .with(keys::SMTP_ENCRYPTION, "tls")
            .with(keys::SMTP_USERNAME, "user")
            .with(keys::SMTP_PASSWORD, "secret")
            .with(keys::POP3_HOST, "pop.example.com")
            .with(keys::POP3_PORT, "not a port")
            .with(keys::POP3_ENCRYPTION, "ssl")
            .with(keys::FROM_EMAIL, "site@example.com");

        let settings = MailSettings::from_provider(&config);
        assert_eq!(settings.smtp.host, "smtp.example.com");
        assert_eq!(settings.smtp.port, 2525);
        assert_eq!(settings.smtp.encryption, Encryption::Tls);
        assert_eq!(settings.smtp.timeout, courier_smtp::DEFAULT_TIMEOUT);
        assert_eq!(settings.pop3.port, 995);
        assert_eq!(settings.pop3.timeout, courier_pop3::DEFAULT_TIMEOUT);
        assert!(settings.imap.is_unconfigured());
        assert_eq!(settings.helo, "localhost");
        assert_eq!(settings.default_sender(), "site@example.com");
    }

    #[test]
    fn test_default_sender_falls_back_to_username() {
        let config = MapConfig::new().with(keys::SMTP_USERNAME, "me@example.com");
        let settings = MailSettings::from_provider(&config);
        assert_eq!(settings.default_sender(), "me@example.com");
    }

    #[test]
    fn test_implicit_tls() {
        let ssl = ConnectionConfig::new(Service::Smtp, "h", Encryption::Ssl);
        assert!(ssl.implicit_tls(Service::Smtp));
        let tls_on_465 = ConnectionConfig::new(Service::Smtp, "h", Encryption::Tls).with_port(465);
        assert!(tls_on_465.implicit_tls(Service::Smtp));
        let starttls = ConnectionConfig::new(Service::Smtp, "h", Encryption::Tls);
        assert!(!starttls.implicit_tls(Service::Smtp));
        let plain_on_465 = ConnectionConfig::new(Service::Smtp, "h", Encryption::None).with_port(465);
        assert!(plain_on_465.implicit_tls(Service::Smtp));
        let plain = ConnectionConfig::new(Service::Pop3, "h", Encryption::None).with_port(995);
        assert!(!plain.implicit_tls(Service::Pop3));
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ConnectionConfig::new(Service::Pop3, "h", Encryption::None)
            .with_credentials("u", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn test_settings_json_round_trip() {
        let settings = MailSettings::from_provider(&MapConfig::new().with(keys::SMTP_HOST, "h"));
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(serde_json::from_str::<MailSettings>(&json).unwrap(), settings);
    }

    proptest! {
        #[test]
        fn configured_port_is_kept(port in 1u16..=u16::MAX) {
            let config = MapConfig::new().with(keys::POP3_PORT, port.to_string());
            prop_assert_eq!(ConnectionConfig::from_provider(Service::Pop3, &config).port, port);
        }

        #[test]
        fn any_port_text_yields_a_usable_port(text in ".{0,12}", enc in "(none|tls|ssl|\\PC{0,5})") {
            let config = MapConfig::new()
                .with(keys::SMTP_PORT, text)
                .with(keys::SMTP_ENCRYPTION, enc);
            prop_assert_ne!(ConnectionConfig::from_provider(Service::Smtp, &config).port, 0);
        }
    }
}
