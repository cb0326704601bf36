//! Flat string-keyed settings source.

use std::collections::HashMap;

/// Recognized setting keys.
pub mod keys {
    /// SMTP server host; empty selects local mail delivery.
    pub const SMTP_HOST: &str = "smtp_host";
    /// SMTP port.
    pub const SMTP_PORT: &str = "smtp_port";
    /// SMTP encryption: `none`, `tls` or `ssl`.
    pub const SMTP_ENCRYPTION: &str = "smtp_encryption";
    /// SMTP username; empty skips AUTH.
    pub const SMTP_USERNAME: &str = "smtp_username";
    /// SMTP password.
    pub const SMTP_PASSWORD: &str = "smtp_password";
    /// Name sent with EHLO.
    pub const SMTP_HELO: &str = "smtp_helo";
    /// POP3 server host.
    pub const POP3_HOST: &str = "pop3_host";
    /// POP3 port.
    pub const POP3_PORT: &str = "pop3_port";
    /// POP3 encryption: `none`, `tls` or `ssl`.
    pub const POP3_ENCRYPTION: &str = "pop3_encryption";
    /// POP3 username.
    pub const POP3_USERNAME: &str = "pop3_username";
    /// POP3 password.
    pub const POP3_PASSWORD: &str = "pop3_password";
    /// IMAP server host.
    pub const IMAP_HOST: &str = "imap_host";
    /// IMAP port.
    pub const IMAP_PORT: &str = "imap_port";
    /// IMAP encryption: `none`, `tls` or `ssl`.
    pub const IMAP_ENCRYPTION: &str = "imap_encryption";
    /// IMAP username.
    pub const IMAP_USERNAME: &str = "imap_username";
    /// IMAP password.
    pub const IMAP_PASSWORD: &str = "imap_password";
    /// Default sender address.
    pub const FROM_EMAIL: &str = "from_email";
    /// Default sender display name.
    pub const FROM_NAME: &str = "from_name";
}

/// Read access to the host application's settings.
pub trait ConfigProvider: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns every stored setting.
    fn all(&self) -> HashMap<String, String>;
}

/// [`ConfigProvider`] backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a setting.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets a value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl From<HashMap<String, String>> for MapConfig {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl<K, V> FromIterator<(K, V)> for MapConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigProvider for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn all(&self) -> HashMap<String, String> {
        self.values.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_map_config_lookup() {
        let config = MapConfig::new()
            .with(keys::SMTP_HOST, "smtp.example.com")
            .with(keys::SMTP_PORT, "587");
        assert_eq!(config.get(keys::SMTP_HOST).as_deref(), Some("smtp.example.com"));
        assert_eq!(config.get(keys::POP3_HOST), None);
        assert_eq!(config.all().len(), 2);
    }

    #[test]
    fn test_map_config_from_iter() {
        let config: MapConfig = [(keys::FROM_EMAIL, "site@example.com")].into_iter().collect();
        assert_eq!(config.get(keys::FROM_EMAIL).as_deref(), Some("site@example.com"));
    }
}
