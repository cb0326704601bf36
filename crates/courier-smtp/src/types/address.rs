//! Email address type for the SMTP envelope.

use crate::error::{Error, Result};

/// Maximum length of a forward-path (RFC 5321 section 4.5.3.1.3).
const MAX_ADDRESS_LENGTH: usize = 254;
/// Maximum length of the local part.
const MAX_LOCAL_LENGTH: usize = 64;

/// Syntactically checked email address for `MAIL FROM` / `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is not of the
    /// `local@domain.tld` shape.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr).map_err(|reason| Error::InvalidAddress(format!("{addr:?}: {reason}")))?;
        Ok(Self(addr))
    }

    /// Returns true if `addr` would be accepted by [`Address::new`].
    #[must_use]
    pub fn is_valid(addr: &str) -> bool {
        Self::validate(addr).is_ok()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    fn validate(addr: &str) -> std::result::Result<(), &'static str> {
        if addr.is_empty() {
            return Err("address is empty");
        }
        if addr.len() > MAX_ADDRESS_LENGTH {
            return Err("address is too long");
        }
        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "<>()[],;:\\\"".contains(c))
        {
            return Err("address contains a forbidden character");
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err("address must contain @");
        };
        if domain.contains('@') {
            return Err("address must have exactly one @");
        }

        if local.is_empty() || local.len() > MAX_LOCAL_LENGTH {
            return Err("local part is empty or too long");
        }
        if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
            return Err("local part has a misplaced dot");
        }

        if !domain.contains('.') {
            return Err("domain must contain a dot");
        }
        for label in domain.split('.') {
            if label.is_empty() {
                return Err("domain has an empty label");
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err("domain label starts or ends with a hyphen");
            }
            if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
                return Err("domain label contains a forbidden character");
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.domain(), "example.com");
        assert!(Address::is_valid("first.last+tag@mail.example.co.uk"));
    }

    #[test]
    fn test_invalid_addresses() {
        for bad in [
            "",
            "userexample.com",
            "@example.com",
            "user@",
            "user@localhost",
            "user@@example.com",
            "a@b@example.com",
            "user name@example.com",
            "<user@example.com>",
            ".user@example.com",
            "us..er@example.com",
            "user@example..com",
            "user@-example.com",
            "user@example.com\r\nRCPT TO:<x@y.z>",
        ] {
            assert!(Address::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_error_names_the_address() {
        let err = Address::new("nope").unwrap_err();
        assert!(matches!(&err, Error::InvalidAddress(msg) if msg.contains("nope")));
    }

    proptest! {
        #[test]
        fn accepts_name_at_domain(
            local in "[a-z0-9][a-z0-9._+-]{0,20}[a-z0-9]",
            domain in "[a-z0-9]{1,12}",
            tld in "[a-z]{2,6}",
        ) {
            prop_assume!(!local.contains(".."));
            let addr = format!("{local}@{domain}.{tld}");
            prop_assert!(Address::is_valid(&addr));
        }

        #[test]
        fn rejects_strings_without_at(s in "[^@]{0,40}") {
            prop_assert!(!Address::is_valid(&s));
        }

        #[test]
        fn rejects_missing_domain(local in "[a-z0-9]{1,20}") {
            let addr = format!("{local}@");
            prop_assert!(!Address::is_valid(&addr));
        }
    }
}
