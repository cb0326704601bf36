//! SMTP extension types.

/// SMTP extensions discovered from EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication, with the advertised mechanisms
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// Anything else, kept verbatim
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    ///
    /// Old servers announce `AUTH=LOGIN`; that form is treated like
    /// `AUTH LOGIN`.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split(|c: char| c.is_whitespace() || c == '=');
        let Some(keyword) = parts.next().filter(|k| !k.is_empty()) else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(parts.find(|s| !s.is_empty()).and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - base64 username/password challenge-response
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` bearer token
    XOAuth2,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_keywords() {
        for (line, expected) in [
            ("STARTTLS", Extension::StartTls),
            ("starttls", Extension::StartTls),
            ("8BITMIME", Extension::EightBitMime),
            ("PIPELINING", Extension::Pipelining),
            ("SMTPUTF8", Extension::SmtpUtf8),
            ("SIZE 52428800", Extension::Size(Some(52_428_800))),
            ("SIZE", Extension::Size(None)),
        ] {
            assert_eq!(Extension::parse(line), expected, "{line}");
        }
    }

    #[test]
    fn parse_auth() {
        assert_eq!(
            Extension::parse("AUTH LOGIN PLAIN GSSAPI"),
            Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::Plain])
        );
        assert_eq!(
            Extension::parse("AUTH=LOGIN"),
            Extension::Auth(vec![AuthMechanism::Login])
        );
        assert_eq!(Extension::parse("AUTH"), Extension::Auth(vec![]));
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            Extension::parse("X-CUSTOM thing"),
            Extension::Unknown("X-CUSTOM thing".into())
        );
        assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
    }

    #[test]
    fn mechanism_names() {
        for mechanism in [
            AuthMechanism::Plain,
            AuthMechanism::Login,
            AuthMechanism::CramMd5,
            AuthMechanism::XOAuth2,
        ] {
            assert_eq!(AuthMechanism::parse(mechanism.as_str()), Some(mechanism));
        }
        assert_eq!(AuthMechanism::parse("login"), Some(AuthMechanism::Login));
        assert_eq!(AuthMechanism::parse("NTLM"), None);
    }
}
