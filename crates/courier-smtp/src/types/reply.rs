//! SMTP reply types.

use crate::error::Error;

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Converts the reply into an [`Error::SmtpError`].
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::smtp_error(self.code.as_u16(), self.message_text())
    }

    /// Passes the reply through if its code is `expected`.
    ///
    /// # Errors
    ///
    /// Returns the reply as an [`Error::SmtpError`] otherwise.
    pub fn expect_code(self, expected: ReplyCode) -> Result<Self, Error> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Passes the reply through if it is a 2xx reply.
    ///
    /// # Errors
    ///
    /// Returns the reply as an [`Error::SmtpError`] otherwise.
    pub fn expect_success(self) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes the client checks for
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reply(code: ReplyCode, text: &str) -> Reply {
        Reply::new(code, vec![text.to_string()])
    }

    #[test]
    fn code_classes() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::new(235).is_success());
        assert!(!ReplyCode::AUTH_CONTINUE.is_success());
        assert!(!ReplyCode::new(550).is_success());
        assert!(ReplyCode::OK < ReplyCode::new(550));
        assert_eq!(ReplyCode::new(535).to_string(), "535");
    }

    #[test]
    fn expect_code() {
        assert!(reply(ReplyCode::START_DATA, "go ahead").expect_code(ReplyCode::START_DATA).is_ok());
        let err = reply(ReplyCode::OK, "ok")
            .expect_code(ReplyCode::START_DATA)
            .unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 250, .. }));
    }

    #[test]
    fn expect_success() {
        assert!(reply(ReplyCode::new(251), "forwarding").expect_success().is_ok());
        let err = reply(ReplyCode::new(550), "no such user")
            .expect_success()
            .unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 550, .. }));
        assert_eq!(err.to_string(), "SMTP error 550: no such user");
    }

    #[test]
    fn message_text_joins_lines() {
        let reply = Reply::new(
            ReplyCode::SERVICE_READY,
            vec!["smtp.example.com ESMTP".to_string(), "Ready".to_string()],
        );
        assert_eq!(reply.message_text(), "smtp.example.com ESMTP\nReady");
        assert_eq!(Reply::new(ReplyCode::OK, vec![]).message_text(), "");
    }
}
