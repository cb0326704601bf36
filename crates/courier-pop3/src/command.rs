//! POP3 command serialization (RFC 1939, RFC 2595).

/// POP3 command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - mailbox name
    User(String),
    /// PASS - mailbox password
    Pass(String),
    /// STLS - upgrade to TLS
    Stls,
    /// STAT - message count and total size
    Stat,
    /// LIST - scan listing of all messages
    List,
    /// RETR - retrieve one message
    Retr(u32),
    /// QUIT - enter UPDATE state and close
    Quit,
}

impl Command {
    /// Serializes the command to bytes, including the trailing CRLF.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::User(name) => format!("USER {name}"),
            Self::Pass(password) => format!("PASS {password}"),
            Self::Stls => "STLS".to_string(),
            Self::Stat => "STAT".to_string(),
            Self::List => "LIST".to_string(),
            Self::Retr(seq) => format!("RETR {seq}"),
            Self::Quit => "QUIT".to_string(),
        };
        let mut buf = line.into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns true for commands whose success reply is followed by a
    /// dot-terminated multi-line body.
    #[must_use]
    pub const fn is_multiline(&self) -> bool {
        matches!(self, Self::List | Self::Retr(_))
    }

    /// Returns the command as it may appear in logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ****".to_string(),
            other => String::from_utf8_lossy(&other.serialize())
                .trim_end()
                .to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        assert_eq!(Command::User("alice".into()).serialize(), b"USER alice\r\n");
        assert_eq!(Command::Pass("s3cret".into()).serialize(), b"PASS s3cret\r\n");
        assert_eq!(Command::Stls.serialize(), b"STLS\r\n");
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(Command::List.serialize(), b"LIST\r\n");
        assert_eq!(Command::Retr(42).serialize(), b"RETR 42\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }

    #[test]
    fn test_multiline_commands() {
        assert!(Command::List.is_multiline());
        assert!(Command::Retr(1).is_multiline());
        assert!(!Command::Stat.is_multiline());
        assert!(!Command::Quit.is_multiline());
    }

    #[test]
    fn test_redacted_hides_password() {
        assert_eq!(Command::Pass("s3cret".into()).redacted(), "PASS ****");
        assert_eq!(Command::User("alice".into()).redacted(), "USER alice");
    }
}
