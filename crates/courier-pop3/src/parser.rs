//! POP3 response parser.
//!
//! Status lines are `+OK text` or `-ERR text`. Multi-line bodies follow a
//! `+OK` line and end with a line holding a single `.`.

use crate::error::{Error, Result};
use crate::types::{MailboxStat, MessageHandle};

/// Status indicator of a POP3 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// `+OK`
    Ok(String),
    /// `-ERR`
    Err(String),
}

impl Status {
    /// Parses a status line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the line starts with neither `+OK`
    /// nor `-ERR`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(rest) = strip_prefix_ignore_case(line, "+OK") {
            return Ok(Self::Ok(rest.trim_start().to_string()));
        }
        if let Some(rest) = strip_prefix_ignore_case(line, "-ERR") {
            return Ok(Self::Err(rest.trim_start().to_string()));
        }
        Err(Error::Protocol(format!("Unexpected status line: {line:?}")))
    }

    /// Returns the text after the status indicator.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Ok(text) | Self::Err(text) => text,
        }
    }

    /// Passes `+OK` text through and turns `-ERR` into [`Error::ServerError`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerError`] for `-ERR`.
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Ok(text) => Ok(text),
            Self::Err(text) => Err(Error::ServerError(text)),
        }
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
        .filter(|rest| rest.is_empty() || rest.starts_with(' '))
}

/// Parses the text of a `+OK` reply to `STAT`: `count size`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if either number is missing.
pub fn parse_stat(text: &str) -> Result<MailboxStat> {
    let mut fields = text.split_whitespace();
    let count = fields.next().and_then(|f| f.parse().ok());
    let size = fields.next().and_then(|f| f.parse().ok());
    match (count, size) {
        (Some(count), Some(size)) => Ok(MailboxStat { count, size }),
        _ => Err(Error::Protocol(format!("Malformed STAT reply: {text:?}"))),
    }
}

/// Parses one scan line of a `LIST` body: `seq size`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line is not two numbers.
pub fn parse_list_entry(line: &str) -> Result<MessageHandle> {
    let mut fields = line.split_whitespace();
    let seq = fields.next().and_then(|f| f.parse().ok());
    let size = fields.next().and_then(|f| f.parse().ok());
    match (seq, size) {
        (Some(seq), Some(size)) if seq > 0 => Ok(MessageHandle { seq, size }),
        _ => Err(Error::Protocol(format!("Malformed LIST entry: {line:?}"))),
    }
}

/// Parses a whole `LIST` body, skipping blank lines.
///
/// # Errors
///
/// Returns [`Error::Protocol`] on the first malformed entry.
pub fn parse_list(lines: &[Vec<u8>]) -> Result<Vec<MessageHandle>> {
    lines
        .iter()
        .map(|line| String::from_utf8_lossy(line))
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_list_entry(&line))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(
            Status::parse("+OK POP3 server ready\r\n").unwrap(),
            Status::Ok("POP3 server ready".into())
        );
        assert_eq!(Status::parse("+OK").unwrap(), Status::Ok(String::new()));
        assert_eq!(
            Status::parse("-ERR no such message").unwrap(),
            Status::Err("no such message".into())
        );
        assert_eq!(Status::parse("+ok lower").unwrap().text(), "lower");
    }

    #[test]
    fn test_status_parse_rejects_garbage() {
        assert!(Status::parse("* OK imap").is_err());
        assert!(Status::parse("").is_err());
        assert!(Status::parse("+OKAY").is_err());
    }

    #[test]
    fn test_into_result() {
        assert_eq!(Status::Ok("2 320".into()).into_result().unwrap(), "2 320");
        assert!(matches!(
            Status::Err("locked".into()).into_result(),
            Err(Error::ServerError(text)) if text == "locked"
        ));
    }

    #[test]
    fn test_parse_stat() {
        assert_eq!(
            parse_stat("2 320").unwrap(),
            MailboxStat {
                count: 2,
                size: 320
            }
        );
        assert!(parse_stat("two").is_err());
    }

    #[test]
    fn test_parse_list() {
        let lines = vec![b"1 120".to_vec(), b"2 200 extra".to_vec(), b"".to_vec()];
        let handles = parse_list(&lines).unwrap();
        assert_eq!(
            handles,
            vec![
                MessageHandle { seq: 1, size: 120 },
                MessageHandle { seq: 2, size: 200 }
            ]
        );
        assert!(parse_list(&[b"x 1".to_vec()]).is_err());
        assert!(parse_list_entry("0 10").is_err());
    }
}
