//! Outgoing message composition.
//!
//! Produces the header block and body handed to SMTP `DATA`. Dot-stuffing
//! and the terminating `.` line are transport framing and are left to the
//! SMTP client.

use crate::encoding::{TransferEncoding, encode_quoted_printable, encode_rfc2047};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use std::fmt::Write as _;

/// An email message to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sender address.
    pub from: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// Recipient address.
    pub to: String,
    /// Optional `Reply-To` address.
    pub reply_to: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Body text or HTML.
    pub body: String,
    /// Whether `body` is HTML.
    pub is_html: bool,
}

impl OutgoingMessage {
    /// Renders the message with the current time.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        self.render_at(Utc::now())
    }

    /// Renders the message with an explicit `Date`.
    ///
    /// Header order is fixed: From, To, Subject, MIME-Version, Content-Type,
    /// Content-Transfer-Encoding, Date, Message-ID, then Reply-To.
    #[must_use]
    pub fn render_at(&self, date: DateTime<Utc>) -> String {
        let mut message = String::new();

        let _ = write!(message, "From: {}\r\n", self.from_header());
        let _ = write!(message, "To: {}\r\n", self.to);
        let _ = write!(message, "Subject: {}\r\n", encode_rfc2047(&self.subject, "UTF-8"));
        message.push_str("MIME-Version: 1.0\r\n");

        let sub_type = if self.is_html { "html" } else { "plain" };
        let _ = write!(message, "Content-Type: text/{sub_type}; charset=UTF-8\r\n");

        let (encoding, body) = if needs_encoding(&self.body) {
            (TransferEncoding::QuotedPrintable, quoted_printable_lines(&self.body))
        } else {
            (TransferEncoding::SevenBit, crlf_lines(&self.body))
        };
        let _ = write!(message, "Content-Transfer-Encoding: {encoding}\r\n");

        let _ = write!(message, "Date: {}\r\n", date.to_rfc2822());
        let _ = write!(message, "Message-ID: <{}>\r\n", self.message_id(date.timestamp()));
        if let Some(reply_to) = &self.reply_to {
            let _ = write!(message, "Reply-To: {reply_to}\r\n");
        }

        message.push_str("\r\n");
        message.push_str(&body);
        message
    }

    /// Returns `md5(to + subject + timestamp)@host`, where host is the
    /// domain of the sender address.
    #[must_use]
    pub fn message_id(&self, timestamp: i64) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.to.as_bytes());
        hasher.update(self.subject.as_bytes());
        hasher.update(timestamp.to_string().as_bytes());
        let host = self
            .from
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim())
            .filter(|domain| !domain.is_empty())
            .unwrap_or("localhost");
        format!("{}@{host}", hex::encode(hasher.finalize()))
    }

    fn from_header(&self) -> String {
        match self.from_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                let encoded = encode_rfc2047(name, "UTF-8");
                if encoded == name && name.contains(|c: char| "()<>@,;:\\\".[]".contains(c)) {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    format!("\"{escaped}\" <{}>", self.from)
                } else {
                    format!("{encoded} <{}>", self.from)
                }
            }
            _ => self.from.clone(),
        }
    }
}

/// Longest line allowed by RFC 5322, excluding the CRLF.
const MAX_LINE_OCTETS: usize = 998;

/// Non-ASCII bodies and bodies with over-long lines go out quoted-printable.
fn needs_encoding(body: &str) -> bool {
    !body.is_ascii() || body.lines().any(|line| line.len() > MAX_LINE_OCTETS)
}

fn crlf_lines(body: &str) -> String {
    body.lines().collect::<Vec<_>>().join("\r\n")
}

/// Quoted-printable encodes each line on its own, keeping CRLF line breaks.
fn quoted_printable_lines(body: &str) -> String {
    body.lines()
        .map(encode_quoted_printable)
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Builder for [`OutgoingMessage`].
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: String,
    from_name: Option<String>,
    to: String,
    reply_to: Option<String>,
    subject: String,
    body: String,
    is_html: bool,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = address.into();
        self
    }

    /// Sets the sender display name.
    #[must_use]
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    /// Sets the recipient address.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to = address.into();
        self
    }

    /// Sets the `Reply-To` address.
    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets a plain-text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.is_html = false;
        self
    }

    /// Sets an HTML body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.is_html = true;
        self
    }

    /// Finishes the message.
    #[must_use]
    pub fn build(self) -> OutgoingMessage {
        OutgoingMessage {
            from: self.from,
            from_name: self.from_name,
            to: self.to,
            reply_to: self.reply_to,
            subject: self.subject,
            body: self.body,
            is_html: self.is_html,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use chrono::TimeZone;

    fn fixed_date() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn sample() -> OutgoingMessage {
        MessageBuilder::new()
            .from("noreply@example.com")
            .from_name("Example Site")
            .to("user@example.org")
            .subject("Welcome")
            .text_body("Hello there.")
            .build()
    }

    #[test]
    fn test_header_order() {
        let rendered = sample().render_at(fixed_date());
        let (head, body) = rendered.split_once("\r\n\r\n").unwrap();
        let names: Vec<_> = head
            .split("\r\n")
            .map(|line| line.split_once(':').unwrap().0)
            .collect();
        assert_eq!(
            names,
            vec![
                "From",
                "To",
                "Subject",
                "MIME-Version",
                "Content-Type",
                "Content-Transfer-Encoding",
                "Date",
                "Message-ID"
            ]
        );
        assert_eq!(body, "Hello there.");
        assert!(!rendered.ends_with("\r\n.\r\n"));
    }

    #[test]
    fn test_plain_headers() {
        let rendered = sample().render_at(fixed_date());
        assert!(rendered.starts_with("From: Example Site <noreply@example.com>\r\n"));
        assert!(rendered.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
        assert!(rendered.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(rendered.contains("Date: Tue, 14 Nov 2023 22:13:20 +0000\r\n"));
    }

    #[test]
    fn test_message_id_uses_sender_domain() {
        let message = sample();
        let id = message.message_id(1_700_000_000);
        let (hash, host) = id.split_once('@').unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(hash.len(), 32);
        assert_eq!(id, message.message_id(1_700_000_000));
        assert_ne!(id, message.message_id(1_700_000_001));
        assert!(
            message
                .render_at(fixed_date())
                .contains(&format!("Message-ID: <{id}>\r\n"))
        );
    }

    #[test]
    fn test_html_non_ascii_round_trip() {
        let message = MessageBuilder::new()
            .from("a@example.com")
            .from_name("Zoë")
            .to("b@example.com")
            .reply_to("support@example.com")
            .subject("Crème brûlée")
            .html_body("<p>Voilà = 1</p>\n<p>second line</p>")
            .build();
        let rendered = message.render_at(fixed_date());
        assert!(rendered.contains("Content-Type: text/html; charset=UTF-8\r\n"));
        assert!(rendered.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(rendered.contains("Subject: =?UTF-8?B?"));
        assert!(rendered.contains("Reply-To: support@example.com\r\n"));

        let parsed = parse(rendered.as_bytes()).unwrap();
        assert_eq!(parsed.subject, "Crème brûlée");
        assert_eq!(parsed.from_name.as_deref(), Some("Zoë"));
        assert_eq!(parsed.from_address, "a@example.com");
        assert_eq!(
            parsed.body_html.as_deref(),
            Some("<p>Voilà = 1</p>\r\n<p>second line</p>")
        );
    }

    #[test]
    fn test_long_single_line_html_is_wrapped() {
        let html = format!("<p>{}</p>", "x".repeat(2000));
        let message = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .subject("Newsletter")
            .html_body(html.clone())
            .build();
        let rendered = message.render_at(fixed_date());

        assert!(rendered.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(rendered.split("\r\n").all(|line| line.len() <= MAX_LINE_OCTETS));

        let parsed = parse(rendered.as_bytes()).unwrap();
        assert_eq!(parsed.body_html.as_deref(), Some(html.as_str()));
    }

    #[test]
    fn test_long_subject_is_folded() {
        let subject = "Réservation confirmée pour votre séjour à l'hôtel du lac cet été";
        let message = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .subject(subject)
            .text_body("x")
            .build();
        let rendered = message.render_at(fixed_date());
        let (head, _) = rendered.split_once("\r\n\r\n").unwrap();
        assert!(head.split("\r\n").all(|line| line.len() <= 78 + "Subject: ".len()));
        assert!(head.contains("?=\r\n =?UTF-8?B?"));

        let parsed = parse(rendered.as_bytes()).unwrap();
        assert_eq!(parsed.subject, subject);
    }

    #[test]
    fn test_ascii_body_is_7bit_with_crlf() {
        let message = MessageBuilder::new()
            .from("a@example.com")
            .to("b@example.com")
            .text_body("line one\nline two")
            .build();
        let rendered = message.render_at(fixed_date());
        assert!(rendered.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(rendered.ends_with("\r\n\r\nline one\r\nline two"));
    }

    #[test]
    fn test_display_name_with_specials_is_quoted() {
        let message = MessageBuilder::new()
            .from("a@example.com")
            .from_name("Doe, John")
            .to("b@example.com")
            .build();
        assert!(
            message
                .render_at(fixed_date())
                .starts_with("From: \"Doe, John\" <a@example.com>\r\n")
        );
    }

    #[test]
    fn test_sender_without_domain_uses_localhost() {
        let message = MessageBuilder::new().from("root").to("b@example.com").build();
        assert!(message.message_id(0).ends_with("@localhost"));
    }
}
