//! Raw message to [`Message`] reconstruction.
//!
//! Parsing is best-effort: a part that cannot be understood is logged and
//! skipped, and only input with no header block at all is rejected.

use crate::charset::decode_text;
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_body, decode_header_value};
use crate::error::{Error, Result};
use crate::header::{Headers, fold_headers};
use crate::message::{Attachment, Message, extension_for_mime};
use crate::multipart::{split_message, split_multipart};
use md5::{Digest, Md5};

/// Nesting limit for multipart containers.
const MAX_DEPTH: usize = 16;

/// Parses a raw message (header block, blank line, body).
///
/// # Errors
///
/// Returns [`Error::Parse`] if no header can be read from the input.
pub fn parse(raw: &[u8]) -> Result<Message> {
    parse_at(raw, chrono::Utc::now().timestamp())
}

/// Like [`parse`] with an explicit Unix time for synthesized file names.
///
/// # Errors
///
/// Returns [`Error::Parse`] if no header can be read from the input.
pub fn parse_at(raw: &[u8], now: i64) -> Result<Message> {
    let (head, body) = split_message(raw);
    let raw_headers = fold_headers(&String::from_utf8_lossy(head));
    if raw_headers.is_empty() {
        return Err(Error::Parse("message has no header block".into()));
    }

    let mut collector = Collector {
        now,
        ..Collector::default()
    };
    collector.walk(&raw_headers, body, 0);

    let headers = raw_headers.decoded();
    let subject = headers.get("subject").unwrap_or_default().to_string();
    let from = headers.get("from").unwrap_or_default().to_string();
    let (from_name, from_address) = split_mailbox(&from);
    let to = headers.get("to").unwrap_or_default().to_string();
    let date = headers.get("date").map(str::to_string);

    let message_id = headers
        .get("message-id")
        .map(normalize_id)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| fallback_message_id(&from_address, &subject, date.as_deref()));
    let in_reply_to = headers
        .get("in-reply-to")
        .and_then(|v| v.split_whitespace().next())
        .map(normalize_id)
        .filter(|id| !id.is_empty());
    let references = headers
        .get("references")
        .map(|v| {
            v.split_whitespace()
                .map(normalize_id)
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let body_html = collector.html;
    let body = match (collector.text, &body_html) {
        (Some(text), _) => text,
        (None, Some(html)) => html_to_text(html),
        (None, None) => String::new(),
    };

    Ok(Message {
        headers,
        subject,
        from,
        from_address,
        from_name,
        to,
        date,
        body,
        body_html,
        attachments: collector.attachments,
        message_id,
        in_reply_to,
        references,
    })
}

/// Derives the stable dedup key for messages without a `Message-ID`.
///
/// `md5(lowercase(from_address) | subject | date)` as lowercase hex, so the
/// same message fetched twice always maps to the same key.
#[must_use]
pub fn fallback_message_id(from_address: &str, subject: &str, date: Option<&str>) -> String {
    let mut hasher = Md5::new();
    hasher.update(from_address.to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(subject.as_bytes());
    hasher.update(b"|");
    hasher.update(date.unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

/// Strips whitespace and angle brackets from a message id.
#[must_use]
pub fn normalize_id(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// Splits `"Display Name" <user@example.com>` into name and address.
#[must_use]
pub fn split_mailbox(value: &str) -> (Option<String>, String) {
    let value = value.trim();
    if let Some(open) = value.rfind('<')
        && let Some(close) = value[open..].find('>')
    {
        let address = value[open + 1..open + close].trim().to_string();
        let name = value[..open].trim().trim_matches('"').trim();
        let name = (!name.is_empty()).then(|| name.to_string());
        return (name, address);
    }
    (None, value.trim_matches('"').to_string())
}

fn html_to_text(html: &str) -> String {
    match htmd::convert(html) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "could not derive text body from HTML");
            String::new()
        }
    }
}

#[derive(Default)]
struct Collector {
    now: i64,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
}

impl Collector {
    fn walk(&mut self, headers: &Headers, body: &[u8], depth: usize) {
        let content_type = ContentType::parse_or_default(headers.get("content-type"));
        let encoding = headers.get("content-transfer-encoding").unwrap_or_default();
        let disposition = headers
            .get("content-disposition")
            .map(ContentDisposition::parse);

        if content_type.is_multipart() {
            if depth >= MAX_DEPTH {
                tracing::warn!(depth, "multipart nesting too deep, skipping part");
                return;
            }
            if let Some(boundary) = content_type.boundary() {
                for part in split_multipart(body, boundary) {
                    let (head, part_body) = split_message(part);
                    let part_headers = fold_headers(&String::from_utf8_lossy(head));
                    self.walk(&part_headers, part_body, depth + 1);
                }
                return;
            }
            tracing::warn!(
                content_type = %content_type.mime_type(),
                "multipart without boundary, treating as a single body"
            );
            let text = decode_text(&decode_body(body, encoding), content_type.charset());
            self.text.get_or_insert_with(|| trim_body(&text));
            return;
        }

        // An unnamed inline text part fills an empty body slot; once that
        // slot is taken it is kept as an attachment.
        let inline_body = disposition
            .as_ref()
            .is_some_and(|d| d.is_inline() && d.filename().is_none())
            && content_type.name().is_none()
            && self.body_slot_free(&content_type);

        if !inline_body && is_attachment(&content_type, disposition.as_ref()) {
            self.attachments.push(self.attachment(
                headers,
                &content_type,
                disposition.as_ref(),
                body,
                encoding,
            ));
            return;
        }

        match (content_type.main_type.as_str(), content_type.sub_type.as_str()) {
            ("text", "html") if self.html.is_none() => {
                let html = decode_text(&decode_body(body, encoding), content_type.charset());
                self.html = Some(trim_body(&html));
            }
            ("text", "plain") if self.text.is_none() => {
                let text = decode_text(&decode_body(body, encoding), content_type.charset());
                self.text = Some(trim_body(&text));
            }
            ("text", "plain" | "html") => {
                tracing::debug!(content_type = %content_type.mime_type(), "extra text part ignored");
            }
            _ => tracing::warn!(
                content_type = %content_type.mime_type(),
                "unrecognized part skipped"
            ),
        }
    }

    fn body_slot_free(&self, content_type: &ContentType) -> bool {
        match (content_type.main_type.as_str(), content_type.sub_type.as_str()) {
            ("text", "plain") => self.text.is_none(),
            ("text", "html") => self.html.is_none(),
            _ => false,
        }
    }

    fn attachment(
        &self,
        headers: &Headers,
        content_type: &ContentType,
        disposition: Option<&ContentDisposition>,
        body: &[u8],
        encoding: &str,
    ) -> Attachment {
        let mime_type = content_type.mime_type();
        let filename = disposition
            .and_then(ContentDisposition::filename)
            .or_else(|| content_type.name())
            .map(|name| base_name(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                format!("attachment_{}.{}", self.now, extension_for_mime(&mime_type))
            });
        let content_id = headers
            .get("content-id")
            .map(normalize_id)
            .filter(|id| !id.is_empty());
        let disposition = disposition.map_or_else(
            || {
                if content_id.is_some() { "inline" } else { "attachment" }.to_string()
            },
            |d| decode_header_value(&d.raw),
        );
        let content = decode_body(body, encoding);

        Attachment {
            filename,
            mime_type,
            size: content.len(),
            content,
            content_id,
            disposition,
        }
    }
}

/// Attachment if it carries an `attachment` or `inline` disposition, if it is
/// a binary media type, or if it is a named non-body text resource.
fn is_attachment(content_type: &ContentType, disposition: Option<&ContentDisposition>) -> bool {
    if content_type.is_binary_media() || content_type.mime_type() == "message/rfc822" {
        return true;
    }
    match disposition {
        Some(d) if d.is_attachment() || d.is_inline() => true,
        _ => content_type.is_text()
            && !matches!(content_type.sub_type.as_str(), "plain" | "html")
            && content_type.name().is_some(),
    }
}

fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim().to_string()
}

fn trim_body(text: &str) -> String {
    text.trim_end_matches(['\r', '\n']).to_string()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;
    use crate::encoding::encode_base64;

    const NOW: i64 = 1_700_000_000;

    fn mixed_message() -> String {
        format!(
            concat!(
                "From: \"Alice Example\" <Alice@Example.com>\r\n",
                "To: bob@example.com\r\n",
                "Subject: =?UTF-8?B?UmVwb3J0IMOpdMOp?=\r\n",
                "Date: Tue, 14 Nov 2023 22:13:20 +0000\r\n",
                "Message-ID: <abc123@example.com>\r\n",
                "In-Reply-To: <parent@example.com>\r\n",
                "References: <root@example.com>\r\n <parent@example.com>\r\n",
                "MIME-Version: 1.0\r\n",
                "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
                "\r\n",
                "--outer\r\n",
                "Content-Type: multipart/alternative; boundary=inner\r\n",
                "\r\n",
                "--inner\r\n",
                "Content-Type: text/plain; charset=utf-8\r\n",
                "Content-Transfer-Encoding: quoted-printable\r\n",
                "\r\n",
                "Caf=C3=A9 numbers attached.\r\n",
                "--inner\r\n",
                "Content-Type: text/html; charset=utf-8\r\n",
                "\r\n",
                "<p>Café numbers attached.</p>\r\n",
                "--inner--\r\n",
                "--outer\r\n",
                "Content-Type: application/pdf; name=\"ignored.pdf\"\r\n",
                "Content-Disposition: attachment; filename=\"r.pdf\"\r\n",
                "Content-Transfer-Encoding: base64\r\n",
                "\r\n",
                "{pdf}\r\n",
                "--outer--\r\n"
            ),
            pdf = encode_base64(b"%PDF-1.4 fake")
        )
    }

    #[test]
    fn test_parse_multipart_mixed() {
        let message = parse_at(mixed_message().as_bytes(), NOW).unwrap();

        assert_eq!(message.subject, "Report été");
        assert_eq!(message.from_address, "Alice@Example.com");
        assert_eq!(message.from_name.as_deref(), Some("Alice Example"));
        assert_eq!(message.to, "bob@example.com");
        assert_eq!(message.body, "Café numbers attached.");
        assert_eq!(
            message.body_html.as_deref(),
            Some("<p>Café numbers attached.</p>")
        );
        assert_eq!(message.attachments.len(), 1);

        let pdf = &message.attachments[0];
        assert_eq!(pdf.filename, "r.pdf");
        assert_eq!(pdf.mime_type, "application/pdf");
        assert_eq!(pdf.content, b"%PDF-1.4 fake");
        assert_eq!(pdf.size, 13);
        assert!(!pdf.is_inline());
    }

    #[test]
    fn test_parse_ids_normalized() {
        let message = parse_at(mixed_message().as_bytes(), NOW).unwrap();
        assert_eq!(message.message_id, "abc123@example.com");
        assert_eq!(message.in_reply_to.as_deref(), Some("parent@example.com"));
        assert_eq!(
            message.references,
            vec!["root@example.com".to_string(), "parent@example.com".to_string()]
        );
    }

    #[test]
    fn test_headers_are_lowercase_and_decoded() {
        let message = parse_at(mixed_message().as_bytes(), NOW).unwrap();
        assert_eq!(message.header("subject"), Some("Report été"));
        assert_eq!(
            message.header("references"),
            Some("<root@example.com> <parent@example.com>")
        );
        assert!(message.headers.iter().all(|(name, _)| name == name.to_lowercase()));
    }

    #[test]
    fn test_fallback_message_id_is_deterministic() {
        let raw = concat!(
            "From: Someone <Someone@Example.com>\r\n",
            "Subject: hello\r\n",
            "Date: Mon, 1 Jan 2024 10:00:00 +0000\r\n",
            "\r\n",
            "hi\r\n"
        );
        let first = parse(raw.as_bytes()).unwrap();
        let second = parse(raw.as_bytes()).unwrap();
        assert_eq!(first.message_id, second.message_id);
        assert_eq!(first.message_id.len(), 32);
        assert_eq!(
            first.message_id,
            fallback_message_id(
                "someone@example.com",
                "hello",
                Some("Mon, 1 Jan 2024 10:00:00 +0000")
            )
        );
    }

    #[test]
    fn test_empty_message_id_uses_fallback() {
        let raw = "From: a@b.c\r\nMessage-ID: <>\r\nSubject: s\r\n\r\nx";
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.message_id, fallback_message_id("a@b.c", "s", None));
    }

    #[test]
    fn test_single_part_base64_latin1() {
        let raw = format!(
            "From: a@b.c\r\nContent-Type: text/plain; charset=ISO-8859-1\r\nContent-Transfer-Encoding: base64\r\n\r\n{}\r\n",
            encode_base64(b"caf\xe9")
        );
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.body, "café");
        assert!(message.body_html.is_none());
    }

    #[test]
    fn test_single_part_html_derives_text_body() {
        let raw = "From: a@b.c\r\nContent-Type: text/html\r\n\r\n<p>Hello <b>world</b></p>\r\n";
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.body_html.as_deref(), Some("<p>Hello <b>world</b></p>"));
        assert!(message.body.contains("Hello"));
        assert!(message.body.contains("world"));
        assert!(!message.body.contains("<p>"));
    }

    #[test]
    fn test_single_part_without_content_type_is_text() {
        let raw = "Subject: plain\n\nJust text.\n";
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.body, "Just text.");
    }

    #[test]
    fn test_multipart_without_boundary_is_opaque_body() {
        let raw = "Subject: x\r\nContent-Type: multipart/mixed\r\n\r\nopaque content\r\n";
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.body, "opaque content");
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_unnamed_attachment_gets_synthesized_name() {
        let raw = format!(
            concat!(
                "Subject: x\r\n",
                "Content-Type: multipart/mixed; boundary=b\r\n",
                "\r\n",
                "--b\r\n",
                "Content-Type: image/png\r\n",
                "Content-Transfer-Encoding: base64\r\n",
                "Content-ID: <logo@x>\r\n",
                "\r\n",
                "{}\r\n",
                "--b\r\n",
                "Content-Type: application/x-custom\r\n",
                "\r\n",
                "raw\r\n",
                "--b--\r\n"
            ),
            encode_base64(&[0x89, b'P', b'N', b'G'])
        );
        let message = parse_at(raw.as_bytes(), NOW).unwrap();
        assert_eq!(message.attachments.len(), 2);

        let png = &message.attachments[0];
        assert_eq!(png.filename, "attachment_1700000000.png");
        assert_eq!(png.content_id.as_deref(), Some("logo@x"));
        assert_eq!(png.disposition, "inline");
        assert_eq!(png.content, vec![0x89, b'P', b'N', b'G']);

        assert_eq!(message.attachments[1].filename, "attachment_1700000000.bin");
        assert_eq!(message.attachments[1].disposition, "attachment");
    }

    #[test]
    fn test_inline_text_body_is_not_attachment() {
        let raw = concat!(
            "Subject: x\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: inline\r\n",
            "\r\n",
            "body text\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "file text\r\n",
            "--b--\r\n"
        );
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.body, "body text");
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].filename, "notes.txt");
        assert_eq!(message.attachments[0].content, b"file text");
    }

    #[test]
    fn test_second_inline_text_part_is_kept_as_attachment() {
        let raw = concat!(
            "Subject: x\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "body\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: inline\r\n",
            "\r\n",
            "second inline\r\n",
            "--b--\r\n"
        );
        let message = parse_at(raw.as_bytes(), NOW).unwrap();
        assert_eq!(message.body, "body");
        assert_eq!(message.attachments.len(), 1);

        let extra = &message.attachments[0];
        assert_eq!(extra.filename, "attachment_1700000000.txt");
        assert_eq!(extra.mime_type, "text/plain");
        assert_eq!(extra.content, b"second inline");
        assert_eq!(extra.disposition, "inline");
    }

    #[test]
    fn test_inline_html_after_html_body_is_attachment() {
        let raw = concat!(
            "Subject: x\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/html\r\n",
            "Content-Disposition: inline\r\n",
            "\r\n",
            "<p>one</p>\r\n",
            "--b\r\n",
            "Content-Type: text/html\r\n",
            "Content-Disposition: inline\r\n",
            "\r\n",
            "<p>two</p>\r\n",
            "--b--\r\n"
        );
        let message = parse_at(raw.as_bytes(), NOW).unwrap();
        assert_eq!(message.body_html.as_deref(), Some("<p>one</p>"));
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].filename, "attachment_1700000000.html");
    }

    #[test]
    fn test_first_text_part_wins() {
        let raw = concat!(
            "Subject: x\r\n",
            "Content-Type: multipart/alternative; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "first\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "second\r\n",
            "--b--\r\n"
        );
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.body, "first");
    }

    #[test]
    fn test_encoded_and_path_filename() {
        let raw = concat!(
            "Subject: x\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: application/octet-stream; name=\"=?UTF-8?Q?r=C3=A9sum=C3=A9.doc?=\"\r\n",
            "\r\n",
            "x\r\n",
            "--b\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Content-Disposition: attachment; filename=\"C:\\\\tmp\\\\evil.exe\"\r\n",
            "\r\n",
            "y\r\n",
            "--b--\r\n"
        );
        let message = parse(raw.as_bytes()).unwrap();
        assert_eq!(message.attachments[0].filename, "résumé.doc");
        assert_eq!(message.attachments[1].filename, "evil.exe");
    }

    #[test]
    fn test_embedded_message_is_eml_attachment() {
        let raw = concat!(
            "Subject: fwd\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: message/rfc822\r\n",
            "\r\n",
            "Subject: inner\r\n",
            "\r\n",
            "inner body\r\n",
            "--b--\r\n"
        );
        let message = parse_at(raw.as_bytes(), NOW).unwrap();
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].filename, "attachment_1700000000.eml");
        assert_eq!(message.attachments[0].content, b"Subject: inner\r\n\r\ninner body");
    }

    #[test]
    fn test_no_content_parts() {
        let raw = "Subject: empty\r\nContent-Type: multipart/mixed; boundary=b\r\n\r\n--b--\r\n";
        let message = parse(raw.as_bytes()).unwrap();
        assert!(message.body.is_empty());
        assert!(message.body_html.is_none());
    }

    #[test]
    fn test_rejects_input_without_headers() {
        assert!(matches!(parse(b""), Err(Error::Parse(_))));
        assert!(matches!(parse(b"\r\njust a body"), Err(Error::Parse(_))));
        assert!(matches!(parse(b"no header here at all"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_split_mailbox() {
        assert_eq!(
            split_mailbox("\"Doe, John\" <john@example.com>"),
            (Some("Doe, John".to_string()), "john@example.com".to_string())
        );
        assert_eq!(split_mailbox("<x@y.z>"), (None, "x@y.z".to_string()));
        assert_eq!(split_mailbox(" x@y.z "), (None, "x@y.z".to_string()));
    }
}
