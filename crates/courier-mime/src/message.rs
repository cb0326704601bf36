//! Parsed message structure.

use crate::error::Result;
use crate::header::Headers;

/// A received message reconstructed from its raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Headers keyed by lowercase name, folded and RFC 2047-decoded.
    pub headers: Headers,
    /// Decoded `Subject` (empty if absent).
    pub subject: String,
    /// Decoded `From` header as written.
    pub from: String,
    /// Bare sender address from `From`.
    pub from_address: String,
    /// Sender display name from `From`, if any.
    pub from_name: Option<String>,
    /// Decoded `To` header as written.
    pub to: String,
    /// Raw `Date` header.
    pub date: Option<String>,
    /// Plain-text body.
    pub body: String,
    /// HTML body, if the message had one.
    pub body_html: Option<String>,
    /// Attachments and inline resources in message order.
    pub attachments: Vec<Attachment>,
    /// Message-ID without angle brackets, or the derived dedup key.
    pub message_id: String,
    /// `In-Reply-To` id without angle brackets.
    pub in_reply_to: Option<String>,
    /// `References` ids without angle brackets.
    pub references: Vec<String>,
}

impl Message {
    /// Parses a raw message. See [`crate::parser::parse`].
    ///
    /// # Errors
    ///
    /// Returns an error if the input has no header block at all.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        crate::parser::parse(raw)
    }

    /// Returns true if the message carries attachments.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Looks up a header by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

/// A file carried by a message part.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attachment {
    /// Decoded file name; synthesized when the part did not name itself.
    pub filename: String,
    /// MIME type (e.g. "application/pdf").
    pub mime_type: String,
    /// Decoded content.
    pub content: Vec<u8>,
    /// Size of `content` in bytes.
    pub size: usize,
    /// `Content-ID` without angle brackets, for inline references.
    pub content_id: Option<String>,
    /// `Content-Disposition` header value.
    pub disposition: String,
}

impl Attachment {
    /// Returns true if the part is meant to be shown inline.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition
            .split(';')
            .next()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("inline"))
    }
}

/// Returns the usual file extension for a MIME type, `bin` if unknown.
#[must_use]
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "application/pdf" => "pdf",
        "application/zip" | "application/x-zip-compressed" => "zip",
        "application/gzip" | "application/x-gzip" => "gz",
        "application/x-tar" => "tar",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/rtf" | "text/rtf" => "rtf",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tif",
        "image/svg+xml" => "svg",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        "text/calendar" => "ics",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "video/mp4" => "mp4",
        "video/mpeg" => "mpeg",
        "video/quicktime" => "mov",
        "message/rfc822" => "eml",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(extension_for_mime("application/pdf"), "pdf");
        assert_eq!(extension_for_mime("IMAGE/JPEG"), "jpg");
        assert_eq!(extension_for_mime("message/rfc822"), "eml");
        assert_eq!(extension_for_mime("application/x-unknown"), "bin");
    }

    #[test]
    fn test_attachment_is_inline() {
        let attachment = Attachment {
            filename: "logo.png".into(),
            mime_type: "image/png".into(),
            content: vec![1, 2, 3],
            size: 3,
            content_id: Some("logo@x".into()),
            disposition: "Inline; filename=logo.png".into(),
        };
        assert!(attachment.is_inline());
    }

    #[test]
    fn test_message_default_has_no_attachments() {
        let message = Message::default();
        assert!(!message.has_attachments());
        assert_eq!(message.header("subject"), None);
    }
}
