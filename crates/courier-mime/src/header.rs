//! MIME header handling.

use crate::encoding::decode_header_value;

/// Ordered collection of email headers keyed by lowercase name.
///
/// Insertion order is preserved. Repeated names (e.g. `Received`) keep every
/// value; [`Headers::get`] returns the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.entries.push((name, value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of header entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns a copy with every value RFC 2047-decoded.
    #[must_use]
    pub fn decoded(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(n, v)| (n.clone(), decode_header_value(v)))
                .collect(),
        }
    }
}

/// Folds a raw header block into [`Headers`].
///
/// A line starting with a space or tab continues the previous header and is
/// appended with a single space. A `name: value` line starts a new header.
/// Parsing stops at the first empty line; lines that are neither are ignored.
#[must_use]
pub fn fold_headers(block: &str) -> Headers {
    let mut headers = Headers::new();
    let mut current: Option<(String, String)> = None;

    for line in block.lines() {
        if line.is_empty() {
            break;
        }

        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = current.as_mut() {
                let continuation = line.trim();
                if !continuation.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(continuation);
                }
            }
            continue;
        }

        if let Some((name, value)) = current.take() {
            headers.add(name, value);
        }

        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() && !name.contains(char::is_whitespace) {
                current = Some((name.to_string(), value.trim().to_string()));
            }
        }
    }

    if let Some((name, value)) = current {
        headers.add(name, value);
    }

    headers
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_fold_headers() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test\r\n",
            "\tMessage\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = fold_headers(text);
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("from"), Some("sender@example.com"));
        assert_eq!(headers.get("subject"), Some("Test Message"));
        assert_eq!(headers.get("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(headers.get("body"), None);
    }

    #[test]
    fn test_fold_headers_keeps_order_and_duplicates() {
        let text = "Received: a\nReceived: b\nX-Mailer: test\n";
        let headers = fold_headers(text);
        assert_eq!(headers.get("received"), Some("a"));
        let entries: Vec<_> = headers.iter().collect();
        assert_eq!(
            entries,
            vec![("received", "a"), ("received", "b"), ("x-mailer", "test")]
        );
    }

    #[test]
    fn test_fold_headers_ignores_junk_and_orphan_continuation() {
        let text = "  orphan\nnot a header line\nSubject: ok\n";
        let headers = fold_headers(text);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("subject"), Some("ok"));
    }

    #[test]
    fn test_decoded_values() {
        let headers = fold_headers("Subject: =?UTF-8?Q?caf=C3=A9?=\n");
        assert_eq!(headers.decoded().get("subject"), Some("café"));
    }
}
