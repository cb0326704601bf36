//! MIME content type and content disposition handling.

use crate::charset::decode_text;
use crate::encoding::decode_header_value;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns the `type/subtype` essence in lowercase.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present and non-empty.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters
            .get("boundary")
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }

    /// Returns the decoded `name` parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.parameters
            .get("name")
            .map(|n| decode_header_value(n))
            .filter(|n| !n.trim().is_empty())
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Checks whether this type is always treated as a file.
    #[must_use]
    pub fn is_binary_media(&self) -> bool {
        matches!(
            self.main_type.as_str(),
            "application" | "image" | "video" | "audio"
        )
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the `type/subtype` part is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, params) = split_value(s);

        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {s:?}")))?;
        let main_type = main_type.trim().to_lowercase();
        let sub_type = sub_type.trim().to_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!("Empty type in {s:?}")));
        }

        Ok(Self {
            main_type,
            sub_type,
            parameters: params,
        })
    }

    /// Parses a header value, falling back to `text/plain` when absent or
    /// malformed.
    #[must_use]
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| match Self::parse(v) {
                Ok(ct) => Some(ct),
                Err(e) => {
                    tracing::debug!(error = %e, "falling back to text/plain");
                    None
                }
            })
            .unwrap_or_else(|| Self::new("text", "plain"))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        let mut params: Vec<_> = self.parameters.iter().collect();
        params.sort();
        for (key, value) in params {
            // Quote value if it contains special characters
            if value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
                write!(f, "; {key}=\"{value}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

/// Parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type in lowercase ("attachment", "inline", ...).
    pub kind: String,
    /// Parameters (filename, size, ...).
    pub parameters: HashMap<String, String>,
    /// The raw header value.
    pub raw: String,
}

impl ContentDisposition {
    /// Parses a `Content-Disposition` header value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (kind, parameters) = split_value(s);
        Self {
            kind: kind.trim().to_lowercase(),
            parameters,
            raw: s.trim().to_string(),
        }
    }

    /// Returns true for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }

    /// Returns true for `inline`.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.kind == "inline"
    }

    /// Returns the decoded `filename` parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameters
            .get("filename")
            .map(|n| decode_header_value(n))
            .filter(|n| !n.trim().is_empty())
    }
}

/// Splits `value; k=v; k2="v2"` into the leading value and its parameters.
///
/// Parameter names are lowercased. Quoted values may contain `;`. RFC 2231
/// extended parameters (`name*=utf-8''x` and `name*0=...` continuations)
/// are decoded and stored under the plain name.
fn split_value(s: &str) -> (String, HashMap<String, String>) {
    let segments = split_unquoted(s, ';');
    let mut iter = segments.into_iter();
    let head = iter.next().unwrap_or_default().trim().to_string();

    let mut plain = HashMap::new();
    let mut extended: Vec<(String, usize, bool, String)> = Vec::new();

    for segment in iter {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = unquote(value.trim());

        match key.split_once('*') {
            None => {
                plain.insert(key, value);
            }
            Some((base, rest)) => {
                let encoded = rest.ends_with('*') || rest.is_empty();
                let index = rest.trim_end_matches('*').parse::<usize>().unwrap_or(0);
                extended.push((base.to_string(), index, encoded, value));
            }
        }
    }

    extended.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    let mut joined: HashMap<String, (Option<String>, Vec<u8>)> = HashMap::new();
    for (base, index, encoded, value) in extended {
        let entry = joined.entry(base).or_insert((None, Vec::new()));
        if encoded {
            let payload = if index == 0 {
                // charset'language'percent-encoded
                let mut pieces = value.splitn(3, '\'');
                let charset = pieces.next().unwrap_or_default();
                let _language = pieces.next();
                entry.0 = Some(charset.to_string()).filter(|c| !c.is_empty());
                pieces.next().unwrap_or_default().to_string()
            } else {
                value
            };
            entry.1.extend(percent_decode(&payload));
        } else {
            entry.1.extend_from_slice(value.as_bytes());
        }
    }
    for (base, (charset, bytes)) in joined {
        plain.insert(base, decode_text(&bytes, charset.as_deref()));
    }

    (head, plain)
}

fn split_unquoted(s: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c == separator && !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_string(),
    }
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = s.get(i + 1..i + 3)
            && let Ok(b) = u8::from_str_radix(hex, 16)
        {
            out.push(b);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_new() {
        let ct = ContentType::new("text", "plain");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_text_plain() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.mime_type(), "text/plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_parse_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part;123\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("----=_Part;123"));
    }

    #[test]
    fn test_content_type_parse_errors() {
        assert!(ContentType::parse("").is_err());
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("text/").is_err());
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(ContentType::parse_or_default(None).mime_type(), "text/plain");
        assert_eq!(
            ContentType::parse_or_default(Some("garbage")).mime_type(),
            "text/plain"
        );
        assert_eq!(
            ContentType::parse_or_default(Some("image/png")).mime_type(),
            "image/png"
        );
    }

    #[test]
    fn test_empty_boundary_is_none() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"\"").unwrap();
        assert_eq!(ct.boundary(), None);
    }

    #[test]
    fn test_encoded_name_parameter() {
        let ct = ContentType::parse("application/pdf; name=\"=?UTF-8?Q?r=C3=A9sum=C3=A9.pdf?=\"")
            .unwrap();
        assert_eq!(ct.name().as_deref(), Some("résumé.pdf"));
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_disposition_attachment() {
        let cd = ContentDisposition::parse("Attachment; filename=\"r.pdf\"; size=42");
        assert!(cd.is_attachment());
        assert!(!cd.is_inline());
        assert_eq!(cd.filename().as_deref(), Some("r.pdf"));
        assert_eq!(cd.parameters.get("size").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_disposition_rfc2231_filename() {
        let cd = ContentDisposition::parse("attachment; filename*=UTF-8''na%C3%AFve%20plan.txt");
        assert_eq!(cd.filename().as_deref(), Some("naïve plan.txt"));
    }

    #[test]
    fn test_disposition_rfc2231_continuations() {
        let cd = ContentDisposition::parse(
            "attachment; filename*0*=UTF-8''long%20; filename*1=\"name.txt\"",
        );
        assert_eq!(cd.filename().as_deref(), Some("long name.txt"));
    }

    #[test]
    fn test_disposition_without_filename() {
        let cd = ContentDisposition::parse("inline");
        assert!(cd.is_inline());
        assert_eq!(cd.filename(), None);
        assert_eq!(cd.raw, "inline");
    }
}
