//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header encoding and the
//! transfer-encoding dispatch used when decoding message bodies.

use crate::charset::decode_text;
use crate::error::Result;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use std::fmt;
use std::fmt::Write as _;

/// Decoder that accepts input with or without trailing padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Minimum compacted length before an unlabelled body is considered Base64.
const BASE64_SNIFF_MIN_LEN: usize = 50;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, ignoring embedded whitespace and missing padding.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Maximum line length for Quoted-Printable encoding.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Encodes bytes that are not printable ASCII or would interfere
/// with email transmission.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::new();
    let mut line_length = 0;

    for byte in text.as_bytes() {
        if line_length >= MAX_LINE_LENGTH - 3 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        match byte {
            b'!'..=b'<' | b'>'..=b'~' => {
                result.push(char::from(*byte));
                line_length += 1;
            }
            b' ' => {
                if line_length >= MAX_LINE_LENGTH - 1 {
                    result.push_str("=20");
                    line_length += 3;
                } else {
                    result.push(' ');
                    line_length += 1;
                }
            }
            _ => {
                result.push('=');
                let _ = write!(result, "{byte:02X}");
                line_length += 3;
            }
        }
    }

    result
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. Malformed escapes are kept literally,
/// so decoding never fails.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        match (data.get(i + 1), data.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(&hi), Some(&lo)) => match (hex_value(hi), hex_value(lo)) {
                (Some(hi), Some(lo)) => {
                    result.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    result.push(b'=');
                    i += 1;
                }
            },
            // Trailing "=" at end of input is a soft break without newline
            (None, _) => i += 1,
            (Some(_), None) => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Longest encoded-word allowed by RFC 2047.
const MAX_ENCODED_WORD_LEN: usize = 75;

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?B?encoded-text?=`. Plain ASCII values are returned
/// unchanged. Long values become several encoded-words of at most 75
/// characters, folded with CRLF and a space. Splits fall on spaces where
/// possible, with the space itself becoming the fold.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) && !text.contains("=?") {
        return text.to_string();
    }

    // "=?" charset "?B?" payload "?=", payload in whole base64 quanta
    let budget = (MAX_ENCODED_WORD_LEN.saturating_sub(charset.len() + 7) / 4 * 3).max(4);
    encoded_word_chunks(text, budget)
        .into_iter()
        .map(|chunk| format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Splits `text` into runs of at most `budget` bytes on char boundaries.
fn encoded_word_chunks(text: &str, budget: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut last_space = None;

    for (i, c) in text.char_indices() {
        let end = i + c.len_utf8();
        if end - start > budget {
            if let Some(space) = last_space.filter(|&space| space > start) {
                chunks.push(&text[start..space]);
                start = space + 1;
            }
            if end - start > budget && i > start {
                chunks.push(&text[start..i]);
                start = i;
            }
            last_space = None;
        }
        if c == ' ' {
            last_space = Some(i);
        }
    }
    chunks.push(&text[start..]);
    chunks
}

/// Decodes every RFC 2047 encoded-word found in a header value.
///
/// Decoded runs are spliced back at their original offsets and literal text
/// between them is preserved verbatim. Values without a decodable
/// encoded-word are returned unchanged.
#[must_use]
pub fn decode_header_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut decoded_any = false;

    while let Some(start) = rest.find("=?") {
        if let Some((decoded, consumed)) = decode_encoded_word(&rest[start..]) {
            out.push_str(&rest[..start]);
            out.push_str(&decoded);
            rest = &rest[start + consumed..];
            decoded_any = true;
        } else {
            out.push_str(&rest[..start + 2]);
            rest = &rest[start + 2..];
        }
    }

    if !decoded_any {
        return raw.to_string();
    }
    out.push_str(rest);
    out
}

/// Decodes one encoded-word at the start of `input`.
///
/// Returns the decoded text and the number of bytes consumed.
fn decode_encoded_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let charset_end = body.find('?')?;
    let charset = &body[..charset_end];
    let after_charset = &body[charset_end + 1..];

    let mut enc_chars = after_charset.chars();
    let encoding = enc_chars.next()?.to_ascii_uppercase();
    if !encoding.is_ascii() || enc_chars.next()? != '?' {
        return None;
    }
    let payload_area = &after_charset[2..];
    let payload_end = payload_area.find("?=")?;
    let payload = &payload_area[..payload_end];
    if charset.is_empty() || payload.contains(char::is_whitespace) {
        return None;
    }

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        'B' => decode_base64(payload).ok()?,
        'Q' => decode_quoted_printable(payload.replace('_', " ").as_bytes()),
        _ => return None,
    };

    let consumed = 2 + charset_end + 1 + 2 + payload_end + 2;
    Some((decode_text(&bytes, Some(charset)), consumed))
}

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// No `Content-Transfer-Encoding` was declared.
    Unspecified,
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "" => Self::Unspecified,
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => Ok(()),
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Decodes a body according to its declared transfer encoding.
///
/// When no encoding is declared the body is sniffed: text that matches the
/// Base64 alphabet, has a length that is a multiple of 4 and is longer than
/// 50 characters is decoded, but only if the result is valid UTF-8. This
/// can misfire on plain text that happens to look like Base64.
#[must_use]
pub fn decode_body(raw: &[u8], transfer_encoding: &str) -> Vec<u8> {
    match TransferEncoding::parse(transfer_encoding) {
        TransferEncoding::Base64 => match decode_base64(&String::from_utf8_lossy(raw)) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "invalid base64 body, keeping raw bytes");
                raw.to_vec()
            }
        },
        TransferEncoding::QuotedPrintable => decode_quoted_printable(raw),
        TransferEncoding::Unspecified => sniff_base64(raw).unwrap_or_else(|| raw.to_vec()),
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            raw.to_vec()
        }
    }
}

fn sniff_base64(raw: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if compact.len() <= BASE64_SNIFF_MIN_LEN || compact.len() % 4 != 0 {
        return None;
    }

    let data_len = compact.len() - compact.iter().rev().take_while(|&&b| b == b'=').count();
    if compact.len() - data_len > 2
        || !compact[..data_len]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
    {
        return None;
    }

    let decoded = STANDARD.decode(&compact).ok()?;
    std::str::from_utf8(&decoded).ok()?;
    Some(decoded)
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_decode_wrapped_and_unpadded() {
        assert_eq!(decode_base64("SGVs\r\nbG8").unwrap(), b"Hello");
    }

    #[test]
    fn test_quoted_printable_encode() {
        let text = "Hello, World!";
        let encoded = encode_quoted_printable(text);
        assert_eq!(encoded, "Hello, World!");

        let text = "Héllo, Wørld!";
        let encoded = encode_quoted_printable(text);
        assert!(encoded.contains("=C3"));
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_malformed_escape_kept() {
        assert_eq!(decode_quoted_printable(b"a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable(b"x=4"), b"x=4");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");

        let encoded = encode_rfc2047("Héllo", "utf-8");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_header_value(&encoded), "Héllo");
    }

    #[test]
    fn test_rfc2047_long_value_is_split_and_folded() {
        let subject = "Crème brûlée et café au lait pour tout le monde ".repeat(4);
        let subject = subject.trim_end();
        let encoded = encode_rfc2047(subject, "UTF-8");

        let words: Vec<_> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|word| word.len() <= MAX_ENCODED_WORD_LEN));
        assert!(words.iter().all(|word| word.starts_with("=?UTF-8?B?") && word.ends_with("?=")));

        // Unfolding turns each fold back into the space it replaced.
        assert_eq!(decode_header_value(&encoded.replace("\r\n ", " ")), subject);
    }

    #[test]
    fn test_rfc2047_unspaced_text_splits_on_char_boundaries() {
        let subject = "日本語のお知らせ".repeat(6);
        let encoded = encode_rfc2047(&subject, "UTF-8");

        let words: Vec<_> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|word| word.len() <= MAX_ENCODED_WORD_LEN));
        let joined: String = words.iter().map(|word| decode_header_value(word)).collect();
        assert_eq!(joined, subject);
    }

    #[test]
    fn test_decode_header_base64_word() {
        let raw = format!("=?UTF-8?B?{}?=", encode_base64("héllo".as_bytes()));
        assert_eq!(decode_header_value(&raw), "héllo");
    }

    #[test]
    fn test_decode_header_q_word_lowercase_letter() {
        assert_eq!(decode_header_value("=?utf-8?q?H=C3=A9llo_there?="), "Héllo there");
    }

    #[test]
    fn test_decode_header_splices_literal_text() {
        let raw = "Re: =?UTF-8?B?w6l0w6k=?= and =?ISO-8859-1?Q?caf=E9?= !";
        assert_eq!(decode_header_value(raw), "Re: été and café !");
    }

    #[test]
    fn test_decode_header_adjacent_words_keep_separator() {
        let raw = "=?UTF-8?Q?a?= =?UTF-8?Q?b?=";
        assert_eq!(decode_header_value(raw), "a b");
    }

    #[test]
    fn test_decode_header_passthrough() {
        assert_eq!(decode_header_value("Plain subject"), "Plain subject");
        assert_eq!(decode_header_value("odd =? marker"), "odd =? marker");
        assert_eq!(decode_header_value("=?UTF-8?X?abc?="), "=?UTF-8?X?abc?=");
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::parse(""), TransferEncoding::Unspecified);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_decode_body_sniffs_unlabelled_base64() {
        let text = "This body was base64 encoded by a sender that forgot the header.";
        let encoded = encode_base64(text.as_bytes());
        assert!(encoded.len() > 50);
        assert_eq!(decode_body(encoded.as_bytes(), ""), text.as_bytes());
    }

    #[test]
    fn test_decode_body_sniff_ignores_short_or_binary() {
        assert_eq!(decode_body(b"SGVsbG8=", ""), b"SGVsbG8=");

        let binary = encode_base64(&[0xff_u8; 60]);
        assert_eq!(decode_body(binary.as_bytes(), ""), binary.as_bytes());
    }

    #[test]
    fn test_decode_body_sniff_ignores_prose() {
        let prose = b"Hello there, this is a normal message body with spaces and punctuation.";
        assert_eq!(decode_body(prose, ""), prose);
    }

    #[test]
    fn test_decode_body_invalid_base64_keeps_raw() {
        assert_eq!(decode_body(b"@@@@", "base64"), b"@@@@");
    }

    #[test]
    fn test_decode_body_seven_bit_passthrough() {
        assert_eq!(decode_body(b"abc=41", "7bit"), b"abc=41");
    }

    proptest! {
        #[test]
        fn base64_body_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = encode_base64(&data);
            prop_assert_eq!(decode_body(encoded.as_bytes(), "base64"), data);
        }

        #[test]
        fn quoted_printable_body_round_trip(text in "[a-zA-Z0-9 =éøü€\\r\\n.,?_-]{0,300}") {
            let encoded = encode_quoted_printable(&text);
            prop_assert_eq!(decode_body(encoded.as_bytes(), "quoted-printable"), text.into_bytes());
        }
    }
}
