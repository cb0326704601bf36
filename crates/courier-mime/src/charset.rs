//! Conversion of declared MIME charsets to UTF-8 text.
//!
//! Covers the single-byte Western charsets that show up in practice next to
//! UTF-8. Anything else is decoded as lossy UTF-8.

/// Character set declared by a `charset=` parameter or an encoded-word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// UTF-8.
    Utf8,
    /// US-ASCII.
    Ascii,
    /// ISO-8859-1 (Latin-1).
    Latin1,
    /// ISO-8859-15 (Latin-9).
    Latin9,
    /// Windows-1252.
    Windows1252,
    /// Unrecognized label.
    Unknown,
}

impl Charset {
    /// Resolves a charset label (case-insensitive, common aliases accepted).
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Self::Utf8,
            "us-ascii" | "ascii" | "ansi_x3.4-1968" => Self::Ascii,
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Self::Latin1,
            "iso-8859-15" | "iso8859-15" | "latin9" | "latin-9" => Self::Latin9,
            "windows-1252" | "cp1252" | "x-cp1252" => Self::Windows1252,
            _ => Self::Unknown,
        }
    }

    /// Decodes bytes in this charset to a UTF-8 string.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Latin9 => bytes.iter().map(|&b| latin9_char(b)).collect(),
            Self::Windows1252 => bytes.iter().map(|&b| windows1252_char(b)).collect(),
            // Mislabelled 8-bit text is common under us-ascii; Latin-1 is the usual culprit.
            Self::Ascii => match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
            },
            Self::Utf8 | Self::Unknown => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Decodes `bytes` according to an optional charset label.
///
/// A missing label is treated as UTF-8.
#[must_use]
pub fn decode_text(bytes: &[u8], label: Option<&str>) -> String {
    label
        .map_or(Charset::Utf8, Charset::from_label)
        .decode(bytes)
}

fn latin9_char(b: u8) -> char {
    match b {
        0xA4 => '\u{20AC}',
        0xA6 => '\u{0160}',
        0xA8 => '\u{0161}',
        0xB4 => '\u{017D}',
        0xB8 => '\u{017E}',
        0xBC => '\u{0152}',
        0xBD => '\u{0153}',
        0xBE => '\u{0178}',
        _ => char::from(b),
    }
}

fn windows1252_char(b: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}',
        '\u{017D}', '\u{008F}', '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}',
        '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}',
        '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
    ];
    if (0x80..=0x9F).contains(&b) {
        HIGH[usize::from(b - 0x80)]
    } else {
        char::from(b)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_aliases() {
        assert_eq!(Charset::from_label("UTF-8"), Charset::Utf8);
        assert_eq!(Charset::from_label("\"utf8\""), Charset::Utf8);
        assert_eq!(Charset::from_label("ISO-8859-1"), Charset::Latin1);
        assert_eq!(Charset::from_label("cp1252"), Charset::Windows1252);
        assert_eq!(Charset::from_label("koi8-r"), Charset::Unknown);
    }

    #[test]
    fn test_latin1_decode() {
        assert_eq!(Charset::Latin1.decode(b"h\xe9llo"), "héllo");
    }

    #[test]
    fn test_windows1252_smart_quotes() {
        assert_eq!(
            Charset::Windows1252.decode(b"\x93quoted\x94 \x80"),
            "\u{201C}quoted\u{201D} €"
        );
    }

    #[test]
    fn test_latin9_euro() {
        assert_eq!(Charset::Latin9.decode(b"\xa4"), "€");
    }

    #[test]
    fn test_ascii_with_stray_high_bytes() {
        assert_eq!(Charset::Ascii.decode(b"caf\xe9"), "café");
        assert_eq!(Charset::Ascii.decode(b"plain"), "plain");
    }

    #[test]
    fn test_decode_text_defaults_to_utf8() {
        assert_eq!(decode_text("héllo".as_bytes(), None), "héllo");
    }
}
