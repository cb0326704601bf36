//! Header/body and multipart boundary splitting.
//!
//! Works on raw bytes so that 8-bit and binary parts survive untouched.

/// Splits a raw message or part at the first blank line.
///
/// Returns `(header_block, body)`. Input without a blank line is all
/// headers. Input starting with a blank line has no headers.
#[must_use]
pub fn split_message(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = raw.strip_prefix(b"\r\n") {
        return (&[], body);
    }
    if let Some(body) = raw.strip_prefix(b"\n") {
        return (&[], body);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i, i + 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((head_end, body_start)) => (&raw[..head_end], &raw[body_start..]),
        None => (raw, &[]),
    }
}

/// Splits a multipart body on `--boundary` delimiter lines.
///
/// The preamble, the closing `--boundary--` and anything after it are
/// dropped, as are parts that contain only whitespace. Each returned part
/// still holds its own header block and body. A body without a closing
/// delimiter keeps its last part.
#[must_use]
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (line_end + 1).min(body.len());
        let line = &body[pos..line_end];

        if let Some(rest) = line.strip_prefix(delimiter) {
            let (closing, tail) = match rest.strip_prefix(b"--") {
                Some(tail) => (true, tail),
                None => (false, rest),
            };
            if tail.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = part_start.take() {
                    parts.push(strip_trailing_newline(&body[start..pos]));
                }
                if closing {
                    break;
                }
                part_start = Some(next);
            }
        }

        pos = next;
    }

    if let Some(start) = part_start {
        parts.push(&body[start..]);
    }

    parts
        .into_iter()
        .filter(|part| !part.iter().all(u8::is_ascii_whitespace))
        .collect()
}

fn strip_trailing_newline(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_message_crlf() {
        let (head, body) = split_message(b"Subject: x\r\nFrom: y\r\n\r\nbody\r\n\r\nmore");
        assert_eq!(head, b"Subject: x\r\nFrom: y");
        assert_eq!(body, b"body\r\n\r\nmore");
    }

    #[test]
    fn test_split_message_lf() {
        let (head, body) = split_message(b"Subject: x\n\nbody");
        assert_eq!(head, b"Subject: x");
        assert_eq!(body, b"body");
    }

    #[test]
    fn test_split_message_no_headers() {
        let (head, body) = split_message(b"\r\nonly body");
        assert!(head.is_empty());
        assert_eq!(body, b"only body");
    }

    #[test]
    fn test_split_message_no_body() {
        let (head, body) = split_message(b"Subject: x\r\n");
        assert_eq!(head, b"Subject: x\r\n");
        assert!(body.is_empty());
    }

    #[test]
    fn test_split_multipart() {
        let body = concat!(
            "This is the preamble.\r\n",
            "--abc\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "first\r\n",
            "--abc\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>second</p>\r\n",
            "--abc--\r\n",
            "epilogue\r\n"
        );
        let parts = split_multipart(body.as_bytes(), "abc");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], b"Content-Type: text/plain\r\n\r\nfirst");
        assert_eq!(parts[1], b"Content-Type: text/html\r\n\r\n<p>second</p>");
    }

    #[test]
    fn test_split_multipart_skips_empty_parts() {
        let body = "--b\r\n\r\n--b\r\nX: 1\r\n\r\nkept\r\n--b--\r\n";
        let parts = split_multipart(body.as_bytes(), "b");
        assert_eq!(parts, vec![b"X: 1\r\n\r\nkept".as_slice()]);
    }

    #[test]
    fn test_split_multipart_ignores_longer_boundary_prefix() {
        let body = "--b\nA: 1\n\n--bb not a delimiter\n--b--\n";
        let parts = split_multipart(body.as_bytes(), "b");
        assert_eq!(parts, vec![b"A: 1\n\n--bb not a delimiter".as_slice()]);
    }

    #[test]
    fn test_split_multipart_unterminated() {
        let body = "--b\nA: 1\n\ntail";
        let parts = split_multipart(body.as_bytes(), "b");
        assert_eq!(parts, vec![b"A: 1\n\ntail".as_slice()]);
    }

    #[test]
    fn test_split_multipart_missing_delimiters() {
        assert!(split_multipart(b"no delimiters here", "b").is_empty());
    }
}
