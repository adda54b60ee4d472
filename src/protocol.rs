//! Text protocol parser and reply lines.
//!
//! A request is a single newline-delimited line: `<VERB>[ <ARGUMENT>]\n`.
//! Verbs are matched case-insensitively; the argument (a filename for
//! GET/PUT) is everything after the first space, taken verbatim up to the
//! line terminator.

use bytes::BytesMut;

/// Capacity of the transfer buffer, used both for the request line and for
/// shuttling file data in either direction.
pub const BUFFER_LEN: usize = 100;

/// Greeting sent to every client immediately after accept.
pub const GREETING: &[u8] = b"HELLO\n";

/// Protocol reply lines. Always newline-terminated, never suppressed.
pub mod status {
    pub const OK: &[u8] = b"SERVER 200 OK\n";
    pub const CREATED: &[u8] = b"SERVER 201 Created\n";
    pub const NOT_FOUND: &[u8] = b"SERVER 404 Not Found\n";
    pub const GET_ERROR: &[u8] = b"SERVER 500 Get Error\n";
    pub const PUT_ERROR: &[u8] = b"SERVER 501 Put Error\n";
    pub const COMMAND_ERROR: &[u8] = b"SERVER 502 Command Error\n";
}

/// Recognized command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Put,
    Bye,
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub verb: Verb,
    /// Bytes after the first space, trailing newline stripped. `None` when
    /// the line contains no space at all.
    pub argument: Option<&'a [u8]>,
}

/// Protocol parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The verb token never ends within the received bytes.
    MalformedRequest,
    /// The verb is none of GET, PUT, BYE.
    UnknownVerb,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MalformedRequest => write!(f, "malformed request line"),
            ParseError::UnknownVerb => write!(f, "unknown command verb"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a request line from the bytes received on a connection.
///
/// The input is whatever one receive returned: not necessarily a complete
/// line. A verb token that never ends (no space or newline anywhere in the
/// input, including an empty input) is a [`ParseError::MalformedRequest`]
/// rather than being scanned past the received bytes.
pub fn parse(buffer: &[u8]) -> Result<Request<'_>, ParseError> {
    let verb_end = buffer
        .iter()
        .position(|&b| b == b' ' || b == b'\n')
        .ok_or(ParseError::MalformedRequest)?;

    let token = &buffer[..verb_end];
    let verb = if token.eq_ignore_ascii_case(b"get") {
        Verb::Get
    } else if token.eq_ignore_ascii_case(b"put") {
        Verb::Put
    } else if token.eq_ignore_ascii_case(b"bye") {
        Verb::Bye
    } else {
        return Err(ParseError::UnknownVerb);
    };

    // The argument is not case-folded and not trimmed beyond the newline.
    let argument = buffer.iter().position(|&b| b == b' ').map(|space| {
        let arg = &buffer[space + 1..];
        match arg.iter().position(|&b| b == b'\n') {
            Some(nl) => &arg[..nl],
            None => arg,
        }
    });

    Ok(Request { verb, argument })
}

/// Detects the end of a PUT body.
///
/// A received chunk counts as "empty" when it is at most two bytes long and
/// its first byte is a newline; two consecutive empty chunks terminate the
/// body. This is deliberately a heuristic over chunk boundaries, not a line
/// scan, for wire compatibility.
///
/// Terminator chunks are not part of the body, but a single empty chunk
/// followed by data is. The detector therefore holds an empty chunk back
/// and releases it only once the next chunk proves it was body data.
#[derive(Debug, Default)]
pub struct TerminatorDetector {
    held: Option<([u8; 2], usize)>,
}

impl TerminatorDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received chunk. Bytes that are known to belong to the body
    /// are appended to `body`; returns `true` once the terminator is
    /// complete.
    pub fn feed(&mut self, chunk: &[u8], body: &mut BytesMut) -> bool {
        if is_empty_chunk(chunk) {
            if self.held.is_some() {
                self.held = None;
                return true;
            }
            let mut held = [0u8; 2];
            held[..chunk.len()].copy_from_slice(chunk);
            self.held = Some((held, chunk.len()));
        } else {
            if let Some((held, len)) = self.held.take() {
                body.extend_from_slice(&held[..len]);
            }
            body.extend_from_slice(chunk);
        }
        false
    }
}

fn is_empty_chunk(chunk: &[u8]) -> bool {
    chunk.len() <= 2 && chunk.first() == Some(&b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(buffer: &[u8]) -> Option<&[u8]> {
        parse(buffer).unwrap().argument
    }

    #[test]
    fn test_parse_get() {
        let request = parse(b"GET hello.txt\n").unwrap();
        assert_eq!(request.verb, Verb::Get);
        assert_eq!(request.argument, Some(&b"hello.txt"[..]));
    }

    #[test]
    fn test_parse_put() {
        let request = parse(b"PUT out.bin\n").unwrap();
        assert_eq!(request.verb, Verb::Put);
        assert_eq!(request.argument, Some(&b"out.bin"[..]));
    }

    #[test]
    fn test_parse_bye() {
        assert_eq!(parse(b"BYE\n").unwrap().verb, Verb::Bye);
    }

    #[test]
    fn test_verb_is_case_insensitive() {
        for line in [&b"get f\n"[..], b"Get f\n", b"GET f\n", b"gEt f\n"] {
            assert_eq!(parse(line).unwrap().verb, Verb::Get);
        }
        assert_eq!(parse(b"bye\n").unwrap().verb, Verb::Bye);
    }

    #[test]
    fn test_argument_is_not_case_folded() {
        assert_eq!(arg(b"get MixedCase.TXT\n"), Some(&b"MixedCase.TXT"[..]));
    }

    #[test]
    fn test_argument_taken_verbatim() {
        // Inner spaces belong to the filename; only the newline is stripped.
        assert_eq!(arg(b"GET my file.txt\n"), Some(&b"my file.txt"[..]));
        // No trailing newline in the chunk is fine too.
        assert_eq!(arg(b"GET partial"), Some(&b"partial"[..]));
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(arg(b"GET\n"), None);
        assert_eq!(arg(b"PUT\n"), None);
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(parse(b"DELETE foo\n"), Err(ParseError::UnknownVerb));
        assert_eq!(parse(b"GETX foo\n"), Err(ParseError::UnknownVerb));
        assert_eq!(parse(b" GET foo\n"), Err(ParseError::UnknownVerb));
    }

    #[test]
    fn test_unterminated_verb_is_malformed() {
        assert_eq!(parse(b""), Err(ParseError::MalformedRequest));
        assert_eq!(parse(b"GET"), Err(ParseError::MalformedRequest));
        let long = [b'a'; BUFFER_LEN];
        assert_eq!(parse(&long), Err(ParseError::MalformedRequest));
    }

    fn feed_all(chunks: &[&[u8]]) -> (Vec<u8>, bool) {
        let mut detector = TerminatorDetector::new();
        let mut body = BytesMut::new();
        let mut done = false;
        for chunk in chunks {
            if detector.feed(chunk, &mut body) {
                done = true;
                break;
            }
        }
        (body.to_vec(), done)
    }

    #[test]
    fn test_terminator_two_empty_chunks() {
        let (body, done) = feed_all(&[b"hello ", b"world\n", b"\n", b"\n"]);
        assert!(done);
        assert_eq!(body, b"hello world\n");
    }

    #[test]
    fn test_terminator_crlf_style_chunks() {
        // Chunks of two bytes starting with a newline still count as empty.
        let (body, done) = feed_all(&[b"data\n", b"\n\n", b"\n\n"]);
        assert!(done);
        assert_eq!(body, b"data\n");
    }

    #[test]
    fn test_single_empty_chunk_is_body_data() {
        let (body, done) = feed_all(&[b"abc", b"\n", b"def", b"\n", b"\n"]);
        assert!(done);
        assert_eq!(body, b"abc\ndef");
    }

    #[test]
    fn test_three_newlines_in_one_chunk_is_not_empty() {
        // Longer than two bytes, so it is body data, not a terminator half.
        let (body, done) = feed_all(&[b"\n\n\n", b"\n", b"\n"]);
        assert!(done);
        assert_eq!(body, b"\n\n\n");
    }

    #[test]
    fn test_no_terminator_without_two_in_a_row() {
        let (body, done) = feed_all(&[b"a", b"\n", b"b", b"\n", b"c"]);
        assert!(!done);
        assert_eq!(body, b"a\nb\nc");
    }
}
