//! Line-based codec for tokio.
//!
//! Reads LF-terminated lines (a preceding CR is stripped) and writes
//! CRLF-terminated lines capped at the IRC payload limit.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::decode::TextDecoder;

/// Usable bytes of an outgoing line; CRLF brings it to the 512 byte cap.
pub const MAX_LINE_BYTES: usize = 500;

/// Default bound for buffered input without a newline.
pub const DEFAULT_MAX_INPUT: usize = 8 * 1024;

/// Codec turning a byte stream into decoded text lines and back.
#[derive(Debug, Clone)]
pub struct LineCodec {
    decoder: TextDecoder,
    /// Index of the next byte to check for a newline.
    next_index: usize,
    /// Maximum number of buffered bytes without a newline.
    max_input: usize,
}

impl LineCodec {
    pub fn new(decoder: TextDecoder) -> Self {
        Self {
            decoder,
            next_index: 0,
            max_input: DEFAULT_MAX_INPUT,
        }
    }

    /// Overrides the input buffering bound.
    pub fn with_max_input(mut self, max_input: usize) -> Self {
        self.max_input = max_input;
        self
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_input {
                    warn!(
                        buffered = src.len(),
                        limit = self.max_input,
                        "Discarding oversized input without line terminator"
                    );
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let mut line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.is_empty() {
                continue;
            }
            return Ok(Some(self.decoder.decode(&line)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                // An unterminated tail at EOF is dropped.
                src.clear();
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> io::Result<()> {
        let line = sanitize(&line);
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// Keeps only the first line of `text` and caps it at [`MAX_LINE_BYTES`]
/// without splitting a character.
pub fn sanitize(text: &str) -> &str {
    let first = text.split(['\r', '\n']).next().unwrap_or_default();
    if first.len() <= MAX_LINE_BYTES {
        return first;
    }
    let mut end = MAX_LINE_BYTES;
    while !first.is_char_boundary(end) {
        end -= 1;
    }
    &first[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> LineCodec {
        LineCodec::new(TextDecoder::default())
    }

    #[test]
    fn test_decode_crlf_and_lf() {
        let mut codec = codec();
        let mut buf = BytesMut::from("PING :a\r\nPING :b\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :a"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :b"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_partial_line_resumes() {
        let mut codec = codec();
        let mut buf = BytesMut::from("PRIVMSG #c :hel");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"lo\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PRIVMSG #c :hello")
        );
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut codec = codec();
        let mut buf = BytesMut::from("\r\n\r\nQUIT\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("QUIT"));
    }

    #[test]
    fn test_oversized_input_discarded() {
        let mut codec = codec().with_max_input(16);
        let mut buf = BytesMut::from(&[b'x'; 32][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unterminated_tail_dropped_at_eof() {
        let mut codec = codec();
        let mut buf = BytesMut::from("PING :x\r\ntrailing");
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("PING :x"));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = codec();
        let mut buf = BytesMut::new();
        codec.encode("PONG :x".to_owned(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :x\r\n");
    }

    #[test]
    fn test_sanitize_embedded_newline() {
        assert_eq!(sanitize("a\nb"), "a");
        assert_eq!(sanitize("a\r\nb"), "a");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = "x".repeat(600);
        assert_eq!(sanitize(&long).len(), MAX_LINE_BYTES);

        let tricky = format!("{}é", "a".repeat(499));
        assert_eq!(sanitize(&tricky).len(), 499);
    }
}
