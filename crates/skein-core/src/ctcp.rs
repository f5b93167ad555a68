//! CTCP framing (`\x01TYPE text\x01` inside PRIVMSG/NOTICE).

/// CTCP delimiter byte.
pub const DELIM: char = '\x01';

/// A decoded CTCP request or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// Upper-case type, e.g. `ACTION` or `VERSION`.
    pub kind: &'a str,
    /// Payload after the type, possibly empty.
    pub text: &'a str,
}

/// Decodes `text` if it is CTCP framed. The closing delimiter is optional,
/// some clients drop it.
pub fn parse(text: &str) -> Option<Ctcp<'_>> {
    let inner = text.strip_prefix(DELIM)?;
    let inner = inner.strip_suffix(DELIM).unwrap_or(inner);
    if inner.is_empty() {
        return None;
    }
    let (kind, text) = inner.split_once(' ').unwrap_or((inner, ""));
    Some(Ctcp { kind, text })
}

/// Frames a CTCP payload.
pub fn format(kind: &str, text: &str) -> String {
    let kind = kind.to_ascii_uppercase();
    if text.is_empty() {
        format!("{DELIM}{kind}{DELIM}")
    } else {
        format!("{DELIM}{kind} {text}{DELIM}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        let ctcp = parse("\x01ACTION waves\x01").unwrap();
        assert_eq!(ctcp.kind, "ACTION");
        assert_eq!(ctcp.text, "waves");
    }

    #[test]
    fn test_parse_without_payload_or_closer() {
        let ctcp = parse("\x01VERSION").unwrap();
        assert_eq!(ctcp.kind, "VERSION");
        assert_eq!(ctcp.text, "");
    }

    #[test]
    fn test_plain_text_is_not_ctcp() {
        assert!(parse("hello").is_none());
        assert!(parse("\x01\x01").is_none());
    }

    #[test]
    fn test_format() {
        assert_eq!(format("action", "dances"), "\x01ACTION dances\x01");
        assert_eq!(format("VERSION", ""), "\x01VERSION\x01");
    }
}
