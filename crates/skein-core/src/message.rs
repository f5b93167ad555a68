//! The IRC message grammar.
//!
//! ```text
//! :nick!user@host PRIVMSG #chan :hello world
//!  └─── prefix ──┘ └command┘ └─ params ───────┘
//!                            #chan, "hello world"
//! ```
//!
//! Parsing follows the classic rules: an optional `:prefix` up to the first
//! space, then a command (verb or three digit numeric), then space separated
//! parameters where the first one starting with `:` swallows the rest of the
//! line. Serialization applies the trailing-parameter colon rule in reverse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

// ============================================================================
// Prefix
// ============================================================================

/// The origin of a message, decomposed as `nick!user@host`.
///
/// `user` and `host` are empty when the server omitted them; all three are
/// empty for prefix-less lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prefix {
    pub nick: String,
    pub user: String,
    pub host: String,
}

impl Prefix {
    /// Splits a raw prefix (without the leading colon).
    pub fn parse(raw: &str) -> Self {
        let (rest, host) = raw.split_once('@').unwrap_or((raw, ""));
        let (nick, user) = rest.split_once('!').unwrap_or((rest, ""));
        Self {
            nick: nick.to_owned(),
            user: user.to_owned(),
            host: host.to_owned(),
        }
    }

    /// `true` for prefix-less lines.
    pub fn is_empty(&self) -> bool {
        self.nick.is_empty() && self.user.is_empty() && self.host.is_empty()
    }

    /// The full `nick!user@host` mask, always with both separators.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.user, self.host)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick)?;
        if !self.user.is_empty() {
            write!(f, "!{}", self.user)?;
        }
        if !self.host.is_empty() {
            write!(f, "@{}", self.host)?;
        }
        Ok(())
    }
}

// ============================================================================
// Message
// ============================================================================

/// A parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Origin of the line; empty for server lines without a prefix.
    pub prefix: Prefix,
    /// Upper-cased verb or numeric (`PRIVMSG`, `004`).
    pub command: String,
    /// Parameters in order, the trailing one without its leading colon.
    pub params: Vec<String>,
    /// Everything after the command, verbatim. Used to echo `PING` payloads.
    raw_params: String,
}

impl Message {
    /// Builds an outgoing message with no prefix.
    pub fn new<I, S>(command: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = command.into().to_ascii_uppercase();
        let params: Vec<String> = params.into_iter().map(Into::into).collect();
        let raw_params = format_params(&params);
        Self {
            prefix: Prefix::default(),
            command,
            params,
            raw_params,
        }
    }

    /// Parses one line (trailing CR/LF tolerated).
    pub fn parse(line: &str) -> ParseResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, rest) = match line.strip_prefix(':') {
            Some(stripped) => {
                let (raw_prefix, rest) =
                    stripped
                        .split_once(' ')
                        .ok_or_else(|| ParseError::MissingCommand {
                            line: line.to_owned(),
                        })?;
                (Prefix::parse(raw_prefix), rest.trim_start_matches(' '))
            }
            None => (Prefix::default(), line),
        };

        let (command, raw_params) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand {
                line: line.to_owned(),
            });
        }
        if !is_valid_command(command) {
            return Err(ParseError::InvalidCommand {
                command: command.to_owned(),
            });
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params: split_params(raw_params),
            raw_params: raw_params.to_owned(),
        })
    }

    /// `nick!user@host` of the sender.
    pub fn mask(&self) -> String {
        self.prefix.mask()
    }

    /// Sender nickname (empty for server lines).
    pub fn nick(&self) -> &str {
        &self.prefix.nick
    }

    /// The final parameter, typically the free text of the line.
    pub fn last_param(&self) -> &str {
        self.params.last().map(String::as_str).unwrap_or_default()
    }

    /// Parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Everything after the command exactly as received.
    pub fn raw_params(&self) -> &str {
        &self.raw_params
    }

    /// Command and parameters in wire syntax, without prefix or CRLF.
    pub fn to_wire(&self) -> String {
        format_command(&self.command, &self.params)
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.prefix.is_empty() {
            write!(f, ":{} ", self.prefix)?;
        }
        f.write_str(&self.to_wire())
    }
}

// ============================================================================
// Grammar helpers
// ============================================================================

fn is_valid_command(command: &str) -> bool {
    let numeric = command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit());
    numeric || command.bytes().all(|b| b.is_ascii_alphabetic())
}

fn split_params(raw: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = raw;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing.to_owned());
            break;
        }
        match rest.split_once(' ') {
            Some((token, tail)) => {
                params.push(token.to_owned());
                rest = tail;
            }
            None => {
                params.push(rest.to_owned());
                break;
            }
        }
    }
    params
}

fn format_params<S: AsRef<str>>(params: &[S]) -> String {
    let Some((last, init)) = params.split_last() else {
        return String::new();
    };
    let last = last.as_ref();
    let mut out = String::new();
    for param in init {
        out.push_str(param.as_ref());
        out.push(' ');
    }
    if init.is_empty() && !needs_colon(last) {
        out.push_str(last);
    } else {
        out.push(':');
        out.push_str(last);
    }
    out
}

fn needs_colon(param: &str) -> bool {
    param.is_empty() || param.contains(' ') || param.starts_with(':')
}

/// Serializes a command and its parameters.
///
/// The final parameter is prefixed with `:` whenever more than one parameter
/// is present, or when a lone parameter could not otherwise survive parsing.
pub fn format_command<S: AsRef<str>>(command: &str, params: &[S]) -> String {
    if params.is_empty() {
        return command.to_owned();
    }
    format!("{command} {}", format_params(params))
}

/// `true` for names carrying a channel sigil.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_prefix() {
        let msg = Message::parse(":nick!user@host PRIVMSG #chan :.weather london").unwrap();
        assert_eq!(msg.prefix.nick, "nick");
        assert_eq!(msg.prefix.user, "user");
        assert_eq!(msg.prefix.host, "host");
        assert_eq!(msg.mask(), "nick!user@host");
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", ".weather london"]);
        assert_eq!(msg.last_param(), ".weather london");
    }

    #[test]
    fn test_mask_matches_components() {
        for line in [
            ":a!b@c NOTICE x :y",
            ":server.example.net 001 bot :Welcome",
            ":nick@host JOIN #c",
        ] {
            let msg = Message::parse(line).unwrap();
            let p = &msg.prefix;
            assert_eq!(format!("{}!{}@{}", p.nick, p.user, p.host), msg.mask());
        }
    }

    #[test]
    fn test_no_prefix_fields_empty() {
        let msg = Message::parse("PING :server123").unwrap();
        assert!(msg.prefix.is_empty());
        assert_eq!(msg.prefix.nick, "");
        assert_eq!(msg.prefix.user, "");
        assert_eq!(msg.prefix.host, "");
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["server123"]);
        assert_eq!(msg.raw_params(), ":server123");
    }

    #[test]
    fn test_numeric_and_middle_params() {
        let msg = Message::parse(":irc.net 353 bot = #chan :a b c").unwrap();
        assert_eq!(msg.command, "353");
        assert_eq!(msg.params, vec!["bot", "=", "#chan", "a b c"]);
    }

    #[test]
    fn test_colon_inside_trailing_kept() {
        let msg = Message::parse(":n!u@h PRIVMSG #c :see: http://x :y").unwrap();
        assert_eq!(msg.last_param(), "see: http://x :y");
    }

    #[test]
    fn test_empty_trailing_and_extra_spaces() {
        let msg = Message::parse(":n!u@h PRIVMSG  #c  :").unwrap();
        assert_eq!(msg.params, vec!["#c", ""]);
        assert_eq!(msg.last_param(), "");
    }

    #[test]
    fn test_command_without_params() {
        let msg = Message::parse("QUIT").unwrap();
        assert!(msg.params.is_empty());
        assert_eq!(msg.last_param(), "");
    }

    #[test]
    fn test_lowercase_command_normalized() {
        let msg = Message::parse(":n!u@h privmsg #c :hi").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(Message::parse(""), Err(ParseError::Empty));
        assert_eq!(Message::parse("\r\n"), Err(ParseError::Empty));
        assert!(matches!(
            Message::parse(":lonelyprefix"),
            Err(ParseError::MissingCommand { .. })
        ));
        assert!(matches!(
            Message::parse("12x foo"),
            Err(ParseError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn test_format_command_trailing_rule() {
        assert_eq!(
            format_command("PRIVMSG", &["#chan", "hello world"]),
            "PRIVMSG #chan :hello world"
        );
        assert_eq!(format_command("PRIVMSG", &["#chan", "hi"]), "PRIVMSG #chan :hi");
        assert_eq!(format_command("JOIN", &["#chan"]), "JOIN #chan");
        assert_eq!(format_command("NICK", &["bot"]), "NICK bot");
        assert_eq!(
            format_command("USER", &["bot", "3", "*", "Skein Bot"]),
            "USER bot 3 * :Skein Bot"
        );
        assert_eq!(format_command("QUIT", &["gone away"]), "QUIT :gone away");
        assert_eq!(format_command::<&str>("QUIT", &[]), "QUIT");
    }

    #[test]
    fn test_display_includes_prefix() {
        let msg = Message::parse(":n!u@h PRIVMSG #c :hello there").unwrap();
        assert_eq!(msg.to_string(), ":n!u@h PRIVMSG #c :hello there");
        assert_eq!(msg.to_wire(), "PRIVMSG #c :hello there");
    }

    #[test]
    fn test_channel_names() {
        assert!(is_channel_name("#rust"));
        assert!(is_channel_name("&local"));
        assert!(!is_channel_name("someone"));
    }
}
