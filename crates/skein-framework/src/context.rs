//! The per-invocation context handed to hooks.
//!
//! One [`HookContext`] is built for every hook that matches an incoming
//! message. It is immutable once built and shared as `Arc<HookContext>`
//! between the extractors and the response step, so a hook can never see
//! state left behind by another hook.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use skein_core::{ConnectionHandle, Message, TransportResult, is_channel_name};

use crate::hook::{HookInfo, HookKind};
use crate::store::Db;

// =============================================================================
// Input
// =============================================================================

/// Captured groups of a regex hook match, owned.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    groups: Vec<Option<String>>,
    names: HashMap<String, usize>,
}

impl Captures {
    pub fn new(re: &Regex, caps: &regex::Captures<'_>) -> Self {
        let groups = caps
            .iter()
            .map(|m| m.map(|m| m.as_str().to_owned()))
            .collect();
        let names = re
            .capture_names()
            .enumerate()
            .filter_map(|(i, name)| name.map(|n| (n.to_owned(), i)))
            .collect();
        Self { groups, names }
    }

    /// The whole match.
    pub fn as_str(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        self.names.get(name).and_then(|&i| self.get(i))
    }

    /// Number of groups including the whole match.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// What a hook receives as its input.
#[derive(Debug, Clone)]
pub enum HookInput {
    /// Command arguments after the command word, trimmed.
    Text(String),
    /// Regex hook match.
    Match(Captures),
    /// Event hook: the full parameter list.
    Params(Vec<String>),
}

// =============================================================================
// HookContext
// =============================================================================

/// Everything a single hook invocation can see.
pub struct HookContext {
    message: Arc<Message>,
    conn: ConnectionHandle,
    hook: HookInfo,
    input: HookInput,
    trigger: Option<String>,
    chan: String,
    db: Db,
    settings: Option<Arc<Value>>,
}

impl HookContext {
    pub fn new(
        message: Arc<Message>,
        conn: ConnectionHandle,
        hook: HookInfo,
        input: HookInput,
        trigger: Option<String>,
        db: Db,
    ) -> Self {
        let chan = reply_target(&message, &conn);
        Self {
            message,
            conn,
            hook,
            input,
            trigger,
            chan,
            db,
            settings: None,
        }
    }

    /// Attaches the `plugins.settings` table of the hook's unit.
    pub fn with_settings(mut self, settings: Option<Arc<Value>>) -> Self {
        self.settings = settings;
        self
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn message_arc(&self) -> Arc<Message> {
        Arc::clone(&self.message)
    }

    pub fn conn(&self) -> &ConnectionHandle {
        &self.conn
    }

    pub fn hook(&self) -> &HookInfo {
        &self.hook
    }

    pub fn input(&self) -> &HookInput {
        &self.input
    }

    /// The command word as typed, lowercased. Only set for command hooks.
    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }

    /// Where replies go: the channel, or the sender for private messages.
    pub fn chan(&self) -> &str {
        &self.chan
    }

    /// Sender nick, the server name for server-prefixed lines, or empty when
    /// the line has no prefix.
    pub fn nick(&self) -> &str {
        self.message.nick()
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Settings of the hook's unit, if configured.
    pub fn settings(&self) -> Option<&Value> {
        self.settings.as_deref()
    }

    /// Input as plain text.
    ///
    /// Command arguments, the whole regex match, or the last parameter of an
    /// event.
    pub fn text(&self) -> &str {
        match &self.input {
            HookInput::Text(text) => text,
            HookInput::Match(caps) => caps.as_str(),
            HookInput::Params(_) => self.message.last_param(),
        }
    }

    pub fn is_private(&self) -> bool {
        !is_channel_name(&self.chan)
    }

    /// Addresses the sender in channels (`nick: text`), plain otherwise.
    pub fn reply(&self, text: &str) -> TransportResult<()> {
        if self.is_private() || self.nick().is_empty() {
            self.conn.privmsg(&self.chan, text)
        } else {
            self.conn
                .privmsg(&self.chan, &format!("{}: {}", self.nick(), text))
        }
    }

    pub fn say(&self, text: &str) -> TransportResult<()> {
        self.conn.privmsg(&self.chan, text)
    }

    /// Private notice to the sender.
    pub fn notice(&self, text: &str) -> TransportResult<()> {
        self.conn.notice(self.nick(), text)
    }

    pub fn action(&self, text: &str) -> TransportResult<()> {
        self.conn.action(&self.chan, text)
    }

    /// Sends a handler's return value: event hooks say it, other hooks reply.
    pub fn respond(&self, text: &str) {
        let result = match self.hook.kind {
            HookKind::Event => self.say(text),
            HookKind::Command | HookKind::Regex => self.reply(text),
        };
        if let Err(e) = result {
            warn!(hook = %self.hook.name, error = %e, "Failed to send response");
        }
    }
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("connection", &self.conn.name())
            .field("hook", &self.hook.name)
            .field("command", &self.message.command)
            .field("chan", &self.chan)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Resolves where replies to `message` go.
///
/// The first parameter, unless it is the bot's own nick (or missing), in
/// which case the sender.
pub fn reply_target(message: &Message, conn: &ConnectionHandle) -> String {
    match message.param(0) {
        Some(target) if !target.is_empty() && !conn.is_me(target) => target.to_owned(),
        _ => message.nick().to_owned(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use skein_core::ConnectionInfo;
    use tokio::sync::mpsc::UnboundedReceiver;

    pub(crate) fn conn() -> (ConnectionHandle, UnboundedReceiver<String>) {
        ConnectionHandle::new(ConnectionInfo::new("test", "irc.example.net", "skein"))
    }

    pub(crate) fn info(kind: HookKind) -> HookInfo {
        HookInfo {
            unit: Arc::from("unit"),
            name: Arc::from("hook"),
            kind,
            core: false,
        }
    }

    pub(crate) fn context(line: &str, kind: HookKind, input: HookInput) -> (HookContext, UnboundedReceiver<String>) {
        let (conn, rx) = conn();
        let message = Arc::new(Message::parse(line).unwrap());
        let db = Db::new(Arc::new(MemoryStore::new()), "test");
        (HookContext::new(message, conn, info(kind), input, None, db), rx)
    }

    #[test]
    fn test_channel_reply_prefixes_nick() {
        let (ctx, mut rx) = context(
            ":alice!a@h PRIVMSG #rust :.hi",
            HookKind::Command,
            HookInput::Text(String::new()),
        );
        assert_eq!(ctx.chan(), "#rust");
        assert!(!ctx.is_private());

        ctx.reply("hello").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #rust :alice: hello");
    }

    #[test]
    fn test_private_message_targets_sender() {
        let (ctx, mut rx) = context(
            ":alice!a@h PRIVMSG skein :hi",
            HookKind::Command,
            HookInput::Text(String::new()),
        );
        assert_eq!(ctx.chan(), "alice");
        ctx.reply("hello").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG alice :hello");
    }

    #[test]
    fn test_respond_depends_on_kind() {
        let (ctx, mut rx) = context(
            ":alice!a@h JOIN #rust",
            HookKind::Event,
            HookInput::Params(vec!["#rust".into()]),
        );
        ctx.respond("welcome");
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #rust :welcome");
        assert_eq!(ctx.text(), "#rust");
    }

    #[test]
    fn test_notice_goes_to_sender() {
        let (ctx, mut rx) = context(
            ":alice!a@h PRIVMSG #rust :x",
            HookKind::Regex,
            HookInput::Text(String::new()),
        );
        ctx.notice("psst").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "NOTICE alice :psst");
    }

    #[test]
    fn test_captures() {
        let re = Regex::new(r"v=(?P<id>\w+)(x)?").unwrap();
        let caps = re.captures("watch?v=abc123").unwrap();
        let caps = Captures::new(&re, &caps);
        assert_eq!(caps.as_str(), "v=abc123");
        assert_eq!(caps.get(1), Some("abc123"));
        assert_eq!(caps.name("id"), Some("abc123"));
        assert_eq!(caps.get(2), None);
        assert_eq!(caps.len(), 3);
    }
}
