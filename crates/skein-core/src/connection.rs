//! Per-connection handle shared between the session loop and hooks.
//!
//! The handle is cheap to clone. Outgoing lines go through an unbounded queue
//! drained by the session's writer task, so every sender here is synchronous
//! and usable from sieves and handlers alike.
//!
//! ```text
//! hook ──▶ ConnectionHandle::privmsg ──▶ [queue] ──▶ writer task ──▶ socket
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::ctcp;
use crate::error::{TransportError, TransportResult};
use crate::message::format_command;

// =============================================================================
// Connection Info
// =============================================================================

/// NickServ identification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickServ {
    /// Service nickname to message.
    pub service: String,
    /// Command sent before the password.
    pub command: String,
    /// Account password.
    pub password: String,
}

/// Static facts about one configured connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    /// Unique connection name from config.
    pub name: String,
    /// Server host.
    pub server: String,
    /// Server port.
    pub port: u16,
    /// Nickname requested at registration.
    pub desired_nick: String,
    /// Channels joined once registration completes.
    pub autojoin: Vec<String>,
    /// Command prefix characters.
    pub command_prefix: String,
    /// Optional NickServ identification.
    pub nickserv: Option<NickServ>,
    /// Join channels the bot is invited to.
    pub accept_invites: bool,
}

impl ConnectionInfo {
    /// Creates info with the minimal required fields.
    pub fn new(name: impl Into<String>, server: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            port: 6667,
            desired_nick: nick.into(),
            command_prefix: ".".to_owned(),
            ..Default::default()
        }
    }

    /// Sets the autojoin channel list.
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.autojoin = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the command prefix characters.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.command_prefix = prefix.into();
        self
    }
}

// =============================================================================
// Connection Handle
// =============================================================================

#[derive(Debug)]
struct HandleInner {
    info: ConnectionInfo,
    nick: RwLock<String>,
    channels: RwLock<Vec<String>>,
    outgoing: mpsc::UnboundedSender<String>,
}

/// Handle to one logical IRC connection.
///
/// Survives reconnects: the session loop swaps sockets underneath while the
/// queue and the nickname state stay in place. Nick and channel state are
/// written only by the session loop.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiving end of its outgoing queue.
    pub fn new(info: ConnectionInfo) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let nick = info.desired_nick.clone();
        let handle = Self {
            inner: Arc::new(HandleInner {
                info,
                nick: RwLock::new(nick),
                channels: RwLock::new(Vec::new()),
                outgoing: tx,
            }),
        };
        (handle, rx)
    }

    /// Connection name from config.
    pub fn name(&self) -> &str {
        &self.inner.info.name
    }

    /// Static connection facts.
    pub fn info(&self) -> &ConnectionInfo {
        &self.inner.info
    }

    /// The server-confirmed nickname.
    pub fn nick(&self) -> String {
        self.inner.nick.read().clone()
    }

    /// Records a server-confirmed nickname change.
    pub fn set_nick(&self, nick: impl Into<String>) {
        *self.inner.nick.write() = nick.into();
    }

    /// `true` if `nick` is the bot, compared case-insensitively.
    pub fn is_me(&self, nick: &str) -> bool {
        self.inner.nick.read().eq_ignore_ascii_case(nick)
    }

    /// Channels the bot currently sits in.
    pub fn channels(&self) -> Vec<String> {
        self.inner.channels.read().clone()
    }

    /// Records a joined channel.
    pub fn add_channel(&self, channel: &str) {
        let mut channels = self.inner.channels.write();
        if !channels.iter().any(|c| c.eq_ignore_ascii_case(channel)) {
            channels.push(channel.to_owned());
        }
    }

    /// Forgets a channel after PART/KICK.
    pub fn remove_channel(&self, channel: &str) {
        self.inner
            .channels
            .write()
            .retain(|c| !c.eq_ignore_ascii_case(channel));
    }

    /// Forgets every channel; used when a session ends.
    pub fn clear_channels(&self) {
        self.inner.channels.write().clear();
    }

    // ─── Senders ─────────────────────────────────────────────────────────────

    /// Queues a raw line. Sanitizing (first line only, length cap) happens in
    /// the transport.
    pub fn send_raw(&self, line: impl Into<String>) -> TransportResult<()> {
        let line = line.into();
        trace!(connection = %self.name(), line = %line, "Queued outgoing line");
        self.inner
            .outgoing
            .send(line)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Sends `command` with `params`, colon-prefixing the trailing parameter.
    pub fn cmd<S: AsRef<str>>(&self, command: &str, params: &[S]) -> TransportResult<()> {
        self.send_raw(format_command(command, params))
    }

    pub fn join(&self, channel: &str) -> TransportResult<()> {
        self.cmd("JOIN", &[channel])
    }

    pub fn part(&self, channel: &str) -> TransportResult<()> {
        self.cmd("PART", &[channel])
    }

    pub fn privmsg(&self, target: &str, text: &str) -> TransportResult<()> {
        self.cmd("PRIVMSG", &[target, text])
    }

    pub fn notice(&self, target: &str, text: &str) -> TransportResult<()> {
        self.cmd("NOTICE", &[target, text])
    }

    /// Sends a CTCP request inside a PRIVMSG.
    pub fn ctcp(&self, target: &str, kind: &str, text: &str) -> TransportResult<()> {
        self.privmsg(target, &ctcp::format(kind, text))
    }

    /// Sends a CTCP reply inside a NOTICE.
    pub fn ctcp_reply(&self, target: &str, kind: &str, text: &str) -> TransportResult<()> {
        self.notice(target, &ctcp::format(kind, text))
    }

    /// `/me` style action.
    pub fn action(&self, target: &str, text: &str) -> TransportResult<()> {
        self.ctcp(target, "ACTION", text)
    }

    /// Requests a nickname change. The local nick changes only once the
    /// server confirms.
    pub fn change_nick(&self, nick: &str) -> TransportResult<()> {
        self.cmd("NICK", &[nick])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<String>) {
        ConnectionHandle::new(ConnectionInfo::new("test", "irc.example.net", "skein"))
    }

    #[test]
    fn test_senders_format_lines() {
        let (conn, mut rx) = handle();
        conn.join("#rust").unwrap();
        conn.part("#rust").unwrap();
        conn.privmsg("#rust", "hello world").unwrap();
        conn.notice("someone", "psst").unwrap();
        conn.action("#rust", "waves").unwrap();
        conn.ctcp_reply("someone", "VERSION", "skein").unwrap();
        conn.cmd("MODE", &["#rust", "+o", "someone"]).unwrap();

        let lines: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            lines,
            vec![
                "JOIN #rust",
                "PART #rust",
                "PRIVMSG #rust :hello world",
                "NOTICE someone :psst",
                "PRIVMSG #rust :\x01ACTION waves\x01",
                "NOTICE someone :\x01VERSION skein\x01",
                "MODE #rust +o :someone",
            ]
        );
    }

    #[test]
    fn test_nick_state() {
        let (conn, _rx) = handle();
        assert_eq!(conn.nick(), "skein");
        assert!(conn.is_me("SKEIN"));
        conn.change_nick("other").unwrap();
        assert_eq!(conn.nick(), "skein");
        conn.set_nick("other");
        assert!(conn.is_me("other"));
    }

    #[test]
    fn test_channel_tracking() {
        let (conn, _rx) = handle();
        conn.add_channel("#a");
        conn.add_channel("#A");
        conn.add_channel("#b");
        assert_eq!(conn.channels(), vec!["#a", "#b"]);
        conn.remove_channel("#A");
        assert_eq!(conn.channels(), vec!["#b"]);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (conn, rx) = handle();
        drop(rx);
        assert!(matches!(
            conn.privmsg("#a", "x"),
            Err(TransportError::SendFailed(_))
        ));
    }
}
