//! The core unit every runtime loads: registration follow-up, nick
//! collisions, invites and CTCP `VERSION`.

use skein_core::{ConnectionHandle, TransportResult};
use skein_framework::extractor::{Nick, Params};
use skein_framework::{PluginDescriptor, define_plugin, event, regex};
use tracing::info;

/// Built-in behaviour shared by all connections. Loading it is fatal on
/// failure.
pub static CORE: PluginDescriptor = define_plugin! {
    name: "core",
    core: true,
    hooks: [
        event(["004"]).name("on_registered").handler(on_registered),
        event(["433"]).name("on_nick_in_use").handler(on_nick_in_use),
        event(["INVITE"]).name("on_invite").handler(on_invite),
        regex(r"^\x01VERSION\x01?$").name("ctcp_version").handler(ctcp_version),
    ],
    metadata: {
        desc: "Registration, nick collisions, invites and CTCP VERSION",
    },
};

async fn on_registered(conn: ConnectionHandle) -> TransportResult<()> {
    let info = conn.info();
    if let Some(ns) = &info.nickserv {
        info!(connection = %conn.name(), service = %ns.service, "Identifying");
        conn.privmsg(&ns.service, &format!("{} {}", ns.command, ns.password))?;
    }
    for channel in &info.autojoin {
        conn.join(channel)?;
    }
    Ok(())
}

async fn on_nick_in_use(conn: ConnectionHandle, Params(params): Params) -> TransportResult<()> {
    let taken = params
        .get(1)
        .cloned()
        .unwrap_or_else(|| conn.info().desired_nick.clone());
    conn.change_nick(&format!("{taken}_"))
}

async fn on_invite(conn: ConnectionHandle, Params(params): Params) -> TransportResult<()> {
    if !conn.info().accept_invites {
        return Ok(());
    }
    match params.get(1) {
        Some(channel) => conn.join(channel),
        None => Ok(()),
    }
}

async fn ctcp_version(conn: ConnectionHandle, Nick(nick): Nick) -> TransportResult<()> {
    conn.ctcp_reply(
        &nick,
        "VERSION",
        concat!("skein ", env!("CARGO_PKG_VERSION")),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use skein_core::{ConnectionInfo, Message, NickServ};
    use skein_framework::{DispatchEngine, PluginRegistry, StaticSource};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    use super::*;

    fn engine() -> DispatchEngine {
        let registry = PluginRegistry::new().with_source(StaticSource::new([CORE]));
        registry.scan().unwrap();
        DispatchEngine::new(Arc::new(registry))
    }

    fn dispatch(engine: &DispatchEngine, conn: &ConnectionHandle, line: &str) {
        engine.dispatch(Arc::new(Message::parse(line).unwrap()), conn);
    }

    async fn next(rx: &mut UnboundedReceiver<String>) -> String {
        timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_registration_identifies_then_joins() {
        let mut info = ConnectionInfo::new("net", "irc.example.net", "skein").with_channels(["#a", "#b"]);
        info.nickserv = Some(NickServ {
            service: "NickServ".into(),
            command: "IDENTIFY".into(),
            password: "hunter2".into(),
        });
        let (conn, mut rx) = ConnectionHandle::new(info);

        dispatch(&engine(), &conn, ":irc.example.net 004 skein irc.example.net ircd-1.0 iow biklmnopstv");
        assert_eq!(next(&mut rx).await, "PRIVMSG NickServ :IDENTIFY hunter2");
        assert_eq!(next(&mut rx).await, "JOIN #a");
        assert_eq!(next(&mut rx).await, "JOIN #b");
    }

    #[tokio::test]
    async fn test_nick_in_use_appends_underscore() {
        let (conn, mut rx) = ConnectionHandle::new(ConnectionInfo::new("net", "irc", "skein"));
        dispatch(&engine(), &conn, ":irc 433 * skein :Nickname is already in use");
        assert_eq!(next(&mut rx).await, "NICK skein_");
    }

    #[tokio::test]
    async fn test_invites_follow_config() {
        let engine = engine();

        let mut info = ConnectionInfo::new("net", "irc", "skein");
        info.accept_invites = true;
        let (conn, mut rx) = ConnectionHandle::new(info);
        dispatch(&engine, &conn, ":alice!a@h INVITE skein :#secret");
        assert_eq!(next(&mut rx).await, "JOIN #secret");

        let (conn, mut rx) = ConnectionHandle::new(ConnectionInfo::new("net", "irc", "skein"));
        dispatch(&engine, &conn, ":alice!a@h INVITE skein :#secret");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ctcp_version_reply() {
        let (conn, mut rx) = ConnectionHandle::new(ConnectionInfo::new("net", "irc", "skein"));
        dispatch(&engine(), &conn, ":alice!a@h PRIVMSG skein :\x01VERSION\x01");
        assert_eq!(
            next(&mut rx).await,
            format!("NOTICE alice :\x01VERSION skein {}\x01", env!("CARGO_PKG_VERSION"))
        );
    }
}
