//! One IRC session per configured connection, reconnecting forever.
//!
//! ```text
//!            ┌──────────────── Connection::run ────────────────┐
//!            │ connect ─▶ PASS/NICK/USER ─▶ session ─▶ (ended) │──┐
//!            └──────▲──────────────────────────────────────────┘  │
//!                   └──── reconnect (backoff unless registered) ◀─┘
//!
//! session:  reader loop (this task)          writer task
//!           read_line ─▶ parse ─▶ PING? ─┐    outgoing queue ─▶ write_line
//!                        track ─▶ dispatch    ▲
//!                                  └──────────┘ ConnectionHandle senders
//! ```
//!
//! The outgoing queue belongs to the [`ConnectionHandle`] and survives
//! reconnects: the writer task hands the receiver back when a session ends.

use std::borrow::Cow;
use std::sync::Arc;

use skein_core::{ConnectionHandle, Message, format_command};
use skein_framework::DispatchEngine;
use skein_transport::{LineReader, LineTransport, LineWriter};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{RuntimeError, RuntimeResult};

const QUIT_MESSAGE: &str = "skein shutting down";

/// Replaces configured secrets in logged lines.
#[derive(Debug, Clone, Default)]
pub struct Censor {
    strings: Vec<String>,
}

impl Censor {
    pub fn new<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strings: strings
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn apply<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(line);
        for secret in &self.strings {
            if out.contains(secret.as_str()) {
                out = Cow::Owned(out.replace(secret.as_str(), "[censored]"));
            }
        }
        out
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Stream closed, timed out or failed. Reconnect. `registered` is set
    /// once the server sent its welcome.
    Closed { registered: bool },
    Shutdown,
}

/// A configured connection and its session loop.
pub struct Connection {
    config: ConnectionConfig,
    handle: ConnectionHandle,
    outgoing: Option<UnboundedReceiver<String>>,
    engine: Arc<DispatchEngine>,
    censor: Arc<Censor>,
}

impl Connection {
    pub fn new(config: ConnectionConfig, engine: Arc<DispatchEngine>) -> Self {
        let (handle, outgoing) = ConnectionHandle::new(config.to_info());
        let mut secrets = config.censored_strings.clone();
        secrets.extend(config.server_password.clone());
        secrets.extend(config.nickserv.as_ref().map(|ns| ns.password.clone()));
        Self {
            censor: Arc::new(Censor::new(secrets)),
            config,
            handle,
            outgoing: Some(outgoing),
            engine,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Connects and keeps the session alive until `shutdown` fires.
    ///
    /// Returns an error only when the reconnect policy gives up.
    ///
    /// The backoff resets only after a session got as far as the server's
    /// welcome. A socket that is accepted and then dropped before `001`
    /// counts as a failed attempt.
    pub async fn run(mut self, shutdown: CancellationToken) -> RuntimeResult<()> {
        let endpoint = self.config.endpoint();
        let mut backoff = self.config.reconnect.to_policy().backoff();

        while !shutdown.is_cancelled() {
            let connected = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = LineTransport::connect(&endpoint, self.config.transport_options()) => result,
            };

            let failure = match connected {
                Ok(transport) => match self.session(transport, &shutdown).await? {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Closed { registered: true } => {
                        backoff.reset();
                        info!(connection = %self.config.name, "Session ended, reconnecting");
                        continue;
                    }
                    SessionEnd::Closed { registered: false } => {
                        "closed before registration".to_owned()
                    }
                },
                Err(e) => e.to_string(),
            };

            let Some(delay) = backoff.next_delay() else {
                error!(
                    connection = %self.config.name,
                    attempts = backoff.attempts(),
                    error = %failure,
                    "Giving up on connection"
                );
                return Err(RuntimeError::ReconnectExhausted {
                    connection: self.config.name.clone(),
                    attempts: backoff.attempts(),
                });
            };
            warn!(
                connection = %self.config.name,
                error = %failure,
                retry_in_ms = delay.as_millis() as u64,
                "Connect failed"
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(connection = %self.config.name, "Connection stopped");
        Ok(())
    }

    /// `PASS` (when configured), `NICK`, `USER`.
    fn handshake(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if let Some(password) = &self.config.server_password {
            lines.push(format_command("PASS", &[password]));
        }
        lines.push(format_command("NICK", &[&self.config.nick]));
        lines.push(format_command(
            "USER",
            &[self.config.user(), "3", "*", self.config.realname.as_str()],
        ));
        lines
    }

    async fn session<S>(
        &mut self,
        transport: LineTransport<S>,
        shutdown: &CancellationToken,
    ) -> RuntimeResult<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let name = self.config.name.clone();
        let (mut reader, mut writer) = transport.into_split();

        self.handle.set_nick(&self.config.nick);
        self.handle.clear_channels();
        for line in self.handshake() {
            debug!(connection = %name, line = %self.censor.apply(&line), ">>");
            if let Err(e) = writer.write_line(&line).await {
                warn!(connection = %name, error = %e, "Handshake failed");
                return Ok(SessionEnd::Closed { registered: false });
            }
        }

        let outgoing = self.outgoing.take().ok_or_else(|| RuntimeError::QueueLost {
            connection: name.clone(),
        })?;
        // Independent of `shutdown` so a final QUIT is queued before the
        // writer stops.
        let session = CancellationToken::new();
        let writer_task = tokio::spawn(write_loop(
            name.clone(),
            writer,
            outgoing,
            Arc::clone(&self.censor),
            session.clone(),
            shutdown.clone(),
        ));

        let end = self.read_loop(&mut reader, &session, shutdown).await;

        if end == SessionEnd::Shutdown
            && let Err(e) = self.handle.cmd("QUIT", &[QUIT_MESSAGE])
        {
            debug!(connection = %name, error = %e, "Could not queue QUIT");
        }
        session.cancel();

        match writer_task.await {
            Ok(outgoing) => self.outgoing = Some(outgoing),
            Err(e) => {
                error!(connection = %name, error = %e, "Writer task failed");
                return Err(RuntimeError::QueueLost { connection: name });
            }
        }
        Ok(end)
    }

    async fn read_loop<S: AsyncRead>(
        &self,
        reader: &mut LineReader<S>,
        session: &CancellationToken,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let name = self.config.name.as_str();
        let mut registered = false;
        loop {
            let line = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                _ = session.cancelled() => return SessionEnd::Closed { registered },
                line = reader.read_line() => line,
            };
            let Some(line) = line else {
                return SessionEnd::Closed { registered };
            };
            trace!(connection = %name, line = %line, "<<");

            let message = match Message::parse(&line) {
                Ok(message) => message,
                Err(e) => {
                    debug!(connection = %name, error = %e, "Skipping unparsable line");
                    continue;
                }
            };

            if message.command == "PING"
                && let Err(e) = self.handle.send_raw(format!("PONG {}", message.raw_params()))
            {
                warn!(connection = %name, error = %e, "Failed to queue PONG");
            }

            registered |= message.command == "001";
            self.track(&message);
            self.engine.dispatch(Arc::new(message), &self.handle);
        }
    }

    /// Session state changes that concern the bot itself.
    fn track(&self, message: &Message) {
        let from_me = !message.nick().is_empty() && self.handle.is_me(message.nick());
        match message.command.as_str() {
            // The welcome's first parameter is the nick the server assigned.
            "001" => {
                if let Some(nick) = message.param(0) {
                    self.handle.set_nick(nick);
                }
            }
            "NICK" if from_me => {
                if let Some(nick) = message.param(0) {
                    info!(connection = %self.config.name, nick, "Nick changed");
                    self.handle.set_nick(nick);
                }
            }
            "JOIN" if from_me => {
                if let Some(channel) = message.param(0) {
                    self.handle.add_channel(channel);
                }
            }
            "PART" if from_me => {
                if let Some(channel) = message.param(0) {
                    self.handle.remove_channel(channel);
                }
            }
            "KICK" => {
                if let (Some(channel), Some(target)) = (message.param(0), message.param(1))
                    && self.handle.is_me(target)
                {
                    warn!(connection = %self.config.name, channel, "Kicked");
                    self.handle.remove_channel(channel);
                }
            }
            _ => {}
        }
    }
}

/// Drains the outgoing queue onto the socket until the session ends. On
/// shutdown, already queued lines are flushed first. Returns the queue.
async fn write_loop<S: AsyncWrite>(
    name: String,
    mut writer: LineWriter<S>,
    mut outgoing: UnboundedReceiver<String>,
    censor: Arc<Censor>,
    session: CancellationToken,
    shutdown: CancellationToken,
) -> UnboundedReceiver<String> {
    loop {
        let line = tokio::select! {
            biased;
            _ = session.cancelled() => break,
            line = outgoing.recv() => line,
        };
        let Some(line) = line else {
            break;
        };
        debug!(connection = %name, line = %censor.apply(&line), ">>");
        if let Err(e) = writer.write_line(&line).await {
            warn!(connection = %name, error = %e, "Write failed, ending session");
            session.cancel();
            return outgoing;
        }
    }

    if shutdown.is_cancelled() {
        while let Ok(line) = outgoing.try_recv() {
            debug!(connection = %name, line = %censor.apply(&line), ">>");
            if writer.write_line(&line).await.is_err() {
                break;
            }
        }
    }
    outgoing
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use skein_framework::extractor::Input;
    use skein_framework::{
        PluginDescriptor, PluginRegistry, StaticSource, command, define_plugin, event,
    };
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::TcpListener;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::time::timeout;

    use super::*;

    async fn echo(Input(text): Input) -> String {
        text
    }

    static ECHO: PluginDescriptor = define_plugin! {
        name: "echo",
        hooks: [command("echo").handler(echo)],
    };

    fn engine(plugins: &[PluginDescriptor]) -> Arc<DispatchEngine> {
        let registry = PluginRegistry::new().with_source(StaticSource::new(plugins.iter().copied()));
        registry.scan().unwrap();
        Arc::new(DispatchEngine::new(Arc::new(registry)))
    }

    async fn listener() -> (TcpListener, ConnectionConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = ConnectionConfig::new("test", "127.0.0.1", "skein");
        config.port = listener.local_addr().unwrap().port();
        config.server_password = Some("sekrit".into());
        config.reconnect.initial_delay_ms = 50;
        config.reconnect.max_delay_ms = 200;
        (listener, config)
    }

    async fn accept(listener: &TcpListener) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
        let (socket, _) = timeout(Duration::from_secs(5), listener.accept())
            .await
            .unwrap()
            .unwrap();
        let (read, write) = socket.into_split();
        (BufReader::new(read).lines(), write)
    }

    async fn next_line(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> String {
        timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }

    async fn expect_handshake(lines: &mut Lines<BufReader<OwnedReadHalf>>) {
        assert_eq!(next_line(lines).await, "PASS sekrit");
        assert_eq!(next_line(lines).await, "NICK skein");
        assert_eq!(next_line(lines).await, "USER skein 3 * :skein");
    }

    #[test]
    fn test_censor() {
        let censor = Censor::new(["hunter2", ""]);
        assert_eq!(censor.apply("PASS hunter2"), "PASS [censored]");
        assert!(matches!(censor.apply("NICK skein"), Cow::Borrowed(_)));
    }

    #[tokio::test]
    async fn test_handshake_ping_and_command() {
        let (listener, config) = listener().await;
        let shutdown = CancellationToken::new();
        let connection = Connection::new(config, engine(&[ECHO]));
        let task = tokio::spawn(connection.run(shutdown.clone()));

        let (mut lines, mut write) = accept(&listener).await;
        expect_handshake(&mut lines).await;

        write
            .write_all(b"PING :server123\r\n:nick!u@h PRIVMSG #chan :.echo hi there\r\n")
            .await
            .unwrap();
        assert_eq!(next_line(&mut lines).await, "PONG :server123");
        assert_eq!(next_line(&mut lines).await, "PRIVMSG #chan :nick: hi there");

        shutdown.cancel();
        assert_eq!(next_line(&mut lines).await, format!("QUIT :{QUIT_MESSAGE}"));
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_pong_precedes_hook_output() {
        async fn saw(conn: ConnectionHandle, message: Arc<Message>) -> skein_core::TransportResult<()> {
            conn.send_raw(format!("NOTICE ops :saw {}", message.command))
        }

        static EVERYTHING: PluginDescriptor = define_plugin! {
            name: "everything",
            hooks: [event(["*"]).handler(saw)],
        };
        let (listener, config) = listener().await;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Connection::new(config, engine(&[EVERYTHING])).run(shutdown.clone()));

        let (mut lines, mut write) = accept(&listener).await;
        expect_handshake(&mut lines).await;
        write.write_all(b"PING :server123\r\n").await.unwrap();
        assert_eq!(next_line(&mut lines).await, "PONG :server123");
        assert_eq!(next_line(&mut lines).await, "NOTICE ops :saw PING");

        shutdown.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_read_timeout_replays_handshake() {
        let (listener, mut config) = listener().await;
        config.timeout_secs = 1;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Connection::new(config, engine(&[])).run(shutdown.clone()));

        let (mut first, _first_write) = accept(&listener).await;
        expect_handshake(&mut first).await;

        // Silence past the timeout ends the session and dials again.
        let (mut second, _second_write) = accept(&listener).await;
        expect_handshake(&mut second).await;

        shutdown.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_reconnects_and_keeps_queue() {
        let (listener, config) = listener().await;
        let shutdown = CancellationToken::new();
        let connection = Connection::new(config, engine(&[]));
        let handle = connection.handle().clone();
        let task = tokio::spawn(connection.run(shutdown.clone()));

        let (mut first, first_write) = accept(&listener).await;
        expect_handshake(&mut first).await;
        drop(first_write);
        drop(first);

        let (mut second, _write) = accept(&listener).await;
        expect_handshake(&mut second).await;
        handle.privmsg("#chan", "back").unwrap();
        assert_eq!(next_line(&mut second).await, "PRIVMSG #chan :back");

        shutdown.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_session_state_tracking() {
        let (listener, config) = listener().await;
        let shutdown = CancellationToken::new();
        let connection = Connection::new(config, engine(&[]));
        let handle = connection.handle().clone();
        let task = tokio::spawn(connection.run(shutdown.clone()));

        let (mut lines, mut write) = accept(&listener).await;
        expect_handshake(&mut lines).await;
        write
            .write_all(
                b":skein!u@h JOIN #a\r\n:skein!u@h JOIN #b\r\n:op!u@h KICK #a skein :bye\r\n\
                  :skein!u@h NICK :skein2\r\nPING :sync\r\n",
            )
            .await
            .unwrap();
        assert_eq!(next_line(&mut lines).await, "PONG :sync");

        assert_eq!(handle.nick(), "skein2");
        assert_eq!(handle.channels(), vec!["#b"]);

        shutdown.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_garbage_lines_are_skipped() {
        async fn welcome() -> &'static str {
            "welcome"
        }

        static JOINS: PluginDescriptor = define_plugin! {
            name: "joins",
            hooks: [event(["JOIN"]).handler(welcome)],
        };
        let (listener, config) = listener().await;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Connection::new(config, engine(&[JOINS])).run(shutdown.clone()));

        let (mut lines, mut write) = accept(&listener).await;
        expect_handshake(&mut lines).await;
        write
            .write_all(b":only-a-prefix\r\n \r\n:nick!u@h JOIN #chan\r\n")
            .await
            .unwrap();
        assert_eq!(next_line(&mut lines).await, "PRIVMSG #chan :welcome");

        shutdown.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dropped_before_welcome_counts_as_failure() {
        let (listener, mut config) = listener().await;
        config.reconnect.max_retries = Some(2);
        let accepts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&accepts);
        let server = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                drop(socket);
            }
        });

        let result = timeout(
            Duration::from_secs(5),
            Connection::new(config, engine(&[])).run(CancellationToken::new()),
        )
        .await
        .unwrap();
        assert!(matches!(
            result,
            Err(RuntimeError::ReconnectExhausted { attempts: 2, .. })
        ));
        assert!(accepts.load(std::sync::atomic::Ordering::SeqCst) <= 3);
        server.abort();
    }

    #[tokio::test]
    async fn test_welcome_resets_backoff() {
        let (listener, mut config) = listener().await;
        config.reconnect.max_retries = Some(1);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Connection::new(config, engine(&[])).run(shutdown.clone()));

        // Dropped before the welcome: one failed attempt.
        let (mut lines, write) = accept(&listener).await;
        expect_handshake(&mut lines).await;
        drop((lines, write));

        // Registered, then dropped: the failure budget starts over.
        let (mut lines, mut write) = accept(&listener).await;
        expect_handshake(&mut lines).await;
        write.write_all(b":srv 001 skein :Welcome\r\n").await.unwrap();
        write.shutdown().await.unwrap();
        drop((lines, write));

        // Dropped before the welcome again. This fails the retry budget
        // unless the welcome reset it.
        let (mut lines, write) = accept(&listener).await;
        expect_handshake(&mut lines).await;
        drop((lines, write));

        let (mut lines, _write) = accept(&listener).await;
        expect_handshake(&mut lines).await;

        shutdown.cancel();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_when_retries_exhausted() {
        let (listener, mut config) = listener().await;
        drop(listener);
        config.reconnect.max_retries = Some(1);
        config.reconnect.initial_delay_ms = 10;
        config.reconnect.max_delay_ms = 10;

        let result = timeout(
            Duration::from_secs(5),
            Connection::new(config, engine(&[])).run(CancellationToken::new()),
        )
        .await
        .unwrap();
        assert!(matches!(
            result,
            Err(RuntimeError::ReconnectExhausted { attempts: 1, .. })
        ));
    }
}
