//! The demo's compiled-in unit and the handlers its manifests can use.

use serde::{Deserialize, Serialize};
use skein::framework::StoreError;
use skein::prelude::*;

// ============================================================================
// Compiled-in unit
// ============================================================================

/// Small demo commands: echo, ping, repeat, seen and karma.
pub static DEMO: PluginDescriptor = define_plugin! {
    /// Small demo commands: echo, ping, repeat, seen and karma.
    name: "demo",
    hooks: [
        command("echo").doc("<text> -- says <text> back").autohelp(true).handler(echo),
        command("ping").handler(ping),
        command("repeat")
            .doc("[-n times] <text> -- says <text> a few times")
            .autohelp(true)
            .handler(repeat),
        command("seen").doc("<nick> -- when <nick> last spoke").autohelp(true).handler(seen),
        command("karma").doc("<thing> -- karma of <thing>").autohelp(true).handler(karma),
        regex(r"^(\w+)\+\+$").name("karma_up").handler(karma_up),
        event(["PRIVMSG"]).name("track_seen").handler(track_seen),
        event(["JOIN"]).name("greet").handler(greet),
    ],
    metadata: {
        version: "0.1.0",
        desc: "Demo commands",
    },
};

async fn echo(Input(text): Input) -> String {
    text
}

async fn ping() -> &'static str {
    "pong"
}

#[derive(Debug, clap::Parser)]
struct Repeat {
    /// How many times, at most 5.
    #[arg(short = 'n', long, default_value_t = 2)]
    times: usize,
    #[arg(required = true)]
    words: Vec<String>,
}

async fn repeat(Args(args): Args<Repeat>, say: Say) -> TransportResult<()> {
    let text = args.words.join(" ");
    for _ in 0..args.times.min(5) {
        say.send(&text)?;
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct Sighting {
    chan: String,
    text: String,
}

async fn track_seen(Nick(nick): Nick, Chan(chan): Chan, Input(text): Input, db: Db) -> Result<(), StoreError> {
    db.set("seen", &nick.to_lowercase(), &Sighting { chan, text }).await
}

async fn seen(Input(who): Input, db: Db) -> Result<String, StoreError> {
    let who = who.trim();
    Ok(match db.get::<Sighting>("seen", &who.to_lowercase()).await? {
        Some(s) => format!("{who} was last seen in {} saying \"{}\"", s.chan, s.text),
        None => format!("I have not seen {who}"),
    })
}

async fn karma_up(Match(caps): Match, db: Db) -> Result<(), StoreError> {
    let Some(thing) = caps.get(1).map(|s| s.to_lowercase()) else {
        return Ok(());
    };
    let current = db.get::<i64>("karma", &thing).await?.unwrap_or(0);
    db.set("karma", &thing, &(current + 1)).await
}

async fn karma(Input(thing): Input, db: Db) -> Result<String, StoreError> {
    let thing = thing.trim().to_lowercase();
    let points = db.get::<i64>("karma", &thing).await?.unwrap_or(0);
    Ok(format!("{thing} has {points} karma"))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DemoSettings {
    greeting: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            greeting: "welcome".to_owned(),
        }
    }
}

async fn greet(Nick(nick): Nick, conn: ConnectionHandle, settings: PluginConfig<DemoSettings>) -> Option<String> {
    (!conn.is_me(&nick)).then(|| format!("{}, {nick}", settings.greeting))
}

// ============================================================================
// Handlers for plugins/*.toml
// ============================================================================

/// Handlers that manifests bind to by name.
pub fn catalog() -> HandlerCatalog {
    HandlerCatalog::new()
        .with("say", say)
        .with("join", join)
        .with("wave", wave)
}

async fn say(Input(text): Input, say: Say) -> TransportResult<()> {
    say.send(&text)
}

async fn join(Input(channel): Input, conn: ConnectionHandle) -> TransportResult<()> {
    conn.join(channel.trim())
}

async fn wave(Nick(nick): Nick, action: Action) -> TransportResult<()> {
    action.send(&format!("waves at {nick}"))
}
