//! Turns one parsed message into hook invocations.
//!
//! ```text
//! Message ─▶ event fan-out ──────────────┐
//!        ─▶ command detection (PRIVMSG) ─┼─▶ sieves ─▶ Hook::schedule ─▶ worker / task
//!        ─▶ regex fan-out (PRIVMSG) ─────┘
//! ```
//!
//! Everything up to and including the sieves runs on the caller's task, so
//! messages of one connection are matched in the order they arrive. Hook
//! bodies never run here.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use skein_core::{ConnectionHandle, Message, is_channel_name};
use tracing::{Level, debug, span, warn};

use crate::context::{Captures, HookContext, HookInput};
use crate::hook::Hook;
use crate::registry::{PluginRegistry, RegistrySnapshot};
use crate::sieve::{SharedSieve, run_sieves};
use crate::store::{Db, MemoryStore, SharedStore};

/// What one dispatch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Hook names handed to a worker or task, in scheduling order.
    pub scheduled: Vec<String>,
    /// Candidate command names when the typed word was ambiguous.
    pub ambiguous: Vec<String>,
    /// Hooks that a sieve vetoed.
    pub vetoed: Vec<String>,
    /// The command's help was sent instead of running it.
    pub autohelp: bool,
}

/// A command word located in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CommandMatch {
    word: String,
    rest: String,
}

/// Command regexes for one nick and prefix combination.
struct CommandPatterns {
    nick: String,
    prefix: String,
    channel: Regex,
    private: Regex,
}

impl CommandPatterns {
    fn build(nick: &str, prefix: &str) -> Result<Self, regex::Error> {
        let class = if prefix.is_empty() {
            String::new()
        } else {
            let chars: String = prefix
                .chars()
                .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
                .collect();
            format!("[{chars}]")
        };
        let addressed = format!(r"{}[:,;]*\s+", regex::escape(nick));

        let channel = if class.is_empty() {
            format!(r"(?i)^(?:{addressed})(\w+)(?:$|\s+)(.*)")
        } else {
            format!(r"(?i)^(?:{class}|{addressed})(\w+)(?:$|\s+)(.*)")
        };
        let optional = if class.is_empty() {
            String::new()
        } else {
            format!("{class}?")
        };
        let private = format!(r"(?i)^(?:{addressed}|{optional})(\w+)(?:$|\s+)(.*)");

        Ok(Self {
            nick: nick.to_owned(),
            prefix: prefix.to_owned(),
            channel: Regex::new(&channel)?,
            private: Regex::new(&private)?,
        })
    }

    fn find(&self, text: &str, private: bool) -> Option<CommandMatch> {
        let re = if private { &self.private } else { &self.channel };
        let caps = re.captures(text)?;
        Some(CommandMatch {
            word: caps.get(1)?.as_str().to_lowercase(),
            rest: caps.get(2).map_or("", |m| m.as_str()).trim().to_owned(),
        })
    }
}

/// Matches messages of one connection against the registry's current
/// snapshot.
pub struct DispatchEngine {
    registry: Arc<PluginRegistry>,
    sieves: Vec<SharedSieve>,
    store: SharedStore,
    settings: Arc<HashMap<String, Arc<Value>>>,
    patterns: Mutex<Option<Arc<CommandPatterns>>>,
}

impl DispatchEngine {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            sieves: Vec::new(),
            store: Arc::new(MemoryStore::new()),
            settings: Arc::new(HashMap::new()),
            patterns: Mutex::new(None),
        }
    }

    /// Appends sieves. They run in the order added.
    pub fn with_sieves<I>(mut self, sieves: I) -> Self
    where
        I: IntoIterator<Item = SharedSieve>,
    {
        self.sieves.extend(sieves);
        self
    }

    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = store;
        self
    }

    /// Per-unit settings tables handed to `PluginConfig`.
    pub fn with_settings(mut self, settings: Arc<HashMap<String, Arc<Value>>>) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Matches `message` and schedules every hook that survives the sieves.
    pub fn dispatch(&self, message: Arc<Message>, conn: &ConnectionHandle) -> DispatchReport {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            connection = conn.name(),
            command = %message.command
        );
        let _enter = span.enter();

        let snapshot = self.registry.snapshot();
        let mut report = DispatchReport::default();

        for hook in snapshot.event_hooks(&message.command) {
            let input = HookInput::Params(message.params.clone());
            self.submit(hook, &message, conn, input, None, &mut report);
        }

        if message.command == "PRIVMSG" {
            self.dispatch_command(&snapshot, &message, conn, &mut report);
            self.dispatch_regexes(&snapshot, &message, conn, &mut report);
        }

        if !report.scheduled.is_empty() {
            debug!(hooks = ?report.scheduled, "Scheduled");
        }
        report
    }

    fn dispatch_command(
        &self,
        snapshot: &RegistrySnapshot,
        message: &Arc<Message>,
        conn: &ConnectionHandle,
        report: &mut DispatchReport,
    ) {
        let Some(patterns) = self.patterns(conn) else {
            return;
        };
        let private = !message.param(0).is_some_and(is_channel_name);
        let Some(found) = patterns.find(message.last_param(), private) else {
            return;
        };

        let hook = match snapshot.command(&found.word) {
            Some(hook) => Arc::clone(hook),
            None => {
                let mut candidates: Vec<(&str, &Arc<Hook>)> = Vec::new();
                for (name, hook) in snapshot.commands_with_prefix(&found.word) {
                    if !candidates.iter().any(|(_, h)| Arc::ptr_eq(h, hook)) {
                        candidates.push((name, hook));
                    }
                }
                match candidates.as_slice() {
                    [] => return,
                    [(_, hook)] => Arc::clone(hook),
                    _ => {
                        let names: Vec<String> =
                            candidates.iter().map(|(n, _)| (*n).to_owned()).collect();
                        let notice = format!("Possible matches: {}", text_list(&names));
                        if let Err(e) = conn.notice(message.nick(), &notice) {
                            warn!(error = %e, "Failed to send disambiguation notice");
                        }
                        report.ambiguous = names;
                        return;
                    }
                }
            }
        };

        let Some(meta) = hook.command_meta() else {
            return;
        };
        if found.rest.is_empty() && meta.autohelp && let Some(doc) = &meta.doc {
            let input = HookInput::Text(String::new());
            let ctx = self.context(&hook, message, conn, input, Some(found.word.clone()));
            if run_sieves(&self.sieves, ctx, &hook).is_none() {
                report.vetoed.push(hook.name().to_owned());
                return;
            }
            let prefix: String = conn.info().command_prefix.chars().take(1).collect();
            let help = format!("{prefix}{} {doc}", found.word);
            if let Err(e) = conn.notice(message.nick(), &help) {
                warn!(error = %e, "Failed to send command help");
            }
            report.autohelp = true;
            return;
        }

        let input = HookInput::Text(found.rest);
        self.submit(&hook, message, conn, input, Some(found.word), report);
    }

    fn dispatch_regexes(
        &self,
        snapshot: &RegistrySnapshot,
        message: &Arc<Message>,
        conn: &ConnectionHandle,
        report: &mut DispatchReport,
    ) {
        let text = message.last_param();
        for hook in snapshot.regex_hooks() {
            let Some(re) = hook.regex() else {
                continue;
            };
            if let Some(caps) = re.captures(text) {
                let input = HookInput::Match(Captures::new(re, &caps));
                self.submit(hook, message, conn, input, None, report);
            }
        }
    }

    fn context(
        &self,
        hook: &Hook,
        message: &Arc<Message>,
        conn: &ConnectionHandle,
        input: HookInput,
        trigger: Option<String>,
    ) -> HookContext {
        let db = Db::new(Arc::clone(&self.store), conn.name());
        let settings = self.settings.get(&*hook.info().unit).cloned();
        HookContext::new(
            Arc::clone(message),
            conn.clone(),
            hook.info().clone(),
            input,
            trigger,
            db,
        )
        .with_settings(settings)
    }

    fn submit(
        &self,
        hook: &Hook,
        message: &Arc<Message>,
        conn: &ConnectionHandle,
        input: HookInput,
        trigger: Option<String>,
        report: &mut DispatchReport,
    ) {
        let ctx = self.context(hook, message, conn, input, trigger);
        match run_sieves(&self.sieves, ctx, hook) {
            Some(ctx) => {
                hook.schedule(Arc::new(ctx));
                report.scheduled.push(hook.name().to_owned());
            }
            None => report.vetoed.push(hook.name().to_owned()),
        }
    }

    /// Patterns for the connection's current nick, rebuilt after a rename.
    fn patterns(&self, conn: &ConnectionHandle) -> Option<Arc<CommandPatterns>> {
        let nick = conn.nick();
        let prefix = &conn.info().command_prefix;
        let mut cached = self.patterns.lock();
        if let Some(patterns) = cached.as_ref()
            && patterns.nick == nick
            && &patterns.prefix == prefix
        {
            return Some(Arc::clone(patterns));
        }
        match CommandPatterns::build(&nick, prefix) {
            Ok(patterns) => {
                let patterns = Arc::new(patterns);
                *cached = Some(Arc::clone(&patterns));
                Some(patterns)
            }
            Err(e) => {
                warn!(nick = %nick, prefix = %prefix, error = %e, "Cannot build command pattern");
                None
            }
        }
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("registry", &self.registry)
            .field("sieves", &self.sieves.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// `a`, `a or b`, `a, b or c`.
fn text_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {last}", init.join(", ")),
    }
}
