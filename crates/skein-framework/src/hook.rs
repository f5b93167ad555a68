//! Hook declarations and their compiled form.
//!
//! Plugins declare hooks with the builder functions [`command`], [`event`]
//! and [`regex`], finishing each with `.handler(f)`:
//!
//! ```rust,ignore
//! use skein_framework::hook::{command, event, regex};
//!
//! command("weather")
//!     .alias("w")
//!     .doc("<location> -- current conditions")
//!     .handler(weather);
//!
//! event(["JOIN"]).handler(greet);
//! regex(r"youtube\.com/watch\?v=([\w-]+)").handler(youtube_title);
//! ```
//!
//! The registry compiles each [`HookDef`] into a [`Hook`]: patterns are
//! compiled once and serialized hooks get their own worker.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::context::HookContext;
use crate::error::LoadError;
use crate::handler::{BoxedHookService, FromCtxFn, HandlerResponse, HandlerService};
use crate::worker::{Worker, run_service};

// =============================================================================
// Kinds and metadata
// =============================================================================

/// The three ways a hook can be triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// A named command typed by a user.
    Command,
    /// A protocol command or numeric.
    Event,
    /// A pattern searched for in message text.
    Regex,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "command",
            Self::Event => "event",
            Self::Regex => "regex",
        })
    }
}

/// Identity of a compiled hook, shared with every invocation.
#[derive(Debug, Clone)]
pub struct HookInfo {
    pub unit: Arc<str>,
    pub name: Arc<str>,
    pub kind: HookKind,
    /// Declared by a core unit.
    pub core: bool,
}

/// Command-specific options.
#[derive(Debug, Clone, Default)]
pub struct CommandMeta {
    /// Primary name first, then aliases. Always lowercase.
    pub names: Vec<String>,
    pub doc: Option<String>,
    /// Send the doc instead of running when invoked without arguments.
    pub autohelp: bool,
    /// Permission names; the caller needs any one of them.
    pub permissions: Vec<String>,
}

impl CommandMeta {
    pub fn primary(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }
}

/// What a declared hook reacts to.
#[derive(Debug, Clone)]
pub enum HookTrigger {
    Command(CommandMeta),
    /// Uppercased event names; `*` matches every message.
    Event(Vec<String>),
    /// Uncompiled pattern.
    Regex(String),
}

impl HookTrigger {
    pub fn kind(&self) -> HookKind {
        match self {
            Self::Command(_) => HookKind::Command,
            Self::Event(_) => HookKind::Event,
            Self::Regex(_) => HookKind::Regex,
        }
    }

    fn default_name(&self) -> String {
        match self {
            Self::Command(meta) => meta.primary().to_owned(),
            Self::Event(events) => events.join(",").to_lowercase(),
            Self::Regex(pattern) => pattern.clone(),
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Declares a command hook. The name is matched case-insensitively.
pub fn command(name: impl Into<String>) -> HookBuilder {
    HookBuilder::new(HookTrigger::Command(CommandMeta {
        names: vec![name.into().to_lowercase()],
        ..Default::default()
    }))
}

/// Declares an event hook for the given commands or numerics.
pub fn event<I, S>(events: I) -> HookBuilder
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    HookBuilder::new(HookTrigger::Event(
        events
            .into_iter()
            .map(|e| e.as_ref().to_uppercase())
            .collect(),
    ))
}

/// Declares a regex hook, searched anywhere in the last parameter of a PRIVMSG.
pub fn regex(pattern: impl Into<String>) -> HookBuilder {
    HookBuilder::new(HookTrigger::Regex(pattern.into()))
}

/// Builder returned by [`command`], [`event`] and [`regex`].
#[derive(Debug, Clone)]
#[must_use = "a hook builder does nothing until `.handler()` is called"]
pub struct HookBuilder {
    trigger: HookTrigger,
    name: Option<String>,
    serialized: bool,
}

impl HookBuilder {
    pub fn new(trigger: HookTrigger) -> Self {
        Self {
            trigger,
            name: None,
            serialized: false,
        }
    }

    /// Usage text. Only commands use it.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        if let HookTrigger::Command(meta) = &mut self.trigger {
            meta.doc = Some(doc.into());
        }
        self
    }

    pub fn autohelp(mut self, enabled: bool) -> Self {
        if let HookTrigger::Command(meta) = &mut self.trigger {
            meta.autohelp = enabled;
        }
        self
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let HookTrigger::Command(meta) = &mut self.trigger {
            meta.permissions.extend(permissions.into_iter().map(Into::into));
        }
        self
    }

    /// Registers another name for the same command.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        if let HookTrigger::Command(meta) = &mut self.trigger {
            let alias = alias.into().to_lowercase();
            if !meta.names.contains(&alias) {
                meta.names.push(alias);
            }
        }
        self
    }

    /// Runs invocations one at a time, in arrival order, on a dedicated worker.
    pub fn serialized(mut self) -> Self {
        self.serialized = true;
        self
    }

    /// Overrides the name used in logs, ACLs and the disabled list.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Finishes the declaration with a handler function.
    pub fn handler<F, R, T>(self, handler: F) -> HookDef
    where
        F: FromCtxFn<R, T>,
        R: HandlerResponse,
        T: 'static,
    {
        self.service(BoxedHookService::new(HandlerService::new(handler)))
    }

    /// Finishes the declaration with an already erased service.
    pub fn service(self, service: BoxedHookService) -> HookDef {
        let name = self.name.unwrap_or_else(|| self.trigger.default_name());
        HookDef {
            trigger: self.trigger,
            name,
            serialized: self.serialized,
            service,
        }
    }
}

/// A finished, not yet compiled hook declaration.
#[derive(Clone)]
pub struct HookDef {
    trigger: HookTrigger,
    name: String,
    serialized: bool,
    service: BoxedHookService,
}

impl HookDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HookKind {
        self.trigger.kind()
    }

    pub fn trigger(&self) -> &HookTrigger {
        &self.trigger
    }

    pub fn is_serialized(&self) -> bool {
        self.serialized
    }
}

impl fmt::Debug for HookDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDef")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("serialized", &self.serialized)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Compiled hook
// =============================================================================

/// Trigger data in the form the dispatcher matches against.
#[derive(Debug, Clone)]
pub enum HookMatcher {
    Command(CommandMeta),
    Event(Vec<String>),
    Regex(Regex),
}

/// A loaded hook, ready for dispatch.
pub struct Hook {
    info: HookInfo,
    matcher: HookMatcher,
    service: BoxedHookService,
    worker: Option<Worker>,
}

impl Hook {
    /// Compiles a declaration. Serialized hooks spawn their worker here, so
    /// this must run inside a tokio runtime.
    pub(crate) fn compile(unit: &str, core: bool, def: HookDef) -> Result<Self, LoadError> {
        let kind = def.kind();
        let invalid = |name: &str| LoadError::InvalidName {
            hook: def.name.clone(),
            name: name.to_owned(),
        };
        let matcher = match def.trigger {
            // A name with whitespace could never be typed as one word.
            HookTrigger::Command(meta) => {
                if let Some(bad) = meta
                    .names
                    .iter()
                    .find(|n| n.is_empty() || n.contains(char::is_whitespace))
                {
                    return Err(invalid(bad));
                }
                HookMatcher::Command(meta)
            }
            HookTrigger::Event(events) => {
                if let Some(bad) = events.iter().find(|e| e.trim().is_empty()) {
                    return Err(invalid(bad));
                }
                HookMatcher::Event(events)
            }
            HookTrigger::Regex(pattern) => {
                HookMatcher::Regex(Regex::new(&pattern).map_err(|e| LoadError::InvalidRegex {
                    hook: def.name.clone(),
                    reason: e.to_string(),
                })?)
            }
        };

        let info = HookInfo {
            unit: Arc::from(unit),
            name: Arc::from(def.name.as_str()),
            kind,
            core,
        };

        let worker = if def.serialized {
            Some(Worker::spawn(&info, def.service.clone())?)
        } else {
            None
        };

        Ok(Self {
            info,
            matcher,
            service: def.service,
            worker,
        })
    }

    pub fn info(&self) -> &HookInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn kind(&self) -> HookKind {
        self.info.kind
    }

    pub fn matcher(&self) -> &HookMatcher {
        &self.matcher
    }

    pub fn command_meta(&self) -> Option<&CommandMeta> {
        match &self.matcher {
            HookMatcher::Command(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn regex(&self) -> Option<&Regex> {
        match &self.matcher {
            HookMatcher::Regex(re) => Some(re),
            _ => None,
        }
    }

    pub fn is_serialized(&self) -> bool {
        self.worker.is_some()
    }

    pub fn worker(&self) -> Option<&Worker> {
        self.worker.as_ref()
    }

    /// Hands an invocation to the worker, or to a fresh task.
    pub(crate) fn schedule(&self, ctx: Arc<HookContext>) {
        match &self.worker {
            Some(worker) => {
                if !worker.submit(ctx) {
                    warn!(
                        unit = %self.info.unit,
                        hook = %self.info.name,
                        "Worker stopped, invocation dropped"
                    );
                }
            }
            None => {
                tokio::spawn(run_service(self.service.clone(), ctx));
            }
        }
    }

    /// Stops the worker of a serialized hook. Queued invocations are dropped.
    pub(crate) fn stop(&self) {
        if let Some(worker) = &self.worker {
            worker.stop();
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("info", &self.info)
            .field("matcher", &self.matcher)
            .field("serialized", &self.is_serialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop() {}

    #[test]
    fn test_command_builder() {
        let def = command("Weather")
            .alias("W")
            .alias("w")
            .doc("<location> -- current conditions")
            .autohelp(true)
            .permissions(["botcontrol"])
            .handler(noop);

        assert_eq!(def.name(), "weather");
        assert_eq!(def.kind(), HookKind::Command);
        let HookTrigger::Command(meta) = def.trigger() else {
            panic!("expected command trigger");
        };
        assert_eq!(meta.names, vec!["weather", "w"]);
        assert_eq!(meta.primary(), "weather");
        assert!(meta.autohelp);
        assert_eq!(meta.permissions, vec!["botcontrol"]);
    }

    #[test]
    fn test_event_names_uppercased() {
        let def = event(["privmsg", "*"]).name("logger").handler(noop);
        assert_eq!(def.name(), "logger");
        let HookTrigger::Event(events) = def.trigger() else {
            panic!("expected event trigger");
        };
        assert_eq!(events, &vec!["PRIVMSG".to_owned(), "*".to_owned()]);
    }

    #[test]
    fn test_doc_ignored_for_non_commands() {
        let def = regex("a+").doc("ignored").serialized().handler(noop);
        assert!(def.is_serialized());
        assert!(matches!(def.trigger(), HookTrigger::Regex(p) if p == "a+"));
    }

    #[test]
    fn test_compile_rejects_bad_pattern() {
        let def = regex("(unclosed").handler(noop);
        assert!(matches!(
            Hook::compile("unit", false, def),
            Err(LoadError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_compile_rejects_untypable_names() {
        for def in [
            command("").handler(noop),
            command("two words").handler(noop),
            command("ok").alias(" ").handler(noop),
            event([""]).handler(noop),
        ] {
            assert!(matches!(
                Hook::compile("unit", false, def),
                Err(LoadError::InvalidName { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_compile_spawns_worker_for_serialized() {
        let hook = Hook::compile("unit", false, command("a").serialized().handler(noop)).unwrap();
        assert!(hook.is_serialized());
        assert_eq!(&*hook.info().unit, "unit");
        hook.stop();

        let plain = Hook::compile("unit", false, command("b").handler(noop)).unwrap();
        assert!(!plain.is_serialized());
        assert_eq!(plain.command_meta().map(CommandMeta::primary), Some("b"));
    }
}
