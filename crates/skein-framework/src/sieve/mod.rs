//! Pre-dispatch filters.
//!
//! Every matched hook's context passes through the sieve chain before it is
//! scheduled. A sieve returns the context to let it through (possibly
//! replaced), `None` to veto, or an error, which is logged and treated as a
//! veto. Sieves run synchronously on the dispatching task, in order, and the
//! chain stops at the first veto.

pub mod builtin;

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::context::HookContext;
use crate::error::SieveError;
use crate::hook::Hook;

pub use builtin::{AclRule, AclSieve, DisabledSieve, IgnoreSieve, PermissionGroup, PermissionSieve, SieveConfig, builtin_sieves};

/// A pre-dispatch filter.
pub trait Sieve: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn sieve(&self, ctx: HookContext, hook: &Hook) -> Result<Option<HookContext>, SieveError>;
}

/// Shared sieve handle.
pub type SharedSieve = Arc<dyn Sieve>;

/// A sieve backed by a closure.
pub struct FnSieve<F> {
    name: String,
    f: F,
}

impl<F> Sieve for FnSieve<F>
where
    F: Fn(HookContext, &Hook) -> Result<Option<HookContext>, SieveError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn sieve(&self, ctx: HookContext, hook: &Hook) -> Result<Option<HookContext>, SieveError> {
        (self.f)(ctx, hook)
    }
}

/// Wraps a closure as a sieve.
///
/// ```rust,ignore
/// let quiet_hours = sieve_fn("quiet", |ctx, _hook| Ok((!is_night()).then_some(ctx)));
/// ```
pub fn sieve_fn<F>(name: impl Into<String>, f: F) -> SharedSieve
where
    F: Fn(HookContext, &Hook) -> Result<Option<HookContext>, SieveError> + Send + Sync + 'static,
{
    Arc::new(FnSieve {
        name: name.into(),
        f,
    })
}

/// Runs `ctx` through `sieves` in order. `None` means some sieve vetoed.
pub fn run_sieves(sieves: &[SharedSieve], mut ctx: HookContext, hook: &Hook) -> Option<HookContext> {
    for sieve in sieves {
        ctx = match sieve.sieve(ctx, hook) {
            Ok(Some(ctx)) => ctx,
            Ok(None) => {
                debug!(sieve = sieve.name(), hook = hook.name(), "Vetoed");
                return None;
            }
            Err(e) => {
                warn!(sieve = sieve.name(), hook = hook.name(), error = %e, "Sieve failed, vetoing");
                return None;
            }
        };
    }
    Some(ctx)
}

// =============================================================================
// Wildcard masks
// =============================================================================

/// A set of `nick!user@host` patterns where `*` matches any run and `?` any
/// single character. Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct MaskSet {
    patterns: Vec<Regex>,
}

impl MaskSet {
    pub fn new<I, S>(masks: I) -> Result<Self, SieveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = masks
            .into_iter()
            .map(|mask| {
                let mask = mask.as_ref();
                RegexBuilder::new(&wildcard_to_regex(mask))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| SieveError::new("mask", format!("`{mask}`: {e}")))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, mask: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(mask))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn wildcard_to_regex(mask: &str) -> String {
    let mut out = String::with_capacity(mask.len() + 8);
    out.push('^');
    for ch in mask.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HookInput;
    use crate::context::tests::context;
    use crate::hook::{HookKind, command};

    async fn noop() {}

    #[test]
    fn test_mask_wildcards() {
        let set = MaskSet::new(["*!*@*.example.net", "spam?bot!*@*"]).unwrap();
        assert!(set.matches("alice!a@host.EXAMPLE.net"));
        assert!(set.matches("spam1bot!x@y"));
        assert!(!set.matches("spam12bot!x@y"));
        assert!(!set.matches("alice!a@example.org"));
        // Regex metacharacters in masks are literal.
        assert!(!MaskSet::new(["a.b!*@*"]).unwrap().matches("axb!u@h"));
    }

    #[tokio::test]
    async fn test_chain_short_circuits() {
        let hook = Hook::compile("unit", false, command("x").handler(noop)).unwrap();
        let (ctx, _rx) = context(
            ":alice!a@h PRIVMSG #c :.x",
            HookKind::Command,
            HookInput::Text(String::new()),
        );

        let reached = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = reached.clone();
        let sieves = vec![
            sieve_fn("pass", |ctx, _| Ok(Some(ctx))),
            sieve_fn("fail", |_, _| Err(SieveError::new("fail", "broken"))),
            sieve_fn("after", move |ctx, _| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(Some(ctx))
            }),
        ];

        assert!(run_sieves(&sieves, ctx, &hook).is_none());
        assert!(!reached.load(std::sync::atomic::Ordering::SeqCst));
    }
}
