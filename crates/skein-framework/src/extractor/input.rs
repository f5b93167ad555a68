//! Extractors for the message and the hook's input.

use std::ops::Deref;

use crate::context::{Captures, HookContext, HookInput};
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

macro_rules! string_extractor {
    ($(#[$doc:meta])* $name:ident, |$ctx:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub String);

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl FromContext for $name {
            fn from_context($ctx: &HookContext) -> ExtractResult<Self> {
                $body.map($name)
            }
        }
    };
}

string_extractor!(
    /// The hook's input as text. See [`HookContext::text`].
    Input,
    |ctx| Ok::<_, ExtractError>(ctx.text().to_owned())
);

string_extractor!(
    /// The command word as typed, lowercased. Fails outside command hooks.
    Trigger,
    |ctx| ctx
        .trigger()
        .map(str::to_owned)
        .ok_or(ExtractError::Missing { what: "trigger" })
);

string_extractor!(
    /// Reply target: the channel, or the sender in private.
    Chan,
    |ctx| Ok::<_, ExtractError>(ctx.chan().to_owned())
);

string_extractor!(
    /// Sender nick, or the server name for server-prefixed lines. Fails for
    /// prefix-less messages.
    Nick,
    |ctx| {
        let nick = ctx.nick();
        if nick.is_empty() {
            Err(ExtractError::Missing { what: "nick" })
        } else {
            Ok(nick.to_owned())
        }
    }
);

/// Parameters of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params(pub Vec<String>);

impl Deref for Params {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl FromContext for Params {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        Ok(match ctx.input() {
            HookInput::Params(params) => Params(params.clone()),
            _ => Params(ctx.message().params.clone()),
        })
    }
}

/// Regex captures. Fails outside regex hooks.
#[derive(Debug, Clone)]
pub struct Match(pub Captures);

impl Deref for Match {
    type Target = Captures;

    fn deref(&self) -> &Captures {
        &self.0
    }
}

impl FromContext for Match {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        match ctx.input() {
            HookInput::Match(caps) => Ok(Match(caps.clone())),
            _ => Err(ExtractError::Missing { what: "regex match" }),
        }
    }
}
