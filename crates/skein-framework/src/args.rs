//! Clap-parsed command arguments.
//!
//! [`Args<T>`] shell-splits the hook's input and parses it with `T`. On a
//! parse error the user gets the first line of clap's message as a notice
//! and the handler is skipped.
//!
//! ```rust,ignore
//! #[derive(clap::Parser)]
//! struct Roll {
//!     #[arg(default_value_t = 6)]
//!     sides: u32,
//! }
//!
//! async fn roll(Args(args): Args<Roll>) -> String {
//!     format!("rolled a d{}", args.sides)
//! }
//! ```

use std::ops::{Deref, DerefMut};

use clap::Parser;
use tracing::warn;

use crate::context::HookContext;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// Parsed arguments of a command hook.
#[derive(Debug, Clone)]
pub struct Args<T: Parser>(pub T);

impl<T: Parser> Args<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Parser> Deref for Args<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Parser> DerefMut for Args<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Parser + Send + 'static> FromContext for Args<T> {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        let program = ctx.trigger().unwrap_or_else(|| ctx.hook().name.as_ref()).to_owned();
        let argv = std::iter::once(program).chain(shell_split(ctx.text()));

        match T::try_parse_from(argv) {
            Ok(parsed) => Ok(Args(parsed)),
            Err(e) => {
                let rendered = e.to_string();
                let first = rendered
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .unwrap_or("invalid arguments");
                if let Err(send) = ctx.notice(first) {
                    warn!(hook = %ctx.hook().name, error = %send, "Failed to send usage notice");
                }
                Err(ExtractError::custom(first))
            }
        }
    }
}

/// Splits `input` on whitespace, honoring single and double quotes and
/// backslash escapes inside double quotes.
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double => escape_next = true,
            '\'' if !in_double => {
                in_single = !in_single;
                quoted = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }
    args
}
