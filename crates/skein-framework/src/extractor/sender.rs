//! Senders bound to the current invocation.
//!
//! ```rust,ignore
//! async fn slap(Input(who): Input, action: Action) {
//!     let _ = action.send(&format!("slaps {who} with a large trout"));
//! }
//! ```

use skein_core::{ConnectionHandle, TransportResult};

use crate::context::HookContext;
use crate::error::ExtractResult;
use crate::extractor::FromContext;

/// Replies to the caller, prefixed with their nick in channels.
#[derive(Debug, Clone)]
pub struct Reply {
    conn: ConnectionHandle,
    target: String,
    prefix: Option<String>,
}

impl Reply {
    pub fn send(&self, text: &str) -> TransportResult<()> {
        match &self.prefix {
            Some(nick) => self.conn.privmsg(&self.target, &format!("{nick}: {text}")),
            None => self.conn.privmsg(&self.target, text),
        }
    }
}

impl FromContext for Reply {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        let prefix = (!ctx.is_private() && !ctx.nick().is_empty()).then(|| ctx.nick().to_owned());
        Ok(Self {
            conn: ctx.conn().clone(),
            target: ctx.chan().to_owned(),
            prefix,
        })
    }
}

macro_rules! targeted_sender {
    ($(#[$doc:meta])* $name:ident, $target:ident, $method:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            conn: ConnectionHandle,
            target: String,
        }

        impl $name {
            pub fn send(&self, text: &str) -> TransportResult<()> {
                self.conn.$method(&self.target, text)
            }
        }

        impl FromContext for $name {
            fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
                Ok(Self {
                    conn: ctx.conn().clone(),
                    target: ctx.$target().to_owned(),
                })
            }
        }
    };
}

targeted_sender!(
    /// Says something in the reply target without addressing anyone.
    Say,
    chan,
    privmsg
);

targeted_sender!(
    /// Sends a private notice to the caller.
    Notice,
    nick,
    notice
);

targeted_sender!(
    /// Sends a CTCP ACTION (`/me`) to the reply target.
    Action,
    chan,
    action
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HookInput;
    use crate::context::tests::context;
    use crate::hook::HookKind;

    #[test]
    fn test_senders() {
        let (ctx, mut rx) = context(
            ":alice!a@h PRIVMSG #rust :.slap bob",
            HookKind::Command,
            HookInput::Text("bob".into()),
        );

        Reply::from_context(&ctx).unwrap().send("ok").unwrap();
        Say::from_context(&ctx).unwrap().send("hi all").unwrap();
        Notice::from_context(&ctx).unwrap().send("psst").unwrap();
        Action::from_context(&ctx).unwrap().send("waves").unwrap();

        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #rust :alice: ok");
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #rust :hi all");
        assert_eq!(rx.try_recv().unwrap(), "NOTICE alice :psst");
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #rust :\u{1}ACTION waves\u{1}");
    }

    #[test]
    fn test_reply_in_private_has_no_prefix() {
        let (ctx, mut rx) = context(
            ":alice!a@h PRIVMSG skein :help",
            HookKind::Command,
            HookInput::Text(String::new()),
        );
        Reply::from_context(&ctx).unwrap().send("sure").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG alice :sure");
    }
}
