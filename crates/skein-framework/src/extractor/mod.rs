//! Extractor system for the skein framework.
//!
//! Handler parameters are filled from the [`HookContext`] through the
//! [`FromContext`] trait:
//!
//! ```rust,ignore
//! pub trait FromContext: Sized {
//!     fn from_context(ctx: &HookContext) -> ExtractResult<Self>;
//! }
//! ```
//!
//! # Built-in extractors
//!
//! | Extractor | Value |
//! |-----------|-------|
//! | [`Input`] | Command arguments, regex match or last event parameter |
//! | [`Trigger`] | Command word as typed (command hooks only) |
//! | [`Chan`] / [`Nick`] | Reply target and sender |
//! | [`Params`] | Parameter list of the message |
//! | [`Match`] | Regex captures (regex hooks only) |
//! | [`Reply`] / [`Say`] / [`Notice`] / [`Action`] | Senders bound to the invocation |
//! | `Arc<Message>`, [`ConnectionHandle`], [`Db`], [`HookInfo`] | Raw context parts |
//!
//! # Error Handling
//!
//! If an extractor fails, the handler is skipped. [`Option<T>`] never fails.
//!
//! [`HookContext`]: crate::context::HookContext
//! [`ConnectionHandle`]: skein_core::ConnectionHandle
//! [`Db`]: crate::store::Db
//! [`HookInfo`]: crate::hook::HookInfo

pub mod core;
pub mod input;
pub mod sender;

pub use core::FromContext;
pub use input::{Chan, Input, Match, Nick, Params, Trigger};
pub use sender::{Action, Notice, Reply, Say};
