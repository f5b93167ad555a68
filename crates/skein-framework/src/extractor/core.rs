use std::sync::Arc;

use skein_core::{ConnectionHandle, Message};

use crate::context::HookContext;
use crate::error::ExtractResult;
use crate::hook::HookInfo;
use crate::store::Db;

/// A trait for types that can be extracted from a [`HookContext`].
///
/// Types implementing this trait can be used directly as handler function
/// parameters. If extraction fails the handler is skipped.
pub trait FromContext: Sized {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self>;
}

/// Optional parameters never fail; they are `None` when unavailable.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

impl FromContext for Arc<Message> {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        Ok(ctx.message_arc())
    }
}

/// The connection the hook fired on, for sending anything.
impl FromContext for ConnectionHandle {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        Ok(ctx.conn().clone())
    }
}

impl FromContext for HookInfo {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        Ok(ctx.hook().clone())
    }
}

impl FromContext for Db {
    fn from_context(ctx: &HookContext) -> ExtractResult<Self> {
        Ok(ctx.db().clone())
    }
}
