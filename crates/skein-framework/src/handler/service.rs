//! Core handler service for the skein framework.
//!
//! [`HandlerService<F, R, T>`] wraps a single handler and implements
//! `tower::Service<Arc<HookContext>>`. The registry stores it type-erased as
//! a [`BoxedHookService`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service};
use tracing::{debug, error};

use super::traits::FromCtxFn;
use crate::context::HookContext;

/// A type-erased hook service.
pub type BoxedHookService = BoxCloneSyncService<Arc<HookContext>, (), BoxError>;

// ============================================================================
// HandlerResponse
// ============================================================================

/// What a handler's return value does once the handler finishes.
#[async_trait]
pub trait HandlerResponse: Send + 'static {
    /// Performs the side effects of the returned value, such as replying.
    async fn process_response(self, ctx: &HookContext);
}

/// Nothing to send.
#[async_trait]
impl HandlerResponse for () {
    async fn process_response(self, _ctx: &HookContext) {}
}

/// Implementation for `String` - sent back with the hook's default reply.
///
/// Blank strings are not sent.
#[async_trait]
impl HandlerResponse for String {
    async fn process_response(self, ctx: &HookContext) {
        if !self.trim().is_empty() {
            ctx.respond(&self);
        }
    }
}

#[async_trait]
impl HandlerResponse for &'static str {
    async fn process_response(self, ctx: &HookContext) {
        if !self.trim().is_empty() {
            ctx.respond(self);
        }
    }
}

/// `None` stays silent.
#[async_trait]
impl<T: HandlerResponse> HandlerResponse for Option<T> {
    async fn process_response(self, ctx: &HookContext) {
        if let Some(t) = self {
            t.process_response(ctx).await;
        }
    }
}

/// Errors are logged against the hook and never shown on IRC.
#[async_trait]
impl<T: HandlerResponse, E: std::fmt::Display + Send + 'static> HandlerResponse for Result<T, E> {
    async fn process_response(self, ctx: &HookContext) {
        match self {
            Ok(t) => t.process_response(ctx).await,
            Err(e) => {
                let hook = ctx.hook();
                error!(unit = %hook.unit, hook = %hook.name, "Handler error: {e}");
            }
        }
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] that calls a single generic handler.
pub struct HandlerService<F, R, T> {
    handler: F,
    _marker: PhantomData<fn() -> (R, T)>,
}

impl<F, R, T> HandlerService<F, R, T> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<F: Clone, R, T> Clone for HandlerService<F, R, T> {
    fn clone(&self) -> Self {
        HandlerService {
            handler: self.handler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<F, R, T> From<F> for HandlerService<F, R, T> {
    fn from(handler: F) -> Self {
        HandlerService::new(handler)
    }
}

impl<F, R, T> Service<Arc<HookContext>> for HandlerService<F, R, T>
where
    F: FromCtxFn<R, T>,
    R: HandlerResponse,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<HookContext>) -> Self::Future {
        let handler = self.handler.clone();
        async move {
            match handler.call(ctx.clone()).await {
                Ok(r) => r.process_response(&ctx).await,
                Err(e) => {
                    debug!(hook = %ctx.hook().name, reason = %e, "Handler skipped");
                }
            }
            Ok(())
        }
        .boxed()
    }
}
