//! Per-hook workers for serialized hooks.
//!
//! A serialized hook owns one [`Worker`]: an unbounded queue drained by a
//! single task, so invocations run one at a time in submission order. The
//! worker lives as long as its hook is loaded and stops when the hook is
//! unloaded or replaced.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, error};

use crate::context::HookContext;
use crate::error::LoadError;
use crate::handler::BoxedHookService;
use crate::hook::HookInfo;

/// Runs one invocation to completion. Errors and panics are logged and
/// never escape.
pub(crate) async fn run_service(service: BoxedHookService, ctx: Arc<HookContext>) {
    let unit = Arc::clone(&ctx.hook().unit);
    let hook = Arc::clone(&ctx.hook().name);

    match AssertUnwindSafe(service.oneshot(ctx)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(unit = %unit, hook = %hook, error = %e, "Hook failed"),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            error!(unit = %unit, hook = %hook, reason = %reason, "Hook panicked");
        }
    }
}

/// Handle to the task serving one serialized hook.
#[derive(Debug)]
pub struct Worker {
    tx: mpsc::UnboundedSender<Arc<HookContext>>,
    token: CancellationToken,
}

impl Worker {
    /// Spawns the worker task on the current runtime.
    pub(crate) fn spawn(info: &HookInfo, service: BoxedHookService) -> Result<Self, LoadError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| LoadError::Runtime {
            hook: info.name.to_string(),
            reason: e.to_string(),
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<HookContext>>();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let unit = Arc::clone(&info.unit);
        let hook = Arc::clone(&info.name);

        handle.spawn(async move {
            debug!(unit = %unit, hook = %hook, "Worker started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(ctx) => run_service(service.clone(), ctx).await,
                        None => break,
                    },
                }
            }
            debug!(unit = %unit, hook = %hook, "Worker stopped");
        });

        Ok(Self { tx, token })
    }

    /// Queues an invocation. Returns `false` once the worker has stopped.
    pub fn submit(&self, ctx: Arc<HookContext>) -> bool {
        !self.token.is_cancelled() && self.tx.send(ctx).is_ok()
    }

    /// Stops the worker after its current invocation.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
