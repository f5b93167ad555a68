//! Handler system for the skein framework.
//!
//! - **Traits** ([`traits`]) – [`FromCtxFn`], implemented for async functions
//!   whose parameters are extractors, similar to Axum's handler system.
//! - **Service** ([`service`]) – [`HandlerService`], the `tower::Service`
//!   wrapper, and [`HandlerResponse`] for handler return values.
//!
//! ```text
//! command("echo")        ← HookBuilder
//!     .handler(echo)     ← HandlerService<echo> boxed as BoxedHookService
//! ```
//!
//! A returned `String` is sent back to where the hook fired: event hooks say
//! it to the channel, command and regex hooks reply to the caller.

pub mod service;
pub mod traits;

pub use service::{BoxedHookService, HandlerResponse, HandlerService};
pub use traits::FromCtxFn;
