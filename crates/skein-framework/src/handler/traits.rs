//! Adapts plain async functions into hook handlers.
//!
//! Any `async fn` whose parameters all implement [`FromContext`] is a
//! handler. Parameters are extracted before the function runs; if any
//! extraction fails the handler is skipped.
//!
//! ```rust,ignore
//! async fn weather(Input(location): Input, db: Db) -> Result<String, StoreError> {
//!     db.set("weather", "last", &location).await?;
//!     Ok(format!("Sunny in {location}"))
//! }
//! ```

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::HookContext;
use crate::error::ExtractResult;
use crate::extractor::FromContext;

/// A function callable with values extracted from a [`HookContext`].
///
/// `T` is the tuple of parameter types and `R` the return type. Implemented
/// for async functions of up to 12 parameters.
pub trait FromCtxFn<R, T>: Clone + Send + Sync + 'static {
    /// Extracts every parameter and, if that succeeds, calls the function.
    fn call(self, ctx: Arc<HookContext>) -> BoxFuture<'static, ExtractResult<R>>;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, R, $($ty,)*> FromCtxFn<R, ($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: Send + 'static,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(self, ctx: Arc<HookContext>) -> BoxFuture<'static, ExtractResult<R>> {
                $(
                    let $ty = match $ty::from_context(&ctx) {
                        Ok(value) => value,
                        Err(e) => return futures::future::ready(Err(e)).boxed(),
                    };
                )*

                async move { Ok((self)($($ty,)*).await) }.boxed()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
