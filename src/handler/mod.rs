//! Handlers, middleware and the chain that runs them.
//!
//! A handler and a middleware are the same thing: something that takes the
//! request's [`Context`] and returns a future resolving to a
//! [`HandlerResult`]. A middleware is simply a handler that calls
//! [`Context::next`] somewhere in its body, which runs the remainder of the
//! chain and hands back its outcome:
//!
//! ```text
//! global[0] ── next ──▶ global[1] ── next ──▶ group[0] ── next ──▶ route handler
//!    ◀──────────────────────◀──────────────────────◀──── result ─────┘
//! ```
//!
//! Work done before `next().await` runs in registration order; work done
//! after it runs in reverse. A handler that never calls `next` ends the
//! chain there.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::Error;

pub type HandlerResult = Result<(), Error>;

pub trait Handler: Send + Sync + 'static {
    fn call(&self, c: Context) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, c: Context) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(c))
    }
}

pub(crate) type BoxedHandler = Arc<dyn Handler>;

pub(crate) fn boxed(handler: impl Handler) -> BoxedHandler {
    Arc::new(handler)
}

/// An ordered, immutable list of handlers shared by every request that
/// resolves to the same route.
#[derive(Clone)]
pub(crate) struct Chain {
    handlers: Arc<[BoxedHandler]>,
}

impl Chain {
    pub(crate) fn new(handlers: Vec<BoxedHandler>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    /// Runs the element at `index`. Past the end of the chain there is
    /// nothing left to do.
    pub(crate) fn call_at(&self, index: usize, c: Context) -> BoxFuture<'static, HandlerResult> {
        match self.handlers.get(index) {
            Some(handler) => handler.call(c),
            None => Box::pin(async { Ok(()) }),
        }
    }
}
