use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::error;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{Handler, HandlerResult};

/// Turns a panic in the rest of the chain into [`Error::Panic`], which the
/// server answers with a 500.
///
/// Install it first so that it wraps everything else.
#[derive(Clone, Copy, Default)]
pub struct Recovery;

impl Recovery {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for Recovery {
    fn call(&self, c: Context) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move {
            match AssertUnwindSafe(c.next()).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(method = %c.method(), path = %c.path(), panic = %message, "handler panicked");
                    Err(Error::Panic(message))
                }
            }
        })
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
