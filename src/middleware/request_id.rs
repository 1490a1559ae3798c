use futures::future::BoxFuture;
use uuid::Uuid;

use crate::context::Context;
use crate::handler::{Handler, HandlerResult};

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Context var holding the id, for handlers and later middleware.
pub const REQUEST_ID_VAR: &str = "request_id";

/// Tags each request with an id. An id sent by the client in `X-Request-ID`
/// is kept; otherwise a v4 UUID is generated. The id is echoed in the
/// response header and stored in the `request_id` var.
#[derive(Clone, Copy, Default)]
pub struct RequestId;

impl RequestId {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for RequestId {
    fn call(&self, c: Context) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async move {
            let id = match c.header(REQUEST_ID_HEADER) {
                Some(id) if !id.trim().is_empty() => id.trim().to_string(),
                _ => Uuid::new_v4().to_string(),
            };
            c.set_header(REQUEST_ID_HEADER, &id);
            c.set_var(REQUEST_ID_VAR, id);
            c.next().await
        })
    }
}
