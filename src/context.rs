//! The per-request context handed to every handler in a chain.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::binding;
use crate::error::Result;
use crate::handler::{Chain, HandlerResult};
use crate::http::{cookie, Cookie, Method, Request, Response};
use crate::schema::Schema;

/// Request data, the pending response and a scratch store for middleware,
/// plus this handler's position in the chain.
///
/// A `Context` belongs to the task serving one request. The handle passed to
/// each chain element points at the same underlying state; only the cursor
/// differs, which is what makes [`Context::next`] resume from the right
/// place.
pub struct Context {
    inner: Arc<Inner>,
    chain: Chain,
    cursor: usize,
}

struct Inner {
    request: Request,
    params: Vec<(String, String)>,
    vars: Mutex<HashMap<String, Value>>,
    response: Mutex<ResponseState>,
}

#[derive(Default)]
struct ResponseState {
    staged_headers: Vec<(String, String)>,
    committed: Option<Response>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Context {
    pub(crate) fn new(request: Request, params: Vec<(String, String)>, chain: Chain) -> Self {
        Self {
            inner: Arc::new(Inner {
                request,
                params,
                vars: Mutex::new(HashMap::new()),
                response: Mutex::new(ResponseState::default()),
            }),
            chain,
            cursor: 0,
        }
    }

    /// A second handle on the same request state, kept by the server so it
    /// can collect the response after the chain has consumed the first one.
    pub(crate) fn share(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            chain: self.chain.clone(),
            cursor: self.cursor,
        }
    }

    /// Runs the chain from its first element.
    pub(crate) fn run(self) -> BoxFuture<'static, HandlerResult> {
        let chain = self.chain.clone();
        chain.call_at(0, self)
    }

    /// Runs the rest of the chain after the current handler and returns its
    /// outcome.
    pub fn next(&self) -> BoxFuture<'static, HandlerResult> {
        let cursor = self.cursor + 1;
        let c = Self {
            inner: Arc::clone(&self.inner),
            chain: self.chain.clone(),
            cursor,
        };
        self.chain.call_at(cursor, c)
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    pub fn method(&self) -> Method {
        self.inner.request.method
    }

    pub fn path(&self) -> &str {
        &self.inner.request.path
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.request.header(name)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.request.remote_addr
    }

    pub fn body(&self) -> &[u8] {
        self.inner.request.body.as_bytes()
    }

    /// Path parameter bound by the route pattern, or `""`.
    pub fn param(&self, name: &str) -> &str {
        self.inner
            .params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Query string value, or `""`.
    pub fn query(&self, name: &str) -> &str {
        self.inner.request.query(name).unwrap_or("")
    }

    pub fn query_or<'a>(&'a self, name: &str, fallback: &'a str) -> &'a str {
        self.inner.request.query(name).unwrap_or(fallback)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        cookie::find(self.header("cookie")?, name)
    }

    pub fn set_var(&self, key: impl Into<String>, value: impl Into<Value>) {
        lock(&self.inner.vars).insert(key.into(), value.into());
    }

    pub fn get_var(&self, key: &str) -> Option<Value> {
        lock(&self.inner.vars).get(key).cloned()
    }

    pub fn get_var_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_var(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Stages a response header. Staged headers are applied when the
    /// response is flushed, so after-phase middleware can still add them.
    pub fn set_header(&self, name: &str, value: &str) {
        let mut state = lock(&self.inner.response);
        state
            .staged_headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        state
            .staged_headers
            .push((name.to_string(), value.to_string()));
    }

    pub fn set_cookie(&self, cookie: &Cookie) {
        lock(&self.inner.response)
            .staged_headers
            .push(("Set-Cookie".to_string(), cookie.to_header_value()));
    }

    pub fn json<T: Serialize + ?Sized>(&self, status: u16, value: &T) -> HandlerResult {
        self.commit(Response::json(status, value)?);
        Ok(())
    }

    pub fn text(&self, status: u16, body: impl Into<String>) -> HandlerResult {
        self.commit(Response::text(status, body));
        Ok(())
    }

    pub fn html(&self, status: u16, body: impl Into<String>) -> HandlerResult {
        self.commit(Response::html(status, body));
        Ok(())
    }

    /// Commits a response built elsewhere. Same first-write-wins rule as the
    /// other respond methods.
    pub fn send(&self, response: Response) {
        self.commit(response);
    }

    /// Responds with `{"error": message}`.
    pub fn fail(&self, status: u16, message: &str) -> HandlerResult {
        self.json(status, &json!({ "error": message }))
    }

    /// Responds with `{"error": message}` merged with the fields of `data`.
    pub fn fail_with_data(&self, status: u16, message: &str, data: Value) -> HandlerResult {
        let mut body = json!({ "error": message });
        if let (Value::Object(target), Value::Object(extra)) = (&mut body, data) {
            for (k, v) in extra {
                target.entry(k).or_insert(v);
            }
        }
        self.json(status, &body)
    }

    /// Status of the committed response, if one was written.
    pub fn status(&self) -> Option<u16> {
        lock(&self.inner.response)
            .committed
            .as_ref()
            .map(|r| r.status)
    }

    pub fn is_committed(&self) -> bool {
        lock(&self.inner.response).committed.is_some()
    }

    fn commit(&self, response: Response) {
        let mut state = lock(&self.inner.response);
        if let Some(existing) = &state.committed {
            warn!(
                method = %self.method(),
                path = %self.path(),
                committed = existing.status,
                ignored = response.status,
                "response already written; ignoring second write"
            );
            return;
        }
        state.committed = Some(response);
    }

    /// Takes the committed response (or `fallback` when nothing was written)
    /// and applies the staged headers to it.
    pub(crate) fn take_response(&self, fallback: impl FnOnce() -> Response) -> Response {
        let mut state = lock(&self.inner.response);
        let mut response = state.committed.take().unwrap_or_else(fallback);
        for (name, value) in state.staged_headers.drain(..) {
            if name.eq_ignore_ascii_case("set-cookie") {
                response.append_header(&name, &value);
            } else {
                response.set_header(&name, &value);
            }
        }
        response
    }

    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        binding::bind(&self.inner.request.body)
    }

    pub fn bind_and_validate<T: DeserializeOwned>(&self, schema: &Schema) -> Result<T> {
        binding::bind_and_validate(&self.inner.request.body, schema)
    }

    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T> {
        binding::bind_query(self.inner.request.query_pairs())
    }

    pub fn bind_query_and_validate<T: DeserializeOwned>(&self, schema: &Schema) -> Result<T> {
        binding::bind_query_and_validate(self.inner.request.query_pairs(), schema)
    }
}
