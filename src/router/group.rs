//! Prefix groups.
//!
//! A group only exists while routes are being registered: it prepends its
//! prefix to each pattern and its middleware to each handler chain, then the
//! route lands in the same table as any other.

use crate::handler::{boxed, BoxedHandler, Handler};
use crate::http::Method;
use crate::router::{RouteHandle, Router};

pub struct Group<'a> {
    router: &'a mut Router,
    prefix: String,
    middleware: Vec<BoxedHandler>,
}

impl<'a> Group<'a> {
    pub(crate) fn new(router: &'a mut Router, prefix: &str) -> Self {
        Self {
            router,
            prefix: join(prefix, ""),
            middleware: Vec::new(),
        }
    }

    /// Adds group middleware. Applies to routes registered on this group (and
    /// its nested groups) from now on.
    pub fn use_middleware(&mut self, middleware: impl Handler) -> &mut Self {
        self.middleware.push(boxed(middleware));
        self
    }

    /// A nested group inheriting this group's prefix and middleware.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: join(&self.prefix, prefix),
            middleware: self.middleware.clone(),
            router: &mut *self.router,
        }
    }

    pub fn route(&mut self, method: Method, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        let mut handlers = self.middleware.clone();
        handlers.push(boxed(handler));
        let pattern = join(&self.prefix, path);
        self.router.register(method, &pattern, handlers)
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.route(Method::GET, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.route(Method::POST, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.route(Method::DELETE, path, handler)
    }
}

pub(crate) fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{prefix}/{path}")
    }
}
