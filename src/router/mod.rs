mod group;
pub(crate) mod tree;

pub use group::Group;
pub(crate) use group::join;

use std::collections::HashMap;

use tracing::error;

use crate::error::{Error, Result};
use crate::handler::{boxed, BoxedHandler, Chain, Handler};
use crate::http::request::decode_path_segment;
use crate::http::Method;
use crate::schema::Schema;
use tree::{Node, RouteId};

/// Documentation attached to a route. Not used for dispatch.
#[derive(Debug, Clone, Default)]
pub struct RouteMeta {
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub body: Option<Schema>,
}

/// Read-only view of a registered route.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub method: Method,
    pub pattern: String,
    pub meta: RouteMeta,
}

pub(crate) struct Route {
    method: Method,
    pattern: String,
    /// Group middleware, route middleware, then the terminal handler.
    handlers: Vec<BoxedHandler>,
    chain: Chain,
    meta: RouteMeta,
}

impl Route {
    pub(crate) fn chain(&self) -> &Chain {
        &self.chain
    }
}

/// Returned by every registration call so route-level middleware and
/// documentation can be attached.
///
/// A handle for a route that failed to register is inert; the failure is
/// reported when the server starts.
pub struct RouteHandle<'a> {
    route: Option<&'a mut Route>,
}

impl<'a> RouteHandle<'a> {
    /// Adds route-level middleware. It runs after global and group
    /// middleware, in the order `with` is called.
    pub fn with(mut self, middleware: impl Handler) -> Self {
        if let Some(route) = self.route.as_mut() {
            let at = route.handlers.len().saturating_sub(1);
            route.handlers.insert(at, boxed(middleware));
        }
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        if let Some(route) = self.route.as_mut() {
            route.meta.summary = Some(summary.to_string());
        }
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(route) = self.route.as_mut() {
            route.meta.tags.extend(tags.into_iter().map(Into::into));
        }
        self
    }

    pub fn body(mut self, schema: Schema) -> Self {
        if let Some(route) = self.route.as_mut() {
            route.meta.body = Some(schema);
        }
        self
    }

    pub fn is_registered(&self) -> bool {
        self.route.is_some()
    }
}

/// A resolved request: the route and its decoded path parameters.
pub(crate) struct Resolved<'r> {
    pub route: &'r Route,
    pub params: Vec<(String, String)>,
}

/// All routes, one segment tree per method.
///
/// Built while the application is being configured, then frozen behind an
/// `Arc` when the server starts; lookups never lock.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    trees: HashMap<Method, Node>,
    errors: Vec<Error>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handlers` (group middleware first, terminal handler last)
    /// for `method` and `pattern`.
    pub(crate) fn insert(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<RouteId> {
        let segments = tree::parse_pattern(pattern)?;
        let canonical = tree::render(&segments);
        let id = self.routes.len();
        self.trees
            .entry(method)
            .or_default()
            .insert(&segments, id, &canonical)?;
        self.routes.push(Route {
            method,
            pattern: canonical,
            chain: Chain::new(handlers.clone()),
            handlers,
            meta: RouteMeta::default(),
        });
        Ok(id)
    }

    /// Like [`Router::insert`], but a failure is logged and kept for
    /// [`Router::take_errors`] instead of being returned.
    pub(crate) fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> RouteHandle<'_> {
        match self.insert(method, pattern, handlers) {
            Ok(id) => RouteHandle {
                route: self.routes.get_mut(id),
            },
            Err(err) => {
                error!(%method, pattern, error = %err, "route registration failed");
                self.errors.push(err);
                RouteHandle { route: None }
            }
        }
    }

    pub(crate) fn handle(&mut self, id: RouteId) -> RouteHandle<'_> {
        RouteHandle {
            route: self.routes.get_mut(id),
        }
    }

    pub(crate) fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }

    /// Prepends the global middleware to every route's chain.
    pub(crate) fn finalize(&mut self, global: &[BoxedHandler]) {
        for route in &mut self.routes {
            let mut handlers = Vec::with_capacity(global.len() + route.handlers.len());
            handlers.extend(global.iter().cloned());
            handlers.extend(route.handlers.iter().cloned());
            route.chain = Chain::new(handlers);
        }
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|route| RouteInfo {
                method: route.method,
                pattern: route.pattern.clone(),
                meta: route.meta.clone(),
            })
            .collect()
    }

    /// Resolves `method` + `path`.
    ///
    /// `HEAD` falls back to the `GET` route. A path that only matches under
    /// other methods yields [`Error::MethodNotAllowed`] listing them.
    pub(crate) fn resolve(&self, method: Method, path: &str) -> Result<Resolved<'_>> {
        let segments: Vec<&str> = tree::split_path(path).collect();

        let found = self
            .find(method, &segments)
            .or_else(|| (method == Method::HEAD).then(|| self.find(Method::GET, &segments)).flatten());
        if let Some(resolved) = found {
            return Ok(resolved);
        }

        let mut allowed: Vec<Method> = self
            .trees
            .iter()
            .filter(|(m, node)| **m != method && node.find(&segments).is_some())
            .map(|(m, _)| *m)
            .collect();
        if allowed.is_empty() {
            return Err(Error::NotFound);
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) && method != Method::HEAD {
            allowed.push(Method::HEAD);
        }
        allowed.sort();
        Err(Error::MethodNotAllowed { allowed })
    }

    fn find(&self, method: Method, segments: &[&str]) -> Option<Resolved<'_>> {
        let found = self.trees.get(&method)?.find(segments)?;
        let params = found
            .params
            .into_iter()
            .map(|(name, raw)| (name.to_string(), decode_path_segment(&raw)))
            .collect();
        Some(Resolved {
            route: &self.routes[found.route],
            params,
        })
    }
}
