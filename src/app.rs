//! The application: route registration plus the entry points that serve it.
//!
//! # Examples
//!
//! ```no_run
//! use ginza::{json, App, Context};
//!
//! let mut app = App::new();
//! app.get("/", |c: Context| async move {
//!     c.json(200, &json!({ "message": "Hello!" }))
//! });
//! app.listen("127.0.0.1:3000").unwrap();
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::{normalize_addr, ServerConfig};
use crate::error::{Error, Result};
use crate::handler::{boxed, BoxedHandler, Handler};
use crate::http::request::Limits;
use crate::http::{Method, Response};
use crate::router::{join, Group, RouteHandle, RouteInfo, Router};
use crate::server::signal::shutdown_signal;
use crate::server::{ErrorHandler, Server, Shutdown};
use crate::static_files::{StaticFiles, FILEPATH_PARAM};

/// Routes, global middleware and server settings. Serving consumes the
/// `App`, so nothing can be registered once the server is listening.
pub struct App {
    router: Router,
    global: Vec<BoxedHandler>,
    on_error: Option<ErrorHandler>,
    config: ServerConfig,
    shutdown: Shutdown,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            global: Vec::new(),
            on_error: None,
            config: ServerConfig::default(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The coordinator for this app's server. Keep a clone to stop the
    /// server with [`Shutdown::request_drain`] or to watch its state.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Adds global middleware. It wraps every route, including routes
    /// registered before this call, and also runs for unmatched requests.
    pub fn use_middleware(&mut self, middleware: impl Handler) -> &mut Self {
        self.global.push(boxed(middleware));
        self
    }

    /// Replaces the default JSON error envelope for errors returned from a
    /// chain.
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Error) -> Response + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Registers a route. A conflicting or malformed pattern is logged and
    /// reported when the server starts; use [`App::try_route`] to handle it
    /// immediately.
    pub fn route(&mut self, method: Method, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.router.register(method, path, vec![boxed(handler)])
    }

    pub fn try_route(
        &mut self,
        method: Method,
        path: &str,
        handler: impl Handler,
    ) -> Result<RouteHandle<'_>> {
        let id = self.router.insert(method, path, vec![boxed(handler)])?;
        Ok(self.router.handle(id))
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

    /// Explicit `HEAD` route. Without one, `HEAD` is answered by the `GET`
    /// route with the body dropped.
    pub fn head(&mut self, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.route(Method::HEAD, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> RouteHandle<'_> {
        self.route(Method::OPTIONS, path, handler)
    }

    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group::new(&mut self.router, prefix)
    }

    /// Serves files under `dir` at `GET {prefix}/*filepath`. The route sits
    /// in the same table as every other, so more specific routes under the
    /// prefix still win.
    pub fn static_files(&mut self, prefix: &str, dir: impl Into<PathBuf>) -> RouteHandle<'_> {
        let pattern = join(prefix, &format!("*{FILEPATH_PARAM}"));
        self.route(Method::GET, &pattern, StaticFiles::new(dir))
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.router.routes()
    }

    /// Serves on `addr` until a drain is requested through
    /// [`App::shutdown`]. Builds its own runtime; call [`App::run`] from
    /// async code instead.
    pub fn listen(self, addr: &str) -> Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.run(addr))
    }

    /// Like [`App::listen`], and also drains on SIGINT or SIGTERM, waiting
    /// up to `drain_timeout` for in-flight requests.
    pub fn listen_with_shutdown(self, addr: &str, drain_timeout: Duration) -> Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.run_with_shutdown(addr, drain_timeout))
    }

    pub async fn run(self, addr: &str) -> Result<()> {
        self.bind_and_serve(addr, None).await
    }

    pub async fn run_with_shutdown(self, addr: &str, drain_timeout: Duration) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                () = shutdown_signal() => shutdown.request_drain(),
                _ = shutdown.stopped() => {}
            }
        });

        let result = self.bind_and_serve(addr, Some(drain_timeout)).await;
        watcher.abort();
        result
    }

    /// Serves on an already bound listener, which is useful with port `0`.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.into_server()?.serve(listener).await
    }

    async fn bind_and_serve(self, addr: &str, drain_timeout: Option<Duration>) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let mut server = self.into_server_parts()?;
        if let Some(timeout) = drain_timeout {
            server.drain_timeout = timeout;
        }

        let addr = normalize_addr(addr);
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(%addr, error = %e, "bind failed");
                shutdown.mark_failed();
                return Err(e.into());
            }
        };
        Arc::new(server).serve(listener).await
    }

    fn into_server(self) -> Result<Arc<Server>> {
        self.into_server_parts().map(Arc::new)
    }

    /// Fails with the first registration error, if any, before any socket
    /// is opened. Otherwise composes every route's final chain.
    fn into_server_parts(mut self) -> Result<Server> {
        let mut errors = self.router.take_errors();
        if !errors.is_empty() {
            error!(count = errors.len(), "refusing to start with invalid routes");
            self.shutdown.mark_failed();
            return Err(errors.remove(0));
        }

        self.router.finalize(&self.global);
        info!(
            routes = self.router.routes().len(),
            middleware = self.global.len(),
            "routes finalized"
        );

        Ok(Server {
            router: self.router,
            global: self.global,
            on_error: self.on_error,
            limits: Limits {
                max_header_bytes: self.config.max_header_bytes,
                max_body_size: self.config.max_body_size,
            },
            read_timeout: self.config.read_timeout(),
            drain_timeout: self.config.drain_timeout(),
            shutdown: self.shutdown,
        })
    }
}
