//! Accept loop, connection handling and request dispatch.
//!
//! Every accepted connection runs on its own task and serves exactly one
//! request. The route table and its chains are shared read-only; the
//! [`Shutdown`] coordinator counts requests in flight from dispatch until
//! the response is written, and tells the accept loop when to stop.

mod shutdown;
pub(crate) mod signal;

pub use shutdown::{DrainOutcome, ServerState, Shutdown};

use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::{boxed, BoxedHandler, Chain};
use crate::http::request::{read_request, Limits};
use crate::http::{Method, Request, Response};
use crate::middleware::panic_message;
use crate::router::Router;

pub(crate) type ErrorHandler = Arc<dyn Fn(&Error) -> Response + Send + Sync>;

/// Everything a connection task needs, frozen when serving starts.
pub(crate) struct Server {
    pub(crate) router: Router,
    pub(crate) global: Vec<BoxedHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) limits: Limits,
    pub(crate) read_timeout: Duration,
    pub(crate) drain_timeout: Duration,
    pub(crate) shutdown: Shutdown,
}

impl Server {
    /// Accepts connections until a drain is requested, then waits for
    /// in-flight connections up to the drain timeout.
    pub(crate) async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                shutdown.mark_failed();
                return Err(e.into());
            }
        };

        shutdown.mark_listening();
        info!(%addr, routes = self.router.routes().len(), "listening");

        let mut state = shutdown.subscribe();
        let outcome = loop {
            tokio::select! {
                biased;

                _ = not_listening(&mut state) => break Ok(()),

                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let server = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote).await {
                                debug!(peer = %remote, error = %e, "connection error");
                            }
                        });
                    }
                    Err(e) if is_transient(&e) => {
                        warn!(error = %e, "accept failed; continuing");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed; stopping");
                        break Err(Error::Io(e));
                    }
                },
            }
        };

        drop(listener);
        info!(in_flight = shutdown.in_flight(), "no longer accepting connections");
        if let DrainOutcome::Forced { abandoned } = shutdown.drain(self.drain_timeout).await {
            debug!(abandoned, "left running after drain deadline");
        }

        match outcome {
            Ok(()) => {
                shutdown.mark_stopped();
                info!(%addr, "server stopped");
            }
            Err(_) => shutdown.mark_failed(),
        }
        outcome
    }

    async fn handle_connection(&self, mut stream: TcpStream, remote: SocketAddr) -> io::Result<()> {
        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half);

        // A connection that has not finished sending its request by the time
        // a drain starts is closed without a response.
        let mut state = self.shutdown.subscribe();
        let read = tokio::time::timeout(
            self.read_timeout,
            read_request(&mut reader, self.limits, Some(remote)),
        );
        let request = tokio::select! {
            biased;

            outcome = read => match outcome {
                Ok(Ok(Some(request))) => request,
                Ok(Ok(None)) => return Ok(()),
                Ok(Err(Error::Io(e))) => return Err(e),
                Ok(Err(err)) => {
                    debug!(peer = %remote, error = %err, "rejected malformed request");
                    return self.error_response(&err).write_to(&mut write_half, false).await;
                }
                Err(_) => {
                    debug!(peer = %remote, "timed out waiting for request");
                    return Ok(());
                }
            },

            _ = not_listening(&mut state) => {
                debug!(peer = %remote, "closing idle connection for drain");
                return Ok(());
            }
        };

        let _guard = self.shutdown.enter();
        let head_only = request.method() == Method::HEAD;
        let response = self.dispatch(request).await;
        response.write_to(&mut write_half, head_only).await
    }

    /// Runs one request through its chain and produces exactly one response:
    /// the committed one if any, else the returned error's, else an empty 200.
    pub(crate) async fn dispatch(&self, request: Request) -> Response {
        let (chain, params) = match self.router.resolve(request.method(), request.path()) {
            Ok(resolved) => (resolved.route.chain().clone(), resolved.params),
            Err(err) => (self.miss_chain(err), Vec::new()),
        };

        let c = Context::new(request, params, chain);
        let handle = c.share();
        let result = match AssertUnwindSafe(c.run()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(method = %handle.method(), path = %handle.path(), panic = %message, "handler panicked");
                Err(Error::Panic(message))
            }
        };

        match result {
            Ok(()) => handle.take_response(|| Response::new(200)),
            Err(err) => {
                if err.status_code() >= 500 {
                    error!(method = %handle.method(), path = %handle.path(), error = %err, "request failed");
                } else {
                    debug!(method = %handle.method(), path = %handle.path(), error = %err, "request rejected");
                }
                handle.take_response(|| self.error_response(&err))
            }
        }
    }

    /// Global middleware followed by a terminal that reports the miss, so
    /// logging and recovery still see unmatched requests.
    fn miss_chain(&self, err: Error) -> Chain {
        let allowed = match err {
            Error::MethodNotAllowed { allowed } => Some(allowed),
            _ => None,
        };
        let terminal = boxed(move |_c: Context| {
            let err = match &allowed {
                Some(allowed) => Error::MethodNotAllowed {
                    allowed: allowed.clone(),
                },
                None => Error::NotFound,
            };
            async move { Err::<(), Error>(err) }
        });

        let mut handlers = self.global.clone();
        handlers.push(terminal);
        Chain::new(handlers)
    }

    fn error_response(&self, err: &Error) -> Response {
        match &self.on_error {
            Some(handler) => handler(err),
            None => Response::error(err),
        }
    }
}

/// Resolves once the server has left `Listening`.
async fn not_listening(state: &mut watch::Receiver<ServerState>) {
    let _ = state.wait_for(|s| *s != ServerState::Listening).await;
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) || e.raw_os_error().is_some_and(|code| code == 23 || code == 24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::boxed;
    use crate::http::request::Limits;

    fn server(router: Router, global: Vec<BoxedHandler>) -> Server {
        let mut router = router;
        router.finalize(&global);
        Server {
            router,
            global,
            on_error: None,
            limits: Limits {
                max_header_bytes: 8192,
                max_body_size: 1024,
            },
            read_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(1),
            shutdown: Shutdown::new(),
        }
    }

    fn routed(method: Method, pattern: &str, handler: BoxedHandler) -> Router {
        let mut router = Router::new();
        router.insert(method, pattern, vec![handler]).unwrap();
        router
    }

    #[tokio::test]
    async fn silent_chain_yields_empty_200() {
        let server = server(
            routed(Method::POST, "/noop", boxed(|_c: Context| async { Ok(()) })),
            Vec::new(),
        );
        let response = server.dispatch(Request::new(Method::POST, "/noop")).await;
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn committed_response_wins_over_error() {
        let server = server(
            routed(
                Method::GET,
                "/both",
                boxed(|c: Context| async move {
                    c.text(202, "accepted")?;
                    Err(Error::Internal("late failure".to_string()))
                }),
            ),
            Vec::new(),
        );
        let response = server.dispatch(Request::new(Method::GET, "/both")).await;
        assert_eq!(response.status, 202);
        assert_eq!(response.body_str(), "accepted");
    }

    #[tokio::test]
    async fn panics_become_500_without_recovery_middleware() {
        let server = server(
            routed(
                Method::GET,
                "/panic",
                boxed(|c: Context| async move {
                    if c.query("safe").is_empty() {
                        panic!("index out of range");
                    }
                    Ok(())
                }),
            ),
            Vec::new(),
        );
        let response = server.dispatch(Request::new(Method::GET, "/panic")).await;
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn misses_run_global_middleware() {
        let global = vec![boxed(|c: Context| async move {
            c.set_header("X-Seen", "yes");
            c.next().await
        })];
        let server = server(
            routed(Method::GET, "/items", boxed(|_c: Context| async { Ok(()) })),
            global,
        );

        let missing = server.dispatch(Request::new(Method::GET, "/nope")).await;
        assert_eq!(missing.status, 404);
        assert_eq!(missing.header("x-seen"), Some("yes"));

        let wrong_method = server.dispatch(Request::new(Method::DELETE, "/items")).await;
        assert_eq!(wrong_method.status, 405);
        assert_eq!(wrong_method.header("allow"), Some("GET, HEAD"));
    }

    #[tokio::test]
    async fn custom_error_handler_shapes_errors() {
        let mut server = server(Router::new(), Vec::new());
        server.on_error = Some(Arc::new(|err: &Error| {
            Response::text(err.status_code(), format!("custom: {err}"))
        }));
        let response = server.dispatch(Request::new(Method::GET, "/")).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body_str(), "custom: not found");
    }
}
