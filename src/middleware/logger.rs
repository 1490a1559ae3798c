use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::context::Context;
use crate::handler::{Handler, HandlerResult};

/// Logs one line per request with method, path, final status and latency.
///
/// Requests ending in a server error are logged at `warn`.
#[derive(Clone, Default)]
pub struct Logger {
    skip_paths: Arc<HashSet<String>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths that are served but not logged, such as health checks.
    pub fn skip_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip_paths: Arc::new(paths.into_iter().map(Into::into).collect()),
        }
    }
}

impl Handler for Logger {
    fn call(&self, c: Context) -> BoxFuture<'static, HandlerResult> {
        let skip = self.skip_paths.contains(c.path());
        Box::pin(async move {
            if skip {
                return c.next().await;
            }

            let start = Instant::now();
            let result = c.next().await;
            let status = match (&result, c.status()) {
                (_, Some(status)) => status,
                (Err(err), None) => err.status_code(),
                (Ok(()), None) => 200,
            };
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            if status >= 500 {
                warn!(method = %c.method(), path = %c.path(), status, latency_ms, "request");
            } else {
                info!(method = %c.method(), path = %c.path(), status, latency_ms, "request");
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{boxed, Chain};
    use crate::http::{Method, Request};
    use std::io;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    async fn run(logger: Logger, path: &str) -> String {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let chain = Chain::new(vec![
            boxed(logger),
            boxed(|c: Context| async move { c.text(201, "made") }),
        ]);
        Context::new(Request::new(Method::POST, path), Vec::new(), chain)
            .run()
            .await
            .unwrap();

        let logs = capture.0.lock().unwrap().clone();
        String::from_utf8(logs).unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn logs_status_and_latency() {
        let logs = run(Logger::new(), "/users").await;
        assert!(logs.contains("method=POST"));
        assert!(logs.contains("path=/users"));
        assert!(logs.contains("status=201"));
        assert!(logs.contains("latency_ms="));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn skipped_paths_are_silent() {
        let logs = run(Logger::skip_paths(["/health"]), "/health").await;
        assert!(logs.is_empty());
    }
}
