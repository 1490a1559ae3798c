//! Drains in-flight requests on Ctrl-C or SIGTERM.
//!
//! ```sh
//! cargo run --example graceful_shutdown
//! curl localhost:3000/long &   # then press Ctrl-C in the server terminal
//! ```
//!
//! The long request still completes; the server stops once it has, or after
//! ten seconds at most.

use std::time::Duration;

use ginza::logging::{self, Mode};
use ginza::middleware::Logger;
use ginza::{json, App, Context, ServerConfig};
use tracing::info;

fn main() -> ginza::Result<()> {
    logging::init(Mode::Release)?;

    let config = ServerConfig::from_env()?;
    let addr = config.addr.clone();
    let drain_timeout = config.drain_timeout();

    let mut app = App::new().with_config(config);
    app.use_middleware(Logger::new());

    app.get("/", |c: Context| async move {
        c.json(200, &json!({ "message": "Hello, World!" }))
    });

    app.get("/long", |c: Context| async move {
        info!("starting long request");
        tokio::time::sleep(Duration::from_secs(5)).await;
        info!("long request completed");
        c.json(200, &json!({ "message": "Completed after 5 seconds" }))
    });

    let shutdown = app.shutdown();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build();
        if let Ok(rt) = rt {
            let state = rt.block_on(shutdown.stopped());
            println!("server finished in state: {state}");
        }
    });

    app.listen_with_shutdown(&addr, drain_timeout)
}
