//! Global, group and route middleware, plus the built-ins.
//!
//! ```sh
//! cargo run --example middleware
//! curl -i localhost:3000/id
//! curl -i localhost:3000/admin/dashboard -H 'Authorization: Bearer secret-token'
//! curl -i localhost:3000/panic
//! ```

use std::time::Instant;

use ginza::logging::{self, Mode};
use ginza::middleware::{Logger, Recovery, RequestId, REQUEST_ID_VAR};
use ginza::{json, App, Context, Error};

fn main() -> ginza::Result<()> {
    logging::init(Mode::Debug)?;

    let mut app = App::new();
    app.use_middleware(Recovery::new());
    app.use_middleware(RequestId::new());
    app.use_middleware(Logger::skip_paths(["/health"]));

    // A hand-written timing middleware: work after `next` runs on the way out.
    app.use_middleware(|c: Context| async move {
        let start = Instant::now();
        let result = c.next().await;
        c.set_header("X-Response-Time", &format!("{}us", start.elapsed().as_micros()));
        result
    });

    app.get("/", |c: Context| async move {
        c.text(200, "Hello Middleware! Check headers for X-Request-ID.")
    });

    app.get("/id", |c: Context| async move {
        let id = c.get_var(REQUEST_ID_VAR);
        c.json(200, &json!({ "request_id": id }))
    });

    app.get("/health", |c: Context| async move { c.text(200, "ok") });

    app.get("/panic", |c: Context| async move {
        if c.query("safe").is_empty() {
            panic!("something went badly wrong");
        }
        c.text(200, "safe")
    });

    {
        let mut admin = app.group("/admin");
        admin.use_middleware(|c: Context| async move {
            match c.header("authorization") {
                Some(token) if token == "Bearer secret-token" => {
                    c.set_var("user_id", 123);
                    c.next().await
                }
                _ => Err(Error::Unauthorized("authentication required".to_string())),
            }
        });

        admin.get("/dashboard", |c: Context| async move {
            let user_id: i64 = c.get_var_as("user_id").unwrap_or_default();
            c.json(200, &json!({ "message": "Welcome to admin dashboard", "user_id": user_id }))
        });
    }

    app.listen("127.0.0.1:3000")
}
