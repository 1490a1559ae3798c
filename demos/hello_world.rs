//! Minimal app: one JSON route and one text route.
//!
//! ```sh
//! cargo run --example hello_world
//! curl localhost:3000/
//! ```

use ginza::logging::{self, Mode};
use ginza::{json, App, Context};

fn main() -> ginza::Result<()> {
    logging::init(Mode::Debug)?;

    let mut app = App::new();

    app.get("/", |c: Context| async move {
        c.json(200, &json!({ "message": "Hello, World!" }))
    });

    app.get("/ping", |c: Context| async move { c.text(200, "pong") });

    app.listen("127.0.0.1:3000")
}
