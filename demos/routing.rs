//! Path parameters, wildcards, query strings, groups and static files.
//!
//! ```sh
//! cargo run --example routing
//! curl localhost:3000/users/42?fields=name
//! curl localhost:3000/users/me
//! curl localhost:3000/api/v1/files/docs/guide.md
//! curl -X POST localhost:3000/users/42   # 405 with Allow header
//! ```

use ginza::logging::{self, Mode};
use ginza::middleware::Logger;
use ginza::{json, App, Context};

fn main() -> ginza::Result<()> {
    logging::init(Mode::Debug)?;

    let mut app = App::new();
    app.use_middleware(Logger::new());

    // Literal segments win over named ones at the same depth.
    app.get("/users/me", |c: Context| async move {
        c.json(200, &json!({ "id": "me", "name": "Current User" }))
    });

    app.get("/users/:id", |c: Context| async move {
        let id = c.param("id").to_string();
        let fields = c.query_or("fields", "all").to_string();
        c.json(200, &json!({ "id": id, "fields": fields }))
    })
    .summary("Fetch a user")
    .tags(["users"]);

    app.delete("/users/:id", |c: Context| async move {
        let id = c.param("id").to_string();
        c.json(200, &json!({ "deleted": id }))
    });

    {
        let mut v1 = app.group("/api/v1");
        v1.get("/status", |c: Context| async move { c.text(200, "v1 ok") });
        v1.get("/files/*path", |c: Context| async move {
            let path = c.param("path").to_string();
            c.json(200, &json!({ "path": path }))
        });

        let mut posts = v1.group("/posts");
        posts.get("/:slug", |c: Context| async move {
            let slug = c.param("slug").to_string();
            c.html(200, format!("<h1>{slug}</h1>"))
        });
    }

    app.static_files("/static", "public");

    for route in app.routes() {
        println!("{:<7} {}", route.method, route.pattern);
    }

    app.listen("127.0.0.1:3000")
}
