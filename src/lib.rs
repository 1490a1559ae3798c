//! # Ginza
//!
//! A small HTTP framework core: a segment-tree router with `:named` and
//! `*wildcard` parameters, onion middleware, a per-request [`Context`],
//! schema validation for request input and a server that drains in-flight
//! requests before stopping.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use ginza::{json, App, Context};
//! use ginza::middleware::{Logger, Recovery};
//!
//! let mut app = App::new();
//! app.use_middleware(Recovery::new());
//! app.use_middleware(Logger::new());
//!
//! app.get("/users/:id", |c: Context| async move {
//!     let id = c.param("id").to_string();
//!     c.json(200, &json!({ "id": id }))
//! });
//!
//! let mut api = app.group("/api/v1");
//! api.get("/status", |c: Context| async move { c.text(200, "ok") });
//!
//! app.listen_with_shutdown("127.0.0.1:3000", Duration::from_secs(10)).unwrap();
//! ```
//!
//! ## Validation
//!
//! ```
//! use ginza::schema::{Field, Schema};
//!
//! let create_user = Schema::new()
//!     .field("name", Field::string().required().min_length(2))
//!     .field("email", Field::string().required().email())
//!     .field("age", Field::integer().min(18).max(120));
//! ```

pub mod app;
pub mod binding;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod schema;
pub mod server;
pub mod static_files;

pub use app::App;
pub use config::ServerConfig;
pub use context::Context;
pub use error::{Error, Result};
pub use handler::{Handler, HandlerResult};
pub use http::{Cookie, Method, Request, Response, SameSite};
pub use router::{Group, RouteHandle, RouteInfo};
pub use schema::{Field, Schema, ValidationError};
pub use server::{ServerState, Shutdown};

pub use serde_json::{json, Value};
