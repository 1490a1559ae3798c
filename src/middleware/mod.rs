//! Built-in middleware.
//!
//! Each type here is an ordinary [`Handler`](crate::handler::Handler) that
//! calls [`Context::next`](crate::Context::next); install them with
//! `use_middleware` on the app or a group, or `with` on a single route.

mod logger;
mod recovery;
mod request_id;

pub use logger::Logger;
pub use recovery::Recovery;
pub use request_id::{RequestId, REQUEST_ID_HEADER, REQUEST_ID_VAR};

pub(crate) use recovery::panic_message;
