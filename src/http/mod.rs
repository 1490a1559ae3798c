pub(crate) mod cookie;
pub(crate) mod request;
pub(crate) mod response;

pub use cookie::{Cookie, SameSite};
pub use request::{Body, Method, Request};
pub use response::Response;
