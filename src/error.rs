use std::io;

use thiserror::Error;

use crate::http::Method;
use crate::schema::ValidationError;

/// Every failure the framework reports, from route registration to a
/// handler's own rejections.
///
/// Handlers return these from their chain; the server turns whatever comes
/// back into exactly one response using [`Error::status_code`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("route conflict: {0}")]
    RouteConflict(String),

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidRoute { pattern: String, reason: String },

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("validation failed")]
    Validation(Vec<ValidationError>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("panic: {0}")]
    Panic(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) | Error::Decode(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound => 404,
            Error::MethodNotAllowed { .. } => 405,
            Error::Validation(_) => 422,
            Error::RouteConflict(_)
            | Error::InvalidRoute { .. }
            | Error::Internal(_)
            | Error::Panic(_)
            | Error::Config(_)
            | Error::Io(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
