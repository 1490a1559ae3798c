use std::time::SystemTime;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// A fully built response, ready to be flushed to the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Replaces any existing header with the same (case-insensitive) name.
    /// Control characters are stripped from the name and value.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        let name = strip_controls(name);
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, strip_controls(value)));
        self
    }

    /// Adds a header without touching existing ones (`Set-Cookie`).
    pub fn append_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((strip_controls(name), strip_controls(value)));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> Result<Response> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::Internal(format!("JSON serialization error: {e}")))?;
        Ok(Response::with_body(status, CONTENT_TYPE_JSON, body))
    }

    pub fn text(status: u16, content: impl Into<String>) -> Response {
        Response::with_body(status, CONTENT_TYPE_TEXT, content.into().into_bytes())
    }

    pub fn html(status: u16, content: impl Into<String>) -> Response {
        Response::with_body(status, CONTENT_TYPE_HTML, content.into().into_bytes())
    }

    pub fn with_body(status: u16, content_type: &str, body: Vec<u8>) -> Response {
        let mut response = Response::new(status);
        response.set_header("Content-Type", content_type);
        response.body = body;
        response
    }

    /// Default conversion of a chain error into the JSON error envelope.
    pub fn error(err: &Error) -> Response {
        let status = err.status_code();
        let mut envelope = serde_json::json!({
            "error": {
                "message": err.to_string(),
                "status": status
            }
        });
        if let Error::Validation(errors) = err {
            envelope["error"]["details"] = serde_json::json!(errors);
        }

        let mut response = match Response::json(status, &envelope) {
            Ok(response) => response,
            Err(_) => Response::text(status, err.to_string()),
        };
        if let Error::MethodNotAllowed { allowed } = err {
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            response.set_header("Allow", &allow);
        }
        response
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }

    /// Serializes the response as HTTP/1.1. `head_only` drops the body but
    /// keeps its `Content-Length`.
    pub(crate) async fn write_to<W>(&self, writer: &mut W, head_only: bool) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_reason(self.status));
        for (name, value) in &self.headers {
            head += &format!("{}: {}\r\n", strip_controls(name), strip_controls(value));
        }
        head += &format!("Content-Length: {}\r\n", self.body.len());
        head += &format!("Date: {}\r\n", httpdate::fmt_http_date(SystemTime::now()));
        head += "Connection: close\r\n\r\n";

        writer.write_all(head.as_bytes()).await?;
        if !head_only {
            writer.write_all(&self.body).await?;
        }
        writer.flush().await
    }
}

/// Header text may not carry CR, LF or other control bytes; tab is allowed.
fn strip_controls(text: &str) -> String {
    text.chars().filter(|c| *c == '\t' || !c.is_control()).collect()
}

fn status_reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Content Too Large",
        422 => "Unprocessable Content",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
