use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{Error, Result};

#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
}

impl Method {
    pub fn from_string(s: &str) -> Option<Method> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "CONNECT" => Some(Method::CONNECT),
            "OPTIONS" => Some(Method::OPTIONS),
            "TRACE" => Some(Method::TRACE),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Body {
    pub(crate) content_type: String,
    pub(crate) data: Vec<u8>,
}

impl Body {
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Body {
        Body {
            content_type: content_type.into(),
            data,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Media type without parameters, lowercased (`application/json`).
    pub fn media_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }
}

/// The inbound request as seen by handlers. Immutable once parsed.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: HashMap<String, String>,
    /// Keys are lowercased.
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: Body,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Builds a request by hand, mostly useful when driving a chain in tests.
    pub fn new(method: Method, target: &str) -> Request {
        let (path, query) = split_target(target);
        Request {
            method,
            path,
            query,
            headers: HashMap::new(),
            body: Body::default(),
            remote_addr: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Request {
        if name.eq_ignore_ascii_case("content-type") {
            self.body.content_type = value.to_string();
        }
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, content_type: &str, data: impl Into<Vec<u8>>) -> Request {
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self.body = Body::new(content_type, data.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn query_pairs(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// Size limits applied while reading a request off the wire.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub max_header_bytes: usize,
    pub max_body_size: usize,
}

/// Reads one HTTP/1.x request. `Ok(None)` means the peer closed the
/// connection before sending a request line.
pub(crate) async fn read_request<R>(
    reader: &mut R,
    limits: Limits,
    remote_addr: Option<SocketAddr>,
) -> Result<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    // The request line and every header line share one byte budget.
    let mut budget = limits.max_header_bytes;
    let request_line = match read_head_line(reader, &mut budget).await? {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Ok(None),
    };

    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| Error::BadRequest("invalid request line".to_string()))?;
    let method = Method::from_string(method)
        .ok_or_else(|| Error::BadRequest(format!("unsupported method {method}")))?;
    let target = parts
        .next()
        .ok_or_else(|| Error::BadRequest("invalid request line".to_string()))?;
    let (path, query) = split_target(target);

    let mut headers = HashMap::new();
    while let Some(line) = read_head_line(reader, &mut budget).await? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_type = headers.get("content-type").cloned().unwrap_or_default();
    let mut data = Vec::new();
    if let Some(content_length) = headers.get("content-length") {
        let length = content_length
            .parse::<usize>()
            .map_err(|_| Error::BadRequest("invalid content-length".to_string()))?;
        if length > limits.max_body_size {
            return Err(Error::BadRequest(format!(
                "body of {length} bytes exceeds limit of {}",
                limits.max_body_size
            )));
        }
        data.reserve(length);
        let mut take = reader.take(length as u64);
        take.read_to_end(&mut data).await?;
    }

    Ok(Some(Request {
        method,
        path,
        query,
        headers,
        body: Body::new(content_type, data),
        remote_addr,
    }))
}

/// Reads one line of the request head, never buffering more than `budget`
/// bytes. `Ok(None)` means end of stream.
async fn read_head_line<R>(reader: &mut R, budget: &mut usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    if *budget == 0 {
        return Err(Error::BadRequest("request head too large".to_string()));
    }

    let mut line = Vec::new();
    let read = (&mut *reader)
        .take(*budget as u64)
        .read_until(b'\n', &mut line)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if read == *budget && !line.ends_with(b"\n") {
        return Err(Error::BadRequest("request head too large".to_string()));
    }
    *budget -= read;

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| Error::BadRequest("request head is not valid UTF-8".to_string()))
}

fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (target, HashMap::new()),
    };
    let path = if path.is_empty() { "/" } else { path };
    (path.to_string(), query)
}

/// Parses `a=1&b=two`. The first occurrence of a repeated key wins.
pub(crate) fn parse_query(query: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        pairs
            .entry(decode_component(key))
            .or_insert_with(|| decode_component(value));
    }
    pairs
}

/// Decodes a query or form component, where `+` stands for a space.
fn decode_component(raw: &str) -> String {
    decode_path_segment(&raw.replace('+', " "))
}

/// Percent-decodes one path segment. `+` is kept as is.
pub(crate) fn decode_path_segment(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}
