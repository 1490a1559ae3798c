//! Pass-through cookie support: parse the `Cookie` request header and render
//! `Set-Cookie` values. No jar, no signing.

use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<Duration>,
    pub expires: Option<SystemTime>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Renders the value of a `Set-Cookie` header.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(path) = &self.path {
            out += &format!("; Path={path}");
        }
        if let Some(domain) = &self.domain {
            out += &format!("; Domain={domain}");
        }
        if let Some(max_age) = self.max_age {
            out += &format!("; Max-Age={}", max_age.as_secs());
        }
        if let Some(expires) = self.expires {
            out += &format!("; Expires={}", httpdate::fmt_http_date(expires));
        }
        if self.secure {
            out += "; Secure";
        }
        if self.http_only {
            out += "; HttpOnly";
        }
        match self.same_site {
            Some(SameSite::Strict) => out += "; SameSite=Strict",
            Some(SameSite::Lax) => out += "; SameSite=Lax",
            Some(SameSite::None) => out += "; SameSite=None",
            None => {}
        }
        out
    }
}

/// Finds `name` in a `Cookie` request header (`a=1; b=2`).
pub(crate) fn find<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_attributes_in_order() {
        let cookie = Cookie::new("session_token", "abc123")
            .path("/")
            .max_age(Duration::from_secs(3600))
            .expires(SystemTime::UNIX_EPOCH + Duration::from_secs(784111777))
            .http_only(true)
            .same_site(SameSite::Lax);
        assert_eq!(
            cookie.to_header_value(),
            "session_token=abc123; Path=/; Max-Age=3600; \
             Expires=Sun, 06 Nov 1994 08:49:37 GMT; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn finds_cookie_in_header() {
        let header = "theme=dark; session_token=\"abc123\"; lang=en";
        assert_eq!(find(header, "session_token"), Some("abc123"));
        assert_eq!(find(header, "lang"), Some("en"));
        assert_eq!(find(header, "missing"), None);
    }
}
