//! Server settings.
//!
//! Defaults work out of the box; a TOML document or the environment can
//! override them:
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! drain_timeout_secs = 10
//! max_body_size = 1048576
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENV_ADDR: &str = "GINZA_ADDR";
pub const ENV_DRAIN_TIMEOUT: &str = "GINZA_DRAIN_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address. A bare `:port` binds every interface.
    pub addr: String,
    /// How long a drain waits for in-flight requests.
    pub drain_timeout_secs: u64,
    /// How long a connection may take to send its request.
    pub read_timeout_secs: u64,
    pub max_body_size: usize,
    pub max_header_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
            drain_timeout_secs: 10,
            read_timeout_secs: 30,
            max_body_size: 4 * 1024 * 1024,
            max_header_bytes: 16 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    /// Defaults overridden by `GINZA_ADDR` and `GINZA_DRAIN_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(addr) = lookup(ENV_ADDR) {
            self.addr = addr;
        }
        if let Some(secs) = lookup(ENV_DRAIN_TIMEOUT) {
            self.drain_timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_DRAIN_TIMEOUT} must be whole seconds, got `{secs}`")))?;
        }
        Ok(self)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// `:3000` becomes `0.0.0.0:3000`; anything else is returned unchanged.
pub(crate) fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}
