//! Subscriber setup for applications that don't bring their own.
//!
//! The framework only emits `tracing` events; calling [`init`] is optional.

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Human-readable output at `debug`.
    #[default]
    Debug,
    /// JSON lines at `info`.
    Release,
}

impl Mode {
    fn default_directive(self) -> &'static str {
        match self {
            Mode::Debug => "debug",
            Mode::Release => "info",
        }
    }
}

/// Installs a global fmt subscriber. `RUST_LOG` overrides the mode's default
/// level. Fails if a global subscriber is already set.
pub fn init(mode: Mode) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(mode.default_directive()));

    let installed = match mode {
        Mode::Debug => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        Mode::Release => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
    };
    installed.map_err(|e| Error::Config(format!("logging already initialised: {e}")))
}
