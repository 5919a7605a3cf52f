//! Logging setup shared by the binaries.
//!
//! Everything goes to stderr: stdout belongs to the proxied tool.

use crate::errors::{RemotingError, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Raw `RUST_LOG` value, which wins over `level`.
    pub rust_log: Option<String>,
    pub json: bool,
}

impl LogConfig {
    /// Read `RBP_LOG_LEVEL` and `RUST_LOG`, falling back to `default_level`.
    pub fn from_env(default_level: &str) -> Self {
        Self::from_lookup(default_level, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(default_level: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup("RBP_LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_level.to_string());
        Self {
            level,
            rust_log: lookup("RUST_LOG").filter(|v| !v.trim().is_empty()),
            json: false,
        }
    }

    /// Force a level, ignoring `RUST_LOG`.
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self.rust_log = None;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// The filter this config resolves to.
    pub fn filter(&self) -> Result<EnvFilter> {
        let directives = self.rust_log.as_deref().unwrap_or(&self.level);
        EnvFilter::try_new(directives)
            .map_err(|e| RemotingError::Config(format!("invalid log filter '{directives}': {e}")))
    }
}

/// Install the global subscriber.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| RemotingError::Config(format!("failed to install logger: {e}")))
}
