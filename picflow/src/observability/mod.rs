//! Logging setup for hosts.
//!
//! This module provides:
//! - `LoggingConfig`, a serde view of the host's logging preferences
//! - `init_logging`, which installs a `tracing-subscriber` fmt subscriber
//!
//! The library itself only emits through `tracing`; installing a subscriber
//! is left to the host and is optional.

use crate::errors::PicflowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default level: trace, debug, info, warn, error, off.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit one JSON object per line instead of text.
    #[serde(default)]
    pub json: bool,

    /// Include the event target (module path).
    #[serde(default = "default_true")]
    pub with_target: bool,

    /// Per-target level overrides, e.g. `picflow::plugin = "debug"`.
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            with_target: true,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Sets the default level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Switches to JSON output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Overrides the level for one target.
    #[must_use]
    pub fn with_module(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.modules.insert(target.into(), level.into());
        self
    }

    /// The filter directives, e.g. `info,picflow::plugin=debug`.
    #[must_use]
    pub fn directives(&self) -> String {
        std::iter::once(self.level.clone())
            .chain(
                self.modules
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `config`. Without a config the default
/// level is `info`.
///
/// # Errors
///
/// Returns `Config` if the directives do not parse or a global subscriber
/// is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), PicflowError> {
    let config = config.cloned().unwrap_or_default();
    let filter = build_filter(&config)?;
    let base = Registry::default().with(filter);

    let installed = if config.json {
        base.with(fmt::layer().json().with_target(config.with_target))
            .try_init()
    } else {
        base.with(fmt::layer().with_target(config.with_target))
            .try_init()
    };
    installed.map_err(|e| PicflowError::Config(format!("failed to install subscriber: {e}")))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, PicflowError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(config.directives()).map_err(|e| {
            PicflowError::Config(format!(
                "invalid log directives '{}': {e}",
                config.directives()
            ))
        }),
    }
}
