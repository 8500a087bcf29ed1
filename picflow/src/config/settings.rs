//! Typed views over well-known configuration subtrees.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level key holding storage backend selection and backend settings.
pub const PIC_BED_KEY: &str = "picBed";

/// Top-level key holding plugin enable flags (`name -> bool`).
pub const PLUGINS_KEY: &str = "plugins";

/// Top-level key holding general settings.
pub const SETTINGS_KEY: &str = "settings";

/// Path of the request settings subtree.
pub const REQUEST_SETTINGS_PATH: &str = "settings.request";

/// The transformer used when none is configured.
pub const DEFAULT_TRANSFORMER: &str = "path";

/// Built-in defaults every read falls back to.
#[must_use]
pub fn default_tree() -> serde_json::Value {
    serde_json::json!({
        "picBed": {
            "transformer": DEFAULT_TRANSFORMER,
        },
        "plugins": {},
        "settings": {},
    })
}

/// Storage backend selection (`picBed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PicBedSettings {
    /// Active uploader id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    /// Legacy spelling of the active uploader id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    /// Active transformer id.
    #[serde(default = "default_transformer")]
    pub transformer: String,
}

fn default_transformer() -> String {
    DEFAULT_TRANSFORMER.to_string()
}

impl Default for PicBedSettings {
    fn default() -> Self {
        Self {
            uploader: None,
            current: None,
            transformer: default_transformer(),
        }
    }
}

impl PicBedSettings {
    /// Sets the uploader id.
    #[must_use]
    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    /// Sets the transformer id.
    #[must_use]
    pub fn with_transformer(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = transformer.into();
        self
    }

    /// Returns the active uploader: `uploader`, falling back to `current`.
    ///
    /// Empty strings count as unset.
    #[must_use]
    pub fn active_uploader(&self) -> Option<&str> {
        let set = |s: &&str| !s.is_empty();
        self.uploader
            .as_deref()
            .filter(set)
            .or_else(|| self.current.as_deref().filter(set))
    }
}

/// Defaults applied by the HTTP transport (`settings.request`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSettings {
    /// Request timeout in seconds. `None` leaves requests unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Proxy URL applied to every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

fn default_user_agent() -> String {
    concat!("picflow/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            user_agent: default_user_agent(),
            proxy: None,
        }
    }
}

impl RequestSettings {
    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Sets the proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Gets the timeout as a Duration.
    ///
    /// Values that are not positive or do not fit a `Duration` mean no timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}
