//! Error types for the picflow core.
//!
//! Every failure the core can surface is a variant of [`PicflowError`]. The
//! named failure kinds are small structs so they can be matched, logged and
//! serialized on their own, then folded into the enum with `#[from]`.

use std::collections::HashMap;
use thiserror::Error;

/// The main error type for picflow operations.
#[derive(Debug, Error)]
pub enum PicflowError {
    /// A plugin name could not be resolved.
    #[error("{0}")]
    PluginNotFound(#[from] PluginNotFoundError),

    /// The configured transformer is not registered.
    #[error("{0}")]
    TransformerNotFound(#[from] TransformerNotFoundError),

    /// The configured uploader is not registered.
    #[error("{0}")]
    UploaderNotFound(#[from] UploaderNotFoundError),

    /// A registered stage handler failed.
    #[error("{0}")]
    StageHandler(#[from] StageHandlerError),

    /// An outbound request failed.
    #[error("{0}")]
    RequestFailed(#[from] RequestFailedError),

    /// Writing the configuration tree to durable storage failed.
    #[error("{0}")]
    ConfigPersist(#[from] ConfigPersistError),

    /// A plugin factory or its `register` hook failed.
    #[error("{0}")]
    PluginLoad(#[from] PluginLoadError),

    /// An empty or otherwise unusable registry name.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// The pipeline input could not be processed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value had the wrong shape.
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PicflowError {
    /// Returns a stable code for this error, used in event payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PluginNotFound(_) => "PluginNotFound",
            Self::TransformerNotFound(_) => "TransformerNotFound",
            Self::UploaderNotFound(_) => "UploaderNotFound",
            Self::StageHandler(_) => "StageHandler",
            Self::RequestFailed(_) => "RequestFailed",
            Self::ConfigPersist(_) => "ConfigPersist",
            Self::PluginLoad(_) => "PluginLoad",
            Self::InvalidName(_) => "InvalidName",
            Self::InvalidInput(_) => "InvalidInput",
            Self::Config(_) => "Config",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
            Self::Internal(_) => "Internal",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::StageHandler(err) => {
                map.insert("stage".to_string(), serde_json::json!(err.stage));
                map.insert("entry".to_string(), serde_json::json!(err.entry));
            }
            Self::RequestFailed(err) => {
                map.insert("status".to_string(), serde_json::json!(err.status));
                map.insert("code".to_string(), serde_json::json!(err.code));
            }
            Self::TransformerNotFound(err) => {
                map.insert("name".to_string(), serde_json::json!(err.name));
            }
            Self::UploaderNotFound(err) => {
                map.insert("name".to_string(), serde_json::json!(err.name));
            }
            Self::PluginNotFound(err) => {
                map.insert("name".to_string(), serde_json::json!(err.name));
            }
            _ => {}
        }

        map
    }
}

impl From<serde_json::Error> for PicflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a plugin name is unknown to the loader.
#[derive(Debug, Clone, Error)]
#[error("Plugin not found: {name}")]
pub struct PluginNotFoundError {
    /// The plugin name.
    pub name: String,
}

impl PluginNotFoundError {
    /// Creates a new plugin not found error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Error raised when the active transformer cannot be resolved.
#[derive(Debug, Clone, Error)]
#[error("Transformer not found: '{name}'")]
pub struct TransformerNotFoundError {
    /// The configured transformer name.
    pub name: String,
}

impl TransformerNotFoundError {
    /// Creates a new transformer not found error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Error raised when the active uploader cannot be resolved.
///
/// `name` is empty when neither `picBed.uploader` nor `picBed.current` is set.
#[derive(Debug, Clone, Error)]
#[error("Uploader not found: '{name}'")]
pub struct UploaderNotFoundError {
    /// The configured uploader name.
    pub name: String,
}

impl UploaderNotFoundError {
    /// Creates a new uploader not found error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Error raised when a registered stage handler fails.
#[derive(Debug, Error)]
#[error("Stage '{stage}' handler '{entry}' failed: {source}")]
pub struct StageHandlerError {
    /// The lifecycle stage the handler was registered in.
    pub stage: String,
    /// The handler's registered name.
    pub entry: String,
    /// The underlying failure.
    #[source]
    pub source: anyhow::Error,
}

impl StageHandlerError {
    /// Creates a new stage handler error.
    #[must_use]
    pub fn new(stage: impl Into<String>, entry: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            stage: stage.into(),
            entry: entry.into(),
            source,
        }
    }
}

/// Error raised when an outbound request fails.
#[derive(Debug, Clone, Error)]
#[error("Request failed{}: {message}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
pub struct RequestFailedError {
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Transport-level error code (e.g. `TIMEOUT`, `CONNECT`), when known.
    pub code: Option<String>,
    /// Human readable description.
    pub message: String,
    /// Response body text, when a response was received.
    pub body: Option<String>,
}

impl RequestFailedError {
    /// Creates a request failure without a response.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            body: None,
        }
    }

    /// Creates a request failure for a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, body: Option<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: format!("server responded with status {status}"),
            body,
        }
    }

    /// Sets the transport error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Error raised when the configuration tree cannot be persisted.
#[derive(Debug, Clone, Error)]
#[error("Failed to persist configuration: {message}")]
pub struct ConfigPersistError {
    /// Description of the failure.
    pub message: String,
}

impl ConfigPersistError {
    /// Creates a new config persist error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a plugin factory or its register hook fails.
#[derive(Debug, Error)]
#[error("Failed to load plugin '{name}': {source}")]
pub struct PluginLoadError {
    /// The plugin name.
    pub name: String,
    /// The underlying failure.
    #[source]
    pub source: anyhow::Error,
}

impl PluginLoadError {
    /// Creates a new plugin load error.
    #[must_use]
    pub fn new(name: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}
