//! What a plugin contributes to the pipeline.

use super::stage::{StageHandler, Transformer, Uploader};
use crate::context::ExecutionContext;
use crate::lifecycle::LifecycleStage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The input widget a config field is edited with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigItemType {
    /// Free text.
    #[default]
    Input,
    /// Masked text.
    Password,
    /// Pick one of `choices`.
    List,
    /// Pick several of `choices`.
    Checkbox,
    /// Yes or no.
    Confirm,
}

/// One field of a plugin's configuration schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigItem {
    /// Key under the plugin's config subtree.
    pub name: String,
    /// Widget type.
    #[serde(rename = "type", default)]
    pub item_type: ConfigItemType,
    /// Whether uploads need this field set.
    #[serde(default)]
    pub required: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Prompt or help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Options for list and checkbox fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<serde_json::Value>,
}

impl ConfigItem {
    /// Creates an optional text field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the widget type.
    #[must_use]
    pub fn with_type(mut self, item_type: ConfigItemType) -> Self {
        self.item_type = item_type;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Declares a plugin's configuration schema.
pub trait ConfigProvider: Send + Sync {
    /// The fields, evaluated against the current context.
    fn config(&self, ctx: &ExecutionContext) -> Vec<ConfigItem>;
}

impl<F> ConfigProvider for F
where
    F: Fn(&ExecutionContext) -> Vec<ConfigItem> + Send + Sync,
{
    fn config(&self, ctx: &ExecutionContext) -> Vec<ConfigItem> {
        self(ctx)
    }
}

/// One contribution of a plugin.
#[derive(Clone)]
pub enum Capability {
    /// A transformer, registered under `id` or the plugin name.
    Transformer {
        /// Registry id override.
        id: Option<String>,
        /// The transformer.
        transformer: Arc<dyn Transformer>,
    },
    /// An uploader, registered under `id` or the plugin name.
    Uploader {
        /// Registry id override.
        id: Option<String>,
        /// The uploader.
        uploader: Arc<dyn Uploader>,
    },
    /// A beforeTransform handler.
    BeforeTransform(Arc<dyn StageHandler>),
    /// A beforeUpload handler.
    BeforeUpload(Arc<dyn StageHandler>),
    /// An afterUpload handler.
    AfterUpload(Arc<dyn StageHandler>),
    /// A configuration schema.
    Config(Arc<dyn ConfigProvider>),
}

impl Capability {
    /// A transformer registered under the plugin name.
    #[must_use]
    pub fn transformer(transformer: Arc<dyn Transformer>) -> Self {
        Self::Transformer {
            id: None,
            transformer,
        }
    }

    /// A transformer registered under `id`.
    #[must_use]
    pub fn transformer_with_id(id: impl Into<String>, transformer: Arc<dyn Transformer>) -> Self {
        Self::Transformer {
            id: Some(id.into()),
            transformer,
        }
    }

    /// An uploader registered under the plugin name.
    #[must_use]
    pub fn uploader(uploader: Arc<dyn Uploader>) -> Self {
        Self::Uploader { id: None, uploader }
    }

    /// An uploader registered under `id`.
    #[must_use]
    pub fn uploader_with_id(id: impl Into<String>, uploader: Arc<dyn Uploader>) -> Self {
        Self::Uploader {
            id: Some(id.into()),
            uploader,
        }
    }

    /// The lifecycle stage this capability registers into, if any.
    #[must_use]
    pub fn stage(&self) -> Option<LifecycleStage> {
        match self {
            Self::Transformer { .. } => Some(LifecycleStage::Transformer),
            Self::Uploader { .. } => Some(LifecycleStage::Uploader),
            Self::BeforeTransform(_) => Some(LifecycleStage::BeforeTransform),
            Self::BeforeUpload(_) => Some(LifecycleStage::BeforeUpload),
            Self::AfterUpload(_) => Some(LifecycleStage::AfterUpload),
            Self::Config(_) => None,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transformer { id, .. } => f.debug_struct("Transformer").field("id", id).finish(),
            Self::Uploader { id, .. } => f.debug_struct("Uploader").field("id", id).finish(),
            Self::BeforeTransform(_) => f.write_str("BeforeTransform"),
            Self::BeforeUpload(_) => f.write_str("BeforeUpload"),
            Self::AfterUpload(_) => f.write_str("AfterUpload"),
            Self::Config(_) => f.write_str("Config"),
        }
    }
}

/// A loaded plugin.
pub trait Plugin: Send + Sync {
    /// Called once when the plugin is loaded.
    ///
    /// # Errors
    ///
    /// Any error aborts loading this plugin.
    fn register(&self, _ctx: &ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// The plugin's contributions.
    fn capabilities(&self) -> Vec<Capability>;
}

/// A plugin assembled from a fixed list of capabilities.
#[derive(Debug, Clone, Default)]
pub struct StaticPlugin {
    capabilities: Vec<Capability>,
}

impl StaticPlugin {
    /// Creates a plugin with no capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability.
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Adds a transformer.
    #[must_use]
    pub fn with_transformer(self, transformer: Arc<dyn Transformer>) -> Self {
        self.with(Capability::transformer(transformer))
    }

    /// Adds an uploader.
    #[must_use]
    pub fn with_uploader(self, uploader: Arc<dyn Uploader>) -> Self {
        self.with(Capability::uploader(uploader))
    }

    /// Adds a beforeTransform handler.
    #[must_use]
    pub fn with_before_transform(self, handler: Arc<dyn StageHandler>) -> Self {
        self.with(Capability::BeforeTransform(handler))
    }

    /// Adds a beforeUpload handler.
    #[must_use]
    pub fn with_before_upload(self, handler: Arc<dyn StageHandler>) -> Self {
        self.with(Capability::BeforeUpload(handler))
    }

    /// Adds an afterUpload handler.
    #[must_use]
    pub fn with_after_upload(self, handler: Arc<dyn StageHandler>) -> Self {
        self.with(Capability::AfterUpload(handler))
    }

    /// Adds a configuration schema.
    #[must_use]
    pub fn with_config(self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.with(Capability::Config(provider))
    }
}

impl Plugin for StaticPlugin {
    fn capabilities(&self) -> Vec<Capability> {
        self.capabilities.clone()
    }
}

/// Builds a plugin instance against the runtime's context.
pub type PluginFactory =
    Arc<dyn Fn(&ExecutionContext) -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;

/// Wraps a ready plugin instance in a factory.
#[must_use]
pub fn factory_of(plugin: Arc<dyn Plugin>) -> PluginFactory {
    Arc::new(move |_ctx: &ExecutionContext| -> anyhow::Result<Arc<dyn Plugin>> {
        Ok(Arc::clone(&plugin))
    })
}
