//! Lifecycle registries.
//!
//! This module provides:
//! - `LifecycleRegistry`, a named insertion-ordered registry
//! - `LifecycleStage`, the five pipeline extension points
//! - `LifecycleRegistries`, one registry per stage

mod registry;

pub use registry::LifecycleRegistry;

use crate::plugin::{StageHandler, Transformer, Uploader};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The extension points of the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleStage {
    /// Handlers run before the transformer.
    BeforeTransform,
    /// The active transformer.
    Transformer,
    /// Handlers run before the uploader.
    BeforeUpload,
    /// The active uploader.
    Uploader,
    /// Handlers run after upload.
    AfterUpload,
}

impl LifecycleStage {
    /// All stages in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::BeforeTransform,
        Self::Transformer,
        Self::BeforeUpload,
        Self::Uploader,
        Self::AfterUpload,
    ];

    /// The stage's wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeTransform => "beforeTransform",
            Self::Transformer => "transformer",
            Self::BeforeUpload => "beforeUpload",
            Self::Uploader => "uploader",
            Self::AfterUpload => "afterUpload",
        }
    }

    /// Whether the stage runs every entry rather than one selected entry.
    #[must_use]
    pub fn is_handler_stage(&self) -> bool {
        matches!(
            self,
            Self::BeforeTransform | Self::BeforeUpload | Self::AfterUpload
        )
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five registries shared by a runtime.
#[derive(Debug)]
pub struct LifecycleRegistries {
    /// Transformers, selected by `picBed.transformer`.
    pub transformer: LifecycleRegistry<dyn Transformer>,
    /// Uploaders, selected by `picBed.uploader`.
    pub uploader: LifecycleRegistry<dyn Uploader>,
    /// Handlers run before transforming.
    pub before_transform: LifecycleRegistry<dyn StageHandler>,
    /// Handlers run before uploading.
    pub before_upload: LifecycleRegistry<dyn StageHandler>,
    /// Handlers run after uploading.
    pub after_upload: LifecycleRegistry<dyn StageHandler>,
}

impl Default for LifecycleRegistries {
    fn default() -> Self {
        Self {
            transformer: LifecycleRegistry::new(LifecycleStage::Transformer.as_str()),
            uploader: LifecycleRegistry::new(LifecycleStage::Uploader.as_str()),
            before_transform: LifecycleRegistry::new(LifecycleStage::BeforeTransform.as_str()),
            before_upload: LifecycleRegistry::new(LifecycleStage::BeforeUpload.as_str()),
            after_upload: LifecycleRegistry::new(LifecycleStage::AfterUpload.as_str()),
        }
    }
}

impl LifecycleRegistries {
    /// Creates five empty registries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handler registry for a handler stage.
    #[must_use]
    pub fn handlers(&self, stage: LifecycleStage) -> Option<&LifecycleRegistry<dyn StageHandler>> {
        match stage {
            LifecycleStage::BeforeTransform => Some(&self.before_transform),
            LifecycleStage::BeforeUpload => Some(&self.before_upload),
            LifecycleStage::AfterUpload => Some(&self.after_upload),
            LifecycleStage::Transformer | LifecycleStage::Uploader => None,
        }
    }

    /// Names registered in `stage`, in iteration order.
    #[must_use]
    pub fn names(&self, stage: LifecycleStage) -> Vec<String> {
        match stage {
            LifecycleStage::Transformer => self.transformer.get_list(),
            LifecycleStage::Uploader => self.uploader.get_list(),
            other => self
                .handlers(other)
                .map(LifecycleRegistry::get_list)
                .unwrap_or_default(),
        }
    }

    /// Removes `name` from `stage`. Returns whether anything was removed.
    pub fn unregister(&self, stage: LifecycleStage, name: &str) -> bool {
        match stage {
            LifecycleStage::Transformer => self.transformer.unregister(name).is_some(),
            LifecycleStage::Uploader => self.uploader.unregister(name).is_some(),
            other => self
                .handlers(other)
                .is_some_and(|r| r.unregister(name).is_some()),
        }
    }
}
