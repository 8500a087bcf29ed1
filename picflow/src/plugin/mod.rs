//! Plugins and the entries they contribute.
//!
//! This module provides:
//! - `Transformer`, `Uploader` and `StageHandler`, the registry entry traits
//! - `Plugin` and `Capability`, how a plugin declares its contributions
//! - `PluginLoader`, which loads plugins into the lifecycle registries

mod capability;
mod loader;
mod stage;

pub use capability::{
    factory_of, Capability, ConfigItem, ConfigItemType, ConfigProvider, Plugin, PluginFactory,
    StaticPlugin,
};
pub use loader::PluginLoader;
pub use stage::{FnHandler, StageHandler, Transformer, UploadGranularity, Uploader};
