//! Layered configuration.
//!
//! This module provides:
//! - The in-memory configuration store with dotted-path access
//! - Persistence adapters for the durable tree
//! - Typed views over well-known subtrees

mod persistence;
mod settings;
mod store;
mod tree;

pub use persistence::{ConfigPersistence, JsonFilePersistence, MemoryPersistence};
pub use settings::{
    default_tree, PicBedSettings, RequestSettings, DEFAULT_TRANSFORMER, PIC_BED_KEY, PLUGINS_KEY,
    REQUEST_SETTINGS_PATH, SETTINGS_KEY,
};
pub use store::ConfigStore;
