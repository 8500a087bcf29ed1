//! Durable storage for the configuration tree.

use crate::errors::ConfigPersistError;
use parking_lot::RwLock;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Reads and writes the full configuration tree.
///
/// The store only ever calls `read` and `write(tree)`; format and location
/// belong to the implementation.
pub trait ConfigPersistence: Send + Sync {
    /// Loads the persisted tree. A missing store yields an empty object.
    fn read(&self) -> Result<Value, ConfigPersistError>;

    /// Replaces the persisted tree.
    ///
    /// On failure the previously persisted tree must remain readable.
    fn write(&self, tree: &Value) -> Result<(), ConfigPersistError>;
}

/// Persists the configuration as pretty-printed JSON on disk.
///
/// Writes go to a sibling temp file which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Creates a persistence adapter for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the config file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigPersistence for JsonFilePersistence {
    fn read(&self) -> Result<Value, ConfigPersistError> {
        if !self.path.exists() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ConfigPersistError::new(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&content).map_err(|e| {
            ConfigPersistError::new(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn write(&self, tree: &Value) -> Result<(), ConfigPersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigPersistError::new(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(tree)
            .map_err(|e| ConfigPersistError::new(format!("failed to serialize: {e}")))?;

        let temp = self.temp_path();
        std::fs::write(&temp, content).map_err(|e| {
            ConfigPersistError::new(format!("failed to write {}: {}", temp.display(), e))
        })?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            ConfigPersistError::new(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Keeps the "durable" tree in memory.
///
/// Used by ephemeral hosts and tests. Writes are counted and can be made to
/// fail on demand.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    tree: RwLock<Option<Value>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryPersistence {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `tree`.
    #[must_use]
    pub fn with_tree(tree: Value) -> Self {
        Self {
            tree: RwLock::new(Some(tree)),
            ..Self::default()
        }
    }

    /// Returns the currently persisted tree, if any write or seed happened.
    #[must_use]
    pub fn persisted(&self) -> Option<Value> {
        self.tree.read().clone()
    }

    /// Returns the number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ConfigPersistence for MemoryPersistence {
    fn read(&self) -> Result<Value, ConfigPersistError> {
        Ok(self
            .tree
            .read()
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())))
    }

    fn write(&self, tree: &Value) -> Result<(), ConfigPersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConfigPersistError::new("memory store rejected write"));
        }
        *self.tree.write() = Some(tree.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
