//! Layered configuration store.

use super::persistence::{ConfigPersistence, MemoryPersistence};
use super::settings::default_tree;
use super::tree::{deep_merge, get_path, merge_path, unset_path};
use crate::errors::{ConfigPersistError, PicflowError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Operation-time configuration, layered over built-in defaults.
///
/// `set_config`/`unset_config` only touch the in-memory tree.
/// `save_config`/`remove_config` mutate memory and then persist the whole
/// tree. A failed persist keeps the in-memory change and surfaces the error,
/// so a retry does not need the delta again.
pub struct ConfigStore {
    tree: RwLock<Value>,
    defaults: Value,
    persistence: Arc<dyn ConfigPersistence>,
}

impl ConfigStore {
    /// Loads the tree from `persistence`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigPersistError` if the durable tree cannot be read, or
    /// `Config` if it is not a JSON object.
    pub fn load(persistence: Arc<dyn ConfigPersistence>) -> Result<Self, PicflowError> {
        let tree = read_object(persistence.as_ref())?;
        Ok(Self {
            tree: RwLock::new(tree),
            defaults: default_tree(),
            persistence,
        })
    }

    /// Creates an empty store backed by [`MemoryPersistence`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            tree: RwLock::new(Value::Object(serde_json::Map::new())),
            defaults: default_tree(),
            persistence: Arc::new(MemoryPersistence::new()),
        }
    }

    /// Replaces the built-in defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the full tree (`None`) or the value at a dotted path.
    ///
    /// Objects are layered over the matching default object. Absent paths
    /// fall back to the defaults, then to `Value::Null`.
    #[must_use]
    pub fn get_config(&self, name: Option<&str>) -> Value {
        let tree = self.tree.read();
        match name {
            None => {
                let mut merged = self.defaults.clone();
                deep_merge(&mut merged, tree.clone());
                merged
            }
            Some(path) => match (get_path(&tree, path), get_path(&self.defaults, path)) {
                (Some(value @ Value::Object(_)), Some(default @ Value::Object(_))) => {
                    let mut merged = default.clone();
                    deep_merge(&mut merged, value.clone());
                    merged
                }
                (Some(value), _) | (None, Some(value)) => value.clone(),
                (None, None) => Value::Null,
            },
        }
    }

    /// Deserializes the value at `path`, or returns `T::default()` if absent.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the stored value has the wrong shape.
    pub fn get_config_as<T>(&self, path: &str) -> Result<T, PicflowError>
    where
        T: DeserializeOwned + Default,
    {
        match self.get_config(Some(path)) {
            Value::Null => Ok(T::default()),
            value => serde_json::from_value(value)
                .map_err(|e| PicflowError::Config(format!("invalid value at '{path}': {e}"))),
        }
    }

    /// Returns the string at `path`, if present and non-empty.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get_config(Some(path))
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    /// Merges `partial` into the in-memory tree without persisting.
    ///
    /// Each top-level key of `partial` is a dotted path whose value is
    /// deep-merged into the subtree at that path. Arrays are replaced.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `partial` is not a JSON object.
    pub fn set_config(&self, partial: Value) -> Result<(), PicflowError> {
        let Value::Object(entries) = partial else {
            return Err(PicflowError::Config(
                "partial config must be a JSON object".to_string(),
            ));
        };

        let mut tree = self.tree.write();
        for (path, value) in entries {
            debug!(path = %path, "Setting config value");
            merge_path(&mut tree, &path, value);
        }
        Ok(())
    }

    /// Merges `partial` into memory, then persists the whole tree.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a non-object partial, or `ConfigPersist` if the
    /// write fails. The in-memory change is kept in the latter case.
    pub fn save_config(&self, partial: Value) -> Result<(), PicflowError> {
        self.set_config(partial)?;
        self.persist()
    }

    /// Deletes `prop` from the object at `key`, in memory only.
    pub fn unset_config(&self, key: &str, prop: &str) {
        let removed = unset_path(&mut self.tree.write(), key, prop);
        debug!(key = %key, prop = %prop, removed = removed.is_some(), "Unset config value");
    }

    /// Deletes `prop` from the object at `key`, then persists the tree.
    ///
    /// # Errors
    ///
    /// Returns `ConfigPersist` if the write fails.
    pub fn remove_config(&self, key: &str, prop: &str) -> Result<(), PicflowError> {
        self.unset_config(key, prop);
        self.persist()
    }

    /// Writes the current in-memory tree to durable storage.
    ///
    /// # Errors
    ///
    /// Returns `ConfigPersist` if the write fails.
    pub fn persist(&self) -> Result<(), PicflowError> {
        let snapshot = self.tree.read().clone();
        self.persistence.write(&snapshot).map_err(|e| {
            error!(error = %e, "Failed to persist configuration");
            PicflowError::from(e)
        })
    }

    /// Replaces the in-memory tree with the durable one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigPersist` if the read fails; memory is left unchanged.
    pub fn reload(&self) -> Result<(), PicflowError> {
        let tree = read_object(self.persistence.as_ref())?;
        *self.tree.write() = tree;
        Ok(())
    }
}

fn read_object(persistence: &dyn ConfigPersistence) -> Result<Value, PicflowError> {
    match persistence.read()? {
        tree @ Value::Object(_) => Ok(tree),
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        other => Err(PicflowError::from(ConfigPersistError::new(format!(
            "persisted config is not an object: {other}"
        )))),
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self
            .tree
            .read()
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("ConfigStore").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PicBedSettings;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store_with_memory() -> (ConfigStore, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigStore::load(persistence.clone()).unwrap();
        (store, persistence)
    }

    #[test]
    fn test_set_get_unset_stays_in_memory() {
        let (store, persistence) = store_with_memory();

        store.set_config(json!({"a": {"b": 1}})).unwrap();
        assert_eq!(store.get_config(Some("a")), json!({"b": 1}));

        store.unset_config("a", "b");
        assert_eq!(store.get_config(Some("a")), json!({}));

        assert_eq!(persistence.write_count(), 0);
        assert_eq!(persistence.persisted(), None);
    }

    #[test]
    fn test_save_and_remove_persist() {
        let (store, persistence) = store_with_memory();

        store.save_config(json!({"picBed.current": "github"})).unwrap();
        assert_eq!(persistence.write_count(), 1);
        assert_eq!(persistence.persisted().unwrap()["picBed"]["current"], "github");

        store.remove_config("picBed", "current").unwrap();
        assert_eq!(persistence.write_count(), 2);
        assert_eq!(persistence.persisted().unwrap(), json!({"picBed": {}}));
    }

    #[test]
    fn test_defaults_fill_absent_keys() {
        let (store, _) = store_with_memory();
        assert_eq!(store.get_config(Some("picBed.transformer")), json!("path"));
        assert_eq!(store.get_config(Some("picBed.uploader")), Value::Null);

        store.set_config(json!({"picBed.transformer": "base64"})).unwrap();
        assert_eq!(store.get_str("picBed.transformer").as_deref(), Some("base64"));
    }

    #[test]
    fn test_full_tree_is_layered() {
        let (store, _) = store_with_memory();
        store.set_config(json!({"picBed": {"current": "smms"}})).unwrap();

        let tree = store.get_config(None);
        assert_eq!(tree["picBed"]["current"], "smms");
        assert_eq!(tree["picBed"]["transformer"], "path");
        assert!(tree["plugins"].is_object());
    }

    #[test]
    fn test_arrays_replaced_wholesale() {
        let (store, _) = store_with_memory();
        store.set_config(json!({"settings": {"list": [1, 2, 3]}})).unwrap();
        store.set_config(json!({"settings": {"list": [4]}})).unwrap();
        assert_eq!(store.get_config(Some("settings.list")), json!([4]));
    }

    #[test]
    fn test_failed_persist_keeps_memory() {
        let (store, persistence) = store_with_memory();
        store.save_config(json!({"a": 1})).unwrap();

        persistence.set_fail_writes(true);
        let err = store.save_config(json!({"a": 2})).unwrap_err();
        assert!(matches!(err, PicflowError::ConfigPersist(_)));
        assert_eq!(store.get_config(Some("a")), json!(2));
        assert_eq!(persistence.persisted(), Some(json!({"a": 1})));

        persistence.set_fail_writes(false);
        store.persist().unwrap();
        assert_eq!(persistence.persisted(), Some(json!({"a": 2})));
    }

    #[test]
    fn test_set_config_rejects_non_object() {
        let (store, _) = store_with_memory();
        assert!(matches!(
            store.set_config(json!([1, 2])),
            Err(PicflowError::Config(_))
        ));
    }

    #[test]
    fn test_typed_read() {
        let (store, _) = store_with_memory();
        store.set_config(json!({"picBed": {"uploader": "imgur"}})).unwrap();

        let settings: PicBedSettings = store.get_config_as("picBed").unwrap();
        assert_eq!(settings.active_uploader(), Some("imgur"));
        assert_eq!(settings.transformer, "path");

        store.set_config(json!({"picBed": {"uploader": 42}})).unwrap();
        assert!(store.get_config_as::<PicBedSettings>("picBed").is_err());
    }

    #[test]
    fn test_reload_discards_unsaved_changes() {
        let persistence = Arc::new(MemoryPersistence::with_tree(json!({"a": 1})));
        let store = ConfigStore::load(persistence).unwrap();
        store.set_config(json!({"a": 5})).unwrap();

        store.reload().unwrap();
        assert_eq!(store.get_config(Some("a")), json!(1));
    }
}
