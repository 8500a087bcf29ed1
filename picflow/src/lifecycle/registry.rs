//! Named, ordered registry for one lifecycle stage.

use crate::errors::PicflowError;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// An insertion-ordered collection of named entries.
///
/// Names are unique. Registering an existing name removes the old entry and
/// appends the new one, so it moves to the end of iteration order.
pub struct LifecycleRegistry<T: ?Sized + Send + Sync> {
    name: &'static str,
    entries: RwLock<Vec<(String, Arc<T>)>>,
}

impl<T: ?Sized + Send + Sync> LifecycleRegistry<T> {
    /// Creates an empty registry labelled with its stage name.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Returns the stage label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers `entry` under `id`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if `id` is empty.
    pub fn register(&self, id: impl Into<String>, entry: Arc<T>) -> Result<(), PicflowError> {
        self.replace(id, entry).map(|_| ())
    }

    /// Registers `entry` under `id` and returns the entry it displaced.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if `id` is empty.
    pub fn replace(
        &self,
        id: impl Into<String>,
        entry: Arc<T>,
    ) -> Result<Option<Arc<T>>, PicflowError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PicflowError::InvalidName(format!(
                "{} entries need a non-empty name",
                self.name
            )));
        }

        let mut entries = self.entries.write();
        let previous = entries
            .iter()
            .position(|(n, _)| *n == id)
            .map(|pos| entries.remove(pos).1);
        debug!(
            registry = self.name,
            entry = %id,
            replaced = previous.is_some(),
            "Registered entry"
        );
        entries.push((id, entry));
        Ok(previous)
    }

    /// Removes the entry named `id`, returning it if it was present.
    pub fn unregister(&self, id: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.write();
        let pos = entries.iter().position(|(n, _)| n == id)?;
        debug!(registry = self.name, entry = %id, "Unregistered entry");
        Some(entries.remove(pos).1)
    }

    /// Removes the entry named `id` only if it is `entry` itself.
    ///
    /// Returns `false` when the name is missing or now holds another entry.
    pub fn unregister_if(&self, id: &str, entry: &Arc<T>) -> bool {
        let mut entries = self.entries.write();
        let Some(pos) = entries
            .iter()
            .position(|(n, e)| n == id && Arc::ptr_eq(e, entry))
        else {
            return false;
        };
        entries.remove(pos);
        debug!(registry = self.name, entry = %id, "Unregistered entry");
        true
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .iter()
            .find(|(n, _)| n == id)
            .map(|(_, e)| Arc::clone(e))
    }

    /// Returns the names in iteration order.
    #[must_use]
    pub fn get_list(&self) -> Vec<String> {
        self.entries.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Same as [`get_list`](Self::get_list).
    #[must_use]
    pub fn get_id_list(&self) -> Vec<String> {
        self.get_list()
    }

    /// Returns a snapshot of all entries in iteration order.
    ///
    /// The lock is released before this returns, so callers may await while
    /// iterating.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Arc<T>)> {
        self.entries
            .read()
            .iter()
            .map(|(n, e)| (n.clone(), Arc::clone(e)))
            .collect()
    }

    /// Whether an entry named `id` exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().iter().any(|(n, _)| n == id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: ?Sized + Send + Sync> std::fmt::Debug for LifecycleRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleRegistry")
            .field("name", &self.name)
            .field("entries", &self.get_list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn registry() -> LifecycleRegistry<str> {
        LifecycleRegistry::new("test")
    }

    fn entry(value: &str) -> Arc<str> {
        Arc::from(value)
    }

    #[test]
    fn test_register_and_get() {
        let reg = registry();
        reg.register("a", entry("first")).unwrap();
        reg.register("b", entry("second")).unwrap();

        assert_eq!(&*reg.get("a").unwrap(), "first");
        assert!(reg.get("missing").is_none());
        assert_eq!(reg.get_list(), vec!["a", "b"]);
        assert_eq!(reg.get_id_list(), reg.get_list());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_replace_moves_to_end() {
        let reg = registry();
        reg.register("a", entry("1")).unwrap();
        reg.register("b", entry("2")).unwrap();
        reg.register("a", entry("3")).unwrap();

        assert_eq!(reg.get_list(), vec!["b", "a"]);
        assert_eq!(&*reg.get("a").unwrap(), "3");
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let reg = registry();
        reg.register("a", entry("1")).unwrap();

        assert!(reg.unregister("a").is_some());
        assert!(reg.unregister("a").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_replace_returns_displaced_entry() {
        let reg = registry();
        let first = entry("1");
        assert!(reg.replace("a", Arc::clone(&first)).unwrap().is_none());

        let displaced = reg.replace("a", entry("2")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&displaced, &first));
        assert_eq!(&*reg.get("a").unwrap(), "2");
    }

    #[test]
    fn test_unregister_if_only_removes_same_entry() {
        let reg = registry();
        let stale = entry("old");
        let live = entry("new");
        reg.register("a", Arc::clone(&stale)).unwrap();
        reg.register("a", Arc::clone(&live)).unwrap();

        assert!(!reg.unregister_if("a", &stale));
        assert!(Arc::ptr_eq(&reg.get("a").unwrap(), &live));
        assert!(reg.unregister_if("a", &live));
        assert!(!reg.unregister_if("a", &live));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let reg = registry();
        let err = reg.register("  ", entry("x")).unwrap_err();
        assert!(matches!(err, PicflowError::InvalidName(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_names_stay_unique_under_mixed_operations() {
        let reg = registry();
        let ops = [
            ("r", "a"),
            ("r", "b"),
            ("r", "a"),
            ("u", "b"),
            ("r", "c"),
            ("r", "b"),
            ("u", "x"),
            ("r", "c"),
        ];
        for (op, name) in ops {
            if op == "r" {
                reg.register(name, entry(name)).unwrap();
            } else {
                reg.unregister(name);
            }
            let names = reg.get_list();
            let unique: HashSet<_> = names.iter().collect();
            assert_eq!(unique.len(), names.len());
        }
        assert_eq!(reg.get_list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_entries_snapshot() {
        let reg = registry();
        reg.register("a", entry("1")).unwrap();
        let snapshot = reg.entries();
        reg.register("b", entry("2")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(reg.contains("b"));
        assert_eq!(reg.name(), "test");
    }
}
