//! Dotted-path helpers over JSON configuration trees.

use serde_json::{Map, Value};

/// Splits a dotted path into its non-empty segments.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Returns the value at `path`, if every segment resolves to an object key.
#[must_use]
pub fn get_path<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(tree, |node, key| node.as_object()?.get(key))
}

/// Deep-merges `patch` into `target`.
///
/// Objects merge key by key; arrays and scalars replace the target wholesale.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match target_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Deep-merges `value` into the subtree at `path`.
///
/// Missing or non-object intermediate values become objects.
pub fn merge_path(tree: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = segments(path).collect();
    let patch = parts.into_iter().rev().fold(value, |inner, key| {
        let mut map = Map::new();
        map.insert(key.to_string(), inner);
        Value::Object(map)
    });
    deep_merge(tree, patch);
}

/// Removes `prop` from the object at `path`. Returns the removed value.
pub fn unset_path(tree: &mut Value, path: &str, prop: &str) -> Option<Value> {
    let node = segments(path).try_fold(tree, |node, key| node.as_object_mut()?.get_mut(key))?;
    node.as_object_mut()?.remove(prop)
}
