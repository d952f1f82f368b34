//! Deep merge used to resolve configuration inheritance.
//!
//! Scalars from the child replace the parent's, mappings merge key by key and
//! sequences accumulate: the parent's elements come first, followed by the
//! child's. A child that lists `includePaths` therefore extends its parent's
//! list rather than replacing it.

use serde_json::{Map, Value};

/// Key naming the configuration a child inherits from.
pub const INHERIT_KEY: &str = "inherit";

/// Merge `child` over `parent`, returning a new mapping.
///
/// Non-object inputs contribute nothing.
///
/// ```
/// use crossbuild::config::merge;
/// use serde_json::json;
///
/// let parent = json!({"defines": ["DEBUG"], "productDir": "build/debug"});
/// let child = json!({"defines": ["NDEBUG"], "productDir": "build/release"});
/// assert_eq!(
///     merge(&parent, &child),
///     json!({"defines": ["DEBUG", "NDEBUG"], "productDir": "build/release"})
/// );
/// ```
#[must_use]
pub fn merge(parent: &Value, child: &Value) -> Value {
    let mut merged = Map::new();
    for source in [parent, child] {
        if let Value::Object(map) = source {
            merge_into(&mut merged, map);
        }
    }
    Value::Object(merged)
}

/// Merge a configuration over its parent and drop the `inherit` key.
#[must_use]
pub fn merge_configuration(parent: &Value, child: &Value) -> Value {
    let mut merged = merge(parent, child);
    if let Value::Object(map) = &mut merged {
        map.remove(INHERIT_KEY);
    }
    merged
}

fn merge_into(dest: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in src {
        match value {
            Value::Array(items) => {
                let slot = dest
                    .entry(key.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(existing) = slot {
                    existing.extend(items.iter().cloned());
                }
            }
            Value::Object(nested) => {
                let slot = dest
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(existing) = slot {
                    merge_into(existing, nested);
                }
            }
            scalar => {
                dest.insert(key.clone(), scalar.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn sequences_concatenate_parent_then_child() {
        let parent = json!({"includePaths": ["a", "b"]});
        let child = json!({"includePaths": ["c"]});
        assert_eq!(
            merge(&parent, &child),
            json!({"includePaths": ["a", "b", "c"]})
        );
    }

    #[rstest]
    fn nested_mappings_merge_recursively() {
        let parent = json!({"flags": {"CC": ["-O0"], "LD": ["-g"]}});
        let child = json!({"flags": {"CC": ["-Wall"], "AS": ["-x"]}});
        assert_eq!(
            merge(&parent, &child),
            json!({"flags": {"CC": ["-O0", "-Wall"], "LD": ["-g"], "AS": ["-x"]}})
        );
    }

    #[rstest]
    fn scalars_prefer_child() {
        let parent = json!({"productDir": "p", "keep": 1});
        let child = json!({"productDir": "c"});
        assert_eq!(
            merge(&parent, &child),
            json!({"productDir": "c", "keep": 1})
        );
    }

    #[rstest]
    fn child_sequence_replaces_parent_scalar() {
        let parent = json!({"defines": "X"});
        let child = json!({"defines": ["Y"]});
        assert_eq!(merge(&parent, &child), json!({"defines": ["Y"]}));
    }

    #[rstest]
    fn merged_result_shares_nothing_with_inputs() {
        let parent = json!({"postBuildTasks": [{"args": ["a"]}]});
        let child = json!({});
        let mut merged = merge(&parent, &child);
        if let Some(Value::Array(args)) = merged.pointer_mut("/postBuildTasks/0/args") {
            args.push(json!("b"));
        }
        assert_eq!(parent, json!({"postBuildTasks": [{"args": ["a"]}]}));
        assert_eq!(
            merged,
            json!({"postBuildTasks": [{"args": ["a", "b"]}]})
        );
    }

    #[rstest]
    fn inherit_key_is_removed() {
        let parent = json!({"defines": ["DEBUG"]});
        let child = json!({"inherit": "debug", "defines": ["NDEBUG"]});
        let merged = merge_configuration(&parent, &child);
        assert_eq!(merged, json!({"defines": ["DEBUG", "NDEBUG"]}));
        assert!(merged.get(INHERIT_KEY).is_none());
    }
}
