//! Combining partial node results into the record context and the output.
use serde_json::{Map, Value};

/// Deep-merges `source` into `target`. Where both sides hold an object the merge recurses;
/// anything else in `source` replaces the target value.
pub fn merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Object(nested) => {
                let slot = target
                    .entry(key)
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(existing) = slot {
                    merge(existing, nested);
                }
            }
            other => {
                target.insert(key, other);
            }
        }
    }
}

/// Assigns `value` at a dotted `path` such as `"a.b.c"`, creating intermediate objects
/// and replacing intermediate non-objects.
pub fn set_by_path(object: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts = path.split('.');
    let Some(mut key) = parts.next() else {
        return;
    };
    let mut target = object;
    for next in parts {
        let slot = target
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(nested) = slot else {
            return;
        };
        target = nested;
        key = next;
    }
    target.insert(key.to_string(), value);
}

