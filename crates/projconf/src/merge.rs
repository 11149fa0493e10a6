//! deep merge of configuration values
//!
//! - Objects: deep-merge by key (recursive, base key order kept, new keys appended)
//! - Arrays: REPLACE (last wins, never concatenated)
//! - Scalars: override (last wins)
//! - Null: never erases an existing value
use crate::value::Value;

/// Deep merge `overlay` into `base`, the overlay wins conflicts.
///
/// Both arguments are taken by value; the result shares nothing with any value the caller kept.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => {
                        let current = std::mem::replace(base_value, Value::Null);
                        *base_value = deep_merge(current, overlay_value);
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            Value::Object(base_map)
        }

        (base, Value::Null) => base,

        (_, overlay) => overlay,
    }
}
