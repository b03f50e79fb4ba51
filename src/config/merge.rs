use serde_json::Value;

/// Deep-merges `override_` onto `base` in place: objects merge key-by-key,
/// arrays and scalars replace the base value entirely.
pub(crate) fn merge_json(base: &mut Value, override_: &Value) {
    match (base, override_) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, override_value) in override_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_json(base_value, override_value),
                    None => {
                        base_map.insert(key.clone(), override_value.clone());
                    }
                }
            }
        }
        (base_slot, override_value) => {
            *base_slot = override_value.clone();
        }
    }
}
