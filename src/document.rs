//! Dot-path helpers over ANS documents held as `serde_json::Value`.

use serde_json::{Map, Value};

/// Get a nested value using a dot notation path
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

pub fn get_path_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(map) => current = map.get_mut(part)?,
            _ => return None,
        }
    }
    Some(current)
}

/// String at `path`, ignoring empty strings.
pub fn get_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    get_path(value, path).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Set `path` to `new_value`, creating intermediate objects. Returns the
/// previous value. Non-object intermediates are replaced.
pub fn set_path(value: &mut Value, path: &str, new_value: Value) -> Option<Value> {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = parts.pop()?;
    let mut current = value;
    for part in parts {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()?
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current.as_object_mut()?.insert(last.to_string(), new_value)
}

/// Remove the value at `path`, returning it.
pub fn remove_path(value: &mut Value, path: &str) -> Option<Value> {
    let (parent, key) = match path.rsplit_once('.') {
        Some((parent, key)) => (get_path_mut(value, parent)?, key),
        None => (value, path),
    };
    parent.as_object_mut()?.remove(key)
}

/// Array elements at `path`, or an empty slice.
pub fn array_at<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    get_path(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn array_at_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Vec<Value>> {
    get_path_mut(value, path).and_then(Value::as_array_mut)
}

/// Id of an embedded element: `_id` first, then `referent.id`, then `id`.
pub fn element_id(element: &Value) -> Option<&str> {
    get_str(element, "_id")
        .or_else(|| get_str(element, "referent.id"))
        .or_else(|| get_str(element, "id"))
}

/// Type of an embedded element, looking through reference syntax.
pub fn element_type(element: &Value) -> Option<&str> {
    match get_str(element, "type") {
        Some("reference") | None => get_str(element, "referent.type"),
        other => other,
    }
}

/// Point an embedded element at `new_id`, in whichever id slots it already uses.
pub fn rewrite_element_id(element: &mut Value, new_id: &str) {
    if get_path(element, "_id").is_some() {
        set_path(element, "_id", Value::String(new_id.to_string()));
    }
    if get_path(element, "referent.id").is_some() {
        set_path(element, "referent.id", Value::String(new_id.to_string()));
    }
    if get_path(element, "id").is_some() {
        set_path(element, "id", Value::String(new_id.to_string()));
    }
}

/// Build a `{type: reference, referent: {...}}` section reference.
pub fn section_reference(section_id: &str, website: &str) -> Value {
    serde_json::json!({
        "type": "reference",
        "referent": {
            "id": section_id,
            "type": "section",
            "website": website,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_value() {
        let doc = json!({"level1": {"level2": {"level3": "test_value"}}});
        assert_eq!(get_str(&doc, "level1.level2.level3"), Some("test_value"));
        assert!(get_path(&doc, "level1.missing.level3").is_none());
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut doc = json!({"owner": "not-an-object"});
        set_path(&mut doc, "additional_properties.ingestionMethod", json!("moved"));
        set_path(&mut doc, "owner.id", json!("org-b"));
        assert_eq!(doc["additional_properties"]["ingestionMethod"], "moved");
        assert_eq!(doc["owner"]["id"], "org-b");
    }

    #[test]
    fn test_remove_path() {
        let mut doc = json!({"source": {"edit_url": "https://x", "name": "wire"}, "revision": {}});
        assert_eq!(remove_path(&mut doc, "source.edit_url"), Some(json!("https://x")));
        assert!(remove_path(&mut doc, "revision").is_some());
        assert!(remove_path(&mut doc, "missing.path").is_none());
        assert_eq!(doc, json!({"source": {"name": "wire"}}));
    }

    #[test]
    fn test_element_id_and_type_through_reference() {
        let element = json!({"type": "reference", "referent": {"id": "I1", "type": "image"}});
        assert_eq!(element_id(&element), Some("I1"));
        assert_eq!(element_type(&element), Some("image"));

        let inline = json!({"_id": "I2", "type": "image"});
        assert_eq!(element_id(&inline), Some("I2"));
        assert_eq!(element_type(&inline), Some("image"));
    }

    #[test]
    fn test_rewrite_element_id_only_touches_present_slots() {
        let mut element = json!({"_id": "I1", "referent": {"id": "I1", "type": "image"}});
        rewrite_element_id(&mut element, "NEW");
        assert_eq!(element, json!({"_id": "NEW", "referent": {"id": "NEW", "type": "image"}}));
    }
}
