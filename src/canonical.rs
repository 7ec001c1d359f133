//! Deterministic canonicalization of JSON values before writing.
//!
//! Every codec funnels its output through [`canonicalize`] so that dumps
//! are reproducible and diffable: object keys are sorted at every nesting
//! level, and arrays of records are sorted by the string form of their
//! `"id"` field, independent of input order.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Rebuilds a JSON value with sorted object keys and id-sorted record
/// arrays. With `skip_nulls`, object entries whose value is `null` are
/// dropped (absent and null fields deserialize identically, so this only
/// shrinks the output).
pub fn canonicalize(value: &Value, skip_nulls: bool) -> Value {
    match value {
        Value::Object(entries) => {
            let sorted: BTreeMap<&String, &Value> = entries.iter().collect();
            let mut out = Map::with_capacity(entries.len());
            for (key, val) in sorted {
                if skip_nulls && val.is_null() {
                    continue;
                }
                out.insert(key.clone(), canonicalize(val, skip_nulls));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out: Vec<Value> = items
                .iter()
                .map(|item| canonicalize(item, skip_nulls))
                .collect();
            if !out.is_empty() && out.iter().all(|item| element_id(item).is_some()) {
                out.sort_by_key(|item| element_id(item).unwrap_or_default());
            }
            Value::Array(out)
        }
        other => other.clone(),
    }
}

/// String form of an element's `"id"` field, if it has one.
pub fn element_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Renders a JSON value with the requested indentation; `None` is compact.
pub fn to_json_string(value: &Value, indent: Option<usize>) -> Result<String, serde_json::Error> {
    match indent {
        None => serde_json::to_string(value),
        Some(width) => {
            let indent = " ".repeat(width);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut buf = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut serializer)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_keys_are_sorted_at_every_level() {
        let value = json!({"b": {"z": 1, "a": 2}, "a": 3});
        let out = to_json_string(&canonicalize(&value, false), None).unwrap();
        assert_eq!(out, r#"{"a":3,"b":{"a":2,"z":1}}"#);
    }

    #[test]
    fn test_record_arrays_sort_by_id_string_form() {
        // Integer and string ids compare by their string form.
        let value = json!([{"id": 9}, {"id": "10"}, {"id": 2}]);
        let out = canonicalize(&value, false);
        let ids: Vec<String> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|v| element_id(v).unwrap())
            .collect();
        assert_eq!(ids, vec!["10", "2", "9"]);
    }

    #[test]
    fn test_plain_arrays_keep_their_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonicalize(&value, false), json!([3, 1, 2]));
    }

    #[test]
    fn test_skip_nulls_drops_null_entries() {
        let value = json!({"a": null, "b": [{"id": 1, "url": null}]});
        let out = canonicalize(&value, true);
        assert_eq!(out, json!({"b": [{"id": 1}]}));
    }

    #[test]
    fn test_nulls_survive_without_skip() {
        let value = json!({"a": null});
        assert_eq!(canonicalize(&value, false), json!({"a": null}));
    }

    #[test]
    fn test_indent_renders_pretty_output() {
        let value = json!({"a": 1});
        let pretty = to_json_string(&value, Some(4)).unwrap();
        assert_eq!(pretty, "{\n    \"a\": 1\n}");
        let compact = to_json_string(&value, None).unwrap();
        assert_eq!(compact, r#"{"a":1}"#);
    }
}
