use chrono::{DateTime, Utc};

use super::rules::{format_timestamp, Rule, TIMESTAMP_KEY};
use crate::types::{Map, Value};

const FLATTEN_SEPARATOR: &str = ".";

pub(crate) fn apply(rule: &Rule, map: Map<String, Value>, now: DateTime<Utc>) -> Value {
    let result = match rule {
        Rule::FilterKeys(allowed) => map
            .into_iter()
            .filter(|(key, _)| allowed.contains(key))
            .collect(),
        Rule::ExcludeKeys(excluded) => map
            .into_iter()
            .filter(|(key, _)| !excluded.contains(key))
            .collect(),
        Rule::RenameKeys(pairs) => rename_keys(map, pairs),
        Rule::AddTimestamp => {
            let mut map = map;
            map.insert(TIMESTAMP_KEY.to_string(), Value::String(format_timestamp(now)));
            map
        }
        Rule::Flatten => {
            let mut flat = Map::new();
            flatten_into(&mut flat, map, None);
            flat
        }
        _ => map,
    };
    Value::Object(result)
}

/// Renamed keys move to the end, in mapping order.
fn rename_keys(mut map: Map<String, Value>, pairs: &[(String, String)]) -> Map<String, Value> {
    for (old, new) in pairs {
        if let Some(value) = map.shift_remove(old) {
            map.insert(new.clone(), value);
        }
    }
    map
}

fn flatten_into(out: &mut Map<String, Value>, map: Map<String, Value>, parent: Option<&str>) {
    for (key, value) in map {
        let full_key = match parent {
            Some(parent) => format!("{parent}{FLATTEN_SEPARATOR}{key}"),
            None => key,
        };
        match value {
            Value::Object(nested) => flatten_into(out, nested, Some(&full_key)),
            other => {
                out.insert(full_key, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not a mapping: {other}"),
        }
    }

    fn keys(value: &Value) -> Vec<&str> {
        value
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn filter_keys_preserves_remaining_order() {
        let out = apply(
            &Rule::FilterKeys(vec!["c".into(), "a".into()]),
            object(json!({"a": 1, "b": 2, "c": 3})),
            Utc::now(),
        );
        assert_eq!(keys(&out), vec!["a", "c"]);
    }

    #[test]
    fn rename_moves_key_to_end() {
        let out = apply(
            &Rule::RenameKeys(vec![("a".into(), "z".into())]),
            object(json!({"a": 1, "b": 2})),
            Utc::now(),
        );
        assert_eq!(keys(&out), vec!["b", "z"]);
        assert_eq!(out["z"], json!(1));
    }

    #[test]
    fn flatten_joins_nested_keys() {
        let out = apply(
            &Rule::Flatten,
            object(json!({"a": {"b": {"c": 1}}, "d": [1], "e": {}})),
            Utc::now(),
        );
        assert_eq!(out, json!({"a.b.c": 1, "d": [1]}));
    }

    #[test]
    fn exclude_keys_drops_listed() {
        let out = apply(
            &Rule::ExcludeKeys(vec!["secret".into()]),
            object(json!({"user": "x", "secret": "y"})),
            Utc::now(),
        );
        assert_eq!(out, json!({"user": "x"}));
    }
}
