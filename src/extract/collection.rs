use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{string_pairs, Map, Value};

const PATH_SEPARATOR: char = '.';

/// In-memory extraction options. The first option that applies to the input
/// shape is used; the rest are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub extract_keys: Vec<String>,
    #[serde(deserialize_with = "string_pairs")]
    pub extract_paths: Vec<(String, String)>,
    pub extract_list: Option<ListSelection>,
    pub json_path: Option<String>,
    #[serde(deserialize_with = "string_pairs")]
    pub regex_patterns: Vec<(String, String)>,
}

/// How to pick records out of a sequence. `indices`, `first`, `last` and
/// `filter` are tried in that order; `fields` then projects the picked records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListSelection {
    pub indices: Option<Vec<i64>>,
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub filter: Option<RecordFilter>,
    pub fields: Option<Vec<String>>,
}

/// Every present predicate must hold. Field predicates only constrain mapping
/// records; other records pass them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    pub field_equals: Option<FieldEquals>,
    pub has_field: Option<String>,
    pub value_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldEquals {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

impl CollectionConfig {
    pub fn is_empty(&self) -> bool {
        self.extract_keys.is_empty()
            && self.extract_paths.is_empty()
            && self.extract_list.is_none()
            && self.json_path.is_none()
            && self.regex_patterns.is_empty()
    }
}

/// Filters or projects `data`. Never fails: an option that does not fit the
/// input shape leaves the input unchanged.
pub fn extract(data: Value, config: &CollectionConfig) -> Value {
    match data {
        Value::Object(map) if !config.extract_keys.is_empty() => {
            debug!(keys = config.extract_keys.len(), "extracting keys");
            Value::Object(pick_keys(&map, &config.extract_keys))
        }
        Value::Object(map) if !config.extract_paths.is_empty() => {
            let root = Value::Object(map);
            let mut out = Map::new();
            for (name, path) in &config.extract_paths {
                match lookup_path(&root, path) {
                    Some(found) if !found.is_null() => {
                        out.insert(name.clone(), found.clone());
                    }
                    _ => debug!(path = %path, "path not found"),
                }
            }
            Value::Object(out)
        }
        Value::Array(items) if config.extract_list.is_some() => match &config.extract_list {
            Some(selection) => Value::Array(select_records(items, selection)),
            None => Value::Array(items),
        },
        data if config.json_path.is_some() => match config.json_path.as_deref() {
            Some(path) => json_path(data, path),
            None => data,
        },
        Value::String(text) if !config.regex_patterns.is_empty() => {
            Value::Object(regex_matches(&text, &config.regex_patterns))
        }
        other => other,
    }
}

fn pick_keys(map: &Map<String, Value>, keys: &[String]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| map.get(key).map(|value| (key.clone(), value.clone())))
        .collect()
}

/// Dot-path lookup; numeric segments index into sequences.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        })
}

/// `$.a.b` style access. Anything not starting with `$.` returns the input.
fn json_path(data: Value, path: &str) -> Value {
    match path.strip_prefix("$.") {
        Some(rest) => lookup_path(&data, rest).cloned().unwrap_or(Value::Null),
        None => data,
    }
}

fn select_records(items: Vec<Value>, selection: &ListSelection) -> Vec<Value> {
    let picked = if let Some(indices) = &selection.indices {
        indices
            .iter()
            .filter_map(|&i| usize::try_from(i).ok())
            .filter_map(|i| items.get(i).cloned())
            .collect()
    } else if let Some(n) = selection.first {
        items.into_iter().take(n).collect()
    } else if let Some(n) = selection.last {
        let skip = items.len().saturating_sub(n);
        items.into_iter().skip(skip).collect()
    } else if let Some(filter) = &selection.filter {
        items
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect()
    } else {
        items
    };

    match &selection.fields {
        Some(fields) => picked
            .into_iter()
            .map(|record| match record {
                Value::Object(map) => Value::Object(pick_keys(&map, fields)),
                other => other,
            })
            .collect(),
        None => picked,
    }
}

impl RecordFilter {
    pub fn matches(&self, item: &Value) -> bool {
        if let (Some(cond), Value::Object(map)) = (&self.field_equals, item) {
            if map.get(&cond.field).unwrap_or(&Value::Null) != &cond.value {
                return false;
            }
        }
        if let (Some(field), Value::Object(map)) = (&self.has_field, item) {
            if !map.contains_key(field) {
                return false;
            }
        }
        match self.value_type.as_deref() {
            Some(kind) => has_type(item, kind),
            None => true,
        }
    }
}

fn has_type(item: &Value, kind: &str) -> bool {
    match kind {
        "string" => item.is_string(),
        "number" => item.is_number(),
        "integer" => item.is_i64() || item.is_u64(),
        "float" => item.is_f64(),
        "boolean" => item.is_boolean(),
        "dict" => item.is_object(),
        "list" => item.is_array(),
        other => {
            warn!(value_type = %other, "unknown value_type, predicate ignored");
            true
        }
    }
}

/// All matches per pattern: the whole match without groups, the group with
/// one, a sequence of groups with several. No match or a bad pattern is null.
fn regex_matches(text: &str, patterns: &[(String, String)]) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, pattern) in patterns {
        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(err) => {
                warn!(pattern = %pattern, "invalid regex pattern: {err}");
                out.insert(name.clone(), Value::Null);
                continue;
            }
        };
        let groups = regex.captures_len() - 1;
        let matches: Vec<Value> = regex
            .captures_iter(text)
            .map(|caps| {
                let group = |i: usize| {
                    Value::String(caps.get(i).map(|m| m.as_str()).unwrap_or("").to_string())
                };
                match groups {
                    0 => group(0),
                    1 => group(1),
                    n => Value::Array((1..=n).map(group).collect()),
                }
            })
            .collect();
        let value = if matches.is_empty() {
            Value::Null
        } else {
            Value::Array(matches)
        };
        out.insert(name.clone(), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> CollectionConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn extract_keys_keeps_present_keys() {
        let out = extract(
            json!({"name": "Alice", "age": 30, "city": "Berlin"}),
            &config(json!({"extract_keys": ["name", "age", "missing"]})),
        );
        assert_eq!(out, json!({"name": "Alice", "age": 30}));
    }

    #[test]
    fn extract_paths_walks_mappings_and_sequences() {
        let out = extract(
            json!({"user": {"name": "Bob", "tags": ["a", "b"]}}),
            &config(json!({"extract_paths": {
                "username": "user.name",
                "second": "user.tags.1",
                "gone": "user.email"
            }})),
        );
        assert_eq!(out, json!({"username": "Bob", "second": "b"}));
    }

    #[test]
    fn extract_keys_on_sequence_falls_through() {
        let input = json!([1, 2]);
        let out = extract(input.clone(), &config(json!({"extract_keys": ["a"]})));
        assert_eq!(out, input);
    }

    #[test]
    fn indices_skip_out_of_range() {
        let out = extract(
            json!(["a", "b", "c"]),
            &config(json!({"extract_list": {"indices": [2, 0, 7, -1]}})),
        );
        assert_eq!(out, json!(["c", "a"]));
    }

    #[test]
    fn first_and_last() {
        let data = json!([1, 2, 3, 4]);
        assert_eq!(
            extract(data.clone(), &config(json!({"extract_list": {"first": 2}}))),
            json!([1, 2])
        );
        assert_eq!(
            extract(data.clone(), &config(json!({"extract_list": {"last": 3}}))),
            json!([2, 3, 4])
        );
        assert_eq!(
            extract(data, &config(json!({"extract_list": {"last": 0}}))),
            json!([])
        );
    }

    #[test]
    fn filter_field_equals_with_projection() {
        let data = json!([
            {"type": "fruit", "name": "apple", "id": 1},
            {"type": "vegetable", "name": "carrot", "id": 2},
            {"type": "fruit", "name": "banana", "id": 3}
        ]);
        let out = extract(
            data,
            &config(json!({"extract_list": {
                "filter": {"field_equals": {"field": "type", "value": "fruit"}},
                "fields": ["name"]
            }})),
        );
        assert_eq!(out, json!([{"name": "apple"}, {"name": "banana"}]));
    }

    #[test]
    fn field_predicates_pass_non_mappings() {
        let filter = RecordFilter {
            has_field: Some("x".into()),
            ..RecordFilter::default()
        };
        assert!(filter.matches(&json!(5)));
        assert!(!filter.matches(&json!({"y": 1})));
    }

    #[test]
    fn value_type_filter() {
        let out = extract(
            json!([1, 2.5, "x", true, {"a": 1}, [1]]),
            &config(json!({"extract_list": {"filter": {"value_type": "integer"}}})),
        );
        assert_eq!(out, json!([1]));
    }

    #[test]
    fn json_path_lookup_and_miss() {
        let data = json!({"store": {"bicycle": {"color": "red"}}});
        assert_eq!(
            extract(data.clone(), &config(json!({"json_path": "$.store.bicycle.color"}))),
            json!("red")
        );
        assert_eq!(
            extract(data.clone(), &config(json!({"json_path": "$.store.car"}))),
            Value::Null
        );
        assert_eq!(extract(data.clone(), &config(json!({"json_path": "store"}))), data);
    }

    #[test]
    fn regex_patterns_return_groups() {
        let out = extract(
            json!("Order: #12345 Price: $9.99"),
            &config(json!({"regex_patterns": {
                "order_id": r"#(\d+)",
                "price": r"\$(\d+\.\d{2})",
                "pair": r"(\w+): #(\d+)",
                "none": r"zzz",
                "bad": "("
            }})),
        );
        assert_eq!(
            out,
            json!({
                "order_id": ["12345"],
                "price": ["9.99"],
                "pair": [["Order", "12345"]],
                "none": null,
                "bad": null
            })
        );
    }

    #[test]
    fn empty_config_is_identity() {
        let data = json!({"a": [1, 2]});
        let cfg = CollectionConfig::default();
        assert!(cfg.is_empty());
        assert_eq!(extract(data.clone(), &cfg), data);
    }
}
