use std::cmp::Ordering;

use tracing::warn;

use super::rules::Rule;
use crate::types::Value;

pub(crate) fn apply(rule: &Rule, items: Vec<Value>) -> Value {
    let result = match rule {
        Rule::Sort { reverse } => sort(items, *reverse),
        Rule::Limit(size) => items.into_iter().take(*size).collect(),
        Rule::Unique => unique(items),
        Rule::FilterValues(allowed) => items
            .into_iter()
            .filter(|item| allowed.contains(item))
            .collect(),
        _ => items,
    };
    Value::Array(result)
}

/// Sorts all-number or all-text sequences; anything mixed is left alone.
fn sort(mut items: Vec<Value>, reverse: bool) -> Vec<Value> {
    let comparator: fn(&Value, &Value) -> Ordering = if items.iter().all(Value::is_number) {
        |a, b| {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    } else if items.iter().all(Value::is_string) {
        |a, b| a.as_str().cmp(&b.as_str())
    } else {
        warn!("sort skipped, sequence mixes value types");
        return items;
    };

    if reverse {
        items.sort_by(|a, b| comparator(b, a));
    } else {
        items.sort_by(comparator);
    }
    items
}

/// First occurrence wins.
fn unique(items: Vec<Value>) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(value: Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items,
            other => panic!("not a sequence: {other}"),
        }
    }

    #[test]
    fn sort_limit_unique_pipeline() {
        let sorted = apply(&Rule::Sort { reverse: false }, items(json!([3, 1, 2, 3, 2])));
        let limited = apply(&Rule::Limit(3), items(sorted));
        let unique = apply(&Rule::Unique, items(limited));
        assert_eq!(unique, json!([1, 2]));
    }

    #[test]
    fn sort_reverse_text() {
        let out = apply(&Rule::Sort { reverse: true }, items(json!(["b", "c", "a"])));
        assert_eq!(out, json!(["c", "b", "a"]));
    }

    #[test]
    fn mixed_sequence_is_not_sorted() {
        let input = json!([2, "a", 1]);
        let out = apply(&Rule::Sort { reverse: false }, items(input.clone()));
        assert_eq!(out, input);
    }

    #[test]
    fn filter_values_keeps_allowed() {
        let out = apply(
            &Rule::FilterValues(vec![json!("x"), json!(2)]),
            items(json!(["x", "y", 2, 3])),
        );
        assert_eq!(out, json!(["x", 2]));
    }
}
