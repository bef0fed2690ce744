use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

use super::numeric::Num;
use super::{mapping, numeric, sequence, text};
pub(crate) use crate::types::format_timestamp;
use crate::types::{Map, Value};

/// Key written by `add_timestamp`.
pub const TIMESTAMP_KEY: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseRule {
    Upper,
    Lower,
    Title,
    Capitalize,
}

/// One typed transformation. Variants are declared in application order.
#[derive(Debug, Clone)]
pub enum Rule {
    Case(CaseRule),
    Strip,
    Replace { old: String, new: String },
    RegexReplace { pattern: Regex, replacement: String },
    Prefix(String),
    Suffix(String),

    Multiply(Num),
    Add(Num),
    Subtract(Num),
    Divide(Num),
    Round { decimal_places: i32 },
    Absolute,

    FilterKeys(Vec<String>),
    ExcludeKeys(Vec<String>),
    RenameKeys(Vec<(String, String)>),
    AddTimestamp,
    Flatten,

    Sort { reverse: bool },
    Limit(usize),
    Unique,
    FilterValues(Vec<Value>),

    ToJson,
    FromJson,
}

impl Rule {
    pub(crate) fn position(&self) -> u8 {
        match self {
            Rule::Case(_) => 0,
            Rule::Strip => 1,
            Rule::Replace { .. } => 2,
            Rule::RegexReplace { .. } => 3,
            Rule::Prefix(_) => 4,
            Rule::Suffix(_) => 5,
            Rule::Multiply(_) => 10,
            Rule::Add(_) => 11,
            Rule::Subtract(_) => 12,
            Rule::Divide(_) => 13,
            Rule::Round { .. } => 14,
            Rule::Absolute => 15,
            Rule::FilterKeys(_) => 20,
            Rule::ExcludeKeys(_) => 21,
            Rule::RenameKeys(_) => 22,
            Rule::AddTimestamp => 23,
            Rule::Flatten => 24,
            Rule::Sort { .. } => 30,
            Rule::Limit(_) => 31,
            Rule::Unique => 32,
            Rule::FilterValues(_) => 33,
            Rule::ToJson => 40,
            Rule::FromJson => 41,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rule::Case(_) => "case",
            Rule::Strip => "strip",
            Rule::Replace { .. } => "replace",
            Rule::RegexReplace { .. } => "regex_replace",
            Rule::Prefix(_) => "prefix",
            Rule::Suffix(_) => "suffix",
            Rule::Multiply(_) => "multiply",
            Rule::Add(_) => "add",
            Rule::Subtract(_) => "subtract",
            Rule::Divide(_) => "divide",
            Rule::Round { .. } => "round",
            Rule::Absolute => "absolute",
            Rule::FilterKeys(_) => "filter_keys",
            Rule::ExcludeKeys(_) => "exclude_keys",
            Rule::RenameKeys(_) => "rename_keys",
            Rule::AddTimestamp => "add_timestamp",
            Rule::Flatten => "flatten",
            Rule::Sort { .. } => "sort",
            Rule::Limit(_) => "limit",
            Rule::Unique => "unique",
            Rule::FilterValues(_) => "filter_values",
            Rule::ToJson => "to_json",
            Rule::FromJson => "from_json",
        }
    }

    pub fn applies_to(&self, value: &Value) -> bool {
        match self.position() {
            0..=9 => value.is_string(),
            10..=19 => value.is_number(),
            20..=29 => value.is_object(),
            30..=39 => value.is_array(),
            _ => match self {
                Rule::FromJson => value.is_string(),
                _ => true,
            },
        }
    }

    /// Apply to a value of the matching shape; a mismatched shape passes through.
    pub(crate) fn apply(&self, value: Value, now: DateTime<Utc>) -> Value {
        let shaped = match value {
            Value::String(s) => Value::String(self.apply_text(s)),
            Value::Number(n) => numeric::apply(self, n),
            Value::Object(map) => mapping::apply(self, map, now),
            Value::Array(items) => sequence::apply(self, items),
            other => other,
        };
        apply_general(self, shaped)
    }

    fn apply_text(&self, s: String) -> String {
        match self {
            Rule::Case(case) => text::change_case(&s, *case),
            Rule::Strip => s.trim().to_string(),
            Rule::Replace { old, new } => s.replace(old.as_str(), new),
            Rule::RegexReplace {
                pattern,
                replacement,
            } => pattern.replace_all(&s, replacement.as_str()).into_owned(),
            Rule::Prefix(prefix) => format!("{prefix}{s}"),
            Rule::Suffix(suffix) => format!("{s}{suffix}"),
            _ => s,
        }
    }
}

fn apply_general(rule: &Rule, value: Value) -> Value {
    match rule {
        Rule::ToJson => match serde_json::to_string(&value) {
            Ok(encoded) => Value::String(encoded),
            Err(err) => {
                warn!("to_json skipped: {err}");
                value
            }
        },
        Rule::FromJson => match value.as_str().map(serde_json::from_str::<Value>) {
            Some(Ok(parsed)) => parsed,
            Some(Err(err)) => {
                warn!("from_json skipped: {err}");
                value
            }
            None => value,
        },
        _ => value,
    }
}

/// Loose truthiness of a rule flag: empty, zero and null are false.
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// A flag that is absent counts as enabled; an explicit falsy flag disables the rule.
fn not_disabled(rules: &Map<String, Value>, flag: &str) -> bool {
    !rules.contains_key(flag) || truthy(rules.get(flag))
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    let keys: Vec<String> = items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect();
    (!keys.is_empty()).then_some(keys)
}

/// `flag: [..]` or `flag: true` with the list under `param`.
fn list_param(rules: &Map<String, Value>, flag: &str, param: &str) -> Option<Vec<String>> {
    match rules.get(flag) {
        Some(list @ Value::Array(_)) => string_list(Some(list)),
        flag_value if truthy(flag_value) => string_list(rules.get(param)),
        _ => None,
    }
}

fn number_param(rules: &Map<String, Value>, flag: &str, param: &str) -> Option<Num> {
    let num = match rules.get(param) {
        Some(Value::Number(n)) => Num::from_number(n)?,
        _ => return None,
    };
    not_disabled(rules, flag).then_some(num)
}

fn text_param(rules: &Map<String, Value>, key: &str) -> Option<String> {
    rules
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse(rules: &Map<String, Value>) -> Vec<Rule> {
    let mut parsed = Vec::new();

    let case = [
        ("uppercase", CaseRule::Upper),
        ("lowercase", CaseRule::Lower),
        ("title_case", CaseRule::Title),
        ("capitalize", CaseRule::Capitalize),
    ]
    .into_iter()
    .find(|(flag, _)| truthy(rules.get(*flag)));
    if let Some((_, case)) = case {
        parsed.push(Rule::Case(case));
    }
    if truthy(rules.get("strip")) {
        parsed.push(Rule::Strip);
    }
    if let Some(Value::Object(replace)) = rules.get("replace") {
        let old = replace.get("old").and_then(Value::as_str).unwrap_or("");
        let new = replace.get("new").and_then(Value::as_str).unwrap_or("");
        if !old.is_empty() {
            parsed.push(Rule::Replace {
                old: old.to_string(),
                new: new.to_string(),
            });
        }
    }
    if let Some(Value::Object(config)) = rules.get("regex_replace") {
        let pattern = config.get("pattern").and_then(Value::as_str).unwrap_or("");
        let replacement = config
            .get("replacement")
            .and_then(Value::as_str)
            .unwrap_or("");
        match Regex::new(pattern) {
            Ok(pattern) if !pattern.as_str().is_empty() => parsed.push(Rule::RegexReplace {
                pattern,
                replacement: replacement.to_string(),
            }),
            Ok(_) => {}
            Err(err) => warn!("regex_replace skipped, invalid pattern '{pattern}': {err}"),
        }
    }
    if let Some(prefix) = text_param(rules, "prefix") {
        parsed.push(Rule::Prefix(prefix));
    }
    if let Some(suffix) = text_param(rules, "suffix") {
        parsed.push(Rule::Suffix(suffix));
    }

    if let Some(factor) = number_param(rules, "multiply", "multiply_by") {
        parsed.push(Rule::Multiply(factor));
    }
    if let Some(addend) = number_param(rules, "add", "add_value") {
        parsed.push(Rule::Add(addend));
    }
    if let Some(subtrahend) = number_param(rules, "subtract", "subtract_value") {
        parsed.push(Rule::Subtract(subtrahend));
    }
    if let Some(divisor) = number_param(rules, "divide", "divide_by") {
        parsed.push(Rule::Divide(divisor));
    }
    // `round` is only a flag; the places always come from `decimal_places`.
    if truthy(rules.get("round")) {
        let places = rules
            .get("decimal_places")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        parsed.push(Rule::Round {
            decimal_places: places.clamp(-308, 308) as i32,
        });
    }
    if truthy(rules.get("absolute")) {
        parsed.push(Rule::Absolute);
    }

    if let Some(keys) = list_param(rules, "filter_keys", "allowed_keys") {
        parsed.push(Rule::FilterKeys(keys));
    }
    if let Some(keys) = list_param(rules, "exclude_keys", "excluded_keys") {
        parsed.push(Rule::ExcludeKeys(keys));
    }
    let key_mapping = match rules.get("rename_keys") {
        Some(Value::Object(mapping)) => Some(mapping),
        flag if truthy(flag) => rules.get("key_mapping").and_then(Value::as_object),
        _ => None,
    };
    if let Some(mapping) = key_mapping {
        let pairs: Vec<(String, String)> = mapping
            .iter()
            .filter_map(|(old, new)| new.as_str().map(|new| (old.clone(), new.to_string())))
            .collect();
        if !pairs.is_empty() {
            parsed.push(Rule::RenameKeys(pairs));
        }
    }
    if truthy(rules.get("add_timestamp")) {
        parsed.push(Rule::AddTimestamp);
    }
    if truthy(rules.get("flatten")) {
        parsed.push(Rule::Flatten);
    }

    if truthy(rules.get("sort")) {
        parsed.push(Rule::Sort {
            reverse: truthy(rules.get("sort_reverse")),
        });
    }
    let limit = match rules.get("limit") {
        Some(Value::Number(n)) if !rules.contains_key("limit_size") => n.as_u64(),
        flag if truthy(flag) => rules.get("limit_size").and_then(Value::as_u64),
        _ => None,
    };
    if let Some(limit) = limit {
        parsed.push(Rule::Limit(usize::try_from(limit).unwrap_or(usize::MAX)));
    }
    if truthy(rules.get("unique")) {
        parsed.push(Rule::Unique);
    }
    let allowed_values = match rules.get("filter_values") {
        Some(Value::Array(values)) => Some(values),
        flag if truthy(flag) => rules.get("allowed_values").and_then(Value::as_array),
        _ => None,
    };
    if let Some(values) = allowed_values.filter(|values| !values.is_empty()) {
        parsed.push(Rule::FilterValues(values.clone()));
    }

    if truthy(rules.get("to_json")) {
        parsed.push(Rule::ToJson);
    }
    if truthy(rules.get("from_json")) {
        parsed.push(Rule::FromJson);
    }

    parsed
}
