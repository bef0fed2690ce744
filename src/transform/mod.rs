//! Rule-driven structural transformation of values.
//!
//! A [`RuleSet`] is parsed once from the loose request mapping into typed
//! [`Rule`] variants and kept in catalogue order. Applying it folds the value
//! through every rule; a rule whose input shape does not match is a no-op, so
//! one rule set can be reused across heterogeneous inputs.
//!
//! Catalogue order:
//!
//! - text: case, strip, replace, regex_replace, prefix, suffix
//! - number: multiply, add, subtract, divide, round, absolute
//! - mapping: filter_keys, exclude_keys, rename_keys, add_timestamp, flatten
//! - sequence: sort, limit, unique, filter_values
//! - any shape: to_json, from_json

mod mapping;
mod numeric;
mod rules;
mod sequence;
mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::types::{Map, Value};

pub use numeric::{round_half_even, Num};
pub use rules::{CaseRule, Rule, TIMESTAMP_KEY};

/// An ordered, typed set of transformation rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(Rule::position);
        Self { rules }
    }

    /// Parse a request rule mapping. Unknown keys and malformed parameters are dropped.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self::new(rules::parse(map))
    }

    /// Anything but a mapping yields an empty rule set.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, data: Value) -> Value {
        self.apply_at(data, Utc::now())
    }

    /// Apply with a fixed clock for `add_timestamp`.
    pub fn apply_at(&self, data: Value, now: DateTime<Utc>) -> Value {
        self.rules.iter().fold(data, |value, rule| {
            if rule.applies_to(&value) {
                debug!(rule = rule.name(), "applying transform rule");
                rule.apply(value, now)
            } else {
                value
            }
        })
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(RuleSet::from_map(&map))
    }
}

/// Transform `data` with `rules`. Never fails.
pub fn transform(data: Value, rules: &RuleSet) -> Value {
    rules.apply(data)
}
