//! Rule Evaluator - tests a single rule against entity metadata.
//!
//! Missing data never satisfies a rule. Type mismatches (ordering on
//! non-numbers, `in` against a non-list) are non-matches, never errors.

use crate::domain::{Metadata, Rule, RuleCondition, Value};

/// Evaluate one rule against the metadata.
pub fn evaluate_rule(rule: &Rule, metadata: &Metadata) -> bool {
    let field_value = match metadata.get(&rule.field) {
        Some(value) if !value.is_null() => value,
        _ => return false,
    };

    match rule.condition {
        RuleCondition::Eq => field_value == &rule.value,
        RuleCondition::Ne => field_value != &rule.value,
        RuleCondition::Gt => compare_numbers(field_value, &rule.value, |l, r| l > r),
        RuleCondition::Gte => compare_numbers(field_value, &rule.value, |l, r| l >= r),
        RuleCondition::Lt => compare_numbers(field_value, &rule.value, |l, r| l < r),
        RuleCondition::Lte => compare_numbers(field_value, &rule.value, |l, r| l <= r),
        RuleCondition::Contains => contains(field_value, &rule.value).unwrap_or(false),
        RuleCondition::NotContains => contains(field_value, &rule.value)
            .map(|found| !found)
            .unwrap_or(false),
        RuleCondition::In => member_of(field_value, &rule.value).unwrap_or(false),
        RuleCondition::NotIn => member_of(field_value, &rule.value)
            .map(|found| !found)
            .unwrap_or(false),
        RuleCondition::Unknown => false,
    }
}

/// Numeric ordering; false unless both sides are numbers.
fn compare_numbers(left: &Value, right: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => cmp(l, r),
        _ => false,
    }
}

/// Containment of `needle` in `haystack`. `None` when the pair is not comparable.
fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match (haystack, needle) {
        (Value::String(s), Value::String(sub)) => Some(s.contains(sub.as_str())),
        (Value::List(items), _) => Some(items.contains(needle)),
        (Value::Map(entries), Value::String(key)) => Some(entries.contains_key(key)),
        _ => None,
    }
}

/// Membership of `value` in the rule's list. `None` when the rule value is not a list.
fn member_of(value: &Value, set: &Value) -> Option<bool> {
    set.as_list().map(|items| items.contains(value))
}
