//! Flag Engine - applies dynamic flag definitions to entity metadata.
//!
//! Each definition's rules are tried in declared order and the first
//! match wins. The engine holds no state and never fails: a definition
//! whose rules cannot match simply evaluates to its default.

use crate::domain::{
    ActiveFlagSummary, FlagDefinition, FlagEvaluationResult, FlagType, Metadata, Value,
};
use crate::engine::evaluate_rule;

/// Output of a flag application pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagOutcome {
    /// One result per definition, in definition order.
    pub results: Vec<FlagEvaluationResult>,
    /// Active flags only, in evaluation order.
    pub summary: ActiveFlagSummary,
}

impl FlagOutcome {
    pub fn active_count(&self) -> usize {
        self.summary.len()
    }
}

/// Stateless evaluator over a snapshot of flag definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagEngine;

impl FlagEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every definition against the metadata.
    pub fn apply(&self, definitions: &[FlagDefinition], metadata: &Metadata) -> FlagOutcome {
        let mut outcome = FlagOutcome::default();

        for definition in definitions {
            let result = self.evaluate_flag(definition, metadata);

            tracing::debug!(
                flag = %result.flag_name,
                is_active = result.is_active,
                reason = %result.reason,
                "Flag evaluated"
            );

            if result.is_active {
                outcome.summary.insert(&result.flag_name, result.value.clone());
            }
            outcome.results.push(result);
        }

        outcome
    }

    /// Evaluate a single definition.
    pub fn evaluate_flag(
        &self,
        definition: &FlagDefinition,
        metadata: &Metadata,
    ) -> FlagEvaluationResult {
        if definition.rules.is_empty() {
            // Without rules the default stands in, when there is one
            return FlagEvaluationResult {
                flag_name: definition.name.clone(),
                value: definition.default_value.clone(),
                is_active: !definition.default_value.is_null(),
                weight: definition.weight,
                reason: "No rules defined for dynamic evaluation, using default value."
                    .to_string(),
            };
        }

        let matched = definition
            .rules
            .iter()
            .find(|rule| evaluate_rule(rule, metadata));

        match matched {
            Some(rule) => {
                let value = match definition.flag_type {
                    FlagType::Boolean => Value::Bool(true),
                    FlagType::Numeric | FlagType::Category => metadata
                        .get(&rule.field)
                        .cloned()
                        .unwrap_or_else(|| definition.default_value.clone()),
                };

                FlagEvaluationResult {
                    flag_name: definition.name.clone(),
                    value,
                    is_active: true,
                    weight: definition.weight,
                    reason: format!("Rule '{}' matched.", rule),
                }
            }
            None => FlagEvaluationResult {
                flag_name: definition.name.clone(),
                value: definition.default_value.clone(),
                is_active: false,
                weight: definition.weight,
                reason: "No rule matched.".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Rule, RuleCondition};

    fn meta(value: serde_json::Value) -> Metadata {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_boolean_flag_emits_true() {
        let flag = FlagDefinition::new("is_adult", FlagType::Boolean, 0.5)
            .with_default(false)
            .with_rule(Rule::new("age", RuleCondition::Gte, 18_i64));

        let engine = FlagEngine::new();
        let adult = engine.apply(std::slice::from_ref(&flag), &meta(serde_json::json!({"age": 20})));
        let minor = engine.apply(std::slice::from_ref(&flag), &meta(serde_json::json!({"age": 16})));

        assert_eq!(adult.results[0].value, Value::Bool(true));
        assert!(adult.results[0].is_active);
        assert_eq!(adult.summary.get("is_adult"), Some(&Value::Bool(true)));

        assert_eq!(minor.results[0].value, Value::Bool(false));
        assert!(!minor.results[0].is_active);
        assert_eq!(minor.results[0].reason, "No rule matched.");
        assert!(minor.summary.is_empty());
    }

    #[test]
    fn test_numeric_flag_emits_metadata_value() {
        let flag = FlagDefinition::new("transaction_volume", FlagType::Numeric, 0.3)
            .with_default(0.0)
            .with_rule(Rule::new("volume", RuleCondition::Gt, 1000_i64));

        let outcome = FlagEngine::new().apply(&[flag], &meta(serde_json::json!({"volume": 2500})));

        assert_eq!(outcome.results[0].value, Value::Number(2500.0));
        assert_eq!(outcome.results[0].reason, "Rule 'volume gt 1000' matched.");
    }

    #[test]
    fn test_first_match_wins() {
        let flag = FlagDefinition::new("tier", FlagType::Category, 1.0)
            .with_rule(Rule::new("country", RuleCondition::Eq, "BR"))
            .with_rule(Rule::new("segment", RuleCondition::Eq, "retail"))
            .with_rule(Rule::new("country", RuleCondition::Eq, "US"));

        let outcome = FlagEngine::new().apply(
            &[flag],
            &meta(serde_json::json!({"country": "US", "segment": "retail"})),
        );

        let result = &outcome.results[0];
        assert!(result.is_active);
        assert_eq!(result.value, Value::String("retail".into()));
        assert_eq!(result.reason, "Rule 'segment eq retail' matched.");
    }

    #[test]
    fn test_no_rules_uses_default() {
        let always_on = FlagDefinition::new("always_on", FlagType::Boolean, 0.1).with_default(true);
        let no_default = FlagDefinition::new("no_default", FlagType::Numeric, 0.1);

        let outcome = FlagEngine::new().apply(&[always_on, no_default], &Metadata::new());

        assert!(outcome.results[0].is_active);
        assert_eq!(outcome.results[0].value, Value::Bool(true));
        assert_eq!(
            outcome.results[0].reason,
            "No rules defined for dynamic evaluation, using default value."
        );
        assert!(!outcome.results[1].is_active);
        assert!(outcome.results[1].value.is_null());
        assert_eq!(outcome.active_count(), 1);
    }

    #[test]
    fn test_summary_in_evaluation_order() {
        let flags = vec![
            FlagDefinition::new("zeta", FlagType::Boolean, 1.0).with_default(true),
            FlagDefinition::new("middle", FlagType::Boolean, 1.0)
                .with_rule(Rule::new("x", RuleCondition::Eq, 1_i64)),
            FlagDefinition::new("alpha", FlagType::Numeric, 1.0).with_default(0.4),
        ];

        let outcome = FlagEngine::new().apply(&flags, &Metadata::new());
        let names: Vec<&str> = outcome.summary.names().collect();

        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(outcome.results.len(), 3);
    }

    #[test]
    fn test_weight_copied_from_definition() {
        let flag = FlagDefinition::new("kyc", FlagType::Boolean, 0.75)
            .with_rule(Rule::new("kyc", RuleCondition::Eq, true));

        let outcome = FlagEngine::new().apply(&[flag], &meta(serde_json::json!({"kyc": true})));
        assert_eq!(outcome.results[0].weight, 0.75);
    }

    #[test]
    fn test_apply_is_deterministic() {
        let flags = vec![
            FlagDefinition::new("high_risk_country", FlagType::Boolean, 0.8)
                .with_default(false)
                .with_rule(Rule::new("origin_country", RuleCondition::In, vec!["SY", "IR", "KP"])),
            FlagDefinition::new("amount", FlagType::Numeric, 0.7)
                .with_rule(Rule::new("amount", RuleCondition::Gt, 10000.0)),
        ];
        let metadata = meta(serde_json::json!({"origin_country": "IR", "amount": 25000.0}));

        let engine = FlagEngine::new();
        let first = engine.apply(&flags, &metadata);
        for _ in 0..5 {
            assert_eq!(engine.apply(&flags, &metadata), first);
        }
    }
}
