//! Risk Assessor - classifies a score against configured risk triggers.
//!
//! Every active trigger is checked independently and every hit is
//! recorded. The overall level is the highest level among the hits,
//! `LOW` when nothing fires.

use chrono::Utc;

use crate::domain::{Metadata, RiskLevel, RiskTrigger, ScoreResult, TriggerType, TriggeredRule};

/// Context key holding the entity's recent transaction volume in USD.
pub const RECENT_VOLUME_KEY: &str = "recent_transaction_volume_usd";

/// Outcome of a risk assessment, before it is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskOutcome {
    pub overall_risk_level: RiskLevel,
    /// Hits in trigger order.
    pub triggered_rules: Vec<TriggeredRule>,
    pub summary_message: String,
}

/// Stateless evaluator over a snapshot of risk triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskAssessor;

impl RiskAssessor {
    pub fn new() -> Self {
        Self
    }

    /// Assess a score for `entity_id` against the active triggers.
    pub fn assess(
        &self,
        entity_id: &str,
        triggers: &[RiskTrigger],
        score: &ScoreResult,
        context: &Metadata,
    ) -> RiskOutcome {
        let mut overall = RiskLevel::Low;
        let mut triggered_rules = Vec::new();

        for trigger in triggers.iter().filter(|t| t.is_active) {
            let Some(reason) = self.check_trigger(trigger, score, context) else {
                continue;
            };

            tracing::debug!(
                entity_id = %entity_id,
                trigger = %trigger.name,
                risk_level = %trigger.risk_level,
                "Risk trigger fired"
            );

            overall = overall.max(trigger.risk_level);
            triggered_rules.push(TriggeredRule {
                trigger_name: trigger.name.clone(),
                risk_level: trigger.risk_level,
                reason,
                activated_at: Utc::now(),
            });
        }

        let mut summary_message = format!("Risk assessment for {}: Overall {}.", entity_id, overall);
        if !triggered_rules.is_empty() {
            summary_message.push_str(&format!(" ({} rules triggered).", triggered_rules.len()));
        }

        RiskOutcome {
            overall_risk_level: overall,
            triggered_rules,
            summary_message,
        }
    }

    /// Check one trigger. Returns the reason when it fires.
    fn check_trigger(
        &self,
        trigger: &RiskTrigger,
        score: &ScoreResult,
        context: &Metadata,
    ) -> Option<String> {
        let p = score.probability_score;

        match trigger.trigger_type {
            TriggerType::ScoreThreshold => {
                let threshold = trigger.score_threshold?;
                (p < threshold).then(|| {
                    format!("Score ({:.4}) is below threshold ({:.4}).", p, threshold)
                })
            }
            TriggerType::FlagPresence => {
                let flag_name = trigger.flag_name.as_deref()?;
                let flag = score.active_flag(flag_name)?;
                Some(format!(
                    "Flag '{}' is active with value '{}'.",
                    flag_name, flag.value
                ))
            }
            TriggerType::CustomLogic => {
                let params = trigger
                    .custom_logic_params
                    .as_ref()
                    .filter(|params| !params.is_empty())?;
                let max_score = params.max_score();
                let min_volume = params.min_recent_volume();
                let volume = match context.get(RECENT_VOLUME_KEY) {
                    None => 0.0,
                    Some(value) if value.is_null() => 0.0,
                    // A non-numeric volume cannot satisfy the policy
                    Some(value) => value.as_f64()?,
                };

                (p <= max_score && volume >= min_volume).then(|| {
                    format!(
                        "Custom logic: Score ({:.4}) <= {} and recent volume ({}) >= {}.",
                        p, max_score, volume, min_volume
                    )
                })
            }
        }
    }
}
