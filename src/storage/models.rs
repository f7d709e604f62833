//! Database models for Reputation Core.
//!
//! These are the row types returned by SQLx queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{FlagDefinition, RiskAssessment, RiskTrigger, ScoreResult};
use crate::error::ReputationError;

fn parse_id(raw: &str) -> Result<Uuid, ReputationError> {
    Uuid::parse_str(raw).map_err(|e| ReputationError::Internal(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ReputationError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| ReputationError::Internal(e.to_string()))?
        .with_timezone(&Utc))
}

/// Database row for flag_definitions table.
#[derive(Debug, Clone, FromRow)]
pub struct FlagDefinitionRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub flag_type: String,
    pub default_value: String,
    pub rules: String,
    pub weight: f64,
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<FlagDefinitionRow> for FlagDefinition {
    type Error = ReputationError;

    fn try_from(row: FlagDefinitionRow) -> Result<Self, Self::Error> {
        Ok(FlagDefinition {
            id: parse_id(&row.id)?,
            name: row.name,
            description: row.description,
            flag_type: row.flag_type.parse().map_err(ReputationError::Internal)?,
            default_value: serde_json::from_str(&row.default_value)?,
            rules: serde_json::from_str(&row.rules)?,
            weight: row.weight,
            category: row.category,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Database row for risk_triggers table.
#[derive(Debug, Clone, FromRow)]
pub struct RiskTriggerRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger_type: String,
    pub score_threshold: Option<f64>,
    pub flag_name: Option<String>,
    pub custom_logic_params: Option<String>,
    pub risk_level: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<RiskTriggerRow> for RiskTrigger {
    type Error = ReputationError;

    fn try_from(row: RiskTriggerRow) -> Result<Self, Self::Error> {
        Ok(RiskTrigger {
            id: parse_id(&row.id)?,
            name: row.name,
            description: row.description,
            trigger_type: row.trigger_type.parse().map_err(ReputationError::Internal)?,
            score_threshold: row.score_threshold,
            flag_name: row.flag_name,
            custom_logic_params: row
                .custom_logic_params
                .map(|p| serde_json::from_str(&p))
                .transpose()?,
            risk_level: row.risk_level.parse().map_err(ReputationError::Internal)?,
            is_active: row.is_active,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Database row for scores table.
#[derive(Debug, Clone, FromRow)]
pub struct ScoreRow {
    pub id: String,
    pub entity_id: String,
    pub probability_score: f64,
    pub raw_score: f64,
    pub algorithm_version: String,
    pub flags_used: String,
    pub metadata_used: String,
    pub summary: String,
    pub created_at: String,
}

impl TryFrom<ScoreRow> for ScoreResult {
    type Error = ReputationError;

    fn try_from(row: ScoreRow) -> Result<Self, Self::Error> {
        Ok(ScoreResult {
            id: parse_id(&row.id)?,
            entity_id: row.entity_id,
            probability_score: row.probability_score,
            raw_score: row.raw_score,
            algorithm_version: row.algorithm_version,
            flags_used: serde_json::from_str(&row.flags_used)?,
            metadata_used: serde_json::from_str(&row.metadata_used)?,
            summary: row.summary,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Database row for risk_assessments table.
#[derive(Debug, Clone, FromRow)]
pub struct RiskAssessmentRow {
    pub id: String,
    pub entity_id: String,
    pub score_id: String,
    pub overall_risk_level: String,
    pub triggered_rules: String,
    pub summary_message: String,
    pub created_at: String,
}

impl TryFrom<RiskAssessmentRow> for RiskAssessment {
    type Error = ReputationError;

    fn try_from(row: RiskAssessmentRow) -> Result<Self, Self::Error> {
        Ok(RiskAssessment {
            id: parse_id(&row.id)?,
            entity_id: row.entity_id,
            score_id: parse_id(&row.score_id)?,
            overall_risk_level: row
                .overall_risk_level
                .parse()
                .map_err(ReputationError::Internal)?,
            triggered_rules: serde_json::from_str(&row.triggered_rules)?,
            summary_message: row.summary_message,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
