//! Risk trigger and assessment domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::value::{nullable, Metadata};

/// Risk level classification. Ordered: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

/// Condition family a trigger evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Score strictly below `score_threshold`.
    ScoreThreshold,
    /// Named flag present and active in the score.
    FlagPresence,
    /// Fixed score/volume policy driven by `custom_logic_params`.
    CustomLogic,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::ScoreThreshold => write!(f, "score_threshold"),
            TriggerType::FlagPresence => write!(f, "flag_presence"),
            TriggerType::CustomLogic => write!(f, "custom_logic"),
        }
    }
}

impl std::str::FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "score_threshold" => Ok(TriggerType::ScoreThreshold),
            "flag_presence" => Ok(TriggerType::FlagPresence),
            "custom_logic" => Ok(TriggerType::CustomLogic),
            _ => Err(format!("Unknown trigger type: {}", s)),
        }
    }
}

/// Parameters of the custom-logic policy. Keys other than the two known
/// thresholds are kept as-is but play no part in the check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomLogicParams {
    /// Score must be at or below this (default 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    /// Recent volume must be at or above this (default 0.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_recent_volume: Option<f64>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Metadata,
}

impl CustomLogicParams {
    pub fn new(max_score: f64, min_recent_volume: f64) -> Self {
        Self {
            max_score: Some(max_score),
            min_recent_volume: Some(min_recent_volume),
            extra: Metadata::new(),
        }
    }

    /// An object with no keys at all. Such params never fire.
    pub fn is_empty(&self) -> bool {
        self.max_score.is_none() && self.min_recent_volume.is_none() && self.extra.is_empty()
    }

    pub fn max_score(&self) -> f64 {
        self.max_score.unwrap_or(1.0)
    }

    pub fn min_recent_volume(&self) -> f64 {
        self.min_recent_volume.unwrap_or(0.0)
    }
}

/// A configured risk trigger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RiskTrigger {
    pub id: Uuid,

    /// Unique name of the trigger.
    pub name: String,

    pub description: String,

    pub trigger_type: TriggerType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_logic_params: Option<CustomLogicParams>,

    pub risk_level: RiskLevel,

    /// Only active triggers take part in assessments.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RiskTrigger {
    fn new(name: impl Into<String>, trigger_type: TriggerType, risk_level: RiskLevel) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            trigger_type,
            score_threshold: None,
            flag_name: None,
            custom_logic_params: None,
            risk_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn score_threshold(name: impl Into<String>, threshold: f64, level: RiskLevel) -> Self {
        let mut trigger = Self::new(name, TriggerType::ScoreThreshold, level);
        trigger.score_threshold = Some(threshold);
        trigger
    }

    pub fn flag_presence(
        name: impl Into<String>,
        flag_name: impl Into<String>,
        level: RiskLevel,
    ) -> Self {
        let mut trigger = Self::new(name, TriggerType::FlagPresence, level);
        trigger.flag_name = Some(flag_name.into());
        trigger
    }

    pub fn custom_logic(
        name: impl Into<String>,
        params: CustomLogicParams,
        level: RiskLevel,
    ) -> Self {
        let mut trigger = Self::new(name, TriggerType::CustomLogic, level);
        trigger.custom_logic_params = Some(params);
        trigger
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Apply a partial update. The name never changes.
    pub fn apply_update(&mut self, update: UpdateRiskTrigger) {
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(trigger_type) = update.trigger_type {
            self.trigger_type = trigger_type;
        }
        if let Some(threshold) = update.score_threshold {
            self.score_threshold = threshold;
        }
        if let Some(flag_name) = update.flag_name {
            self.flag_name = flag_name;
        }
        if let Some(params) = update.custom_logic_params {
            self.custom_logic_params = params;
        }
        if let Some(level) = update.risk_level {
            self.risk_level = level;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

/// Request body for creating a risk trigger.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRiskTrigger {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub score_threshold: Option<f64>,
    #[serde(default)]
    pub flag_name: Option<String>,
    #[serde(default)]
    pub custom_logic_params: Option<CustomLogicParams>,
    pub risk_level: RiskLevel,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateRiskTrigger {
    pub fn into_trigger(self) -> RiskTrigger {
        let mut trigger = RiskTrigger::new(self.name, self.trigger_type, self.risk_level);
        trigger.description = self.description;
        trigger.score_threshold = self.score_threshold;
        trigger.flag_name = self.flag_name;
        trigger.custom_logic_params = self.custom_logic_params;
        trigger.is_active = self.is_active;
        trigger
    }
}

/// Partial update for a risk trigger. Absent fields are left untouched;
/// an explicit `null` clears a type parameter.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateRiskTrigger {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<f64>)]
    pub score_threshold: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub flag_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<CustomLogicParams>)]
    pub custom_logic_params: Option<Option<CustomLogicParams>>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A trigger that fired during an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TriggeredRule {
    pub trigger_name: String,
    pub risk_level: RiskLevel,
    /// Human-readable explanation; not meant to be parsed.
    pub reason: String,
    pub activated_at: DateTime<Utc>,
}

/// Immutable record of one risk assessment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub entity_id: String,
    pub score_id: Uuid,
    pub overall_risk_level: RiskLevel,
    pub triggered_rules: Vec<TriggeredRule>,
    pub summary_message: String,
    pub created_at: DateTime<Utc>,
}
