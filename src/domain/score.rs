//! Score domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::value::{Metadata, Value};

/// A flag with its evaluated value, as supplied for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlagWithValue {
    pub name: String,
    #[schema(value_type = Object)]
    pub value: Value,
    #[serde(default)]
    pub weight: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl FlagWithValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, weight: f64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            weight,
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A stored reputation score P(x).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoreResult {
    pub id: Uuid,

    pub entity_id: String,

    /// Normalized score in [0, 1].
    pub probability_score: f64,

    /// Weighted sum before normalization.
    pub raw_score: f64,

    pub algorithm_version: String,

    /// Every flag supplied by the caller, active and inactive.
    pub flags_used: Vec<FlagWithValue>,

    #[schema(value_type = Object)]
    pub metadata_used: Metadata,

    pub summary: String,

    pub created_at: DateTime<Utc>,
}

impl ScoreResult {
    pub fn new(
        entity_id: impl Into<String>,
        raw_score: f64,
        probability_score: f64,
        algorithm_version: impl Into<String>,
        flags_used: Vec<FlagWithValue>,
        metadata_used: Metadata,
    ) -> Self {
        let entity_id = entity_id.into();
        let summary = format!(
            "Reputation score for {} is {:.4}.",
            entity_id, probability_score
        );

        Self {
            id: Uuid::new_v4(),
            entity_id,
            probability_score,
            raw_score,
            algorithm_version: algorithm_version.into(),
            flags_used,
            metadata_used,
            summary,
            created_at: Utc::now(),
        }
    }

    /// Find an active flag by name.
    pub fn active_flag(&self, name: &str) -> Option<&FlagWithValue> {
        self.flags_used
            .iter()
            .find(|f| f.name == name && f.is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_defaults() {
        let flag: FlagWithValue =
            serde_json::from_str(r#"{"name": "kyc", "value": true}"#).unwrap();
        assert!(flag.is_active);
        assert_eq!(flag.weight, 0.0);
    }

    #[test]
    fn test_summary_format() {
        let score = ScoreResult::new("wallet_1", 0.71, 0.8875, "1.0.0", vec![], Metadata::new());
        assert_eq!(score.summary, "Reputation score for wallet_1 is 0.8875.");
    }

    #[test]
    fn test_active_flag_ignores_inactive() {
        let score = ScoreResult::new(
            "wallet_1",
            0.0,
            0.5,
            "1.0.0",
            vec![FlagWithValue::new("sanctioned", true, 1.0).inactive()],
            Metadata::new(),
        );
        assert!(score.active_flag("sanctioned").is_none());
    }
}
