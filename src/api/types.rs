//! API request and response types.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{null_as_default, FlagWithValue, Metadata};

// ==================== Flags ====================

/// Request to apply every flag definition to an entity.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyFlagsRequest {
    pub entity_id: String,
    /// Entity attributes the rules read from.
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

// ==================== Scores ====================

/// Request to calculate and store a reputation score.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculateScoreRequest {
    pub entity_id: String,
    /// Evaluated flags; inactive ones are recorded but do not count.
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: Vec<FlagWithValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

/// Pagination for history listings.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Offset for pagination.
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl PageQuery {
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}

// ==================== Risk ====================

/// Query parameters for listing risk triggers.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTriggersQuery {
    /// Include deactivated triggers.
    #[serde(default)]
    pub include_inactive: bool,
}

/// Request to assess a stored score.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssessRiskRequest {
    pub entity_id: String,
    pub score_id: String,
    /// Extra signals such as `recent_transaction_volume_usd`.
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(value_type = Object)]
    pub additional_context: Metadata,
}

// ==================== Health ====================

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Database connectivity.
    pub database: String,
    /// Timestamp.
    pub timestamp: String,
}

/// Version response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VersionResponse {
    pub app_name: String,
    pub version: String,
    /// Version tag stamped on new scores.
    pub algorithm_version: String,
}
