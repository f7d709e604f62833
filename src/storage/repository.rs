//! Repository layer for database operations.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::domain::{
    FlagDefinition, RiskAssessment, RiskTrigger, ScoreResult, UpdateFlagDefinition,
    UpdateRiskTrigger,
};
use crate::error::{ReputationError, ReputationResult};
use crate::storage::models::{FlagDefinitionRow, RiskAssessmentRow, RiskTriggerRow, ScoreRow};

/// Fixed-width RFC 3339 so that text order equals time order.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Repository for all Reputation database operations.
#[derive(Clone)]
pub struct ReputationRepository {
    pool: SqlitePool,
}

impl ReputationRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Round-trip a trivial query to check connectivity.
    pub async fn ping(&self) -> ReputationResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> ReputationResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flag_definitions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                flag_type TEXT NOT NULL,
                default_value TEXT NOT NULL,
                rules TEXT NOT NULL,
                weight REAL NOT NULL,
                category TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS risk_triggers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                score_threshold REAL,
                flag_name TEXT,
                custom_logic_params TEXT,
                risk_level TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_risk_triggers_active ON risk_triggers(is_active);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                probability_score REAL NOT NULL,
                raw_score REAL NOT NULL,
                algorithm_version TEXT NOT NULL,
                flags_used TEXT NOT NULL,
                metadata_used TEXT NOT NULL,
                summary TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_scores_entity ON scores(entity_id, created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS risk_assessments (
                id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                score_id TEXT NOT NULL,
                overall_risk_level TEXT NOT NULL,
                triggered_rules TEXT NOT NULL,
                summary_message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (score_id) REFERENCES scores(id)
            );

            CREATE INDEX IF NOT EXISTS idx_risk_assessments_entity ON risk_assessments(entity_id, created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Flag Definitions ====================

    /// Create a flag definition. Fails with `Conflict` if the name is taken.
    pub async fn create_flag_definition(
        &self,
        definition: &FlagDefinition,
    ) -> ReputationResult<FlagDefinition> {
        sqlx::query(
            r#"
            INSERT INTO flag_definitions (
                id, name, description, flag_type, default_value,
                rules, weight, category, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(definition.id.to_string())
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(definition.flag_type.to_string())
        .bind(serde_json::to_string(&definition.default_value)?)
        .bind(serde_json::to_string(&definition.rules)?)
        .bind(definition.weight)
        .bind(&definition.category)
        .bind(timestamp(&definition.created_at))
        .bind(timestamp(&definition.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            ReputationError::from_insert(e, format!("Flag definition '{}'", definition.name))
        })?;

        self.get_flag_definition(&definition.name).await
    }

    /// List all flag definitions in creation order.
    pub async fn list_flag_definitions(&self) -> ReputationResult<Vec<FlagDefinition>> {
        let rows: Vec<FlagDefinitionRow> =
            sqlx::query_as("SELECT * FROM flag_definitions ORDER BY created_at ASC, rowid ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Get a flag definition by name.
    pub async fn get_flag_definition(&self, name: &str) -> ReputationResult<FlagDefinition> {
        let row: FlagDefinitionRow =
            sqlx::query_as("SELECT * FROM flag_definitions WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| {
                    ReputationError::NotFound(format!("Flag definition '{}' not found", name))
                })?;

        row.try_into()
    }

    /// Apply a partial update to a flag definition.
    pub async fn update_flag_definition(
        &self,
        name: &str,
        update: UpdateFlagDefinition,
    ) -> ReputationResult<FlagDefinition> {
        let mut definition = self.get_flag_definition(name).await?;
        definition.apply_update(update);

        sqlx::query(
            r#"
            UPDATE flag_definitions
            SET description = ?, flag_type = ?, default_value = ?, rules = ?,
                weight = ?, category = ?, updated_at = ?
            WHERE name = ?
            "#,
        )
        .bind(&definition.description)
        .bind(definition.flag_type.to_string())
        .bind(serde_json::to_string(&definition.default_value)?)
        .bind(serde_json::to_string(&definition.rules)?)
        .bind(definition.weight)
        .bind(&definition.category)
        .bind(timestamp(&definition.updated_at))
        .bind(name)
        .execute(&self.pool)
        .await?;

        self.get_flag_definition(name).await
    }

    /// Delete a flag definition by name.
    pub async fn delete_flag_definition(&self, name: &str) -> ReputationResult<()> {
        let result = sqlx::query("DELETE FROM flag_definitions WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ReputationError::NotFound(format!(
                "Flag definition '{}' not found",
                name
            )));
        }

        Ok(())
    }

    // ==================== Risk Triggers ====================

    /// Create a risk trigger. Fails with `Conflict` if the name is taken.
    pub async fn create_risk_trigger(&self, trigger: &RiskTrigger) -> ReputationResult<RiskTrigger> {
        sqlx::query(
            r#"
            INSERT INTO risk_triggers (
                id, name, description, trigger_type, score_threshold, flag_name,
                custom_logic_params, risk_level, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trigger.id.to_string())
        .bind(&trigger.name)
        .bind(&trigger.description)
        .bind(trigger.trigger_type.to_string())
        .bind(trigger.score_threshold)
        .bind(&trigger.flag_name)
        .bind(
            trigger
                .custom_logic_params
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(trigger.risk_level.to_string())
        .bind(trigger.is_active)
        .bind(timestamp(&trigger.created_at))
        .bind(timestamp(&trigger.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| ReputationError::from_insert(e, format!("Risk trigger '{}'", trigger.name)))?;

        self.get_risk_trigger(&trigger.name).await
    }

    /// List risk triggers in creation order, active ones only unless asked otherwise.
    pub async fn list_risk_triggers(
        &self,
        include_inactive: bool,
    ) -> ReputationResult<Vec<RiskTrigger>> {
        let rows: Vec<RiskTriggerRow> = if include_inactive {
            sqlx::query_as("SELECT * FROM risk_triggers ORDER BY created_at ASC, rowid ASC")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as(
                "SELECT * FROM risk_triggers WHERE is_active = 1 ORDER BY created_at ASC, rowid ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Get a risk trigger by name.
    pub async fn get_risk_trigger(&self, name: &str) -> ReputationResult<RiskTrigger> {
        let row: RiskTriggerRow = sqlx::query_as("SELECT * FROM risk_triggers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ReputationError::NotFound(format!("Risk trigger '{}' not found", name)))?;

        row.try_into()
    }

    /// Apply a partial update to a risk trigger.
    pub async fn update_risk_trigger(
        &self,
        name: &str,
        update: UpdateRiskTrigger,
    ) -> ReputationResult<RiskTrigger> {
        let mut trigger = self.get_risk_trigger(name).await?;
        trigger.apply_update(update);

        sqlx::query(
            r#"
            UPDATE risk_triggers
            SET description = ?, trigger_type = ?, score_threshold = ?, flag_name = ?,
                custom_logic_params = ?, risk_level = ?, is_active = ?, updated_at = ?
            WHERE name = ?
            "#,
        )
        .bind(&trigger.description)
        .bind(trigger.trigger_type.to_string())
        .bind(trigger.score_threshold)
        .bind(&trigger.flag_name)
        .bind(
            trigger
                .custom_logic_params
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(trigger.risk_level.to_string())
        .bind(trigger.is_active)
        .bind(timestamp(&trigger.updated_at))
        .bind(name)
        .execute(&self.pool)
        .await?;

        self.get_risk_trigger(name).await
    }

    /// Delete a risk trigger by name.
    pub async fn delete_risk_trigger(&self, name: &str) -> ReputationResult<()> {
        let result = sqlx::query("DELETE FROM risk_triggers WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ReputationError::NotFound(format!(
                "Risk trigger '{}' not found",
                name
            )));
        }

        Ok(())
    }

    // ==================== Scores ====================

    /// Append a score and return the stored record.
    pub async fn save_score(&self, score: &ScoreResult) -> ReputationResult<ScoreResult> {
        sqlx::query(
            r#"
            INSERT INTO scores (
                id, entity_id, probability_score, raw_score, algorithm_version,
                flags_used, metadata_used, summary, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(score.id.to_string())
        .bind(&score.entity_id)
        .bind(score.probability_score)
        .bind(score.raw_score)
        .bind(&score.algorithm_version)
        .bind(serde_json::to_string(&score.flags_used)?)
        .bind(serde_json::to_string(&score.metadata_used)?)
        .bind(&score.summary)
        .bind(timestamp(&score.created_at))
        .execute(&self.pool)
        .await?;

        self.get_score(score.id).await
    }

    /// Get a score by ID.
    pub async fn get_score(&self, id: Uuid) -> ReputationResult<ScoreResult> {
        let row: ScoreRow = sqlx::query_as("SELECT * FROM scores WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ReputationError::NotFound(format!("Score {} not found", id)))?;

        row.try_into()
    }

    /// List scores for an entity, newest first.
    pub async fn list_scores_for_entity(
        &self,
        entity_id: &str,
        limit: i64,
        offset: i64,
    ) -> ReputationResult<Vec<ScoreResult>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            r#"
            SELECT * FROM scores
            WHERE entity_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(entity_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    // ==================== Risk Assessments ====================

    /// Append an assessment and return the stored record.
    pub async fn save_assessment(
        &self,
        assessment: &RiskAssessment,
    ) -> ReputationResult<RiskAssessment> {
        sqlx::query(
            r#"
            INSERT INTO risk_assessments (
                id, entity_id, score_id, overall_risk_level,
                triggered_rules, summary_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assessment.id.to_string())
        .bind(&assessment.entity_id)
        .bind(assessment.score_id.to_string())
        .bind(assessment.overall_risk_level.to_string())
        .bind(serde_json::to_string(&assessment.triggered_rules)?)
        .bind(&assessment.summary_message)
        .bind(timestamp(&assessment.created_at))
        .execute(&self.pool)
        .await?;

        self.get_assessment(assessment.id).await
    }

    /// Get an assessment by ID.
    pub async fn get_assessment(&self, id: Uuid) -> ReputationResult<RiskAssessment> {
        let row: RiskAssessmentRow = sqlx::query_as("SELECT * FROM risk_assessments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ReputationError::NotFound(format!("Risk assessment {} not found", id)))?;

        row.try_into()
    }

    /// Most recent assessment for an entity.
    pub async fn latest_assessment_for_entity(
        &self,
        entity_id: &str,
    ) -> ReputationResult<RiskAssessment> {
        let row: RiskAssessmentRow = sqlx::query_as(
            r#"
            SELECT * FROM risk_assessments
            WHERE entity_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ReputationError::NotFound(format!("No risk assessment found for entity '{}'", entity_id))
        })?;

        row.try_into()
    }

    /// List assessments for an entity, newest first.
    pub async fn list_assessments_for_entity(
        &self,
        entity_id: &str,
        limit: i64,
        offset: i64,
    ) -> ReputationResult<Vec<RiskAssessment>> {
        let rows: Vec<RiskAssessmentRow> = sqlx::query_as(
            r#"
            SELECT * FROM risk_assessments
            WHERE entity_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(entity_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}
