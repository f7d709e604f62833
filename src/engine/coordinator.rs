//! Reputation Coordinator - connects the engine to storage.
//!
//! Each operation reads a fresh snapshot of definitions or triggers,
//! runs the pure engine components and records the outcome.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    CreateFlagDefinition, CreateRiskTrigger, FlagApplyResult, FlagDefinition, FlagWithValue,
    Metadata, RiskAssessment, RiskTrigger, ScoreResult, UpdateFlagDefinition, UpdateRiskTrigger,
};
use crate::engine::{FlagEngine, RiskAssessor, ScoreAggregator};
use crate::error::{ReputationError, ReputationResult};
use crate::storage::ReputationRepository;

/// Orchestrates flag application, scoring and risk assessment.
pub struct ReputationCoordinator {
    repository: ReputationRepository,
    flag_engine: FlagEngine,
    aggregator: Box<dyn ScoreAggregator>,
    risk_assessor: RiskAssessor,
}

impl ReputationCoordinator {
    /// Create a new coordinator with the given components.
    pub fn new(
        repository: ReputationRepository,
        flag_engine: FlagEngine,
        aggregator: Box<dyn ScoreAggregator>,
        risk_assessor: RiskAssessor,
    ) -> Self {
        Self {
            repository,
            flag_engine,
            aggregator,
            risk_assessor,
        }
    }

    pub fn repository(&self) -> &ReputationRepository {
        &self.repository
    }

    pub fn algorithm_version(&self) -> &str {
        self.aggregator.version()
    }

    /// Apply every stored flag definition to the entity's metadata.
    pub async fn apply_flags(
        &self,
        entity_id: &str,
        metadata: &Metadata,
    ) -> ReputationResult<FlagApplyResult> {
        let definitions = self.repository.list_flag_definitions().await?;
        let outcome = self.flag_engine.apply(&definitions, metadata);

        tracing::info!(
            entity_id = %entity_id,
            evaluated = outcome.results.len(),
            active = outcome.active_count(),
            "Flags applied"
        );

        Ok(FlagApplyResult {
            entity_id: entity_id.to_string(),
            evaluated_flags: outcome.results,
            active_flags_summary: outcome.summary,
        })
    }

    /// Score the entity from the supplied flags and store the result.
    ///
    /// Only active flags feed the aggregator; every flag is recorded.
    pub async fn calculate_score(
        &self,
        entity_id: &str,
        flags: Vec<FlagWithValue>,
        metadata: Metadata,
    ) -> ReputationResult<ScoreResult> {
        let active: Vec<FlagWithValue> = flags.iter().filter(|f| f.is_active).cloned().collect();
        let outcome = self.aggregator.calculate(&active, &metadata);

        let score = ScoreResult::new(
            entity_id,
            outcome.raw_score,
            outcome.probability_score,
            self.aggregator.version(),
            flags,
            metadata,
        );
        let stored = self.repository.save_score(&score).await?;

        tracing::info!(
            entity_id = %entity_id,
            score_id = %stored.id,
            probability_score = stored.probability_score,
            active_flags = active.len(),
            "Score calculated"
        );

        Ok(stored)
    }

    pub async fn get_score(&self, score_id: &str) -> ReputationResult<ScoreResult> {
        let id = parse_score_id(score_id)?;
        self.repository.get_score(id).await
    }

    pub async fn list_scores(
        &self,
        entity_id: &str,
        limit: i64,
        offset: i64,
    ) -> ReputationResult<Vec<ScoreResult>> {
        self.repository
            .list_scores_for_entity(entity_id, limit, offset)
            .await
    }

    /// Assess a stored score against the active risk triggers and record the result.
    pub async fn assess_risk(
        &self,
        entity_id: &str,
        score_id: &str,
        context: &Metadata,
    ) -> ReputationResult<RiskAssessment> {
        let id = parse_score_id(score_id)?;
        let score = self.repository.get_score(id).await?;

        if score.entity_id != entity_id {
            return Err(ReputationError::InvalidArgument(format!(
                "Score {} does not belong to entity '{}'",
                score.id, entity_id
            )));
        }

        let triggers = self.repository.list_risk_triggers(false).await?;
        let outcome = self
            .risk_assessor
            .assess(entity_id, &triggers, &score, context);

        let assessment = RiskAssessment {
            id: Uuid::new_v4(),
            entity_id: entity_id.to_string(),
            score_id: score.id,
            overall_risk_level: outcome.overall_risk_level,
            triggered_rules: outcome.triggered_rules,
            summary_message: outcome.summary_message,
            created_at: Utc::now(),
        };
        let stored = self.repository.save_assessment(&assessment).await?;

        tracing::info!(
            entity_id = %entity_id,
            score_id = %score.id,
            assessment_id = %stored.id,
            risk_level = %stored.overall_risk_level,
            triggered = stored.triggered_rules.len(),
            "Risk assessed"
        );

        Ok(stored)
    }

    pub async fn latest_assessment(&self, entity_id: &str) -> ReputationResult<RiskAssessment> {
        self.repository.latest_assessment_for_entity(entity_id).await
    }

    pub async fn list_assessments(
        &self,
        entity_id: &str,
        limit: i64,
        offset: i64,
    ) -> ReputationResult<Vec<RiskAssessment>> {
        self.repository
            .list_assessments_for_entity(entity_id, limit, offset)
            .await
    }

    // ==================== Flag Definitions ====================

    pub async fn create_flag_definition(
        &self,
        request: CreateFlagDefinition,
    ) -> ReputationResult<FlagDefinition> {
        require_name(&request.name, "Flag definition")?;
        let created = self
            .repository
            .create_flag_definition(&request.into_definition())
            .await?;

        tracing::info!(flag = %created.name, flag_type = %created.flag_type, "Flag definition created");
        Ok(created)
    }

    pub async fn list_flag_definitions(&self) -> ReputationResult<Vec<FlagDefinition>> {
        self.repository.list_flag_definitions().await
    }

    pub async fn get_flag_definition(&self, name: &str) -> ReputationResult<FlagDefinition> {
        self.repository.get_flag_definition(name).await
    }

    pub async fn update_flag_definition(
        &self,
        name: &str,
        update: UpdateFlagDefinition,
    ) -> ReputationResult<FlagDefinition> {
        let updated = self.repository.update_flag_definition(name, update).await?;
        tracing::info!(flag = %name, "Flag definition updated");
        Ok(updated)
    }

    pub async fn delete_flag_definition(&self, name: &str) -> ReputationResult<()> {
        self.repository.delete_flag_definition(name).await?;
        tracing::info!(flag = %name, "Flag definition deleted");
        Ok(())
    }

    // ==================== Risk Triggers ====================

    pub async fn create_risk_trigger(
        &self,
        request: CreateRiskTrigger,
    ) -> ReputationResult<RiskTrigger> {
        require_name(&request.name, "Risk trigger")?;
        let created = self
            .repository
            .create_risk_trigger(&request.into_trigger())
            .await?;

        tracing::info!(
            trigger = %created.name,
            trigger_type = %created.trigger_type,
            risk_level = %created.risk_level,
            "Risk trigger created"
        );
        Ok(created)
    }

    pub async fn list_risk_triggers(
        &self,
        include_inactive: bool,
    ) -> ReputationResult<Vec<RiskTrigger>> {
        self.repository.list_risk_triggers(include_inactive).await
    }

    pub async fn get_risk_trigger(&self, name: &str) -> ReputationResult<RiskTrigger> {
        self.repository.get_risk_trigger(name).await
    }

    pub async fn update_risk_trigger(
        &self,
        name: &str,
        update: UpdateRiskTrigger,
    ) -> ReputationResult<RiskTrigger> {
        let updated = self.repository.update_risk_trigger(name, update).await?;
        tracing::info!(trigger = %name, "Risk trigger updated");
        Ok(updated)
    }

    pub async fn delete_risk_trigger(&self, name: &str) -> ReputationResult<()> {
        self.repository.delete_risk_trigger(name).await?;
        tracing::info!(trigger = %name, "Risk trigger deleted");
        Ok(())
    }
}

/// Unparsable ids cannot name a stored score.
fn parse_score_id(raw: &str) -> ReputationResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ReputationError::NotFound(format!("Score {} not found", raw)))
}

fn require_name(name: &str, what: &str) -> ReputationResult<()> {
    if name.trim().is_empty() {
        return Err(ReputationError::BadRequest(format!(
            "{} name must not be empty",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlagType, RiskLevel, Rule, RuleCondition, Value};
    use crate::engine::WeightedAverageAggregator;
    use sqlx::sqlite::SqlitePoolOptions;
    use tokio_test::{assert_err, assert_ok};

    async fn make_coordinator() -> ReputationCoordinator {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        let repository = ReputationRepository::new(pool);
        repository.init_schema().await.expect("Failed to init schema");

        ReputationCoordinator::new(
            repository,
            FlagEngine::new(),
            Box::new(WeightedAverageAggregator::default()),
            RiskAssessor::new(),
        )
    }

    fn meta(value: serde_json::Value) -> Metadata {
        serde_json::from_value(value).unwrap()
    }

    fn create_flag(definition: FlagDefinition) -> CreateFlagDefinition {
        CreateFlagDefinition {
            name: definition.name,
            description: definition.description,
            flag_type: definition.flag_type,
            default_value: definition.default_value,
            rules: definition.rules,
            weight: definition.weight,
            category: definition.category,
        }
    }

    #[tokio::test]
    async fn test_apply_flags_uses_stored_definitions() {
        let coordinator = make_coordinator().await;
        coordinator
            .create_flag_definition(create_flag(
                FlagDefinition::new("is_adult", FlagType::Boolean, 0.5)
                    .with_default(false)
                    .with_rule(Rule::new("age", RuleCondition::Gte, 18_i64)),
            ))
            .await
            .unwrap();
        coordinator
            .create_flag_definition(create_flag(
                FlagDefinition::new("volume", FlagType::Numeric, 0.3)
                    .with_rule(Rule::new("volume", RuleCondition::Gt, 1000_i64)),
            ))
            .await
            .unwrap();

        let result = coordinator
            .apply_flags("user_123", &meta(serde_json::json!({"age": 20, "volume": 50})))
            .await
            .unwrap();

        assert_eq!(result.entity_id, "user_123");
        assert_eq!(result.evaluated_flags.len(), 2);
        assert_eq!(result.active_flags_summary.len(), 1);
        assert_eq!(
            result.active_flags_summary.get("is_adult"),
            Some(&Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_calculate_score_filters_inactive_and_records_all() {
        let coordinator = make_coordinator().await;
        let flags = vec![
            FlagWithValue::new("kyc", true, 0.5),
            FlagWithValue::new("fraud", 0.7, 0.3),
            FlagWithValue::new("sanctioned", true, 5.0).inactive(),
        ];

        let score = coordinator
            .calculate_score("user_123", flags, Metadata::new())
            .await
            .unwrap();

        assert!((score.raw_score - 0.71).abs() < 1e-9);
        assert!((score.probability_score - 0.8875).abs() < 1e-9);
        assert_eq!(score.flags_used.len(), 3);
        assert_eq!(score.algorithm_version, "1.0.0");
        assert_eq!(score.summary, "Reputation score for user_123 is 0.8875.");

        let fetched = coordinator.get_score(&score.id.to_string()).await.unwrap();
        assert_eq!(fetched.probability_score, score.probability_score);
        assert_eq!(fetched.flags_used, score.flags_used);
    }

    #[tokio::test]
    async fn test_calculate_score_neutral_when_nothing_active() {
        let coordinator = make_coordinator().await;
        let score = coordinator
            .calculate_score(
                "user_123",
                vec![FlagWithValue::new("kyc", true, 1.0).inactive()],
                Metadata::new(),
            )
            .await
            .unwrap();

        assert_eq!(score.probability_score, 0.5);
        assert_eq!(score.raw_score, 0.0);
    }

    #[tokio::test]
    async fn test_assess_risk_escalates_and_persists() {
        let coordinator = make_coordinator().await;
        coordinator
            .create_risk_trigger(CreateRiskTrigger {
                name: "medium_score".to_string(),
                description: String::new(),
                trigger_type: crate::domain::TriggerType::ScoreThreshold,
                score_threshold: Some(0.6),
                flag_name: None,
                custom_logic_params: None,
                risk_level: RiskLevel::Medium,
                is_active: true,
            })
            .await
            .unwrap();
        coordinator
            .create_risk_trigger(CreateRiskTrigger {
                name: "sanctioned".to_string(),
                description: String::new(),
                trigger_type: crate::domain::TriggerType::FlagPresence,
                score_threshold: None,
                flag_name: Some("is_sanctioned_entity".to_string()),
                custom_logic_params: None,
                risk_level: RiskLevel::Critical,
                is_active: true,
            })
            .await
            .unwrap();

        let score = coordinator
            .calculate_score(
                "user_123",
                vec![
                    FlagWithValue::new("is_sanctioned_entity", true, 0.4),
                    FlagWithValue::new("fraud", 0.0, 0.6),
                ],
                Metadata::new(),
            )
            .await
            .unwrap();

        let assessment = coordinator
            .assess_risk("user_123", &score.id.to_string(), &Metadata::new())
            .await
            .unwrap();

        assert_eq!(assessment.overall_risk_level, RiskLevel::Critical);
        assert_eq!(assessment.triggered_rules.len(), 2);
        assert_eq!(assessment.score_id, score.id);

        let latest = coordinator.latest_assessment("user_123").await.unwrap();
        assert_eq!(latest.id, assessment.id);
    }

    #[tokio::test]
    async fn test_assess_risk_without_triggers_is_low() {
        let coordinator = make_coordinator().await;
        let score = coordinator
            .calculate_score("user_123", vec![], Metadata::new())
            .await
            .unwrap();

        let assessment = coordinator
            .assess_risk("user_123", &score.id.to_string(), &Metadata::new())
            .await
            .unwrap();

        assert_eq!(assessment.overall_risk_level, RiskLevel::Low);
        assert!(assessment.triggered_rules.is_empty());
        assert_eq!(
            assessment.summary_message,
            "Risk assessment for user_123: Overall LOW."
        );
    }

    #[tokio::test]
    async fn test_assess_risk_rejects_other_entity() {
        let coordinator = make_coordinator().await;
        let score = coordinator
            .calculate_score("user_123", vec![], Metadata::new())
            .await
            .unwrap();

        let err = assert_err!(
            coordinator
                .assess_risk("user_999", &score.id.to_string(), &Metadata::new())
                .await
        );
        assert!(matches!(err, ReputationError::InvalidArgument(_)));

        // Nothing recorded for either entity
        assert_err!(coordinator.latest_assessment("user_999").await);
        assert_err!(coordinator.latest_assessment("user_123").await);
    }

    #[tokio::test]
    async fn test_assess_risk_unknown_score() {
        let coordinator = make_coordinator().await;

        let err = assert_err!(
            coordinator
                .assess_risk("user_123", &Uuid::new_v4().to_string(), &Metadata::new())
                .await
        );
        assert!(matches!(err, ReputationError::NotFound(_)));

        let err = assert_err!(
            coordinator
                .assess_risk("user_123", "not-a-uuid", &Metadata::new())
                .await
        );
        assert!(matches!(err, ReputationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let coordinator = make_coordinator().await;
        let err = assert_err!(
            coordinator
                .create_flag_definition(create_flag(FlagDefinition::new(
                    "  ",
                    FlagType::Boolean,
                    0.1
                )))
                .await
        );
        assert!(matches!(err, ReputationError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_inactive_trigger_ignored_in_assessment() {
        let coordinator = make_coordinator().await;
        coordinator
            .create_risk_trigger(CreateRiskTrigger {
                name: "disabled".to_string(),
                description: String::new(),
                trigger_type: crate::domain::TriggerType::ScoreThreshold,
                score_threshold: Some(0.9),
                flag_name: None,
                custom_logic_params: None,
                risk_level: RiskLevel::Critical,
                is_active: false,
            })
            .await
            .unwrap();

        let score = coordinator
            .calculate_score("user_123", vec![], Metadata::new())
            .await
            .unwrap();
        let assessment = assert_ok!(
            coordinator
                .assess_risk("user_123", &score.id.to_string(), &Metadata::new())
                .await
        );
        assert_eq!(assessment.overall_risk_level, RiskLevel::Low);
    }
}
