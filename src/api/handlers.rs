//! HTTP request handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::api::types::*;
use crate::domain::{
    CreateFlagDefinition, CreateRiskTrigger, FlagApplyResult, FlagDefinition, RiskAssessment,
    RiskTrigger, ScoreResult, UpdateFlagDefinition, UpdateRiskTrigger,
};
use crate::error::ReputationResult;
use crate::AppState;

// ==================== Flags ====================

/// Create a flag definition.
///
/// POST /v1/flags/definitions
#[utoipa::path(
    post,
    path = "/v1/flags/definitions",
    request_body = CreateFlagDefinition,
    responses(
        (status = 201, description = "Definition created", body = FlagDefinition),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Name already in use")
    ),
    security(("api_key" = [])),
    tag = "flags"
)]
pub async fn create_flag_definition(
    State(state): State<AppState>,
    Json(request): Json<CreateFlagDefinition>,
) -> ReputationResult<(StatusCode, Json<FlagDefinition>)> {
    let created = state.coordinator.create_flag_definition(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List flag definitions in creation order.
///
/// GET /v1/flags/definitions
#[utoipa::path(
    get,
    path = "/v1/flags/definitions",
    responses(
        (status = 200, description = "All definitions", body = [FlagDefinition])
    ),
    security(("api_key" = [])),
    tag = "flags"
)]
pub async fn list_flag_definitions(
    State(state): State<AppState>,
) -> ReputationResult<Json<Vec<FlagDefinition>>> {
    Ok(Json(state.coordinator.list_flag_definitions().await?))
}

/// GET /v1/flags/definitions/{name}
#[utoipa::path(
    get,
    path = "/v1/flags/definitions/{name}",
    params(("name" = String, Path, description = "Flag name")),
    responses(
        (status = 200, description = "Definition", body = FlagDefinition),
        (status = 404, description = "Definition not found")
    ),
    security(("api_key" = [])),
    tag = "flags"
)]
pub async fn get_flag_definition(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ReputationResult<Json<FlagDefinition>> {
    Ok(Json(state.coordinator.get_flag_definition(&name).await?))
}

/// PUT /v1/flags/definitions/{name}
#[utoipa::path(
    put,
    path = "/v1/flags/definitions/{name}",
    params(("name" = String, Path, description = "Flag name")),
    request_body = UpdateFlagDefinition,
    responses(
        (status = 200, description = "Updated definition", body = FlagDefinition),
        (status = 404, description = "Definition not found")
    ),
    security(("api_key" = [])),
    tag = "flags"
)]
pub async fn update_flag_definition(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<UpdateFlagDefinition>,
) -> ReputationResult<Json<FlagDefinition>> {
    Ok(Json(
        state.coordinator.update_flag_definition(&name, update).await?,
    ))
}

/// DELETE /v1/flags/definitions/{name}
#[utoipa::path(
    delete,
    path = "/v1/flags/definitions/{name}",
    params(("name" = String, Path, description = "Flag name")),
    responses(
        (status = 204, description = "Definition deleted"),
        (status = 404, description = "Definition not found")
    ),
    security(("api_key" = [])),
    tag = "flags"
)]
pub async fn delete_flag_definition(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ReputationResult<StatusCode> {
    state.coordinator.delete_flag_definition(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply every flag definition to an entity's metadata.
///
/// POST /v1/flags/apply
#[utoipa::path(
    post,
    path = "/v1/flags/apply",
    request_body = ApplyFlagsRequest,
    responses(
        (status = 200, description = "Evaluated flags", body = FlagApplyResult)
    ),
    security(("api_key" = [])),
    tag = "flags"
)]
pub async fn apply_flags(
    State(state): State<AppState>,
    Json(request): Json<ApplyFlagsRequest>,
) -> ReputationResult<Json<FlagApplyResult>> {
    Ok(Json(
        state
            .coordinator
            .apply_flags(&request.entity_id, &request.metadata)
            .await?,
    ))
}

// ==================== Scores ====================

/// Calculate and store a reputation score.
///
/// POST /v1/scores
#[utoipa::path(
    post,
    path = "/v1/scores",
    request_body = CalculateScoreRequest,
    responses(
        (status = 201, description = "Score stored", body = ScoreResult),
        (status = 400, description = "Invalid request")
    ),
    security(("api_key" = [])),
    tag = "scores"
)]
pub async fn calculate_score(
    State(state): State<AppState>,
    Json(request): Json<CalculateScoreRequest>,
) -> ReputationResult<(StatusCode, Json<ScoreResult>)> {
    let score = state
        .coordinator
        .calculate_score(&request.entity_id, request.flags, request.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(score)))
}

/// GET /v1/scores/{score_id}
#[utoipa::path(
    get,
    path = "/v1/scores/{score_id}",
    params(("score_id" = String, Path, description = "Score ID")),
    responses(
        (status = 200, description = "Stored score", body = ScoreResult),
        (status = 404, description = "Score not found")
    ),
    security(("api_key" = [])),
    tag = "scores"
)]
pub async fn get_score(
    State(state): State<AppState>,
    Path(score_id): Path<String>,
) -> ReputationResult<Json<ScoreResult>> {
    Ok(Json(state.coordinator.get_score(&score_id).await?))
}

/// Score history for an entity, newest first.
///
/// GET /v1/entities/{entity_id}/scores
#[utoipa::path(
    get,
    path = "/v1/entities/{entity_id}/scores",
    params(("entity_id" = String, Path, description = "Entity ID"), PageQuery),
    responses(
        (status = 200, description = "Stored scores", body = [ScoreResult])
    ),
    security(("api_key" = [])),
    tag = "scores"
)]
pub async fn list_entity_scores(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ReputationResult<Json<Vec<ScoreResult>>> {
    let (limit, offset) = query.bounds();
    Ok(Json(
        state
            .coordinator
            .list_scores(&entity_id, limit, offset)
            .await?,
    ))
}

// ==================== Risk ====================

/// POST /v1/risk/triggers
#[utoipa::path(
    post,
    path = "/v1/risk/triggers",
    request_body = CreateRiskTrigger,
    responses(
        (status = 201, description = "Trigger created", body = RiskTrigger),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Name already in use")
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn create_risk_trigger(
    State(state): State<AppState>,
    Json(request): Json<CreateRiskTrigger>,
) -> ReputationResult<(StatusCode, Json<RiskTrigger>)> {
    let created = state.coordinator.create_risk_trigger(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List risk triggers. Only active ones unless `include_inactive=true`.
///
/// GET /v1/risk/triggers
#[utoipa::path(
    get,
    path = "/v1/risk/triggers",
    params(ListTriggersQuery),
    responses(
        (status = 200, description = "Risk triggers", body = [RiskTrigger])
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn list_risk_triggers(
    State(state): State<AppState>,
    Query(query): Query<ListTriggersQuery>,
) -> ReputationResult<Json<Vec<RiskTrigger>>> {
    Ok(Json(
        state
            .coordinator
            .list_risk_triggers(query.include_inactive)
            .await?,
    ))
}

/// GET /v1/risk/triggers/{name}
#[utoipa::path(
    get,
    path = "/v1/risk/triggers/{name}",
    params(("name" = String, Path, description = "Trigger name")),
    responses(
        (status = 200, description = "Risk trigger", body = RiskTrigger),
        (status = 404, description = "Trigger not found")
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn get_risk_trigger(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ReputationResult<Json<RiskTrigger>> {
    Ok(Json(state.coordinator.get_risk_trigger(&name).await?))
}

/// PUT /v1/risk/triggers/{name}
#[utoipa::path(
    put,
    path = "/v1/risk/triggers/{name}",
    params(("name" = String, Path, description = "Trigger name")),
    request_body = UpdateRiskTrigger,
    responses(
        (status = 200, description = "Updated trigger", body = RiskTrigger),
        (status = 404, description = "Trigger not found")
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn update_risk_trigger(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<UpdateRiskTrigger>,
) -> ReputationResult<Json<RiskTrigger>> {
    Ok(Json(
        state.coordinator.update_risk_trigger(&name, update).await?,
    ))
}

/// DELETE /v1/risk/triggers/{name}
#[utoipa::path(
    delete,
    path = "/v1/risk/triggers/{name}",
    params(("name" = String, Path, description = "Trigger name")),
    responses(
        (status = 204, description = "Trigger deleted"),
        (status = 404, description = "Trigger not found")
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn delete_risk_trigger(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ReputationResult<StatusCode> {
    state.coordinator.delete_risk_trigger(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Assess a stored score against the active risk triggers.
///
/// POST /v1/risk/assess
#[utoipa::path(
    post,
    path = "/v1/risk/assess",
    request_body = AssessRiskRequest,
    responses(
        (status = 200, description = "Assessment recorded", body = RiskAssessment),
        (status = 400, description = "Score belongs to another entity"),
        (status = 404, description = "Score not found")
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn assess_risk(
    State(state): State<AppState>,
    Json(request): Json<AssessRiskRequest>,
) -> ReputationResult<Json<RiskAssessment>> {
    Ok(Json(
        state
            .coordinator
            .assess_risk(
                &request.entity_id,
                &request.score_id,
                &request.additional_context,
            )
            .await?,
    ))
}

/// GET /v1/entities/{entity_id}/assessments/latest
#[utoipa::path(
    get,
    path = "/v1/entities/{entity_id}/assessments/latest",
    params(("entity_id" = String, Path, description = "Entity ID")),
    responses(
        (status = 200, description = "Most recent assessment", body = RiskAssessment),
        (status = 404, description = "No assessment recorded")
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn latest_assessment(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> ReputationResult<Json<RiskAssessment>> {
    Ok(Json(state.coordinator.latest_assessment(&entity_id).await?))
}

/// Assessment history for an entity, newest first.
///
/// GET /v1/entities/{entity_id}/assessments
#[utoipa::path(
    get,
    path = "/v1/entities/{entity_id}/assessments",
    params(("entity_id" = String, Path, description = "Entity ID"), PageQuery),
    responses(
        (status = 200, description = "Recorded assessments", body = [RiskAssessment])
    ),
    security(("api_key" = [])),
    tag = "risk"
)]
pub async fn list_entity_assessments(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ReputationResult<Json<Vec<RiskAssessment>>> {
    let (limit, offset) = query.bounds();
    Ok(Json(
        state
            .coordinator
            .list_assessments(&entity_id, limit, offset)
            .await?,
    ))
}

// ==================== Health ====================

/// Health check endpoint.
///
/// GET /v1/health
#[utoipa::path(
    get,
    path = "/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match state.coordinator.repository().ping().await {
        Ok(()) => ("healthy", "connected".to_string()),
        Err(e) => ("degraded", format!("error: {}", e)),
    };

    Json(HealthResponse {
        status: status.to_string(),
        database,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /v1/version
#[utoipa::path(
    get,
    path = "/v1/version",
    responses(
        (status = 200, description = "Application version", body = VersionResponse)
    ),
    tag = "health"
)]
pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        app_name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        algorithm_version: state.coordinator.algorithm_version().to_string(),
    })
}
