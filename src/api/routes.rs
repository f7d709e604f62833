//! Route definitions for the API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::auth::{require_api_key, ApiKeyValidator};
use crate::AppState;

/// Security scheme modifier for OpenAPI.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_flag_definition,
        handlers::list_flag_definitions,
        handlers::get_flag_definition,
        handlers::update_flag_definition,
        handlers::delete_flag_definition,
        handlers::apply_flags,
        handlers::calculate_score,
        handlers::get_score,
        handlers::list_entity_scores,
        handlers::create_risk_trigger,
        handlers::list_risk_triggers,
        handlers::get_risk_trigger,
        handlers::update_risk_trigger,
        handlers::delete_risk_trigger,
        handlers::assess_risk,
        handlers::latest_assessment,
        handlers::list_entity_assessments,
        handlers::health_check,
        handlers::version,
    ),
    components(schemas(
        crate::api::types::ApplyFlagsRequest,
        crate::api::types::CalculateScoreRequest,
        crate::api::types::AssessRiskRequest,
        crate::api::types::HealthResponse,
        crate::api::types::VersionResponse,
        crate::domain::FlagType,
        crate::domain::RuleCondition,
        crate::domain::Rule,
        crate::domain::FlagDefinition,
        crate::domain::CreateFlagDefinition,
        crate::domain::UpdateFlagDefinition,
        crate::domain::FlagEvaluationResult,
        crate::domain::FlagApplyResult,
        crate::domain::FlagWithValue,
        crate::domain::ScoreResult,
        crate::domain::RiskLevel,
        crate::domain::TriggerType,
        crate::domain::CustomLogicParams,
        crate::domain::RiskTrigger,
        crate::domain::CreateRiskTrigger,
        crate::domain::UpdateRiskTrigger,
        crate::domain::TriggeredRule,
        crate::domain::RiskAssessment,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "flags", description = "Dynamic flag definitions and evaluation"),
        (name = "scores", description = "Reputation score calculation"),
        (name = "risk", description = "Risk triggers and assessments"),
        (name = "health", description = "Health and status endpoints")
    ),
    info(
        title = "Reputation Core API",
        version = "0.1.0",
        description = "Reputation scoring backend - evaluates dynamic flags, scores entities and classifies risk",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the API router with optional authentication.
pub fn build_router(
    state: AppState,
    auth_enabled: bool,
    api_key_validator: ApiKeyValidator,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut protected_routes = Router::new()
        // Flags
        .route(
            "/v1/flags/definitions",
            post(handlers::create_flag_definition).get(handlers::list_flag_definitions),
        )
        .route(
            "/v1/flags/definitions/:name",
            get(handlers::get_flag_definition)
                .put(handlers::update_flag_definition)
                .delete(handlers::delete_flag_definition),
        )
        .route("/v1/flags/apply", post(handlers::apply_flags))
        // Scores
        .route("/v1/scores", post(handlers::calculate_score))
        .route("/v1/scores/:score_id", get(handlers::get_score))
        .route(
            "/v1/entities/:entity_id/scores",
            get(handlers::list_entity_scores),
        )
        // Risk
        .route(
            "/v1/risk/triggers",
            post(handlers::create_risk_trigger).get(handlers::list_risk_triggers),
        )
        .route(
            "/v1/risk/triggers/:name",
            get(handlers::get_risk_trigger)
                .put(handlers::update_risk_trigger)
                .delete(handlers::delete_risk_trigger),
        )
        .route("/v1/risk/assess", post(handlers::assess_risk))
        .route(
            "/v1/entities/:entity_id/assessments",
            get(handlers::list_entity_assessments),
        )
        .route(
            "/v1/entities/:entity_id/assessments/latest",
            get(handlers::latest_assessment),
        );

    if auth_enabled {
        protected_routes = protected_routes.route_layer(middleware::from_fn_with_state(
            api_key_validator,
            require_api_key,
        ));
    }

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/version", get(handlers::version));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::ConfiguredApiKey;
    use crate::engine::{FlagEngine, ReputationCoordinator, RiskAssessor, WeightedAverageAggregator};
    use crate::storage::ReputationRepository;

    const TEST_KEY: &str = "sk-test-key-12345";

    async fn test_app(auth_enabled: bool) -> Router {
        crate::logging::init_test();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        let repository = ReputationRepository::new(pool);
        repository.init_schema().await.expect("Failed to init schema");

        let coordinator = ReputationCoordinator::new(
            repository,
            FlagEngine::new(),
            Box::new(WeightedAverageAggregator::default()),
            RiskAssessor::new(),
        );
        let state = AppState {
            coordinator: Arc::new(coordinator),
        };
        let validator = ApiKeyValidator::new(vec![ConfiguredApiKey {
            id: "test".to_string(),
            key: TEST_KEY.to_string(),
            name: "Test".to_string(),
            client_id: "router-tests".to_string(),
        }]);

        build_router(state, auth_enabled, validator)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-API-Key", TEST_KEY);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_version_are_public() {
        let app = test_app(true).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");

        let response = app
            .oneshot(Request::builder().uri("/v1/version").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["app_name"], "reputation-core");
        assert_eq!(body["algorithm_version"], "1.0.0");
    }

    #[tokio::test]
    async fn test_protected_routes_require_key() {
        let app = test_app(true).await;

        let missing = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/flags/definitions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(missing).await["code"], "MISSING_API_KEY");

        let wrong = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/flags/definitions")
                    .header("Authorization", "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let bearer = app
            .oneshot(
                Request::builder()
                    .uri("/v1/flags/definitions")
                    .header("Authorization", format!("Bearer {}", TEST_KEY))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bearer.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_disabled_allows_anonymous() {
        let app = test_app(false).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/risk/triggers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_flag_definition_crud() {
        let app = test_app(true).await;
        let definition = json!({
            "name": "high_risk_country",
            "type": "boolean",
            "default_value": false,
            "weight": 0.8,
            "rules": [{"field": "origin_country", "condition": "in", "value": ["SY", "IR", "KP"]}]
        });

        let created = send(&app, Method::POST, "/v1/flags/definitions", Some(definition.clone())).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(json_body(created).await["name"], "high_risk_country");

        let duplicate = send(&app, Method::POST, "/v1/flags/definitions", Some(definition)).await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let updated = send(
            &app,
            Method::PUT,
            "/v1/flags/definitions/high_risk_country",
            Some(json!({"weight": 0.9})),
        )
        .await;
        assert_eq!(updated.status(), StatusCode::OK);
        let body = json_body(updated).await;
        assert_eq!(body["weight"], 0.9);
        assert_eq!(body["rules"].as_array().map(Vec::len), Some(1));

        let deleted = send(&app, Method::DELETE, "/v1/flags/definitions/high_risk_country", None).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let missing = send(&app, Method::GET, "/v1/flags/definitions/high_risk_country", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(missing).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_apply_score_assess_flow() {
        let app = test_app(true).await;

        send(
            &app,
            Method::POST,
            "/v1/flags/definitions",
            Some(json!({
                "name": "kyc_verified",
                "type": "boolean",
                "default_value": false,
                "weight": 0.5,
                "rules": [{"field": "is_kyc_verified", "condition": "eq", "value": true}]
            })),
        )
        .await;
        send(
            &app,
            Method::POST,
            "/v1/risk/triggers",
            Some(json!({
                "name": "volume_spike",
                "trigger_type": "custom_logic",
                "custom_logic_params": {"max_score": 0.9, "min_recent_volume": 10000},
                "risk_level": "HIGH"
            })),
        )
        .await;

        let applied = send(
            &app,
            Method::POST,
            "/v1/flags/apply",
            Some(json!({"entity_id": "user_123", "metadata": {"is_kyc_verified": true}})),
        )
        .await;
        assert_eq!(applied.status(), StatusCode::OK);
        let applied = json_body(applied).await;
        assert_eq!(applied["active_flags_summary"]["kyc_verified"], true);

        let scored = send(
            &app,
            Method::POST,
            "/v1/scores",
            Some(json!({
                "entity_id": "user_123",
                "flags": [
                    {"name": "kyc_verified", "value": true, "weight": 0.5},
                    {"name": "fraud", "value": 0.7, "weight": 0.3}
                ],
                "metadata": {}
            })),
        )
        .await;
        assert_eq!(scored.status(), StatusCode::CREATED);
        let score = json_body(scored).await;
        assert_eq!(score["summary"], "Reputation score for user_123 is 0.8875.");
        let score_id = score["id"].as_str().unwrap().to_string();

        let fetched = send(&app, Method::GET, &format!("/v1/scores/{}", score_id), None).await;
        assert_eq!(fetched.status(), StatusCode::OK);

        let history = send(&app, Method::GET, "/v1/entities/user_123/scores", None).await;
        assert_eq!(json_body(history).await.as_array().map(Vec::len), Some(1));

        let assessed = send(
            &app,
            Method::POST,
            "/v1/risk/assess",
            Some(json!({
                "entity_id": "user_123",
                "score_id": score_id,
                "additional_context": {"recent_transaction_volume_usd": 25000.0}
            })),
        )
        .await;
        assert_eq!(assessed.status(), StatusCode::OK);
        let assessment = json_body(assessed).await;
        assert_eq!(assessment["overall_risk_level"], "HIGH");
        assert_eq!(assessment["triggered_rules"][0]["trigger_name"], "volume_spike");

        let latest = send(&app, Method::GET, "/v1/entities/user_123/assessments/latest", None).await;
        assert_eq!(json_body(latest).await["id"], assessment["id"]);

        let history = send(&app, Method::GET, "/v1/entities/user_123/assessments?limit=5", None).await;
        assert_eq!(json_body(history).await.as_array().map(Vec::len), Some(1));

        let mismatch = send(
            &app,
            Method::POST,
            "/v1/risk/assess",
            Some(json!({"entity_id": "user_999", "score_id": score_id})),
        )
        .await;
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(mismatch).await["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_null_bodies_treated_as_empty() {
        let app = test_app(true).await;

        let applied = send(
            &app,
            Method::POST,
            "/v1/flags/apply",
            Some(json!({"entity_id": "user_123", "metadata": null})),
        )
        .await;
        assert_eq!(applied.status(), StatusCode::OK);

        let scored = send(
            &app,
            Method::POST,
            "/v1/scores",
            Some(json!({"entity_id": "user_123", "flags": null, "metadata": null})),
        )
        .await;
        assert_eq!(scored.status(), StatusCode::CREATED);
        let score = json_body(scored).await;
        assert_eq!(score["probability_score"], 0.5);

        let assessed = send(
            &app,
            Method::POST,
            "/v1/risk/assess",
            Some(json!({
                "entity_id": "user_123",
                "score_id": score["id"],
                "additional_context": null
            })),
        )
        .await;
        assert_eq!(assessed.status(), StatusCode::OK);
        assert_eq!(json_body(assessed).await["overall_risk_level"], "LOW");
    }

    #[tokio::test]
    async fn test_huge_weights_still_store_bounded_score() {
        let app = test_app(true).await;

        let scored = send(
            &app,
            Method::POST,
            "/v1/scores",
            Some(json!({
                "entity_id": "whale",
                "flags": [
                    {"name": "a", "value": true, "weight": 1e308},
                    {"name": "b", "value": true, "weight": 1e308}
                ]
            })),
        )
        .await;
        assert_eq!(scored.status(), StatusCode::CREATED);
        assert_eq!(json_body(scored).await["probability_score"], 1.0);
    }

    #[tokio::test]
    async fn test_trigger_listing_hides_inactive_by_default() {
        let app = test_app(true).await;
        send(
            &app,
            Method::POST,
            "/v1/risk/triggers",
            Some(json!({
                "name": "retired",
                "trigger_type": "score_threshold",
                "score_threshold": 0.2,
                "risk_level": "LOW",
                "is_active": false
            })),
        )
        .await;

        let active = send(&app, Method::GET, "/v1/risk/triggers", None).await;
        assert_eq!(json_body(active).await.as_array().map(Vec::len), Some(0));

        let all = send(&app, Method::GET, "/v1/risk/triggers?include_inactive=true", None).await;
        assert_eq!(json_body(all).await.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_score_is_not_found() {
        let app = test_app(true).await;
        let response = send(&app, Method::GET, "/v1/scores/not-a-uuid", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
