use std::sync::Arc;

use actix_web::body::to_bytes;
use actix_web::{web, HttpResponse};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use entity::{login_attempt, user};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, EntityTrait, Set};
use uuid::Uuid;

use facesecure::app_state::AppState;
use facesecure::config::ServeConfig;
use facesecure::crypto::generate_ecdsa_keypair;
use facesecure::handlers::auth;
use facesecure::models::{
    CaptureMetadata, RegisterPayload, VerifyFacePayload, VerifyFaceResponse,
};
use facesecure::recognizer::{EmbeddingProvider, EmbeddingResult, RecognizerError};
use facesecure_core::liveness::LivenessSignals;
use facesecure_core::template::{derive_template_key, encrypt_template};

/// Fixed-response embedding source standing in for the provider.
struct StubProvider {
    embedding: Vec<f64>,
    quality: f64,
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    async fn generate_embedding(&self, _: &str) -> Result<EmbeddingResult, RecognizerError> {
        Ok(EmbeddingResult {
            embedding: self.embedding.clone(),
            quality: self.quality,
        })
    }
}

/// Provider whose every call fails at the transport level.
struct DownProvider;

#[async_trait]
impl EmbeddingProvider for DownProvider {
    async fn generate_embedding(&self, _: &str) -> Result<EmbeddingResult, RecognizerError> {
        Err(RecognizerError::Unavailable("connection refused".to_string()))
    }
}

async fn build_state(provider: Arc<dyn EmbeddingProvider>) -> web::Data<AppState> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let (encoding_key, decoding_key, jwks_json) =
        generate_ecdsa_keypair("facesecure-key-1").unwrap();

    use clap::Parser;
    let config = ServeConfig::parse_from(["serve"]);

    web::Data::new(AppState {
        db,
        encoding_key,
        decoding_key,
        jwks_json,
        jwt_kid: "facesecure-key-1".to_string(),
        jwt_expiration: 3600,
        base_url: "http://localhost:8080".to_string(),
        policy: config.decision_policy(),
        template_key: derive_template_key("test-key"),
        recognizer: provider,
        webhook_client: reqwest::Client::new(),
    })
}

/// Enroll an account whose stored template is the unit vector [1, 0].
async fn seed_enrolled_account(state: &web::Data<AppState>) -> user::Model {
    let template = encrypt_template(&[1.0, 0.0], &state.template_key).unwrap();
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set("Enrolled".to_string()),
        email: Set(format!("{}@example.com", Uuid::new_v4())),
        password_hash: Set(None),
        face_template: Set(Some(template)),
        device_trust: Set(serde_json::json!({})),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

fn passing_signals() -> LivenessSignals {
    LivenessSignals {
        motion_detected: true,
        motion_score: 0.9,
        texture_valid: true,
        texture_score: 0.95,
        challenge_passed: true,
        challenge_type: "blink".to_string(),
        quality_score: 0.9,
    }
}

fn verify_payload(liveness: LivenessSignals, timestamp: String) -> web::Json<VerifyFacePayload> {
    web::Json(VerifyFacePayload {
        face_image: "aGVsbG8=".to_string(),
        liveness_data: liveness,
        metadata: CaptureMetadata {
            timestamp,
            device_id: "device-1".to_string(),
            session_id: None,
            video_hash: None,
        },
    })
}

fn fresh_payload(liveness: LivenessSignals) -> web::Json<VerifyFacePayload> {
    verify_payload(liveness, Utc::now().to_rfc3339())
}

async fn body_json(response: HttpResponse) -> serde_json::Value {
    let bytes = to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn audit_trail(state: &web::Data<AppState>) -> Vec<login_attempt::Model> {
    login_attempt::Entity::find().all(&state.db).await.unwrap()
}

#[tokio::test]
async fn high_similarity_match_is_accepted_with_a_token() {
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![1.0, 0.0],
        quality: 0.95,
    }))
    .await;
    let account = seed_enrolled_account(&state).await;

    let response = auth::verify_face(state.clone(), fresh_payload(passing_signals())).await;
    assert_eq!(response.status(), 200);

    let bytes = to_bytes(response.into_body()).await.unwrap();
    let body: VerifyFaceResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(body.success);
    assert!(!body.session_token.is_empty());
    assert_eq!(body.user.id, account.id);
    assert!(body.similarity >= 0.85);

    let attempts = audit_trail(&state).await;
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);
    assert_eq!(attempts[0].user_id.as_deref(), Some(account.id.as_str()));
}

#[tokio::test]
async fn challenge_band_similarity_requires_step_up_without_a_token() {
    // cos([0.8, 0.6], [1, 0]) = 0.8: inside [0.70, 0.85).
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![0.8, 0.6],
        quality: 0.95,
    }))
    .await;
    let account = seed_enrolled_account(&state).await;

    let response = auth::verify_face(state.clone(), fresh_payload(passing_signals())).await;
    assert_eq!(response.status(), 200);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "mfa_required");
    assert_eq!(body["requireMfa"], true);
    assert_eq!(body["userId"], account.id);
    assert!(body.get("sessionToken").is_none());

    let attempts = audit_trail(&state).await;
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
}

#[tokio::test]
async fn low_similarity_match_is_rejected_and_audited() {
    // cos([0.4, 0.92], [1, 0]) < 0.70.
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![0.4, 0.92],
        quality: 0.95,
    }))
    .await;
    seed_enrolled_account(&state).await;

    let response = auth::verify_face(state.clone(), fresh_payload(passing_signals())).await;
    assert_eq!(response.status(), 401);

    let body = body_json(response).await;
    assert_eq!(body["error"], "authentication_failed");

    let attempts = audit_trail(&state).await;
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert_eq!(
        attempts[0].failure_reason.as_deref(),
        Some("Face not recognized")
    );
}

#[tokio::test]
async fn stale_capture_is_rejected_before_any_scoring() {
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![1.0, 0.0],
        quality: 0.95,
    }))
    .await;
    seed_enrolled_account(&state).await;

    let stale = (Utc::now() - Duration::seconds(60)).to_rfc3339();
    let response =
        auth::verify_face(state.clone(), verify_payload(passing_signals(), stale)).await;
    assert_eq!(response.status(), 400);

    let body = body_json(response).await;
    assert_eq!(body["error"], "request_expired");
    assert!(audit_trail(&state).await.is_empty());
}

#[tokio::test]
async fn failing_quality_sub_check_reports_liveness_check_failed() {
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![1.0, 0.0],
        quality: 0.95,
    }))
    .await;
    seed_enrolled_account(&state).await;

    let mut signals = passing_signals();
    signals.quality_score = 0.1;

    let response = auth::verify_face(state.clone(), fresh_payload(signals)).await;
    assert_eq!(response.status(), 400);

    let body = body_json(response).await;
    assert_eq!(body["error"], "liveness_check_failed");
    assert_eq!(body["message"], "Image quality too low");

    let attempts = audit_trail(&state).await;
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
}

#[tokio::test]
async fn provider_reported_low_quality_is_poor_image_quality() {
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![1.0, 0.0],
        quality: 0.2,
    }))
    .await;
    seed_enrolled_account(&state).await;

    let response = auth::verify_face(state.clone(), fresh_payload(passing_signals())).await;
    assert_eq!(response.status(), 400);

    let body = body_json(response).await;
    assert_eq!(body["error"], "poor_image_quality");
}

#[tokio::test]
async fn provider_outage_surfaces_as_service_unavailable() {
    let state = build_state(Arc::new(DownProvider)).await;
    seed_enrolled_account(&state).await;

    let response = auth::verify_face(state.clone(), fresh_payload(passing_signals())).await;
    assert_eq!(response.status(), 503);

    let body = body_json(response).await;
    assert_eq!(body["error"], "service_unavailable");
}

#[tokio::test]
async fn empty_enrolled_population_is_not_found() {
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![1.0, 0.0],
        quality: 0.95,
    }))
    .await;

    let response = auth::verify_face(state.clone(), fresh_payload(passing_signals())).await;
    assert_eq!(response.status(), 404);

    let body = body_json(response).await;
    assert_eq!(body["error"], "no_users_enrolled");
}

#[tokio::test]
async fn registration_survives_a_provider_outage_without_a_template() {
    let state = build_state(Arc::new(DownProvider)).await;

    let response = auth::register(
        state.clone(),
        web::Json(RegisterPayload {
            name: "New User".to_string(),
            email: "new-user@example.com".to_string(),
            password: "correct horse battery".to_string(),
            face_image: Some("aGVsbG8=".to_string()),
        }),
    )
    .await;
    assert_eq!(response.status(), 201);

    let account = user::Entity::find()
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.email, "new-user@example.com");
    assert!(account.face_template.is_none());
}

#[tokio::test]
async fn body_missing_required_fields_yields_invalid_request_json() {
    let state = build_state(Arc::new(StubProvider {
        embedding: vec![1.0, 0.0],
        quality: 0.95,
    }))
    .await;

    let app = actix_web::test::init_service(
        actix_web::App::new()
            .app_data(state)
            .app_data(facesecure::server::json_config())
            .route(
                "/api/auth/verify-face",
                web::post().to(auth::verify_face),
            ),
    )
    .await;

    // No livenessData: the extractor itself rejects the body.
    let request = actix_web::test::TestRequest::post()
        .uri("/api/auth/verify-face")
        .set_json(serde_json::json!({
            "faceImage": "aGVsbG8=",
            "metadata": { "timestamp": Utc::now().to_rfc3339(), "deviceId": "device-1" }
        }))
        .to_request();

    let response = actix_web::test::call_service(&app, request).await;
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = actix_web::test::read_body_json(response).await;
    assert_eq!(body["error"], "invalid_request");
}
