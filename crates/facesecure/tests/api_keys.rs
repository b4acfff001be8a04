use actix_web::body::to_bytes;
use actix_web::test::TestRequest;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use entity::api_key::{self, Environment, KeyStatus, WebhookRetryPolicy};
use entity::user;
use jsonwebtoken::{encode, Algorithm, Header};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use facesecure::app_state::AppState;
use facesecure::config::ServeConfig;
use facesecure::crypto::generate_ecdsa_keypair;
use facesecure::handlers::api_keys;
use facesecure::models::{
    ApiKeyCreatedResponse, CreateApiKeyPayload, SessionTokenClaims, UpdateApiKeyPayload,
};
use facesecure::recognizer::RecognitionClient;

async fn build_state() -> web::Data<AppState> {
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
        template_key: facesecure_core::template::derive_template_key("test-key"),
        recognizer: std::sync::Arc::new(RecognitionClient::new("http://localhost:8000").unwrap()),
        webhook_client: reqwest::Client::new(),
    })
}

async fn seed_account(state: &web::Data<AppState>) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set("Key Owner".to_string()),
        email: Set(format!("{}@example.com", Uuid::new_v4())),
        password_hash: Set(None),
        face_template: Set(None),
        device_trust: Set(serde_json::json!({})),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

fn session_token(state: &web::Data<AppState>, account: &user::Model) -> String {
    let now = Utc::now().timestamp();
    let claims = SessionTokenClaims {
        iss: "facesecure".to_string(),
        sub: account.id.clone(),
        email: account.email.clone(),
        device_id: String::new(),
        auth_method: "password".to_string(),
        exp: now + 3600,
        iat: now,
    };

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(state.jwt_kid.clone());
    encode(&header, &claims, &state.encoding_key).unwrap()
}

fn authed_request(token: &str) -> actix_web::HttpRequest {
    TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request()
}

async fn body_json(response: HttpResponse) -> serde_json::Value {
    let bytes = to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn created_key(response: HttpResponse) -> ApiKeyCreatedResponse {
    assert_eq!(response.status(), 201);
    let bytes = to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn rotation_carries_settings_forward_with_a_fresh_bearer_secret() {
    let state = build_state().await;
    let account = seed_account(&state).await;
    let token = session_token(&state, &account);

    // Issue a key.
    let created = created_key(
        api_keys::create_key(
            authed_request(&token),
            state.clone(),
            web::Json(CreateApiKeyPayload {
                name: Some("Primary".to_string()),
                environment: Some(Environment::Live),
            }),
        )
        .await,
    )
    .await;
    assert!(created.data.key.starts_with("ak_live_"));
    assert!(created.data.key_prefix.ends_with("..."));

    // Configure webhook settings on it.
    let response = api_keys::update_key(
        authed_request(&token),
        state.clone(),
        web::Path::from(created.data.id.clone()),
        web::Json(UpdateApiKeyPayload {
            webhook_url: Some("https://example.com/hooks/verify".to_string()),
            webhook_retry_policy: Some(WebhookRetryPolicy::Twice),
            ..Default::default()
        }),
    )
    .await;
    assert_eq!(response.status(), 200);

    let old = api_key::Entity::find_by_id(&created.data.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    let old_secret = old.webhook_secret.clone().unwrap();

    // Rotate.
    let rotated = created_key(
        api_keys::rotate_key(
            authed_request(&token),
            state.clone(),
            web::Path::from(created.data.id.clone()),
        )
        .await,
    )
    .await;

    assert_ne!(rotated.data.id, created.data.id);
    assert_ne!(rotated.data.key_id, created.data.key_id);
    assert_ne!(rotated.data.key, created.data.key);
    assert_eq!(rotated.data.name, "Primary");
    assert_eq!(rotated.data.environment, Environment::Live);

    // Old key is revoked; the replacement carries settings forward with a
    // fresh bearer secret but keeps the webhook signing secret.
    let old = api_key::Entity::find_by_id(&created.data.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.status, KeyStatus::Revoked);

    let new = api_key::Entity::find_by_id(&rotated.data.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(new.status, KeyStatus::Active);
    assert_eq!(
        new.webhook_url.as_deref(),
        Some("https://example.com/hooks/verify")
    );
    assert_eq!(new.webhook_retry_policy, WebhookRetryPolicy::Twice);
    assert_eq!(new.webhook_secret.unwrap(), old_secret);
    assert_ne!(new.key_hash, old.key_hash);
    assert_eq!(new.monthly_usage, 0);
    assert_eq!(new.success_count, 0);

    // A revoked key cannot be rotated again.
    let response = api_keys::rotate_key(
        authed_request(&token),
        state.clone(),
        web::Path::from(created.data.id.clone()),
    )
    .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn toggle_flips_active_and_suspended_but_never_revoked() {
    let state = build_state().await;
    let account = seed_account(&state).await;
    let token = session_token(&state, &account);

    let created = created_key(
        api_keys::create_key(
            authed_request(&token),
            state.clone(),
            web::Json(CreateApiKeyPayload {
                name: None,
                environment: None,
            }),
        )
        .await,
    )
    .await;
    assert_eq!(created.data.environment, Environment::Test);

    let response = api_keys::toggle_key(
        authed_request(&token),
        state.clone(),
        web::Path::from(created.data.id.clone()),
    )
    .await;
    assert_eq!(response.status(), 200);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "suspended");

    let response = api_keys::toggle_key(
        authed_request(&token),
        state.clone(),
        web::Path::from(created.data.id.clone()),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "active");

    // Revoke out-of-band, then verify toggle refuses.
    let key = api_key::Entity::find_by_id(&created.data.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    let mut revoke: api_key::ActiveModel = key.into();
    revoke.status = Set(KeyStatus::Revoked);
    revoke.update(&state.db).await.unwrap();

    let response = api_keys::toggle_key(
        authed_request(&token),
        state.clone(),
        web::Path::from(created.data.id.clone()),
    )
    .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn key_management_requires_a_valid_session_token() {
    let state = build_state().await;

    let response = api_keys::list_keys(TestRequest::default().to_http_request(), state.clone()).await;
    assert_eq!(response.status(), 401);

    let response = api_keys::list_keys(authed_request("not-a-jwt"), state.clone()).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn listing_never_exposes_hashes_or_webhook_secrets() {
    let state = build_state().await;
    let account = seed_account(&state).await;
    let token = session_token(&state, &account);

    created_key(
        api_keys::create_key(
            authed_request(&token),
            state.clone(),
            web::Json(CreateApiKeyPayload {
                name: Some("Visible".to_string()),
                environment: None,
            }),
        )
        .await,
    )
    .await;

    let response = api_keys::list_keys(authed_request(&token), state.clone()).await;
    assert_eq!(response.status(), 200);
    let body = body_json(response).await;

    let keys = body["data"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["name"], "Visible");
    assert!(keys[0].get("key_hash").is_none());
    assert!(keys[0].get("webhook_secret").is_none());
    assert!(keys[0]["key_prefix"].as_str().unwrap().ends_with("..."));

    // Ownership scoping: another account sees nothing.
    let other = seed_account(&state).await;
    let other_token = session_token(&state, &other);
    let response = api_keys::list_keys(authed_request(&other_token), state.clone()).await;
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn keys_are_scoped_to_their_owner() {
    let state = build_state().await;
    let owner = seed_account(&state).await;
    let other = seed_account(&state).await;
    let owner_token = session_token(&state, &owner);
    let other_token = session_token(&state, &other);

    let created = created_key(
        api_keys::create_key(
            authed_request(&owner_token),
            state.clone(),
            web::Json(CreateApiKeyPayload {
                name: None,
                environment: None,
            }),
        )
        .await,
    )
    .await;

    let response = api_keys::rotate_key(
        authed_request(&other_token),
        state.clone(),
        web::Path::from(created.data.id.clone()),
    )
    .await;
    assert_eq!(response.status(), 404);

    let response = api_keys::key_usage(
        authed_request(&other_token),
        state.clone(),
        web::Path::from(created.data.id),
    )
    .await;
    assert_eq!(response.status(), 404);
}
