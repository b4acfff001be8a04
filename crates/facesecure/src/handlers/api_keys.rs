use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use entity::api_key::{self, DataRetention, Environment, KeyStatus, Plan, WebhookRetryPolicy};
use log::{error, info};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::authenticate_user;
use crate::models::{
    ApiKeyCreatedData, ApiKeyCreatedResponse, CreateApiKeyPayload, ErrorResponse,
    UpdateApiKeyPayload,
};
use facesecure_core::api_key::{generate_api_key, generate_webhook_secret, key_prefix};

const DEFAULT_RATE_LIMIT: i32 = 100;

fn server_error() -> HttpResponse {
    HttpResponse::InternalServerError()
        .json(ErrorResponse::new("server_error", "Internal server error"))
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new("not_found", "API key not found"))
}

fn core_environment(environment: Environment) -> facesecure_core::api_key::Environment {
    match environment {
        Environment::Test => facesecure_core::api_key::Environment::Test,
        Environment::Live => facesecure_core::api_key::Environment::Live,
    }
}

async fn find_owned_key(
    state: &AppState,
    key_row_id: &str,
    customer_id: &str,
) -> Result<Option<api_key::Model>, HttpResponse> {
    api_key::Entity::find_by_id(key_row_id)
        .filter(api_key::Column::CustomerId.eq(customer_id))
        .one(&state.db)
        .await
        .map_err(|e| {
            error!("Database error loading API key: {}", e);
            server_error()
        })
}

/// Insert a fresh key row for an account, carrying the given settings. The
/// raw bearer value is returned to the caller exactly once and only its hash
/// is stored.
async fn issue_key(
    state: &AppState,
    customer_id: &str,
    name: String,
    environment: Environment,
    plan: Plan,
    rate_limit: i32,
    webhook_url: Option<String>,
    webhook_secret: Option<String>,
    webhook_retry_policy: WebhookRetryPolicy,
    data_retention: DataRetention,
    disable_video_storage: bool,
    require_extra_verification: bool,
) -> Result<(api_key::Model, String), HttpResponse> {
    let generated = generate_api_key(core_environment(environment));
    let now = Utc::now();

    let row = api_key::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        key_id: Set(generated.key_id),
        key_hash: Set(generated.key_hash),
        key_prefix: Set(key_prefix(&generated.raw_key)),
        name: Set(name),
        customer_id: Set(customer_id.to_string()),
        environment: Set(environment),
        status: Set(KeyStatus::Active),
        plan: Set(plan),
        rate_limit: Set(rate_limit),
        webhook_url: Set(webhook_url),
        webhook_secret: Set(Some(
            webhook_secret.unwrap_or_else(generate_webhook_secret),
        )),
        webhook_retry_policy: Set(webhook_retry_policy),
        webhook_last_delivery: Set(None),
        data_retention: Set(data_retention),
        disable_video_storage: Set(disable_video_storage),
        require_extra_verification: Set(require_extra_verification),
        monthly_usage: Set(0),
        daily_usage: Set(0),
        daily_usage_date: Set(now.format("%Y-%m-%d").to_string()),
        success_count: Set(0),
        failure_count: Set(0),
        last_used_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let model = row.insert(&state.db).await.map_err(|e| {
        error!("Failed to insert API key: {}", e);
        server_error()
    })?;

    Ok((model, generated.raw_key))
}

fn created_response(model: api_key::Model, raw_key: String, message: &str) -> HttpResponse {
    HttpResponse::Created().json(ApiKeyCreatedResponse {
        success: true,
        message: message.to_string(),
        data: ApiKeyCreatedData {
            id: model.id,
            key_id: model.key_id,
            key: raw_key,
            key_prefix: model.key_prefix,
            name: model.name,
            environment: model.environment,
            status: model.status,
            created_at: model.created_at,
        },
    })
}

/// POST /api/keys
pub async fn create_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<CreateApiKeyPayload>,
) -> HttpResponse {
    let claims = match authenticate_user(&req, &state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let payload = payload.into_inner();
    let name = payload.name.unwrap_or_else(|| "API Key".to_string());
    let environment = payload.environment.unwrap_or(Environment::Test);

    match issue_key(
        &state,
        &claims.sub,
        name,
        environment,
        Plan::Free,
        DEFAULT_RATE_LIMIT,
        None,
        None,
        WebhookRetryPolicy::Thrice,
        DataRetention::Month,
        false,
        false,
    )
    .await
    {
        Ok((model, raw_key)) => {
            info!("Issued API key {} for {}", model.key_id, claims.sub);
            created_response(
                model,
                raw_key,
                "API key created. Store it now; it will not be shown again.",
            )
        }
        Err(response) => response,
    }
}

/// GET /api/keys
///
/// Key hashes and webhook secrets never serialize; dashboards only ever see
/// the display prefix.
pub async fn list_keys(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let claims = match authenticate_user(&req, &state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    match api_key::Entity::find()
        .filter(api_key::Column::CustomerId.eq(&claims.sub))
        .order_by_desc(api_key::Column::CreatedAt)
        .all(&state.db)
        .await
    {
        Ok(keys) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "data": keys,
        })),
        Err(e) => {
            error!("Database error listing API keys: {}", e);
            server_error()
        }
    }
}

/// PUT /api/keys/{id}
///
/// Only the allow-listed settings fields are writable; identity, counters,
/// and status are untouchable here.
pub async fn update_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateApiKeyPayload>,
) -> HttpResponse {
    let claims = match authenticate_user(&req, &state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let existing = match find_owned_key(&state, &path, &claims.sub).await {
        Ok(Some(model)) => model,
        Ok(None) => return not_found(),
        Err(response) => return response,
    };

    let payload = payload.into_inner();
    let mut update: api_key::ActiveModel = existing.into();

    if let Some(name) = payload.name {
        update.name = Set(name);
    }
    if let Some(url) = payload.webhook_url {
        update.webhook_url = Set(if url.is_empty() { None } else { Some(url) });
    }
    if let Some(policy) = payload.webhook_retry_policy {
        update.webhook_retry_policy = Set(policy);
    }
    if let Some(retention) = payload.data_retention {
        update.data_retention = Set(retention);
    }
    if let Some(flag) = payload.disable_video_storage {
        update.disable_video_storage = Set(flag);
    }
    if let Some(flag) = payload.require_extra_verification {
        update.require_extra_verification = Set(flag);
    }
    update.updated_at = Set(Utc::now());

    match update.update(&state.db).await {
        Ok(model) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "data": model,
        })),
        Err(e) => {
            error!("Failed to update API key: {}", e);
            server_error()
        }
    }
}

/// POST /api/keys/{id}/rotate
///
/// Revokes the old key and issues a replacement with a fresh bearer secret,
/// carrying forward name, environment, plan, and the webhook/retention
/// settings (including the webhook signing secret integrators already hold).
pub async fn rotate_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let claims = match authenticate_user(&req, &state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let old = match find_owned_key(&state, &path, &claims.sub).await {
        Ok(Some(model)) => model,
        Ok(None) => return not_found(),
        Err(response) => return response,
    };

    if old.status == KeyStatus::Revoked {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "key_inactive",
            "Revoked keys cannot be rotated",
        ));
    }

    let old_id = old.id.clone();
    let old_key_id = old.key_id.clone();
    let carried = old.clone();

    let mut revoke: api_key::ActiveModel = old.into();
    revoke.status = Set(KeyStatus::Revoked);
    revoke.updated_at = Set(Utc::now());
    if let Err(e) = revoke.update(&state.db).await {
        error!("Failed to revoke API key {}: {}", old_id, e);
        return server_error();
    }

    match issue_key(
        &state,
        &claims.sub,
        carried.name,
        carried.environment,
        carried.plan,
        carried.rate_limit,
        carried.webhook_url,
        carried.webhook_secret,
        carried.webhook_retry_policy,
        carried.data_retention,
        carried.disable_video_storage,
        carried.require_extra_verification,
    )
    .await
    {
        Ok((model, raw_key)) => {
            info!("Rotated API key {} -> {}", old_key_id, model.key_id);
            created_response(
                model,
                raw_key,
                "API key rotated. Store the new key now; it will not be shown again.",
            )
        }
        Err(response) => response,
    }
}

/// POST /api/keys/{id}/toggle
///
/// Flips a key between active and suspended. Revocation is permanent and
/// cannot be toggled out of.
pub async fn toggle_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let claims = match authenticate_user(&req, &state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let existing = match find_owned_key(&state, &path, &claims.sub).await {
        Ok(Some(model)) => model,
        Ok(None) => return not_found(),
        Err(response) => return response,
    };

    let next = match existing.status {
        KeyStatus::Active => KeyStatus::Suspended,
        KeyStatus::Suspended => KeyStatus::Active,
        KeyStatus::Revoked => {
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "key_inactive",
                "Revoked keys cannot be re-activated",
            ));
        }
    };

    let mut update: api_key::ActiveModel = existing.into();
    update.status = Set(next);
    update.updated_at = Set(Utc::now());

    match update.update(&state.db).await {
        Ok(model) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "data": model,
        })),
        Err(e) => {
            error!("Failed to toggle API key: {}", e);
            server_error()
        }
    }
}

/// GET /api/keys/{id}/usage
pub async fn key_usage(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let claims = match authenticate_user(&req, &state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let key = match find_owned_key(&state, &path, &claims.sub).await {
        Ok(Some(model)) => model,
        Ok(None) => return not_found(),
        Err(response) => return response,
    };

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": {
            "key_id": key.key_id,
            "monthly_usage": key.monthly_usage,
            "daily_usage": key.daily_usage,
            "daily_usage_date": key.daily_usage_date,
            "success_count": key.success_count,
            "failure_count": key.failure_count,
            "rate_limit": key.rate_limit,
            "last_used_at": key.last_used_at,
            "webhook_last_delivery": key.webhook_last_delivery,
        },
    }))
}
