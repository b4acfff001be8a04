use actix_web::{HttpRequest, HttpResponse};
use chrono::Utc;
use entity::api_key::{self, Environment, KeyStatus, Plan};
use jsonwebtoken::{decode, Algorithm, Validation};
use log::warn;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::app_state::AppState;
use crate::models::{ErrorResponse, SessionTokenClaims};
use facesecure_core::api_key::{has_key_prefix, hash_api_key};

/// The authenticated key's identity and limits, handed to the session
/// handlers. Carries no secrets.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub api_key_id: String,
    pub key_id: String,
    pub customer_id: String,
    pub environment: Environment,
    pub plan: Plan,
    pub rate_limit: i32,
}

pub enum ApiKeyAuthError {
    MissingHeader,
    InvalidFormat,
    UnknownKey,
    Inactive(KeyStatus),
    Db(DbErr),
}

impl ApiKeyAuthError {
    pub fn to_response(&self) -> HttpResponse {
        match self {
            ApiKeyAuthError::MissingHeader => HttpResponse::Unauthorized().json(
                ErrorResponse::new("unauthorized", "Missing Authorization header"),
            ),
            ApiKeyAuthError::InvalidFormat => HttpResponse::Unauthorized().json(
                ErrorResponse::new("invalid_key_format", "API key format not recognized"),
            ),
            ApiKeyAuthError::UnknownKey => HttpResponse::Unauthorized()
                .json(ErrorResponse::new("invalid_key", "API key not found")),
            ApiKeyAuthError::Inactive(status) => HttpResponse::Forbidden().json(
                ErrorResponse::new(
                    "key_inactive",
                    format!("API key is {}", status_label(*status)),
                ),
            ),
            ApiKeyAuthError::Db(e) => {
                warn!("Database error during key authentication: {}", e);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::new("server_error", "Internal server error"))
            }
        }
    }
}

fn status_label(status: KeyStatus) -> &'static str {
    match status {
        KeyStatus::Active => "active",
        KeyStatus::Suspended => "suspended",
        KeyStatus::Revoked => "revoked",
    }
}

fn bearer_value(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Authenticate an access key from the Authorization header, then meter the
/// call: daily counter rolls over when its date stamp is stale, both usage
/// counters bump atomically in the database.
pub async fn authenticate_api_key(
    req: &HttpRequest,
    db: &DatabaseConnection,
) -> Result<ApiKeyContext, ApiKeyAuthError> {
    let raw_key = bearer_value(req).ok_or(ApiKeyAuthError::MissingHeader)?;

    if !has_key_prefix(raw_key) {
        return Err(ApiKeyAuthError::InvalidFormat);
    }

    let key_hash = hash_api_key(raw_key);

    let key = api_key::Entity::find()
        .filter(api_key::Column::KeyHash.eq(&key_hash))
        .one(db)
        .await
        .map_err(ApiKeyAuthError::Db)?
        .ok_or(ApiKeyAuthError::UnknownKey)?;

    if key.status != KeyStatus::Active {
        return Err(ApiKeyAuthError::Inactive(key.status));
    }

    record_usage(db, &key.id).await.map_err(ApiKeyAuthError::Db)?;

    Ok(ApiKeyContext {
        api_key_id: key.id,
        key_id: key.key_id,
        customer_id: key.customer_id,
        environment: key.environment,
        plan: key.plan,
        rate_limit: key.rate_limit,
    })
}

/// Counter updates run as filtered UPDATEs so concurrent calls never lose
/// increments to read-modify-write races.
async fn record_usage(db: &DatabaseConnection, api_key_id: &str) -> Result<(), DbErr> {
    let today = Utc::now().format("%Y-%m-%d").to_string();

    // Reset the daily counter first if its date stamp is stale. The filter
    // makes this a no-op on every call but the first of the day.
    api_key::Entity::update_many()
        .col_expr(api_key::Column::DailyUsage, Expr::value(0i64))
        .col_expr(api_key::Column::DailyUsageDate, Expr::value(today.clone()))
        .filter(api_key::Column::Id.eq(api_key_id))
        .filter(api_key::Column::DailyUsageDate.ne(today))
        .exec(db)
        .await?;

    api_key::Entity::update_many()
        .col_expr(
            api_key::Column::DailyUsage,
            Expr::col(api_key::Column::DailyUsage).add(1),
        )
        .col_expr(
            api_key::Column::MonthlyUsage,
            Expr::col(api_key::Column::MonthlyUsage).add(1),
        )
        .col_expr(api_key::Column::LastUsedAt, Expr::value(Utc::now()))
        .filter(api_key::Column::Id.eq(api_key_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Verify the ES256 session token guarding the key-management endpoints and
/// return its claims.
pub fn authenticate_user(
    req: &HttpRequest,
    state: &AppState,
) -> Result<SessionTokenClaims, HttpResponse> {
    let token = bearer_value(req).ok_or_else(|| {
        HttpResponse::Unauthorized().json(ErrorResponse::new(
            "invalid_request",
            "Missing Authorization header",
        ))
    })?;

    let mut validation = Validation::new(Algorithm::ES256);
    validation.set_issuer(&["facesecure"]);

    decode::<SessionTokenClaims>(token, &state.decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            warn!("Session token rejected: {}", e);
            HttpResponse::Unauthorized().json(ErrorResponse::new(
                "invalid_request",
                "Invalid or expired session token",
            ))
        })
}
