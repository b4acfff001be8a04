use chrono::{Duration, Utc};
use entity::verification_session::{
    self, BehaviorSignal, LivenessSignal, ReplaySignal, SessionStatus,
};
use rand::RngCore;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::auth::ApiKeyContext;
use crate::models::SessionSignals;
use crate::webhook::DeliveryOutcome;

/// Sessions are valid for 30 minutes from creation.
const SESSION_TTL_MINUTES: i64 = 30;

/// Opaque session id: `vs_` + 24 hex characters.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("vs_{}", hex)
}

/// Insert a fresh pending session owned by the calling key.
pub async fn create_session(
    db: &DatabaseConnection,
    ctx: &ApiKeyContext,
    base_url: &str,
) -> Result<verification_session::Model, DbErr> {
    let session_id = generate_session_id();
    let now = Utc::now();
    let verification_url = format!(
        "{}/verify?session={}",
        base_url.trim_end_matches('/'),
        session_id
    );

    let session = verification_session::ActiveModel {
        session_id: Set(session_id),
        api_key_id: Set(ctx.api_key_id.clone()),
        customer_id: Set(ctx.customer_id.clone()),
        status: Set(SessionStatus::Pending),
        confidence: Set(0),
        signal_liveness: Set(LivenessSignal::Pending),
        signal_replay: Set(ReplaySignal::Pending),
        signal_behavior: Set(BehaviorSignal::Pending),
        reason_codes: Set(serde_json::json!([])),
        verification_url: Set(verification_url),
        expires_at: Set(now + Duration::minutes(SESSION_TTL_MINUTES)),
        device_info: Set(None),
        ip_address: Set(None),
        completed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    session.insert(db).await
}

/// Fetch a session scoped to its owning account, expiring it first if its
/// deadline passed while it was still pending. The expiry is persisted
/// before the read so every later reader sees the same terminal state.
pub async fn load_session(
    db: &DatabaseConnection,
    session_id: &str,
    customer_id: &str,
) -> Result<Option<verification_session::Model>, DbErr> {
    let now = Utc::now();

    verification_session::Entity::update_many()
        .col_expr(
            verification_session::Column::Status,
            Expr::value(SessionStatus::Expired),
        )
        .col_expr(verification_session::Column::UpdatedAt, Expr::value(now))
        .filter(verification_session::Column::SessionId.eq(session_id))
        .filter(verification_session::Column::Status.eq(SessionStatus::Pending))
        .filter(verification_session::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;

    verification_session::Entity::find_by_id(session_id)
        .filter(verification_session::Column::CustomerId.eq(customer_id))
        .one(db)
        .await
}

/// Fields written by a completion request.
#[derive(Debug, Clone)]
pub struct CompletionUpdate {
    pub status: SessionStatus,
    pub confidence: i32,
    pub signals: SessionSignals,
    pub reason_codes: Vec<String>,
    pub device_info: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

pub enum CompleteOutcome {
    Completed(verification_session::Model),
    /// Session exists but already left the pending state.
    NotPending,
    NotFound,
}

/// Move a pending session to a terminal state. The status filter makes the
/// transition first-writer-wins: a second completion, or one racing lazy
/// expiry, updates zero rows and is rejected.
pub async fn complete_session(
    db: &DatabaseConnection,
    session_id: &str,
    customer_id: &str,
    update: CompletionUpdate,
) -> Result<CompleteOutcome, DbErr> {
    let now = Utc::now();

    // Expire first so a completion arriving after the deadline loses.
    verification_session::Entity::update_many()
        .col_expr(
            verification_session::Column::Status,
            Expr::value(SessionStatus::Expired),
        )
        .col_expr(verification_session::Column::UpdatedAt, Expr::value(now))
        .filter(verification_session::Column::SessionId.eq(session_id))
        .filter(verification_session::Column::Status.eq(SessionStatus::Pending))
        .filter(verification_session::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;

    let result = verification_session::Entity::update_many()
        .col_expr(
            verification_session::Column::Status,
            Expr::value(update.status),
        )
        .col_expr(
            verification_session::Column::Confidence,
            Expr::value(update.confidence),
        )
        .col_expr(
            verification_session::Column::SignalLiveness,
            Expr::value(update.signals.liveness),
        )
        .col_expr(
            verification_session::Column::SignalReplay,
            Expr::value(update.signals.replay),
        )
        .col_expr(
            verification_session::Column::SignalBehavior,
            Expr::value(update.signals.behavior),
        )
        .col_expr(
            verification_session::Column::ReasonCodes,
            Expr::value(serde_json::json!(update.reason_codes)),
        )
        .col_expr(
            verification_session::Column::DeviceInfo,
            Expr::value(update.device_info),
        )
        .col_expr(
            verification_session::Column::IpAddress,
            Expr::value(update.ip_address),
        )
        .col_expr(
            verification_session::Column::CompletedAt,
            Expr::value(Some(now)),
        )
        .col_expr(verification_session::Column::UpdatedAt, Expr::value(now))
        .filter(verification_session::Column::SessionId.eq(session_id))
        .filter(verification_session::Column::CustomerId.eq(customer_id))
        .filter(verification_session::Column::Status.eq(SessionStatus::Pending))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let existing = verification_session::Entity::find_by_id(session_id)
            .filter(verification_session::Column::CustomerId.eq(customer_id))
            .one(db)
            .await?;

        return Ok(match existing {
            Some(_) => CompleteOutcome::NotPending,
            None => CompleteOutcome::NotFound,
        });
    }

    let completed = verification_session::Entity::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("session {} vanished", session_id)))?;

    Ok(CompleteOutcome::Completed(completed))
}

/// Bump the owning key's success or failure tally for a completed session.
pub async fn record_session_outcome(
    db: &DatabaseConnection,
    api_key_id: &str,
    verified: bool,
) -> Result<(), DbErr> {
    let column = if verified {
        entity::api_key::Column::SuccessCount
    } else {
        entity::api_key::Column::FailureCount
    };

    entity::api_key::Entity::update_many()
        .col_expr(column, Expr::col(column).add(1))
        .filter(entity::api_key::Column::Id.eq(api_key_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Persist the result of a webhook delivery run on the owning key.
pub async fn record_webhook_outcome(
    db: &DatabaseConnection,
    api_key_id: &str,
    outcome: &DeliveryOutcome,
) -> Result<(), DbErr> {
    let value = serde_json::to_value(outcome)
        .map_err(|e| DbErr::Custom(format!("serialize delivery outcome: {}", e)))?;

    entity::api_key::Entity::update_many()
        .col_expr(
            entity::api_key::Column::WebhookLastDelivery,
            Expr::value(Some(value)),
        )
        .filter(entity::api_key::Column::Id.eq(api_key_id))
        .exec(db)
        .await?;

    Ok(())
}
