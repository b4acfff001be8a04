use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Public identifier embedded in the bearer value.
    #[sea_orm(unique)]
    pub key_id: String,

    /// SHA-256 hex of the full bearer value. The raw secret is shown to the
    /// owner exactly once at creation/rotation and is unrecoverable here.
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub key_hash: String,

    /// First 12 characters of the raw key + "..." for dashboards.
    pub key_prefix: String,

    pub name: String,

    /// Owning account.
    pub customer_id: String,

    pub environment: Environment,

    pub status: KeyStatus,

    pub plan: Plan,

    /// Requests per minute, enforced downstream by callers of authenticate.
    pub rate_limit: i32,

    pub webhook_url: Option<String>,

    /// Per-key webhook signing secret (`whsec_` + hex).
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,

    pub webhook_retry_policy: WebhookRetryPolicy,

    /// Outcome of the most recent delivery attempt:
    /// `{status, timestamp, status_code, attempts}`.
    pub webhook_last_delivery: Option<Json>,

    /// Governs an external purge process, not in-process behavior.
    pub data_retention: DataRetention,

    pub disable_video_storage: bool,

    pub require_extra_verification: bool,

    pub monthly_usage: i64,

    pub daily_usage: i64,

    /// YYYY-MM-DD stamp; the daily counter resets when it goes stale.
    pub daily_usage_date: String,

    pub success_count: i64,

    pub failure_count: i64,

    pub last_used_at: Option<ChronoDateTimeUtc>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[sea_orm(string_value = "test")]
    Test,
    #[sea_orm(string_value = "live")]
    Live,
}

/// Key lifecycle. `Revoked` is terminal; `Active` and `Suspended` may toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "suspended")]
    Suspended,
    #[sea_orm(string_value = "revoked")]
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "pro")]
    Pro,
    #[sea_orm(string_value = "enterprise")]
    Enterprise,
}

/// How many extra delivery attempts the webhook dispatcher makes after the
/// first one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum WebhookRetryPolicy {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "once")]
    Once,
    #[sea_orm(string_value = "twice")]
    Twice,
    #[sea_orm(string_value = "thrice")]
    Thrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum DataRetention {
    #[sea_orm(string_value = "24h")]
    #[serde(rename = "24h")]
    Day,
    #[sea_orm(string_value = "7d")]
    #[serde(rename = "7d")]
    Week,
    #[sea_orm(string_value = "30d")]
    #[serde(rename = "30d")]
    Month,
    #[sea_orm(string_value = "none")]
    #[serde(rename = "none")]
    None,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CustomerId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::verification_session::Entity")]
    VerificationSession,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::verification_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VerificationSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
