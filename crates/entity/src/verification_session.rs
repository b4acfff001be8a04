use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "verification_sessions")]
pub struct Model {
    /// Opaque session id (`vs_` + hex), shared with the integrator.
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: String,

    pub api_key_id: String,

    pub customer_id: String,

    pub status: SessionStatus,

    /// 0–100; 0 until completion.
    pub confidence: i32,

    pub signal_liveness: LivenessSignal,

    pub signal_replay: ReplaySignal,

    pub signal_behavior: BehaviorSignal,

    /// Free-form reason code strings.
    pub reason_codes: Json,

    /// Externally shareable URL embedding the session id.
    pub verification_url: String,

    pub expires_at: ChronoDateTimeUtc,

    /// `{browser, os, device_type}` sniffed from the completing request.
    pub device_info: Option<Json>,

    pub ip_address: Option<String>,

    /// Set exactly once by completion; the status is immutable afterward.
    pub completed_at: Option<ChronoDateTimeUtc>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

/// Session state machine: `Pending` transitions once to any of the other
/// three; all of those are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum LivenessSignal {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "pass")]
    Pass,
    #[sea_orm(string_value = "fail")]
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ReplaySignal {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "detected")]
    Detected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum BehaviorSignal {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "suspicious")]
    Suspicious,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::api_key::Entity",
        from = "Column::ApiKeyId",
        to = "super::api_key::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    ApiKey,
}

impl Related<super::api_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKey.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
