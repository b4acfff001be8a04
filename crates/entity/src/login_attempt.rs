use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit record of one face-login attempt.
///
/// Written by the decision pipeline and read only by reporting; an audit
/// write failure never fails the login request that produced it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "login_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub device_id: String,

    pub success: bool,

    pub failure_reason: Option<String>,

    /// Raw liveness sub-scores as the client reported them.
    pub motion_score: f64,

    pub texture_score: f64,

    pub challenge_passed: bool,

    pub quality_score: f64,

    /// Set when the attempt matched (or challenged against) an account.
    pub user_id: Option<String>,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
