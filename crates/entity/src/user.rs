use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    /// Lowercased at write time for case-insensitive uniqueness.
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id PHC string. Never serialized into API responses.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Face template at rest: either the versioned AES-256-GCM wrapper JSON
    /// or a legacy plaintext vector. Always written through
    /// `facesecure_core::template` — never raw.
    #[serde(skip_serializing)]
    pub face_template: Option<String>,

    /// Map of device id to `{trusted, last_seen}`.
    pub device_trust: Json,

    /// Soft deactivation; users are never hard-deleted.
    pub is_active: bool,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::api_key::Entity")]
    ApiKey,
    #[sea_orm(has_many = "super::login_history::Entity")]
    LoginHistory,
}

impl Related<super::api_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKey.def()
    }
}

impl Related<super::login_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoginHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
