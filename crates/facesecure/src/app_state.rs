use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey};
use sea_orm::DatabaseConnection;

use crate::config::DecisionPolicy;
use crate::recognizer::EmbeddingProvider;

/// Shared application state
pub struct AppState {
    /// Sea-ORM database connection pool
    pub db: DatabaseConnection,

    /// ECDSA private key for signing session tokens (ES256)
    pub encoding_key: EncodingKey,

    /// ECDSA public key for verifying session tokens (ES256)
    pub decoding_key: DecodingKey,

    /// Pre-generated JWKS JSON string containing the public key (EC P-256)
    pub jwks_json: String,

    /// JWT Key ID (kid) used in token headers and JWKS
    pub jwt_kid: String,

    /// Session token expiration time in seconds
    pub jwt_expiration: i64,

    /// Base URL used to build shareable verification URLs
    pub base_url: String,

    /// All decision thresholds, resolved once at startup. Handlers never read
    /// threshold state from the process environment.
    pub policy: DecisionPolicy,

    /// Process-wide 32-byte key for face-template encryption at rest
    pub template_key: [u8; 32],

    /// Source of face embeddings, normally the external provider client
    pub recognizer: Arc<dyn EmbeddingProvider>,

    /// Client used for webhook deliveries (per-attempt timeout applied at
    /// the request level by the dispatcher)
    pub webhook_client: reqwest::Client,
}
