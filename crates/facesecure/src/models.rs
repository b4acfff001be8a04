use entity::api_key::{DataRetention, Environment, WebhookRetryPolicy};
use entity::verification_session::{
    BehaviorSignal, LivenessSignal, ReplaySignal, SessionStatus,
};
use facesecure_core::liveness::LivenessSignals;
use serde::{Deserialize, Serialize};

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

/// Session token claims (ES256, advertised via /.well-known/jwks.json)
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionTokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject (account ID)
    pub sub: String,
    pub email: String,
    /// Device the token was issued to (face logins only)
    #[serde(default)]
    pub device_id: String,
    /// "face_recognition" or "password"
    pub auth_method: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iat: i64,
}

// -------------------- Account auth --------------------

/// Request payload for POST /api/auth/register
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Optional base64 capture used to enroll a face template at signup.
    #[serde(default)]
    pub face_image: Option<String>,
}

/// Request payload for POST /api/auth/login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserSummary,
}

// -------------------- Face login --------------------

/// Capture metadata accompanying a face-login attempt.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    /// RFC 3339 capture timestamp; rejected when older than the policy limit.
    pub timestamp: String,
    pub device_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub video_hash: Option<String>,
}

/// Request payload for POST /api/auth/verify-face
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyFacePayload {
    /// Base64-encoded capture frame
    pub face_image: String,
    pub liveness_data: LivenessSignals,
    pub metadata: CaptureMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyFaceResponse {
    pub success: bool,
    pub session_token: String,
    pub user: UserSummary,
    pub expires_in: i64,
    pub similarity: f64,
}

/// 200-level soft decline asking for step-up verification.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaRequiredResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub require_mfa: bool,
    pub user_id: String,
}

// -------------------- Access keys --------------------

/// Request payload for POST /api/keys
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateApiKeyPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub environment: Option<Environment>,
}

/// The one response that ever carries a raw bearer value.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreatedResponse {
    pub success: bool,
    pub message: String,
    pub data: ApiKeyCreatedData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreatedData {
    pub id: String,
    pub key_id: String,
    /// Full bearer value; shown exactly once.
    pub key: String,
    pub key_prefix: String,
    pub name: String,
    pub environment: Environment,
    pub status: entity::api_key::KeyStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Allow-listed settings for PUT /api/keys/{id}
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApiKeyPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_retry_policy: Option<WebhookRetryPolicy>,
    #[serde(default)]
    pub data_retention: Option<DataRetention>,
    #[serde(default)]
    pub disable_video_storage: Option<bool>,
    #[serde(default)]
    pub require_extra_verification: Option<bool>,
}

// -------------------- Verification sessions --------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub verification_url: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSignals {
    pub liveness: LivenessSignal,
    pub replay: ReplaySignal,
    pub behavior: BehaviorSignal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub confidence: i32,
    pub signals: SessionSignals,
    pub reason_codes: Vec<String>,
    pub verification_url: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Request payload for POST /v1/verification/session/{id}/complete
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSessionPayload {
    /// Defaults to `verified` when unspecified.
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub confidence: Option<i32>,
    #[serde(default)]
    pub signals: Option<SessionSignals>,
    #[serde(default)]
    pub reason_codes: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub status: SessionStatus,
    pub confidence: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_face_payload_deserializes_camel_case() {
        let json = r#"{
            "faceImage": "aGVsbG8=",
            "livenessData": {
                "motionDetected": true,
                "motionScore": 0.9,
                "textureValid": true,
                "textureScore": 0.95,
                "challengePassed": true,
                "challengeType": "blink",
                "qualityScore": 0.9
            },
            "metadata": {
                "timestamp": "2025-08-15T12:00:00Z",
                "deviceId": "device-1"
            }
        }"#;

        let payload: VerifyFacePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.metadata.device_id, "device-1");
        assert!(payload.liveness_data.challenge_passed);
        assert!(payload.metadata.session_id.is_none());
    }

    #[test]
    fn complete_session_payload_defaults_are_all_none() {
        let payload: CompleteSessionPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.status.is_none());
        assert!(payload.signals.is_none());
        assert!(payload.reason_codes.is_none());
    }

    #[test]
    fn error_response_serialization() {
        let error = ErrorResponse::new("invalid_key", "API key not found");

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("invalid_key"));
        assert!(json.contains("API key not found"));
    }

    #[test]
    fn session_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Verified).unwrap();
        assert_eq!(json, "\"verified\"");
    }
}
