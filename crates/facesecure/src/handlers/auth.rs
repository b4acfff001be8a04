use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use entity::{login_attempt, login_history, user};
use jsonwebtoken::{encode, Algorithm, Header};
use log::{error, info, warn};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::{
    AuthResponse, ErrorResponse, LoginPayload, MfaRequiredResponse, RegisterPayload,
    SessionTokenClaims, UserSummary, VerifyFacePayload, VerifyFaceResponse,
};
use facesecure_core::liveness::{self, LivenessVerdict};
use facesecure_core::matcher::{classify, Candidate, CandidateMatcher, LinearScanMatcher, MatchTier};
use facesecure_core::password::{hash_password, verify_optional_password};
use facesecure_core::template::{decrypt_template, encrypt_template};

/// GET /.well-known/jwks.json
pub async fn jwks(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/json")
        .body(state.jwks_json.clone())
}

fn server_error() -> HttpResponse {
    HttpResponse::InternalServerError()
        .json(ErrorResponse::new("server_error", "Internal server error"))
}

/// Sign an ES256 session token for an authenticated account.
fn issue_session_token(
    state: &AppState,
    account: &user::Model,
    device_id: &str,
    auth_method: &str,
) -> anyhow::Result<String> {
    let now = Utc::now().timestamp();
    let claims = SessionTokenClaims {
        iss: "facesecure".to_string(),
        sub: account.id.clone(),
        email: account.email.clone(),
        device_id: device_id.to_string(),
        auth_method: auth_method.to_string(),
        exp: now + state.jwt_expiration,
        iat: now,
    };

    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(state.jwt_kid.clone());

    Ok(encode(&header, &claims, &state.encoding_key)?)
}

fn summary(account: &user::Model) -> UserSummary {
    UserSummary {
        id: account.id.clone(),
        name: account.name.clone(),
        email: account.email.clone(),
    }
}

/// POST /api/auth/register
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterPayload>,
) -> HttpResponse {
    let payload = payload.into_inner();

    if payload.name.trim().is_empty() || payload.email.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "invalid_request",
            "Name and email are required",
        ));
    }

    let email = payload.email.trim().to_lowercase();

    match user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await
    {
        Ok(Some(_)) => {
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "user_exists",
                "An account with this email already exists",
            ));
        }
        Ok(None) => {}
        Err(e) => {
            error!("Database error during registration: {}", e);
            return server_error();
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!("Password hashing failed: {}", e);
            return server_error();
        }
    };

    // Optional face enrollment at signup; templates are encrypted before
    // they ever touch the database. A provider outage downgrades to a
    // password-only registration rather than failing it.
    let face_template = match &payload.face_image {
        Some(image) if !image.is_empty() => {
            match state.recognizer.generate_embedding(image).await {
                Ok(result) => match encrypt_template(&result.embedding, &state.template_key) {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        error!("Template encryption failed: {}", e);
                        return server_error();
                    }
                },
                Err(e) => {
                    warn!(
                        "Enrollment embedding failed, registering without a face template: {}",
                        e
                    );
                    None
                }
            }
        }
        _ => None,
    };

    let now = Utc::now();
    let account = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        password_hash: Set(Some(password_hash)),
        face_template: Set(face_template),
        device_trust: Set(serde_json::json!({})),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let account = match account.insert(&state.db).await {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to insert account: {}", e);
            return server_error();
        }
    };

    info!("Registered account {}", account.id);

    match issue_session_token(&state, &account, "", "password") {
        Ok(token) => HttpResponse::Created().json(AuthResponse {
            success: true,
            token,
            user: summary(&account),
        }),
        Err(e) => {
            error!("Failed to sign session token: {}", e);
            server_error()
        }
    }
}

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> HttpResponse {
    let payload = payload.into_inner();
    let email = payload.email.trim().to_lowercase();

    let account = match user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .filter(user::Column::IsActive.eq(true))
        .one(&state.db)
        .await
    {
        Ok(Some(model)) => model,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(ErrorResponse::new(
                "authentication_failed",
                "Invalid email or password",
            ));
        }
        Err(e) => {
            error!("Database error during login: {}", e);
            return server_error();
        }
    };

    let verified =
        match verify_optional_password(&payload.password, account.password_hash.as_deref()) {
            Ok(v) => v,
            Err(e) => {
                error!("Password verification failed: {}", e);
                return server_error();
            }
        };

    if !verified {
        return HttpResponse::Unauthorized().json(ErrorResponse::new(
            "authentication_failed",
            "Invalid email or password",
        ));
    }

    let device_id = payload.device_id.unwrap_or_default();
    append_login_history(&state, &account.id, &device_id, "password").await;

    match issue_session_token(&state, &account, &device_id, "password") {
        Ok(token) => HttpResponse::Ok().json(AuthResponse {
            success: true,
            token,
            user: summary(&account),
        }),
        Err(e) => {
            error!("Failed to sign session token: {}", e);
            server_error()
        }
    }
}

/// POST /api/auth/verify-face
///
/// The full decision pipeline: request validation, capture freshness,
/// liveness, provider embedding, population match, then tiered accept /
/// step-up / reject.
pub async fn verify_face(
    state: web::Data<AppState>,
    payload: web::Json<VerifyFacePayload>,
) -> HttpResponse {
    let payload = payload.into_inner();
    let policy = state.policy;

    if payload.face_image.is_empty() || payload.metadata.device_id.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "invalid_request",
            "faceImage and metadata.deviceId are required",
        ));
    }

    // Capture freshness: stale frames are rejected before any scoring.
    let captured_at = match DateTime::parse_from_rfc3339(&payload.metadata.timestamp) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => {
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "invalid_request",
                "metadata.timestamp is not a valid RFC 3339 timestamp",
            ));
        }
    };
    let age = Utc::now().signed_duration_since(captured_at);
    if age.num_seconds() > policy.max_capture_age_secs {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "request_expired",
            "Capture is too old, please try again",
        ));
    }

    if let LivenessVerdict::Fail { reason } =
        liveness::evaluate(&payload.liveness_data, &policy.liveness)
    {
        record_login_attempt(&state, &payload, false, Some(&reason), None).await;

        return HttpResponse::BadRequest()
            .json(ErrorResponse::new("liveness_check_failed", reason));
    }

    let probe = match state.recognizer.generate_embedding(&payload.face_image).await {
        Ok(result) => {
            if result.quality < policy.min_provider_quality {
                record_login_attempt(&state, &payload, false, Some("Image quality too low"), None)
                    .await;
                return HttpResponse::BadRequest().json(ErrorResponse::new(
                    "poor_image_quality",
                    "Image quality too low",
                ));
            }
            result.embedding
        }
        Err(e) => {
            warn!("Embedding generation failed: {}", e);
            return HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
                "service_unavailable",
                "Face recognition service is unavailable",
            ));
        }
    };

    let enrolled = match user::Entity::find()
        .filter(user::Column::IsActive.eq(true))
        .filter(user::Column::FaceTemplate.is_not_null())
        .all(&state.db)
        .await
    {
        Ok(users) => users,
        Err(e) => {
            error!("Database error loading enrolled accounts: {}", e);
            return server_error();
        }
    };

    let candidates: Vec<Candidate> = enrolled
        .iter()
        .map(|account| Candidate {
            id: account.id.clone(),
            embedding: decrypt_template(account.face_template.as_deref(), &state.template_key),
        })
        .collect();

    if candidates.iter().all(|c| c.embedding.is_empty()) {
        return HttpResponse::NotFound().json(ErrorResponse::new(
            "no_users_enrolled",
            "No accounts have enrolled face templates",
        ));
    }

    let best = match LinearScanMatcher.best_match(&probe, &candidates) {
        Some(best) => best,
        None => {
            record_login_attempt(&state, &payload, false, Some("Face not recognized"), None).await;
            return HttpResponse::Unauthorized().json(ErrorResponse::new(
                "authentication_failed",
                "Face not recognized",
            ));
        }
    };

    match classify(best.similarity, policy.mfa_threshold, policy.accept_threshold) {
        MatchTier::Reject => {
            record_login_attempt(&state, &payload, false, Some("Face not recognized"), None).await;
            HttpResponse::Unauthorized().json(ErrorResponse::new(
                "authentication_failed",
                "Face not recognized",
            ))
        }
        MatchTier::Challenge => {
            info!(
                "Face match for {} at {:.3} requires step-up verification",
                best.candidate_id, best.similarity
            );
            record_login_attempt(
                &state,
                &payload,
                false,
                Some("Step-up verification required"),
                Some(&best.candidate_id),
            )
            .await;
            HttpResponse::Ok().json(MfaRequiredResponse {
                success: false,
                error: "mfa_required".to_string(),
                message: "Additional verification required".to_string(),
                require_mfa: true,
                user_id: best.candidate_id,
            })
        }
        MatchTier::Accept => {
            let account = match enrolled.iter().find(|a| a.id == best.candidate_id) {
                Some(model) => model.clone(),
                None => return server_error(),
            };

            let token = match issue_session_token(
                &state,
                &account,
                &payload.metadata.device_id,
                "face_recognition",
            ) {
                Ok(token) => token,
                Err(e) => {
                    error!("Failed to sign session token: {}", e);
                    return server_error();
                }
            };

            trust_device(&state, &account, &payload.metadata.device_id).await;
            append_login_history(&state, &account.id, &payload.metadata.device_id, "face").await;
            record_login_attempt(&state, &payload, true, None, Some(&account.id)).await;

            info!(
                "Face login accepted for {} at similarity {:.3}",
                account.id, best.similarity
            );

            HttpResponse::Ok().json(VerifyFaceResponse {
                success: true,
                session_token: token,
                user: summary(&account),
                expires_in: state.jwt_expiration,
                similarity: best.similarity,
            })
        }
    }
}

/// Mark a device as trusted on the account after a successful face login.
/// Audit-adjacent: failures are logged and never fail the login.
async fn trust_device(state: &AppState, account: &user::Model, device_id: &str) {
    if device_id.is_empty() {
        return;
    }

    let mut trust = account.device_trust.clone();
    if !trust.is_object() {
        trust = serde_json::json!({});
    }
    if let Some(map) = trust.as_object_mut() {
        map.insert(
            device_id.to_string(),
            serde_json::json!({
                "trusted": true,
                "last_seen": Utc::now().to_rfc3339(),
            }),
        );
    }

    let update = user::ActiveModel {
        id: Set(account.id.clone()),
        device_trust: Set(trust),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    if let Err(e) = update.update(&state.db).await {
        warn!("Failed to update device trust for {}: {}", account.id, e);
    }
}

async fn append_login_history(state: &AppState, user_id: &str, device_id: &str, method: &str) {
    let entry = login_history::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(user_id.to_string()),
        device_id: Set(device_id.to_string()),
        auth_method: Set(method.to_string()),
        success: Set(true),
        ip_address: Set(None),
        location: Set(None),
        created_at: Set(Utc::now()),
    };

    if let Err(e) = entry.insert(&state.db).await {
        warn!("Failed to append login history for {}: {}", user_id, e);
    }
}

/// Audit record for every face-login attempt, pass or fail.
async fn record_login_attempt(
    state: &AppState,
    payload: &VerifyFacePayload,
    success: bool,
    failure_reason: Option<&str>,
    user_id: Option<&str>,
) {
    let attempt = login_attempt::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        device_id: Set(payload.metadata.device_id.clone()),
        success: Set(success),
        failure_reason: Set(failure_reason.map(|s| s.to_string())),
        motion_score: Set(payload.liveness_data.motion_score),
        texture_score: Set(payload.liveness_data.texture_score),
        challenge_passed: Set(payload.liveness_data.challenge_passed),
        quality_score: Set(payload.liveness_data.quality_score),
        user_id: Set(user_id.map(|s| s.to_string())),
        created_at: Set(Utc::now()),
    };

    if let Err(e) = attempt.insert(&state.db).await {
        warn!("Failed to record login attempt: {}", e);
    }
}
