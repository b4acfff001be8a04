use actix_web::{web, HttpRequest, HttpResponse};
use entity::api_key;
use entity::verification_session::{
    self, BehaviorSignal, LivenessSignal, ReplaySignal, SessionStatus,
};
use log::{error, info, warn};
use sea_orm::EntityTrait;

use crate::app_state::AppState;
use crate::auth::authenticate_api_key;
use crate::models::{
    CompleteSessionPayload, CompleteSessionResponse, CreateSessionResponse, ErrorResponse,
    SessionResponse, SessionSignals,
};
use crate::sessions::{
    complete_session, create_session, load_session, record_session_outcome,
    record_webhook_outcome, CompleteOutcome, CompletionUpdate,
};
use crate::webhook::{self, WebhookEvent};

fn server_error() -> HttpResponse {
    HttpResponse::InternalServerError()
        .json(ErrorResponse::new("server_error", "Internal server error"))
}

fn session_response(model: verification_session::Model) -> SessionResponse {
    let reason_codes: Vec<String> =
        serde_json::from_value(model.reason_codes).unwrap_or_default();

    SessionResponse {
        session_id: model.session_id,
        status: model.status,
        confidence: model.confidence,
        signals: SessionSignals {
            liveness: model.signal_liveness,
            replay: model.signal_replay,
            behavior: model.signal_behavior,
        },
        reason_codes,
        verification_url: model.verification_url,
        expires_at: model.expires_at,
        completed_at: model.completed_at,
        created_at: model.created_at,
    }
}

/// POST /v1/verification/session
pub async fn create(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let ctx = match authenticate_api_key(&req, &state.db).await {
        Ok(ctx) => ctx,
        Err(e) => return e.to_response(),
    };

    match create_session(&state.db, &ctx, &state.base_url).await {
        Ok(session) => {
            info!("Created session {} for key {}", session.session_id, ctx.key_id);
            HttpResponse::Created().json(CreateSessionResponse {
                session_id: session.session_id,
                verification_url: session.verification_url,
                expires_at: session.expires_at,
            })
        }
        Err(e) => {
            error!("Failed to create session: {}", e);
            server_error()
        }
    }
}

/// GET /v1/verification/session/{id}
pub async fn get(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let ctx = match authenticate_api_key(&req, &state.db).await {
        Ok(ctx) => ctx,
        Err(e) => return e.to_response(),
    };

    match load_session(&state.db, &path, &ctx.customer_id).await {
        Ok(Some(session)) => HttpResponse::Ok().json(session_response(session)),
        Ok(None) => HttpResponse::NotFound()
            .json(ErrorResponse::new("not_found", "Verification session not found")),
        Err(e) => {
            error!("Failed to load session: {}", e);
            server_error()
        }
    }
}

fn default_signals(status: SessionStatus) -> SessionSignals {
    match status {
        SessionStatus::Verified => SessionSignals {
            liveness: LivenessSignal::Pass,
            replay: ReplaySignal::None,
            behavior: BehaviorSignal::Normal,
        },
        _ => SessionSignals {
            liveness: LivenessSignal::Fail,
            replay: ReplaySignal::None,
            behavior: BehaviorSignal::Normal,
        },
    }
}

/// POST /v1/verification/session/{id}/complete
///
/// First writer wins: once a session leaves pending, later completions get
/// a 409 and leave both the session and the key's tallies untouched.
pub async fn complete(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<CompleteSessionPayload>,
) -> HttpResponse {
    let ctx = match authenticate_api_key(&req, &state.db).await {
        Ok(ctx) => ctx,
        Err(e) => return e.to_response(),
    };

    let payload = payload.into_inner();
    let status = payload.status.unwrap_or(SessionStatus::Verified);
    if !matches!(status, SessionStatus::Verified | SessionStatus::Rejected) {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "invalid_request",
            "Completion status must be verified or rejected",
        ));
    }

    let confidence = payload.confidence.unwrap_or(0).clamp(0, 100);
    let signals = payload.signals.unwrap_or_else(|| default_signals(status));

    let device_info = req
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(sniff_device_info);
    let ip_address = req.peer_addr().map(|addr| addr.ip().to_string());

    let update = CompletionUpdate {
        status,
        confidence,
        signals: signals.clone(),
        reason_codes: payload.reason_codes.unwrap_or_default(),
        device_info,
        ip_address,
    };

    let session = match complete_session(&state.db, &path, &ctx.customer_id, update).await {
        Ok(CompleteOutcome::Completed(session)) => session,
        Ok(CompleteOutcome::NotPending) => {
            return HttpResponse::Conflict().json(ErrorResponse::new(
                "session_not_pending",
                "Session has already been completed or expired",
            ));
        }
        Ok(CompleteOutcome::NotFound) => {
            return HttpResponse::NotFound()
                .json(ErrorResponse::new("not_found", "Verification session not found"));
        }
        Err(e) => {
            error!("Failed to complete session: {}", e);
            return server_error();
        }
    };

    if let Err(e) =
        record_session_outcome(&state.db, &ctx.api_key_id, status == SessionStatus::Verified).await
    {
        warn!("Failed to record session outcome: {}", e);
    }

    dispatch_webhook(&state, &ctx.api_key_id, &session, signals);

    info!("Session {} completed as {:?}", session.session_id, status);

    HttpResponse::Ok().json(CompleteSessionResponse {
        success: true,
        session_id: session.session_id,
        status: session.status,
        confidence: session.confidence,
    })
}

/// Fire the completion webhook on a detached task so delivery retries never
/// delay the completion response.
fn dispatch_webhook(
    state: &web::Data<AppState>,
    api_key_id: &str,
    session: &verification_session::Model,
    signals: SessionSignals,
) {
    let state = state.clone();
    let api_key_id = api_key_id.to_string();
    let event = WebhookEvent::verification_completed(
        session.session_id.clone(),
        session.status,
        session.confidence,
        signals,
    );

    tokio::spawn(async move {
        let key = match api_key::Entity::find_by_id(&api_key_id).one(&state.db).await {
            Ok(Some(key)) => key,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to load key for webhook dispatch: {}", e);
                return;
            }
        };

        let (url, secret) = match (key.webhook_url, key.webhook_secret) {
            (Some(url), Some(secret)) if !url.is_empty() => (url, secret),
            _ => return,
        };

        let outcome = webhook::deliver(
            &state.webhook_client,
            &url,
            &secret,
            key.webhook_retry_policy,
            &event,
        )
        .await;

        if let Err(e) = record_webhook_outcome(&state.db, &api_key_id, &outcome).await {
            warn!("Failed to record webhook outcome: {}", e);
        }
    });
}

/// Best-effort `{browser, os, device_type}` sniff from a User-Agent string.
fn sniff_device_info(user_agent: &str) -> serde_json::Value {
    let ua = user_agent.to_lowercase();

    let browser = if ua.contains("edg/") {
        "Edge"
    } else if ua.contains("chrome") {
        "Chrome"
    } else if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("safari") {
        "Safari"
    } else {
        "Unknown"
    };

    let os = if ua.contains("windows") {
        "Windows"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") {
        "iOS"
    } else if ua.contains("mac os") {
        "macOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown"
    };

    let device_type = if ua.contains("mobile") || ua.contains("iphone") || ua.contains("android") {
        "mobile"
    } else if ua.contains("ipad") || ua.contains("tablet") {
        "tablet"
    } else {
        "desktop"
    };

    serde_json::json!({
        "browser": browser,
        "os": os,
        "device_type": device_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_desktop_chrome() {
        let info = sniff_device_info(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/126.0 Safari/537.36",
        );
        assert_eq!(info["browser"], "Chrome");
        assert_eq!(info["os"], "Windows");
        assert_eq!(info["device_type"], "desktop");
    }

    #[test]
    fn sniff_mobile_safari() {
        let info = sniff_device_info(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(info["browser"], "Safari");
        assert_eq!(info["os"], "iOS");
        assert_eq!(info["device_type"], "mobile");
    }

    #[test]
    fn default_signals_follow_completion_status() {
        let verified = default_signals(SessionStatus::Verified);
        assert_eq!(verified.liveness, LivenessSignal::Pass);

        let rejected = default_signals(SessionStatus::Rejected);
        assert_eq!(rejected.liveness, LivenessSignal::Fail);
    }
}
