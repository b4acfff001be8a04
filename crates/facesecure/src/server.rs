use std::sync::Arc;

use crate::models::ErrorResponse;
use crate::{app_state::AppState, config::ServeConfig, crypto, handlers, recognizer};
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use migration::MigratorTrait;
use sea_orm::Database;

/// JSON extractor configuration. Bodies that fail to parse (missing required
/// fields included) come back as the standard error shape instead of actix's
/// plain-text default.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest()
            .json(ErrorResponse::new("invalid_request", err.to_string()));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

pub async fn run_server(config: ServeConfig) -> anyhow::Result<()> {
    log::info!("Starting FaceSecure Verification API Server...");

    // 1. Generate ES256 (ECDSA P-256) keypair for session tokens
    log::info!("Generating ECDSA P-256 keypair...");
    let (encoding_key, decoding_key, jwks_json) = crypto::generate_ecdsa_keypair(&config.jwt_kid)?;
    log::info!("JWKS generated successfully");

    // 2. Connect to database
    log::info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;
    log::info!("Database migrations completed");

    // 3. Recognition provider client
    log::info!("Recognition provider at {}", config.ml_service_url);
    let recognizer = recognizer::RecognitionClient::new(&config.ml_service_url)?;

    // 4. Create AppState
    let app_state = web::Data::new(AppState {
        db,
        encoding_key,
        decoding_key,
        jwks_json,
        jwt_kid: config.jwt_kid.clone(),
        jwt_expiration: config.jwt_expiration,
        base_url: config.base_url.clone(),
        policy: config.decision_policy(),
        template_key: facesecure_core::template::derive_template_key(&config.encryption_key),
        recognizer: Arc::new(recognizer),
        webhook_client: reqwest::Client::new(),
    });

    // 5. Start HTTP server
    let bind_address = config.bind_address.clone();
    let cors_origins = config.cors_origin_list();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        // Configure CORS
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        // Add all configured origins
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        // Dashboard-facing routes (session-token auth)
        let api_routes = web::scope("/api")
            .route("/auth/register", web::post().to(handlers::auth::register))
            .route("/auth/login", web::post().to(handlers::auth::login))
            .route("/auth/verify-face", web::post().to(handlers::auth::verify_face))
            .route("/keys", web::post().to(handlers::api_keys::create_key))
            .route("/keys", web::get().to(handlers::api_keys::list_keys))
            .route("/keys/{id}", web::put().to(handlers::api_keys::update_key))
            .route("/keys/{id}/rotate", web::post().to(handlers::api_keys::rotate_key))
            .route("/keys/{id}/toggle", web::post().to(handlers::api_keys::toggle_key))
            .route("/keys/{id}/usage", web::get().to(handlers::api_keys::key_usage));

        // Integrator-facing routes (access-key auth)
        let v1_routes = web::scope("/v1/verification")
            .route("/session", web::post().to(handlers::sessions::create))
            .route("/session/{id}", web::get().to(handlers::sessions::get))
            .route(
                "/session/{id}/complete",
                web::post().to(handlers::sessions::complete),
            );

        let jwks_route =
            web::scope("/.well-known").route("/jwks.json", web::get().to(handlers::auth::jwks));

        App::new()
            .app_data(app_state.clone())
            .app_data(json_config())
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .service(api_routes)
            .service(v1_routes)
            .service(jwks_route)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
