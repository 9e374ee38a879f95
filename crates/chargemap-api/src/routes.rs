//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use chargemap_core::config::ChargemapConfig;
use chargemap_core::error::ChargemapError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
///
/// # Arguments
/// * `state` - The shared application state.
///
/// # Returns
/// A fully configured axum Router ready to serve requests.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Routes that do NOT require authentication.
    let public_routes = Router::new()
        .route("/charge_points", get(handlers::list_charge_points))
        .route("/charge_points/", get(handlers::list_charge_points))
        .route("/charge_points/nearest", get(handlers::nearest_charge_point))
        .route("/charge_points/{id}", get(handlers::get_charge_point))
        .route("/auth/register", post(handlers::register))
        .route("/auth/jwt/login", post(handlers::login))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route(
            "/auth/request-verify-token",
            post(handlers::request_verify_token),
        )
        .route("/auth/verify", post(handlers::verify));

    // Same paths, write methods; merged with the public GETs above.
    let protected_routes = Router::new()
        .route("/charge_points", post(handlers::create_charge_point))
        .route("/charge_points/", post(handlers::create_charge_point))
        .route(
            "/charge_points/{id}",
            axum::routing::put(handlers::update_charge_point)
                .delete(handlers::delete_charge_point),
        )
        .route("/auth/jwt/logout", post(handlers::logout))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    let api = public_routes.merge(protected_routes);
    let prefix = config.general.api_prefix.as_str();

    let root = Router::new().route("/", get(handlers::root));
    // Nesting at "/" is not allowed, so an empty prefix mounts the API at the root.
    let app = if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(prefix, api)
    };

    app.fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.api.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .with_state(state)
}

/// CORS for the configured origins. Unparseable origins are skipped.
fn cors_layer(config: &ChargemapConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Start the HTTP server on the configured address.
pub async fn start_server(config: &ChargemapConfig, state: AppState) -> Result<(), ChargemapError> {
    let addr = format!("{}:{}", config.general.host, config.general.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChargemapError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ChargemapError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
