//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chargemap_core::geo;
use chargemap_core::types::{ChargePoint, ChargePointPatch, NewChargePoint, UserRead};

use crate::auth::{AccessTokenDigest, Credentials, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Raw strings so that empty and non-numeric values get a precise message.
#[derive(Debug, Deserialize)]
pub struct NearestParams {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

// =============================================================================
// Request types
// =============================================================================

/// Registration payload. Privilege flags in the body are ignored.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

// =============================================================================
// Health
// =============================================================================

/// GET / - liveness check.
pub async fn root(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Charge points
// =============================================================================

/// GET /charge_points/ - one page of charge points in insertion order.
pub async fn list_charge_points(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ChargePoint>>, ApiError> {
    let Query(params) = params?;
    let max_limit = i64::from(state.config.api.max_page_limit);

    let skip = params.skip.unwrap_or(0);
    if skip < 0 {
        return Err(ApiError::UnprocessableEntity(
            "Parameter 'skip' must be greater than or equal to 0".to_string(),
        ));
    }

    let limit = params
        .limit
        .unwrap_or_else(|| i64::from(state.config.api.default_page_limit));
    if !(1..=max_limit).contains(&limit) {
        return Err(ApiError::UnprocessableEntity(format!(
            "Parameter 'limit' must be between 1 and {}",
            max_limit
        )));
    }

    let points = state.charge_points.list(skip as u64, limit as u64)?;
    Ok(Json(points))
}

/// GET /charge_points/nearest - the charge point closest to `lat`/`lng`.
pub async fn nearest_charge_point(
    State(state): State<AppState>,
    params: Result<Query<NearestParams>, QueryRejection>,
) -> Result<Json<ChargePoint>, ApiError> {
    let Query(params) = params?;
    let lat = parse_coordinate("lat", params.lat.as_deref())?;
    let lng = parse_coordinate("lng", params.lng.as_deref())?;
    geo::validate_coordinates(lat, lng)?;

    let points = state.charge_points.all()?;
    let nearest = geo::nearest(&points, lat, lng)
        .cloned()
        .ok_or_else(|| ApiError::NotFound("No charge points available".to_string()))?;

    tracing::debug!(lat, lng, id = %nearest.id, "Nearest charge point resolved");
    Ok(Json(nearest))
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<f64, ApiError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(ApiError::UnprocessableEntity(format!(
            "Parameter '{}' is required",
            name
        )));
    }
    raw.parse::<f64>().map_err(|_| {
        ApiError::UnprocessableEntity(format!("Parameter '{}' must be a number", name))
    })
}

/// GET /charge_points/{id}
pub async fn get_charge_point(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ChargePoint>, ApiError> {
    let Path(id) = id?;
    state
        .charge_points
        .find_by_id(id)?
        .map(Json)
        .ok_or_else(|| charge_point_not_found(id))
}

/// POST /charge_points/ - create a charge point.
pub async fn create_charge_point(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<NewChargePoint>, JsonRejection>,
) -> Result<(StatusCode, Json<ChargePoint>), ApiError> {
    let Json(new) = body?;
    new.validate()?;

    let point = state.charge_points.create(&new)?;
    tracing::info!(id = %point.id, user_id = %user.id, "Charge point created");
    Ok((StatusCode::CREATED, Json(point)))
}

/// PUT /charge_points/{id} - partial update.
pub async fn update_charge_point(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ChargePointPatch>, JsonRejection>,
) -> Result<Json<ChargePoint>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = body?;
    patch.validate()?;

    if patch.is_empty() {
        return get_charge_point(State(state), Ok(Path(id))).await;
    }

    let point = state
        .charge_points
        .update(id, &patch)?
        .ok_or_else(|| charge_point_not_found(id))?;
    tracing::info!(id = %id, user_id = %user.id, "Charge point updated");
    Ok(Json(point))
}

/// DELETE /charge_points/{id} - returns the removed record.
pub async fn delete_charge_point(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ChargePoint>, ApiError> {
    let Path(id) = id?;
    let point = state
        .charge_points
        .delete(id)?
        .ok_or_else(|| charge_point_not_found(id))?;
    tracing::info!(id = %id, user_id = %user.id, "Charge point deleted");
    Ok(Json(point))
}

fn charge_point_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Charge point {} not found", id))
}

// =============================================================================
// Auth
// =============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRead>), ApiError> {
    let Json(req) = body?;
    let user = state.users.register(&req.email, &req.password)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/jwt/login - exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    credentials: Credentials,
) -> Result<Json<TokenResponse>, ApiError> {
    let access_token = state
        .users
        .login(&credentials.username, &credentials.password)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// POST /auth/jwt/logout - revoke the token used for this request.
pub async fn logout(
    State(state): State<AppState>,
    Extension(AccessTokenDigest(digest)): Extension<AccessTokenDigest>,
) -> Result<StatusCode, ApiError> {
    state.users.logout(&digest)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/forgot-password - always 202, whether or not the email exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(req) = body?;
    state.users.forgot_password(&req.email)?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::Value::Null)))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.users.reset_password(&req.token, &req.password)?;
    Ok(Json(serde_json::Value::Null))
}

/// POST /auth/request-verify-token - always 202.
pub async fn request_verify_token(
    State(state): State<AppState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(req) = body?;
    state.users.request_verify(&req.email)?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::Value::Null)))
}

/// POST /auth/verify
pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<UserRead>, ApiError> {
    let Json(req) = body?;
    let user = state.users.verify(&req.token)?;
    Ok(Json(user))
}

// =============================================================================
// Fallback
// =============================================================================

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chargemap_core::config::ChargemapConfig;
    use chargemap_storage::Database;
    use tower::ServiceExt;

    fn make_state() -> AppState {
        let mut config = ChargemapConfig::default();
        config.auth.password_hash_iterations = 1;
        config.auth.password_hash_memory_kib = 64;
        AppState::new(config, Database::in_memory().unwrap(), "test-secret".to_string())
    }

    fn make_app() -> axum::Router {
        crate::create_router(make_state())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("lat", Some(" 40.5 ")).unwrap(), 40.5);
        assert!(parse_coordinate("lat", None).is_err());
        assert!(parse_coordinate("lat", Some("")).is_err());
        assert!(parse_coordinate("lat", Some("north")).is_err());
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let resp = make_app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let health: HealthResponse = read_json(resp).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let resp = make_app()
            .oneshot(
                Request::get("/api/v1/charge_points/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let points: Vec<ChargePoint> = read_json(resp).await;
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_nearest_on_empty_table_is_404() {
        let resp = make_app()
            .oneshot(
                Request::get("/api/v1/charge_points/nearest?lat=1&lng=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_auth() {
        let resp = make_app()
            .oneshot(
                Request::post("/api/v1/charge_points/")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"lat":1,"lng":2,"location":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let resp = make_app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: crate::error::ErrorBody = read_json(resp).await;
        assert_eq!(body.error, "not_found");
    }
}
