//! API authentication via bearer tokens.
//!
//! Provides token generation, password hashing, the credentials extractor
//! used by login, and middleware for validating `Authorization: Bearer
//! <token>` headers on protected endpoints.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::extract::{Form, FromRequest, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use chargemap_core::config::AuthConfig;
use chargemap_core::error::ChargemapError;
use chargemap_core::types::User;

use crate::error::ApiError;
use crate::state::AppState;

/// Generate a random 64-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Digest stored in place of a raw token.
pub fn token_digest(secret: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password with Argon2id, returning a PHC string
/// (`$argon2id$v=19$m=...,t=...,p=1$<salt>$<hash>`).
pub fn hash_password(password: &str, config: &AuthConfig) -> Result<String, ChargemapError> {
    let params = Params::new(
        config.password_hash_memory_kib,
        config.password_hash_iterations,
        1,
        None,
    )
    .map_err(|e| ChargemapError::Config(format!("Invalid password hash parameters: {}", e)))?;

    let mut rng = rand::rng();
    let salt_bytes: [u8; 16] = rng.random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ChargemapError::Api(format!("Salt encoding failed: {}", e)))?;

    let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ChargemapError::Api(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a PHC hash. The cost parameters are read from
/// the hash itself. Malformed hashes never match.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(encoded) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Load the token secret from file, or generate and save a new one.
pub fn load_or_generate_secret(secret_path: &std::path::Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(secret_path) {
        let secret = contents.trim().to_string();
        if !secret.is_empty() {
            tracing::info!("Secret key loaded from {}", secret_path.display());
            return secret;
        }
    }

    let secret = generate_token();

    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(secret_path, &secret) {
        tracing::warn!(
            error = %e,
            "Failed to save secret key to {}; tokens will not survive a restart",
            secret_path.display()
        );
    } else {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(secret_path, std::fs::Permissions::from_mode(0o600));
        }
        tracing::info!("Secret key saved to {}", secret_path.display());
    }

    secret
}

/// The authenticated, active user behind the current request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Digest of the bearer token used for the current request.
#[derive(Clone, Debug)]
pub struct AccessTokenDigest(pub String);

/// Middleware that validates Bearer token authentication.
///
/// The token must exist, be unexpired and belong to an active user. On
/// success [`CurrentUser`] and [`AccessTokenDigest`] are added to the request
/// extensions. Returns 401 otherwise.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Ok(token) => token,
        Err(err) => return err.into_response(),
    };

    let digest = token_digest(&state.secret_key, &token);
    let user = match state.users.user_for_access_token(&digest, Utc::now()) {
        Ok(Some(user)) if user.is_active => user,
        Ok(_) => {
            return ApiError::Unauthorized("Invalid or expired bearer token".to_string())
                .into_response()
        }
        Err(err) => return ApiError::from(err).into_response(),
    };

    tracing::debug!(user_id = %user.id, "Request authenticated");
    req.extensions_mut().insert(CurrentUser(user));
    req.extensions_mut().insert(AccessTokenDigest(digest));
    next.run(req).await
}

fn bearer_token(req: &Request) -> Result<String, ApiError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header encoding".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim().to_string())
        }
        _ => Err(ApiError::Unauthorized("Invalid bearer token".to_string())),
    }
}

/// Login credentials, accepted as JSON or as an urlencoded form.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// The account email.
    pub username: String,
    pub password: String,
}

impl<S> FromRequest<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            let Json(credentials) = Json::<Credentials>::from_request(req, state).await?;
            Ok(credentials)
        } else {
            let Form(credentials) = Form::<Credentials>::from_request(req, state)
                .await
                .map_err(|e| ApiError::UnprocessableEntity(e.body_text()))?;
            Ok(credentials)
        }
    }
}
