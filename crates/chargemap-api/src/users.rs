//! Account lifecycle: registration, login, logout, password reset and
//! email verification.
//!
//! Reset and verification tokens are not mailed anywhere; they are written to
//! the log, where an operator (or a mail relay tailing the log) picks them up.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use chargemap_core::config::AuthConfig;
use chargemap_core::error::ChargemapError;
use chargemap_core::types::{TokenPurpose, User, UserRead};
use chargemap_storage::{Database, TokenRepository, UserRepository};

use crate::auth::{generate_token, hash_password, token_digest, verify_password};
use crate::error::ApiError;

/// Upper bound on any token lifetime (ten years).
const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

/// Failures of the account flows. Each maps to a stable error code.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("A user with this email already exists")]
    AlreadyExists,

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Bad credentials or inactive user")]
    BadCredentials,

    #[error("Reset token is invalid or expired")]
    ResetBadToken,

    #[error("Invalid password: {0}")]
    ResetInvalidPassword(String),

    #[error("Verification token is invalid or expired")]
    VerifyBadToken,

    #[error("User is already verified")]
    AlreadyVerified,

    #[error(transparent)]
    Storage(#[from] ChargemapError),
}

impl UserError {
    pub fn code(&self) -> &'static str {
        match self {
            UserError::AlreadyExists => "REGISTER_USER_ALREADY_EXISTS",
            UserError::InvalidPassword(_) => "REGISTER_INVALID_PASSWORD",
            UserError::InvalidEmail(_) => "INVALID_EMAIL",
            UserError::BadCredentials => "LOGIN_BAD_CREDENTIALS",
            UserError::ResetBadToken => "RESET_PASSWORD_BAD_TOKEN",
            UserError::ResetInvalidPassword(_) => "RESET_PASSWORD_INVALID_PASSWORD",
            UserError::VerifyBadToken => "VERIFY_USER_BAD_TOKEN",
            UserError::AlreadyVerified => "VERIFY_USER_ALREADY_VERIFIED",
            UserError::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidEmail(msg) => ApiError::UnprocessableEntity(msg),
            UserError::Storage(inner) => ApiError::from(inner),
            other => ApiError::BadRequest {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

/// Drives account flows on top of the user and token repositories.
pub struct UserManager {
    users: UserRepository,
    tokens: TokenRepository,
    secret_key: String,
    config: AuthConfig,
}

impl UserManager {
    pub fn new(database: Arc<Database>, secret_key: String, config: AuthConfig) -> Self {
        Self {
            users: UserRepository::new(Arc::clone(&database)),
            tokens: TokenRepository::new(database),
            secret_key,
            config,
        }
    }

    /// Create an active, unverified, non-superuser account and issue a
    /// verification token.
    pub fn register(&self, email: &str, password: &str) -> Result<UserRead, UserError> {
        let email = normalize_email(email)?;
        self.validate_password(password, &email)
            .map_err(UserError::InvalidPassword)?;

        if self.users.find_by_email(&email)?.is_some() {
            return Err(UserError::AlreadyExists);
        }

        let user = User {
            id: Uuid::new_v4(),
            email,
            hashed_password: hash_password(password, &self.config)?,
            is_active: true,
            is_superuser: false,
            is_verified: false,
            created_at: Utc::now(),
        };

        match self.users.create(&user) {
            Ok(()) => {}
            // Lost a race with a concurrent registration of the same email.
            Err(ChargemapError::Conflict(_)) => return Err(UserError::AlreadyExists),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, "User has registered");
        self.issue_verify_token(&user)?;
        Ok(UserRead::from(&user))
    }

    /// Check credentials and return a fresh access token.
    pub fn login(&self, username: &str, password: &str) -> Result<String, UserError> {
        let user = match self.users.find_by_email(&canonical_email(username))? {
            Some(user) => user,
            None => {
                // Spend the same hashing effort as a real check.
                let _ = hash_password(password, &self.config);
                return Err(UserError::BadCredentials);
            }
        };

        if !verify_password(password, &user.hashed_password) || !user.is_active {
            return Err(UserError::BadCredentials);
        }

        let token = self.issue_token(
            user.id,
            TokenPurpose::Access,
            self.config.access_token_expire_seconds,
        )?;
        info!(user_id = %user.id, "User logged in");
        Ok(token)
    }

    /// Revoke the access token behind `digest`.
    pub fn logout(&self, digest: &str) -> Result<(), UserError> {
        self.tokens.delete(digest)?;
        Ok(())
    }

    /// Resolve an access-token digest to its user.
    pub fn user_for_access_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, ChargemapError> {
        match self.tokens.find_user(digest, TokenPurpose::Access, now)? {
            Some(user_id) => self.users.find_by_id(user_id),
            None => Ok(None),
        }
    }

    /// Issue a reset token for an existing active user.
    ///
    /// Unknown emails are silently ignored so the endpoint does not reveal
    /// which addresses are registered. Returns the token when one was issued.
    pub fn forgot_password(&self, email: &str) -> Result<Option<String>, UserError> {
        let Some(user) = self.users.find_by_email(&canonical_email(email))? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let token = self.issue_token(
            user.id,
            TokenPurpose::ResetPassword,
            self.config.reset_password_token_expire_seconds,
        )?;
        info!(user_id = %user.id, reset_token = %token, "User has forgot their password");
        Ok(Some(token))
    }

    /// Consume a reset token and set a new password. Every access token of
    /// the user is revoked.
    pub fn reset_password(&self, token: &str, password: &str) -> Result<UserRead, UserError> {
        let digest = token_digest(&self.secret_key, token);
        let user = self
            .tokens
            .find_user(&digest, TokenPurpose::ResetPassword, Utc::now())?
            .map(|id| self.users.find_by_id(id))
            .transpose()?
            .flatten()
            .filter(|u| u.is_active)
            .ok_or(UserError::ResetBadToken)?;

        self.validate_password(password, &user.email)
            .map_err(UserError::ResetInvalidPassword)?;

        self.users.set_password(
            user.id,
            &hash_password(password, &self.config)?,
        )?;
        self.tokens.delete(&digest)?;
        let revoked = self.tokens.delete_for_user(user.id, TokenPurpose::Access)?;

        info!(user_id = %user.id, revoked_sessions = revoked, "User has reset their password");
        Ok(UserRead::from(&user))
    }

    /// Issue a verification token for an active, unverified user. Returns
    /// the token when one was issued.
    pub fn request_verify(&self, email: &str) -> Result<Option<String>, UserError> {
        let Some(user) = self.users.find_by_email(&canonical_email(email))? else {
            return Ok(None);
        };
        if !user.is_active || user.is_verified {
            return Ok(None);
        }
        self.issue_verify_token(&user).map(Some)
    }

    /// Consume a verification token and mark its user verified.
    pub fn verify(&self, token: &str) -> Result<UserRead, UserError> {
        let digest = token_digest(&self.secret_key, token);
        let mut user = self
            .tokens
            .find_user(&digest, TokenPurpose::Verify, Utc::now())?
            .map(|id| self.users.find_by_id(id))
            .transpose()?
            .flatten()
            .ok_or(UserError::VerifyBadToken)?;

        if user.is_verified {
            return Err(UserError::AlreadyVerified);
        }

        self.users.mark_verified(user.id)?;
        self.tokens.delete(&digest)?;
        user.is_verified = true;

        info!(user_id = %user.id, "User has been verified");
        Ok(UserRead::from(&user))
    }

    /// Drop tokens that are past their expiry.
    pub fn purge_expired_tokens(&self) -> Result<u64, ChargemapError> {
        let purged = self.tokens.purge_expired(Utc::now())?;
        if purged > 0 {
            info!(purged, "Expired auth tokens removed");
        }
        Ok(purged)
    }

    fn issue_verify_token(&self, user: &User) -> Result<String, UserError> {
        let token = self.issue_token(
            user.id,
            TokenPurpose::Verify,
            self.config.verification_token_expire_seconds,
        )?;
        info!(user_id = %user.id, verification_token = %token, "Verification requested for user");
        Ok(token)
    }

    fn issue_token(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
        lifetime_secs: u64,
    ) -> Result<String, ChargemapError> {
        let token = generate_token();
        let lifetime = Duration::seconds(lifetime_secs.min(MAX_TOKEN_LIFETIME_SECS) as i64);
        let expires_at = Utc::now() + lifetime;
        self.tokens.insert(
            &token_digest(&self.secret_key, &token),
            user_id,
            purpose,
            expires_at,
        )?;
        Ok(token)
    }

    fn validate_password(&self, password: &str, email: &str) -> Result<(), String> {
        if password.chars().count() < self.config.password_min_length {
            return Err(format!(
                "Password should be at least {} characters",
                self.config.password_min_length
            ));
        }
        if password.to_lowercase().contains(&email.to_lowercase()) {
            warn!("Rejected password containing the account email");
            return Err("Password should not contain e-mail".to_string());
        }
        Ok(())
    }
}

/// Stored form of an email: trimmed and lowercased (full Unicode).
fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonicalize an email, rejecting obviously malformed addresses.
fn normalize_email(email: &str) -> Result<String, UserError> {
    let email = canonical_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(UserError::InvalidEmail(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(email)
}
