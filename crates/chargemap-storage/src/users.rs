//! User accounts and auth tokens.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use chargemap_core::error::ChargemapError;
use chargemap_core::types::{TokenPurpose, User};

use crate::db::{sql_err, Database};

const USER_COLUMNS: &str =
    "SELECT id, email, hashed_password, is_active, is_superuser, is_verified, created_at FROM users";

/// Repository for user accounts.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a user. A duplicate email (case-insensitive) is a `Conflict`.
    pub fn create(&self, user: &User) -> Result<(), ChargemapError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, hashed_password, is_active, is_superuser, is_verified, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.hashed_password,
                    user.is_active,
                    user.is_superuser,
                    user.is_verified,
                    user.created_at.timestamp(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    ChargemapError::Conflict(format!("User {} already exists", user.email))
                }
                other => ChargemapError::Storage(format!("Failed to save user: {}", other)),
            })?;
            Ok(())
        })
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ChargemapError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", USER_COLUMNS),
                rusqlite::params![id.to_string()],
                row_to_user,
            )
            .optional()
            .map_err(sql_err)
        })
    }

    /// Lookup ignores case; the column is `COLLATE NOCASE`.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, ChargemapError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE email = ?1", USER_COLUMNS),
                rusqlite::params![email],
                row_to_user,
            )
            .optional()
            .map_err(sql_err)
        })
    }

    pub fn set_password(&self, id: Uuid, hashed_password: &str) -> Result<(), ChargemapError> {
        self.update_one(
            "UPDATE users SET hashed_password = ?2 WHERE id = ?1",
            rusqlite::params![id.to_string(), hashed_password],
            id,
        )
    }

    pub fn mark_verified(&self, id: Uuid) -> Result<(), ChargemapError> {
        self.update_one(
            "UPDATE users SET is_verified = 1 WHERE id = ?1",
            rusqlite::params![id.to_string()],
            id,
        )
    }

    pub fn set_active(&self, id: Uuid, active: bool) -> Result<(), ChargemapError> {
        self.update_one(
            "UPDATE users SET is_active = ?2 WHERE id = ?1",
            rusqlite::params![id.to_string(), active],
            id,
        )
    }

    fn update_one(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        id: Uuid,
    ) -> Result<(), ChargemapError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(sql, params).map_err(sql_err)?;
            if changed == 0 {
                return Err(ChargemapError::NotFound(format!("User<id:{}>", id)));
            }
            Ok(())
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: i64 = row.get(6)?;

    Ok(User {
        id,
        email: row.get(1)?,
        hashed_password: row.get(2)?,
        is_active: row.get(3)?,
        is_superuser: row.get(4)?,
        is_verified: row.get(5)?,
        created_at: from_unix(created_at),
    })
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Repository for hashed auth tokens (access, reset, verify).
///
/// Callers pass token digests, never raw tokens.
#[derive(Clone)]
pub struct TokenRepository {
    db: Arc<Database>,
}

impl TokenRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn insert(
        &self,
        digest: &str,
        user_id: Uuid,
        purpose: TokenPurpose,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ChargemapError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO auth_tokens (digest, user_id, purpose, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    digest,
                    user_id.to_string(),
                    purpose.as_str(),
                    expires_at.timestamp(),
                ],
            )
            .map_err(|e| ChargemapError::Storage(format!("Failed to save token: {}", e)))?;
            Ok(())
        })
    }

    /// Owner of an unexpired token with the given purpose.
    pub fn find_user(
        &self,
        digest: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, ChargemapError> {
        self.db.with_conn(|conn| {
            let user_id: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM auth_tokens
                     WHERE digest = ?1 AND purpose = ?2 AND expires_at > ?3",
                    rusqlite::params![digest, purpose.as_str(), now.timestamp()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err)?;

            user_id
                .map(|s| {
                    Uuid::parse_str(&s)
                        .map_err(|e| ChargemapError::Storage(format!("Invalid UUID: {}", e)))
                })
                .transpose()
        })
    }

    /// Remove a token. Returns whether a row was deleted.
    pub fn delete(&self, digest: &str) -> Result<bool, ChargemapError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM auth_tokens WHERE digest = ?1",
                    rusqlite::params![digest],
                )
                .map_err(sql_err)?;
            Ok(changed > 0)
        })
    }

    /// Revoke every token of one purpose for a user.
    pub fn delete_for_user(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, ChargemapError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM auth_tokens WHERE user_id = ?1 AND purpose = ?2",
                    rusqlite::params![user_id.to_string(), purpose.as_str()],
                )
                .map_err(sql_err)?;
            Ok(changed as u64)
        })
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ChargemapError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM auth_tokens WHERE expires_at <= ?1",
                    rusqlite::params![now.timestamp()],
                )
                .map_err(sql_err)?;
            Ok(changed as u64)
        })
    }
}
