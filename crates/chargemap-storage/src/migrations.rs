//! Database schema migrations.
//!
//! v1 creates the charge point table, v2 the user and token tables.

use rusqlite::Connection;
use tracing::info;

use chargemap_core::error::ChargemapError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ChargemapError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ChargemapError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            ChargemapError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: charge_points");
    }

    if current_version < 2 {
        apply_v2(conn)?;
        info!("Applied migration v2: users_and_tokens");
    }

    Ok(())
}

/// Version 1: charge points.
fn apply_v1(conn: &Connection) -> Result<(), ChargemapError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS charge_points (
            id          TEXT PRIMARY KEY NOT NULL,
            latitude    REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
            longitude   REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
            location    TEXT NOT NULL,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'charge_points');
        ",
    )
    .map_err(|e| ChargemapError::Storage(format!("Migration v1 failed: {}", e)))
}

/// Version 2: users and auth tokens.
fn apply_v2(conn: &Connection) -> Result<(), ChargemapError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY NOT NULL,
            email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
            hashed_password TEXT NOT NULL,
            is_active       INTEGER NOT NULL DEFAULT 1,
            is_superuser    INTEGER NOT NULL DEFAULT 0,
            is_verified     INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Only digests are stored; the raw token is handed to the client once.
        CREATE TABLE IF NOT EXISTS auth_tokens (
            digest      TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT NOT NULL,
            purpose     TEXT NOT NULL
                        CHECK (purpose IN ('access', 'reset_password', 'verify')),
            expires_at  INTEGER NOT NULL,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_auth_tokens_user
            ON auth_tokens (user_id, purpose);

        CREATE INDEX IF NOT EXISTS idx_auth_tokens_expiry
            ON auth_tokens (expires_at);

        INSERT INTO schema_migrations (version, name) VALUES (2, 'users_and_tokens');
        ",
    )
    .map_err(|e| ChargemapError::Storage(format!("Migration v2 failed: {}", e)))
}
