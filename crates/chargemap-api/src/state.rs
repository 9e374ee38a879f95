//! Application state shared across all route handlers.
//!
//! AppState holds references to all services and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use chargemap_core::config::ChargemapConfig;
use chargemap_storage::{ChargePointRepository, Database};

use crate::users::UserManager;

/// Shared application state.
///
/// All fields use `Arc` (or are cheap clones over one) so handler tasks can
/// clone the state freely.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration. Read-only once the server is up.
    pub config: Arc<ChargemapConfig>,
    /// Charge point records.
    pub charge_points: ChargePointRepository,
    /// Account flows and access-token lookup.
    pub users: Arc<UserManager>,
    /// Secret mixed into every stored token digest.
    pub secret_key: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(config: ChargemapConfig, database: Database, secret_key: String) -> Self {
        let database = Arc::new(database);
        let users = UserManager::new(
            Arc::clone(&database),
            secret_key.clone(),
            config.auth.clone(),
        );
        Self {
            charge_points: ChargePointRepository::new(database),
            users: Arc::new(users),
            config: Arc::new(config),
            secret_key,
            start_time: Instant::now(),
        }
    }
}
