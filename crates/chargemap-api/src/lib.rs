//! Chargemap API crate - axum HTTP server, route handlers, token auth.
//!
//! Provides the REST API for charge points (list, nearest, CRUD) and the
//! account flows (register, login, logout, password reset, verification).

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod users;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
pub use users::UserManager;
