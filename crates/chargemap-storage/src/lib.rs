//! Chargemap storage crate - SQLite persistence for charge points and users.
//!
//! Provides a WAL-mode SQLite database with versioned migrations and
//! repositories for charge points, user accounts and hashed auth tokens.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod users;

pub use db::Database;
pub use repository::ChargePointRepository;
pub use users::{TokenRepository, UserRepository};
