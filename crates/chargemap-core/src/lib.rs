pub mod config;
pub mod error;
pub mod geo;
pub mod types;

pub use config::ChargemapConfig;
pub use error::{ChargemapError, Result};
pub use types::*;
