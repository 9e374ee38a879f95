//! Chargemap application binary - composition root.
//!
//! Ties the Chargemap crates into a single executable:
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the SQLite database and run migrations
//! 3. Resolve the token secret
//! 4. Start background maintenance (expired token cleanup)
//! 5. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use chargemap_api::auth::load_or_generate_secret;
use chargemap_api::routes;
use chargemap_api::state::AppState;
use chargemap_api::UserManager;
use chargemap_core::config::ChargemapConfig;
use chargemap_storage::Database;

use cli::CliArgs;

const TOKEN_PURGE_INTERVAL_SECS: u64 = 3600;

/// Periodically drop expired auth tokens.
async fn token_purge_loop(users: Arc<UserManager>) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(TOKEN_PURGE_INTERVAL_SECS));

    loop {
        interval.tick().await;
        if let Err(e) = users.purge_expired_tokens() {
            tracing::warn!(error = %e, "Expired token cleanup failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    if args.init_config {
        if config_file.exists() {
            println!("Config already exists at {}", config_file.display());
        } else {
            ChargemapConfig::default().save(&config_file)?;
            println!("Wrote default config to {}", config_file.display());
        }
        return Ok(());
    }

    // Nothing is logged before the subscriber exists, so config errors abort.
    let config_exists = config_file.exists();
    let mut config = ChargemapConfig::load_or_default(&config_file)
        .map_err(|e| format!("{}: {}", config_file.display(), e))?;
    args.apply_overrides(&mut config)?;

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!(
        slug = %config.general.service_slug,
        "Starting {} v{}",
        config.general.service_name,
        env!("CARGO_PKG_VERSION")
    );
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No config file found, using defaults");
    }

    config.validate()?;

    // Storage.
    let data_dir = config.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = config.database_path();
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Token secret.
    let secret_key = if config.auth.secret_key.is_empty() {
        load_or_generate_secret(&data_dir.join("secret.key"))
    } else {
        config.auth.secret_key.clone()
    };

    let state = AppState::new(config.clone(), db, secret_key);

    // === Background tasks ===

    let users = Arc::clone(&state.users);
    tokio::spawn(async move {
        token_purge_loop(users).await;
    });

    // === API server ===

    if let Err(e) = routes::start_server(&config, state).await {
        tracing::error!(error = %e, "API server failed - is another instance running?");
        return Err(e.into());
    }

    Ok(())
}
