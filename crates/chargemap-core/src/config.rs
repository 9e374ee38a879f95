use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ChargemapError, Result};

/// Top-level configuration for the Chargemap service.
///
/// Loaded from `~/.chargemap/config.toml` by default. Every section falls back
/// to its defaults, so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargemapConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl ChargemapConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ChargemapConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults only
    /// when the file does not exist. A file that exists but cannot be read or
    /// parsed is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.general.api_prefix.is_empty() && !self.general.api_prefix.starts_with('/') {
            return Err(ChargemapError::Config(format!(
                "api_prefix must start with '/', got '{}'",
                self.general.api_prefix
            )));
        }
        if self.general.api_prefix.ends_with('/') {
            return Err(ChargemapError::Config(
                "api_prefix must not end with '/'".to_string(),
            ));
        }
        if self.auth.access_token_expire_seconds == 0 {
            return Err(ChargemapError::Config(
                "access_token_expire_seconds must be positive".to_string(),
            ));
        }
        if self.auth.password_hash_iterations == 0 {
            return Err(ChargemapError::Config(
                "password_hash_iterations must be positive".to_string(),
            ));
        }
        if self.auth.password_hash_memory_kib < 8 {
            return Err(ChargemapError::Config(
                "password_hash_memory_kib must be at least 8".to_string(),
            ));
        }
        if self.api.max_page_limit == 0 {
            return Err(ChargemapError::Config(
                "max_page_limit must be positive".to_string(),
            ));
        }
        if self.api.default_page_limit == 0 || self.api.default_page_limit > self.api.max_page_limit
        {
            return Err(ChargemapError::Config(format!(
                "default_page_limit must be between 1 and {}",
                self.api.max_page_limit
            )));
        }
        Ok(())
    }

    /// Absolute data directory with a leading `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Full path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(&self.database.file_name)
    }
}

/// Expand `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Human-readable service name, reported in logs.
    pub service_name: String,
    /// Short machine-friendly identifier, reported in the startup log.
    pub service_slug: String,
    /// Data directory for the SQLite database and the generated secret.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Bind address for the HTTP server.
    pub host: String,
    /// HTTP port.
    pub port: u16,
    /// Prefix for versioned API routes.
    pub api_prefix: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            service_name: "Chargemap".to_string(),
            service_slug: "chargemap".to_string(),
            data_dir: "~/.chargemap/data".to_string(),
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            api_prefix: "/api/v1".to_string(),
        }
    }
}

/// SQLite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file name inside the data directory.
    pub file_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file_name: "chargemap.db".to_string(),
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret mixed into stored token digests. Empty means "use the
    /// `secret.key` file in the data directory, generating it if needed".
    pub secret_key: String,
    /// Lifetime of login tokens.
    pub access_token_expire_seconds: u64,
    /// Lifetime of password reset tokens.
    pub reset_password_token_expire_seconds: u64,
    /// Lifetime of email verification tokens.
    pub verification_token_expire_seconds: u64,
    /// Minimum accepted password length, in characters.
    pub password_min_length: usize,
    /// Argon2id passes over memory (time cost).
    pub password_hash_iterations: u32,
    /// Argon2id memory cost in KiB.
    pub password_hash_memory_kib: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            access_token_expire_seconds: 3600,
            reset_password_token_expire_seconds: 3600,
            verification_token_expire_seconds: 3600,
            password_min_length: 8,
            password_hash_iterations: 2,
            password_hash_memory_kib: 19_456,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Page size used when `limit` is omitted.
    pub default_page_limit: u32,
    /// Largest accepted `limit`.
    pub max_page_limit: u32,
    /// Request body size cap.
    pub max_body_bytes: usize,
    /// Origins allowed by CORS. Empty allows none.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_page_limit: 100,
            max_page_limit: 100,
            max_body_bytes: 64 * 1024,
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ChargemapConfig::default();
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.general.api_prefix, "/api/v1");
        assert_eq!(config.database.file_name, "chargemap.db");
        assert_eq!(config.auth.access_token_expire_seconds, 3600);
        assert_eq!(config.api.max_page_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
service_name = "Ampcontrol"
service_slug = "ampcontrol"
port = 9000
api_prefix = "/api/v2"

[auth]
secret_key = "s3cret"
access_token_expire_seconds = 60
"#;
        let file = create_temp_config(content);
        let config = ChargemapConfig::load(file.path()).unwrap();
        assert_eq!(config.general.service_slug, "ampcontrol");
        assert_eq!(config.general.port, 9000);
        assert_eq!(config.general.api_prefix, "/api/v2");
        assert_eq!(config.auth.secret_key, "s3cret");
        assert_eq!(config.auth.access_token_expire_seconds, 60);
        // Untouched fields keep defaults.
        assert_eq!(config.auth.password_min_length, 8);
        assert_eq!(config.database.file_name, "chargemap.db");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ChargemapConfig::load(file.path()).unwrap();
        assert_eq!(config.general.host, "127.0.0.1");
        assert_eq!(config.api.default_page_limit, 100);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[general\nport = ");
        let err = ChargemapConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ChargemapError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            ChargemapConfig::load_or_default(Path::new("/nonexistent/chargemap.toml")).unwrap();
        assert_eq!(config.general.port, 8000);
    }

    #[test]
    fn test_load_or_default_reports_broken_file() {
        let file = create_temp_config("[general\nport = ");
        let err = ChargemapConfig::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, ChargemapError::Config(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ChargemapConfig::default();
        config.general.port = 4242;
        config.api.cors_origins = vec!["http://localhost:3000".to_string()];
        config.save(&path).unwrap();

        let loaded = ChargemapConfig::load(&path).unwrap();
        assert_eq!(loaded.general.port, 4242);
        assert_eq!(loaded.api.cors_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let mut config = ChargemapConfig::default();
        config.general.api_prefix = "api".to_string();
        assert!(config.validate().is_err());

        config.general.api_prefix = "/api/".to_string();
        assert!(config.validate().is_err());

        config.general.api_prefix = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_page_limits() {
        let mut config = ChargemapConfig::default();
        config.api.default_page_limit = 500;
        assert!(config.validate().is_err());

        let mut config = ChargemapConfig::default();
        config.api.max_page_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_hash_cost() {
        let mut config = ChargemapConfig::default();
        config.auth.password_hash_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = ChargemapConfig::default();
        config.auth.password_hash_memory_kib = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_joins_data_dir() {
        let mut config = ChargemapConfig::default();
        config.general.data_dir = "/srv/chargemap".to_string();
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/chargemap/chargemap.db")
        );
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/lib/x"), PathBuf::from("/var/lib/x"));
        assert!(!expand_home("~/data").to_string_lossy().starts_with('~'));
    }
}
