//! CLI argument definitions for the Chargemap server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use chargemap_core::config::ChargemapConfig;
use chargemap_core::error::ChargemapError;

/// Chargemap - a small REST service for locating EV charge points.
#[derive(Parser, Debug, Default)]
#[command(name = "chargemap", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address to bind the API server to.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite database and secret key.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Write a default configuration file (if none exists) and exit.
    #[arg(long = "init-config")]
    pub init_config: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CHARGEMAP_CONFIG env var > ~/.chargemap/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|key| std::env::var(key).ok())
    }

    fn resolve_config_path_with<F>(&self, env: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env("CHARGEMAP_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Layer environment variables and then CLI flags over a loaded config.
    ///
    /// Runs before logging is set up, so bad values are errors, not warnings.
    pub fn apply_overrides(&self, config: &mut ChargemapConfig) -> Result<(), ChargemapError> {
        self.apply_overrides_with(config, |key| std::env::var(key).ok())
    }

    fn apply_overrides_with<F>(
        &self,
        config: &mut ChargemapConfig,
        env: F,
    ) -> Result<(), ChargemapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Environment.
        if let Some(host) = env("CHARGEMAP_HOST") {
            config.general.host = host;
        }
        if let Some(val) = env("CHARGEMAP_PORT") {
            config.general.port = val.parse::<u16>().map_err(|_| {
                ChargemapError::Config(format!("CHARGEMAP_PORT must be a port number, got '{}'", val))
            })?;
        }
        if let Some(dir) = env("CHARGEMAP_DATA_DIR") {
            config.general.data_dir = dir;
        }
        if let Some(level) = env("CHARGEMAP_LOG_LEVEL") {
            config.general.log_level = level;
        }
        if let Some(prefix) = env("CHARGEMAP_API_PREFIX") {
            config.general.api_prefix = prefix;
        }
        if let Some(secret) = env("CHARGEMAP_SECRET_KEY") {
            config.auth.secret_key = secret;
        }

        // Flags.
        if let Some(ref host) = self.host {
            config.general.host = host.clone();
        }
        if let Some(port) = self.port {
            config.general.port = port;
        }
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        Ok(())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".chargemap").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".chargemap").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "chargemap",
            "--config",
            "/tmp/c.toml",
            "--port",
            "9000",
            "--host",
            "0.0.0.0",
            "-l",
            "debug",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(!args.init_config);
    }

    #[test]
    fn test_config_path_priority() {
        let env = env_from(&[("CHARGEMAP_CONFIG", "/etc/chargemap.toml")]);

        let args = CliArgs {
            config: Some(PathBuf::from("/flag.toml")),
            ..Default::default()
        };
        assert_eq!(args.resolve_config_path_with(&env), PathBuf::from("/flag.toml"));

        let args = CliArgs::default();
        assert_eq!(
            args.resolve_config_path_with(&env),
            PathBuf::from("/etc/chargemap.toml")
        );
    }

    #[test]
    fn test_env_overrides_config() {
        let mut config = ChargemapConfig::default();
        let env = env_from(&[
            ("CHARGEMAP_PORT", "9100"),
            ("CHARGEMAP_HOST", "0.0.0.0"),
            ("CHARGEMAP_SECRET_KEY", "s3cret"),
            ("CHARGEMAP_API_PREFIX", "/v2"),
        ]);
        CliArgs::default()
            .apply_overrides_with(&mut config, env)
            .unwrap();

        assert_eq!(config.general.port, 9100);
        assert_eq!(config.general.host, "0.0.0.0");
        assert_eq!(config.general.api_prefix, "/v2");
        assert_eq!(config.auth.secret_key, "s3cret");
    }

    #[test]
    fn test_flags_override_env() {
        let mut config = ChargemapConfig::default();
        let env = env_from(&[("CHARGEMAP_PORT", "9100"), ("CHARGEMAP_LOG_LEVEL", "warn")]);
        let args = CliArgs {
            port: Some(9200),
            log_level: Some("trace".to_string()),
            data_dir: Some(PathBuf::from("/var/lib/chargemap")),
            ..Default::default()
        };
        args.apply_overrides_with(&mut config, env).unwrap();

        assert_eq!(config.general.port, 9200);
        assert_eq!(config.general.log_level, "trace");
        assert_eq!(config.general.data_dir, "/var/lib/chargemap");
    }

    #[test]
    fn test_invalid_env_port_is_an_error() {
        let mut config = ChargemapConfig::default();
        let err = CliArgs::default()
            .apply_overrides_with(&mut config, env_from(&[("CHARGEMAP_PORT", "x")]))
            .unwrap_err();
        assert!(matches!(err, ChargemapError::Config(_)));
    }

    #[test]
    fn test_port_flag_still_requires_valid_env() {
        let mut config = ChargemapConfig::default();
        let args = CliArgs {
            port: Some(9300),
            ..Default::default()
        };
        assert!(args
            .apply_overrides_with(&mut config, env_from(&[("CHARGEMAP_PORT", "70000")]))
            .is_err());
    }
}
