//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `AMITY_DB_PATH`: Database file path
//! - `AMITY_DB_POOL_SIZE`: Connection pool size
//! - `AMITY_BIND_ADDR`: Server bind address
//! - `AMITY_PUBLIC_URL`: Public base URL (webhook callbacks, redirects)
//! - `AMITY_LOGIN_URL`: Login redirect target
//! - `AMITY_DASHBOARD_URL`: Dashboard redirect target
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`: OAuth client
//! - `AMITY_WEBHOOK_SECRET`: Optional shared webhook secret
//! - `AMITY_POLL_CRON`: Optional cron override for the reconciliation poll

use std::path::{Path, PathBuf};

use amity_domain::{AmityError, Config, Result};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `AmityError::Config` if configuration cannot be loaded from
/// either source.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// All required environment variables must be present. Optional values
/// fall back to the defaults in [`Config::default`].
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("AMITY_DB_PATH")?;
    config.database.pool_size = env_var("AMITY_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| AmityError::Config(format!("Invalid pool size: {e}")))
    })?;

    config.server.bind_addr = env_var("AMITY_BIND_ADDR")?;
    config.server.public_url = env_var("AMITY_PUBLIC_URL")?;
    if let Ok(login_url) = std::env::var("AMITY_LOGIN_URL") {
        config.server.login_url = login_url;
    }
    if let Ok(dashboard_url) = std::env::var("AMITY_DASHBOARD_URL") {
        config.server.dashboard_url = dashboard_url;
    }

    config.google.client_id = env_var("GOOGLE_CLIENT_ID")?;
    config.google.client_secret = env_var("GOOGLE_CLIENT_SECRET")?;

    config.webhook.shared_secret = std::env::var("AMITY_WEBHOOK_SECRET").ok();
    if let Ok(cron) = std::env::var("AMITY_POLL_CRON") {
        config.webhook.poll_cron = cron;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// Format is detected by file extension (`.json` or `.toml`). When `path`
/// is `None`, `./amity.toml` and `./amity.json` are probed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AmityError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AmityError::Config("No config file found in the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AmityError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AmityError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AmityError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AmityError::Config(format!("Unsupported config format: {extension}"))),
    }
}

fn probe_config_paths() -> Option<PathBuf> {
    ["amity.toml", "amity.json", "config.toml", "config.json"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| AmityError::Config(format!("Missing environment variable: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_config_parses() {
        let contents = serde_json::to_string(&Config::default()).expect("serializes");
        let config = parse_config(&contents, Path::new("amity.json")).expect("parses");
        assert_eq!(config.database.pool_size, 8);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = parse_config("{}", Path::new("amity.yaml")).expect_err("rejected");
        assert!(matches!(err, AmityError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/amity.toml")))
            .expect_err("rejected");
        assert!(matches!(err, AmityError::Config(_)));
    }
}
