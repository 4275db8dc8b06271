//! Configuration management

use crate::error::{Result, TrendsError};
use crate::types::Config;
use crate::utils::paths::{
    default_cookie_file, default_firestore_credentials, ensure_dir, get_config_path,
    get_runtime_cookie_path, get_targets_dir, same_path,
};
use std::path::Path;
use tokio::fs;
use tokio::process::Command;

pub const COOKIE_FILE_ENV: &str = "YT_COOKIE_FILE";
pub const BROWSER_ENV: &str = "YT_BROWSER";
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Load configuration from file, merging with defaults and the environment
pub async fn load_config(path: Option<&str>) -> Result<Config> {
    let config_path = path.map(str::to_string).unwrap_or_else(get_config_path);

    let config = if Path::new(&config_path).exists() {
        let content = fs::read_to_string(&config_path).await?;
        serde_json::from_str(&content)
            .map_err(|e| TrendsError::InvalidConfig(format!("{}: {}", config_path, e)))?
    } else {
        tracing::debug!(path = %config_path, "no config file, using defaults");
        Config::default()
    };

    let config = apply_env(config, |key| std::env::var(key).ok());
    validate(fill_defaults(config))
}

/// The runtime cookie file is overwritten and deleted every run, so it must never
/// be the operator's own cookie file
pub fn validate(config: Config) -> Result<Config> {
    if same_path(
        Path::new(&config.cookie_file),
        Path::new(&config.runtime_cookie_file),
    ) {
        return Err(TrendsError::InvalidConfig(format!(
            "runtime_cookie_file must differ from cookie_file ({})",
            config.cookie_file
        )));
    }
    Ok(config)
}

/// Environment variables win over the config file
pub fn apply_env(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(path) = get(COOKIE_FILE_ENV) {
        config.cookie_file = path;
    }
    if let Some(browser) = get(BROWSER_ENV) {
        // "none" disables browser extraction
        config.browser = (!browser.eq_ignore_ascii_case("none")).then_some(browser);
    }
    if let Some(path) = get(CREDENTIALS_ENV) {
        config.firestore_credentials = path;
    }
    if let Some(key) = get(API_KEY_ENV) {
        config.youtube_api_key = Some(key);
    }
    config
}

/// Resolve empty path settings to their runtime defaults
pub fn fill_defaults(mut config: Config) -> Config {
    if config.cookie_file.is_empty() {
        config.cookie_file = default_cookie_file();
    }
    if config.runtime_cookie_file.is_empty() {
        config.runtime_cookie_file = get_runtime_cookie_path();
    }
    if config.firestore_credentials.is_empty() {
        config.firestore_credentials = default_firestore_credentials();
    }
    if config.targets_dir.is_empty() {
        config.targets_dir = get_targets_dir();
    }
    config
}

/// Save configuration to file
pub async fn save_config(config: &Config, path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        ensure_dir(&parent.to_string_lossy()).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;
    Ok(())
}

/// Open config file in editor
pub async fn edit_config(editor: &str, path: Option<&str>) -> Result<()> {
    let config_path = path.map(str::to_string).unwrap_or_else(get_config_path);

    // Ensure config file exists
    if !Path::new(&config_path).exists() {
        save_config(&Config::default(), &config_path).await?;
    }

    Command::new(editor)
        .arg(&config_path)
        .status()
        .await
        .map_err(|e| TrendsError::Spawn(format!("Failed to start {}: {}", editor, e)))?;

    Ok(())
}
