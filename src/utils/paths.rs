//! Path utilities for yt-trends
//!
//! Respects XDG Base Directory Specification

use crate::error::Result;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

const APP_NAME: &str = "yt-trends";

/// Default cookie file, relative to the project root
pub const COOKIE_FILE_NAME: &str = "youtube_cookies.txt";
/// Default service-account key, relative to the project root
pub const FIRESTORE_KEY_NAME: &str = "firestore-access.json";

fn xdg_base(var: &str, fallback: Option<PathBuf>, home_suffix: &str) -> String {
    env::var(var).unwrap_or_else(|_| {
        fallback
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}/{}", env::var("HOME").unwrap_or_default(), home_suffix))
    })
}

/// Get config directory path
/// Respects XDG_CONFIG_HOME, defaults to ~/.config/yt-trends
pub fn get_config_dir() -> String {
    format!("{}/{}", xdg_base("XDG_CONFIG_HOME", dirs::config_dir(), ".config"), APP_NAME)
}

/// Get cache directory path
/// Respects XDG_CACHE_HOME, defaults to ~/.cache/yt-trends
pub fn get_cache_dir() -> String {
    format!("{}/{}", xdg_base("XDG_CACHE_HOME", dirs::cache_dir(), ".cache"), APP_NAME)
}

/// Get state directory path
/// Respects XDG_STATE_HOME, defaults to ~/.local/state/yt-trends
pub fn get_state_dir() -> String {
    format!("{}/{}", xdg_base("XDG_STATE_HOME", dirs::state_dir(), ".local/state"), APP_NAME)
}

/// Get config file path
pub fn get_config_path() -> String {
    format!("{}/config.json", get_config_dir())
}

/// Directory of scrape target files
pub fn get_targets_dir() -> String {
    format!("{}/targets", get_config_dir())
}

/// Where the per-run cookie file for yt-dlp is written
pub fn get_runtime_cookie_path() -> String {
    format!("{}/session_cookies.txt", get_state_dir())
}

/// The directory the tool is run from
pub fn project_root() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn default_cookie_file() -> String {
    project_root().join(COOKIE_FILE_NAME).to_string_lossy().to_string()
}

pub fn default_firestore_credentials() -> String {
    project_root().join(FIRESTORE_KEY_NAME).to_string_lossy().to_string()
}

/// Resolve symlinks and `..` so two spellings of one file compare equal.
/// The file itself need not exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root().join(path)
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

pub fn same_path(a: &Path, b: &Path) -> bool {
    normalize_path(a) == normalize_path(b)
}

/// Ensure a directory exists
pub async fn ensure_dir(path: &str) -> Result<()> {
    fs::create_dir_all(path).await?;
    Ok(())
}

/// Ensure all required app directories exist
pub async fn ensure_app_dirs() -> Result<()> {
    ensure_dir(&get_config_dir()).await?;
    ensure_dir(&get_cache_dir()).await?;
    ensure_dir(&get_state_dir()).await?;
    Ok(())
}
