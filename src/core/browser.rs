//! Cookie extraction from local browser profiles and live WebDriver sessions

use crate::core::webdriver::WebDriverCookie;
use crate::error::LoadError;
use crate::types::{CookieRecord, CookieSet};
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Seconds between 1601-01-01 (Chromium epoch) and 1970-01-01
const WEBKIT_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Firefox,
    Chromium,
}

/// Anything that can hand over YouTube cookies for a named browser
#[async_trait]
pub trait BrowserCookieSource: Send + Sync {
    async fn extract(&self, browser: &str) -> Result<CookieSet, LoadError>;
}

/// Reads cookie databases from profiles under a home directory
#[derive(Debug, Clone)]
pub struct LocalBrowserStore {
    home: Option<PathBuf>,
}

impl LocalBrowserStore {
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
        }
    }

    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }
}

impl Default for LocalBrowserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBrowserStore {
    /// Copy and read the profile's cookie database. Blocking file and SQLite I/O.
    pub fn read_profile(&self, browser: &str) -> Result<CookieSet, LoadError> {
        let unavailable = |reason: &str| LoadError::BrowserUnavailable {
            browser: browser.to_string(),
            reason: reason.to_string(),
        };

        let home = self.home.as_deref().ok_or_else(|| unavailable("no home directory"))?;
        let (family, roots) =
            profile_roots(home, browser).ok_or_else(|| unavailable("unsupported browser"))?;
        let db = find_cookie_db(family, &roots).ok_or_else(|| unavailable("no profile found"))?;

        tracing::debug!(browser, db = %db.display(), "reading browser cookie database");
        let set = read_cookie_db(family, &db)?;
        if set.is_empty() {
            return Err(unavailable("no usable youtube.com cookies in profile"));
        }

        tracing::info!(browser, cookies = set.len(), "extracted browser cookies");
        Ok(set)
    }
}

#[async_trait]
impl BrowserCookieSource for LocalBrowserStore {
    async fn extract(&self, browser: &str) -> Result<CookieSet, LoadError> {
        let store = self.clone();
        let name = browser.to_string();
        tokio::task::spawn_blocking(move || store.read_profile(&name))
            .await
            .map_err(|e| LoadError::BrowserUnavailable {
                browser: browser.to_string(),
                reason: format!("extraction task failed: {}", e),
            })?
    }
}

/// Extract YouTube cookies from the current user's browser profile
pub async fn from_browser(browser: &str) -> Result<CookieSet, LoadError> {
    LocalBrowserStore::new().extract(browser).await
}

/// Convert cookies read out of a WebDriver session
pub fn from_webdriver(cookies: &[WebDriverCookie]) -> CookieSet {
    CookieSet::from_records(cookies.iter().filter_map(|c| {
        let domain = c.domain.clone()?;
        Some(CookieRecord {
            include_subdomains: domain.starts_with('.'),
            domain,
            path: c.path.clone().unwrap_or_else(|| "/".into()),
            secure: c.secure.unwrap_or(false),
            expires_at: c.expiry.map(|e| e as i64).unwrap_or(0),
            name: c.name.clone(),
            value: c.value.clone(),
            http_only: c.http_only.unwrap_or(false),
        })
    }))
}

fn profile_roots(home: &Path, browser: &str) -> Option<(BrowserFamily, Vec<PathBuf>)> {
    let mac = home.join("Library/Application Support");
    let config = home.join(".config");
    match browser.to_ascii_lowercase().as_str() {
        "firefox" => Some((
            BrowserFamily::Firefox,
            vec![
                home.join(".mozilla/firefox"),
                home.join("snap/firefox/common/.mozilla/firefox"),
                mac.join("Firefox/Profiles"),
            ],
        )),
        "chrome" => Some((
            BrowserFamily::Chromium,
            vec![config.join("google-chrome"), mac.join("Google/Chrome")],
        )),
        "chromium" => Some((
            BrowserFamily::Chromium,
            vec![config.join("chromium"), mac.join("Chromium")],
        )),
        "brave" => Some((
            BrowserFamily::Chromium,
            vec![
                config.join("BraveSoftware/Brave-Browser"),
                mac.join("BraveSoftware/Brave-Browser"),
            ],
        )),
        "edge" => Some((
            BrowserFamily::Chromium,
            vec![config.join("microsoft-edge"), mac.join("Microsoft Edge")],
        )),
        _ => None,
    }
}

/// Most recently modified cookie database across all profiles
fn find_cookie_db(family: BrowserFamily, roots: &[PathBuf]) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    for root in roots.iter().filter(|r| r.is_dir()) {
        let Ok(entries) = std::fs::read_dir(root) else {
            continue;
        };
        for entry in entries.flatten() {
            let profile = entry.path();
            if !profile.is_dir() {
                continue;
            }
            match family {
                BrowserFamily::Firefox => candidates.push(profile.join("cookies.sqlite")),
                BrowserFamily::Chromium => {
                    candidates.push(profile.join("Network/Cookies"));
                    candidates.push(profile.join("Cookies"));
                }
            }
        }
    }

    candidates
        .into_iter()
        .filter(|p| p.is_file())
        .max_by_key(|p| {
            p.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
}

/// Copy the database aside before opening it; a running browser keeps it locked
fn read_cookie_db(family: BrowserFamily, db: &Path) -> Result<CookieSet, LoadError> {
    let scratch = tempfile::tempdir()?;
    let copy = scratch.path().join("cookies.db");
    std::fs::copy(db, &copy)?;

    let wal = db.with_file_name(format!(
        "{}-wal",
        db.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    ));
    if wal.is_file() {
        std::fs::copy(&wal, scratch.path().join("cookies.db-wal"))?;
    }

    let conn = Connection::open_with_flags(
        &copy,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let records = match family {
        BrowserFamily::Firefox => read_firefox(&conn)?,
        BrowserFamily::Chromium => read_chromium(&conn)?,
    };
    Ok(CookieSet::from_records(records))
}

fn read_firefox(conn: &Connection) -> Result<Vec<CookieRecord>, LoadError> {
    let mut stmt = conn.prepare(
        "SELECT host, path, isSecure, expiry, name, value, isHttpOnly \
         FROM moz_cookies WHERE host LIKE '%youtube.com'",
    )?;
    let rows = stmt.query_map([], |row| {
        let host: String = row.get(0)?;
        let path: Option<String> = row.get(1)?;
        let is_secure: Option<i64> = row.get(2)?;
        let expiry: Option<i64> = row.get(3)?;
        let name: String = row.get(4)?;
        let value: Option<String> = row.get(5)?;
        let is_http_only: Option<i64> = row.get(6)?;
        Ok((host, path, is_secure, expiry, name, value, is_http_only))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (host, path, is_secure, expiry, name, value, is_http_only) = row?;
        // Newer Firefox stores expiry in milliseconds.
        let expires_at = match expiry.unwrap_or(0) {
            ms if ms > 100_000_000_000 => ms / 1000,
            secs => secs,
        };
        out.push(CookieRecord {
            include_subdomains: host.starts_with('.'),
            domain: host,
            path: path.unwrap_or_else(|| "/".into()),
            secure: is_secure.unwrap_or(0) != 0,
            expires_at,
            name,
            value: value.unwrap_or_default(),
            http_only: is_http_only.unwrap_or(0) != 0,
        });
    }
    Ok(out)
}

fn read_chromium(conn: &Connection) -> Result<Vec<CookieRecord>, LoadError> {
    let mut stmt = conn.prepare(
        "SELECT host_key, path, is_secure, expires_utc, name, value, is_httponly \
         FROM cookies WHERE host_key LIKE '%youtube.com'",
    )?;
    let rows = stmt.query_map([], |row| {
        let host: String = row.get(0)?;
        let path: Option<String> = row.get(1)?;
        let is_secure: Option<i64> = row.get(2)?;
        let expires_utc: Option<i64> = row.get(3)?;
        let name: String = row.get(4)?;
        let value: Option<String> = row.get(5)?;
        let is_http_only: Option<i64> = row.get(6)?;
        Ok((host, path, is_secure, expires_utc, name, value, is_http_only))
    })?;

    let mut out = Vec::new();
    let mut encrypted = 0usize;
    for row in rows {
        let (host, path, is_secure, expires_utc, name, value, is_http_only) = row?;
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            encrypted += 1;
            continue;
        };
        out.push(CookieRecord {
            include_subdomains: host.starts_with('.'),
            domain: host,
            path: path.unwrap_or_else(|| "/".into()),
            secure: is_secure.unwrap_or(0) != 0,
            expires_at: webkit_to_unix(expires_utc.unwrap_or(0)),
            name,
            value,
            http_only: is_http_only.unwrap_or(0) != 0,
        });
    }

    if encrypted > 0 {
        tracing::debug!(encrypted, "skipped OS-encrypted chromium cookie values");
    }
    Ok(out)
}

/// Chromium microseconds since 1601 to unix seconds; 0 stays a session cookie
fn webkit_to_unix(micros: i64) -> i64 {
    if micros <= 0 {
        return 0;
    }
    (micros / 1_000_000 - WEBKIT_EPOCH_OFFSET_SECS).max(0)
}
