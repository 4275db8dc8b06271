//! Type definitions for yt-trends
//!
//! Source of truth for all data structures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================
// Cookie Types
// ============================================

/// One line of a Netscape cookie file
#[derive(Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix seconds, 0 for a session cookie
    pub expires_at: i64,
    pub name: String,
    pub value: String,
    /// Written back as the `#HttpOnly_` domain prefix
    pub http_only: bool,
}

impl fmt::Debug for CookieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieRecord")
            .field("domain", &self.domain)
            .field("include_subdomains", &self.include_subdomains)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires_at", &self.expires_at)
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("http_only", &self.http_only)
            .finish()
    }
}

/// Ordered cookies scoped to `.youtube.com`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet {
    pub(crate) records: Vec<CookieRecord>,
}

// ============================================
// Credential Types
// ============================================

/// Username/password pair for a live sign-in
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the cookies for a run came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    BrowserCookies(String),
    CookieFile(PathBuf),
    LiveSession(LoginCredentials),
    Unauthenticated,
}

impl CredentialSource {
    /// Stable identifier for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::BrowserCookies(_) => "browser_cookies",
            Self::CookieFile(_) => "cookie_file",
            Self::LiveSession(_) => "live_session",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrowserCookies(browser) => write!(f, "browser cookies ({})", browser),
            Self::CookieFile(path) => write!(f, "cookie file ({})", path.display()),
            Self::LiveSession(creds) => write!(f, "live session ({})", creds.username),
            Self::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Credentials resolved for one run; handed to the scrape invoker and then dropped
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub source: CredentialSource,
    pub cookies: CookieSet,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedSession {
    pub fn new(source: CredentialSource, cookies: CookieSet) -> Self {
        Self {
            source,
            cookies,
            resolved_at: Utc::now(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(CredentialSource::Unauthenticated, CookieSet::default())
    }

    pub fn is_authenticated(&self) -> bool {
        self.source != CredentialSource::Unauthenticated
    }
}

// ============================================
// Video Types
// ============================================

/// A scraped video, as stored in the `youtube_videos` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub url: String,
    pub title: String,
    pub language: i64,
    pub categories: i64,
    /// Duration in whole seconds, e.g. "245"
    pub length: String,
    pub upload_date: Option<NaiveDate>,
    pub thumbnail_url: String,
    pub is_shorts: bool,
    pub created_at: DateTime<Utc>,
}

/// A search/listing URL to scrape, tagged with its language and category ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub url: String,
    pub language: i64,
    pub categories: i64,
}

/// A video from the Data API "most popular" chart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingVideo {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub published_at: String,
    /// Raw count from the API, "N/A" when hidden
    pub view_count: String,
    pub like_count: String,
    pub url: String,
}

/// Counters for one scrape run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub targets: usize,
    pub discovered: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

// ============================================
// Config Types
// ============================================

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Netscape cookie file to read (default: ./youtube_cookies.txt)
    pub cookie_file: String,
    /// Ephemeral cookie file handed to yt-dlp (default: state dir)
    pub runtime_cookie_file: String,
    /// Browser to extract cookies from, if any
    pub browser: Option<String>,
    /// Let yt-dlp read the browser directly instead of writing a cookie file
    pub browser_passthrough: bool,
    /// Service-account key for Firestore (default: ./firestore-access.json)
    pub firestore_credentials: String,
    /// Overrides the project id found in the service-account key
    pub firestore_project: Option<String>,
    pub collection: String,
    /// Directory of `<language>.json` target files
    pub targets_dir: String,
    /// yt-dlp executable
    pub ytdlp: String,
    /// Max entries to list per target URL
    pub max_per_target: usize,
    /// chromedriver executable used for live sign-in
    pub chromedriver: String,
    pub chromedriver_port: u16,
    /// Bounded wait for the sign-in flow
    pub login_timeout_secs: u64,
    /// Region for the trending chart (default: "IT")
    pub region_code: String,
    pub trending_limit: usize,
    /// Data API key (usually from YOUTUBE_API_KEY)
    pub youtube_api_key: Option<String>,
    /// Editor command (default: "nvim")
    pub editor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie_file: String::new(), // Set at runtime to ./youtube_cookies.txt
            runtime_cookie_file: String::new(), // Set at runtime to the state dir
            browser: Some("firefox".into()),
            browser_passthrough: false,
            firestore_credentials: String::new(), // Set at runtime to ./firestore-access.json
            firestore_project: None,
            collection: "youtube_videos".into(),
            targets_dir: String::new(), // Set at runtime to the config dir
            ytdlp: "yt-dlp".into(),
            max_per_target: 50,
            chromedriver: "/usr/local/bin/chromedriver".into(),
            chromedriver_port: 9515,
            login_timeout_secs: 60,
            region_code: "IT".into(),
            trending_limit: 10,
            youtube_api_key: None,
            editor: "nvim".into(),
        }
    }
}

// ============================================
// Cache Types
// ============================================

/// Cached data with TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
    /// Time-to-live in seconds
    pub ttl: u64,
}
