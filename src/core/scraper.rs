//! Scrape invoker - yt-dlp integration

use crate::core::cookies::write_atomic;
use crate::error::{Result, TrendsError};
use crate::storage::sink::VideoSink;
use crate::types::{
    Config, CredentialSource, ResolvedSession, RunSummary, ScrapeTarget, VideoRecord,
};
use crate::utils::paths::same_path;
use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::process::Command;

static WATCH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]v=([A-Za-z0-9_-]{11})").expect("Invalid regex"));
static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("Invalid regex"));

/// Cookie file handed to yt-dlp for one run; deleted when dropped
#[derive(Debug)]
pub struct EphemeralCookieFile {
    path: PathBuf,
}

impl EphemeralCookieFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EphemeralCookieFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), "failed to remove cookie file: {}", e);
            }
        }
    }
}

/// How yt-dlp gets its cookies for this run
#[derive(Debug)]
pub enum CookieArgs {
    None,
    File(EphemeralCookieFile),
    Browser(String),
}

impl CookieArgs {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            CookieArgs::None => Vec::new(),
            CookieArgs::File(file) => vec![
                "--cookies".into(),
                file.path().to_string_lossy().into_owned(),
            ],
            CookieArgs::Browser(browser) => vec!["--cookies-from-browser".into(), browser.clone()],
        }
    }
}

/// Materialize the session's cookies for yt-dlp
pub fn prepare_cookies(
    session: &ResolvedSession,
    target: &Path,
    browser_passthrough: bool,
) -> Result<CookieArgs> {
    if !session.is_authenticated() || session.cookies.is_empty() {
        tracing::warn!("no cookies for this run, yt-dlp will run without authentication");
        return Ok(CookieArgs::None);
    }

    if let CredentialSource::BrowserCookies(browser) = &session.source {
        if browser_passthrough {
            return Ok(CookieArgs::Browser(browser.clone()));
        }
    }

    if let CredentialSource::CookieFile(source) = &session.source {
        if same_path(source, target) {
            return Err(TrendsError::InvalidConfig(format!(
                "refusing to overwrite the cookie file {} with the runtime copy",
                source.display()
            )));
        }
    }

    write_atomic(target, &session.cookies)?;
    tracing::debug!(path = %target.display(), cookies = session.cookies.len(), "wrote runtime cookie file");
    Ok(CookieArgs::File(EphemeralCookieFile {
        path: target.to_path_buf(),
    }))
}

/// Check if a command is available in PATH
pub(crate) async fn is_command_available(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Canonical watch URL, or the shorts URL for shorts
pub fn canonical_url(raw: &str, id: Option<&str>) -> Option<String> {
    let id = id.filter(|id| VIDEO_ID.is_match(id));
    if raw.contains("/shorts/") {
        let short_id = raw
            .split("/shorts/")
            .nth(1)
            .and_then(|rest| rest.split(['?', '&', '/']).next())
            .filter(|s| !s.is_empty())
            .or(id)?;
        return Some(format!("https://www.youtube.com/shorts/{}", short_id));
    }

    let id = WATCH_ID
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .or(id)?;
    Some(format!("https://www.youtube.com/watch?v={}", id))
}

fn thumbnail(entry: &Value) -> String {
    entry
        .get("thumbnail")
        .and_then(Value::as_str)
        .or_else(|| {
            entry
                .get("thumbnails")
                .and_then(Value::as_array)
                .and_then(|t| t.last())
                .and_then(|t| t.get("url"))
                .and_then(Value::as_str)
        })
        .unwrap_or("Unknown")
        .to_string()
}

/// Convert one `--dump-json` line into a record, or `None` if it must be skipped
pub fn entry_to_record(
    entry: &Value,
    target: &ScrapeTarget,
    now: DateTime<Utc>,
) -> Option<VideoRecord> {
    let title = entry.get("title").and_then(Value::as_str).unwrap_or_default();

    match entry.get("live_status").and_then(Value::as_str) {
        Some("is_upcoming") | Some("is_live") => {
            tracing::debug!(%title, "skipping premiere or live stream");
            return None;
        }
        _ => {}
    }

    let Some(duration) = entry.get("duration").and_then(Value::as_f64) else {
        tracing::debug!(%title, "skipping video with unknown length");
        return None;
    };

    let raw_url = entry
        .get("webpage_url")
        .or_else(|| entry.get("url"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let id = entry.get("id").and_then(Value::as_str);
    let url = canonical_url(raw_url, id)?;

    let upload_date = entry
        .get("upload_date")
        .and_then(Value::as_str)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok());

    Some(VideoRecord {
        is_shorts: url.contains("/shorts/"),
        url,
        title: title.to_string(),
        language: target.language,
        categories: target.categories,
        length: (duration.round() as u64).to_string(),
        upload_date,
        thumbnail_url: thumbnail(entry),
        created_at: now,
    })
}

/// Parse yt-dlp stdout, one JSON object per line
pub fn parse_listing(stdout: &str, target: &ScrapeTarget) -> Vec<VideoRecord> {
    let now = Utc::now();
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(entry) => entry_to_record(&entry, target, now),
            Err(e) => {
                tracing::warn!("ignoring unparsable yt-dlp output line: {}", e);
                None
            }
        })
        .collect()
}

/// Runs yt-dlp against scrape targets
#[derive(Debug, Clone)]
pub struct ScrapeInvoker {
    ytdlp: String,
    max_per_target: usize,
}

impl ScrapeInvoker {
    pub fn new(ytdlp: &str, max_per_target: usize) -> Self {
        Self {
            ytdlp: ytdlp.to_string(),
            max_per_target,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.ytdlp, config.max_per_target)
    }

    pub fn build_args(&self, cookies: &CookieArgs, url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--flat-playlist".into(),
            "--dump-json".into(),
            "--no-warnings".into(),
            "--playlist-end".into(),
            self.max_per_target.to_string(),
        ];
        args.extend(cookies.to_args());
        args.push(url.to_string());
        args
    }

    /// List the videos behind one target URL
    pub async fn list_videos(
        &self,
        target: &ScrapeTarget,
        cookies: &CookieArgs,
    ) -> Result<Vec<VideoRecord>> {
        let args = self.build_args(cookies, &target.url);

        // Show progress spinner
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Listing {}", target.url));
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));

        let output = Command::new(&self.ytdlp)
            .args(&args)
            .output()
            .await
            .map_err(|e| TrendsError::Spawn(format!("Failed to start yt-dlp: {}", e)));

        spinner.finish_and_clear();
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().last().unwrap_or_default();
            return Err(TrendsError::Spawn(format!(
                "yt-dlp exited with code {:?}: {}",
                output.status.code(),
                last
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_listing(&stdout, target))
    }

    /// Scrape every target and hand each new video to the sink
    pub async fn run(
        &self,
        session: &ResolvedSession,
        cookie_path: &Path,
        browser_passthrough: bool,
        targets: &[ScrapeTarget],
        sink: &dyn VideoSink,
    ) -> Result<RunSummary> {
        if !Path::new(&self.ytdlp).is_file() && !is_command_available(&self.ytdlp).await {
            return Err(TrendsError::MissingDependency(self.ytdlp.clone()));
        }

        // Dropped (and deleted) when the run ends.
        let cookies = prepare_cookies(session, cookie_path, browser_passthrough)?;

        let mut summary = RunSummary {
            targets: targets.len(),
            ..RunSummary::default()
        };
        let mut seen = HashSet::new();

        for target in targets {
            tracing::info!(
                url = %target.url,
                language = target.language,
                categories = target.categories,
                "scraping target"
            );
            let videos = match self.list_videos(target, &cookies).await {
                Ok(videos) => videos,
                Err(e) => {
                    tracing::error!(url = %target.url, "target failed: {}", e);
                    summary.failed += 1;
                    continue;
                }
            };

            for video in videos {
                summary.discovered += 1;
                if !seen.insert(video.url.clone()) {
                    summary.skipped += 1;
                    continue;
                }
                match sink.exists(&video.url).await {
                    Ok(true) => {
                        tracing::debug!(url = %video.url, "video already stored");
                        summary.skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(url = %video.url, "failed to look up video: {}", e);
                        summary.failed += 1;
                        continue;
                    }
                }
                match sink.insert(&video).await {
                    Ok(()) => summary.written += 1,
                    Err(e) => {
                        tracing::error!(url = %video.url, "failed to store video: {}", e);
                        summary.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            "scrape finished"
        );
        Ok(summary)
    }
}
