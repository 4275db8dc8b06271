//! Netscape cookie files: parsing, serialization and atomic writes

use crate::error::LoadError;
use crate::types::{CookieRecord, CookieSet};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

pub const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Cookies that mark a signed-in YouTube session
pub const AUTH_COOKIE_NAMES: [&str; 3] = ["SAPISID", "__Secure-3PAPISID", "SID"];

/// Why a single cookie line was dropped
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LineError {
    #[error("expected 7 tab-separated columns, found {0}")]
    ColumnCount(usize),
    #[error("{0} flag is not TRUE/FALSE")]
    Flag(&'static str),
    #[error("expiry is not an integer")]
    Expiry,
    #[error("domain {0} is outside the .youtube.com scope")]
    OutOfScope(String),
}

/// True for `.youtube.com` and its subdomains
pub fn is_youtube_domain(domain: &str) -> bool {
    let bare = domain.trim_start_matches('.');
    bare.eq_ignore_ascii_case("youtube.com")
        || bare.to_ascii_lowercase().ends_with(".youtube.com")
}

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, dropping records outside the YouTube scope
    pub fn from_records(records: impl IntoIterator<Item = CookieRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.push(record);
        }
        set
    }

    /// Append a record if it belongs to the set's scope. Returns whether it was kept.
    pub fn push(&mut self, record: CookieRecord) -> bool {
        if !record.include_subdomains || !is_youtube_domain(&record.domain) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CookieRecord> {
        self.records.iter()
    }

    pub fn get(&self, name: &str) -> Option<&CookieRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn has_auth_cookie(&self) -> bool {
        AUTH_COOKIE_NAMES.iter().any(|name| self.get(name).is_some())
    }
}

fn parse_flag(raw: &str, column: &'static str) -> Result<bool, LineError> {
    if raw.eq_ignore_ascii_case("TRUE") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("FALSE") {
        Ok(false)
    } else {
        Err(LineError::Flag(column))
    }
}

fn flag(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Parse one line. `Ok(None)` for comments and blank lines.
pub fn parse_line(line: &str) -> Result<Option<CookieRecord>, LineError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
        Some(rest) => (rest, true),
        None if line.starts_with('#') => return Ok(None),
        None => (line, false),
    };

    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() != 7 {
        return Err(LineError::ColumnCount(fields.len()));
    }

    let include_subdomains = parse_flag(fields[1], "includeSubdomains")?;
    let secure = parse_flag(fields[3], "secure")?;
    let expires_at: i64 = fields[4].parse().map_err(|_| LineError::Expiry)?;

    if !include_subdomains || !is_youtube_domain(fields[0]) {
        return Err(LineError::OutOfScope(fields[0].to_string()));
    }

    Ok(Some(CookieRecord {
        domain: fields[0].to_string(),
        include_subdomains,
        path: fields[2].to_string(),
        secure,
        expires_at,
        name: fields[5].to_string(),
        value: fields[6].to_string(),
        http_only,
    }))
}

/// Parse a whole file. Bad lines are logged and skipped.
pub fn parse(content: &str) -> CookieSet {
    let mut set = CookieSet::new();
    for (idx, line) in content.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(record)) => {
                set.push(record);
            }
            Ok(None) => {}
            Err(LineError::OutOfScope(domain)) => {
                tracing::debug!(line = idx + 1, %domain, "skipping cookie outside youtube.com");
            }
            Err(e) => {
                tracing::warn!(line = idx + 1, "skipping malformed cookie line: {}", e);
            }
        }
    }
    set
}

/// Render a single record as a Netscape line (no trailing newline)
pub fn format_line(record: &CookieRecord) -> String {
    format!(
        "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
        if record.http_only { HTTP_ONLY_PREFIX } else { "" },
        record.domain,
        flag(record.include_subdomains),
        record.path,
        flag(record.secure),
        record.expires_at,
        record.name,
        record.value,
    )
}

/// Render a full cookie file
pub fn serialize(set: &CookieSet) -> String {
    let mut out = String::from(NETSCAPE_HEADER);
    out.push_str("\n\n");
    for record in set.iter() {
        out.push_str(&format_line(record));
        out.push('\n');
    }
    out
}

/// Load a cookie file from disk
pub async fn load(path: &Path) -> Result<CookieSet, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).await?;
    let set = parse(&content);
    if set.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }

    tracing::debug!(path = %path.display(), cookies = set.len(), "loaded cookie file");
    Ok(set)
}

/// Replace `path` with the serialized set in one rename.
///
/// The temp file lives next to the target so the rename stays on one filesystem;
/// tempfile creates it with mode 0600.
pub fn write_atomic(path: &Path, set: &CookieSet) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(serialize(set).as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
