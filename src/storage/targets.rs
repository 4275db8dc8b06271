//! Scrape target files
//!
//! Each `*.json` file in the targets directory describes one language. A numeric
//! file stem (`1.json`) is the language id.

use crate::types::ScrapeTarget;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetFile {
    Categories {
        categories: BTreeMap<String, CategoryEntry>,
    },
    Urls {
        urls: Vec<String>,
    },
    Single {
        url: String,
    },
}

fn language_of(path: &Path) -> i64 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Parse one target file's contents
pub fn parse_targets(content: &str, language: i64) -> Result<Vec<ScrapeTarget>, serde_json::Error> {
    let file: TargetFile = serde_json::from_str(content)?;
    let target = |url: String, categories: i64| ScrapeTarget {
        url,
        language,
        categories,
    };

    let targets = match file {
        TargetFile::Categories { categories } => categories
            .into_iter()
            .filter_map(|(id, entry)| match id.trim().parse() {
                Ok(category) => Some(target(entry.url, category)),
                Err(_) => {
                    tracing::warn!(category = %id, "skipping non-numeric category id");
                    None
                }
            })
            .collect(),
        TargetFile::Urls { urls } => urls.into_iter().map(|u| target(u, 0)).collect(),
        TargetFile::Single { url } => vec![target(url, 0)],
    };

    Ok(targets
        .into_iter()
        .filter(|t| !t.url.trim().is_empty())
        .collect())
}

/// Load every target file in `dir`, in file name order
pub async fn load_targets(dir: &Path) -> Vec<ScrapeTarget> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot read targets directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    let mut targets = Vec::new();
    for path in files {
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable target file");
                continue;
            }
        };
        match parse_targets(&content, language_of(&path)) {
            Ok(found) => {
                tracing::debug!(file = %path.display(), count = found.len(), "loaded targets");
                targets.extend(found);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping malformed target file");
            }
        }
    }
    targets
}
