//! Trending result caching

use crate::error::Result;
use crate::types::CacheEntry;
use crate::utils::paths::{ensure_dir, get_cache_dir};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_TTL: u64 = 3600; // 1 hour

/// Generate cache key from a request description
pub fn get_cache_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", key))
}

/// Get cached data if valid
pub async fn get_cached<T: serde::de::DeserializeOwned>(key: &str) -> Option<T> {
    get_cached_in(Path::new(&get_cache_dir()), key).await
}

pub async fn get_cached_in<T: serde::de::DeserializeOwned>(dir: &Path, key: &str) -> Option<T> {
    let path = cache_path(dir, key);

    if !path.exists() {
        return None;
    }

    let content = fs::read_to_string(&path).await.ok()?;
    let entry: CacheEntry<T> = serde_json::from_str(&content).ok()?;

    // Check if expired
    let now = Utc::now().timestamp();
    if now - entry.timestamp > entry.ttl as i64 {
        let _ = fs::remove_file(&path).await;
        return None;
    }

    Some(entry.data)
}

/// Set cache data
pub async fn set_cache<T: serde::Serialize>(key: &str, data: &T) -> Result<()> {
    set_cache_in(Path::new(&get_cache_dir()), key, data, DEFAULT_TTL).await
}

pub async fn set_cache_in<T: serde::Serialize>(
    dir: &Path,
    key: &str,
    data: &T,
    ttl: u64,
) -> Result<()> {
    ensure_dir(&dir.to_string_lossy()).await?;

    let entry = CacheEntry {
        data,
        timestamp: Utc::now().timestamp(),
        ttl,
    };

    let content = serde_json::to_string(&entry)?;
    fs::write(cache_path(dir, key), content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keys_are_stable_hex_digests() {
        let key = get_cache_key("trending:IT:10");
        assert_eq!(key.len(), 64);
        assert_eq!(key, get_cache_key("trending:IT:10"));
        assert_ne!(key, get_cache_key("trending:US:10"));
    }

    #[tokio::test]
    async fn fresh_entries_are_returned() {
        let dir = tempdir().unwrap();
        set_cache_in(dir.path(), "k", &vec!["a".to_string()], DEFAULT_TTL)
            .await
            .unwrap();
        let cached: Option<Vec<String>> = get_cached_in(dir.path(), "k").await;
        assert_eq!(cached, Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn expired_entries_are_evicted() {
        let dir = tempdir().unwrap();
        let entry = CacheEntry {
            data: 42u32,
            timestamp: Utc::now().timestamp() - 10,
            ttl: 1,
        };
        std::fs::write(
            dir.path().join("old.json"),
            serde_json::to_string(&entry).unwrap(),
        )
        .unwrap();

        let cached: Option<u32> = get_cached_in(dir.path(), "old").await;
        assert_eq!(cached, None);
        assert!(!dir.path().join("old.json").exists());
    }
}
