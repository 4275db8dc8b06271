//! YouTube Data API client for the trending chart

use crate::error::{Result, TrendsError};
use crate::types::TrendingVideo;
use serde_json::Value;

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";
/// The API refuses larger pages
const MAX_RESULTS: usize = 50;

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

fn count(stats: Option<&Value>, key: &str) -> String {
    stats
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or("N/A")
        .to_string()
}

/// Parse a `videos.list` response body
fn parse_trending(data: &Value) -> Vec<TrendingVideo> {
    let Some(items) = data.get("items").and_then(|i| i.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?.to_string();
            let snippet = item.get("snippet")?;
            let text = |key: &str| {
                snippet
                    .get(key)
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            let stats = item.get("statistics");

            Some(TrendingVideo {
                title: text("title"),
                channel_title: text("channelTitle"),
                published_at: text("publishedAt"),
                view_count: count(stats, "viewCount"),
                like_count: count(stats, "likeCount"),
                url: watch_url(&id),
                video_id: id,
            })
        })
        .collect()
}

/// Fetch the most popular videos for a region (with caching)
pub async fn fetch_trending(api_key: &str, region: &str, limit: usize) -> Result<Vec<TrendingVideo>> {
    use crate::storage::cache::{get_cache_key, get_cached, set_cache};

    let limit = limit.clamp(1, MAX_RESULTS);
    let region = region.to_uppercase();
    let cache_key = get_cache_key(&format!("trending:{}:{}", region, limit));

    if let Some(cached) = get_cached::<Vec<TrendingVideo>>(&cache_key).await {
        tracing::debug!(%region, "trending served from cache");
        return Ok(cached);
    }

    let client = reqwest::Client::new();
    let response = client
        .get(VIDEOS_ENDPOINT)
        .query(&[
            ("part", "snippet,statistics"),
            ("chart", "mostPopular"),
            ("regionCode", region.as_str()),
            ("maxResults", limit.to_string().as_str()),
            ("key", api_key),
        ])
        .send()
        .await?;

    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(TrendsError::YouTubeApi(format!("HTTP {}: {}", status, message)));
    }

    let results = parse_trending(&body);
    tracing::info!(%region, count = results.len(), "fetched trending videos");

    // Caching is best-effort
    if !results.is_empty() {
        let _ = set_cache(&cache_key, &results).await;
    }

    Ok(results)
}
