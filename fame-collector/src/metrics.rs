//! Metrics source client
//!
//! Queries the YouTube Data API v3 for the current view/like/comment counts
//! of a published video. The `MetricsSource` trait is the seam the sweep
//! runs against; tests substitute a stub, and a different hosting site only
//! needs a new implementation.
//!
//! # API Reference
//! - Endpoint: https://www.googleapis.com/youtube/v3/videos?part=statistics
//! - Counts come back as decimal strings inside `items[0].statistics`

use async_trait::async_trait;
use fame_common::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// YouTube Data API base URL
const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// A point-in-time snapshot of one video's public counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoStats {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

/// Something that can report current metrics for an external content id
///
/// Failures are per-item and recoverable: the sweep logs them, skips the
/// item, and continues with the rest of the batch.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, external_id: &str) -> Result<VideoStats>;
}

/// YouTube Data API v3 statistics client
pub struct YouTubeStatsClient {
    http_client: Client,
    api_key: String,
}

impl YouTubeStatsClient {
    /// Create a client with a bounded request timeout
    ///
    /// A timeout counts as "temporarily unavailable" for that item, never a
    /// fatal error.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::MetricsSource(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_key,
        })
    }
}

#[async_trait]
impl MetricsSource for YouTubeStatsClient {
    async fn fetch(&self, external_id: &str) -> Result<VideoStats> {
        debug!(external_id = %external_id, "Querying video statistics");

        let url = format!("{YOUTUBE_API_URL}/videos");
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("part", "statistics"),
                ("id", external_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::MetricsSource(format!("statistics request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::MetricsSource(format!(
                "statistics API returned {status}: {body}"
            )));
        }

        let listing: VideoListResponse = response
            .json()
            .await
            .map_err(|e| Error::MetricsSource(format!("failed to parse statistics response: {e}")))?;

        let video = listing
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::MetricsSource(format!("no video found with id {external_id}")))?;

        Ok(video.statistics.into_stats())
    }
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    statistics: Statistics,
}

/// Counters as the API delivers them: decimal strings, any of which may be
/// absent (e.g. comments disabled)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

impl Statistics {
    fn into_stats(self) -> VideoStats {
        VideoStats {
            views: parse_count(self.view_count),
            likes: parse_count(self.like_count),
            comments: parse_count(self.comment_count),
        }
    }
}

fn parse_count(raw: Option<String>) -> i64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_parse_with_missing_counters() {
        let json = r#"{"items":[{"statistics":{"viewCount":"1200","likeCount":"34"}}]}"#;
        let listing: VideoListResponse = serde_json::from_str(json).unwrap();
        let stats = listing.items.into_iter().next().unwrap().statistics.into_stats();
        assert_eq!(
            stats,
            VideoStats {
                views: 1200,
                likes: 34,
                comments: 0
            }
        );
    }

    #[test]
    fn test_empty_listing_deserializes() {
        let listing: VideoListResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(listing.items.is_empty());
    }

    #[test]
    fn test_garbage_counts_default_to_zero() {
        assert_eq!(parse_count(Some("not-a-number".into())), 0);
        assert_eq!(parse_count(None), 0);
        assert_eq!(parse_count(Some("-5".into())), 0);
    }
}
