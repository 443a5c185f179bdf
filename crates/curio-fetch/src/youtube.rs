//! YouTube Data API v3 source.
//!
//! Fetches video resources in batches and tidies them into [`ItemDraft`]s.
//! The API returns one `items[]` entry per known id, so unknown ids are
//! detected by their absence and surface as `None` drafts.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use curio_core::text::{parse_duration, plaintext_to_html};
use curio_core::{ContentKind, ContentSource, Error, ItemDraft, RawBatch, RawFetcher, Result};

/// Default YouTube Data API endpoint.
pub const DEFAULT_YOUTUBE_API_URL: &str = curio_core::defaults::YOUTUBE_API_URL;

/// Resource parts requested for every video.
const VIDEO_PARTS: &str = "snippet,contentDetails,statistics";

/// YouTube Data API source.
pub struct YoutubeSource {
    client: Client,
    api_key: String,
    api_url: String,
}

impl YoutubeSource {
    /// Create a source against the public API endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_api_url(api_key, DEFAULT_YOUTUBE_API_URL)
    }

    /// Create a source against a custom endpoint (used by tests).
    pub fn with_api_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(curio_core::defaults::FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    /// Create from environment variables. Fails when `YOUTUBE_API_KEY` is
    /// not set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(curio_core::defaults::ENV_YOUTUBE_API_KEY).map_err(|_| {
            Error::Config(format!(
                "{} is not set",
                curio_core::defaults::ENV_YOUTUBE_API_KEY
            ))
        })?;
        Ok(Self::new(api_key))
    }
}

#[async_trait]
impl RawFetcher for YoutubeSource {
    fn kind(&self) -> ContentKind {
        ContentKind::Youtube
    }

    #[instrument(skip(self, ids), fields(subsystem = "fetch", component = "youtube", op = "fetch_batch", input_count = ids.len()))]
    async fn fetch_batch(&self, ids: &[String]) -> Result<RawBatch> {
        if ids.is_empty() {
            return Ok(RawBatch::Json(serde_json::json!({ "items": [] })));
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("id", ids.join(",").as_str()),
                ("part", VIDEO_PARTS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("YouTube request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!("YouTube returned {}: {}", status, body)));
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse YouTube response: {}", e)))?;

        debug!(
            result_count = payload
                .get("items")
                .and_then(JsonValue::as_array)
                .map_or(0, Vec::len),
            "Fetched video batch"
        );
        Ok(RawBatch::Json(payload))
    }
}

impl ContentSource for YoutubeSource {
    fn tidy(&self, ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
        tidy_youtube(ids, raw)
    }
}

/// Tidy a raw video batch into drafts positionally aligned with `ids`.
pub fn tidy_youtube(ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
    let payload = raw.as_json()?;
    let items = payload
        .get("items")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| Error::Serialization("YouTube payload has no 'items' array".into()))?;

    let mut by_id: HashMap<&str, &JsonValue> = HashMap::with_capacity(items.len());
    for item in items {
        if let Some(id) = item.get("id").and_then(JsonValue::as_str) {
            by_id.insert(id, item);
        }
    }

    ids.iter()
        .map(|id| match by_id.get(id.as_str()) {
            Some(value) => tidy_video(value).map(Some),
            None => Ok(None),
        })
        .collect()
}

fn tidy_video(value: &JsonValue) -> Result<ItemDraft> {
    let video: VideoResource = serde_json::from_value(value.clone())?;
    let duration = parse_duration(&video.content_details.duration)?;

    Ok(ItemDraft {
        item_id: Some(video.id.clone()),
        title: Some(video.snippet.title),
        description_html: Some(plaintext_to_html(&video.snippet.description)),
        publish_date: Some(video.snippet.published_at),
        duration_secs: Some(duration.num_seconds()),
        view_count: parse_count(video.statistics.view_count.as_deref(), "viewCount", &video.id)?,
        likes: parse_count(video.statistics.like_count.as_deref(), "likeCount", &video.id)?,
        channel_id: Some(video.snippet.channel_id),
        channel_title: Some(video.snippet.channel_title.clone()),
        description: Some(video.snippet.description),
        author_names: Some(vec![video.snippet.channel_title]),
        classifier_names: Some(video.snippet.tags),
        ..ItemDraft::default()
    })
}

/// Statistics counts arrive as JSON strings.
fn parse_count(raw: Option<&str>, field: &str, id: &str) -> Result<Option<i64>> {
    match raw {
        Some(value) => value.parse::<i64>().map(Some).map_err(|_| {
            Error::Serialization(format!(
                "Non-numeric {} '{}' for video {}",
                field, value, id
            ))
        }),
        None => Ok(None),
    }
}

/// Video resource from the `videos.list` endpoint.
#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: VideoContentDetails,
    statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    channel_id: String,
    channel_title: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    #[serde(default)]
    view_count: Option<String>,
    #[serde(default)]
    like_count: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tricks_video() -> JsonValue {
        json!({
            "kind": "youtube#video",
            "id": "C-gEQdGVXbk",
            "snippet": {
                "publishedAt": "2019-01-08T17:00:07Z",
                "channelId": "UCCezIgC97PvUuR4_gbFUs5g",
                "title": "10 Python Tips and Tricks For Writing Better Code",
                "description": "This video is sponsored by Skillshare.\nCheck it out at https://skl.sh/coreyschafer",
                "channelTitle": "Corey Schafer",
                "tags": ["Python", "Programming"]
            },
            "contentDetails": { "duration": "PT39M21S" },
            "statistics": { "viewCount": "1529622", "likeCount": "48771" }
        })
    }

    fn trends_video() -> JsonValue {
        json!({
            "kind": "youtube#video",
            "id": "e6LOWKVq5sQ",
            "snippet": {
                "publishedAt": "2006-12-15T04:12:53Z",
                "channelId": "UCOBcLyt4aNLRnw5wrPYC7Jw",
                "title": "Disco Stu's dance lessons",
                "channelTitle": "dumbmatter",
                "tags": ["simpsons", "disco stu"]
            },
            "contentDetails": { "duration": "PT15S" },
            "statistics": { "viewCount": "8123" }
        })
    }

    #[test]
    fn tidy_maps_video_fields() {
        let ids = vec!["C-gEQdGVXbk".to_string()];
        let raw = RawBatch::Json(json!({ "items": [tricks_video()] }));

        let drafts = tidy_youtube(&ids, &raw).expect("tidy failed");
        let draft = drafts[0].as_ref().expect("draft missing");

        assert_eq!(
            draft.title.as_deref(),
            Some("10 Python Tips and Tricks For Writing Better Code")
        );
        assert_eq!(draft.duration_secs, Some(2361));
        assert_eq!(draft.view_count, Some(1_529_622));
        assert_eq!(draft.likes, Some(48_771));
        assert_eq!(draft.channel_title.as_deref(), Some("Corey Schafer"));
        assert_eq!(
            draft.author_names.as_deref(),
            Some(&["Corey Schafer".to_string()][..])
        );
        assert!(draft
            .description
            .as_deref()
            .is_some_and(|d| d.starts_with("This video is")));
        assert!(draft
            .description_html
            .as_deref()
            .is_some_and(|d| d.contains("<br>") && d.contains("<a href=")));
    }

    #[test]
    fn tidy_defaults_missing_description_and_likes() {
        let ids = vec!["e6LOWKVq5sQ".to_string()];
        let raw = RawBatch::Json(json!({ "items": [trends_video()] }));

        let drafts = tidy_youtube(&ids, &raw).expect("tidy failed");
        let draft = drafts[0].as_ref().expect("draft missing");

        assert_eq!(draft.description.as_deref(), Some(""));
        assert_eq!(draft.likes, None);
        assert_eq!(
            draft.classifier_names.as_deref(),
            Some(&["simpsons".to_string(), "disco stu".to_string()][..])
        );
        assert_eq!(
            draft.author_names.as_deref(),
            Some(&["dumbmatter".to_string()][..])
        );
    }

    #[test]
    fn tidy_aligns_unknown_ids_as_none() {
        let ids = vec![
            "zzzzzzzzzzz".to_string(),
            "C-gEQdGVXbk".to_string(),
            "e6LOWKVq5sQ".to_string(),
        ];
        let raw = RawBatch::Json(json!({ "items": [trends_video(), tricks_video()] }));

        let drafts = tidy_youtube(&ids, &raw).expect("tidy failed");
        assert!(drafts[0].is_none());
        assert_eq!(
            drafts[1].as_ref().and_then(|d| d.item_id.as_deref()),
            Some("C-gEQdGVXbk")
        );
        assert_eq!(
            drafts[2].as_ref().and_then(|d| d.item_id.as_deref()),
            Some("e6LOWKVq5sQ")
        );
    }

    #[test]
    fn tidy_rejects_non_numeric_counts() {
        let mut video = tricks_video();
        video["statistics"]["viewCount"] = json!("many");
        let ids = vec!["C-gEQdGVXbk".to_string()];
        let raw = RawBatch::Json(json!({ "items": [video] }));

        assert!(matches!(
            tidy_youtube(&ids, &raw),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn tidy_rejects_page_batches() {
        let raw = RawBatch::Pages(Default::default());
        assert!(tidy_youtube(&["a".to_string()], &raw).is_err());
    }
}
