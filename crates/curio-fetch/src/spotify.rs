//! Spotify Web API episode source.
//!
//! Authenticates with the client-credentials flow and caches the access
//! token in-process until shortly before its advertised expiry. The
//! episodes endpoint returns `episodes[]` with `null` entries for ids the
//! catalog does not know.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use curio_core::{ContentKind, ContentSource, Error, ItemDraft, RawBatch, RawFetcher, Result};

/// Default Spotify episodes endpoint.
pub const DEFAULT_SPOTIFY_API_URL: &str = curio_core::defaults::SPOTIFY_API_URL;

/// Default Spotify token endpoint.
pub const DEFAULT_SPOTIFY_TOKEN_URL: &str = curio_core::defaults::SPOTIFY_TOKEN_URL;

/// Seconds subtracted from a token's advertised lifetime, so a cached
/// token never expires mid-batch.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// Spotify Web API source.
pub struct SpotifySource {
    client: Client,
    client_id: String,
    client_secret: String,
    api_url: String,
    token_url: String,
    token: tokio::sync::Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl SpotifySource {
    /// Create a source against the public API endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_urls(
            client_id,
            client_secret,
            DEFAULT_SPOTIFY_API_URL,
            DEFAULT_SPOTIFY_TOKEN_URL,
        )
    }

    /// Create a source against custom endpoints (used by tests).
    pub fn with_urls(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(curio_core::defaults::FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_url: api_url.into(),
            token_url: token_url.into(),
            token: tokio::sync::Mutex::new(None),
        }
    }

    /// Create from environment variables. Fails when either
    /// `SPOTIFY_CLIENT_ID` or `SPOTIFY_CLIENT_SECRET` is not set.
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var(curio_core::defaults::ENV_SPOTIFY_CLIENT_ID).map_err(|_| {
            Error::Config(format!(
                "{} is not set",
                curio_core::defaults::ENV_SPOTIFY_CLIENT_ID
            ))
        })?;
        let client_secret =
            std::env::var(curio_core::defaults::ENV_SPOTIFY_CLIENT_SECRET).map_err(|_| {
                Error::Config(format!(
                    "{} is not set",
                    curio_core::defaults::ENV_SPOTIFY_CLIENT_SECRET
                ))
            })?;
        Ok(Self::new(client_id, client_secret))
    }

    /// Return a valid access token, exchanging client credentials when the
    /// cached one is missing or stale.
    async fn bearer_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        use base64::Engine;
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .client
            .post(&self.token_url)
            .header(AUTHORIZATION, format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Spotify token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "Spotify token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse Spotify token response: {}", e)))?;

        let lifetime = token.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        let access_token = token.access_token.clone();
        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });

        debug!(expires_in = token.expires_in, "Exchanged Spotify client credentials");
        Ok(access_token)
    }
}

#[async_trait]
impl RawFetcher for SpotifySource {
    fn kind(&self) -> ContentKind {
        ContentKind::Spotify
    }

    #[instrument(skip(self, ids), fields(subsystem = "fetch", component = "spotify", op = "fetch_batch", input_count = ids.len()))]
    async fn fetch_batch(&self, ids: &[String]) -> Result<RawBatch> {
        if ids.is_empty() {
            return Ok(RawBatch::Json(serde_json::json!({ "episodes": [] })));
        }

        let token = self.bearer_token().await?;
        let response = self
            .client
            .get(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .query(&[
                ("ids", ids.join(",").as_str()),
                ("market", curio_core::defaults::SPOTIFY_MARKET),
            ])
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Spotify request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!("Spotify returned {}: {}", status, body)));
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse Spotify response: {}", e)))?;

        Ok(RawBatch::Json(payload))
    }
}

impl ContentSource for SpotifySource {
    fn tidy(&self, ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
        tidy_spotify(ids, raw)
    }
}

/// Tidy a raw episode batch into drafts positionally aligned with `ids`.
pub fn tidy_spotify(ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
    let payload = raw.as_json()?;
    let episodes = payload
        .get("episodes")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| Error::Serialization("Spotify payload has no 'episodes' array".into()))?;

    // Unknown ids come back as nulls, so key only the real entries.
    let mut by_id: HashMap<&str, &JsonValue> = HashMap::with_capacity(episodes.len());
    for episode in episodes.iter().filter(|e| !e.is_null()) {
        if let Some(id) = episode.get("id").and_then(JsonValue::as_str) {
            by_id.insert(id, episode);
        }
    }

    ids.iter()
        .map(|id| match by_id.get(id.as_str()) {
            Some(value) => tidy_episode(value).map(Some),
            None => Ok(None),
        })
        .collect()
}

fn tidy_episode(value: &JsonValue) -> Result<ItemDraft> {
    let episode: EpisodeResource = serde_json::from_value(value.clone())?;

    Ok(ItemDraft {
        item_id: Some(episode.id),
        title: Some(episode.name),
        description_html: Some(episode.html_description),
        publish_date: Some(parse_release_date(&episode.release_date)?),
        duration_secs: Some(episode.duration_ms / 1000),
        show_id: Some(episode.show.id),
        show_title: Some(episode.show.name),
        description: Some(episode.description),
        author_names: Some(vec![episode.show.publisher]),
        ..ItemDraft::default()
    })
}

/// Parse a release date at any of Spotify's precisions ("2017", "2017-07",
/// "2017-07-21") into UTC midnight of the first covered day.
fn parse_release_date(raw: &str) -> Result<DateTime<Utc>> {
    let padded = match raw.len() {
        4 => format!("{}-01-01", raw),
        7 => format!("{}-01", raw),
        _ => raw.to_string(),
    };
    let date = NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .map_err(|_| Error::Serialization(format!("Invalid release date '{}'", raw)))?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Episode resource from the `episodes` endpoint.
#[derive(Debug, Deserialize)]
struct EpisodeResource {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    html_description: String,
    release_date: String,
    duration_ms: i64,
    show: ShowResource,
}

#[derive(Debug, Deserialize)]
struct ShowResource {
    id: String,
    name: String,
    publisher: String,
}
