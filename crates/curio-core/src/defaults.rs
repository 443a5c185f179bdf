//! Centralized default constants for the curio system.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates and binaries should reference these constants instead of
//! defining their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// SLUGS & ALIASES
// =============================================================================

/// Maximum slug length in characters. Slugs are truncated at a token
/// boundary, so the effective length may be shorter.
pub const SLUG_MAX_LENGTH: usize = 150;

// =============================================================================
// FIELD LIMITS
// =============================================================================

/// Maximum classifier name length in characters.
pub const NAME_MAX_LENGTH: usize = 100;

/// Maximum classifier description length in characters. Merged
/// descriptions are joined with "/" and truncated to this limit.
pub const DESCRIPTION_MAX_LENGTH: usize = 100;

/// Maximum content item title length in characters.
pub const TITLE_MAX_LENGTH: usize = 100;

/// Maximum HTML description length for content items.
pub const DESCRIPTION_HTML_MAX_LENGTH: usize = 5000;

/// Maximum source-native item identifier length (blog post names like
/// "2006/11/introduction" are the longest form).
pub const ITEM_ID_MAX_LENGTH: usize = 100;

/// Maximum stored URL length. Longer URLs are truncated before the
/// external-link row is created.
pub const URL_MAX_LENGTH: usize = 200;

/// Maximum sequence abstract length in characters.
pub const ABSTRACT_MAX_LENGTH: usize = 5000;

// =============================================================================
// SYNC
// =============================================================================

/// Default batch size for bulk content creation during sync.
pub const SYNC_BATCH_SIZE: usize = 20;

/// Hard ceiling on the sync batch size accepted from the environment.
pub const SYNC_BATCH_SIZE_MAX: usize = 500;

/// Rows per statement when bulk-refreshing edit dates from the index.
pub const EDIT_DATE_REFRESH_BATCH: usize = 1000;

/// Default result limit for recent-item listings.
pub const RECENT_LIMIT: i64 = 50;

// =============================================================================
// FETCHERS
// =============================================================================

/// HTTP timeout for source fetch requests in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// YouTube Data API videos endpoint.
pub const YOUTUBE_API_URL: &str = "https://youtube.googleapis.com/youtube/v3/videos";

/// Spotify episodes endpoint.
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1/episodes";

/// Spotify client-credentials token endpoint.
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Market parameter sent with Spotify episode lookups.
pub const SPOTIFY_MARKET: &str = "US";

/// Default base URL of the blog scraper service.
pub const BLOG_BASE_URL: &str = "http://127.0.0.1:8200";

/// Default base URL of the static essay archive.
pub const ESSAY_BASE_URL: &str = "https://mason.gmu.edu/~rhanson";

/// User-agent sent to the essay archive (the host rejects bare clients).
pub const ESSAY_USER_AGENT: &str = "Mozilla/5.0";

/// Author attributed to archived essays; the archive is a single-author site.
pub const ESSAY_AUTHOR: &str = "Robin Hanson";

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

/// Environment variable for the Postgres connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Environment variable for the YouTube Data API key.
pub const ENV_YOUTUBE_API_KEY: &str = "YOUTUBE_API_KEY";

/// Environment variable for the Spotify client id.
pub const ENV_SPOTIFY_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";

/// Environment variable for the Spotify client secret.
pub const ENV_SPOTIFY_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";

/// Environment variable overriding the blog scraper service base URL.
pub const ENV_BLOG_BASE_URL: &str = "CURIO_BLOG_BASE";

/// Environment variable overriding the essay archive base URL.
pub const ENV_ESSAY_BASE_URL: &str = "CURIO_ESSAY_BASE";

/// Environment variable overriding the sync batch size.
pub const ENV_SYNC_BATCH_SIZE: &str = "CURIO_SYNC_BATCH_SIZE";

// =============================================================================
// SYNC CONFIGURATION
// =============================================================================

/// Configuration for the incremental sync controller.
///
/// Read from environment variables at the composition root; everything
/// below that point receives the values as explicit parameters.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Items per bulk-create batch.
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: SYNC_BATCH_SIZE,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with fallback to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var(ENV_SYNC_BATCH_SIZE) {
            if let Ok(n) = val.parse::<usize>() {
                if n == 0 {
                    tracing::warn!(value = %val, "CURIO_SYNC_BATCH_SIZE must be positive, using default");
                } else {
                    config.batch_size = n.min(SYNC_BATCH_SIZE_MAX);
                }
            } else {
                tracing::warn!(value = %val, "Invalid CURIO_SYNC_BATCH_SIZE, using default");
            }
        }

        config
    }
}
