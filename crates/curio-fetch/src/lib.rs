//! # curio-fetch
//!
//! Source fetchers and tidiers for curio.
//!
//! This crate provides:
//! - YouTube Data API video source
//! - Spotify Web API episode source (client-credentials auth)
//! - Overcomingbias scraper-service source, including the edit-date index
//! - Static essay-archive source
//! - A source registry for kind-based dispatch
//! - A configurable mock source for tests (feature `mock`)
//!
//! Every source implements the [`curio_core::RawFetcher`] and
//! [`curio_core::ContentSource`] traits: `fetch_batch` downloads
//! provider-native data and `tidy` normalizes it into [`curio_core::ItemDraft`]s
//! positionally aligned with the requested ids.
//!
//! # Example
//!
//! ```rust,no_run
//! use curio_fetch::BlogSource;
//! use curio_core::{ContentSource, RawFetcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = BlogSource::from_env();
//!     let ids = vec!["2009/03/signaling-in-economics".to_string()];
//!     let raw = source.fetch_batch(&ids).await.unwrap();
//!     let drafts = source.tidy(&ids, &raw).unwrap();
//!     assert!(drafts[0].is_some());
//! }
//! ```

pub mod blog;
pub mod essays;
pub mod registry;
pub mod spotify;
pub mod youtube;

// Mock content source for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use curio_core::*;

pub use blog::{clean_link_url, tidy_blog, BlogSource};
pub use essays::{tidy_essays, EssaySource};
pub use registry::SourceRegistry;
pub use spotify::{tidy_spotify, SpotifySource};
pub use youtube::{tidy_youtube, YoutubeSource};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockSource;
