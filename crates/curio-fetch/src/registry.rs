//! Content source registry for dispatching fetch and tidy calls.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use curio_core::{ContentKind, ContentSource, EditIndexFetcher, Error, Result};

use crate::blog::BlogSource;
use crate::essays::EssaySource;
use crate::spotify::SpotifySource;
use crate::youtube::YoutubeSource;

/// Registry mapping content kinds to their source implementations.
///
/// The blog source additionally exposes the edit-date index handle used by
/// the sync controller.
pub struct SourceRegistry {
    sources: HashMap<ContentKind, Arc<dyn ContentSource>>,
    edit_index: Option<Arc<dyn EditIndexFetcher>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            edit_index: None,
        }
    }

    /// Register a source under its own kind. Replaces any existing source
    /// for the same kind.
    pub fn register(&mut self, source: Arc<dyn ContentSource>) {
        self.sources.insert(source.kind(), source);
    }

    /// Register the edit-date index fetcher.
    pub fn register_edit_index(&mut self, fetcher: Arc<dyn EditIndexFetcher>) {
        self.edit_index = Some(fetcher);
    }

    /// Look up the source for a kind.
    pub fn get(&self, kind: ContentKind) -> Result<&Arc<dyn ContentSource>> {
        self.sources
            .get(&kind)
            .ok_or_else(|| Error::Internal(format!("No content source registered for {}", kind)))
    }

    /// The edit-date index fetcher, when one is registered.
    pub fn edit_index(&self) -> Result<&Arc<dyn EditIndexFetcher>> {
        self.edit_index
            .as_ref()
            .ok_or_else(|| Error::Internal("No edit-date index fetcher registered".into()))
    }

    /// Check if a source is registered for the given kind.
    pub fn has_source(&self, kind: ContentKind) -> bool {
        self.sources.contains_key(&kind)
    }

    /// Kinds that have registered sources.
    pub fn available_kinds(&self) -> Vec<ContentKind> {
        self.sources.keys().copied().collect()
    }

    /// Build the standard registry from environment variables.
    ///
    /// The blog and essay sources have working defaults and are always
    /// registered. YouTube and Spotify need API credentials and are skipped
    /// with a note when theirs are missing.
    pub fn from_env() -> Self {
        let mut registry = Self::new();

        let blog = Arc::new(BlogSource::from_env());
        registry.register_edit_index(blog.clone());
        registry.register(blog);
        registry.register(Arc::new(EssaySource::from_env()));

        match YoutubeSource::from_env() {
            Ok(source) => registry.register(Arc::new(source)),
            Err(e) => debug!(error = %e, "YouTube source not registered"),
        }
        match SpotifySource::from_env() {
            Ok(source) => registry.register(Arc::new(source)),
            Err(e) => debug!(error = %e, "Spotify source not registered"),
        }

        info!(
            source_count = registry.sources.len(),
            "Initialized source registry"
        );
        registry
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
