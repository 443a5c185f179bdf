//! # curio-core
//!
//! Core types, traits, and abstractions for the curio content archive.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other curio crates depend on.

pub mod classifiers;
pub mod content;
pub mod converters;
pub mod defaults;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod sequence;
pub mod slug;
pub mod text;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use classifiers::{Alias, Classifier, ClassifierKind, ConvertOutcome};
pub use content::{
    ContentFacet, ContentItem, ContentKind, ContentPayload, EssayPayload, ExternalLink, ItemDraft,
    ObPostPayload, SiteMeta, SpotifyPayload, YoutubePayload,
};
pub use converters::{ConverterRegistry, IdScheme, UrlConverter, UrlMatch};
pub use defaults::SyncConfig;
pub use error::{Error, Result};
pub use fetch::{ContentSource, EditIndexFetcher, RawBatch, RawFetcher};
pub use sequence::{Sequence, SequenceMember};
pub use slug::{is_slug, to_slug};
pub use traits::*;
pub use uuid_utils::new_v7;
