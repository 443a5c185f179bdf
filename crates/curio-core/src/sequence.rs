//! Ordered, named collections of content items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered, named collection of content items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: Uuid,
    pub title: String,
    /// Normalized identifier derived from `title`, unique across sequences.
    pub slug: String,
    pub abstract_text: String,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Membership of one content item in a sequence.
///
/// Positions are contiguous from 1 within a sequence; insert, remove and
/// move renumber siblings to keep them so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMember {
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub content_id: Uuid,
    pub position: i32,
}
