//! Classifier and alias types.
//!
//! Classifiers are the shared labels attached to content items: authors,
//! ideas, topics, and tags. Every classifier owns a set of aliases used
//! for identity resolution; exactly one alias is protected and mirrors
//! the classifier's current slug.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CLASSIFIER KIND
// =============================================================================

/// The four classifier kinds.
///
/// Names, slugs, and alias texts are unique within a kind; the same text
/// may exist under different kinds simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// Creator of a content item. No description field.
    Author,

    /// A recurring idea tracked across items. Carries a description.
    Idea,

    /// A broad subject area. Carries a description.
    Topic,

    /// Free-form label. No description field.
    Tag,
}

impl ClassifierKind {
    /// All kinds in resolution order (the order `save_item` tries when
    /// attaching plain classifier names: idea, then topic, then tag).
    pub const ALL: [ClassifierKind; 4] = [
        ClassifierKind::Author,
        ClassifierKind::Idea,
        ClassifierKind::Topic,
        ClassifierKind::Tag,
    ];

    /// Whether this kind carries a description. Descriptions supplied for
    /// kinds that do not support them are discarded on save and merge.
    pub fn supports_description(&self) -> bool {
        matches!(self, ClassifierKind::Idea | ClassifierKind::Topic)
    }
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Author => write!(f, "author"),
            Self::Idea => write!(f, "idea"),
            Self::Topic => write!(f, "topic"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

impl std::str::FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "author" => Ok(Self::Author),
            "idea" => Ok(Self::Idea),
            "topic" => Ok(Self::Topic),
            "tag" => Ok(Self::Tag),
            _ => Err(format!("Invalid classifier kind: {}", s)),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A named, de-duplicatable label attachable to content items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    pub id: Uuid,
    pub kind: ClassifierKind,

    /// Display name, unique within the kind.
    pub name: String,

    /// Normalized identifier derived from `name`, unique within the kind.
    pub slug: String,

    /// Only present for kinds where [`ClassifierKind::supports_description`]
    /// holds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// An alternate text form resolving to a classifier.
///
/// Alias text is stored in slug form. The protected alias mirrors the
/// owner's current slug and cannot be removed directly; it moves when the
/// owner is renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub id: Uuid,

    /// Always equal to the owning classifier's kind.
    pub kind: ClassifierKind,

    /// Slug-form text, unique within the kind.
    pub text: String,

    /// True exactly when `text` equals the owner's current slug.
    pub protected: bool,

    pub classifier_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
}

// =============================================================================
// BULK OUTCOMES
// =============================================================================

/// Result of a bulk conversion: per-item alias collisions are counted
/// rather than aborting the remaining items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOutcome {
    /// Items successfully converted to the target kind.
    pub converted: usize,
    /// Items skipped because their name or an alias collided.
    pub failed: usize,
}
