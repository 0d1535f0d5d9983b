//! Review items - the words and questions a learner practices
//!
//! Each item carries:
//! - A stable identifier (UUID v4)
//! - An opaque JSON content payload (never inspected by the scheduler)
//! - Its kind (word or question)
//! - Tags used for topic filtering

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retention::RetentionState;

// ============================================================================
// ITEM KINDS
// ============================================================================

/// Kind of review item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A vocabulary word
    #[default]
    Word,
    /// A practice question
    Question,
}

impl ItemKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Word => "word",
            ItemKind::Question => "question",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "word" | "vocab" => Ok(ItemKind::Word),
            "question" => Ok(ItemKind::Question),
            _ => Err(format!("Unknown item kind: {}", s)),
        }
    }
}

// ============================================================================
// ITEM
// ============================================================================

/// A vocabulary word or question eligible for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Word or question
    pub kind: ItemKind,
    /// Content payload, opaque to scheduling
    pub content: serde_json::Value,
    /// Topic tags
    pub tags: Vec<String>,
    /// When the item was registered; secondary ordering key for new items
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// True when any of this item's tags appears in `topics`.
    ///
    /// An empty topic list matches everything.
    pub fn matches_topics(&self, topics: &[String]) -> bool {
        topics.is_empty() || self.tags.iter().any(|t| topics.contains(t))
    }
}

/// Input for registering a new item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    /// Word or question
    #[serde(default)]
    pub kind: ItemKind,
    /// Content payload
    pub content: serde_json::Value,
    /// Topic tags (duplicates are dropped)
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An item paired with its current retention state
///
/// This is what the item store hands to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub item: Item,
    pub state: RetentionState,
}

impl Candidate {
    pub fn new(item: Item, state: RetentionState) -> Self {
        Self { item, state }
    }
}

/// Normalise a tag list: trim, drop empties, keep first occurrence of duplicates.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}
