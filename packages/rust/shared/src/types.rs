//! Core domain types for linkshelf bookmarks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity kind passed to the ID allocator when creating bookmarks.
pub const BOOKMARK_KIND: &str = "bookmark";

// ---------------------------------------------------------------------------
// BookmarkId
// ---------------------------------------------------------------------------

/// Integer bookmark identifier, assigned once by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(pub i64);

impl std::fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BookmarkId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A tag owned by a single bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// ---------------------------------------------------------------------------
// Bookmark
// ---------------------------------------------------------------------------

/// A saved web page, as persisted by the bookmark store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Unique identifier, immutable once assigned.
    pub id: BookmarkId,
    /// Canonical URL (no fragment, no tracking parameters).
    pub url: String,
    /// Never empty; falls back to the URL.
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub author: String,
    /// Plain-text article content.
    #[serde(default)]
    pub content: String,
    /// Raw article markup.
    #[serde(default)]
    pub html: String,
    /// When the record was written.
    pub modified: DateTime<Utc>,
    /// Tags in caller order; duplicates are kept.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

// ---------------------------------------------------------------------------
// ExtractedArticle
// ---------------------------------------------------------------------------

/// Structured article data produced by a content extractor.
///
/// Every field is empty when the page did not provide it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub text_content: String,
    pub html: String,
    /// Absolute URL of the lead image.
    pub image_url: String,
    /// Absolute URL of the site icon.
    pub favicon_url: String,
}
