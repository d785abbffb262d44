//! Field merger: combine caller input with extracted article data.
//!
//! [`merge_fields`] is pure. It takes what the caller supplied and whatever
//! the extractor produced (if it ran and succeeded) and returns the final
//! draft in one step.

use chrono::{DateTime, Utc};
use url::Url;

use linkshelf_shared::{Bookmark, BookmarkId, ExtractedArticle, Tag};

use crate::normalize::normalize_space;

/// Fields supplied by the caller of `add`. Tags are already normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerInput {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Vec<Tag>,
}

/// A bookmark record without an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkDraft {
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub content: String,
    pub html: String,
    pub tags: Vec<Tag>,
}

impl BookmarkDraft {
    /// Attach the allocated id and timestamp.
    pub fn into_bookmark(self, id: BookmarkId, modified: DateTime<Utc>) -> Bookmark {
        Bookmark {
            id,
            url: self.url,
            title: self.title,
            excerpt: self.excerpt,
            author: self.author,
            content: self.content,
            html: self.html,
            modified,
            tags: self.tags,
        }
    }
}

/// Result of merging: the draft plus the transient thumbnail source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub draft: BookmarkDraft,
    /// Article image, else favicon. Never persisted.
    pub image_url: Option<String>,
}

/// Decide every final field from caller input and extraction output.
///
/// Pass `None` for `extracted` in offline mode or when the fetch or the
/// extraction failed; no partial extraction data is ever used.
pub fn merge_fields(
    canonical_url: &Url,
    caller: &CallerInput,
    extracted: Option<&ExtractedArticle>,
) -> Merged {
    let url = canonical_url.to_string();

    let title = first_non_empty([
        caller.title.as_deref().map(normalize_space),
        extracted.map(|a| normalize_space(&a.title)),
    ])
    .unwrap_or_else(|| url.clone());

    let excerpt = first_non_empty([
        caller.excerpt.as_deref().map(normalize_space),
        extracted.map(|a| normalize_space(&a.excerpt)),
    ])
    .unwrap_or_default();

    let image_url = extracted.and_then(|a| {
        first_non_empty([
            Some(a.image_url.trim().to_string()),
            Some(a.favicon_url.trim().to_string()),
        ])
    });

    let draft = BookmarkDraft {
        url,
        title,
        excerpt,
        author: extracted.map(|a| a.author.clone()).unwrap_or_default(),
        content: extracted.map(|a| a.text_content.clone()).unwrap_or_default(),
        html: extracted.map(|a| a.html.clone()).unwrap_or_default(),
        tags: caller.tags.clone(),
    };

    Merged { draft, image_url }
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}
