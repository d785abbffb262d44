//! Collaborator traits consumed by the add pipeline.
//!
//! Storage and web crates implement these; the core orchestrator holds them
//! as `Arc<dyn ...>` handles so every dependency is passed in explicitly.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::types::{Bookmark, BookmarkId, ExtractedArticle};

/// Issues unique identifiers per entity kind.
///
/// Implementations must be safe under concurrent callers: no two calls for
/// the same kind may ever return the same id.
#[async_trait]
pub trait IdAllocator: Send + Sync {
    async fn allocate_id(&self, kind: &str) -> Result<BookmarkId>;
}

/// Persists finished bookmark records.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Write one bookmark. On success the record is durably queryable.
    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<Bookmark>;
}

/// HTTP GET capability for article pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page body. The response stream is released before returning,
    /// whatever the outcome.
    async fn fetch_page(&self, url: &Url, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

/// Downloads a remote file to a local path.
#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    async fn fetch_file(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Turns a fetched page into structured article data.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, page: &[u8], source_url: &Url) -> Result<ExtractedArticle>;
}
