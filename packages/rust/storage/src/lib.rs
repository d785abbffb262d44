//! Turso Embedded / libSQL storage layer for bookmarks.
//!
//! The [`Storage`] struct wraps a libSQL database holding bookmarks, their
//! tags, per-kind id sequences, and a full-text index. It implements the
//! [`IdAllocator`] and [`BookmarkStore`] collaborators used by the add pipeline.
//!
//! **Access rules:**
//! - `linkshelf add`: read-write via [`Storage::open`]
//! - `linkshelf print`: read-only via [`Storage::open_readonly`]
//!
//! Writes and allocations are serialized through an internal async mutex, so a
//! single handle can be shared by concurrent add operations.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use linkshelf_shared::{
    Bookmark, BookmarkId, BookmarkStore, IdAllocator, LinkshelfError, Result, Tag,
};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinkshelfError::io(parent, e))?;
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LinkshelfError::Storage(format!(
                "no database at {}",
                path.display()
            )));
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly,
            write_lock: Mutex::new(()),
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        LinkshelfError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LinkshelfError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Id sequences
    // -----------------------------------------------------------------------

    /// Bump and return the sequence for `kind`. The first id for a kind is 1.
    #[instrument(skip(self))]
    pub async fn next_id(&self, kind: &str) -> Result<i64> {
        if self.readonly {
            return Err(LinkshelfError::Allocation(
                "database is opened in read-only mode".into(),
            ));
        }
        let _guard = self.write_lock.lock().await;

        let mut rows = self
            .conn
            .query(
                "INSERT INTO id_sequences (kind, last_id) VALUES (?1, 1)
                 ON CONFLICT(kind) DO UPDATE SET last_id = last_id + 1
                 RETURNING last_id",
                params![kind],
            )
            .await
            .map_err(|e| LinkshelfError::Allocation(e.to_string()))?;

        let id = match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| LinkshelfError::Allocation(e.to_string()))?,
            Ok(None) => {
                return Err(LinkshelfError::Allocation(format!(
                    "sequence for {kind} returned no row"
                )));
            }
            Err(e) => return Err(LinkshelfError::Allocation(e.to_string())),
        };

        debug!(kind, id, "allocated id");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Bookmark operations
    // -----------------------------------------------------------------------

    /// Insert a bookmark and its tags in a single transaction.
    #[instrument(skip_all, fields(bookmark_id = %bookmark.id, url = %bookmark.url))]
    pub async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<()> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        tx.execute(
            "INSERT INTO bookmarks (id, url, title, excerpt, author, content, html, modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                bookmark.id.0,
                bookmark.url.as_str(),
                bookmark.title.as_str(),
                bookmark.excerpt.as_str(),
                bookmark.author.as_str(),
                bookmark.content.as_str(),
                bookmark.html.as_str(),
                bookmark.modified.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        for (position, tag) in bookmark.tags.iter().enumerate() {
            tx.execute(
                "INSERT INTO bookmark_tags (bookmark_id, position, name) VALUES (?1, ?2, ?3)",
                params![bookmark.id.0, position as i64, tag.name.as_str()],
            )
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        debug!(tags = bookmark.tags.len(), "bookmark stored");
        Ok(())
    }

    /// Get a bookmark (with tags) by id.
    pub async fn get_bookmark(&self, id: BookmarkId) -> Result<Option<Bookmark>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, title, excerpt, author, content, html, modified
                 FROM bookmarks WHERE id = ?1",
                params![id.0],
            )
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        let mut bookmark = match rows.next().await {
            Ok(Some(row)) => row_to_bookmark(&row)?,
            Ok(None) => return Ok(None),
            Err(e) => return Err(LinkshelfError::Storage(e.to_string())),
        };
        bookmark.tags = self.get_tags(id).await?;
        Ok(Some(bookmark))
    }

    /// List the most recent bookmarks, newest first.
    pub async fn list_bookmarks(&self, limit: u32) -> Result<Vec<Bookmark>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, title, excerpt, author, content, html, modified
                 FROM bookmarks ORDER BY id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?
        {
            results.push(row_to_bookmark(&row)?);
        }
        for bookmark in &mut results {
            bookmark.tags = self.get_tags(bookmark.id).await?;
        }
        Ok(results)
    }

    /// Count stored bookmarks.
    pub async fn count_bookmarks(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM bookmarks", params![])
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map(|n| n.max(0) as u64).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(LinkshelfError::Storage(e.to_string())),
        }
    }

    /// Tags of a bookmark in their stored order.
    async fn get_tags(&self, id: BookmarkId) -> Result<Vec<Tag>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM bookmark_tags WHERE bookmark_id = ?1 ORDER BY position",
                params![id.0],
            )
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        let mut tags = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?
        {
            let name: String = row
                .get(0)
                .map_err(|e| LinkshelfError::Storage(e.to_string()))?;
            tags.push(Tag { name });
        }
        Ok(tags)
    }

    // -----------------------------------------------------------------------
    // FTS search
    // -----------------------------------------------------------------------

    /// Full-text search over bookmark titles, excerpts and content.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>> {
        let mut rows = self
            .conn
            .query(
                "SELECT b.id, b.url, b.title, rank
                 FROM bookmarks_fts fts
                 JOIN bookmarks b ON b.id = fts.rowid
                 WHERE bookmarks_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
                params![query, limit],
            )
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?
        {
            let id: i64 = row
                .get(0)
                .map_err(|e| LinkshelfError::Storage(e.to_string()))?;
            let url: String = row
                .get(1)
                .map_err(|e| LinkshelfError::Storage(e.to_string()))?;
            let title: String = row
                .get(2)
                .map_err(|e| LinkshelfError::Storage(e.to_string()))?;
            let score: f64 = row.get(3).unwrap_or(0.0);
            results.push(SearchResult {
                id: BookmarkId(id),
                url,
                title,
                score,
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl IdAllocator for Storage {
    async fn allocate_id(&self, kind: &str) -> Result<BookmarkId> {
        self.next_id(kind).await.map(BookmarkId)
    }
}

#[async_trait]
impl BookmarkStore for Storage {
    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<Bookmark> {
        self.insert_bookmark(bookmark).await?;
        Ok(bookmark.clone())
    }
}

/// A search result from FTS5.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: BookmarkId,
    pub url: String,
    pub title: String,
    /// FTS5 rank score (lower is better).
    pub score: f64,
}

/// Convert a database row to a [`Bookmark`] without tags.
fn row_to_bookmark(row: &libsql::Row) -> Result<Bookmark> {
    Ok(Bookmark {
        id: BookmarkId(
            row.get::<i64>(0)
                .map_err(|e| LinkshelfError::Storage(e.to_string()))?,
        ),
        url: row
            .get::<String>(1)
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?,
        title: row
            .get::<String>(2)
            .map_err(|e| LinkshelfError::Storage(e.to_string()))?,
        excerpt: row.get::<String>(3).unwrap_or_default(),
        author: row.get::<String>(4).unwrap_or_default(),
        content: row.get::<String>(5).unwrap_or_default(),
        html: row.get::<String>(6).unwrap_or_default(),
        modified: {
            let s: String = row
                .get(7)
                .map_err(|e| LinkshelfError::Storage(e.to_string()))?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| LinkshelfError::Storage(format!("invalid date: {e}")))?
        },
        tags: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("linkshelf_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_bookmark(id: i64, url: &str) -> Bookmark {
        Bookmark {
            id: BookmarkId(id),
            url: url.into(),
            title: "Example Article".into(),
            excerpt: "A short summary".into(),
            author: "Jane Doe".into(),
            content: "Ownership and borrowing explained".into(),
            html: "<p>Ownership and borrowing explained</p>".into(),
            modified: Utc::now(),
            tags: vec![Tag::new("rust"), Tag::new("web"), Tag::new("rust")],
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("linkshelf_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn ids_increase_per_kind() {
        let storage = test_storage().await;

        assert_eq!(storage.next_id("bookmark").await.unwrap(), 1);
        assert_eq!(storage.next_id("bookmark").await.unwrap(), 2);
        // Other kinds have their own sequence
        assert_eq!(storage.next_id("folder").await.unwrap(), 1);
        assert_eq!(storage.next_id("bookmark").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn concurrent_allocations_never_collide() {
        let storage = Arc::new(test_storage().await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage.allocate_id("bookmark").await
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let id = handle.await.expect("task").expect("allocate");
            assert!(seen.insert(id), "duplicate id {id}");
        }
        assert_eq!(seen.len(), 16);
    }

    #[tokio::test]
    async fn save_and_read_back() {
        let storage = test_storage().await;
        let id = storage.allocate_id("bookmark").await.unwrap();
        let bookmark = sample_bookmark(id.0, "https://example.com/a");

        let saved = storage.save_bookmark(&bookmark).await.expect("save");
        assert_eq!(saved.id, id);

        let found = storage.get_bookmark(id).await.expect("get").expect("exists");
        assert_eq!(found.url, "https://example.com/a");
        assert_eq!(found.title, "Example Article");
        assert_eq!(found.author, "Jane Doe");
        // Order and duplicates preserved
        let names: Vec<&str> = found.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "web", "rust"]);

        assert!(storage.get_bookmark(BookmarkId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_url_twice_gives_two_records() {
        let storage = test_storage().await;
        for _ in 0..2 {
            let id = storage.allocate_id("bookmark").await.unwrap();
            storage
                .save_bookmark(&sample_bookmark(id.0, "https://example.com/dup"))
                .await
                .unwrap();
        }

        assert_eq!(storage.count_bookmarks().await.unwrap(), 2);
        let listed = storage.list_bookmarks(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_ne!(listed[0].id, listed[1].id);
        // Newest first
        assert!(listed[0].id > listed[1].id);
    }

    #[tokio::test]
    async fn duplicate_id_is_a_storage_error_and_leaves_no_partial_record() {
        let storage = test_storage().await;
        storage
            .save_bookmark(&sample_bookmark(5, "https://example.com/first"))
            .await
            .unwrap();

        let mut clash = sample_bookmark(5, "https://example.com/second");
        clash.tags = vec![Tag::new("orphan")];
        let err = storage.save_bookmark(&clash).await.unwrap_err();
        assert!(matches!(err, LinkshelfError::Storage(_)));

        let found = storage.get_bookmark(BookmarkId(5)).await.unwrap().unwrap();
        assert_eq!(found.url, "https://example.com/first");
        assert_eq!(found.tags.len(), 3);
    }

    #[tokio::test]
    async fn fts_search() {
        let storage = test_storage().await;

        for (id, title) in [
            (1, "Getting Started Guide"),
            (2, "API Reference Documentation"),
            (3, "Installation Instructions"),
        ] {
            let mut bookmark = sample_bookmark(id, &format!("https://example.com/{id}"));
            bookmark.title = title.into();
            bookmark.content = String::new();
            storage.save_bookmark(&bookmark).await.unwrap();
        }

        let results = storage.search("installation", 10).await.expect("search");
        assert!(!results.is_empty());
        assert_eq!(results[0].id, BookmarkId(3));
        assert_eq!(results[0].title, "Installation Instructions");
    }

    #[tokio::test]
    async fn malformed_search_query_is_an_error() {
        let storage = test_storage().await;
        let mut bookmark = sample_bookmark(1, "https://example.com/1");
        bookmark.title = "Installation Instructions".into();
        storage.save_bookmark(&bookmark).await.unwrap();

        let err = storage.search("\"installation", 10).await.unwrap_err();
        assert!(matches!(err, LinkshelfError::Storage(_)));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("linkshelf_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.save_bookmark(&sample_bookmark(1, "https://example.com"))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_bookmarks(10).await.unwrap().len(), 1);

        let result = ro
            .save_bookmark(&sample_bookmark(2, "https://example.com/b"))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));

        let alloc = ro.allocate_id("bookmark").await;
        assert!(matches!(alloc, Err(LinkshelfError::Allocation(_))));
    }

    #[tokio::test]
    async fn readonly_requires_existing_database() {
        let tmp = std::env::temp_dir().join(format!("linkshelf_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
