//! SQL migration definitions for the linkshelf database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: bookmarks, bookmark_tags, id_sequences, FTS5",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Per-kind identifier sequences; last_id only ever grows
CREATE TABLE IF NOT EXISTS id_sequences (
    kind    TEXT PRIMARY KEY,
    last_id INTEGER NOT NULL
);

-- Saved bookmarks (no uniqueness on url)
CREATE TABLE IF NOT EXISTS bookmarks (
    id       INTEGER PRIMARY KEY,
    url      TEXT NOT NULL,
    title    TEXT NOT NULL,
    excerpt  TEXT NOT NULL DEFAULT '',
    author   TEXT NOT NULL DEFAULT '',
    content  TEXT NOT NULL DEFAULT '',
    html     TEXT NOT NULL DEFAULT '',
    modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_url ON bookmarks(url);

-- Tags owned by a bookmark, in caller order
CREATE TABLE IF NOT EXISTS bookmark_tags (
    bookmark_id INTEGER NOT NULL REFERENCES bookmarks(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    name        TEXT NOT NULL,
    PRIMARY KEY (bookmark_id, position)
);

-- Full-text search on bookmarks
CREATE VIRTUAL TABLE IF NOT EXISTS bookmarks_fts USING fts5(
    title,
    excerpt,
    content,
    content=bookmarks,
    content_rowid=id
);

-- Triggers to keep FTS in sync with bookmarks table
CREATE TRIGGER IF NOT EXISTS bookmarks_fts_insert AFTER INSERT ON bookmarks BEGIN
    INSERT INTO bookmarks_fts(rowid, title, excerpt, content)
    VALUES (new.id, new.title, new.excerpt, new.content);
END;

CREATE TRIGGER IF NOT EXISTS bookmarks_fts_delete AFTER DELETE ON bookmarks BEGIN
    INSERT INTO bookmarks_fts(bookmarks_fts, rowid, title, excerpt, content)
    VALUES ('delete', old.id, old.title, old.excerpt, old.content);
END;

CREATE TRIGGER IF NOT EXISTS bookmarks_fts_update AFTER UPDATE ON bookmarks BEGIN
    INSERT INTO bookmarks_fts(bookmarks_fts, rowid, title, excerpt, content)
    VALUES ('delete', old.id, old.title, old.excerpt, old.content);
    INSERT INTO bookmarks_fts(rowid, title, excerpt, content)
    VALUES (new.id, new.title, new.excerpt, new.content);
END;

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
