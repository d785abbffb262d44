//! Shared types, error model, configuration, and collaborator traits for linkshelf.
//!
//! This crate is the foundation depended on by all other linkshelf crates.
//! It provides:
//! - [`LinkshelfError`] : the unified error type
//! - Domain types ([`Bookmark`], [`Tag`], [`BookmarkId`], [`ExtractedArticle`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)
//! - The collaborator traits the add pipeline is wired from ([`services`])

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, FetchSection, NormalizeSection, StorageSection, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{LinkshelfError, Result};
pub use services::{BookmarkStore, ContentExtractor, IdAllocator, PageFetcher, ThumbnailFetcher};
pub use types::{BOOKMARK_KIND, Bookmark, BookmarkId, ExtractedArticle, Tag};
