//! Error types for linkshelf.
//!
//! Library crates use [`LinkshelfError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all linkshelf operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkshelfError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed or incomplete input (e.g. a URL without scheme or host).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Network/HTTP error while fetching a page (includes timeouts and cancellation).
    #[error("network error: {0}")]
    Network(String),

    /// Article content could not be extracted from a fetched page.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// A new bookmark identifier could not be issued.
    #[error("id allocation error: {0}")]
    Allocation(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Thumbnail download or write failed.
    #[error("thumbnail error: {0}")]
    Thumbnail(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LinkshelfError>;

impl LinkshelfError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts an add operation.
    ///
    /// Fetch, extraction and thumbnail failures only degrade the result.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Network(_) | Self::Extraction { .. } | Self::Thumbnail(_)
        )
    }
}
