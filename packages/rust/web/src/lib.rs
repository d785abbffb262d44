//! HTTP fetching and article extraction.
//!
//! This crate provides:
//! - [`fetch`] : [`HttpClient`], the page fetcher and thumbnail downloader
//! - [`extract`] : [`ReadabilityExtractor`], a scraper-based article extractor

pub mod extract;
pub mod fetch;

pub use extract::ReadabilityExtractor;
pub use fetch::HttpClient;
