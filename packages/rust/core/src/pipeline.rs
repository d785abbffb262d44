//! End-to-end `add` pipeline: URL → (fetch → extract) → merge → allocate → save → thumbnail.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

use linkshelf_shared::{
    AppConfig, BOOKMARK_KIND, Bookmark, BookmarkId, BookmarkStore, ContentExtractor,
    ExtractedArticle, IdAllocator, LinkshelfError, PageFetcher, Result, ThumbnailFetcher,
};

use crate::merge::{CallerInput, Merged, merge_fields};
use crate::normalize::{normalize_tags, normalize_url};

/// Upper bound on a single thumbnail download.
pub const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Configuration and collaborators
// ---------------------------------------------------------------------------

/// Runtime settings for the `add` pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Thumbnails are written to `<thumbnail_dir>/<bookmark id>`.
    pub thumbnail_dir: PathBuf,
    /// Query parameter names stripped during URL normalization.
    pub tracking_params: Vec<String>,
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            thumbnail_dir: config.thumbnail_dir()?,
            tracking_params: config.normalize.tracking_params.clone(),
        })
    }

    /// Destination of the thumbnail for bookmark `id`.
    pub fn thumbnail_path(&self, id: BookmarkId) -> PathBuf {
        self.thumbnail_dir.join(id.to_string())
    }
}

/// Everything `add_bookmark` talks to.
#[derive(Clone)]
pub struct AddContext {
    pub allocator: Arc<dyn IdAllocator>,
    pub store: Arc<dyn BookmarkStore>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub thumbnails: Arc<dyn ThumbnailFetcher>,
    pub config: PipelineConfig,
}

/// One `add` invocation as requested by the caller.
#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub url: String,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Vec<String>,
    /// Skip the page fetch and the thumbnail entirely.
    pub offline: bool,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Pipeline states, in the order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPhase {
    Validating,
    OfflineDraft,
    Fetching,
    Extracting,
    Merging,
    Allocating,
    Persisting,
    ThumbnailFetching,
    Done,
}

impl std::fmt::Display for AddPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Validating => "Validating URL",
            Self::OfflineDraft => "Building offline draft",
            Self::Fetching => "Fetching page",
            Self::Extracting => "Extracting content",
            Self::Merging => "Merging fields",
            Self::Allocating => "Allocating id",
            Self::Persisting => "Saving bookmark",
            Self::ThumbnailFetching => "Downloading thumbnail",
            Self::Done => "Done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddStatus {
    /// Saved; thumbnail absent or downloaded.
    Success,
    /// Saved; the thumbnail download failed.
    PartialSuccess,
}

/// Step that produced a non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningStage {
    Fetch,
    Extraction,
    Thumbnail,
}

impl std::fmt::Display for WarningStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Extraction => "extraction",
            Self::Thumbnail => "thumbnail",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddWarning {
    pub stage: WarningStage,
    pub message: String,
}

/// Result of a successful `add`.
#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    /// The record as persisted.
    pub bookmark: Bookmark,
    pub status: AddStatus,
    /// Local thumbnail path, set only when the download succeeded.
    pub thumbnail: Option<PathBuf>,
    pub warnings: Vec<AddWarning>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, phase: AddPhase);
    /// Called for each non-fatal failure.
    fn warning(&self, warning: &AddWarning);
    /// Called when the bookmark has been saved and the pipeline finished.
    fn done(&self, outcome: &AddOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: AddPhase) {}
    fn warning(&self, _warning: &AddWarning) {}
    fn done(&self, _outcome: &AddOutcome) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the `add` pipeline for one URL.
///
/// Fatal errors (`Validation`, `Allocation`, `Storage`) abort and are
/// returned as `Err`. Fetch, extraction and thumbnail failures are logged and
/// collected in [`AddOutcome::warnings`]; the bookmark is still saved.
#[instrument(skip_all, fields(url = %request.url, offline = request.offline))]
pub async fn add_bookmark(
    ctx: &AddContext,
    request: &AddRequest,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<AddOutcome> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    progress.phase(AddPhase::Validating);
    let url = normalize_url(&request.url, &ctx.config.tracking_params)?;
    let caller = CallerInput {
        title: request.title.clone(),
        excerpt: request.excerpt.clone(),
        tags: normalize_tags(&request.tags),
    };

    let extracted = if request.offline {
        progress.phase(AddPhase::OfflineDraft);
        None
    } else {
        // The canonical URL is fetched; tracking parameters are never sent upstream.
        enrich(ctx, &url, progress, cancel, &mut warnings).await
    };

    progress.phase(AddPhase::Merging);
    let Merged { draft, image_url } = merge_fields(&url, &caller, extracted.as_ref());

    progress.phase(AddPhase::Allocating);
    let id = ctx
        .allocator
        .allocate_id(BOOKMARK_KIND)
        .await
        .map_err(as_allocation_error)?;

    progress.phase(AddPhase::Persisting);
    let bookmark = ctx
        .store
        .save_bookmark(&draft.into_bookmark(id, Utc::now()))
        .await
        .map_err(|e| {
            warn!(bookmark_id = %id, error = %e, "save failed, id abandoned");
            as_storage_error(e)
        })?;
    info!(bookmark_id = %bookmark.id, url = %bookmark.url, "bookmark saved");

    let mut status = AddStatus::Success;
    let mut thumbnail = None;

    if let Some(image_url) = image_url {
        progress.phase(AddPhase::ThumbnailFetching);
        let dest = ctx.config.thumbnail_path(bookmark.id);
        match ctx
            .thumbnails
            .fetch_file(&image_url, &dest, THUMBNAIL_TIMEOUT, cancel)
            .await
        {
            Ok(()) => thumbnail = Some(dest),
            Err(e) => {
                status = AddStatus::PartialSuccess;
                report(progress, &mut warnings, WarningStage::Thumbnail, &e);
            }
        }
    }

    progress.phase(AddPhase::Done);
    let outcome = AddOutcome {
        bookmark,
        status,
        thumbnail,
        warnings,
        elapsed: start.elapsed(),
    };
    progress.done(&outcome);

    info!(
        bookmark_id = %outcome.bookmark.id,
        status = ?outcome.status,
        warnings = outcome.warnings.len(),
        elapsed_ms = outcome.elapsed.as_millis(),
        "add pipeline complete"
    );

    Ok(outcome)
}

/// Fetch and extract the page. Any failure yields `None` and a warning.
async fn enrich(
    ctx: &AddContext,
    url: &Url,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
    warnings: &mut Vec<AddWarning>,
) -> Option<ExtractedArticle> {
    progress.phase(AddPhase::Fetching);
    let page = match ctx.fetcher.fetch_page(url, cancel).await {
        Ok(page) => page,
        Err(e) => {
            report(progress, warnings, WarningStage::Fetch, &e);
            return None;
        }
    };

    progress.phase(AddPhase::Extracting);
    match ctx.extractor.extract(&page, url) {
        Ok(article) => Some(article),
        Err(e) => {
            report(progress, warnings, WarningStage::Extraction, &e);
            None
        }
    }
}

fn report(
    progress: &dyn ProgressReporter,
    warnings: &mut Vec<AddWarning>,
    stage: WarningStage,
    error: &LinkshelfError,
) {
    warn!(%stage, error = %error, "non-fatal failure, continuing");
    let warning = AddWarning {
        stage,
        message: error.to_string(),
    };
    progress.warning(&warning);
    warnings.push(warning);
}

fn as_allocation_error(e: LinkshelfError) -> LinkshelfError {
    match e {
        LinkshelfError::Allocation(_) => e,
        other => LinkshelfError::Allocation(other.to_string()),
    }
}

fn as_storage_error(e: LinkshelfError) -> LinkshelfError {
    match e {
        LinkshelfError::Storage(_) => e,
        other => LinkshelfError::Storage(other.to_string()),
    }
}
