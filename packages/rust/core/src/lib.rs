//! Bookmark ingestion for linkshelf.
//!
//! Normalizes caller input, merges it with extracted article data and drives
//! the `add` pipeline against the collaborator traits in `linkshelf-shared`.

pub mod merge;
pub mod normalize;
pub mod pipeline;

pub use merge::{BookmarkDraft, CallerInput, Merged, merge_fields};
pub use normalize::{normalize_space, normalize_tags, normalize_url};
pub use pipeline::{
    AddContext, AddOutcome, AddPhase, AddRequest, AddStatus, AddWarning, PipelineConfig,
    ProgressReporter, SilentProgress, THUMBNAIL_TIMEOUT, WarningStage, add_bookmark,
};
