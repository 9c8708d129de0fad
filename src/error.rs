use thiserror::Error;

/// Fatal error type for atlas generation.
///
/// Per-record fetch and decode failures are not represented here; they are
/// dropped, counted, and summarized instead (see
/// [`DropReason`](crate::events::DropReason)).
#[derive(Debug, Error)]
pub enum Error {
    /// The image listing could not be read or has no usable URL column.
    #[error("invalid image listing: {0}")]
    Input(String),

    /// Underlying IO error (output directory creation and similar).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// An atlas page failed to encode or persist. Aborts the run; pages
    /// written before the failure stay on disk.
    #[error("failed to write atlas page {index}: {source}")]
    PageWrite { index: u32, source: anyhow::Error },

    /// The manifest failed to serialize or persist. Aborts the run.
    #[error("failed to write manifest: {source}")]
    ManifestWrite { source: anyhow::Error },

    /// A pipeline task ended without delivering its result.
    #[error("pipeline task failed: {0}")]
    Pipeline(String),
}
