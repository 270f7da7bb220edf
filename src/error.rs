use thiserror::Error;

/// Why a single canvas/image alignment attempt failed.
///
/// Carried inside [`StitchError::AlignmentFailed`] together with the index
/// of the offending image.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("not enough correspondences ({found} found, {needed} needed)")]
    InsufficientMatches { found: usize, needed: usize },

    #[error("transform is degenerate (|det| = {det:.3e})")]
    DegenerateTransform { det: f64 },

    #[error("transform estimation did not converge")]
    EstimationFailed,

    #[error(transparent)]
    Backend(#[from] opencv::Error),
}

/// Top-level error type for the stitching pipeline.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("need at least 2 images, got {0}")]
    InsufficientImages(usize),

    #[error("unknown {axis}: '{name}'")]
    UnknownStrategy { axis: &'static str, name: String },

    #[error("alignment failed for image {index}: {reason}")]
    AlignmentFailed { index: usize, reason: AlignError },

    #[error("no document contour found in the stitched canvas")]
    NoDocumentFound,

    #[error("scan-mode stitcher failed: {0}")]
    ScansBackend(&'static str),

    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}
