//! Stitches a sequence of overlapping photographs of one bill into a single
//! flattened, rectified image.
//!
//! Long receipts rarely fit in one frame, so users capture several
//! overlapping shots. The incremental pipeline aligns each shot against the
//! growing composite canvas (feature matching plus affine or homography
//! estimation), warps it into place, blends the overlap, and finally crops
//! and perspective-flattens the document silhouette:
//!
//! ```no_run
//! use billstitch::{stitch, StitchConfig};
//! # fn run(images: Vec<opencv::core::Mat>) -> Result<(), billstitch::StitchError> {
//! let document = stitch(&images, &StitchConfig::default())?;
//! # Ok(()) }
//! ```
//!
//! Images must be passed in capture order; [`image_io::collect_images`]
//! produces that order from files on disk. [`scans::stitch_scans`] offers
//! OpenCV's one-call scan stitcher as an alternative backend.

pub mod align;
pub mod canvas;
pub mod compat;
pub mod config;
pub mod error;
pub mod features;
pub mod image_io;
pub mod pipeline;
pub mod preprocess;
pub mod rectify;
pub mod scans;

pub use config::{FailurePolicy, FeatureKind, MotionModel, StitchConfig};
pub use error::{AlignError, StitchError};
pub use pipeline::stitch;

pub use opencv;
