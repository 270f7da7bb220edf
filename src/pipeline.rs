use opencv::prelude::*;
use rayon::prelude::*;

use crate::align;
use crate::canvas::Canvas;
use crate::config::{FailurePolicy, StitchConfig};
use crate::error::StitchError;
use crate::features::{self, ImageFeatures};
use crate::preprocess;
use crate::rectify;

/// Runs the full incremental pipeline: preprocess, extract, align each image
/// against the growing canvas, composite, then crop and flatten the document.
///
/// `images` must already be in capture order (callers sort, e.g. by natural
/// filename order, before handing them over). At least two images are
/// required. When the finished canvas contains no document contour the
/// unrectified canvas is returned instead of an error.
pub fn stitch(images: &[Mat], config: &StitchConfig) -> Result<Mat, StitchError> {
    if images.len() < 2 {
        return Err(StitchError::InsufficientImages(images.len()));
    }
    log::info!(
        "Stitching {} images ({} features, {} model, {} policy)",
        images.len(),
        config.feature_kind,
        config.motion_model,
        config.failure_policy
    );
    let start = std::time::Instant::now();

    // Per-image work is read-only and independent, so it runs up front in
    // parallel. Everything touching the canvas below stays sequential:
    // the canvas is a single-writer accumulator.
    let staged: Vec<(Mat, ImageFeatures)> = images
        .to_vec()
        .into_par_iter()
        .map(|image| {
            let image = if config.preprocess {
                preprocess::preprocess(&image)?
            } else {
                image
            };
            let feats = features::extract(&image, config)?;
            Ok((image, feats))
        })
        .collect::<Result<_, StitchError>>()?;
    log::info!("Features extracted for {} images", staged.len());

    let mut canvas = Canvas::new(staged[0].0.clone());
    let mut stitched = 1usize;
    for (index, (image, feats)) in staged.iter().enumerate().skip(1) {
        let canvas_feats = features::extract(&canvas.image, config)?;
        match align::align(&canvas_feats, feats, config) {
            Ok(transform) => {
                canvas = canvas.composite(image, &transform)?;
                stitched += 1;
                log::info!(
                    "Image {index} stitched; canvas is now {}x{}",
                    canvas.width(),
                    canvas.height()
                );
            }
            Err(reason) => match config.failure_policy {
                FailurePolicy::Strict => {
                    return Err(StitchError::AlignmentFailed { index, reason });
                }
                FailurePolicy::BestEffort => {
                    log::warn!("Skipping image {index}: {reason}");
                }
            },
        }
    }
    log::info!(
        "Composited {stitched}/{} images in {:?}",
        images.len(),
        start.elapsed()
    );

    match rectify::extract_document(&canvas.image) {
        Ok(document) => Ok(document),
        Err(StitchError::NoDocumentFound) => {
            log::warn!("No document contour found; returning the unrectified canvas");
            Ok(canvas.image)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureKind, MotionModel};
    use opencv::core::{self, Scalar};
    use opencv::imgproc;

    fn config_for_synthetic() -> StitchConfig {
        StitchConfig {
            feature_kind: FeatureKind::Orb,
            max_keypoints: 3000,
            dedup_radius: 4.0,
            match_conf: 0.3,
            motion_model: MotionModel::Affine,
            failure_policy: FailurePolicy::Strict,
            work_megapix: 0.0,
            preprocess: false,
        }
    }

    /// Bright textured scene: dark shapes scattered over a light background
    /// so the whole canvas reads as foreground during document extraction.
    fn textured_scene(width: i32, height: i32) -> Mat {
        let mut scene =
            Mat::new_rows_cols_with_default(height, width, core::CV_8UC3, Scalar::all(190.0))
                .unwrap();
        // deterministic pseudo-random scatter
        let mut state = 0x2545f491u64;
        for _ in 0..120 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = (state >> 33) as i32 % width.max(1);
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = (state >> 33) as i32 % height.max(1);
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let shade = 20.0 + ((state >> 33) % 90) as f64;
            imgproc::rectangle(
                &mut scene,
                core::Rect::new(x, y, 9 + (x % 7), 9 + (y % 5)),
                Scalar::all(shade),
                -1,
                imgproc::LINE_8,
                0,
            )
            .unwrap();
        }
        scene
    }

    fn crop(scene: &Mat, rect: core::Rect) -> Mat {
        Mat::roi(scene, rect).unwrap().try_clone().unwrap()
    }

    #[test]
    fn test_fewer_than_two_images_is_rejected_before_any_work() {
        let config = config_for_synthetic();
        match stitch(&[], &config) {
            Err(StitchError::InsufficientImages(0)) => {}
            other => panic!("expected InsufficientImages(0), got {other:?}"),
        }
        let one = textured_scene(100, 100);
        match stitch(&[one], &config) {
            Err(StitchError::InsufficientImages(1)) => {}
            other => panic!("expected InsufficientImages(1), got {other:?}"),
        }
    }

    #[test]
    fn test_two_overlapping_shots_reassemble_the_scene() {
        let scene = textured_scene(400, 250);
        let left = crop(&scene, core::Rect::new(0, 0, 250, 250));
        let right = crop(&scene, core::Rect::new(150, 0, 250, 250));

        let result = stitch(&[left, right], &config_for_synthetic()).unwrap();

        // the reassembled document should be close to the original extent;
        // alignment jitter and the crop stage allow a small tolerance
        assert!(
            (result.cols() - 400).abs() <= 10,
            "unexpected width {}",
            result.cols()
        );
        assert!(
            (result.rows() - 250).abs() <= 10,
            "unexpected height {}",
            result.rows()
        );
    }

    #[test]
    fn test_strict_policy_reports_unalignable_image() {
        let scene = textured_scene(300, 200);
        let left = crop(&scene, core::Rect::new(0, 0, 180, 200));
        // featureless frame: nothing to match against
        let blank = Mat::new_rows_cols_with_default(200, 180, core::CV_8UC3, Scalar::all(190.0))
            .unwrap();

        match stitch(&[left, blank], &config_for_synthetic()) {
            Err(StitchError::AlignmentFailed { index: 1, .. }) => {}
            other => panic!("expected AlignmentFailed for image 1, got {other:?}"),
        }
    }

    #[test]
    fn test_best_effort_policy_skips_unalignable_image() {
        let scene = textured_scene(400, 250);
        let left = crop(&scene, core::Rect::new(0, 0, 250, 250));
        let right = crop(&scene, core::Rect::new(150, 0, 250, 250));
        let blank = Mat::new_rows_cols_with_default(250, 250, core::CV_8UC3, Scalar::all(190.0))
            .unwrap();

        let config = StitchConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..config_for_synthetic()
        };
        let result = stitch(&[left, blank, right], &config).unwrap();
        assert!((result.cols() - 400).abs() <= 10);
        assert!((result.rows() - 250).abs() <= 10);
    }
}
