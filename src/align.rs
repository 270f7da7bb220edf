use opencv::prelude::*;
use opencv::{calib3d, core, features2d};

use crate::compat;
use crate::config::{FeatureKind, MotionModel, StitchConfig};
use crate::error::AlignError;
use crate::features::ImageFeatures;

/// Transforms whose determinant magnitude falls below this collapse the
/// image to (nearly) a line or point and are rejected before any warping.
pub const DET_EPSILON: f64 = 1e-6;

/// Estimates a 3x3 transform mapping next-image coordinates into canvas
/// coordinates.
///
/// The configured motion model is tried first; a failed homography estimate
/// retries once with the affine model before the pair is declared
/// unalignable. An affine primary has no fallback.
pub fn align(
    canvas: &ImageFeatures,
    next: &ImageFeatures,
    config: &StitchConfig,
) -> Result<Mat, AlignError> {
    let (next_pts, canvas_pts) = match_points(canvas, next, config.feature_kind, config.match_conf)?;
    log::debug!("{} correspondences after ratio filter", next_pts.len());

    let models: &[MotionModel] = match config.motion_model {
        MotionModel::Homography => &[MotionModel::Homography, MotionModel::Affine],
        MotionModel::Affine => &[MotionModel::Affine],
    };

    let mut last_err = AlignError::EstimationFailed;
    for &model in models {
        match estimate(model, &next_pts, &canvas_pts) {
            Ok(mut transform) => {
                normalize_orientation(&mut transform)?;
                return Ok(transform);
            }
            Err(err) => {
                log::warn!("{model} estimation failed: {err}");
                last_err = err;
            }
        }
    }
    Err(last_err)
}

/// Nearest-descriptor matching between the canvas features and the next
/// image's features. A knn candidate survives only when its best distance
/// beats the runner-up by the configured confidence margin.
fn match_points(
    canvas: &ImageFeatures,
    next: &ImageFeatures,
    kind: FeatureKind,
    match_conf: f32,
) -> Result<(core::Vector<core::Point2f>, core::Vector<core::Point2f>), AlignError> {
    if canvas.descriptors.empty() || next.descriptors.empty() {
        return Err(AlignError::InsufficientMatches {
            found: 0,
            needed: min_matches(MotionModel::Affine),
        });
    }

    let norm = match kind {
        FeatureKind::Sift => core::NORM_L2,
        FeatureKind::Orb | FeatureKind::Akaze | FeatureKind::Brisk => core::NORM_HAMMING,
    };
    let mut matcher = features2d::BFMatcher::create(norm, false)?;
    let mut train = core::Vector::<Mat>::new();
    train.push(canvas.descriptors.clone());
    matcher.add(&train)?;

    let mut knn = core::Vector::<core::Vector<core::DMatch>>::new();
    matcher.knn_match(&next.descriptors, &mut knn, 2, &Mat::default(), false)?;

    let ratio = 1.0 - match_conf;
    let mut next_pts = core::Vector::<core::Point2f>::new();
    let mut canvas_pts = core::Vector::<core::Point2f>::new();
    for pair in knn.iter() {
        if pair.len() < 2 {
            continue;
        }
        let best = pair.get(0)?;
        let second = pair.get(1)?;
        if best.distance < ratio * second.distance {
            next_pts.push(next.keypoints.get(best.query_idx as usize)?.pt());
            canvas_pts.push(canvas.keypoints.get(best.train_idx as usize)?.pt());
        }
    }
    Ok((next_pts, canvas_pts))
}

fn min_matches(model: MotionModel) -> usize {
    match model {
        MotionModel::Affine => 3,
        MotionModel::Homography => 4,
    }
}

fn estimate(
    model: MotionModel,
    next_pts: &core::Vector<core::Point2f>,
    canvas_pts: &core::Vector<core::Point2f>,
) -> Result<Mat, AlignError> {
    let needed = min_matches(model);
    if next_pts.len() < needed {
        return Err(AlignError::InsufficientMatches {
            found: next_pts.len(),
            needed,
        });
    }

    let transform = match model {
        MotionModel::Affine => {
            let affine = compat::estimate_affine_2d(next_pts, canvas_pts)?;
            if affine.empty() {
                return Err(AlignError::EstimationFailed);
            }
            affine_to_homogeneous(&affine)?
        }
        MotionModel::Homography => {
            let mut inliers = Mat::default();
            let homography = calib3d::find_homography(
                next_pts,
                canvas_pts,
                &mut inliers,
                calib3d::RANSAC,
                3.0,
            )?;
            if homography.empty() {
                return Err(AlignError::EstimationFailed);
            }
            homography
        }
    };

    validate_transform(&transform)?;
    Ok(transform)
}

/// Rejects (near-)singular transforms before they reach the compositor.
pub fn validate_transform(transform: &Mat) -> Result<(), AlignError> {
    let det = core::determinant(transform)?;
    if det.abs() < DET_EPSILON {
        return Err(AlignError::DegenerateTransform { det });
    }
    Ok(())
}

/// A negative determinant of the upper-left 2x2 block means the estimate
/// mirrors the image; negating the second column restores orientation.
/// Applying this to an already-upright transform changes nothing.
pub fn normalize_orientation(transform: &mut Mat) -> opencv::Result<()> {
    let det2 = *transform.at_2d::<f64>(0, 0)? * *transform.at_2d::<f64>(1, 1)?
        - *transform.at_2d::<f64>(0, 1)? * *transform.at_2d::<f64>(1, 0)?;
    if det2 < 0.0 {
        for row in 0..3 {
            *transform.at_2d_mut::<f64>(row, 1)? *= -1.0;
        }
    }
    Ok(())
}

/// Lifts a 2x3 affine estimate into a full 3x3 matrix with [0 0 1] bottom row.
fn affine_to_homogeneous(affine: &Mat) -> opencv::Result<Mat> {
    let mut h = Mat::eye(3, 3, core::CV_64F)?.to_mat()?;
    for row in 0..2 {
        for col in 0..3 {
            *h.at_2d_mut::<f64>(row, col)? = *affine.at_2d::<f64>(row, col)?;
        }
    }
    Ok(h)
}
