use opencv::prelude::*;
use opencv::{core, features2d, imgproc};

use crate::compat;
use crate::config::{FeatureKind, StitchConfig};
use crate::error::StitchError;

/// Keypoints and descriptors for one image, in detection order.
///
/// Row `i` of `descriptors` belongs to `keypoints[i]`. An image with no
/// detectable structure yields an empty set; that is valid output, not an
/// error, and the aligner reports it as an insufficient-matches failure.
#[derive(Debug)]
pub struct ImageFeatures {
    pub keypoints: core::Vector<core::KeyPoint>,
    pub descriptors: Mat,
}

impl ImageFeatures {
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Extracts deduplicated features from `image`.
///
/// Detection runs on a grayscale copy, downscaled to `config.work_megapix`
/// megapixels; keypoint coordinates are scaled back to full resolution so
/// downstream estimation is unaffected by the speed knob.
pub fn extract(image: &Mat, config: &StitchConfig) -> Result<ImageFeatures, StitchError> {
    let mut gray = Mat::default();
    if image.channels() == 3 {
        compat::cvt_color(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    } else {
        gray = image.clone();
    }

    let scale = work_scale(image, config.work_megapix);
    let detect_input = if scale < 1.0 {
        let mut small = Mat::default();
        imgproc::resize(
            &gray,
            &mut small,
            core::Size::default(),
            scale,
            scale,
            imgproc::INTER_AREA,
        )?;
        small
    } else {
        gray
    };

    let (mut keypoints, mut descriptors) =
        detect_and_compute(&detect_input, config.feature_kind, config.max_keypoints)?;

    // ORB is capped at creation; the other detectors are capped here so the
    // quadratic dedup below stays bounded.
    if config.max_keypoints > 0 && keypoints.len() > config.max_keypoints as usize {
        let max = config.max_keypoints as usize;
        keypoints = keypoints.iter().take(max).collect();
        descriptors = descriptors
            .row_range(&core::Range::new(0, max as i32)?)?
            .try_clone()?;
    }

    if scale < 1.0 {
        let inv = 1.0 / scale as f32;
        let mut rescaled = core::Vector::<core::KeyPoint>::new();
        for mut kp in keypoints.iter() {
            let p = kp.pt();
            kp.set_pt(core::Point2f::new(p.x * inv, p.y * inv));
            rescaled.push(kp);
        }
        keypoints = rescaled;
    }

    let features = ImageFeatures {
        keypoints,
        descriptors,
    };
    dedup(features, config.dedup_radius)
}

fn detect_and_compute(
    image: &Mat,
    kind: FeatureKind,
    max_keypoints: i32,
) -> Result<(core::Vector<core::KeyPoint>, Mat), StitchError> {
    let mut keypoints = core::Vector::new();
    let mut descriptors = Mat::default();
    match kind {
        FeatureKind::Orb => {
            let mut orb = features2d::ORB::create(
                max_keypoints.max(1),
                1.2,
                8,
                31,
                0,
                2,
                features2d::ORB_ScoreType::HARRIS_SCORE,
                31,
                20,
            )?;
            orb.detect_and_compute(
                image,
                &core::Mat::default(),
                &mut keypoints,
                &mut descriptors,
                false,
            )?;
        }
        FeatureKind::Sift => {
            let mut sift = compat::sift_create()?;
            sift.detect_and_compute(
                image,
                &core::Mat::default(),
                &mut keypoints,
                &mut descriptors,
                false,
            )?;
        }
        FeatureKind::Akaze => {
            let mut akaze = compat::akaze_create()?;
            akaze.detect_and_compute(
                image,
                &core::Mat::default(),
                &mut keypoints,
                &mut descriptors,
                false,
            )?;
        }
        FeatureKind::Brisk => {
            let mut brisk = compat::brisk_create()?;
            brisk.detect_and_compute(
                image,
                &core::Mat::default(),
                &mut keypoints,
                &mut descriptors,
                false,
            )?;
        }
    }
    Ok((keypoints, descriptors))
}

/// Drops every keypoint closer than `radius` pixels to an already-kept one,
/// scanning in detection order. Quadratic over the (capped) keypoint count.
///
/// Running this twice with the same radius changes nothing: every surviving
/// pair is already at least `radius` apart.
pub fn dedup(features: ImageFeatures, radius: f32) -> Result<ImageFeatures, StitchError> {
    if radius <= 0.0 || features.keypoints.is_empty() {
        return Ok(features);
    }

    let r2 = radius * radius;
    let mut kept = core::Vector::<core::KeyPoint>::new();
    let mut kept_rows: Vec<i32> = Vec::new();
    for (i, kp) in features.keypoints.iter().enumerate() {
        let p = kp.pt();
        let mut keep = true;
        for other in kept.iter() {
            let q = other.pt();
            let (dx, dy) = (p.x - q.x, p.y - q.y);
            if dx * dx + dy * dy < r2 {
                keep = false;
                break;
            }
        }
        if keep {
            kept.push(kp);
            kept_rows.push(i as i32);
        }
    }

    if kept.len() == features.keypoints.len() {
        return Ok(features);
    }
    log::debug!(
        "Dedup kept {} of {} keypoints (radius {radius})",
        kept.len(),
        features.keypoints.len()
    );

    let descriptors = if features.descriptors.empty() {
        features.descriptors
    } else {
        let mut rows = Mat::default();
        for &i in &kept_rows {
            rows.push_back(&features.descriptors.row(i)?.try_clone()?)?;
        }
        rows
    };

    Ok(ImageFeatures {
        keypoints: kept,
        descriptors,
    })
}

fn work_scale(image: &Mat, work_megapix: f64) -> f64 {
    if work_megapix <= 0.0 {
        return 1.0;
    }
    let total = (image.rows() as f64) * (image.cols() as f64);
    if total <= 0.0 {
        return 1.0;
    }
    (work_megapix * 1e6 / total).sqrt().min(1.0)
}
