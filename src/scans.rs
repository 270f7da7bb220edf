use opencv::core;
use opencv::features2d;
use opencv::prelude::*;
use opencv::stitching::{Stitcher, Stitcher_Mode, Stitcher_Status};

use crate::compat;
use crate::error::StitchError;

/// Alternative backend: OpenCV's scan-mode stitcher registers, seam-finds
/// and blends all images in one call.
///
/// Less controllable than the incremental pipeline (no document extraction,
/// no per-image failure policy) but useful as a cross-check on hard inputs.
/// Wave correction is off and the confidence threshold is high: bills are
/// flat scans, not panoramas.
pub fn stitch_scans(images: &[Mat]) -> Result<Mat, StitchError> {
    if images.len() < 2 {
        return Err(StitchError::InsufficientImages(images.len()));
    }

    let mut stitcher = Stitcher::create(Stitcher_Mode::SCANS)?;
    stitcher.set_registration_resol(0.8)?;
    stitcher.set_seam_estimation_resol(0.8)?;
    stitcher.set_compositing_resol(1.0)?;
    stitcher.set_pano_confidence_thresh(0.95)?;
    stitcher.set_wave_correction(false)?;
    let finder: core::Ptr<features2d::Feature2D> = compat::sift_create()?.into();
    stitcher.set_features_finder(finder)?;

    let inputs: core::Vector<Mat> = images.iter().cloned().collect();
    let mut panorama = Mat::default();
    let status = stitcher.stitch(&inputs, &mut panorama)?;
    match status {
        Stitcher_Status::OK => Ok(panorama),
        Stitcher_Status::ERR_NEED_MORE_IMGS => {
            Err(StitchError::ScansBackend("not enough usable images"))
        }
        Stitcher_Status::ERR_HOMOGRAPHY_EST_FAIL => {
            Err(StitchError::ScansBackend("homography estimation failed"))
        }
        Stitcher_Status::ERR_CAMERA_PARAMS_ADJUST_FAIL => Err(StitchError::ScansBackend(
            "camera parameter adjustment failed",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;

    #[test]
    fn test_scans_rejects_single_image() {
        let one =
            Mat::new_rows_cols_with_default(100, 100, core::CV_8UC3, Scalar::all(128.0)).unwrap();
        match stitch_scans(&[one]) {
            Err(StitchError::InsufficientImages(1)) => {}
            other => panic!("expected InsufficientImages, got {other:?}"),
        }
    }
}
