//! OpenCV compatibility wrappers for cross-version support.
//!
//! Different OpenCV versions have different function signatures due to added
//! parameters:
//! - OpenCV 4.11+ added `AlgorithmHint` to `cvt_color`, `gaussian_blur`, etc.
//! - OpenCV 4.8+ added `enable_precise_upscale` to `SIFT::create`
//! - OpenCV 4.7+ added `max_points` to `AKAZE::create`
//!
//! Older versions (e.g., Ubuntu 24.04's OpenCV 4.6) don't have these
//! parameters, and the opencv Rust crate generates different signatures
//! depending on which OpenCV headers are installed. These wrappers use the
//! `_def` variants, which apply OpenCV's default parameter values and exist
//! across all supported versions.

use opencv::core::ToInputArray;
use opencv::core::ToOutputArray;
use opencv::{calib3d, core, features2d, imgproc, Result};

/// Wrapper for `imgproc::cvt_color` that works across OpenCV versions.
/// Uses defaults `dst_cn=0` and (on 4.11+) `hint=ALGO_HINT_DEFAULT`.
pub fn cvt_color(
    src: &impl ToInputArray,
    dst: &mut impl ToOutputArray,
    code: i32,
) -> Result<()> {
    imgproc::cvt_color_def(src, dst, code)
}

/// Wrapper for `imgproc::gaussian_blur` that works across OpenCV versions.
/// Uses defaults `sigma_y=0`, `border_type=BORDER_DEFAULT` and (on 4.11+)
/// `hint=ALGO_HINT_DEFAULT`.
pub fn gaussian_blur(
    src: &impl ToInputArray,
    dst: &mut impl ToOutputArray,
    ksize: core::Size,
    sigma_x: f64,
) -> Result<()> {
    imgproc::gaussian_blur_def(src, dst, ksize, sigma_x)
}

/// Wrapper for `features2d::SIFT::create` that works across OpenCV versions.
/// OpenCV 4.8+ added `enable_precise_upscale` as a 6th parameter. Detects
/// all features (nfeatures=0); the caller caps the keypoint count itself.
pub fn sift_create() -> Result<core::Ptr<features2d::SIFT>> {
    features2d::SIFT::create_def()
}

/// Wrapper for `features2d::AKAZE::create` that works across OpenCV versions.
/// OpenCV 4.7+ added `max_points` as an 8th parameter.
pub fn akaze_create() -> Result<core::Ptr<features2d::AKAZE>> {
    features2d::AKAZE::create_def()
}

/// Wrapper for `features2d::BRISK::create` using the default threshold,
/// octave count and pattern scale.
pub fn brisk_create() -> Result<core::Ptr<features2d::BRISK>> {
    features2d::BRISK::create_def()
}

/// Wrapper for `calib3d::estimate_affine_2d` using the default RANSAC
/// parameters (method=RANSAC, reproj threshold 3.0, 2000 iterations,
/// confidence 0.99, 10 refinement iterations).
pub fn estimate_affine_2d(
    from: &impl ToInputArray,
    to: &impl ToInputArray,
) -> Result<core::Mat> {
    calib3d::estimate_affine_2d_def(from, to)
}

/// Wrapper for `imgproc::find_contours` using the default zero offset.
pub fn find_contours(
    image: &impl ToInputArray,
    contours: &mut impl ToOutputArray,
    mode: i32,
    method: i32,
) -> Result<()> {
    imgproc::find_contours_def(image, contours, mode, method)
}

/// Wrapper for `imgproc::contour_area` with `oriented=false`.
pub fn contour_area(contour: &impl ToInputArray) -> Result<f64> {
    imgproc::contour_area_def(contour)
}

/// Wrapper for `imgproc::get_perspective_transform` using the default
/// decomposition method.
pub fn get_perspective_transform(
    src: &impl ToInputArray,
    dst: &impl ToInputArray,
) -> Result<core::Mat> {
    imgproc::get_perspective_transform_def(src, dst)
}
