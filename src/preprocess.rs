use opencv::prelude::*;
use opencv::{core, imgproc};

use crate::compat;
use crate::error::StitchError;

/// Photographic cleanup applied to every input before feature work:
/// histogram-based white balance, light Gaussian denoise, and CLAHE
/// contrast enhancement on the Lab lightness channel.
///
/// Bill photos are taken under uneven household lighting; evening out the
/// cast and boosting local contrast makes keypoints repeat much better
/// across shots.
pub fn preprocess(image: &Mat) -> Result<Mat, StitchError> {
    let balanced = white_balance(image)?;

    let mut denoised = Mat::default();
    compat::gaussian_blur(&balanced, &mut denoised, core::Size::new(5, 5), 0.0)?;

    equalize_contrast(&denoised)
}

/// Scales each channel so the foreground mean matches the background mean.
/// The split point is the intensity where the cumulative gray histogram
/// passes 10% of all pixels.
fn white_balance(image: &Mat) -> Result<Mat, StitchError> {
    let mut gray = Mat::default();
    compat::cvt_color(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;

    let mut histogram = [0u32; 256];
    for &value in gray.data_bytes()? {
        histogram[value as usize] += 1;
    }
    let total: u32 = (gray.rows() * gray.cols()) as u32;
    if total == 0 {
        return Ok(image.clone());
    }
    let mut cumulative = 0u32;
    let mut split = 0usize;
    for (intensity, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative as f64 > 0.1 * total as f64 {
            split = intensity;
            break;
        }
    }

    let mut mask = Mat::default();
    imgproc::threshold(&gray, &mut mask, split as f64, 255.0, imgproc::THRESH_BINARY)?;
    let mut inverted = Mat::default();
    core::bitwise_not(&mask, &mut inverted, &core::no_array())?;

    let foreground = core::mean(image, &mask)?;
    let background = core::mean(image, &inverted)?;

    let mut channels = core::Vector::<Mat>::new();
    core::split(image, &mut channels)?;
    let mut scaled = core::Vector::<Mat>::new();
    for c in 0..channels.len() {
        let gain = if foreground[c] > 1e-3 && background[c] > 1e-3 {
            background[c] / foreground[c]
        } else {
            1.0
        };
        let mut channel = Mat::default();
        channels.get(c)?.convert_to(&mut channel, -1, gain, 0.0)?;
        scaled.push(channel);
    }
    let mut balanced = Mat::default();
    core::merge(&scaled, &mut balanced)?;
    Ok(balanced)
}

/// CLAHE on the L channel in Lab space, then back to BGR.
fn equalize_contrast(image: &Mat) -> Result<Mat, StitchError> {
    let mut lab = Mat::default();
    compat::cvt_color(image, &mut lab, imgproc::COLOR_BGR2Lab)?;
    let mut planes = core::Vector::<Mat>::new();
    core::split(&lab, &mut planes)?;

    let mut clahe = imgproc::create_clahe(4.0, core::Size::new(8, 8))?;
    let mut lightness = Mat::default();
    clahe.apply(&planes.get(0)?, &mut lightness)?;
    planes.set(0, lightness)?;

    let mut merged = Mat::default();
    core::merge(&planes, &mut merged)?;
    let mut enhanced = Mat::default();
    compat::cvt_color(&merged, &mut enhanced, imgproc::COLOR_Lab2BGR)?;
    Ok(enhanced)
}
