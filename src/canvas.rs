use opencv::prelude::*;
use opencv::{core, imgproc};

use crate::error::StitchError;

/// The growing composite image, plus the offset of its current top-left
/// corner in the coordinate frame of the very first image.
///
/// The canvas is a replace-on-write accumulator: `composite` consumes the
/// old value and returns a new one covering the union of both footprints,
/// so there is never more than one live copy to mutate.
pub struct Canvas {
    pub image: Mat,
    pub origin: core::Point,
}

impl Canvas {
    pub fn new(first: Mat) -> Self {
        Self {
            image: first,
            origin: core::Point::new(0, 0),
        }
    }

    pub fn width(&self) -> i32 {
        self.image.cols()
    }

    pub fn height(&self) -> i32 {
        self.image.rows()
    }

    /// Warps `next` into canvas space through `transform` (3x3, CV_64F) and
    /// merges it with the current content.
    ///
    /// The output bounding box is the union of the old canvas rectangle and
    /// every projected corner of `next`, so neither side is ever clipped.
    /// Black pixels in the warped buffer count as "no coverage"; where both
    /// sides cover a pixel the result is their 50/50 average. Degenerate
    /// transforms must have been rejected upstream; for any valid transform
    /// this operation cannot fail.
    pub fn composite(self, next: &Mat, transform: &Mat) -> Result<Canvas, StitchError> {
        let (w, h) = (next.cols() as f64, next.rows() as f64);
        let mut corners = core::Vector::<core::Point2d>::new();
        corners.push(core::Point2d::new(0.0, 0.0));
        corners.push(core::Point2d::new(w, 0.0));
        corners.push(core::Point2d::new(w, h));
        corners.push(core::Point2d::new(0.0, h));
        let mut projected = core::Vector::<core::Point2d>::new();
        core::perspective_transform(&corners, &mut projected, transform)?;

        let (mut min_x, mut min_y) = (0i32, 0i32);
        let (mut max_x, mut max_y) = (self.width(), self.height());
        for p in projected.iter() {
            let (x, y) = (p.x.round() as i32, p.y.round() as i32);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let out_size = core::Size::new(max_x - min_x, max_y - min_y);
        log::debug!(
            "Canvas grows {}x{} -> {}x{} (offset {min_x},{min_y})",
            self.width(),
            self.height(),
            out_size.width,
            out_size.height
        );

        // shift everything so the union box starts at (0,0)
        let mut translation = Mat::eye(3, 3, core::CV_64F)?.to_mat()?;
        *translation.at_2d_mut::<f64>(0, 2)? = -(min_x as f64);
        *translation.at_2d_mut::<f64>(1, 2)? = -(min_y as f64);
        let mut shifted = Mat::default();
        core::gemm(
            &translation,
            transform,
            1.0,
            &Mat::default(),
            0.0,
            &mut shifted,
            0,
        )?;

        let mut warped = Mat::default();
        imgproc::warp_perspective(
            next,
            &mut warped,
            &shifted,
            out_size,
            imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            core::Scalar::default(),
        )?;

        let mut merged = Mat::new_rows_cols_with_default(
            out_size.height,
            out_size.width,
            core::CV_8UC3,
            core::Scalar::all(0.0),
        )?;
        let background = core::Vec3b::default();
        for y in 0..out_size.height {
            for x in 0..out_size.width {
                // position of this output pixel in the old canvas
                let (old_x, old_y) = (x + min_x, y + min_y);
                let in_old =
                    old_x >= 0 && old_x < self.width() && old_y >= 0 && old_y < self.height();
                let new_px = *warped.at_2d::<core::Vec3b>(y, x)?;

                let px = if in_old && new_px != background {
                    let old_px = *self.image.at_2d::<core::Vec3b>(old_y, old_x)?;
                    blend(old_px, new_px)
                } else if new_px != background {
                    new_px
                } else if in_old {
                    *self.image.at_2d::<core::Vec3b>(old_y, old_x)?
                } else {
                    background
                };
                *merged.at_2d_mut::<core::Vec3b>(y, x)? = px;
            }
        }

        Ok(Canvas {
            image: merged,
            origin: core::Point::new(self.origin.x + min_x, self.origin.y + min_y),
        })
    }
}

#[inline]
fn blend(a: core::Vec3b, b: core::Vec3b) -> core::Vec3b {
    core::Vec3b::from([
        ((a[0] as u16 + b[0] as u16) / 2) as u8,
        ((a[1] as u16 + b[1] as u16) / 2) as u8,
        ((a[2] as u16 + b[2] as u16) / 2) as u8,
    ])
}
