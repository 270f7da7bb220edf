use opencv::prelude::*;
use opencv::{core, imgproc};

use crate::compat;
use crate::error::StitchError;

/// Four document corners, clockwise from top-left.
pub type DocumentCorners = [core::Point2f; 4];

/// Finds the document silhouette in the stitched canvas, crops to its
/// bounding rectangle and flattens it into an axis-aligned output.
///
/// Every non-black pixel counts as foreground; the largest external contour
/// is assumed to be the document (ties keep the first one found). Callers
/// should treat [`StitchError::NoDocumentFound`] as an expected outcome on
/// busy backgrounds and fall back to the unrectified canvas.
pub fn extract_document(canvas: &Mat) -> Result<Mat, StitchError> {
    let mut gray = Mat::default();
    compat::cvt_color(canvas, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    let mut mask = Mat::default();
    imgproc::threshold(&gray, &mut mask, 0.0, 255.0, imgproc::THRESH_BINARY)?;

    let mut contours = core::Vector::<core::Vector<core::Point>>::new();
    compat::find_contours(
        &mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
    )?;
    if contours.is_empty() {
        return Err(StitchError::NoDocumentFound);
    }

    let mut best = 0usize;
    let mut best_area = 0.0f64;
    for (i, contour) in contours.iter().enumerate() {
        let area = compat::contour_area(&contour)?;
        if area > best_area {
            best_area = area;
            best = i;
        }
    }

    let rect = imgproc::bounding_rect(&contours.get(best)?)?;
    // a sliver this thin cannot anchor a perspective solve
    if rect.width < 2 || rect.height < 2 {
        return Err(StitchError::NoDocumentFound);
    }
    log::info!(
        "Document bounds: {}x{} at ({}, {})",
        rect.width,
        rect.height,
        rect.x,
        rect.y
    );

    let cropped = Mat::roi(canvas, rect)?.try_clone()?;
    let (w, h) = (rect.width as f32, rect.height as f32);
    let corners: DocumentCorners = [
        core::Point2f::new(0.0, 0.0),
        core::Point2f::new(w, 0.0),
        core::Point2f::new(w, h),
        core::Point2f::new(0.0, h),
    ];
    rectify(&cropped, &corners)
}

/// Warps the quadrilateral `corners` in `image` onto an axis-aligned
/// rectangle. Output width/height use the longer of the two parallel edge
/// estimates per axis, which compensates for perspective skew.
pub fn rectify(image: &Mat, corners: &DocumentCorners) -> Result<Mat, StitchError> {
    let [tl, tr, br, bl] = *corners;
    let width = edge_length(tl, tr).max(edge_length(bl, br));
    let height = edge_length(tr, br).max(edge_length(tl, bl));
    let out_size = core::Size::new(width.round() as i32, height.round() as i32);
    if out_size.width < 1 || out_size.height < 1 {
        return Err(StitchError::NoDocumentFound);
    }

    let mut src = core::Vector::<core::Point2f>::new();
    for corner in corners {
        src.push(*corner);
    }
    let mut dst = core::Vector::<core::Point2f>::new();
    dst.push(core::Point2f::new(0.0, 0.0));
    dst.push(core::Point2f::new(out_size.width as f32 - 1.0, 0.0));
    dst.push(core::Point2f::new(
        out_size.width as f32 - 1.0,
        out_size.height as f32 - 1.0,
    ));
    dst.push(core::Point2f::new(0.0, out_size.height as f32 - 1.0));

    let transform = compat::get_perspective_transform(&src, &dst)?;
    let mut flattened = Mat::default();
    imgproc::warp_perspective(
        image,
        &mut flattened,
        &transform,
        out_size,
        imgproc::INTER_LINEAR,
        core::BORDER_CONSTANT,
        core::Scalar::default(),
    )?;
    Ok(flattened)
}

fn edge_length(a: core::Point2f, b: core::Point2f) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;

    #[test]
    fn test_all_black_canvas_has_no_document() {
        let canvas =
            Mat::new_rows_cols_with_default(120, 200, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        match extract_document(&canvas) {
            Err(StitchError::NoDocumentFound) => {}
            other => panic!("expected NoDocumentFound, got {other:?}"),
        }
    }

    #[test]
    fn test_axis_aligned_document_is_returned_unchanged() {
        // white 150x90 rectangle on a black canvas: its corners already form
        // an axis-aligned rectangle, so rectification is the identity
        let mut canvas =
            Mat::new_rows_cols_with_default(200, 300, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        imgproc::rectangle(
            &mut canvas,
            core::Rect::new(40, 60, 150, 90),
            Scalar::all(255.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let document = extract_document(&canvas).unwrap();
        assert_eq!(document.cols(), 150);
        assert_eq!(document.rows(), 90);
        for &(x, y) in &[(2, 2), (147, 2), (147, 87), (2, 87), (75, 45)] {
            assert_eq!(
                *document.at_2d::<core::Vec3b>(y, x).unwrap(),
                core::Vec3b::from([255, 255, 255]),
                "pixel ({x},{y}) changed"
            );
        }
    }

    #[test]
    fn test_largest_blob_wins() {
        let mut canvas =
            Mat::new_rows_cols_with_default(200, 300, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        // small speck and a large document blob
        imgproc::rectangle(
            &mut canvas,
            core::Rect::new(5, 5, 10, 10),
            Scalar::all(200.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        imgproc::rectangle(
            &mut canvas,
            core::Rect::new(100, 50, 120, 100),
            Scalar::all(200.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let document = extract_document(&canvas).unwrap();
        assert_eq!(document.cols(), 120);
        assert_eq!(document.rows(), 100);
    }

    #[test]
    fn test_rectify_flattens_a_skewed_quad() {
        // bright parallelogram; rectify by its true corners and the output
        // must be the longer-edge bounding size
        let mut image =
            Mat::new_rows_cols_with_default(200, 300, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let mut quad = core::Vector::<core::Point>::new();
        quad.push(core::Point::new(60, 40));
        quad.push(core::Point::new(240, 60));
        quad.push(core::Point::new(230, 160));
        quad.push(core::Point::new(50, 140));
        imgproc::fill_convex_poly(
            &mut image,
            &quad,
            Scalar::all(230.0),
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let corners: DocumentCorners = [
            core::Point2f::new(60.0, 40.0),
            core::Point2f::new(240.0, 60.0),
            core::Point2f::new(230.0, 160.0),
            core::Point2f::new(50.0, 140.0),
        ];
        let flattened = rectify(&image, &corners).unwrap();

        let expected_width = ((240.0f32 - 60.0).powi(2) + (60.0f32 - 40.0).powi(2))
            .sqrt()
            .max(((230.0f32 - 50.0).powi(2) + (160.0f32 - 140.0).powi(2)).sqrt())
            .round() as i32;
        assert_eq!(flattened.cols(), expected_width);
        // interior of the flattened quad is the fill color
        let center = *flattened
            .at_2d::<core::Vec3b>(flattened.rows() / 2, flattened.cols() / 2)
            .unwrap();
        assert_eq!(center, core::Vec3b::from([230, 230, 230]));
    }
}
