use anyhow::{bail, Context, Result};
use opencv::imgcodecs;
use opencv::prelude::*;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Load an image from disk with timing and logging
pub fn load_image(path: &Path) -> Result<Mat> {
    let start = std::time::Instant::now();
    let path_str = path.to_str().context("image path is not valid UTF-8")?;
    let image = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR)?;
    if image.empty() {
        bail!("could not read image {}", path.display());
    }
    log::info!(
        "Loaded {} in {:?} - {}x{}, {} channels",
        path.display(),
        start.elapsed(),
        image.cols(),
        image.rows(),
        image.channels()
    );
    Ok(image)
}

pub fn save_image(path: &Path, image: &Mat) -> Result<()> {
    let path_str = path.to_str().context("output path is not valid UTF-8")?;
    let written = imgcodecs::imwrite(path_str, image, &opencv::core::Vector::new())?;
    if !written {
        bail!("could not write image {}", path.display());
    }
    log::info!("Result saved to {}", path.display());
    Ok(())
}

/// Expands directories, keeps only image files, and sorts everything into
/// natural filename order so `scan_1.jpg` precedes `scan_10.jpg`.
pub fn collect_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in std::fs::read_dir(input)
                .with_context(|| format!("reading directory {}", input.display()))?
            {
                let path = entry?.path();
                if path.is_file() && has_image_extension(&path) {
                    paths.push(path);
                }
            }
        } else {
            paths.push(input.clone());
        }
    }
    paths.sort_by(|a, b| natural_cmp(a, b));
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Compares two paths by file name, treating runs of digits as numbers
/// rather than character sequences.
pub fn natural_cmp(a: &Path, b: &Path) -> Ordering {
    let a_name = file_name(a);
    let b_name = file_name(b);
    let (a, b) = (a_name.as_bytes(), b_name.as_bytes());

    let (mut i, mut j) = (0usize, 0usize);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let run_a = digit_run(a, &mut i);
            let run_b = digit_run(b, &mut j);
            let ord = run_a
                .len()
                .cmp(&run_b.len())
                .then_with(|| run_a.cmp(run_b));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    a.len().cmp(&b.len())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Advances past the digit run starting at `*pos` and returns it with
/// leading zeros stripped, so runs compare numerically by (length, bytes).
fn digit_run<'a>(bytes: &'a [u8], pos: &mut usize) -> &'a [u8] {
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    let mut run = &bytes[start..*pos];
    while run.len() > 1 && run[0] == b'0' {
        run = &run[1..];
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        natural_cmp(Path::new(a), Path::new(b))
    }

    #[test]
    fn test_natural_order_compares_digit_runs_numerically() {
        assert_eq!(cmp("scan_2.jpg", "scan_10.jpg"), Ordering::Less);
        assert_eq!(cmp("scan_10.jpg", "scan_2.jpg"), Ordering::Greater);
        // equal numeric value: the shorter (unpadded) name sorts first
        assert_eq!(cmp("img1.png", "img001.png"), Ordering::Less);
        assert_eq!(cmp("page9part2.jpg", "page9part11.jpg"), Ordering::Less);
    }

    #[test]
    fn test_natural_order_falls_back_to_bytes() {
        assert_eq!(cmp("a.jpg", "b.jpg"), Ordering::Less);
        assert_eq!(cmp("bill.jpg", "bill.jpg"), Ordering::Equal);
        assert_eq!(cmp("bill.jpg", "bill2.jpg"), Ordering::Less);
    }

    #[test]
    fn test_natural_order_ignores_directories() {
        assert_eq!(cmp("/z/scan_2.jpg", "/a/scan_10.jpg"), Ordering::Less);
    }

    #[test]
    fn test_image_extension_filter() {
        assert!(has_image_extension(Path::new("a/b/bill.JPG")));
        assert!(has_image_extension(Path::new("scan.tiff")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("no_extension")));
    }
}
