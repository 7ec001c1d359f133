//! Raster and filesystem collaborators for the crop-tree representation.
//!
//! Everything here is deliberately thin: reading (and, when missing,
//! downloading) one source image, writing one raster, cutting one bbox
//! region, and deriving filesystem-safe names. The codecs own all policy.

use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use image::RgbImage;
use thiserror::Error;

use crate::coco::Bbox;
use crate::error::CocodumpError;

const MAX_FILENAME_LEN: usize = 256;

/// Derives a filesystem-safe label from a free-form name.
///
/// Runs of whitespace and hyphens collapse to a single underscore, other
/// non-word characters are dropped, the result is truncated to 256
/// characters and stripped of leading/trailing underscores.
pub fn sanitize_filename(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_separator_run = false;
    for ch in s.chars() {
        if ch.is_whitespace() || ch == '-' {
            if !in_separator_run {
                out.push('_');
            }
            in_separator_run = true;
        } else if ch.is_alphanumeric() || ch == '_' {
            out.push(ch);
            in_separator_run = false;
        } else {
            // dropped, but it still breaks a separator run
            in_separator_run = false;
        }
    }

    let truncated: String = out.chars().take(MAX_FILENAME_LEN).collect();
    truncated.trim_matches('_').to_string()
}

/// Reads the image at `path` in RGB mode. If the file does not exist and
/// `download_url` was given, downloads it to `path` first.
pub fn read_image(path: &Path, download_url: Option<&str>) -> Result<RgbImage, CocodumpError> {
    if !path.is_file() {
        if let Some(url) = download_url {
            download_image(path, url)?;
        }
    }

    let image = image::open(path).map_err(|source| CocodumpError::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

/// Downloads `url` to `path` unless the file already exists.
fn download_image(path: &Path, url: &str) -> Result<(), CocodumpError> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    log::debug!("Downloading {url} -> {}", path.display());
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(60)))
        .build();
    let agent: ureq::Agent = config.into();

    let mut response = agent
        .get(url)
        .call()
        .map_err(|source| CocodumpError::Download {
            url: url.to_string(),
            message: source.to_string(),
        })?;

    let mut reader = response.body_mut().as_reader();
    let mut file = File::create(path)?;
    std::io::copy(&mut reader, &mut file)?;
    Ok(())
}

/// Writes a raster to `path`, creating parent directories as needed. The
/// encoding is chosen from the file extension.
pub fn write_image(image: &RgbImage, path: &Path) -> Result<(), CocodumpError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    image.save(path).map_err(|source| CocodumpError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// A single crop that cannot be produced from its source raster.
///
/// This is the one recoverable failure class of a crop-tree dump: the
/// caller logs it, records the annotation in the failure log, and moves on.
#[derive(Debug, Error)]
#[error("cannot cut {bbox:?} from {image_width}x{image_height} image: {reason}")]
pub struct CropError {
    pub bbox: Bbox,
    pub image_width: u32,
    pub image_height: u32,
    pub reason: &'static str,
}

/// Cuts the bbox region out of a source raster.
///
/// Rejects degenerate (zero or negative extent) and out-of-bounds boxes
/// instead of clamping: a crop file must contain exactly the annotated
/// region or not exist at all.
pub fn crop_region(image: &RgbImage, bbox: &Bbox) -> Result<RgbImage, CropError> {
    let (image_width, image_height) = image.dimensions();
    let fail = |reason: &'static str| CropError {
        bbox: *bbox,
        image_width,
        image_height,
        reason,
    };

    if bbox.width <= 0 || bbox.height <= 0 {
        return Err(fail("degenerate region"));
    }
    if bbox.x < 0 || bbox.y < 0 {
        return Err(fail("negative origin"));
    }
    if bbox.x + bbox.width > i64::from(image_width)
        || bbox.y + bbox.height > i64::from(image_height)
    {
        return Err(fail("region out of image bounds"));
    }

    Ok(image::imageops::crop_imm(
        image,
        bbox.x as u32,
        bbox.y as u32,
        bbox.width as u32,
        bbox.height as u32,
    )
    .to_image())
}
