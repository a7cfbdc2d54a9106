//! Alpha map extraction
//!
//! Turns an RGBA garment cut-out into a height map (alpha used directly as
//! height) and an aligned color buffer. The image is cropped to the cleaned
//! opacity mask and flipped vertically so raster row 0 ends up at the top of
//! the mesh, where Y increases upward.

use crate::mask::OpacityMask;
use crate::types::{ColorBuffer, DrapeError, HeightMap, Result};
use image::{imageops, RgbaImage};
use std::path::Path;
use tracing::debug;

/// Default alpha threshold separating garment pixels from background
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 10;

/// Decode any supported image file into 8-bit RGBA
pub fn load_rgba(path: impl AsRef<Path>) -> Result<RgbaImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| DrapeError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

/// Derive the height map and color buffer from an RGBA image
///
/// Pixels with alpha above `alpha_threshold` form the opacity mask, which is
/// closed with a 3x3 neighborhood before its bounding box is taken. Heights
/// come from the raw alpha inside that box, so anti-aliased edges keep their
/// fractional height.
///
/// # Errors
///
/// [`DrapeError::EmptyMask`] when no pixel survives thresholding and cleanup.
pub fn extract(image: &RgbaImage, alpha_threshold: u8) -> Result<(HeightMap, ColorBuffer)> {
    let mask = OpacityMask::from_alpha(image, alpha_threshold).close();
    let rect = mask.bounding_box().ok_or(DrapeError::EmptyMask {
        threshold: alpha_threshold,
    })?;

    debug!(
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        opaque = mask.count(),
        "Cropping to opacity mask"
    );

    let cropped = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
    let flipped = imageops::flip_vertical(&cropped);

    let heights = HeightMap::from_fn(flipped.width(), flipped.height(), |col, row| {
        f32::from(flipped.get_pixel(col, row)[3]) / 255.0
    });
    let colors = ColorBuffer::from_fn(flipped.width(), flipped.height(), |col, row| {
        let p = flipped.get_pixel(col, row);
        image::Rgb([p[0], p[1], p[2]])
    });

    Ok((heights, colors))
}
