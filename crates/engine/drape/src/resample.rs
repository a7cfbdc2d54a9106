//! Integer-factor downsampling of the height map and color buffer

use crate::types::{ColorBuffer, DrapeError, HeightMap, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use tracing::debug;

/// Filter used for both buffers
const FILTER: FilterType = FilterType::Lanczos3;

/// Shrink both buffers by `factor` to `(width / factor, height / factor)`
///
/// Both buffers are resized to the same target so cells stay aligned. A
/// factor of 0 or 1 returns the inputs unchanged. Heights go through an
/// 8-bit grayscale image so the filter's ringing clamps at 0 and 1.
///
/// # Errors
///
/// [`DrapeError::InvalidParameter`] when the buffers differ in size or when
/// the factor would shrink either dimension to zero.
pub fn resample(
    heights: HeightMap,
    colors: ColorBuffer,
    factor: u32,
) -> Result<(HeightMap, ColorBuffer)> {
    if heights.dimensions() != colors.dimensions() {
        return Err(DrapeError::InvalidParameter(format!(
            "height map {:?} and color buffer {:?} differ in size",
            heights.dimensions(),
            colors.dimensions()
        )));
    }
    if factor <= 1 {
        return Ok((heights, colors));
    }

    let (width, height) = heights.dimensions();
    let target = (width / factor, height / factor);
    if target.0 == 0 || target.1 == 0 {
        return Err(DrapeError::InvalidParameter(format!(
            "downscale factor {factor} collapses {width}x{height} grid to {}x{}",
            target.0, target.1
        )));
    }

    debug!(factor, from = ?(width, height), to = ?target, "Resampling buffers");

    let gray = GrayImage::from_fn(width, height, |col, row| {
        Luma([(heights.get(col, row) * 255.0) as u8])
    });
    let gray = imageops::resize(&gray, target.0, target.1, FILTER);
    let heights = HeightMap::from_fn(target.0, target.1, |col, row| {
        f32::from(gray.get_pixel(col, row)[0]) / 255.0
    });

    let colors = imageops::resize(&colors, target.0, target.1, FILTER);

    Ok((heights, colors))
}
