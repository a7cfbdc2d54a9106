//! Matte compositing
//!
//! Prepares the RGBA input for [`crate::extract`] from a raw photo and a
//! grayscale segmentation mask produced elsewhere. Only the largest
//! connected region of the mask is kept, so stray blobs the segmenter picked
//! up do not turn into floating islands in the mesh.

use crate::mask::OpacityMask;
use crate::types::{DrapeError, Result};
use image::{imageops, GrayImage, Rgba, RgbImage, RgbaImage};
use tracing::debug;

/// Longest side photos are reduced to before segmentation
pub const DEFAULT_MAX_DIM: u32 = 1024;

/// Shrink `photo` so its longest side is at most `max_dim`, keeping aspect
///
/// Photos already within bounds are returned as-is; nothing is upscaled.
pub fn bound_photo(photo: &RgbImage, max_dim: u32) -> RgbImage {
    let (w, h) = photo.dimensions();
    let longest = w.max(h);
    if longest <= max_dim || max_dim == 0 {
        return photo.clone();
    }

    let scale = f64::from(max_dim) / f64::from(longest);
    let nw = ((f64::from(w) * scale).round() as u32).clamp(1, max_dim);
    let nh = ((f64::from(h) * scale).round() as u32).clamp(1, max_dim);
    debug!(from = ?(w, h), to = ?(nw, nh), "Bounding photo size");
    imageops::resize(photo, nw, nh, imageops::FilterType::Lanczos3)
}

/// Combine a photo and a segmentation mask into an RGBA cut-out
///
/// Alpha is 255 inside the largest 8-connected component of nonzero mask
/// pixels and 0 everywhere else.
///
/// # Errors
///
/// - [`DrapeError::MaskMismatch`] when the dimensions differ
/// - [`DrapeError::EmptyMask`] when the mask has no foreground
pub fn composite(photo: &RgbImage, mask: &GrayImage) -> Result<RgbaImage> {
    if photo.dimensions() != mask.dimensions() {
        return Err(DrapeError::MaskMismatch {
            image: photo.dimensions(),
            mask: mask.dimensions(),
        });
    }

    let region = OpacityMask::from_luma(mask)
        .largest_component()
        .ok_or(DrapeError::EmptyMask { threshold: 0 })?;

    debug!(
        foreground = region.count(),
        total = photo.width() as usize * photo.height() as usize,
        "Kept largest mask component"
    );

    Ok(RgbaImage::from_fn(photo.width(), photo.height(), |x, y| {
        let p = photo.get_pixel(x, y);
        let alpha = if region.get(x, y) { 255 } else { 0 };
        Rgba([p[0], p[1], p[2], alpha])
    }))
}

/// Crop away fully transparent margins
///
/// A fully transparent image is returned unchanged.
pub fn trim_transparent(image: &RgbaImage) -> RgbaImage {
    match OpacityMask::from_alpha(image, 0).bounding_box() {
        Some(rect) => {
            imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
        }
        None => image.clone(),
    }
}
