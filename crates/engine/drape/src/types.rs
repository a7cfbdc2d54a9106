//! Shared buffer types and the error enum for the drape pipeline

use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;

/// Drape pipeline error types
#[derive(Debug, Error)]
pub enum DrapeError {
    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("No pixel exceeds alpha threshold {threshold} after mask cleanup")]
    EmptyMask { threshold: u8 },

    #[error("Height map {width}x{height} has no 2x2 block with four live corners")]
    NoGeometry { width: u32, height: u32 },

    #[error("Unsupported mesh format for {path} (expected .obj, .ply or .stl)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to write mesh to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mask size {mask:?} does not match image size {image:?}")]
    MaskMismatch { image: (u32, u32), mask: (u32, u32) },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl DrapeError {
    /// Name of the pipeline stage that raised the error
    pub fn stage(&self) -> &'static str {
        match self {
            DrapeError::ImageLoad { .. } => "load",
            DrapeError::EmptyMask { .. } => "extract",
            DrapeError::NoGeometry { .. } => "mesh",
            DrapeError::UnsupportedFormat { .. } | DrapeError::Export { .. } => "export",
            DrapeError::MaskMismatch { .. } => "matte",
            DrapeError::InvalidParameter(_) => "parameters",
        }
    }
}

/// Result type alias for drape operations that may fail
pub type Result<T> = std::result::Result<T, DrapeError>;

/// Per-cell RGB colors, pixel-aligned with a [`HeightMap`] (0-255 range)
pub type ColorBuffer = RgbImage;

/// Row-major scalar field of heights in `[0, 1]`
///
/// A value of exactly `0.0` marks a cell with no surface.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl HeightMap {
    /// Create a height map filled with the empty sentinel
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    /// Build a height map by evaluating `f(col, row)` for every cell
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height {
            for col in 0..width {
                data.push(f(col, row));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Number of columns
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Grid dimensions as `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Height at `(col, row)`
    #[inline]
    pub fn get(&self, col: u32, row: u32) -> f32 {
        self.data[row as usize * self.width as usize + col as usize]
    }

    /// Raw row-major samples
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Number of cells holding a surface (nonzero height)
    pub fn live_cells(&self) -> usize {
        self.data.iter().filter(|&&h| h != 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_map_indexing() {
        let map = HeightMap::from_fn(3, 2, |col, row| (row * 3 + col) as f32);
        assert_eq!(map.dimensions(), (3, 2));
        assert_eq!(map.get(0, 0), 0.0);
        assert_eq!(map.get(2, 0), 2.0);
        assert_eq!(map.get(1, 1), 4.0);
        assert_eq!(map.live_cells(), 5);
    }

    #[test]
    fn test_error_stages() {
        assert_eq!(DrapeError::EmptyMask { threshold: 10 }.stage(), "extract");
        assert_eq!(
            DrapeError::NoGeometry {
                width: 1,
                height: 1
            }
            .stage(),
            "mesh"
        );
        assert_eq!(
            DrapeError::UnsupportedFormat {
                path: PathBuf::from("a.fbx")
            }
            .stage(),
            "export"
        );
    }
}
