//! Binary opacity masks: thresholding, morphology and connected components

use image::{GrayImage, RgbaImage};
use std::collections::VecDeque;

/// Axis-aligned pixel rectangle, end-exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Width x height grid of booleans, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpacityMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl OpacityMask {
    /// Mask of pixels whose alpha is strictly greater than `threshold`
    pub fn from_alpha(image: &RgbaImage, threshold: u8) -> Self {
        let cells = image.pixels().map(|p| p[3] > threshold).collect();
        Self {
            width: image.width(),
            height: image.height(),
            cells,
        }
    }

    /// Mask of nonzero pixels in a grayscale segmentation mask
    pub fn from_luma(mask: &GrayImage) -> Self {
        let cells = mask.pixels().map(|p| p[0] > 0).collect();
        Self {
            width: mask.width(),
            height: mask.height(),
            cells,
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every cell
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.cells[self.index(x, y)]
    }

    /// Number of `true` cells
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// In-bounds 3x3 neighborhood of `(x, y)`, center included
    fn neighborhood(&self, x: u32, y: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let x0 = x.saturating_sub(1);
        let y0 = y.saturating_sub(1);
        let x1 = (x + 1).min(self.width - 1);
        let y1 = (y + 1).min(self.height - 1);
        (y0..=y1).flat_map(move |ny| (x0..=x1).map(move |nx| (nx, ny)))
    }

    /// 3x3 dilation; neighbors outside the image are ignored
    pub fn dilate(&self) -> Self {
        Self::from_fn(self.width, self.height, |x, y| {
            self.neighborhood(x, y).any(|(nx, ny)| self.get(nx, ny))
        })
    }

    /// 3x3 erosion; neighbors outside the image are ignored
    pub fn erode(&self) -> Self {
        Self::from_fn(self.width, self.height, |x, y| {
            self.neighborhood(x, y).all(|(nx, ny)| self.get(nx, ny))
        })
    }

    /// Morphological closing: dilate, then erode
    pub fn close(&self) -> Self {
        self.dilate().erode()
    }

    /// Smallest rectangle containing every `true` cell
    pub fn bounding_box(&self) -> Option<PixelRect> {
        let mut min = (u32::MAX, u32::MAX);
        let mut max = (0u32, 0u32);
        let mut any = false;

        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    any = true;
                    min = (min.0.min(x), min.1.min(y));
                    max = (max.0.max(x), max.1.max(y));
                }
            }
        }

        any.then(|| PixelRect {
            x: min.0,
            y: min.1,
            width: max.0 - min.0 + 1,
            height: max.1 - min.1 + 1,
        })
    }

    /// Keep only the largest 8-connected component
    ///
    /// Ties go to the component found first in row-major order. Returns
    /// `None` when the mask is empty.
    pub fn largest_component(&self) -> Option<Self> {
        let mut labels = vec![0u32; self.cells.len()];
        let mut best_label = 0u32;
        let mut best_size = 0usize;
        let mut next_label = 0u32;
        let mut queue = VecDeque::new();

        for y in 0..self.height {
            for x in 0..self.width {
                let start = self.index(x, y);
                if !self.cells[start] || labels[start] != 0 {
                    continue;
                }

                next_label += 1;
                labels[start] = next_label;
                queue.push_back((x, y));
                let mut size = 0usize;

                while let Some((cx, cy)) = queue.pop_front() {
                    size += 1;
                    for (nx, ny) in self.neighborhood(cx, cy) {
                        let ni = self.index(nx, ny);
                        if self.cells[ni] && labels[ni] == 0 {
                            labels[ni] = next_label;
                            queue.push_back((nx, ny));
                        }
                    }
                }

                if size > best_size {
                    best_size = size;
                    best_label = next_label;
                }
            }
        }

        (best_label != 0).then(|| Self {
            width: self.width,
            height: self.height,
            cells: labels.iter().map(|&l| l == best_label).collect(),
        })
    }
}
