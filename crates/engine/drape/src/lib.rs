//! Garment cut-out to relief mesh conversion
//!
//! This crate turns an RGBA photo of a garment, with the background already
//! masked out, into a textured triangle mesh. Alpha is used directly as
//! height, so the result is a relief of the garment's silhouette carrying the
//! photo's colors.
//!
//! # Pipeline
//!
//! 1. [`extract`] - threshold and clean the alpha mask, crop, flip, and split
//!    into a height map and a color buffer
//! 2. [`resample`] - optional Lanczos downscale of both buffers
//! 3. [`grid::mesh`] - one vertex per live cell, two triangles per complete
//!    2x2 block, UVs, colors and normals
//! 4. [`simplify`] - optional quadric error decimation
//! 5. [`export`] - OBJ, PLY or STL output
//!
//! [`matte`] prepares the RGBA input from a photo and an external
//! segmentation mask.
//!
//! # Example
//!
//! ```no_run
//! use drape::{generate_file, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default()
//!         .with_downscale_factor(4)
//!         .with_target_triangles(50_000);
//!
//!     let stats = generate_file("shirt.png", "out/shirt.obj", &config)?;
//!     println!("{} vertices, {} triangles", stats.vertices, stats.triangles);
//!     Ok(())
//! }
//! ```

pub mod export;
pub mod extract;
pub mod grid;
pub mod mask;
pub mod matte;
pub mod mesh;
pub mod pipeline;
pub mod quadric;
pub mod resample;
pub mod simplify;
pub mod types;

pub use export::{export, validate_output_path, MeshFormat};
pub use extract::{extract, load_rgba, DEFAULT_ALPHA_THRESHOLD};
pub use mask::{OpacityMask, PixelRect};
pub use mesh::Mesh;
pub use pipeline::{generate, generate_file, MeshStats, PipelineConfig};
pub use resample::resample;
pub use simplify::simplify;
pub use types::{ColorBuffer, DrapeError, HeightMap, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::export::{export, validate_output_path, MeshFormat};
    pub use crate::extract::{extract, load_rgba};
    pub use crate::grid;
    pub use crate::mesh::Mesh;
    pub use crate::pipeline::{generate, generate_file, MeshStats, PipelineConfig};
    pub use crate::simplify::simplify;
    pub use crate::types::{ColorBuffer, DrapeError, HeightMap, Result};
}
