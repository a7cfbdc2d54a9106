//! End-to-end pipeline: RGBA image → relief mesh → mesh file

use crate::export::{self, MeshFormat};
use crate::extract::{self, DEFAULT_ALPHA_THRESHOLD};
use crate::mesh::Mesh;
use crate::types::Result;
use crate::{grid, resample, simplify};
use glam::Vec3;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Parameters for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Alpha values above this count as garment (0-255)
    pub alpha_threshold: u8,

    /// Multipliers applied to (x, y, z) vertex positions
    pub scale: [f32; 3],

    /// Integer downscale applied before meshing (1 = none)
    pub downscale_factor: u32,

    /// Simplify to at most this many triangles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_triangles: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            scale: [1.0, 1.0, 1.0],
            downscale_factor: 1,
            target_triangles: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    /// Set the downscale factor (clamped to at least 1)
    pub fn with_downscale_factor(mut self, factor: u32) -> Self {
        self.downscale_factor = factor.max(1);
        self
    }

    /// Enable simplification (clamped to at least 1 triangle)
    pub fn with_target_triangles(mut self, target: usize) -> Self {
        self.target_triangles = Some(target.max(1));
        self
    }

    pub fn scale_vec(&self) -> Vec3 {
        Vec3::from_array(self.scale)
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshStats {
    /// Height map size after cropping and resampling
    pub grid: (u32, u32),
    pub vertices: usize,
    pub triangles: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Run extraction, resampling, meshing and simplification on `image`
///
/// Returns the mesh and the grid size it was built from.
pub fn generate_with_grid(image: &RgbaImage, config: &PipelineConfig) -> Result<(Mesh, (u32, u32))> {
    let (heights, colors) = extract::extract(image, config.alpha_threshold)?;
    let (heights, colors) = resample::resample(heights, colors, config.downscale_factor)?;
    let grid_size = heights.dimensions();

    let mut mesh = grid::mesh(&heights, &colors, config.scale_vec())?;

    if let Some(target) = config.target_triangles {
        mesh = simplify::simplify(mesh, target)?;
    }

    Ok((mesh, grid_size))
}

/// Run the in-memory pipeline on `image`
pub fn generate(image: &RgbaImage, config: &PipelineConfig) -> Result<Mesh> {
    generate_with_grid(image, config).map(|(mesh, _)| mesh)
}

/// Load `input`, build the mesh and write it to `output`
///
/// The output extension is validated before any work is done.
pub fn generate_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<MeshStats> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let format = export::validate_output_path(output)?;
    if !format.supports_attributes() {
        warn!(format = %format, "Output format drops colors and UVs");
    }

    info!(input = %input.display(), output = %output.display(), "Generating mesh");

    let image = extract::load_rgba(input)?;
    let (mesh, grid) = generate_with_grid(&image, config)?;
    export::export(&mesh, output)?;

    Ok(MeshStats {
        grid,
        vertices: mesh.vertex_count(),
        triangles: mesh.triangle_count(),
        output: Some(output.to_path_buf()),
    })
}

/// Formats [`generate_file`] can write
pub fn supported_formats() -> [MeshFormat; 3] {
    [MeshFormat::Obj, MeshFormat::Ply, MeshFormat::Stl]
}
