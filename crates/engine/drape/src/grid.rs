//! Height map to triangle mesh
//!
//! Every cell with a nonzero height becomes a vertex. Every 2x2 block whose
//! four corners all have vertices becomes two triangles; blocks touching an
//! empty cell are skipped, which leaves holes along the garment outline.
//!
//! Vertex order is row-major over the grid and the quad split is fixed, so
//! identical inputs give identical connectivity.

use crate::mesh::Mesh;
use crate::types::{ColorBuffer, DrapeError, HeightMap, Result};
use glam::Vec3;
use tracing::{debug, info};

/// Grid-coordinate to vertex-index arena
///
/// One slot per grid cell; cells without a vertex hold [`SparseVertexIndex::ABSENT`].
#[derive(Debug)]
struct SparseVertexIndex {
    cols: usize,
    slots: Vec<u32>,
}

impl SparseVertexIndex {
    const ABSENT: u32 = u32::MAX;

    fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols: cols as usize,
            slots: vec![Self::ABSENT; cols as usize * rows as usize],
        }
    }

    #[inline]
    fn insert(&mut self, col: u32, row: u32, vertex: u32) {
        self.slots[row as usize * self.cols + col as usize] = vertex;
    }

    #[inline]
    fn get(&self, col: u32, row: u32) -> Option<u32> {
        let v = self.slots[row as usize * self.cols + col as usize];
        (v != Self::ABSENT).then_some(v)
    }
}

/// Build a mesh from a height map and its aligned color buffer
///
/// Vertices sit at `(col * scale.x, row * scale.y, height * scale.z)` with the
/// co-located color normalized to `[0, 1]` and UV `(col / (cols - 1),
/// row / (rows - 1))`. Block `(row, col)` becomes triangles
/// `(tl, bl, br)` and `(tl, br, tr)`, where "bottom" is row + 1.
///
/// Vertices no triangle uses are pruned, then per-vertex normals are computed.
///
/// # Errors
///
/// - [`DrapeError::InvalidParameter`] when the buffers differ in size
/// - [`DrapeError::NoGeometry`] when no block has four live corners
pub fn mesh(heights: &HeightMap, colors: &ColorBuffer, scale: Vec3) -> Result<Mesh> {
    let (cols, rows) = heights.dimensions();
    if colors.dimensions() != (cols, rows) {
        return Err(DrapeError::InvalidParameter(format!(
            "height map {:?} and color buffer {:?} differ in size",
            (cols, rows),
            colors.dimensions()
        )));
    }

    let live = heights.live_cells();
    let mut index = SparseVertexIndex::new(cols, rows);
    let mut vertices = Vec::with_capacity(live);
    let mut vertex_colors = Vec::with_capacity(live);
    let mut uvs = Vec::with_capacity(live);

    let u_den = cols.saturating_sub(1).max(1) as f32;
    let v_den = rows.saturating_sub(1).max(1) as f32;

    // Vertex emission
    for row in 0..rows {
        for col in 0..cols {
            let h = heights.get(col, row);
            if h == 0.0 {
                continue;
            }

            index.insert(col, row, vertices.len() as u32);
            vertices.push([
                col as f32 * scale.x,
                row as f32 * scale.y,
                h * scale.z,
            ]);
            let rgb = colors.get_pixel(col, row);
            vertex_colors.push([
                f32::from(rgb[0]) / 255.0,
                f32::from(rgb[1]) / 255.0,
                f32::from(rgb[2]) / 255.0,
            ]);
            uvs.push([col as f32 / u_den, row as f32 / v_den]);
        }
    }

    // Triangle emission
    let mut triangles = Vec::new();
    for row in 0..rows.saturating_sub(1) {
        for col in 0..cols.saturating_sub(1) {
            let corners = (
                index.get(col, row),
                index.get(col, row + 1),
                index.get(col + 1, row),
                index.get(col + 1, row + 1),
            );
            if let (Some(tl), Some(bl), Some(tr), Some(br)) = corners {
                triangles.push([tl, bl, br]);
                triangles.push([tl, br, tr]);
            }
        }
    }
    drop(index);

    if triangles.is_empty() {
        return Err(DrapeError::NoGeometry {
            width: cols,
            height: rows,
        });
    }

    let mut mesh = Mesh {
        vertices,
        triangles,
        vertex_colors: Some(vertex_colors),
        triangle_uvs: None,
        vertex_normals: None,
    };
    mesh.set_vertex_uvs(&uvs);

    let pruned = mesh.remove_unreferenced_vertices();
    debug!(emitted = live, pruned, "Pruned isolated vertices");

    mesh.compute_vertex_normals();

    info!(
        grid = ?(cols, rows),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Generated grid mesh"
    );

    Ok(mesh)
}
