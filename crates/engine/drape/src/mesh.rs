//! Indexed triangle mesh with optional color, UV and normal attributes

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Triangle mesh produced by the grid mesher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f32; 3]>,

    /// Triangles as vertex indices
    pub triangles: Vec<[u32; 3]>,

    /// Per-vertex RGB colors (0.0-1.0 range)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertex_colors: Option<Vec<[f32; 3]>>,

    /// Per-corner UV coordinates, three entries per triangle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triangle_uvs: Option<Vec<[f32; 2]>>,

    /// Per-vertex unit normals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertex_normals: Option<Vec<[f32; 3]>>,
}

impl Mesh {
    /// Get the number of vertices in the mesh
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles in the mesh
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn has_vertex_colors(&self) -> bool {
        self.vertex_colors.is_some()
    }

    pub fn has_triangle_uvs(&self) -> bool {
        self.triangle_uvs.is_some()
    }

    pub fn has_vertex_normals(&self) -> bool {
        self.vertex_normals.is_some()
    }

    /// Check the structural invariants: indices in range and distinct per
    /// triangle, attribute arrays sized to match.
    pub fn is_consistent(&self) -> bool {
        let n = self.vertices.len();
        let indices_ok = self.triangles.iter().all(|t| {
            t.iter().all(|&i| (i as usize) < n) && t[0] != t[1] && t[1] != t[2] && t[0] != t[2]
        });
        let colors_ok = self.vertex_colors.as_ref().map_or(true, |c| c.len() == n);
        let normals_ok = self.vertex_normals.as_ref().map_or(true, |v| v.len() == n);
        let uvs_ok = self
            .triangle_uvs
            .as_ref()
            .map_or(true, |uv| uv.len() == self.triangles.len() * 3);
        indices_ok && colors_ok && normals_ok && uvs_ok
    }

    /// Expand one UV per vertex into per-corner UVs
    pub fn set_vertex_uvs(&mut self, uvs: &[[f32; 2]]) {
        let corners = self
            .triangles
            .iter()
            .flat_map(|t| t.iter().map(|&i| uvs[i as usize]))
            .collect();
        self.triangle_uvs = Some(corners);
    }

    /// Collapse per-corner UVs back to one UV per vertex
    ///
    /// The first corner that references a vertex wins. Vertices no triangle
    /// references get `[0.0, 0.0]`.
    pub fn vertex_uvs(&self) -> Option<Vec<[f32; 2]>> {
        let corners = self.triangle_uvs.as_ref()?;
        let mut uvs = vec![[0.0; 2]; self.vertices.len()];
        let mut seen = vec![false; self.vertices.len()];
        for (tri, chunk) in self.triangles.iter().zip(corners.chunks_exact(3)) {
            for (&vi, uv) in tri.iter().zip(chunk) {
                let vi = vi as usize;
                if !seen[vi] {
                    seen[vi] = true;
                    uvs[vi] = *uv;
                }
            }
        }
        Some(uvs)
    }

    /// Drop vertices that no triangle references, keeping relative order
    ///
    /// Returns the number of removed vertices.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let n = self.vertices.len();
        let mut referenced = vec![false; n];
        for tri in &self.triangles {
            for &i in tri {
                referenced[i as usize] = true;
            }
        }

        let mut remap = vec![u32::MAX; n];
        let mut next = 0u32;
        for (old, keep) in referenced.iter().enumerate() {
            if *keep {
                remap[old] = next;
                next += 1;
            }
        }

        let removed = n - next as usize;
        if removed == 0 {
            return 0;
        }

        self.vertices = retain_indexed(&self.vertices, &referenced);
        if let Some(colors) = &self.vertex_colors {
            self.vertex_colors = Some(retain_indexed(colors, &referenced));
        }
        if let Some(normals) = &self.vertex_normals {
            self.vertex_normals = Some(retain_indexed(normals, &referenced));
        }
        for tri in &mut self.triangles {
            for i in tri.iter_mut() {
                *i = remap[*i as usize];
            }
        }

        removed
    }

    /// Recompute per-vertex normals as the normalized sum of the unit face
    /// normals of all incident triangles.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertices.len()];

        for tri in &self.triangles {
            let normal = face_normal(
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            );
            for &i in tri {
                accum[i as usize] += normal;
            }
        }

        let normals = accum
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Z).to_array())
            .collect();
        self.vertex_normals = Some(normals);
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty mesh
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = Vec3::from_array(*self.vertices.first()?);
        let (min, max) = self
            .vertices
            .iter()
            .fold((first, first), |(min, max), v| {
                let v = Vec3::from_array(*v);
                (min.min(v), max.max(v))
            });
        Some((min.to_array(), max.to_array()))
    }
}

/// Unit normal of the triangle `(a, b, c)` with counter-clockwise winding,
/// or zero for a degenerate triangle.
pub fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Vec3 {
    let a = Vec3::from_array(a);
    let e1 = Vec3::from_array(b) - a;
    let e2 = Vec3::from_array(c) - a;
    e1.cross(e2).normalize_or_zero()
}

fn retain_indexed<T: Copy>(items: &[T], keep: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(keep)
        .filter_map(|(item, &k)| k.then_some(*item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        Mesh {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
                [5.0, 5.0, 5.0],
            ],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            vertex_colors: Some(vec![
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 0.0],
                [0.5, 0.5, 0.5],
            ]),
            triangle_uvs: None,
            vertex_normals: None,
        }
    }

    #[test]
    fn test_remove_unreferenced_vertices() {
        let mut mesh = quad();
        assert_eq!(mesh.remove_unreferenced_vertices(), 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.vertex_colors.as_ref().unwrap().len(), 4);
        assert!(mesh.is_consistent());

        // Nothing left to prune on a second pass
        assert_eq!(mesh.remove_unreferenced_vertices(), 0);
    }

    #[test]
    fn test_pruning_remaps_indices() {
        let mut mesh = Mesh {
            vertices: vec![[9.0, 9.0, 9.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: vec![[1, 2, 3]],
            ..Default::default()
        };
        mesh.remove_unreferenced_vertices();
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        assert_eq!(mesh.vertices[0], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_vertex_normals_flat_quad() {
        let mut mesh = quad();
        mesh.remove_unreferenced_vertices();
        mesh.compute_vertex_normals();
        for n in mesh.vertex_normals.as_ref().unwrap() {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_vertex_uv_roundtrip() {
        let mut mesh = quad();
        mesh.remove_unreferenced_vertices();
        let uvs = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        mesh.set_vertex_uvs(&uvs);
        assert_eq!(mesh.triangle_uvs.as_ref().unwrap().len(), 6);
        assert_eq!(mesh.vertex_uvs().unwrap(), uvs);
        assert!(mesh.is_consistent());
    }

    #[test]
    fn test_consistency_detects_bad_index() {
        let mut mesh = quad();
        mesh.triangles.push([0, 1, 7]);
        assert!(!mesh.is_consistent());
    }

    #[test]
    fn test_bounds() {
        let mut mesh = quad();
        mesh.remove_unreferenced_vertices();
        assert_eq!(mesh.bounds(), Some(([0.0, 0.0, 0.0], [1.0, 1.0, 0.0])));
        assert_eq!(Mesh::default().bounds(), None);
    }
}
