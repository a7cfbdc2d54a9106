//! Mesh simplification by quadric error edge collapse
//!
//! Edges are collapsed cheapest first, where the cost is the quadric error of
//! the merged vertex. Flat regions of the relief (the opaque interior of the
//! garment) cost nothing and go first; the silhouette is held in place by
//! constraint planes along boundary edges.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use glam::{DVec3, Vec3};
use tracing::{debug, info, warn};

use crate::mesh::Mesh;
use crate::quadric::Quadric;
use crate::types::{DrapeError, Result};

/// Weight of the perpendicular planes that pin boundary edges
const BOUNDARY_WEIGHT: f64 = 1000.0;

/// Minimum cosine between a face normal before and after a collapse
const MIN_NORMAL_COS: f64 = 0.2;

/// Collapse candidate, ordered so the cheapest pops first
#[derive(Debug, Clone)]
struct Candidate {
    cost: f64,
    keep: u32,
    drop: u32,
    keep_version: u32,
    drop_version: u32,
    target: DVec3,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; vertex ids break ties deterministically
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.keep.cmp(&self.keep))
            .then_with(|| other.drop.cmp(&self.drop))
    }
}

/// Working state for one simplification run
struct Collapser {
    positions: Vec<DVec3>,
    colors: Option<Vec<Vec3>>,
    uvs: Option<Vec<[f32; 2]>>,
    quadrics: Vec<Quadric>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<u32>>,
    vertex_alive: Vec<bool>,
    versions: Vec<u32>,
    live_faces: usize,
}

/// Reduce `mesh` to at most `target_triangles` triangles
///
/// Returns the mesh unchanged when it already has no more than
/// `target_triangles` triangles. Otherwise returns a new mesh with recomputed
/// normals; colors and UVs of merged vertices are interpolated along the
/// collapsed edge. The target may be missed when every remaining collapse
/// would fold or tear the surface.
///
/// # Errors
///
/// [`DrapeError::InvalidParameter`] for a target of zero.
pub fn simplify(mesh: Mesh, target_triangles: usize) -> Result<Mesh> {
    if target_triangles == 0 {
        return Err(DrapeError::InvalidParameter(
            "target triangle count must be at least 1".to_string(),
        ));
    }

    let original = mesh.triangle_count();
    if target_triangles >= original {
        debug!(original, target_triangles, "Mesh already within target");
        return Ok(mesh);
    }

    info!(original, target = target_triangles, "Starting mesh simplification");

    let mut state = Collapser::new(&mesh);
    let mut heap = state.initial_candidates();
    let mut performed = 0usize;
    let mut rejected = 0usize;

    while state.live_faces > target_triangles {
        let Some(candidate) = heap.pop() else {
            break;
        };

        let (keep, drop) = (candidate.keep as usize, candidate.drop as usize);
        if !state.vertex_alive[keep]
            || !state.vertex_alive[drop]
            || state.versions[keep] != candidate.keep_version
            || state.versions[drop] != candidate.drop_version
        {
            continue;
        }

        if !state.is_collapse_valid(candidate.keep, candidate.drop, candidate.target) {
            rejected += 1;
            continue;
        }

        state.collapse(candidate.keep, candidate.drop, candidate.target);
        performed += 1;

        for neighbor in state.neighbors(candidate.keep) {
            if let Some(c) = state.candidate(candidate.keep, neighbor) {
                heap.push(c);
            }
        }
    }

    if state.live_faces > target_triangles {
        warn!(
            reached = state.live_faces,
            target = target_triangles,
            "Simplification stopped above target"
        );
    }

    let simplified = state.into_mesh();

    info!(
        triangles = simplified.triangle_count(),
        vertices = simplified.vertex_count(),
        collapses = performed,
        rejected,
        "Simplification complete"
    );

    Ok(simplified)
}

impl Collapser {
    fn new(mesh: &Mesh) -> Self {
        let n = mesh.vertex_count();
        let positions: Vec<DVec3> = mesh
            .vertices
            .iter()
            .map(|v| Vec3::from_array(*v).as_dvec3())
            .collect();

        let mut vertex_faces = vec![Vec::new(); n];
        for (fi, tri) in mesh.triangles.iter().enumerate() {
            for &v in tri {
                vertex_faces[v as usize].push(fi as u32);
            }
        }

        let mut state = Self {
            colors: mesh
                .vertex_colors
                .as_ref()
                .map(|c| c.iter().map(|c| Vec3::from_array(*c)).collect()),
            uvs: mesh.vertex_uvs(),
            quadrics: vec![Quadric::default(); n],
            faces: mesh.triangles.clone(),
            face_alive: vec![true; mesh.triangle_count()],
            vertex_faces,
            vertex_alive: vec![true; n],
            versions: vec![0; n],
            live_faces: mesh.triangle_count(),
            positions,
        };
        state.accumulate_quadrics();
        state
    }

    fn face_normal(&self, tri: [u32; 3]) -> DVec3 {
        let [a, b, c] = tri.map(|i| self.positions[i as usize]);
        (b - a).cross(c - a).normalize_or_zero()
    }

    fn accumulate_quadrics(&mut self) {
        let mut edge_faces: BTreeMap<(u32, u32), Vec<u32>> = BTreeMap::new();

        for (fi, &tri) in self.faces.iter().enumerate() {
            let normal = self.face_normal(tri);
            if normal == DVec3::ZERO {
                continue;
            }
            let q = Quadric::from_point_normal(self.positions[tri[0] as usize], normal);
            for &v in &tri {
                self.quadrics[v as usize] += q;
            }
            for i in 0..3 {
                edge_faces
                    .entry(edge_key(tri[i], tri[(i + 1) % 3]))
                    .or_default()
                    .push(fi as u32);
            }
        }

        // Boundary edges: plane through the edge, perpendicular to its face
        for (&(a, b), faces) in &edge_faces {
            if faces.len() != 1 {
                continue;
            }
            let normal = self.face_normal(self.faces[faces[0] as usize]);
            let pa = self.positions[a as usize];
            let pb = self.positions[b as usize];
            let side = (pb - pa).cross(normal).normalize_or_zero();
            if side == DVec3::ZERO {
                continue;
            }
            let q = Quadric::from_point_normal(pa, side) * BOUNDARY_WEIGHT;
            self.quadrics[a as usize] += q;
            self.quadrics[b as usize] += q;
        }
    }

    fn initial_candidates(&self) -> BinaryHeap<Candidate> {
        let mut heap = BinaryHeap::new();
        let mut seen = BTreeSet::new();
        for tri in &self.faces {
            for i in 0..3 {
                let (a, b) = edge_key(tri[i], tri[(i + 1) % 3]);
                if seen.insert((a, b)) {
                    if let Some(c) = self.candidate(a, b) {
                        heap.push(c);
                    }
                }
            }
        }
        heap
    }

    /// Best placement and cost for merging `drop` into `keep`
    fn candidate(&self, keep: u32, drop: u32) -> Option<Candidate> {
        if keep == drop {
            return None;
        }
        let q = self.quadrics[keep as usize] + self.quadrics[drop as usize];
        let pa = self.positions[keep as usize];
        let pb = self.positions[drop as usize];
        let mid = (pa + pb) * 0.5;

        let target = q
            .optimal_point()
            // Stay near the edge; far-off optima come from ill-conditioned quadrics
            .filter(|p| p.distance(mid) <= pa.distance(pb) * 2.0)
            .unwrap_or_else(|| {
                [pa, pb, mid]
                    .into_iter()
                    .min_by(|x, y| q.evaluate(*x).total_cmp(&q.evaluate(*y)))
                    .unwrap_or(pa)
            });

        Some(Candidate {
            cost: q.evaluate(target).max(0.0),
            keep,
            drop,
            keep_version: self.versions[keep as usize],
            drop_version: self.versions[drop as usize],
            target,
        })
    }

    fn live_faces_of(&self, v: u32) -> impl Iterator<Item = u32> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .copied()
            .filter(|&f| self.face_alive[f as usize])
    }

    /// Sorted, deduplicated one-ring of `v`
    fn neighbors(&self, v: u32) -> Vec<u32> {
        let mut ring: Vec<u32> = self
            .live_faces_of(v)
            .flat_map(|f| self.faces[f as usize])
            .filter(|&u| u != v)
            .collect();
        ring.sort_unstable();
        ring.dedup();
        ring
    }

    /// Link condition plus a fold-over check on every surviving face
    fn is_collapse_valid(&self, keep: u32, drop: u32, target: DVec3) -> bool {
        let ring_keep = self.neighbors(keep);
        let ring_drop = self.neighbors(drop);
        let shared = ring_keep
            .iter()
            .filter(|v| ring_drop.binary_search(v).is_ok())
            .count();
        let edge_faces = self
            .live_faces_of(keep)
            .filter(|&f| self.faces[f as usize].contains(&drop))
            .count();
        if edge_faces == 0 || shared != edge_faces {
            return false;
        }

        for v in [keep, drop] {
            for f in self.live_faces_of(v) {
                let tri = self.faces[f as usize];
                if tri.contains(&keep) && tri.contains(&drop) {
                    continue;
                }
                let before = self.face_normal(tri);
                let moved = tri.map(|i| {
                    if i == keep || i == drop {
                        target
                    } else {
                        self.positions[i as usize]
                    }
                });
                let after = (moved[1] - moved[0])
                    .cross(moved[2] - moved[0])
                    .normalize_or_zero();
                if after == DVec3::ZERO || before.dot(after) < MIN_NORMAL_COS {
                    return false;
                }
            }
        }

        true
    }

    fn collapse(&mut self, keep: u32, drop: u32, target: DVec3) {
        let (k, d) = (keep as usize, drop as usize);
        let pa = self.positions[k];
        let pb = self.positions[d];
        let edge = pb - pa;
        let t = if edge.length_squared() > 0.0 {
            ((target - pa).dot(edge) / edge.length_squared()).clamp(0.0, 1.0)
        } else {
            0.0
        };

        if let Some(colors) = &mut self.colors {
            colors[k] = colors[k].lerp(colors[d], t as f32);
        }
        if let Some(uvs) = &mut self.uvs {
            let (ua, ub) = (uvs[k], uvs[d]);
            let t = t as f32;
            uvs[k] = [ua[0] + (ub[0] - ua[0]) * t, ua[1] + (ub[1] - ua[1]) * t];
        }

        self.positions[k] = target;
        let q = self.quadrics[d];
        self.quadrics[k] += q;

        let dropped_faces = std::mem::take(&mut self.vertex_faces[d]);
        for f in dropped_faces {
            let fi = f as usize;
            if !self.face_alive[fi] {
                continue;
            }
            if self.faces[fi].contains(&keep) {
                self.face_alive[fi] = false;
                self.live_faces -= 1;
            } else {
                for v in self.faces[fi].iter_mut() {
                    if *v == drop {
                        *v = keep;
                    }
                }
                self.vertex_faces[k].push(f);
            }
        }

        let alive = &self.face_alive;
        self.vertex_faces[k].retain(|&f| alive[f as usize]);
        self.vertex_alive[d] = false;
        self.versions[k] += 1;
        self.versions[d] += 1;
    }

    fn into_mesh(self) -> Mesh {
        let triangles: Vec<[u32; 3]> = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter_map(|(tri, &alive)| alive.then_some(*tri))
            .collect();

        let mut mesh = Mesh {
            vertices: self
                .positions
                .iter()
                .map(|p| p.as_vec3().to_array())
                .collect(),
            triangles,
            vertex_colors: self
                .colors
                .map(|c| c.iter().map(|v| v.to_array()).collect()),
            triangle_uvs: None,
            vertex_normals: None,
        };
        if let Some(uvs) = &self.uvs {
            mesh.set_vertex_uvs(uvs);
        }
        mesh.remove_unreferenced_vertices();
        mesh.compute_vertex_normals();
        mesh
    }
}

const fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
