//! Mesh serialization
//!
//! Supported formats, chosen from the output extension:
//!
//! - **OBJ** - ASCII Wavefront with `v x y z r g b` vertex colors, per-corner
//!   `vt` texture coordinates and per-vertex `vn` normals
//! - **PLY** - binary little-endian with positions, normals, 8-bit colors and
//!   a per-face `texcoord` list
//! - **STL** - binary, positions and facet normals only

use crate::mesh::{face_normal, Mesh};
use crate::types::{DrapeError, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output formats the exporter can write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Ply,
    Stl,
}

impl MeshFormat {
    /// Pick the format from the path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("obj") => Ok(MeshFormat::Obj),
            Some("ply") => Ok(MeshFormat::Ply),
            Some("stl") => Ok(MeshFormat::Stl),
            _ => Err(DrapeError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MeshFormat::Obj => "obj",
            MeshFormat::Ply => "ply",
            MeshFormat::Stl => "stl",
        }
    }

    /// Whether the format carries per-vertex colors and UVs
    pub fn supports_attributes(self) -> bool {
        !matches!(self, MeshFormat::Stl)
    }
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Check that `path` names a format the exporter can write
///
/// Call this before running the pipeline so a bad extension fails fast.
pub fn validate_output_path(path: impl AsRef<Path>) -> Result<MeshFormat> {
    MeshFormat::from_path(path.as_ref())
}

/// Write `mesh` to `path`, creating parent directories as needed
///
/// The mesh is written to a temporary sibling file which is renamed into
/// place once complete, so a failed export never leaves a truncated file at
/// `path`.
pub fn export(mesh: &Mesh, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path)?;
    let io_err = |source: io::Error| DrapeError::Export {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }

    let tmp = temp_path(path);
    debug!(format = %format, tmp = %tmp.display(), "Writing mesh");

    let written = File::create(&tmp).and_then(|file| {
        let mut writer = BufWriter::new(file);
        match format {
            MeshFormat::Obj => write_obj(mesh, &mut writer)?,
            MeshFormat::Ply => write_ply(mesh, &mut writer)?,
            MeshFormat::Stl => write_stl(mesh, &mut writer)?,
        }
        writer.flush()
    });

    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }

    info!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Mesh saved"
    );
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// =============================================================================
// Wavefront OBJ
// =============================================================================

/// Serialize as ASCII Wavefront OBJ
pub fn write_obj<W: Write>(mesh: &Mesh, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "# drape relief mesh: {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    )?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        match &mesh.vertex_colors {
            Some(colors) => {
                let c = colors[i];
                writeln!(out, "v {} {} {} {} {} {}", v[0], v[1], v[2], c[0], c[1], c[2])?
            }
            None => writeln!(out, "v {} {} {}", v[0], v[1], v[2])?,
        }
    }

    if let Some(uvs) = &mesh.triangle_uvs {
        for uv in uvs {
            writeln!(out, "vt {} {}", uv[0], uv[1])?;
        }
    }

    if let Some(normals) = &mesh.vertex_normals {
        for n in normals {
            writeln!(out, "vn {} {} {}", n[0], n[1], n[2])?;
        }
    }

    let has_uvs = mesh.triangle_uvs.is_some();
    let has_normals = mesh.vertex_normals.is_some();
    for (t, tri) in mesh.triangles.iter().enumerate() {
        write!(out, "f")?;
        for (corner, &v) in tri.iter().enumerate() {
            // OBJ indices are 1-based
            let v = v as usize + 1;
            let vt = t * 3 + corner + 1;
            match (has_uvs, has_normals) {
                (true, true) => write!(out, " {v}/{vt}/{v}")?,
                (true, false) => write!(out, " {v}/{vt}")?,
                (false, true) => write!(out, " {v}//{v}")?,
                (false, false) => write!(out, " {v}")?,
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

// =============================================================================
// Binary PLY
// =============================================================================

/// Serialize as binary little-endian PLY
pub fn write_ply<W: Write>(mesh: &Mesh, out: &mut W) -> io::Result<()> {
    writeln!(out, "ply")?;
    writeln!(out, "format binary_little_endian 1.0")?;
    writeln!(out, "comment generated by drape")?;
    writeln!(out, "element vertex {}", mesh.vertex_count())?;
    for axis in ["x", "y", "z"] {
        writeln!(out, "property float {axis}")?;
    }
    if mesh.has_vertex_normals() {
        for axis in ["nx", "ny", "nz"] {
            writeln!(out, "property float {axis}")?;
        }
    }
    if mesh.has_vertex_colors() {
        for channel in ["red", "green", "blue"] {
            writeln!(out, "property uchar {channel}")?;
        }
    }
    writeln!(out, "element face {}", mesh.triangle_count())?;
    writeln!(out, "property list uchar int vertex_indices")?;
    if mesh.has_triangle_uvs() {
        writeln!(out, "property list uchar float texcoord")?;
    }
    writeln!(out, "end_header")?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        write_f32s(out, v)?;
        if let Some(normals) = &mesh.vertex_normals {
            write_f32s(out, &normals[i])?;
        }
        if let Some(colors) = &mesh.vertex_colors {
            let rgb = colors[i].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            out.write_all(&rgb)?;
        }
    }

    for (t, tri) in mesh.triangles.iter().enumerate() {
        out.write_all(&[3u8])?;
        for &i in tri {
            out.write_all(&(i as i32).to_le_bytes())?;
        }
        if let Some(uvs) = &mesh.triangle_uvs {
            out.write_all(&[6u8])?;
            for uv in &uvs[t * 3..t * 3 + 3] {
                write_f32s(out, uv)?;
            }
        }
    }

    Ok(())
}

// =============================================================================
// Binary STL
// =============================================================================

/// Serialize as binary STL
pub fn write_stl<W: Write>(mesh: &Mesh, out: &mut W) -> io::Result<()> {
    let mut header = [0u8; 80];
    let name = b"drape relief mesh";
    header[..name.len()].copy_from_slice(name);
    out.write_all(&header)?;
    out.write_all(&(mesh.triangle_count() as u32).to_le_bytes())?;

    for tri in &mesh.triangles {
        let [a, b, c] = tri.map(|i| mesh.vertices[i as usize]);
        write_f32s(out, &face_normal(a, b, c).to_array())?;
        write_f32s(out, &a)?;
        write_f32s(out, &b)?;
        write_f32s(out, &c)?;
        out.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

#[inline]
fn write_f32s<W: Write>(out: &mut W, values: &[f32]) -> io::Result<()> {
    for v in values {
        out.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}
