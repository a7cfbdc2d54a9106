//! Integration tests for the image → mesh → file pipeline
//!
//! These tests drive the public API end to end on small synthetic cut-outs.

use drape::grid;
use drape::{
    extract, generate, generate_file, resample, ColorBuffer, DrapeError, HeightMap, Mesh,
    PipelineConfig,
};
use glam::Vec3;
use image::{Rgba, RgbaImage};
use std::fs;

/// Square image where `opaque(x, y)` decides full or zero alpha
fn cutout(size: u32, opaque: impl Fn(u32, u32) -> bool) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let a = if opaque(x, y) { 255 } else { 0 };
        Rgba([(x * 40) as u8, (y * 40) as u8, 128, a])
    })
}

/// Filled ellipse with an anti-aliased edge, a rough stand-in for a garment
fn garment(width: u32, height: u32) -> RgbaImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let (rx, ry) = (width as f32 * 0.4, height as f32 * 0.35);
    RgbaImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 + 0.5 - cx) / rx;
        let dy = (y as f32 + 0.5 - cy) / ry;
        let d = (dx * dx + dy * dy).sqrt();
        let alpha = ((1.0 - d) * 8.0).clamp(0.0, 1.0);
        Rgba([200, (x % 255) as u8, (y % 255) as u8, (alpha * 255.0) as u8])
    })
}

fn assert_mesh_invariants(mesh: &Mesh) {
    assert!(mesh.is_consistent());
    let mut used = vec![false; mesh.vertex_count()];
    for tri in &mesh.triangles {
        for &i in tri {
            assert!((i as usize) < mesh.vertex_count());
            used[i as usize] = true;
        }
    }
    assert!(used.iter().all(|&u| u), "unreferenced vertex in mesh");
}

#[test]
fn test_opaque_4x4_scenario() {
    let image = cutout(4, |_, _| true);
    let mesh = generate(&image, &PipelineConfig::default()).unwrap();

    assert_eq!(mesh.vertex_count(), 16);
    assert_eq!(mesh.triangle_count(), 18);
    assert_mesh_invariants(&mesh);

    let uvs = mesh.vertex_uvs().unwrap();
    assert_eq!(uvs[0], [0.0, 0.0]);
    assert_eq!(uvs[3], [1.0, 0.0]);
    assert_eq!(uvs[12], [0.0, 1.0]);
    assert_eq!(uvs[15], [1.0, 1.0]);
    assert_eq!(mesh.triangle_uvs.as_ref().unwrap().len(), 18 * 3);
}

#[test]
fn test_full_height_map_counts() {
    for n in [2u32, 3, 8, 17] {
        let heights = HeightMap::from_fn(n, n, |_, _| 1.0);
        let colors = ColorBuffer::new(n, n);
        let mesh = grid::mesh(&heights, &colors, Vec3::ONE).unwrap();
        assert_eq!(mesh.vertex_count(), (n * n) as usize);
        assert_eq!(mesh.triangle_count(), (2 * (n - 1) * (n - 1)) as usize);
    }
}

#[test]
fn test_checkerboard_has_no_geometry() {
    let image = cutout(4, |x, y| (x + y) % 2 == 0);
    let err = generate(&image, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, DrapeError::NoGeometry { .. }));
}

#[test]
fn test_isolated_pixel_has_no_geometry() {
    let image = cutout(5, |x, y| x == 2 && y == 2);
    let err = generate(&image, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, DrapeError::NoGeometry { .. }));

    let heights = HeightMap::from_fn(5, 5, |c, r| if c == 2 && r == 2 { 1.0 } else { 0.0 });
    let err = grid::mesh(&heights, &ColorBuffer::new(5, 5), Vec3::ONE).unwrap_err();
    assert!(matches!(err, DrapeError::NoGeometry { width: 5, height: 5 }));
}

#[test]
fn test_transparent_image_is_empty_mask() {
    let image = cutout(6, |_, _| false);
    let err = generate(&image, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, DrapeError::EmptyMask { threshold: 10 }));
}

#[test]
fn test_garment_mesh_invariants() {
    let image = garment(64, 48);
    let mesh = generate(&image, &PipelineConfig::default()).unwrap();
    assert_mesh_invariants(&mesh);
    assert!(mesh.has_vertex_colors());
    assert!(mesh.has_vertex_normals());
    for n in mesh.vertex_normals.as_ref().unwrap() {
        assert!((Vec3::from_array(*n).length() - 1.0).abs() < 1e-4);
    }
}

#[test]
fn test_downscale_dimensions() {
    let image = garment(64, 48);
    let (heights, colors) = extract(&image, 10).unwrap();
    let (w, h) = heights.dimensions();

    for k in [2u32, 3, 4] {
        let (rh, rc) = resample(heights.clone(), colors.clone(), k).unwrap();
        assert_eq!(rh.dimensions(), (w / k, h / k));
        assert_eq!(rc.dimensions(), rh.dimensions());
    }
}

#[test]
fn test_downscaled_pipeline_is_smaller() {
    let image = garment(64, 64);
    let full = generate(&image, &PipelineConfig::default()).unwrap();
    let small = generate(&image, &PipelineConfig::default().with_downscale_factor(4)).unwrap();
    assert!(small.triangle_count() < full.triangle_count());
    assert_mesh_invariants(&small);
}

#[test]
fn test_simplified_pipeline() {
    let image = garment(48, 48);
    let full = generate(&image, &PipelineConfig::default()).unwrap();
    let target = full.triangle_count() / 3;
    let simplified = generate(&image, &PipelineConfig::default().with_target_triangles(target)).unwrap();

    assert!(simplified.triangle_count() <= target);
    assert_mesh_invariants(&simplified);
}

#[test]
fn test_pipeline_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("garment.png");
    garment(40, 30).save(&input).unwrap();

    let config = PipelineConfig::default().with_scale([0.5, 0.5, 10.0]);
    let a = dir.path().join("a.obj");
    let b = dir.path().join("b.obj");
    generate_file(&input, &a, &config).unwrap();
    generate_file(&input, &b, &config).unwrap();

    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn test_obj_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("garment.png");
    garment(32, 32).save(&input).unwrap();
    let output = dir.path().join("out/model.obj");

    let stats = generate_file(&input, &output, &PipelineConfig::default()).unwrap();
    assert_eq!(stats.output.as_deref(), Some(output.as_path()));

    let (models, _) = tobj::load_obj(
        &output,
        &tobj::LoadOptions {
            triangulate: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(models.len(), 1);
    let mesh = &models[0].mesh;
    assert_eq!(mesh.positions.len(), stats.vertices * 3);
    assert_eq!(mesh.indices.len(), stats.triangles * 3);
    assert_eq!(mesh.vertex_color.len(), stats.vertices * 3);
    assert_eq!(mesh.texcoords.len(), stats.triangles * 3 * 2);
    assert_eq!(mesh.normals.len(), stats.vertices * 3);
}

#[test]
fn test_ply_and_stl_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("garment.png");
    garment(24, 24).save(&input).unwrap();

    let ply = dir.path().join("model.ply");
    let stats = generate_file(&input, &ply, &PipelineConfig::default()).unwrap();
    assert!(fs::read(&ply).unwrap().starts_with(b"ply\nformat binary_little_endian 1.0\n"));

    let stl = dir.path().join("model.stl");
    generate_file(&input, &stl, &PipelineConfig::default()).unwrap();
    assert_eq!(fs::metadata(&stl).unwrap().len(), 84 + 50 * stats.triangles as u64);
}

#[test]
fn test_unsupported_extension_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    // The input does not even exist: the extension check must come first
    let input = dir.path().join("missing.png");
    let output = dir.path().join("model.glb");

    let err = generate_file(&input, &output, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, DrapeError::UnsupportedFormat { .. }));
    assert!(!output.exists());
}

#[test]
fn test_unreadable_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("not_an_image.png");
    fs::write(&input, b"definitely not a png").unwrap();

    let err = generate_file(&input, dir.path().join("m.obj"), &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, DrapeError::ImageLoad { .. }));
    assert!(!dir.path().join("m.obj").exists());
}
