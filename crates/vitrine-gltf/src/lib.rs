use std::path::Path;

use anyhow::{Context, Result, bail};
use glam::{Mat3, Mat4, Vec3};
use gltf::image::Format;
use vitrine_3d::{GpuMesh, Material, Model, Vertex};
use wgpu::{BindGroupLayout, Device, Queue};

/// Base color for surfaces whose asset carries no material.
const DEFAULT_BASE_COLOR: [f32; 4] = [0.0, 1.0, 0.8, 1.0];

/// Import a `.glb`/`.gltf` file and upload it as a displayable [`Model`].
///
/// `progress` is called with a fraction in `[0, 1]` as the import advances.
/// A file with no renderable geometry is an error; the caller treats any
/// error here as a load failure.
pub async fn load_gltf_model(
    device: &Device,
    queue: &Queue,
    material_bgl: &BindGroupLayout,
    path: &Path,
    mut progress: impl FnMut(f32),
) -> Result<Model> {
    progress(0.0);
    let (doc, buffers, images) = gltf::import(path)
        .with_context(|| format!("importing {}", path.display()))?;
    progress(0.3);

    // Slot 0 is the implicit default material; glTF material index i lands
    // in slot i + 1.
    let mut materials = vec![Material::new(
        device,
        queue,
        material_bgl,
        "default",
        true,
        DEFAULT_BASE_COLOR,
        None,
    )];
    for material in doc.materials() {
        let pbr = material.pbr_metallic_roughness();
        let image = pbr
            .base_color_texture()
            .and_then(|info| images.get(info.texture().source().index()))
            .and_then(rgba8_pixels);
        materials.push(Material::new(
            device,
            queue,
            material_bgl,
            material.name().unwrap_or("default"),
            material_colorable(&material),
            pbr.base_color_factor(),
            image.as_ref().map(|(pixels, w, h)| (pixels.as_slice(), *w, *h)),
        ));
    }

    let scene = doc
        .default_scene()
        .or_else(|| doc.scenes().next())
        .with_context(|| format!("{} contains no scene", path.display()))?;

    let mut nodes = Vec::new();
    for node in scene.nodes() {
        collect_nodes(node, Mat4::IDENTITY, &mut nodes);
    }
    let total_primitives: usize = nodes
        .iter()
        .filter_map(|(node, _)| node.mesh())
        .map(|mesh| mesh.primitives().count())
        .sum();

    let mut meshes = Vec::new();
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    let mut done = 0usize;

    for (node, world) in &nodes {
        let Some(mesh) = node.mesh() else { continue };
        let normal_matrix = Mat3::from_mat4(*world).inverse().transpose();

        for primitive in mesh.primitives() {
            done += 1;
            let reader = primitive
                .reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions
                .map(|p| world.transform_point3(Vec3::from_array(p)))
                .collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(read) => read.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let normals: Vec<Vec3> = match reader.read_normals() {
                Some(read) => read
                    .map(|n| {
                        (normal_matrix * Vec3::from_array(n)).normalize_or(Vec3::Y)
                    })
                    .collect(),
                None => compute_normals(&positions, &indices),
            };

            let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(read) => read.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };

            for p in &positions {
                min = min.min(*p);
                max = max.max(*p);
            }

            let vertices: Vec<Vertex> = positions
                .iter()
                .enumerate()
                .map(|(i, p)| Vertex {
                    position: p.to_array(),
                    normal: normals.get(i).copied().unwrap_or(Vec3::Y).to_array(),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                })
                .collect();

            let material_id = primitive.material().index().map_or(0, |i| i + 1);
            meshes.push(GpuMesh::new(device, &vertices, &indices, material_id));
            progress(0.3 + 0.65 * done as f32 / total_primitives.max(1) as f32);
        }
    }

    if meshes.is_empty() {
        bail!("{} contains no renderable geometry", path.display());
    }

    let center = (min + max) * 0.5;
    progress(1.0);
    log::debug!(
        "imported {} ({} meshes, {} materials)",
        path.display(),
        meshes.len(),
        materials.len() - 1
    );

    Ok(Model {
        meshes,
        materials,
        bounds_min: min,
        bounds_max: max,
        // Recenter so the turntable spins the model about itself.
        recommended_xform: Mat4::from_translation(-center),
    })
}

fn collect_nodes<'a>(node: gltf::Node<'a>, parent: Mat4, out: &mut Vec<(gltf::Node<'a>, Mat4)>) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    for child in node.children() {
        collect_nodes(child, world, out);
    }
    out.push((node, world));
}

/// Surfaces opt out of recoloring through material extras:
/// `{"colorable": false}` (or the legacy `"canChangeColor"` key).
fn material_colorable(material: &gltf::Material) -> bool {
    match material.extras().as_deref() {
        Some(raw) => colorable_from_extras(raw.get()),
        None => true,
    }
}

fn colorable_from_extras(raw: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return true;
    };
    match value.get("colorable").or_else(|| value.get("canChangeColor")) {
        Some(serde_json::Value::Bool(flag)) => *flag,
        _ => true,
    }
}

/// Normalize a decoded glTF image to tightly packed RGBA8. Formats the
/// renderer cannot represent fall back to the untextured path.
fn rgba8_pixels(data: &gltf::image::Data) -> Option<(Vec<u8>, u32, u32)> {
    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 0xff])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&l| [l, l, l, 0xff]).collect(),
        other => {
            log::warn!("unsupported texture format {other:?}, leaving surface untextured");
            return None;
        }
    };
    Some((pixels, data.width, data.height))
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [
            positions[tri[0] as usize],
            positions[tri[1] as usize],
            positions[tri[2] as usize],
        ];
        // Cross product length carries the triangle area, so larger faces
        // weigh more in the accumulated vertex normal.
        let face = (b - a).cross(c - a);
        for &i in tri {
            normals[i as usize] += face;
        }
    }
    normals
        .into_iter()
        .map(|n| n.normalize_or(Vec3::Y))
        .collect()
}
