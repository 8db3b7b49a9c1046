use glam::{Mat4, Vec3};
use wgpu::util::{BufferInitDescriptor, DeviceExt, TextureDataOrder};
use wgpu::*;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [VertexAttribute; 3] =
        vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub struct GpuMesh {
    pub vbuf: Buffer,
    pub ibuf: Buffer,
    pub index_count: u32,
    pub material_id: usize,
}

impl GpuMesh {
    pub fn new(device: &Device, vertices: &[Vertex], indices: &[u32], material_id: usize) -> Self {
        let vbuf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: BufferUsages::VERTEX,
        });
        let ibuf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(indices),
            usage: BufferUsages::INDEX,
        });
        Self {
            vbuf,
            ibuf,
            index_count: indices.len() as u32,
            material_id,
        }
    }
}

const WHITE_PIXEL: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// One surface appearance: a tint uniform the configurator rewrites, a base
/// color texture (1x1 white when the asset has none), and the opt-out flag
/// for surfaces that must keep their authored look.
pub struct Material {
    pub name: String,
    pub colorable: bool,
    tint_buf: Buffer,
    pub bind_group: BindGroup,
}

impl Material {
    pub fn new(
        device: &Device,
        queue: &Queue,
        material_bgl: &BindGroupLayout,
        name: &str,
        colorable: bool,
        base_color: [f32; 4],
        base_color_image: Option<(&[u8], u32, u32)>,
    ) -> Self {
        let tint_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("material_tint"),
            contents: bytemuck::cast_slice(&base_color),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let (pixels, width, height) = base_color_image.unwrap_or((&WHITE_PIXEL, 1, 1));
        let texture = device.create_texture_with_data(
            queue,
            &TextureDescriptor {
                label: Some("material_base_color"),
                size: Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: TextureFormat::Rgba8UnormSrgb,
                usage: TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            pixels,
        );
        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("material_sampler"),
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            ..SamplerDescriptor::default()
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("material_bg"),
            layout: material_bgl,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: tint_buf.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            name: name.to_string(),
            colorable,
            tint_buf,
            bind_group,
        }
    }

    pub fn set_tint(&self, queue: &Queue, rgba: [f32; 4]) {
        queue.write_buffer(&self.tint_buf, 0, bytemuck::cast_slice(&rgba));
    }
}

/// A ready-to-display subtree: geometry, its materials, and the transform
/// that recenters it on the origin so the turntable spins it in place.
pub struct Model {
    pub meshes: Vec<GpuMesh>,
    pub materials: Vec<Material>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub recommended_xform: Mat4,
}

impl Model {
    pub fn diagonal(&self) -> f32 {
        (self.bounds_max - self.bounds_min).length()
    }

    pub fn center(&self) -> Vec3 {
        (self.bounds_min + self.bounds_max) * 0.5
    }

    /// Rewrite the tint of every colorable material.
    pub fn apply_tint(&self, queue: &Queue, rgba: [f32; 4]) {
        for material in self.materials.iter().filter(|m| m.colorable) {
            material.set_tint(queue, rgba);
        }
    }

    /// The placeholder shown when a load fails: a solid unit cube.
    pub fn fallback_cube(
        device: &Device,
        queue: &Queue,
        material_bgl: &BindGroupLayout,
        base_color: [f32; 4],
    ) -> Self {
        let (vertices, indices) = cube_geometry(1.0);
        let material = Material::new(
            device,
            queue,
            material_bgl,
            "fallback",
            true,
            base_color,
            None,
        );
        let mesh = GpuMesh::new(device, &vertices, &indices, 0);
        let half = 0.5;
        Self {
            meshes: vec![mesh],
            materials: vec![material],
            bounds_min: Vec3::splat(-half),
            bounds_max: Vec3::splat(half),
            recommended_xform: Mat4::IDENTITY,
        }
    }
}

pub fn create_model_ubo(
    device: &Device,
    model_bgl: &BindGroupLayout,
    xform: Mat4,
) -> (Buffer, BindGroup) {
    let model_buf = device.create_buffer_init(&BufferInitDescriptor {
        label: Some("model_ubo"),
        contents: bytemuck::cast_slice(&[xform.to_cols_array()]),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    let model_bg = device.create_bind_group(&BindGroupDescriptor {
        label: Some("model_bg"),
        layout: model_bgl,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: model_buf.as_entire_binding(),
        }],
    });
    (model_buf, model_bg)
}

/// An axis-aligned cube centered on the origin, one quad per face so the
/// normals stay flat.
pub fn cube_geometry(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    // (normal, four corners counter-clockwise seen from outside)
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        (
            [0.0, 0.0, 1.0],
            [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]],
        ),
        (
            [0.0, 0.0, -1.0],
            [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]],
        ),
        (
            [1.0, 0.0, 0.0],
            [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]],
        ),
        (
            [-1.0, 0.0, 0.0],
            [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]],
        ),
        (
            [0.0, 1.0, 0.0],
            [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]],
        ),
        (
            [0.0, -1.0, 0.0],
            [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]],
        ),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u32;
        for (corner, uv) in corners
            .iter()
            .zip([[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]])
        {
            vertices.push(Vertex {
                position: *corner,
                normal,
                uv,
            });
        }
        indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_matches_the_attribute_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(Vertex::layout().array_stride, 32);
    }

    #[test]
    fn cube_geometry_is_a_closed_unit_box() {
        let (vertices, indices) = cube_geometry(1.0);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));

        for v in &vertices {
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-6);
            for c in v.position {
                assert!(c.abs() <= 0.5 + 1e-6);
            }
        }
    }

    #[test]
    fn cube_faces_wind_outward() {
        let (vertices, indices) = cube_geometry(2.0);
        for tri in indices.chunks(3) {
            let [a, b, c] = [
                Vec3::from_array(vertices[tri[0] as usize].position),
                Vec3::from_array(vertices[tri[1] as usize].position),
                Vec3::from_array(vertices[tri[2] as usize].position),
            ];
            let face_normal = (b - a).cross(c - a);
            let authored = Vec3::from_array(vertices[tri[0] as usize].normal);
            assert!(face_normal.dot(authored) > 0.0);
        }
    }
}
