use glam::Mat4;
use wgpu::*;

use crate::depth::create_depth;
use crate::model::{Model, create_model_ubo};
use crate::pipeline::{Layouts, create_pipeline};

/// Owns the render pipeline and the single subtree attachment slot.
///
/// At most one model is attached at a time; `set_model` swaps the slot and
/// hands the previous occupant back to the caller, whose drop releases its
/// GPU resources.
pub struct Renderer3D {
    pub render_pipeline: RenderPipeline,
    pub depth_view: TextureView,
    pub depth_tex: Texture,
    pub camera_bg: BindGroup,
    pub camera_buf: Buffer,
    pub model_bg: BindGroup,
    pub model_buf: Buffer,
    attached: Option<Model>,
}

const CLEAR_COLOR: Color = Color {
    r: 0.94,
    g: 0.94,
    b: 0.94,
    a: 1.0,
};

impl Renderer3D {
    pub fn new(
        device: &Device,
        surface_format: TextureFormat,
        width: u32,
        height: u32,
        layouts: &Layouts,
    ) -> Self {
        let (depth_view, depth_tex) = create_depth(device, width, height);
        let (render_pipeline, camera_bg, camera_buf) =
            create_pipeline(device, surface_format, layouts);
        let (model_buf, model_bg) = create_model_ubo(device, &layouts.model_bgl, Mat4::IDENTITY);

        Self {
            render_pipeline,
            depth_view,
            depth_tex,
            camera_bg,
            camera_buf,
            model_bg,
            model_buf,
            attached: None,
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        let (dv, dt) = create_depth(device, width, height);
        self.depth_view = dv;
        self.depth_tex = dt;
    }

    /// Swap the attachment slot, returning the previous occupant.
    pub fn set_model(&mut self, model: Option<Model>) -> Option<Model> {
        std::mem::replace(&mut self.attached, model)
    }

    pub fn model(&self) -> Option<&Model> {
        self.attached.as_ref()
    }

    pub fn set_model_xform(&self, queue: &Queue, xform: Mat4) {
        queue.write_buffer(&self.model_buf, 0, bytemuck::cast_slice(&[xform.to_cols_array()]));
    }

    pub fn render(&self, encoder: &mut CommandEncoder, target_view: &TextureView) {
        let mut r_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: target_view,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(CLEAR_COLOR),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(model) = &self.attached else {
            return;
        };

        r_pass.set_pipeline(&self.render_pipeline);
        r_pass.set_bind_group(0, &self.camera_bg, &[]);
        r_pass.set_bind_group(1, &self.model_bg, &[]);

        for mesh in &model.meshes {
            let Some(material) = model
                .materials
                .get(mesh.material_id)
                .or_else(|| model.materials.first())
            else {
                continue;
            };
            r_pass.set_bind_group(2, &material.bind_group, &[]);
            r_pass.set_vertex_buffer(0, mesh.vbuf.slice(..));
            r_pass.set_index_buffer(mesh.ibuf.slice(..), IndexFormat::Uint32);
            r_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}
