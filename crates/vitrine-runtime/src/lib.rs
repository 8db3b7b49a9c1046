use std::time::Instant;

use winit::{dpi::PhysicalSize, event_loop::EventLoopProxy, window::Window};

use wgpu::{
    Adapter, CommandEncoderDescriptor, Device, ExperimentalFeatures, Features, Instance, Limits,
    MemoryHints, PowerPreference, Queue, RequestAdapterOptions, Surface, SurfaceConfiguration,
    Texture, TextureFormat, TextureView, TextureViewDescriptor,
};

pub type RcWindow = std::sync::Arc<Window>;

use glam::{Mat4, Vec3};
use vitrine_3d::{Layouts, Model, Renderer3D, create_bind_group_layouts};
use vitrine_camera::{OrbitCamera, OrbitController, update_camera_buffer};
use vitrine_viewer::{FALLBACK_COLOR, Rgb, SceneBounds, SceneStage};

mod loader;
pub use loader::{LoadEvent, ModelLoader};

/// Initial orbit distance before the first model frames the camera.
const INITIAL_CAMERA_DISTANCE: f32 = 7.0;

/// Idle turntable speed, radians per second.
const TURNTABLE_SPEED: f32 = 0.6;

pub struct Viewport {
    pub color: Texture,
    pub color_view: TextureView,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl Viewport {
    pub fn new(device: &wgpu::Device, format: TextureFormat, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            width,
            height,
            format,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        *self = Viewport::new(device, self.format, width, height);
    }
}

pub async fn create_graphics(window: RcWindow, proxy: EventLoopProxy<Graphics>) {
    let instance = Instance::default();
    let surface = instance
        .create_surface(std::sync::Arc::clone(&window))
        .unwrap();

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        })
        .await
        .expect("Could not get an adapter (GPU).");

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: Features::empty(),
            required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
            memory_hints: MemoryHints::Performance,
            trace: Default::default(),
            experimental_features: ExperimentalFeatures::disabled(),
        })
        .await
        .expect("Failed to get device");

    let size = window.inner_size();
    let width = size.width.max(1);
    let height = size.height.max(1);

    let surface_config = surface
        .get_default_config(&adapter, width, height)
        .expect("Failed to create surface config");
    surface.configure(&device, &surface_config);

    let layouts: Layouts = create_bind_group_layouts(&device);

    let viewport = Viewport::new(
        &device,
        surface_config.format,
        surface_config.width,
        surface_config.height,
    );

    let renderer = Renderer3D::new(
        &device,
        surface_config.format,
        surface_config.width,
        surface_config.height,
        &layouts,
    );

    let camera = OrbitCamera::new(Vec3::ZERO, INITIAL_CAMERA_DISTANCE);
    let controller = OrbitController::new();

    update_camera_buffer(
        &queue,
        &renderer.camera_buf,
        &camera,
        surface_config.width,
        surface_config.height,
    );

    let gfx = Graphics {
        window,
        instance,
        surface,
        surface_config,
        adapter,
        device,
        queue,
        layouts,
        renderer,
        camera,
        controller,
        viewport,
        spin_angle: 0.0,
        last_frame_time: Instant::now(),
    };

    let _ = proxy.send_event(gfx);
}

/// Owner of the GPU surface, the renderer, and the orbit camera. The empty
/// stage shows only the clear color until a load completes.
#[allow(dead_code)]
pub struct Graphics {
    pub(crate) window: RcWindow,
    pub viewport: Viewport,
    instance: Instance,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    adapter: Adapter,
    device: Device,
    queue: Queue,
    layouts: Layouts,
    renderer: Renderer3D,
    camera: OrbitCamera,
    controller: OrbitController,
    spin_angle: f32,
    last_frame_time: Instant,
}

impl Graphics {
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn viewport_view(&self) -> &TextureView {
        &self.viewport.color_view
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.surface_config.width = new_size.width.max(1);
        self.surface_config.height = new_size.height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
        self.viewport.resize(
            &self.device,
            self.surface_config.width,
            self.surface_config.height,
        );
        self.renderer
            .resize(&self.device, self.viewport.width, self.viewport.height);

        update_camera_buffer(
            &self.queue,
            &self.renderer.camera_buf,
            &self.camera,
            self.viewport.width,
            self.viewport.height,
        );
    }

    pub fn draw<F>(&mut self, overlay: F)
    where
        F: FnOnce(&mut Self, &TextureView, &mut wgpu::CommandEncoder),
    {
        let now = Instant::now();
        let mut dt = (now - self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        if dt > 0.1 {
            dt = 0.1;
        }
        self.controller.update(&mut self.camera, dt);

        // The turntable spins whatever is attached, so it survives swaps.
        self.spin_angle = (self.spin_angle + TURNTABLE_SPEED * dt) % std::f32::consts::TAU;
        let model_xform = match self.renderer.model() {
            Some(model) => Mat4::from_rotation_y(self.spin_angle) * model.recommended_xform,
            None => Mat4::IDENTITY,
        };
        self.renderer.set_model_xform(&self.queue, model_xform);

        update_camera_buffer(
            &self.queue,
            &self.renderer.camera_buf,
            &self.camera,
            self.viewport.width,
            self.viewport.height,
        );
        let frame = self
            .surface
            .get_current_texture()
            .expect("Failed to acquire next swap chain texture.");

        let swap_view = frame.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        self.renderer.render(&mut encoder, &self.viewport.color_view);
        overlay(self, &swap_view, &mut encoder);
        self.queue.submit(Some(encoder.finish()));
        frame.present();
    }

    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.controller.orbit(&mut self.camera, dx, dy);
    }

    pub fn zoom(&mut self, steps: f32) {
        self.controller.zoom(&mut self.camera, steps);
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn material_bgl(&self) -> &wgpu::BindGroupLayout {
        &self.layouts.material_bgl
    }

    pub fn surface_config(&self) -> &SurfaceConfiguration {
        &self.surface_config
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }
}

impl SceneStage for Graphics {
    type Subtree = Model;

    fn attach(&mut self, subtree: Model) -> Option<Model> {
        self.renderer.set_model(Some(subtree))
    }

    fn detach(&mut self) -> Option<Model> {
        self.renderer.set_model(None)
    }

    fn attach_fallback(&mut self) -> Option<Model> {
        let cube = Model::fallback_cube(
            &self.device,
            &self.queue,
            &self.layouts.material_bgl,
            FALLBACK_COLOR.as_rgba_f32(),
        );
        self.renderer.set_model(Some(cube))
    }

    fn bounds(&self) -> Option<SceneBounds> {
        // Models are recentered on the origin by their recommended
        // transform, so that is where framing aims.
        self.renderer.model().map(|model| SceneBounds {
            center: Vec3::ZERO,
            diagonal: model.diagonal(),
        })
    }

    fn apply_tint(&mut self, color: Rgb) {
        if let Some(model) = self.renderer.model() {
            model.apply_tint(&self.queue, color.as_rgba_f32());
        }
    }

    fn frame_camera(&mut self, center: Vec3, distance: f32) {
        self.camera.frame(center, distance);
    }

    fn reset_interaction(&mut self) {
        self.controller.reset();
    }
}
