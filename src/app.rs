use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use egui::Sense;
use egui::load::SizedTexture;
use vitrine_runtime::{Graphics, LoadEvent, ModelLoader, RcWindow, create_graphics};
use vitrine_viewer::{Rgb, ViewerError, ViewerSession, ViewerState};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::config::VitrineConfig;
use crate::embed;

const FPS: u64 = 120;
const FRAME_TIME: Duration = Duration::from_nanos(1_000_000_000 / FPS);

enum State {
    Ready(ReadyState),
    Init(Option<EventLoopProxy<Graphics>>),
}

struct ReadyState {
    gfx: Graphics,
    loader: ModelLoader,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    viewport_tex_id: egui::TextureId,
}

pub struct AddModelForm {
    pub name_input: String,
    pub locator_input: String,
    pub error: Option<String>,
}

impl AddModelForm {
    pub fn new() -> Self {
        Self {
            name_input: String::new(),
            locator_input: String::new(),
            error: None,
        }
    }
}

/// Commands collected during the UI pass and applied afterwards, once the
/// graphics state is borrowable again.
enum UiCommand {
    Select(String),
    SetColor(Rgb),
    Remove(String),
    Orbit(f32, f32),
    Zoom(f32),
}

pub struct ConfiguratorUi {
    pub session: ViewerSession,
    pub show_admin_panel: bool,
    pub show_status_bar: bool,
    pub quit_requested: bool,
    pub add_form: AddModelForm,
    pub export_selection: Option<String>,
    pub events: Rc<RefCell<Vec<String>>>,
}

impl ConfiguratorUi {
    pub fn new(config: &VitrineConfig) -> Self {
        let mut session = ViewerSession::new(config.registry());

        // Shown in the status bar; the subscription also keeps the panels in
        // sync with tints applied by model restores.
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.subscribe(move |change| {
            let subject = change.name.as_deref().unwrap_or("placeholder");
            let mut feed = sink.borrow_mut();
            feed.push(format!("{subject} tinted {}", change.color));
            if feed.len() > 100 {
                let excess = feed.len() - 100;
                feed.drain(..excess);
            }
        });

        Self {
            session,
            show_admin_panel: false,
            show_status_bar: true,
            quit_requested: false,
            add_form: AddModelForm::new(),
            export_selection: None,
            events,
        }
    }
}

pub struct App {
    state: State,
    render_target: Instant,
    config: VitrineConfig,
    ui: ConfiguratorUi,
}

impl App {
    pub fn new(event_loop: &EventLoop<Graphics>, config: VitrineConfig) -> Self {
        let ui = ConfiguratorUi::new(&config);
        Self {
            state: State::Init(Some(event_loop.create_proxy())),
            render_target: Instant::now(),
            config,
            ui,
        }
    }

    fn init_egui_for_graphics(
        gfx: &Graphics,
    ) -> (
        egui::Context,
        egui_winit::State,
        egui_wgpu::Renderer,
        egui::TextureId,
    ) {
        let egui_ctx = egui::Context::default();
        let viewport_id = egui_ctx.viewport_id();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            viewport_id,
            gfx.window(),
            None,
            None,
            None,
        );

        let mut egui_renderer = egui_wgpu::Renderer::new(
            gfx.device(),
            gfx.surface_config().format,
            egui_wgpu::RendererOptions::default(),
        );

        let viewport_tex_id = egui_renderer.register_native_texture(
            gfx.device(),
            gfx.viewport_view(),
            wgpu::FilterMode::Linear,
        );

        (egui_ctx, egui_state, egui_renderer, viewport_tex_id)
    }

    fn begin_selection(ready: &ReadyState, session: &mut ViewerSession, name: &str) {
        match session.select_model(name) {
            Ok(Some(request)) => ready.loader.begin(&request),
            Ok(None) => {}
            Err(err) => log::warn!("selection rejected: {err}"),
        }
    }

    /// Feed finished and in-flight loads into the session. Stale tokens die
    /// inside the session, so everything the workers report can be drained
    /// unconditionally.
    fn drain_loads(ready: &mut ReadyState, session: &mut ViewerSession) {
        let events: Vec<LoadEvent> = ready.loader.poll().collect();
        for event in events {
            match event {
                LoadEvent::Progress { token, fraction } => {
                    session.report_progress(token, fraction);
                }
                LoadEvent::Ready { token, model } => {
                    session.finish_load(&mut ready.gfx, token, Ok(*model));
                }
                LoadEvent::Failed { token, detail } => {
                    session.finish_load(
                        &mut ready.gfx,
                        token,
                        Err(ViewerError::LoadFailure(detail)),
                    );
                }
            }
        }
    }

    fn draw(&mut self) {
        if let State::Ready(ready) = &mut self.state {
            Self::drain_loads(ready, &mut self.ui.session);
            Self::draw_editor(ready, &mut self.ui);
        }
    }

    fn resized(&mut self, size: PhysicalSize<u32>) {
        if let State::Ready(ready) = &mut self.state {
            ready.gfx.resize(size);
            ready.egui_renderer.free_texture(&ready.viewport_tex_id);
            ready.viewport_tex_id = ready.egui_renderer.register_native_texture(
                ready.gfx.device(),
                ready.gfx.viewport_view(),
                wgpu::FilterMode::Linear,
            );
        }
    }

    fn draw_editor(ready: &mut ReadyState, ui_state: &mut ConfiguratorUi) {
        let raw_input = ready.egui_state.take_egui_input(ready.gfx.window());
        let viewport_tex_id = ready.viewport_tex_id;
        let surface_cfg = ready.gfx.surface_config();
        let viewport_w = surface_cfg.width as f32;
        let viewport_h = surface_cfg.height as f32;
        let egui_ctx = ready.egui_ctx.clone();
        let mut commands: Vec<UiCommand> = Vec::new();

        let full_output = egui_ctx.run(raw_input, |ctx| {
            egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
                egui::MenuBar::new().ui(ui, |ui| {
                    ui.menu_button("File", |ui| {
                        if ui.button("Quit").clicked() {
                            ui_state.quit_requested = true;
                            ui.close();
                        }
                    });

                    ui.menu_button("View", |ui| {
                        ui.checkbox(&mut ui_state.show_admin_panel, "Administration panel");
                        ui.checkbox(&mut ui_state.show_status_bar, "Status bar");
                    });

                    ui.menu_button("Help", |ui| {
                        ui.label("Vitrine Configurator");
                    });
                });
            });

            let names: Vec<String> = ui_state.session.model_names().map(str::to_string).collect();

            egui::SidePanel::left("product_panel")
                .resizable(true)
                .default_width(220.0)
                .show(ctx, |ui| {
                    ui.heading("Product");
                    ui.separator();

                    let selected_label = match ui_state.session.state() {
                        ViewerState::Loading { target } => format!("{target}…"),
                        ViewerState::Displayed { name } => name.to_string(),
                        ViewerState::Fallback => "(placeholder)".to_string(),
                        ViewerState::Idle => "—".to_string(),
                    };
                    egui::ComboBox::from_label("Model")
                        .selected_text(selected_label)
                        .show_ui(ui, |ui| {
                            for name in &names {
                                let displayed =
                                    ui_state.session.displayed_model() == Some(name.as_str());
                                if ui.selectable_label(displayed, name).clicked() {
                                    commands.push(UiCommand::Select(name.clone()));
                                }
                            }
                        });

                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.label("Color:");
                        let mut rgb = ui_state.session.current_color().to_srgb8();
                        if ui.color_edit_button_srgb(&mut rgb).changed() {
                            commands.push(UiCommand::SetColor(Rgb::from_srgb8(rgb)));
                        }
                        ui.monospace(ui_state.session.current_color().to_string());
                    });
                });

            egui::SidePanel::right("admin_panel")
                .resizable(true)
                .default_width(320.0)
                .show_animated(ctx, ui_state.show_admin_panel, |ui| {
                    ui.heading("Administration");
                    ui.separator();

                    ui.label("Registered models:");
                    for name in &names {
                        ui.horizontal(|ui| {
                            ui.label(name);
                            if ui.small_button("Remove").clicked() {
                                commands.push(UiCommand::Remove(name.clone()));
                            }
                        });
                    }

                    ui.separator();
                    ui.label("Add a model (.glb / .gltf):");
                    ui.horizontal(|ui| {
                        ui.label("Name:");
                        ui.text_edit_singleline(&mut ui_state.add_form.name_input);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Path:");
                        ui.text_edit_singleline(&mut ui_state.add_form.locator_input);
                    });

                    if let Some(err) = &ui_state.add_form.error {
                        ui.colored_label(egui::Color32::RED, err);
                    }

                    if ui.button("Add").clicked() {
                        let name = ui_state.add_form.name_input.trim().to_string();
                        let locator = ui_state.add_form.locator_input.trim().to_string();

                        if name.is_empty() {
                            ui_state.add_form.error = Some("Model name cannot be empty".into());
                        } else if locator.is_empty() {
                            ui_state.add_form.error = Some("Model path cannot be empty".into());
                        } else {
                            match ui_state.session.add_model(&name, &locator) {
                                Ok(()) => ui_state.add_form = AddModelForm::new(),
                                Err(err) => ui_state.add_form.error = Some(err.to_string()),
                            }
                        }
                    }
                    ui.label("Added models last for this session only.");

                    ui.separator();
                    ui.heading("Embed");

                    let mut export = ui_state
                        .export_selection
                        .clone()
                        .filter(|sel| names.iter().any(|n| n == sel))
                        .or_else(|| names.first().cloned());

                    egui::ComboBox::from_id_salt("export_model")
                        .selected_text(export.clone().unwrap_or_else(|| "—".to_string()))
                        .show_ui(ui, |ui| {
                            for name in &names {
                                ui.selectable_value(&mut export, Some(name.clone()), name);
                            }
                        });

                    if let Some(export_name) = &export {
                        if let Some(locator) = ui_state.session.locator(export_name) {
                            let code = embed::standalone_viewer_html(export_name, locator);
                            ui.add(
                                egui::TextEdit::multiline(&mut code.as_str())
                                    .code_editor()
                                    .desired_rows(10)
                                    .desired_width(f32::INFINITY),
                            );
                            if ui.button("Copy to clipboard").clicked() {
                                ctx.copy_text(code);
                            }
                        }
                    }
                    ui_state.export_selection = export;
                });

            egui::TopBottomPanel::bottom("status_bar").show_animated(
                ctx,
                ui_state.show_status_bar,
                |ui| {
                    ui.horizontal(|ui| {
                        match ui_state.session.state() {
                            ViewerState::Loading { target } => {
                                let fraction = ui_state.session.load_progress().unwrap_or(0.0);
                                ui.label(format!("Loading {target}…"));
                                ui.add(
                                    egui::ProgressBar::new(fraction)
                                        .desired_width(160.0)
                                        .show_percentage(),
                                );
                            }
                            ViewerState::Displayed { name } => {
                                ui.label(format!(
                                    "{name} — tint {}",
                                    ui_state.session.current_color()
                                ));
                            }
                            ViewerState::Fallback => {
                                ui.colored_label(
                                    egui::Color32::RED,
                                    "Model failed to load — showing a placeholder",
                                );
                            }
                            ViewerState::Idle => {
                                ui.label("No model loaded");
                            }
                        }
                        if let Some(last) = ui_state.events.borrow().last() {
                            ui.separator();
                            ui.label(last.clone());
                        }
                    });
                },
            );

            egui::CentralPanel::default().show(ctx, |ui| {
                let available = ui.available_size();

                if available.x > 0.0 && available.y > 0.0 && viewport_w > 0.0 && viewport_h > 0.0 {
                    let tex_aspect = viewport_w / viewport_h;
                    let panel_aspect = available.x / available.y;
                    let (w, h) = if panel_aspect > tex_aspect {
                        let h = available.y;
                        let w = h * tex_aspect;
                        (w, h)
                    } else {
                        let w = available.x;
                        let h = w / tex_aspect;
                        (w, h)
                    };

                    let viewport_size = egui::vec2(w, h);
                    let sized = SizedTexture::new(viewport_tex_id, viewport_size);
                    let image = egui::Image::from_texture(sized).sense(Sense::click_and_drag());
                    let response = ui.add(image);

                    if response.dragged() {
                        let delta = response.drag_delta();
                        if delta != egui::Vec2::ZERO {
                            commands.push(UiCommand::Orbit(delta.x, delta.y));
                        }
                    }
                    if response.hovered() {
                        let scroll = ui.input(|i| i.raw_scroll_delta.y);
                        if scroll != 0.0 {
                            commands.push(UiCommand::Zoom(scroll / 50.0));
                        }
                    }
                } else {
                    ui.label("Viewport area is too small.");
                }
            });
        });

        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = full_output;

        ready
            .egui_state
            .handle_platform_output(ready.gfx.window(), platform_output);

        let paint_jobs = ready.egui_ctx.tessellate(shapes, pixels_per_point);

        for command in commands {
            match command {
                UiCommand::Select(name) => {
                    Self::begin_selection(ready, &mut ui_state.session, &name);
                }
                UiCommand::SetColor(color) => {
                    ui_state.session.set_color(&mut ready.gfx, color);
                }
                UiCommand::Remove(name) => {
                    match ui_state.session.remove_model(&mut ready.gfx, &name) {
                        Ok(Some(request)) => ready.loader.begin(&request),
                        Ok(None) => {}
                        Err(err) => log::warn!("removal rejected: {err}"),
                    }
                }
                UiCommand::Orbit(dx, dy) => ready.gfx.orbit(dx, dy),
                UiCommand::Zoom(steps) => ready.gfx.zoom(steps),
            }
        }

        ready.gfx.draw(|gfx_inner, swap_view, encoder| {
            for (id, image_delta) in &textures_delta.set {
                ready.egui_renderer.update_texture(
                    gfx_inner.device(),
                    gfx_inner.queue(),
                    *id,
                    image_delta,
                );
            }
            for id in &textures_delta.free {
                ready.egui_renderer.free_texture(id);
            }

            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [
                    gfx_inner.surface_config().width,
                    gfx_inner.surface_config().height,
                ],
                pixels_per_point,
            };

            ready.egui_renderer.update_buffers(
                gfx_inner.device(),
                gfx_inner.queue(),
                encoder,
                &paint_jobs,
                &screen_descriptor,
            );

            let rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_overlay_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut rpass = rpass.forget_lifetime();
            ready
                .egui_renderer
                .render(&mut rpass, &paint_jobs, &screen_descriptor);
        });
    }
}

impl ApplicationHandler<Graphics> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let State::Init(proxy) = &mut self.state {
            if let Some(proxy) = proxy.take() {
                let mut win_attr = Window::default_attributes();
                win_attr = win_attr.with_title(self.config.window.title.clone());

                let window: RcWindow = std::sync::Arc::new(
                    event_loop
                        .create_window(win_attr)
                        .expect("create window err."),
                );
                pollster::block_on(create_graphics(window, proxy));
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, graphics: Graphics) {
        let (egui_ctx, egui_state, egui_renderer, viewport_tex_id) =
            App::init_egui_for_graphics(&graphics);
        let loader = ModelLoader::new(
            graphics.device().clone(),
            graphics.queue().clone(),
            graphics.material_bgl().clone(),
        );

        graphics.request_redraw();
        let ready = ReadyState {
            gfx: graphics,
            loader,
            egui_ctx,
            egui_state,
            egui_renderer,
            viewport_tex_id,
        };

        // Bring up the first registered model without waiting for input.
        let first = self.ui.session.model_names().next().map(str::to_string);
        if let Some(first) = first {
            App::begin_selection(&ready, &mut self.ui.session, &first);
        }

        self.state = State::Ready(ready);
    }

    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: StartCause) {
        if self.render_target <= Instant::now() {
            self.render_target += FRAME_TIME;
            if let State::Ready(ready) = &mut self.state {
                ready.gfx.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::Resized(size) => self.resized(size),
            WindowEvent::RedrawRequested => {
                self.draw();
                if self.ui.quit_requested {
                    event_loop.exit();
                    return;
                }
                let now = Instant::now();
                if self.render_target <= now {
                    self.render_target = now + FRAME_TIME;
                    if let State::Ready(ready) = &mut self.state {
                        ready.gfx.request_redraw();
                    }
                }
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            other => {
                if let State::Ready(ready) = &mut self.state {
                    let response = ready.egui_state.on_window_event(ready.gfx.window(), &other);
                    if response.repaint {
                        ready.gfx.request_redraw();
                    }
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.render_target));
    }
}
