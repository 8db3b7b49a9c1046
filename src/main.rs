mod app;
mod config;
mod embed;

use std::path::Path;

use crate::app::App;
use crate::config::VitrineConfig;
use vitrine_runtime::Graphics;
use winit::event_loop::EventLoop;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = VitrineConfig::load_or_default(Path::new("vitrine.toml"));
    let event_loop = EventLoop::<Graphics>::with_user_event().build().unwrap();

    let mut app = App::new(&event_loop, config);
    let _ = event_loop.run_app(&mut app);
}
