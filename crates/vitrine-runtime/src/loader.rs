use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use vitrine_3d::Model;
use vitrine_gltf::load_gltf_model;
use vitrine_viewer::{LoadRequest, RequestToken};
use wgpu::{BindGroupLayout, Device, Queue};

/// What a load worker reports back, tagged with the request it belongs to.
/// The session decides whether the token is still current.
pub enum LoadEvent {
    Progress { token: RequestToken, fraction: f32 },
    Ready { token: RequestToken, model: Box<Model> },
    Failed { token: RequestToken, detail: String },
}

/// Runs asset imports off the main thread, one worker per request.
///
/// There is no cancellation: a superseded worker runs to completion and its
/// result is discarded on arrival by the session's token check.
pub struct ModelLoader {
    device: Device,
    queue: Queue,
    material_bgl: BindGroupLayout,
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
}

impl ModelLoader {
    pub fn new(device: Device, queue: Queue, material_bgl: BindGroupLayout) -> Self {
        let (tx, rx) = channel();
        Self {
            device,
            queue,
            material_bgl,
            tx,
            rx,
        }
    }

    pub fn begin(&self, request: &LoadRequest) {
        let device = self.device.clone();
        let queue = self.queue.clone();
        let material_bgl = self.material_bgl.clone();
        let tx = self.tx.clone();
        let token = request.token;
        let path = PathBuf::from(&request.locator);
        log::debug!("load worker starting for \"{}\"", request.name);

        thread::spawn(move || {
            let progress_tx = tx.clone();
            let result = pollster::block_on(load_gltf_model(
                &device,
                &queue,
                &material_bgl,
                &path,
                move |fraction| {
                    let _ = progress_tx.send(LoadEvent::Progress { token, fraction });
                },
            ));
            let event = match result {
                Ok(model) => LoadEvent::Ready {
                    token,
                    model: Box::new(model),
                },
                Err(err) => LoadEvent::Failed {
                    token,
                    detail: format!("{err:#}"),
                },
            };
            let _ = tx.send(event);
        });
    }

    /// Drain everything the workers have produced so far. Never blocks.
    pub fn poll(&self) -> impl Iterator<Item = LoadEvent> + '_ {
        self.rx.try_iter()
    }
}
