//! Viewer core: model registry, color memory, and the load/transition
//! state machine. Rendering and asset loading stay behind the [`SceneStage`]
//! trait and the [`LoadRequest`] handoff, so this crate has no GPU
//! dependencies and is fully unit tested.

pub mod color;
pub mod error;
pub mod registry;
pub mod session;
pub mod stage;

pub use color::{ColorMemory, DEFAULT_TINT, FALLBACK_COLOR, Rgb};
pub use error::ViewerError;
pub use registry::{ModelEntry, ModelRegistry};
pub use session::{
    LoadOutcome, LoadRequest, ModelChanged, RequestToken, ViewerSession, ViewerState,
};
pub use stage::{FALLBACK_CAMERA_DISTANCE, FRAMING_FACTOR, SceneBounds, SceneStage};
