use glam::Vec3;

use crate::color::Rgb;

/// Viewing distance as a multiple of the attached subtree's bounding
/// diagonal.
pub const FRAMING_FACTOR: f32 = 1.5;

/// Viewing distance used when no bounds are available (fallback solid,
/// empty stage).
pub const FALLBACK_CAMERA_DISTANCE: f32 = 3.0;

/// Bounding volume of the attached subtree, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBounds {
    pub center: Vec3,
    pub diagonal: f32,
}

/// The rendering service as seen by the session: a single subtree attachment
/// point plus camera framing.
///
/// The implementor owns the attachment slot exclusively; panels never touch
/// it directly. `attach`/`detach` return the previously attached subtree so
/// the caller decides when it is released (in practice it is dropped
/// immediately, which frees its GPU resources).
pub trait SceneStage {
    type Subtree;

    fn attach(&mut self, subtree: Self::Subtree) -> Option<Self::Subtree>;

    fn detach(&mut self) -> Option<Self::Subtree>;

    /// Attach the fixed fallback solid in place of whatever is displayed.
    fn attach_fallback(&mut self) -> Option<Self::Subtree>;

    /// Bounds of the currently attached subtree, `None` when empty.
    fn bounds(&self) -> Option<SceneBounds>;

    /// Tint every colorable surface of the attached subtree.
    fn apply_tint(&mut self, color: Rgb);

    fn frame_camera(&mut self, center: Vec3, distance: f32);

    /// Return orbit/pan/zoom interaction state to neutral.
    fn reset_interaction(&mut self);
}
