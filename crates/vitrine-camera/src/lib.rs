use glam::{Mat4, Vec3};
use wgpu::{Buffer, Queue};

const DEFAULT_YAW: f32 = 0.0;
const DEFAULT_PITCH: f32 = 0.35;
const MIN_DISTANCE: f32 = 0.25;
const MAX_DISTANCE: f32 = 500.0;
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

pub fn direction_from_yaw_pitch(yaw: f32, pitch: f32) -> Vec3 {
    let cp = pitch.cos();
    let sp = pitch.sin();
    let cy = yaw.cos();
    let sy = yaw.sin();
    Vec3::new(sy * cp, sp, cy * cp)
}

/// Camera orbiting a target point at a given distance.
pub struct OrbitCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            distance: distance.clamp(MIN_DISTANCE, MAX_DISTANCE),
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.target + direction_from_yaw_pitch(self.yaw, self.pitch) * self.distance
    }

    /// Re-aim at `target` from `distance` away, returning the orbit angles
    /// to their neutral defaults.
    pub fn frame(&mut self, target: Vec3, distance: f32) {
        self.target = target;
        self.distance = distance.clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.yaw = DEFAULT_YAW;
        self.pitch = DEFAULT_PITCH;
    }
}

/// Translates viewport drag/scroll input into damped orbit motion.
pub struct OrbitController {
    yaw_velocity: f32,
    pitch_velocity: f32,
    sensitivity: f32,
    zoom_step: f32,
}

const MOMENTUM: f32 = 6.0;
const DECAY_RATE: f32 = 8.0;

impl OrbitController {
    pub fn new() -> Self {
        Self {
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            sensitivity: 0.0075,
            zoom_step: 0.1,
        }
    }

    pub fn orbit(&mut self, cam: &mut OrbitCamera, dx: f32, dy: f32) {
        cam.yaw -= dx * self.sensitivity;
        cam.pitch = (cam.pitch + dy * self.sensitivity).clamp(-MAX_PITCH, MAX_PITCH);
        self.yaw_velocity = dx * self.sensitivity * MOMENTUM;
        self.pitch_velocity = dy * self.sensitivity * MOMENTUM;
    }

    pub fn zoom(&self, cam: &mut OrbitCamera, steps: f32) {
        cam.distance =
            (cam.distance * (1.0 - steps * self.zoom_step)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Let residual drag momentum play out, with exponential decay.
    pub fn update(&mut self, cam: &mut OrbitCamera, dt: f32) {
        cam.yaw -= self.yaw_velocity * dt;
        cam.pitch = (cam.pitch + self.pitch_velocity * dt).clamp(-MAX_PITCH, MAX_PITCH);
        let decay = (-DECAY_RATE * dt).exp();
        self.yaw_velocity *= decay;
        self.pitch_velocity *= decay;
    }

    /// Drop any in-flight momentum. Called when the view is reframed.
    pub fn reset(&mut self) {
        self.yaw_velocity = 0.0;
        self.pitch_velocity = 0.0;
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new()
    }
}

pub fn update_camera_buffer(
    queue: &Queue,
    camera_buf: &Buffer,
    camera: &OrbitCamera,
    width: u32,
    height: u32,
) {
    let view = Mat4::look_at_rh(camera.eye(), camera.target, Vec3::Y);
    let aspect = (width.max(1) as f32) / (height.max(1) as f32);
    let proj = Mat4::perspective_rh_gl(45.0_f32.to_radians(), aspect, 0.1, 1000.0);

    let vp = (proj * view).to_cols_array();
    queue.write_buffer(camera_buf, 0, bytemuck::cast_slice(&[vp]));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_sits_at_the_requested_distance() {
        let cam = OrbitCamera::new(Vec3::new(2.0, 0.0, -1.0), 6.0);
        let eye = cam.eye();
        assert!((eye.distance(cam.target) - 6.0).abs() < 1e-4);
    }

    #[test]
    fn framing_resets_orbit_angles() {
        let mut cam = OrbitCamera::new(Vec3::ZERO, 7.0);
        let mut controller = OrbitController::new();
        controller.orbit(&mut cam, 120.0, -45.0);
        assert_ne!(cam.yaw, DEFAULT_YAW);

        cam.frame(Vec3::new(0.0, 1.0, 0.0), 9.0);
        assert_eq!(cam.yaw, DEFAULT_YAW);
        assert_eq!(cam.pitch, DEFAULT_PITCH);
        assert_eq!(cam.distance, 9.0);
        assert_eq!(cam.target, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn pitch_never_reaches_the_poles() {
        let mut cam = OrbitCamera::new(Vec3::ZERO, 5.0);
        let mut controller = OrbitController::new();
        controller.orbit(&mut cam, 0.0, 100_000.0);
        assert!(cam.pitch < std::f32::consts::FRAC_PI_2);
        controller.orbit(&mut cam, 0.0, -200_000.0);
        assert!(cam.pitch > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = OrbitCamera::new(Vec3::ZERO, 5.0);
        let controller = OrbitController::new();
        for _ in 0..200 {
            controller.zoom(&mut cam, 5.0);
        }
        assert_eq!(cam.distance, MIN_DISTANCE);
        for _ in 0..200 {
            controller.zoom(&mut cam, -5.0);
        }
        assert_eq!(cam.distance, MAX_DISTANCE);
    }

    #[test]
    fn reset_drops_drag_momentum() {
        let mut cam = OrbitCamera::new(Vec3::ZERO, 5.0);
        let mut controller = OrbitController::new();
        controller.orbit(&mut cam, 50.0, 0.0);

        let yaw_before = cam.yaw;
        controller.update(&mut cam, 0.016);
        assert_ne!(cam.yaw, yaw_before);

        controller.reset();
        let yaw_after_reset = cam.yaw;
        controller.update(&mut cam, 0.016);
        assert_eq!(cam.yaw, yaw_after_reset);
    }
}
