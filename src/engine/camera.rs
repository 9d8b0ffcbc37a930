// Orbit camera with an optional follow mode.
//
// Camera model:
//   - A look-at point ("target") and an orbit (pitch, yaw, distance) around it
//   - WASD pans the target on XZ relative to the camera's facing direction
//   - Q/E orbit, mouse wheel zooms
//   - Follow mode: eye and target ease toward a fixed offset from a walker,
//     rotated by the walker's heading, with a frame-rate independent factor

use glam::{Mat4, Quat, Vec2, Vec3};
use super::input::InputState;
use winit::keyboard::KeyCode;

/// Eye offset from a followed walker, in the walker's local frame.
pub const FOLLOW_OFFSET: Vec3 = Vec3::new(0.0, 2.4, 4.8);
/// Height above the followed walker's feet the camera looks at.
pub const FOLLOW_LOOK_HEIGHT: f32 = 1.2;
/// Exponential easing rate for follow mode (per second).
pub const FOLLOW_EASE: f32 = 3.5;

pub struct OrbitCamera {
    /// Look-at point. Private: clamped to bounds in update(). Use target() to read.
    target: Vec3,
    eye: Vec3,

    distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    /// Elevation angle in radians (0 = horizontal, PI/2 = straight down)
    pub pitch: f32,
    /// Orbit angle around the target in radians (0 = eye on +Z side)
    pub yaw: f32,

    pub fov: f32,
    pub near: f32,
    pub far: f32,

    /// WASD pan speed in world units per second
    pub move_speed: f32,
    /// Q/E orbit speed in radians per second
    pub orbit_speed: f32,
    /// Zoom change (in distance units) per scroll line
    pub zoom_speed: f32,

    /// Target is clamped to [-bounds, bounds] on X/Z
    pub bounds: f32,

    /// Whether a selected walker, if any, should be followed.
    pub follow: bool,
}

impl OrbitCamera {
    pub fn new(bounds: f32) -> Self {
        let mut camera = Self {
            target: Vec3::ZERO,
            eye: Vec3::ZERO,
            distance: 18.0,
            min_distance: 3.0,
            max_distance: 60.0,
            pitch: 40.0_f32.to_radians(),
            yaw: 0.0,
            fov: 50.0_f32.to_radians(),
            near: 0.1,
            far: 300.0,
            move_speed: 10.0,
            orbit_speed: 1.5,
            zoom_speed: 1.5,
            bounds,
            follow: true,
        };
        camera.eye = camera.target + camera.orbit_offset();
        camera
    }

    /// Update from input. `followed` is the selected walker's (position, yaw);
    /// when present and follow mode is on, input panning is ignored.
    pub fn update(&mut self, input: &InputState, dt: f32, followed: Option<(Vec3, f32)>) {
        if let (true, Some((position, yaw))) = (self.follow, followed) {
            let (eye, target) = follow_step(self.eye, self.target, position, yaw, dt);
            self.eye = eye;
            self.target = target;
            self.sync_orbit_from_eye();
            return;
        }

        // yaw=0 puts the eye on +Z looking toward -Z, so forward is (0, -1) in (X, Z).
        let forward = Vec2::new(-self.yaw.sin(), -self.yaw.cos());
        let right = Vec2::new(self.yaw.cos(), -self.yaw.sin());

        let mut move_dir = Vec2::ZERO;
        if input.is_key_held(KeyCode::KeyW) { move_dir += forward; }
        if input.is_key_held(KeyCode::KeyS) { move_dir -= forward; }
        if input.is_key_held(KeyCode::KeyD) { move_dir += right; }
        if input.is_key_held(KeyCode::KeyA) { move_dir -= right; }

        if move_dir != Vec2::ZERO {
            let step = move_dir.normalize() * self.move_speed * dt;
            self.target.x += step.x;
            self.target.z += step.y;
        }

        if input.is_key_held(KeyCode::KeyQ) { self.yaw -= self.orbit_speed * dt; }
        if input.is_key_held(KeyCode::KeyE) { self.yaw += self.orbit_speed * dt; }

        // Scroll up (positive delta) zooms in
        self.distance -= input.scroll_delta * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);

        self.target.x = self.target.x.clamp(-self.bounds, self.bounds);
        self.target.z = self.target.z.clamp(-self.bounds, self.bounds);
        self.eye = self.target + self.orbit_offset();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Project a world point to screen pixels (origin top-left).
    /// `None` if the point is behind the camera.
    pub fn project(&self, world: Vec3, screen: (f32, f32)) -> Option<(f32, f32)> {
        if screen.0 <= 0.0 || screen.1 <= 0.0 {
            return None;
        }
        let clip = self.view_projection(screen.0 / screen.1) * world.extend(1.0);
        if clip.w <= 1e-4 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(((ndc.x + 1.0) * 0.5 * screen.0, (1.0 - ndc.y) * 0.5 * screen.1))
    }

    pub fn target(&self) -> Vec3 { self.target }
    pub fn eye(&self) -> Vec3 { self.eye }
    pub fn distance(&self) -> f32 { self.distance }

    // Offset from target to eye based on pitch, yaw, and distance.
    fn orbit_offset(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos() * self.distance,
            self.pitch.sin() * self.distance,
            self.yaw.cos() * self.pitch.cos() * self.distance,
        )
    }

    // Recover orbit parameters so leaving follow mode doesn't jump.
    fn sync_orbit_from_eye(&mut self) {
        let offset = self.eye - self.target;
        let len = offset.length();
        if len <= 1e-4 {
            return;
        }
        self.distance = len.clamp(self.min_distance, self.max_distance);
        self.pitch = (offset.y / len).clamp(-1.0, 1.0).asin();
        self.yaw = offset.x.atan2(offset.z);
    }
}

/// One easing step of follow mode. Returns the new (eye, look-at target).
pub fn follow_step(eye: Vec3, target: Vec3, walker_position: Vec3, walker_yaw: f32, dt: f32) -> (Vec3, Vec3) {
    let desired_eye = walker_position + Quat::from_rotation_y(walker_yaw) * FOLLOW_OFFSET;
    let desired_target = walker_position + Vec3::Y * FOLLOW_LOOK_HEIGHT;
    let k = 1.0 - (-dt * FOLLOW_EASE).exp();
    (eye.lerp(desired_eye, k), target.lerp(desired_target, k))
}
