use glam::{Mat4, Quat, Vec2, Vec3};
use winit::dpi::PhysicalSize;

const DEFAULT_UP: Vec3 = Vec3::Y;
const MIN_PITCH: f32 = -(std::f32::consts::FRAC_PI_2 - 0.01);

/// Perspective camera for the showcase viewport.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, near, far }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: PhysicalSize<u32>) -> Mat4 {
        let aspect = if viewport.height > 0 { viewport.width as f32 / viewport.height as f32 } else { 1.0 };
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

/// Orbit rig around the car: yaw/pitch/radius with velocity damping, an
/// auto-rotate preference, and a hover override that suspends auto-rotation
/// without touching the preference.
#[derive(Debug, Clone)]
pub struct OrbitRig {
    pub target: Vec3,
    pub radius: f32,
    pub yaw_radians: f32,
    pub pitch_radians: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Fraction of angular velocity shed per 60 Hz frame.
    pub damping: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    hovered: bool,
    yaw_velocity: f32,
    pitch_velocity: f32,
}

impl OrbitRig {
    pub fn new(target: Vec3, radius: f32, min_radius: f32, max_radius: f32) -> Self {
        Self {
            target,
            radius: radius.clamp(min_radius.max(0.01), max_radius),
            yaw_radians: 0.0,
            pitch_radians: 0.0,
            min_radius: min_radius.max(0.01),
            max_radius,
            damping: 0.05,
            auto_rotate: true,
            auto_rotate_speed: 2.0,
            hovered: false,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
        }
    }

    /// Places the rig so the camera starts at `position` looking at `target`.
    pub fn framing(position: Vec3, target: Vec3, min_radius: f32, max_radius: f32) -> Self {
        let offset = position - target;
        let radius = offset.length().max(min_radius.max(0.01));
        let yaw = offset.x.atan2(offset.z);
        let pitch = (-offset.y / radius).clamp(-1.0, 1.0).asin().clamp(MIN_PITCH, 0.0);
        let mut rig = Self::new(target, radius, min_radius, max_radius);
        rig.yaw_radians = yaw;
        rig.pitch_radians = pitch;
        rig
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    pub fn hovered(&self) -> bool {
        self.hovered
    }

    /// Hover always wins while active; leaving restores the preference.
    pub fn effective_auto_rotate(&self) -> bool {
        self.auto_rotate && !self.hovered
    }

    pub fn orbit(&mut self, delta: Vec2) {
        self.yaw_velocity += delta.x;
        self.pitch_velocity += delta.y;
    }

    pub fn zoom(&mut self, factor: f32) {
        self.radius = (self.radius * factor).clamp(self.min_radius, self.max_radius);
    }

    pub fn update(&mut self, dt: f32) {
        if self.effective_auto_rotate() {
            // autoRotateSpeed 2.0 is one revolution every 30 seconds.
            self.yaw_radians += std::f32::consts::TAU / 60.0 * self.auto_rotate_speed * dt;
        }
        self.yaw_radians += self.yaw_velocity;
        self.pitch_radians = (self.pitch_radians + self.pitch_velocity).clamp(MIN_PITCH, 0.0);
        self.yaw_radians = crate::wrap_angle(self.yaw_radians);
        let retain = (1.0 - self.damping).clamp(0.0, 1.0).powf(dt * 60.0);
        self.yaw_velocity *= retain;
        self.pitch_velocity *= retain;
        if self.yaw_velocity.abs() < 1e-6 {
            self.yaw_velocity = 0.0;
        }
        if self.pitch_velocity.abs() < 1e-6 {
            self.pitch_velocity = 0.0;
        }
    }

    pub fn to_camera(&self, fov_y_radians: f32, near: f32, far: f32) -> Camera3D {
        let rotation = Quat::from_euler(glam::EulerRot::YXZ, self.yaw_radians, self.pitch_radians, 0.0);
        let offset = rotation * Vec3::new(0.0, 0.0, self.radius);
        Camera3D::new(self.target + offset, self.target, fov_y_radians, near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_view_projection_is_finite() {
        let camera = Camera3D::new(Vec3::new(5.0, 3.0, 5.0), Vec3::ZERO, 75.0_f32.to_radians(), 0.1, 1000.0);
        let vp = camera.view_projection(PhysicalSize::new(1280, 720));
        assert!(!vp.to_cols_array().iter().any(|v| v.is_nan() || v.is_infinite()));
    }

    #[test]
    fn framing_reproduces_start_position() {
        let rig = OrbitRig::framing(Vec3::new(5.0, 3.0, 5.0), Vec3::ZERO, 3.0, 15.0);
        let camera = rig.to_camera(75.0_f32.to_radians(), 0.1, 1000.0);
        assert!(camera.position.distance(Vec3::new(5.0, 3.0, 5.0)) < 1e-3);
    }

    #[test]
    fn hover_suspends_auto_rotate_without_clearing_preference() {
        let mut rig = OrbitRig::new(Vec3::ZERO, 7.0, 3.0, 15.0);
        assert!(rig.effective_auto_rotate());
        rig.set_hovered(true);
        assert!(rig.auto_rotate, "preference must survive hover");
        assert!(!rig.effective_auto_rotate());
        rig.set_hovered(false);
        assert!(rig.effective_auto_rotate());
    }

    #[test]
    fn orbit_velocity_damps_out() {
        let mut rig = OrbitRig::new(Vec3::ZERO, 7.0, 3.0, 15.0);
        rig.auto_rotate = false;
        rig.orbit(Vec2::new(0.2, 0.0));
        let mut last_yaw = rig.yaw_radians;
        let mut moved = 0.0;
        for _ in 0..600 {
            rig.update(1.0 / 60.0);
            moved += (rig.yaw_radians - last_yaw).abs();
            last_yaw = rig.yaw_radians;
        }
        assert!(moved > 0.2, "initial impulse should carry the rig");
        let settled = rig.yaw_radians;
        rig.update(1.0 / 60.0);
        assert!((rig.yaw_radians - settled).abs() < 1e-4, "velocity should decay to rest");
    }

    #[test]
    fn zoom_respects_distance_clamp()  {
        let mut rig = OrbitRig::new(Vec3::ZERO, 7.0, 3.0, 15.0);
        rig.zoom(0.01);
        assert!((rig.radius - 3.0).abs() < 1e-6);
        rig.zoom(100.0);
        assert!((rig.radius - 15.0).abs() < 1e-6);
    }
}
