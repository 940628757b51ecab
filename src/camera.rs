use glam::Vec2;

use crate::transform::world_to_screen;

/// Smoothed follow camera.
///
/// The camera's only output is `offset`, the screen-space offset consumed by
/// [`crate::transform`]. Each frame the orchestrator calls [`Camera::follow`]
/// with the local entity's interpolated world position and then
/// [`Camera::tick`] to lerp toward it. The first `follow` snaps directly so a
/// fresh renderer never pans in from the origin.
pub struct Camera {
    /// Current screen-space offset fed to the coordinate transform.
    pub offset: Vec2,
    target: Vec2,
    snapped: bool,
}

impl Camera {
    pub fn new() -> Self {
        Self { offset: Vec2::ZERO, target: Vec2::ZERO, snapped: false }
    }

    /// Aim the camera so `world_pos` lands at the center of a
    /// `frame_w` × `frame_h` canvas.
    pub fn follow(&mut self, world_pos: Vec2, frame_w: f32, frame_h: f32) {
        let center = world_to_screen(world_pos, Vec2::ZERO);
        self.target = center - Vec2::new(frame_w * 0.5, frame_h * 0.5);
        if !self.snapped {
            self.offset = self.target;
            self.snapped = true;
        }
    }

    /// Advance the smoothing by `dt` seconds (converges at ~10x per second).
    pub fn tick(&mut self, dt: f32) {
        let k = (10.0 * dt).min(1.0);
        self.offset += (self.target - self.offset) * k;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_follow_snaps() {
        let mut cam = Camera::new();
        cam.follow(Vec2::new(5.0, 5.0), 800.0, 600.0);
        let expected = world_to_screen(Vec2::new(5.0, 5.0), Vec2::ZERO) - Vec2::new(400.0, 300.0);
        assert_eq!(cam.offset, expected);
    }

    #[test]
    fn tick_converges_toward_target() {
        let mut cam = Camera::new();
        cam.follow(Vec2::new(0.0, 0.0), 800.0, 600.0);
        cam.follow(Vec2::new(20.0, 0.0), 800.0, 600.0);
        let before = (cam.target - cam.offset).length();
        for _ in 0..60 {
            cam.tick(1.0 / 60.0);
        }
        let after = (cam.target - cam.offset).length();
        assert!(after < before * 0.05, "camera failed to converge: {after} vs {before}");
    }

    #[test]
    fn tick_is_stable_at_large_dt() {
        let mut cam = Camera::new();
        cam.follow(Vec2::new(3.0, 9.0), 640.0, 480.0);
        cam.follow(Vec2::new(30.0, 9.0), 640.0, 480.0);
        cam.tick(1.0); // k clamps to 1: lands exactly on target, no overshoot
        assert!((cam.offset - cam.target).length() < 1e-3);
    }
}
