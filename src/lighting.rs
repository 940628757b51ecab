// Per-frame dynamic lighting.
//
// Any component may contribute point lights while the frame is composed; the
// set is cleared and fully rebuilt every frame, so lights never persist or
// leak across frames. The GPU side folds the list into the off-screen light
// map consumed by the composite pass.

use glam::Vec2;

/// Upper bound on lights folded into the light map per frame. Contributions
/// beyond it are dropped newest-first.
pub const MAX_LIGHTS: usize = 64;

/// One screen-space point light, valid for the current frame only.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    pub pos: Vec2,
    pub radius: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}

pub struct LightAccumulator {
    lights: Vec<Light>,
    dropped: u32,
}

impl LightAccumulator {
    pub fn new() -> Self {
        Self { lights: Vec::with_capacity(MAX_LIGHTS), dropped: 0 }
    }

    /// Forget the previous frame's lights. Called once at frame start.
    pub fn clear(&mut self) {
        if self.dropped > 0 {
            log::warn!("light budget exceeded last frame, {} dropped", self.dropped);
        }
        self.lights.clear();
        self.dropped = 0;
    }

    /// Add a light contribution. Returns `false` when the budget is spent;
    /// the frame continues without it.
    pub fn add(&mut self, pos: Vec2, radius: f32, color: [f32; 3], intensity: f32) -> bool {
        if self.lights.len() >= MAX_LIGHTS {
            self.dropped += 1;
            return false;
        }
        self.lights.push(Light { pos, radius, color, intensity });
        true
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

impl Default for LightAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_rebuilds_from_empty() {
        let mut acc = LightAccumulator::new();
        acc.add(Vec2::ZERO, 50.0, [1.0, 1.0, 1.0], 1.0);
        acc.clear();
        assert!(acc.is_empty());
    }

    #[test]
    fn overflow_drops_newest() {
        let mut acc = LightAccumulator::new();
        for i in 0..MAX_LIGHTS {
            assert!(acc.add(Vec2::splat(i as f32), 10.0, [1.0, 0.0, 0.0], 1.0));
        }
        assert!(!acc.add(Vec2::ZERO, 10.0, [0.0, 1.0, 0.0], 1.0));
        assert_eq!(acc.len(), MAX_LIGHTS);
        // The surviving set is the first MAX_LIGHTS, untouched.
        assert_eq!(acc.lights()[0].pos, Vec2::ZERO);
        assert_eq!(acc.lights()[MAX_LIGHTS - 1].pos, Vec2::splat((MAX_LIGHTS - 1) as f32));
    }
}
