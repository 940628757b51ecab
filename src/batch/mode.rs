// Batch-mode switching.
//
// The orchestrator never calls `begin`/`end` directly while composing the
// scene: every draw site asks for "shape mode" or "sprite mode" and the
// `BatchSet` ends/begins the underlying batches only when the mode actually
// changes. Consecutive draws sharing a mode therefore never pay a redundant
// end/begin pair, regardless of call order.

use super::{Batch, DrawMode, DrawStream};

/// Which accumulator currently owns the stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActiveMode {
    Idle,
    Shape,
    Sprite,
}

/// The two batch accumulators plus the state machine that guarantees at most
/// one is active at a time.
pub struct BatchSet {
    shape: Batch,
    sprite: Batch,
    active: ActiveMode,
}

impl BatchSet {
    pub fn new() -> Self {
        Self {
            shape: Batch::new(DrawMode::Shape),
            sprite: Batch::new(DrawMode::Sprite),
            active: ActiveMode::Idle,
        }
    }

    pub fn active(&self) -> ActiveMode {
        self.active
    }

    /// Make the shape batch active, ending the sprite batch first if needed,
    /// and return it. Requesting the already-active mode is a no-op.
    pub fn ensure_shape(&mut self, out: &mut DrawStream) -> &mut Batch {
        match self.active {
            ActiveMode::Shape => {}
            ActiveMode::Sprite => {
                self.sprite.end(out);
                self.shape.begin();
                self.active = ActiveMode::Shape;
            }
            ActiveMode::Idle => {
                self.shape.begin();
                self.active = ActiveMode::Shape;
            }
        }
        &mut self.shape
    }

    /// Make the sprite batch active, ending the shape batch first if needed.
    pub fn ensure_sprite(&mut self, out: &mut DrawStream) -> &mut Batch {
        match self.active {
            ActiveMode::Sprite => {}
            ActiveMode::Shape => {
                self.shape.end(out);
                self.sprite.begin();
                self.active = ActiveMode::Sprite;
            }
            ActiveMode::Idle => {
                self.sprite.begin();
                self.active = ActiveMode::Sprite;
            }
        }
        &mut self.sprite
    }

    /// End whichever batch is active and return to idle.
    pub fn end_all(&mut self, out: &mut DrawStream) {
        match self.active {
            ActiveMode::Shape => self.shape.end(out),
            ActiveMode::Sprite => self.sprite.end(out),
            ActiveMode::Idle => {}
        }
        self.active = ActiveMode::Idle;
    }
}

impl Default for BatchSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DrawMode;
    use crate::color::Color;
    use glam::Vec2;

    /// Count mode transitions in the recorded stream (adjacent calls whose
    /// draw mode differs, plus the first call).
    fn mode_transitions(out: &DrawStream) -> usize {
        let mut n = 0;
        let mut last = None;
        for call in &out.calls {
            if last != Some(call.mode) {
                n += 1;
                last = Some(call.mode);
            }
        }
        n
    }

    fn draw_shape(set: &mut BatchSet, out: &mut DrawStream) {
        let b = set.ensure_shape(out);
        b.rect(out, Vec2::ZERO, Vec2::splat(2.0), Color::WHITE);
    }

    fn draw_sprite(set: &mut BatchSet, out: &mut DrawStream) {
        use crate::state::{AtlasRegion, TextureId};
        let region = AtlasRegion {
            texture: TextureId(1),
            uv_min: [0.0, 0.0],
            uv_max: [1.0, 1.0],
            px_w: 8.0,
            px_h: 8.0,
        };
        let b = set.ensure_sprite(out);
        b.sprite(out, Vec2::ZERO, Vec2::splat(8.0), &region, Color::WHITE);
    }

    #[test]
    fn alternating_modes_switch_once_per_run() {
        // 3 shape, 2 sprite, 3 shape = 3 transitions, never 6.
        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        for _ in 0..3 {
            draw_shape(&mut set, &mut out);
        }
        for _ in 0..2 {
            draw_sprite(&mut set, &mut out);
        }
        for _ in 0..3 {
            draw_shape(&mut set, &mut out);
        }
        set.end_all(&mut out);
        assert_eq!(out.calls.len(), 3);
        assert_eq!(mode_transitions(&out), 3);
    }

    #[test]
    fn requesting_active_mode_is_noop() {
        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        draw_shape(&mut set, &mut out);
        assert_eq!(set.active(), ActiveMode::Shape);
        draw_shape(&mut set, &mut out);
        set.end_all(&mut out);
        assert_eq!(out.calls.len(), 1);
    }

    #[test]
    fn end_all_returns_to_idle() {
        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        draw_sprite(&mut set, &mut out);
        set.end_all(&mut out);
        assert_eq!(set.active(), ActiveMode::Idle);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].mode, DrawMode::Sprite);
    }

    #[test]
    fn end_all_when_idle_is_harmless() {
        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        set.end_all(&mut out);
        assert!(out.is_empty());
    }
}
