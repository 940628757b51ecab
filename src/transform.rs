use glam::Vec2;

use crate::{TILE_H, TILE_W};

// ── Isometric projection ──────────────────────────────────────────────────────
//
// Diamond ("2:1") isometric mapping between world grid coordinates and screen
// pixels. The camera is a plain screen-space offset, subtracted after
// projection, so both directions stay exact inverses of each other.
//
// Forward (world → screen):
// ```text
// sx = (wx - wy) * TILE_W/2 - cam.x
// sy = (wx + wy) * TILE_H/2 - cam.y
// ```
// Inverse (screen → world):
// ```text
// a = (sx + cam.x) / (TILE_W/2)
// b = (sy + cam.y) / (TILE_H/2)
// wx = (a + b) / 2
// wy = (b - a) / 2
// ```

/// Project a world grid coordinate (fractional cells allowed) to screen pixels.
#[inline]
pub fn world_to_screen(world: Vec2, cam: Vec2) -> Vec2 {
    Vec2::new(
        (world.x - world.y) * (TILE_W * 0.5) - cam.x,
        (world.x + world.y) * (TILE_H * 0.5) - cam.y,
    )
}

/// Unproject a screen pixel back to world grid coordinates.
#[inline]
pub fn screen_to_world(screen: Vec2, cam: Vec2) -> Vec2 {
    let a = (screen.x + cam.x) / (TILE_W * 0.5);
    let b = (screen.y + cam.y) / (TILE_H * 0.5);
    Vec2::new((a + b) * 0.5, (b - a) * 0.5)
}

// ── Visible tile window ───────────────────────────────────────────────────────

/// Inclusive rectangle of world cells, row-major iteration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl TileRect {
    /// An empty rectangle that contains no cell.
    pub const EMPTY: Self = Self { x0: 0, y0: 0, x1: -1, y1: -1 };

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.x1 < self.x0 || self.y1 < self.y0
    }
}

/// Compute the world-cell rectangle visible in a `frame_w` × `frame_h` canvas.
///
/// The four canvas corners are unprojected, the min/max cell indices taken,
/// padded by `pad` cells (hides pop-in at the screen edges), and clamped to
/// the world bounds `[0, world_w) × [0, world_h)`.
pub fn visible_tile_rect(
    cam: Vec2,
    frame_w: f32,
    frame_h: f32,
    pad: i32,
    world_w: i32,
    world_h: i32,
) -> TileRect {
    let corners = [
        screen_to_world(Vec2::new(0.0, 0.0), cam),
        screen_to_world(Vec2::new(frame_w, 0.0), cam),
        screen_to_world(Vec2::new(0.0, frame_h), cam),
        screen_to_world(Vec2::new(frame_w, frame_h), cam),
    ];

    let mut min = corners[0];
    let mut max = corners[0];
    for c in &corners[1..] {
        min = min.min(*c);
        max = max.max(*c);
    }

    let x0 = (min.x.floor() as i32 - pad).max(0);
    let y0 = (min.y.floor() as i32 - pad).max(0);
    let x1 = (max.x.ceil() as i32 + pad).min(world_w - 1);
    let y1 = (max.y.ceil() as i32 + pad).min(world_h - 1);

    if x1 < x0 || y1 < y0 {
        return TileRect::EMPTY;
    }
    TileRect { x0, y0, x1, y1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_tolerance() {
        let cam = Vec2::new(123.5, -77.25);
        for (x, y) in [(0.0, 0.0), (5.0, 5.0), (12.25, 3.75), (99.0, 1.0)] {
            let w = Vec2::new(x, y);
            let back = screen_to_world(world_to_screen(w, cam), cam);
            assert!((back - w).length() < 1e-4, "round trip {w:?} -> {back:?}");
        }
    }

    #[test]
    fn inverse_round_trip_from_screen() {
        let cam = Vec2::new(-40.0, 16.0);
        for (sx, sy) in [(0.0, 0.0), (640.0, 360.0), (13.0, 900.0)] {
            let s = Vec2::new(sx, sy);
            let back = world_to_screen(screen_to_world(s, cam), cam);
            assert!((back - s).length() < 1e-3, "round trip {s:?} -> {back:?}");
        }
    }

    #[test]
    fn x_axis_moves_right_and_down() {
        let a = world_to_screen(Vec2::new(0.0, 0.0), Vec2::ZERO);
        let b = world_to_screen(Vec2::new(1.0, 0.0), Vec2::ZERO);
        assert!(b.x > a.x && b.y > a.y);
    }

    #[test]
    fn y_axis_moves_left_and_down() {
        let a = world_to_screen(Vec2::new(0.0, 0.0), Vec2::ZERO);
        let b = world_to_screen(Vec2::new(0.0, 1.0), Vec2::ZERO);
        assert!(b.x < a.x && b.y > a.y);
    }

    #[test]
    fn visible_rect_contains_camera_center() {
        // Center the camera on cell (5, 5) of a 10x10 world.
        let center = world_to_screen(Vec2::new(5.0, 5.0), Vec2::ZERO);
        let cam = center - Vec2::new(400.0, 300.0);
        let rect = visible_tile_rect(cam, 800.0, 600.0, 2, 10, 10);
        assert!(rect.contains(5, 5), "rect {rect:?} misses the center cell");
    }

    #[test]
    fn visible_rect_clamps_to_world_bounds() {
        let rect = visible_tile_rect(Vec2::new(-5000.0, -5000.0), 800.0, 600.0, 2, 10, 10);
        assert!(rect.x0 >= 0 && rect.y0 >= 0);
        assert!(rect.x1 <= 9 && rect.y1 <= 9);
    }

    #[test]
    fn far_off_camera_yields_empty_rect() {
        let rect = visible_tile_rect(Vec2::new(1e7, 1e7), 800.0, 600.0, 2, 10, 10);
        assert!(rect.is_empty());
    }

    #[test]
    fn empty_rect_contains_nothing() {
        assert!(!TileRect::EMPTY.contains(0, 0));
    }
}
