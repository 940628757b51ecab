// Batched 2D draw accumulation.
//
// All scene drawing goes through two `Batch` instances — one for flat shapes,
// one for textured sprites — that append vertices CPU-side and cut a
// `DrawCall` into the frame's `DrawStream` whenever GPU state would have to
// change (blend mode, bound texture, capacity). The GPU submit replays the
// stream with exactly one buffer upload and one draw per recorded call, so
// the number of recorded calls *is* the number of GPU draws.
//
// Drawing on an inactive batch is a programmer error and panics; see the
// error taxonomy in DESIGN.md.

pub mod mode;

use glam::Vec2;

use crate::color::Color;
use crate::state::{AtlasRegion, TextureId};

pub use mode::{ActiveMode, BatchSet};

/// One GPU vertex. Shape draws carry a zero UV; the shape pipeline ignores it.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawMode {
    Shape,
    Sprite,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Alpha,
    Additive,
}

/// A contiguous vertex range sharing one set of GPU state.
#[derive(Copy, Clone, Debug)]
pub struct DrawCall {
    pub mode: DrawMode,
    pub blend: BlendMode,
    /// Bound atlas page; always `Some` for sprite calls, `None` for shapes.
    pub texture: Option<TextureId>,
    pub first: u32,
    pub count: u32,
}

/// Frame-long recording of every vertex and draw call, in submission order.
#[derive(Default)]
pub struct DrawStream {
    pub vertices: Vec<Vertex>,
    pub calls: Vec<DrawCall>,
}

impl DrawStream {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.calls.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Raw vertex bytes, for upload or bit-exact comparison in tests.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Default vertex capacity before an overflow cut. Large enough that a
/// typical frame cuts on state changes only.
const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Segment count for an ellipse of the given max radius.
fn ellipse_segments(radius: f32) -> usize {
    ((radius * 0.8) as usize).clamp(10, 48)
}

/// Vertex accumulator for one draw mode.
///
/// `begin`/`end` bracket a recording; between them every drawing operation
/// appends triangles. Pending vertices move into the `DrawStream` whenever a
/// call is cut (blend change, texture change, capacity overflow, `end`).
pub struct Batch {
    mode: DrawMode,
    blend: BlendMode,
    texture: Option<TextureId>,
    pending: Vec<Vertex>,
    capacity: usize,
    active: bool,
}

impl Batch {
    pub fn new(mode: DrawMode) -> Self {
        Self::with_capacity(mode, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(mode: DrawMode, capacity: usize) -> Self {
        Self {
            mode,
            blend: BlendMode::Alpha,
            texture: None,
            pending: Vec::with_capacity(capacity),
            capacity,
            active: false,
        }
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start a recording. Blend state resets to normal alpha.
    pub fn begin(&mut self) {
        assert!(!self.active, "Batch::begin called while already active");
        self.active = true;
        self.blend = BlendMode::Alpha;
        self.texture = None;
        self.pending.clear();
    }

    /// Cut the final call and deactivate.
    pub fn end(&mut self, out: &mut DrawStream) {
        assert!(self.active, "Batch::end called while inactive");
        self.cut(out);
        self.active = false;
    }

    /// Switch blend mode. No-op when already in `blend`; otherwise the queued
    /// vertices are cut first so the change cannot corrupt them.
    pub fn set_blend(&mut self, blend: BlendMode, out: &mut DrawStream) {
        self.check_active();
        if self.blend == blend {
            return;
        }
        self.cut(out);
        self.blend = blend;
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    #[inline]
    fn check_active(&self) {
        assert!(
            self.active,
            "batch drawing operation outside begin/end (invalid batch state)"
        );
    }

    /// Move pending vertices into the stream as one recorded draw call.
    /// A cut with nothing pending records nothing.
    fn cut(&mut self, out: &mut DrawStream) {
        if self.pending.is_empty() {
            return;
        }
        let first = out.vertices.len() as u32;
        let count = self.pending.len() as u32;
        out.vertices.append(&mut self.pending);
        out.calls.push(DrawCall {
            mode: self.mode,
            blend: self.blend,
            texture: self.texture,
            first,
            count,
        });
    }

    /// Make room for `n` more vertices: cut first if they would not fit, and
    /// grow the backing storage when a single operation exceeds the whole
    /// capacity.
    fn reserve(&mut self, n: usize, out: &mut DrawStream) {
        if self.pending.len() + n > self.capacity {
            self.cut(out);
            if n > self.capacity {
                let grown = n.next_power_of_two();
                log::debug!(
                    "batch {:?}: growing vertex capacity {} -> {}",
                    self.mode,
                    self.capacity,
                    grown
                );
                self.capacity = grown;
                self.pending.reserve(grown);
            }
        }
    }

    #[inline]
    fn push(&mut self, position: Vec2, uv: [f32; 2], color: Color) {
        self.pending.push(Vertex { position: [position.x, position.y], uv, color: color.0 });
    }

    // ── Shape primitives ───────────────────────────────────────────────────

    /// Axis-aligned filled rectangle.
    pub fn rect(&mut self, out: &mut DrawStream, pos: Vec2, size: Vec2, color: Color) {
        self.check_active();
        assert_eq!(self.mode, DrawMode::Shape, "rect is a shape-mode operation");
        self.reserve(6, out);
        let (x, y) = (pos.x, pos.y);
        let (w, h) = (size.x, size.y);
        let uv = [0.0, 0.0];
        let tl = Vec2::new(x, y);
        let tr = Vec2::new(x + w, y);
        let bl = Vec2::new(x, y + h);
        let br = Vec2::new(x + w, y + h);
        self.push(tl, uv, color);
        self.push(bl, uv, color);
        self.push(tr, uv, color);
        self.push(tr, uv, color);
        self.push(bl, uv, color);
        self.push(br, uv, color);
    }

    /// Filled ellipse tessellated as a triangle fan around the center.
    pub fn fill_ellipse(&mut self, out: &mut DrawStream, center: Vec2, rx: f32, ry: f32, color: Color) {
        self.ellipse_fan(out, center, rx, ry, color, color);
    }

    /// Ellipse whose rim alpha is zero: a cheap anti-aliased falloff used for
    /// halos and soft particles.
    pub fn soft_ellipse(&mut self, out: &mut DrawStream, center: Vec2, rx: f32, ry: f32, color: Color) {
        self.ellipse_fan(out, center, rx, ry, color, color.with_alpha(0.0));
    }

    fn ellipse_fan(
        &mut self,
        out: &mut DrawStream,
        center: Vec2,
        rx: f32,
        ry: f32,
        center_color: Color,
        rim_color: Color,
    ) {
        self.check_active();
        assert_eq!(self.mode, DrawMode::Shape, "ellipse is a shape-mode operation");
        let segments = ellipse_segments(rx.max(ry));
        self.reserve(segments * 3, out);
        let uv = [0.0, 0.0];
        let step = std::f32::consts::TAU / segments as f32;
        for i in 0..segments {
            let a0 = i as f32 * step;
            let a1 = a0 + step;
            let p0 = center + Vec2::new(a0.cos() * rx, a0.sin() * ry);
            let p1 = center + Vec2::new(a1.cos() * rx, a1.sin() * ry);
            self.push(center, uv, center_color);
            self.push(p0, uv, rim_color);
            self.push(p1, uv, rim_color);
        }
    }

    /// Filled convex polygon, fan-triangulated from the first point.
    /// Fewer than three points draws nothing; concave input self-overlaps.
    pub fn fill_polygon(&mut self, out: &mut DrawStream, points: &[Vec2], color: Color) {
        self.check_active();
        assert_eq!(self.mode, DrawMode::Shape, "polygon is a shape-mode operation");
        if points.len() < 3 {
            return;
        }
        self.reserve((points.len() - 2) * 3, out);
        let uv = [0.0, 0.0];
        for i in 1..points.len() - 1 {
            self.push(points[0], uv, color);
            self.push(points[i], uv, color);
            self.push(points[i + 1], uv, color);
        }
    }

    /// Solid line drawn as an oriented quad of the given width.
    pub fn line(&mut self, out: &mut DrawStream, a: Vec2, b: Vec2, width: f32, color: Color) {
        self.check_active();
        assert_eq!(self.mode, DrawMode::Shape, "line is a shape-mode operation");
        let Some(n) = line_normal(a, b, width * 0.5) else { return };
        self.reserve(6, out);
        let uv = [0.0, 0.0];
        self.push(a - n, uv, color);
        self.push(a + n, uv, color);
        self.push(b - n, uv, color);
        self.push(b - n, uv, color);
        self.push(a + n, uv, color);
        self.push(b + n, uv, color);
    }

    /// Anti-aliased line: three parallel strips whose alpha runs
    /// transparent → opaque → transparent across the width.
    pub fn soft_line(&mut self, out: &mut DrawStream, a: Vec2, b: Vec2, width: f32, color: Color) {
        self.check_active();
        assert_eq!(self.mode, DrawMode::Shape, "soft_line is a shape-mode operation");
        let Some(outer) = line_normal(a, b, width * 0.5) else { return };
        self.reserve(18, out);
        let core = outer * 0.5;
        let uv = [0.0, 0.0];
        let clear = color.with_alpha(0.0);

        // Strip 1: outer edge fading in.
        self.push(a - outer, uv, clear);
        self.push(a - core, uv, color);
        self.push(b - outer, uv, clear);
        self.push(b - outer, uv, clear);
        self.push(a - core, uv, color);
        self.push(b - core, uv, color);
        // Strip 2: opaque core.
        self.push(a - core, uv, color);
        self.push(a + core, uv, color);
        self.push(b - core, uv, color);
        self.push(b - core, uv, color);
        self.push(a + core, uv, color);
        self.push(b + core, uv, color);
        // Strip 3: outer edge fading out.
        self.push(a + core, uv, color);
        self.push(a + outer, uv, clear);
        self.push(b + core, uv, color);
        self.push(b + core, uv, color);
        self.push(a + outer, uv, clear);
        self.push(b + outer, uv, clear);
    }

    // ── Sprite primitive ───────────────────────────────────────────────────

    /// Textured quad from an atlas region. Binding a different texture than
    /// the previous sprite cuts the queued vertices first.
    pub fn sprite(&mut self, out: &mut DrawStream, pos: Vec2, size: Vec2, region: &AtlasRegion, tint: Color) {
        self.check_active();
        assert_eq!(self.mode, DrawMode::Sprite, "sprite is a sprite-mode operation");
        if self.texture != Some(region.texture) {
            self.cut(out);
            self.texture = Some(region.texture);
        }
        self.reserve(6, out);
        let tl = pos;
        let tr = pos + Vec2::new(size.x, 0.0);
        let bl = pos + Vec2::new(0.0, size.y);
        let br = pos + size;
        let (u0, v0) = (region.uv_min[0], region.uv_min[1]);
        let (u1, v1) = (region.uv_max[0], region.uv_max[1]);
        self.push(tl, [u0, v0], tint);
        self.push(bl, [u0, v1], tint);
        self.push(tr, [u1, v0], tint);
        self.push(tr, [u1, v0], tint);
        self.push(bl, [u0, v1], tint);
        self.push(br, [u1, v1], tint);
    }
}

/// Half-width offset normal for a line segment, `None` for a degenerate one.
fn line_normal(a: Vec2, b: Vec2, half_width: f32) -> Option<Vec2> {
    let d = b - a;
    let len = d.length();
    if len < 1e-6 {
        return None;
    }
    Some(Vec2::new(-d.y, d.x) / len * half_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> (Batch, DrawStream) {
        (Batch::new(DrawMode::Shape), DrawStream::default())
    }

    fn region(tex: u32) -> AtlasRegion {
        AtlasRegion {
            texture: TextureId(tex),
            uv_min: [0.0, 0.0],
            uv_max: [1.0, 1.0],
            px_w: 16.0,
            px_h: 16.0,
        }
    }

    #[test]
    fn end_cuts_exactly_one_call_for_plain_draws() {
        let (mut b, mut out) = shape();
        b.begin();
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        b.rect(&mut out, Vec2::splat(8.0), Vec2::splat(4.0), Color::RED);
        b.line(&mut out, Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0, Color::BLUE);
        b.end(&mut out);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].count, 18);
    }

    #[test]
    fn blend_change_cuts_before_switching() {
        let (mut b, mut out) = shape();
        b.begin();
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        b.set_blend(BlendMode::Additive, &mut out);
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        b.end(&mut out);
        assert_eq!(out.calls.len(), 2);
        assert_eq!(out.calls[0].blend, BlendMode::Alpha);
        assert_eq!(out.calls[1].blend, BlendMode::Additive);
    }

    #[test]
    fn redundant_blend_change_is_a_noop() {
        let (mut b, mut out) = shape();
        b.begin();
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        b.set_blend(BlendMode::Alpha, &mut out);
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        b.end(&mut out);
        assert_eq!(out.calls.len(), 1, "same-blend set_blend must not flush");
    }

    #[test]
    fn blend_change_with_empty_queue_records_nothing() {
        let (mut b, mut out) = shape();
        b.begin();
        b.set_blend(BlendMode::Additive, &mut out);
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        b.end(&mut out);
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].blend, BlendMode::Additive);
    }

    #[test]
    fn flush_count_matches_triggers() {
        // Property: calls = blend changes (with queued verts) + overflows + 1.
        let mut b = Batch::with_capacity(DrawMode::Shape, 12);
        let mut out = DrawStream::default();
        b.begin();
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(1.0), Color::WHITE); // 6 pending
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(1.0), Color::WHITE); // 12 pending
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(1.0), Color::WHITE); // overflow cut -> 6 pending
        b.set_blend(BlendMode::Additive, &mut out); // blend cut
        b.rect(&mut out, Vec2::ZERO, Vec2::splat(1.0), Color::WHITE);
        b.end(&mut out); // final cut
        assert_eq!(out.calls.len(), 3);
    }

    #[test]
    fn oversized_operation_grows_capacity() {
        let mut b = Batch::with_capacity(DrawMode::Shape, 16);
        let mut out = DrawStream::default();
        b.begin();
        // 48-segment ellipse = 144 vertices, far beyond the 16 capacity.
        b.fill_ellipse(&mut out, Vec2::ZERO, 100.0, 100.0, Color::WHITE);
        b.end(&mut out);
        assert_eq!(out.calls.len(), 1);
        assert!(out.calls[0].count >= 30);
    }

    #[test]
    fn sprite_texture_change_cuts() {
        let mut b = Batch::new(DrawMode::Sprite);
        let mut out = DrawStream::default();
        b.begin();
        b.sprite(&mut out, Vec2::ZERO, Vec2::splat(16.0), &region(1), Color::WHITE);
        b.sprite(&mut out, Vec2::ZERO, Vec2::splat(16.0), &region(1), Color::WHITE);
        b.sprite(&mut out, Vec2::ZERO, Vec2::splat(16.0), &region(2), Color::WHITE);
        b.end(&mut out);
        assert_eq!(out.calls.len(), 2);
        assert_eq!(out.calls[0].texture, Some(TextureId(1)));
        assert_eq!(out.calls[1].texture, Some(TextureId(2)));
    }

    #[test]
    fn soft_ellipse_rim_is_transparent() {
        let (mut b, mut out) = shape();
        b.begin();
        b.soft_ellipse(&mut out, Vec2::ZERO, 8.0, 8.0, Color::WHITE);
        b.end(&mut out);
        // Fan layout: every triangle is (center, rim, rim).
        assert_eq!(out.vertices[0].color[3], 1.0);
        assert_eq!(out.vertices[1].color[3], 0.0);
        assert_eq!(out.vertices[2].color[3], 0.0);
    }

    #[test]
    fn degenerate_line_draws_nothing() {
        let (mut b, mut out) = shape();
        b.begin();
        b.line(&mut out, Vec2::splat(5.0), Vec2::splat(5.0), 3.0, Color::WHITE);
        b.end(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn polygon_needs_three_points() {
        let (mut b, mut out) = shape();
        b.begin();
        b.fill_polygon(&mut out, &[Vec2::ZERO, Vec2::ONE], Color::WHITE);
        b.end(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid batch state")]
    fn drawing_outside_begin_end_panics() {
        let (mut b, mut out) = shape();
        b.rect(&mut out, Vec2::ZERO, Vec2::ONE, Color::WHITE);
    }

    #[test]
    #[should_panic(expected = "already active")]
    fn double_begin_panics() {
        let (mut b, _) = shape();
        b.begin();
        b.begin();
    }
}
