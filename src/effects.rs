// Visual-effect dispatch.
//
// Projectiles and area effects are drawn by small procedural routines looked
// up by archetype code in a dense function-pointer table. Unregistered codes
// fall back to a generic renderer, so every archetype on the wire is
// representable even before its bespoke recipe ships. Routines are pure in
// (position, direction, tick, identity): all jitter comes from the
// deterministic hash, never a stateful RNG.

use glam::Vec2;

use crate::batch::{BatchSet, BlendMode, DrawStream};
use crate::color::Color;
use crate::hash::{hash01, hash_range, seed};

/// Size of the dispatch table; archetype codes are dense small integers.
pub const MAX_ARCHETYPES: usize = 128;

/// Everything a draw routine may depend on.
#[derive(Copy, Clone, Debug)]
pub struct EffectInstance {
    /// Screen-space position of the effect center.
    pub pos: Vec2,
    /// Normalized travel direction (zero for stationary effects).
    pub dir: Vec2,
    /// Current animation tick.
    pub tick: u64,
    /// Stable identity (projectile id) separating concurrent instances.
    pub id: u64,
    pub archetype: u16,
}

pub type EffectFn = fn(&mut BatchSet, &mut DrawStream, &EffectInstance);

/// Archetype → draw-routine table, populated once at startup.
pub struct EffectRegistry {
    table: [Option<EffectFn>; MAX_ARCHETYPES],
}

impl EffectRegistry {
    /// An empty table: every archetype uses the generic fallback.
    pub fn new() -> Self {
        Self { table: [None; MAX_ARCHETYPES] }
    }

    /// The standard table with the built-in recipes installed.
    pub fn with_builtin() -> Self {
        let mut r = Self::new();
        r.register(archetype::BOLT, draw_bolt);
        r.register(archetype::ORB, draw_orb);
        r.register(archetype::SHARD, draw_shard);
        r.register(archetype::WISP, draw_wisp);
        r.register(archetype::ARC, draw_arc);
        r
    }

    /// Install a routine for `code`. Codes beyond the table are a startup
    /// configuration bug and panic.
    pub fn register(&mut self, code: u16, f: EffectFn) {
        assert!(
            (code as usize) < MAX_ARCHETYPES,
            "effect archetype {code} out of range (max {MAX_ARCHETYPES})"
        );
        self.table[code as usize] = Some(f);
    }

    /// O(1) lookup; `None` means "no bespoke recipe".
    pub fn get(&self, code: u16) -> Option<EffectFn> {
        self.table.get(code as usize).copied().flatten()
    }

    /// Draw `inst` with its bespoke recipe, or the generic fallback.
    pub fn draw(&self, set: &mut BatchSet, out: &mut DrawStream, inst: &EffectInstance) {
        match self.get(inst.archetype) {
            Some(f) => f(set, out, inst),
            None => draw_generic(set, out, inst),
        }
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Built-in archetype codes.
pub mod archetype {
    pub const BOLT: u16 = 1;
    pub const ORB: u16 = 2;
    pub const SHARD: u16 = 3;
    pub const WISP: u16 = 4;
    pub const ARC: u16 = 5;
}

/// Hue picked from the archetype code so even unknown effects are visually
/// distinct from each other.
fn archetype_color(code: u16) -> Color {
    let h = hash01(code as u64 * 97);
    // Cheap hue wheel: three phase-shifted ramps.
    let r = (h * std::f32::consts::TAU).sin() * 0.5 + 0.5;
    let g = ((h + 0.33) * std::f32::consts::TAU).sin() * 0.5 + 0.5;
    let b = ((h + 0.66) * std::f32::consts::TAU).sin() * 0.5 + 0.5;
    Color::rgb(0.3 + r * 0.7, 0.3 + g * 0.7, 0.3 + b * 0.7)
}

// ── Generic fallback ──────────────────────────────────────────────────────────

/// Soft halo + solid core + bright center + a tapering directional trail.
/// Used for any archetype without a bespoke recipe.
pub fn draw_generic(set: &mut BatchSet, out: &mut DrawStream, inst: &EffectInstance) {
    let color = archetype_color(inst.archetype);
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);

    batch.soft_ellipse(out, inst.pos, 14.0, 14.0, color.with_alpha(0.5));
    batch.fill_ellipse(out, inst.pos, 5.0, 5.0, color);
    batch.fill_ellipse(out, inst.pos, 2.0, 2.0, Color::WHITE);

    // Trail: three shrinking blobs trailing against the travel direction.
    if inst.dir.length_squared() > 1e-6 {
        for i in 1..=3 {
            let k = i as f32;
            let back = inst.pos - inst.dir * (k * 7.0);
            let wobble = hash_range(seed(inst.tick, inst.id.wrapping_add(i as u64)), -1.5, 1.5);
            let p = back + Vec2::new(-inst.dir.y, inst.dir.x) * wobble;
            batch.soft_ellipse(out, p, 5.0 - k, 5.0 - k, color.with_alpha(0.4 - k * 0.1));
        }
    }
    batch.set_blend(BlendMode::Alpha, out);
}

// ── Built-in recipes ──────────────────────────────────────────────────────────

/// Thin elongated bolt with a hot core, stretched along the direction.
fn draw_bolt(set: &mut BatchSet, out: &mut DrawStream, inst: &EffectInstance) {
    let dir = if inst.dir.length_squared() > 1e-6 { inst.dir } else { Vec2::X };
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);
    let tail = inst.pos - dir * 18.0;
    batch.soft_line(out, tail, inst.pos, 7.0, Color::rgba(1.0, 0.85, 0.3, 0.8));
    batch.line(out, tail, inst.pos, 2.5, Color::WHITE);
    batch.soft_ellipse(out, inst.pos, 6.0, 6.0, Color::rgba(1.0, 0.9, 0.5, 0.9));
    batch.set_blend(BlendMode::Alpha, out);
}

/// Pulsing sphere with an orbiting satellite mote.
fn draw_orb(set: &mut BatchSet, out: &mut DrawStream, inst: &EffectInstance) {
    let t = inst.tick as f32 * 0.15 + hash01(inst.id) * std::f32::consts::TAU;
    let pulse = 1.0 + (t * 1.7).sin() * 0.15;
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);
    batch.soft_ellipse(out, inst.pos, 13.0 * pulse, 13.0 * pulse, Color::rgba(0.4, 0.5, 1.0, 0.55));
    batch.fill_ellipse(out, inst.pos, 6.0 * pulse, 6.0 * pulse, Color::rgb(0.55, 0.65, 1.0));
    batch.fill_ellipse(out, inst.pos, 2.5, 2.5, Color::WHITE);
    let mote = inst.pos + Vec2::new(t.cos(), t.sin() * 0.5) * 11.0;
    batch.fill_ellipse(out, mote, 2.0, 2.0, Color::rgb(0.8, 0.85, 1.0));
    batch.set_blend(BlendMode::Alpha, out);
}

/// Spinning crystalline triangle.
fn draw_shard(set: &mut BatchSet, out: &mut DrawStream, inst: &EffectInstance) {
    let spin = inst.tick as f32 * 0.25 + hash01(inst.id) * std::f32::consts::TAU;
    let batch = set.ensure_shape(out);
    let mut points = [Vec2::ZERO; 3];
    for (i, p) in points.iter_mut().enumerate() {
        let a = spin + i as f32 * (std::f32::consts::TAU / 3.0);
        *p = inst.pos + Vec2::new(a.cos() * 8.0, a.sin() * 5.0);
    }
    batch.fill_polygon(out, &points, Color::rgba(0.65, 0.9, 1.0, 0.9));
    batch.set_blend(BlendMode::Additive, out);
    batch.soft_ellipse(out, inst.pos, 9.0, 9.0, Color::rgba(0.6, 0.9, 1.0, 0.35));
    batch.set_blend(BlendMode::Alpha, out);
}

/// Drifting flame wisp: stacked soft blobs cooling toward the tail.
fn draw_wisp(set: &mut BatchSet, out: &mut DrawStream, inst: &EffectInstance) {
    let dir = if inst.dir.length_squared() > 1e-6 { inst.dir } else { Vec2::NEG_Y };
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);
    let hot = Color::rgba(1.0, 0.75, 0.25, 0.85);
    let cool = Color::rgba(0.85, 0.25, 0.1, 0.4);
    for i in 0..4 {
        let k = i as f32 / 3.0;
        let flicker = hash_range(seed(inst.tick, inst.id.wrapping_add(i)), -2.0, 2.0);
        let p = inst.pos - dir * (k * 12.0) + Vec2::new(flicker, 0.0);
        batch.soft_ellipse(out, p, 8.0 - k * 4.0, 8.0 - k * 4.0, hot.lerp(cool, k));
    }
    batch.set_blend(BlendMode::Alpha, out);
}

/// Jagged energy arc between the tail and head of the travel segment.
fn draw_arc(set: &mut BatchSet, out: &mut DrawStream, inst: &EffectInstance) {
    let dir = if inst.dir.length_squared() > 1e-6 { inst.dir } else { Vec2::X };
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);
    let tail = inst.pos - dir * 22.0;
    let normal = Vec2::new(-dir.y, dir.x);
    let mut prev = tail;
    for i in 1..=4 {
        let k = i as f32 / 4.0;
        let along = tail.lerp(inst.pos, k);
        let off = if i == 4 { 0.0 } else { hash_range(seed(inst.tick, inst.id.wrapping_add(i)), -5.0, 5.0) };
        let p = along + normal * off;
        batch.line(out, prev, p, 2.0, Color::rgb(0.7, 0.9, 1.0));
        prev = p;
    }
    batch.soft_ellipse(out, inst.pos, 5.0, 5.0, Color::rgba(0.7, 0.9, 1.0, 0.8));
    batch.set_blend(BlendMode::Alpha, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(archetype: u16) -> EffectInstance {
        EffectInstance {
            pos: Vec2::new(100.0, 100.0),
            dir: Vec2::X,
            tick: 42,
            id: 7,
            archetype,
        }
    }

    #[test]
    fn builtin_codes_resolve() {
        let r = EffectRegistry::with_builtin();
        for code in [archetype::BOLT, archetype::ORB, archetype::SHARD, archetype::WISP, archetype::ARC] {
            assert!(r.get(code).is_some(), "archetype {code} missing");
        }
    }

    #[test]
    fn unknown_code_returns_none_not_panic() {
        let r = EffectRegistry::with_builtin();
        assert!(r.get(99).is_none());
        assert!(r.get(MAX_ARCHETYPES as u16 + 5).is_none());
    }

    #[test]
    fn draw_falls_back_for_unknown_archetype() {
        let r = EffectRegistry::with_builtin();
        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        r.draw(&mut set, &mut out, &instance(99));
        set.end_all(&mut out);
        assert!(!out.is_empty(), "fallback must draw something");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn register_out_of_range_panics() {
        let mut r = EffectRegistry::new();
        r.register(MAX_ARCHETYPES as u16, draw_generic);
    }

    #[test]
    fn routines_are_pure_in_their_inputs() {
        let r = EffectRegistry::with_builtin();
        for code in [archetype::BOLT, archetype::ORB, 99] {
            let mut set_a = BatchSet::new();
            let mut out_a = DrawStream::default();
            r.draw(&mut set_a, &mut out_a, &instance(code));
            set_a.end_all(&mut out_a);

            let mut set_b = BatchSet::new();
            let mut out_b = DrawStream::default();
            r.draw(&mut set_b, &mut out_b, &instance(code));
            set_b.end_all(&mut out_b);

            assert_eq!(out_a.vertex_bytes(), out_b.vertex_bytes(), "archetype {code} not pure");
        }
    }
}
