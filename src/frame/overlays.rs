// Frame-to-frame overlay systems.
//
// These are the pieces of the frame that need memory of the previous frame:
// which items were drawn (pickup detection), the last health seen per entity
// (damage numbers), and which one-shot events already fired their burst.
// Everything here reads provider snapshots only; renderer-side trackers are
// the single source of cross-frame state.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use crate::batch::{BatchSet, BlendMode, DrawStream};
use crate::color::Color;
use crate::particles::ParticleSystem;

// Fixed durations, in snapshot-clock seconds, for the timed world events.
pub const DEATH_ANIM_SECS: f64 = 1.2;
pub const TELEPORT_ANIM_SECS: f64 = 0.6;
pub const EXPLOSION_ANIM_SECS: f64 = 0.5;
pub const AREA_ANIM_SECS: f64 = 1.5;

// ── Item pickup detection ─────────────────────────────────────────────────────

/// Diffing tracker for ground items: an item that was tracked last frame but
/// not drawn this frame was picked up and gets a single particle burst.
pub struct PickupTracker {
    tracked: BTreeMap<u64, Vec2>,
    drawn: BTreeMap<u64, Vec2>,
}

impl PickupTracker {
    pub fn new() -> Self {
        Self { tracked: BTreeMap::new(), drawn: BTreeMap::new() }
    }

    /// Record that an item was drawn this frame at a screen position.
    pub fn note_drawn(&mut self, id: u64, screen: Vec2) {
        self.drawn.insert(id, screen);
    }

    /// Close the frame: burst for every tracked-but-undrawn item, then adopt
    /// the drawn set as the new tracking set. Returns the number of pickups.
    pub fn finish(&mut self, particles: &mut ParticleSystem, tick: u64) -> usize {
        let mut pickups = 0;
        for (&id, &screen) in &self.tracked {
            if !self.drawn.contains_key(&id) {
                particles.spark_burst(screen, 10, Color::rgb(1.0, 0.95, 0.45), tick.wrapping_mul(31).wrapping_add(id));
                pickups += 1;
            }
        }
        std::mem::swap(&mut self.tracked, &mut self.drawn);
        self.drawn.clear();
        pickups
    }

    pub fn tracked(&self) -> &BTreeMap<u64, Vec2> {
        &self.tracked
    }
}

impl Default for PickupTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ── Damage numbers ────────────────────────────────────────────────────────────

/// A floating combat number, owned by the renderer until it expires.
#[derive(Clone, Debug)]
pub struct FloatingNumber {
    pub value: u32,
    /// Screen position at spawn; drifts upward with age.
    pub pos: Vec2,
    pub age: f32,
}

pub const FLOATING_NUMBER_SECS: f32 = 0.9;

/// Compares each entity's health against the last frame and spawns a
/// floating number plus impact sparks on any decrease.
pub struct HealthTracker {
    last: BTreeMap<u64, f32>,
    seen: BTreeSet<u64>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { last: BTreeMap::new(), seen: BTreeSet::new() }
    }

    /// Observe one entity this frame. On a health decrease the drop is
    /// returned and the tracker stores the new value.
    pub fn observe(&mut self, id: u64, health: f32) -> Option<f32> {
        self.seen.insert(id);
        let previous = self.last.insert(id, health);
        match previous {
            Some(prev) if health < prev - f32::EPSILON => Some(prev - health),
            _ => None,
        }
    }

    /// Forget entities that vanished from the snapshot so rejoining ids do
    /// not diff against stale health.
    pub fn prune(&mut self) {
        self.last.retain(|id, _| self.seen.contains(id));
        self.seen.clear();
    }

    pub fn last_health(&self, id: u64) -> Option<f32> {
        self.last.get(&id).copied()
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance floater ages and drop expired ones (order not meaningful).
pub fn update_floaters(floaters: &mut Vec<FloatingNumber>, dt: f32) {
    let mut i = 0;
    while i < floaters.len() {
        floaters[i].age += dt;
        if floaters[i].age >= FLOATING_NUMBER_SECS {
            floaters.swap_remove(i);
        } else {
            i += 1;
        }
    }
}

// ── One-shot event side effects ───────────────────────────────────────────────

/// Remembers which event ids already fired their one-shot side effect
/// (particle burst, light flash). Provider maps are read-only, so this is the
/// renderer's own dedup. Prune with the live id set to stay bounded.
pub struct EventSeen {
    seen: BTreeSet<u64>,
}

impl EventSeen {
    pub fn new() -> Self {
        Self { seen: BTreeSet::new() }
    }

    /// True exactly once per event id.
    pub fn first_sight(&mut self, id: u64) -> bool {
        self.seen.insert(id)
    }

    /// Drop ids no longer present in the snapshot map.
    pub fn prune(&mut self, live: impl Fn(u64) -> bool) {
        self.seen.retain(|&id| live(id));
    }
}

impl Default for EventSeen {
    fn default() -> Self {
        Self::new()
    }
}

// ── Timed event animations ────────────────────────────────────────────────────
//
// Each draws purely from (screen position, progress 0..1); callers compute
// progress from the snapshot clock and skip entries past their duration.

/// Expanding fading ring where a player died.
pub fn draw_death_marker(set: &mut BatchSet, out: &mut DrawStream, at: Vec2, progress: f32) {
    let batch = set.ensure_shape(out);
    let r = 6.0 + progress * 26.0;
    let alpha = (1.0 - progress) * 0.8;
    batch.soft_ellipse(out, at, r, r * 0.5, Color::rgba(0.9, 0.15, 0.1, alpha));
    batch.fill_ellipse(out, at, 3.0 * (1.0 - progress), 1.5 * (1.0 - progress), Color::rgba(0.3, 0.0, 0.0, alpha));
}

/// Converging swirl at a teleport departure/arrival.
pub fn draw_teleport(set: &mut BatchSet, out: &mut DrawStream, at: Vec2, progress: f32) {
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);
    let spin = progress * std::f32::consts::TAU * 2.0;
    for i in 0..5 {
        let a = spin + i as f32 * (std::f32::consts::TAU / 5.0);
        let r = 20.0 * (1.0 - progress);
        let p = at + Vec2::new(a.cos() * r, a.sin() * r * 0.5 - progress * 10.0);
        batch.soft_ellipse(out, p, 4.0, 4.0, Color::rgba(0.5, 0.7, 1.0, 0.8 * (1.0 - progress * 0.5)));
    }
    batch.set_blend(BlendMode::Alpha, out);
}

/// Flash disk + shock ring for an explosion.
pub fn draw_explosion(set: &mut BatchSet, out: &mut DrawStream, at: Vec2, progress: f32) {
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);
    let flash = (1.0 - progress * 2.0).max(0.0);
    if flash > 0.0 {
        batch.soft_ellipse(out, at, 30.0 * (1.0 + progress), 18.0 * (1.0 + progress), Color::rgba(1.0, 0.9, 0.6, flash));
    }
    let ring = 10.0 + progress * 55.0;
    batch.soft_ellipse(out, at, ring, ring * 0.5, Color::rgba(1.0, 0.5, 0.15, (1.0 - progress) * 0.6));
    batch.set_blend(BlendMode::Alpha, out);
}

/// Pulsing ground ring for an active area effect.
pub fn draw_area_effect(set: &mut BatchSet, out: &mut DrawStream, at: Vec2, radius_px: f32, progress: f32) {
    let batch = set.ensure_shape(out);
    let pulse = 0.8 + (progress * std::f32::consts::TAU * 3.0).sin() * 0.2;
    let alpha = if progress > 0.8 { (1.0 - progress) * 5.0 } else { 1.0 };
    batch.soft_ellipse(
        out,
        at,
        radius_px * pulse,
        radius_px * pulse * 0.5,
        Color::rgba(0.5, 0.3, 0.9, 0.3 * alpha),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pickup_fires_once_for_vanished_item() {
        let mut t = PickupTracker::new();
        let mut ps = ParticleSystem::new(256);

        // Frame 1: item 5 drawn -> tracked.
        t.note_drawn(5, Vec2::new(10.0, 10.0));
        assert_eq!(t.finish(&mut ps, 1), 0);
        assert!(t.tracked().contains_key(&5));
        assert_eq!(ps.active(), 0);

        // Frame 2: item gone -> exactly one burst, tracking cleared.
        let pickups = t.finish(&mut ps, 2);
        assert_eq!(pickups, 1);
        assert!(ps.active() > 0);
        assert!(!t.tracked().contains_key(&5));

        // Frame 3: still gone -> nothing new.
        let before = ps.active();
        assert_eq!(t.finish(&mut ps, 3), 0);
        assert_eq!(ps.active(), before);
    }

    #[test]
    fn item_drawn_every_frame_never_bursts() {
        let mut t = PickupTracker::new();
        let mut ps = ParticleSystem::new(64);
        for tick in 0..5 {
            t.note_drawn(3, Vec2::ZERO);
            assert_eq!(t.finish(&mut ps, tick), 0);
        }
        assert_eq!(ps.active(), 0);
    }

    #[test]
    fn health_drop_reports_the_difference() {
        let mut h = HealthTracker::new();
        assert_eq!(h.observe(1, 100.0), None, "first sighting never spawns");
        let drop = h.observe(1, 70.0).expect("decrease must report");
        assert!((drop - 30.0).abs() < 1e-3);
        assert_eq!(h.last_health(1), Some(70.0));
    }

    #[test]
    fn healing_and_steady_health_spawn_nothing() {
        let mut h = HealthTracker::new();
        h.observe(1, 50.0);
        assert_eq!(h.observe(1, 50.0), None);
        assert_eq!(h.observe(1, 80.0), None);
    }

    #[test]
    fn prune_forgets_absent_entities() {
        let mut h = HealthTracker::new();
        h.observe(1, 100.0);
        h.prune(); // entity 1 seen this frame, kept
        assert_eq!(h.last_health(1), Some(100.0));
        h.prune(); // not observed since -> gone
        assert_eq!(h.last_health(1), None);
    }

    #[test]
    fn floaters_expire_in_place() {
        let mut f = vec![
            FloatingNumber { value: 10, pos: Vec2::ZERO, age: 0.0 },
            FloatingNumber { value: 20, pos: Vec2::ZERO, age: FLOATING_NUMBER_SECS - 0.05 },
        ];
        update_floaters(&mut f, 0.1);
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].value, 10);
    }

    #[test]
    fn event_seen_fires_once_and_prunes() {
        let mut e = EventSeen::new();
        assert!(e.first_sight(9));
        assert!(!e.first_sight(9));
        e.prune(|_| false);
        assert!(e.first_sight(9), "pruned id may fire again if it reappears");
    }

    #[test]
    fn event_animations_draw_at_midpoint() {
        for which in 0..4 {
            let mut set = BatchSet::new();
            let mut out = DrawStream::default();
            match which {
                0 => draw_death_marker(&mut set, &mut out, Vec2::ZERO, 0.5),
                1 => draw_teleport(&mut set, &mut out, Vec2::ZERO, 0.5),
                2 => draw_explosion(&mut set, &mut out, Vec2::ZERO, 0.5),
                _ => draw_area_effect(&mut set, &mut out, Vec2::ZERO, 40.0, 0.5),
            }
            set.end_all(&mut out);
            assert!(!out.is_empty(), "animation {which} drew nothing at midpoint");
        }
    }
}
