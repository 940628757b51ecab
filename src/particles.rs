// Fixed-capacity particle pool.
//
// Particles live in a flat arena addressed by index; nothing outside the
// pool ever holds onto one, so expiry is a plain swap-remove. `emit` refuses
// work when the pool is full — the particle budget is a soft cap, visual
// omission beats a stalled frame.

use bitflags::bitflags;
use glam::Vec2;

use crate::batch::{BatchSet, BlendMode, DrawStream};
use crate::color::Color;
use crate::hash::{hash01, hash_range};

bitflags! {
    /// Per-particle render behavior.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ParticleFlags: u8 {
        /// Rendered in additive blend (fire, sparks, magic).
        const ADDITIVE = 1 << 0;
        /// Size scales down with remaining life.
        const SHRINKS = 1 << 1;
        /// Drawn as a soft-edged blob instead of a hard square.
        const SOFT = 1 << 2;
    }
}

/// One pool slot. Copied freely; identity is the pool index only.
#[derive(Copy, Clone, Debug)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub life: f32,
    pub initial_life: f32,
    pub color: Color,
    pub alpha: f32,
    pub size: f32,
    /// Downward acceleration in px/s². Negative values rise (smoke, bubbles).
    pub gravity: f32,
    /// Velocity damping rate per second.
    pub drag: f32,
    pub flags: ParticleFlags,
}

impl Particle {
    pub fn new(pos: Vec2, vel: Vec2, life: f32, color: Color, size: f32) -> Self {
        Self {
            pos,
            vel,
            life,
            initial_life: life,
            color,
            alpha: color.alpha(),
            size,
            gravity: 0.0,
            drag: 0.0,
            flags: ParticleFlags::empty(),
        }
    }

    pub fn gravity(mut self, g: f32) -> Self {
        self.gravity = g;
        self
    }

    pub fn drag(mut self, d: f32) -> Self {
        self.drag = d;
        self
    }

    pub fn flags(mut self, flags: ParticleFlags) -> Self {
        self.flags = flags;
        self
    }
}

pub struct ParticleSystem {
    pool: Vec<Particle>,
    capacity: usize,
    /// Non-additive stragglers found after the additive switch, drawn last.
    aux: Vec<Particle>,
    /// Set once per frame so a full pool logs a single warning, not thousands.
    warned_full: bool,
}

impl ParticleSystem {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: Vec::with_capacity(capacity),
            capacity,
            aux: Vec::new(),
            warned_full: false,
        }
    }

    pub fn active(&self) -> usize {
        self.pool.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a particle. Returns `false` (and drops the request) when the pool
    /// is full; the active count is left unchanged.
    pub fn emit(&mut self, p: Particle) -> bool {
        if self.pool.len() >= self.capacity {
            if !self.warned_full {
                log::warn!("particle pool full ({}), dropping emits", self.capacity);
                self.warned_full = true;
            }
            return false;
        }
        self.pool.push(p);
        true
    }

    /// Integrate every active particle: drag, then gravity, then position.
    /// Expired particles are swap-removed; order inside the pool is not
    /// meaningful and no external references exist.
    pub fn update(&mut self, dt: f32) {
        self.warned_full = false;
        let mut i = 0;
        while i < self.pool.len() {
            let p = &mut self.pool[i];
            let damp = (1.0 - p.drag * dt).max(0.0);
            p.vel *= damp;
            p.vel.y += p.gravity * dt;
            p.pos += p.vel * dt;
            p.life -= dt;
            if p.life <= 0.0 {
                self.pool.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Draw every particle through the shape batch with at most one
    /// alpha→additive blend switch. Non-additive particles encountered after
    /// the switch are parked in an auxiliary buffer and drawn at the end in
    /// one normal-blend run.
    pub fn render(&mut self, set: &mut BatchSet, out: &mut DrawStream) {
        if self.pool.is_empty() {
            return;
        }
        self.aux.clear();
        let batch = set.ensure_shape(out);
        batch.set_blend(BlendMode::Alpha, out);
        let mut switched = false;

        for i in 0..self.pool.len() {
            let p = self.pool[i];
            if p.flags.contains(ParticleFlags::ADDITIVE) {
                if !switched {
                    batch.set_blend(BlendMode::Additive, out);
                    switched = true;
                }
                draw_particle(batch, out, &p);
            } else if switched {
                self.aux.push(p);
            } else {
                draw_particle(batch, out, &p);
            }
        }

        if switched {
            batch.set_blend(BlendMode::Alpha, out);
            for p in &self.aux {
                draw_particle(batch, out, p);
            }
        }
    }

    // ── Emit helpers ───────────────────────────────────────────────────────
    //
    // All helpers jitter through the deterministic hash seeded by the
    // caller; emitting the same burst twice yields the same particles.

    /// Radial spark burst (impacts, pickups). Additive, shrinking.
    pub fn spark_burst(&mut self, at: Vec2, count: usize, color: Color, seed: u64) {
        for i in 0..count {
            let s = seed.wrapping_add(i as u64);
            let angle = hash01(s) * std::f32::consts::TAU;
            let speed = hash_range(s.wrapping_add(1), 60.0, 220.0);
            let life = hash_range(s.wrapping_add(2), 0.25, 0.6);
            self.emit(
                Particle::new(at, Vec2::new(angle.cos(), angle.sin()) * speed, life, color, 3.0)
                    .drag(4.0)
                    .flags(ParticleFlags::ADDITIVE | ParticleFlags::SHRINKS | ParticleFlags::SOFT),
            );
        }
    }

    /// Low dust puff (footsteps, landings). Alpha-blended, rising slightly.
    pub fn dust_puff(&mut self, at: Vec2, count: usize, seed: u64) {
        let dust = Color::rgba(0.55, 0.5, 0.42, 0.5);
        for i in 0..count {
            let s = seed.wrapping_add(i as u64).wrapping_mul(3);
            let vx = hash_range(s, -18.0, 18.0);
            let vy = hash_range(s.wrapping_add(1), -26.0, -6.0);
            let life = hash_range(s.wrapping_add(2), 0.3, 0.7);
            self.emit(
                Particle::new(at, Vec2::new(vx, vy), life, dust, 4.0)
                    .drag(2.5)
                    .gravity(-8.0)
                    .flags(ParticleFlags::SOFT | ParticleFlags::SHRINKS),
            );
        }
    }

    /// Short-lived glow dot left behind a moving projectile.
    pub fn trail_wisp(&mut self, at: Vec2, color: Color, seed: u64) {
        let jitter = Vec2::new(hash_range(seed, -4.0, 4.0), hash_range(seed.wrapping_add(1), -4.0, 4.0));
        self.emit(
            Particle::new(at + jitter, Vec2::ZERO, 0.35, color, 5.0)
                .flags(ParticleFlags::ADDITIVE | ParticleFlags::SHRINKS | ParticleFlags::SOFT),
        );
    }

    /// Outward ring of debris for explosions: heavier, gravity-bound.
    pub fn debris_burst(&mut self, at: Vec2, count: usize, color: Color, seed: u64) {
        for i in 0..count {
            let s = seed.wrapping_add((i as u64).wrapping_mul(7));
            let angle = hash01(s) * std::f32::consts::TAU;
            let speed = hash_range(s.wrapping_add(1), 90.0, 320.0);
            let life = hash_range(s.wrapping_add(2), 0.5, 1.1);
            self.emit(
                Particle::new(at, Vec2::new(angle.cos(), angle.sin() * 0.5) * speed, life, color, 4.0)
                    .drag(2.0)
                    .gravity(260.0)
                    .flags(ParticleFlags::SHRINKS),
            );
        }
    }
}

fn draw_particle(batch: &mut crate::batch::Batch, out: &mut DrawStream, p: &Particle) {
    let t = (p.life / p.initial_life).clamp(0.0, 1.0);
    let size = if p.flags.contains(ParticleFlags::SHRINKS) { p.size * t } else { p.size };
    if size < 0.3 {
        return;
    }
    let color = p.color.with_alpha(p.alpha * t);
    if p.flags.contains(ParticleFlags::SOFT) {
        batch.soft_ellipse(out, p.pos, size, size, color);
    } else {
        batch.rect(out, p.pos - Vec2::splat(size * 0.5), Vec2::splat(size), color);
    }
}
