// Per-frame orchestration.
//
// `GameRenderer::render` is the sole entry point of the crate: it walks the
// visible world in depth order, interleaves tile and entity draws, defers
// batch-hostile work, feeds the lighting and post stacks, and hands the
// recorded frame to the GPU context. The CPU half (`compose`) has no GPU
// dependency at all — scenario tests drive it headless and inspect the
// recorded draw stream.

pub mod depth;
pub mod overlays;
pub mod tiles;

use std::collections::BTreeMap;

use glam::Vec2;

use crate::background;
use crate::batch::{BatchSet, DrawStream};
use crate::camera::Camera;
use crate::color::Color;
use crate::effects::{EffectInstance, EffectRegistry};
use crate::hash::{hash01, seed};
use crate::hud;
use crate::lighting::{Light, LightAccumulator};
use crate::particles::ParticleSystem;
use crate::renderer::post_process::PostParams;
use crate::renderer::GpuContext;
use crate::state::{
    AtlasSource, ClientSnapshot, FontSource, ItemSnapshot, PlayerSnapshot, RenderSettings,
    SpriteKind, WorldSource,
};
use crate::text;
use crate::transform::{visible_tile_rect, world_to_screen};
use crate::{RenderError, TILE_H};

use depth::{DeferredBar, DeferredBars, DepthBuckets, DepthEntry, DepthKind};
use overlays::{
    EventSeen, FloatingNumber, HealthTracker, PickupTracker, update_floaters, AREA_ANIM_SECS,
    DEATH_ANIM_SECS, EXPLOSION_ANIM_SECS, TELEPORT_ANIM_SECS,
};

/// Per-frame host inputs: time delta plus the scene and window resolutions.
/// The scene renders at `frame_*` and the composite/HUD at `window_*`.
#[derive(Copy, Clone, Debug)]
pub struct FrameInput {
    pub dt: f32,
    pub frame_w: u32,
    pub frame_h: u32,
    pub window_w: u32,
    pub window_h: u32,
}

/// Everything the GPU needs to draw one frame, recorded CPU-side.
pub struct ComposedFrame {
    /// World-space draws, rendered into the scene target and post-processed.
    pub scene: DrawStream,
    /// Pixel-space draws (HUD, state screens) on top of the composite.
    pub overlay: DrawStream,
    pub lights: Vec<Light>,
    pub post: PostParams,
    pub frame_size: (u32, u32),
    pub window_size: (u32, u32),
}

impl ComposedFrame {
    fn new() -> Self {
        Self {
            scene: DrawStream::default(),
            overlay: DrawStream::default(),
            lights: Vec::new(),
            post: PostParams::default(),
            frame_size: (0, 0),
            window_size: (0, 0),
        }
    }
}

/// Cap on special-tile overlay entries collected per frame.
const SPECIAL_CAP: usize = 384;

/// Seconds of red overlay / aberration after the local player takes a hit.
const HIT_FEEDBACK_SECS: f64 = 0.5;

/// World-units of movement that counts as a footstep for dust spawning.
const FOOTSTEP_MIN_STEP: f32 = 0.02;

pub struct GameRenderer {
    settings: RenderSettings,
    camera: Camera,
    tick: u64,
    batches: BatchSet,
    particles: ParticleSystem,
    effects: EffectRegistry,
    lights: LightAccumulator,
    buckets: DepthBuckets,
    bars: DeferredBars,
    specials: Vec<(i32, i32, u16)>,
    pickup: PickupTracker,
    health: HealthTracker,
    floaters: Vec<FloatingNumber>,
    seen_explosions: EventSeen,
    seen_deaths: EventSeen,
    last_positions: BTreeMap<u64, Vec2>,
    frame: ComposedFrame,
}

impl GameRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        let particle_capacity = settings.particle_capacity;
        Self {
            settings,
            camera: Camera::new(),
            tick: 0,
            batches: BatchSet::new(),
            particles: ParticleSystem::new(particle_capacity),
            effects: EffectRegistry::with_builtin(),
            lights: LightAccumulator::new(),
            buckets: DepthBuckets::new(),
            bars: DeferredBars::new(),
            specials: Vec::with_capacity(SPECIAL_CAP),
            pickup: PickupTracker::new(),
            health: HealthTracker::new(),
            floaters: Vec::new(),
            seen_explosions: EventSeen::new(),
            seen_deaths: EventSeen::new(),
            last_positions: BTreeMap::new(),
            frame: ComposedFrame::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    /// Register a bespoke effect recipe; see [`EffectRegistry::register`].
    pub fn register_effect(&mut self, code: u16, f: crate::effects::EffectFn) {
        self.effects.register(code, f);
    }

    /// Floating combat numbers currently alive.
    pub fn floaters(&self) -> &[FloatingNumber] {
        &self.floaters
    }

    /// Last health the damage tracker stored for an entity.
    pub fn last_seen_health(&self, id: u64) -> Option<f32> {
        self.health.last_health(id)
    }

    /// Item ids the pickup tracker currently follows.
    pub fn tracked_items(&self) -> &BTreeMap<u64, Vec2> {
        self.pickup.tracked()
    }

    /// Render one frame: compose CPU-side, then submit through `gpu` into
    /// `target`. This is the only call a host makes per displayed frame.
    pub fn render(
        &mut self,
        gpu: &mut GpuContext,
        target: &wgpu::TextureView,
        input: FrameInput,
        world: &impl WorldSource,
        atlas: &impl AtlasSource,
        font: &impl FontSource,
        snap: &ClientSnapshot,
    ) -> Result<(), RenderError> {
        self.compose(input, world, atlas, font, snap);
        gpu.submit(&self.frame, target)
    }

    /// Build the frame's draw streams, lights, and post parameters without
    /// touching the GPU.
    pub fn compose(
        &mut self,
        input: FrameInput,
        world: &impl WorldSource,
        atlas: &impl AtlasSource,
        font: &impl FontSource,
        snap: &ClientSnapshot,
    ) -> &ComposedFrame {
        let fw = input.frame_w as f32;
        let fh = input.frame_h as f32;
        let ww = input.window_w as f32;
        let wh = input.window_h as f32;

        self.frame.scene.clear();
        self.frame.overlay.clear();
        self.frame.frame_size = (input.frame_w, input.frame_h);
        self.frame.window_size = (input.window_w, input.window_h);
        self.frame.post = PostParams::from_settings(&self.settings);

        // Dead and fully animated out: the whole world pipeline is skipped
        // for this frame, only the game-over screen draws.
        let death_done = snap.local.dead
            && snap.local.died_at.is_none_or(|t| snap.now - t >= DEATH_ANIM_SECS);
        if death_done {
            hud::draw_game_over(&mut self.batches, &mut self.frame.overlay, font, snap, ww, wh);
            self.batches.end_all(&mut self.frame.overlay);
            self.frame.lights.clear();
            return &self.frame;
        }

        // Animation tick and smoothed camera follow.
        self.tick += 1;
        self.camera.follow(snap.local.pos, fw, fh);
        self.camera.tick(input.dt);
        let cam = self.camera.offset;

        self.lights.clear();

        // Visible world window, padded to hide pop-in.
        let rect = visible_tile_rect(cam, fw, fh, self.settings.visibility_pad, world.width(), world.height());

        // Backdrop.
        background::render(
            &mut self.batches,
            &mut self.frame.scene,
            world.background(),
            self.tick,
            cam,
            fw,
            fh,
        );

        // Collect every drawable into its depth bucket.
        self.buckets.reset(rect);
        self.bars.clear();
        for (&id, p) in &snap.players {
            if id == snap.local.id {
                continue;
            }
            self.buckets.push(DepthEntry { cell: cell_of(p.pos), kind: DepthKind::Player(id) });
        }
        if !snap.local.dead {
            self.buckets.push(DepthEntry { cell: cell_of(snap.local.pos), kind: DepthKind::LocalPlayer });
        }
        for (&id, item) in &snap.items {
            self.buckets.push(DepthEntry { cell: cell_of(item.pos), kind: DepthKind::Item(id) });
        }
        for (&id, proj) in &snap.projectiles {
            self.buckets.push(DepthEntry { cell: cell_of(proj.pos), kind: DepthKind::Projectile(id) });
        }
        for (&id, ev) in &snap.deaths {
            if snap.now - ev.started_at < DEATH_ANIM_SECS {
                self.buckets.push(DepthEntry { cell: cell_of(ev.pos), kind: DepthKind::DeathMarker(id) });
            }
        }

        // Ground pass: position-derived variants only (the floor must never
        // flicker with the animation tick). Special ids are collected here so
        // the overlay pass avoids a second tile scan.
        self.specials.clear();
        let mut specials_dropped = 0u32;
        for y in rect.y0..=rect.y1 {
            for x in rect.x0..=rect.x1 {
                let Some(tile) = world.tile(x, y) else { continue };
                if !tile.walkable {
                    continue;
                }
                tiles::draw_ground(&mut self.batches, &mut self.frame.scene, atlas, x, y, tile.id, cam);
                if tiles::is_special(tile.id) {
                    if self.specials.len() < SPECIAL_CAP {
                        self.specials.push((x, y, tile.id));
                    } else {
                        specials_dropped += 1;
                    }
                }
            }
        }
        if specials_dropped > 0 {
            log::warn!("special-tile overlay budget exceeded, {specials_dropped} dropped");
        }

        // Special-tile overlays.
        for &(x, y, id) in &self.specials {
            tiles::draw_overlay(&mut self.batches, &mut self.frame.scene, x, y, id, self.tick, cam);
        }

        // Elevated tiles interleaved with bucket dispatch, row-major so
        // closer rows paint over farther ones.
        {
            let buckets = &self.buckets;
            let batches = &mut self.batches;
            let out = &mut self.frame.scene;
            let bars = &mut self.bars;
            let pickup = &mut self.pickup;
            let effects = &self.effects;
            let tick = self.tick;
            for y in rect.y0..=rect.y1 {
                for x in rect.x0..=rect.x1 {
                    if let Some(tile) = world.tile(x, y) {
                        if !tile.walkable {
                            tiles::draw_elevated(batches, out, atlas, x, y, tile.id, tick, cam);
                        }
                    }
                    for entry in buckets.at((x, y)) {
                        dispatch_entry(entry, batches, out, bars, pickup, effects, atlas, snap, cam, tick);
                    }
                }
            }
            for entry in buckets.outside() {
                dispatch_entry(entry, batches, out, bars, pickup, effects, atlas, snap, cam, tick);
            }
        }

        // Deferred bars: one shape sub-pass for every bar, then one sprite
        // sub-pass for every label, instead of interleaving per entity.
        self.flush_bars(font, snap);

        // Overlay systems, fixed order.
        self.detect_pickups();
        self.timed_event_animations(snap, cam);
        self.spawn_gameplay_particles(snap, cam);
        self.detect_damage(input.dt, snap, cam, font);

        self.particles.update(input.dt);
        self.particles.render(&mut self.batches, &mut self.frame.scene);

        // Lighting and post feedback from the current game-state signals.
        self.accumulate_lights(snap, cam, fw, fh);
        self.post_feedback(snap, cam, fw, fh);

        self.batches.end_all(&mut self.frame.scene);

        // HUD and state screens in unscaled pixel space.
        hud::draw(&mut self.batches, &mut self.frame.overlay, font, snap, ww, wh);
        self.batches.end_all(&mut self.frame.overlay);

        self.frame.lights.clear();
        self.frame.lights.extend_from_slice(self.lights.lights());
        &self.frame
    }

    fn flush_bars(&mut self, font: &impl FontSource, snap: &ClientSnapshot) {
        if self.bars.is_empty() {
            return;
        }
        let out = &mut self.frame.scene;
        let batch = self.batches.ensure_shape(out);
        for bar in self.bars.entries() {
            let w = 34.0;
            let h = 5.0;
            let origin = bar.screen - Vec2::new(w * 0.5, 0.0);
            let frac = (bar.health / bar.max_health).clamp(0.0, 1.0);
            let fill = if bar.team == snap.local.team {
                Color::rgb(0.2, 0.85, 0.3)
            } else {
                Color::rgb(0.9, 0.25, 0.15)
            };
            batch.rect(out, origin - Vec2::splat(1.0), Vec2::new(w + 2.0, h + 2.0), Color::rgba(0.0, 0.0, 0.0, 0.6));
            batch.rect(out, origin, Vec2::new(w * frac, h), fill);
        }
        for bar in self.bars.entries() {
            if bar.label.is_empty() {
                continue;
            }
            let width = text::measure(font, &bar.label);
            text::draw(
                &mut self.batches,
                out,
                font,
                &bar.label,
                bar.screen - Vec2::new(width * 0.5, 16.0),
                Color::WHITE.with_alpha(0.9),
            );
        }
    }

    /// Items tracked last frame but not drawn this frame were picked up.
    fn detect_pickups(&mut self) {
        self.pickup.finish(&mut self.particles, self.tick);
    }

    fn timed_event_animations(&mut self, snap: &ClientSnapshot, cam: Vec2) {
        let out = &mut self.frame.scene;

        for ev in snap.teleports.values() {
            let elapsed = snap.now - ev.started_at;
            if (0.0..TELEPORT_ANIM_SECS).contains(&elapsed) {
                let at = world_to_screen(ev.pos, cam);
                overlays::draw_teleport(&mut self.batches, out, at, (elapsed / TELEPORT_ANIM_SECS) as f32);
            }
        }

        for (&id, ev) in &snap.explosions {
            let elapsed = snap.now - ev.started_at;
            if !(0.0..EXPLOSION_ANIM_SECS).contains(&elapsed) {
                continue;
            }
            let at = world_to_screen(ev.pos, cam);
            overlays::draw_explosion(&mut self.batches, out, at, (elapsed / EXPLOSION_ANIM_SECS) as f32);
            if self.seen_explosions.first_sight(id) {
                self.particles.debris_burst(at, 14, Color::rgb(0.4, 0.3, 0.25), seed(self.tick, id));
                self.particles.spark_burst(at, 10, Color::ORANGE, seed(self.tick, id ^ 0xA5));
            }
        }

        for ev in snap.area_effects.values() {
            let elapsed = snap.now - ev.started_at;
            if (0.0..AREA_ANIM_SECS).contains(&elapsed) {
                let at = world_to_screen(ev.pos, cam);
                let radius_px = ev.radius * crate::TILE_W * 0.5;
                overlays::draw_area_effect(&mut self.batches, out, at, radius_px, (elapsed / AREA_ANIM_SECS) as f32);
            }
        }

        // One-shot debris for deaths, once per event id.
        for (&id, ev) in &snap.deaths {
            if snap.now - ev.started_at < DEATH_ANIM_SECS && self.seen_deaths.first_sight(id) {
                let at = world_to_screen(ev.pos, cam);
                self.particles.dust_puff(at, 8, seed(self.tick, id));
            }
        }

        self.seen_explosions.prune(|id| snap.explosions.contains_key(&id));
        self.seen_deaths.prune(|id| snap.deaths.contains_key(&id));
    }

    /// Footstep dust for moving entities, trail wisps behind projectiles.
    fn spawn_gameplay_particles(&mut self, snap: &ClientSnapshot, cam: Vec2) {
        let mut current = BTreeMap::new();
        let mut walkers: Vec<(u64, Vec2)> = snap
            .players
            .values()
            .map(|p| (p.id, p.pos))
            .collect();
        walkers.push((snap.local.id, snap.local.pos));

        for (id, pos) in walkers {
            current.insert(id, pos);
            if let Some(&prev) = self.last_positions.get(&id) {
                let step = (pos - prev).length();
                if step > FOOTSTEP_MIN_STEP && hash01(seed(self.tick, id)) < 0.3 {
                    let feet = world_to_screen(pos, cam) + Vec2::new(0.0, TILE_H * 0.25);
                    self.particles.dust_puff(feet, 2, seed(self.tick, id ^ 0x0F00));
                }
            }
        }
        self.last_positions = current;

        for (&id, proj) in &snap.projectiles {
            let at = world_to_screen(proj.pos, cam);
            let color = Color::rgba(1.0, 0.8, 0.4, 0.6);
            self.particles.trail_wisp(at, color, seed(self.tick, id));
        }
    }

    /// Health decreases spawn a floating number and impact sparks.
    fn detect_damage(&mut self, dt: f32, snap: &ClientSnapshot, cam: Vec2, font: &impl FontSource) {
        update_floaters(&mut self.floaters, dt);

        let mut wounded: Vec<(Vec2, f32)> = Vec::new();
        if let Some(drop) = self.health.observe(snap.local.id, snap.local.health) {
            wounded.push((snap.local.pos, drop));
        }
        for p in snap.players.values() {
            if p.id == snap.local.id {
                continue;
            }
            if let Some(drop) = self.health.observe(p.id, p.health) {
                wounded.push((p.pos, drop));
            }
        }
        self.health.prune();

        for (i, (pos, drop)) in wounded.into_iter().enumerate() {
            let at = world_to_screen(pos, cam);
            self.floaters.push(FloatingNumber { value: drop.round() as u32, pos: at, age: 0.0 });
            self.particles.spark_burst(at, 6, Color::rgb(1.0, 0.3, 0.2), seed(self.tick, i as u64));
        }

        // Draw every live floater, drifting upward as it ages.
        let out = &mut self.frame.scene;
        for f in &self.floaters {
            let alpha = 1.0 - f.age / overlays::FLOATING_NUMBER_SECS;
            let pos = f.pos - Vec2::new(0.0, 18.0 + f.age * 30.0);
            let label = f.value.to_string();
            let width = text::measure(font, &label);
            text::draw(
                &mut self.batches,
                out,
                font,
                &label,
                pos - Vec2::new(width * 0.5, 0.0),
                Color::rgb(1.0, 0.85, 0.3).with_alpha(alpha),
            );
        }
    }

    fn accumulate_lights(&mut self, snap: &ClientSnapshot, cam: Vec2, fw: f32, fh: f32) {
        let on_screen = |p: Vec2| p.x > -200.0 && p.y > -200.0 && p.x < fw + 200.0 && p.y < fh + 200.0;

        let local_at = world_to_screen(snap.local.pos, cam);
        self.lights.add(local_at, 110.0, [1.0, 0.95, 0.8], 0.8);

        for p in snap.players.values() {
            if p.id == snap.local.id {
                continue;
            }
            let at = world_to_screen(p.pos, cam);
            if on_screen(at) {
                self.lights.add(at, 90.0, [0.9, 0.9, 1.0], 0.5);
            }
        }

        for proj in snap.projectiles.values() {
            let at = world_to_screen(proj.pos, cam);
            if on_screen(at) {
                self.lights.add(at, 60.0, [1.0, 0.8, 0.5], 0.7);
            }
        }

        // Explosion light decays over the animation window.
        for ev in snap.explosions.values() {
            let elapsed = snap.now - ev.started_at;
            if (0.0..EXPLOSION_ANIM_SECS).contains(&elapsed) {
                let k = 1.0 - (elapsed / EXPLOSION_ANIM_SECS) as f32;
                let at = world_to_screen(ev.pos, cam);
                self.lights.add(at, 180.0, [1.0, 0.6, 0.25], 2.2 * k);
            }
        }
    }

    /// Damage/distortion post parameters from the current hit and explosion
    /// timers. Written once here, read once by the composite pass.
    fn post_feedback(&mut self, snap: &ClientSnapshot, cam: Vec2, fw: f32, fh: f32) {
        let post = &mut self.frame.post;

        if let Some(hit_at) = snap.local.hit_at {
            let age = snap.now - hit_at;
            if (0.0..HIT_FEEDBACK_SECS).contains(&age) {
                let k = 1.0 - (age / HIT_FEEDBACK_SECS) as f32;
                post.overlay_color = [0.8, 0.05, 0.02, 0.3 * k];
                post.aberration = 0.004 * k;
            }
        }

        // Strongest active explosion drives the radial distortion.
        let mut best = 0.0f32;
        for ev in snap.explosions.values() {
            let elapsed = snap.now - ev.started_at;
            if (0.0..EXPLOSION_ANIM_SECS).contains(&elapsed) {
                let k = 1.0 - (elapsed / EXPLOSION_ANIM_SECS) as f32;
                if k > best {
                    best = k;
                    let at = world_to_screen(ev.pos, cam);
                    post.distortion_center = [at.x / fw, at.y / fh];
                }
            }
        }
        post.distortion_strength = 0.05 * best;
    }
}

/// Cell a fractional world position occupies.
fn cell_of(pos: Vec2) -> (i32, i32) {
    (pos.x.floor() as i32, pos.y.floor() as i32)
}

/// Screen anchor for an entity sprite: bottom-center resting at the foot of
/// its diamond.
fn sprite_anchor(screen: Vec2, w: f32, h: f32) -> Vec2 {
    Vec2::new(screen.x - w * 0.5, screen.y + TILE_H * 0.5 - h)
}

#[allow(clippy::too_many_arguments)]
fn dispatch_entry(
    entry: &DepthEntry,
    batches: &mut BatchSet,
    out: &mut DrawStream,
    bars: &mut DeferredBars,
    pickup: &mut PickupTracker,
    effects: &EffectRegistry,
    atlas: &impl AtlasSource,
    snap: &ClientSnapshot,
    cam: Vec2,
    tick: u64,
) {
    match &entry.kind {
        DepthKind::Player(id) => {
            if let Some(p) = snap.players.get(id) {
                draw_player(batches, out, bars, atlas, p, cam);
            }
        }
        DepthKind::LocalPlayer => {
            let l = &snap.local;
            let p = PlayerSnapshot {
                id: l.id,
                pos: l.pos,
                health: l.health,
                max_health: l.max_health,
                team: l.team,
                character: l.character,
                dir: l.dir,
                anim_frame: l.anim_frame,
                name: l.name.clone(),
            };
            draw_player(batches, out, bars, atlas, &p, cam);
        }
        DepthKind::Item(id) => {
            if let Some(item) = snap.items.get(id) {
                draw_item(batches, out, pickup, atlas, item, cam, tick);
            }
        }
        DepthKind::Projectile(id) => {
            if let Some(proj) = snap.projectiles.get(id) {
                let inst = EffectInstance {
                    pos: world_to_screen(proj.pos, cam),
                    dir: proj.dir,
                    tick,
                    id: proj.id,
                    archetype: proj.archetype,
                };
                effects.draw(batches, out, &inst);
            }
        }
        DepthKind::DeathMarker(id) => {
            if let Some(ev) = snap.deaths.get(id) {
                let progress = ((snap.now - ev.started_at) / DEATH_ANIM_SECS).clamp(0.0, 1.0) as f32;
                overlays::draw_death_marker(batches, out, world_to_screen(ev.pos, cam), progress);
            }
        }
    }
}

fn draw_player(
    batches: &mut BatchSet,
    out: &mut DrawStream,
    bars: &mut DeferredBars,
    atlas: &impl AtlasSource,
    p: &PlayerSnapshot,
    cam: Vec2,
) {
    let screen = world_to_screen(p.pos, cam);
    let mut top = screen - Vec2::new(0.0, 36.0);
    if let Some(region) = atlas.sprite_region(SpriteKind::Character(p.character), p.anim_frame, p.dir) {
        let pos = sprite_anchor(screen, region.px_w, region.px_h);
        top = Vec2::new(screen.x, pos.y - 4.0);
        let batch = batches.ensure_sprite(out);
        batch.sprite(out, pos, Vec2::new(region.px_w, region.px_h), &region, Color::WHITE);
    } else {
        log::debug!("character sprite missing for id {}", p.character);
    }
    bars.push(DeferredBar {
        screen: top,
        health: p.health,
        max_health: p.max_health,
        team: p.team,
        entity: p.id,
        label: p.name.clone(),
    });
}

fn draw_item(
    batches: &mut BatchSet,
    out: &mut DrawStream,
    pickup: &mut PickupTracker,
    atlas: &impl AtlasSource,
    item: &ItemSnapshot,
    cam: Vec2,
    tick: u64,
) {
    let screen = world_to_screen(item.pos, cam);
    // Tracked whether or not the sprite resolved: pickup detection must key
    // on the item leaving the snapshot, not on a missing atlas page.
    pickup.note_drawn(item.id, screen);

    let bob = ((tick as f32 * 0.12) + hash01(item.id) * std::f32::consts::TAU).sin() * 3.0;
    if let Some(region) = atlas.sprite_region(SpriteKind::Item(item.kind), 0, 0) {
        let pos = sprite_anchor(screen + Vec2::new(0.0, bob), region.px_w, region.px_h);
        let batch = batches.ensure_sprite(out);
        batch.sprite(out, pos, Vec2::new(region.px_w, region.px_h), &region, Color::WHITE);
    }
}
