// Frame-level scenario tests.
//
// These drive the CPU compose path with mock providers and inspect the
// recorded draw stream — no GPU is involved.

use std::cell::RefCell;

use glam::Vec2;

use isoforge::frame::tiles;
use isoforge::frame::{FrameInput, GameRenderer};
use isoforge::state::{
    AtlasRegion, AtlasSource, BackgroundTheme, ClientSnapshot, FontSource, Glyph, ItemSnapshot,
    PlayerSnapshot, RenderSettings, SpriteKind, TextureId, Tile, TimedEvent, WorldSource,
};

// ── Mock providers ────────────────────────────────────────────────────────────

/// Uniform world: every cell is the same tile.
struct GridWorld {
    w: i32,
    h: i32,
    tile: Tile,
}

impl WorldSource for GridWorld {
    fn tile(&self, x: i32, y: i32) -> Option<Tile> {
        (x >= 0 && y >= 0 && x < self.w && y < self.h).then_some(self.tile)
    }

    fn width(&self) -> i32 {
        self.w
    }

    fn height(&self) -> i32 {
        self.h
    }

    fn background(&self) -> BackgroundTheme {
        BackgroundTheme::Sky
    }
}

fn region() -> AtlasRegion {
    AtlasRegion {
        texture: TextureId(1),
        uv_min: [0.0, 0.0],
        uv_max: [0.25, 0.25],
        px_w: 64.0,
        px_h: 32.0,
    }
}

/// Atlas that resolves everything and records every lookup in call order.
#[derive(Default)]
struct RecordingAtlas {
    tile_calls: RefCell<Vec<(u16, u32)>>,
    sprite_calls: RefCell<Vec<SpriteKind>>,
}

impl AtlasSource for RecordingAtlas {
    fn tile_region(&self, id: u16, variant: u32) -> Option<AtlasRegion> {
        self.tile_calls.borrow_mut().push((id, variant));
        Some(region())
    }

    fn sprite_region(&self, kind: SpriteKind, _frame: u32, _dir: u8) -> Option<AtlasRegion> {
        self.sprite_calls.borrow_mut().push(kind);
        Some(region())
    }
}

struct StubFont;

impl FontSource for StubFont {
    fn glyph(&self, ch: char) -> Option<Glyph> {
        (!ch.is_whitespace()).then(|| Glyph {
            advance: 8.0,
            offset: Vec2::ZERO,
            size: Vec2::new(8.0, 12.0),
            region: AtlasRegion {
                texture: TextureId(9),
                uv_min: [0.0, 0.0],
                uv_max: [0.1, 0.1],
                px_w: 8.0,
                px_h: 12.0,
            },
        })
    }

    fn line_height(&self) -> f32 {
        14.0
    }
}

fn input() -> FrameInput {
    FrameInput { dt: 1.0 / 60.0, frame_w: 800, frame_h: 600, window_w: 800, window_h: 600 }
}

fn ground_world() -> GridWorld {
    GridWorld { w: 10, h: 10, tile: Tile { id: 5, walkable: true } }
}

fn renderer() -> GameRenderer {
    let _ = env_logger::builder().is_test(true).try_init();
    GameRenderer::new(RenderSettings::default())
}

// ── Ground-tile pass ──────────────────────────────────────────────────────────

#[test]
fn ground_pass_draws_every_tile_row_major_with_position_variants() {
    let world = ground_world();
    let atlas = RecordingAtlas::default();
    let snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    let mut r = renderer();

    r.compose(input(), &world, &atlas, &StubFont, &snap);

    let calls = atlas.tile_calls.borrow();
    assert_eq!(calls.len(), 100, "10x10 walkable world must draw exactly 100 ground tiles");

    let mut expected = Vec::new();
    for y in 0..10 {
        for x in 0..10 {
            expected.push((5u16, tiles::ground_variant(x, y)));
        }
    }
    assert_eq!(*calls, expected, "ground pass must be row-major with position-derived variants");
}

#[test]
fn ground_variants_do_not_follow_the_tick() {
    let world = ground_world();
    let snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    let mut r = renderer();

    let atlas_a = RecordingAtlas::default();
    r.compose(input(), &world, &atlas_a, &StubFont, &snap);
    let first = atlas_a.tile_calls.borrow().clone();

    // Many frames later the floor must request the exact same variants.
    for _ in 0..30 {
        let scratch = RecordingAtlas::default();
        r.compose(input(), &world, &scratch, &StubFont, &snap);
    }
    let atlas_b = RecordingAtlas::default();
    r.compose(input(), &world, &atlas_b, &StubFont, &snap);
    assert_eq!(first, *atlas_b.tile_calls.borrow());
}

// ── Damage numbers ────────────────────────────────────────────────────────────

#[test]
fn health_drop_spawns_one_floating_number() {
    let world = ground_world();
    let atlas = RecordingAtlas::default();
    let mut r = renderer();

    let mut snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    snap.local.health = 100.0;
    r.compose(input(), &world, &atlas, &StubFont, &snap);
    assert!(r.floaters().is_empty(), "first sighting must not spawn");

    snap.local.health = 70.0;
    r.compose(input(), &world, &atlas, &StubFont, &snap);

    assert_eq!(r.floaters().len(), 1, "exactly one damage number");
    let f = &r.floaters()[0];
    assert_eq!(f.value, 30);
    // Camera centers the (unmoved) local player, so the number spawns at
    // canvas center.
    assert!((f.pos.x - 400.0).abs() < 1.0, "x = {}", f.pos.x);
    assert!((f.pos.y - 300.0).abs() < 1.0, "y = {}", f.pos.y);
    assert_eq!(r.last_seen_health(snap.local.id), Some(70.0));
}

#[test]
fn steady_health_never_spawns_numbers() {
    let world = ground_world();
    let atlas = RecordingAtlas::default();
    let mut r = renderer();
    let snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    for _ in 0..5 {
        r.compose(input(), &world, &atlas, &StubFont, &snap);
    }
    assert!(r.floaters().is_empty());
}

// ── Item pickup ───────────────────────────────────────────────────────────────

#[test]
fn vanished_item_bursts_once_and_leaves_tracking() {
    let world = ground_world();
    let atlas = RecordingAtlas::default();
    let mut r = renderer();

    let mut snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    snap.items.insert(7, ItemSnapshot { id: 7, pos: Vec2::new(6.0, 5.0), kind: 2 });
    r.compose(input(), &world, &atlas, &StubFont, &snap);
    assert!(r.tracked_items().contains_key(&7));
    assert_eq!(r.particles().active(), 0);

    // Item picked up: gone from the snapshot.
    snap.items.clear();
    r.compose(input(), &world, &atlas, &StubFont, &snap);
    let burst = r.particles().active();
    assert!(burst > 0, "pickup must spawn a burst");
    assert!(!r.tracked_items().contains_key(&7));

    // No re-trigger on later frames.
    r.compose(input(), &world, &atlas, &StubFont, &snap);
    assert!(r.particles().active() <= burst, "burst must fire exactly once");
}

// ── Determinism ───────────────────────────────────────────────────────────────

fn busy_snapshot() -> ClientSnapshot {
    let mut snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    snap.now = 10.0;
    snap.players.insert(
        2,
        PlayerSnapshot {
            id: 2,
            pos: Vec2::new(3.0, 4.0),
            health: 60.0,
            max_health: 100.0,
            team: 1,
            character: 1,
            dir: 2,
            anim_frame: 1,
            name: "rival".into(),
        },
    );
    snap.items.insert(11, ItemSnapshot { id: 11, pos: Vec2::new(7.0, 7.0), kind: 1 });
    snap.projectiles.insert(
        21,
        isoforge::state::ProjectileSnapshot {
            id: 21,
            pos: Vec2::new(4.0, 4.0),
            dir: Vec2::new(1.0, 0.0),
            archetype: 2,
        },
    );
    snap.explosions.insert(31, TimedEvent { pos: Vec2::new(6.0, 6.0), started_at: 9.9 });
    snap
}

#[test]
fn identical_inputs_compose_bit_identical_streams() {
    let world = GridWorld { w: 10, h: 10, tile: Tile { id: tiles::LAVA, walkable: true } };
    let snap = busy_snapshot();

    let mut a = renderer();
    let mut b = renderer();
    let atlas_a = RecordingAtlas::default();
    let atlas_b = RecordingAtlas::default();

    let fa = a.compose(input(), &world, &atlas_a, &StubFont, &snap);
    let scene_a = fa.scene.vertex_bytes().to_vec();
    let overlay_a = fa.overlay.vertex_bytes().to_vec();
    let calls_a = fa.scene.calls.len();
    let lights_a = fa.lights.clone();
    let post_a = fa.post;

    let fb = b.compose(input(), &world, &atlas_b, &StubFont, &snap);

    assert_eq!(scene_a, fb.scene.vertex_bytes());
    assert_eq!(overlay_a, fb.overlay.vertex_bytes());
    assert_eq!(calls_a, fb.scene.calls.len());
    assert_eq!(lights_a, fb.lights);
    assert_eq!(post_a, fb.post);
}

// ── Explosions ────────────────────────────────────────────────────────────────

#[test]
fn explosion_feeds_light_and_distortion_and_bursts_once() {
    let world = ground_world();
    let atlas = RecordingAtlas::default();
    let mut r = renderer();
    // No projectiles here: trail wisps would respawn every frame and mask
    // the once-only assertion below.
    let mut snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    snap.now = 10.0;
    snap.explosions.insert(31, TimedEvent { pos: Vec2::new(6.0, 6.0), started_at: 9.9 });

    let frame = r.compose(input(), &world, &atlas, &StubFont, &snap);
    assert!(frame.post.distortion_strength > 0.0, "active explosion must distort");
    assert!(
        frame.lights.iter().any(|l| l.radius >= 150.0),
        "explosion must contribute a large light"
    );
    let after_first = r.particles().active();
    assert!(after_first > 0, "explosion debris must spawn");

    r.compose(input(), &world, &atlas, &StubFont, &snap);
    assert!(
        r.particles().active() <= after_first,
        "explosion burst must not re-fire for the same event id"
    );
}

// ── Dead-state short circuit ──────────────────────────────────────────────────

#[test]
fn finished_death_short_circuits_to_game_over() {
    let world = ground_world();
    let atlas = RecordingAtlas::default();
    let mut r = renderer();

    let mut snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    snap.now = 50.0;
    snap.local.dead = true;
    snap.local.died_at = Some(40.0);
    snap.local.respawn_in = Some(3.0);

    let frame = r.compose(input(), &world, &atlas, &StubFont, &snap);
    assert!(frame.scene.is_empty(), "world pipeline must be skipped");
    assert!(!frame.overlay.is_empty(), "game-over screen must draw");
    assert_eq!(r.tick(), 0, "short-circuited frame does not advance the tick");
    assert!(atlas.tile_calls.borrow().is_empty(), "no tiles drawn while dead");
}

#[test]
fn death_in_progress_still_renders_world_without_local_sprite() {
    let world = ground_world();
    let atlas = RecordingAtlas::default();
    let mut r = renderer();

    let mut snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    snap.now = 50.0;
    snap.local.dead = true;
    snap.local.died_at = Some(49.8); // animation still running

    let frame = r.compose(input(), &world, &atlas, &StubFont, &snap);
    assert!(!frame.scene.is_empty(), "world still renders during the death animation");
    assert!(
        !atlas
            .sprite_calls
            .borrow()
            .iter()
            .any(|k| matches!(k, SpriteKind::Character(_))),
        "dead local player must not draw a body sprite"
    );
}

// ── Off-screen entities ───────────────────────────────────────────────────────

#[test]
fn entities_outside_the_visible_rect_still_dispatch() {
    let world = GridWorld { w: 100, h: 100, tile: Tile { id: 5, walkable: true } };
    let atlas = RecordingAtlas::default();
    let mut r = renderer();

    let mut snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
    snap.players.insert(
        2,
        PlayerSnapshot {
            id: 2,
            pos: Vec2::new(90.0, 90.0), // far outside the viewport
            health: 100.0,
            max_health: 100.0,
            team: 0,
            character: 3,
            dir: 0,
            anim_frame: 0,
            name: String::new(),
        },
    );

    r.compose(input(), &world, &atlas, &StubFont, &snap);
    let characters: Vec<_> = atlas
        .sprite_calls
        .borrow()
        .iter()
        .filter(|k| matches!(k, SpriteKind::Character(_)))
        .cloned()
        .collect();
    assert_eq!(characters.len(), 2, "local and the off-screen player both dispatch");
}
