// External-collaborator surface.
//
// The rendering core never simulates anything: every frame it is handed a
// read-only view of the world grid, a snapshot of the live game state, and
// resolvers for atlas regions and font glyphs. The host owns all of these.
// Snapshot maps are `BTreeMap` so iteration order (and therefore the emitted
// vertex stream) is identical across runs.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::Deserialize;

use crate::RenderError;

// ── World / tiles ─────────────────────────────────────────────────────────────

/// One world cell as reported by the host's tile provider.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub id: u16,
    /// Walkable tiles form the ground layer; non-walkable ones are drawn as
    /// elevated blocks in the interleaved depth pass.
    pub walkable: bool,
}

/// Procedural background family for the current map.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackgroundTheme {
    Sky,
    City,
    Space,
    Desert,
    Ocean,
}

/// Read-only tile provider. Consumed every frame; never mutated.
pub trait WorldSource {
    /// `None` outside the world bounds.
    fn tile(&self, x: i32, y: i32) -> Option<Tile>;
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn background(&self) -> BackgroundTheme;
}

// ── Atlas / font providers ────────────────────────────────────────────────────

/// Handle for a texture registered with the GPU context by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// A rectangular sub-region of a host-owned texture, in normalized UVs,
/// plus its pixel footprint for quad sizing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AtlasRegion {
    pub texture: TextureId,
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub px_w: f32,
    pub px_h: f32,
}

/// Sprite lookup key for the shared atlas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpriteKind {
    /// Player body by character id.
    Character(u16),
    /// Projectile by archetype code.
    Projectile(u16),
    /// Ground item by item kind.
    Item(u16),
}

/// Resolves atlas regions. `None` means "not loaded yet" — the element is
/// skipped for this frame and the provider is expected to start a lazy load.
pub trait AtlasSource {
    fn tile_region(&self, id: u16, variant: u32) -> Option<AtlasRegion>;
    fn sprite_region(&self, kind: SpriteKind, frame: u32, dir: u8) -> Option<AtlasRegion>;
}

/// One glyph as resolved by the host's font provider.
#[derive(Copy, Clone, Debug)]
pub struct Glyph {
    /// Horizontal pen advance in pixels.
    pub advance: f32,
    /// Offset from the pen position to the glyph quad's top-left.
    pub offset: Vec2,
    /// Glyph quad size in pixels.
    pub size: Vec2,
    pub region: AtlasRegion,
}

/// Turns characters into textured quads. Treated as a black box; characters
/// the font cannot resolve are skipped.
pub trait FontSource {
    fn glyph(&self, ch: char) -> Option<Glyph>;
    fn line_height(&self) -> f32;
}

// ── Game-state snapshot ───────────────────────────────────────────────────────

/// Local player state for the frame being rendered.
#[derive(Clone, Debug)]
pub struct LocalPlayer {
    pub id: u64,
    /// Interpolated world position (fractional cells).
    pub pos: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub team: u8,
    pub character: u16,
    pub dir: u8,
    pub anim_frame: u32,
    pub name: String,
    pub dead: bool,
    /// Snapshot timestamp at which the death animation started.
    pub died_at: Option<f64>,
    /// Snapshot timestamp of the most recent hit taken (drives damage feedback).
    pub hit_at: Option<f64>,
    /// Remaining respawn wait in seconds, when dead.
    pub respawn_in: Option<f32>,
    /// Ability cooldown fractions, 0 = ready, 1 = just used.
    pub cooldowns: [f32; 3],
}

/// A remote player as seen this frame.
#[derive(Clone, Debug)]
pub struct PlayerSnapshot {
    pub id: u64,
    pub pos: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub team: u8,
    pub character: u16,
    pub dir: u8,
    pub anim_frame: u32,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub pos: Vec2,
    /// Normalized travel direction.
    pub dir: Vec2,
    pub archetype: u16,
}

#[derive(Clone, Debug)]
pub struct ItemSnapshot {
    pub id: u64,
    pub pos: Vec2,
    pub kind: u16,
}

/// A one-shot world event keyed by its start timestamp; the renderer derives
/// animation progress from `now - started_at` and ignores entries past their
/// fixed duration.
#[derive(Copy, Clone, Debug)]
pub struct TimedEvent {
    pub pos: Vec2,
    pub started_at: f64,
}

#[derive(Copy, Clone, Debug)]
pub struct AreaEffect {
    pub pos: Vec2,
    pub radius: f32,
    pub archetype: u16,
    pub started_at: f64,
}

#[derive(Clone, Debug)]
pub struct KillFeedEntry {
    pub killer: String,
    pub victim: String,
    pub at: f64,
}

/// Read-only view of the live game state for one frame.
///
/// The renderer never mutates a snapshot; per-event one-shot effects are
/// deduplicated internally by event id.
#[derive(Clone, Debug)]
pub struct ClientSnapshot {
    /// Snapshot time in seconds. All event timestamps share this clock.
    pub now: f64,
    pub local: LocalPlayer,
    pub players: BTreeMap<u64, PlayerSnapshot>,
    pub projectiles: BTreeMap<u64, ProjectileSnapshot>,
    pub items: BTreeMap<u64, ItemSnapshot>,
    pub deaths: BTreeMap<u64, TimedEvent>,
    pub teleports: BTreeMap<u64, TimedEvent>,
    pub explosions: BTreeMap<u64, TimedEvent>,
    pub area_effects: BTreeMap<u64, AreaEffect>,
    pub kill_feed: Vec<KillFeedEntry>,
}

impl ClientSnapshot {
    /// A minimal snapshot with an alive local player at `pos`.
    pub fn with_local(pos: Vec2) -> Self {
        Self {
            now: 0.0,
            local: LocalPlayer {
                id: 0,
                pos,
                health: 100.0,
                max_health: 100.0,
                team: 0,
                character: 0,
                dir: 0,
                anim_frame: 0,
                name: String::new(),
                dead: false,
                died_at: None,
                hit_at: None,
                respawn_in: None,
                cooldowns: [0.0; 3],
            },
            players: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            items: BTreeMap::new(),
            deaths: BTreeMap::new(),
            teleports: BTreeMap::new(),
            explosions: BTreeMap::new(),
            area_effects: BTreeMap::new(),
            kill_feed: Vec::new(),
        }
    }
}

// ── Render settings ───────────────────────────────────────────────────────────

/// Numeric tuning knobs. Plain fields, mutated freely by the host; the JSON
/// loader exists for convenience, not persistence.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Luminance above which pixels feed the bloom chain.
    pub bloom_threshold: f32,
    /// Multiplier applied to the blurred bright pass at composite.
    pub bloom_strength: f32,
    /// 0 disables the vignette entirely.
    pub vignette_strength: f32,
    /// Particle pool capacity; emits beyond it are dropped.
    pub particle_capacity: usize,
    /// Extra rows/columns of tiles drawn beyond the canvas edge.
    pub visibility_pad: i32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            bloom_threshold: 0.7,
            bloom_strength: 0.8,
            vignette_strength: 0.55,
            particle_capacity: 4096,
            visibility_pad: 2,
        }
    }
}

impl RenderSettings {
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_roundtrip() {
        let s = RenderSettings::from_json("{}").unwrap();
        assert_eq!(s.particle_capacity, RenderSettings::default().particle_capacity);
    }

    #[test]
    fn settings_partial_override() {
        let s = RenderSettings::from_json(r#"{"bloom_strength": 1.5}"#).unwrap();
        assert!((s.bloom_strength - 1.5).abs() < 1e-6);
        assert!((s.bloom_threshold - 0.7).abs() < 1e-6);
    }

    #[test]
    fn settings_reject_malformed_json() {
        assert!(RenderSettings::from_json("{bloom}").is_err());
    }
}
