// HUD and full-screen state overlays.
//
// Drawn after the composite pass in unscaled window pixel space; nothing
// here is time-critical. Text goes through the external font provider as
// batched glyph quads.

use glam::Vec2;

use crate::batch::{BatchSet, DrawStream};
use crate::color::Color;
use crate::state::{ClientSnapshot, FontSource};
use crate::text;

const HP_FILL: Color = Color([0.15, 0.8, 0.25, 1.0]);
const HP_LOW: Color = Color([0.9, 0.2, 0.1, 1.0]);
const HP_EMPTY: Color = Color([0.08, 0.1, 0.08, 0.9]);
const PANEL_BG: Color = Color([0.05, 0.05, 0.07, 0.7]);
const COOLDOWN_READY: Color = Color([0.35, 0.75, 1.0, 1.0]);
const COOLDOWN_WAIT: Color = Color([0.2, 0.25, 0.3, 0.9]);

/// Seconds a kill-feed entry stays on screen.
const KILL_FEED_SECS: f64 = 6.0;
const KILL_FEED_LINES: usize = 4;

/// Draw the standard in-game HUD: local health bar, ability cooldown pips,
/// and the kill feed.
pub fn draw(
    set: &mut BatchSet,
    out: &mut DrawStream,
    font: &impl FontSource,
    snap: &ClientSnapshot,
    window_w: f32,
    window_h: f32,
) {
    health_panel(set, out, font, snap, window_h);
    cooldown_pips(set, out, snap, window_h);
    kill_feed(set, out, font, snap, window_w);
}

fn health_panel(
    set: &mut BatchSet,
    out: &mut DrawStream,
    font: &impl FontSource,
    snap: &ClientSnapshot,
    window_h: f32,
) {
    let local = &snap.local;
    let bar_w = 220.0;
    let bar_h = 18.0;
    let origin = Vec2::new(16.0, window_h - 52.0);

    let frac = (local.health / local.max_health).clamp(0.0, 1.0);
    let fill = if frac < 0.3 { HP_LOW } else { HP_FILL };

    let batch = set.ensure_shape(out);
    batch.rect(out, origin - Vec2::splat(3.0), Vec2::new(bar_w + 6.0, bar_h + 6.0), PANEL_BG);
    batch.rect(out, origin, Vec2::new(bar_w, bar_h), HP_EMPTY);
    if frac > 0.0 {
        batch.rect(out, origin, Vec2::new(bar_w * frac, bar_h), fill);
    }

    let label = format!("{:.0} / {:.0}", local.health.max(0.0), local.max_health);
    text::draw(set, out, font, &label, origin + Vec2::new(bar_w + 10.0, 2.0), Color::WHITE);
}

fn cooldown_pips(set: &mut BatchSet, out: &mut DrawStream, snap: &ClientSnapshot, window_h: f32) {
    let batch = set.ensure_shape(out);
    let origin = Vec2::new(16.0, window_h - 26.0);
    for (i, &cd) in snap.local.cooldowns.iter().enumerate() {
        let pos = origin + Vec2::new(i as f32 * 26.0, 0.0);
        let size = Vec2::new(20.0, 8.0);
        batch.rect(out, pos, size, COOLDOWN_WAIT);
        let ready = 1.0 - cd.clamp(0.0, 1.0);
        if ready > 0.0 {
            batch.rect(out, pos, Vec2::new(size.x * ready, size.y), COOLDOWN_READY);
        }
    }
}

fn kill_feed(
    set: &mut BatchSet,
    out: &mut DrawStream,
    font: &impl FontSource,
    snap: &ClientSnapshot,
    window_w: f32,
) {
    let recent = snap
        .kill_feed
        .iter()
        .filter(|e| snap.now - e.at < KILL_FEED_SECS)
        .rev()
        .take(KILL_FEED_LINES);
    let line_h = font.line_height();
    for (i, entry) in recent.enumerate() {
        let age = (snap.now - entry.at) as f32;
        let alpha = (1.0 - age / KILL_FEED_SECS as f32).clamp(0.0, 1.0);
        let line = format!("{} > {}", entry.killer, entry.victim);
        let w = text::measure(font, &line);
        text::draw(
            set,
            out,
            font,
            &line,
            Vec2::new(window_w - w - 14.0, 12.0 + i as f32 * (line_h + 2.0)),
            Color::WHITE.with_alpha(alpha),
        );
    }
}

/// Full-screen game-over overlay with the respawn countdown. Also used by the
/// dead-state short-circuit path.
pub fn draw_game_over(
    set: &mut BatchSet,
    out: &mut DrawStream,
    font: &impl FontSource,
    snap: &ClientSnapshot,
    window_w: f32,
    window_h: f32,
) {
    let batch = set.ensure_shape(out);
    batch.rect(out, Vec2::ZERO, Vec2::new(window_w, window_h), Color::rgba(0.05, 0.0, 0.0, 0.72));

    let cx = window_w * 0.5;
    text::draw_centered(set, out, font, "YOU DIED", cx, window_h * 0.4, Color::rgb(0.95, 0.2, 0.12));
    if let Some(wait) = snap.local.respawn_in {
        let line = format!("respawn in {}", wait.ceil().max(0.0) as u32);
        text::draw_centered(set, out, font, &line, cx, window_h * 0.4 + font.line_height() * 1.8, Color::GRAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AtlasRegion, Glyph, KillFeedEntry, TextureId};

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

    #[test]
    fn hud_draws_bar_and_label() {
        let snap = ClientSnapshot::with_local(Vec2::new(5.0, 5.0));
        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        draw(&mut set, &mut out, &StubFont, &snap, 1280.0, 720.0);
        set.end_all(&mut out);
        assert!(out.calls.len() >= 2, "expected shape + text calls, got {}", out.calls.len());
    }

    #[test]
    fn kill_feed_ignores_stale_entries() {
        let mut snap = ClientSnapshot::with_local(Vec2::ZERO);
        snap.now = 100.0;
        snap.kill_feed.push(KillFeedEntry { killer: "a".into(), victim: "b".into(), at: 10.0 });

        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        kill_feed(&mut set, &mut out, &StubFont, &snap, 1280.0);
        set.end_all(&mut out);
        assert!(out.is_empty(), "stale kill feed entry still drew");
    }

    #[test]
    fn game_over_covers_screen_and_counts_down() {
        let mut snap = ClientSnapshot::with_local(Vec2::ZERO);
        snap.local.dead = true;
        snap.local.respawn_in = Some(2.3);

        let mut set = BatchSet::new();
        let mut out = DrawStream::default();
        draw_game_over(&mut set, &mut out, &StubFont, &snap, 800.0, 600.0);
        set.end_all(&mut out);
        assert!(!out.is_empty());
        // First quad is the full-screen dim.
        let v0 = out.vertices[0];
        assert_eq!(v0.position, [0.0, 0.0]);
    }
}
