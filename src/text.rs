// Batched text drawing.
//
// The font provider is a black box that maps characters to atlas regions and
// advances; this module just walks a string and emits one textured quad per
// resolvable glyph. Unresolvable characters advance by a fallback width so
// layout stays stable while a font page streams in.

use glam::Vec2;

use crate::batch::{BatchSet, DrawStream};
use crate::color::Color;
use crate::state::FontSource;

/// Advance used for characters the font cannot resolve yet.
const MISSING_ADVANCE: f32 = 7.0;

/// Measure the pixel width of `text` without drawing it.
pub fn measure(font: &impl FontSource, text: &str) -> f32 {
    text.chars()
        .map(|ch| font.glyph(ch).map_or(MISSING_ADVANCE, |g| g.advance))
        .sum()
}

/// Draw `text` with its top-left at `pos`. Switches the set into sprite mode;
/// returns the pen advance in pixels.
pub fn draw(
    set: &mut BatchSet,
    out: &mut DrawStream,
    font: &impl FontSource,
    text: &str,
    pos: Vec2,
    color: Color,
) -> f32 {
    let batch = set.ensure_sprite(out);
    let mut pen = 0.0;
    for ch in text.chars() {
        match font.glyph(ch) {
            Some(g) => {
                batch.sprite(out, pos + Vec2::new(pen, 0.0) + g.offset, g.size, &g.region, color);
                pen += g.advance;
            }
            None => pen += MISSING_ADVANCE,
        }
    }
    pen
}

/// Draw `text` horizontally centered on `center_x`.
pub fn draw_centered(
    set: &mut BatchSet,
    out: &mut DrawStream,
    font: &impl FontSource,
    text: &str,
    center_x: f32,
    y: f32,
    color: Color,
) -> f32 {
    let width = measure(font, text);
    draw(set, out, font, text, Vec2::new(center_x - width * 0.5, y), color)
}
