// Procedural backgrounds.
//
// Each map theme paints a layered backdrop before any tile is drawn. Every
// layer is a pure function of (tick, camera offset, canvas size): the same
// inputs always yield the same vertices. Parallax comes from scaling the
// camera offset per layer and wrapping feature positions across the canvas.

use glam::Vec2;

use crate::batch::{BatchSet, BlendMode, DrawStream};
use crate::color::Color;
use crate::hash::{hash01, hash_range};
use crate::state::BackgroundTheme;

/// Paint the backdrop for `theme` across the whole canvas.
pub fn render(
    set: &mut BatchSet,
    out: &mut DrawStream,
    theme: BackgroundTheme,
    tick: u64,
    cam: Vec2,
    frame_w: f32,
    frame_h: f32,
) {
    match theme {
        BackgroundTheme::Sky => sky(set, out, tick, cam, frame_w, frame_h),
        BackgroundTheme::City => city(set, out, cam, frame_w, frame_h),
        BackgroundTheme::Space => space(set, out, tick, cam, frame_w, frame_h),
        BackgroundTheme::Desert => desert(set, out, cam, frame_w, frame_h),
        BackgroundTheme::Ocean => ocean(set, out, tick, cam, frame_w, frame_h),
    }
}

/// Vertical gradient as a stack of interpolated strips.
fn gradient(set: &mut BatchSet, out: &mut DrawStream, top: Color, bottom: Color, w: f32, h: f32) {
    const STRIPS: usize = 8;
    let batch = set.ensure_shape(out);
    let strip_h = h / STRIPS as f32;
    for i in 0..STRIPS {
        let t = i as f32 / (STRIPS - 1) as f32;
        batch.rect(out, Vec2::new(0.0, i as f32 * strip_h), Vec2::new(w, strip_h + 1.0), top.lerp(bottom, t));
    }
}

/// Wrap a parallax-shifted coordinate into `[0, span)`.
fn wrap(v: f32, span: f32) -> f32 {
    v.rem_euclid(span)
}

fn sky(set: &mut BatchSet, out: &mut DrawStream, tick: u64, cam: Vec2, w: f32, h: f32) {
    gradient(set, out, Color::rgb(0.35, 0.55, 0.85), Color::rgb(0.75, 0.85, 0.95), w, h);
    let batch = set.ensure_shape(out);
    // Two cloud layers at different parallax depths, drifting with the tick.
    for layer in 0..2u64 {
        let depth = 0.05 + layer as f32 * 0.08;
        let drift = tick as f32 * (0.2 + layer as f32 * 0.15);
        let alpha = 0.18 + layer as f32 * 0.1;
        for i in 0..6u64 {
            let s = layer * 100 + i;
            let x = wrap(hash01(s) * w * 1.6 + drift - cam.x * depth, w * 1.3) - w * 0.15;
            let y = hash_range(s.wrapping_add(7), 0.05, 0.45) * h - cam.y * depth * 0.3;
            let r = hash_range(s.wrapping_add(13), 40.0, 110.0);
            batch.soft_ellipse(out, Vec2::new(x, y), r, r * 0.35, Color::WHITE.with_alpha(alpha));
        }
    }
}

fn city(set: &mut BatchSet, out: &mut DrawStream, cam: Vec2, w: f32, h: f32) {
    gradient(set, out, Color::rgb(0.08, 0.07, 0.14), Color::rgb(0.25, 0.15, 0.2), w, h);
    let batch = set.ensure_shape(out);
    // Two silhouette rows; far row is lighter and slower.
    for layer in 0..2u64 {
        let depth = 0.04 + layer as f32 * 0.07;
        let shade = 0.06 + layer as f32 * 0.05;
        let fill = Color::rgb(shade, shade, shade + 0.04);
        let base = h * (0.55 + layer as f32 * 0.15);
        let count = 12;
        let slot = w * 1.4 / count as f32;
        for i in 0..count {
            let s = layer * 1000 + i as u64;
            let bw = slot * hash_range(s, 0.5, 0.9);
            let bh = hash_range(s.wrapping_add(3), 0.1, 0.4) * h;
            let x = wrap(i as f32 * slot - cam.x * depth, w * 1.4) - w * 0.2;
            batch.rect(out, Vec2::new(x, base - bh), Vec2::new(bw, bh + h), fill);
            // Sparse lit windows, stable per building.
            for wi in 0..4u64 {
                let ws = s.wrapping_mul(31).wrapping_add(wi);
                if hash01(ws) > 0.55 {
                    let wx = x + hash01(ws.wrapping_add(1)) * (bw - 4.0);
                    let wy = base - bh + hash01(ws.wrapping_add(2)) * (bh - 6.0);
                    batch.rect(out, Vec2::new(wx, wy), Vec2::splat(3.0), Color::rgba(0.95, 0.85, 0.4, 0.8));
                }
            }
        }
    }
}

fn space(set: &mut BatchSet, out: &mut DrawStream, tick: u64, cam: Vec2, w: f32, h: f32) {
    gradient(set, out, Color::rgb(0.01, 0.01, 0.04), Color::rgb(0.05, 0.02, 0.1), w, h);
    let batch = set.ensure_shape(out);
    batch.set_blend(BlendMode::Additive, out);
    // Star field: three depths, subtle twinkle from the tick.
    for layer in 0..3u64 {
        let depth = 0.02 + layer as f32 * 0.05;
        for i in 0..40u64 {
            let s = layer * 10_000 + i;
            let x = wrap(hash01(s) * w * 1.2 - cam.x * depth, w * 1.2);
            let y = wrap(hash01(s.wrapping_add(1)) * h * 1.2 - cam.y * depth, h * 1.2);
            let twinkle = ((tick as f32 * 0.1 + hash01(s.wrapping_add(2)) * 6.28).sin() * 0.5 + 0.5) * 0.5 + 0.3;
            let size = 0.8 + hash01(s.wrapping_add(3)) * 1.6;
            batch.rect(out, Vec2::new(x, y), Vec2::splat(size), Color::WHITE.with_alpha(twinkle));
        }
    }
    // A distant nebula blob.
    let neb = Vec2::new(wrap(w * 0.7 - cam.x * 0.03, w * 1.2), h * 0.3 - cam.y * 0.03);
    batch.soft_ellipse(out, neb, 160.0, 90.0, Color::rgba(0.5, 0.2, 0.7, 0.12));
    batch.set_blend(BlendMode::Alpha, out);
}

fn desert(set: &mut BatchSet, out: &mut DrawStream, cam: Vec2, w: f32, h: f32) {
    gradient(set, out, Color::rgb(0.95, 0.75, 0.45), Color::rgb(0.85, 0.6, 0.35), w, h);
    let batch = set.ensure_shape(out);
    // Sun, fixed high in the sky.
    batch.soft_ellipse(out, Vec2::new(w * 0.75, h * 0.18), 55.0, 55.0, Color::rgba(1.0, 0.95, 0.75, 0.9));
    // Dune ridges as broad flat polygons at two parallax depths.
    for layer in 0..2u64 {
        let depth = 0.05 + layer as f32 * 0.08;
        let base = h * (0.6 + layer as f32 * 0.18);
        let tone = 0.78 - layer as f32 * 0.12;
        let fill = Color::rgb(tone, tone * 0.72, tone * 0.45);
        let mut pts = Vec::with_capacity(10);
        pts.push(Vec2::new(-10.0, h + 10.0));
        for i in 0..=6 {
            let s = layer * 77 + i as u64;
            let x = i as f32 / 6.0 * (w + 20.0) - 10.0;
            let y = base + (hash01(s) - 0.5) * 40.0 - cam.y * depth * 0.1 + ((x - cam.x * depth) * 0.01).sin() * 18.0;
            pts.push(Vec2::new(x, y));
        }
        pts.push(Vec2::new(w + 10.0, h + 10.0));
        // Ridge polygon is star-shaped from the bottom-left anchor; close enough
        // to convex for fan triangulation at these amplitudes.
        batch.fill_polygon(out, &pts, fill);
    }
}

fn ocean(set: &mut BatchSet, out: &mut DrawStream, tick: u64, cam: Vec2, w: f32, h: f32) {
    gradient(set, out, Color::rgb(0.45, 0.7, 0.85), Color::rgb(0.1, 0.3, 0.55), w, h);
    let batch = set.ensure_shape(out);
    // Rolling swell lines below the horizon, phase-shifted by the tick.
    let horizon = h * 0.45;
    for row in 0..5u64 {
        let y = horizon + (row as f32 + 1.0) * (h - horizon) / 6.0 - cam.y * 0.04;
        let phase = tick as f32 * 0.04 + row as f32 * 1.7;
        let alpha = 0.25 - row as f32 * 0.03;
        let mut prev = Vec2::new(0.0, y + phase.sin() * 4.0);
        for i in 1..=8 {
            let x = i as f32 / 8.0 * w;
            let yy = y + (phase + x * 0.015 - cam.x * 0.002).sin() * 4.0;
            let p = Vec2::new(x, yy);
            batch.soft_line(out, prev, p, 3.0, Color::rgba(0.85, 0.95, 1.0, alpha));
            prev = p;
        }
    }
}
