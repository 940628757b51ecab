// Depth buckets and deferred bar/label draws.
//
// World drawables are collected once per frame into buckets keyed by the
// cell they occupy, so the elevated-tile pass can dispatch them in the same
// row-major sweep and get front-to-back layering for free. Health bars and
// name labels are batch-hostile (shape + sprite interleaving per entity), so
// they park in a fixed-capacity deferred array and flush in two sub-passes
// after all entity sprites are out.

use std::collections::HashMap;

use glam::Vec2;

use crate::transform::TileRect;

/// What to draw when a bucket entry is dispatched.
#[derive(Clone, Debug, PartialEq)]
pub enum DepthKind {
    Player(u64),
    LocalPlayer,
    Item(u64),
    Projectile(u64),
    /// Death animation marker, keyed by the death event id.
    DeathMarker(u64),
}

/// One deferred world draw, keyed by the cell it occupies.
#[derive(Clone, Debug)]
pub struct DepthEntry {
    pub cell: (i32, i32),
    pub kind: DepthKind,
}

/// Per-cell buckets for the visible rectangle. Entries whose cell falls
/// outside the rectangle collect separately and dispatch after the sweep.
pub struct DepthBuckets {
    cells: HashMap<(i32, i32), Vec<DepthEntry>>,
    outside: Vec<DepthEntry>,
    rect: TileRect,
}

impl DepthBuckets {
    pub fn new() -> Self {
        Self { cells: HashMap::new(), outside: Vec::new(), rect: TileRect::EMPTY }
    }

    /// Drop last frame's entries and adopt the new visible rectangle.
    /// Bucket allocations are kept so steady-state frames do not allocate.
    pub fn reset(&mut self, rect: TileRect) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.outside.clear();
        self.rect = rect;
    }

    pub fn push(&mut self, entry: DepthEntry) {
        if self.rect.contains(entry.cell.0, entry.cell.1) {
            self.cells.entry(entry.cell).or_default().push(entry);
        } else {
            self.outside.push(entry);
        }
    }

    /// Entries bucketed at `cell`, in insertion order. Empty for cells
    /// nothing occupies.
    pub fn at(&self, cell: (i32, i32)) -> &[DepthEntry] {
        self.cells.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Entries that fell outside the visible rectangle, in insertion order.
    pub fn outside(&self) -> &[DepthEntry] {
        &self.outside
    }
}

impl Default for DepthBuckets {
    fn default() -> Self {
        Self::new()
    }
}

// ── Deferred bars ─────────────────────────────────────────────────────────────

/// Upper bound on deferred bar/label entries per frame.
pub const MAX_DEFERRED_BARS: usize = 96;

#[derive(Clone, Debug)]
pub struct DeferredBar {
    /// Screen position of the bar's anchor (above the entity sprite).
    pub screen: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub team: u8,
    pub entity: u64,
    pub label: String,
}

/// Fixed-capacity holding area for bar/label draws. Overflow drops the
/// newest entry and the frame continues.
pub struct DeferredBars {
    entries: Vec<DeferredBar>,
    dropped: u32,
}

impl DeferredBars {
    pub fn new() -> Self {
        Self { entries: Vec::with_capacity(MAX_DEFERRED_BARS), dropped: 0 }
    }

    pub fn clear(&mut self) {
        if self.dropped > 0 {
            log::warn!("deferred bar budget exceeded last frame, {} dropped", self.dropped);
        }
        self.entries.clear();
        self.dropped = 0;
    }

    pub fn push(&mut self, bar: DeferredBar) -> bool {
        if self.entries.len() >= MAX_DEFERRED_BARS {
            self.dropped += 1;
            return false;
        }
        self.entries.push(bar);
        true
    }

    pub fn entries(&self) -> &[DeferredBar] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DeferredBars {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_5x5() -> TileRect {
        TileRect { x0: 0, y0: 0, x1: 4, y1: 4 }
    }

    #[test]
    fn entries_route_to_their_cell() {
        let mut b = DepthBuckets::new();
        b.reset(rect_5x5());
        b.push(DepthEntry { cell: (2, 3), kind: DepthKind::Item(1) });
        b.push(DepthEntry { cell: (2, 3), kind: DepthKind::Player(9) });
        b.push(DepthEntry { cell: (0, 0), kind: DepthKind::LocalPlayer });
        assert_eq!(b.at((2, 3)).len(), 2);
        assert_eq!(b.at((0, 0)).len(), 1);
        assert!(b.at((4, 4)).is_empty());
        assert!(b.outside().is_empty());
    }

    #[test]
    fn out_of_rect_entries_collect_separately() {
        let mut b = DepthBuckets::new();
        b.reset(rect_5x5());
        b.push(DepthEntry { cell: (12, 0), kind: DepthKind::Projectile(5) });
        b.push(DepthEntry { cell: (-1, 2), kind: DepthKind::Item(2) });
        assert_eq!(b.outside().len(), 2);
    }

    #[test]
    fn reset_clears_previous_frame() {
        let mut b = DepthBuckets::new();
        b.reset(rect_5x5());
        b.push(DepthEntry { cell: (1, 1), kind: DepthKind::Item(1) });
        b.reset(rect_5x5());
        assert!(b.at((1, 1)).is_empty());
    }

    #[test]
    fn insertion_order_is_preserved_within_a_cell() {
        let mut b = DepthBuckets::new();
        b.reset(rect_5x5());
        b.push(DepthEntry { cell: (1, 1), kind: DepthKind::Item(7) });
        b.push(DepthEntry { cell: (1, 1), kind: DepthKind::Projectile(8) });
        let kinds: Vec<_> = b.at((1, 1)).iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds, vec![DepthKind::Item(7), DepthKind::Projectile(8)]);
    }

    #[test]
    fn deferred_bars_drop_newest_on_overflow() {
        let mut bars = DeferredBars::new();
        for i in 0..MAX_DEFERRED_BARS {
            assert!(bars.push(DeferredBar {
                screen: Vec2::ZERO,
                health: 50.0,
                max_health: 100.0,
                team: 0,
                entity: i as u64,
                label: String::new(),
            }));
        }
        assert!(!bars.push(DeferredBar {
            screen: Vec2::ZERO,
            health: 1.0,
            max_health: 1.0,
            team: 1,
            entity: 999,
            label: "late".into(),
        }));
        assert_eq!(bars.len(), MAX_DEFERRED_BARS);
        assert!(bars.entries().iter().all(|b| b.entity != 999));
    }
}
