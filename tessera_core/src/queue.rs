// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Priority-ordered walks over a layer's tiles.
//!
//! [`LayerRasterIter`] answers "what should be rastered next", most urgent
//! first. [`EvictionIter`] answers "what can be thrown away", cheapest to
//! lose first. Both snapshot the tile priorities at construction, so they
//! must be built after the frame's priority update and dropped before the
//! next one.

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::layer::PictureLayer;
use crate::tile::{PriorityBin, TileId, TilePriority, TileResolution, TileStore, TreePriority, WhichTree};
use crate::tiling::Tiling;
use crate::tree::TreeKind;

// ---------------------------------------------------------------------------
// Tiling raster iterator
// ---------------------------------------------------------------------------

/// Tiles of one tiling that still need raster, ordered by bin and then by
/// distance to the visible rect.
///
/// Tiles that are ready to draw or occluded on `tree` are skipped.
#[derive(Clone, Debug, Default)]
pub struct TilingRasterIter {
    tiles: Vec<(TileId, PriorityBin)>,
    next: usize,
}

impl TilingRasterIter {
    /// Collects the raster candidates of `tiling` under `tree`'s priorities.
    #[must_use]
    pub fn new(tiling: &Tiling, tree: WhichTree, tiles: &TileStore) -> Self {
        let mut candidates: Vec<(TileId, TilePriority)> = tiling
            .tiles()
            .map(|(_, id)| id)
            .filter(|&id| !tiles.draw_info(id).is_ready_to_draw() && !tiles.is_occluded(id, tree))
            .map(|id| (id, tiles.priority(id, tree)))
            .collect();
        candidates.sort_by(|(a_id, a), (b_id, b)| {
            a.bin
                .cmp(&b.bin)
                .then(a.distance_to_visible.total_cmp(&b.distance_to_visible))
                .then(a_id.cmp(b_id))
        });
        Self {
            tiles: candidates.into_iter().map(|(id, p)| (id, p.bin)).collect(),
            next: 0,
        }
    }

    /// Bin of the next tile, or `None` when exhausted.
    #[must_use]
    pub fn bin(&self) -> Option<PriorityBin> {
        self.tiles.get(self.next).map(|&(_, bin)| bin)
    }
}

impl Iterator for TilingRasterIter {
    type Item = TileId;

    fn next(&mut self) -> Option<TileId> {
        let (id, _) = *self.tiles.get(self.next)?;
        self.next += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.tiles.len() - self.next;
        (n, Some(n))
    }
}

// ---------------------------------------------------------------------------
// Layer raster iterator
// ---------------------------------------------------------------------------

/// One tile handed out by [`LayerRasterIter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterCandidate {
    /// The tile.
    pub tile: TileId,
    /// Resolution of the tiling it came from.
    pub resolution: TileResolution,
    /// Its bin on the layer's tree.
    pub bin: PriorityBin,
}

/// Raster work for one layer in four stages.
///
/// With `prioritize_low_res` the stages are low-res NOW, high-res NOW,
/// high-res SOON, high-res EVENTUALLY; without it the first two swap and the
/// low-res tiling is not consulted at all. Empty stages are skipped. Layers
/// without tilings, on the recycle tree, or not drawn produce nothing.
#[derive(Clone, Debug, Default)]
pub struct LayerRasterIter {
    tiles: Vec<RasterCandidate>,
    next: usize,
}

impl LayerRasterIter {
    /// Builds the stage order for `layer` on `tree`.
    #[must_use]
    pub fn new(layer: &PictureLayer, tree: TreeKind, tiles: &TileStore, prioritize_low_res: bool) -> Self {
        if layer.tilings().is_empty() || !layer.has_valid_tile_priorities(tree) {
            return Self::empty();
        }
        let which = match tree {
            TreeKind::Pending => WhichTree::Pending,
            TreeKind::Active | TreeKind::Recycle => WhichTree::Active,
        };
        let collect = |resolution: TileResolution| {
            layer
                .tilings()
                .find_tiling_with_resolution(resolution)
                .map(|tiling| {
                    let mut iter = TilingRasterIter::new(tiling, which, tiles);
                    let mut out = Vec::new();
                    while let Some(bin) = iter.bin() {
                        let Some(tile) = iter.next() else { break };
                        out.push(RasterCandidate {
                            tile,
                            resolution,
                            bin,
                        });
                    }
                    out
                })
                .unwrap_or_default()
        };
        let high = collect(TileResolution::High);
        let low = if prioritize_low_res {
            collect(TileResolution::Low)
        } else {
            Vec::new()
        };

        let (first, second) = if prioritize_low_res {
            (&low, &high)
        } else {
            (&high, &low)
        };
        let stages = [
            (first, PriorityBin::Now),
            (second, PriorityBin::Now),
            (&high, PriorityBin::Soon),
            (&high, PriorityBin::Eventually),
        ];
        let mut ordered = Vec::new();
        for (source, bin) in stages {
            ordered.extend(source.iter().filter(|c| c.bin == bin).copied());
        }
        Self {
            tiles: ordered,
            next: 0,
        }
    }

    /// An iterator that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The next candidate without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&RasterCandidate> {
        self.tiles.get(self.next)
    }
}

impl Iterator for LayerRasterIter {
    type Item = RasterCandidate;

    fn next(&mut self) -> Option<RasterCandidate> {
        let candidate = *self.tiles.get(self.next)?;
        self.next += 1;
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.tiles.len() - self.next;
        (n, Some(n))
    }
}

// ---------------------------------------------------------------------------
// Eviction iterator
// ---------------------------------------------------------------------------

/// Where a tiling sits relative to the layer's ideal tilings; earlier
/// variants are evicted first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvictionCategory {
    /// Scale above the high-res tiling.
    HigherThanHighRes,
    /// Scale below the low-res tiling.
    LowerThanLowRes,
    /// Between the low-res and high-res tilings.
    BetweenHighAndLowRes,
    /// The low-res tiling.
    LowRes,
    /// The high-res tiling.
    HighRes,
}

/// Tiles holding raster resources, cheapest to lose first.
///
/// Order: tiling category, then bin from EVENTUALLY to NOW, then tiles no
/// tree requires before required ones, then farthest from the visible rect
/// first. Priorities are read through `tree_priority`, so a tile the twin
/// still needs ranks by the twin's use too.
#[derive(Clone, Debug, Default)]
pub struct EvictionIter {
    tiles: Vec<TileId>,
    next: usize,
}

impl EvictionIter {
    /// Collects eviction candidates from every tiling of `layer`.
    #[must_use]
    pub fn new(layer: &PictureLayer, tiles: &TileStore, tree_priority: TreePriority) -> Self {
        let set = layer.tilings();
        let high = set
            .find_tiling_with_resolution(TileResolution::High)
            .map(Tiling::contents_scale);
        let low = set
            .find_tiling_with_resolution(TileResolution::Low)
            .map(Tiling::contents_scale);

        struct Entry {
            tile: TileId,
            category: EvictionCategory,
            priority: TilePriority,
            required: bool,
        }
        let mut entries: Vec<Entry> = Vec::new();
        for tiling in set.iter() {
            let category = eviction_category(tiling, high, low);
            for (_, tile) in tiling.tiles() {
                if !tiles.draw_info(tile).has_resource() {
                    continue;
                }
                entries.push(Entry {
                    tile,
                    category,
                    priority: tiles.priority_for(tile, tree_priority),
                    required: tiles.required_for_activation(tile) || tiles.required_for_draw(tile),
                });
            }
        }
        entries.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(b.priority.bin.cmp(&a.priority.bin))
                .then(a.required.cmp(&b.required))
                .then(
                    b.priority
                        .distance_to_visible
                        .total_cmp(&a.priority.distance_to_visible),
                )
                .then(a.tile.cmp(&b.tile))
        });
        Self {
            tiles: entries.into_iter().map(|e| e.tile).collect(),
            next: 0,
        }
    }

    /// An iterator that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Iterator for EvictionIter {
    type Item = TileId;

    fn next(&mut self) -> Option<TileId> {
        let id = *self.tiles.get(self.next)?;
        self.next += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.tiles.len() - self.next;
        (n, Some(n))
    }
}

fn eviction_category(tiling: &Tiling, high: Option<f64>, low: Option<f64>) -> EvictionCategory {
    match tiling.resolution() {
        TileResolution::High => return EvictionCategory::HighRes,
        TileResolution::Low => return EvictionCategory::LowRes,
        TileResolution::NonIdeal => {}
    }
    let scale = tiling.contents_scale();
    if high.is_some_and(|h| scale > h) {
        return EvictionCategory::HigherThanHighRes;
    }
    let floor = low.or(high);
    match floor.map(|f| scale.partial_cmp(&f)) {
        Some(Some(Ordering::Less)) => EvictionCategory::LowerThanLowRes,
        _ => EvictionCategory::BetweenHighAndLowRes,
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use kurbo::{Rect, Size};

    use super::*;
    use crate::layer::{DrawProperties, LayerId};
    use crate::raster_source::RasterSource;
    use crate::settings::TilingSettings;
    use crate::tile::{DrawInfo, ResourceKey};
    use crate::trace::Tracer;
    use crate::tree::{LayerUpdate, TreeHost};

    const ID: LayerId = LayerId(2);

    fn host(visible: Rect) -> TreeHost {
        let mut host = TreeHost::new(TilingSettings::desktop());
        let source = RasterSource::fully_recorded(Size::new(2000.0, 2000.0)).shared();
        host.commit(1, [LayerUpdate::new(ID, source)], &mut Tracer::none());
        host.set_draw_properties(
            TreeKind::Pending,
            ID,
            DrawProperties {
                visible_content_rect: visible,
                ..DrawProperties::default()
            },
        );
        host.update_all_tiles(TreeKind::Pending, &mut Tracer::none());
        host
    }

    #[test]
    fn tiling_iter_orders_by_bin_then_distance() {
        let host = host(Rect::new(0.0, 0.0, 300.0, 300.0));
        let layer = host.layer(TreeKind::Pending, ID).unwrap();
        let tiling = layer.tilings().tiling_at(0);
        let mut iter = TilingRasterIter::new(tiling, WhichTree::Pending, host.tiles());
        let mut last = (PriorityBin::Now, 0.0);
        let mut count = 0;
        while let Some(bin) = iter.bin() {
            let tile = iter.next().unwrap();
            let p = host.tiles().priority(tile, WhichTree::Pending);
            assert_eq!(p.bin, bin);
            assert!(
                (p.bin, p.distance_to_visible) >= last,
                "tile {tile:?} out of order"
            );
            last = (p.bin, p.distance_to_visible);
            count += 1;
        }
        assert_eq!(count, tiling.num_tiles());
        assert!(iter.next().is_none());
    }

    #[test]
    fn ready_tiles_are_not_rastered_again() {
        let mut host = host(Rect::new(0.0, 0.0, 300.0, 300.0));
        let first = host.raster_iter(TreeKind::Pending, ID, false).next().unwrap();
        host.notify_tile_ready(first.tile, DrawInfo::PictureFallback);
        assert!(
            host.raster_iter(TreeKind::Pending, ID, false)
                .all(|c| c.tile != first.tile)
        );
    }

    #[test]
    fn layer_iter_stages() {
        let host = host(Rect::new(0.0, 0.0, 300.0, 300.0));
        let stages = |prioritize_low_res| {
            let mut seen: Vec<(TileResolution, PriorityBin)> = Vec::new();
            for c in host.raster_iter(TreeKind::Pending, ID, prioritize_low_res) {
                if seen.last() != Some(&(c.resolution, c.bin)) {
                    seen.push((c.resolution, c.bin));
                }
            }
            seen
        };
        assert_eq!(
            stages(true),
            vec![
                (TileResolution::Low, PriorityBin::Now),
                (TileResolution::High, PriorityBin::Now),
                (TileResolution::High, PriorityBin::Soon),
                (TileResolution::High, PriorityBin::Eventually),
            ]
        );
        assert_eq!(
            stages(false),
            vec![
                (TileResolution::High, PriorityBin::Now),
                (TileResolution::High, PriorityBin::Soon),
                (TileResolution::High, PriorityBin::Eventually),
            ]
        );
    }

    #[test]
    fn layer_iter_empty_without_valid_priorities() {
        let mut host = host(Rect::new(0.0, 0.0, 300.0, 300.0));
        host.set_draw_properties(
            TreeKind::Pending,
            ID,
            DrawProperties {
                is_drawn: false,
                ..DrawProperties::default()
            },
        );
        assert_eq!(host.raster_iter(TreeKind::Pending, ID, true).count(), 0);
        assert_eq!(host.raster_iter(TreeKind::Pending, LayerId(99), true).count(), 0);
    }

    #[test]
    fn eviction_prefers_low_value_tiles() {
        let mut host = host(Rect::new(0.0, 0.0, 300.0, 300.0));
        let ids: Vec<TileId> = host.tiles().iter().collect();
        for (n, id) in ids.iter().enumerate() {
            host.notify_tile_ready(
                *id,
                DrawInfo::Resource {
                    resource: ResourceKey(n as u64),
                    contents_swizzled: false,
                },
            );
        }
        let layer = host.layer(TreeKind::Pending, ID).unwrap();
        let order: Vec<TileId> = host
            .eviction_iter(TreeKind::Pending, ID, TreePriority::NewContentTakesPriority)
            .collect();
        assert_eq!(order.len(), ids.len());

        let category = |tile: TileId| {
            let scale = host.tiles().request(tile).contents_scale;
            let tiling = layer.tilings().find_tiling_with_scale(scale).unwrap();
            tiling.resolution()
        };
        // Low-res tiles go before high-res ones.
        let first_high = order
            .iter()
            .position(|&t| category(t) == TileResolution::High)
            .unwrap();
        assert!(order[..first_high].iter().all(|&t| category(t) == TileResolution::Low));

        // Within high-res, the visible tiles go last.
        let last = *order.last().unwrap();
        let p = host.tiles().priority(last, WhichTree::Pending);
        assert_eq!(p.bin, PriorityBin::Now);
        assert!(host.tiles().required_for_activation(last));
    }

    #[test]
    fn eviction_skips_tiles_without_resources() {
        let mut host = host(Rect::new(0.0, 0.0, 300.0, 300.0));
        let tile = host.tiles().iter().next().unwrap();
        host.notify_tile_ready(tile, DrawInfo::PictureFallback);
        assert_eq!(
            host.eviction_iter(TreeKind::Pending, ID, TreePriority::SamePriorityForBothTrees)
                .count(),
            0
        );
    }

    #[test]
    fn eviction_categories() {
        let mut set = crate::tiling_set::TilingSet::new();
        let bounds = Size::new(100.0, 100.0);
        let tile = Size::new(64.0, 64.0);
        for scale in [4.0, 2.0, 1.0, 0.5, 0.25, 0.1] {
            set.add_tiling(scale, bounds, tile);
        }
        set.tiling_at_mut(2).set_resolution(TileResolution::High);
        set.tiling_at_mut(4).set_resolution(TileResolution::Low);
        let categories: Vec<EvictionCategory> = set
            .iter()
            .map(|t| eviction_category(t, Some(1.0), Some(0.25)))
            .collect();
        assert_eq!(
            categories,
            vec![
                EvictionCategory::HigherThanHighRes,
                EvictionCategory::HigherThanHighRes,
                EvictionCategory::HighRes,
                EvictionCategory::BetweenHighAndLowRes,
                EvictionCategory::LowRes,
                EvictionCategory::LowerThanLowRes,
            ]
        );
    }
}
