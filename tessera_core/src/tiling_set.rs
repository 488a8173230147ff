// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tilings of one layer, ordered by contents scale.
//!
//! A [`TilingSet`] keeps its tilings sorted from the highest contents scale
//! to the lowest, with no two at the same scale. Besides bookkeeping it
//! answers coverage queries across scales: the tiling closest to the ideal
//! scale is tried first, and holes fall through to the other tilings before
//! being reported as missing.

use alloc::vec;
use alloc::vec::Vec;

use kurbo::{Rect, Size};

use crate::geometry::{self, Region};
use crate::tile::{TileId, TileResolution, TileStore};
use crate::tiling::{PriorityParams, TileContext, Tiling, TilingCoverageIter};

/// Tilings of one layer, highest scale first.
#[derive(Clone, Debug, Default)]
pub struct TilingSet {
    tilings: Vec<Tiling>,
}

impl TilingSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tilings: Vec::new(),
        }
    }

    /// Returns `true` if the set has no tilings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tilings.is_empty()
    }

    /// Number of tilings.
    #[must_use]
    pub fn num_tilings(&self) -> usize {
        self.tilings.len()
    }

    /// Tiling at `index` in scale order.
    #[must_use]
    pub fn tiling_at(&self, index: usize) -> &Tiling {
        &self.tilings[index]
    }

    /// Mutable tiling at `index`.
    pub fn tiling_at_mut(&mut self, index: usize) -> &mut Tiling {
        &mut self.tilings[index]
    }

    /// All tilings, highest scale first.
    pub fn iter(&self) -> impl Iterator<Item = &Tiling> + '_ {
        self.tilings.iter()
    }

    /// Every tile held by any tiling of the set.
    pub fn tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tilings
            .iter()
            .flat_map(|t| t.tiles().map(|(_, id)| id))
    }

    /// Adds an empty tiling and returns its index.
    ///
    /// # Panics
    ///
    /// Panics if a tiling with exactly this scale already exists.
    pub fn add_tiling(&mut self, contents_scale: f64, layer_bounds: Size, tile_size: Size) -> usize {
        assert!(
            self.find_tiling_index_with_scale(contents_scale).is_none(),
            "tiling at scale {contents_scale} already exists"
        );
        let index = self
            .tilings
            .iter()
            .position(|t| t.contents_scale() < contents_scale)
            .unwrap_or(self.tilings.len());
        self.tilings
            .insert(index, Tiling::new(contents_scale, layer_bounds, tile_size));
        index
    }

    /// Removes the tiling at `index`, releasing its tiles.
    pub fn remove_tiling_at(&mut self, index: usize, tiles: &mut TileStore) {
        let mut tiling = self.tilings.remove(index);
        tiling.reset(tiles);
    }

    /// Removes the tiling at `contents_scale`, if present.
    pub fn remove_tiling_with_scale(&mut self, contents_scale: f64, tiles: &mut TileStore) -> bool {
        match self.find_tiling_index_with_scale(contents_scale) {
            Some(index) => {
                self.remove_tiling_at(index, tiles);
                true
            }
            None => false,
        }
    }

    /// Removes every tiling.
    pub fn remove_all_tilings(&mut self, tiles: &mut TileStore) {
        for mut tiling in self.tilings.drain(..) {
            tiling.reset(tiles);
        }
    }

    /// Index of the tiling at exactly `contents_scale`.
    #[must_use]
    pub fn find_tiling_index_with_scale(&self, contents_scale: f64) -> Option<usize> {
        self.tilings
            .iter()
            .position(|t| t.contents_scale() == contents_scale)
    }

    /// The tiling at exactly `contents_scale`.
    #[must_use]
    pub fn find_tiling_with_scale(&self, contents_scale: f64) -> Option<&Tiling> {
        self.find_tiling_index_with_scale(contents_scale)
            .map(|i| &self.tilings[i])
    }

    /// Index of the first tiling with `resolution`.
    #[must_use]
    pub fn find_tiling_index_with_resolution(&self, resolution: TileResolution) -> Option<usize> {
        self.tilings
            .iter()
            .position(|t| t.resolution() == resolution)
    }

    /// The first tiling with `resolution`.
    #[must_use]
    pub fn find_tiling_with_resolution(&self, resolution: TileResolution) -> Option<&Tiling> {
        self.find_tiling_index_with_resolution(resolution)
            .map(|i| &self.tilings[i])
    }

    /// Demotes every tiling to [`TileResolution::NonIdeal`].
    pub fn mark_all_tilings_non_ideal(&mut self) {
        for tiling in &mut self.tilings {
            tiling.set_resolution(TileResolution::NonIdeal);
        }
    }

    /// Number of tilings marked high resolution.
    #[must_use]
    pub fn num_high_res_tilings(&self) -> usize {
        self.tilings
            .iter()
            .filter(|t| t.resolution() == TileResolution::High)
            .count()
    }

    /// Scale of the existing tiling nearest to `start_scale` within
    /// `snap_ratio`, or `start_scale` when none is close enough.
    #[must_use]
    pub fn snapped_contents_scale(&self, start_scale: f64, snap_ratio: f64) -> f64 {
        let mut snapped = start_scale;
        let mut best_ratio = snap_ratio;
        for tiling in &self.tilings {
            let scale = tiling.contents_scale();
            let ratio = (scale / start_scale).max(start_scale / scale);
            if ratio < best_ratio {
                snapped = scale;
                best_ratio = ratio;
            }
        }
        snapped
    }

    /// Largest tiling scale, or zero for an empty set.
    #[must_use]
    pub fn maximum_contents_scale(&self) -> f64 {
        self.tilings.first().map_or(0.0, Tiling::contents_scale)
    }

    /// Drops tiles touching a layer-space region from every tiling.
    pub fn remove_tiles_in_region(&mut self, region: &Region, tiles: &mut TileStore) {
        if region.is_empty() {
            return;
        }
        for tiling in &mut self.tilings {
            tiling.remove_tiles_in_region(region, tiles);
        }
    }

    /// Removes `tile` from whichever tiling holds it.
    pub fn remove_tile(&mut self, tile: TileId, tiles: &mut TileStore) -> bool {
        let scale = tiles.request(tile).contents_scale;
        match self.find_tiling_index_with_scale(scale) {
            Some(index) => self.tilings[index].remove_tile(tile, tiles),
            None => false,
        }
    }

    /// Removes tilings outside `[min_scale, max_scale]` that were not used
    /// to draw.
    ///
    /// Low-resolution tilings survive when `keep_low_res` is set, including
    /// a tiling at the twin's low-res scale. Every removed scale is removed
    /// from `recycled_twin` too.
    pub fn clean_up_tilings(
        &mut self,
        min_scale: f64,
        max_scale: f64,
        used_scales: &[f64],
        keep_low_res: bool,
        twin: Option<&Self>,
        recycled_twin: Option<&mut Self>,
        tiles: &mut TileStore,
    ) {
        let twin_low_res_scale = twin
            .and_then(|t| t.find_tiling_with_resolution(TileResolution::Low))
            .map(Tiling::contents_scale);
        let doomed: Vec<f64> = self
            .tilings
            .iter()
            .filter(|t| {
                let scale = t.contents_scale();
                if scale >= min_scale && scale <= max_scale {
                    return false;
                }
                if keep_low_res
                    && (t.resolution() == TileResolution::Low || twin_low_res_scale == Some(scale))
                {
                    return false;
                }
                !used_scales.contains(&scale)
            })
            .map(Tiling::contents_scale)
            .collect();
        if let Some(recycled) = recycled_twin {
            for &scale in &doomed {
                recycled.remove_tiling_with_scale(scale, tiles);
            }
        }
        for scale in doomed {
            self.remove_tiling_with_scale(scale, tiles);
        }
    }

    /// Mirrors the twin's tilings onto this set.
    ///
    /// Tilings missing from the twin or below `minimum_scale` are removed.
    /// Twin tilings at or above the minimum are created or updated here
    /// with the twin's resolution; existing ones are resized and lose the
    /// tiles `invalidation` touches. `tile_size` maps a tiling's content
    /// bounds to its cell size. Returns whether the twin's high-res tiling
    /// was mirrored.
    pub fn sync_tilings(
        &mut self,
        twin: &Self,
        layer_bounds: Size,
        tile_size: impl Fn(Size) -> Size,
        invalidation: &Region,
        minimum_scale: f64,
        tiles: &mut TileStore,
    ) -> bool {
        if geometry::is_empty_size(layer_bounds) {
            self.remove_all_tilings(tiles);
            return false;
        }

        let stale: Vec<f64> = self
            .tilings
            .iter()
            .map(Tiling::contents_scale)
            .filter(|&s| s < minimum_scale || twin.find_tiling_with_scale(s).is_none())
            .collect();
        for scale in stale {
            self.remove_tiling_with_scale(scale, tiles);
        }

        let mut have_high_res = false;
        for twin_tiling in &twin.tilings {
            let scale = twin_tiling.contents_scale();
            if scale < minimum_scale {
                continue;
            }
            let cell = tile_size(geometry::ceiled_size(layer_bounds, scale));
            let index = match self.find_tiling_index_with_scale(scale) {
                Some(index) => {
                    self.tilings[index].update_tiles_to_current_raster_source(
                        layer_bounds,
                        cell,
                        invalidation,
                        tiles,
                    );
                    index
                }
                None => self.add_tiling(scale, layer_bounds, cell),
            };
            self.tilings[index].set_resolution(twin_tiling.resolution());
            have_high_res |= twin_tiling.resolution() == TileResolution::High;
        }
        have_high_res
    }

    /// Adapts every tiling to new layer bounds and invalidation, with cell
    /// sizes from `tile_size`.
    pub fn update_tilings_to_current_raster_source(
        &mut self,
        layer_bounds: Size,
        tile_size: impl Fn(Size) -> Size,
        invalidation: &Region,
        tiles: &mut TileStore,
    ) {
        for tiling in &mut self.tilings {
            let cell = tile_size(geometry::ceiled_size(layer_bounds, tiling.contents_scale()));
            tiling.update_tiles_to_current_raster_source(layer_bounds, cell, invalidation, tiles);
        }
    }

    /// Updates tile priorities on every tiling. Returns whether any tiling
    /// changed.
    pub fn update_tile_priorities(
        &mut self,
        params: &PriorityParams<'_>,
        tiles: &mut TileStore,
        ctx: &TileContext<'_>,
    ) -> bool {
        let mut updated = false;
        for tiling in &mut self.tilings {
            updated |= tiling.update_tile_priorities(params, tiles, ctx);
        }
        updated
    }

    /// Moves the pending priorities of every tile onto the active slot.
    pub fn did_become_active(&self, tiles: &mut TileStore) {
        for tile in self.tiles() {
            tiles.did_become_active(tile);
        }
    }

    /// Clears the active priorities of every tile.
    pub fn did_become_recycled(&self, tiles: &mut TileStore) {
        for tile in self.tiles() {
            tiles.did_become_recycled(tile);
        }
    }

    /// Covers `coverage_rect`, a rect in content space at `coverage_scale`,
    /// with ready tiles from every tiling, starting at the tiling closest
    /// to `ideal_scale`.
    #[must_use]
    pub fn coverage<'a>(
        &'a self,
        tiles: &'a TileStore,
        coverage_scale: f64,
        coverage_rect: Rect,
        ideal_scale: f64,
    ) -> SetCoverageIter<'a> {
        SetCoverageIter::new(self, tiles, coverage_scale, coverage_rect, ideal_scale)
    }
}

// ---------------------------------------------------------------------------
// Coverage across tilings
// ---------------------------------------------------------------------------

/// One piece of a set coverage query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetCoverage {
    /// Part of the query rect this piece draws.
    pub geometry_rect: Rect,
    /// Tile to draw, or `None` where no tiling had a ready tile.
    pub tile: Option<TileId>,
    /// Index of the source tiling in the set.
    pub tiling_index: Option<usize>,
    /// Contents scale of the source tiling.
    pub contents_scale: Option<f64>,
    /// Resolution of the source tiling.
    pub resolution: Option<TileResolution>,
    /// Geometry in the tile's texture space.
    pub texture_rect: Rect,
    /// Tile texture size.
    pub texture_size: Size,
}

/// Coverage of a rect by the ready tiles of several tilings.
///
/// Tilings are tried in this order: the ideal tiling (smallest scale at or
/// above the ideal scale, else the largest), then the higher-scale tilings
/// nearest first, then the lower-scale tilings nearest first. Pieces no
/// tiling could fill are yielded last with `tile: None`.
#[derive(Clone, Debug)]
pub struct SetCoverageIter<'a> {
    set: &'a TilingSet,
    tiles: &'a TileStore,
    coverage_scale: f64,
    order: Vec<usize>,
    position: usize,
    current_region: Vec<Rect>,
    missing_region: Vec<Rect>,
    tiling_iter: Option<TilingCoverageIter<'a>>,
}

impl<'a> SetCoverageIter<'a> {
    fn new(
        set: &'a TilingSet,
        tiles: &'a TileStore,
        coverage_scale: f64,
        coverage_rect: Rect,
        ideal_scale: f64,
    ) -> Self {
        let coverage_rect = match set.tilings.first() {
            Some(t) => geometry::intersect(
                coverage_rect,
                geometry::rect_from_size(geometry::ceiled_size(t.layer_bounds(), coverage_scale)),
            ),
            None => coverage_rect,
        };
        let n = set.tilings.len();
        let ideal = set
            .tilings
            .iter()
            .rposition(|t| t.contents_scale() >= ideal_scale)
            .unwrap_or(0);
        let order = if n == 0 {
            Vec::new()
        } else {
            core::iter::once(ideal)
                .chain((0..ideal).rev())
                .chain(ideal + 1..n)
                .collect()
        };
        Self {
            set,
            tiles,
            coverage_scale,
            order,
            position: 0,
            current_region: if geometry::is_empty(coverage_rect) {
                Vec::new()
            } else {
                vec![coverage_rect]
            },
            missing_region: Vec::new(),
            tiling_iter: None,
        }
    }

    fn current_tiling(&self) -> Option<usize> {
        self.order.get(self.position).copied()
    }
}

impl Iterator for SetCoverageIter<'_> {
    type Item = SetCoverage;

    fn next(&mut self) -> Option<SetCoverage> {
        loop {
            if let Some(iter) = &mut self.tiling_iter {
                for piece in iter.by_ref() {
                    let ready = piece
                        .tile
                        .is_some_and(|t| self.tiles.draw_info(t).is_ready_to_draw());
                    if !ready {
                        self.missing_region.push(piece.geometry_rect);
                        continue;
                    }
                    let index = self.order[self.position];
                    let tiling = &self.set.tilings[index];
                    return Some(SetCoverage {
                        geometry_rect: piece.geometry_rect,
                        tile: piece.tile,
                        tiling_index: Some(index),
                        contents_scale: Some(tiling.contents_scale()),
                        resolution: Some(tiling.resolution()),
                        texture_rect: piece.texture_rect,
                        texture_size: piece.texture_size,
                    });
                }
                self.tiling_iter = None;
            }

            if self.current_region.is_empty() {
                if self.missing_region.is_empty() {
                    return None;
                }
                // This tiling is done; its holes go to the next one.
                if self.position < self.order.len() {
                    self.position += 1;
                }
                core::mem::swap(&mut self.current_region, &mut self.missing_region);
            }

            let rect = self.current_region.pop()?;
            match self.current_tiling() {
                Some(index) => {
                    self.tiling_iter =
                        Some(self.set.tilings[index].coverage(self.coverage_scale, rect));
                }
                None => {
                    return Some(SetCoverage {
                        geometry_rect: rect,
                        tile: None,
                        tiling_index: None,
                        contents_scale: None,
                        resolution: None,
                        texture_rect: Rect::ZERO,
                        texture_size: Size::ZERO,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::layer::LayerId;
    use crate::raster_source::{Color, RasterSource};
    use crate::tile::{DrawInfo, TileRequest};

    const TILE: Size = Size::new(100.0, 100.0);

    fn fill(tiling: &mut Tiling, tiles: &mut TileStore, src: &Arc<RasterSource>, ready: bool) {
        let data = *tiling.tiling_data();
        for j in 0..data.num_tiles_y() {
            for i in 0..data.num_tiles_x() {
                let id = tiles.create(TileRequest {
                    raster_source: Arc::clone(src),
                    content_rect: data.tile_bounds(i, j),
                    contents_scale: tiling.contents_scale(),
                    layer: LayerId(1),
                    source_frame_number: 1,
                    tiling_index: (i, j),
                    use_picture_analysis: true,
                });
                if ready {
                    tiles.complete_raster(id, DrawInfo::SolidColor(Color::WHITE));
                }
                tiling.insert_tile_for_test(i, j, id);
            }
        }
    }

    #[test]
    fn tilings_stay_sorted_descending() {
        let mut set = TilingSet::new();
        let bounds = Size::new(100.0, 100.0);
        set.add_tiling(1.0, bounds, TILE);
        set.add_tiling(4.0, bounds, TILE);
        set.add_tiling(0.25, bounds, TILE);
        set.add_tiling(2.0, bounds, TILE);
        let scales: Vec<f64> = set.iter().map(Tiling::contents_scale).collect();
        assert_eq!(scales, [4.0, 2.0, 1.0, 0.25]);
        assert_eq!(set.maximum_contents_scale(), 4.0);
        assert!(set.find_tiling_with_scale(2.0).is_some());
        assert!(set.find_tiling_with_scale(2.000_001).is_none());
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn duplicate_scale_panics() {
        let mut set = TilingSet::new();
        set.add_tiling(1.0, Size::new(10.0, 10.0), TILE);
        set.add_tiling(1.0, Size::new(10.0, 10.0), TILE);
    }

    #[test]
    fn snapping_picks_nearest_within_ratio() {
        let mut set = TilingSet::new();
        let bounds = Size::new(10.0, 10.0);
        set.add_tiling(1.0, bounds, TILE);
        set.add_tiling(2.0, bounds, TILE);
        assert_eq!(set.snapped_contents_scale(1.9, 1.2), 2.0);
        assert_eq!(set.snapped_contents_scale(1.1, 1.2), 1.0);
        assert_eq!(set.snapped_contents_scale(1.5, 1.2), 1.5);
        // A looser tolerance reaches further.
        assert_eq!(set.snapped_contents_scale(1.5, 1.5), 1.0);
    }

    #[test]
    fn coverage_falls_back_to_other_tilings() {
        let mut tiles = TileStore::new();
        let bounds = Size::new(200.0, 200.0);
        let src = RasterSource::fully_recorded(bounds).shared();
        let mut set = TilingSet::new();
        set.add_tiling(1.0, bounds, TILE);
        set.add_tiling(0.5, bounds, TILE);
        fill(set.tiling_at_mut(1), &mut tiles, &src, true);
        fill(set.tiling_at_mut(0), &mut tiles, &src, false);
        // Make one high-res tile ready.
        let ready = set.tiling_at(0).tile_at(1, 1).unwrap();
        tiles.complete_raster(ready, DrawInfo::SolidColor(Color::WHITE));

        let rect = Rect::new(0.0, 0.0, 200.0, 200.0);
        let pieces: Vec<_> = set.coverage(&tiles, 1.0, rect, 1.0).collect();
        let area: f64 = pieces.iter().map(|p| p.geometry_rect.area()).sum();
        assert_eq!(area, rect.area());
        let high: Vec<_> = pieces.iter().filter(|p| p.contents_scale == Some(1.0)).collect();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].tile, Some(ready));
        assert!(pieces.iter().all(|p| p.tile.is_some()));
    }

    #[test]
    fn coverage_partitions_across_many_tilings() {
        let mut tiles = TileStore::new();
        let bounds = Size::new(333.0, 251.0);
        let src = RasterSource::fully_recorded(bounds).shared();
        for &ideal in &[0.3, 1.0, 1.7, 4.0] {
            let mut set = TilingSet::new();
            for (k, &scale) in [0.33, 0.8, 1.0, 2.5].iter().enumerate() {
                let index = set.add_tiling(scale, bounds, Size::new(64.0, 48.0));
                // Every other tiling is ready.
                fill(set.tiling_at_mut(index), &mut tiles, &src, k % 2 == 0);
            }
            for &coverage_scale in &[1.0, 0.5, 2.0] {
                let full = geometry::rect_from_size(geometry::ceiled_size(bounds, coverage_scale));
                let pieces: Vec<_> = set.coverage(&tiles, coverage_scale, full, ideal).collect();
                for (n, a) in pieces.iter().enumerate() {
                    for b in &pieces[n + 1..] {
                        assert!(
                            !geometry::overlaps(a.geometry_rect, b.geometry_rect),
                            "overlap at ideal {ideal} coverage scale {coverage_scale}"
                        );
                    }
                }
                let area: f64 = pieces.iter().map(|p| p.geometry_rect.area()).sum();
                assert_eq!(area, full.area(), "ideal {ideal} coverage scale {coverage_scale}");
            }
            set.remove_all_tilings(&mut tiles);
        }
        assert!(tiles.is_empty());
    }

    #[test]
    fn coverage_reports_missing_without_tiles() {
        let tiles = TileStore::new();
        let mut set = TilingSet::new();
        set.add_tiling(1.0, Size::new(150.0, 150.0), TILE);
        let pieces: Vec<_> = set
            .coverage(&tiles, 1.0, Rect::new(0.0, 0.0, 150.0, 150.0), 1.0)
            .collect();
        assert!(pieces.iter().all(|p| p.tile.is_none() && p.tiling_index.is_none()));
        let area: f64 = pieces.iter().map(|p| p.geometry_rect.area()).sum();
        assert_eq!(area, 150.0 * 150.0);
    }

    #[test]
    fn sync_mirrors_twin_and_applies_invalidation() {
        let mut tiles = TileStore::new();
        let bounds = Size::new(400.0, 400.0);
        let src = RasterSource::fully_recorded(bounds).shared();
        let mut active = TilingSet::new();
        let hi = active.add_tiling(1.0, bounds, TILE);
        active.tiling_at_mut(hi).set_resolution(TileResolution::High);
        let lo = active.add_tiling(0.25, bounds, TILE);
        active.tiling_at_mut(lo).set_resolution(TileResolution::Low);
        fill(active.tiling_at_mut(0), &mut tiles, &src, true);

        let mut pending = TilingSet::new();
        pending.add_tiling(3.0, bounds, TILE);
        let synced = pending.sync_tilings(&active, bounds, |_| TILE, &Region::new(), 0.0625, &mut tiles);
        assert!(synced);
        let scales: Vec<f64> = pending.iter().map(Tiling::contents_scale).collect();
        assert_eq!(scales, [1.0, 0.25]);
        assert_eq!(pending.num_high_res_tilings(), 1);
        assert_eq!(
            pending.find_tiling_with_scale(0.25).map(Tiling::resolution),
            Some(TileResolution::Low)
        );

        // Below the minimum scale nothing high-res survives.
        let synced = pending.sync_tilings(&active, bounds, |_| TILE, &Region::new(), 2.0, &mut tiles);
        assert!(!synced);
        assert!(pending.is_empty());
        assert_eq!(active.tiling_at(0).num_tiles(), 16);
    }

    #[test]
    fn cleanup_keeps_band_used_and_low_res() {
        let mut tiles = TileStore::new();
        let bounds = Size::new(10.0, 10.0);
        let mut set = TilingSet::new();
        for s in [4.0, 2.0, 1.0, 0.5, 0.25] {
            set.add_tiling(s, bounds, TILE);
        }
        let low = set.find_tiling_index_with_scale(0.25).unwrap();
        set.tiling_at_mut(low).set_resolution(TileResolution::Low);
        let mut recycled = TilingSet::new();
        recycled.add_tiling(4.0, bounds, TILE);
        set.clean_up_tilings(1.0, 2.0, &[0.5], true, None, Some(&mut recycled), &mut tiles);
        let scales: Vec<f64> = set.iter().map(Tiling::contents_scale).collect();
        assert_eq!(scales, [2.0, 1.0, 0.5, 0.25]);
        assert!(recycled.is_empty());
    }
}
