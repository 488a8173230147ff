// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One tiling: a tile grid over a layer at a fixed contents scale.
//!
//! Tiles are created lazily. Each priority update recomputes four nested
//! rects in the tiling's content space:
//!
//! ```text
//!   eventually ⊇ soon border ∪ skewport ⊇ visible
//! ```
//!
//! The eventually rect doubles as the live-tiles rect: cells inside it get a
//! tile (when the raster source covers them), cells outside lose theirs.
//! Every live tile then receives a [`TilePriority`] for the tree that owns
//! the tiling.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Rect, Size, Vec2};

use crate::geometry::{self, Region};
use crate::layer::LayerId;
use crate::occlusion::Occlusion;
use crate::raster_source::RasterSource;
use crate::settings::TilingSettings;
use crate::tile::{
    PriorityBin, TileId, TilePriority, TileRequest, TileResolution, TileStore, WhichTree,
};
use crate::tiling_data::TilingData;
use crate::tiling_set::TilingSet;
use crate::time::{HostTime, Timebase};

/// What a tiling needs from its layer to create tiles.
#[derive(Clone, Copy, Debug)]
pub struct TileContext<'a> {
    /// The layer's current recording.
    pub raster_source: &'a Arc<RasterSource>,
    /// Owning layer.
    pub layer: LayerId,
    /// Commit that produced `raster_source`.
    pub source_frame_number: u64,
    /// Masks skip solid-color analysis.
    pub is_mask: bool,
    /// Invalidation of the pending layer of the pair, if any.
    pub pending_invalidation: Option<&'a Region>,
    /// Tiling set of the pending-or-active twin, for tile sharing.
    pub twin: Option<&'a TilingSet>,
}

/// Per-frame inputs of a priority update.
#[derive(Clone, Copy, Debug)]
pub struct PriorityParams<'a> {
    /// Tiling configuration.
    pub settings: &'a TilingSettings,
    /// Viewport for tile priority, in layer space.
    pub viewport_in_layer_space: Rect,
    /// The layer's ideal contents scale.
    pub ideal_contents_scale: f64,
    /// Begin-frame time of the owning tree.
    pub frame_time: HostTime,
    /// Converts `frame_time` ticks.
    pub timebase: Timebase,
    /// Skewport look-ahead in seconds.
    pub skewport_target_time_secs: f64,
    /// Occlusion in layer space.
    pub occlusion: &'a Occlusion,
    /// Tree the priorities are for.
    pub tree: WhichTree,
    /// Whether pending tiles may block activation.
    pub can_require_tiles_for_activation: bool,
    /// Whether the active tree refuses to draw without high-res tiles.
    pub requires_high_res_to_draw: bool,
    /// Least urgent bin allowed; layers that are not drawn clamp to
    /// [`PriorityBin::Eventually`].
    pub max_bin: PriorityBin,
}

/// A tile grid at one contents scale.
#[derive(Clone, Debug)]
pub struct Tiling {
    contents_scale: f64,
    layer_bounds: Size,
    resolution: TileResolution,
    data: TilingData,
    tiles: BTreeMap<(i32, i32), TileId>,
    live_tiles_rect: Rect,

    current_visible_rect: Rect,
    current_skewport_rect: Rect,
    current_soon_border_rect: Rect,
    current_eventually_rect: Rect,

    last_update: Option<(HostTime, Rect)>,
    previous_visible_rect: Rect,
    previous_frame_time: Option<HostTime>,
    can_require_tiles_for_activation: bool,
}

impl Tiling {
    /// Creates an empty tiling for `layer_bounds` at `contents_scale`.
    ///
    /// # Panics
    ///
    /// Panics if the scale is not positive.
    #[must_use]
    pub fn new(contents_scale: f64, layer_bounds: Size, tile_size: Size) -> Self {
        assert!(
            contents_scale > 0.0,
            "tiling contents scale must be positive, got {contents_scale}"
        );
        let tiling_size = geometry::ceiled_size(layer_bounds, contents_scale);
        Self {
            contents_scale,
            layer_bounds,
            resolution: TileResolution::NonIdeal,
            data: TilingData::new(tiling_size, tile_size),
            tiles: BTreeMap::new(),
            live_tiles_rect: Rect::ZERO,
            current_visible_rect: Rect::ZERO,
            current_skewport_rect: Rect::ZERO,
            current_soon_border_rect: Rect::ZERO,
            current_eventually_rect: Rect::ZERO,
            last_update: None,
            previous_visible_rect: Rect::ZERO,
            previous_frame_time: None,
            can_require_tiles_for_activation: false,
        }
    }

    // -- Accessors --

    /// Scale from layer space to this tiling's content space.
    #[must_use]
    pub fn contents_scale(&self) -> f64 {
        self.contents_scale
    }

    /// Resolution class.
    #[must_use]
    pub fn resolution(&self) -> TileResolution {
        self.resolution
    }

    /// Sets the resolution class.
    pub fn set_resolution(&mut self, resolution: TileResolution) {
        self.resolution = resolution;
    }

    /// Layer bounds the tiling was sized for.
    #[must_use]
    pub fn layer_bounds(&self) -> Size {
        self.layer_bounds
    }

    /// Grid geometry.
    #[must_use]
    pub fn tiling_data(&self) -> &TilingData {
        &self.data
    }

    /// Content bounds.
    #[must_use]
    pub fn tiling_size(&self) -> Size {
        self.data.tiling_size()
    }

    /// Cell size.
    #[must_use]
    pub fn tile_size(&self) -> Size {
        self.data.max_tile_size()
    }

    /// Tile at cell `(i, j)`, if one was created.
    #[must_use]
    pub fn tile_at(&self, i: i32, j: i32) -> Option<TileId> {
        self.tiles.get(&(i, j)).copied()
    }

    /// Every tile with its cell.
    pub fn tiles(&self) -> impl Iterator<Item = ((i32, i32), TileId)> + '_ {
        self.tiles.iter().map(|(k, v)| (*k, *v))
    }

    /// Number of created tiles.
    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Rect inside which tiles are kept alive.
    #[must_use]
    pub fn live_tiles_rect(&self) -> Rect {
        self.live_tiles_rect
    }

    /// Visible rect from the last priority update.
    #[must_use]
    pub fn current_visible_rect(&self) -> Rect {
        self.current_visible_rect
    }

    /// Skewport from the last priority update.
    #[must_use]
    pub fn current_skewport_rect(&self) -> Rect {
        self.current_skewport_rect
    }

    /// Soon border from the last priority update.
    #[must_use]
    pub fn current_soon_border_rect(&self) -> Rect {
        self.current_soon_border_rect
    }

    /// Eventually rect from the last priority update.
    #[must_use]
    pub fn current_eventually_rect(&self) -> Rect {
        self.current_eventually_rect
    }

    // -- Tile lifetime --

    #[cfg(test)]
    pub(crate) fn insert_tile_for_test(&mut self, i: i32, j: i32, tile: TileId) {
        self.tiles.insert((i, j), tile);
    }

    /// Releases every tile and forgets the live rect.
    pub fn reset(&mut self, tiles: &mut TileStore) {
        for (_, id) in core::mem::take(&mut self.tiles) {
            tiles.release(id);
        }
        self.live_tiles_rect = Rect::ZERO;
    }

    /// Removes the tile at `(i, j)`. Returns whether there was one.
    pub fn remove_tile_at(&mut self, i: i32, j: i32, tiles: &mut TileStore) -> bool {
        match self.tiles.remove(&(i, j)) {
            Some(id) => {
                tiles.release(id);
                true
            }
            None => false,
        }
    }

    /// Removes `tile` if this tiling holds it.
    pub fn remove_tile(&mut self, tile: TileId, tiles: &mut TileStore) -> bool {
        let (i, j) = tiles.request(tile).tiling_index;
        if self.tile_at(i, j) == Some(tile) {
            self.remove_tile_at(i, j, tiles)
        } else {
            false
        }
    }

    /// Removes every tile touching a layer-space invalidation rect.
    pub fn remove_tiles_in_region(&mut self, region: &Region, tiles: &mut TileStore) {
        for layer_rect in region.iter() {
            let content_rect = geometry::scale_to_enclosing(layer_rect, self.contents_scale);
            if let Some(range) = self.data.tile_rect_indices(content_rect) {
                for (i, j) in range.iter() {
                    self.remove_tile_at(i, j, tiles);
                }
            }
        }
    }

    /// Creates the tile for cell `(i, j)`.
    ///
    /// The twin tiling's tile at the same cell is shared when the tile sizes
    /// match and the pending invalidation does not touch it. Otherwise a new
    /// tile is registered, provided the raster source covers the cell.
    fn create_tile(
        &mut self,
        i: i32,
        j: i32,
        tiles: &mut TileStore,
        ctx: &TileContext<'_>,
    ) -> Option<TileId> {
        let content_rect = self.data.tile_bounds(i, j);
        if let Some(twin_tile) = ctx
            .twin
            .and_then(|set| set.find_tiling_with_scale(self.contents_scale))
            .filter(|twin| twin.tile_size() == self.tile_size())
            .and_then(|twin| twin.tile_at(i, j))
        {
            let layer_rect = geometry::scale_to_enclosing(content_rect, 1.0 / self.contents_scale);
            let invalidated = ctx
                .pending_invalidation
                .is_some_and(|inv| inv.intersects(layer_rect));
            if !invalidated {
                tiles.retain(twin_tile);
                self.tiles.insert((i, j), twin_tile);
                return Some(twin_tile);
            }
        }
        if ctx.raster_source.is_solid_color()
            || !ctx.raster_source.covers_rect(content_rect, self.contents_scale)
        {
            return None;
        }
        let id = tiles.create(TileRequest {
            raster_source: Arc::clone(ctx.raster_source),
            content_rect,
            contents_scale: self.contents_scale,
            layer: ctx.layer,
            source_frame_number: ctx.source_frame_number,
            tiling_index: (i, j),
            use_picture_analysis: !ctx.is_mask,
        });
        self.tiles.insert((i, j), id);
        Some(id)
    }

    /// Moves the live-tiles rect, dropping tiles outside it and creating
    /// missing tiles inside it.
    pub fn set_live_tiles_rect(
        &mut self,
        new_rect: Rect,
        tiles: &mut TileStore,
        ctx: &TileContext<'_>,
    ) {
        let new_rect = geometry::intersect(new_rect, self.data.tiling_rect());
        let stale: Vec<(i32, i32)> = self
            .tiles
            .keys()
            .copied()
            .filter(|(i, j)| !geometry::overlaps(self.data.tile_bounds(*i, *j), new_rect))
            .collect();
        for (i, j) in stale {
            self.remove_tile_at(i, j, tiles);
        }
        self.live_tiles_rect = new_rect;
        self.create_missing_tiles_in_live_tiles_rect(tiles, ctx);
    }

    /// Creates tiles for every empty cell of the live-tiles rect.
    pub fn create_missing_tiles_in_live_tiles_rect(
        &mut self,
        tiles: &mut TileStore,
        ctx: &TileContext<'_>,
    ) {
        let Some(range) = self.data.tile_rect_indices(self.live_tiles_rect) else {
            return;
        };
        for (i, j) in range.iter() {
            if !self.tiles.contains_key(&(i, j)) {
                self.create_tile(i, j, tiles, ctx);
            }
        }
    }

    /// Adapts the tiling to a new commit: resizes the grid for new layer
    /// bounds or tile size, then drops invalidated tiles.
    pub fn update_tiles_to_current_raster_source(
        &mut self,
        layer_bounds: Size,
        tile_size: Size,
        invalidation: &Region,
        tiles: &mut TileStore,
    ) {
        if tile_size != self.tile_size() {
            self.reset(tiles);
            self.data.set_max_tile_size(tile_size);
        }
        if layer_bounds != self.layer_bounds {
            self.layer_bounds = layer_bounds;
            self.data
                .set_tiling_size(geometry::ceiled_size(layer_bounds, self.contents_scale));
            let nx = self.data.num_tiles_x();
            let ny = self.data.num_tiles_y();
            let resized: Vec<(i32, i32)> = self
                .tiles
                .iter()
                .filter(|((i, j), id)| {
                    *i >= nx || *j >= ny || tiles.request(**id).content_rect != self.data.tile_bounds(*i, *j)
                })
                .map(|(k, _)| *k)
                .collect();
            for (i, j) in resized {
                self.remove_tile_at(i, j, tiles);
            }
            self.live_tiles_rect = geometry::intersect(self.live_tiles_rect, self.data.tiling_rect());
        }
        self.remove_tiles_in_region(invalidation, tiles);
    }

    // -- Priorities --

    /// Returns `true` unless this frame time and viewport were already
    /// processed.
    #[must_use]
    pub fn needs_update(&self, frame_time: HostTime, viewport_in_layer_space: Rect) -> bool {
        self.last_update != Some((frame_time, viewport_in_layer_space))
    }

    /// Recomputes the priority rects, the live-tiles rect, and the priority
    /// of every tile. Returns `false` when nothing changed since the last
    /// update.
    pub fn update_tile_priorities(
        &mut self,
        params: &PriorityParams<'_>,
        tiles: &mut TileStore,
        ctx: &TileContext<'_>,
    ) -> bool {
        if !self.needs_update(params.frame_time, params.viewport_in_layer_space) {
            return false;
        }
        self.last_update = Some((params.frame_time, params.viewport_in_layer_space));

        let visible =
            geometry::scale_to_enclosing(params.viewport_in_layer_space, self.contents_scale);
        if geometry::is_empty_size(self.tiling_size()) {
            self.previous_visible_rect = visible;
            self.previous_frame_time = Some(params.frame_time);
            return true;
        }

        let tile_size = self.tile_size();
        let eventually_area =
            params.settings.max_tiles_for_interest_area as f64 * tile_size.width * tile_size.height;
        let skewport = self.compute_skewport(params, visible);
        let eventually = expand_rect_equally_to_area(visible, eventually_area, self.data.tiling_rect());

        self.set_live_tiles_rect(eventually, tiles, ctx);

        let content_to_screen_scale = params.ideal_contents_scale / self.contents_scale;
        let soon_distance =
            (params.settings.soon_border_distance_in_screen_pixels / content_to_screen_scale).floor();
        let soon_border = visible.inflate(soon_distance, soon_distance);

        self.current_visible_rect = visible;
        self.current_skewport_rect = skewport;
        self.current_soon_border_rect = soon_border;
        self.current_eventually_rect = eventually;
        self.can_require_tiles_for_activation = params.can_require_tiles_for_activation;

        let twin = ctx
            .twin
            .and_then(|set| set.find_tiling_with_scale(self.contents_scale));
        for (&(i, j), &tile) in &self.tiles {
            let bounds = self.data.tile_bounds(i, j);
            let (mut bin, distance) = if geometry::overlaps(bounds, visible) {
                (PriorityBin::Now, 0.0)
            } else {
                let distance = geometry::manhattan_distance(bounds, visible) * content_to_screen_scale;
                if geometry::overlaps(bounds, skewport) || geometry::overlaps(bounds, soon_border) {
                    (PriorityBin::Soon, distance)
                } else {
                    (PriorityBin::Eventually, distance)
                }
            };
            bin = bin.max(params.max_bin);
            tiles.set_priority(
                tile,
                params.tree,
                TilePriority {
                    resolution: self.resolution,
                    bin,
                    distance_to_visible: distance,
                },
            );

            let occluded = bin == PriorityBin::Now && self.is_tile_occluded(bounds, params.occlusion);
            tiles.set_occluded(tile, params.tree, occluded);

            let required = self.resolution == TileResolution::High
                && bin == PriorityBin::Now
                && !occluded;
            match params.tree {
                WhichTree::Pending => {
                    let required = required
                        && params.can_require_tiles_for_activation
                        && (params.requires_high_res_to_draw
                            || self.twin_needs_tile(twin, i, j));
                    tiles.set_required_for_activation(tile, required);
                }
                WhichTree::Active => {
                    tiles.set_required_for_draw(tile, required && params.requires_high_res_to_draw);
                }
            }
        }

        self.previous_visible_rect = visible;
        self.previous_frame_time = Some(params.frame_time);
        true
    }

    /// Whether the twin's state leaves tile `(i, j)` worth requiring.
    ///
    /// When the twin covers the same geometry and visible rect but has no
    /// tile at the cell, the cell has no recording and need not block
    /// activation.
    fn twin_needs_tile(&self, twin: Option<&Self>, i: i32, j: i32) -> bool {
        let Some(twin) = twin else {
            return true;
        };
        if twin.layer_bounds != self.layer_bounds
            || twin.current_visible_rect != self.current_visible_rect
        {
            return true;
        }
        twin.tile_at(i, j).is_some()
    }

    fn is_tile_occluded(&self, content_bounds: Rect, occlusion: &Occlusion) -> bool {
        if occlusion.is_empty() {
            return false;
        }
        let layer_rect = geometry::intersect(
            geometry::scale_to_enclosing(content_bounds, 1.0 / self.contents_scale),
            geometry::rect_from_size(self.layer_bounds),
        );
        occlusion.is_occluded(layer_rect)
    }

    /// Extrapolates the visible rect along its motion since the last update.
    fn compute_skewport(&self, params: &PriorityParams<'_>, visible: Rect) -> Rect {
        let Some(previous_time) = self.previous_frame_time else {
            return visible;
        };
        if params.frame_time <= previous_time {
            return visible;
        }
        let dt = (params.frame_time - previous_time).as_secs_f64(params.timebase);
        if dt <= 0.0 {
            return visible;
        }
        let m = params.skewport_target_time_secs / dt;
        let prev = self.previous_visible_rect;
        let skewport = Rect::new(
            visible.x0 + m * (visible.x0 - prev.x0),
            visible.y0 + m * (visible.y0 - prev.y0),
            visible.x1 + m * (visible.x1 - prev.x1),
            visible.y1 + m * (visible.y1 - prev.y1),
        );
        let limit = params.settings.skewport_extrapolation_limit_in_content_pixels;
        let max_skewport = visible.inflate(limit, limit);
        let skewport = if geometry::is_empty(skewport) {
            Rect::ZERO
        } else {
            geometry::intersect(geometry::enclosing(skewport), max_skewport)
        };
        geometry::union(skewport, visible)
    }

    // -- Coverage --

    /// Iterates the cells covering `dest_rect`, a rect in a content space at
    /// `dest_scale`.
    #[must_use]
    pub fn coverage(&self, dest_scale: f64, dest_rect: Rect) -> TilingCoverageIter<'_> {
        TilingCoverageIter::new(self, dest_scale, dest_rect)
    }
}

/// Grows `start` equally on every side until its area reaches
/// `target_area`, clipped to `bounds`.
///
/// Sides stopped by `bounds` stop growing and the remaining sides continue,
/// so a rect near an edge extends further in the open directions.
#[must_use]
pub fn expand_rect_equally_to_area(start: Rect, target_area: f64, bounds: Rect) -> Rect {
    if geometry::is_empty(start) || geometry::is_empty(bounds) {
        return Rect::ZERO;
    }
    let delta = expansion_delta(2.0, 2.0, start.width(), start.height(), target_area).max(0.0);
    let mut rect = geometry::intersect(start.inflate(delta, delta), bounds);
    if geometry::is_empty(rect) {
        return Rect::ZERO;
    }
    for _ in 0..4 {
        if rect.area() >= target_area {
            break;
        }
        let grow_left = rect.x0 > bounds.x0;
        let grow_right = rect.x1 < bounds.x1;
        let grow_top = rect.y0 > bounds.y0;
        let grow_bottom = rect.y1 < bounds.y1;
        let nx = f64::from(u8::from(grow_left) + u8::from(grow_right));
        let ny = f64::from(u8::from(grow_top) + u8::from(grow_bottom));
        if nx + ny == 0.0 {
            break;
        }
        let delta = expansion_delta(nx, ny, rect.width(), rect.height(), target_area);
        if delta <= 0.0 {
            break;
        }
        let grown = Rect::new(
            if grow_left { rect.x0 - delta } else { rect.x0 },
            if grow_top { rect.y0 - delta } else { rect.y0 },
            if grow_right { rect.x1 + delta } else { rect.x1 },
            if grow_bottom { rect.y1 + delta } else { rect.y1 },
        );
        rect = geometry::intersect(grown, bounds);
    }
    rect
}

/// Smallest whole `d` with `(w + nx·d)(h + ny·d) ≥ target`.
fn expansion_delta(nx: f64, ny: f64, w: f64, h: f64, target: f64) -> f64 {
    let a = nx * ny;
    let b = nx * h + ny * w;
    let c = w * h - target;
    if c >= 0.0 {
        return 0.0;
    }
    if a == 0.0 {
        if b == 0.0 {
            return 0.0;
        }
        return (-c / b).ceil();
    }
    ((-b + (b * b - 4.0 * a * c).sqrt()) / (2.0 * a)).ceil()
}

// ---------------------------------------------------------------------------
// Coverage iteration
// ---------------------------------------------------------------------------

/// One cell's share of a coverage query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilingCoverage {
    /// Part of the query rect this cell draws, in destination space.
    pub geometry_rect: Rect,
    /// The cell's tile, if created.
    pub tile: Option<TileId>,
    /// Cell column.
    pub i: i32,
    /// Cell row.
    pub j: i32,
    /// `geometry_rect` in the tile's texture space.
    pub texture_rect: Rect,
    /// Size of the tile texture.
    pub texture_size: Size,
}

/// Walks the cells of one tiling under a destination rect, left to right and
/// top to bottom.
///
/// Each cell's bounds are mapped to destination space by enclosing rounding,
/// clipped to the query, and trimmed against the previous cell and row, so
/// the yielded geometry rects partition the query rect.
#[derive(Clone, Debug)]
pub struct TilingCoverageIter<'a> {
    tiling: &'a Tiling,
    dest_rect: Rect,
    dest_to_content: f64,
    left: i32,
    right: i32,
    bottom: i32,
    i: i32,
    j: i32,
    cursor_x: f64,
    row_top: f64,
    row_bottom: f64,
    prev_row_bottom: f64,
}

impl<'a> TilingCoverageIter<'a> {
    fn new(tiling: &'a Tiling, dest_scale: f64, dest_rect: Rect) -> Self {
        let dest_to_content = tiling.contents_scale / dest_scale;
        let content_rect = geometry::scale_to_enclosing(dest_rect, dest_to_content);
        let mut iter = Self {
            tiling,
            dest_rect,
            dest_to_content,
            left: 0,
            right: -1,
            bottom: -1,
            i: 0,
            j: 0,
            cursor_x: dest_rect.x0,
            row_top: dest_rect.y0,
            row_bottom: dest_rect.y0,
            prev_row_bottom: dest_rect.y0,
        };
        if geometry::is_empty(dest_rect) {
            return iter;
        }
        if let Some(range) = tiling.data.tile_rect_indices(content_rect) {
            iter.left = range.left;
            iter.right = range.right;
            iter.bottom = range.bottom;
            iter.i = range.left;
            iter.j = range.top;
        }
        iter
    }
}

impl Iterator for TilingCoverageIter<'_> {
    type Item = TilingCoverage;

    fn next(&mut self) -> Option<TilingCoverage> {
        while self.j <= self.bottom && self.left <= self.right {
            let (i, j) = (self.i, self.j);
            let new_row = i == self.left;
            self.i += 1;
            if self.i > self.right {
                self.i = self.left;
                self.j += 1;
            }

            let content = self.tiling.data.tile_bounds(i, j);
            let mut geometry = geometry::intersect(
                geometry::scale_to_enclosing(content, 1.0 / self.dest_to_content),
                self.dest_rect,
            );
            if new_row {
                self.prev_row_bottom = self.prev_row_bottom.max(self.row_bottom);
                self.row_top = geometry.y0.max(self.prev_row_bottom);
                self.row_bottom = geometry.y1;
                self.cursor_x = self.dest_rect.x0;
            }
            geometry.y0 = geometry.y0.max(self.row_top);
            geometry.x0 = geometry.x0.max(self.cursor_x);
            self.cursor_x = self.cursor_x.max(geometry.x1);
            if geometry::is_empty(geometry) {
                continue;
            }

            let tile_origin = Vec2::new(content.x0, content.y0);
            let texture_rect = geometry::intersect(
                geometry.scale_from_origin(self.dest_to_content),
                self.tiling.data.tiling_rect(),
            ) - tile_origin;
            return Some(TilingCoverage {
                geometry_rect: geometry,
                tile: self.tiling.tile_at(i, j),
                i,
                j,
                texture_rect,
                texture_size: self.tiling.tile_size(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(src: &Arc<RasterSource>) -> TileContext<'_> {
        TileContext {
            raster_source: src,
            layer: LayerId(1),
            source_frame_number: 1,
            is_mask: false,
            pending_invalidation: None,
            twin: None,
        }
    }

    fn params<'a>(settings: &'a TilingSettings, occlusion: &'a Occlusion, viewport: Rect, t: u64) -> PriorityParams<'a> {
        PriorityParams {
            settings,
            viewport_in_layer_space: viewport,
            ideal_contents_scale: 1.0,
            frame_time: HostTime(t),
            timebase: Timebase::NANOS,
            skewport_target_time_secs: 1.0,
            occlusion,
            tree: WhichTree::Active,
            can_require_tiles_for_activation: true,
            requires_high_res_to_draw: false,
            max_bin: PriorityBin::Now,
        }
    }

    fn partition_area(tiling: &Tiling, dest_scale: f64, rect: Rect) -> f64 {
        let items: Vec<_> = tiling.coverage(dest_scale, rect).collect();
        for (n, a) in items.iter().enumerate() {
            assert!(
                geometry::contains_rect(rect, a.geometry_rect),
                "{:?} escapes {rect:?}",
                a.geometry_rect
            );
            for b in &items[n + 1..] {
                assert!(
                    !geometry::overlaps(a.geometry_rect, b.geometry_rect),
                    "{:?} overlaps {:?} at dest scale {dest_scale}",
                    a.geometry_rect,
                    b.geometry_rect
                );
            }
        }
        items.iter().map(|c| c.geometry_rect.area()).sum()
    }

    #[test]
    fn coverage_partitions_query_rect() {
        let bounds = Size::new(1000.0, 777.0);
        for &scale in &[0.25, 0.33, 0.5, 1.0, 1.37, 2.0, 3.1] {
            let tiling = Tiling::new(scale, bounds, Size::new(100.0, 64.0));
            for &dest_scale in &[1.0, 0.7, 1.5] {
                let layer = geometry::scale_to_enclosing(geometry::rect_from_size(bounds), dest_scale);
                for rect in [
                    layer,
                    Rect::new(13.0, 7.0, 301.0, 299.0),
                    Rect::new(250.0, 100.0, 251.0, 101.0),
                ] {
                    let rect = geometry::intersect(rect, layer);
                    assert_eq!(
                        partition_area(&tiling, dest_scale, rect),
                        rect.area(),
                        "scale {scale} dest {dest_scale} rect {rect:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn coverage_texture_rect_is_tile_relative() {
        let tiling = Tiling::new(2.0, Size::new(300.0, 300.0), Size::new(256.0, 256.0));
        let items: Vec<_> = tiling
            .coverage(1.0, Rect::new(128.0, 0.0, 200.0, 10.0))
            .collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].i, 1);
        assert_eq!(items[0].texture_rect, Rect::new(0.0, 0.0, 144.0, 20.0));
        assert_eq!(items[0].texture_size, Size::new(256.0, 256.0));
    }

    #[test]
    fn priority_update_creates_live_tiles_and_bins() {
        let settings = TilingSettings {
            max_tiles_for_interest_area: 4,
            ..TilingSettings::desktop()
        };
        let src = RasterSource::fully_recorded(Size::new(2000.0, 2000.0)).shared();
        let mut store = TileStore::new();
        let mut tiling = Tiling::new(1.0, Size::new(2000.0, 2000.0), Size::new(256.0, 256.0));
        tiling.set_resolution(TileResolution::High);
        let occlusion = Occlusion::none();
        let viewport = Rect::new(0.0, 0.0, 256.0, 256.0);
        assert!(tiling.update_tile_priorities(&params(&settings, &occlusion, viewport, 0), &mut store, &ctx(&src)));

        // 4 tiles of interest area: a 512x512 eventually rect at the corner.
        assert_eq!(tiling.live_tiles_rect(), Rect::new(0.0, 0.0, 512.0, 512.0));
        assert_eq!(tiling.num_tiles(), 4);
        let now = tiling.tile_at(0, 0).unwrap();
        assert_eq!(store.priority(now, WhichTree::Active).bin, PriorityBin::Now);
        let soon = tiling.tile_at(1, 1).unwrap();
        let p = store.priority(soon, WhichTree::Active);
        assert_eq!(p.bin, PriorityBin::Soon);
        assert_eq!(p.distance_to_visible, 0.0);

        // Same frame and viewport: nothing to do.
        assert!(!tiling.update_tile_priorities(&params(&settings, &occlusion, viewport, 0), &mut store, &ctx(&src)));
    }

    #[test]
    fn moving_viewport_releases_tiles() {
        let settings = TilingSettings {
            max_tiles_for_interest_area: 1,
            ..TilingSettings::desktop()
        };
        let src = RasterSource::fully_recorded(Size::new(2000.0, 2000.0)).shared();
        let mut store = TileStore::new();
        let mut tiling = Tiling::new(1.0, Size::new(2000.0, 2000.0), Size::new(256.0, 256.0));
        let occlusion = Occlusion::none();
        tiling.update_tile_priorities(
            &params(&settings, &occlusion, Rect::new(0.0, 0.0, 256.0, 256.0), 0),
            &mut store,
            &ctx(&src),
        );
        let first = tiling.tile_at(0, 0).unwrap();
        tiling.update_tile_priorities(
            &params(&settings, &occlusion, Rect::new(1024.0, 1024.0, 1280.0, 1280.0), 16),
            &mut store,
            &ctx(&src),
        );
        assert!(!store.is_alive(first));
        assert!(tiling.tile_at(4, 4).is_some());
        assert_eq!(store.len(), tiling.num_tiles());
    }

    #[test]
    fn skewport_extends_along_motion() {
        let settings = TilingSettings::desktop();
        let src = RasterSource::fully_recorded(Size::new(4000.0, 4000.0)).shared();
        let mut store = TileStore::new();
        let mut tiling = Tiling::new(1.0, Size::new(4000.0, 4000.0), Size::new(256.0, 256.0));
        let occlusion = Occlusion::none();
        let mut p = params(&settings, &occlusion, Rect::new(0.0, 0.0, 200.0, 200.0), 0);
        p.skewport_target_time_secs = 0.5;
        tiling.update_tile_priorities(&p, &mut store, &ctx(&src));
        p.viewport_in_layer_space = Rect::new(0.0, 100.0, 200.0, 300.0);
        p.frame_time = HostTime(500_000_000);
        tiling.update_tile_priorities(&p, &mut store, &ctx(&src));
        // Moved 100px in 0.5s; the skewport looks 0.5s ahead.
        assert_eq!(tiling.current_skewport_rect(), Rect::new(0.0, 100.0, 200.0, 400.0));
    }

    #[test]
    fn occluded_visible_tiles_are_not_required() {
        let settings = TilingSettings::desktop();
        let src = RasterSource::fully_recorded(Size::new(512.0, 256.0)).shared();
        let mut store = TileStore::new();
        let mut tiling = Tiling::new(1.0, Size::new(512.0, 256.0), Size::new(256.0, 256.0));
        tiling.set_resolution(TileResolution::High);
        let occlusion = Occlusion::from_rects([Rect::new(0.0, 0.0, 256.0, 256.0)]);
        let mut p = params(&settings, &occlusion, Rect::new(0.0, 0.0, 512.0, 256.0), 0);
        p.tree = WhichTree::Pending;
        tiling.update_tile_priorities(&p, &mut store, &ctx(&src));
        let hidden = tiling.tile_at(0, 0).unwrap();
        let shown = tiling.tile_at(1, 0).unwrap();
        assert!(store.is_occluded(hidden, WhichTree::Pending));
        assert!(!store.required_for_activation(hidden));
        assert!(store.required_for_activation(shown));
    }

    #[test]
    fn invalidation_removes_touched_tiles_only() {
        let settings = TilingSettings::desktop();
        let src = RasterSource::fully_recorded(Size::new(512.0, 512.0)).shared();
        let mut store = TileStore::new();
        let mut tiling = Tiling::new(0.5, Size::new(512.0, 512.0), Size::new(64.0, 64.0));
        let occlusion = Occlusion::none();
        tiling.update_tile_priorities(
            &params(&settings, &occlusion, Rect::new(0.0, 0.0, 512.0, 512.0), 0),
            &mut store,
            &ctx(&src),
        );
        assert_eq!(tiling.num_tiles(), 16);
        tiling.remove_tiles_in_region(&Region::from_rect(Rect::new(0.0, 0.0, 130.0, 10.0)), &mut store);
        assert!(tiling.tile_at(0, 0).is_none());
        assert!(tiling.tile_at(1, 0).is_none());
        assert!(tiling.tile_at(2, 0).is_some());
        assert!(tiling.tile_at(0, 1).is_some());
        assert_eq!(store.len(), 14);
    }

    #[test]
    fn interest_area_expands_past_edges() {
        let bounds = Rect::new(0.0, 0.0, 1000.0, 1000.0);
        let r = expand_rect_equally_to_area(Rect::new(0.0, 0.0, 100.0, 100.0), 90_000.0, bounds);
        assert_eq!(r, Rect::new(0.0, 0.0, 300.0, 300.0));
        let centered = expand_rect_equally_to_area(Rect::new(450.0, 450.0, 550.0, 550.0), 40_000.0, bounds);
        assert_eq!(centered, Rect::new(400.0, 400.0, 600.0, 600.0));
        let capped = expand_rect_equally_to_area(Rect::new(0.0, 0.0, 10.0, 10.0), 1e9, bounds);
        assert_eq!(capped, bounds);
        assert_eq!(expand_rect_equally_to_area(Rect::ZERO, 100.0, bounds), Rect::ZERO);
    }
}
