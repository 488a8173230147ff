// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile registry: struct-of-arrays storage for raster tiles.
//!
//! Tiles are owned by the [`TileStore`], not by the tilings that spawned
//! them. A tiling holds a [`TileId`] per grid cell and the store counts how
//! many tilings hold each tile; a pending tiling and its active twin share a
//! tile when nothing invalidated it between commits. When the last holder
//! releases a tile its slot goes on the free list and the generation bump
//! makes every outstanding handle stale.
//!
//! Raster results arrive asynchronously through
//! [`TileStore::complete_raster`]. A result for a stale handle is dropped
//! silently: the tile it was meant for no longer exists.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::layer::LayerId;
use crate::raster_source::{Color, RasterSource};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A handle to a tile in a [`TileStore`].
///
/// Carries the slot index and the generation the slot had when the tile was
/// created, so handles to destroyed tiles are detected.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl TileId {
    /// Raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileId({}@gen{})", self.idx, self.generation)
    }
}

/// An opaque handle to a raster resource owned by the tile manager.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey(pub u64);

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Draw state and priorities
// ---------------------------------------------------------------------------

/// How a tile can currently be drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DrawInfo {
    /// Raster has not produced anything yet.
    #[default]
    NotReady,
    /// Analysis found the tile to be one color; no resource is needed.
    SolidColor(Color),
    /// Draw by replaying the picture at draw time.
    PictureFallback,
    /// Rasterized into a resource.
    Resource {
        /// The raster resource.
        resource: ResourceKey,
        /// Whether the resource has its red and blue channels swapped.
        contents_swizzled: bool,
    },
}

impl DrawInfo {
    /// Returns `true` unless the tile is still waiting for raster.
    #[inline]
    #[must_use]
    pub const fn is_ready_to_draw(self) -> bool {
        !matches!(self, Self::NotReady)
    }

    /// Returns `true` if the tile owns a raster resource.
    #[inline]
    #[must_use]
    pub const fn has_resource(self) -> bool {
        matches!(self, Self::Resource { .. })
    }
}

/// Resolution class of the tiling a tile belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileResolution {
    /// The tiling the layer is trying to draw with.
    High,
    /// The coarse companion used while high-res catches up.
    Low,
    /// Any leftover tiling from an earlier scale.
    NonIdeal,
}

/// Urgency bucket; earlier variants are more urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityBin {
    /// Intersects the visible rect.
    Now,
    /// Likely to become visible shortly.
    Soon,
    /// Inside the interest area but not expected soon.
    Eventually,
}

/// Which live tree a priority belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WhichTree {
    /// The tree being drawn.
    Active,
    /// The tree waiting to activate.
    Pending,
}

impl WhichTree {
    const fn slot(self) -> usize {
        match self {
            Self::Active => 0,
            Self::Pending => 1,
        }
    }
}

/// How priorities from the two live trees are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TreePriority {
    /// Take the more urgent of the two trees.
    #[default]
    SamePriorityForBothTrees,
    /// Only the active tree counts.
    SmoothnessTakesPriority,
    /// Only the pending tree counts.
    NewContentTakesPriority,
}

/// Priority of a tile on one tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilePriority {
    /// Resolution class of the owning tiling.
    pub resolution: TileResolution,
    /// Urgency bucket.
    pub bin: PriorityBin,
    /// Manhattan distance to the visible rect, in screen pixels.
    pub distance_to_visible: f64,
}

impl Default for TilePriority {
    fn default() -> Self {
        Self {
            resolution: TileResolution::NonIdeal,
            bin: PriorityBin::Eventually,
            distance_to_visible: f64::MAX,
        }
    }
}

impl TilePriority {
    /// Priority of a tile intersecting the visible rect.
    #[must_use]
    pub const fn now(resolution: TileResolution) -> Self {
        Self {
            resolution,
            bin: PriorityBin::Now,
            distance_to_visible: 0.0,
        }
    }

    /// Merges the priorities a tile has on the active and pending trees.
    ///
    /// The resolution is the best of the two; bin and distance come from the
    /// more urgent tree, with distances merged when the bins tie.
    #[must_use]
    pub fn combine(active: Self, pending: Self) -> Self {
        let resolution = if active.resolution == TileResolution::High
            || pending.resolution == TileResolution::High
        {
            TileResolution::High
        } else if active.resolution == TileResolution::Low
            || pending.resolution == TileResolution::Low
        {
            TileResolution::Low
        } else {
            TileResolution::NonIdeal
        };
        let (bin, distance_to_visible) = match active.bin.cmp(&pending.bin) {
            core::cmp::Ordering::Less => (active.bin, active.distance_to_visible),
            core::cmp::Ordering::Greater => (pending.bin, pending.distance_to_visible),
            core::cmp::Ordering::Equal => (
                active.bin,
                active.distance_to_visible.min(pending.distance_to_visible),
            ),
        };
        Self {
            resolution,
            bin,
            distance_to_visible,
        }
    }
}

/// Everything the raster backend needs to produce a tile.
#[derive(Clone, Debug)]
pub struct TileRequest {
    /// Recording to raster from.
    pub raster_source: Arc<RasterSource>,
    /// Tile rect in content space of its tiling.
    pub content_rect: Rect,
    /// Scale of the owning tiling.
    pub contents_scale: f64,
    /// Layer the tile draws for.
    pub layer: LayerId,
    /// Commit that produced `raster_source`.
    pub source_frame_number: u64,
    /// Grid cell in the owning tiling.
    pub tiling_index: (i32, i32),
    /// Whether raster may run solid-color analysis first.
    pub use_picture_analysis: bool,
}

// ---------------------------------------------------------------------------
// TileStore
// ---------------------------------------------------------------------------

/// Struct-of-arrays storage for all tiles of a [`TreeHost`].
///
/// [`TreeHost`]: crate::tree::TreeHost
#[derive(Debug, Default)]
pub struct TileStore {
    // -- Identity --
    request: Vec<Option<TileRequest>>,

    // -- Raster state --
    draw_info: Vec<DrawInfo>,

    // -- Priority, indexed by `WhichTree::slot` --
    priority: Vec<[TilePriority; 2]>,
    occluded: Vec<[bool; 2]>,
    required_for_activation: Vec<bool>,
    required_for_draw: Vec<bool>,

    // -- Allocation --
    refcount: Vec<u32>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    slots: u32,
    live: usize,
}

impl TileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tile with one holder.
    pub fn create(&mut self, request: TileRequest) -> TileId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.request[i] = Some(request);
            self.draw_info[i] = DrawInfo::NotReady;
            self.priority[i] = [TilePriority::default(); 2];
            self.occluded[i] = [false; 2];
            self.required_for_activation[i] = false;
            self.required_for_draw[i] = false;
            self.refcount[i] = 1;
            idx
        } else {
            let idx = self.slots;
            self.slots += 1;
            self.request.push(Some(request));
            self.draw_info.push(DrawInfo::NotReady);
            self.priority.push([TilePriority::default(); 2]);
            self.occluded.push([false; 2]);
            self.required_for_activation.push(false);
            self.required_for_draw.push(false);
            self.refcount.push(1);
            self.generation.push(0);
            idx
        };
        self.live += 1;
        TileId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Returns whether the handle refers to a live tile.
    #[must_use]
    pub fn is_alive(&self, id: TileId) -> bool {
        let i = id.idx as usize;
        i < self.generation.len() && self.generation[i] == id.generation && self.refcount[i] > 0
    }

    /// Number of live tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no tile is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Adds a holder to a live tile.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn retain(&mut self, id: TileId) {
        self.validate(id);
        self.refcount[id.idx as usize] += 1;
    }

    /// Drops one holder; frees the slot when none remain.
    ///
    /// Returns `true` if the tile was destroyed.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn release(&mut self, id: TileId) -> bool {
        self.validate(id);
        let i = id.idx as usize;
        self.refcount[i] -= 1;
        if self.refcount[i] > 0 {
            return false;
        }
        self.generation[i] += 1;
        self.request[i] = None;
        self.draw_info[i] = DrawInfo::NotReady;
        self.free_list.push(id.idx);
        self.live -= 1;
        true
    }

    /// Number of tilings holding the tile.
    #[must_use]
    pub fn holders(&self, id: TileId) -> u32 {
        if self.is_alive(id) { self.refcount[id.idx as usize] } else { 0 }
    }

    /// The raster request a tile was created from.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn request(&self, id: TileId) -> &TileRequest {
        self.validate(id);
        match &self.request[id.idx as usize] {
            Some(request) => request,
            None => unreachable!("live tile without a request"),
        }
    }

    /// Current draw state.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn draw_info(&self, id: TileId) -> DrawInfo {
        self.validate(id);
        self.draw_info[id.idx as usize]
    }

    /// Records a raster result.
    ///
    /// Returns `false` and does nothing when the tile no longer exists.
    pub fn complete_raster(&mut self, id: TileId, info: DrawInfo) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.draw_info[id.idx as usize] = info;
        true
    }

    /// Drops the tile's raster output, returning it to [`DrawInfo::NotReady`].
    pub(crate) fn discard_raster(&mut self, id: TileId) {
        self.validate(id);
        self.draw_info[id.idx as usize] = DrawInfo::NotReady;
    }

    /// Sets the priority for one tree.
    pub fn set_priority(&mut self, id: TileId, tree: WhichTree, priority: TilePriority) {
        self.validate(id);
        self.priority[id.idx as usize][tree.slot()] = priority;
    }

    /// Priority on one tree.
    #[must_use]
    pub fn priority(&self, id: TileId, tree: WhichTree) -> TilePriority {
        self.validate(id);
        self.priority[id.idx as usize][tree.slot()]
    }

    /// Priority merged across both live trees.
    #[must_use]
    pub fn combined_priority(&self, id: TileId) -> TilePriority {
        self.validate(id);
        let [active, pending] = self.priority[id.idx as usize];
        TilePriority::combine(active, pending)
    }

    /// Priority as seen under `tree_priority`.
    #[must_use]
    pub fn priority_for(&self, id: TileId, tree_priority: TreePriority) -> TilePriority {
        match tree_priority {
            TreePriority::SamePriorityForBothTrees => self.combined_priority(id),
            TreePriority::SmoothnessTakesPriority => self.priority(id, WhichTree::Active),
            TreePriority::NewContentTakesPriority => self.priority(id, WhichTree::Pending),
        }
    }

    /// Sets the occlusion state for one tree.
    pub fn set_occluded(&mut self, id: TileId, tree: WhichTree, occluded: bool) {
        self.validate(id);
        self.occluded[id.idx as usize][tree.slot()] = occluded;
    }

    /// Occlusion on one tree.
    #[must_use]
    pub fn is_occluded(&self, id: TileId, tree: WhichTree) -> bool {
        self.validate(id);
        self.occluded[id.idx as usize][tree.slot()]
    }

    /// Occlusion under `tree_priority`; a tile counts as occluded for both
    /// trees only if it is occluded on each.
    #[must_use]
    pub fn is_occluded_for(&self, id: TileId, tree_priority: TreePriority) -> bool {
        match tree_priority {
            TreePriority::SamePriorityForBothTrees => {
                self.is_occluded(id, WhichTree::Active) && self.is_occluded(id, WhichTree::Pending)
            }
            TreePriority::SmoothnessTakesPriority => self.is_occluded(id, WhichTree::Active),
            TreePriority::NewContentTakesPriority => self.is_occluded(id, WhichTree::Pending),
        }
    }

    /// Marks whether the pending tree needs this tile to activate.
    pub fn set_required_for_activation(&mut self, id: TileId, required: bool) {
        self.validate(id);
        self.required_for_activation[id.idx as usize] = required;
    }

    /// Whether the pending tree needs this tile to activate.
    #[must_use]
    pub fn required_for_activation(&self, id: TileId) -> bool {
        self.validate(id);
        self.required_for_activation[id.idx as usize]
    }

    /// Marks whether the active tree needs this tile to draw.
    pub fn set_required_for_draw(&mut self, id: TileId, required: bool) {
        self.validate(id);
        self.required_for_draw[id.idx as usize] = required;
    }

    /// Whether the active tree needs this tile to draw.
    #[must_use]
    pub fn required_for_draw(&self, id: TileId) -> bool {
        self.validate(id);
        self.required_for_draw[id.idx as usize]
    }

    /// Moves the pending-tree priority onto the active tree.
    pub fn did_become_active(&mut self, id: TileId) {
        self.validate(id);
        let i = id.idx as usize;
        self.priority[i] = [self.priority[i][1], TilePriority::default()];
        self.occluded[i] = [self.occluded[i][1], false];
        self.required_for_activation[i] = false;
    }

    /// Clears the active-tree priority of a tile whose tiling left the active
    /// tree.
    pub fn did_become_recycled(&mut self, id: TileId) {
        self.validate(id);
        let i = id.idx as usize;
        self.priority[i][0] = TilePriority::default();
        self.occluded[i][0] = false;
        self.required_for_draw[i] = false;
    }

    /// Iterates every live tile.
    pub fn iter(&self) -> impl Iterator<Item = TileId> + '_ {
        (0..self.slots)
            .filter(|idx| self.refcount[*idx as usize] > 0)
            .map(|idx| TileId {
                idx,
                generation: self.generation[idx as usize],
            })
    }

    #[inline]
    fn validate(&self, id: TileId) {
        assert!(self.is_alive(id), "stale TileId: {id:?}");
    }
}
