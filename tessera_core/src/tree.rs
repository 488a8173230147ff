// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer trees and the commit pipeline.
//!
//! A [`TreeHost`] owns the [`TileStore`] and up to three [`LayerTree`]s:
//!
//! - the **active** tree, which is drawn,
//! - the **pending** tree, which receives commits and activates once its
//!   required tiles are ready, and
//! - the **recycle** tree, the previous pending tree kept around so the next
//!   commit can reuse its layers and tilings.
//!
//! Layers are matched across trees by [`LayerId`]. The host resolves twins on
//! demand and hands them to layer operations as explicit arguments, so no
//! layer ever holds a reference into another tree.
//!
//! ```text
//!   commit ──► pending ──activate──► active
//!     ▲                     │
//!     └──── recycle ◄───────┘
//! ```

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Rect, Size};

use crate::geometry::Region;
use crate::layer::{DrawProperties, LayerEnv, LayerId, PictureLayer, TwinMut};
use crate::occlusion::Occlusion;
use crate::queue::{EvictionIter, LayerRasterIter};
use crate::raster_source::RasterSource;
use crate::settings::TilingSettings;
use crate::tile::{DrawInfo, TileId, TileStore, TreePriority};
#[cfg(feature = "trace-rich")]
use crate::trace::{TileEvictedEvent, TilingChange, TilingEvent};
use crate::trace::{ActivationEvent, Tracer};
use crate::time::{Duration, HostTime, Timebase};

/// Which of the host's trees a layer lives on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TreeKind {
    /// Receives commits.
    Pending,
    /// Drawn every frame.
    #[default]
    Active,
    /// The previous pending tree, kept for reuse.
    Recycle,
}

/// Tree-wide inputs for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameState {
    /// Begin-frame time.
    pub frame_time: HostTime,
    /// Converts host ticks to nanoseconds.
    pub timebase: Timebase,
    /// Interval between begin-frames.
    pub begin_frame_interval: Duration,
    /// The device viewport, in screen space.
    pub device_viewport: Rect,
    /// Viewport used for tile priorities, in screen space. Differs from the
    /// device viewport when the embedder overrides it.
    pub viewport_rect_for_tile_priority: Rect,
    /// Whether a pinch gesture is in progress.
    pub pinch_gesture_active: bool,
    /// Whether tiles are rastered on the GPU.
    pub use_gpu_rasterization: bool,
    /// Whether drawing must wait for high-res tiles.
    pub requires_high_res_to_draw: bool,
    /// Draw from picture recordings instead of tiles.
    pub resourceless_software_draw: bool,
    /// Smallest page scale the page can reach.
    pub min_page_scale_factor: f64,
    /// Commit the tree's contents came from.
    pub source_frame_number: u64,
    /// Whether draw properties are stale.
    pub needs_update_draw_properties: bool,
    /// How tile priorities of the two live trees are weighed.
    pub tree_priority: TreePriority,
}

impl Default for FrameState {
    fn default() -> Self {
        let viewport = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        Self {
            frame_time: HostTime(0),
            timebase: Timebase::NANOS,
            begin_frame_interval: Duration::from_nanos(16_666_667, Timebase::NANOS),
            device_viewport: viewport,
            viewport_rect_for_tile_priority: viewport,
            pinch_gesture_active: false,
            use_gpu_rasterization: false,
            requires_high_res_to_draw: false,
            resourceless_software_draw: false,
            min_page_scale_factor: 1.0,
            source_frame_number: 0,
            needs_update_draw_properties: false,
            tree_priority: TreePriority::SamePriorityForBothTrees,
        }
    }
}

impl FrameState {
    /// Whether the active tree's smoothness outranks new content.
    #[must_use]
    pub fn smoothness_takes_priority(&self) -> bool {
        self.tree_priority == TreePriority::SmoothnessTakesPriority
    }
}

/// One layer's part of a commit.
#[derive(Clone, Debug)]
pub struct LayerUpdate {
    /// The layer.
    pub id: LayerId,
    /// Layer bounds.
    pub bounds: Size,
    /// The new recording.
    pub raster_source: Arc<RasterSource>,
    /// What changed since the previous commit, in layer space.
    pub invalidation: Region,
    /// Whether the layer draws anything.
    pub draws_content: bool,
    /// Whether the layer is a mask.
    pub is_mask: bool,
}

impl LayerUpdate {
    /// An update that fully replaces the layer's content.
    #[must_use]
    pub fn new(id: LayerId, raster_source: Arc<RasterSource>) -> Self {
        Self {
            id,
            bounds: raster_source.size(),
            raster_source,
            invalidation: Region::new(),
            draws_content: true,
            is_mask: false,
        }
    }

    /// Adds a layer-space invalidation rect.
    #[must_use]
    pub fn with_invalidation(mut self, rect: Rect) -> Self {
        self.invalidation.union_rect(rect);
        self
    }
}

/// An active layer and its pending twin, for schedulers that walk both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerPair {
    /// The layer on the active tree, if any.
    pub active: Option<LayerId>,
    /// The layer on the pending tree, if any.
    pub pending: Option<LayerId>,
}

/// A set of layers sharing one [`FrameState`].
#[derive(Clone, Debug)]
pub struct LayerTree {
    kind: TreeKind,
    frame: FrameState,
    layers: BTreeMap<LayerId, PictureLayer>,
}

impl LayerTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new(kind: TreeKind) -> Self {
        Self {
            kind,
            frame: FrameState::default(),
            layers: BTreeMap::new(),
        }
    }

    /// Which tree this is.
    #[must_use]
    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    /// The tree's frame state.
    #[must_use]
    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    /// Looks up a layer.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&PictureLayer> {
        self.layers.get(&id)
    }

    /// Layers in id order.
    pub fn layers(&self) -> impl Iterator<Item = &PictureLayer> + '_ {
        self.layers.values()
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if the tree has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn split(&mut self) -> (TreeKind, &FrameState, &mut BTreeMap<LayerId, PictureLayer>) {
        (self.kind, &self.frame, &mut self.layers)
    }

    fn release_all(&mut self, tiles: &mut TileStore) {
        for layer in self.layers.values_mut() {
            layer.remove_all_tilings(tiles);
        }
        self.layers.clear();
    }
}

/// Borrowed pieces of a [`TreeHost`] for one operation on one tree.
struct Parts<'a> {
    settings: &'a TilingSettings,
    tiles: &'a mut TileStore,
    tree: &'a mut LayerTree,
    twin: Option<&'a mut LayerTree>,
    recycle: Option<&'a mut LayerTree>,
}

/// Owns the layer trees, the tile registry and the tiling configuration.
#[derive(Debug)]
pub struct TreeHost {
    settings: TilingSettings,
    tiles: TileStore,
    active: LayerTree,
    pending: Option<LayerTree>,
    recycle: Option<LayerTree>,
}

impl Default for TreeHost {
    fn default() -> Self {
        Self::new(TilingSettings::default())
    }
}

impl TreeHost {
    /// Creates a host with an empty active tree.
    #[must_use]
    pub fn new(settings: TilingSettings) -> Self {
        Self {
            settings,
            tiles: TileStore::new(),
            active: LayerTree::new(TreeKind::Active),
            pending: None,
            recycle: None,
        }
    }

    // -- Accessors --

    /// Tiling configuration.
    #[must_use]
    pub fn settings(&self) -> &TilingSettings {
        &self.settings
    }

    /// The tile registry.
    #[must_use]
    pub fn tiles(&self) -> &TileStore {
        &self.tiles
    }

    /// A tree, if it exists.
    #[must_use]
    pub fn tree(&self, kind: TreeKind) -> Option<&LayerTree> {
        match kind {
            TreeKind::Active => Some(&self.active),
            TreeKind::Pending => self.pending.as_ref(),
            TreeKind::Recycle => self.recycle.as_ref(),
        }
    }

    /// A layer on a tree, if both exist.
    #[must_use]
    pub fn layer(&self, kind: TreeKind, id: LayerId) -> Option<&PictureLayer> {
        self.tree(kind).and_then(|t| t.layer(id))
    }

    /// The layer's environment on `kind`, if that tree exists.
    #[must_use]
    pub fn env(&self, kind: TreeKind) -> Option<LayerEnv<'_>> {
        self.tree(kind).map(|t| LayerEnv {
            tree: kind,
            frame: &t.frame,
            settings: &self.settings,
        })
    }

    fn parts(&mut self, kind: TreeKind) -> Option<Parts<'_>> {
        let Self {
            settings,
            tiles,
            active,
            pending,
            recycle,
        } = self;
        let (tree, twin, recycle) = match kind {
            TreeKind::Active => (active, pending.as_mut(), recycle.as_mut()),
            TreeKind::Pending => (pending.as_mut()?, Some(active), recycle.as_mut()),
            TreeKind::Recycle => (recycle.as_mut()?, None, None),
        };
        Some(Parts {
            settings,
            tiles,
            tree,
            twin,
            recycle,
        })
    }

    // -- Commit --

    /// Commits new layer contents to the pending tree.
    ///
    /// The recycle tree, when there is one, becomes the pending tree so its
    /// layers keep their tilings. Each update replaces its layer's recording
    /// and adds to its invalidation. Layers missing from `updates` are
    /// dropped.
    pub fn commit(
        &mut self,
        source_frame_number: u64,
        updates: impl IntoIterator<Item = LayerUpdate>,
        tracer: &mut Tracer<'_>,
    ) {
        let mut pending = match (self.pending.take(), self.recycle.take()) {
            (Some(pending), recycle) => {
                if let Some(mut stale) = recycle {
                    stale.release_all(&mut self.tiles);
                }
                pending
            }
            (None, Some(mut recycle)) => {
                recycle.kind = TreeKind::Pending;
                recycle
            }
            (None, None) => LayerTree::new(TreeKind::Pending),
        };
        pending.frame = FrameState {
            source_frame_number,
            needs_update_draw_properties: true,
            ..self.active.frame
        };

        let env = LayerEnv {
            tree: TreeKind::Pending,
            frame: &pending.frame,
            settings: &self.settings,
        };
        let mut kept = BTreeMap::new();
        for update in updates {
            let mut layer = pending.layers.remove(&update.id).unwrap_or_else(|| {
                PictureLayer::new(update.id, Arc::clone(&update.raster_source))
            });
            layer.update_raster_source(update.raster_source);
            layer.set_bounds(update.bounds);
            layer.set_draws_content(update.draws_content);
            layer.set_is_mask(update.is_mask);
            for rect in update.invalidation.iter() {
                layer.invalidate(rect);
            }
            layer.update_tilings_to_current_raster_source(&env, &mut self.tiles);
            layer.did_commit();
            kept.insert(update.id, layer);
        }
        for (id, mut dropped) in core::mem::replace(&mut pending.layers, kept) {
            #[cfg(feature = "trace-rich")]
            for tiling in dropped.tilings().iter() {
                tracer.tiling(&TilingEvent {
                    frame_time: pending.frame.frame_time,
                    tree: TreeKind::Pending,
                    layer: id,
                    contents_scale: tiling.contents_scale(),
                    resolution: tiling.resolution(),
                    change: TilingChange::Removed,
                });
            }
            #[cfg(not(feature = "trace-rich"))]
            {
                _ = (id, &mut *tracer);
            }
            dropped.remove_all_tilings(&mut self.tiles);
        }
        self.pending = Some(pending);
    }

    /// Replaces a tree's frame state. Returns `false` if the tree does not
    /// exist.
    pub fn set_frame_state(&mut self, kind: TreeKind, frame: FrameState) -> bool {
        let tree = match kind {
            TreeKind::Active => Some(&mut self.active),
            TreeKind::Pending => self.pending.as_mut(),
            TreeKind::Recycle => self.recycle.as_mut(),
        };
        match tree {
            Some(tree) => {
                tree.frame = frame;
                true
            }
            None => false,
        }
    }

    /// Replaces a layer's draw properties. Returns `false` if the layer does
    /// not exist.
    pub fn set_draw_properties(&mut self, kind: TreeKind, id: LayerId, props: DrawProperties) -> bool {
        let Some(parts) = self.parts(kind) else {
            return false;
        };
        match parts.tree.layers.get_mut(&id) {
            Some(layer) => {
                layer.set_draw_properties(props);
                parts.tree.frame.needs_update_draw_properties = true;
                true
            }
            None => false,
        }
    }

    // -- Per-frame update --

    /// Runs the tile update of one layer.
    ///
    /// Recycle layers are never updated: their tiles are shared with the
    /// active tree and carry its priorities.
    pub fn update_tiles(
        &mut self,
        kind: TreeKind,
        id: LayerId,
        occlusion: &Occlusion,
        tracer: &mut Tracer<'_>,
    ) {
        if kind == TreeKind::Recycle {
            return;
        }
        let Some(Parts {
            settings,
            tiles,
            tree,
            twin,
            ..
        }) = self.parts(kind)
        else {
            return;
        };
        let (_, frame, layers) = tree.split();
        let Some(layer) = layers.get_mut(&id) else {
            return;
        };
        let env = LayerEnv {
            tree: kind,
            frame,
            settings,
        };
        let twin = twin.and_then(|t| {
            let (twin_kind, twin_frame, twin_layers) = t.split();
            twin_layers.get_mut(&id).map(|layer| TwinMut {
                layer,
                env: LayerEnv {
                    tree: twin_kind,
                    frame: twin_frame,
                    settings,
                },
            })
        });
        layer.update_tiles(&env, occlusion, twin, tiles, tracer);
    }

    /// Runs the tile update of every layer on a tree, then marks its draw
    /// properties current. Does nothing for the recycle tree.
    pub fn update_all_tiles(&mut self, kind: TreeKind, tracer: &mut Tracer<'_>) {
        if kind == TreeKind::Recycle {
            return;
        }
        let Some(tree) = self.tree(kind) else {
            return;
        };
        let ids: Vec<LayerId> = tree.layers.keys().copied().collect();
        let occlusion = Occlusion::none();
        for id in ids {
            self.update_tiles(kind, id, &occlusion, tracer);
        }
        if let Some(parts) = self.parts(kind) {
            parts.tree.frame.needs_update_draw_properties = false;
        }
    }

    // -- Activation --

    /// Pushes the pending tree onto the active tree.
    ///
    /// Every pending layer hands its tilings, recording and raster scales to
    /// the active layer with the same id, which is created if needed. Active
    /// layers without a pending counterpart are dropped. The former pending
    /// tree becomes the recycle tree. Returns `false` if there was nothing
    /// to activate.
    pub fn activate(&mut self, tracer: &mut Tracer<'_>) -> bool {
        let Some(mut pending) = self.pending.take() else {
            return false;
        };

        let tiles = &mut self.tiles;
        self.active.layers.retain(|id, layer| {
            let keep = pending.layers.contains_key(id);
            if !keep {
                layer.remove_all_tilings(tiles);
            }
            keep
        });

        let env = LayerEnv {
            tree: TreeKind::Pending,
            frame: &pending.frame,
            settings: &self.settings,
        };
        for (id, pending_layer) in &mut pending.layers {
            let active_layer = self
                .active
                .layers
                .entry(*id)
                .or_insert_with(|| PictureLayer::new(*id, Arc::clone(pending_layer.raster_source())));
            pending_layer.push_properties_to(&env, active_layer, tiles, tracer);
            active_layer.set_draw_properties(*pending_layer.draw_properties());
        }

        self.active.frame = pending.frame;
        self.active.frame.needs_update_draw_properties = true;
        pending.kind = TreeKind::Recycle;
        if let Some(mut stale) = self.recycle.replace(pending) {
            stale.release_all(tiles);
        }

        tracer.activation(&ActivationEvent {
            frame_time: self.active.frame.frame_time,
            source_frame_number: self.active.frame.source_frame_number,
            layer_count: count_u32(self.active.layers.len()),
        });
        true
    }

    // -- Tile lifecycle --

    /// Records a raster result.
    ///
    /// Results for tiles that no longer exist are ignored and return
    /// `false`. A tile that becomes ready on the active tree damages its
    /// layer.
    pub fn notify_tile_ready(&mut self, tile: TileId, info: DrawInfo) -> bool {
        if !self.tiles.complete_raster(tile, info) {
            return false;
        }
        let request = self.tiles.request(tile);
        let (layer_id, (i, j), scale, rect) = (
            request.layer,
            request.tiling_index,
            request.contents_scale,
            request.content_rect,
        );
        if let Some(layer) = self.active.layers.get_mut(&layer_id) {
            let on_active = layer
                .tilings()
                .find_tiling_with_scale(scale)
                .is_some_and(|t| t.tile_at(i, j) == Some(tile));
            if on_active {
                layer.notify_tile_ready(TreeKind::Active, rect, scale);
            }
        }
        true
    }

    /// Evicts a tile: its raster output is dropped and every tiling on every
    /// tree lets go of it, so later coverage queries report the cell as
    /// missing. Returns `false` for a stale handle.
    pub fn evict_tile(&mut self, tile: TileId, tracer: &mut Tracer<'_>) -> bool {
        if !self.tiles.is_alive(tile) {
            return false;
        }
        let layer_id = self.tiles.request(tile).layer;

        #[cfg(feature = "trace-rich")]
        tracer.tile_evicted(&TileEvictedEvent {
            frame_time: self.active.frame.frame_time,
            layer: layer_id,
            contents_scale: self.tiles.request(tile).contents_scale,
            bin: self
                .tiles
                .priority_for(tile, self.active.frame.tree_priority)
                .bin,
        });
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = tracer;
        }

        self.tiles.discard_raster(tile);
        let trees = [
            Some(&mut self.active),
            self.pending.as_mut(),
            self.recycle.as_mut(),
        ];
        for tree in trees.into_iter().flatten() {
            if !self.tiles.is_alive(tile) {
                break;
            }
            if let Some(layer) = tree.layers.get_mut(&layer_id) {
                layer.tilings_mut().remove_tile(tile, &mut self.tiles);
            }
        }
        true
    }

    /// Drops every tiling on a tree, as after losing the raster context.
    pub fn release_resources(&mut self, kind: TreeKind) {
        let Some(parts) = self.parts(kind) else {
            return;
        };
        for layer in parts.tree.layers.values_mut() {
            layer.release_resources(parts.tiles);
        }
    }

    /// Takes the damage an active layer accumulated from ready tiles.
    pub fn take_damage(&mut self, id: LayerId) -> Region {
        self.active
            .layers
            .get_mut(&id)
            .map(PictureLayer::take_damage)
            .unwrap_or_default()
    }

    // -- Queries --

    /// Pairs of active and pending layers with the same id.
    ///
    /// With `need_valid_tile_priorities`, layers whose priorities are
    /// meaningless this frame are left out, and pairs with neither side
    /// left are skipped.
    #[must_use]
    pub fn layer_pairs(&self, need_valid_tile_priorities: bool) -> Vec<LayerPair> {
        let valid = |kind: TreeKind, layer: &PictureLayer| {
            !need_valid_tile_priorities || layer.has_valid_tile_priorities(kind)
        };
        let mut pairs = Vec::new();
        for layer in self.active.layers() {
            let pending = self
                .layer(TreeKind::Pending, layer.id())
                .filter(|p| valid(TreeKind::Pending, p))
                .map(PictureLayer::id);
            let active = Some(layer.id()).filter(|_| valid(TreeKind::Active, layer));
            if active.is_some() || pending.is_some() {
                pairs.push(LayerPair { active, pending });
            }
        }
        if let Some(pending_tree) = &self.pending {
            for layer in pending_tree.layers() {
                if self.active.layer(layer.id()).is_none() && valid(TreeKind::Pending, layer) {
                    pairs.push(LayerPair {
                        active: None,
                        pending: Some(layer.id()),
                    });
                }
            }
        }
        pairs
    }

    /// Raster work for one layer, most urgent first.
    #[must_use]
    pub fn raster_iter(&self, kind: TreeKind, id: LayerId, prioritize_low_res: bool) -> LayerRasterIter {
        match self.layer(kind, id) {
            Some(layer) => LayerRasterIter::new(layer, kind, &self.tiles, prioritize_low_res),
            None => LayerRasterIter::empty(),
        }
    }

    /// Eviction candidates of one layer, cheapest to lose first.
    #[must_use]
    pub fn eviction_iter(&self, kind: TreeKind, id: LayerId, tree_priority: TreePriority) -> EvictionIter {
        match self.layer(kind, id) {
            Some(layer) => EvictionIter::new(layer, &self.tiles, tree_priority),
            None => EvictionIter::empty(),
        }
    }

    /// Whether the pending tree may activate: every tile it requires is
    /// ready. `true` when there is no pending tree.
    #[must_use]
    pub fn all_tiles_required_for_activation_are_ready(&self) -> bool {
        let Some(pending) = &self.pending else {
            return true;
        };
        pending.layers().all(|layer| {
            layer.all_tiles_required_for_activation_are_ready_to_draw(
                TreeKind::Pending,
                &pending.frame,
                &self.tiles,
            )
        })
    }

    /// Whether the active tree has every high-res tile it needs to draw.
    #[must_use]
    pub fn all_tiles_required_for_draw_are_ready(&self) -> bool {
        self.active.layers().all(|layer| {
            layer.all_tiles_required_for_draw_are_ready_to_draw(
                TreeKind::Active,
                &self.active.frame,
                &self.tiles,
            )
        })
    }

    /// Cleans up an active layer's tilings after it was drawn with
    /// `used_scales`.
    pub fn clean_up_tilings(&mut self, id: LayerId, used_scales: &[f64], tracer: &mut Tracer<'_>) {
        let Some(Parts {
            settings,
            tiles,
            tree,
            twin,
            recycle,
        }) = self.parts(TreeKind::Active)
        else {
            return;
        };
        let (_, frame, layers) = tree.split();
        let Some(layer) = layers.get_mut(&id) else {
            return;
        };
        let env = LayerEnv {
            tree: TreeKind::Active,
            frame,
            settings,
        };
        let twin = twin.and_then(|t| t.layers.get_mut(&id));
        let recycled = recycle.and_then(|t| t.layers.get_mut(&id));
        layer.clean_up_tilings_on_active_layer(&env, used_scales, twin, recycled, tiles, tracer);
    }

    /// Mutable access to an active layer and the tile store, for quad
    /// emission.
    pub fn active_layer_mut(&mut self, id: LayerId) -> Option<(&mut PictureLayer, &FrameState, &TileStore)> {
        let Self { tiles, active, .. } = self;
        let (_, frame, layers) = active.split();
        layers.get_mut(&id).map(|layer| (layer, frame, &*tiles))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "layer counts stay far below u32::MAX"
)]
fn count_u32(n: usize) -> u32 {
    n as u32
}
