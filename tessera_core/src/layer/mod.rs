// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Picture layers: tilings, scale selection, and cross-tree handoff.
//!
//! A [`PictureLayer`] owns one [`TilingSet`] and the raster source it tiles.
//! Each frame the tree host calls [`PictureLayer::update_tiles`], which
//!
//! 1. finishes post-commit initialization (mirroring the active twin),
//! 2. derives ideal scales from the draw properties,
//! 3. recalculates raster scales and adds tilings when they drift, and
//! 4. updates tile priorities against the tile priority viewport.
//!
//! Layers never hold references to each other. The twin, when there is one,
//! is the layer with the same [`LayerId`] on the opposite tree, and the host
//! passes it in explicitly.

mod scale;
mod sizing;

use alloc::sync::Arc;
use core::fmt;

use kurbo::{Affine, Rect, Size};

pub use sizing::TileSizing;

use crate::geometry::{self, Region};
use crate::occlusion::Occlusion;
use crate::raster_source::RasterSource;
use crate::settings::TilingSettings;
use crate::tile::{PriorityBin, TileId, TileResolution, TileStore, WhichTree};
use crate::tiling::{PriorityParams, TileContext};
use crate::tiling_set::TilingSet;
use crate::trace::{SyncEvent, TilePrioritiesEvent, Tracer};
use crate::tree::{FrameState, TreeKind};

/// Identifies a layer across trees.
///
/// A layer keeps its id through commit and activation, so the copies of one
/// logical layer on the pending, active and recycle trees share an id.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u32);

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

/// Whether a layer has caught up with its latest commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InitState {
    /// Committed but not yet synced with the active twin.
    NeedsPostCommitInit,
    /// Ready for use.
    Initialized,
}

/// Per-frame inputs from the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawProperties {
    /// Scale at which content would be pixel-exact on screen.
    pub ideal_contents_scale: f64,
    /// Page (pinch) scale factor.
    pub page_scale_factor: f64,
    /// Device pixel ratio.
    pub device_scale_factor: f64,
    /// Whether the screen-space transform is mid-animation.
    pub screen_space_transform_is_animating: bool,
    /// Largest contents scale the running animation reaches, or zero.
    pub maximum_animation_contents_scale: f64,
    /// Layer space to screen space.
    pub screen_space_transform: Affine,
    /// Visible part of the layer, in layer space.
    pub visible_content_rect: Rect,
    /// Whether the layer is drawn this frame.
    pub is_drawn: bool,
    /// Whether the layer's content is fully opaque.
    pub contents_opaque: bool,
}

impl Default for DrawProperties {
    fn default() -> Self {
        Self {
            ideal_contents_scale: 1.0,
            page_scale_factor: 1.0,
            device_scale_factor: 1.0,
            screen_space_transform_is_animating: false,
            maximum_animation_contents_scale: 0.0,
            screen_space_transform: Affine::IDENTITY,
            visible_content_rect: Rect::ZERO,
            is_drawn: true,
            contents_opaque: false,
        }
    }
}

/// The page/device/source/contents scale quadruple.
///
/// `contents` is normally `page × device × source`, clamped to the layer's
/// minimum contents scale. All zero means "not computed".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Scales {
    /// Page scale.
    pub page: f64,
    /// Device scale.
    pub device: f64,
    /// Source (transform) scale.
    pub source: f64,
    /// Effective contents scale.
    pub contents: f64,
}

/// What a layer needs to know about the tree it lives on.
#[derive(Clone, Copy, Debug)]
pub struct LayerEnv<'a> {
    /// The tree.
    pub tree: TreeKind,
    /// The tree's frame state.
    pub frame: &'a FrameState,
    /// Tiling configuration.
    pub settings: &'a TilingSettings,
}

impl LayerEnv<'_> {
    /// Cell sizing for a layer on this tree.
    #[must_use]
    pub fn sizing(&self, is_mask: bool) -> TileSizing<'_> {
        TileSizing {
            settings: self.settings,
            device_viewport: self.frame.device_viewport.size(),
            use_gpu_rasterization: self.frame.use_gpu_rasterization,
            is_mask,
        }
    }

    /// Whether new low-res tilings may be created.
    #[must_use]
    pub fn create_low_res_tiling(&self) -> bool {
        self.settings.create_low_res_tiling && !self.frame.use_gpu_rasterization
    }

    /// How far ahead the skewport extrapolates, in seconds.
    #[must_use]
    pub fn skewport_target_time_secs(&self) -> f64 {
        let frames = if self.frame.use_gpu_rasterization {
            self.settings.gpu_skewport_target_time_in_frames
        } else {
            self.settings.cpu_skewport_target_time_in_frames
        };
        frames
            * self.frame.begin_frame_interval.as_secs_f64(self.frame.timebase)
            * self.settings.skewport_target_time_multiplier
    }
}

/// A layer's twin, borrowed mutably along with its own environment.
#[derive(Debug)]
pub struct TwinMut<'a> {
    /// The twin layer.
    pub layer: &'a mut PictureLayer,
    /// The twin's tree.
    pub env: LayerEnv<'a>,
}

/// A tiled layer backed by a recorded picture.
#[derive(Clone, Debug)]
pub struct PictureLayer {
    id: LayerId,
    bounds: Size,
    raster_source: Arc<RasterSource>,
    invalidation: Region,
    draws_content: bool,
    is_mask: bool,
    draw_properties: DrawProperties,
    tilings: TilingSet,

    ideal: Scales,
    raster: Scales,
    low_res_raster_contents_scale: f64,
    raster_source_scale_is_fixed: bool,
    was_screen_space_transform_animating: bool,

    init_state: InitState,
    should_update_tile_priorities: bool,
    only_used_low_res_last_append_quads: bool,
    visible_rect_for_tile_priority: Rect,
    damage: Region,
    twin: Option<LayerId>,
}

impl PictureLayer {
    /// Creates a layer that still needs post-commit initialization.
    #[must_use]
    pub fn new(id: LayerId, raster_source: Arc<RasterSource>) -> Self {
        Self {
            id,
            bounds: raster_source.size(),
            raster_source,
            invalidation: Region::new(),
            draws_content: true,
            is_mask: false,
            draw_properties: DrawProperties::default(),
            tilings: TilingSet::new(),
            ideal: Scales::default(),
            raster: Scales::default(),
            low_res_raster_contents_scale: 0.0,
            raster_source_scale_is_fixed: false,
            was_screen_space_transform_animating: false,
            init_state: InitState::NeedsPostCommitInit,
            should_update_tile_priorities: false,
            only_used_low_res_last_append_quads: false,
            visible_rect_for_tile_priority: Rect::ZERO,
            damage: Region::new(),
            twin: None,
        }
    }

    // -- Accessors --

    /// The layer's id.
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Layer bounds.
    #[must_use]
    pub fn bounds(&self) -> Size {
        self.bounds
    }

    /// Sets the layer bounds.
    pub fn set_bounds(&mut self, bounds: Size) {
        self.bounds = bounds;
    }

    /// Current recording.
    #[must_use]
    pub fn raster_source(&self) -> &Arc<RasterSource> {
        &self.raster_source
    }

    /// Invalidation accumulated since the last activation.
    #[must_use]
    pub fn invalidation(&self) -> &Region {
        &self.invalidation
    }

    /// Adds a layer-space rect to the invalidation.
    pub fn invalidate(&mut self, rect: Rect) {
        self.invalidation.union_rect(rect);
    }

    /// Whether the layer draws anything.
    #[must_use]
    pub fn draws_content(&self) -> bool {
        self.draws_content
    }

    /// Sets whether the layer draws anything.
    pub fn set_draws_content(&mut self, draws_content: bool) {
        self.draws_content = draws_content;
    }

    /// Whether the layer is a mask.
    #[must_use]
    pub fn is_mask(&self) -> bool {
        self.is_mask
    }

    /// Marks the layer as a mask.
    pub fn set_is_mask(&mut self, is_mask: bool) {
        self.is_mask = is_mask;
    }

    /// Per-frame scene inputs.
    #[must_use]
    pub fn draw_properties(&self) -> &DrawProperties {
        &self.draw_properties
    }

    /// Replaces the per-frame scene inputs.
    pub fn set_draw_properties(&mut self, props: DrawProperties) {
        self.draw_properties = props;
    }

    /// The tiling set.
    #[must_use]
    pub fn tilings(&self) -> &TilingSet {
        &self.tilings
    }

    /// Mutable tiling set, for eviction.
    pub(crate) fn tilings_mut(&mut self) -> &mut TilingSet {
        &mut self.tilings
    }

    /// Ideal scales from the last update.
    #[must_use]
    pub fn ideal_scales(&self) -> Scales {
        self.ideal
    }

    /// Raster scales, all zero when not computed.
    #[must_use]
    pub fn raster_scales(&self) -> Scales {
        self.raster
    }

    /// The raster contents scale.
    ///
    /// # Panics
    ///
    /// Panics if raster scales have not been computed.
    #[must_use]
    pub fn raster_contents_scale(&self) -> f64 {
        assert!(
            self.raster.contents > 0.0,
            "raster scale of {:?} read before it was computed",
            self.id
        );
        self.raster.contents
    }

    /// The low-res companion scale (zero when not computed).
    #[must_use]
    pub fn low_res_raster_contents_scale(&self) -> f64 {
        self.low_res_raster_contents_scale
    }

    /// Whether the source scale is pinned at 1.
    #[must_use]
    pub fn raster_source_scale_is_fixed(&self) -> bool {
        self.raster_source_scale_is_fixed
    }

    /// Post-commit initialization state.
    #[must_use]
    pub fn init_state(&self) -> InitState {
        self.init_state
    }

    /// Whether the last quad emission drew only low-res tiles.
    #[must_use]
    pub fn only_used_low_res_last_append_quads(&self) -> bool {
        self.only_used_low_res_last_append_quads
    }

    /// Records whether the last quad emission drew only low-res tiles.
    pub fn set_only_used_low_res_last_append_quads(&mut self, only_low_res: bool) {
        self.only_used_low_res_last_append_quads = only_low_res;
    }

    /// Visible rect captured at the last tile update.
    #[must_use]
    pub fn visible_rect_for_tile_priority(&self) -> Rect {
        self.visible_rect_for_tile_priority
    }

    /// The twin's id, once a twin relationship exists.
    #[must_use]
    pub fn twin(&self) -> Option<LayerId> {
        self.twin
    }

    /// Takes the damage accumulated from tiles becoming ready.
    pub fn take_damage(&mut self) -> Region {
        core::mem::take(&mut self.damage)
    }

    // -- Capability checks --

    /// Whether the layer may hold tilings at all.
    ///
    /// Solid-color recordings, layers that draw nothing and sources without
    /// recordings never get tilings.
    #[must_use]
    pub fn can_have_tilings(&self) -> bool {
        !self.raster_source.is_solid_color()
            && self.draws_content
            && self.raster_source.has_recordings()
    }

    /// Whether a tiling at `contents_scale` is allowed.
    #[must_use]
    pub fn can_have_tiling_with_scale(&self, contents_scale: f64, settings: &TilingSettings) -> bool {
        self.can_have_tilings() && contents_scale >= self.minimum_contents_scale(settings)
    }

    /// Smallest scale that keeps at least one content pixel along the
    /// shorter side, and never below the configured floor.
    #[must_use]
    pub fn minimum_contents_scale(&self, settings: &TilingSettings) -> f64 {
        let size = self.raster_source.size();
        let min_dimension = size.width.min(size.height);
        if min_dimension <= 0.0 {
            return settings.minimum_contents_scale;
        }
        (1.0 / min_dimension).max(settings.minimum_contents_scale)
    }

    /// Largest tiling scale, floored at the minimum contents scale.
    #[must_use]
    pub fn maximum_tiling_contents_scale(&self, settings: &TilingSettings) -> f64 {
        self.tilings
            .maximum_contents_scale()
            .max(self.minimum_contents_scale(settings))
    }

    /// Whether the layer's priorities mean anything this frame.
    #[must_use]
    pub fn has_valid_tile_priorities(&self, tree: TreeKind) -> bool {
        tree != TreeKind::Recycle && self.draw_properties.is_drawn
    }

    // -- Commit and activation --

    /// Swaps in a new recording. Returns whether that changed
    /// [`can_have_tilings`](Self::can_have_tilings).
    pub fn update_raster_source(&mut self, raster_source: Arc<RasterSource>) -> bool {
        let could_have_tilings = self.can_have_tilings();
        self.raster_source = raster_source;
        could_have_tilings != self.can_have_tilings()
    }

    /// Adapts existing tilings to the current recording and invalidation,
    /// or drops them when the layer can no longer have tilings.
    pub fn update_tilings_to_current_raster_source(
        &mut self,
        env: &LayerEnv<'_>,
        tiles: &mut TileStore,
    ) {
        if !self.can_have_tilings() {
            self.remove_all_tilings(tiles);
            return;
        }
        let sizing = env.sizing(self.is_mask);
        self.tilings.update_tilings_to_current_raster_source(
            self.raster_source.size(),
            |bounds| sizing.tile_size(bounds),
            &self.invalidation,
            tiles,
        );
    }

    /// Marks the layer as freshly committed.
    pub fn did_commit(&mut self) {
        self.init_state = InitState::NeedsPostCommitInit;
    }

    /// Removes every tiling and forgets the raster scales.
    pub fn remove_all_tilings(&mut self, tiles: &mut TileStore) {
        self.tilings.remove_all_tilings(tiles);
        self.reset_raster_scale();
    }

    /// Drops everything tied to GPU resources, as after a lost context.
    pub fn release_resources(&mut self, tiles: &mut TileStore) {
        self.remove_all_tilings(tiles);
    }

    /// Finishes post-commit initialization, mirroring `twin` when it is
    /// initialized itself.
    pub fn do_post_commit_initialization_if_needed(
        &mut self,
        env: &LayerEnv<'_>,
        twin: Option<&Self>,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) {
        if self.init_state == InitState::Initialized {
            return;
        }
        if let Some(twin) = twin.filter(|t| t.init_state == InitState::Initialized) {
            self.sync_from_active_layer(env, twin, tiles, tracer);
        }
        self.init_state = InitState::Initialized;
    }

    /// Inherits raster scales and tilings from the active twin.
    ///
    /// Tiles are not copied; they are recreated lazily and shared with the
    /// twin where this layer's invalidation allows. When the twin's high-res
    /// tiling cannot be mirrored (the minimum scale grew past it), raster
    /// scales are reset and recomputed on the next update.
    pub fn sync_from_active_layer(
        &mut self,
        env: &LayerEnv<'_>,
        other: &Self,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) {
        assert!(
            other.init_state == InitState::Initialized,
            "cannot sync {:?} from an uninitialized twin",
            self.id
        );
        if !self.draws_content {
            self.remove_all_tilings(tiles);
            return;
        }

        self.raster = other.raster;
        self.low_res_raster_contents_scale = other.low_res_raster_contents_scale;

        let synced_high_res = if self.can_have_tilings() {
            let sizing = env.sizing(self.is_mask);
            let minimum = self.minimum_contents_scale(env.settings);
            self.tilings.sync_tilings(
                &other.tilings,
                self.raster_source.size(),
                |bounds| sizing.tile_size(bounds),
                &self.invalidation,
                minimum,
                tiles,
            )
        } else {
            self.tilings.remove_all_tilings(tiles);
            false
        };

        if synced_high_res {
            self.sanity_check_tiling_state(env.tree);
        } else {
            self.reset_raster_scale();
        }

        tracer.sync(&SyncEvent {
            frame_time: env.frame.frame_time,
            layer: self.id,
            synced_high_res,
            num_tilings: count_u32(self.tilings.num_tilings()),
        });
    }

    /// Adds a tiling the twin just created, when this layer can have it.
    ///
    /// If this tree's draw properties are current, priorities are updated
    /// right away so the new tiling gets tiles.
    pub fn sync_tiling(
        &mut self,
        env: &LayerEnv<'_>,
        contents_scale: f64,
        twin: &Self,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) {
        if !self.can_have_tiling_with_scale(contents_scale, env.settings)
            || self.tilings.find_tiling_with_scale(contents_scale).is_some()
        {
            return;
        }
        let bounds = self.raster_source.size();
        let tile_size = env
            .sizing(self.is_mask)
            .tile_size(geometry::ceiled_size(bounds, contents_scale));
        self.tilings.add_tiling(contents_scale, bounds, tile_size);
        if !env.frame.needs_update_draw_properties && self.should_update_tile_priorities {
            self.update_tile_priorities(env, &Occlusion::none(), Some(twin), tiles, tracer);
        }
    }

    /// Hands this pending layer's state to the active layer.
    ///
    /// Establishes the twin link, pushes the recording, swaps the tiling
    /// sets, copies raster scales and moves the invalidation across. Tiles
    /// that only this layer's old set could see are dropped: all of them for
    /// a solid-color recording, and those touching the invalidation
    /// otherwise.
    ///
    /// # Panics
    ///
    /// Panics if either layer already has a different twin.
    pub fn push_properties_to(
        &mut self,
        env: &LayerEnv<'_>,
        active: &mut Self,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) {
        self.do_post_commit_initialization_if_needed(env, Some(&*active), tiles, tracer);

        assert!(
            self.twin.is_none_or(|t| t == active.id) && active.twin.is_none_or(|t| t == self.id),
            "twin relationship of {:?} cannot be reassigned",
            self.id
        );
        self.twin = Some(active.id);
        active.twin = Some(self.id);

        active.is_mask = self.is_mask;
        active.bounds = self.bounds;
        active.draws_content = self.draws_content;
        active.update_raster_source(Arc::clone(&self.raster_source));

        assert!(
            !self.raster_source.is_solid_color() || self.tilings.is_empty(),
            "solid color layer {:?} has tilings",
            self.id
        );
        core::mem::swap(&mut self.tilings, &mut active.tilings);
        self.tilings.did_become_recycled(tiles);
        active.tilings.did_become_active(tiles);

        if self.raster_source.is_solid_color() {
            self.tilings.remove_all_tilings(tiles);
        }
        self.tilings.remove_tiles_in_region(&self.invalidation, tiles);

        active.raster = self.raster;
        active.low_res_raster_contents_scale = self.low_res_raster_contents_scale;
        active.init_state = InitState::Initialized;

        active.invalidation = core::mem::take(&mut self.invalidation);
        self.init_state = InitState::NeedsPostCommitInit;
    }

    // -- Per-frame update --

    /// Runs the per-frame tile update. Recycle layers are left alone.
    pub fn update_tiles(
        &mut self,
        env: &LayerEnv<'_>,
        occlusion: &Occlusion,
        mut twin: Option<TwinMut<'_>>,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) {
        if env.tree == TreeKind::Recycle {
            return;
        }
        self.do_post_commit_initialization_if_needed(
            env,
            twin.as_ref().map(|t| &*t.layer),
            tiles,
            tracer,
        );

        if !env.frame.resourceless_software_draw {
            self.visible_rect_for_tile_priority = self.draw_properties.visible_content_rect;
        }

        if !self.can_have_tilings() {
            self.ideal = Scales::default();
            // Commit and activation already dropped the tilings.
            self.sanity_check_tiling_state(env.tree);
            return;
        }

        self.update_ideal_scales(env);

        debug_assert!(
            !self.tilings.is_empty() || self.raster.contents == 0.0,
            "a layer with no tilings must not have raster scales"
        );
        if self.raster.contents == 0.0 || self.should_adjust_raster_scale(env) {
            self.recalculate_raster_scales(env, tracer);
            self.add_tilings_for_raster_scale(env, twin.as_mut(), tiles, tracer);
        }
        assert!(
            self.raster.page > 0.0
                && self.raster.device > 0.0
                && self.raster.source > 0.0
                && self.raster.contents > 0.0
                && self.low_res_raster_contents_scale > 0.0,
            "raster scales of {:?} used before they were computed",
            self.id
        );

        self.was_screen_space_transform_animating =
            self.draw_properties.screen_space_transform_is_animating;
        self.should_update_tile_priorities = true;

        self.update_tile_priorities(env, occlusion, twin.as_ref().map(|t| &*t.layer), tiles, tracer);
    }

    /// Recomputes tile priorities for every tiling. Returns whether anything
    /// changed.
    pub fn update_tile_priorities(
        &mut self,
        env: &LayerEnv<'_>,
        occlusion: &Occlusion,
        twin: Option<&Self>,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) -> bool {
        if env.tree == TreeKind::Recycle {
            return false;
        }
        assert!(
            !self.raster_source.is_solid_color() || self.tilings.is_empty(),
            "solid color layer {:?} has tilings",
            self.id
        );
        let viewport = self.viewport_for_tile_priority_in_content_space(env.frame);
        let can_require_tiles_for_activation = !self.only_used_low_res_last_append_quads
            || env.frame.requires_high_res_to_draw
            || !env.frame.smoothness_takes_priority();
        let tree = match env.tree {
            TreeKind::Pending => WhichTree::Pending,
            TreeKind::Active | TreeKind::Recycle => WhichTree::Active,
        };
        let max_bin = if self.has_valid_tile_priorities(env.tree) {
            PriorityBin::Now
        } else {
            PriorityBin::Eventually
        };

        let Self {
            id,
            raster_source,
            invalidation,
            is_mask,
            tilings,
            ideal,
            ..
        } = self;
        let pending_invalidation = match env.tree {
            TreeKind::Pending => Some(&*invalidation),
            TreeKind::Active => twin.map(|t| &t.invalidation),
            TreeKind::Recycle => None,
        };
        let ctx = TileContext {
            raster_source,
            layer: *id,
            source_frame_number: env.frame.source_frame_number,
            is_mask: *is_mask,
            pending_invalidation,
            twin: twin.map(|t| &t.tilings),
        };
        let params = PriorityParams {
            settings: env.settings,
            viewport_in_layer_space: viewport,
            ideal_contents_scale: ideal.contents,
            frame_time: env.frame.frame_time,
            timebase: env.frame.timebase,
            skewport_target_time_secs: env.skewport_target_time_secs(),
            occlusion,
            tree,
            can_require_tiles_for_activation,
            requires_high_res_to_draw: env.frame.requires_high_res_to_draw,
            max_bin,
        };
        let updated = tilings.update_tile_priorities(&params, tiles, &ctx);

        if updated {
            let mut event = TilePrioritiesEvent {
                frame_time: env.frame.frame_time,
                tree: env.tree,
                layer: *id,
                ..TilePrioritiesEvent::default()
            };
            for tile in tilings.tiles() {
                match tiles.priority(tile, tree).bin {
                    PriorityBin::Now => event.now += 1,
                    PriorityBin::Soon => event.soon += 1,
                    PriorityBin::Eventually => event.eventually += 1,
                }
                if tiles.required_for_activation(tile) {
                    event.required_for_activation += 1;
                }
            }
            tracer.tile_priorities(&event);
        }
        updated
    }

    /// Viewport for tile priority, in layer space.
    ///
    /// This is the visible rect, unless it is empty or the tree's priority
    /// viewport differs from the device viewport. Then the priority viewport
    /// is mapped back through the screen-space transform; a transform that
    /// cannot be inverted keeps the visible rect.
    #[must_use]
    pub fn viewport_for_tile_priority_in_content_space(&self, frame: &FrameState) -> Rect {
        let visible = self.visible_rect_for_tile_priority;
        let viewport = frame.viewport_rect_for_tile_priority;
        if !geometry::is_empty(visible) && frame.device_viewport == viewport {
            return visible;
        }
        let transform = self.draw_properties.screen_space_transform;
        if transform.determinant() == 0.0 {
            return visible;
        }
        geometry::enclosing(transform.inverse().transform_rect_bbox(viewport))
    }

    /// Accumulates layer-space damage for a tile that became ready.
    pub fn notify_tile_ready(&mut self, tree: TreeKind, content_rect: Rect, contents_scale: f64) {
        if tree == TreeKind::Active {
            self.damage
                .union_rect(geometry::scale_to_enclosing(content_rect, 1.0 / contents_scale));
        }
    }

    // -- Readiness --

    /// On the pending tree, whether every high-res tile that blocks
    /// activation is ready. Always `true` on other trees.
    #[must_use]
    pub fn all_tiles_required_for_activation_are_ready_to_draw(
        &self,
        tree: TreeKind,
        frame: &FrameState,
        tiles: &TileStore,
    ) -> bool {
        tree != TreeKind::Pending
            || self.all_tiles_required_are_ready_to_draw(tree, frame, tiles, |t| {
                tiles.required_for_activation(t)
            })
    }

    /// On the active tree, whether every high-res tile needed to draw is
    /// ready. Always `true` on other trees.
    #[must_use]
    pub fn all_tiles_required_for_draw_are_ready_to_draw(
        &self,
        tree: TreeKind,
        frame: &FrameState,
        tiles: &TileStore,
    ) -> bool {
        tree != TreeKind::Active
            || self.all_tiles_required_are_ready_to_draw(tree, frame, tiles, |t| {
                tiles.required_for_draw(t)
            })
    }

    fn all_tiles_required_are_ready_to_draw(
        &self,
        tree: TreeKind,
        frame: &FrameState,
        tiles: &TileStore,
        is_required: impl Fn(TileId) -> bool,
    ) -> bool {
        if !self.has_valid_tile_priorities(tree)
            || geometry::is_empty(self.visible_rect_for_tile_priority)
        {
            return true;
        }
        let rect = geometry::intersect(
            self.viewport_for_tile_priority_in_content_space(frame),
            self.visible_rect_for_tile_priority,
        );
        let Some(tiling) = self.tilings.find_tiling_with_resolution(TileResolution::High) else {
            return true;
        };
        tiling
            .coverage(1.0, rect)
            .filter_map(|piece| piece.tile)
            .all(|tile| !is_required(tile) || tiles.draw_info(tile).is_ready_to_draw())
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "tiling and tile counts stay far below u32::MAX"
)]
fn count_u32(n: usize) -> u32 {
    n as u32
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use kurbo::Vec2;

    use super::*;
    use crate::raster_source::Color;
    use crate::tile::{DrawInfo, ResourceKey};

    fn layer(size: Size) -> PictureLayer {
        let mut layer = PictureLayer::new(LayerId(3), RasterSource::fully_recorded(size).shared());
        layer.set_draw_properties(DrawProperties {
            visible_content_rect: Rect::new(0.0, 0.0, 300.0, 300.0),
            ..DrawProperties::default()
        });
        layer
    }

    fn env<'a>(tree: TreeKind, frame: &'a FrameState, settings: &'a TilingSettings) -> LayerEnv<'a> {
        LayerEnv {
            tree,
            frame,
            settings,
        }
    }

    #[test]
    fn minimum_contents_scale_keeps_one_pixel() {
        let settings = TilingSettings::desktop();
        assert_eq!(layer(Size::new(10.0, 1000.0)).minimum_contents_scale(&settings), 0.1);
        assert_eq!(
            layer(Size::new(1000.0, 1000.0)).minimum_contents_scale(&settings),
            settings.minimum_contents_scale
        );
        assert_eq!(
            layer(Size::new(0.0, 1000.0)).minimum_contents_scale(&settings),
            settings.minimum_contents_scale
        );
    }

    #[test]
    fn tiling_gate() {
        assert!(layer(Size::new(100.0, 100.0)).can_have_tilings());

        let mut hidden = layer(Size::new(100.0, 100.0));
        hidden.set_draws_content(false);
        assert!(!hidden.can_have_tilings());

        let empty = PictureLayer::new(LayerId(1), RasterSource::empty(Size::new(100.0, 100.0)).shared());
        assert!(!empty.can_have_tilings());

        let mut solid = layer(Size::new(100.0, 100.0));
        let changed =
            solid.update_raster_source(RasterSource::solid(Size::new(100.0, 100.0), Color::WHITE).shared());
        assert!(changed);
        assert!(!solid.can_have_tilings());
    }

    #[test]
    fn priority_viewport_defaults_to_visible_rect() {
        let frame = FrameState::default();
        let mut l = layer(Size::new(1000.0, 1000.0));
        l.visible_rect_for_tile_priority = Rect::new(10.0, 10.0, 200.0, 200.0);
        assert_eq!(
            l.viewport_for_tile_priority_in_content_space(&frame),
            Rect::new(10.0, 10.0, 200.0, 200.0)
        );
    }

    #[test]
    fn overridden_priority_viewport_maps_through_inverse_transform() {
        let frame = FrameState {
            viewport_rect_for_tile_priority: Rect::new(0.0, 0.0, 100.0, 100.0),
            ..FrameState::default()
        };
        let mut l = layer(Size::new(1000.0, 1000.0));
        l.visible_rect_for_tile_priority = Rect::new(0.0, 0.0, 300.0, 300.0);
        l.draw_properties.screen_space_transform =
            Affine::translate(Vec2::new(20.0, 0.0)) * Affine::scale(2.0);
        assert_eq!(
            l.viewport_for_tile_priority_in_content_space(&frame),
            Rect::new(-10.0, 0.0, 40.0, 50.0)
        );

        l.draw_properties.screen_space_transform = Affine::scale_non_uniform(0.0, 1.0);
        assert_eq!(
            l.viewport_for_tile_priority_in_content_space(&frame),
            Rect::new(0.0, 0.0, 300.0, 300.0)
        );
    }

    #[test]
    fn damage_accumulates_on_active_tree_only() {
        let mut l = layer(Size::new(1000.0, 1000.0));
        l.notify_tile_ready(TreeKind::Pending, Rect::new(0.0, 0.0, 256.0, 256.0), 1.0);
        assert!(l.take_damage().is_empty());
        l.notify_tile_ready(TreeKind::Active, Rect::new(0.0, 0.0, 256.0, 256.0), 2.0);
        assert_eq!(l.take_damage().bounds(), Rect::new(0.0, 0.0, 128.0, 128.0));
    }

    #[test]
    fn required_for_draw_only_when_high_res_is_mandatory() {
        let settings = TilingSettings::desktop();
        let mut frame = FrameState {
            requires_high_res_to_draw: true,
            ..FrameState::default()
        };
        let mut tiles = TileStore::new();
        let mut l = layer(Size::new(2000.0, 2000.0));
        l.update_tiles(
            &env(TreeKind::Active, &frame, &settings),
            &Occlusion::none(),
            None,
            &mut tiles,
            &mut Tracer::none(),
        );
        assert!(!l.all_tiles_required_for_draw_are_ready_to_draw(TreeKind::Active, &frame, &tiles));
        // Other trees never block on draw readiness.
        assert!(l.all_tiles_required_for_draw_are_ready_to_draw(TreeKind::Pending, &frame, &tiles));

        let ids: Vec<TileId> = tiles.iter().collect();
        for id in ids {
            tiles.complete_raster(
                id,
                DrawInfo::Resource {
                    resource: ResourceKey(1),
                    contents_swizzled: false,
                },
            );
        }
        assert!(l.all_tiles_required_for_draw_are_ready_to_draw(TreeKind::Active, &frame, &tiles));

        frame.requires_high_res_to_draw = false;
        frame.frame_time.0 += 1;
        let mut fresh = TileStore::new();
        let mut relaxed = layer(Size::new(2000.0, 2000.0));
        relaxed.update_tiles(
            &env(TreeKind::Active, &frame, &settings),
            &Occlusion::none(),
            None,
            &mut fresh,
            &mut Tracer::none(),
        );
        assert!(relaxed.all_tiles_required_for_draw_are_ready_to_draw(
            TreeKind::Active,
            &frame,
            &fresh
        ));
    }

    #[test]
    fn push_hands_tilings_and_invalidation_to_active() {
        let settings = TilingSettings::desktop();
        let frame = FrameState::default();
        let mut tiles = TileStore::new();
        let mut pending = layer(Size::new(2000.0, 2000.0));
        pending.update_tiles(
            &env(TreeKind::Pending, &frame, &settings),
            &Occlusion::none(),
            None,
            &mut tiles,
            &mut Tracer::none(),
        );
        pending.invalidate(Rect::new(0.0, 0.0, 10.0, 10.0));

        let mut active = PictureLayer::new(pending.id(), Arc::clone(pending.raster_source()));
        pending.push_properties_to(
            &env(TreeKind::Pending, &frame, &settings),
            &mut active,
            &mut tiles,
            &mut Tracer::none(),
        );

        assert!(pending.tilings().is_empty());
        assert_eq!(active.tiling_scales(), alloc::vec![1.0, 0.25]);
        assert!(pending.invalidation().is_empty());
        assert_eq!(active.invalidation().bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(active.init_state(), InitState::Initialized);
        assert_eq!(pending.init_state(), InitState::NeedsPostCommitInit);
        assert_eq!(pending.twin(), Some(active.id()));
        assert_eq!(active.raster_scales(), pending.raster_scales());
    }

    #[test]
    #[should_panic(expected = "cannot be reassigned")]
    fn twin_reassignment_panics() {
        let settings = TilingSettings::desktop();
        let frame = FrameState::default();
        let mut tiles = TileStore::new();
        let mut pending = layer(Size::new(100.0, 100.0));
        pending.twin = Some(LayerId(99));
        let mut active = layer(Size::new(100.0, 100.0));
        pending.push_properties_to(
            &env(TreeKind::Pending, &frame, &settings),
            &mut active,
            &mut tiles,
            &mut Tracer::none(),
        );
    }

    #[test]
    fn sync_resets_scales_when_high_res_falls_below_minimum() {
        let settings = TilingSettings::desktop();
        let frame = FrameState::default();
        let mut tiles = TileStore::new();
        let mut active = layer(Size::new(2000.0, 2000.0));
        active.draw_properties.ideal_contents_scale = 0.1;
        active.update_tiles(
            &env(TreeKind::Active, &frame, &settings),
            &Occlusion::none(),
            None,
            &mut tiles,
            &mut Tracer::none(),
        );
        assert_eq!(active.raster_contents_scale(), 0.1);

        // A 5px-tall recording needs at least scale 0.2.
        let mut pending = PictureLayer::new(
            active.id(),
            RasterSource::fully_recorded(Size::new(2000.0, 5.0)).shared(),
        );
        pending.sync_from_active_layer(
            &env(TreeKind::Pending, &frame, &settings),
            &active,
            &mut tiles,
            &mut Tracer::none(),
        );
        assert!(pending.tilings().is_empty());
        assert_eq!(pending.raster_scales(), Scales::default());
    }
}
