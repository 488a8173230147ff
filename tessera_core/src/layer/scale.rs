// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raster scale selection and tiling maintenance.
//!
//! Every frame a layer compares its ideal scales (what would be pixel-exact
//! right now) with its raster scales (what its tilings were built for) and
//! decides whether new tilings are worth the raster cost. Pinch gestures step
//! the scale in fixed ratios, animations raster once at their worst case, and
//! a layer whose transform scale keeps changing pins its source scale at 1.

use alloc::vec::Vec;

use crate::geometry;
use crate::tile::{TileResolution, TileStore};
use crate::trace::{RasterScaleEvent, Tracer};
#[cfg(feature = "trace-rich")]
use crate::trace::{TilingChange, TilingEvent};
use crate::tree::TreeKind;

use super::{LayerEnv, PictureLayer, Scales, TwinMut};

impl PictureLayer {
    /// Derives the ideal scales from the draw properties.
    ///
    /// The contents scale is floored at the layer's minimum contents scale,
    /// and the source scale at that minimum divided by the minimum page
    /// scale.
    ///
    /// # Panics
    ///
    /// Panics if the layer cannot have tilings or the tree's minimum page
    /// scale is not positive.
    pub fn update_ideal_scales(&mut self, env: &LayerEnv<'_>) {
        assert!(self.can_have_tilings(), "ideal scales of {:?} need tilings", self.id);
        let min_page_scale = env.frame.min_page_scale_factor;
        assert!(min_page_scale > 0.0, "minimum page scale must be positive");

        let min_contents_scale = self.minimum_contents_scale(env.settings);
        let min_source_scale = min_contents_scale / min_page_scale;

        let props = &self.draw_properties;
        let ideal_source =
            props.ideal_contents_scale / props.page_scale_factor / props.device_scale_factor;
        self.ideal = Scales {
            page: props.page_scale_factor,
            device: props.device_scale_factor,
            source: ideal_source.max(min_source_scale),
            contents: props.ideal_contents_scale.max(min_contents_scale),
        };
    }

    /// Whether the raster scales have drifted far enough from the ideal
    /// scales to pick new ones.
    #[must_use]
    pub fn should_adjust_raster_scale(&self, env: &LayerEnv<'_>) -> bool {
        let animating = self.draw_properties.screen_space_transform_is_animating;
        if self.was_screen_space_transform_animating != animating {
            return true;
        }
        if animating
            && self.raster.contents != self.ideal.contents
            && adjusts_during_scale_animations(env)
        {
            return true;
        }

        let pinching = env.frame.pinch_gesture_active;
        if pinching && self.raster.page != 0.0 {
            let ratio = self.ideal.page / self.raster.page;
            if self.raster.page > self.ideal.page
                || ratio > env.settings.max_scale_ratio_during_pinch
            {
                return true;
            }
        }
        if !pinching && self.raster.page != self.ideal.page {
            return true;
        }

        if self.raster.device != self.ideal.device {
            return true;
        }

        !animating
            && !self.raster_source_scale_is_fixed
            && self.raster.source != self.ideal.source
    }

    /// Picks new raster scales from the ideal scales.
    pub fn recalculate_raster_scales(&mut self, env: &LayerEnv<'_>, tracer: &mut Tracer<'_>) {
        let old = self.raster;
        let animating = self.draw_properties.screen_space_transform_is_animating;
        let pinching = env.frame.pinch_gesture_active;

        self.raster = self.ideal;

        if old.source != 0.0
            && !animating
            && !self.was_screen_space_transform_animating
            && old.source != self.ideal.source
        {
            self.raster_source_scale_is_fixed = true;
        }
        if self.raster_source_scale_is_fixed {
            self.raster.contents /= self.raster.source;
            self.raster.source = 1.0;
        }

        if pinching && old.contents != 0.0 {
            let desired = pinch_target_scale(
                old.contents,
                self.ideal.contents,
                env.settings.max_scale_ratio_during_pinch,
                old.page > self.ideal.page,
            );
            self.raster.contents = self
                .tilings
                .snapped_contents_scale(desired, env.settings.snap_to_existing_tiling_ratio);
            self.raster.page = self.raster.contents / self.raster.device / self.raster.source;
        }

        if animating && !adjusts_during_scale_animations(env) {
            let maximum = self.draw_properties.maximum_animation_contents_scale;
            let fits_viewport = maximum > 0.0 && {
                let at_maximum = geometry::ceiled_size(self.raster_source.size(), maximum);
                at_maximum.area() <= env.frame.device_viewport.area()
            };
            self.raster.contents = if fits_viewport {
                maximum
            } else {
                self.ideal.page * self.ideal.device
            };
        }

        let minimum = self.minimum_contents_scale(env.settings);
        self.raster.contents = self.raster.contents.max(minimum);

        let raster_bounds = geometry::ceiled_size(self.raster_source.size(), self.raster.contents);
        let tile_size = env.sizing(self.is_mask).tile_size(raster_bounds);
        let tile_covers_bounds =
            tile_size.width >= raster_bounds.width && tile_size.height >= raster_bounds.height;
        self.low_res_raster_contents_scale =
            if geometry::is_empty_size(tile_size) || tile_covers_bounds {
                self.raster.contents
            } else {
                (self.raster.contents * env.settings.low_res_contents_scale_factor).max(minimum)
            };
        debug_assert!(
            self.low_res_raster_contents_scale <= self.raster.contents,
            "low-res scale above the raster scale"
        );

        tracer.raster_scale(&RasterScaleEvent {
            frame_time: env.frame.frame_time,
            tree: env.tree,
            layer: self.id,
            old_contents_scale: old.contents,
            contents_scale: self.raster.contents,
            low_res_contents_scale: self.low_res_raster_contents_scale,
            pinching,
            animating,
            source_scale_fixed: self.raster_source_scale_is_fixed,
        });
    }

    /// Makes sure a high-res tiling exists at the raster scale and, when
    /// the transform is static, a low-res tiling at the low-res scale.
    ///
    /// Every other tiling is demoted to non-ideal. New tilings are mirrored
    /// onto `twin` when it can have them.
    pub fn add_tilings_for_raster_scale(
        &mut self,
        env: &LayerEnv<'_>,
        mut twin: Option<&mut TwinMut<'_>>,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) {
        self.tilings.mark_all_tilings_non_ideal();

        let high_scale = self.raster.contents;
        let low_scale = self.low_res_raster_contents_scale;
        if self.tilings.find_tiling_index_with_scale(high_scale).is_none() {
            self.add_tiling(env, high_scale, twin.as_deref_mut(), tiles, tracer);
        }

        let mut low_index = if high_scale == low_scale {
            None
        } else {
            self.tilings.find_tiling_index_with_scale(low_scale)
        };
        let static_transform = !env.frame.pinch_gesture_active
            && !self.draw_properties.screen_space_transform_is_animating;
        if high_scale != low_scale
            && low_index.is_none()
            && env.create_low_res_tiling()
            && static_transform
        {
            low_index = Some(self.add_tiling(env, low_scale, twin.as_deref_mut(), tiles, tracer));
        }

        if let Some(index) = low_index {
            self.tilings.tiling_at_mut(index).set_resolution(TileResolution::Low);
        }
        // Indices shift as tilings are added, so look the high-res one up last.
        if let Some(index) = self.tilings.find_tiling_index_with_scale(high_scale) {
            self.tilings.tiling_at_mut(index).set_resolution(TileResolution::High);
        }

        self.sanity_check_tiling_state(env.tree);
    }

    /// Adds a tiling at `contents_scale` and mirrors it onto `twin`.
    /// Returns the new tiling's index.
    ///
    /// # Panics
    ///
    /// Panics if the layer cannot have a tiling at that scale.
    pub fn add_tiling(
        &mut self,
        env: &LayerEnv<'_>,
        contents_scale: f64,
        twin: Option<&mut TwinMut<'_>>,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) -> usize {
        assert!(
            self.can_have_tiling_with_scale(contents_scale, env.settings),
            "{:?} cannot have a tiling at scale {contents_scale}",
            self.id
        );
        let bounds = self.raster_source.size();
        let tile_size = env
            .sizing(self.is_mask)
            .tile_size(geometry::ceiled_size(bounds, contents_scale));
        let index = self.tilings.add_tiling(contents_scale, bounds, tile_size);

        #[cfg(feature = "trace-rich")]
        tracer.tiling(&TilingEvent {
            frame_time: env.frame.frame_time,
            tree: env.tree,
            layer: self.id,
            contents_scale,
            resolution: TileResolution::NonIdeal,
            change: TilingChange::Added,
        });

        if let Some(twin) = twin {
            twin.layer
                .sync_tiling(&twin.env, contents_scale, self, tiles, tracer);
        }
        index
    }

    /// Drops tilings that fell out of use after quad emission.
    ///
    /// A tiling survives when it was used to draw, when its scale lies in
    /// the band spanned by the raster and ideal scales of this layer and its
    /// twin, or when it is the low-res tiling. Removed scales also leave the
    /// recycled twin. A twin whose set ends up empty forgets its raster
    /// scales.
    ///
    /// # Panics
    ///
    /// Panics if called off the active tree or if the cleanup empties the
    /// layer.
    pub fn clean_up_tilings_on_active_layer(
        &mut self,
        env: &LayerEnv<'_>,
        used_scales: &[f64],
        twin: Option<&mut Self>,
        mut recycled_twin: Option<&mut Self>,
        tiles: &mut TileStore,
        tracer: &mut Tracer<'_>,
    ) {
        assert!(
            env.tree == TreeKind::Active,
            "tilings of {:?} are cleaned up on the active tree only",
            self.id
        );
        if self.tilings.is_empty() {
            return;
        }

        let mut min_scale = self.raster.contents.min(self.ideal.contents);
        let mut max_scale = self.raster.contents.max(self.ideal.contents);
        if let Some(twin) = twin.as_deref().filter(|t| t.can_have_tilings()) {
            min_scale = min_scale.min(twin.raster.contents.min(twin.ideal.contents));
            max_scale = max_scale.max(twin.raster.contents.max(twin.ideal.contents));
        }

        #[cfg(feature = "trace-rich")]
        let before: Vec<(f64, TileResolution)> = self
            .tilings
            .iter()
            .map(|t| (t.contents_scale(), t.resolution()))
            .collect();

        self.tilings.clean_up_tilings(
            min_scale,
            max_scale,
            used_scales,
            env.create_low_res_tiling(),
            twin.as_deref().map(|t| &t.tilings),
            recycled_twin.as_deref_mut().map(|t| &mut t.tilings),
            tiles,
        );

        #[cfg(feature = "trace-rich")]
        for (contents_scale, resolution) in before {
            if self.tilings.find_tiling_with_scale(contents_scale).is_none() {
                tracer.tiling(&TilingEvent {
                    frame_time: env.frame.frame_time,
                    tree: env.tree,
                    layer: self.id,
                    contents_scale,
                    resolution,
                    change: TilingChange::Removed,
                });
            }
        }
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = tracer;
        }

        if let Some(twin) = twin.filter(|t| t.tilings.is_empty()) {
            twin.reset_raster_scale();
        }
        if let Some(recycled) = recycled_twin.filter(|t| t.tilings.is_empty()) {
            recycled.reset_raster_scale();
        }

        assert!(
            !self.tilings.is_empty(),
            "cleanup removed every tiling of {:?}",
            self.id
        );
        self.sanity_check_tiling_state(env.tree);
    }

    /// Forgets the raster scales; they are recomputed on the next update.
    pub fn reset_raster_scale(&mut self) {
        self.raster = Scales::default();
        self.low_res_raster_contents_scale = 0.0;
        self.raster_source_scale_is_fixed = false;
        self.should_update_tile_priorities = false;
    }

    /// Checks the tiling invariants of a live layer.
    ///
    /// # Panics
    ///
    /// Panics if a layer that cannot have tilings has some, or if a layer
    /// with tilings does not have exactly one high-res tiling.
    pub fn sanity_check_tiling_state(&self, tree: TreeKind) {
        if tree == TreeKind::Recycle {
            return;
        }
        if !self.can_have_tilings() {
            assert!(
                self.tilings.is_empty(),
                "{:?} cannot have tilings but has {}",
                self.id,
                self.tilings.num_tilings()
            );
            return;
        }
        if self.tilings.is_empty() {
            return;
        }
        let high_res = self.tilings.num_high_res_tilings();
        assert!(
            high_res == 1,
            "{:?} must have exactly one high-res tiling, found {high_res}",
            self.id
        );
    }

    /// Scales of every tiling, highest first.
    #[must_use]
    pub fn tiling_scales(&self) -> Vec<f64> {
        self.tilings.iter().map(|t| t.contents_scale()).collect()
    }
}

/// Whether the raster scale follows the ideal scale during scale animations.
fn adjusts_during_scale_animations(env: &LayerEnv<'_>) -> bool {
    env.frame.use_gpu_rasterization
}

/// Steps `start` by `ratio` until it brackets `ideal`: down while above it
/// when zooming out, up while below it otherwise.
pub(crate) fn pinch_target_scale(start: f64, ideal: f64, ratio: f64, zooming_out: bool) -> f64 {
    let mut desired = start;
    if zooming_out {
        while desired > ideal {
            desired /= ratio;
        }
    } else {
        while desired < ideal {
            desired *= ratio;
        }
    }
    desired
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;

    use kurbo::{Rect, Size};

    use super::*;
    use crate::layer::{DrawProperties, LayerId};
    use crate::occlusion::Occlusion;
    use crate::raster_source::{Color, RasterSource};
    use crate::settings::TilingSettings;
    use crate::tree::FrameState;

    struct Fixture {
        settings: TilingSettings,
        frame: FrameState,
        tiles: TileStore,
        layer: PictureLayer,
    }

    impl Fixture {
        fn new(size: Size) -> Self {
            Self::with_source(RasterSource::fully_recorded(size).shared())
        }

        fn with_source(source: Arc<RasterSource>) -> Self {
            let mut layer = PictureLayer::new(LayerId(1), source);
            layer.set_draw_properties(DrawProperties {
                visible_content_rect: Rect::new(0.0, 0.0, 100.0, 100.0),
                ..DrawProperties::default()
            });
            Self {
                settings: TilingSettings::desktop(),
                frame: FrameState::default(),
                tiles: TileStore::new(),
                layer,
            }
        }

        /// Runs one update with the given page and ideal contents scale.
        fn update(&mut self, page: f64, ideal: f64) {
            self.layer.draw_properties.page_scale_factor = page;
            self.layer.draw_properties.ideal_contents_scale = ideal;
            self.frame.frame_time.0 += 16;
            let env = active_env(&self.frame, &self.settings);
            self.layer.update_tiles(
                &env,
                &Occlusion::none(),
                None,
                &mut self.tiles,
                &mut Tracer::none(),
            );
        }
    }

    fn active_env<'a>(frame: &'a FrameState, settings: &'a TilingSettings) -> LayerEnv<'a> {
        LayerEnv {
            tree: TreeKind::Active,
            frame,
            settings,
        }
    }

    #[test]
    fn minimum_scale_floor_holds_for_extreme_sizes() {
        for (w, h) in [(1.0, 1_000_000.0), (10.0, 10.0), (2000.0, 3.0), (500.0, 500.0)] {
            let mut f = Fixture::new(Size::new(w, h));
            f.update(1.0, 0.01);
            let floor = (1.0 / f64::min(w, h)).max(f.settings.minimum_contents_scale);
            assert!(
                f.layer.raster_contents_scale() >= floor,
                "{w}x{h}: raster scale {} below floor {floor}",
                f.layer.raster_contents_scale()
            );
            assert!(f.layer.low_res_raster_contents_scale() >= floor);
        }
    }

    #[test]
    fn thin_layer_rasters_at_least_one_pixel_wide() {
        let mut f = Fixture::new(Size::new(1.0, 1_000_000.0));
        f.update(1.0, 0.5);
        assert_eq!(f.layer.raster_contents_scale(), 1.0);
        let high = f
            .layer
            .tilings()
            .find_tiling_with_resolution(TileResolution::High)
            .unwrap();
        assert_eq!(high.tiling_size().width, 1.0);
    }

    #[test]
    fn exactly_one_high_res_tiling_after_scale_changes() {
        let mut f = Fixture::new(Size::new(2000.0, 2000.0));
        for ideal in [1.0, 2.0, 0.5, 3.0, 2.0, 1.0] {
            f.update(ideal, ideal);
            assert_eq!(f.layer.tilings().num_high_res_tilings(), 1, "ideal {ideal}");
            let high = f
                .layer
                .tilings()
                .find_tiling_with_resolution(TileResolution::High)
                .unwrap();
            assert_eq!(high.contents_scale(), ideal);
        }
    }

    #[test]
    fn static_layer_gets_low_res_companion() {
        let mut f = Fixture::new(Size::new(2000.0, 2000.0));
        f.update(1.0, 1.0);
        assert_eq!(f.layer.tiling_scales(), vec![1.0, 0.25]);
        let low = f
            .layer
            .tilings()
            .find_tiling_with_resolution(TileResolution::Low)
            .unwrap();
        assert_eq!(low.contents_scale(), 0.25);
    }

    #[test]
    fn single_tile_layer_has_no_low_res() {
        let mut f = Fixture::new(Size::new(100.0, 100.0));
        f.update(1.0, 1.0);
        assert_eq!(f.layer.low_res_raster_contents_scale(), 1.0);
        assert_eq!(f.layer.tiling_scales(), vec![1.0]);
    }

    #[test]
    fn pinch_zoom_in_steps_by_ratio() {
        let mut steps = Vec::new();
        let mut scale = 1.0;
        while scale < 5.0 {
            steps.push(scale);
            scale = pinch_target_scale(scale, scale * 2.0, 2.0, false);
        }
        steps.push(scale);
        assert_eq!(steps, vec![1.0, 2.0, 4.0, 8.0]);
        assert_eq!(pinch_target_scale(1.0, 5.0, 2.0, false), 8.0);
        assert_eq!(pinch_target_scale(8.0, 5.0, 2.0, true), 4.0);
    }

    #[test]
    fn pinch_converges_without_oscillating() {
        for (ratio, snap) in [(2.0, 1.2), (1.5, 1.1), (3.0, 1.5)] {
            let mut f = Fixture::new(Size::new(1000.0, 1000.0));
            f.settings = TilingSettings::desktop().with_pinch_ratios(ratio, snap);
            f.update(1.0, 1.0);

            f.frame.pinch_gesture_active = true;
            let mut history = Vec::new();
            for _ in 0..5 {
                f.update(5.0, 5.0);
                history.push(f.layer.raster_contents_scale());
            }
            let settled = history[1];
            assert!(
                history[1..].iter().all(|&s| s == settled),
                "ratio {ratio}: scales kept moving: {history:?}"
            );
            assert!(settled <= 5.0, "ratio {ratio}: settled above ideal at {settled}");
            assert!(
                5.0 / settled <= ratio,
                "ratio {ratio}: settled too far below ideal at {settled}"
            );
            assert_eq!(f.layer.tilings().num_high_res_tilings(), 1);
        }
    }

    #[test]
    fn pinch_snaps_to_nearby_tiling() {
        let mut f = Fixture::new(Size::new(1000.0, 1000.0));
        f.update(7.0, 7.0);
        f.update(1.0, 1.0);
        assert!(f.layer.tilings().find_tiling_with_scale(7.0).is_some());

        f.frame.pinch_gesture_active = true;
        f.update(5.0, 5.0);
        // 1 -> 2 -> 4 -> 8, and 8 is within 1.2x of the existing 7.
        assert_eq!(f.layer.raster_contents_scale(), 7.0);
        assert!(f.layer.tilings().find_tiling_with_scale(8.0).is_none());
    }

    #[test]
    fn pinch_does_not_create_low_res() {
        let mut f = Fixture::new(Size::new(1000.0, 1000.0));
        f.update(1.0, 1.0);
        f.frame.pinch_gesture_active = true;
        f.update(5.0, 5.0);
        assert_eq!(f.layer.raster_contents_scale(), 8.0);
        assert_eq!(f.layer.low_res_raster_contents_scale(), 2.0);
        assert_eq!(f.layer.tiling_scales(), vec![8.0, 1.0, 0.25]);
        assert!(
            f.layer
                .tilings()
                .find_tiling_with_resolution(TileResolution::Low)
                .is_none()
        );
    }

    #[test]
    fn pinned_source_scale_stays_pinned() {
        let mut f = Fixture::new(Size::new(1000.0, 1000.0));
        f.update(1.0, 2.0);
        assert_eq!(f.layer.raster_scales().source, 2.0);
        assert!(!f.layer.raster_source_scale_is_fixed());

        f.update(1.0, 3.0);
        assert!(f.layer.raster_source_scale_is_fixed());
        assert_eq!(f.layer.raster_scales().source, 1.0);

        for ideal in [2.5, 4.0, 0.7, 3.3] {
            f.update(1.0, ideal);
            assert!(f.layer.raster_source_scale_is_fixed());
            assert_eq!(f.layer.raster_scales().source, 1.0, "ideal {ideal}");
        }
    }

    #[test]
    fn animation_rasters_at_maximum_scale_when_it_fits() {
        let mut f = Fixture::new(Size::new(100.0, 100.0));
        f.layer.draw_properties.screen_space_transform_is_animating = true;
        f.layer.draw_properties.maximum_animation_contents_scale = 2.0;
        f.update(1.0, 1.3);
        assert_eq!(f.layer.raster_contents_scale(), 2.0);

        let mut big = Fixture::new(Size::new(100.0, 100.0));
        big.layer.draw_properties.screen_space_transform_is_animating = true;
        big.layer.draw_properties.maximum_animation_contents_scale = 100.0;
        big.update(1.0, 1.3);
        // 10000x10000 exceeds the viewport; fall back to page x device.
        assert_eq!(big.layer.raster_contents_scale(), 1.0);
    }

    #[test]
    fn gpu_raster_tracks_scale_during_animation() {
        let mut f = Fixture::new(Size::new(1000.0, 1000.0));
        f.frame.use_gpu_rasterization = true;
        f.layer.draw_properties.screen_space_transform_is_animating = true;
        f.update(1.0, 1.5);
        assert_eq!(f.layer.raster_contents_scale(), 1.5);
        f.update(1.0, 1.75);
        assert_eq!(f.layer.raster_contents_scale(), 1.75);
    }

    #[test]
    fn solid_color_layer_never_gets_tilings() {
        let source = RasterSource::solid(Size::new(500.0, 500.0), Color::WHITE).shared();
        let mut f = Fixture::with_source(source);
        f.update(1.0, 1.0);
        assert!(!f.layer.can_have_tilings());
        assert!(f.layer.tilings().is_empty());
        assert_eq!(f.layer.ideal_scales(), Scales::default());
        assert_eq!(f.layer.raster_scales(), Scales::default());
    }

    /// A 2000x2000 layer that went from scale 3 to scale 1.
    fn after_zoom_out() -> Fixture {
        let mut f = Fixture::new(Size::new(2000.0, 2000.0));
        f.update(3.0, 3.0);
        f.update(1.0, 1.0);
        assert_eq!(f.layer.tiling_scales(), vec![3.0, 1.0, 0.75, 0.25]);
        f
    }

    #[test]
    fn cleanup_keeps_used_tilings() {
        let mut f = after_zoom_out();
        let env = active_env(&f.frame, &f.settings);
        f.layer.clean_up_tilings_on_active_layer(
            &env,
            &[3.0],
            None,
            None,
            &mut f.tiles,
            &mut Tracer::none(),
        );
        assert_eq!(f.layer.tiling_scales(), vec![3.0, 1.0, 0.25]);
    }

    #[test]
    fn cleanup_drops_unused_tilings_outside_band() {
        let mut f = after_zoom_out();
        let env = active_env(&f.frame, &f.settings);
        f.layer.clean_up_tilings_on_active_layer(
            &env,
            &[],
            None,
            None,
            &mut f.tiles,
            &mut Tracer::none(),
        );
        assert_eq!(f.layer.tiling_scales(), vec![1.0, 0.25]);
        assert_eq!(f.layer.tilings().num_high_res_tilings(), 1);
    }

    #[test]
    fn cleanup_widens_band_by_twin() {
        let mut f = after_zoom_out();
        let mut twin = PictureLayer::new(LayerId(1), Arc::clone(f.layer.raster_source()));
        twin.raster = Scales {
            page: 3.0,
            device: 1.0,
            source: 1.0,
            contents: 3.0,
        };
        twin.ideal = twin.raster;
        let env = active_env(&f.frame, &f.settings);
        f.layer.clean_up_tilings_on_active_layer(
            &env,
            &[],
            Some(&mut twin),
            None,
            &mut f.tiles,
            &mut Tracer::none(),
        );
        // The twin's band is [3, 3], so the band becomes [1, 3].
        assert_eq!(f.layer.tiling_scales(), vec![3.0, 1.0, 0.25]);
    }

    #[test]
    fn cleanup_resets_emptied_recycled_twin() {
        let mut f = after_zoom_out();
        let mut recycled = PictureLayer::new(LayerId(1), Arc::clone(f.layer.raster_source()));
        recycled
            .tilings
            .add_tiling(3.0, Size::new(2000.0, 2000.0), Size::new(256.0, 256.0));
        recycled.raster = Scales {
            page: 3.0,
            device: 1.0,
            source: 1.0,
            contents: 3.0,
        };

        let env = active_env(&f.frame, &f.settings);
        f.layer.clean_up_tilings_on_active_layer(
            &env,
            &[],
            None,
            Some(&mut recycled),
            &mut f.tiles,
            &mut Tracer::none(),
        );
        assert!(recycled.tilings().is_empty());
        assert_eq!(recycled.raster_scales(), Scales::default());
    }

    #[test]
    #[should_panic(expected = "cannot have a tiling at scale")]
    fn add_tiling_below_minimum_panics() {
        let mut f = Fixture::new(Size::new(10.0, 10.0));
        let env = active_env(&f.frame, &f.settings);
        f.layer
            .add_tiling(&env, 0.01, None, &mut f.tiles, &mut Tracer::none());
    }

    #[test]
    #[should_panic(expected = "read before it was computed")]
    fn raster_scale_read_before_update_panics() {
        let f = Fixture::new(Size::new(10.0, 10.0));
        let _ = f.layer.raster_contents_scale();
    }
}
