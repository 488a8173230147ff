// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tiling configuration.
//!
//! [`TilingSettings`] is fixed for the lifetime of a [`TreeHost`]. Sizes are
//! in content pixels and always integral.
//!
//! [`TreeHost`]: crate::tree::TreeHost

use kurbo::Size;

/// Knobs that shape tile sizes, scale selection, and priority rects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilingSettings {
    /// Tile size used for CPU rasterization of large layers.
    pub default_tile_size: Size,
    /// Layers smaller than this in both dimensions get a single tile.
    pub max_untiled_layer_size: Size,
    /// Largest texture dimension the raster backend accepts.
    pub max_texture_size: f64,
    /// Lower bound on any contents scale.
    pub minimum_contents_scale: f64,
    /// Low-res tiling scale relative to the high-res tiling.
    pub low_res_contents_scale_factor: f64,
    /// Whether layers keep a low-res companion tiling.
    pub create_low_res_tiling: bool,
    /// Budget, in tiles, for the eventually rect of each tiling.
    pub max_tiles_for_interest_area: usize,
    /// Scales the skewport look-ahead time.
    pub skewport_target_time_multiplier: f64,
    /// How far the skewport may extrapolate beyond the visible rect.
    pub skewport_extrapolation_limit_in_content_pixels: f64,
    /// Width of the soon border around the visible rect, in screen pixels.
    pub soon_border_distance_in_screen_pixels: f64,
    /// Step between raster scales while a pinch gesture is active.
    pub max_scale_ratio_during_pinch: f64,
    /// Pinch steps snap to an existing tiling within this ratio.
    pub snap_to_existing_tiling_ratio: f64,
    /// Tile dimensions clamped to small content are rounded up to this.
    pub tile_round_up: f64,
    /// Floor on tile height under GPU rasterization.
    pub min_height_for_gpu_rastered_tile: f64,
    /// Skewport look-ahead in frames under CPU rasterization.
    pub cpu_skewport_target_time_in_frames: f64,
    /// Skewport look-ahead in frames under GPU rasterization.
    pub gpu_skewport_target_time_in_frames: f64,
}

impl TilingSettings {
    /// Defaults for desktop-class devices.
    #[must_use]
    pub const fn desktop() -> Self {
        Self {
            default_tile_size: Size::new(256.0, 256.0),
            max_untiled_layer_size: Size::new(512.0, 512.0),
            max_texture_size: 8192.0,
            minimum_contents_scale: 0.0625,
            low_res_contents_scale_factor: 0.25,
            create_low_res_tiling: true,
            max_tiles_for_interest_area: 128,
            skewport_target_time_multiplier: 1.0,
            skewport_extrapolation_limit_in_content_pixels: 2000.0,
            soon_border_distance_in_screen_pixels: 312.0,
            max_scale_ratio_during_pinch: 2.0,
            snap_to_existing_tiling_ratio: 1.2,
            tile_round_up: 64.0,
            min_height_for_gpu_rastered_tile: 256.0,
            cpu_skewport_target_time_in_frames: 60.0,
            gpu_skewport_target_time_in_frames: 0.0,
        }
    }

    /// Defaults for memory-constrained mobile devices.
    #[must_use]
    pub const fn mobile() -> Self {
        Self {
            max_untiled_layer_size: Size::new(256.0, 256.0),
            max_tiles_for_interest_area: 64,
            skewport_extrapolation_limit_in_content_pixels: 1000.0,
            ..Self::desktop()
        }
    }

    /// Returns a copy with different pinch stepping constants.
    #[must_use]
    pub const fn with_pinch_ratios(mut self, step: f64, snap: f64) -> Self {
        self.max_scale_ratio_during_pinch = step;
        self.snap_to_existing_tiling_ratio = snap;
        self
    }
}

impl Default for TilingSettings {
    fn default() -> Self {
        Self::desktop()
    }
}
