// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile size selection.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Size;

use crate::settings::TilingSettings;

/// Inputs that decide the cell size of a layer's tilings.
#[derive(Clone, Copy, Debug)]
pub struct TileSizing<'a> {
    /// Tiling configuration.
    pub settings: &'a TilingSettings,
    /// Device viewport size, used for GPU-rastered tiles.
    pub device_viewport: Size,
    /// Whether the tree rasterizes on the GPU.
    pub use_gpu_rasterization: bool,
    /// Masks are drawn from a single tile.
    pub is_mask: bool,
}

impl TileSizing<'_> {
    /// Cell size for a tiling with `content_bounds`.
    ///
    /// Masks get one tile covering everything, or an empty size when that
    /// would exceed the texture limit. GPU tiles span the viewport width and
    /// a fraction of its height. CPU tiles use the configured size, grown
    /// along the short axis of thin content and collapsed to a single tile
    /// for small content. Tiles larger than the content shrink to it,
    /// rounded up to `tile_round_up`.
    #[must_use]
    pub fn tile_size(&self, content_bounds: Size) -> Size {
        let s = self.settings;
        let max_texture = s.max_texture_size;

        if self.is_mask {
            if content_bounds.width > max_texture || content_bounds.height > max_texture {
                return Size::ZERO;
            }
            return content_bounds;
        }

        let (default_w, default_h) = if self.use_gpu_rasterization {
            let viewport_w = self.device_viewport.width;
            let viewport_h = self.device_viewport.height;
            let divisor = if content_bounds.width <= (viewport_w / 4.0).floor() {
                1.0
            } else if content_bounds.width <= (viewport_w / 2.0).floor() {
                2.0
            } else {
                4.0
            };
            let h = round_up(viewport_h, divisor) / divisor;
            (viewport_w, h.max(s.min_height_for_gpu_rastered_tile))
        } else {
            let untiled = s.max_untiled_layer_size;
            let mut w = s.default_tile_size.width;
            let mut h = s.default_tile_size.height;
            if content_bounds.width < w {
                h = untiled.height;
            }
            if content_bounds.height < h {
                w = untiled.width;
            }
            if content_bounds.width < untiled.width && content_bounds.height < untiled.height {
                w = untiled.width;
                h = untiled.height;
            }
            (w, h)
        };

        let mut w = default_w;
        let mut h = default_h;
        if content_bounds.width < default_w {
            w = round_up(w.min(content_bounds.width), s.tile_round_up).min(default_w);
        }
        if content_bounds.height < default_h {
            h = round_up(h.min(content_bounds.height), s.tile_round_up).min(default_h);
        }
        Size::new(w.min(max_texture), h.min(max_texture))
    }
}

fn round_up(v: f64, multiple: f64) -> f64 {
    (v / multiple).ceil() * multiple
}
