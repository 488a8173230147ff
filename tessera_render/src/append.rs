// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turning an active layer's tile coverage into draw quads.

use alloc::vec::Vec;

use kurbo::{Affine, Rect, Size};
use tessera_core::geometry;
use tessera_core::layer::{InitState, LayerId, PictureLayer};
use tessera_core::occlusion::Occlusion;
use tessera_core::raster_source::Color;
use tessera_core::settings::TilingSettings;
use tessera_core::tile::{DrawInfo, ResourceKey, TileResolution, TileStore};
use tessera_core::trace::{CheckerboardEvent, Tracer};
use tessera_core::tree::{FrameState, TreeHost, TreeKind};

use crate::quad::{
    CheckerboardQuad, DrawQuad, PictureQuad, QuadList, SharedQuadState, SolidColorQuad, TileQuad,
};

/// Renderer capabilities and colors used while appending quads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AppendQuadsOptions {
    /// Whether tiles that must be replayed from the recording can be drawn.
    pub allow_rasterize_on_demand: bool,
    /// Draw checkerboards for missing tiles instead of the background.
    pub draw_checkerboard_for_missing_tiles: bool,
    /// Checkerboard color.
    pub checkerboard_color: Color,
    /// Fill for missing tiles when checkerboards are off.
    pub background_color: Color,
}

impl Default for AppendQuadsOptions {
    fn default() -> Self {
        Self {
            allow_rasterize_on_demand: true,
            draw_checkerboard_for_missing_tiles: false,
            checkerboard_color: Color::rgba(241, 241, 241, 255),
            background_color: Color::WHITE,
        }
    }
}

/// Counters accumulated over every layer appended in a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AppendQuadsData {
    /// Missing pieces inside a layer's tile priority viewport.
    pub num_missing_tiles: u32,
    /// Tiles drawn at a scale the layer is moving away from.
    pub num_incomplete_tiles: u32,
    /// Unoccluded area drawn, in quad space.
    pub visible_content_area: f64,
    /// Part of `visible_content_area` not drawn at high resolution.
    pub approximated_visible_content_area: f64,
}

/// Appends the quads of active layer `id` to `quads`.
///
/// `occlusion` is in layer space. Solid-color layers append one quad, and
/// resourceless software draws one picture quad. Otherwise the layer's
/// coverage is walked at its maximum tiling scale, missing pieces are
/// filled with a checkerboard or the background color, and tilings the
/// pass did not use are cleaned up afterwards.
///
/// Returns `false` if the active tree has no layer `id`.
pub fn append_quads(
    host: &mut TreeHost,
    id: LayerId,
    occlusion: &Occlusion,
    options: &AppendQuadsOptions,
    quads: &mut QuadList,
    data: &mut AppendQuadsData,
    tracer: &mut Tracer<'_>,
) -> bool {
    let settings = *host.settings();
    let used = {
        let Some((layer, frame, tiles)) = host.active_layer_mut(id) else {
            return false;
        };
        debug_assert!(
            layer.init_state() == InitState::Initialized,
            "{id:?} appended quads before post-commit initialization"
        );
        let pass = LayerPass {
            layer: &*layer,
            frame,
            settings: &settings,
            tiles,
            occlusion,
            options,
        };
        match pass.append(quads, data, tracer) {
            Some(used) => used,
            None => return true,
        }
    };
    if let Some((layer, _, _)) = host.active_layer_mut(id) {
        layer.set_only_used_low_res_last_append_quads(used.only_low_res);
    }
    host.clean_up_tilings(id, &used.scales, tracer);
    true
}

/// Resource of a mask layer that fits on one tile, with the tile's texture
/// size. `None` until that tile has been rastered into a resource.
#[must_use]
pub fn contents_resource(host: &TreeHost, id: LayerId) -> Option<(ResourceKey, Size)> {
    let layer = host.layer(TreeKind::Active, id)?;
    let content_rect = geometry::rect_from_size(layer.bounds());
    let piece = layer
        .tilings()
        .coverage(host.tiles(), 1.0, content_rect, layer.ideal_scales().contents)
        .next()?;
    let tile = piece.tile?;
    debug_assert!(
        piece.geometry_rect == content_rect,
        "mask {id:?} spans more than one tile"
    );
    match host.tiles().draw_info(tile) {
        DrawInfo::Resource { resource, .. } => Some((resource, piece.texture_size)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// One layer's pass
// ---------------------------------------------------------------------------

struct UsedTilings {
    scales: Vec<f64>,
    only_low_res: bool,
}

struct LayerPass<'a> {
    layer: &'a PictureLayer,
    frame: &'a FrameState,
    settings: &'a TilingSettings,
    tiles: &'a TileStore,
    occlusion: &'a Occlusion,
    options: &'a AppendQuadsOptions,
}

impl LayerPass<'_> {
    /// Appends quads. `None` when the tilings were not consulted.
    fn append(
        &self,
        quads: &mut QuadList,
        data: &mut AppendQuadsData,
        tracer: &mut Tracer<'_>,
    ) -> Option<UsedTilings> {
        let layer = self.layer;
        let props = layer.draw_properties();

        if let Some(color) = layer.raster_source().solid_color() {
            self.append_solid(color, quads, data);
            return None;
        }

        let max_scale = layer.maximum_tiling_contents_scale(self.settings);
        let content_bounds = geometry::ceiled_size(layer.bounds(), max_scale);
        let visible = geometry::intersect(
            geometry::scale_to_enclosing(props.visible_content_rect, max_scale),
            geometry::rect_from_size(content_bounds),
        );
        let occlusion = self.occlusion.scaled(max_scale);
        let shared = quads.push_shared_state(SharedQuadState {
            layer: layer.id(),
            transform: props.screen_space_transform * Affine::scale(1.0 / max_scale),
            content_bounds,
            visible_content_rect: visible,
        });

        if self.frame.resourceless_software_draw {
            let visible_rect = occlusion.unoccluded_rect(visible);
            if !geometry::is_empty(visible_rect) {
                quads.push(DrawQuad::Picture(PictureQuad {
                    shared,
                    rect: visible,
                    opaque_rect: opaque(props.contents_opaque, visible),
                    visible_rect,
                    texture_rect: geometry::rect_from_size(visible.size()),
                    texture_size: visible.size(),
                    content_rect: visible,
                    contents_scale: max_scale,
                    raster_source: layer.raster_source().clone(),
                }));
            }
            return None;
        }

        let priority_viewport = geometry::scale_to_enclosing(
            layer.viewport_for_tile_priority_in_content_space(self.frame),
            max_scale,
        );
        let raster_scale = layer.raster_scales().contents;
        let ideal_scale = layer.ideal_scales().contents;

        let mut used = UsedTilings {
            scales: Vec::new(),
            only_low_res: true,
        };
        let mut missing = 0_u32;
        let mut on_demand_missing = 0_u32;

        for piece in layer
            .tilings()
            .coverage(self.tiles, max_scale, visible, ideal_scale)
        {
            let rect = piece.geometry_rect;
            let visible_rect = occlusion.unoccluded_rect(rect);
            if geometry::is_empty(visible_rect) {
                continue;
            }
            let visible_area = geometry::area(visible_rect);
            data.visible_content_area += visible_area;

            let info = piece.tile.map(|t| self.tiles.draw_info(t));
            let quad = match info {
                Some(DrawInfo::Resource {
                    resource,
                    contents_swizzled,
                }) => {
                    let scale = piece.contents_scale.unwrap_or(max_scale);
                    if scale != raster_scale
                        && scale != ideal_scale
                        && geometry::overlaps(rect, priority_viewport)
                    {
                        data.num_incomplete_tiles += 1;
                    }
                    Some(DrawQuad::Tile(TileQuad {
                        shared,
                        rect,
                        opaque_rect: opaque(props.contents_opaque, rect),
                        visible_rect,
                        resource,
                        texture_rect: piece.texture_rect,
                        texture_size: piece.texture_size,
                        swizzle_contents: contents_swizzled,
                    }))
                }
                Some(DrawInfo::PictureFallback) => {
                    if self.options.allow_rasterize_on_demand {
                        piece.tile.map(|t| {
                            let request = self.tiles.request(t);
                            DrawQuad::Picture(PictureQuad {
                                shared,
                                rect,
                                opaque_rect: opaque(props.contents_opaque, rect),
                                visible_rect,
                                texture_rect: piece.texture_rect,
                                texture_size: piece.texture_size,
                                content_rect: request.content_rect,
                                contents_scale: request.contents_scale,
                                raster_source: layer.raster_source().clone(),
                            })
                        })
                    } else {
                        on_demand_missing += 1;
                        None
                    }
                }
                Some(DrawInfo::SolidColor(color)) => Some(DrawQuad::SolidColor(SolidColorQuad {
                    shared,
                    rect,
                    visible_rect,
                    color,
                })),
                Some(DrawInfo::NotReady) | None => None,
            };

            let Some(quad) = quad else {
                quads.push(self.missing_quad(shared, rect, visible_rect));
                if geometry::overlaps(rect, priority_viewport) {
                    data.num_missing_tiles += 1;
                    missing += 1;
                }
                data.approximated_visible_content_area += visible_area;
                continue;
            };
            quads.push(quad);

            if piece.resolution != Some(TileResolution::High) {
                data.approximated_visible_content_area += visible_area;
            }
            if piece.resolution != Some(TileResolution::Low) {
                used.only_low_res = false;
            }
            if let Some(scale) = piece.contents_scale
                && used.scales.last() != Some(&scale)
            {
                used.scales.push(scale);
            }
        }

        if missing > 0 {
            tracer.checkerboard(&CheckerboardEvent {
                frame_time: self.frame.frame_time,
                layer: layer.id(),
                missing_tiles: missing,
                on_demand_missing_tiles: on_demand_missing,
            });
        }
        Some(used)
    }

    fn append_solid(&self, color: Color, quads: &mut QuadList, data: &mut AppendQuadsData) {
        let props = self.layer.draw_properties();
        let visible = props.visible_content_rect;
        let shared = quads.push_shared_state(SharedQuadState {
            layer: self.layer.id(),
            transform: props.screen_space_transform,
            content_bounds: self.layer.bounds(),
            visible_content_rect: visible,
        });
        let visible_rect = self.occlusion.unoccluded_rect(visible);
        if geometry::is_empty(visible_rect) {
            return;
        }
        data.visible_content_area += geometry::area(visible_rect);
        quads.push(DrawQuad::SolidColor(SolidColorQuad {
            shared,
            rect: visible,
            visible_rect,
            color,
        }));
    }

    fn missing_quad(&self, shared: usize, rect: Rect, visible_rect: Rect) -> DrawQuad {
        if self.options.draw_checkerboard_for_missing_tiles {
            DrawQuad::Checkerboard(CheckerboardQuad {
                shared,
                rect,
                visible_rect,
                color: self.options.checkerboard_color,
            })
        } else {
            DrawQuad::SolidColor(SolidColorQuad {
                shared,
                rect,
                visible_rect,
                color: self.options.background_color,
            })
        }
    }
}

fn opaque(contents_opaque: bool, rect: Rect) -> Rect {
    if contents_opaque { rect } else { Rect::ZERO }
}
