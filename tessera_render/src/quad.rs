// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw quads: an ordered list of what one frame draws for a set of layers.

use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Affine, Rect, Size};
use tessera_core::layer::LayerId;
use tessera_core::raster_source::{Color, RasterSource};
use tessera_core::tile::ResourceKey;

/// State shared by every quad a layer appends in one pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SharedQuadState {
    /// The layer the quads come from.
    pub layer: LayerId,
    /// Maps quad space to screen space.
    pub transform: Affine,
    /// Layer bounds in quad space.
    pub content_bounds: Size,
    /// Visible part of the layer in quad space.
    pub visible_content_rect: Rect,
}

/// A rastered tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileQuad {
    /// Index of the quad's [`SharedQuadState`].
    pub shared: usize,
    /// Area the quad draws, in quad space.
    pub rect: Rect,
    /// Part of `rect` known to be opaque.
    pub opaque_rect: Rect,
    /// Part of `rect` not hidden by occluders.
    pub visible_rect: Rect,
    /// The raster resource.
    pub resource: ResourceKey,
    /// Source rect in the tile's texture.
    pub texture_rect: Rect,
    /// Size of the tile's texture.
    pub texture_size: Size,
    /// Whether red and blue are swapped in the resource.
    pub swizzle_contents: bool,
}

/// Content replayed from the recording at draw time.
#[derive(Clone, Debug, PartialEq)]
pub struct PictureQuad {
    /// Index of the quad's [`SharedQuadState`].
    pub shared: usize,
    /// Area the quad draws, in quad space.
    pub rect: Rect,
    /// Part of `rect` known to be opaque.
    pub opaque_rect: Rect,
    /// Part of `rect` not hidden by occluders.
    pub visible_rect: Rect,
    /// Source rect in texture space.
    pub texture_rect: Rect,
    /// Size of the texture the picture would fill.
    pub texture_size: Size,
    /// Content rect to replay, at `contents_scale`.
    pub content_rect: Rect,
    /// Scale to replay the recording at.
    pub contents_scale: f64,
    /// The recording.
    pub raster_source: Arc<RasterSource>,
}

/// A single color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolidColorQuad {
    /// Index of the quad's [`SharedQuadState`].
    pub shared: usize,
    /// Area the quad draws, in quad space.
    pub rect: Rect,
    /// Part of `rect` not hidden by occluders.
    pub visible_rect: Rect,
    /// Fill color.
    pub color: Color,
}

/// Placeholder for content that has no ready tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckerboardQuad {
    /// Index of the quad's [`SharedQuadState`].
    pub shared: usize,
    /// Area the quad draws, in quad space.
    pub rect: Rect,
    /// Part of `rect` not hidden by occluders.
    pub visible_rect: Rect,
    /// Checkerboard color.
    pub color: Color,
}

/// A single draw command.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawQuad {
    /// See [`TileQuad`].
    Tile(TileQuad),
    /// See [`PictureQuad`].
    Picture(PictureQuad),
    /// See [`SolidColorQuad`].
    SolidColor(SolidColorQuad),
    /// See [`CheckerboardQuad`].
    Checkerboard(CheckerboardQuad),
}

impl DrawQuad {
    /// Index of the quad's [`SharedQuadState`].
    #[must_use]
    pub fn shared(&self) -> usize {
        match self {
            Self::Tile(q) => q.shared,
            Self::Picture(q) => q.shared,
            Self::SolidColor(q) => q.shared,
            Self::Checkerboard(q) => q.shared,
        }
    }

    /// Area the quad draws, in quad space.
    #[must_use]
    pub fn rect(&self) -> Rect {
        match self {
            Self::Tile(q) => q.rect,
            Self::Picture(q) => q.rect,
            Self::SolidColor(q) => q.rect,
            Self::Checkerboard(q) => q.rect,
        }
    }

    /// Part of the quad not hidden by occluders.
    #[must_use]
    pub fn visible_rect(&self) -> Rect {
        match self {
            Self::Tile(q) => q.visible_rect,
            Self::Picture(q) => q.visible_rect,
            Self::SolidColor(q) => q.visible_rect,
            Self::Checkerboard(q) => q.visible_rect,
        }
    }
}

/// An ordered list of draw quads for a single frame.
///
/// Quads are in the order layers appended them. Backends translate the
/// list into compositor operations or GPU draw calls.
#[derive(Clone, Debug, Default)]
pub struct QuadList {
    shared: Vec<SharedQuadState>,
    quads: Vec<DrawQuad>,
}

impl QuadList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds shared state for the quads that follow and returns its index.
    pub fn push_shared_state(&mut self, state: SharedQuadState) -> usize {
        self.shared.push(state);
        self.shared.len() - 1
    }

    /// Appends a quad.
    ///
    /// # Panics
    ///
    /// Panics if the quad refers to shared state that was never pushed.
    pub fn push(&mut self, quad: DrawQuad) {
        assert!(
            quad.shared() < self.shared.len(),
            "quad refers to unknown shared state {}",
            quad.shared()
        );
        self.quads.push(quad);
    }

    /// Shared state at `index`.
    #[must_use]
    pub fn shared_state(&self, index: usize) -> Option<&SharedQuadState> {
        self.shared.get(index)
    }

    /// All quads, in draw order.
    #[must_use]
    pub fn quads(&self) -> &[DrawQuad] {
        &self.quads
    }

    /// Iterates quads together with their shared state.
    pub fn iter(&self) -> impl Iterator<Item = (&SharedQuadState, &DrawQuad)> + '_ {
        self.quads.iter().map(|q| (&self.shared[q.shared()], q))
    }

    /// Number of quads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    /// Returns `true` if there are no quads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Clears the list for reuse.
    pub fn clear(&mut self) {
        self.shared.clear();
        self.quads.clear();
    }
}
