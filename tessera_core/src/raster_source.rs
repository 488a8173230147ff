// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable recorded-content snapshots.
//!
//! A [`RasterSource`] describes what a commit recorded for one layer: the
//! layer size, which part of it has recordings, and whether the whole
//! picture collapsed to a single color. Snapshots are shared through
//! [`Arc`] between the trees and the tiles created from them, and are
//! replaced wholesale on every commit.

use alloc::sync::Arc;

use kurbo::{Rect, Size};

use crate::geometry;

/// A premultiplied RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    /// Opaque white.
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// Creates a color from its components.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Alpha component.
    #[must_use]
    pub const fn alpha(self) -> u8 {
        self.0[3]
    }

    /// Returns this color with full alpha.
    #[must_use]
    pub const fn opaque(self) -> Self {
        Self([self.0[0], self.0[1], self.0[2], 255])
    }
}

/// Recorded content for one layer at one commit.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterSource {
    size: Size,
    solid_color: Option<Color>,
    recorded_viewport: Rect,
    has_recordings: bool,
}

impl RasterSource {
    /// A source whose recordings cover `recorded_viewport` (layer space).
    ///
    /// The viewport is clipped to the layer; an empty result means the
    /// source has no recordings at all.
    #[must_use]
    pub fn new(size: Size, recorded_viewport: Rect) -> Self {
        let recorded_viewport = geometry::intersect(recorded_viewport, geometry::rect_from_size(size));
        Self {
            size,
            solid_color: None,
            has_recordings: !geometry::is_empty(recorded_viewport),
            recorded_viewport,
        }
    }

    /// A source recorded over the whole layer.
    #[must_use]
    pub fn fully_recorded(size: Size) -> Self {
        Self::new(size, geometry::rect_from_size(size))
    }

    /// A source that analysis reduced to one uniform color.
    #[must_use]
    pub fn solid(size: Size, color: Color) -> Self {
        Self {
            size,
            solid_color: Some(color),
            recorded_viewport: geometry::rect_from_size(size),
            has_recordings: true,
        }
    }

    /// A source with nothing recorded.
    #[must_use]
    pub fn empty(size: Size) -> Self {
        Self {
            size,
            solid_color: None,
            recorded_viewport: Rect::ZERO,
            has_recordings: false,
        }
    }

    /// Wraps the source for sharing.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Layer size the recording was made for.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Returns `true` if the whole picture is a single color.
    #[must_use]
    pub fn is_solid_color(&self) -> bool {
        self.solid_color.is_some()
    }

    /// The uniform color, if any.
    #[must_use]
    pub fn solid_color(&self) -> Option<Color> {
        self.solid_color
    }

    /// Layer-space rect covered by recordings.
    #[must_use]
    pub fn recorded_viewport(&self) -> Rect {
        self.recorded_viewport
    }

    /// Returns `true` if anything was recorded.
    #[must_use]
    pub fn has_recordings(&self) -> bool {
        self.has_recordings
    }

    /// Returns `true` if recordings cover `content_rect` at `contents_scale`.
    ///
    /// The rect is mapped to layer space, clipped to the layer, and must lie
    /// inside the recorded viewport.
    #[must_use]
    pub fn covers_rect(&self, content_rect: Rect, contents_scale: f64) -> bool {
        if geometry::is_empty_size(self.size) || !self.has_recordings {
            return false;
        }
        let layer_rect = geometry::intersect(
            geometry::scale_to_enclosing(content_rect, 1.0 / contents_scale),
            geometry::rect_from_size(self.size),
        );
        geometry::contains_rect(self.recorded_viewport, layer_rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_recording_covers_everything() {
        let src = RasterSource::fully_recorded(Size::new(1000.0, 1000.0));
        assert!(src.has_recordings());
        assert!(src.covers_rect(Rect::new(0.0, 0.0, 512.0, 512.0), 2.0));
        // Content past the layer edge is clipped away before the check.
        assert!(src.covers_rect(Rect::new(768.0, 768.0, 1024.0, 1024.0), 1.0));
    }

    #[test]
    fn partial_recording_rejects_outside_rects() {
        let src = RasterSource::new(
            Size::new(1000.0, 1000.0),
            Rect::new(0.0, 0.0, 500.0, 1000.0),
        );
        assert!(src.covers_rect(Rect::new(0.0, 0.0, 256.0, 256.0), 1.0));
        assert!(!src.covers_rect(Rect::new(256.0, 0.0, 512.0, 256.0), 0.5));
        assert!(src.covers_rect(Rect::new(0.0, 0.0, 250.0, 250.0), 0.5));
    }

    #[test]
    fn empty_and_solid_sources() {
        let empty = RasterSource::empty(Size::new(10.0, 10.0));
        assert!(!empty.has_recordings());
        assert!(!empty.covers_rect(Rect::new(0.0, 0.0, 1.0, 1.0), 1.0));

        let solid = RasterSource::solid(Size::new(10.0, 10.0), Color::WHITE);
        assert!(solid.is_solid_color());
        assert_eq!(solid.solid_color(), Some(Color::WHITE));
        assert_eq!(Color::rgba(1, 2, 3, 4).opaque().alpha(), 255);
    }
}
