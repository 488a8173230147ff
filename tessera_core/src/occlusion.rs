// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Occlusion supplied by the scene for one layer.
//!
//! Occluders are opaque rectangles drawn above the layer, expressed in the
//! layer's content space. A rect counts as occluded only when a single
//! occluder covers it completely.

use alloc::vec::Vec;

use kurbo::Rect;

use crate::geometry;

/// Opaque regions in front of a layer, in layer space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Occlusion {
    occluders: Vec<Rect>,
}

impl Occlusion {
    /// No occlusion.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            occluders: Vec::new(),
        }
    }

    /// Occlusion from a set of opaque rects.
    #[must_use]
    pub fn from_rects(rects: impl IntoIterator<Item = Rect>) -> Self {
        Self {
            occluders: rects
                .into_iter()
                .filter(|r| !geometry::is_empty(*r))
                .collect(),
        }
    }

    /// Returns `true` if nothing is occluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occluders.is_empty()
    }

    /// Returns `true` if `rect` is hidden. Empty rects are always hidden.
    #[must_use]
    pub fn is_occluded(&self, rect: Rect) -> bool {
        if geometry::is_empty(rect) {
            return true;
        }
        self.occluders
            .iter()
            .any(|o| geometry::contains_rect(*o, rect))
    }

    /// Part of `rect` left visible, trimmed where occluders span it.
    #[must_use]
    pub fn unoccluded_rect(&self, rect: Rect) -> Rect {
        self.occluders
            .iter()
            .fold(rect, |r, o| geometry::subtract(r, *o))
    }

    /// The same occlusion in a content space scaled by `scale`.
    ///
    /// Occluders shrink to whole pixels so that nothing partially covered
    /// is reported hidden.
    #[must_use]
    pub fn scaled(&self, scale: f64) -> Self {
        Self::from_rects(
            self.occluders
                .iter()
                .map(|o| geometry::scale_to_enclosed(*o, scale)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_occluder_must_cover() {
        let occ = Occlusion::from_rects([
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(100.0, 0.0, 200.0, 100.0),
        ]);
        assert!(occ.is_occluded(Rect::new(10.0, 10.0, 90.0, 90.0)));
        // Straddles both occluders; neither covers it alone.
        assert!(!occ.is_occluded(Rect::new(50.0, 10.0, 150.0, 90.0)));
        assert!(Occlusion::none().is_empty());
    }

    #[test]
    fn unoccluded_rect_trims_edges() {
        let occ = Occlusion::from_rects([Rect::new(0.0, 0.0, 50.0, 100.0)]);
        assert_eq!(
            occ.unoccluded_rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
            Rect::new(50.0, 0.0, 100.0, 100.0)
        );
    }

    #[test]
    fn scaling_shrinks_occluders() {
        let occ = Occlusion::from_rects([Rect::new(1.0, 1.0, 3.0, 3.0)]).scaled(1.5);
        assert!(occ.is_occluded(Rect::new(2.0, 2.0, 4.0, 4.0)));
        assert!(!occ.is_occluded(Rect::new(1.0, 1.0, 4.0, 4.0)));
    }
}
