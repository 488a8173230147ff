// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integral rectangle helpers and invalidation regions.
//!
//! Tiling geometry works in whole content pixels. Rectangles are carried as
//! [`kurbo::Rect`] values whose coordinates are always integral; the helpers
//! here keep them that way when mapping between content scales.
//!
//! Scaling a rectangle by a float factor can land a hair away from an integer
//! (`2000.0 * 0.1 == 200.00000000000003`). [`floor_snapped`] and
//! [`ceil_snapped`] absorb that error before rounding so that enclosing rects
//! and ceiled sizes do not grow by a spurious pixel.

use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Rect, Size};

/// Slack absorbed when rounding a scaled coordinate.
const SNAP_EPSILON: f64 = 1e-5;

/// Rounds down, treating values within [`SNAP_EPSILON`] of the next integer
/// as that integer.
#[inline]
#[must_use]
pub fn floor_snapped(v: f64) -> f64 {
    (v + SNAP_EPSILON).floor()
}

/// Rounds up, treating values within [`SNAP_EPSILON`] of the previous integer
/// as that integer.
#[inline]
#[must_use]
pub fn ceil_snapped(v: f64) -> f64 {
    (v - SNAP_EPSILON).ceil()
}

/// Converts an integral coordinate to a grid index.
#[inline]
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "tiling coordinates are integral and bounded by i32 texture limits"
)]
pub fn to_index(v: f64) -> i32 {
    v as i32
}

/// A rectangle at the origin with the given size.
#[inline]
#[must_use]
pub fn rect_from_size(size: Size) -> Rect {
    Rect::new(0.0, 0.0, size.width, size.height)
}

/// Returns `true` if the rectangle covers no area.
///
/// Unlike comparing the area with zero, this also treats inverted and NaN
/// rectangles as empty.
#[inline]
#[must_use]
pub fn is_empty(rect: Rect) -> bool {
    !(rect.x1 > rect.x0 && rect.y1 > rect.y0)
}

/// Returns `true` if the size covers no area.
#[inline]
#[must_use]
pub fn is_empty_size(size: Size) -> bool {
    !(size.width > 0.0 && size.height > 0.0)
}

/// Integral area of a rectangle, zero when empty.
#[inline]
#[must_use]
pub fn area(rect: Rect) -> f64 {
    if is_empty(rect) { 0.0 } else { rect.area() }
}

/// Returns `true` if both rectangles are non-empty and share interior area.
#[inline]
#[must_use]
pub fn overlaps(a: Rect, b: Rect) -> bool {
    !is_empty(a) && !is_empty(b) && a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Returns `true` if `inner` lies entirely within `outer`.
///
/// An empty `inner` is contained by any `outer`.
#[inline]
#[must_use]
pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    if is_empty(inner) {
        return true;
    }
    outer.x0 <= inner.x0 && inner.x1 <= outer.x1 && outer.y0 <= inner.y0 && inner.y1 <= outer.y1
}

/// Intersection of two rectangles, `Rect::ZERO` when they do not overlap.
#[inline]
#[must_use]
pub fn intersect(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if is_empty(r) { Rect::ZERO } else { r }
}

/// Smallest integral rectangle containing `rect`.
#[inline]
#[must_use]
pub fn enclosing(rect: Rect) -> Rect {
    Rect::new(
        floor_snapped(rect.x0),
        floor_snapped(rect.y0),
        ceil_snapped(rect.x1),
        ceil_snapped(rect.y1),
    )
}

/// Largest integral rectangle inside `rect`.
#[inline]
#[must_use]
pub fn enclosed(rect: Rect) -> Rect {
    let r = Rect::new(
        ceil_snapped(rect.x0),
        ceil_snapped(rect.y0),
        floor_snapped(rect.x1),
        floor_snapped(rect.y1),
    );
    if is_empty(r) { Rect::ZERO } else { r }
}

/// Scales `rect` about the origin and returns the smallest enclosing integral
/// rectangle.
#[inline]
#[must_use]
pub fn scale_to_enclosing(rect: Rect, scale: f64) -> Rect {
    if is_empty(rect) {
        return Rect::ZERO;
    }
    enclosing(rect.scale_from_origin(scale))
}

/// Scales `rect` about the origin and returns the largest integral rectangle
/// inside the result.
#[inline]
#[must_use]
pub fn scale_to_enclosed(rect: Rect, scale: f64) -> Rect {
    if is_empty(rect) {
        return Rect::ZERO;
    }
    enclosed(rect.scale_from_origin(scale))
}

/// Removes `cut` from `rect` where the remainder is still a rectangle.
///
/// When `cut` spans `rect` fully along one axis the covered edge band is
/// trimmed off; other partial overlaps leave `rect` unchanged.
#[must_use]
pub fn subtract(rect: Rect, cut: Rect) -> Rect {
    if !overlaps(rect, cut) {
        return rect;
    }
    if contains_rect(cut, rect) {
        return Rect::ZERO;
    }
    let mut r = rect;
    if cut.y0 <= rect.y0 && cut.y1 >= rect.y1 {
        if cut.x0 <= rect.x0 {
            r.x0 = cut.x1;
        } else if cut.x1 >= rect.x1 {
            r.x1 = cut.x0;
        }
    } else if cut.x0 <= rect.x0 && cut.x1 >= rect.x1 {
        if cut.y0 <= rect.y0 {
            r.y0 = cut.y1;
        } else if cut.y1 >= rect.y1 {
            r.y1 = cut.y0;
        }
    }
    r
}

/// Scales a size and rounds each dimension up.
#[inline]
#[must_use]
pub fn ceiled_size(size: Size, scale: f64) -> Size {
    Size::new(
        ceil_snapped(size.width * scale).max(0.0),
        ceil_snapped(size.height * scale).max(0.0),
    )
}

/// Smallest rectangle containing both inputs; empty inputs are ignored.
#[inline]
#[must_use]
pub fn union(a: Rect, b: Rect) -> Rect {
    match (is_empty(a), is_empty(b)) {
        (true, true) => Rect::ZERO,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.union(b),
    }
}

/// Sum of the horizontal and vertical gaps between two rectangles.
///
/// Touching or overlapping rectangles are at distance zero.
#[inline]
#[must_use]
pub fn manhattan_distance(a: Rect, b: Rect) -> f64 {
    let dx = (a.x0.max(b.x0) - a.x1.min(b.x1)).max(0.0);
    let dy = (a.y0.max(b.y0) - a.y1.min(b.y1)).max(0.0);
    dx + dy
}

/// A set of rectangles, used for invalidation.
///
/// Member rectangles may overlap; queries only ask whether a rectangle
/// touches the region, never for an exact area.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering one rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }

    /// Returns `true` if the region covers nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Adds a rectangle to the region. Empty rectangles are ignored.
    pub fn union_rect(&mut self, rect: Rect) {
        if is_empty(rect) {
            return;
        }
        if self.rects.iter().any(|r| contains_rect(*r, rect)) {
            return;
        }
        self.rects.retain(|r| !contains_rect(rect, *r));
        self.rects.push(rect);
    }

    /// Adds every rectangle of `other` to this region.
    pub fn union(&mut self, other: &Self) {
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    /// Returns `true` if `rect` overlaps any part of the region.
    #[must_use]
    pub fn intersects(&self, rect: Rect) -> bool {
        self.rects.iter().any(|r| overlaps(*r, rect))
    }

    /// Bounding box of the region.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.rects.iter().fold(Rect::ZERO, |acc, r| union(acc, *r))
    }

    /// Iterates the member rectangles.
    pub fn iter(&self) -> impl Iterator<Item = Rect> + '_ {
        self.rects.iter().copied()
    }

    /// Removes every rectangle.
    pub fn clear(&mut self) {
        self.rects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_absorbs_float_noise() {
        let r = Rect::new(0.0, 0.0, 2000.0, 2000.0);
        let scaled = scale_to_enclosing(r, 0.1);
        assert_eq!(scaled, Rect::new(0.0, 0.0, 200.0, 200.0));
    }

    #[test]
    fn enclosing_rounds_outward() {
        let r = Rect::new(1.0, 1.0, 3.0, 3.0);
        assert_eq!(scale_to_enclosing(r, 0.5), Rect::new(0.0, 0.0, 2.0, 2.0));
        assert_eq!(scale_to_enclosing(r, 1.5), Rect::new(1.0, 1.0, 5.0, 5.0));
    }

    #[test]
    fn ceiled_size_rounds_up() {
        let s = ceiled_size(Size::new(100.0, 33.0), 0.25);
        assert_eq!(s, Size::new(25.0, 9.0));
    }

    #[test]
    fn overlaps_excludes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!overlaps(a, b));
        assert!(overlaps(a, Rect::new(9.0, 9.0, 11.0, 11.0)));
        assert!(!overlaps(a, Rect::ZERO));
    }

    #[test]
    fn subtract_trims_spanning_cuts_only() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            subtract(r, Rect::new(-10.0, -10.0, 40.0, 200.0)),
            Rect::new(40.0, 0.0, 100.0, 100.0)
        );
        assert_eq!(
            subtract(r, Rect::new(0.0, 70.0, 100.0, 120.0)),
            Rect::new(0.0, 0.0, 100.0, 70.0)
        );
        // A hole in the middle cannot be expressed as one rect.
        assert_eq!(subtract(r, Rect::new(10.0, 10.0, 20.0, 20.0)), r);
        assert!(is_empty(subtract(r, Rect::new(-1.0, -1.0, 101.0, 101.0))));
    }

    #[test]
    fn enclosed_rounds_inward() {
        let r = Rect::new(1.0, 1.0, 3.0, 3.0);
        assert_eq!(scale_to_enclosed(r, 1.5), Rect::new(2.0, 2.0, 4.0, 4.0));
        assert_eq!(scale_to_enclosed(Rect::new(1.0, 1.0, 2.0, 2.0), 0.5), Rect::ZERO);
    }

    #[test]
    fn manhattan_distance_sums_gaps() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(manhattan_distance(a, Rect::new(5.0, 5.0, 6.0, 6.0)), 0.0);
        assert_eq!(manhattan_distance(a, Rect::new(15.0, 0.0, 20.0, 10.0)), 5.0);
        assert_eq!(manhattan_distance(a, Rect::new(13.0, 14.0, 20.0, 20.0)), 7.0);
    }

    #[test]
    fn region_merges_contained_rects() {
        let mut region = Region::new();
        region.union_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        region.union_rect(Rect::new(2.0, 2.0, 4.0, 4.0));
        assert_eq!(region.iter().count(), 1);
        region.union_rect(Rect::new(-5.0, -5.0, 20.0, 20.0));
        assert_eq!(region.iter().count(), 1);
        assert_eq!(region.bounds(), Rect::new(-5.0, -5.0, 20.0, 20.0));
    }

    #[test]
    fn region_intersection_queries() {
        let region = Region::from_rect(Rect::new(100.0, 100.0, 200.0, 200.0));
        assert!(region.intersects(Rect::new(150.0, 150.0, 300.0, 300.0)));
        assert!(!region.intersects(Rect::new(200.0, 0.0, 300.0, 100.0)));
        assert!(Region::new().bounds() == Rect::ZERO);
    }
}
