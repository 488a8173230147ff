// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grid math for one tiling.
//!
//! A [`TilingData`] splits a content-space rectangle anchored at the origin
//! into a grid of `max_tile_size` cells. Tiles carry no border texels, so
//! their bounds partition the content exactly; the last row and column are
//! clipped to the content edge.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Rect, Size};

use crate::geometry::{self, to_index};

/// Inclusive range of tile indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileIndexRange {
    /// First column.
    pub left: i32,
    /// First row.
    pub top: i32,
    /// Last column (inclusive).
    pub right: i32,
    /// Last row (inclusive).
    pub bottom: i32,
}

impl TileIndexRange {
    /// Iterates `(i, j)` row by row.
    pub fn iter(self) -> impl Iterator<Item = (i32, i32)> {
        (self.top..=self.bottom).flat_map(move |j| (self.left..=self.right).map(move |i| (i, j)))
    }

    /// Returns `true` if `(i, j)` lies in the range.
    #[must_use]
    pub fn contains(self, i: i32, j: i32) -> bool {
        (self.left..=self.right).contains(&i) && (self.top..=self.bottom).contains(&j)
    }
}

/// Tile grid over `tiling_size` with cells of `max_tile_size`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilingData {
    tiling_size: Size,
    max_tile_size: Size,
    num_tiles_x: i32,
    num_tiles_y: i32,
}

impl TilingData {
    /// Creates the grid.
    ///
    /// # Panics
    ///
    /// Panics if `max_tile_size` is empty while the content is not.
    #[must_use]
    pub fn new(tiling_size: Size, max_tile_size: Size) -> Self {
        let mut data = Self {
            tiling_size,
            max_tile_size,
            num_tiles_x: 0,
            num_tiles_y: 0,
        };
        data.recompute();
        data
    }

    /// Content bounds covered by the grid.
    #[must_use]
    pub fn tiling_size(&self) -> Size {
        self.tiling_size
    }

    /// Size of a full cell.
    #[must_use]
    pub fn max_tile_size(&self) -> Size {
        self.max_tile_size
    }

    /// Content bounds as a rect at the origin.
    #[must_use]
    pub fn tiling_rect(&self) -> Rect {
        geometry::rect_from_size(self.tiling_size)
    }

    /// Changes the content bounds.
    pub fn set_tiling_size(&mut self, tiling_size: Size) {
        self.tiling_size = tiling_size;
        self.recompute();
    }

    /// Changes the cell size.
    pub fn set_max_tile_size(&mut self, max_tile_size: Size) {
        self.max_tile_size = max_tile_size;
        self.recompute();
    }

    /// Number of columns.
    #[must_use]
    pub fn num_tiles_x(&self) -> i32 {
        self.num_tiles_x
    }

    /// Number of rows.
    #[must_use]
    pub fn num_tiles_y(&self) -> i32 {
        self.num_tiles_y
    }

    /// Column containing content coordinate `x`, clamped to the grid.
    #[must_use]
    pub fn tile_x_index_from_src_coord(&self, x: f64) -> i32 {
        Self::index_from_coord(x, self.max_tile_size.width, self.num_tiles_x)
    }

    /// Row containing content coordinate `y`, clamped to the grid.
    #[must_use]
    pub fn tile_y_index_from_src_coord(&self, y: f64) -> i32 {
        Self::index_from_coord(y, self.max_tile_size.height, self.num_tiles_y)
    }

    /// Content-space bounds of cell `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the grid.
    #[must_use]
    pub fn tile_bounds(&self, i: i32, j: i32) -> Rect {
        assert!(
            (0..self.num_tiles_x).contains(&i) && (0..self.num_tiles_y).contains(&j),
            "tile index ({i}, {j}) outside {}x{} grid",
            self.num_tiles_x,
            self.num_tiles_y
        );
        let w = self.max_tile_size.width;
        let h = self.max_tile_size.height;
        let x0 = f64::from(i) * w;
        let y0 = f64::from(j) * h;
        Rect::new(
            x0,
            y0,
            (x0 + w).min(self.tiling_size.width),
            (y0 + h).min(self.tiling_size.height),
        )
    }

    /// Cells overlapping `rect`, or `None` when it misses the content.
    #[must_use]
    pub fn tile_rect_indices(&self, rect: Rect) -> Option<TileIndexRange> {
        let clipped = geometry::intersect(rect, self.tiling_rect());
        if geometry::is_empty(clipped) || self.num_tiles_x == 0 || self.num_tiles_y == 0 {
            return None;
        }
        Some(TileIndexRange {
            left: self.tile_x_index_from_src_coord(clipped.x0),
            top: self.tile_y_index_from_src_coord(clipped.y0),
            right: self.tile_x_index_from_src_coord(clipped.x1 - 1.0),
            bottom: self.tile_y_index_from_src_coord(clipped.y1 - 1.0),
        })
    }

    fn index_from_coord(v: f64, cell: f64, count: i32) -> i32 {
        if count == 0 {
            return 0;
        }
        to_index((v / cell).floor()).clamp(0, count - 1)
    }

    fn recompute(&mut self) {
        if geometry::is_empty_size(self.tiling_size) {
            self.num_tiles_x = 0;
            self.num_tiles_y = 0;
            return;
        }
        assert!(
            !geometry::is_empty_size(self.max_tile_size),
            "tile size must not be empty for non-empty content"
        );
        self.num_tiles_x = to_index((self.tiling_size.width / self.max_tile_size.width).ceil());
        self.num_tiles_y = to_index((self.tiling_size.height / self.max_tile_size.height).ceil());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimensions_round_up() {
        let data = TilingData::new(Size::new(2000.0, 2000.0), Size::new(256.0, 256.0));
        assert_eq!(data.num_tiles_x(), 8);
        assert_eq!(data.num_tiles_y(), 8);
        assert_eq!(data.tile_bounds(7, 7), Rect::new(1792.0, 1792.0, 2000.0, 2000.0));
    }

    #[test]
    fn empty_content_has_no_tiles() {
        let data = TilingData::new(Size::new(0.0, 300.0), Size::new(256.0, 256.0));
        assert_eq!(data.num_tiles_x(), 0);
        assert_eq!(data.tile_rect_indices(Rect::new(0.0, 0.0, 10.0, 10.0)), None);
    }

    #[test]
    fn index_lookup_clamps() {
        let data = TilingData::new(Size::new(500.0, 300.0), Size::new(100.0, 100.0));
        assert_eq!(data.tile_x_index_from_src_coord(-5.0), 0);
        assert_eq!(data.tile_x_index_from_src_coord(99.0), 0);
        assert_eq!(data.tile_x_index_from_src_coord(100.0), 1);
        assert_eq!(data.tile_x_index_from_src_coord(10_000.0), 4);
    }

    #[test]
    fn rect_indices_are_inclusive() {
        let data = TilingData::new(Size::new(500.0, 300.0), Size::new(100.0, 100.0));
        let range = data
            .tile_rect_indices(Rect::new(150.0, 0.0, 300.0, 101.0))
            .unwrap();
        assert_eq!(
            range,
            TileIndexRange {
                left: 1,
                top: 0,
                right: 2,
                bottom: 1
            }
        );
        assert_eq!(range.iter().count(), 4);
        assert!(range.contains(2, 1));
        assert!(!range.contains(3, 1));
        assert_eq!(data.tile_rect_indices(Rect::new(600.0, 0.0, 700.0, 10.0)), None);
    }

    #[test]
    fn tile_bounds_partition_content() {
        let data = TilingData::new(Size::new(333.0, 129.0), Size::new(64.0, 64.0));
        let mut area = 0.0;
        for j in 0..data.num_tiles_y() {
            for i in 0..data.num_tiles_x() {
                area += data.tile_bounds(i, j).area();
            }
        }
        assert_eq!(area, 333.0 * 129.0);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn out_of_grid_bounds_panics() {
        let data = TilingData::new(Size::new(100.0, 100.0), Size::new(64.0, 64.0));
        let _ = data.tile_bounds(2, 0);
    }
}
