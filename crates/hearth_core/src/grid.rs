//! Static occupancy grid over world space.
//!
//! Each tile is either free or blocked. Buildings and trees flip their
//! footprint through [`GridIndex::mark_region`]; there is no reference
//! counting, so clearing a region also clears blocking contributed by
//! anything else on the same cells. Placement validation keeps
//! footprints disjoint, which is what makes that safe.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Boolean occupancy grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    /// Grid width in cells.
    width: u32,
    /// Grid height in cells.
    height: u32,
    /// Blocked flags in row-major order.
    cells: Vec<bool>,
    /// Size of each cell in world units.
    #[serde(with = "fixed_serde")]
    tile_size: Fixed,
}

impl GridIndex {
    /// Create a grid with every cell free.
    ///
    /// Zero dimensions are raised to one so the grid is never empty.
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: Fixed) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let tile_size = if tile_size > Fixed::ZERO { tile_size } else { Fixed::ONE };
        Self {
            width,
            height,
            cells: vec![false; (width as usize) * (height as usize)],
            tile_size,
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn tile_size(&self) -> Fixed {
        self.tile_size
    }

    #[inline]
    fn coords_to_index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Flat index of a cell, used as a dense key by the pathfinder.
    #[must_use]
    pub fn index_of(&self, x: u32, y: u32) -> usize {
        self.coords_to_index(x, y)
    }

    /// Check if signed cell coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    /// Whether a cell is blocked. Cells outside the grid count as blocked.
    #[must_use]
    pub fn is_blocked(&self, x: u32, y: u32) -> bool {
        if x < self.width && y < self.height {
            self.cells[self.coords_to_index(x, y)]
        } else {
            true
        }
    }

    /// Set one cell. Returns `false` if out of bounds.
    pub fn set_blocked(&mut self, x: u32, y: u32, blocked: bool) -> bool {
        if x < self.width && y < self.height {
            let index = self.coords_to_index(x, y);
            self.cells[index] = blocked;
            true
        } else {
            false
        }
    }

    /// Cell containing a world position, without clamping.
    #[must_use]
    pub fn world_to_cell(&self, pos: Vec2Fixed) -> (i64, i64) {
        (
            (pos.x / self.tile_size).floor().to_num::<i64>(),
            (pos.y / self.tile_size).floor().to_num::<i64>(),
        )
    }

    /// Cell containing a world position, clamped into the grid.
    #[must_use]
    pub fn clamp_to_cell(&self, pos: Vec2Fixed) -> (u32, u32) {
        let (x, y) = self.world_to_cell(pos);
        (
            x.clamp(0, i64::from(self.width) - 1) as u32,
            y.clamp(0, i64::from(self.height) - 1) as u32,
        )
    }

    /// World position of a cell's center.
    #[must_use]
    pub fn cell_center(&self, x: u32, y: u32) -> Vec2Fixed {
        let half = self.tile_size / 2;
        Vec2Fixed::new(
            Fixed::from_num(x) * self.tile_size + half,
            Fixed::from_num(y) * self.tile_size + half,
        )
    }

    /// Whether the cell under a world position is blocked.
    #[must_use]
    pub fn is_blocked_at(&self, pos: Vec2Fixed) -> bool {
        let (x, y) = self.world_to_cell(pos);
        if !self.in_bounds(x, y) {
            return true;
        }
        self.is_blocked(x as u32, y as u32)
    }

    /// Cell span on one axis covered by `[center - extent/2, center + extent/2)`.
    ///
    /// A cell is covered when its center lies inside the interval. An
    /// interval too narrow to contain any center still covers the cell
    /// holding `center`.
    fn axis_span(&self, center: Fixed, extent: Fixed) -> (i64, i64) {
        let half_extent = extent / 2;
        let half_cell = Fixed::ONE / 2;
        let first = ((center - half_extent) / self.tile_size - half_cell).ceil().to_num::<i64>();
        let last = ((center + half_extent) / self.tile_size - half_cell).ceil().to_num::<i64>() - 1;
        if first > last {
            let own = (center / self.tile_size).floor().to_num::<i64>();
            (own, own)
        } else {
            (first, last)
        }
    }

    /// Cells covered by a rectangle, clipped to the grid.
    #[must_use]
    pub fn covered_cells(&self, center: Vec2Fixed, width: Fixed, height: Fixed) -> Vec<(u32, u32)> {
        let (x0, x1) = self.axis_span(center.x, width);
        let (y0, y1) = self.axis_span(center.y, height);
        let x0 = x0.max(0);
        let y0 = y0.max(0);
        let x1 = x1.min(i64::from(self.width) - 1);
        let y1 = y1.min(i64::from(self.height) - 1);

        let mut cells = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                cells.push((x as u32, y as u32));
            }
        }
        cells
    }

    /// Flip every cell covered by a rectangle to `blocked`.
    ///
    /// Returns the number of cells touched.
    pub fn mark_region(&mut self, center: Vec2Fixed, width: Fixed, height: Fixed, blocked: bool) -> usize {
        let cells = self.covered_cells(center, width, height);
        for &(x, y) in &cells {
            self.set_blocked(x, y, blocked);
        }
        cells.len()
    }

    /// Number of blocked cells.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|&&b| b).count()
    }
}

impl Default for GridIndex {
    /// 128x128 tiles of 16 world units.
    fn default() -> Self {
        Self::new(128, 128, Fixed::from_num(16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    #[test]
    fn test_world_to_cell_and_center() {
        let grid = GridIndex::new(10, 10, fixed(16));
        assert_eq!(grid.world_to_cell(vec2(17, 40)), (1, 2));
        assert_eq!(grid.world_to_cell(vec2(-1, 0)), (-1, 0));
        assert_eq!(grid.cell_center(1, 2), vec2(24, 40));
        assert_eq!(grid.clamp_to_cell(vec2(500, -30)), (9, 0));
    }

    #[test]
    fn test_out_of_bounds_is_blocked() {
        let grid = GridIndex::new(4, 4, fixed(16));
        assert!(grid.is_blocked(4, 0));
        assert!(grid.is_blocked_at(vec2(-5, 5)));
        assert!(!grid.is_blocked(3, 3));
    }

    #[test]
    fn test_mark_region_uses_cell_centers() {
        let mut grid = GridIndex::default();

        // 24x24 hub at (400, 400) spans [388, 412): centers 392 and 408.
        let touched = grid.mark_region(vec2(400, 400), fixed(24), fixed(24), true);
        assert_eq!(touched, 4);
        for (x, y) in [(24, 24), (25, 24), (24, 25), (25, 25)] {
            assert!(grid.is_blocked(x, y), "cell ({x}, {y}) should be blocked");
        }
        assert!(!grid.is_blocked(26, 25));

        // 16x16 house at (420, 420) spans [412, 428): center 424 only.
        assert_eq!(grid.covered_cells(vec2(420, 420), fixed(16), fixed(16)), vec![(26, 26)]);
    }

    #[test]
    fn test_narrow_region_covers_own_cell() {
        let grid = GridIndex::default();
        // [20, 24) holds no cell center (8, 24, 40...) so the cell under 22 is used.
        assert_eq!(grid.covered_cells(vec2(22, 22), fixed(4), fixed(4)), vec![(1, 1)]);
    }

    #[test]
    fn test_mark_region_clips_to_bounds() {
        let mut grid = GridIndex::new(4, 4, fixed(16));
        let touched = grid.mark_region(vec2(0, 0), fixed(64), fixed(64), true);
        assert_eq!(touched, 4);
        assert_eq!(grid.blocked_count(), 4);
    }

    #[test]
    fn test_unmark_has_no_refcount() {
        let mut grid = GridIndex::default();
        grid.mark_region(vec2(400, 400), fixed(24), fixed(24), true);
        grid.mark_region(vec2(400, 400), fixed(16), fixed(16), true);
        grid.mark_region(vec2(400, 400), fixed(16), fixed(16), false);
        // The smaller region's cell is freed even though the larger one still covers it.
        assert!(!grid.is_blocked(24, 24));
        assert_eq!(grid.blocked_count(), 3);
    }
}
