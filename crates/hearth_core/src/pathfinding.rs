//! Grid-based pathfinding using the A* algorithm.
//!
//! All calculations use fixed-point math for deterministic results.
//!
//! # Blocked cells are a soft constraint
//!
//! Blocked cells are not removed from the search. Entering one costs
//! the step cost plus [`PathParams::blocked_penalty`], so routes prefer
//! free ground but still exist when a unit stands inside clutter or its
//! goal hugs a building.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::SimConfig;
use crate::error::{GameError, Result};
use crate::grid::GridIndex;
use crate::math::{Fixed, Vec2Fixed};

/// Cost of an orthogonal step.
pub const ORTHOGONAL_COST: Fixed = Fixed::ONE;

/// Cost of a diagonal step (sqrt 2 in fixed-point bits).
pub const DIAGONAL_COST: Fixed = Fixed::from_bits(6_074_001_000);

/// Default extra cost for entering a blocked cell.
pub const BLOCKED_PENALTY: Fixed = Fixed::const_from_int(50);

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Tunables for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathParams {
    /// Extra cost for stepping into a blocked cell.
    pub blocked_penalty: Fixed,
    /// Ring radius searched for a free cell around a blocked goal.
    pub target_search_radius: u32,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            blocked_penalty: BLOCKED_PENALTY,
            target_search_radius: 4,
        }
    }
}

impl From<&SimConfig> for PathParams {
    fn from(config: &SimConfig) -> Self {
        Self {
            blocked_penalty: config.blocked_penalty,
            target_search_radius: config.target_search_radius,
        }
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    /// Flat cell index.
    index: usize,
    /// g + h.
    f_score: Fixed,
    /// Discovery order; earlier discoveries win ties.
    seq: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse so the lowest f pops first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Manhattan distance in tiles.
#[inline]
fn manhattan_heuristic(x1: u32, y1: u32, x2: u32, y2: u32) -> Fixed {
    Fixed::from_num(x1.abs_diff(x2) + y1.abs_diff(y2))
}

/// Nearest free cell to a blocked one, searching rings of growing radius.
///
/// Within the first ring that has any free cell, the one closest to the
/// center wins; equal distances keep row-major scan order.
#[must_use]
pub fn nearest_free_cell(grid: &GridIndex, x: u32, y: u32, max_radius: u32) -> Option<(u32, u32)> {
    if !grid.is_blocked(x, y) {
        return Some((x, y));
    }

    let (cx, cy) = (i64::from(x), i64::from(y));
    for r in 1..=i64::from(max_radius) {
        let mut best: Option<(i64, (u32, u32))> = None;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs().max(dy.abs()) != r {
                    continue;
                }
                let (nx, ny) = (cx + dx, cy + dy);
                if !grid.in_bounds(nx, ny) || grid.is_blocked(nx as u32, ny as u32) {
                    continue;
                }
                let dist = dx * dx + dy * dy;
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, (nx as u32, ny as u32)));
                }
            }
        }
        if let Some((_, cell)) = best {
            return Some(cell);
        }
    }
    None
}

/// Find a path from `start` to `target`.
///
/// Both points are clamped into the grid. The returned waypoints are
/// tile centers and exclude the start tile; a request whose start and
/// goal share a tile yields that tile's center alone.
///
/// # Errors
///
/// Returns [`GameError::NoPath`] when the goal tile is blocked and no
/// free tile exists within the search radius around it.
pub fn find_path(
    grid: &GridIndex,
    start: Vec2Fixed,
    target: Vec2Fixed,
    params: &PathParams,
) -> Result<Vec<Vec2Fixed>> {
    let (start_x, start_y) = grid.clamp_to_cell(start);
    let (target_x, target_y) = grid.clamp_to_cell(target);

    let (goal_x, goal_y) = nearest_free_cell(grid, target_x, target_y, params.target_search_radius)
        .ok_or(GameError::NoPath {
            from_x: start_x,
            from_y: start_y,
            to_x: target_x,
            to_y: target_y,
        })?;

    if (start_x, start_y) == (goal_x, goal_y) {
        return Ok(vec![grid.cell_center(goal_x, goal_y)]);
    }

    find_path_grid(grid, (start_x, start_y), (goal_x, goal_y), params)
}

/// Internal A* implementation working on grid coordinates.
fn find_path_grid(
    grid: &GridIndex,
    start: (u32, u32),
    goal: (u32, u32),
    params: &PathParams,
) -> Result<Vec<Vec2Fixed>> {
    let cell_count = (grid.width() as usize) * (grid.height() as usize);
    let mut g_score = vec![Fixed::MAX; cell_count];
    let mut came_from: Vec<Option<usize>> = vec![None; cell_count];
    let mut closed = vec![false; cell_count];
    let mut open_set = BinaryHeap::new();
    let mut seq = 0u64;

    let start_index = grid.index_of(start.0, start.1);
    let goal_index = grid.index_of(goal.0, goal.1);
    let width = grid.width() as usize;

    g_score[start_index] = Fixed::ZERO;
    open_set.push(AStarNode {
        index: start_index,
        f_score: manhattan_heuristic(start.0, start.1, goal.0, goal.1),
        seq,
    });

    while let Some(current) = open_set.pop() {
        if current.index == goal_index {
            return Ok(reconstruct_path(grid, &came_from, start_index, goal_index));
        }
        if closed[current.index] {
            continue;
        }
        closed[current.index] = true;

        let cx = (current.index % width) as i64;
        let cy = (current.index / width) as i64;
        let current_g = g_score[current.index];

        for &(dx, dy) in &DIRECTIONS {
            let (nx, ny) = (cx + dx, cy + dy);
            if !grid.in_bounds(nx, ny) {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            let neighbor = grid.index_of(nx, ny);
            if closed[neighbor] {
                continue;
            }

            let step = if dx != 0 && dy != 0 { DIAGONAL_COST } else { ORTHOGONAL_COST };
            let penalty = if grid.is_blocked(nx, ny) { params.blocked_penalty } else { Fixed::ZERO };
            let tentative_g = current_g + step + penalty;

            if tentative_g < g_score[neighbor] {
                came_from[neighbor] = Some(current.index);
                g_score[neighbor] = tentative_g;
                seq += 1;
                open_set.push(AStarNode {
                    index: neighbor,
                    f_score: tentative_g + manhattan_heuristic(nx, ny, goal.0, goal.1),
                    seq,
                });
            }
        }
    }

    // Every in-bounds cell is traversable, so this only triggers on a
    // degenerate grid.
    Err(GameError::NoPath {
        from_x: start.0,
        from_y: start.1,
        to_x: goal.0,
        to_y: goal.1,
    })
}

/// Walk parent links back from the goal and reverse, dropping the start.
fn reconstruct_path(
    grid: &GridIndex,
    came_from: &[Option<usize>],
    start_index: usize,
    goal_index: usize,
) -> Vec<Vec2Fixed> {
    let width = grid.width() as usize;
    let mut path = Vec::new();
    let mut current = goal_index;

    while current != start_index {
        path.push(grid.cell_center((current % width) as u32, (current / width) as u32));
        match came_from[current] {
            Some(prev) => current = prev,
            None => break,
        }
    }

    path.reverse();
    path
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

    fn small_grid() -> GridIndex {
        GridIndex::new(10, 10, fixed(16))
    }

    #[test]
    fn test_diagonal_cost_is_sqrt2() {
        let expected = Fixed::from_num(1.414_213_56);
        let epsilon = Fixed::ONE / Fixed::from_num(1_000_000);
        assert!((DIAGONAL_COST - expected).abs() < epsilon);
    }

    #[test]
    fn test_simple_path() {
        let grid = small_grid();
        let path = find_path(&grid, vec2(8, 8), vec2(88, 88), &PathParams::default()).unwrap();

        // Pure diagonal: five steps, ending at the goal tile center.
        assert_eq!(path.len(), 5);
        assert_eq!(path.first().copied(), Some(vec2(24, 24)));
        assert_eq!(path.last().copied(), Some(vec2(88, 88)));
    }

    #[test]
    fn test_path_to_same_cell() {
        let grid = small_grid();
        let path = find_path(&grid, vec2(20, 20), vec2(30, 30), &PathParams::default()).unwrap();
        assert_eq!(path, vec![vec2(24, 24)]);
    }

    #[test]
    fn test_path_around_obstacle() {
        let mut grid = small_grid();
        // Vertical wall at x = 5 with gaps at the top and bottom rows.
        for y in 1..9 {
            grid.set_blocked(5, y, true);
        }

        let path = find_path(&grid, grid.cell_center(2, 5), grid.cell_center(8, 5), &PathParams::default())
            .unwrap();
        assert_eq!(path.last().copied(), Some(grid.cell_center(8, 5)));
        for waypoint in &path {
            assert!(!grid.is_blocked_at(*waypoint), "path crosses the wall at {waypoint:?}");
        }
    }

    #[test]
    fn test_sealed_wall_is_crossed_with_penalty() {
        let mut grid = small_grid();
        for y in 0..10 {
            grid.set_blocked(5, y, true);
        }

        let path = find_path(&grid, grid.cell_center(2, 5), grid.cell_center(8, 5), &PathParams::default())
            .unwrap();
        let crossings = path.iter().filter(|w| grid.is_blocked_at(**w)).count();
        assert_eq!(crossings, 1);
        assert_eq!(path.last().copied(), Some(grid.cell_center(8, 5)));
    }

    #[test]
    fn test_blocked_goal_redirects_to_nearest_free_cell() {
        let mut grid = small_grid();
        grid.set_blocked(5, 5, true);
        grid.set_blocked(4, 5, true);

        let path = find_path(&grid, grid.cell_center(0, 5), grid.cell_center(5, 5), &PathParams::default())
            .unwrap();
        // Ring 1 around (5,5): (5,4) is the first orthogonal free cell in scan order.
        assert_eq!(path.last().copied(), Some(grid.cell_center(5, 4)));
    }

    #[test]
    fn test_unreachable_goal_reports_no_path() {
        let mut grid = small_grid();
        grid.mark_region(grid.cell_center(5, 5), fixed(16 * 9), fixed(16 * 9), true);

        let result = find_path(&grid, vec2(0, 0), grid.cell_center(5, 5), &PathParams::default());
        assert!(matches!(result, Err(GameError::NoPath { to_x: 5, to_y: 5, .. })));
    }

    #[test]
    fn test_blocked_start_still_routes() {
        let mut grid = small_grid();
        grid.set_blocked(1, 1, true);
        let path = find_path(&grid, grid.cell_center(1, 1), grid.cell_center(6, 1), &PathParams::default())
            .unwrap();
        assert_eq!(path.last().copied(), Some(grid.cell_center(6, 1)));
    }

    #[test]
    fn test_out_of_bounds_points_are_clamped() {
        let grid = small_grid();
        let path = find_path(&grid, vec2(-50, -50), vec2(1000, 8), &PathParams::default()).unwrap();
        assert_eq!(path.last().copied(), Some(grid.cell_center(9, 0)));
    }

    #[test]
    fn test_determinism() {
        let mut grid = GridIndex::new(40, 40, fixed(16));
        for i in 5..35 {
            grid.set_blocked(20, i, true);
            grid.set_blocked(i, 12, true);
        }
        let params = PathParams::default();
        let first = find_path(&grid, vec2(8, 600), vec2(600, 8), &params).unwrap();
        for _ in 0..5 {
            assert_eq!(find_path(&grid, vec2(8, 600), vec2(600, 8), &params).unwrap(), first);
        }
    }

    #[test]
    fn test_nearest_free_cell_prefers_orthogonal() {
        let mut grid = small_grid();
        grid.set_blocked(5, 5, true);
        grid.set_blocked(5, 4, true);
        // (4,4) and (6,4) are diagonal; (4,5) is the first orthogonal free cell.
        assert_eq!(nearest_free_cell(&grid, 5, 5, 4), Some((4, 5)));
        assert_eq!(nearest_free_cell(&grid, 1, 1, 4), Some((1, 1)));
    }
}
