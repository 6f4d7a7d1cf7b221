//! Property tests for the grid, the pathfinder and volley splitting.

use hearth_core::buildings;
use hearth_core::combat::{split_damage, volley_count};
use hearth_core::components::{BuildingKind, Health, Owner};
use hearth_core::config::SimConfig;
use hearth_core::events::TickEvents;
use hearth_core::grid::GridIndex;
use hearth_core::math::{Fixed, Vec2Fixed};
use hearth_core::pathfinding::{find_path, PathParams};
use hearth_core::world::WorldState;
use hearth_test_utils::fixtures::{cluttered_grid, fixed};
use proptest::prelude::*;

fn arb_kind() -> impl Strategy<Value = BuildingKind> {
    prop::sample::select(BuildingKind::ALL.to_vec())
}

proptest! {
    /// Cells blocked only by a demolished building become free again;
    /// cells shared with a surviving building stay blocked.
    #[test]
    fn prop_demolish_frees_exclusive_cells(
        a in arb_kind(),
        b in arb_kind(),
        ax in 100i32..1900,
        ay in 100i32..1900,
        bx in 100i32..1900,
        by in 100i32..1900,
    ) {
        let mut world = WorldState::new(SimConfig::default()).unwrap();
        let mut events = TickEvents::default();
        let keep = buildings::construct(&mut world, Owner::Player, b, Vec2Fixed::from_ints(bx, by), &mut events);
        let gone = buildings::construct(&mut world, Owner::Player, a, Vec2Fixed::from_ints(ax, ay), &mut events);

        let size = |kind| {
            let def = world.building_def(kind);
            (def.width, def.height)
        };
        let (aw, ah) = size(a);
        let (bw, bh) = size(b);
        let a_cells = world.grid.covered_cells(Vec2Fixed::from_ints(ax, ay), aw, ah);
        let b_cells = world.grid.covered_cells(Vec2Fixed::from_ints(bx, by), bw, bh);

        buildings::demolish(&mut world, gone, &mut events).unwrap();
        prop_assert!(world.buildings.contains(keep));
        for cell in &a_cells {
            prop_assert_eq!(world.grid.is_blocked(cell.0, cell.1), b_cells.contains(cell));
        }
        for cell in &b_cells {
            prop_assert!(world.grid.is_blocked(cell.0, cell.1));
        }
    }

    /// Marking then unmarking a region restores the free grid.
    #[test]
    fn prop_mark_unmark_restores_grid(
        x in 0i32..1024,
        y in 0i32..1024,
        w in 1i32..128,
        h in 1i32..128,
    ) {
        let mut grid = GridIndex::new(64, 64, fixed(16));
        let center = Vec2Fixed::from_ints(x, y);
        let marked = grid.mark_region(center, fixed(w), fixed(h), true);
        prop_assert_eq!(grid.blocked_count(), marked);
        grid.mark_region(center, fixed(w), fixed(h), false);
        prop_assert_eq!(grid.blocked_count(), 0);
    }

    /// In a connected map the path is non-empty and ends within one tile
    /// of the goal.
    #[test]
    fn prop_path_reaches_goal_region(
        seed in any::<u64>(),
        sx in 0u32..48,
        sy in 0u32..48,
        gx in 0u32..48,
        gy in 0u32..48,
    ) {
        let grid = cluttered_grid(48, 48, seed);
        prop_assume!(!grid.is_blocked(sx, sy) && !grid.is_blocked(gx, gy));
        let start = grid.cell_center(sx, sy);
        let goal = grid.cell_center(gx, gy);

        let path = find_path(&grid, start, goal, &PathParams::default()).unwrap();
        prop_assert!(!path.is_empty());
        let end = *path.last().unwrap();
        prop_assert!(end.distance(goal) <= grid.tile_size());
    }

    /// Volley shares sum to the base damage and the count stays in
    /// `1..=squad_size`.
    #[test]
    fn prop_volleys_conserve_damage(
        squad in 1u32..12,
        max in 1i32..500,
        current in 0i32..500,
        damage in 0i32..1000,
    ) {
        let health = Health { current: current.min(max), max };
        let count = volley_count(squad, &health);
        prop_assert!((1..=squad).contains(&count));

        let shares = split_damage(damage, count);
        prop_assert_eq!(shares.len() as u32, count);
        prop_assert_eq!(shares.iter().sum::<i32>(), damage);
        let spread = shares.iter().max().unwrap() - shares.iter().min().unwrap();
        prop_assert!(spread <= 1);
    }

    /// Fixed-point distance never disagrees with its square.
    #[test]
    fn prop_distance_matches_square(x in -2000i32..2000, y in -2000i32..2000) {
        let v = Vec2Fixed::from_ints(x, y);
        let d = v.distance(Vec2Fixed::ZERO);
        let err = (d * d - v.distance_squared(Vec2Fixed::ZERO)).abs();
        prop_assert!(err <= Fixed::from_num(2) + d / 100);
    }
}
