//! Test fixtures and helpers.
//!
//! Pre-built worlds and entity layouts for consistent testing.

use fixed::types::I32F32;
use hearth_core::components::{BuildingKind, EntityId, Owner, UnitKind};
use hearth_core::config::SimConfig;
use hearth_core::grid::GridIndex;
use hearth_core::math::Vec2Fixed;
use hearth_core::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// World point from integer coordinates.
#[must_use]
pub fn vec2(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Default config with the opponent switched off.
#[must_use]
pub fn quiet_config() -> SimConfig {
    SimConfig {
        ai_disabled: true,
        ..SimConfig::default()
    }
}

/// Where [`settlement`] puts the player's hub.
pub const HUB_POSITION: (i32, i32) = (400, 400);

/// Ids of the entities in a [`settlement`] fixture.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Player town center.
    pub hub: EntityId,
    /// Player farm.
    pub farm: EntityId,
    /// Player lumber mill.
    pub mill: EntityId,
    /// Player villagers.
    pub villagers: Vec<EntityId>,
    /// Trees around the mill.
    pub trees: Vec<EntityId>,
}

/// A small player settlement: hub, farm, lumber mill, a tree line and
/// `villagers` villagers standing south of the hub.
///
/// # Panics
///
/// Panics if the fixture layout is invalid for `config`.
#[must_use]
pub fn settlement(config: SimConfig, villagers: usize) -> (Simulation, Settlement) {
    let mut sim = Simulation::new(config).expect("valid config");
    let (hx, hy) = HUB_POSITION;
    let hub = sim
        .spawn_building(Owner::Player, BuildingKind::TownCenter, vec2(hx, hy))
        .expect("hub fits");
    let farm = sim
        .spawn_building(Owner::Player, BuildingKind::Farm, vec2(hx + 80, hy))
        .expect("farm fits");
    let mill = sim
        .spawn_building(Owner::Player, BuildingKind::LumberMill, vec2(hx - 80, hy))
        .expect("mill fits");
    let trees = (0..4)
        .map(|i| {
            sim.spawn_tree(vec2(hx - 150, hy - 48 + i * 32))
                .expect("tree on map")
        })
        .collect();
    let villagers = (0..villagers as i32)
        .map(|i| {
            sim.spawn_unit(Owner::Player, UnitKind::Villager, vec2(hx - 40 + (i % 5) * 20, hy + 48 + (i / 5) * 20))
                .expect("villager on map")
        })
        .collect();
    (
        sim,
        Settlement {
            hub,
            farm,
            mill,
            villagers,
            trees,
        },
    )
}

/// Two armies facing each other across open ground, opponent AI off.
///
/// Returns the simulation plus player and opponent unit ids.
///
/// # Panics
///
/// Panics if the fixture layout is invalid.
#[must_use]
pub fn skirmish(soldiers: i32, archers: i32) -> (Simulation, Vec<EntityId>, Vec<EntityId>) {
    let mut sim = Simulation::new(quiet_config()).expect("valid config");
    let mut player = Vec::new();
    let mut opponent = Vec::new();
    for i in 0..soldiers {
        player.push(
            sim.spawn_unit(Owner::Player, UnitKind::Soldier, vec2(600, 500 + i * 24))
                .expect("on map"),
        );
        opponent.push(
            sim.spawn_unit(Owner::Opponent, UnitKind::Soldier, vec2(720, 500 + i * 24))
                .expect("on map"),
        );
    }
    for i in 0..archers {
        player.push(
            sim.spawn_unit(Owner::Player, UnitKind::Archer, vec2(560, 500 + i * 24))
                .expect("on map"),
        );
        opponent.push(
            sim.spawn_unit(Owner::Opponent, UnitKind::Archer, vec2(760, 500 + i * 24))
                .expect("on map"),
        );
    }
    (sim, player, opponent)
}

/// Grid with walls of blocked cells every eighth column, each with a gap
/// at a seeded row. Always connected.
#[must_use]
pub fn cluttered_grid(width: u32, height: u32, seed: u64) -> GridIndex {
    let mut grid = GridIndex::new(width, height, fixed(16));
    let mut state = seed | 1;
    for x in (4..width).step_by(8) {
        // xorshift keeps the layout stable without pulling in an RNG.
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let gap = (state % u64::from(height)) as u32;
        for y in 0..height {
            if y != gap {
                grid.set_blocked(x, y, true);
            }
        }
    }
    grid
}
