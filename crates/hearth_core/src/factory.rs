//! Entity construction.
//!
//! Builds unit, building and tree records with their default stats and
//! registers them with every index that tracks them. Rule checks
//! (placement, cost, population) belong to the callers.

use tracing::trace;

use crate::components::{Building, BuildingKind, EntityId, Owner, Tree, Unit, UnitKind};
use crate::math::{Fixed, Vec2Fixed};
use crate::world::WorldState;

/// Create a unit at full health and index it.
pub fn spawn_unit(world: &mut WorldState, owner: Owner, kind: UnitKind, position: Vec2Fixed) -> EntityId {
    let id = world.allocate_id();
    let position = world.clamp_to_world(position);
    let health = world.unit_def(kind).health;
    world.units.insert(id, Unit::new(id, owner, kind, position, health));
    world.unit_hash.insert(id, position);
    trace!(id, ?owner, ?kind, "unit spawned");
    id
}

/// Create a building and block its footprint.
pub fn spawn_building(world: &mut WorldState, owner: Owner, kind: BuildingKind, position: Vec2Fixed) -> EntityId {
    let id = world.allocate_id();
    let def = world.building_def(kind);
    let (width, height, health) = (def.width, def.height, def.health);
    world.buildings.insert(id, Building::new(id, owner, kind, position, health));
    world.grid.mark_region(position, width, height, true);
    trace!(id, ?owner, ?kind, "building spawned");
    id
}

/// Create a tree, block its tile and index it.
pub fn spawn_tree(world: &mut WorldState, position: Vec2Fixed) -> EntityId {
    let id = world.allocate_id();
    let tile = world.config.tile();
    world.trees.insert(
        id,
        Tree {
            id,
            position,
            wood_remaining: world.config.tree_wood,
            felled: false,
        },
    );
    world.grid.mark_region(position, tile, tile, true);
    world.tree_hash.insert(id, position);
    id
}

/// Spot just below a building's footprint where new units appear.
#[must_use]
pub fn spawn_point(world: &WorldState, building: &Building) -> Vec2Fixed {
    let half = world.building_def(building.kind).half_extents();
    building.position + Vec2Fixed::new(Fixed::ZERO, half.y + world.config.tile() / 2)
}
