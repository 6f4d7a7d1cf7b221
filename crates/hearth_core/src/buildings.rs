//! Building placement, construction and removal.
//!
//! Placement is validated against the owner's pool, territory, existing
//! footprints and standing trees before anything is mutated. A rejected
//! placement leaves the world untouched.
//!
//! Removal has two entry points sharing one teardown: demolition (player
//! action, partial wood refund) and destruction (combat death, no refund).

use thiserror::Error;
use tracing::info;

use crate::components::{BuildingKind, EntityId, Owner, Resources, UnitState};
use crate::error::{GameError, Result};
use crate::events::{self, TickEvents};
use crate::factory;
use crate::math::{Fixed, Vec2Fixed};
use crate::world::WorldState;

// ============================================================================
// Footprints
// ============================================================================

/// Axis-aligned footprint of a building in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    /// Left edge.
    pub min_x: Fixed,
    /// Top edge.
    pub min_y: Fixed,
    /// Right edge.
    pub max_x: Fixed,
    /// Bottom edge.
    pub max_y: Fixed,
}

impl Footprint {
    /// Footprint of a `width` x `height` rectangle centered on `center`.
    #[must_use]
    pub fn centered(center: Vec2Fixed, width: Fixed, height: Fixed) -> Self {
        let (hw, hh) = (width / 2, height / 2);
        Self {
            min_x: center.x - hw,
            min_y: center.y - hh,
            max_x: center.x + hw,
            max_y: center.y + hh,
        }
    }

    /// Interiors intersect. Touching edges do not count.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x < other.max_x && other.min_x < self.max_x && self.min_y < other.max_y && other.min_y < self.max_y
    }

    /// Point lies strictly inside.
    #[must_use]
    pub fn contains_strict(&self, p: Vec2Fixed) -> bool {
        p.x > self.min_x && p.x < self.max_x && p.y > self.min_y && p.y < self.max_y
    }

    /// Point lies inside or on the edge.
    #[must_use]
    pub fn contains(&self, p: Vec2Fixed) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Footprint a building of `kind` would occupy at `position`.
#[must_use]
pub fn footprint_of(world: &WorldState, kind: BuildingKind, position: Vec2Fixed) -> Footprint {
    let def = world.building_def(kind);
    Footprint::centered(position, def.width, def.height)
}

// ============================================================================
// Placement
// ============================================================================

/// Why a placement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The owner cannot pay the cost.
    #[error("not enough resources")]
    Unaffordable,
    /// No territory-granting building of the owner covers the position.
    #[error("outside territory")]
    OutsideTerritory,
    /// The footprint intersects another building.
    #[error("overlaps building {0}")]
    Overlap(EntityId),
    /// A standing tree lies inside the footprint.
    #[error("tree {0} in the way")]
    TreeInFootprint(EntityId),
    /// The footprint leaves the map.
    #[error("out of bounds")]
    OutOfBounds,
}

/// Whether any territory of `owner` covers `position`.
///
/// An owner with no buildings at all may build anywhere.
#[must_use]
pub fn in_territory(world: &WorldState, owner: Owner, position: Vec2Fixed) -> bool {
    let mut owned = world.buildings.values().filter(|b| b.owner == owner).peekable();
    if owned.peek().is_none() {
        return true;
    }
    owned.any(|b| {
        world
            .building_def(b.kind)
            .territory_radius
            .is_some_and(|r| b.position.distance_squared(position) <= r.saturating_mul(r))
    })
}

/// Check every placement rule without mutating anything.
///
/// # Errors
///
/// The first rule the placement breaks, checked in the order bounds,
/// cost, territory, overlap, trees.
pub fn check_placement(
    world: &WorldState,
    owner: Owner,
    kind: BuildingKind,
    position: Vec2Fixed,
) -> std::result::Result<(), PlacementError> {
    let area = footprint_of(world, kind, position);
    if area.min_x < Fixed::ZERO
        || area.min_y < Fixed::ZERO
        || area.max_x > world.config.world_width()
        || area.max_y > world.config.world_height()
    {
        return Err(PlacementError::OutOfBounds);
    }

    let cost = world.building_def(kind).cost;
    if !world.pools.get(owner).is_some_and(|pool| pool.can_afford(&cost)) {
        return Err(PlacementError::Unaffordable);
    }

    if !in_territory(world, owner, position) {
        return Err(PlacementError::OutsideTerritory);
    }

    if let Some(other) = world
        .buildings
        .iter_sorted()
        .find(|b| footprint_of(world, b.kind, b.position).overlaps(&area))
    {
        return Err(PlacementError::Overlap(other.id));
    }

    if let Some(tree) = world
        .trees
        .iter_sorted()
        .find(|t| !t.felled && area.contains_strict(t.position))
    {
        return Err(PlacementError::TreeInFootprint(tree.id));
    }
    Ok(())
}

/// Instantiate a building without any rule checks and apply its bonuses.
pub fn construct(
    world: &mut WorldState,
    owner: Owner,
    kind: BuildingKind,
    position: Vec2Fixed,
    events: &mut TickEvents,
) -> EntityId {
    let id = factory::spawn_building(world, owner, kind, position);
    if owner == Owner::Player {
        let def = world.building_def(kind);
        let (population, happiness) = (def.population_bonus, def.happiness_bonus);
        world.settlement.max_population += population;
        world.settlement.adjust_happiness(happiness);
    }
    world.territory_dirty = true;
    events.buildings_constructed.push(id);
    info!(id, ?owner, ?kind, x = %position.x, y = %position.y, "building constructed");
    id
}

/// Validate, pay for and construct a building.
///
/// # Errors
///
/// The [`PlacementError`] from [`check_placement`]; the pool is not
/// touched on rejection.
pub fn try_build(
    world: &mut WorldState,
    owner: Owner,
    kind: BuildingKind,
    position: Vec2Fixed,
    events: &mut TickEvents,
) -> std::result::Result<EntityId, PlacementError> {
    check_placement(world, owner, kind, position)?;
    let cost = world.building_def(kind).cost;
    let paid = world.pools.get_mut(owner).is_some_and(|pool| pool.spend(&cost));
    if !paid {
        return Err(PlacementError::Unaffordable);
    }
    Ok(construct(world, owner, kind, position, events))
}

// ============================================================================
// Removal
// ============================================================================

/// Shared teardown for demolished and destroyed buildings.
fn remove(world: &mut WorldState, id: EntityId, events: &mut TickEvents) -> Option<(Owner, BuildingKind)> {
    let building = world.buildings.remove(id)?;
    let def = world.building_def(building.kind);
    let (width, height) = (def.width, def.height);
    let (population, happiness) = (def.population_bonus, def.happiness_bonus);

    if let Some(worker) = building.worker {
        if let Some(unit) = world.units.get_mut(worker) {
            if unit.job == Some(id) {
                unit.go_idle();
                unit.job = None;
                unit.state = UnitState::Idle;
            }
        }
    }

    world.grid.mark_region(building.position, width, height, false);
    // Cells shared with neighbors stay blocked.
    let tile = world.config.tile();
    let near = Footprint::centered(building.position, width + tile * 2, height + tile * 2);
    let mut occupants: Vec<(Vec2Fixed, Fixed, Fixed)> = world
        .buildings
        .iter_sorted()
        .filter(|b| footprint_of(world, b.kind, b.position).overlaps(&near))
        .map(|b| {
            let def = world.building_def(b.kind);
            (b.position, def.width, def.height)
        })
        .collect();
    occupants.extend(
        world
            .trees
            .iter_sorted()
            .filter(|t| !t.felled && Footprint::centered(t.position, tile, tile).overlaps(&near))
            .map(|t| (t.position, tile, tile)),
    );
    for (position, w, h) in occupants {
        world.grid.mark_region(position, w, h, true);
    }

    if building.owner == Owner::Player {
        world.settlement.max_population = world.settlement.max_population.saturating_sub(population);
        world.settlement.adjust_happiness(-happiness);
    }
    world.territory_dirty = true;
    if world.selected_building == Some(id) {
        world.selected_building = None;
        events.ui.push(events::building_selected(world));
    }
    events.buildings_destroyed.push(id);
    Some((building.owner, building.kind))
}

/// Demolish a building and refund part of its wood cost to its owner.
///
/// # Errors
///
/// [`GameError::EntityNotFound`] when no such building exists.
pub fn demolish(world: &mut WorldState, id: EntityId, events: &mut TickEvents) -> Result<Resources> {
    let kind = world.building(id)?.kind;
    let refund = Resources::wood(world.building_def(kind).cost.wood).percent(world.config.demolish_refund_percent);
    let (owner, _) = remove(world, id, events).ok_or(GameError::EntityNotFound(id))?;
    if let Some(pool) = world.pools.get_mut(owner) {
        pool.add(&refund);
    }
    info!(id, ?owner, ?kind, refund = refund.wood, "building demolished");
    Ok(refund)
}

/// Destroy a building that lost all its health. No refund.
pub fn destroy(world: &mut WorldState, id: EntityId, events: &mut TickEvents) {
    if let Some((owner, kind)) = remove(world, id, events) {
        info!(id, ?owner, ?kind, "building destroyed");
    }
}

/// Building whose footprint contains a point, lowest id first.
#[must_use]
pub fn building_at(world: &WorldState, position: Vec2Fixed) -> Option<EntityId> {
    world
        .buildings
        .iter_sorted()
        .find(|b| footprint_of(world, b.kind, b.position).contains(position))
        .map(|b| b.id)
}

/// Demolish the player's building under a point while demolish mode is on.
///
/// # Errors
///
/// [`GameError::InvalidState`] when demolish mode is off or no player
/// building covers the point.
pub fn demolish_at(world: &mut WorldState, position: Vec2Fixed, events: &mut TickEvents) -> Result<Resources> {
    if !world.policy.demolish_mode {
        return Err(GameError::InvalidState("demolish mode is off".into()));
    }
    let id = building_at(world, position)
        .filter(|id| world.owner_of(*id) == Some(Owner::Player))
        .ok_or_else(|| GameError::InvalidState("no building of yours there".into()))?;
    demolish(world, id, events)
}

/// Switch demolish mode to an explicit state.
pub fn set_demolish_mode(world: &mut WorldState, active: bool) {
    world.policy.demolish_mode = active;
}
