//! Settlement economy.
//!
//! Handles:
//! - Worker-to-job assignment (every tick, nearest idle villager first)
//! - Rallying jobless villagers back to the nearest hub
//! - Production and food upkeep (fast cadence)
//! - Population growth (slow cadence)
//! - Training queues
//!
//! Only the player's settlement runs production and growth here. The
//! opponent keeps a separate pool fed by its controller.

use rand::Rng;
use tracing::{debug, info};

use crate::components::{EntityId, Owner, Path, Resources, TrainingOrder, UnitKind, UnitState};
use crate::error::{GameError, Result};
use crate::events::TickEvents;
use crate::factory;
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::find_path;
use crate::world::WorldState;

/// Happiness bounds.
pub const HAPPINESS_MIN: i32 = 0;
/// Happiness bounds.
pub const HAPPINESS_MAX: i32 = 100;

/// Horizontal scatter (world units) for newborn villagers.
const BIRTH_JITTER: i32 = 8;

// ============================================================================
// Pools and settlement
// ============================================================================

/// Resource pools of both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourcePools {
    /// Player pool.
    pub player: Resources,
    /// Opponent pool.
    pub opponent: Resources,
}

impl ResourcePools {
    /// Create pools with starting amounts.
    #[must_use]
    pub const fn new(player: Resources, opponent: Resources) -> Self {
        Self { player, opponent }
    }

    /// Pool of an owner. Wildlife has none.
    #[must_use]
    pub const fn get(&self, owner: Owner) -> Option<&Resources> {
        match owner {
            Owner::Player => Some(&self.player),
            Owner::Opponent => Some(&self.opponent),
            Owner::Neutral => None,
        }
    }

    /// Mutable pool of an owner.
    pub fn get_mut(&mut self, owner: Owner) -> Option<&mut Resources> {
        match owner {
            Owner::Player => Some(&mut self.player),
            Owner::Opponent => Some(&mut self.opponent),
            Owner::Neutral => None,
        }
    }
}

/// Player settlement counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Population cap including building bonuses.
    pub max_population: u32,
    /// Happiness, 0..=100.
    pub happiness: i32,
    /// Net resource change over the last production cycle.
    pub rates: Resources,
}

impl Settlement {
    /// Create settlement counters.
    #[must_use]
    pub fn new(max_population: u32, happiness: i32) -> Self {
        Self {
            max_population,
            happiness: happiness.clamp(HAPPINESS_MIN, HAPPINESS_MAX),
            rates: Resources::ZERO,
        }
    }

    /// Shift happiness, keeping it in bounds.
    pub fn adjust_happiness(&mut self, delta: i32) {
        self.happiness = (self.happiness + delta).clamp(HAPPINESS_MIN, HAPPINESS_MAX);
    }
}

/// Error for a cost the pool cannot cover, naming the first short resource.
#[must_use]
pub fn shortfall(pool: &Resources, cost: &Resources) -> GameError {
    let (resource, required, available) = if pool.wood < cost.wood {
        ("wood", cost.wood, pool.wood)
    } else if pool.food < cost.food {
        ("food", cost.food, pool.food)
    } else {
        ("gold", cost.gold, pool.gold)
    };
    GameError::InsufficientResources {
        resource,
        required,
        available,
    }
}

// ============================================================================
// Job assignment
// ============================================================================

/// Whether a building has an open job slot.
fn is_vacant(world: &WorldState, id: EntityId) -> bool {
    world
        .buildings
        .get(id)
        .is_some_and(|b| b.worker.is_none() && world.building_def(b.kind).requires_worker)
}

/// Give every open job slot the closest idle villager of the same owner.
///
/// Greedy in building id order; ties on distance go to the lower unit id.
/// Returns the units that received a job this tick.
pub fn assign_jobs(world: &mut WorldState) -> Vec<EntityId> {
    let params = world.path_params();
    let mut assigned = Vec::new();

    for building_id in world.buildings.sorted_ids() {
        if !is_vacant(world, building_id) {
            continue;
        }
        let Some((owner, site)) = world.buildings.get(building_id).map(|b| (b.owner, b.position)) else {
            continue;
        };

        let candidate = world
            .units
            .values()
            .filter(|u| {
                u.owner == owner
                    && u.kind.is_worker()
                    && u.state == UnitState::Idle
                    && u.job.is_none()
                    && !assigned.contains(&u.id)
            })
            .min_by_key(|u| (u.position.distance_squared(site), u.id))
            .map(|u| (u.id, u.position));

        let Some((unit_id, start)) = candidate else {
            continue;
        };
        match find_path(&world.grid, start, site, &params) {
            Ok(waypoints) => {
                if let Some(unit) = world.units.get_mut(unit_id) {
                    unit.job = Some(building_id);
                    unit.state = UnitState::MovingToWork;
                    unit.path = Some(Path::new(waypoints));
                }
                if let Some(building) = world.buildings.get_mut(building_id) {
                    building.worker = Some(unit_id);
                }
                debug!(unit = unit_id, building = building_id, "job assigned");
                assigned.push(unit_id);
            }
            Err(err) => debug!(unit = unit_id, building = building_id, %err, "no route to job"),
        }
    }
    assigned
}

/// Walk jobless idle villagers far from every hub back to the nearest one.
pub fn rally_idle(world: &mut WorldState, skip: &[EntityId]) -> Vec<EntityId> {
    let params = world.path_params();
    let rally_sq = world.config.rally_distance.saturating_mul(world.config.rally_distance);
    let mut rallied = Vec::new();

    for id in world.units.sorted_ids() {
        if skip.contains(&id) {
            continue;
        }
        let Some(unit) = world.units.get(id) else {
            continue;
        };
        if !unit.kind.is_worker() || unit.state != UnitState::Idle || unit.job.is_some() {
            continue;
        }
        let Some(hub) = world.nearest_hub(unit.owner, unit.position).map(|b| b.position) else {
            continue;
        };
        if unit.position.distance_squared(hub) <= rally_sq {
            continue;
        }
        let start = unit.position;
        if let Ok(waypoints) = find_path(&world.grid, start, hub, &params) {
            if let Some(unit) = world.units.get_mut(id) {
                unit.state = UnitState::MovingToRally;
                unit.path = Some(Path::new(waypoints));
            }
            rallied.push(id);
        }
    }
    rallied
}

// ============================================================================
// Production
// ============================================================================

/// Mark a tree felled: it stops blocking and leaves the tree index.
pub fn fell_tree(world: &mut WorldState, id: EntityId, events: &mut TickEvents) {
    let tile = world.config.tile();
    let Some(tree) = world.trees.get_mut(id) else {
        return;
    };
    if tree.felled {
        return;
    }
    tree.felled = true;
    tree.wood_remaining = 0;
    let position = tree.position;
    world.tree_hash.remove(id);
    world.grid.mark_region(position, tile, tile, false);
    events.trees_felled.push(id);
    debug!(id, "tree felled");
}

/// Draw wood from the standing trees around a lumber building.
///
/// Output is the number of standing trees in `radius`, capped, and is
/// taken from the nearest trees first. Returns the wood actually drawn.
pub fn harvest_trees(world: &mut WorldState, center: Vec2Fixed, radius: Fixed, events: &mut TickEvents) -> i32 {
    let mut nearby: Vec<(Fixed, EntityId)> = world
        .tree_hash
        .query_radius(center, radius)
        .into_iter()
        .filter_map(|id| world.trees.get(id))
        .filter(|t| !t.felled)
        .map(|t| (t.position.distance_squared(center), t.id))
        .collect();
    nearby.sort_unstable();

    let mut needed = nearby.len().min(world.config.lumber_tree_cap as usize) as i32;
    let mut drawn = 0;
    for (_, id) in nearby {
        if needed == 0 {
            break;
        }
        let Some(tree) = world.trees.get_mut(id) else {
            continue;
        };
        let take = needed.min(tree.wood_remaining);
        tree.wood_remaining -= take;
        needed -= take;
        drawn += take;
        if tree.wood_remaining <= 0 {
            fell_tree(world, id, events);
        }
    }
    drawn
}

/// One production cycle: output, food upkeep and happiness.
pub fn production_cycle(world: &mut WorldState, events: &mut TickEvents) {
    let mut produced = Resources::ZERO;

    for id in world.buildings.sorted_ids() {
        let Some(building) = world.buildings.get(id) else {
            continue;
        };
        if building.owner != Owner::Player {
            continue;
        }
        let def = world.building_def(building.kind);
        if def.requires_worker {
            let working = building
                .worker
                .and_then(|w| world.units.get(w))
                .is_some_and(|u| u.state == UnitState::Working);
            if !working {
                continue;
            }
        }
        let output = def.produces;
        let lumber = def.harvests_trees.then_some(def.effect_radius.unwrap_or(Fixed::ZERO));
        let position = building.position;

        produced.add(&output);
        if let Some(radius) = lumber {
            produced.wood += harvest_trees(world, position, radius, events);
        }
    }

    let population = world.population() as i32;
    let config = &world.config;
    let (gain, starvation, overcrowding) = (
        config.happiness_gain,
        config.starvation_penalty,
        config.overcrowding_penalty,
    );

    world.pools.player.add(&produced);
    world.pools.player.food -= population;
    if world.pools.player.food < 0 {
        world.pools.player.food = 0;
        world.settlement.adjust_happiness(-starvation);
    } else {
        world.settlement.adjust_happiness(gain);
    }
    if population as u32 > world.settlement.max_population {
        world.settlement.adjust_happiness(-overcrowding);
    }
    world.settlement.rates = Resources::new(produced.wood, produced.food - population, produced.gold);
}

/// Population growth check.
///
/// Spawns one villager when below the cap and happiness is above the
/// threshold; otherwise nothing happens and nothing is queued.
pub fn growth_cycle(world: &mut WorldState, events: &mut TickEvents) -> Option<EntityId> {
    let population = world.population();
    if population >= world.settlement.max_population
        || world.settlement.happiness <= world.config.growth_happiness_threshold
    {
        return None;
    }

    let vacancies: Vec<Vec2Fixed> = world
        .buildings
        .iter_sorted()
        .filter(|b| b.owner == Owner::Player && is_vacant(world, b.id))
        .map(|b| b.position)
        .collect();

    let hub_id = if vacancies.is_empty() {
        let hubs: Vec<EntityId> = world.hubs(Owner::Player).iter().map(|b| b.id).collect();
        if hubs.is_empty() {
            return None;
        }
        let pick = world.rng.gen_range(0..hubs.len());
        hubs[pick]
    } else {
        let sum = vacancies.iter().fold(Vec2Fixed::ZERO, |acc, p| acc + *p);
        let centroid = sum.scale(Fixed::ONE / Fixed::from_num(vacancies.len()));
        world.nearest_hub(Owner::Player, centroid)?.id
    };

    let hub = world.buildings.get(hub_id)?;
    let base = factory::spawn_point(world, hub);
    let jitter = world.rng.gen_range(-BIRTH_JITTER..=BIRTH_JITTER);
    let id = factory::spawn_unit(world, Owner::Player, UnitKind::Villager, base + Vec2Fixed::from_ints(jitter, 0));
    events.units_spawned.push(id);
    info!(id, hub = hub_id, population = population + 1, "villager born");
    Some(id)
}

// ============================================================================
// Training
// ============================================================================

/// Units queued across an owner's buildings.
#[must_use]
pub fn queued_units(world: &WorldState, owner: Owner) -> usize {
    world
        .buildings
        .values()
        .filter(|b| b.owner == owner)
        .map(|b| b.training.len())
        .sum()
}

/// Queue a unit at a building, paying for it up front.
///
/// # Errors
///
/// Rejected when the building is missing or foreign, cannot train that
/// kind, has a full queue, the player is at the population cap, or the
/// pool cannot cover the cost. Nothing is deducted on rejection.
pub fn queue_training(world: &mut WorldState, issuer: Owner, building_id: EntityId, kind: UnitKind) -> Result<()> {
    let building = world.building(building_id)?;
    if building.owner != issuer {
        return Err(GameError::InvalidState(format!("building {building_id} is not yours")));
    }
    if !world.building_def(building.kind).can_train(kind) {
        return Err(GameError::InvalidState(format!("{:?} cannot train {kind:?}", building.kind)));
    }
    if building.training.len() >= world.config.training_queue_limit {
        return Err(GameError::InvalidState("training queue full".into()));
    }
    if issuer == Owner::Player {
        let committed = world.population() as usize + queued_units(world, issuer);
        if committed >= world.settlement.max_population as usize {
            return Err(GameError::InvalidState("population cap reached".into()));
        }
    }

    let def = world.unit_def(kind);
    let (cost, ticks) = (def.cost, def.train_ticks.max(1));
    let pool = world
        .pools
        .get_mut(issuer)
        .ok_or_else(|| GameError::InvalidState("owner has no resource pool".into()))?;
    if !pool.spend(&cost) {
        return Err(shortfall(pool, &cost));
    }
    if let Some(building) = world.buildings.get_mut(building_id) {
        building.training.push_back(TrainingOrder {
            kind,
            remaining_ticks: ticks,
        });
    }
    Ok(())
}

/// Count down the front order of every queue and spawn finished units.
pub fn advance_training(world: &mut WorldState, events: &mut TickEvents) {
    for id in world.buildings.sorted_ids() {
        let finished = match world.buildings.get_mut(id) {
            Some(building) => match building.training.front_mut() {
                Some(order) => {
                    order.remaining_ticks = order.remaining_ticks.saturating_sub(1);
                    if order.remaining_ticks == 0 {
                        building.training.pop_front().map(|o| (o.kind, building.owner))
                    } else {
                        None
                    }
                }
                None => None,
            },
            None => None,
        };

        let Some((kind, owner)) = finished else {
            continue;
        };
        let Some(building) = world.buildings.get(id) else {
            continue;
        };
        let spot = factory::spawn_point(world, building);
        let unit = factory::spawn_unit(world, owner, kind, spot);
        events.units_spawned.push(unit);
        info!(unit, building = id, ?kind, ?owner, "unit trained");
    }
}

/// Economy phase of the tick.
///
/// Returns units that received orders this tick; they hold still until
/// the next one.
pub fn run(world: &mut WorldState, events: &mut TickEvents) -> Vec<EntityId> {
    let mut fresh = assign_jobs(world);
    let rallied = rally_idle(world, &fresh);
    fresh.extend(rallied);

    if world.tick % world.config.fast_cadence() == 0 {
        production_cycle(world, events);
    }
    if world.tick % world.config.slow_cadence() == 0 {
        growth_cycle(world, events);
    }
    advance_training(world, events);
    fresh
}
