//! Per-tick unit simulation.
//!
//! Runs the unit state machine: peace enforcement, combat engagement
//! transitions, automatic target acquisition, wildlife wandering, path
//! following and pairwise separation. Also hosts the move and attack
//! orders from the command surface.

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::components::{EntityId, Owner, Path, UnitState};
use crate::error::{GameError, Result};
use crate::formation;
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::find_path;
use crate::world::WorldState;

/// Formation offsets are dropped once a chaser is this many slots from its target.
const FORMATION_RELEASE_SLOTS: i64 = 3;

/// Fallback push directions for units sharing the exact same spot.
const OVERLAP_DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

// ============================================================================
// Orders
// ============================================================================

/// Drop a unit's job, freeing the building's slot.
pub fn release_job(world: &mut WorldState, unit_id: EntityId) {
    let Some(unit) = world.units.get_mut(unit_id) else {
        return;
    };
    if let Some(job) = unit.job.take() {
        if let Some(building) = world.buildings.get_mut(job) {
            if building.worker == Some(unit_id) {
                building.worker = None;
            }
        }
    }
}

/// Send `units` owned by `issuer` to `target` in formation.
///
/// Units without a route keep their current orders. Returns how many
/// units accepted the move.
pub fn command_move(world: &mut WorldState, issuer: Owner, units: &[EntityId], target: Vec2Fixed) -> usize {
    let movable: Vec<EntityId> = units
        .iter()
        .copied()
        .filter(|id| {
            world
                .units
                .get(*id)
                .is_some_and(|u| u.owner == issuer && !u.kind.is_wildlife())
        })
        .collect();

    let params = world.path_params();
    let mut moved = 0;
    for (id, offset) in formation::assign(&movable, world.config.formation_spacing) {
        let Some(start) = world.units.get(id).map(|u| u.position) else {
            continue;
        };
        let goal = world.clamp_to_world(target + offset);
        match find_path(&world.grid, start, goal, &params) {
            Ok(waypoints) => {
                release_job(world, id);
                if let Some(unit) = world.units.get_mut(id) {
                    unit.target = None;
                    unit.state = UnitState::Moving;
                    unit.path = Some(Path::new(waypoints));
                    unit.formation_offset = Vec2Fixed::ZERO;
                }
                moved += 1;
            }
            Err(err) => debug!(id, %err, "move order dropped"),
        }
    }
    moved
}

/// Send `units` owned by `issuer` against `target`. Returns how many units
/// took the order; units without a route keep their current orders.
///
/// # Errors
///
/// - [`GameError::EntityNotFound`] if the target does not exist.
/// - [`GameError::InvalidState`] for attacks on the issuer's own entities.
/// - [`GameError::PeaceActive`] while the peace policy holds. Peace
///   blocks any attack by or against a non-player owner, which covers
///   every pairing once same-owner attacks are excluded.
pub fn command_attack(world: &mut WorldState, issuer: Owner, units: &[EntityId], target: EntityId) -> Result<usize> {
    let (target_owner, target_pos, _) = world.target_info(target).ok_or(GameError::EntityNotFound(target))?;
    if target_owner == issuer {
        return Err(GameError::InvalidState(format!("entity {target} belongs to the attacker")));
    }
    if world.peace_active() && (issuer != Owner::Player || target_owner != Owner::Player) {
        return Err(GameError::PeaceActive);
    }

    let attackers: Vec<EntityId> = units
        .iter()
        .copied()
        .filter(|id| {
            world
                .units
                .get(*id)
                .is_some_and(|u| u.owner == issuer && world.unit_def(u.kind).is_combatant())
        })
        .collect();

    let params = world.path_params();
    let tick = world.tick;
    let mut engaged = 0;
    for (id, offset) in formation::assign(&attackers, world.config.formation_spacing) {
        let Some(start) = world.units.get(id).map(|u| u.position) else {
            continue;
        };
        let goal = world.clamp_to_world(target_pos + offset);
        let waypoints = match find_path(&world.grid, start, goal, &params) {
            Ok(waypoints) => waypoints,
            Err(err) => {
                debug!(id, %err, "attack order dropped");
                continue;
            }
        };
        release_job(world, id);
        if let Some(unit) = world.units.get_mut(id) {
            unit.target = Some(target);
            unit.state = UnitState::Chasing;
            unit.formation_offset = offset;
            unit.path = Some(Path::new(waypoints));
            unit.last_repath_tick = tick;
        }
        engaged += 1;
    }
    Ok(engaged)
}

// ============================================================================
// Per-tick systems
// ============================================================================

/// Force every engaged unit back to idle while peace holds.
pub fn enforce_peace(world: &mut WorldState) {
    if !world.peace_active() {
        return;
    }
    for id in world.units.sorted_ids() {
        if let Some(unit) = world.units.get_mut(id) {
            if unit.state.is_combat() {
                unit.go_idle();
            }
        }
    }
}

/// Chasing/attacking transitions and chase re-pathing.
pub fn update_engagements(world: &mut WorldState) {
    let params = world.path_params();
    let tick = world.tick;
    let repath_interval = u64::from(world.config.repath_interval);
    let release_distance = world.config.formation_spacing * FORMATION_RELEASE_SLOTS;

    for id in world.units.sorted_ids() {
        let Some(unit) = world.units.get(id) else {
            continue;
        };
        if !unit.state.is_combat() {
            continue;
        }
        let target_info = unit.target.and_then(|t| world.target_info(t));
        let Some((_, target_pos, reach)) = target_info else {
            debug!(id, "combat target gone");
            if let Some(unit) = world.units.get_mut(id) {
                unit.go_idle();
            }
            continue;
        };

        let range = world.unit_def(unit.kind).range + reach;
        let distance = unit.position.distance(target_pos);
        if distance <= range {
            if let Some(unit) = world.units.get_mut(id) {
                unit.state = UnitState::Attacking;
                unit.path = None;
            }
            continue;
        }

        let due = unit.path.is_none() || tick >= unit.last_repath_tick + repath_interval;
        let offset = if distance > release_distance {
            unit.formation_offset
        } else {
            Vec2Fixed::ZERO
        };
        let start = unit.position;
        let new_path = if due {
            let goal = world.clamp_to_world(target_pos + offset);
            match find_path(&world.grid, start, goal, &params) {
                Ok(waypoints) => Some(Path::new(waypoints)),
                Err(err) => {
                    debug!(id, %err, "chase re-path failed");
                    None
                }
            }
        } else {
            None
        };

        if let Some(unit) = world.units.get_mut(id) {
            unit.state = UnitState::Chasing;
            if due {
                unit.last_repath_tick = tick;
            }
            if let Some(path) = new_path {
                unit.path = Some(path);
            }
        }
    }
}

/// Idle military units pick the nearest hostile unit in aggro range.
pub fn acquire_targets(world: &mut WorldState) {
    if world.peace_active() {
        return;
    }
    let aggro = world.config.aggro_radius;
    for id in world.units.sorted_ids() {
        let Some(unit) = world.units.get(id) else {
            continue;
        };
        if unit.state != UnitState::Idle || !unit.kind.is_military() {
            continue;
        }
        let (owner, pos) = (unit.owner, unit.position);
        let nearest = world
            .unit_hash
            .query_radius(pos, aggro)
            .into_iter()
            .filter_map(|other| world.units.get(other))
            .filter(|other| owner.is_hostile_to(other.owner))
            .min_by_key(|other| (other.position.distance_squared(pos), other.id))
            .map(|other| other.id);

        if let Some(target) = nearest {
            debug!(id, target, "acquired target");
            if let Some(unit) = world.units.get_mut(id) {
                unit.target = Some(target);
                unit.state = UnitState::Chasing;
                unit.formation_offset = Vec2Fixed::ZERO;
                unit.path = None;
            }
        }
    }
}

/// Idle wildlife occasionally wanders to a random nearby point.
pub fn wander(world: &mut WorldState) {
    let chance = world.config.wander_chance_per_mille;
    let radius = world.config.wander_radius.to_num::<i32>().max(1);
    let params = world.path_params();

    for id in world.units.sorted_ids() {
        let Some(unit) = world.units.get(id) else {
            continue;
        };
        if !unit.kind.is_wildlife() || unit.state != UnitState::Idle {
            continue;
        }
        let start = unit.position;
        if world.rng.gen_range(0..1000) >= chance {
            continue;
        }
        let dx = world.rng.gen_range(-radius..=radius);
        let dy = world.rng.gen_range(-radius..=radius);
        let goal = world.clamp_to_world(start + Vec2Fixed::from_ints(dx, dy));
        if let Ok(waypoints) = find_path(&world.grid, start, goal, &params) {
            if let Some(unit) = world.units.get_mut(id) {
                unit.state = UnitState::Wandering;
                unit.path = Some(Path::new(waypoints));
            }
        }
    }
}

/// Advance every unit along its path.
///
/// Units in `skip` were given orders this tick and wait for the next.
pub fn move_units(world: &mut WorldState, skip: &[EntityId]) {
    let arrival = world.config.waypoint_arrival_radius;
    for id in world.units.sorted_ids() {
        if skip.contains(&id) {
            continue;
        }
        let speed = match world.units.get(id) {
            Some(unit) if unit.path.is_some() && unit.state != UnitState::Working => {
                world.unit_def(unit.kind).speed
            }
            _ => continue,
        };

        let mut arrived = false;
        if let Some(unit) = world.units.get_mut(id) {
            let position = unit.position;
            if let Some(path) = unit.path.as_mut() {
                if let Some(waypoint) = path.current() {
                    let next = position.move_towards(waypoint, speed);
                    unit.position = next;
                    if next.distance(waypoint) < arrival {
                        path.advance();
                    }
                }
                arrived = path.is_finished();
            }
            if arrived {
                unit.path = None;
            }
        }
        if arrived {
            resolve_arrival(world, id);
        }
    }
}

/// State change when a unit reaches the end of its path.
fn resolve_arrival(world: &mut WorldState, id: EntityId) {
    let Some(unit) = world.units.get(id) else {
        return;
    };
    let next = match unit.state {
        UnitState::MovingToWork => {
            let job_open = unit
                .job
                .and_then(|job| world.buildings.get(job))
                .is_some_and(|b| b.worker == Some(id));
            if job_open {
                UnitState::Working
            } else {
                UnitState::Idle
            }
        }
        UnitState::Moving | UnitState::MovingToRally | UnitState::Wandering => UnitState::Idle,
        other => other,
    };
    if next == UnitState::Idle {
        release_job(world, id);
    }
    if let Some(unit) = world.units.get_mut(id) {
        unit.state = next;
    }
}

const fn is_anchored(state: UnitState) -> bool {
    matches!(state, UnitState::Working | UnitState::Attacking)
}

/// Push overlapping units apart.
///
/// Every pair closer than the separation radius receives equal and
/// opposite pushes of `(radius - distance) * strength`. Working and
/// attacking units hold their ground and take no part.
pub fn apply_separation(world: &mut WorldState) {
    let radius = world.config.separation_radius;
    let strength = world.config.separation_strength;
    world.rebuild_unit_hash();

    let mut pushes: HashMap<EntityId, Vec2Fixed> = HashMap::new();
    for a in world.units.sorted_ids() {
        let Some(unit_a) = world.units.get(a) else {
            continue;
        };
        if is_anchored(unit_a.state) {
            continue;
        }
        let pos_a = unit_a.position;
        for b in world.unit_hash.query_radius(pos_a, radius) {
            if b <= a {
                continue;
            }
            let Some(unit_b) = world.units.get(b) else {
                continue;
            };
            if is_anchored(unit_b.state) {
                continue;
            }
            let delta = pos_a - unit_b.position;
            let distance = delta.length();
            if distance >= radius {
                continue;
            }
            let direction = if distance == Fixed::ZERO {
                let (dx, dy) = OVERLAP_DIRECTIONS[((a + b) % 4) as usize];
                Vec2Fixed::from_ints(dx, dy)
            } else {
                delta.scale(Fixed::ONE / distance)
            };
            let push = direction.scale((radius - distance) * strength);
            *pushes.entry(a).or_default() += push;
            *pushes.entry(b).or_default() += -push;
        }
    }

    for id in world.units.sorted_ids() {
        if let Some(push) = pushes.get(&id).copied() {
            let moved = world.units.get(id).map(|u| world.clamp_to_world(u.position + push));
            if let (Some(unit), Some(moved)) = (world.units.get_mut(id), moved) {
                unit.position = moved;
            }
        }
    }
}

/// Unit phase of the tick.
pub fn run(world: &mut WorldState, fresh_orders: &[EntityId]) {
    enforce_peace(world);
    update_engagements(world);
    acquire_targets(world);
    wander(world);
    move_units(world, fresh_orders);
    apply_separation(world);
    world.rebuild_unit_hash();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BuildingKind, UnitKind};
    use crate::config::SimConfig;
    use crate::factory;

    fn world() -> WorldState {
        WorldState::new(SimConfig::default()).unwrap()
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn step(world: &mut WorldState, ticks: u32) {
        for _ in 0..ticks {
            world.tick += 1;
            run(world, &[]);
        }
    }

    #[test]
    fn test_move_order_reaches_goal_and_idles() {
        let mut world = world();
        let id = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(40, 40));
        assert_eq!(command_move(&mut world, Owner::Player, &[id], vec2(200, 40)), 1);
        assert_eq!(world.units.get(id).unwrap().state, UnitState::Moving);

        step(&mut world, 200);
        let unit = world.units.get(id).unwrap();
        assert_eq!(unit.state, UnitState::Idle);
        assert!(unit.path.is_none());
        assert!(unit.position.distance(vec2(200, 40)) <= Fixed::from_num(16));
    }

    #[test]
    fn test_move_ignores_foreign_units() {
        let mut world = world();
        let id = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(40, 40));
        assert_eq!(command_move(&mut world, Owner::Player, &[id], vec2(200, 40)), 0);
        assert_eq!(world.units.get(id).unwrap().state, UnitState::Idle);
    }

    #[test]
    fn test_move_releases_job() {
        let mut world = world();
        let farm = factory::spawn_building(&mut world, Owner::Player, BuildingKind::Farm, vec2(300, 300));
        let id = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Villager, vec2(300, 330));
        world.buildings.get_mut(farm).unwrap().worker = Some(id);
        let unit = world.units.get_mut(id).unwrap();
        unit.job = Some(farm);
        unit.state = UnitState::Working;

        command_move(&mut world, Owner::Player, &[id], vec2(100, 100));
        assert!(world.units.get(id).unwrap().job.is_none());
        assert!(world.buildings.get(farm).unwrap().worker.is_none());
    }

    #[test]
    fn test_attack_rejected_under_peace() {
        let mut world = world();
        world.policy.peaceful_mode = true;
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(150, 100));

        let result = command_attack(&mut world, Owner::Player, &[soldier], enemy);
        assert_eq!(result, Err(GameError::PeaceActive));
        let unit = world.units.get(soldier).unwrap();
        assert_eq!(unit.state, UnitState::Idle);
        assert!(unit.target.is_none());
    }

    #[test]
    fn test_attack_on_own_unit_rejected() {
        let mut world = world();
        let a = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        let b = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(150, 100));
        assert!(matches!(
            command_attack(&mut world, Owner::Player, &[a], b),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_chase_then_attack_then_idle_on_target_loss() {
        let mut world = world();
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Villager, vec2(200, 100));

        assert_eq!(command_attack(&mut world, Owner::Player, &[soldier], enemy), Ok(1));
        assert_eq!(world.units.get(soldier).unwrap().state, UnitState::Chasing);

        step(&mut world, 120);
        assert_eq!(world.units.get(soldier).unwrap().state, UnitState::Attacking);

        world.units.remove(enemy);
        step(&mut world, 1);
        let unit = world.units.get(soldier).unwrap();
        assert_eq!(unit.state, UnitState::Idle);
        assert!(unit.target.is_none());
    }

    #[test]
    fn test_unreachable_attack_target_leaves_worker_in_place() {
        let mut world = world();
        let farm = factory::spawn_building(&mut world, Owner::Player, BuildingKind::Farm, vec2(300, 300));
        let villager = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Villager, vec2(300, 330));
        world.buildings.get_mut(farm).unwrap().worker = Some(villager);
        let unit = world.units.get_mut(villager).unwrap();
        unit.job = Some(farm);
        unit.state = UnitState::Working;

        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(1000, 1000));
        let (cx, cy) = world.grid.clamp_to_cell(vec2(1000, 1000));
        for y in cy - 4..=cy + 4 {
            for x in cx - 4..=cx + 4 {
                world.grid.set_blocked(x, y, true);
            }
        }

        assert_eq!(command_attack(&mut world, Owner::Player, &[villager], enemy), Ok(0));
        let unit = world.units.get(villager).unwrap();
        assert_eq!(unit.state, UnitState::Working);
        assert_eq!(unit.job, Some(farm));
        assert!(unit.target.is_none());
        assert!(unit.path.is_none());
        assert_eq!(world.buildings.get(farm).unwrap().worker, Some(villager));
    }

    #[test]
    fn test_attack_counts_only_routed_units() {
        let mut world = world();
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(200, 100));
        let (cx, cy) = world.grid.clamp_to_cell(vec2(200, 100));
        let set_walls = |world: &mut WorldState, blocked: bool| {
            for y in cy - 4..=cy + 4 {
                for x in cx - 4..=cx + 4 {
                    world.grid.set_blocked(x, y, blocked);
                }
            }
        };
        set_walls(&mut world, true);
        assert_eq!(command_attack(&mut world, Owner::Player, &[soldier], enemy), Ok(0));
        assert_eq!(world.units.get(soldier).unwrap().state, UnitState::Idle);

        set_walls(&mut world, false);
        assert_eq!(command_attack(&mut world, Owner::Player, &[soldier], enemy), Ok(1));
        let unit = world.units.get(soldier).unwrap();
        assert_eq!(unit.state, UnitState::Chasing);
        assert_eq!(unit.target, Some(enemy));
        assert!(unit.path.is_some());
    }

    #[test]
    fn test_peace_forces_engaged_units_idle() {
        let mut world = world();
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(300, 100));
        command_attack(&mut world, Owner::Player, &[soldier], enemy).unwrap();

        world.policy.peaceful_mode = true;
        step(&mut world, 1);
        assert_eq!(world.units.get(soldier).unwrap().state, UnitState::Idle);
        assert_eq!(world.units.get(enemy).unwrap().state, UnitState::Idle);
    }

    #[test]
    fn test_idle_military_acquires_hostiles() {
        let mut world = world();
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        let near = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Villager, vec2(150, 100));
        factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Villager, vec2(220, 100));
        factory::spawn_unit(&mut world, Owner::Neutral, UnitKind::Deer, vec2(110, 100));
        world.rebuild_unit_hash();

        acquire_targets(&mut world);
        let unit = world.units.get(soldier).unwrap();
        assert_eq!(unit.target, Some(near));
        assert_eq!(unit.state, UnitState::Chasing);
    }

    #[test]
    fn test_villagers_do_not_acquire() {
        let mut world = world();
        let villager = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Villager, vec2(100, 100));
        factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(150, 100));
        world.rebuild_unit_hash();
        acquire_targets(&mut world);
        assert_eq!(world.units.get(villager).unwrap().state, UnitState::Idle);
    }

    #[test]
    fn test_separation_pushes_pairs_apart() {
        let mut world = world();
        let a = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Villager, vec2(100, 100));
        let b = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Villager, vec2(110, 100));
        apply_separation(&mut world);

        let pa = world.units.get(a).unwrap().position;
        let pb = world.units.get(b).unwrap().position;
        // (18 - 10) * 0.05 = 0.4 each way.
        let epsilon = Fixed::ONE / Fixed::from_num(1000);
        assert!((pa.x - Fixed::from_num(99.6)).abs() < epsilon);
        assert!((pb.x - Fixed::from_num(110.4)).abs() < epsilon);
        assert_eq!(pa.y, Fixed::from_num(100));
    }

    #[test]
    fn test_separation_splits_stacked_units() {
        let mut world = world();
        let a = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        let b = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(100, 100));
        apply_separation(&mut world);
        let pa = world.units.get(a).unwrap().position;
        let pb = world.units.get(b).unwrap().position;
        assert_ne!(pa, pb);
    }

    #[test]
    fn test_fresh_orders_wait_a_tick() {
        let mut world = world();
        let id = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(40, 40));
        command_move(&mut world, Owner::Player, &[id], vec2(400, 40));
        move_units(&mut world, &[id]);
        assert_eq!(world.units.get(id).unwrap().position, vec2(40, 40));
        move_units(&mut world, &[]);
        assert_ne!(world.units.get(id).unwrap().position, vec2(40, 40));
    }

    #[test]
    fn test_wildlife_wanders_deterministically() {
        let config = SimConfig {
            wander_chance_per_mille: 1000,
            ..SimConfig::default()
        };
        let run_once = || {
            let mut world = WorldState::new(config.clone()).unwrap();
            let deer = factory::spawn_unit(&mut world, Owner::Neutral, UnitKind::Deer, vec2(500, 500));
            wander(&mut world);
            world.units.get(deer).unwrap().clone()
        };
        let first = run_once();
        assert_eq!(first.state, UnitState::Wandering);
        assert_eq!(first.path, run_once().path);
    }
}
