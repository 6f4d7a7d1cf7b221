//! Combat resolution.
//!
//! Melee hits land immediately when the attacker's cooldown allows.
//! Ranged squads split each attack into volleys whose count follows the
//! squad's remaining health; each volley is a timed event in a min-heap
//! keyed by arrival tick and re-validates its target on arrival.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buildings;
use crate::components::{EntityId, Health, UnitState};
use crate::events::{self, DamageEvent, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::world::WorldState;

// ============================================================================
// Volley splitting
// ============================================================================

/// Number of volleys a squad fires: its size scaled by remaining health,
/// rounded up and clamped to `1..=squad_size`.
#[must_use]
pub fn volley_count(squad_size: u32, health: &Health) -> u32 {
    let squad = i64::from(squad_size.max(1));
    let max = i64::from(health.max.max(1));
    let current = i64::from(health.current.clamp(0, health.max.max(1)));
    let scaled = (squad * current + max - 1) / max;
    scaled.clamp(1, squad) as u32
}

/// Split `damage` into `count` integer shares that sum to `damage`.
///
/// The remainder goes one point at a time to the earliest shares.
#[must_use]
pub fn split_damage(damage: i32, count: u32) -> Vec<i32> {
    let count = count.max(1);
    let damage = damage.max(0);
    let base = damage / count as i32;
    let remainder = (damage % count as i32) as u32;
    (0..count).map(|i| base + i32::from(i < remainder)).collect()
}

// ============================================================================
// Timed volleys
// ============================================================================

/// A ranged volley in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Volley {
    /// Firing unit.
    pub attacker: EntityId,
    /// Unit or building aimed at.
    pub target: EntityId,
    /// Launch point.
    pub origin: Vec2Fixed,
    /// Target position when the attack began.
    pub impact: Vec2Fixed,
    /// Damage applied on arrival.
    pub damage: i32,
    /// Tick the volley leaves the bow.
    pub fire_tick: u64,
    /// Tick the damage lands.
    pub arrive_tick: u64,
    /// Peak height of the arc.
    #[serde(with = "crate::math::fixed_serde")]
    pub apex: Fixed,
}

impl Volley {
    /// Ground position and height at `tick`, or `None` outside the flight window.
    #[must_use]
    pub fn position_at(&self, tick: u64) -> Option<(Vec2Fixed, Fixed)> {
        if tick < self.fire_tick || tick > self.arrive_tick {
            return None;
        }
        let span = (self.arrive_tick - self.fire_tick).max(1);
        let t = Fixed::from_num(tick - self.fire_tick) / Fixed::from_num(span);
        // Parabola through 0 at both ends and `apex` at the midpoint.
        let height = self.apex * 4 * t * (Fixed::ONE - t);
        Some((self.origin.lerp(self.impact, t), height))
    }
}

/// Heap entry ordering volleys by arrival, then by scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimedEvent {
    due: u64,
    seq: u64,
    volley: Volley,
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap behavior on BinaryHeap.
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of volleys keyed by arrival tick.
#[derive(Debug, Clone, Default)]
pub struct VolleyQueue {
    heap: BinaryHeap<TimedEvent>,
    next_seq: u64,
}

impl VolleyQueue {
    /// Schedule a volley.
    pub fn push(&mut self, volley: Volley) {
        self.heap.push(TimedEvent {
            due: volley.arrive_tick,
            seq: self.next_seq,
            volley,
        });
        self.next_seq += 1;
    }

    /// Remove and return every volley due at or before `tick`, earliest first.
    pub fn pop_due(&mut self, tick: u64) -> Vec<Volley> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|e| e.due <= tick) {
            if let Some(event) = self.heap.pop() {
                due.push(event.volley);
            }
        }
        due
    }

    /// Volleys still in flight, ordered by arrival.
    #[must_use]
    pub fn in_flight(&self) -> Vec<Volley> {
        let mut events: Vec<_> = self.heap.iter().copied().collect();
        events.sort_by_key(|e| (e.due, e.seq));
        events.into_iter().map(|e| e.volley).collect()
    }

    /// Number of volleys in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// ============================================================================
// Attack resolution
// ============================================================================

/// Whether a target is still a valid thing to hit.
fn target_alive(world: &WorldState, target: EntityId) -> bool {
    if let Some(unit) = world.units.get(target) {
        return !unit.health.is_dead();
    }
    world.buildings.get(target).is_some_and(|b| !b.health.is_dead())
}

/// Apply damage to a unit or building. Returns `false` if the target is gone.
pub fn apply_damage(
    world: &mut WorldState,
    attacker: EntityId,
    target: EntityId,
    amount: i32,
    events: &mut TickEvents,
) -> bool {
    if !target_alive(world, target) {
        return false;
    }
    if let Some(unit) = world.units.get_mut(target) {
        unit.health.apply_damage(amount);
    } else if let Some(building) = world.buildings.get_mut(target) {
        building.health.apply_damage(amount);
    }
    events.damage.push(DamageEvent {
        attacker,
        target,
        amount,
    });
    true
}

/// Let `attacker` strike its target if in range and off cooldown.
///
/// Returns `true` when an attack was made.
pub fn try_attack(world: &mut WorldState, attacker_id: EntityId, events: &mut TickEvents) -> bool {
    let Some(attacker) = world.units.get(attacker_id) else {
        return false;
    };
    let Some(target_id) = attacker.target else {
        return false;
    };
    let def = world.unit_def(attacker.kind).clone();
    if !def.is_combatant() {
        return false;
    }
    if let Some(last) = attacker.last_attack_tick {
        if world.tick < last + u64::from(def.attack_cooldown) {
            return false;
        }
    }
    let Some((_, target_pos, reach)) = world.target_info(target_id) else {
        return false;
    };
    if !target_alive(world, target_id) {
        return false;
    }
    let origin = attacker.position;
    let health = attacker.health;
    if origin.distance(target_pos) > def.range + reach {
        return false;
    }

    if def.ranged {
        let count = volley_count(def.squad_size, &health);
        launch_volleys(world, attacker_id, target_id, origin, target_pos, def.damage, count, events);
    } else {
        apply_damage(world, attacker_id, target_id, def.damage, events);
    }

    if let Some(attacker) = world.units.get_mut(attacker_id) {
        attacker.last_attack_tick = Some(world.tick);
    }
    true
}

/// Schedule one attack's volleys, staggered and delayed by flight time.
fn launch_volleys(
    world: &mut WorldState,
    attacker: EntityId,
    target: EntityId,
    origin: Vec2Fixed,
    impact: Vec2Fixed,
    damage: i32,
    count: u32,
    events: &mut TickEvents,
) {
    let distance = origin.distance(impact);
    let flight = (distance / world.config.projectile_speed).ceil().to_num::<u64>().max(1);
    let apex = world.config.arc_height * distance;
    let stagger = u64::from(world.config.volley_stagger_ticks);

    for (i, share) in split_damage(damage, count).into_iter().enumerate() {
        let fire_tick = world.tick + i as u64 * stagger;
        world.volleys.push(Volley {
            attacker,
            target,
            origin,
            impact,
            damage: share,
            fire_tick,
            arrive_tick: fire_tick + flight,
            apex,
        });
        events.volleys_launched += 1;
    }
}

/// Land every volley due this tick. Stale targets make a volley a no-op.
pub fn resolve_volleys(world: &mut WorldState, events: &mut TickEvents) {
    for volley in world.volleys.pop_due(world.tick) {
        if !apply_damage(world, volley.attacker, volley.target, volley.damage, events) {
            debug!(target = volley.target, "volley landed on a missing target");
        }
    }
}

/// Remove dead units and destroy dead buildings.
pub fn resolve_deaths(world: &mut WorldState, events: &mut TickEvents) {
    let mut selection_lost = false;
    for id in world.units.sorted_ids() {
        let dead = world.units.get(id).is_some_and(|u| u.health.is_dead());
        if !dead {
            continue;
        }
        if let Some(unit) = world.units.remove(id) {
            if let Some(job) = unit.job {
                if let Some(building) = world.buildings.get_mut(job) {
                    building.worker = None;
                }
            }
            world.unit_hash.remove(id);
            selection_lost |= unit.selected;
            events.unit_deaths.push(id);
            debug!(id, kind = ?unit.kind, owner = ?unit.owner, "unit died");
        }
    }
    if selection_lost {
        events.ui.push(events::selection_changed(world));
    }

    for id in world.buildings.sorted_ids() {
        if world.buildings.get(id).is_some_and(|b| b.health.is_dead()) {
            buildings::destroy(world, id, events);
        }
    }
}

/// Combat phase: attacks, arriving volleys, then deaths.
pub fn run(world: &mut WorldState, events: &mut TickEvents) {
    for id in world.units.sorted_ids() {
        let attacking = world
            .units
            .get(id)
            .is_some_and(|u| u.state == UnitState::Attacking);
        if attacking {
            try_attack(world, id, events);
        }
    }
    resolve_volleys(world, events);
    resolve_deaths(world, events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BuildingKind, Owner, UnitKind};
    use crate::config::SimConfig;
    use crate::factory;

    fn world() -> WorldState {
        WorldState::new(SimConfig::default()).unwrap()
    }

    fn engage(world: &mut WorldState, attacker: EntityId, target: EntityId) {
        let unit = world.units.get_mut(attacker).unwrap();
        unit.target = Some(target);
        unit.state = UnitState::Attacking;
    }

    #[test]
    fn test_volley_count_follows_health() {
        let mut health = Health::new(40);
        assert_eq!(volley_count(5, &health), 5);
        health.apply_damage(20);
        assert_eq!(volley_count(5, &health), 3); // ceil(2.5)
        health.apply_damage(19);
        assert_eq!(volley_count(5, &health), 1);
        health.apply_damage(5);
        assert_eq!(volley_count(5, &health), 1);
    }

    #[test]
    fn test_split_damage_sums_exactly() {
        assert_eq!(split_damage(10, 3), vec![4, 3, 3]);
        assert_eq!(split_damage(10, 5), vec![2, 2, 2, 2, 2]);
        assert_eq!(split_damage(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_damage(7, 0), vec![7]);
    }

    #[test]
    fn test_queue_pops_in_arrival_order() {
        let mut queue = VolleyQueue::default();
        let volley = |arrive_tick, damage| Volley {
            attacker: 1,
            target: 2,
            origin: Vec2Fixed::ZERO,
            impact: Vec2Fixed::ZERO,
            damage,
            fire_tick: 0,
            arrive_tick,
            apex: Fixed::ZERO,
        };
        queue.push(volley(9, 1));
        queue.push(volley(3, 2));
        queue.push(volley(3, 3));
        queue.push(volley(5, 4));

        let due: Vec<_> = queue.pop_due(5).iter().map(|v| v.damage).collect();
        assert_eq!(due, vec![2, 3, 4]);
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_due(8).is_empty());
        assert_eq!(queue.pop_due(9).len(), 1);
    }

    #[test]
    fn test_volley_arc_peaks_midway() {
        let volley = Volley {
            attacker: 1,
            target: 2,
            origin: Vec2Fixed::ZERO,
            impact: Vec2Fixed::from_ints(100, 0),
            damage: 1,
            fire_tick: 10,
            arrive_tick: 20,
            apex: Fixed::from_num(25),
        };
        let (pos, height) = volley.position_at(15).unwrap();
        assert_eq!(pos, Vec2Fixed::from_ints(50, 0));
        assert_eq!(height, Fixed::from_num(25));
        assert_eq!(volley.position_at(10).unwrap().1, Fixed::ZERO);
        assert!(volley.position_at(21).is_none());
    }

    #[test]
    fn test_melee_hits_immediately_and_respects_cooldown() {
        let mut world = world();
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, Vec2Fixed::from_ints(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, Vec2Fixed::from_ints(110, 100));
        engage(&mut world, soldier, enemy);

        let mut events = TickEvents::default();
        assert!(try_attack(&mut world, soldier, &mut events));
        let damage = world.unit_defs.soldier.damage;
        let max = world.unit_defs.soldier.health;
        assert_eq!(world.units.get(enemy).unwrap().health.current, max - damage);

        // Still cooling down on the same tick.
        assert!(!try_attack(&mut world, soldier, &mut events));
        world.tick += u64::from(world.unit_defs.soldier.attack_cooldown);
        assert!(try_attack(&mut world, soldier, &mut events));
        assert_eq!(events.damage.len(), 2);
    }

    #[test]
    fn test_out_of_range_does_not_attack() {
        let mut world = world();
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, Vec2Fixed::from_ints(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, Vec2Fixed::from_ints(300, 100));
        engage(&mut world, soldier, enemy);
        assert!(!try_attack(&mut world, soldier, &mut TickEvents::default()));
    }

    #[test]
    fn test_archer_volleys_land_later_and_sum_to_damage() {
        let mut world = world();
        let archer = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Archer, Vec2Fixed::from_ints(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, Vec2Fixed::from_ints(160, 100));
        engage(&mut world, archer, enemy);

        let mut events = TickEvents::default();
        assert!(try_attack(&mut world, archer, &mut events));
        let squad = world.unit_defs.archer.squad_size as usize;
        assert_eq!(events.volleys_launched, squad);
        assert!(events.damage.is_empty(), "ranged damage must not be instant");

        let total: i32 = world.volleys.in_flight().iter().map(|v| v.damage).sum();
        assert_eq!(total, world.unit_defs.archer.damage);

        for _ in 0..100 {
            world.tick += 1;
            resolve_volleys(&mut world, &mut events);
        }
        let max = world.unit_defs.soldier.health;
        assert_eq!(world.units.get(enemy).unwrap().health.current, max - world.unit_defs.archer.damage);
        assert!(world.volleys.is_empty());
    }

    #[test]
    fn test_volley_on_dead_target_is_noop() {
        let mut world = world();
        let archer = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Archer, Vec2Fixed::from_ints(100, 100));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Villager, Vec2Fixed::from_ints(160, 100));
        engage(&mut world, archer, enemy);

        let mut events = TickEvents::default();
        try_attack(&mut world, archer, &mut events);
        world.units.get_mut(enemy).unwrap().health.apply_damage(1000);
        resolve_deaths(&mut world, &mut events);
        assert_eq!(events.unit_deaths, vec![enemy]);

        for _ in 0..100 {
            world.tick += 1;
            resolve_volleys(&mut world, &mut events);
        }
        assert!(events.damage.is_empty());
    }

    #[test]
    fn test_dead_worker_frees_job_slot() {
        let mut world = world();
        let farm = factory::spawn_building(&mut world, Owner::Player, BuildingKind::Farm, Vec2Fixed::from_ints(300, 300));
        let villager = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Villager, Vec2Fixed::from_ints(300, 330));
        world.buildings.get_mut(farm).unwrap().worker = Some(villager);
        world.units.get_mut(villager).unwrap().job = Some(farm);
        world.units.get_mut(villager).unwrap().health.apply_damage(1000);

        resolve_deaths(&mut world, &mut TickEvents::default());
        assert!(world.buildings.get(farm).unwrap().worker.is_none());
        assert!(!world.units.contains(villager));
    }
}
