//! Outbound state for renderers and UI.
//!
//! Nothing here feeds back into the simulation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{BuildingKind, EntityId, Owner, Resources, UnitKind};
use crate::world::WorldState;

/// Settlement overview shown in the top bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Player units alive.
    pub population: u32,
    /// Population cap.
    pub max_population: u32,
    /// Happiness, 0..=100.
    pub happiness: i32,
    /// Player resource pool.
    pub resources: Resources,
    /// Net change over the last production cycle.
    pub rates: Resources,
}

/// UI notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiEvent {
    /// The unit selection changed.
    SelectionChanged {
        /// Units selected.
        count: usize,
        /// Selected units per kind.
        per_type_counts: BTreeMap<UnitKind, usize>,
    },
    /// The inspected building changed.
    BuildingSelected {
        /// Kind of the selected building, if any.
        kind: Option<BuildingKind>,
    },
}

/// Damage dealt by one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Attacking unit.
    pub attacker: EntityId,
    /// Unit or building hit.
    pub target: EntityId,
    /// Damage applied.
    pub amount: i32,
}

/// A command the simulation turned down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCommand {
    /// Side that issued it.
    pub issuer: Owner,
    /// Why it was rejected.
    pub reason: String,
}

/// Events generated during a simulation tick.
///
/// These events can be used by the presentation layer to trigger
/// effects, sounds, animations, etc.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Damage events from combat.
    pub damage: Vec<DamageEvent>,
    /// Units that died this tick.
    pub unit_deaths: Vec<EntityId>,
    /// Buildings demolished or destroyed this tick.
    pub buildings_destroyed: Vec<EntityId>,
    /// Units spawned this tick (training and growth).
    pub units_spawned: Vec<EntityId>,
    /// Buildings placed this tick.
    pub buildings_constructed: Vec<EntityId>,
    /// Trees felled this tick.
    pub trees_felled: Vec<EntityId>,
    /// Volleys launched this tick.
    pub volleys_launched: usize,
    /// UI notifications.
    pub ui: Vec<UiEvent>,
    /// Commands rejected this tick.
    pub rejected: Vec<RejectedCommand>,
}

/// Snapshot the player's settlement.
#[must_use]
pub fn stats_snapshot(world: &WorldState) -> StatsSnapshot {
    StatsSnapshot {
        tick: world.tick,
        population: world.population(),
        max_population: world.settlement.max_population,
        happiness: world.settlement.happiness,
        resources: world.pools.player,
        rates: world.settlement.rates,
    }
}

/// Current selection as a UI event.
#[must_use]
pub fn selection_changed(world: &WorldState) -> UiEvent {
    let mut per_type_counts = BTreeMap::new();
    let mut count = 0;
    for unit in world.units.values().filter(|u| u.selected && u.owner == Owner::Player) {
        *per_type_counts.entry(unit.kind).or_insert(0) += 1;
        count += 1;
    }
    UiEvent::SelectionChanged { count, per_type_counts }
}

/// Current building selection as a UI event.
#[must_use]
pub fn building_selected(world: &WorldState) -> UiEvent {
    UiEvent::BuildingSelected {
        kind: world
            .selected_building
            .and_then(|id| world.buildings.get(id))
            .map(|b| b.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::factory;
    use crate::math::Vec2Fixed;

    #[test]
    fn test_selection_counts_per_kind() {
        let mut world = WorldState::new(SimConfig::default()).unwrap();
        let ids = [
            factory::spawn_unit(&mut world, Owner::Player, UnitKind::Villager, Vec2Fixed::ZERO),
            factory::spawn_unit(&mut world, Owner::Player, UnitKind::Archer, Vec2Fixed::ZERO),
            factory::spawn_unit(&mut world, Owner::Player, UnitKind::Archer, Vec2Fixed::ZERO),
            factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, Vec2Fixed::ZERO),
        ];
        for id in &ids[..3] {
            world.units.get_mut(*id).unwrap().selected = true;
        }

        let UiEvent::SelectionChanged { count, per_type_counts } = selection_changed(&world) else {
            panic!("expected a selection event");
        };
        assert_eq!(count, 3);
        assert_eq!(per_type_counts.get(&UnitKind::Archer), Some(&2));
        assert_eq!(per_type_counts.get(&UnitKind::Villager), Some(&1));
        assert_eq!(per_type_counts.get(&UnitKind::Soldier), None);
    }

    #[test]
    fn test_stats_snapshot_reads_pools() {
        let world = WorldState::new(SimConfig::default()).unwrap();
        let stats = stats_snapshot(&world);
        assert_eq!(stats.resources, SimConfig::default().starting_resources);
        assert_eq!(stats.population, 0);
        assert_eq!(stats.max_population, SimConfig::default().base_max_population);
    }
}
