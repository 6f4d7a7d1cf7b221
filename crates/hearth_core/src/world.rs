//! Authoritative world state.
//!
//! [`WorldState`] owns every entity collection, the occupancy grid, the
//! spatial indices, resource pools, policy flags and the seeded RNG.
//! Systems receive `&mut WorldState` from the tick loop; nothing else
//! writes into it.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::combat::VolleyQueue;
use crate::components::{Building, BuildingKind, EntityId, Owner, Tree, Unit, UnitKind};
use crate::config::SimConfig;
use crate::data::{BuildingData, BuildingDefs, UnitData, UnitDefs};
use crate::economy::{ResourcePools, Settlement};
use crate::error::{GameError, Result};
use crate::grid::GridIndex;
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::PathParams;
use crate::spatial::SpatialHash;

/// Bucket size of the unit and tree spatial hashes, in tiles.
const SPATIAL_CELL_TILES: i32 = 4;

/// Storage for one entity kind.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic
/// iteration via sorted keys when processing systems.
#[derive(Debug, Clone)]
pub struct EntityStorage<T> {
    entities: HashMap<EntityId, T>,
}

impl<T> Default for EntityStorage<T> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }
}

impl<T> EntityStorage<T> {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity under an already allocated id.
    pub fn insert(&mut self, id: EntityId, entity: T) {
        self.entities.insert(id, entity);
    }

    /// Remove an entity by id.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// Get an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Sorted ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Entities in ascending id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &T> {
        self.sorted_ids().into_iter().filter_map(move |id| self.entities.get(&id))
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }
}

/// Peace and opponent policy toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policy {
    /// Peace regardless of the treaty clock.
    pub peaceful_mode: bool,
    /// Seconds of peace from match start.
    pub treaty_secs: u32,
    /// Opponent controller switched off.
    pub ai_disabled: bool,
    /// Clicks demolish instead of select.
    pub demolish_mode: bool,
}

/// The whole simulated world.
#[derive(Debug, Clone)]
pub struct WorldState {
    /// Tunables.
    pub config: SimConfig,
    /// Unit stats.
    pub unit_defs: UnitDefs,
    /// Building stats.
    pub building_defs: BuildingDefs,
    /// Ticks elapsed.
    pub tick: u64,
    next_id: EntityId,
    /// Units.
    pub units: EntityStorage<Unit>,
    /// Buildings.
    pub buildings: EntityStorage<Building>,
    /// Trees, felled ones included.
    pub trees: EntityStorage<Tree>,
    /// Occupancy grid.
    pub grid: GridIndex,
    /// Unit positions, rebuilt every tick after movement.
    pub unit_hash: SpatialHash,
    /// Standing trees.
    pub tree_hash: SpatialHash,
    /// Resource pools per side.
    pub pools: ResourcePools,
    /// Player population, happiness and rates.
    pub settlement: Settlement,
    /// Policy toggles.
    pub policy: Policy,
    /// World RNG.
    pub rng: ChaCha8Rng,
    /// Ranged volleys in flight.
    pub volleys: VolleyQueue,
    /// Territory overlay needs a redraw.
    pub territory_dirty: bool,
    /// Building kind armed for placement.
    pub pending_placement: Option<BuildingKind>,
    /// Building shown in the info panel.
    pub selected_building: Option<EntityId>,
}

impl WorldState {
    /// Build an empty world with default unit and building definitions.
    pub fn new(config: SimConfig) -> Result<Self> {
        Self::with_defs(config, UnitDefs::default(), BuildingDefs::default())
    }

    /// Build an empty world with custom definitions.
    pub fn with_defs(config: SimConfig, unit_defs: UnitDefs, building_defs: BuildingDefs) -> Result<Self> {
        config.validate()?;
        let tile = config.tile();
        let bucket = tile * Fixed::from_num(SPATIAL_CELL_TILES);
        Ok(Self {
            grid: GridIndex::new(config.map_width, config.map_height, tile),
            unit_hash: SpatialHash::new(bucket),
            tree_hash: SpatialHash::new(bucket),
            pools: ResourcePools::new(config.starting_resources, config.opponent_starting_resources),
            settlement: Settlement::new(config.base_max_population, config.starting_happiness),
            policy: Policy {
                peaceful_mode: config.peaceful_mode,
                treaty_secs: config.treaty_secs,
                ai_disabled: config.ai_disabled,
                demolish_mode: false,
            },
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            volleys: VolleyQueue::default(),
            tick: 0,
            next_id: 1,
            units: EntityStorage::new(),
            buildings: EntityStorage::new(),
            trees: EntityStorage::new(),
            territory_dirty: false,
            pending_placement: None,
            selected_building: None,
            config,
            unit_defs,
            building_defs,
        })
    }

    /// Hand out the next entity id.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Whole simulated seconds since the match began.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.tick / self.config.fast_cadence()
    }

    /// Whether attacks between owners are currently suppressed.
    #[must_use]
    pub fn peace_active(&self) -> bool {
        self.policy.peaceful_mode || self.elapsed_secs() < u64::from(self.policy.treaty_secs)
    }

    /// Pathfinder tunables.
    #[must_use]
    pub fn path_params(&self) -> PathParams {
        PathParams::from(&self.config)
    }

    /// Stats for a unit kind.
    #[must_use]
    pub fn unit_def(&self, kind: UnitKind) -> &UnitData {
        self.unit_defs.get(kind)
    }

    /// Stats for a building kind.
    #[must_use]
    pub fn building_def(&self, kind: BuildingKind) -> &BuildingData {
        self.building_defs.get(kind)
    }

    /// Units owned by the player, i.e. the settlement's population.
    #[must_use]
    pub fn population(&self) -> u32 {
        self.units.values().filter(|u| u.owner == Owner::Player).count() as u32
    }

    /// Position of any entity, plus a reach bonus for building targets.
    ///
    /// Buildings report half their larger footprint edge so range checks
    /// measure to the footprint rather than its center.
    #[must_use]
    pub fn target_info(&self, id: EntityId) -> Option<(Owner, Vec2Fixed, Fixed)> {
        if let Some(unit) = self.units.get(id) {
            return Some((unit.owner, unit.position, Fixed::ZERO));
        }
        self.buildings.get(id).map(|b| {
            let half = self.building_def(b.kind).half_extents();
            (b.owner, b.position, half.x.max(half.y))
        })
    }

    /// Owner of a unit or building.
    #[must_use]
    pub fn owner_of(&self, id: EntityId) -> Option<Owner> {
        self.target_info(id).map(|(owner, _, _)| owner)
    }

    /// Hubs of an owner in id order.
    #[must_use]
    pub fn hubs(&self, owner: Owner) -> Vec<&Building> {
        self.buildings
            .iter_sorted()
            .filter(|b| b.owner == owner && b.kind == BuildingKind::TownCenter)
            .collect()
    }

    /// Nearest hub of an owner to a point, ties broken by lowest id.
    #[must_use]
    pub fn nearest_hub(&self, owner: Owner, pos: Vec2Fixed) -> Option<&Building> {
        self.hubs(owner)
            .into_iter()
            .min_by_key(|b| (b.position.distance_squared(pos), b.id))
    }

    /// Look up a unit or fail with [`GameError::EntityNotFound`].
    pub fn unit(&self, id: EntityId) -> Result<&Unit> {
        self.units.get(id).ok_or(GameError::EntityNotFound(id))
    }

    /// Look up a building or fail with [`GameError::EntityNotFound`].
    pub fn building(&self, id: EntityId) -> Result<&Building> {
        self.buildings.get(id).ok_or(GameError::EntityNotFound(id))
    }

    /// Re-index every unit position.
    pub fn rebuild_unit_hash(&mut self) {
        self.unit_hash.clear();
        for id in self.units.sorted_ids() {
            if let Some(unit) = self.units.get(id) {
                self.unit_hash.insert(id, unit.position);
            }
        }
    }

    /// Keep a world point inside the map.
    #[must_use]
    pub fn clamp_to_world(&self, pos: Vec2Fixed) -> Vec2Fixed {
        let max_x = self.config.world_width() - Fixed::ONE;
        let max_y = self.config.world_height() - Fixed::ONE;
        Vec2Fixed::new(pos.x.clamp(Fixed::ZERO, max_x), pos.y.clamp(Fixed::ZERO, max_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_sorted_iteration() {
        let mut storage = EntityStorage::new();
        storage.insert(5, "five");
        storage.insert(2, "two");
        storage.insert(9, "nine");
        assert_eq!(storage.sorted_ids(), vec![2, 5, 9]);
        assert_eq!(storage.iter_sorted().copied().collect::<Vec<_>>(), vec!["two", "five", "nine"]);
        assert_eq!(storage.remove(5), Some("five"));
        assert!(!storage.contains(5));
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut world = WorldState::new(SimConfig::default()).unwrap();
        let a = world.allocate_id();
        let b = world.allocate_id();
        assert!(b > a);
    }

    #[test]
    fn test_peace_from_treaty_clock() {
        let config = SimConfig {
            treaty_secs: 2,
            ..SimConfig::default()
        };
        let mut world = WorldState::new(config).unwrap();
        assert!(world.peace_active());
        world.tick = 39;
        assert!(world.peace_active());
        world.tick = 40;
        assert!(!world.peace_active());
        world.policy.peaceful_mode = true;
        assert!(world.peace_active());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            tile_size: 0,
            ..SimConfig::default()
        };
        assert!(WorldState::new(config).is_err());
    }

    #[test]
    fn test_clamp_to_world() {
        let world = WorldState::new(SimConfig::default()).unwrap();
        let clamped = world.clamp_to_world(Vec2Fixed::from_ints(-10, 5000));
        assert_eq!(clamped, Vec2Fixed::from_ints(0, 2047));
    }
}
