//! Entity records for the settlement simulation.
//!
//! Every entity kind is a plain struct with explicit optional fields.
//! Behavior lives in the system modules (`units`, `economy`, `combat`,
//! `buildings`); the types here only carry state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::math::Vec2Fixed;

/// Unique identifier for entities.
///
/// Units, buildings and trees share one id space so that a combat
/// target can be any of them.
pub type EntityId = u64;

// ============================================================================
// Ownership
// ============================================================================

/// Who controls an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Owner {
    /// The human player.
    Player,
    /// The scripted opponent.
    Opponent,
    /// Wildlife and scenery.
    Neutral,
}

impl Owner {
    /// Numeric owner code: 0 player, 1 opponent, -1 neutral.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Player => 0,
            Self::Opponent => 1,
            Self::Neutral => -1,
        }
    }

    /// Whether units of these two owners fight on sight.
    ///
    /// Only the player and the opponent are mutually hostile; wildlife
    /// is never auto-acquired but can still be attacked on command.
    #[must_use]
    pub const fn is_hostile_to(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Player, Self::Opponent) | (Self::Opponent, Self::Player)
        )
    }
}

// ============================================================================
// Resources
// ============================================================================

/// A bundle of the three settlement resources.
///
/// Used for pools, costs, production outputs and rates alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// Wood.
    pub wood: i32,
    /// Food.
    pub food: i32,
    /// Gold.
    pub gold: i32,
}

impl Resources {
    /// Nothing at all.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create a resource bundle.
    #[must_use]
    pub const fn new(wood: i32, food: i32, gold: i32) -> Self {
        Self { wood, food, gold }
    }

    /// Wood only.
    #[must_use]
    pub const fn wood(amount: i32) -> Self {
        Self::new(amount, 0, 0)
    }

    /// Food only.
    #[must_use]
    pub const fn food(amount: i32) -> Self {
        Self::new(0, amount, 0)
    }

    /// Gold only.
    #[must_use]
    pub const fn gold(amount: i32) -> Self {
        Self::new(0, 0, amount)
    }

    /// Whether every counter covers the matching cost counter.
    #[must_use]
    pub const fn can_afford(&self, cost: &Self) -> bool {
        self.wood >= cost.wood && self.food >= cost.food && self.gold >= cost.gold
    }

    /// Deduct a cost. Returns `false` and leaves the pool untouched when
    /// the cost is not covered.
    pub fn spend(&mut self, cost: &Self) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.wood -= cost.wood;
        self.food -= cost.food;
        self.gold -= cost.gold;
        true
    }

    /// Add another bundle, saturating at the integer bounds.
    pub fn add(&mut self, other: &Self) {
        self.wood = self.wood.saturating_add(other.wood);
        self.food = self.food.saturating_add(other.food);
        self.gold = self.gold.saturating_add(other.gold);
    }

    /// Every counter multiplied by `percent / 100`, rounded down.
    #[must_use]
    pub const fn percent(&self, percent: u32) -> Self {
        let p = percent as i32;
        Self::new(self.wood * p / 100, self.food * p / 100, self.gold * p / 100)
    }
}

// ============================================================================
// Units
// ============================================================================

/// Unit archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    /// Worker that staffs job buildings.
    Villager,
    /// Melee infantry.
    Soldier,
    /// Ranged squad firing volleys.
    Archer,
    /// Neutral wildlife.
    Deer,
}

impl UnitKind {
    /// All unit kinds in declaration order.
    pub const ALL: [Self; 4] = [Self::Villager, Self::Soldier, Self::Archer, Self::Deer];

    /// Whether this kind can take a job slot.
    #[must_use]
    pub const fn is_worker(self) -> bool {
        matches!(self, Self::Villager)
    }

    /// Whether this kind engages enemies on its own.
    #[must_use]
    pub const fn is_military(self) -> bool {
        matches!(self, Self::Soldier | Self::Archer)
    }

    /// Whether this kind is wildlife.
    #[must_use]
    pub const fn is_wildlife(self) -> bool {
        matches!(self, Self::Deer)
    }
}

/// Unit behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitState {
    /// Standing still.
    #[default]
    Idle,
    /// Following a move order.
    Moving,
    /// Walking to an assigned job building.
    MovingToWork,
    /// At the job building, producing.
    Working,
    /// Walking back to the nearest hub.
    MovingToRally,
    /// Closing in on a combat target.
    Chasing,
    /// In range of the combat target.
    Attacking,
    /// Wildlife roaming to a random spot.
    Wandering,
}

impl UnitState {
    /// Whether the unit is engaged with a combat target.
    #[must_use]
    pub const fn is_combat(self) -> bool {
        matches!(self, Self::Chasing | Self::Attacking)
    }
}

/// Health component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: i32,
    /// Maximum health points.
    pub max: i32,
}

impl Health {
    /// Create full health.
    #[must_use]
    pub const fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage, never going below zero.
    pub fn apply_damage(&mut self, amount: i32) {
        self.current = self.current.saturating_sub(amount.max(0)).max(0);
    }

    /// Whether health has run out.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current <= 0
    }
}

/// A waypoint list consumed through a cursor.
///
/// Owned by exactly one unit and replaced wholesale on every new order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Path {
    /// Waypoints in world space (tile centers).
    pub waypoints: Vec<Vec2Fixed>,
    /// Index of the waypoint currently being approached.
    pub cursor: usize,
}

impl Path {
    /// Wrap a waypoint list.
    #[must_use]
    pub const fn new(waypoints: Vec<Vec2Fixed>) -> Self {
        Self {
            waypoints,
            cursor: 0,
        }
    }

    /// Waypoint currently being approached.
    #[must_use]
    pub fn current(&self) -> Option<Vec2Fixed> {
        self.waypoints.get(self.cursor).copied()
    }

    /// Move on to the next waypoint.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1).min(self.waypoints.len());
    }

    /// Whether every waypoint has been reached.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    /// Final waypoint.
    #[must_use]
    pub fn destination(&self) -> Option<Vec2Fixed> {
        self.waypoints.last().copied()
    }
}

/// A unit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Entity id.
    pub id: EntityId,
    /// Controlling owner.
    pub owner: Owner,
    /// Archetype.
    pub kind: UnitKind,
    /// World position.
    pub position: Vec2Fixed,
    /// Behavior state.
    pub state: UnitState,
    /// Job building this unit staffs.
    pub job: Option<EntityId>,
    /// Active path.
    pub path: Option<Path>,
    /// Combat target (unit or building).
    pub target: Option<EntityId>,
    /// Offset from the target kept while approaching in formation.
    pub formation_offset: Vec2Fixed,
    /// Selected by the player.
    pub selected: bool,
    /// Hit points.
    pub health: Health,
    /// Tick of the last attack, for cooldowns.
    pub last_attack_tick: Option<u64>,
    /// Tick of the last chase re-path.
    pub last_repath_tick: u64,
}

impl Unit {
    /// Create an idle unit at full health.
    #[must_use]
    pub fn new(id: EntityId, owner: Owner, kind: UnitKind, position: Vec2Fixed, health: i32) -> Self {
        Self {
            id,
            owner,
            kind,
            position,
            state: UnitState::Idle,
            job: None,
            path: None,
            target: None,
            formation_offset: Vec2Fixed::ZERO,
            selected: false,
            health: Health::new(health),
            last_attack_tick: None,
            last_repath_tick: 0,
        }
    }

    /// Drop all orders and stand still.
    pub fn go_idle(&mut self) {
        self.state = UnitState::Idle;
        self.path = None;
        self.target = None;
    }
}

// ============================================================================
// Buildings
// ============================================================================

/// Building archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Settlement hub: territory, gold trickle, villager training.
    TownCenter,
    /// Raises the population cap.
    House,
    /// Staffed food producer.
    Farm,
    /// Staffed wood producer drawing on nearby trees.
    LumberMill,
    /// Trains military units.
    Barracks,
    /// Raises happiness and extends territory.
    Chapel,
}

impl BuildingKind {
    /// All building kinds in declaration order.
    pub const ALL: [Self; 6] = [
        Self::TownCenter,
        Self::House,
        Self::Farm,
        Self::LumberMill,
        Self::Barracks,
        Self::Chapel,
    ];
}

/// A unit waiting to be trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainingOrder {
    /// Unit to produce.
    pub kind: UnitKind,
    /// Ticks left until it is ready.
    pub remaining_ticks: u32,
}

/// A building record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Entity id.
    pub id: EntityId,
    /// Controlling owner.
    pub owner: Owner,
    /// Archetype.
    pub kind: BuildingKind,
    /// Footprint center.
    pub position: Vec2Fixed,
    /// Staffing worker, if the kind has a job slot.
    pub worker: Option<EntityId>,
    /// Structure points.
    pub health: Health,
    /// Training queue, front first.
    pub training: VecDeque<TrainingOrder>,
}

impl Building {
    /// Create an unstaffed building at full health.
    #[must_use]
    pub fn new(id: EntityId, owner: Owner, kind: BuildingKind, position: Vec2Fixed, health: i32) -> Self {
        Self {
            id,
            owner,
            kind,
            position,
            worker: None,
            health: Health::new(health),
            training: VecDeque::new(),
        }
    }
}

// ============================================================================
// Scenery
// ============================================================================

/// A harvestable tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tree {
    /// Entity id.
    pub id: EntityId,
    /// World position.
    pub position: Vec2Fixed,
    /// Wood left before the tree is felled.
    pub wood_remaining: i32,
    /// Felled trees stay as stumps: no blocking, no wood.
    pub felled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_codes_and_hostility() {
        assert_eq!(Owner::Player.code(), 0);
        assert_eq!(Owner::Opponent.code(), 1);
        assert_eq!(Owner::Neutral.code(), -1);

        assert!(Owner::Player.is_hostile_to(Owner::Opponent));
        assert!(Owner::Opponent.is_hostile_to(Owner::Player));
        assert!(!Owner::Player.is_hostile_to(Owner::Neutral));
        assert!(!Owner::Player.is_hostile_to(Owner::Player));
    }

    #[test]
    fn test_resources_spend_is_all_or_nothing() {
        let mut pool = Resources::new(100, 10, 5);
        assert!(!pool.spend(&Resources::new(50, 20, 0)));
        assert_eq!(pool, Resources::new(100, 10, 5));

        assert!(pool.spend(&Resources::new(50, 10, 0)));
        assert_eq!(pool, Resources::new(50, 0, 5));
    }

    #[test]
    fn test_resources_percent_rounds_down() {
        assert_eq!(Resources::wood(50).percent(75), Resources::wood(37));
        assert_eq!(Resources::new(100, 0, 10).percent(75), Resources::new(75, 0, 7));
    }

    #[test]
    fn test_health_damage_saturates() {
        let mut health = Health::new(10);
        health.apply_damage(4);
        assert_eq!(health.current, 6);
        assert!(!health.is_dead());

        health.apply_damage(100);
        assert_eq!(health.current, 0);
        assert!(health.is_dead());
    }

    #[test]
    fn test_path_cursor() {
        let mut path = Path::new(vec![Vec2Fixed::from_ints(8, 8), Vec2Fixed::from_ints(24, 8)]);
        assert_eq!(path.current(), Some(Vec2Fixed::from_ints(8, 8)));
        path.advance();
        assert_eq!(path.current(), Some(Vec2Fixed::from_ints(24, 8)));
        path.advance();
        assert!(path.is_finished());
        path.advance();
        assert_eq!(path.cursor, 2);
        assert_eq!(path.destination(), Some(Vec2Fixed::from_ints(24, 8)));
    }

    #[test]
    fn test_unit_go_idle_clears_orders() {
        let mut unit = Unit::new(1, Owner::Player, UnitKind::Soldier, Vec2Fixed::ZERO, 50);
        unit.state = UnitState::Chasing;
        unit.target = Some(9);
        unit.path = Some(Path::new(vec![Vec2Fixed::ZERO]));
        unit.go_idle();
        assert_eq!(unit.state, UnitState::Idle);
        assert!(unit.target.is_none());
        assert!(unit.path.is_none());
    }
}
