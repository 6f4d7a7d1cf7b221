//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate and processes all game logic
//! deterministically.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - One seeded RNG owned by the world
//! - Consistent iteration order (sorted entity IDs)
//! - Same inputs always produce same outputs
//!
//! # Example
//!
//! ```
//! use hearth_core::commands::Command;
//! use hearth_core::components::{BuildingKind, Owner};
//! use hearth_core::config::SimConfig;
//! use hearth_core::math::Vec2Fixed;
//! use hearth_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(SimConfig::default()).unwrap();
//! sim.spawn_building(Owner::Player, BuildingKind::TownCenter, Vec2Fixed::from_ints(400, 400))
//!     .unwrap();
//!
//! sim.issue(Command::Build {
//!     kind: BuildingKind::House,
//!     position: Vec2Fixed::from_ints(420, 420),
//! });
//! let events = sim.tick();
//! assert_eq!(events.buildings_constructed.len(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::trace;

use crate::ai::{default_blueprint, BlueprintStep, OpponentController};
use crate::buildings::{self, PlacementError};
use crate::combat;
use crate::commands::{self, Command, CommandQueue, IssuedCommand, PlacementPreview};
use crate::components::{BuildingKind, EntityId, Owner, UnitKind};
use crate::config::SimConfig;
use crate::economy;
use crate::error::{GameError, Result};
use crate::events::{self, StatsSnapshot, TickEvents};
use crate::factory;
use crate::math::{Fixed, Vec2Fixed};
use crate::units;
use crate::world::WorldState;

/// Distance of the default opponent base from the far map corner.
const OPPONENT_CORNER_INSET: i32 = 320;

/// The core game simulation.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Commands** - Apply everything queued since the last tick
/// 2. **Economy** - Jobs, rallying, production, growth, training
/// 3. **Units** - Engagements, movement, separation
/// 4. **Combat** - Attacks, arriving volleys, deaths
/// 5. **Opponent** - Once per simulated second; its orders run next tick
#[derive(Debug, Clone)]
pub struct Simulation {
    world: WorldState,
    commands: CommandQueue,
    opponent: OpponentController,
}

impl Simulation {
    /// Create an empty world with the default opponent plan in the far corner.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] for a config the simulation cannot run.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let anchor = Vec2Fixed::new(
            config.world_width() - Fixed::from_num(OPPONENT_CORNER_INSET),
            config.world_height() - Fixed::from_num(OPPONENT_CORNER_INSET),
        );
        Self::with_opponent(config, anchor, default_blueprint())
    }

    /// Create an empty world with a custom opponent plan.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] for a config the simulation cannot run.
    pub fn with_opponent(config: SimConfig, anchor: Vec2Fixed, blueprint: Vec<BlueprintStep>) -> Result<Self> {
        Ok(Self::from_world(WorldState::new(config)?, OpponentController::new(anchor, blueprint)))
    }

    /// Wrap an existing world.
    #[must_use]
    pub fn from_world(world: WorldState, opponent: OpponentController) -> Self {
        Self {
            world,
            commands: CommandQueue::new(),
            opponent,
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.world.tick
    }

    /// World state.
    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Mutable world state, for scenario setup and tests.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// Opponent controller.
    #[must_use]
    pub const fn opponent(&self) -> &OpponentController {
        &self.opponent
    }

    /// Queue a command for the next tick.
    pub fn queue_command(&mut self, command: IssuedCommand) {
        self.commands.push(command);
    }

    /// Queue a player command for the next tick.
    pub fn issue(&mut self, command: Command) {
        self.queue_command(IssuedCommand::player(command));
    }

    /// Commands waiting for the next tick.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();
        let world = &mut self.world;
        world.tick += 1;

        for command in self.commands.drain() {
            commands::apply(world, &command, &mut events);
        }

        let fresh = economy::run(world, &mut events);
        units::run(world, &fresh);
        combat::run(world, &mut events);

        if !world.policy.ai_disabled && world.tick % world.config.fast_cadence() == 0 {
            for order in self.opponent.tick(world) {
                self.commands.push(order);
            }
        }

        trace!(tick = self.world.tick, hash = self.state_hash(), "tick complete");
        events
    }

    /// Advance `count` ticks, returning the events of each.
    pub fn run_ticks(&mut self, count: u64) -> Vec<TickEvents> {
        (0..count).map(|_| self.tick()).collect()
    }

    /// Settlement overview for the UI.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        events::stats_snapshot(&self.world)
    }

    /// Ghost of the armed building at a point.
    #[must_use]
    pub fn placement_preview(&self, position: Vec2Fixed) -> Option<PlacementPreview> {
        commands::placement_preview(&self.world, position)
    }

    /// Check a placement for the player right now.
    ///
    /// # Errors
    ///
    /// The rule the placement breaks.
    pub fn check_placement(&self, kind: BuildingKind, position: Vec2Fixed) -> std::result::Result<(), PlacementError> {
        buildings::check_placement(&self.world, Owner::Player, kind, position)
    }

    /// Place a unit during setup.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] when the position is off the map.
    pub fn spawn_unit(&mut self, owner: Owner, kind: UnitKind, position: Vec2Fixed) -> Result<EntityId> {
        self.ensure_on_map(position)?;
        Ok(factory::spawn_unit(&mut self.world, owner, kind, position))
    }

    /// Place a finished building during setup, free of cost and territory
    /// rules. Bonuses apply.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] when the footprint leaves the map or
    /// overlaps another building.
    pub fn spawn_building(&mut self, owner: Owner, kind: BuildingKind, position: Vec2Fixed) -> Result<EntityId> {
        let area = buildings::footprint_of(&self.world, kind, position);
        let config = &self.world.config;
        if area.min_x < Fixed::ZERO
            || area.min_y < Fixed::ZERO
            || area.max_x > config.world_width()
            || area.max_y > config.world_height()
        {
            return Err(GameError::InvalidState(format!("{kind:?} footprint leaves the map")));
        }
        if let Some(other) = self
            .world
            .buildings
            .iter_sorted()
            .find(|b| buildings::footprint_of(&self.world, b.kind, b.position).overlaps(&area))
        {
            return Err(GameError::InvalidState(format!("overlaps building {}", other.id)));
        }
        Ok(buildings::construct(
            &mut self.world,
            owner,
            kind,
            position,
            &mut TickEvents::default(),
        ))
    }

    /// Place a tree during setup.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] when the position is off the map.
    pub fn spawn_tree(&mut self, position: Vec2Fixed) -> Result<EntityId> {
        self.ensure_on_map(position)?;
        Ok(factory::spawn_tree(&mut self.world, position))
    }

    fn ensure_on_map(&self, position: Vec2Fixed) -> Result<()> {
        if self.world.clamp_to_world(position) == position {
            Ok(())
        } else {
            Err(GameError::InvalidState(format!(
                "position ({}, {}) is off the map",
                position.x, position.y
            )))
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let world = &self.world;
        let mut hasher = DefaultHasher::new();

        world.tick.hash(&mut hasher);

        world.units.len().hash(&mut hasher);
        for unit in world.units.iter_sorted() {
            unit.hash(&mut hasher);
        }
        world.buildings.len().hash(&mut hasher);
        for building in world.buildings.iter_sorted() {
            building.hash(&mut hasher);
        }
        world.trees.len().hash(&mut hasher);
        for tree in world.trees.iter_sorted() {
            tree.hash(&mut hasher);
        }
        for volley in world.volleys.in_flight() {
            volley.hash(&mut hasher);
        }

        world.pools.player.hash(&mut hasher);
        world.pools.opponent.hash(&mut hasher);
        world.population().hash(&mut hasher);
        world.settlement.max_population.hash(&mut hasher);
        world.settlement.happiness.hash(&mut hasher);

        hasher.finish()
    }
}
