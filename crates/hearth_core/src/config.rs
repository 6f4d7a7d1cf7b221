//! Simulation tunables.
//!
//! [`SimConfig::default`] is a complete playable configuration. RON
//! overrides only need to name the fields they change.

use serde::{Deserialize, Serialize};

use crate::components::Resources;
use crate::error::{GameError, Result};
use crate::math::{fixed_decimal_serde, Fixed};

/// Default simulation tick rate (ticks per simulated second).
pub const TICK_RATE: u32 = 20;

/// Largest map edge in tiles.
pub const MAX_MAP_TILES: u32 = 4096;

/// Largest map edge in world units (`tiles * tile_size`).
pub const MAX_WORLD_EXTENT: u64 = 1 << 20;

/// Every constant the simulation reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the world RNG.
    pub seed: u64,
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// Edge length of one grid tile in world units.
    pub tile_size: u32,
    /// Map width in tiles.
    pub map_width: u32,
    /// Map height in tiles.
    pub map_height: u32,

    // Pathfinding
    /// Extra cost for stepping into a blocked cell.
    #[serde(with = "fixed_decimal_serde")]
    pub blocked_penalty: Fixed,
    /// Ring radius (tiles) searched for a free cell around a blocked goal.
    pub target_search_radius: u32,

    // Unit simulation
    /// Distance at which a waypoint counts as reached.
    #[serde(with = "fixed_decimal_serde")]
    pub waypoint_arrival_radius: Fixed,
    /// Units closer than this push each other apart.
    #[serde(with = "fixed_decimal_serde")]
    pub separation_radius: Fixed,
    /// Push per unit of overlap.
    #[serde(with = "fixed_decimal_serde")]
    pub separation_strength: Fixed,
    /// Idle villagers farther than this from every hub walk back.
    #[serde(with = "fixed_decimal_serde")]
    pub rally_distance: Fixed,
    /// Idle military pick fights within this radius.
    #[serde(with = "fixed_decimal_serde")]
    pub aggro_radius: Fixed,
    /// Ticks between chase re-paths.
    pub repath_interval: u32,
    /// Spacing between formation slots.
    #[serde(with = "fixed_decimal_serde")]
    pub formation_spacing: Fixed,
    /// Chance per tick (out of 1000) that idle wildlife starts wandering.
    pub wander_chance_per_mille: u32,
    /// Maximum wander distance.
    #[serde(with = "fixed_decimal_serde")]
    pub wander_radius: Fixed,

    // Combat
    /// Ticks between consecutive volleys of one attack.
    pub volley_stagger_ticks: u32,
    /// Projectile distance per tick.
    #[serde(with = "fixed_decimal_serde")]
    pub projectile_speed: Fixed,
    /// Arc apex height as a fraction of flight distance.
    #[serde(with = "fixed_decimal_serde")]
    pub arc_height: Fixed,

    // Economy
    /// Player resources at start.
    pub starting_resources: Resources,
    /// Opponent resources at start.
    pub opponent_starting_resources: Resources,
    /// Population cap before building bonuses.
    pub base_max_population: u32,
    /// Happiness at start (0..=100).
    pub starting_happiness: i32,
    /// Happiness gained on a fed production cycle.
    pub happiness_gain: i32,
    /// Happiness lost when food runs out.
    pub starvation_penalty: i32,
    /// Happiness lost while over the population cap.
    pub overcrowding_penalty: i32,
    /// Happiness required for population growth.
    pub growth_happiness_threshold: i32,
    /// Maximum trees a lumber mill draws on per cycle.
    pub lumber_tree_cap: u32,
    /// Wood a fresh tree holds.
    pub tree_wood: i32,
    /// Maximum queued training orders per building.
    pub training_queue_limit: usize,
    /// Share of the wood cost returned on demolition.
    pub demolish_refund_percent: u32,

    // Opponent
    /// Idle army size that triggers an attack wave.
    pub ai_attack_threshold: u32,
    /// Army size at which recruiting stops.
    pub ai_max_army: u32,
    /// Flat opponent income per controller tick.
    pub ai_income: Resources,

    // Policy
    /// Seconds of enforced peace at the start of a match.
    pub treaty_secs: u32,
    /// Peace regardless of the treaty clock.
    pub peaceful_mode: bool,
    /// Opponent controller switched off.
    pub ai_disabled: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            tick_rate: TICK_RATE,
            tile_size: 16,
            map_width: 128,
            map_height: 128,

            blocked_penalty: Fixed::from_num(50),
            target_search_radius: 4,

            waypoint_arrival_radius: Fixed::from_num(4),
            separation_radius: Fixed::from_num(18),
            separation_strength: Fixed::from_num(0.05),
            rally_distance: Fixed::from_num(150),
            aggro_radius: Fixed::from_num(160),
            repath_interval: 10,
            formation_spacing: Fixed::from_num(24),
            wander_chance_per_mille: 5,
            wander_radius: Fixed::from_num(96),

            volley_stagger_ticks: 2,
            projectile_speed: Fixed::from_num(12),
            arc_height: Fixed::from_num(0.25),

            starting_resources: Resources::new(300, 150, 100),
            opponent_starting_resources: Resources::new(300, 150, 100),
            base_max_population: 5,
            starting_happiness: 60,
            happiness_gain: 1,
            starvation_penalty: 5,
            overcrowding_penalty: 2,
            growth_happiness_threshold: 50,
            lumber_tree_cap: 5,
            tree_wood: 100,
            training_queue_limit: 5,
            demolish_refund_percent: 75,

            ai_attack_threshold: 6,
            ai_max_army: 12,
            ai_income: Resources::new(3, 2, 1),

            treaty_secs: 0,
            peaceful_mode: false,
            ai_disabled: false,
        }
    }
}

impl SimConfig {
    /// Parse a config from RON, filling omitted fields from the defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            what: "simulation config".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            return Err(GameError::InvalidState("tick_rate must be positive".into()));
        }
        if self.tile_size == 0 {
            return Err(GameError::InvalidState("tile_size must be positive".into()));
        }
        if self.map_width == 0 || self.map_height == 0 {
            return Err(GameError::InvalidState("map must have at least one tile".into()));
        }
        if self.map_width > MAX_MAP_TILES || self.map_height > MAX_MAP_TILES {
            return Err(GameError::InvalidState(format!(
                "map is {}x{} tiles, limit is {MAX_MAP_TILES} per side",
                self.map_width, self.map_height
            )));
        }
        let extent = u64::from(self.map_width.max(self.map_height)) * u64::from(self.tile_size);
        if extent > MAX_WORLD_EXTENT {
            return Err(GameError::InvalidState(format!(
                "world extent {extent} exceeds {MAX_WORLD_EXTENT} units"
            )));
        }
        if self.projectile_speed <= Fixed::ZERO {
            return Err(GameError::InvalidState("projectile_speed must be positive".into()));
        }
        Ok(())
    }

    /// Ticks between production cycles (one simulated second).
    #[must_use]
    pub fn fast_cadence(&self) -> u64 {
        u64::from(self.tick_rate.max(1))
    }

    /// Ticks between population growth checks (five simulated seconds).
    #[must_use]
    pub fn slow_cadence(&self) -> u64 {
        self.fast_cadence() * 5
    }

    /// Tile edge as a fixed-point length.
    #[must_use]
    pub fn tile(&self) -> Fixed {
        Fixed::from_num(self.tile_size)
    }

    /// World width in world units.
    #[must_use]
    pub fn world_width(&self) -> Fixed {
        Fixed::from_num(self.map_width) * self.tile()
    }

    /// World height in world units.
    #[must_use]
    pub fn world_height(&self) -> Fixed {
        Fixed::from_num(self.map_height) * self.tile()
    }
}
