//! Scenario loading and setup.
//!
//! Scenarios describe the opening state of a headless match: config
//! overrides, starting buildings, units and trees for each side, and
//! optionally the opponent's base plan.

use std::path::Path;

use hearth_core::ai::{default_blueprint, BlueprintStep};
use hearth_core::components::{BuildingKind, Owner, UnitKind};
use hearth_core::config::SimConfig;
use hearth_core::error::GameError;
use hearth_core::math::Vec2Fixed;
use hearth_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The described world could not be built.
    #[error("Invalid scenario setup: {0}")]
    Setup(#[from] GameError),
}

/// A building placed before the first tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Owning side.
    pub owner: Owner,
    /// Building kind.
    pub kind: BuildingKind,
    /// Footprint center in world units.
    pub position: (i32, i32),
}

impl BuildingPlacement {
    /// Create a placement.
    #[must_use]
    pub const fn new(owner: Owner, kind: BuildingKind, x: i32, y: i32) -> Self {
        Self {
            owner,
            kind,
            position: (x, y),
        }
    }
}

/// A row of identical units placed before the first tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Owning side.
    pub owner: Owner,
    /// Unit kind.
    pub kind: UnitKind,
    /// Position of the first unit.
    pub position: (i32, i32),
    /// How many to place, spaced along x.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

/// Horizontal gap between units of one placement row.
const UNIT_ROW_SPACING: i32 = 20;

impl UnitPlacement {
    /// Create a placement.
    #[must_use]
    pub const fn new(owner: Owner, kind: UnitKind, x: i32, y: i32, count: u32) -> Self {
        Self {
            owner,
            kind,
            position: (x, y),
            count,
        }
    }
}

/// Where the opponent builds and what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentSetup {
    /// Base anchor in world units.
    pub anchor: (i32, i32),
    /// Build order; empty uses the built-in plan.
    #[serde(default)]
    pub blueprint: Vec<BlueprintStep>,
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Simulation config; omitted fields keep their defaults.
    pub config: SimConfig,
    /// Opponent base; `None` puts it in the far corner.
    pub opponent: Option<OpponentSetup>,
    /// Starting buildings, placed in order.
    pub buildings: Vec<BuildingPlacement>,
    /// Starting units.
    pub units: Vec<UnitPlacement>,
    /// Tree positions.
    pub trees: Vec<(i32, i32)>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            description: String::new(),
            config: SimConfig::default(),
            opponent: None,
            buildings: Vec::new(),
            units: Vec::new(),
            trees: Vec::new(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A young village facing the opponent across the map.
    #[must_use]
    pub fn village() -> Self {
        let trees = (0..6)
            .flat_map(|i| [(230, 300 + i * 32), (262, 316 + i * 32)])
            .collect();
        Self {
            name: "Village".to_string(),
            description: "Town center, farm and lumber mill with a tree line to the west".to_string(),
            config: SimConfig::default(),
            opponent: None,
            buildings: vec![
                BuildingPlacement::new(Owner::Player, BuildingKind::TownCenter, 400, 400),
                BuildingPlacement::new(Owner::Player, BuildingKind::Farm, 480, 400),
                BuildingPlacement::new(Owner::Player, BuildingKind::LumberMill, 320, 400),
                BuildingPlacement::new(Owner::Player, BuildingKind::House, 400, 480),
            ],
            units: vec![
                UnitPlacement::new(Owner::Player, UnitKind::Villager, 360, 452, 3),
                UnitPlacement::new(Owner::Player, UnitKind::Soldier, 500, 500, 2),
                UnitPlacement::new(Owner::Neutral, UnitKind::Deer, 900, 700, 3),
            ],
            trees,
        }
    }

    /// Build the opening simulation, optionally overriding the seed.
    pub fn build(&self, seed: Option<u64>) -> Result<Simulation, ScenarioError> {
        let mut config = self.config.clone();
        if let Some(seed) = seed {
            config.seed = seed;
        }
        config.validate()?;

        let mut sim = match &self.opponent {
            None => Simulation::new(config)?,
            Some(setup) => {
                let blueprint = if setup.blueprint.is_empty() {
                    default_blueprint()
                } else {
                    setup.blueprint.clone()
                };
                let anchor = Vec2Fixed::from_ints(setup.anchor.0, setup.anchor.1);
                Simulation::with_opponent(config, anchor, blueprint)?
            }
        };

        for placement in &self.buildings {
            let (x, y) = placement.position;
            sim.spawn_building(placement.owner, placement.kind, Vec2Fixed::from_ints(x, y))?;
        }
        for &(x, y) in &self.trees {
            sim.spawn_tree(Vec2Fixed::from_ints(x, y))?;
        }
        for placement in &self.units {
            let (x, y) = placement.position;
            for i in 0..placement.count {
                let offset = i32::try_from(i).unwrap_or(i32::MAX).saturating_mul(UNIT_ROW_SPACING);
                sim.spawn_unit(placement.owner, placement.kind, Vec2Fixed::from_ints(x.saturating_add(offset), y))?;
            }
        }

        info!(
            scenario = %self.name,
            seed = sim.world().config.seed,
            buildings = sim.world().buildings.len(),
            units = sim.world().units.len(),
            trees = sim.world().trees.len(),
            "Scenario loaded"
        );
        Ok(sim)
    }
}
