//! Unit data structures for data-driven unit definitions.

use serde::{Deserialize, Serialize};

use crate::components::{Resources, UnitKind};
use crate::error::{GameError, Result};
use crate::math::{fixed_decimal_serde, Fixed};

/// Stats shared by every unit of one kind.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     speed: 1.4,
///     health: 40,
///     damage: 10,
///     range: 96.0,
///     attack_cooldown: 40,
///     squad_size: 5,
///     ranged: true,
///     cost: (wood: 30, gold: 25),
///     train_ticks: 140,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitData {
    /// Distance covered per tick.
    #[serde(with = "fixed_decimal_serde")]
    pub speed: Fixed,

    /// Maximum health points.
    pub health: i32,

    /// Damage per attack (split across volleys for ranged units).
    #[serde(default)]
    pub damage: i32,

    /// Attack range in world units.
    #[serde(default, with = "fixed_decimal_serde")]
    pub range: Fixed,

    /// Ticks between attacks.
    #[serde(default)]
    pub attack_cooldown: u32,

    /// Number of archers the unit represents; caps the volley count.
    #[serde(default = "default_squad_size")]
    pub squad_size: u32,

    /// Whether attacks are delivered as delayed volleys.
    #[serde(default)]
    pub ranged: bool,

    /// Training cost.
    #[serde(default)]
    pub cost: Resources,

    /// Training time in ticks.
    #[serde(default)]
    pub train_ticks: u32,
}

const fn default_squad_size() -> u32 {
    1
}

impl UnitData {
    /// Whether the unit deals damage at all.
    #[must_use]
    pub const fn is_combatant(&self) -> bool {
        self.damage > 0
    }
}

/// Per-kind unit definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitDefs {
    /// Worker.
    pub villager: UnitData,
    /// Melee infantry.
    pub soldier: UnitData,
    /// Ranged squad.
    pub archer: UnitData,
    /// Wildlife.
    pub deer: UnitData,
}

impl UnitDefs {
    /// Definition for a kind.
    #[must_use]
    pub const fn get(&self, kind: UnitKind) -> &UnitData {
        match kind {
            UnitKind::Villager => &self.villager,
            UnitKind::Soldier => &self.soldier,
            UnitKind::Archer => &self.archer,
            UnitKind::Deer => &self.deer,
        }
    }

    /// Parse definitions from RON; omitted kinds keep their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError {
            what: "unit definitions".to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for UnitDefs {
    fn default() -> Self {
        Self {
            villager: UnitData {
                speed: Fixed::from_num(1.5),
                health: 25,
                damage: 3,
                range: Fixed::from_num(12),
                attack_cooldown: 20,
                squad_size: 1,
                ranged: false,
                cost: Resources::food(30),
                train_ticks: 100,
            },
            soldier: UnitData {
                speed: Fixed::from_num(1.6),
                health: 60,
                damage: 8,
                range: Fixed::from_num(14),
                attack_cooldown: 20,
                squad_size: 1,
                ranged: false,
                cost: Resources::new(0, 40, 20),
                train_ticks: 120,
            },
            archer: UnitData {
                speed: Fixed::from_num(1.4),
                health: 40,
                damage: 10,
                range: Fixed::from_num(96),
                attack_cooldown: 40,
                squad_size: 5,
                ranged: true,
                cost: Resources::new(30, 0, 25),
                train_ticks: 140,
            },
            deer: UnitData {
                speed: Fixed::ONE,
                health: 15,
                damage: 0,
                range: Fixed::ZERO,
                attack_cooldown: 0,
                squad_size: 1,
                ranged: false,
                cost: Resources::ZERO,
                train_ticks: 0,
            },
        }
    }
}
