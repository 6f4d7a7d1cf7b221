//! Building data structures for data-driven building definitions.

use serde::{Deserialize, Serialize};

use crate::components::{BuildingKind, Resources, UnitKind};
use crate::error::{GameError, Result};
use crate::math::{fixed_decimal_serde, Fixed, Vec2Fixed};

/// Stats shared by every building of one kind.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     cost: (wood: 60),
///     width: 24.0,
///     height: 24.0,
///     health: 200,
///     effect_radius: Some(120.0),
///     requires_worker: true,
///     harvests_trees: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingData {
    /// Construction cost.
    #[serde(default)]
    pub cost: Resources,

    /// Footprint width in world units.
    #[serde(with = "fixed_decimal_serde")]
    pub width: Fixed,

    /// Footprint height in world units.
    #[serde(with = "fixed_decimal_serde")]
    pub height: Fixed,

    /// Maximum structure points.
    pub health: i32,

    /// Radius within which new construction is allowed.
    #[serde(default, with = "option_fixed_decimal_serde")]
    pub territory_radius: Option<Fixed>,

    /// Radius sampled by production logic.
    #[serde(default, with = "option_fixed_decimal_serde")]
    pub effect_radius: Option<Fixed>,

    /// Whether output depends on a working villager.
    #[serde(default)]
    pub requires_worker: bool,

    /// Fixed output per production cycle.
    #[serde(default)]
    pub produces: Resources,

    /// Wood output scales with unfelled trees in the effect radius.
    #[serde(default)]
    pub harvests_trees: bool,

    /// Added to the population cap while standing.
    #[serde(default)]
    pub population_bonus: u32,

    /// Added to happiness on construction, removed on destruction.
    #[serde(default)]
    pub happiness_bonus: i32,

    /// Units this building can train.
    #[serde(default)]
    pub trains: Vec<UnitKind>,
}

/// Serde support for optional decimal fixed-point values.
mod option_fixed_decimal_serde {
    use crate::math::Fixed;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize an optional fixed-point number as a decimal.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&v.to_num::<f64>()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<f64>::deserialize(deserializer)?
            .map(|v| {
                Fixed::checked_from_num(v)
                    .ok_or_else(|| serde::de::Error::custom(format!("{v} is out of fixed-point range")))
            })
            .transpose()
    }
}

impl BuildingData {
    /// Half the footprint extents.
    #[must_use]
    pub fn half_extents(&self) -> Vec2Fixed {
        Vec2Fixed::new(self.width / 2, self.height / 2)
    }

    /// Check if this building can train the specified unit.
    #[must_use]
    pub fn can_train(&self, kind: UnitKind) -> bool {
        self.trains.contains(&kind)
    }
}

/// Per-kind building definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingDefs {
    /// Settlement hub.
    pub town_center: BuildingData,
    /// Housing.
    pub house: BuildingData,
    /// Food producer.
    pub farm: BuildingData,
    /// Wood producer.
    pub lumber_mill: BuildingData,
    /// Military trainer.
    pub barracks: BuildingData,
    /// Happiness building.
    pub chapel: BuildingData,
}

impl BuildingDefs {
    /// Definition for a kind.
    #[must_use]
    pub const fn get(&self, kind: BuildingKind) -> &BuildingData {
        match kind {
            BuildingKind::TownCenter => &self.town_center,
            BuildingKind::House => &self.house,
            BuildingKind::Farm => &self.farm,
            BuildingKind::LumberMill => &self.lumber_mill,
            BuildingKind::Barracks => &self.barracks,
            BuildingKind::Chapel => &self.chapel,
        }
    }

    /// Parse definitions from RON; omitted kinds keep their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError {
            what: "building definitions".to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for BuildingDefs {
    fn default() -> Self {
        let plain = |cost: Resources, size: i32, health: i32| BuildingData {
            cost,
            width: Fixed::from_num(size),
            height: Fixed::from_num(size),
            health,
            territory_radius: None,
            effect_radius: None,
            requires_worker: false,
            produces: Resources::ZERO,
            harvests_trees: false,
            population_bonus: 0,
            happiness_bonus: 0,
            trains: Vec::new(),
        };

        Self {
            town_center: BuildingData {
                territory_radius: Some(Fixed::from_num(220)),
                produces: Resources::gold(1),
                population_bonus: 5,
                trains: vec![UnitKind::Villager],
                ..plain(Resources::new(200, 0, 50), 24, 600)
            },
            house: BuildingData {
                population_bonus: 4,
                ..plain(Resources::wood(50), 16, 150)
            },
            farm: BuildingData {
                requires_worker: true,
                produces: Resources::food(3),
                ..plain(Resources::wood(40), 32, 120)
            },
            lumber_mill: BuildingData {
                effect_radius: Some(Fixed::from_num(120)),
                requires_worker: true,
                harvests_trees: true,
                ..plain(Resources::wood(60), 24, 200)
            },
            barracks: BuildingData {
                trains: vec![UnitKind::Soldier, UnitKind::Archer],
                ..plain(Resources::new(100, 0, 20), 32, 400)
            },
            chapel: BuildingData {
                territory_radius: Some(Fixed::from_num(120)),
                happiness_bonus: 10,
                ..plain(Resources::new(80, 0, 30), 24, 250)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_house_costs_fifty_wood() {
        let defs = BuildingDefs::default();
        assert_eq!(defs.get(BuildingKind::House).cost, Resources::wood(50));
    }

    #[test]
    fn test_can_train() {
        let defs = BuildingDefs::default();
        assert!(defs.get(BuildingKind::Barracks).can_train(UnitKind::Archer));
        assert!(defs.get(BuildingKind::TownCenter).can_train(UnitKind::Villager));
        assert!(!defs.get(BuildingKind::House).can_train(UnitKind::Villager));
    }

    #[test]
    fn test_ron_override_with_optional_radius() {
        let defs = BuildingDefs::from_ron_str(
            "(house: (width: 16.0, height: 16.0, health: 90, territory_radius: Some(64.0)))",
        )
        .expect("valid RON");
        assert_eq!(defs.house.territory_radius, Some(Fixed::from_num(64)));
        assert_eq!(defs.house.health, 90);
        assert_eq!(defs.house.cost, Resources::ZERO);
        assert_eq!(defs.farm, BuildingDefs::default().farm);
    }
}
