//! Data-driven unit and building definitions.
//!
//! Built-in defaults make a playable settlement; RON overrides may
//! replace any subset of kinds.
//!
//! **Note:** This module contains no IO - it only parses strings.
//! File loading is handled by `hearth_headless`.

mod building_data;
mod unit_data;

pub use building_data::{BuildingData, BuildingDefs};
pub use unit_data::{UnitData, UnitDefs};
