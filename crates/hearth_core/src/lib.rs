//! # Hearth Core
//!
//! Deterministic simulation core for a small isometric settlement
//! strategy game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO (configuration is parsed from strings)
//! - No system randomness (one seeded `ChaCha8Rng` per world)
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`grid`], [`spatial`], [`pathfinding`] - Occupancy grid, spatial hash and A*
//! - [`factory`] - Entity construction
//! - [`economy`] - Jobs, production, growth and training
//! - [`units`], [`formation`], [`combat`] - Unit behavior and fighting
//! - [`buildings`] - Placement, construction and demolition
//! - [`ai`] - Scripted opponent
//! - [`commands`], [`events`] - Inbound commands and outbound state
//! - [`simulation`] - Core simulation loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod buildings;
pub mod combat;
pub mod commands;
pub mod components;
pub mod config;
pub mod data;
pub mod economy;
pub mod error;
pub mod events;
pub mod factory;
pub mod formation;
pub mod grid;
pub mod math;
pub mod pathfinding;
pub mod simulation;
pub mod spatial;
pub mod units;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buildings::PlacementError;
    pub use crate::commands::{Command, IssuedCommand};
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::error::{GameError, Result};
    pub use crate::events::{StatsSnapshot, TickEvents, UiEvent};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::Simulation;
    pub use crate::world::WorldState;
}
