//! JSON protocol for interactive sessions.
//!
//! One JSON object per line in each direction:
//!
//! **Input (stdin):** requests from the controller
//! **Output (stdout):** responses from the runner
//!
//! Requests that mirror the player's command surface are queued and take
//! effect on the next tick. Control requests (`tick`, `stats`, `preview`,
//! `hash`, `quit`) are answered immediately.
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"request_build","kind":"House"}
//! <- {"type":"queued","cmd":"request_build"}
//! -> {"cmd":"place_building","x":420,"y":420}
//! <- {"type":"queued","cmd":"place_building"}
//! -> {"cmd":"tick","count":20}
//! <- {"type":"ticked","tick":20,"events":{...}}
//! -> {"cmd":"stats"}
//! <- {"type":"stats","stats":{"tick":20,"population":0,...}}
//! ```

use hearth_core::buildings::PlacementError;
use hearth_core::commands::{Command, PlacementPreview};
use hearth_core::components::{BuildingKind, EntityId, UnitKind};
use hearth_core::events::{StatsSnapshot, TickEvents};
use hearth_core::math::Vec2Fixed;
use serde::{Deserialize, Serialize};

/// Protocol version reported in the ready line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Requests (Controller -> Runner)
// ============================================================================

/// Requests accepted on stdin.
///
/// Coordinates are whole world units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    /// Advance the simulation by `count` ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },
    /// Report the settlement overview without advancing time.
    Stats,
    /// Report validity of the armed building at a point.
    Preview { x: i32, y: i32 },
    /// Report the state hash.
    Hash,
    /// End the session.
    Quit,

    /// Arm a building kind for placement.
    RequestBuild { kind: BuildingKind },
    /// Place the armed building.
    PlaceBuilding { x: i32, y: i32 },
    /// Disarm placement.
    CancelPlacement,
    /// Queue a unit at a building.
    Train { building: EntityId, kind: UnitKind },
    /// Move units in formation.
    Move { units: Vec<EntityId>, x: i32, y: i32 },
    /// Order units to engage a target.
    Attack { units: Vec<EntityId>, target: EntityId },
    /// Switch demolish mode.
    ToggleDemolish { active: bool },
    /// Demolish the building under a point.
    DemolishAt { x: i32, y: i32 },
    /// Switch permanent peace.
    SetPeacefulMode { enabled: bool },
    /// Set the treaty length in seconds.
    SetTreatyLength { seconds: u32 },
    /// Switch the opponent off or on.
    SetAiDisabled { disabled: bool },
    /// Replace the unit selection.
    Select { units: Vec<EntityId> },
    /// Inspect a building, or clear the inspection with `null`.
    SelectBuilding {
        #[serde(default)]
        building: Option<EntityId>,
    },
}

fn default_tick_count() -> u32 {
    1
}

impl Request {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Request name for acknowledgment.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Stats => "stats",
            Self::Preview { .. } => "preview",
            Self::Hash => "hash",
            Self::Quit => "quit",
            Self::RequestBuild { .. } => "request_build",
            Self::PlaceBuilding { .. } => "place_building",
            Self::CancelPlacement => "cancel_placement",
            Self::Train { .. } => "train",
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::ToggleDemolish { .. } => "toggle_demolish",
            Self::DemolishAt { .. } => "demolish_at",
            Self::SetPeacefulMode { .. } => "set_peaceful_mode",
            Self::SetTreatyLength { .. } => "set_treaty_length",
            Self::SetAiDisabled { .. } => "set_ai_disabled",
            Self::Select { .. } => "select",
            Self::SelectBuilding { .. } => "select_building",
        }
    }

    /// The simulation command this request queues, or `None` for control
    /// requests the runner answers itself.
    #[must_use]
    pub fn to_command(&self) -> Option<Command> {
        let at = |x: i32, y: i32| Vec2Fixed::from_ints(x, y);
        let command = match self {
            Self::Tick { .. } | Self::Stats | Self::Preview { .. } | Self::Hash | Self::Quit => return None,
            Self::RequestBuild { kind } => Command::RequestBuild { kind: *kind },
            Self::PlaceBuilding { x, y } => Command::PlaceBuilding { position: at(*x, *y) },
            Self::CancelPlacement => Command::CancelPlacement,
            Self::Train { building, kind } => Command::Train {
                building: *building,
                kind: *kind,
            },
            Self::Move { units, x, y } => Command::Move {
                units: units.clone(),
                target: at(*x, *y),
            },
            Self::Attack { units, target } => Command::Attack {
                units: units.clone(),
                target: *target,
            },
            Self::ToggleDemolish { active } => Command::ToggleDemolish { active: *active },
            Self::DemolishAt { x, y } => Command::DemolishAt { position: at(*x, *y) },
            Self::SetPeacefulMode { enabled } => Command::SetPeacefulMode { enabled: *enabled },
            Self::SetTreatyLength { seconds } => Command::SetTreatyLength { seconds: *seconds },
            Self::SetAiDisabled { disabled } => Command::SetAiDisabled { disabled: *disabled },
            Self::Select { units } => Command::Select { units: units.clone() },
            Self::SelectBuilding { building } => Command::SelectBuilding { building: *building },
        };
        Some(command)
    }
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses written to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept requests.
    Ready { version: String, tick: u64 },
    /// A command was queued for the next tick.
    Queued { cmd: String },
    /// Ticks were simulated; events are merged across them.
    Ticked { tick: u64, events: TickEvents },
    /// Settlement overview.
    Stats { stats: StatsSnapshot },
    /// Placement ghost state.
    Preview {
        /// Armed kind, `None` when nothing is armed.
        kind: Option<BuildingKind>,
        /// Whether placing here would succeed.
        valid: bool,
        /// Why placement would fail.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// State hash for determinism checks.
    StateHash { tick: u64, hash: u64 },
    /// A request could not be parsed or served.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },
    /// Goodbye message before shutdown.
    Bye,
}

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create a queued acknowledgment.
    #[must_use]
    pub fn queued(cmd: &str) -> Self {
        Self::Queued { cmd: cmd.to_string() }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Describe a placement preview; `None` means nothing is armed.
    #[must_use]
    pub fn preview(preview: Option<&PlacementPreview>) -> Self {
        match preview {
            None => Self::Preview {
                kind: None,
                valid: false,
                reason: None,
            },
            Some(preview) => Self::Preview {
                kind: Some(preview.kind),
                valid: preview.is_valid(),
                reason: preview.blocked_by.as_ref().map(PlacementError::to_string),
            },
        }
    }

    /// Serialize to a JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#));
        json.push('\n');
        json
    }
}

/// Fold the events of several ticks into one report.
pub fn merge_events(into: &mut TickEvents, from: TickEvents) {
    into.damage.extend(from.damage);
    into.unit_deaths.extend(from.unit_deaths);
    into.buildings_destroyed.extend(from.buildings_destroyed);
    into.units_spawned.extend(from.units_spawned);
    into.buildings_constructed.extend(from.buildings_constructed);
    into.trees_felled.extend(from.trees_felled);
    into.volleys_launched += from.volleys_launched;
    into.ui.extend(from.ui);
    into.rejected.extend(from.rejected);
}
