//! Command surface shared by the player's UI and the opponent controller.
//!
//! Commands are queued and applied at the start of the next tick, in the
//! order they were issued. A rejected command changes nothing; the reason
//! is logged at `debug` and reported in [`TickEvents::rejected`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buildings::{self, PlacementError};
use crate::components::{BuildingKind, EntityId, Owner, UnitKind};
use crate::economy;
use crate::error::{GameError, Result};
use crate::events::{self, RejectedCommand, TickEvents};
use crate::math::Vec2Fixed;
use crate::units;
use crate::world::WorldState;

/// Everything a side can ask the simulation to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Arm a building kind for placement.
    RequestBuild {
        /// Kind to place.
        kind: BuildingKind,
    },
    /// Place the armed building.
    PlaceBuilding {
        /// Center of the footprint.
        position: Vec2Fixed,
    },
    /// Disarm placement.
    CancelPlacement,
    /// Place a building directly, without the preview step.
    Build {
        /// Kind to place.
        kind: BuildingKind,
        /// Center of the footprint.
        position: Vec2Fixed,
    },
    /// Queue a unit at a building.
    Train {
        /// Training building.
        building: EntityId,
        /// Unit to train.
        kind: UnitKind,
    },
    /// Move a group in formation.
    Move {
        /// Units to move.
        units: Vec<EntityId>,
        /// Formation center.
        target: Vec2Fixed,
    },
    /// Engage a unit or building.
    Attack {
        /// Attackers.
        units: Vec<EntityId>,
        /// Target entity.
        target: EntityId,
    },
    /// Switch demolish mode.
    ToggleDemolish {
        /// Desired state.
        active: bool,
    },
    /// Demolish the building under a point.
    DemolishAt {
        /// Point inside the footprint.
        position: Vec2Fixed,
    },
    /// Switch permanent peace.
    SetPeacefulMode {
        /// Desired state.
        enabled: bool,
    },
    /// Set the treaty length measured from match start.
    SetTreatyLength {
        /// Treaty length in seconds.
        seconds: u32,
    },
    /// Switch the opponent controller off or on.
    SetAiDisabled {
        /// Desired state.
        disabled: bool,
    },
    /// Replace the unit selection.
    Select {
        /// Units to select.
        units: Vec<EntityId>,
    },
    /// Inspect a building, or clear the inspection.
    SelectBuilding {
        /// Building to inspect.
        building: Option<EntityId>,
    },
}

impl Command {
    /// Commands only the human side may issue.
    #[must_use]
    pub const fn is_player_only(&self) -> bool {
        matches!(
            self,
            Self::RequestBuild { .. }
                | Self::PlaceBuilding { .. }
                | Self::CancelPlacement
                | Self::ToggleDemolish { .. }
                | Self::DemolishAt { .. }
                | Self::SetPeacefulMode { .. }
                | Self::SetTreatyLength { .. }
                | Self::SetAiDisabled { .. }
                | Self::Select { .. }
                | Self::SelectBuilding { .. }
        )
    }
}

/// A command tagged with the side that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCommand {
    /// Issuing side.
    pub issuer: Owner,
    /// The command.
    pub command: Command,
}

impl IssuedCommand {
    /// Command from the human player.
    #[must_use]
    pub const fn player(command: Command) -> Self {
        Self {
            issuer: Owner::Player,
            command,
        }
    }

    /// Command from the opponent controller.
    #[must_use]
    pub const fn opponent(command: Command) -> Self {
        Self {
            issuer: Owner::Opponent,
            command,
        }
    }
}

/// FIFO of commands waiting for the next tick.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: VecDeque<IssuedCommand>,
}

impl CommandQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn push(&mut self, command: IssuedCommand) {
        self.pending.push_back(command);
    }

    /// Take every pending command in issue order.
    pub fn drain(&mut self) -> Vec<IssuedCommand> {
        self.pending.drain(..).collect()
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn placement_failed(err: PlacementError) -> GameError {
    GameError::InvalidState(format!("placement rejected: {err}"))
}

/// Execute one command.
///
/// # Errors
///
/// The reason the command was rejected. Nothing is mutated in that case.
pub fn execute(world: &mut WorldState, issued: &IssuedCommand, events: &mut TickEvents) -> Result<()> {
    let issuer = issued.issuer;
    if issued.command.is_player_only() && issuer != Owner::Player {
        return Err(GameError::InvalidState(format!("{issuer:?} may not issue this command")));
    }

    match &issued.command {
        Command::RequestBuild { kind } => world.pending_placement = Some(*kind),
        Command::PlaceBuilding { position } => {
            let kind = world
                .pending_placement
                .ok_or_else(|| GameError::InvalidState("no building armed for placement".into()))?;
            buildings::try_build(world, issuer, kind, *position, events).map_err(placement_failed)?;
            world.pending_placement = None;
        }
        Command::CancelPlacement => world.pending_placement = None,
        Command::Build { kind, position } => {
            buildings::try_build(world, issuer, *kind, *position, events).map_err(placement_failed)?;
        }
        Command::Train { building, kind } => economy::queue_training(world, issuer, *building, *kind)?,
        Command::Move { units: ids, target } => {
            if units::command_move(world, issuer, ids, *target) == 0 && !ids.is_empty() {
                return Err(GameError::InvalidState("no unit could move there".into()));
            }
        }
        Command::Attack { units: ids, target } => {
            units::command_attack(world, issuer, ids, *target)?;
        }
        Command::ToggleDemolish { active } => buildings::set_demolish_mode(world, *active),
        Command::DemolishAt { position } => {
            buildings::demolish_at(world, *position, events)?;
        }
        Command::SetPeacefulMode { enabled } => world.policy.peaceful_mode = *enabled,
        Command::SetTreatyLength { seconds } => world.policy.treaty_secs = *seconds,
        Command::SetAiDisabled { disabled } => world.policy.ai_disabled = *disabled,
        Command::Select { units: ids } => {
            for id in world.units.sorted_ids() {
                if let Some(unit) = world.units.get_mut(id) {
                    unit.selected = unit.owner == Owner::Player && ids.contains(&id);
                }
            }
            events.ui.push(events::selection_changed(world));
        }
        Command::SelectBuilding { building } => {
            world.selected_building = building.filter(|id| world.buildings.contains(*id));
            events.ui.push(events::building_selected(world));
        }
    }
    Ok(())
}

/// Execute one command, absorbing a rejection into the tick's events.
pub fn apply(world: &mut WorldState, issued: &IssuedCommand, events: &mut TickEvents) {
    if let Err(err) = execute(world, issued, events) {
        debug!(issuer = ?issued.issuer, command = ?issued.command, %err, "command rejected");
        events.rejected.push(RejectedCommand {
            issuer: issued.issuer,
            reason: err.to_string(),
        });
    }
}

/// Ghost shown under the cursor while a building is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPreview {
    /// Armed kind.
    pub kind: BuildingKind,
    /// Footprint center.
    pub position: Vec2Fixed,
    /// Why placing here would fail, if it would.
    pub blocked_by: Option<PlacementError>,
}

impl PlacementPreview {
    /// Whether placing here would succeed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.blocked_by.is_none()
    }
}

/// Preview the armed building at a point. `None` when nothing is armed.
#[must_use]
pub fn placement_preview(world: &WorldState, position: Vec2Fixed) -> Option<PlacementPreview> {
    let kind = world.pending_placement?;
    Some(PlacementPreview {
        kind,
        position,
        blocked_by: buildings::check_placement(world, Owner::Player, kind, position).err(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitState;
    use crate::config::SimConfig;
    use crate::factory;

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn world_with_hub() -> WorldState {
        let mut world = WorldState::new(SimConfig::default()).unwrap();
        buildings::construct(
            &mut world,
            Owner::Player,
            BuildingKind::TownCenter,
            vec2(400, 400),
            &mut TickEvents::default(),
        );
        world
    }

    #[test]
    fn test_queue_preserves_issue_order() {
        let mut queue = CommandQueue::new();
        queue.push(IssuedCommand::player(Command::CancelPlacement));
        queue.push(IssuedCommand::opponent(Command::SetAiDisabled { disabled: true }));
        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert_eq!(drained[0].issuer, Owner::Player);
        assert_eq!(drained[1].issuer, Owner::Opponent);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_placement_stays_armed_until_success() {
        let mut world = world_with_hub();
        let mut events = TickEvents::default();
        apply(&mut world, &IssuedCommand::player(Command::RequestBuild { kind: BuildingKind::House }), &mut events);

        let preview = placement_preview(&world, vec2(405, 405)).unwrap();
        assert!(!preview.is_valid());
        apply(&mut world, &IssuedCommand::player(Command::PlaceBuilding { position: vec2(405, 405) }), &mut events);
        assert_eq!(events.rejected.len(), 1);
        assert_eq!(world.pending_placement, Some(BuildingKind::House));

        assert!(placement_preview(&world, vec2(420, 420)).unwrap().is_valid());
        apply(&mut world, &IssuedCommand::player(Command::PlaceBuilding { position: vec2(420, 420) }), &mut events);
        assert_eq!(world.pending_placement, None);
        assert_eq!(events.buildings_constructed.len(), 1);
        assert!(placement_preview(&world, vec2(420, 420)).is_none());
    }

    #[test]
    fn test_cancel_placement() {
        let mut world = world_with_hub();
        let mut events = TickEvents::default();
        apply(&mut world, &IssuedCommand::player(Command::RequestBuild { kind: BuildingKind::Farm }), &mut events);
        apply(&mut world, &IssuedCommand::player(Command::CancelPlacement), &mut events);
        apply(&mut world, &IssuedCommand::player(Command::PlaceBuilding { position: vec2(460, 400) }), &mut events);
        assert_eq!(events.rejected.len(), 1);
    }

    #[test]
    fn test_opponent_cannot_flip_policy() {
        let mut world = world_with_hub();
        let mut events = TickEvents::default();
        apply(&mut world, &IssuedCommand::opponent(Command::SetPeacefulMode { enabled: true }), &mut events);
        assert!(!world.policy.peaceful_mode);
        assert_eq!(events.rejected[0].issuer, Owner::Opponent);
    }

    #[test]
    fn test_select_emits_counts_and_ignores_foreign_units() {
        let mut world = world_with_hub();
        let mine = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(500, 500));
        let theirs = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(900, 900));
        let mut events = TickEvents::default();
        apply(&mut world, &IssuedCommand::player(Command::Select { units: vec![mine, theirs] }), &mut events);

        assert!(world.units.get(mine).unwrap().selected);
        assert!(!world.units.get(theirs).unwrap().selected);
        let events::UiEvent::SelectionChanged { count, .. } = &events.ui[0] else {
            panic!("expected a selection event");
        };
        assert_eq!(*count, 1);
    }

    #[test]
    fn test_select_missing_building_clears() {
        let mut world = world_with_hub();
        let mut events = TickEvents::default();
        apply(&mut world, &IssuedCommand::player(Command::SelectBuilding { building: Some(999) }), &mut events);
        assert_eq!(world.selected_building, None);
        assert_eq!(events.ui, vec![events::UiEvent::BuildingSelected { kind: None }]);
    }

    #[test]
    fn test_attack_under_peace_is_rejected_without_change() {
        let mut world = world_with_hub();
        let soldier = factory::spawn_unit(&mut world, Owner::Player, UnitKind::Soldier, vec2(500, 500));
        let enemy = factory::spawn_unit(&mut world, Owner::Opponent, UnitKind::Soldier, vec2(600, 500));
        let mut events = TickEvents::default();
        apply(&mut world, &IssuedCommand::player(Command::SetPeacefulMode { enabled: true }), &mut events);
        apply(
            &mut world,
            &IssuedCommand::player(Command::Attack {
                units: vec![soldier],
                target: enemy,
            }),
            &mut events,
        );
        let unit = world.units.get(soldier).unwrap();
        assert_eq!(unit.state, UnitState::Idle);
        assert_eq!(unit.target, None);
        assert_eq!(events.rejected.len(), 1);
    }
}
