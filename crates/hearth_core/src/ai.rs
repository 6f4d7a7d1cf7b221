//! Scripted opponent.
//!
//! Runs once per simulated second and acts only through [`Command`]s, the
//! same surface the player uses. Its pool is separate from the player's
//! settlement and is fed by a flat income plus the output of its buildings.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buildings;
use crate::commands::{Command, IssuedCommand};
use crate::components::{BuildingKind, EntityId, Owner, UnitKind, UnitState};
use crate::math::Vec2Fixed;
use crate::world::WorldState;

/// One building of the opponent's base plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintStep {
    /// Building to place.
    pub kind: BuildingKind,
    /// Offset from the base anchor, in world units.
    pub offset: (i32, i32),
}

impl BlueprintStep {
    const fn new(kind: BuildingKind, x: i32, y: i32) -> Self {
        Self { kind, offset: (x, y) }
    }
}

/// Base plan used when a scenario does not supply one.
#[must_use]
pub fn default_blueprint() -> Vec<BlueprintStep> {
    vec![
        BlueprintStep::new(BuildingKind::TownCenter, 0, 0),
        BlueprintStep::new(BuildingKind::House, 40, 0),
        BlueprintStep::new(BuildingKind::Barracks, 0, 60),
        BlueprintStep::new(BuildingKind::Farm, -60, 0),
        BlueprintStep::new(BuildingKind::House, 40, 40),
        BlueprintStep::new(BuildingKind::Barracks, 60, 90),
    ]
}

/// State of the scripted opponent.
#[derive(Debug, Clone)]
pub struct OpponentController {
    blueprint: Vec<BlueprintStep>,
    anchor: Vec2Fixed,
    next_recruit: UnitKind,
    waves_launched: u32,
}

impl OpponentController {
    /// Controller building `blueprint` around `anchor`.
    #[must_use]
    pub fn new(anchor: Vec2Fixed, blueprint: Vec<BlueprintStep>) -> Self {
        Self {
            blueprint,
            anchor,
            next_recruit: UnitKind::Soldier,
            waves_launched: 0,
        }
    }

    /// Base anchor.
    #[must_use]
    pub const fn anchor(&self) -> Vec2Fixed {
        self.anchor
    }

    /// Attack waves sent so far.
    #[must_use]
    pub const fn waves_launched(&self) -> u32 {
        self.waves_launched
    }

    /// World position of a blueprint step.
    #[must_use]
    pub fn step_position(&self, step: &BlueprintStep) -> Vec2Fixed {
        self.anchor + Vec2Fixed::from_ints(step.offset.0, step.offset.1)
    }

    /// Whether a step's building stands.
    fn step_built(&self, world: &WorldState, step: &BlueprintStep) -> bool {
        buildings::building_at(world, self.step_position(step))
            .and_then(|id| world.buildings.get(id))
            .is_some_and(|b| b.owner == Owner::Opponent && b.kind == step.kind)
    }

    /// First blueprint step that does not stand yet.
    #[must_use]
    pub fn pending_step(&self, world: &WorldState) -> Option<BlueprintStep> {
        self.blueprint.iter().copied().find(|step| !self.step_built(world, step))
    }

    /// One controller decision round.
    ///
    /// Credits income, then returns the commands for this round; they
    /// run at the start of the next tick.
    pub fn tick(&mut self, world: &mut WorldState) -> Vec<IssuedCommand> {
        collect_income(world);

        let mut orders = Vec::new();
        if let Some(order) = self.build_order(world) {
            orders.push(order);
        }
        if let Some(order) = self.recruit_order(world) {
            orders.push(order);
        }
        if let Some(order) = self.attack_order(world) {
            orders.push(order);
        }
        orders
    }

    fn build_order(&self, world: &WorldState) -> Option<IssuedCommand> {
        let step = self.pending_step(world)?;
        let cost = world.building_def(step.kind).cost;
        if !world.pools.opponent.can_afford(&cost) {
            return None;
        }
        Some(IssuedCommand::opponent(Command::Build {
            kind: step.kind,
            position: self.step_position(&step),
        }))
    }

    fn recruit_order(&mut self, world: &WorldState) -> Option<IssuedCommand> {
        let barracks = world
            .buildings
            .iter_sorted()
            .filter(|b| b.owner == Owner::Opponent && world.building_def(b.kind).can_train(self.next_recruit))
            .min_by_key(|b| b.training.len())?;
        if barracks.training.len() >= world.config.training_queue_limit {
            return None;
        }

        let queued: usize = world
            .buildings
            .values()
            .filter(|b| b.owner == Owner::Opponent)
            .map(|b| b.training.iter().filter(|o| o.kind.is_military()).count())
            .sum();
        if army(world).len() + queued >= world.config.ai_max_army as usize {
            return None;
        }

        let kind = self.next_recruit;
        if !world.pools.opponent.can_afford(&world.unit_def(kind).cost) {
            return None;
        }
        self.next_recruit = match kind {
            UnitKind::Soldier => UnitKind::Archer,
            _ => UnitKind::Soldier,
        };
        Some(IssuedCommand::opponent(Command::Train {
            building: barracks.id,
            kind,
        }))
    }

    fn attack_order(&mut self, world: &WorldState) -> Option<IssuedCommand> {
        if world.peace_active() {
            return None;
        }
        let standing: Vec<EntityId> = army(world)
            .into_iter()
            .filter(|id| world.units.get(*id).is_some_and(|u| u.state == UnitState::Idle))
            .collect();
        if standing.len() <= world.config.ai_attack_threshold as usize {
            return None;
        }
        let target = self.pick_target(world)?;
        self.waves_launched += 1;
        info!(
            wave = self.waves_launched,
            size = standing.len(),
            target,
            "opponent attack wave"
        );
        Some(IssuedCommand::opponent(Command::Attack { units: standing, target }))
    }

    /// Player's primary hub, else the player entity nearest the base.
    fn pick_target(&self, world: &WorldState) -> Option<EntityId> {
        if let Some(hub) = world.hubs(Owner::Player).first() {
            return Some(hub.id);
        }
        let units = world
            .units
            .values()
            .filter(|u| u.owner == Owner::Player)
            .map(|u| (u.position.distance_squared(self.anchor), u.id));
        let structures = world
            .buildings
            .values()
            .filter(|b| b.owner == Owner::Player)
            .map(|b| (b.position.distance_squared(self.anchor), b.id));
        let target = units.chain(structures).min().map(|(_, id)| id);
        if target.is_none() {
            debug!("opponent found nothing to attack");
        }
        target
    }
}

/// Opponent combat units in id order.
#[must_use]
pub fn army(world: &WorldState) -> Vec<EntityId> {
    world
        .units
        .iter_sorted()
        .filter(|u| u.owner == Owner::Opponent && u.kind.is_military())
        .map(|u| u.id)
        .collect()
}

/// Flat income plus the output of every opponent building.
fn collect_income(world: &mut WorldState) {
    let mut income = world.config.ai_income;
    for building in world.buildings.values().filter(|b| b.owner == Owner::Opponent) {
        income.add(&world.building_def(building.kind).produces);
    }
    world.pools.opponent.add(&income);
}
