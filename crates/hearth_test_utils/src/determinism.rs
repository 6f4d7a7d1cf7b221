//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the core guards against:
//!
//! - **Floating-point math**: fixed-point arithmetic via
//!   [`hearth_core::math::Fixed`] throughout.
//! - **HashMap iteration order**: systems iterate in sorted entity ID order.
//! - **Randomness**: one `ChaCha8Rng` seeded from the config.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual systems
//! 2. **Property tests**: random inputs must still replay identically
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: N simulations on N threads all match

use std::thread;

use hearth_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Creates the initial state
/// * `step` - Advances the state by one tick
/// * `hash` - Computes the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run `setup_fn` twice for `num_ticks` and compare the final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run `num_sims` simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// `None` if the runs match throughout, `Some(tick)` otherwise.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }
    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();
        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }
    None
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use hearth_core::commands::Command;
    use hearth_core::components::{BuildingKind, UnitKind};
    use hearth_core::math::Vec2Fixed;
    use proptest::prelude::*;

    /// A point on the default 2048 x 2048 map.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (0i32..2048, 0i32..2048).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// Any building kind.
    pub fn arb_building_kind() -> impl Strategy<Value = BuildingKind> {
        prop::sample::select(BuildingKind::ALL.to_vec())
    }

    /// A unit kind the player can own.
    pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
        prop::sample::select(vec![UnitKind::Villager, UnitKind::Soldier, UnitKind::Archer])
    }

    /// A player command addressing entity ids below `max_id`.
    pub fn arb_command(max_id: u64) -> impl Strategy<Value = Command> {
        let ids = prop::collection::vec(1..max_id.max(2), 0..6);
        prop_oneof![
            arb_building_kind().prop_map(|kind| Command::RequestBuild { kind }),
            arb_position().prop_map(|position| Command::PlaceBuilding { position }),
            (arb_building_kind(), arb_position()).prop_map(|(kind, position)| Command::Build { kind, position }),
            (1..max_id.max(2), arb_unit_kind()).prop_map(|(building, kind)| Command::Train { building, kind }),
            (ids.clone(), arb_position()).prop_map(|(units, target)| Command::Move { units, target }),
            (ids.clone(), 1..max_id.max(2)).prop_map(|(units, target)| Command::Attack { units, target }),
            any::<bool>().prop_map(|active| Command::ToggleDemolish { active }),
            arb_position().prop_map(|position| Command::DemolishAt { position }),
            any::<bool>().prop_map(|enabled| Command::SetPeacefulMode { enabled }),
            ids.prop_map(|units| Command::Select { units }),
        ]
    }

    /// A sequence of player commands.
    pub fn arb_command_sequence(max_len: usize, max_id: u64) -> impl Strategy<Value = Vec<Command>> {
        prop::collection::vec(arb_command(max_id), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{quiet_config, settlement, skirmish};
    use hearth_core::commands::Command;
    use hearth_core::config::SimConfig;
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_detects_divergence() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
    }

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(
            || Simulation::new(SimConfig::default()).unwrap(),
            200
        ));
    }

    #[test]
    fn test_settlement_determinism() {
        let result = verify_determinism(
            3,
            600,
            || settlement(SimConfig::default(), 5).0,
            |sim| {
                sim.tick();
            },
            Simulation::state_hash,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_skirmish_has_no_divergence() {
        let setup = || {
            let (mut sim, player, opponent) = skirmish(4, 3);
            sim.issue(Command::Attack {
                units: player,
                target: opponent[0],
            });
            sim
        };
        assert_eq!(find_first_divergence(setup, 400), None);
    }

    #[test]
    fn test_parallel_settlements_match() {
        let result = run_parallel_simulations(|| settlement(quiet_config(), 8).0, 4, 300);
        result.assert_deterministic();
        assert_eq!(result.hashes.len(), 4);
    }

    #[test]
    fn test_seed_changes_outcome() {
        let run = |seed| {
            let config = SimConfig { seed, ..quiet_config() };
            let (mut sim, _) = settlement(config, 0);
            for i in 0..6 {
                sim.spawn_unit(
                    hearth_core::components::Owner::Neutral,
                    hearth_core::components::UnitKind::Deer,
                    crate::fixtures::vec2(1000 + i * 40, 1000),
                )
                .unwrap();
            }
            sim.run_ticks(2000);
            sim.state_hash()
        };
        assert_ne!(run(1), run(2));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Arbitrary player command streams replay identically.
        #[test]
        fn prop_command_sequences_are_replayable(
            commands in strategies::arb_command_sequence(12, 12),
        ) {
            let setup = || {
                let (mut sim, _) = settlement(SimConfig::default(), 4);
                for command in &commands {
                    sim.issue(command.clone());
                }
                sim
            };
            let result = verify_determinism(2, 120, setup, |s| { s.tick(); }, Simulation::state_hash);
            prop_assert!(result.is_deterministic);
        }
    }
}
