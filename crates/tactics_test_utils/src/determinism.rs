//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the decision engine produces
//! identical intent batches given identical snapshot sequences.
//!
//! # Testing Strategy
//!
//! Tactical decisions must be reproducible so replays and regression tests
//! can compare intent streams byte for byte. Sources of non-determinism
//! include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`tactics_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Units, groups and hostiles are always visited in sorted id order.
//!
//! - **Tie breaks**: Equal distances and equal scores fall back to the
//!   lower entity id, never to container order.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual components (lethality, targeting, kiting)
//! 2. **Property tests**: Random battles must still produce deterministic outputs
//! 3. **Session tests**: Whole scripted battles are reproducible
//! 4. **Parallel tests**: Running N sessions in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tactics_core::config::TacticsConfig;
use tactics_core::data::UnitTypeRegistry;
use tactics_core::engine::TacticsEngine;
use tactics_core::intents::IntentBatch;
use tactics_core::pathing::{PathService, StraightLine};
use tactics_core::snapshot::WorldSnapshot;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks decided per run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Decisions are non-deterministic!\n\
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

/// Run a stateful process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the process
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute state hash
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

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash of one batch: its tick and its ordered intents.
#[must_use]
pub fn hash_batch(batch: &IntentBatch) -> u64 {
    compute_hash(&(batch.tick, batch.intents()))
}

/// Hash of a whole intent stream.
#[must_use]
pub fn hash_batches(batches: &[IntentBatch]) -> u64 {
    let per_batch: Vec<u64> = batches.iter().map(hash_batch).collect();
    compute_hash(&per_batch)
}

/// Feed a snapshot script through a fresh engine and collect every batch.
///
/// # Panics
///
/// Panics if `config` is invalid.
#[must_use]
pub fn run_session(
    registry: &UnitTypeRegistry,
    config: &TacticsConfig,
    script: &[WorldSnapshot],
    path: &dyn PathService,
) -> Vec<IntentBatch> {
    let mut engine =
        TacticsEngine::new(registry.clone(), config.clone()).expect("config must be valid");
    script.iter().map(|s| engine.step(s, path)).collect()
}

/// Run the same script `runs` times on fresh engines and compare streams.
#[must_use]
pub fn verify_session_determinism(
    registry: &UnitTypeRegistry,
    config: &TacticsConfig,
    script: &[WorldSnapshot],
    runs: usize,
) -> DeterminismResult {
    let hashes: Vec<u64> = (0..runs)
        .map(|_| hash_batches(&run_session(registry, config, script, &StraightLine)))
        .collect();
    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: script.len() as u64,
    }
}

/// Run `sessions` copies of the same script on scoped threads.
///
/// Catches state leaking between sessions or depending on scheduling.
///
/// # Panics
///
/// Panics if a session thread panics.
#[must_use]
pub fn run_parallel_sessions(
    registry: &UnitTypeRegistry,
    config: &TacticsConfig,
    script: &[WorldSnapshot],
    sessions: usize,
) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..sessions)
            .map(|_| {
                s.spawn(|| hash_batches(&run_session(registry, config, script, &StraightLine)))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("session thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: script.len() as u64,
    }
}

/// Compare two intent streams batch by batch, finding the first divergence.
///
/// # Returns
///
/// `None` if the streams match, `Some(tick)` for the first batch that
/// differs. A length mismatch diverges at the first missing batch.
#[must_use]
pub fn find_first_divergence(a: &[IntentBatch], b: &[IntentBatch]) -> Option<u64> {
    for (left, right) in a.iter().zip(b) {
        if left.tick != right.tick || left.intents() != right.intents() {
            tracing::warn!(tick = left.tick, "Intent streams diverge");
            return Some(left.tick);
        }
    }
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Less => b.get(a.len()).map(|batch| batch.tick),
        std::cmp::Ordering::Greater => a.get(b.len()).map(|batch| batch.tick),
    }
}

/// Proptest strategies for decision testing.
///
/// These strategies generate random but reproducible battles for
/// property-based testing of the decision pass.
pub mod strategies {
    use proptest::prelude::*;
    use tactics_core::components::{Alliance, CombatEntity, UnitTypeId};
    use tactics_core::math::{Fixed, Vec2Fixed};
    use tactics_core::snapshot::WorldSnapshot;

    use crate::fixtures::{self, BRUTE, GUNNER, GUNSHIP, RANGER, SPLASHER};

    /// Generate a fixed-point coordinate on a skirmish-sized field.
    ///
    /// Range: -40 to 40
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-160i32..160i32).prop_map(|quarters| Fixed::from_num(quarters) / Fixed::from_num(4))
    }

    /// Generate a fixed-point 2D vector for positions.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate an armed roster type.
    pub fn arb_combat_type() -> impl Strategy<Value = UnitTypeId> {
        prop_oneof![
            Just(RANGER),
            Just(BRUTE),
            Just(GUNNER),
            Just(GUNSHIP),
            Just(SPLASHER),
        ]
    }

    /// Generate an attack or armor upgrade level (0-3).
    pub fn arb_upgrade_level() -> impl Strategy<Value = u8> {
        0u8..=3u8
    }

    /// Generate a health fraction in percent (1-100).
    pub fn arb_health_percent() -> impl Strategy<Value = u32> {
        1u32..=100u32
    }

    /// Generate one roster entity with the given id and alliance.
    pub fn arb_entity(id: u64, alliance: Alliance) -> impl Strategy<Value = CombatEntity> {
        (arb_combat_type(), arb_vec2_position(), arb_health_percent()).prop_map(
            move |(unit_type, position, percent)| {
                let full = fixtures::unit(id, unit_type, alliance, 0, 0);
                let health = full
                    .health
                    .map(|hp| hp * Fixed::from_num(percent) / Fixed::from_num(100));
                CombatEntity {
                    position: Some(position),
                    health,
                    ..full
                }
            },
        )
    }

    /// Generate a battle with up to `max_per_side` units on each side.
    ///
    /// Friendly ids are `1..`, enemy ids are `1001..`.
    pub fn arb_battle(max_per_side: usize) -> impl Strategy<Value = WorldSnapshot> {
        (1..=max_per_side, 1..=max_per_side)
            .prop_flat_map(|(friendlies, enemies)| {
                let friendly: Vec<_> = (0..friendlies)
                    .map(|i| arb_entity(i as u64 + 1, Alliance::Friendly))
                    .collect();
                let enemy: Vec<_> = (0..enemies)
                    .map(|i| arb_entity(i as u64 + 1001, Alliance::Enemy))
                    .collect();
                (friendly, enemy)
            })
            .prop_map(|(mut friendly, enemy)| {
                friendly.extend(enemy);
                fixtures::snapshot(1, friendly)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{advancing_battle, roster, skirmish};
    use proptest::prelude::*;
    use std::collections::HashSet;
    use tactics_core::decision::decide;
    use tactics_core::state::TacticalState;
    use tactics_core::tracking::EnemyMemory;

    // =========================================================================
    // Harness self-checks
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_find_divergence_on_identical_streams() {
        let script = advancing_battle(3, 5);
        let a = run_session(&roster(), &TacticsConfig::default(), &script, &StraightLine);
        let b = run_session(&roster(), &TacticsConfig::default(), &script, &StraightLine);
        assert_eq!(find_first_divergence(&a, &b), None);
        assert_eq!(find_first_divergence(&a, &b[..3]), Some(4));
    }

    // =========================================================================
    // Session determinism
    // =========================================================================

    #[test]
    fn test_scripted_battle_determinism() {
        let script = advancing_battle(9, 20);
        verify_session_determinism(&roster(), &TacticsConfig::default(), &script, 3)
            .assert_deterministic();
    }

    #[test]
    fn test_parallel_sessions_match() {
        let script = advancing_battle(6, 12);
        run_parallel_sessions(&roster(), &TacticsConfig::default(), &script, 4)
            .assert_deterministic();
    }

    #[test]
    fn test_state_carries_between_steps() {
        // Stepping one engine must match a hand-driven decide loop.
        let registry = roster();
        let config = TacticsConfig::default();
        let script = advancing_battle(3, 8);
        let via_engine = run_session(&registry, &config, &script, &StraightLine);

        let mut memory = EnemyMemory::new();
        let mut state = TacticalState::new();
        let by_hand: Vec<_> = script
            .iter()
            .map(|s| decide(s, &registry, &config, &StraightLine, &mut memory, &mut state))
            .collect();
        assert_eq!(hash_batches(&via_engine), hash_batches(&by_hand));
    }

    #[test]
    fn test_opening_issues_orders() {
        let batches = run_session(
            &roster(),
            &TacticsConfig::default(),
            &[skirmish(6, 16)],
            &StraightLine,
        );
        assert!(!batches[0].is_empty());
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_random_battles_are_deterministic(
            battle in strategies::arb_battle(8)
        ) {
            let script = vec![battle];
            let result = verify_session_determinism(&roster(), &TacticsConfig::default(), &script, 2);
            prop_assert!(result.is_deterministic);
        }

        #[test]
        fn prop_one_intent_per_unit(battle in strategies::arb_battle(8)) {
            let batches = run_session(&roster(), &TacticsConfig::default(), &[battle], &StraightLine);
            let mut seen = HashSet::new();
            for intent in batches[0].intents() {
                for unit in &intent.units {
                    prop_assert!(seen.insert(*unit), "unit {} commanded twice", unit);
                }
            }
        }

        #[test]
        fn prop_only_friendlies_commanded(battle in strategies::arb_battle(6)) {
            let batches = run_session(&roster(), &TacticsConfig::default(), &[battle], &StraightLine);
            for intent in batches[0].intents() {
                prop_assert!(intent.units.iter().all(|id| *id < 1000));
            }
        }
    }
}
