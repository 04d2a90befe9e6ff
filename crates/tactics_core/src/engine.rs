//! Session-level driver for the decision pass.
//!
//! [`TacticsEngine`] owns the static unit data, the configuration, the
//! sighting memory and all cross-tick decision state. The caller feeds it one
//! snapshot per decision step and forwards the returned intents.
//!
//! # Determinism
//!
//! Given the same sequence of snapshots, an engine produces the same
//! sequence of intent batches:
//! - Fixed-point math only
//! - Units, groups and hostiles iterated in id order
//! - Ties broken by id, never by map iteration order
//!
//! # Example
//!
//! ```
//! use tactics_core::prelude::*;
//!
//! let marine = UnitTypeData {
//!     id: UnitTypeId(1),
//!     name: "marine".into(),
//!     health_max: Fixed::from_num(45),
//!     shield_max: Fixed::ZERO,
//!     armor: Fixed::ZERO,
//!     radius: Fixed::from_num(0.5),
//!     speed: Fixed::from_num(3),
//!     is_flying: false,
//!     attributes: vec![],
//!     weapons: vec![Weapon::new(Fixed::from_num(5), Fixed::from_num(6), Fixed::ONE)],
//!     traits: vec![],
//! };
//! let registry = UnitTypeRegistry::from_types([marine]).unwrap();
//! let mut engine = TacticsEngine::new(registry, TacticsConfig::default()).unwrap();
//!
//! let mut snapshot = WorldSnapshot::new(1);
//! snapshot.entities = vec![
//!     CombatEntity::new(1, UnitTypeId(1), Alliance::Friendly)
//!         .with_position(Vec2Fixed::from_ints(0, 0))
//!         .with_health(Fixed::from_num(45)),
//!     CombatEntity::new(2, UnitTypeId(1), Alliance::Enemy)
//!         .with_position(Vec2Fixed::from_ints(4, 0))
//!         .with_health(Fixed::from_num(10)),
//! ];
//!
//! let batch = engine.step(&snapshot, &StraightLine);
//! assert_eq!(batch.for_unit(1).map(|i| i.kind), Some(IntentKind::Attack));
//! ```

use crate::components::EntityId;
use crate::config::TacticsConfig;
use crate::data::UnitTypeRegistry;
use crate::decision::decide;
use crate::engagement::EngagementState;
use crate::error::Result;
use crate::intents::IntentBatch;
use crate::pathing::PathService;
use crate::snapshot::WorldSnapshot;
use crate::state::TacticalState;
use crate::tracking::{EnemyMemory, SightingMemory};

/// Tactical decision engine for one game session.
#[derive(Debug, Clone)]
pub struct TacticsEngine<M: SightingMemory = EnemyMemory> {
    registry: UnitTypeRegistry,
    config: TacticsConfig,
    memory: M,
    state: TacticalState,
    steps: u64,
}

impl TacticsEngine<EnemyMemory> {
    /// Create an engine with the default sighting memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(registry: UnitTypeRegistry, config: TacticsConfig) -> Result<Self> {
        Self::with_memory(registry, config, EnemyMemory::new())
    }
}

impl<M: SightingMemory> TacticsEngine<M> {
    /// Create an engine with a custom sighting memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_memory(registry: UnitTypeRegistry, config: TacticsConfig, memory: M) -> Result<Self> {
        config.validate()?;
        tracing::info!(unit_types = registry.len(), "Tactics engine ready");
        Ok(Self {
            registry,
            config,
            memory,
            state: TacticalState::new(),
            steps: 0,
        })
    }

    /// Run one decision pass.
    pub fn step(&mut self, snapshot: &WorldSnapshot, path: &dyn PathService) -> IntentBatch {
        self.steps += 1;
        decide(
            snapshot,
            &self.registry,
            &self.config,
            path,
            &mut self.memory,
            &mut self.state,
        )
    }

    /// Drop everything held for a destroyed entity, friendly or hostile.
    pub fn on_unit_destroyed(&mut self, unit: EntityId) {
        tracing::debug!(unit, "Unit destroyed");
        self.state.on_unit_destroyed(unit);
        self.memory.forget(unit);
    }

    /// Reset all cross-tick state at the end of a game.
    pub fn end_session(&mut self) {
        tracing::info!(steps = self.steps, "Tactics session ended");
        self.state.clear();
        self.memory.clear();
        self.steps = 0;
    }

    /// Engagement state of a unit as of its last evaluation.
    #[must_use]
    pub fn unit_state(&self, unit: EntityId) -> Option<EngagementState> {
        self.state.units.get(unit).map(|s| s.state)
    }

    /// Cross-tick decision state.
    #[must_use]
    pub fn state(&self) -> &TacticalState {
        &self.state
    }

    /// Static unit data.
    #[must_use]
    pub fn registry(&self) -> &UnitTypeRegistry {
        &self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TacticsConfig {
        &self.config
    }

    /// Decision passes run this session.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}
