//! Cross-tick decision state.
//!
//! Everything here is keyed by entity handle and mutated only by the
//! decision pass and the explicit event handlers on
//! [`crate::engine::TacticsEngine`].

use std::collections::HashMap;

use crate::anchor::AnchorTable;
use crate::components::EntityId;
use crate::engagement::EngagementState;
use crate::intents::PendingOrders;

/// Sticky per-unit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitState {
    /// State chosen on the last evaluated tick.
    pub state: EngagementState,
    /// Committed to the current fight; resists marginal retreats.
    pub committed: bool,
    /// Tick of the last evaluation.
    pub last_tick: u64,
}

impl UnitState {
    /// Record for a unit first evaluated at `tick`.
    #[must_use]
    pub const fn new(state: EngagementState, tick: u64) -> Self {
        Self {
            state,
            committed: false,
            last_tick: tick,
        }
    }

    /// Whether this unit was attacking while committed.
    #[must_use]
    pub fn holds_attack(&self) -> bool {
        self.committed && self.state == EngagementState::Attacking
    }

    /// Apply this tick's state and update the committed flag.
    pub fn transition(&mut self, state: EngagementState, tick: u64) {
        self.committed = match state {
            EngagementState::Attacking | EngagementState::Kiting => true,
            EngagementState::Retreating | EngagementState::Idle => false,
            EngagementState::Approaching => self.committed,
        };
        self.state = state;
        self.last_tick = tick;
    }
}

/// Per-unit records keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct UnitStateTable {
    units: HashMap<EntityId, UnitState>,
}

impl UnitStateTable {
    /// Record for a unit.
    #[must_use]
    pub fn get(&self, unit: EntityId) -> Option<UnitState> {
        self.units.get(&unit).copied()
    }

    /// Apply this tick's state for a unit.
    pub fn update(&mut self, unit: EntityId, state: EngagementState, tick: u64) {
        self.units
            .entry(unit)
            .or_insert_with(|| UnitState::new(state, tick))
            .transition(state, tick);
    }

    /// Forget a unit.
    pub fn forget(&mut self, unit: EntityId) {
        self.units.remove(&unit);
    }

    /// Drop records not refreshed within `max_age` ticks.
    pub fn prune(&mut self, tick: u64, max_age: u64) {
        self.units
            .retain(|_, s| tick.saturating_sub(s.last_tick) <= max_age);
    }

    /// Number of tracked units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no units are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.units.clear();
    }
}

/// All state the decision pass carries between ticks.
#[derive(Debug, Clone, Default)]
pub struct TacticalState {
    /// Anchor designation per army group.
    pub anchors: AnchorTable,
    /// Engagement record per unit.
    pub units: UnitStateTable,
    /// Issued orders not yet reflected by the snapshot.
    pub pending: PendingOrders,
}

impl TacticalState {
    /// Fresh state for a new session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything held for a destroyed unit.
    pub fn on_unit_destroyed(&mut self, unit: EntityId) {
        self.anchors.on_unit_destroyed(unit);
        self.units.forget(unit);
        self.pending.forget(unit);
    }

    /// Reset at session end.
    pub fn clear(&mut self) {
        self.anchors.clear();
        self.units.clear();
        self.pending.clear();
    }
}
