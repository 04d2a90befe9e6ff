//! Unit intents produced by the decision pass, and the pending-order memo.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::Vec2Fixed;

// ============================================================================
// Intents
// ============================================================================

/// What a unit is told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Move without engaging.
    Move,
    /// Attack a specific unit.
    Attack,
    /// Move, engaging anything on the way.
    AttackMove,
    /// Stop all orders.
    Stop,
}

/// One command for one or more units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitIntent {
    /// Command kind.
    pub kind: IntentKind,
    /// Units receiving the command.
    pub units: Vec<EntityId>,
    /// Target unit, for attacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_unit: Option<EntityId>,
    /// Target position, for moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_position: Option<Vec2Fixed>,
}

impl UnitIntent {
    /// Move one unit to a position.
    #[must_use]
    pub fn move_to(unit: EntityId, position: Vec2Fixed) -> Self {
        Self {
            kind: IntentKind::Move,
            units: vec![unit],
            target_unit: None,
            target_position: Some(position),
        }
    }

    /// Attack a unit.
    #[must_use]
    pub fn attack(unit: EntityId, target: EntityId) -> Self {
        Self {
            kind: IntentKind::Attack,
            units: vec![unit],
            target_unit: Some(target),
            target_position: None,
        }
    }

    /// Attack-move several units to a position.
    #[must_use]
    pub fn attack_move(units: Vec<EntityId>, position: Vec2Fixed) -> Self {
        Self {
            kind: IntentKind::AttackMove,
            units,
            target_unit: None,
            target_position: Some(position),
        }
    }

    /// Stop several units.
    #[must_use]
    pub fn stop(units: Vec<EntityId>) -> Self {
        Self {
            kind: IntentKind::Stop,
            units,
            target_unit: None,
            target_position: None,
        }
    }

    fn same_order(&self, order: &PendingOrder) -> bool {
        self.kind == order.kind
            && self.target_unit == order.target_unit
            && self.target_position == order.target_position
    }
}

/// The ordered intents of one tick.
///
/// A unit receives at most one intent per tick; later intents naming an
/// already commanded unit drop that unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentBatch {
    /// Tick the batch was produced for.
    pub tick: u64,
    intents: Vec<UnitIntent>,
    #[serde(skip)]
    commanded: HashSet<EntityId>,
}

impl IntentBatch {
    /// Empty batch for `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// Add an intent. Returns `false` when every unit was already commanded.
    pub fn push(&mut self, mut intent: UnitIntent) -> bool {
        intent.units.retain(|id| !self.commanded.contains(id));
        if intent.units.is_empty() {
            return false;
        }
        self.commanded.extend(intent.units.iter().copied());
        self.intents.push(intent);
        true
    }

    /// Whether a unit already has an intent this tick.
    #[must_use]
    pub fn is_commanded(&self, unit: EntityId) -> bool {
        self.commanded.contains(&unit)
    }

    /// Intents in issue order.
    #[must_use]
    pub fn intents(&self) -> &[UnitIntent] {
        &self.intents
    }

    /// The intent naming a unit, if any.
    #[must_use]
    pub fn for_unit(&self, unit: EntityId) -> Option<&UnitIntent> {
        self.intents.iter().find(|i| i.units.contains(&unit))
    }

    /// Number of intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether no intents were issued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Drop units whose intent repeats a still-pending order, then record
    /// what remains as pending.
    pub fn suppress_redundant(&mut self, pending: &mut PendingOrders, window: u64) {
        let tick = self.tick;
        for intent in &mut self.intents {
            let probe = UnitIntent {
                units: Vec::new(),
                ..intent.clone()
            };
            intent
                .units
                .retain(|&unit| !pending.is_redundant(unit, &probe, tick, window));
        }
        self.intents.retain(|i| !i.units.is_empty());
        for intent in &self.intents {
            pending.record(intent, tick);
        }
    }
}

// ============================================================================
// Pending Orders
// ============================================================================

/// An issued order the snapshot may not reflect yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOrder {
    /// Command kind.
    pub kind: IntentKind,
    /// Target unit.
    pub target_unit: Option<EntityId>,
    /// Target position.
    pub target_position: Option<Vec2Fixed>,
    /// Tick the order was issued on.
    pub issued_tick: u64,
}

/// Best-effort memo of the last order issued to each unit.
#[derive(Debug, Clone, Default)]
pub struct PendingOrders {
    orders: HashMap<EntityId, PendingOrder>,
}

impl PendingOrders {
    /// Empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an intent for each of its units.
    pub fn record(&mut self, intent: &UnitIntent, tick: u64) {
        for &unit in &intent.units {
            self.orders.insert(
                unit,
                PendingOrder {
                    kind: intent.kind,
                    target_unit: intent.target_unit,
                    target_position: intent.target_position,
                    issued_tick: tick,
                },
            );
        }
    }

    /// Whether `intent` repeats the unit's pending order within `window` ticks.
    #[must_use]
    pub fn is_redundant(&self, unit: EntityId, intent: &UnitIntent, tick: u64, window: u64) -> bool {
        self.orders.get(&unit).is_some_and(|order| {
            tick.saturating_sub(order.issued_tick) < window && intent.same_order(order)
        })
    }

    /// Last order issued to a unit.
    #[must_use]
    pub fn get(&self, unit: EntityId) -> Option<&PendingOrder> {
        self.orders.get(&unit)
    }

    /// Destination of a unit's pending move, if its last order was a move.
    #[must_use]
    pub fn pending_move(&self, unit: EntityId) -> Option<Vec2Fixed> {
        self.orders
            .get(&unit)
            .filter(|o| o.kind == IntentKind::Move)
            .and_then(|o| o.target_position)
    }

    /// Drop orders older than `window` ticks.
    pub fn expire(&mut self, tick: u64, window: u64) {
        self.orders
            .retain(|_, o| tick.saturating_sub(o.issued_tick) < window);
    }

    /// Forget a unit.
    pub fn forget(&mut self, unit: EntityId) {
        self.orders.remove(&unit);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.orders.clear();
    }

    /// Number of units with pending orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether no orders are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_one_intent_per_unit() {
        let mut batch = IntentBatch::new(1);
        assert!(batch.push(UnitIntent::attack(1, 10)));
        assert!(!batch.push(UnitIntent::move_to(1, Vec2Fixed::ZERO)));
        assert!(batch.push(UnitIntent::attack_move(vec![1, 2, 3], Vec2Fixed::ZERO)));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.intents()[1].units, vec![2, 3]);
        assert_eq!(batch.for_unit(1).map(|i| i.kind), Some(IntentKind::Attack));
        assert!(batch.is_commanded(3));
    }

    #[test]
    fn test_suppress_redundant_within_window() {
        let mut pending = PendingOrders::new();
        let dest = Vec2Fixed::from_ints(5, 5);

        let mut first = IntentBatch::new(10);
        first.push(UnitIntent::move_to(1, dest));
        first.suppress_redundant(&mut pending, 2);
        assert_eq!(first.len(), 1);
        assert_eq!(pending.pending_move(1), Some(dest));

        let mut repeat = IntentBatch::new(11);
        repeat.push(UnitIntent::move_to(1, dest));
        repeat.push(UnitIntent::attack(2, 7));
        repeat.suppress_redundant(&mut pending, 2);
        assert_eq!(repeat.len(), 1);
        assert_eq!(repeat.intents()[0].units, vec![2]);

        // Window elapsed: re-issue.
        let mut later = IntentBatch::new(12);
        later.push(UnitIntent::move_to(1, dest));
        later.suppress_redundant(&mut pending, 2);
        assert_eq!(later.len(), 1);
    }

    #[test]
    fn test_changed_order_not_redundant() {
        let mut pending = PendingOrders::new();
        pending.record(&UnitIntent::move_to(1, Vec2Fixed::ZERO), 3);
        assert!(!pending.is_redundant(1, &UnitIntent::attack(1, 4), 3, 2));
        assert!(pending.is_redundant(1, &UnitIntent::move_to(1, Vec2Fixed::ZERO), 4, 2));
    }

    #[test]
    fn test_expire_and_forget() {
        let mut pending = PendingOrders::new();
        pending.record(&UnitIntent::attack_move(vec![1, 2], Vec2Fixed::ZERO), 0);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.pending_move(1), None);
        pending.forget(1);
        assert_eq!(pending.len(), 1);
        pending.expire(5, 2);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_serialization_skips_empty_targets() {
        let text = ron::to_string(&UnitIntent::attack(3, 9)).expect("serialize");
        assert!(text.contains("attack"));
        assert!(!text.contains("target_position"));
    }
}
