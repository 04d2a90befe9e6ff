//! Target selection and focus fire.

use std::collections::HashMap;

use crate::components::{CombatEntity, EntityId};
use crate::data::UnitTrait;
use crate::lethality::LethalityModel;
use crate::math::Fixed;
use crate::pathing::{distance_or_straight, PathService};
use crate::threat::{LocalThreat, NearbyHostile};

/// Nearest hostile `unit` can attack.
///
/// Distance is by ground path when the path service resolves one, straight
/// line otherwise; flying units always use straight line. Ties go to
/// hostiles that return fire, then to the lowest id.
#[must_use]
pub fn select_target<'a>(
    model: &LethalityModel<'_>,
    path: &dyn PathService,
    unit: &CombatEntity,
    hostiles: &[NearbyHostile<'a>],
) -> Option<NearbyHostile<'a>> {
    let from = unit.position?;
    let flying = unit.is_flying;
    hostiles
        .iter()
        .filter(|h| h.entity.alive && model.can_attack(unit, h.entity))
        .filter_map(|h| {
            let to = h.entity.position?;
            Some((distance_or_straight(path, from, to, flying), h))
        })
        .min_by(|(da, a), (db, b)| {
            da.cmp(db)
                .then_with(|| b.returns_fire.cmp(&a.returns_fire))
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        })
        .map(|(_, h)| *h)
}

/// Whether a hostile is a disguised changeling.
#[must_use]
pub fn is_changeling(model: &LethalityModel<'_>, entity: &CombatEntity) -> bool {
    model.has_trait(entity, UnitTrait::Changeling)
}

// ============================================================================
// Focus Fire
// ============================================================================

/// Damage already assigned to hostiles during this tick.
#[derive(Debug, Clone, Default)]
pub struct FocusLedger {
    assigned: HashMap<EntityId, Fixed>,
}

impl FocusLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attacker's damage against a target.
    pub fn assign(&mut self, target: EntityId, damage: Fixed) {
        let entry = self.assigned.entry(target).or_insert(Fixed::ZERO);
        *entry = entry.saturating_add(damage);
    }

    /// Damage assigned to a target so far.
    #[must_use]
    pub fn assigned(&self, target: EntityId) -> Fixed {
        self.assigned.get(&target).copied().unwrap_or(Fixed::ZERO)
    }

    /// Hit points left after assigned damage, floored at zero.
    #[must_use]
    pub fn remaining(&self, target: &CombatEntity) -> Fixed {
        let hp = target.hit_points().unwrap_or(Fixed::MAX);
        (hp - self.assigned(target.id).min(hp)).max(Fixed::ZERO)
    }
}

/// Target for an attacking unit, spreading damage to avoid overkill.
///
/// Among hostiles in weapon range that return fire, picks the one with the
/// least health left after damage already assigned this tick. Hostiles
/// already covered by assigned damage are passed over while another one
/// remains. Falls back to `fallback` when nothing qualifies.
#[must_use]
pub fn focus_target<'a>(
    model: &LethalityModel<'_>,
    ledger: &FocusLedger,
    unit: &CombatEntity,
    threat: &LocalThreat<'a>,
    fallback: &'a CombatEntity,
) -> &'a CombatEntity {
    threat
        .hostiles
        .iter()
        .filter(|h| h.returns_fire)
        .filter(|h| {
            model
                .range_against(unit, h.entity)
                .is_some_and(|range| h.edge_distance <= range)
        })
        .min_by_key(|h| {
            let remaining = ledger.remaining(h.entity);
            (remaining == Fixed::ZERO, remaining, h.entity.id)
        })
        .map_or(fallback, |h| h.entity)
}
