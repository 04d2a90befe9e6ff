//! Per-unit engage-or-retreat decision.
//!
//! Each tick a unit compares its side's local DPS-health against the
//! hostiles around it. Favorable fights are joined; unfavorable ones are
//! kited by faster ranged units and abandoned by everyone else. A unit that
//! committed to an attack keeps attacking through small swings in the
//! comparison.

use serde::{Deserialize, Serialize};

use crate::components::{CombatEntity, EntityId};
use crate::lethality::LethalityModel;
use crate::math::Fixed;
use crate::state::UnitState;
use crate::threat::{LocalThreat, NearbyHostile};

/// Engagement state of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementState {
    /// No attackable hostile nearby.
    #[default]
    Idle,
    /// Favorable, target out of range.
    Approaching,
    /// Favorable, target in range.
    Attacking,
    /// Unfavorable but able to fight at range while backing off.
    Kiting,
    /// Unfavorable; leave the fight.
    Retreating,
}

impl EngagementState {
    /// Short label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Approaching => "approaching",
            Self::Attacking => "attacking",
            Self::Kiting => "kiting",
            Self::Retreating => "retreating",
        }
    }
}

impl std::fmt::Display for EngagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementDecision {
    /// Unit evaluated.
    pub unit: EntityId,
    /// Chosen state.
    pub state: EngagementState,
    /// Selected target, if any.
    pub target: Option<EntityId>,
    /// Whether the target is within weapon range.
    pub target_in_range: bool,
    /// Own-side strength used in the comparison.
    pub self_dps_health: Fixed,
    /// Hostile strength used in the comparison.
    pub enemy_dps_health: Fixed,
}

fn is_favorable(self_dps: Fixed, enemy_dps: Fixed, prior: Option<UnitState>, ratio: Fixed) -> bool {
    if enemy_dps <= self_dps {
        return true;
    }
    prior.is_some_and(|p| p.holds_attack()) && self_dps >= enemy_dps.saturating_mul(ratio)
}

/// Whether `unit` can stay ahead of the nearest armed hostile.
///
/// Requires a ranged unit strictly faster than the threat, with more room
/// than the threat's reach plus one step of travel for both.
fn can_kite(model: &LethalityModel<'_>, unit: &CombatEntity, threat: &LocalThreat<'_>) -> bool {
    if model.is_melee(unit) {
        return false;
    }
    let Some(nearest) = threat.nearest_armed() else {
        return true;
    };
    let hostile = nearest.entity;
    if model.speed(unit) <= model.speed(hostile) {
        return false;
    }
    let reach = model.range_against(hostile, unit).unwrap_or(Fixed::ZERO);
    let buffer = model
        .travel_per_step(unit)
        .saturating_add(model.travel_per_step(hostile));
    nearest.edge_distance > reach.saturating_add(buffer)
}

/// Decide the engagement state of `unit`.
///
/// `target` is the hostile picked by the target selector; `prior` is the
/// unit's state from the previous tick.
#[must_use]
pub fn evaluate(
    model: &LethalityModel<'_>,
    unit: &CombatEntity,
    threat: &LocalThreat<'_>,
    target: Option<&NearbyHostile<'_>>,
    prior: Option<UnitState>,
) -> EngagementDecision {
    let self_dps_health = threat.self_dps_health();
    let enemy_dps_health = threat.enemy_dps_health;
    let mut decision = EngagementDecision {
        unit: unit.id,
        state: EngagementState::Idle,
        target: None,
        target_in_range: false,
        self_dps_health,
        enemy_dps_health,
    };

    let Some(target) = target else {
        return decision;
    };
    decision.target = Some(target.entity.id);
    decision.target_in_range = model
        .range_against(unit, target.entity)
        .is_some_and(|range| target.edge_distance <= range);

    let ratio = model.config().hysteresis_ratio;
    decision.state = if is_favorable(self_dps_health, enemy_dps_health, prior, ratio) {
        if decision.target_in_range {
            EngagementState::Attacking
        } else {
            EngagementState::Approaching
        }
    } else if can_kite(model, unit, threat) {
        EngagementState::Kiting
    } else {
        EngagementState::Retreating
    };

    tracing::debug!(
        unit = unit.id,
        state = %decision.state,
        target = target.entity.id,
        self_dps_health = %self_dps_health,
        enemy_dps_health = %enemy_dps_health,
        "Engagement evaluated"
    );
    decision
}
