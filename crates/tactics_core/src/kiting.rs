//! Kiting micro for ranged units.
//!
//! Produces exactly one intent per call: an attack when the target is in
//! range and the unit is settled, otherwise a move that re-opens the gap to
//! maximum range.

use crate::components::CombatEntity;
use crate::intents::{PendingOrders, UnitIntent};
use crate::lethality::LethalityModel;
use crate::math::{Fixed, Vec2Fixed};

/// Point on the target-to-unit ray at which the unit sits exactly at
/// `range` edge to edge.
///
/// Units standing on the target are pushed along +x.
#[must_use]
pub fn max_range_point(unit: &CombatEntity, target: &CombatEntity, range: Fixed) -> Option<Vec2Fixed> {
    let from = unit.position?;
    let origin = target.position?;
    let mut direction = (from - origin).normalize();
    if direction == Vec2Fixed::ZERO {
        direction = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
    }
    let reach = range
        .saturating_add(unit.radius)
        .saturating_add(target.radius);
    Some(origin + direction.scale(reach))
}

/// Whether a pending move of this unit has not been reached yet.
#[must_use]
pub fn is_mid_reposition(pending: &PendingOrders, unit: &CombatEntity, tolerance: Fixed) -> bool {
    let (Some(destination), Some(position)) = (pending.pending_move(unit.id), unit.position) else {
        return false;
    };
    position.distance(destination) > tolerance
}

/// One kiting intent for `unit` against `target`.
///
/// `None` when either position is unknown.
#[must_use]
pub fn kite(
    model: &LethalityModel<'_>,
    pending: &PendingOrders,
    unit: &CombatEntity,
    target: &CombatEntity,
) -> Option<UnitIntent> {
    let position = unit.position?;
    let edge = unit.edge_distance(target)?;
    let tolerance = model.config().arrival_tolerance;
    let range = model
        .range_against(unit, target)
        .unwrap_or_else(|| model.max_range(unit.unit_type));
    let faster = model.speed(unit) > model.speed(target);

    let in_range = edge <= range.saturating_add(tolerance);
    let too_close = edge < range - tolerance;
    let cooling = unit.weapon_cooldown > 0;
    let settled = !is_mid_reposition(pending, unit, tolerance);

    if in_range && settled && !(cooling && too_close && faster) {
        return Some(UnitIntent::attack(unit.id, target.id));
    }
    if !faster {
        return Some(UnitIntent::attack(unit.id, target.id));
    }
    let point = max_range_point(unit, target, range)?;
    let step = position.move_towards(point, model.travel_per_step(unit));
    tracing::trace!(unit = unit.id, target = target.id, edge = %edge, "Kiting to range");
    Some(UnitIntent::move_to(unit.id, step))
}
