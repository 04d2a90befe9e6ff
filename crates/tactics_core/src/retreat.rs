//! Retreat destination resolution.
//!
//! A retreating unit heads for the nearest friendly safe point it can reach
//! before any threat can. Without one it steps straight away from the
//! threats, bending around unpathable ground.

use crate::components::CombatEntity;
use crate::lethality::LethalityModel;
use crate::math::{fixed_sqrt, ratio, Fixed, Vec2Fixed};
use crate::pathing::{distance_or_straight, PathService};
use crate::snapshot::MapBounds;
use crate::threat::NearbyHostile;

/// Cosine and sine of the fallback rotations, straight away first.
fn rotations() -> [(Fixed, Fixed); 7] {
    let half = ratio(1, 2);
    let root3_half = fixed_sqrt(Fixed::const_from_int(3)) / Fixed::const_from_int(2);
    [
        (Fixed::ONE, Fixed::ZERO),
        (root3_half, half),
        (root3_half, -half),
        (half, root3_half),
        (half, -root3_half),
        (Fixed::ZERO, Fixed::ONE),
        (Fixed::ZERO, -Fixed::ONE),
    ]
}

/// Hostiles that can hit the unit, or every nearby hostile when none can.
fn threat_set<'h, 'a>(hostiles: &'h [NearbyHostile<'a>]) -> Vec<&'h NearbyHostile<'a>> {
    let armed: Vec<_> = hostiles.iter().filter(|h| h.returns_fire).collect();
    if armed.is_empty() {
        hostiles.iter().collect()
    } else {
        armed
    }
}

/// Whether the unit reaches `point` before any threat gets in range of it.
fn reached_first(
    model: &LethalityModel<'_>,
    path: &dyn PathService,
    unit: &CombatEntity,
    unit_distance: Fixed,
    threats: &[&NearbyHostile<'_>],
    point: Vec2Fixed,
) -> bool {
    threats.iter().all(|t| {
        let Some(from) = t.entity.position else {
            return true;
        };
        let reach = model.range_against(t.entity, unit).unwrap_or(Fixed::ZERO);
        let distance = distance_or_straight(path, from, point, t.entity.is_flying);
        unit_distance < distance - reach
    })
}

/// Nearest safe point the unit reaches first that is farther from the
/// threats than the unit is now.
fn safe_point(
    model: &LethalityModel<'_>,
    path: &dyn PathService,
    unit: &CombatEntity,
    position: Vec2Fixed,
    centroid: Vec2Fixed,
    threats: &[&NearbyHostile<'_>],
    safe_points: &[Vec2Fixed],
) -> Option<Vec2Fixed> {
    let current = position.distance(centroid);
    safe_points
        .iter()
        .filter(|p| p.distance(centroid) > current)
        .filter_map(|&p| {
            let distance = if unit.is_flying {
                Some(position.distance(p))
            } else {
                path.path_distance(position, p)
            }?;
            reached_first(model, path, unit, distance, threats, p).then_some((distance, p))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, p)| p)
}

/// Step straight away from `centroid`, rotating up to 90 degrees either way
/// to find pathable ground. Every candidate must end farther from the
/// centroid than the unit is now.
fn step_away(
    model: &LethalityModel<'_>,
    path: &dyn PathService,
    unit: &CombatEntity,
    position: Vec2Fixed,
    centroid: Vec2Fixed,
    bounds: Option<MapBounds>,
) -> Option<Vec2Fixed> {
    let current = position.distance(centroid);
    let mut away = (position - centroid).normalize();
    if away == Vec2Fixed::ZERO {
        away = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
    }
    let distance = model
        .config()
        .retreat_distance
        .max(model.travel_per_step(unit).saturating_mul(Fixed::const_from_int(2)));

    let candidates: Vec<Vec2Fixed> = rotations()
        .into_iter()
        .map(|(cos, sin)| {
            let point = position + away.rotate(cos, sin).scale(distance);
            bounds.map_or(point, |b| b.clamp(point))
        })
        .filter(|p| p.distance(centroid) > current)
        .collect();

    candidates
        .iter()
        .copied()
        .find(|&p| unit.is_flying || path.is_pathable(p))
        .or_else(|| candidates.first().copied())
}

/// Where `unit` should retreat to from the given nearby hostiles.
///
/// `None` when there is nothing to retreat from, the unit's position is
/// unknown, or no point farther from the threats exists inside the map.
#[must_use]
pub fn retreat_destination(
    model: &LethalityModel<'_>,
    path: &dyn PathService,
    unit: &CombatEntity,
    hostiles: &[NearbyHostile<'_>],
    safe_points: &[Vec2Fixed],
    bounds: Option<MapBounds>,
) -> Option<Vec2Fixed> {
    let position = unit.position?;
    let threats = threat_set(hostiles);
    let positions: Vec<_> = threats.iter().filter_map(|t| t.entity.position).collect();
    let centroid = Vec2Fixed::centroid(&positions)?;

    let destination = safe_point(model, path, unit, position, centroid, &threats, safe_points)
        .or_else(|| step_away(model, path, unit, position, centroid, bounds));
    if destination.is_none() {
        tracing::debug!(unit = unit.id, "No retreat destination farther from threats");
    }
    destination
}
