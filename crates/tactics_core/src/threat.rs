//! Local threat aggregation.
//!
//! For one friendly unit, gathers the hostiles and allies in its locality
//! and sums their DPS-health against each other. Records are built fresh
//! every tick and never stored.

use std::cmp::Ordering;

use crate::components::{CombatEntity, EntityId, UnitTypeId};
use crate::lethality::LethalityModel;
use crate::math::Fixed;

/// A hostile inside a unit's engagement radius.
#[derive(Debug, Clone, Copy)]
pub struct NearbyHostile<'a> {
    /// The hostile.
    pub entity: &'a CombatEntity,
    /// Distance minus both radii.
    pub edge_distance: Fixed,
    /// Whether it can hit the unit back.
    pub returns_fire: bool,
}

impl NearbyHostile<'_> {
    /// Nearest first, then hostiles that return fire, then lowest id.
    fn order(&self, other: &Self) -> Ordering {
        self.edge_distance
            .cmp(&other.edge_distance)
            .then_with(|| other.returns_fire.cmp(&self.returns_fire))
            .then_with(|| self.entity.id.cmp(&other.entity.id))
    }
}

/// Radius within which hostiles and allies count for a unit.
#[must_use]
pub fn engagement_radius(model: &LethalityModel<'_>, unit: &CombatEntity) -> Fixed {
    let config = model.config();
    config
        .engagement_range
        .max(model.max_range(unit.unit_type))
        .saturating_add(config.outnumbered_extra_range)
}

/// Alive, positioned hostiles within `radius` of `unit`, ordered.
#[must_use]
pub fn nearby_hostiles<'a>(
    model: &LethalityModel<'_>,
    unit: &CombatEntity,
    hostiles: &[&'a CombatEntity],
    radius: Fixed,
) -> Vec<NearbyHostile<'a>> {
    let mut list: Vec<_> = hostiles
        .iter()
        .filter(|h| h.alive)
        .filter_map(|&h| {
            let edge_distance = unit.edge_distance(h)?;
            (edge_distance <= radius).then(|| NearbyHostile {
                entity: h,
                edge_distance,
                returns_fire: model.can_attack(h, unit),
            })
        })
        .collect();
    list.sort_by(NearbyHostile::order);
    list
}

/// Alive, positioned friendlies within `radius` of `unit`, the unit
/// included, in id order.
#[must_use]
pub fn allies_near<'a>(
    unit: &CombatEntity,
    friendlies: &[&'a CombatEntity],
    radius: Fixed,
) -> Vec<&'a CombatEntity> {
    let mut list: Vec<_> = friendlies
        .iter()
        .copied()
        .filter(|f| f.alive)
        .filter(|f| f.id == unit.id || unit.edge_distance(f).is_some_and(|d| d <= radius))
        .collect();
    list.sort_by_key(|f| f.id);
    list
}

/// Summed DPS-health of `units` against a set of opposing types.
#[must_use]
pub fn local_dps_health(
    model: &LethalityModel<'_>,
    units: &[&CombatEntity],
    opposing: &[UnitTypeId],
) -> Fixed {
    units.iter().fold(Fixed::ZERO, |acc, u| {
        acc.saturating_add(model.dps_health(u, opposing))
    })
}

// ============================================================================
// Engagement Times
// ============================================================================

/// Time for each side to destroy the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementTimes {
    /// Seconds for the friendly side to destroy the hostile side.
    pub time_to_kill: Fixed,
    /// Seconds for the hostile side to destroy the friendly side.
    pub time_to_be_killed: Fixed,
}

fn hit_points_or_max(model: &LethalityModel<'_>, entity: &CombatEntity) -> Fixed {
    entity.hit_points().unwrap_or_else(|| {
        model
            .registry()
            .get(entity.unit_type)
            .map_or(Fixed::ZERO, |d| d.health_max.saturating_add(d.shield_max))
    })
}

/// Seconds for `attackers` to destroy `defenders`.
///
/// No attackers or no damage gives [`Fixed::MAX`]; no defenders gives zero.
#[must_use]
pub fn time_to_kill(
    model: &LethalityModel<'_>,
    attackers: &[&CombatEntity],
    defenders: &[&CombatEntity],
) -> Fixed {
    if attackers.is_empty() {
        return Fixed::MAX;
    }
    if defenders.is_empty() {
        return Fixed::ZERO;
    }
    let defender_types: Vec<_> = defenders.iter().map(|d| d.unit_type).collect();
    let total_dps = attackers.iter().fold(Fixed::ZERO, |acc, a| {
        acc.saturating_add(model.weapon_dps(a.unit_type, a.alliance, &defender_types))
    });
    let total_hp = defenders.iter().fold(Fixed::ZERO, |acc, d| {
        acc.saturating_add(hit_points_or_max(model, d))
    });
    if total_dps == Fixed::ZERO {
        return Fixed::MAX;
    }
    total_hp.checked_div(total_dps).unwrap_or(Fixed::MAX)
}

/// Both kill times for a friendly set against a hostile set.
#[must_use]
pub fn engagement_times(
    model: &LethalityModel<'_>,
    friendly: &[&CombatEntity],
    hostile: &[&CombatEntity],
) -> EngagementTimes {
    EngagementTimes {
        time_to_kill: time_to_kill(model, friendly, hostile),
        time_to_be_killed: time_to_kill(model, hostile, friendly),
    }
}

// ============================================================================
// Local Threat
// ============================================================================

/// Threat picture around one friendly unit.
#[derive(Debug, Clone)]
pub struct LocalThreat<'a> {
    /// The unit assessed.
    pub unit: EntityId,
    /// Hostiles within the engagement radius, ordered.
    pub hostiles: Vec<NearbyHostile<'a>>,
    /// Friendlies within the engagement radius, the unit included.
    pub allies: Vec<&'a CombatEntity>,
    /// The unit's own DPS-health against the local hostiles.
    pub own_dps_health: Fixed,
    /// Summed DPS-health of the allies against the local hostiles.
    pub ally_dps_health: Fixed,
    /// Summed DPS-health of the local hostiles against the allies.
    pub enemy_dps_health: Fixed,
    /// Kill times between allies and local hostiles.
    pub times: EngagementTimes,
}

impl LocalThreat<'_> {
    /// Strength used for the engagement comparison.
    #[must_use]
    pub fn self_dps_health(&self) -> Fixed {
        self.own_dps_health.max(self.ally_dps_health)
    }

    /// Nearest hostile that can hit the unit.
    #[must_use]
    pub fn nearest_armed(&self) -> Option<&NearbyHostile<'_>> {
        self.hostiles.iter().find(|h| h.returns_fire)
    }
}

/// Build the threat picture for `unit`.
///
/// `None` when the unit's position is unknown.
#[must_use]
pub fn assess<'a>(
    model: &LethalityModel<'_>,
    unit: &'a CombatEntity,
    hostiles: &[&'a CombatEntity],
    friendlies: &[&'a CombatEntity],
) -> Option<LocalThreat<'a>> {
    unit.position?;
    let radius = engagement_radius(model, unit);
    let nearby = nearby_hostiles(model, unit, hostiles, radius);
    let allies = allies_near(unit, friendlies, radius);

    let hostile_entities: Vec<_> = nearby.iter().map(|h| h.entity).collect();
    let hostile_types: Vec<_> = hostile_entities.iter().map(|h| h.unit_type).collect();
    let ally_types: Vec<_> = allies.iter().map(|a| a.unit_type).collect();

    let own_dps_health = model.dps_health(unit, &hostile_types);
    let ally_dps_health = local_dps_health(model, &allies, &hostile_types);
    let enemy_dps_health = local_dps_health(model, &hostile_entities, &ally_types);
    let times = engagement_times(model, &allies, &hostile_entities);

    tracing::trace!(
        unit = unit.id,
        hostiles = nearby.len(),
        allies = allies.len(),
        own = %own_dps_health,
        ally = %ally_dps_health,
        enemy = %enemy_dps_health,
        "Assessed local threat"
    );

    Some(LocalThreat {
        unit: unit.id,
        hostiles: nearby,
        allies,
        own_dps_health,
        ally_dps_health,
        enemy_dps_health,
        times,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Alliance, AllianceUpgrades};
    use crate::config::TacticsConfig;
    use crate::data::{TargetClass, UnitTypeData, UnitTypeRegistry, Weapon};
    use crate::math::{ratio, Vec2Fixed};

    const GUNNER: UnitTypeId = UnitTypeId(1);
    const FLYER: UnitTypeId = UnitTypeId(2);

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn registry() -> UnitTypeRegistry {
        let base = UnitTypeData {
            id: GUNNER,
            name: "gunner".into(),
            health_max: fixed(100),
            shield_max: Fixed::ZERO,
            armor: Fixed::ZERO,
            radius: ratio(1, 2),
            speed: fixed(3),
            is_flying: false,
            attributes: vec![],
            // 14 damage every 1.4 game seconds: 14 DPS.
            weapons: vec![Weapon::new(fixed(5), fixed(14), ratio(14, 10))
                .with_target(TargetClass::Ground)],
            traits: vec![],
        };
        let flyer = UnitTypeData {
            id: FLYER,
            name: "flyer".into(),
            is_flying: true,
            weapons: vec![],
            ..base.clone()
        };
        UnitTypeRegistry::from_types([base, flyer]).expect("registry")
    }

    fn at(id: EntityId, t: UnitTypeId, alliance: Alliance, x: i32) -> CombatEntity {
        CombatEntity::new(id, t, alliance)
            .with_position(Vec2Fixed::from_ints(x, 0))
            .with_health(fixed(100))
    }

    #[test]
    fn test_engagement_radius_uses_config_floor() {
        let registry = registry();
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);
        let unit = at(1, GUNNER, Alliance::Friendly, 0);
        assert_eq!(engagement_radius(&model, &unit), fixed(16));
    }

    #[test]
    fn test_nearby_hostiles_ordering() {
        let registry = registry();
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);
        let unit = at(1, GUNNER, Alliance::Friendly, 0);
        let far = at(10, GUNNER, Alliance::Enemy, 30);
        let harmless = at(11, FLYER, Alliance::Enemy, 4).flying();
        let armed = at(12, GUNNER, Alliance::Enemy, 4);
        let near = at(13, GUNNER, Alliance::Enemy, 2);
        let mut dead = at(14, GUNNER, Alliance::Enemy, 1);
        dead.alive = false;
        let hostiles = [&far, &harmless, &armed, &near, &dead];

        let list = nearby_hostiles(&model, &unit, &hostiles, fixed(16));
        let ids: Vec<_> = list.iter().map(|h| h.entity.id).collect();
        assert_eq!(ids, vec![13, 12, 11]);
        assert!(list[1].returns_fire);
        assert!(!list[2].returns_fire);
        assert_eq!(list[0].edge_distance, Fixed::ONE);
    }

    #[test]
    fn test_time_sentinels() {
        let registry = registry();
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);
        let friend = at(1, GUNNER, Alliance::Friendly, 0);

        let no_hostiles = engagement_times(&model, &[&friend], &[]);
        assert_eq!(no_hostiles.time_to_kill, Fixed::ZERO);
        assert_eq!(no_hostiles.time_to_be_killed, Fixed::MAX);

        let enemy = at(2, GUNNER, Alliance::Enemy, 3);
        let no_friends = engagement_times(&model, &[], &[&enemy]);
        assert_eq!(no_friends.time_to_kill, Fixed::MAX);
        assert_eq!(no_friends.time_to_be_killed, Fixed::ZERO);

        // Ground-only weapons cannot hit the flyer.
        let flyer = at(3, FLYER, Alliance::Enemy, 3).flying();
        assert_eq!(time_to_kill(&model, &[&friend], &[&flyer]), Fixed::MAX);
    }

    #[test]
    fn test_time_to_kill_sums_hit_points() {
        let registry = registry();
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);
        let a = at(1, GUNNER, Alliance::Friendly, 0);
        let b = at(2, GUNNER, Alliance::Friendly, 1);
        let enemy = at(3, GUNNER, Alliance::Enemy, 3).with_shield(fixed(40));
        // 140 hp over 28 DPS.
        let ttk = time_to_kill(&model, &[&a, &b], &[&enemy]);
        assert!((ttk - fixed(5)).abs() < ratio(1, 1000));
    }

    #[test]
    fn test_assess_aggregates() {
        let registry = registry();
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);
        let unit = at(1, GUNNER, Alliance::Friendly, 0);
        let ally = at(2, GUNNER, Alliance::Friendly, 2);
        let distant_ally = at(3, GUNNER, Alliance::Friendly, 60);
        let enemy = at(4, GUNNER, Alliance::Enemy, 6);

        let threat = assess(&model, &unit, &[&enemy], &[&unit, &ally, &distant_ally])
            .expect("positioned unit");
        assert_eq!(threat.allies.len(), 2);
        assert_eq!(threat.hostiles.len(), 1);
        assert!(threat.ally_dps_health > threat.own_dps_health);
        assert_eq!(threat.self_dps_health(), threat.ally_dps_health);
        assert!(threat.enemy_dps_health > Fixed::ZERO);
        assert_eq!(threat.nearest_armed().map(|h| h.entity.id), Some(4));
    }

    #[test]
    fn test_assess_requires_position() {
        let registry = registry();
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);
        let unit = CombatEntity::new(1, GUNNER, Alliance::Friendly);
        assert!(assess(&model, &unit, &[], &[]).is_none());
    }

    #[test]
    fn test_empty_aggregate_is_zero() {
        let registry = registry();
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);
        assert_eq!(local_dps_health(&model, &[], &[GUNNER]), Fixed::ZERO);
    }
}
