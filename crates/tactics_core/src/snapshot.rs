//! The per-tick world snapshot handed to the decision pass.

use serde::{Deserialize, Serialize};

use crate::anchor::ArmyGroup;
use crate::components::{Alliance, AllianceUpgrades, CombatEntity, EntityId};
use crate::math::Vec2Fixed;

/// Playable area of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBounds {
    /// Lowest corner.
    pub min: Vec2Fixed,
    /// Highest corner.
    pub max: Vec2Fixed,
}

impl MapBounds {
    /// Clamp a point into the playable area.
    #[must_use]
    pub fn clamp(&self, point: Vec2Fixed) -> Vec2Fixed {
        point.clamp(self.min, self.max)
    }
}

/// Everything the decision pass may read for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Decision pass counter.
    pub tick: u64,
    /// All observed entities, friendly and hostile.
    pub entities: Vec<CombatEntity>,
    /// Upgrade levels per alliance.
    #[serde(default)]
    pub upgrades: AllianceUpgrades,
    /// Army groups built from membership queries.
    #[serde(default)]
    pub groups: Vec<ArmyGroup>,
    /// Friendly expansions usable as retreat destinations.
    #[serde(default)]
    pub expansions: Vec<Vec2Fixed>,
    /// Army rally point.
    #[serde(default)]
    pub rally_point: Option<Vec2Fixed>,
    /// Playable area, if known.
    #[serde(default)]
    pub map_bounds: Option<MapBounds>,
}

impl WorldSnapshot {
    /// Empty snapshot at `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// Find an entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&CombatEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Alive entities of one alliance in ascending id order.
    #[must_use]
    pub fn alive_sorted(&self, alliance: Alliance) -> Vec<&CombatEntity> {
        let mut list: Vec<_> = self
            .entities
            .iter()
            .filter(|e| e.alive && e.alliance == alliance)
            .collect();
        list.sort_by_key(|e| e.id);
        list
    }

    /// Retreat destinations: expansions then the rally point.
    #[must_use]
    pub fn safe_points(&self) -> Vec<Vec2Fixed> {
        let mut points = self.expansions.clone();
        points.extend(self.rally_point);
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitTypeId;
    use crate::math::Fixed;

    #[test]
    fn test_alive_sorted_filters_and_orders() {
        let mut snapshot = WorldSnapshot::new(3);
        snapshot.entities = vec![
            CombatEntity::new(9, UnitTypeId(1), Alliance::Friendly),
            CombatEntity::new(2, UnitTypeId(1), Alliance::Friendly),
            CombatEntity::new(5, UnitTypeId(1), Alliance::Enemy),
        ];
        let mut dead = CombatEntity::new(1, UnitTypeId(1), Alliance::Friendly);
        dead.alive = false;
        snapshot.entities.push(dead);

        let ids: Vec<_> = snapshot
            .alive_sorted(Alliance::Friendly)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![2, 9]);
        assert!(snapshot.entity(5).is_some());
        assert!(snapshot.entity(6).is_none());
    }

    #[test]
    fn test_safe_points_order() {
        let mut snapshot = WorldSnapshot::new(0);
        snapshot.expansions = vec![Vec2Fixed::from_ints(1, 1)];
        snapshot.rally_point = Some(Vec2Fixed::from_ints(2, 2));
        assert_eq!(
            snapshot.safe_points(),
            vec![Vec2Fixed::from_ints(1, 1), Vec2Fixed::from_ints(2, 2)]
        );
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = MapBounds {
            min: Vec2Fixed::ZERO,
            max: Vec2Fixed::from_ints(100, 80),
        };
        let p = Vec2Fixed::new(Fixed::from_num(120), Fixed::from_num(-3));
        assert_eq!(bounds.clamp(p), Vec2Fixed::from_ints(100, 0));
    }

    #[test]
    fn test_snapshot_from_ron() {
        let text = r#"(
            tick: 4,
            entities: [
                (id: 1, unit_type: (1), alliance: Friendly, position: Some((x: 1.0, y: 2.0)), health: Some(40.0)),
            ],
            rally_point: Some((x: 0.0, y: 0.0)),
        )"#;
        let snapshot: WorldSnapshot = ron::from_str(text).expect("parse snapshot");
        assert_eq!(snapshot.tick, 4);
        assert_eq!(snapshot.entities[0].health, Some(Fixed::from_num(40)));
        assert!(snapshot.groups.is_empty());
    }
}
