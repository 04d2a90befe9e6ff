//! Army groups and their anchor ("combat point").
//!
//! Each group moves on one shared destination derived from its anchor: the
//! member closest to the group's target. The designation persists across
//! ticks until the anchor dies, leaves the group, or the target moves.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::components::{CombatEntity, EntityId};
use crate::intents::PendingOrders;
use crate::lethality::LethalityModel;
use crate::math::{Fixed, Vec2Fixed};
use crate::pathing::PathService;

/// Identifier of an army group.
pub type GroupId = u32;

/// Units that fight together, as reported by the membership query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyGroup {
    /// Group id.
    pub id: GroupId,
    /// Combat members.
    #[serde(default)]
    pub combat_units: Vec<EntityId>,
    /// Support members that follow the anchor.
    #[serde(default)]
    pub support_units: Vec<EntityId>,
    /// Attack position chosen by the strategy layer, if any.
    #[serde(default)]
    pub target: Option<Vec2Fixed>,
}

impl ArmyGroup {
    /// New group with combat members.
    #[must_use]
    pub fn new(id: GroupId, combat_units: Vec<EntityId>) -> Self {
        Self {
            id,
            combat_units,
            ..Self::default()
        }
    }

    /// Builder: add support members.
    #[must_use]
    pub fn with_support(mut self, units: Vec<EntityId>) -> Self {
        self.support_units = units;
        self
    }

    /// Builder: set the attack position.
    #[must_use]
    pub fn with_target(mut self, target: Vec2Fixed) -> Self {
        self.target = Some(target);
        self
    }

    /// Whether a unit is a combat member.
    #[must_use]
    pub fn has_combat_member(&self, unit: EntityId) -> bool {
        self.combat_units.contains(&unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AnchorRecord {
    unit: EntityId,
    destination: Option<Vec2Fixed>,
}

/// Anchor designation per group.
#[derive(Debug, Clone, Default)]
pub struct AnchorTable {
    anchors: HashMap<GroupId, AnchorRecord>,
}

impl AnchorTable {
    /// Current anchor of a group.
    #[must_use]
    pub fn anchor(&self, group: GroupId) -> Option<EntityId> {
        self.anchors.get(&group).map(|r| r.unit)
    }

    /// Remember the destination just issued to a group's anchor.
    pub fn record_destination(&mut self, group: GroupId, destination: Vec2Fixed) {
        if let Some(record) = self.anchors.get_mut(&group) {
            record.destination = Some(destination);
        }
    }

    /// Keep or replace the anchor of `group` for a target at `target`.
    ///
    /// `members` are the group's alive combat members from the snapshot.
    /// The current anchor is kept while it is still a member and its most
    /// recent order destination rounds to the target. Otherwise the member
    /// with the shortest path to the target becomes anchor; ground members
    /// without a path are passed over. Returns `None`, and clears the
    /// designation, when no member qualifies.
    pub fn resolve(
        &mut self,
        group: &ArmyGroup,
        target: Vec2Fixed,
        members: &[&CombatEntity],
        path: &dyn PathService,
        pending: &PendingOrders,
    ) -> Option<EntityId> {
        if let Some(record) = self.anchors.get(&group.id).copied() {
            let current = members
                .iter()
                .find(|m| m.id == record.unit && m.alive && group.has_combat_member(m.id));
            if let Some(anchor) = current {
                let destination = pending
                    .get(anchor.id)
                    .and_then(|o| o.target_position)
                    .or(anchor.order_target)
                    .or(record.destination);
                if destination.is_some_and(|d| d.round_to_half() == target.round_to_half()) {
                    return Some(anchor.id);
                }
            }
            self.anchors.remove(&group.id);
        }

        let chosen = members
            .iter()
            .filter(|m| m.alive && group.has_combat_member(m.id))
            .filter_map(|m| {
                let from = m.position?;
                let distance = if m.is_flying {
                    Some(from.distance(target))
                } else {
                    path.path_distance(from, target)
                };
                distance.map(|d| (d, m.id))
            })
            .min()
            .map(|(_, id)| id)?;

        tracing::debug!(group = group.id, anchor = chosen, "Anchor selected");
        self.anchors.insert(
            group.id,
            AnchorRecord {
                unit: chosen,
                destination: None,
            },
        );
        Some(chosen)
    }

    /// Clear every designation held by a unit.
    pub fn on_unit_destroyed(&mut self, unit: EntityId) {
        self.anchors.retain(|_, r| r.unit != unit);
    }

    /// Drop designations of groups that no longer exist.
    pub fn retain_groups(&mut self, groups: &[ArmyGroup]) {
        let live: HashSet<_> = groups.iter().map(|g| g.id).collect();
        self.anchors.retain(|id, _| live.contains(id));
    }

    /// Number of designated anchors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether no group has an anchor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Drop every designation.
    pub fn clear(&mut self) {
        self.anchors.clear();
    }
}

/// Destination shared by a group's members.
///
/// The anchor's position while the anchor is still out of weapon range of
/// the target, the target position once it is in range.
#[must_use]
pub fn shared_destination(
    model: &LethalityModel<'_>,
    anchor: &CombatEntity,
    target: Vec2Fixed,
    target_entity: Option<&CombatEntity>,
) -> Vec2Fixed {
    let Some(position) = anchor.position else {
        return target;
    };
    let edge = target_entity
        .and_then(|t| anchor.edge_distance(t))
        .unwrap_or_else(|| (position.distance(target) - anchor.radius).max(Fixed::ZERO));
    if edge > model.max_range(anchor.unit_type) {
        position
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Alliance, AllianceUpgrades, UnitTypeId};
    use crate::config::TacticsConfig;
    use crate::data::{UnitTypeData, UnitTypeRegistry, Weapon};
    use crate::intents::UnitIntent;
    use crate::math::ratio;
    use crate::pathing::{NavGrid, StraightLine};

    const TROOPER: UnitTypeId = UnitTypeId(1);

    fn member(id: EntityId, x: i32, y: i32) -> CombatEntity {
        CombatEntity::new(id, TROOPER, Alliance::Friendly)
            .with_position(Vec2Fixed::from_ints(x, y))
            .with_health(Fixed::from_num(50))
    }

    #[test]
    fn test_selects_closest_member() {
        let mut table = AnchorTable::default();
        let group = ArmyGroup::new(1, vec![1, 2, 3]);
        let (a, b, c) = (member(1, 0, 0), member(2, 8, 0), member(3, 5, 0));
        let target = Vec2Fixed::from_ints(10, 0);
        let anchor = table.resolve(&group, target, &[&a, &b, &c], &StraightLine, &PendingOrders::new());
        assert_eq!(anchor, Some(2));
        assert_eq!(table.anchor(1), Some(2));
    }

    #[test]
    fn test_keeps_anchor_while_destination_matches() {
        let mut table = AnchorTable::default();
        let group = ArmyGroup::new(1, vec![1, 2]);
        let target = Vec2Fixed::from_ints(10, 0);
        let (a, b) = (member(1, 0, 0), member(2, 8, 0));
        let mut pending = PendingOrders::new();
        assert_eq!(table.resolve(&group, target, &[&a, &b], &StraightLine, &pending), Some(2));
        pending.record(&UnitIntent::attack_move(vec![2], target), 1);

        // Member 1 is now closer, but the anchor's order still matches.
        let (a, b) = (member(1, 9, 0), member(2, 2, 0));
        assert_eq!(table.resolve(&group, target, &[&a, &b], &StraightLine, &pending), Some(2));

        // The target moved by more than the rounding tolerance.
        let moved = Vec2Fixed::from_ints(12, 0);
        assert_eq!(table.resolve(&group, moved, &[&a, &b], &StraightLine, &pending), Some(1));
    }

    #[test]
    fn test_recorded_destination_keeps_anchor() {
        let mut table = AnchorTable::default();
        let group = ArmyGroup::new(1, vec![1, 2]);
        let target = Vec2Fixed::new(Fixed::from_num(10), ratio(1, 10));
        let (a, b) = (member(1, 0, 0), member(2, 8, 0));
        let pending = PendingOrders::new();
        assert_eq!(table.resolve(&group, target, &[&a, &b], &StraightLine, &pending), Some(2));
        table.record_destination(1, Vec2Fixed::from_ints(10, 0));

        let (a, b) = (member(1, 9, 0), member(2, 2, 0));
        assert_eq!(table.resolve(&group, target, &[&a, &b], &StraightLine, &pending), Some(2));
    }

    #[test]
    fn test_dead_anchor_replaced_by_single_new_one() {
        let mut table = AnchorTable::default();
        let group = ArmyGroup::new(1, vec![1, 2, 3]);
        let target = Vec2Fixed::from_ints(10, 0);
        let (a, b, c) = (member(1, 0, 0), member(2, 8, 0), member(3, 5, 0));
        let pending = PendingOrders::new();
        table.resolve(&group, target, &[&a, &b, &c], &StraightLine, &pending);
        table.record_destination(1, target);

        table.on_unit_destroyed(2);
        assert!(table.anchor(1).is_none());
        let anchor = table.resolve(&group, target, &[&a, &c], &StraightLine, &pending);
        assert_eq!(anchor, Some(3));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unpathable_members_ineligible() {
        let grid = NavGrid::from_rows(&["..#..", "..#..", "..#.."], Fixed::ONE).expect("grid");
        let mut table = AnchorTable::default();
        let group = ArmyGroup::new(7, vec![1]);
        let walled = member(1, 0, 1);
        let target = Vec2Fixed::from_ints(4, 1);
        let anchor = table.resolve(&group, target, &[&walled], &grid, &PendingOrders::new());
        assert_eq!(anchor, None);
        assert!(table.is_empty());

        let flyer = member(1, 0, 1).flying();
        let anchor = table.resolve(&group, target, &[&flyer], &grid, &PendingOrders::new());
        assert_eq!(anchor, Some(1));
    }

    #[test]
    fn test_retain_groups_drops_stale() {
        let mut table = AnchorTable::default();
        let target = Vec2Fixed::from_ints(3, 3);
        let a = member(1, 0, 0);
        let b = member(2, 1, 1);
        let pending = PendingOrders::new();
        table.resolve(&ArmyGroup::new(1, vec![1]), target, &[&a], &StraightLine, &pending);
        table.resolve(&ArmyGroup::new(2, vec![2]), target, &[&b], &StraightLine, &pending);
        table.retain_groups(&[ArmyGroup::new(2, vec![2])]);
        assert_eq!(table.anchor(1), None);
        assert_eq!(table.anchor(2), Some(2));
    }

    #[test]
    fn test_shared_destination_clamps_to_anchor() {
        let mut trooper = UnitTypeData {
            id: TROOPER,
            name: "trooper".into(),
            health_max: Fixed::from_num(50),
            shield_max: Fixed::ZERO,
            armor: Fixed::ZERO,
            radius: ratio(1, 2),
            speed: Fixed::from_num(3),
            is_flying: false,
            attributes: vec![],
            weapons: vec![],
            traits: vec![],
        };
        trooper
            .weapons
            .push(Weapon::new(Fixed::from_num(5), Fixed::from_num(6), Fixed::ONE));
        let registry = UnitTypeRegistry::from_types([trooper]).expect("registry");
        let config = TacticsConfig::default();
        let model = LethalityModel::new(&registry, AllianceUpgrades::default(), &config);

        let anchor = member(1, 0, 0);
        let far = Vec2Fixed::from_ints(20, 0);
        assert_eq!(shared_destination(&model, &anchor, far, None), Vec2Fixed::ZERO);
        let near = Vec2Fixed::from_ints(4, 0);
        assert_eq!(shared_destination(&model, &anchor, near, None), near);
    }
}
