//! The per-tick decision pass.
//!
//! One call to [`decide`] reads one snapshot and produces one ordered
//! [`IntentBatch`]. Army groups are coordinated first, in group id order,
//! then every remaining friendly unit is decided on its own in entity id
//! order. Nothing in the pass fails: units missing data are skipped and the
//! reason is logged.

use std::collections::HashSet;

use crate::anchor::{shared_destination, ArmyGroup};
use crate::components::{Alliance, CombatEntity, EntityId};
use crate::config::TacticsConfig;
use crate::data::{UnitTrait, UnitTypeRegistry};
use crate::engagement::{evaluate, EngagementDecision, EngagementState};
use crate::error::SkipReason;
use crate::intents::{IntentBatch, PendingOrders, UnitIntent};
use crate::kiting::kite;
use crate::lethality::LethalityModel;
use crate::math::Vec2Fixed;
use crate::pathing::PathService;
use crate::retreat::retreat_destination;
use crate::snapshot::WorldSnapshot;
use crate::state::TacticalState;
use crate::targeting::{focus_target, is_changeling, select_target, FocusLedger};
use crate::threat::{assess, engagement_radius, LocalThreat, NearbyHostile};
use crate::tracking::SightingMemory;

/// Everything one unit's decision was based on.
#[derive(Debug, Clone)]
pub struct Evaluation<'a> {
    /// The unit.
    pub unit: &'a CombatEntity,
    /// Its threat picture.
    pub threat: LocalThreat<'a>,
    /// Selected target.
    pub target: Option<NearbyHostile<'a>>,
    /// Resulting decision.
    pub decision: EngagementDecision,
}

/// Read-only view of one tick shared by every unit decision.
pub struct TickContext<'a> {
    /// Lethality model for this tick's upgrades.
    pub model: LethalityModel<'a>,
    /// Path service.
    pub path: &'a dyn PathService,
    /// Snapshot being decided.
    pub snapshot: &'a WorldSnapshot,
    /// Visible hostiles plus remembered ones with a fresh projection.
    pub hostiles: Vec<&'a CombatEntity>,
    /// Remembered hostiles whose position is too old to trust.
    pub unresolved: Vec<&'a CombatEntity>,
    /// Alive friendlies in id order.
    pub friendlies: Vec<&'a CombatEntity>,
}

impl<'a> TickContext<'a> {
    /// Build the context for one snapshot.
    ///
    /// `presumed` holds remembered hostiles not visible this tick, paired
    /// with whether their sighting is stale.
    #[must_use]
    pub fn new(
        snapshot: &'a WorldSnapshot,
        registry: &'a UnitTypeRegistry,
        config: &'a TacticsConfig,
        path: &'a dyn PathService,
        presumed: &'a [(CombatEntity, bool)],
    ) -> Self {
        let mut hostiles: Vec<_> = snapshot
            .alive_sorted(Alliance::Enemy)
            .into_iter()
            .filter(|e| e.position.is_some())
            .collect();
        hostiles.extend(presumed.iter().filter(|(_, stale)| !*stale).map(|(e, _)| e));
        let unresolved = presumed
            .iter()
            .filter(|(_, stale)| *stale)
            .map(|(e, _)| e)
            .collect();
        Self {
            model: LethalityModel::new(registry, snapshot.upgrades, config),
            path,
            snapshot,
            hostiles,
            unresolved,
            friendlies: snapshot.alive_sorted(Alliance::Friendly),
        }
    }

    fn config(&self) -> &'a TacticsConfig {
        self.model.config()
    }

    /// Friendly entity by id.
    #[must_use]
    pub fn friendly(&self, id: EntityId) -> Option<&'a CombatEntity> {
        self.friendlies.iter().copied().find(|e| e.id == id)
    }

    fn check_data(&self, unit: &CombatEntity) -> Result<(), SkipReason> {
        if unit.position.is_none() {
            return Err(SkipReason::MissingPosition);
        }
        if unit.health.is_none() {
            return Err(SkipReason::MissingHealth);
        }
        if self.model.registry().get(unit.unit_type).is_none() {
            return Err(SkipReason::UnknownUnitType);
        }
        if self.model.has_trait(unit, UnitTrait::Worker) {
            return Err(SkipReason::Worker);
        }
        if !self.model.is_combatant(unit) {
            return Err(SkipReason::NotCombatant);
        }
        Ok(())
    }

    /// Whether a stale hostile is closer than anything the unit can target.
    fn blocked_by_unresolved(&self, unit: &CombatEntity, target: Option<&NearbyHostile<'_>>) -> bool {
        let radius = engagement_radius(&self.model, unit);
        self.unresolved
            .iter()
            .filter_map(|h| unit.edge_distance(h))
            .filter(|&edge| edge <= radius)
            .any(|edge| match target {
                Some(t) => edge < t.edge_distance,
                None => true,
            })
    }

    /// Assess, pick a target and evaluate the engagement state of one unit.
    pub fn evaluate_unit(
        &self,
        unit: &'a CombatEntity,
        state: &TacticalState,
    ) -> Result<Evaluation<'a>, SkipReason> {
        self.check_data(unit)?;
        let threat = assess(&self.model, unit, &self.hostiles, &self.friendlies)
            .ok_or(SkipReason::MissingPosition)?;
        let target = select_target(&self.model, self.path, unit, &threat.hostiles);
        if self.blocked_by_unresolved(unit, target.as_ref()) {
            return Err(SkipReason::UnresolvedThreat);
        }
        let decision = evaluate(
            &self.model,
            unit,
            &threat,
            target.as_ref(),
            state.units.get(unit.id),
        );
        Ok(Evaluation {
            unit,
            threat,
            target,
            decision,
        })
    }

    fn log_skip(&self, unit: &CombatEntity, reason: SkipReason) {
        if reason == SkipReason::UnknownUnitType {
            tracing::warn!(
                tick = self.snapshot.tick,
                unit = unit.id,
                unit_type = %unit.unit_type,
                "Skipping unit with unregistered type"
            );
        } else {
            tracing::debug!(tick = self.snapshot.tick, unit = unit.id, reason = %reason, "Unit skipped");
        }
    }

    /// Intent for a unit deciding on its own.
    ///
    /// `regroup` is where an idle unit gathers: the anchor for grouped
    /// units, the rally point otherwise.
    pub fn individual_intent(
        &self,
        eval: &Evaluation<'a>,
        pending: &PendingOrders,
        ledger: &mut FocusLedger,
        regroup: Option<Vec2Fixed>,
    ) -> Option<UnitIntent> {
        let unit = eval.unit;
        if let Some(target) = eval.target {
            if is_changeling(&self.model, target.entity) {
                return Some(UnitIntent::attack(unit.id, target.entity.id));
            }
        }
        match eval.decision.state {
            EngagementState::Idle => {
                let point = regroup?;
                let position = unit.position?;
                (position.distance(point) > self.config().regroup_distance)
                    .then(|| UnitIntent::move_to(unit.id, point))
            }
            EngagementState::Approaching => {
                let destination = eval.target?.entity.position?;
                Some(UnitIntent::attack_move(vec![unit.id], destination))
            }
            EngagementState::Attacking => {
                let fallback = eval.target?.entity;
                let chosen = focus_target(&self.model, ledger, unit, &eval.threat, fallback);
                ledger.assign(chosen.id, self.model.damage_per_hit(unit, chosen));
                Some(UnitIntent::attack(unit.id, chosen.id))
            }
            EngagementState::Kiting => kite(&self.model, pending, unit, eval.target?.entity),
            EngagementState::Retreating => {
                let destination = retreat_destination(
                    &self.model,
                    self.path,
                    unit,
                    &eval.threat.hostiles,
                    &self.snapshot.safe_points(),
                    self.snapshot.map_bounds,
                )?;
                Some(UnitIntent::move_to(unit.id, destination))
            }
        }
    }
}

// ============================================================================
// Group Coordination
// ============================================================================

/// Target entity and attack position of a group for this tick.
fn group_target<'a>(
    group: &ArmyGroup,
    evaluations: &[Evaluation<'a>],
) -> Option<(Vec2Fixed, Option<&'a CombatEntity>)> {
    let positions: Vec<_> = evaluations.iter().filter_map(|e| e.unit.position).collect();
    let reference = group.target.or_else(|| Vec2Fixed::centroid(&positions))?;
    let entity = evaluations
        .iter()
        .filter_map(|e| e.target.map(|t| t.entity))
        .filter_map(|t| Some((t.position?.distance(reference), t.id, t)))
        .min_by_key(|(distance, id, _)| (*distance, *id))
        .map(|(_, _, t)| t);
    let position = group.target.or_else(|| entity.and_then(|t| t.position))?;
    Some((position, entity))
}

fn coordinate_group<'a>(
    ctx: &TickContext<'a>,
    group: &ArmyGroup,
    state: &mut TacticalState,
    ledger: &mut FocusLedger,
    batch: &mut IntentBatch,
    handled: &mut HashSet<EntityId>,
) {
    let tick = ctx.snapshot.tick;
    let mut member_ids = group.combat_units.clone();
    member_ids.sort_unstable();
    member_ids.dedup();
    let members: Vec<&CombatEntity> = member_ids.iter().filter_map(|&id| ctx.friendly(id)).collect();

    let mut evaluations = Vec::with_capacity(members.len());
    for &unit in &members {
        if !handled.insert(unit.id) {
            continue;
        }
        match ctx.evaluate_unit(unit, state) {
            Ok(eval) => evaluations.push(eval),
            Err(reason) => ctx.log_skip(unit, reason),
        }
    }

    let target = group_target(group, &evaluations);
    let anchor = target.and_then(|(position, _)| {
        let eligible: Vec<_> = evaluations.iter().map(|e| e.unit).collect();
        state
            .anchors
            .resolve(group, position, &eligible, ctx.path, &state.pending)
    });

    let mut gather = Vec::new();
    let anchor_entity = anchor.and_then(|id| ctx.friendly(id));
    match (target, anchor_entity) {
        (Some((position, target_entity)), Some(anchor_unit)) => {
            let changeling = target_entity
                .filter(|t| is_changeling(&ctx.model, t) && ctx.model.can_attack(anchor_unit, t));
            match changeling {
                Some(mimic) => {
                    batch.push(UnitIntent::attack(anchor_unit.id, mimic.id));
                    for eval in &evaluations {
                        let unit = eval.unit;
                        if unit.unit_type == anchor_unit.unit_type && ctx.model.can_attack(unit, mimic) {
                            batch.push(UnitIntent::attack(unit.id, mimic.id));
                        }
                    }
                }
                None => {
                    batch.push(UnitIntent::attack_move(vec![anchor_unit.id], position));
                    state.anchors.record_destination(group.id, position);
                }
            }
            tracing::debug!(tick, group = group.id, anchor = anchor_unit.id, "Group coordinated");

            let shared = shared_destination(&ctx.model, anchor_unit, position, target_entity);
            for eval in &evaluations {
                if batch.is_commanded(eval.unit.id) {
                    continue;
                }
                let micro = match eval.decision.state {
                    EngagementState::Kiting | EngagementState::Retreating => true,
                    EngagementState::Attacking => {
                        eval.decision.target_in_range && !ctx.model.is_melee(eval.unit)
                    }
                    EngagementState::Idle | EngagementState::Approaching => false,
                };
                if micro {
                    if let Some(intent) =
                        ctx.individual_intent(eval, &state.pending, ledger, anchor_unit.position)
                    {
                        batch.push(intent);
                    }
                } else {
                    gather.push(eval.unit.id);
                }
            }
            if !gather.is_empty() {
                batch.push(UnitIntent::attack_move(gather, shared));
            }
        }
        _ => {
            let regroup = state
                .anchors
                .anchor(group.id)
                .and_then(|id| ctx.friendly(id))
                .and_then(|a| a.position)
                .or(ctx.snapshot.rally_point);
            for eval in &evaluations {
                if let Some(intent) = ctx.individual_intent(eval, &state.pending, ledger, regroup) {
                    batch.push(intent);
                }
            }
        }
    }

    let follow_point = anchor_entity.and_then(|a| a.position);
    for &id in &group.support_units {
        if !handled.insert(id) {
            continue;
        }
        let (Some(point), Some(support)) = (follow_point, ctx.friendly(id)) else {
            continue;
        };
        let Some(position) = support.position else {
            continue;
        };
        if position.distance(point) > ctx.config().regroup_distance {
            batch.push(UnitIntent::move_to(id, point));
        }
    }

    for eval in &evaluations {
        state.units.update(eval.unit.id, eval.decision.state, tick);
    }
}

// ============================================================================
// Decision Pass
// ============================================================================

/// Run one decision pass over a snapshot.
///
/// Updates sighting memory and the cross-tick state, and returns the ordered
/// intents for this tick with redundant re-issues removed.
pub fn decide(
    snapshot: &WorldSnapshot,
    registry: &UnitTypeRegistry,
    config: &TacticsConfig,
    path: &dyn PathService,
    memory: &mut dyn SightingMemory,
    state: &mut TacticalState,
) -> IntentBatch {
    let tick = snapshot.tick;
    memory.observe(snapshot, config.sight_range);
    state.pending.expire(tick, config.pending_order_ticks);
    state.units.prune(tick, config.sighting_stale_ticks);
    state.anchors.retain_groups(&snapshot.groups);
    for dead in snapshot
        .entities
        .iter()
        .filter(|e| !e.alive && e.alliance == Alliance::Friendly)
    {
        state.on_unit_destroyed(dead.id);
    }

    let presumed: Vec<(CombatEntity, bool)> = memory
        .presumed_hostiles(tick, config.sighting_stale_ticks)
        .into_iter()
        .map(|p| (p.entity, p.stale))
        .collect();
    let ctx = TickContext::new(snapshot, registry, config, path, &presumed);

    let mut batch = IntentBatch::new(tick);
    let mut ledger = FocusLedger::new();
    let mut handled = HashSet::new();

    let mut groups: Vec<&ArmyGroup> = snapshot.groups.iter().collect();
    groups.sort_by_key(|g| g.id);
    for group in groups {
        coordinate_group(&ctx, group, state, &mut ledger, &mut batch, &mut handled);
    }

    for &unit in &ctx.friendlies {
        if !handled.insert(unit.id) {
            continue;
        }
        match ctx.evaluate_unit(unit, state) {
            Ok(eval) => {
                if let Some(intent) =
                    ctx.individual_intent(&eval, &state.pending, &mut ledger, snapshot.rally_point)
                {
                    batch.push(intent);
                }
                state.units.update(unit.id, eval.decision.state, tick);
            }
            Err(reason) => ctx.log_skip(unit, reason),
        }
    }

    let issued = batch.len();
    batch.suppress_redundant(&mut state.pending, config.pending_order_ticks);
    tracing::debug!(
        tick,
        hostiles = ctx.hostiles.len(),
        unresolved = ctx.unresolved.len(),
        issued,
        sent = batch.len(),
        "Decision pass complete"
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitTypeId;
    use crate::data::{UnitTypeData, Weapon};
    use crate::intents::IntentKind;
    use crate::math::{ratio, Fixed};
    use crate::pathing::{NavGrid, StraightLine};
    use crate::tracking::EnemyMemory;

    const MARINE: UnitTypeId = UnitTypeId(1);
    const PROBE: UnitTypeId = UnitTypeId(2);
    const MEDIC: UnitTypeId = UnitTypeId(3);

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn registry() -> UnitTypeRegistry {
        let marine = UnitTypeData {
            id: MARINE,
            name: "marine".into(),
            health_max: fixed(45),
            shield_max: Fixed::ZERO,
            armor: Fixed::ZERO,
            radius: ratio(1, 2),
            speed: fixed(3),
            is_flying: false,
            attributes: vec![],
            weapons: vec![Weapon::new(fixed(5), fixed(6), ratio(86, 100))],
            traits: vec![],
        };
        let probe = UnitTypeData {
            id: PROBE,
            name: "probe".into(),
            traits: vec![UnitTrait::Worker],
            ..marine.clone()
        };
        let medic = UnitTypeData {
            id: MEDIC,
            name: "medic".into(),
            weapons: vec![],
            traits: vec![UnitTrait::Support],
            ..marine.clone()
        };
        UnitTypeRegistry::from_types([marine, probe, medic]).expect("registry")
    }

    fn unit(id: EntityId, t: UnitTypeId, alliance: Alliance, x: i32, y: i32) -> CombatEntity {
        CombatEntity::new(id, t, alliance)
            .with_position(Vec2Fixed::from_ints(x, y))
            .with_health(fixed(45))
    }

    fn run(snapshot: &WorldSnapshot, state: &mut TacticalState, memory: &mut EnemyMemory) -> IntentBatch {
        let registry = registry();
        let config = TacticsConfig::default();
        decide(snapshot, &registry, &config, &StraightLine, memory, state)
    }

    #[test]
    fn test_skips_workers_and_missing_data() {
        let mut snapshot = WorldSnapshot::new(1);
        snapshot.entities = vec![
            unit(1, PROBE, Alliance::Friendly, 0, 0),
            CombatEntity::new(2, MARINE, Alliance::Friendly),
            CombatEntity::new(3, MARINE, Alliance::Friendly).with_position(Vec2Fixed::ZERO),
            unit(4, UnitTypeId(99), Alliance::Friendly, 0, 0),
            unit(10, MARINE, Alliance::Enemy, 3, 0),
        ];
        let mut state = TacticalState::new();
        let batch = run(&snapshot, &mut state, &mut EnemyMemory::new());
        assert!(batch.is_empty());
        assert!(state.units.is_empty());
    }

    #[test]
    fn test_ungrouped_attack_and_regroup() {
        let mut snapshot = WorldSnapshot::new(1);
        snapshot.rally_point = Some(Vec2Fixed::from_ints(50, 50));
        snapshot.entities = vec![
            unit(1, MARINE, Alliance::Friendly, 0, 0),
            unit(2, MARINE, Alliance::Friendly, 1, 0),
            unit(3, MARINE, Alliance::Friendly, 100, 100),
            unit(10, MARINE, Alliance::Enemy, 4, 0),
        ];
        let mut state = TacticalState::new();
        let batch = run(&snapshot, &mut state, &mut EnemyMemory::new());

        assert_eq!(batch.for_unit(1).map(|i| i.kind), Some(IntentKind::Attack));
        assert_eq!(batch.for_unit(2).map(|i| i.kind), Some(IntentKind::Attack));
        let idle = batch.for_unit(3).expect("idle unit regroups");
        assert_eq!(idle.kind, IntentKind::Move);
        assert_eq!(idle.target_position, snapshot.rally_point);
        assert_eq!(state.units.get(1).map(|s| s.state), Some(EngagementState::Attacking));
        assert_eq!(state.units.get(3).map(|s| s.state), Some(EngagementState::Idle));
    }

    #[test]
    fn test_group_follows_anchor_and_support_follows() {
        let mut snapshot = WorldSnapshot::new(1);
        snapshot.entities = vec![
            unit(1, MARINE, Alliance::Friendly, 0, 0),
            unit(2, MARINE, Alliance::Friendly, 2, 0),
            unit(3, MEDIC, Alliance::Friendly, -10, 0),
            unit(10, MARINE, Alliance::Enemy, 15, 0),
        ];
        snapshot.groups = vec![ArmyGroup::new(1, vec![1, 2]).with_support(vec![3])];
        let mut state = TacticalState::new();
        let batch = run(&snapshot, &mut state, &mut EnemyMemory::new());

        assert_eq!(state.anchors.anchor(1), Some(2));
        let anchor = batch.for_unit(2).expect("anchor intent");
        assert_eq!(anchor.kind, IntentKind::AttackMove);
        assert_eq!(anchor.target_position, Some(Vec2Fixed::from_ints(15, 0)));

        // Out of range: the others gather on the anchor.
        let member = batch.for_unit(1).expect("member intent");
        assert_eq!(member.kind, IntentKind::AttackMove);
        assert_eq!(member.target_position, Some(Vec2Fixed::from_ints(2, 0)));

        let support = batch.for_unit(3).expect("support intent");
        assert_eq!(support.kind, IntentKind::Move);
        assert_eq!(support.target_position, Some(Vec2Fixed::from_ints(2, 0)));
    }

    #[test]
    fn test_stale_hostile_out_of_sight_blocks_decision() {
        let mut memory = EnemyMemory::new();
        let mut state = TacticalState::new();
        let mut first = WorldSnapshot::new(1);
        first.entities = vec![
            unit(1, MARINE, Alliance::Friendly, 0, 0),
            unit(10, MARINE, Alliance::Enemy, 9, 0),
        ];
        run(&first, &mut state, &mut memory);

        let mut later = WorldSnapshot::new(100);
        later.entities = vec![unit(1, MARINE, Alliance::Friendly, 0, 0)];
        later.rally_point = Some(Vec2Fixed::from_ints(30, 0));
        let batch = run(&later, &mut state, &mut memory);
        assert!(batch.for_unit(1).is_none());
    }

    #[test]
    fn test_unit_on_stale_sighting_regroups() {
        let mut memory = EnemyMemory::new();
        let mut state = TacticalState::new();
        let mut first = WorldSnapshot::new(1);
        first.entities = vec![
            unit(1, MARINE, Alliance::Friendly, 0, 0),
            unit(10, MARINE, Alliance::Enemy, 6, 0),
        ];
        run(&first, &mut state, &mut memory);

        let rally = Vec2Fixed::from_ints(60, 0);
        let mut commanded_ticks = 0;
        for tick in 2..=200 {
            let mut frame = WorldSnapshot::new(tick);
            frame.entities = vec![unit(1, MARINE, Alliance::Friendly, 6, 0)];
            frame.rally_point = Some(rally);
            let batch = run(&frame, &mut state, &mut memory);
            if batch.for_unit(1).is_some() {
                commanded_ticks += 1;
            }
            if tick == 2 {
                let intent = batch.for_unit(1).expect("regroup intent");
                assert_eq!(intent.kind, IntentKind::Move);
                assert_eq!(intent.target_position, Some(rally));
            }
        }
        assert!(memory.is_empty());
        assert_eq!(state.units.get(1).map(|s| s.state), Some(EngagementState::Idle));
        // The pending memo holds back every other repeat of the same move.
        assert!(commanded_ticks >= 90, "commanded on {commanded_ticks} ticks");
    }

    #[test]
    fn test_group_without_reachable_anchor_decides_individually() {
        // A wall at x = 5 cuts the group off from its target.
        let rows: Vec<String> = (0..5).map(|_| ".....#....".to_string()).collect();
        let grid = NavGrid::from_rows(&rows, Fixed::ONE).expect("grid");
        let mut snapshot = WorldSnapshot::new(1);
        snapshot.entities = vec![
            unit(1, MARINE, Alliance::Friendly, 2, 2),
            unit(2, MARINE, Alliance::Friendly, 3, 2),
            unit(10, MARINE, Alliance::Enemy, 7, 2),
        ];
        snapshot.groups = vec![ArmyGroup::new(1, vec![1, 2])];

        let registry = registry();
        let config = TacticsConfig::default();
        let mut state = TacticalState::new();
        let mut memory = EnemyMemory::new();
        let batch = decide(&snapshot, &registry, &config, &grid, &mut memory, &mut state);

        assert_eq!(state.anchors.anchor(1), None);
        assert!(batch.intents().iter().all(|i| i.kind != IntentKind::AttackMove));
        for id in [1, 2] {
            let intent = batch.for_unit(id).expect("member decides on its own");
            assert_eq!(intent.units, vec![id]);
            assert_eq!(intent.kind, IntentKind::Attack);
            assert_eq!(intent.target_unit, Some(10));
        }
    }

    #[test]
    fn test_one_intent_per_unit() {
        let mut snapshot = WorldSnapshot::new(1);
        snapshot.entities = (1..=6)
            .map(|id| unit(id, MARINE, Alliance::Friendly, i32::try_from(id).unwrap_or(0), 0))
            .chain((10..=12).map(|id| unit(id, MARINE, Alliance::Enemy, 8, 0)))
            .collect();
        snapshot.groups = vec![ArmyGroup::new(1, vec![1, 2, 3]), ArmyGroup::new(2, vec![3, 4])];
        let mut state = TacticalState::new();
        let batch = run(&snapshot, &mut state, &mut EnemyMemory::new());

        let mut seen = HashSet::new();
        for intent in batch.intents() {
            for id in &intent.units {
                assert!(seen.insert(*id), "unit {id} commanded twice");
            }
        }
    }
}
