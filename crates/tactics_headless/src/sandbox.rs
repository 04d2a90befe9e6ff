//! A minimal deterministic battlefield for exercising the decision engine.
//!
//! The sandbox stands in for the game: it applies friendly intents, drives
//! the enemy side with a simple charge-the-nearest-unit script, resolves
//! weapon fire and reports deaths. It is not a faithful combat simulation,
//! only enough world for the engine's decisions to have consequences.
//!
//! # System Order
//!
//! Each step runs in this order:
//! 1. **Cooldowns** - weapon cooldowns tick down by one decision step
//! 2. **Enemy orders** - every enemy targets the nearest friendly
//! 3. **Movement** - moving and chasing units advance
//! 4. **Combat** - units in range with a ready weapon fire; damage lands together
//! 5. **Health** - dead entities are removed and reported

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use tactics_core::components::{Alliance, CombatEntity, EntityId};
use tactics_core::config::{TacticsConfig, FRAMES_PER_SECOND};
use tactics_core::data::UnitTypeRegistry;
use tactics_core::intents::{IntentBatch, IntentKind};
use tactics_core::lethality::LethalityModel;
use tactics_core::math::{Fixed, Vec2Fixed};
use tactics_core::snapshot::WorldSnapshot;

/// A standing order held by one sandbox unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Walk to a point without engaging.
    Move(Vec2Fixed),
    /// Walk to a point, firing at anything in range.
    AttackMove(Vec2Fixed),
    /// Chase and fire at one unit.
    Attack(EntityId),
}

/// Damage dealt by one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    /// Unit that fired.
    pub attacker: EntityId,
    /// Unit hit.
    pub target: EntityId,
    /// Damage after armor.
    pub damage: Fixed,
}

/// Events generated by one sandbox step.
#[derive(Debug, Clone, Default)]
pub struct StepEvents {
    /// Shots that landed.
    pub damage_events: Vec<DamageEvent>,
    /// Entities destroyed this step, in id order.
    pub deaths: Vec<EntityId>,
}

/// The sandbox world.
#[derive(Debug, Clone)]
pub struct Sandbox {
    world: WorldSnapshot,
    orders: BTreeMap<EntityId, Order>,
}

impl Sandbox {
    /// Start from an opening snapshot.
    #[must_use]
    pub fn new(opening: WorldSnapshot) -> Self {
        Self {
            world: opening,
            orders: BTreeMap::new(),
        }
    }

    /// The world as the next decision pass should see it.
    #[must_use]
    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.world
    }

    /// Tick of the next decision pass.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.world.tick
    }

    /// Current order of a unit.
    #[must_use]
    pub fn order(&self, unit: EntityId) -> Option<Order> {
        self.orders.get(&unit).copied()
    }

    /// Number of living entities on one side.
    #[must_use]
    pub fn alive_count(&self, alliance: Alliance) -> usize {
        self.world.alive_sorted(alliance).len()
    }

    /// The side left standing, once the other is wiped out.
    #[must_use]
    pub fn winner(&self) -> Option<Alliance> {
        let friendly = self.alive_count(Alliance::Friendly);
        let enemy = self.alive_count(Alliance::Enemy);
        match (friendly, enemy) {
            (0, 0) => None,
            (_, 0) => Some(Alliance::Friendly),
            (0, _) => Some(Alliance::Enemy),
            _ => None,
        }
    }

    /// Whether one side has no units left.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.alive_count(Alliance::Friendly) == 0 || self.alive_count(Alliance::Enemy) == 0
    }

    /// Turn friendly intents into standing orders. Orders persist until
    /// replaced, completed or stopped.
    pub fn apply_intents(&mut self, batch: &IntentBatch) {
        for intent in batch.intents() {
            for &unit in &intent.units {
                let friendly = self
                    .world
                    .entity(unit)
                    .is_some_and(|e| e.alive && e.alliance == Alliance::Friendly);
                if !friendly {
                    tracing::warn!(tick = batch.tick, unit, "Intent for unknown or hostile unit ignored");
                    continue;
                }
                let order = match intent.kind {
                    IntentKind::Move => intent.target_position.map(Order::Move),
                    IntentKind::AttackMove => intent.target_position.map(Order::AttackMove),
                    IntentKind::Attack => intent.target_unit.map(Order::Attack),
                    IntentKind::Stop => None,
                };
                match order {
                    Some(order) => {
                        self.orders.insert(unit, order);
                    }
                    None => {
                        self.orders.remove(&unit);
                    }
                }
            }
        }
    }

    /// Advance the world by one decision step.
    pub fn advance(&mut self, registry: &UnitTypeRegistry, config: &TacticsConfig) -> StepEvents {
        let model = LethalityModel::new(registry, self.world.upgrades, config);
        let mut events = StepEvents::default();

        // 1. Cooldowns
        for entity in &mut self.world.entities {
            entity.weapon_cooldown = entity.weapon_cooldown.saturating_sub(config.step_frames);
        }

        // 2. Enemy orders
        self.run_enemy_orders();

        // 3. Movement
        self.run_movement_system(&model, config);

        // 4. Combat
        events.damage_events = self.run_combat_system(&model);

        // 5. Health
        events.deaths = self.run_health_system();

        self.world.tick += 1;
        tracing::debug!(
            tick = self.world.tick,
            shots = events.damage_events.len(),
            deaths = events.deaths.len(),
            "Sandbox step"
        );
        events
    }

    /// Hash of positions, health and cooldowns, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.world.tick.hash(&mut hasher);

        let mut entities: Vec<&CombatEntity> = self.world.entities.iter().collect();
        entities.sort_by_key(|e| e.id);
        entities.len().hash(&mut hasher);
        for entity in entities {
            entity.id.hash(&mut hasher);
            if let Some(position) = entity.position {
                position.x.to_bits().hash(&mut hasher);
                position.y.to_bits().hash(&mut hasher);
            }
            if let Some(health) = entity.health {
                health.to_bits().hash(&mut hasher);
            }
            entity.shield.to_bits().hash(&mut hasher);
            entity.weapon_cooldown.hash(&mut hasher);
        }
        hasher.finish()
    }

    // ========================================================================
    // Systems
    // ========================================================================

    fn run_enemy_orders(&mut self) {
        let friendlies: Vec<(EntityId, Vec2Fixed)> = self
            .world
            .alive_sorted(Alliance::Friendly)
            .iter()
            .filter_map(|f| f.position.map(|p| (f.id, p)))
            .collect();
        let enemies: Vec<(EntityId, Vec2Fixed)> = self
            .world
            .alive_sorted(Alliance::Enemy)
            .iter()
            .filter_map(|e| e.position.map(|p| (e.id, p)))
            .collect();

        for (id, position) in enemies {
            let nearest = friendlies
                .iter()
                .min_by_key(|(fid, fp)| (position.distance_squared(*fp), *fid))
                .map(|(fid, _)| *fid);
            match nearest {
                Some(target) => {
                    self.orders.insert(id, Order::Attack(target));
                }
                None => {
                    self.orders.remove(&id);
                }
            }
        }
    }

    fn run_movement_system(&mut self, model: &LethalityModel<'_>, config: &TacticsConfig) {
        let mut moves: Vec<(EntityId, Vec2Fixed)> = Vec::new();
        let mut finished: Vec<EntityId> = Vec::new();

        for (&id, &order) in &self.orders {
            let Some(entity) = self.live(id) else {
                finished.push(id);
                continue;
            };
            let Some(position) = entity.position else {
                continue;
            };
            let travel = model.travel_per_step(entity);
            let destination = match order {
                Order::Move(to) => {
                    if position.distance(to) <= config.arrival_tolerance {
                        finished.push(id);
                        continue;
                    }
                    to
                }
                Order::AttackMove(to) => {
                    if self.target_in_range(model, entity).is_some() {
                        continue;
                    }
                    if position.distance(to) <= config.arrival_tolerance {
                        finished.push(id);
                        continue;
                    }
                    to
                }
                Order::Attack(target_id) => {
                    let Some(target) = self.live(target_id) else {
                        finished.push(id);
                        continue;
                    };
                    if in_range(model, entity, target) {
                        continue;
                    }
                    let Some(target_position) = target.position else {
                        continue;
                    };
                    target_position
                }
            };
            moves.push((id, position.move_towards(destination, travel)));
        }

        for id in finished {
            self.orders.remove(&id);
        }
        let bounds = self.world.map_bounds;
        for (id, mut to) in moves {
            if let Some(bounds) = bounds {
                to = bounds.clamp(to);
            }
            let order_target = match self.orders.get(&id) {
                Some(Order::Move(p) | Order::AttackMove(p)) => Some(*p),
                Some(Order::Attack(target)) => self.live(*target).and_then(|t| t.position),
                None => None,
            };
            if let Some(entity) = self.world.entities.iter_mut().find(|e| e.id == id) {
                entity.position = Some(to);
                entity.order_target = order_target;
            }
        }
    }

    fn run_combat_system(&mut self, model: &LethalityModel<'_>) -> Vec<DamageEvent> {
        let mut shots: Vec<(DamageEvent, u32)> = Vec::new();

        let mut shooters: Vec<&CombatEntity> = self.world.entities.iter().filter(|e| e.alive).collect();
        shooters.sort_by_key(|e| e.id);
        for attacker in shooters {
            if attacker.weapon_cooldown > 0 || !model.is_combatant(attacker) {
                continue;
            }
            let target = match self.orders.get(&attacker.id) {
                Some(Order::Move(_)) => None,
                Some(Order::Attack(target_id)) => self
                    .live(*target_id)
                    .filter(|t| in_range(model, attacker, t)),
                Some(Order::AttackMove(_)) | None => self.target_in_range(model, attacker),
            };
            let Some(target) = target else {
                continue;
            };
            let damage = model.damage_per_hit(attacker, target);
            shots.push((
                DamageEvent {
                    attacker: attacker.id,
                    target: target.id,
                    damage,
                },
                cooldown_frames(model, attacker, target),
            ));
        }

        let mut incoming: HashMap<EntityId, Fixed> = HashMap::new();
        for (shot, cooldown) in &shots {
            *incoming.entry(shot.target).or_insert(Fixed::ZERO) += shot.damage;
            if let Some(attacker) = self.world.entities.iter_mut().find(|e| e.id == shot.attacker) {
                attacker.weapon_cooldown = *cooldown;
            }
        }
        for entity in &mut self.world.entities {
            if let Some(&damage) = incoming.get(&entity.id) {
                apply_damage(entity, damage);
            }
        }

        shots.into_iter().map(|(shot, _)| shot).collect()
    }

    fn run_health_system(&mut self) -> Vec<EntityId> {
        let mut deaths: Vec<EntityId> = self
            .world
            .entities
            .iter()
            .filter(|e| !e.alive || e.health.is_some_and(|h| h <= Fixed::ZERO))
            .map(|e| e.id)
            .collect();
        deaths.sort_unstable();

        self.world.entities.retain(|e| !deaths.contains(&e.id));
        for id in &deaths {
            self.orders.remove(id);
        }
        for group in &mut self.world.groups {
            group.combat_units.retain(|id| !deaths.contains(id));
            group.support_units.retain(|id| !deaths.contains(id));
        }
        deaths
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn live(&self, id: EntityId) -> Option<&CombatEntity> {
        self.world.entity(id).filter(|e| e.alive)
    }

    /// Nearest attackable opponent already in weapon range, ties by id.
    fn target_in_range<'w>(
        &'w self,
        model: &LethalityModel<'_>,
        attacker: &CombatEntity,
    ) -> Option<&'w CombatEntity> {
        let position = attacker.position?;
        self.world
            .alive_sorted(attacker.alliance.opponent())
            .into_iter()
            .filter(|t| in_range(model, attacker, t))
            .filter_map(|t| t.position.map(|p| (position.distance_squared(p), t)))
            .min_by_key(|(d, t)| (*d, t.id))
            .map(|(_, t)| t)
    }
}

fn in_range(model: &LethalityModel<'_>, attacker: &CombatEntity, target: &CombatEntity) -> bool {
    match (model.range_against(attacker, target), attacker.edge_distance(target)) {
        (Some(range), Some(gap)) => gap <= range,
        _ => false,
    }
}

/// Frames until the fastest weapon able to hit `target` is ready again.
fn cooldown_frames(model: &LethalityModel<'_>, attacker: &CombatEntity, target: &CombatEntity) -> u32 {
    let Some(target_data) = model.registry().get(target.unit_type) else {
        return 0;
    };
    let flying = target.is_flying || target_data.is_flying;
    model
        .profiles(attacker.unit_type, attacker.alliance)
        .iter()
        .filter(|p| p.can_hit(target_data, flying))
        .map(|p| p.period)
        .min()
        .map_or(0, |period| {
            (period * Fixed::from_num(FRAMES_PER_SECOND)).to_num::<u32>()
        })
}

/// Shields absorb damage before health.
fn apply_damage(entity: &mut CombatEntity, damage: Fixed) {
    let absorbed = damage.min(entity.shield);
    entity.shield -= absorbed;
    if let Some(health) = entity.health.as_mut() {
        *health -= damage - absorbed;
    }
    if entity.health.is_some_and(|h| h <= Fixed::ZERO) {
        entity.alive = false;
    }
}
