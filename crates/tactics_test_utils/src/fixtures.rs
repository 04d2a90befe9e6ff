//! Test fixtures and helpers.
//!
//! A small built-in unit roster plus entity and snapshot builders for
//! consistent testing across crates.

use std::sync::OnceLock;

use fixed::types::I32F32;
use tactics_core::anchor::ArmyGroup;
use tactics_core::components::{Alliance, CombatEntity, EntityId, UnitTypeId};
use tactics_core::data::UnitTypeRegistry;
use tactics_core::math::Vec2Fixed;
use tactics_core::snapshot::WorldSnapshot;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In decision code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Assert two fixed-point values agree to within 1/100000.
///
/// # Panics
///
/// Panics when the values differ by more than the tolerance.
pub fn assert_close(actual: I32F32, expected: I32F32) {
    let epsilon = I32F32::ONE / I32F32::from_num(100_000);
    assert!(
        (actual - expected).abs() <= epsilon,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Roster
// ============================================================================

/// Ranged infantry: 100 hp, range 5, 10 dps, hits ground and air.
pub const RANGER: UnitTypeId = UnitTypeId(1);
/// Melee bruiser: 150 hp, 8 dps, slower than a ranger.
pub const BRUTE: UnitTypeId = UnitTypeId(2);
/// Ranged gunner: 80 hp, range 6, 12 dps.
pub const GUNNER: UnitTypeId = UnitTypeId(3);
/// Economy unit.
pub const WORKER: UnitTypeId = UnitTypeId(4);
/// Unarmed escort that follows the army.
pub const MEDIC: UnitTypeId = UnitTypeId(5);
/// Harmless enemy scout.
pub const CHANGELING: UnitTypeId = UnitTypeId(6);
/// Flying gunship.
pub const GUNSHIP: UnitTypeId = UnitTypeId(7);
/// Slow splash artillery.
pub const SPLASHER: UnitTypeId = UnitTypeId(8);

/// The built-in roster as RON.
///
/// Weapon periods of 1.4 make each weapon's DPS equal its damage.
pub const ROSTER_RON: &str = r#"[
    UnitTypeData(
        id: (1),
        name: "ranger",
        health_max: 100.0,
        radius: 0.5,
        speed: 4.0,
        attributes: [Light, Biological],
        weapons: [Weapon(range: 5.0, damage: 10.0, period: 1.4, target: Any)],
    ),
    UnitTypeData(
        id: (2),
        name: "brute",
        health_max: 150.0,
        radius: 0.5,
        speed: 2.5,
        attributes: [Light, Biological],
        weapons: [Weapon(range: 0.1, damage: 8.0, period: 1.4)],
    ),
    UnitTypeData(
        id: (3),
        name: "gunner",
        health_max: 80.0,
        radius: 0.5,
        speed: 3.0,
        attributes: [Armored, Mechanical],
        weapons: [Weapon(range: 6.0, damage: 12.0, period: 1.4)],
    ),
    UnitTypeData(
        id: (4),
        name: "worker",
        health_max: 40.0,
        radius: 0.5,
        speed: 3.0,
        attributes: [Light, Biological],
        weapons: [Weapon(range: 0.1, damage: 5.0, period: 1.5)],
        traits: [Worker],
    ),
    UnitTypeData(
        id: (5),
        name: "medic",
        health_max: 60.0,
        radius: 0.5,
        speed: 3.0,
        attributes: [Light, Biological],
        traits: [Support],
    ),
    UnitTypeData(
        id: (6),
        name: "changeling",
        health_max: 5.0,
        radius: 0.5,
        speed: 3.0,
        attributes: [Light, Biological],
        traits: [Changeling],
    ),
    UnitTypeData(
        id: (7),
        name: "gunship",
        health_max: 140.0,
        armor: 1.0,
        radius: 0.5,
        speed: 3.5,
        is_flying: true,
        attributes: [Armored, Mechanical],
        weapons: [Weapon(range: 6.0, damage: 14.0, period: 1.4, target: Any)],
    ),
    UnitTypeData(
        id: (8),
        name: "splasher",
        health_max: 90.0,
        radius: 0.5,
        speed: 2.25,
        attributes: [Armored],
        weapons: [Weapon(range: 6.0, damage: 16.0, period: 2.0)],
        traits: [Splash],
    ),
]"#;

fn roster_cell() -> &'static UnitTypeRegistry {
    static ROSTER: OnceLock<UnitTypeRegistry> = OnceLock::new();
    ROSTER.get_or_init(|| {
        UnitTypeRegistry::from_ron_str("built-in roster", ROSTER_RON)
            .expect("built-in roster must parse")
    })
}

/// A fresh copy of the built-in roster.
#[must_use]
pub fn roster() -> UnitTypeRegistry {
    roster_cell().clone()
}

// ============================================================================
// Entities
// ============================================================================

/// Entity of a roster type at `(x, y)` with full health.
///
/// # Panics
///
/// Panics when `unit_type` is not in the built-in roster.
#[must_use]
pub fn unit(id: EntityId, unit_type: UnitTypeId, alliance: Alliance, x: i32, y: i32) -> CombatEntity {
    let data = roster_cell()
        .get(unit_type)
        .expect("unit type must be in the built-in roster");
    let entity = CombatEntity::new(id, unit_type, alliance)
        .with_position(Vec2Fixed::from_ints(x, y))
        .with_health(data.health_max)
        .with_radius(data.radius);
    if data.is_flying {
        entity.flying()
    } else {
        entity
    }
}

/// Friendly roster unit with full health.
#[must_use]
pub fn friendly(id: EntityId, unit_type: UnitTypeId, x: i32, y: i32) -> CombatEntity {
    unit(id, unit_type, Alliance::Friendly, x, y)
}

/// Enemy roster unit with full health.
#[must_use]
pub fn enemy(id: EntityId, unit_type: UnitTypeId, x: i32, y: i32) -> CombatEntity {
    unit(id, unit_type, Alliance::Enemy, x, y)
}

/// Snapshot holding the given entities.
#[must_use]
pub fn snapshot(tick: u64, entities: Vec<CombatEntity>) -> WorldSnapshot {
    let mut snapshot = WorldSnapshot::new(tick);
    snapshot.entities = entities;
    snapshot
}

// ============================================================================
// Battles
// ============================================================================

/// Friendly ids start here in generated battles.
pub const FRIENDLY_BASE_ID: EntityId = 100;
/// Enemy ids start here in generated battles.
pub const ENEMY_BASE_ID: EntityId = 1000;

/// Opening snapshot of a mirrored skirmish.
///
/// Friendlies form columns around `x = 0`, one army group with a medic
/// escort; enemies form columns around `x = gap`. Composition cycles
/// through rangers, gunners and brutes.
#[must_use]
pub fn skirmish(per_side: u32, gap: i32) -> WorldSnapshot {
    let types = [RANGER, GUNNER, BRUTE];
    let mut entities = Vec::new();
    let mut combat = Vec::new();

    for i in 0..per_side {
        let t = types[(i % 3) as usize];
        let row = (i / 3) as i32;
        let column = (i % 3) as i32;
        let id = FRIENDLY_BASE_ID + u64::from(i);
        entities.push(friendly(id, t, -column * 2, row * 2));
        combat.push(id);
        entities.push(enemy(ENEMY_BASE_ID + u64::from(i), t, gap + column * 2, row * 2));
    }

    let medic_id = FRIENDLY_BASE_ID + u64::from(per_side);
    entities.push(friendly(medic_id, MEDIC, -8, 0));

    let mut snapshot = snapshot(1, entities);
    snapshot.groups = vec![ArmyGroup::new(1, combat).with_support(vec![medic_id])];
    snapshot.rally_point = Some(Vec2Fixed::from_ints(-20, 0));
    snapshot
}

/// A scripted battle: the enemy line advances one unit per tick toward the
/// friendlies, which hold position.
///
/// The script ignores intents, so two sessions fed the same script must
/// produce identical batches.
#[must_use]
pub fn advancing_battle(per_side: u32, ticks: u64) -> Vec<WorldSnapshot> {
    let opening = skirmish(per_side, 24);
    (0..ticks)
        .map(|t| {
            let mut frame = opening.clone();
            frame.tick = t + 1;
            let advance = fixed(t.min(16) as i32);
            for entity in &mut frame.entities {
                if entity.alliance == Alliance::Enemy {
                    if let Some(position) = entity.position.as_mut() {
                        position.x -= advance;
                    }
                }
            }
            frame
        })
        .collect()
}
