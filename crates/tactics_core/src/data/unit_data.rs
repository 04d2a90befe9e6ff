//! Unit type data structures for data-driven lethality.

use serde::{Deserialize, Serialize};

use crate::components::UnitTypeId;
use crate::math::{fixed_serde, option_fixed_serde, Fixed};

// ============================================================================
// Weapons
// ============================================================================

/// Which domains a weapon can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TargetClass {
    /// Ground targets only.
    #[default]
    Ground,
    /// Air targets only.
    Air,
    /// Both ground and air.
    Any,
}

impl TargetClass {
    /// Whether a weapon of this class can hit a target in the given domain.
    #[must_use]
    pub const fn can_hit(self, target_is_flying: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Ground => !target_is_flying,
            Self::Air => target_is_flying,
        }
    }
}

/// Unit attributes that weapons may deal bonus damage against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Light units.
    Light,
    /// Armored units.
    Armored,
    /// Living units.
    Biological,
    /// Machines.
    Mechanical,
    /// Psionic units.
    Psionic,
    /// Very large units.
    Massive,
    /// Buildings.
    Structure,
}

/// Extra per-hit damage against defenders carrying an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageBonus {
    /// Attribute the bonus applies to.
    pub attribute: Attribute,
    /// Extra damage per hit.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
}

/// A weapon as defined in unit data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Range measured edge to edge.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Base damage per hit.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Hits per activation.
    #[serde(default = "default_attacks")]
    pub attacks: u32,
    /// Seconds between activations, in game time.
    #[serde(with = "fixed_serde")]
    pub period: Fixed,
    /// Domains this weapon can hit.
    #[serde(default)]
    pub target: TargetClass,
    /// Attribute-conditional bonus damage.
    #[serde(default)]
    pub bonuses: Vec<DamageBonus>,
    /// Damage gained per attack upgrade level. Derived from base damage when absent.
    #[serde(default, with = "option_fixed_serde")]
    pub upgrade_increment: Option<Fixed>,
}

const fn default_attacks() -> u32 {
    1
}

impl Weapon {
    /// Create a single-hit ground weapon.
    #[must_use]
    pub fn new(range: Fixed, damage: Fixed, period: Fixed) -> Self {
        Self {
            range,
            damage,
            attacks: 1,
            period,
            target: TargetClass::Ground,
            bonuses: Vec::new(),
            upgrade_increment: None,
        }
    }

    /// Builder: set target class.
    #[must_use]
    pub fn with_target(mut self, target: TargetClass) -> Self {
        self.target = target;
        self
    }

    /// Builder: set hits per activation.
    #[must_use]
    pub fn with_attacks(mut self, attacks: u32) -> Self {
        self.attacks = attacks;
        self
    }

    /// Builder: add a bonus against an attribute.
    #[must_use]
    pub fn with_bonus(mut self, attribute: Attribute, damage: Fixed) -> Self {
        self.bonuses.push(DamageBonus { attribute, damage });
        self
    }

    /// Damage added per attack upgrade level.
    ///
    /// Defaults to a tenth of base damage, rounded, never less than one.
    #[must_use]
    pub fn damage_per_upgrade(&self) -> Fixed {
        self.upgrade_increment.unwrap_or_else(|| {
            (self.damage / Fixed::const_from_int(10))
                .round()
                .max(Fixed::ONE)
        })
    }

    /// Whether this weapon can ever produce damage.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.attacks > 0 && self.damage > Fixed::ZERO && self.period > Fixed::ZERO
    }
}

// ============================================================================
// Unit Types
// ============================================================================

/// Special-case behaviors attached to a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitTrait {
    /// The designated splash attacker; its damage scales with ground clustering.
    Splash,
    /// Tall enough to be hit by both ground and air weapons.
    Towering,
    /// Harmless scout that is always attacked directly.
    Changeling,
    /// Economy unit; not counted as an army member.
    Worker,
    /// Non-combat escort that follows the army anchor.
    Support,
    /// Does not gain the creep speed bonus.
    NoCreepBonus,
}

/// Data-driven unit type definition.
///
/// # Example RON
///
/// ```ron
/// UnitTypeData(
///     id: (48),
///     name: "marine",
///     health_max: 45.0,
///     radius: 0.375,
///     speed: 3.15,
///     attributes: [Light, Biological],
///     weapons: [
///         Weapon(range: 5.0, damage: 6.0, period: 0.61, target: Any),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTypeData {
    /// Type id referenced by snapshot entities.
    pub id: UnitTypeId,
    /// Display name.
    pub name: String,
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub health_max: Fixed,
    /// Maximum shield.
    #[serde(default, with = "fixed_serde")]
    pub shield_max: Fixed,
    /// Base armor.
    #[serde(default, with = "fixed_serde")]
    pub armor: Fixed,
    /// Collision radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
    /// Movement speed in game units per game second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Whether this type is airborne.
    #[serde(default)]
    pub is_flying: bool,
    /// Attributes for bonus damage.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Weapons, possibly empty.
    #[serde(default)]
    pub weapons: Vec<Weapon>,
    /// Special-case behaviors.
    #[serde(default)]
    pub traits: Vec<UnitTrait>,
}

impl UnitTypeData {
    /// Check if this type has the given trait.
    #[must_use]
    pub fn has_trait(&self, t: UnitTrait) -> bool {
        self.traits.contains(&t)
    }

    /// Check if this type carries the given attribute.
    #[must_use]
    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.attributes.contains(&attribute)
    }

    /// Check if this type has any usable weapon.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        self.weapons.iter().any(Weapon::is_usable)
    }

    /// Longest weapon range, zero without weapons.
    #[must_use]
    pub fn max_range(&self) -> Fixed {
        self.weapons
            .iter()
            .map(|w| w.range)
            .max()
            .unwrap_or(Fixed::ZERO)
    }

    /// Whether every weapon is a melee weapon.
    #[must_use]
    pub fn is_melee(&self, melee_range: Fixed) -> bool {
        self.is_combatant() && self.max_range() <= melee_range
    }

    /// Whether weapons of the given class can hit this type.
    #[must_use]
    pub fn hittable_by(&self, class: TargetClass) -> bool {
        self.has_trait(UnitTrait::Towering) || class.can_hit(self.is_flying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_unit() -> UnitTypeData {
        UnitTypeData {
            id: UnitTypeId(1),
            name: "rifleman".to_string(),
            health_max: Fixed::from_num(45),
            shield_max: Fixed::ZERO,
            armor: Fixed::ZERO,
            radius: Fixed::from_num(0.375),
            speed: Fixed::from_num(3.15),
            is_flying: false,
            attributes: vec![Attribute::Light, Attribute::Biological],
            weapons: vec![Weapon::new(
                Fixed::from_num(5),
                Fixed::from_num(6),
                Fixed::from_num(0.61),
            )
            .with_target(TargetClass::Any)],
            traits: vec![],
        }
    }

    #[test]
    fn test_target_class_can_hit() {
        assert!(TargetClass::Ground.can_hit(false));
        assert!(!TargetClass::Ground.can_hit(true));
        assert!(TargetClass::Air.can_hit(true));
        assert!(!TargetClass::Air.can_hit(false));
        assert!(TargetClass::Any.can_hit(true));
    }

    #[test]
    fn test_towering_is_hittable_by_air_weapons() {
        let mut unit = create_test_unit();
        assert!(!unit.hittable_by(TargetClass::Air));
        unit.traits.push(UnitTrait::Towering);
        assert!(unit.hittable_by(TargetClass::Air));
        assert!(unit.hittable_by(TargetClass::Ground));
    }

    #[test]
    fn test_default_upgrade_increment() {
        let small = Weapon::new(Fixed::ONE, Fixed::from_num(6), Fixed::ONE);
        assert_eq!(small.damage_per_upgrade(), Fixed::ONE);

        let big = Weapon::new(Fixed::ONE, Fixed::from_num(40), Fixed::ONE);
        assert_eq!(big.damage_per_upgrade(), Fixed::from_num(4));

        let mut explicit = big.clone();
        explicit.upgrade_increment = Some(Fixed::from_num(3));
        assert_eq!(explicit.damage_per_upgrade(), Fixed::from_num(3));
    }

    #[test]
    fn test_is_melee() {
        let mut unit = create_test_unit();
        assert!(!unit.is_melee(Fixed::ONE));
        unit.weapons[0].range = Fixed::from_num(0.1);
        assert!(unit.is_melee(Fixed::ONE));
        unit.weapons.clear();
        assert!(!unit.is_melee(Fixed::ONE));
    }

    #[test]
    fn test_unusable_weapon() {
        let weapon = Weapon::new(Fixed::ONE, Fixed::from_num(5), Fixed::ZERO);
        assert!(!weapon.is_usable());
    }

    #[test]
    fn test_parse_from_ron() {
        let text = r#"
            UnitTypeData(
                id: (48),
                name: "marine",
                health_max: 45.0,
                radius: 0.375,
                speed: 3.15,
                attributes: [Light, Biological],
                weapons: [
                    Weapon(range: 5.0, damage: 6.0, period: 0.61, target: Any),
                ],
            )
        "#;
        let unit: UnitTypeData = ron::from_str(text).expect("parse unit");
        assert_eq!(unit.id, UnitTypeId(48));
        assert_eq!(unit.weapons[0].attacks, 1);
        assert!(unit.has_attribute(Attribute::Light));
        assert!(unit.traits.is_empty());
    }
}
