//! Entity snapshot types.
//!
//! These are pure data read from the world snapshot each tick. The core
//! never mutates them; per-unit decision state lives in [`crate::state`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Identifier of a static unit type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub u32);

impl std::fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Alliance & Upgrades
// ============================================================================

/// Which side an entity fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Alliance {
    /// Controlled by this agent.
    #[default]
    Friendly,
    /// Opposing side.
    Enemy,
}

impl Alliance {
    /// The opposing alliance.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Friendly => Self::Enemy,
            Self::Enemy => Self::Friendly,
        }
    }
}

/// Weapon and armor upgrade levels of one alliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UpgradeLevels {
    /// Ground/air attack upgrade level.
    #[serde(default)]
    pub attack: u8,
    /// Armor upgrade level.
    #[serde(default)]
    pub armor: u8,
}

/// Upgrade levels for both alliances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AllianceUpgrades {
    /// Our levels.
    #[serde(default)]
    pub friendly: UpgradeLevels,
    /// Opponent levels (as last observed).
    #[serde(default)]
    pub enemy: UpgradeLevels,
}

impl AllianceUpgrades {
    /// Levels for the given alliance.
    #[must_use]
    pub const fn for_alliance(&self, alliance: Alliance) -> UpgradeLevels {
        match alliance {
            Alliance::Friendly => self.friendly,
            Alliance::Enemy => self.enemy,
        }
    }
}

// ============================================================================
// Combat Entity
// ============================================================================

/// Temporary effects that change speed or damage output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UnitBuffs {
    /// Stim-like haste: faster movement and attacks.
    #[serde(default)]
    pub stimmed: bool,
    /// Standing on speed-boosting terrain (creep).
    #[serde(default)]
    pub on_creep: bool,
}

/// One entity as seen in the current snapshot.
///
/// Missing `position` or `health` means the value could not be observed this
/// tick; decisions that depend on it are skipped rather than guessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEntity {
    /// Entity handle.
    pub id: EntityId,
    /// Static type of this entity.
    pub unit_type: UnitTypeId,
    /// Owning side.
    pub alliance: Alliance,
    /// Current position, if observed.
    #[serde(default)]
    pub position: Option<Vec2Fixed>,
    /// Current health, if observed.
    #[serde(default, with = "option_fixed_serde")]
    pub health: Option<Fixed>,
    /// Current shield.
    #[serde(default, with = "fixed_serde")]
    pub shield: Fixed,
    /// Collision radius.
    #[serde(default = "default_radius", with = "fixed_serde")]
    pub radius: Fixed,
    /// Whether the entity is alive.
    #[serde(default = "default_alive")]
    pub alive: bool,
    /// Whether the entity is airborne.
    #[serde(default)]
    pub is_flying: bool,
    /// Construction progress in `[0, 1]`.
    #[serde(default = "default_progress", with = "fixed_serde")]
    pub build_progress: Fixed,
    /// Frames until the weapon can fire again.
    #[serde(default)]
    pub weapon_cooldown: u32,
    /// Active buffs.
    #[serde(default)]
    pub buffs: UnitBuffs,
    /// Destination of the current order as reported by the game.
    #[serde(default)]
    pub order_target: Option<Vec2Fixed>,
}

fn default_radius() -> Fixed {
    Fixed::ONE / Fixed::const_from_int(2)
}

const fn default_alive() -> bool {
    true
}

const fn default_progress() -> Fixed {
    Fixed::ONE
}

impl CombatEntity {
    /// Create a fully built, alive entity with no observed position or health.
    #[must_use]
    pub fn new(id: EntityId, unit_type: UnitTypeId, alliance: Alliance) -> Self {
        Self {
            id,
            unit_type,
            alliance,
            position: None,
            health: None,
            shield: Fixed::ZERO,
            radius: default_radius(),
            alive: true,
            is_flying: false,
            build_progress: Fixed::ONE,
            weapon_cooldown: 0,
            buffs: UnitBuffs::default(),
            order_target: None,
        }
    }

    /// Builder: set position.
    #[must_use]
    pub fn with_position(mut self, position: Vec2Fixed) -> Self {
        self.position = Some(position);
        self
    }

    /// Builder: set health.
    #[must_use]
    pub fn with_health(mut self, health: Fixed) -> Self {
        self.health = Some(health);
        self
    }

    /// Builder: set shield.
    #[must_use]
    pub fn with_shield(mut self, shield: Fixed) -> Self {
        self.shield = shield;
        self
    }

    /// Builder: set radius.
    #[must_use]
    pub fn with_radius(mut self, radius: Fixed) -> Self {
        self.radius = radius;
        self
    }

    /// Builder: mark as airborne.
    #[must_use]
    pub fn flying(mut self) -> Self {
        self.is_flying = true;
        self
    }

    /// Builder: set buffs.
    #[must_use]
    pub fn with_buffs(mut self, buffs: UnitBuffs) -> Self {
        self.buffs = buffs;
        self
    }

    /// Builder: set weapon cooldown in frames.
    #[must_use]
    pub fn with_weapon_cooldown(mut self, frames: u32) -> Self {
        self.weapon_cooldown = frames;
        self
    }

    /// Builder: set construction progress.
    #[must_use]
    pub fn with_build_progress(mut self, progress: Fixed) -> Self {
        self.build_progress = progress;
        self
    }

    /// Builder: set the reported order destination.
    #[must_use]
    pub fn with_order_target(mut self, target: Vec2Fixed) -> Self {
        self.order_target = Some(target);
        self
    }

    /// Health plus shield, if health is known.
    #[must_use]
    pub fn hit_points(&self) -> Option<Fixed> {
        self.health.map(|h| h.saturating_add(self.shield))
    }

    /// Whether this entity is fully constructed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.build_progress >= Fixed::ONE
    }

    /// Straight-line distance minus both radii, floored at zero.
    ///
    /// `None` when either position is unknown.
    #[must_use]
    pub fn edge_distance(&self, other: &Self) -> Option<Fixed> {
        let a = self.position?;
        let b = other.position?;
        let gap = a.distance(b) - self.radius - other.radius;
        Some(gap.max(Fixed::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alliance_opponent() {
        assert_eq!(Alliance::Friendly.opponent(), Alliance::Enemy);
        assert_eq!(Alliance::Enemy.opponent(), Alliance::Friendly);
    }

    #[test]
    fn test_upgrades_for_alliance() {
        let upgrades = AllianceUpgrades {
            friendly: UpgradeLevels { attack: 2, armor: 1 },
            enemy: UpgradeLevels { attack: 0, armor: 3 },
        };
        assert_eq!(upgrades.for_alliance(Alliance::Friendly).attack, 2);
        assert_eq!(upgrades.for_alliance(Alliance::Enemy).armor, 3);
    }

    #[test]
    fn test_edge_distance_subtracts_radii() {
        let a = CombatEntity::new(1, UnitTypeId(1), Alliance::Friendly)
            .with_position(Vec2Fixed::from_ints(0, 0))
            .with_radius(Fixed::ONE);
        let b = CombatEntity::new(2, UnitTypeId(1), Alliance::Enemy)
            .with_position(Vec2Fixed::from_ints(10, 0))
            .with_radius(Fixed::ONE);
        assert_eq!(a.edge_distance(&b), Some(Fixed::from_num(8)));
    }

    #[test]
    fn test_edge_distance_overlap_is_zero() {
        let a = CombatEntity::new(1, UnitTypeId(1), Alliance::Friendly)
            .with_position(Vec2Fixed::ZERO)
            .with_radius(Fixed::from_num(2));
        let b = a.clone();
        assert_eq!(a.edge_distance(&b), Some(Fixed::ZERO));
    }

    #[test]
    fn test_edge_distance_unknown_position() {
        let a = CombatEntity::new(1, UnitTypeId(1), Alliance::Friendly);
        let b = CombatEntity::new(2, UnitTypeId(1), Alliance::Enemy).with_position(Vec2Fixed::ZERO);
        assert_eq!(a.edge_distance(&b), None);
    }

    #[test]
    fn test_hit_points_include_shield() {
        let e = CombatEntity::new(1, UnitTypeId(1), Alliance::Enemy)
            .with_health(Fixed::from_num(80))
            .with_shield(Fixed::from_num(20));
        assert_eq!(e.hit_points(), Some(Fixed::from_num(100)));
    }

    #[test]
    fn test_entity_defaults_from_ron() {
        let e: CombatEntity =
            ron::from_str("(id: 7, unit_type: (3), alliance: Enemy)").expect("parse entity");
        assert!(e.alive);
        assert!(e.is_complete());
        assert_eq!(e.position, None);
        assert_eq!(e.radius, default_radius());
    }
}
