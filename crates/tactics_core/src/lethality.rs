//! Lethality model: damage per second and DPS-health figures.
//!
//! The model is the single source of truth for whether one entity can attack
//! another. Weapon profiles are derived once per unit type and alliance when
//! the model is built for a tick, folding in that alliance's attack upgrades.

use std::collections::HashMap;

use crate::components::{Alliance, AllianceUpgrades, CombatEntity, UnitTypeId};
use crate::config::TacticsConfig;
use crate::data::{DamageBonus, TargetClass, UnitTrait, UnitTypeData, UnitTypeRegistry};
use crate::math::{ratio, Fixed};

/// Converts game-time periods and speeds into real-time ones.
#[must_use]
pub fn speed_normalization() -> Fixed {
    ratio(14, 10)
}

/// Build progress at or below which a structure contributes nothing.
fn min_build_progress() -> Fixed {
    ratio(9, 10)
}

// ============================================================================
// Weapon Profiles
// ============================================================================

/// A weapon with the owning alliance's attack upgrades applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponProfile {
    /// Range, edge to edge.
    pub range: Fixed,
    /// Damage per hit including attack upgrades.
    pub damage: Fixed,
    /// Hits per activation.
    pub attacks: u32,
    /// Game seconds between activations.
    pub period: Fixed,
    /// Domains this weapon hits.
    pub target: TargetClass,
    /// Attribute bonuses.
    pub bonuses: Vec<DamageBonus>,
}

impl WeaponProfile {
    /// Whether this weapon can hit a defender.
    #[must_use]
    pub fn can_hit(&self, defender: &UnitTypeData, defender_flying: bool) -> bool {
        defender.has_trait(UnitTrait::Towering) || self.target.can_hit(defender_flying)
    }

    /// Summed bonus damage against a defender's attributes.
    #[must_use]
    pub fn bonus_against(&self, defender: &UnitTypeData) -> Fixed {
        self.bonuses
            .iter()
            .filter(|b| defender.has_attribute(b.attribute))
            .fold(Fixed::ZERO, |acc, b| acc + b.damage)
    }
}

// ============================================================================
// Lethality Model
// ============================================================================

/// Per-tick lethality calculator.
#[derive(Debug)]
pub struct LethalityModel<'a> {
    registry: &'a UnitTypeRegistry,
    config: &'a TacticsConfig,
    upgrades: AllianceUpgrades,
    profiles: HashMap<(UnitTypeId, Alliance), Vec<WeaponProfile>>,
}

impl<'a> LethalityModel<'a> {
    /// Derive weapon profiles for every registered type and both alliances.
    #[must_use]
    pub fn new(
        registry: &'a UnitTypeRegistry,
        upgrades: AllianceUpgrades,
        config: &'a TacticsConfig,
    ) -> Self {
        let mut profiles = HashMap::new();
        for data in registry.iter_sorted() {
            for alliance in [Alliance::Friendly, Alliance::Enemy] {
                let level = Fixed::from_num(upgrades.for_alliance(alliance).attack);
                let list = data
                    .weapons
                    .iter()
                    .filter(|w| w.is_usable())
                    .map(|w| WeaponProfile {
                        range: w.range,
                        damage: w.damage + level * w.damage_per_upgrade(),
                        attacks: w.attacks,
                        period: w.period,
                        target: w.target,
                        bonuses: w.bonuses.clone(),
                    })
                    .collect();
                profiles.insert((data.id, alliance), list);
            }
        }
        Self {
            registry,
            config,
            upgrades,
            profiles,
        }
    }

    /// The registry backing this model.
    #[must_use]
    pub fn registry(&self) -> &'a UnitTypeRegistry {
        self.registry
    }

    /// The configuration backing this model.
    #[must_use]
    pub fn config(&self) -> &'a TacticsConfig {
        self.config
    }

    /// Usable weapon profiles of a type for an alliance.
    #[must_use]
    pub fn profiles(&self, unit_type: UnitTypeId, alliance: Alliance) -> &[WeaponProfile] {
        self.profiles
            .get(&(unit_type, alliance))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn armor_level(&self, alliance: Alliance) -> Fixed {
        Fixed::from_num(self.upgrades.for_alliance(alliance).armor)
    }

    /// Splash multiplier of an attacker against a defending composition.
    ///
    /// One for everything except the designated splash type, whose multiplier
    /// is the splash diameter over the average ground defender diameter,
    /// capped at the number of ground defenders and floored at one.
    #[must_use]
    pub fn splash_multiplier(&self, attacker: &UnitTypeData, defenders: &[&UnitTypeData]) -> Fixed {
        if !attacker.has_trait(UnitTrait::Splash) {
            return Fixed::ONE;
        }
        let ground: Vec<_> = defenders.iter().filter(|d| !d.is_flying).collect();
        if ground.is_empty() {
            return Fixed::ONE;
        }
        let count = Fixed::from_num(ground.len());
        let total_diameter = ground
            .iter()
            .fold(Fixed::ZERO, |acc, d| acc + d.radius * Fixed::const_from_int(2));
        let Some(average) = total_diameter.checked_div(count) else {
            return Fixed::ONE;
        };
        let Some(splash) = self.config.splash_diameter.checked_div(average) else {
            return count;
        };
        splash.min(count).max(Fixed::ONE)
    }

    /// Best single-weapon DPS of `attacker` against a defending composition.
    ///
    /// Defenders may repeat; the figure is averaged over the whole set, so
    /// defenders a weapon cannot hit dilute it. Unknown types, unusable
    /// weapons and an empty set all give zero.
    #[must_use]
    pub fn weapon_dps(
        &self,
        attacker: UnitTypeId,
        alliance: Alliance,
        defenders: &[UnitTypeId],
    ) -> Fixed {
        if defenders.is_empty() {
            return Fixed::ZERO;
        }
        let Some(attacker_data) = self.registry.get(attacker) else {
            return Fixed::ZERO;
        };
        let defender_data: Vec<&UnitTypeData> = defenders
            .iter()
            .filter_map(|id| self.registry.get(*id))
            .collect();
        let splash = self.splash_multiplier(attacker_data, &defender_data);
        let armor = self.armor_level(alliance.opponent());
        let count = Fixed::from_num(defenders.len());

        self.profiles(attacker, alliance)
            .iter()
            .map(|profile| {
                let total = defender_data
                    .iter()
                    .filter(|d| profile.can_hit(d, d.is_flying))
                    .fold(Fixed::ZERO, |acc, d| {
                        let per_hit = (profile.damage + profile.bonus_against(d) - armor)
                            .max(Fixed::ZERO);
                        acc.saturating_add(per_hit)
                    });
                let average = total / count;
                let per_activation = average
                    .saturating_mul(Fixed::from_num(profile.attacks))
                    .saturating_mul(splash);
                per_activation
                    .saturating_mul(speed_normalization())
                    .checked_div(profile.period)
                    .unwrap_or(Fixed::ZERO)
            })
            .max()
            .unwrap_or(Fixed::ZERO)
    }

    /// DPS-health of one entity: its DPS times its remaining hit points.
    ///
    /// Structures at or under 90% progress count as zero; structures still
    /// finishing use their full hit points. Stimmed units deal extra damage.
    #[must_use]
    pub fn dps_health(&self, entity: &CombatEntity, defenders: &[UnitTypeId]) -> Fixed {
        let Some(data) = self.registry.get(entity.unit_type) else {
            return Fixed::ZERO;
        };
        if entity.build_progress <= min_build_progress() {
            return Fixed::ZERO;
        }
        let hit_points = if entity.is_complete() {
            match entity.hit_points() {
                Some(hp) => hp,
                None => return Fixed::ZERO,
            }
        } else {
            data.health_max.saturating_add(data.shield_max)
        };
        let dps = self.weapon_dps(entity.unit_type, entity.alliance, defenders);
        let value = dps.saturating_mul(hit_points);
        if entity.buffs.stimmed {
            value.saturating_mul(self.config.stim_multiplier)
        } else {
            value
        }
    }

    /// Whether `attacker` has any weapon able to hit `target`.
    #[must_use]
    pub fn can_attack(&self, attacker: &CombatEntity, target: &CombatEntity) -> bool {
        self.range_against(attacker, target).is_some()
    }

    /// Longest range among `attacker`'s weapons that can hit `target`.
    #[must_use]
    pub fn range_against(&self, attacker: &CombatEntity, target: &CombatEntity) -> Option<Fixed> {
        let target_data = self.registry.get(target.unit_type)?;
        let flying = target.is_flying || target_data.is_flying;
        self.profiles(attacker.unit_type, attacker.alliance)
            .iter()
            .filter(|p| p.can_hit(target_data, flying))
            .map(|p| p.range)
            .max()
    }

    /// Longest weapon range of a type.
    #[must_use]
    pub fn max_range(&self, unit_type: UnitTypeId) -> Fixed {
        self.registry
            .get(unit_type)
            .map_or(Fixed::ZERO, UnitTypeData::max_range)
    }

    /// Damage one activation of `attacker`'s best weapon deals to `target`,
    /// after upgrades, bonuses and armor.
    #[must_use]
    pub fn damage_per_hit(&self, attacker: &CombatEntity, target: &CombatEntity) -> Fixed {
        let Some(target_data) = self.registry.get(target.unit_type) else {
            return Fixed::ZERO;
        };
        let flying = target.is_flying || target_data.is_flying;
        let armor = self.armor_level(target.alliance) + target_data.armor;
        self.profiles(attacker.unit_type, attacker.alliance)
            .iter()
            .filter(|p| p.can_hit(target_data, flying))
            .map(|p| {
                (p.damage + p.bonus_against(target_data) - armor)
                    .max(Fixed::ZERO)
                    .saturating_mul(Fixed::from_num(p.attacks))
            })
            .max()
            .unwrap_or(Fixed::ZERO)
    }

    fn speed_multiplier(&self, entity: &CombatEntity, data: &UnitTypeData) -> Fixed {
        let mut multiplier = Fixed::ONE;
        if entity.buffs.stimmed {
            multiplier *= self.config.stim_multiplier;
        }
        let grounded = !(entity.is_flying || data.is_flying);
        if entity.buffs.on_creep && grounded && !data.has_trait(UnitTrait::NoCreepBonus) {
            multiplier *= self.config.creep_speed_bonus;
        }
        multiplier
    }

    /// Real-time movement speed including buffs and terrain.
    #[must_use]
    pub fn speed(&self, entity: &CombatEntity) -> Fixed {
        let Some(data) = self.registry.get(entity.unit_type) else {
            return Fixed::ZERO;
        };
        data.speed * speed_normalization() * self.speed_multiplier(entity, data)
    }

    /// Distance this entity covers in one decision pass.
    #[must_use]
    pub fn travel_per_step(&self, entity: &CombatEntity) -> Fixed {
        let Some(data) = self.registry.get(entity.unit_type) else {
            return Fixed::ZERO;
        };
        data.speed * self.speed_multiplier(entity, data) * self.config.step_seconds()
    }

    /// Whether all of this entity's weapons are melee.
    #[must_use]
    pub fn is_melee(&self, entity: &CombatEntity) -> bool {
        self.registry
            .get(entity.unit_type)
            .is_some_and(|d| d.is_melee(self.config.melee_range))
    }

    /// Whether this entity has a usable weapon.
    #[must_use]
    pub fn is_combatant(&self, entity: &CombatEntity) -> bool {
        !self.profiles(entity.unit_type, entity.alliance).is_empty()
    }

    /// Whether this entity's type has a trait.
    #[must_use]
    pub fn has_trait(&self, entity: &CombatEntity, t: UnitTrait) -> bool {
        self.registry
            .get(entity.unit_type)
            .is_some_and(|d| d.has_trait(t))
    }
}
