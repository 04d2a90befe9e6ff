//! Tunable constants for the decision pass.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};
use crate::math::{fixed_serde, ratio, Fixed};

/// Game frames per game second at normal speed.
pub const FRAMES_PER_SECOND: u32 = 16;

/// Configuration for engagement, kiting and retreat decisions.
///
/// Every field has a default, so a RON file only needs the values it changes:
///
/// ```ron
/// TacticsConfig(
///     engagement_range: 14.0,
///     hysteresis_ratio: 0.75,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Radius around a unit in which hostiles count as local threats.
    #[serde(with = "fixed_serde")]
    pub engagement_range: Fixed,
    /// Extra radius added when gathering threats.
    #[serde(with = "fixed_serde")]
    pub outnumbered_extra_range: Fixed,
    /// A committed attacker keeps attacking while own strength is at least
    /// this fraction of the enemy's.
    #[serde(with = "fixed_serde")]
    pub hysteresis_ratio: Fixed,
    /// Game frames between decision passes.
    pub step_frames: u32,
    /// Speed and damage multiplier while stimmed.
    #[serde(with = "fixed_serde")]
    pub stim_multiplier: Fixed,
    /// Speed multiplier on creep.
    #[serde(with = "fixed_serde")]
    pub creep_speed_bonus: Fixed,
    /// Diameter of the splash attacker's area of effect.
    #[serde(with = "fixed_serde")]
    pub splash_diameter: Fixed,
    /// Weapons at or under this range are melee.
    #[serde(with = "fixed_serde")]
    pub melee_range: Fixed,
    /// Minimum straight move-away distance when retreating.
    #[serde(with = "fixed_serde")]
    pub retreat_distance: Fixed,
    /// Decision passes an issued order stays in the pending memo.
    pub pending_order_ticks: u64,
    /// Decision passes after which a remembered hostile is unresolved.
    pub sighting_stale_ticks: u64,
    /// A remembered hostile missing from a snapshot is dropped once a live
    /// friendly stands within this distance of its last known position.
    #[serde(with = "fixed_serde")]
    pub sight_range: Fixed,
    /// Distance under which a move counts as arrived.
    #[serde(with = "fixed_serde")]
    pub arrival_tolerance: Fixed,
    /// Idle units regroup, and support units follow the anchor, when
    /// farther than this from their destination.
    #[serde(with = "fixed_serde")]
    pub regroup_distance: Fixed,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            engagement_range: Fixed::const_from_int(16),
            outnumbered_extra_range: Fixed::ZERO,
            hysteresis_ratio: ratio(8, 10),
            step_frames: 8,
            stim_multiplier: ratio(15, 10),
            creep_speed_bonus: ratio(13, 10),
            splash_diameter: ratio(28, 10),
            melee_range: Fixed::ONE,
            retreat_distance: Fixed::const_from_int(4),
            pending_order_ticks: 2,
            sighting_stale_ticks: 24,
            sight_range: Fixed::const_from_int(5),
            arrival_tolerance: ratio(1, 4),
            regroup_distance: Fixed::const_from_int(3),
        }
    }
}

impl TacticsConfig {
    /// Parse from RON and validate.
    pub fn from_ron_str(label: &str, text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| TacticsError::parse(label, &e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the decision pass cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.engagement_range <= Fixed::ZERO {
            return Err(TacticsError::InvalidConfig(
                "engagement_range must be positive".into(),
            ));
        }
        if self.outnumbered_extra_range < Fixed::ZERO {
            return Err(TacticsError::InvalidConfig(
                "outnumbered_extra_range must not be negative".into(),
            ));
        }
        if self.hysteresis_ratio <= Fixed::ZERO || self.hysteresis_ratio > Fixed::ONE {
            return Err(TacticsError::InvalidConfig(
                "hysteresis_ratio must be in (0, 1]".into(),
            ));
        }
        if self.step_frames == 0 {
            return Err(TacticsError::InvalidConfig(
                "step_frames must be positive".into(),
            ));
        }
        if self.stim_multiplier < Fixed::ONE || self.creep_speed_bonus < Fixed::ONE {
            return Err(TacticsError::InvalidConfig(
                "speed multipliers must be at least 1".into(),
            ));
        }
        if self.arrival_tolerance < Fixed::ZERO || self.regroup_distance < Fixed::ZERO {
            return Err(TacticsError::InvalidConfig(
                "arrival_tolerance and regroup_distance must not be negative".into(),
            ));
        }
        if self.sight_range < Fixed::ZERO {
            return Err(TacticsError::InvalidConfig(
                "sight_range must not be negative".into(),
            ));
        }
        if self.splash_diameter <= Fixed::ZERO || self.retreat_distance <= Fixed::ZERO {
            return Err(TacticsError::InvalidConfig(
                "splash_diameter and retreat_distance must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Game seconds covered by one decision pass.
    #[must_use]
    pub fn step_seconds(&self) -> Fixed {
        Fixed::from_num(self.step_frames) / Fixed::from_num(FRAMES_PER_SECOND)
    }
}
