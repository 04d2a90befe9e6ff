//! # Tactics Core
//!
//! Deterministic tactical combat decisions for an RTS army.
//!
//! Each decision step takes a [`snapshot::WorldSnapshot`] of the visible
//! battlefield and returns an ordered [`intents::IntentBatch`] of unit
//! commands: engage, approach, kite, retreat or regroup.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`lethality`] - DPS and health modelling per unit and matchup
//! - [`threat`] - Local threat aggregation around a unit
//! - [`targeting`] - Target selection and focus fire
//! - [`engagement`] - Per-unit engagement state machine
//! - [`kiting`] - Ranged kiting micro
//! - [`anchor`] - Army group anchor coordination
//! - [`retreat`] - Retreat destination resolution
//! - [`decision`] - The per-tick decision pass
//! - [`engine`] - Session driver owning all cross-tick state

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod anchor;
pub mod components;
pub mod config;
pub mod data;
pub mod decision;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod intents;
pub mod kiting;
pub mod lethality;
pub mod math;
pub mod pathing;
pub mod retreat;
pub mod snapshot;
pub mod state;
pub mod targeting;
pub mod threat;
pub mod tracking;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::anchor::{ArmyGroup, GroupId};
    pub use crate::components::{
        Alliance, AllianceUpgrades, CombatEntity, EntityId, UnitBuffs, UnitTypeId, UpgradeLevels,
    };
    pub use crate::config::TacticsConfig;
    pub use crate::data::{Attribute, TargetClass, UnitTrait, UnitTypeData, UnitTypeRegistry, Weapon};
    pub use crate::engagement::{EngagementDecision, EngagementState};
    pub use crate::engine::TacticsEngine;
    pub use crate::error::{Result, SkipReason, TacticsError};
    pub use crate::intents::{IntentBatch, IntentKind, UnitIntent};
    pub use crate::lethality::LethalityModel;
    pub use crate::math::{ratio, Fixed, Vec2Fixed};
    pub use crate::pathing::{NavGrid, PathService, StraightLine};
    pub use crate::snapshot::{MapBounds, WorldSnapshot};
    pub use crate::tracking::{EnemyMemory, SightingMemory};
}
