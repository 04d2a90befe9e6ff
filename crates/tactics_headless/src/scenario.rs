//! Scenario loading and validation.
//!
//! Scenarios define the opening battlefield for headless runs: unit types,
//! starting entities, army groups and optional terrain.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tactics_core::anchor::ArmyGroup;
use tactics_core::components::{Alliance, AllianceUpgrades, CombatEntity};
use tactics_core::config::TacticsConfig;
use tactics_core::data::{UnitTypeData, UnitTypeRegistry};
use tactics_core::error::TacticsError;
use tactics_core::math::{Fixed, Vec2Fixed};
use tactics_core::pathing::NavGrid;
use tactics_core::snapshot::{MapBounds, WorldSnapshot};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read or write a file.
    #[error("Scenario IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Unit data or configuration rejected by the core.
    #[error("Invalid tactics data: {0}")]
    Tactics(#[from] TacticsError),
    /// Failed to write JSON output.
    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
    /// Scenario content is inconsistent.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// Walkable terrain as text rows, first row at `y = 0`.
///
/// `#` is blocked, `~` is slow, anything else is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terrain {
    /// Grid rows.
    pub rows: Vec<String>,
    /// World units per cell.
    #[serde(default = "default_cell_size", with = "tactics_core::math::fixed_serde")]
    pub cell_size: Fixed,
}

fn default_cell_size() -> Fixed {
    Fixed::ONE
}

const fn default_ticks() -> u64 {
    40
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Decision passes to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// RON file of unit types, relative to the scenario file.
    #[serde(default)]
    pub unit_types_file: Option<String>,
    /// Inline unit types.
    #[serde(default)]
    pub unit_types: Vec<UnitTypeData>,
    /// Configuration overrides; defaults when absent.
    #[serde(default)]
    pub config: Option<TacticsConfig>,
    /// Upgrade levels per alliance.
    #[serde(default)]
    pub upgrades: AllianceUpgrades,
    /// Starting entities, both sides.
    pub entities: Vec<CombatEntity>,
    /// Friendly army groups.
    #[serde(default)]
    pub groups: Vec<ArmyGroup>,
    /// Friendly expansions.
    #[serde(default)]
    pub expansions: Vec<Vec2Fixed>,
    /// Army rally point.
    #[serde(default)]
    pub rally_point: Option<Vec2Fixed>,
    /// Playable area.
    #[serde(default)]
    pub map_bounds: Option<MapBounds>,
    /// Terrain for path queries; straight lines when absent.
    #[serde(default)]
    pub terrain: Option<Terrain>,
}

impl Scenario {
    /// Load a scenario from a RON file, resolving its unit types file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let mut scenario = Self::from_ron_str(&contents)?;

        if let Some(file) = scenario.unit_types_file.take() {
            let types_path = path.parent().unwrap_or_else(|| Path::new(".")).join(&file);
            if !types_path.exists() {
                return Err(ScenarioError::FileNotFound(types_path.display().to_string()));
            }
            let text = std::fs::read_to_string(&types_path)?;
            let mut types: Vec<UnitTypeData> = ron::from_str(&text)?;
            types.append(&mut scenario.unit_types);
            scenario.unit_types = types;
        }
        tracing::debug!(
            scenario = %scenario.name,
            unit_types = scenario.unit_types.len(),
            entities = scenario.entities.len(),
            "Scenario loaded"
        );
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Build the unit type registry.
    pub fn registry(&self) -> Result<UnitTypeRegistry, ScenarioError> {
        Ok(UnitTypeRegistry::from_types(self.unit_types.iter().cloned())?)
    }

    /// Effective configuration, validated.
    pub fn tactics_config(&self) -> Result<TacticsConfig, ScenarioError> {
        let config = self.config.clone().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Terrain grid, if the scenario has one.
    pub fn nav_grid(&self) -> Result<Option<NavGrid>, ScenarioError> {
        let Some(terrain) = &self.terrain else {
            return Ok(None);
        };
        NavGrid::from_rows(&terrain.rows, terrain.cell_size)
            .map(Some)
            .ok_or_else(|| {
                ScenarioError::Invalid("terrain needs a non-empty row and a positive cell size".into())
            })
    }

    /// Check everything the runner relies on.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let registry = self.registry()?;
        self.tactics_config()?;
        self.nav_grid()?;

        if self.entities.is_empty() {
            return Err(ScenarioError::Invalid("scenario has no entities".into()));
        }
        let mut ids = HashSet::new();
        for entity in &self.entities {
            if !ids.insert(entity.id) {
                return Err(ScenarioError::Invalid(format!("duplicate entity id {}", entity.id)));
            }
            if registry.get(entity.unit_type).is_none() {
                return Err(ScenarioError::Invalid(format!(
                    "entity {} has unregistered unit type {}",
                    entity.id, entity.unit_type
                )));
            }
        }

        let mut group_ids = HashSet::new();
        for group in &self.groups {
            if !group_ids.insert(group.id) {
                return Err(ScenarioError::Invalid(format!("duplicate group id {}", group.id)));
            }
            for id in group.combat_units.iter().chain(&group.support_units) {
                let friendly = self
                    .entities
                    .iter()
                    .any(|e| e.id == *id && e.alliance == Alliance::Friendly);
                if !friendly {
                    return Err(ScenarioError::Invalid(format!(
                        "group {} member {} is not a friendly entity",
                        group.id, id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Snapshot of the opening battlefield at tick 1.
    #[must_use]
    pub fn opening_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: 1,
            entities: self.entities.clone(),
            upgrades: self.upgrades,
            groups: self.groups.clone(),
            expansions: self.expansions.clone(),
            rally_point: self.rally_point,
            map_bounds: self.map_bounds,
        }
    }
}
