//! Error types for data loading and configuration, and skip reasons.
//!
//! The per-tick decision pass never fails; these errors only surface when
//! unit data or configuration is loaded and validated.

use thiserror::Error;

/// Result type alias using [`TacticsError`].
pub type Result<T> = std::result::Result<T, TacticsError>;

/// Top-level error type for the tactics core.
#[derive(Debug, Error)]
pub enum TacticsError {
    /// A unit type referenced by an entity or registry lookup is unknown.
    #[error("Unknown unit type: {0}")]
    UnknownUnitType(u32),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Duplicate unit type id in a registry.
    #[error("Duplicate unit type id {id} ('{name}')")]
    DuplicateUnitType {
        /// Offending id.
        id: u32,
        /// Name of the second definition.
        name: String,
    },

    /// A configuration value is outside its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TacticsError {
    /// Wrap a RON parse failure with the label of the data being parsed.
    #[must_use]
    pub fn parse(path: impl Into<String>, err: &ron::error::SpannedError) -> Self {
        Self::DataParseError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Why a unit received no decision this tick.
///
/// Not an error for the caller: the unit is skipped and the reason logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SkipReason {
    /// The unit's position was not observed.
    #[error("position unknown")]
    MissingPosition,

    /// The unit's health was not observed.
    #[error("health unknown")]
    MissingHealth,

    /// No static data for the unit's type.
    #[error("unit type not registered")]
    UnknownUnitType,

    /// The unit has no usable weapon.
    #[error("not a combatant")]
    NotCombatant,

    /// Workers are left to the economy layer.
    #[error("worker")]
    Worker,

    /// A remembered hostile nearby has no trustworthy position.
    #[error("nearest threat unresolved")]
    UnresolvedThreat,
}
