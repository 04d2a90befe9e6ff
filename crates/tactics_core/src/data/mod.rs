//! Static unit type data.
//!
//! Pure data structures deserialized from RON. This module contains no IO:
//! callers read files and pass the text to [`UnitTypeRegistry::from_ron_str`].

mod unit_data;

use std::collections::HashMap;

pub use unit_data::{Attribute, DamageBonus, TargetClass, UnitTrait, UnitTypeData, Weapon};

use crate::components::UnitTypeId;
use crate::error::{Result, TacticsError};

/// Lookup table of unit type definitions.
#[derive(Debug, Clone, Default)]
pub struct UnitTypeRegistry {
    types: HashMap<UnitTypeId, UnitTypeData>,
}

impl UnitTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a RON list of [`UnitTypeData`].
    ///
    /// `label` names the source in error messages.
    pub fn from_ron_str(label: &str, text: &str) -> Result<Self> {
        let list: Vec<UnitTypeData> =
            ron::from_str(text).map_err(|e| TacticsError::parse(label, &e))?;
        Self::from_types(list)
    }

    /// Build a registry, rejecting duplicate ids.
    pub fn from_types(list: impl IntoIterator<Item = UnitTypeData>) -> Result<Self> {
        let mut registry = Self::new();
        for data in list {
            registry.insert(data)?;
        }
        Ok(registry)
    }

    /// Add a definition.
    pub fn insert(&mut self, data: UnitTypeData) -> Result<()> {
        if self.types.contains_key(&data.id) {
            return Err(TacticsError::DuplicateUnitType {
                id: data.id.0,
                name: data.name,
            });
        }
        self.types.insert(data.id, data);
        Ok(())
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: UnitTypeId) -> Option<&UnitTypeData> {
        self.types.get(&id)
    }

    /// Look up a definition, failing on unknown ids.
    pub fn require(&self, id: UnitTypeId) -> Result<&UnitTypeData> {
        self.get(id).ok_or(TacticsError::UnknownUnitType(id.0))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate definitions in id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &UnitTypeData> {
        let mut ids: Vec<_> = self.types.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(move |id| self.types.get(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TYPES: &str = r#"[
        UnitTypeData(id: (1), name: "zealot", health_max: 100.0, shield_max: 50.0,
            radius: 0.5, speed: 3.15,
            weapons: [Weapon(range: 0.1, damage: 8.0, attacks: 2, period: 1.2)]),
        UnitTypeData(id: (2), name: "overseer", health_max: 200.0, radius: 0.75,
            speed: 2.62, is_flying: true, traits: [Support]),
    ]"#;

    #[test]
    fn test_from_ron_str() {
        let registry = UnitTypeRegistry::from_ron_str("inline", TWO_TYPES).expect("parse");
        assert_eq!(registry.len(), 2);
        assert!(registry.get(UnitTypeId(1)).is_some_and(UnitTypeData::is_combatant));
        assert!(registry
            .get(UnitTypeId(2))
            .is_some_and(|u| u.has_trait(UnitTrait::Support)));
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = UnitTypeRegistry::from_ron_str("units.ron", "[UnitTypeData(").unwrap_err();
        assert!(err.to_string().contains("units.ron"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let registry = UnitTypeRegistry::from_ron_str("inline", TWO_TYPES).expect("parse");
        let mut dup = registry.clone();
        let again = registry.get(UnitTypeId(1)).cloned().expect("type 1");
        assert!(matches!(
            dup.insert(again),
            Err(TacticsError::DuplicateUnitType { id: 1, .. })
        ));
    }

    #[test]
    fn test_require_unknown() {
        let registry = UnitTypeRegistry::new();
        assert!(matches!(
            registry.require(UnitTypeId(9)),
            Err(TacticsError::UnknownUnitType(9))
        ));
    }

    #[test]
    fn test_iter_sorted() {
        let registry = UnitTypeRegistry::from_ron_str("inline", TWO_TYPES).expect("parse");
        let ids: Vec<_> = registry.iter_sorted().map(|u| u.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
