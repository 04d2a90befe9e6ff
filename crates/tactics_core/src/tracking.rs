//! Enemy sighting memory.
//!
//! Keeps hostiles that left vision so the decision pass still accounts for
//! them. Recently seen hostiles are projected forward along their last
//! observed velocity; old sightings are reported as stale. A hostile whose
//! last known position is back in friendly sight, but which is not in the
//! snapshot, has moved on and is dropped.

use std::collections::HashMap;

use crate::components::{Alliance, CombatEntity, EntityId};
use crate::math::{Fixed, Vec2Fixed};
use crate::snapshot::WorldSnapshot;

/// A hostile that is not visible this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresumedHostile {
    /// Last known state; `position` is projected when fresh and the last
    /// sighting when stale.
    pub entity: CombatEntity,
    /// Tick of the last sighting.
    pub last_seen: u64,
    /// Sighting too old to trust the position.
    pub stale: bool,
}

/// Memory of hostiles seen in earlier snapshots.
pub trait SightingMemory {
    /// Record what the snapshot shows: new or moved hostiles, deaths, and
    /// hostiles missing from a position a friendly within `sight_range` can
    /// see.
    fn observe(&mut self, snapshot: &WorldSnapshot, sight_range: Fixed);

    /// Hostiles remembered but not visible at `tick`, in id order.
    fn presumed_hostiles(&self, tick: u64, stale_after: u64) -> Vec<PresumedHostile>;

    /// Drop a hostile confirmed gone.
    fn forget(&mut self, id: EntityId);

    /// Drop everything.
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sighting {
    position: Vec2Fixed,
    tick: u64,
}

#[derive(Debug, Clone)]
struct Remembered {
    entity: CombatEntity,
    last: Sighting,
    previous: Option<Sighting>,
    visible: bool,
}

impl Remembered {
    /// Position one step along the last observed velocity, capped at one step.
    fn projected(&self, tick: u64) -> Vec2Fixed {
        let Some(previous) = self.previous else {
            return self.last.position;
        };
        let interval = self.last.tick.saturating_sub(previous.tick);
        if interval == 0 || tick <= self.last.tick {
            return self.last.position;
        }
        let velocity = (self.last.position - previous.position)
            .scale(Fixed::ONE / Fixed::from_num(interval));
        self.last.position + velocity
    }
}

/// Default [`SightingMemory`] keeping the last two sightings per hostile.
#[derive(Debug, Clone, Default)]
pub struct EnemyMemory {
    enemies: HashMap<EntityId, Remembered>,
}

impl EnemyMemory {
    /// Empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remembered hostiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    /// Whether nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }
}

impl SightingMemory for EnemyMemory {
    fn observe(&mut self, snapshot: &WorldSnapshot, sight_range: Fixed) {
        for remembered in self.enemies.values_mut() {
            remembered.visible = false;
        }
        for entity in snapshot
            .entities
            .iter()
            .filter(|e| e.alliance == Alliance::Enemy)
        {
            if !entity.alive {
                if self.enemies.remove(&entity.id).is_some() {
                    tracing::trace!(tick = snapshot.tick, enemy = entity.id, "Forgot dead hostile");
                }
                continue;
            }
            let Some(position) = entity.position else {
                continue;
            };
            let sighting = Sighting {
                position,
                tick: snapshot.tick,
            };
            match self.enemies.get_mut(&entity.id) {
                Some(remembered) => {
                    if remembered.last.tick != snapshot.tick {
                        remembered.previous = Some(remembered.last);
                    }
                    remembered.last = sighting;
                    remembered.entity = entity.clone();
                    remembered.visible = true;
                }
                None => {
                    tracing::trace!(tick = snapshot.tick, enemy = entity.id, "New hostile sighted");
                    self.enemies.insert(
                        entity.id,
                        Remembered {
                            entity: entity.clone(),
                            last: sighting,
                            previous: None,
                            visible: true,
                        },
                    );
                }
            }
        }

        let watchers: Vec<Vec2Fixed> = snapshot
            .entities
            .iter()
            .filter(|e| e.alive && e.alliance == Alliance::Friendly)
            .filter_map(|e| e.position)
            .collect();
        self.enemies.retain(|&id, remembered| {
            let seen_empty = !remembered.visible
                && watchers
                    .iter()
                    .any(|w| w.distance(remembered.last.position) <= sight_range);
            if seen_empty {
                tracing::trace!(tick = snapshot.tick, enemy = id, "Hostile left its last known position");
            }
            !seen_empty
        });
    }

    fn presumed_hostiles(&self, tick: u64, stale_after: u64) -> Vec<PresumedHostile> {
        let mut ids: Vec<_> = self
            .enemies
            .iter()
            .filter(|(_, r)| !r.visible)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.enemies.get(&id))
            .map(|r| {
                let stale = tick.saturating_sub(r.last.tick) > stale_after;
                let position = if stale { r.last.position } else { r.projected(tick) };
                PresumedHostile {
                    entity: CombatEntity {
                        position: Some(position),
                        ..r.entity.clone()
                    },
                    last_seen: r.last.tick,
                    stale,
                }
            })
            .collect()
    }

    fn forget(&mut self, id: EntityId) {
        self.enemies.remove(&id);
    }

    fn clear(&mut self) {
        self.enemies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitTypeId;

    fn hostile(id: EntityId, x: i32) -> CombatEntity {
        CombatEntity::new(id, UnitTypeId(1), Alliance::Enemy)
            .with_position(Vec2Fixed::from_ints(x, 0))
            .with_health(Fixed::from_num(50))
    }

    fn watcher(id: EntityId, x: i32) -> CombatEntity {
        CombatEntity::new(id, UnitTypeId(1), Alliance::Friendly)
            .with_position(Vec2Fixed::from_ints(x, 0))
            .with_health(Fixed::from_num(50))
    }

    fn snapshot(tick: u64, entities: Vec<CombatEntity>) -> WorldSnapshot {
        WorldSnapshot {
            entities,
            ..WorldSnapshot::new(tick)
        }
    }

    fn sight() -> Fixed {
        Fixed::from_num(5)
    }

    #[test]
    fn test_visible_hostiles_are_not_presumed() {
        let mut memory = EnemyMemory::new();
        memory.observe(&snapshot(1, vec![hostile(5, 0)]), sight());
        assert_eq!(memory.len(), 1);
        assert!(memory.presumed_hostiles(1, 10).is_empty());
    }

    #[test]
    fn test_hidden_hostile_is_projected() {
        let mut memory = EnemyMemory::new();
        memory.observe(&snapshot(1, vec![hostile(5, 0)]), sight());
        memory.observe(&snapshot(2, vec![hostile(5, 2)]), sight());
        memory.observe(&snapshot(3, vec![]), sight());

        let presumed = memory.presumed_hostiles(3, 10);
        assert_eq!(presumed.len(), 1);
        assert!(!presumed[0].stale);
        assert_eq!(presumed[0].last_seen, 2);
        assert_eq!(presumed[0].entity.position, Some(Vec2Fixed::from_ints(4, 0)));
    }

    #[test]
    fn test_old_sighting_is_stale() {
        let mut memory = EnemyMemory::new();
        memory.observe(&snapshot(1, vec![hostile(5, 3)]), sight());
        memory.observe(&snapshot(50, vec![]), sight());
        let presumed = memory.presumed_hostiles(50, 10);
        assert!(presumed[0].stale);
        assert_eq!(presumed[0].entity.position, Some(Vec2Fixed::from_ints(3, 0)));
    }

    #[test]
    fn test_dead_hostile_forgotten() {
        let mut memory = EnemyMemory::new();
        memory.observe(&snapshot(1, vec![hostile(5, 0), hostile(6, 1)]), sight());
        let mut dead = hostile(5, 0);
        dead.alive = false;
        memory.observe(&snapshot(2, vec![dead]), sight());
        assert_eq!(memory.len(), 1);
        memory.forget(6);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_presumed_in_id_order() {
        let mut memory = EnemyMemory::new();
        memory.observe(&snapshot(1, vec![hostile(9, 0), hostile(3, 1), hostile(6, 2)]), sight());
        memory.observe(&snapshot(2, vec![]), sight());
        let ids: Vec<_> = memory
            .presumed_hostiles(2, 10)
            .iter()
            .map(|p| p.entity.id)
            .collect();
        assert_eq!(ids, vec![3, 6, 9]);
    }

    #[test]
    fn test_hostile_dropped_when_last_position_seen_empty() {
        let mut memory = EnemyMemory::new();
        memory.observe(&snapshot(1, vec![watcher(1, 0), hostile(5, 8)]), sight());
        memory.observe(&snapshot(2, vec![watcher(1, 0)]), sight());
        assert_eq!(memory.len(), 1);

        memory.observe(&snapshot(3, vec![watcher(1, 6)]), sight());
        assert!(memory.is_empty());
        assert!(memory.presumed_hostiles(3, 10).is_empty());
    }

    #[test]
    fn test_dead_watcher_sees_nothing() {
        let mut memory = EnemyMemory::new();
        memory.observe(&snapshot(1, vec![hostile(5, 8)]), sight());
        let mut dead = watcher(1, 8);
        dead.alive = false;
        memory.observe(&snapshot(2, vec![dead]), sight());
        assert_eq!(memory.presumed_hostiles(2, 10).len(), 1);
    }
}
