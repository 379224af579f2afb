//! Territory entities, claim groups and per-cell settings.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::CapacityPolicy;
use crate::grid::Cell;
use crate::types::{ActorId, TerritoryId, WorldTime};

/// A set of cells belonging to one territory, grown only by adjacency:
/// every cell after the first was Chebyshev-adjacent to some cell already
/// in the group when it was added. Connectivity holds by construction,
/// never by post-hoc graph search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClaimGroup {
    pub cells: BTreeSet<Cell>,
}

impl ClaimGroup {
    pub fn seeded(cell: Cell) -> Self {
        let mut cells = BTreeSet::new();
        cells.insert(cell);
        Self { cells }
    }

    pub fn touches(&self, cell: &Cell) -> bool {
        self.cells.iter().any(|member| member.is_adjacent(cell))
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        self.cells.contains(cell)
    }

    pub fn insert(&mut self, cell: Cell) {
        self.cells.insert(cell);
    }

    pub fn remove(&mut self, cell: &Cell) -> bool {
        self.cells.remove(cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Typed per-cell settings with a generic escape hatch for unvalidated
/// forward-compatible extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSettings {
    pub pvp_enabled: bool,
    pub mob_spawning: bool,
    pub explosions: bool,
    pub public_access: bool,
    #[serde(default)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl Default for CellSettings {
    fn default() -> Self {
        Self {
            pvp_enabled: false,
            mob_spawning: true,
            explosions: false,
            public_access: false,
            extra: BTreeMap::new(),
        }
    }
}

/// A named, persistent ownership entity over a set of cells.
/// The leader is never listed in `members`; leader plus members are the
/// territory's full roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub name: String,
    pub leader: ActorId,
    pub members: BTreeSet<ActorId>,
    pub groups: Vec<ClaimGroup>,
    pub current_cells: u32,
    pub level: u32,
    pub xp: u64,
    pub created_at: WorldTime,
    pub last_active_at: WorldTime,
    #[serde(default)]
    pub last_auto_expand_at: Option<WorldTime>,
    #[serde(default)]
    pub cell_settings: BTreeMap<Cell, CellSettings>,
}

impl Territory {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        leader: impl Into<String>,
        now: WorldTime,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            leader: leader.into(),
            members: BTreeSet::new(),
            groups: Vec::new(),
            current_cells: 0,
            level: 0,
            xp: 0,
            created_at: now,
            last_active_at: now,
            last_auto_expand_at: None,
            cell_settings: BTreeMap::new(),
        }
    }

    pub fn max_cells(&self, capacity: &CapacityPolicy) -> u32 {
        capacity
            .base_cells
            .saturating_add(capacity.cells_per_level.saturating_mul(self.level))
    }

    /// Leader plus members.
    pub fn roster(&self) -> Vec<ActorId> {
        let mut roster = Vec::with_capacity(1 + self.members.len());
        roster.push(self.leader.clone());
        roster.extend(self.members.iter().cloned());
        roster
    }

    pub fn roster_len(&self) -> u32 {
        1 + self.members.len() as u32
    }

    pub fn is_member(&self, actor_id: &str) -> bool {
        self.leader == actor_id || self.members.contains(actor_id)
    }

    /// Index of the group holding `cell`, if any.
    pub fn group_of(&self, cell: &Cell) -> Option<usize> {
        self.groups.iter().position(|group| group.contains(cell))
    }

    /// Index of the first group with a cell Chebyshev-adjacent to `cell`.
    pub fn adjacent_group(&self, cell: &Cell) -> Option<usize> {
        self.groups.iter().position(|group| group.touches(cell))
    }
}
