//! Authoritative cell-to-owner index with a bounded lookup cache.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::grid::Cell;
use crate::types::TerritoryId;

const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Bounded FIFO cache in front of the authoritative map. Never the source
/// of truth: every `put`/`remove` of a cell invalidates its entry.
#[derive(Debug, Clone)]
pub struct LookupCache {
    capacity: usize,
    entries: BTreeMap<Cell, Option<TerritoryId>>,
    order: VecDeque<Cell>,
    hits: u64,
    misses: u64,
}

impl LookupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    fn lookup(&mut self, cell: &Cell) -> Option<Option<TerritoryId>> {
        match self.entries.get(cell) {
            Some(cached) => {
                self.hits += 1;
                Some(cached.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn store(&mut self, cell: Cell, owner: Option<TerritoryId>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(cell.clone(), owner).is_none() {
            self.order.push_back(cell);
        }
        while self.entries.len() > self.capacity {
            let Some(evicted) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&evicted);
        }
    }

    fn invalidate(&mut self, cell: &Cell) {
        if self.entries.remove(cell).is_some() {
            self.order.retain(|entry| entry != cell);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Map from cell to owning territory. The `BTreeMap` key order
/// `(realm, x, z)` lets the buffer-zone check range-scan a single x band
/// of one realm instead of walking every claimed cell.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TerritoryIndex {
    cells: BTreeMap<Cell, TerritoryId>,
    #[serde(skip)]
    cache: LookupCache,
}

impl PartialEq for TerritoryIndex {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl TerritoryIndex {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cells: BTreeMap::new(),
            cache: LookupCache::new(cache_capacity),
        }
    }

    pub fn put(&mut self, cell: Cell, owner: impl Into<TerritoryId>) {
        self.cache.invalidate(&cell);
        self.cells.insert(cell, owner.into());
    }

    pub fn remove(&mut self, cell: &Cell) -> Option<TerritoryId> {
        self.cache.invalidate(cell);
        self.cells.remove(cell)
    }

    /// Cached lookup for read-heavy display paths.
    pub fn get(&mut self, cell: &Cell) -> Option<TerritoryId> {
        if let Some(cached) = self.cache.lookup(cell) {
            return cached;
        }
        let owner = self.cells.get(cell).cloned();
        self.cache.store(cell.clone(), owner.clone());
        owner
    }

    /// Authoritative lookup; deciding operations use this, never the cache.
    pub fn peek(&self, cell: &Cell) -> Option<&TerritoryId> {
        self.cells.get(cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Drop all cached entries and apply a new capacity. Used after a
    /// snapshot restore, where the cache is not part of the persisted state.
    pub fn reset_cache(&mut self, capacity: usize) {
        self.cache = LookupCache::new(capacity);
    }

    /// Every cell owned by `territory_id`, across all realms.
    pub fn owned_by(&self, territory_id: &str) -> Vec<Cell> {
        self.cells
            .iter()
            .filter(|(_, owner)| owner.as_str() == territory_id)
            .map(|(cell, _)| cell.clone())
            .collect()
    }

    /// Claimed cells of `cell.realm` within Chebyshev `distance` of `cell`,
    /// via a range scan over the `[x - d, x + d]` band.
    pub fn claimed_near(&self, cell: &Cell, distance: u64) -> Vec<(Cell, TerritoryId)> {
        let span = i64::try_from(distance).unwrap_or(i64::from(i32::MAX));
        let lo_x = i64::from(cell.x).saturating_sub(span).max(i64::from(i32::MIN)) as i32;
        let hi_x = i64::from(cell.x).saturating_add(span).min(i64::from(i32::MAX)) as i32;
        let lo = Cell::new(cell.realm.clone(), lo_x, i32::MIN);
        let hi = Cell::new(cell.realm.clone(), hi_x, i32::MAX);
        self.cells
            .range(lo..=hi)
            .filter(|(candidate, _)| {
                matches!(cell.chebyshev_distance(candidate), Some(d) if d <= distance)
            })
            .map(|(candidate, owner)| (candidate.clone(), owner.clone()))
            .collect()
    }
}
