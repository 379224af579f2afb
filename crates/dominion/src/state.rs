//! Aggregate core state: index, registry and the transfer book.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DominionError;
use crate::grid::Cell;
use crate::index::TerritoryIndex;
use crate::market::{Auction, RentGrant, SaleListing};
use crate::notify::Notice;
use crate::registry::TerritoryRegistry;
use crate::siege::{Siege, WarState};
use crate::types::TerritoryId;

/// Ephemeral transfer records: one entry per cell per protocol, plus the
/// war list that gates sieges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TransferBook {
    pub sales: BTreeMap<Cell, SaleListing>,
    pub auctions: BTreeMap<Cell, Auction>,
    pub rents: BTreeMap<Cell, RentGrant>,
    pub sieges: BTreeMap<Cell, Siege>,
    pub wars: Vec<WarState>,
}

/// The mutable state of the claim core. All mutation goes through the
/// operation impls spread across `allocator`, `market`, `siege` and
/// `routines`; the facade serializes access.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DominionState {
    pub index: TerritoryIndex,
    pub registry: TerritoryRegistry,
    pub book: TransferBook,
    #[serde(skip)]
    pending_notices: Vec<(TerritoryId, Notice)>,
}

impl PartialEq for DominionState {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.registry == other.registry && self.book == other.book
    }
}

impl DominionState {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            index: TerritoryIndex::new(cache_capacity),
            registry: TerritoryRegistry::new(),
            book: TransferBook::default(),
            pending_notices: Vec::new(),
        }
    }

    pub fn from_parts(
        index: TerritoryIndex,
        registry: TerritoryRegistry,
        book: TransferBook,
    ) -> Self {
        Self {
            index,
            registry,
            book,
            pending_notices: Vec::new(),
        }
    }

    pub(crate) fn push_notice(&mut self, territory_id: &str, notice: Notice) {
        self.pending_notices.push((territory_id.to_string(), notice));
    }

    /// Takes everything staged since the last drain. The facade fans these
    /// out to the notifier after each operation.
    pub fn drain_notices(&mut self) -> Vec<(TerritoryId, Notice)> {
        std::mem::take(&mut self.pending_notices)
    }

    /// The territory must own the cell according to the authoritative
    /// index, not the cache.
    pub(crate) fn require_owner(
        &self,
        territory_id: &str,
        cell: &Cell,
    ) -> Result<(), DominionError> {
        self.registry.get(territory_id)?;
        match self.index.peek(cell) {
            None => Err(DominionError::CellNotClaimed { cell: cell.clone() }),
            Some(owner) if owner != territory_id => Err(DominionError::NotOwner {
                cell: cell.clone(),
                owner: owner.clone(),
            }),
            Some(_) => Ok(()),
        }
    }
}
