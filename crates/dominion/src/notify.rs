//! Typed notices emitted to the external notifier.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::grid::Cell;
use crate::types::{Coins, TerritoryId, WorldTime};

/// What happened, from the core's point of view. Presentation layers
/// translate these into user-facing messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    CellClaimed { cell: Cell },
    CellUnclaimed { cell: Cell },
    LevelReached { level: u32 },
    SaleListed { cell: Cell, price: Coins },
    SaleCompleted { cell: Cell, price: Coins, buyer: TerritoryId },
    SaleCancelled { cell: Cell, reason: String },
    AuctionOpened { cell: Cell, min_bid: Coins, expires_at: WorldTime },
    Outbid { cell: Cell, refunded: Coins },
    AuctionWon { cell: Cell, amount: Coins },
    AuctionClosed { cell: Cell, winner: Option<TerritoryId> },
    RentStarted { cell: Cell, renter: TerritoryId, expires_at: WorldTime },
    RentExpired { cell: Cell, renter: TerritoryId },
    WarDeclared { attacker: TerritoryId, defender: TerritoryId },
    CeasefireDeclared { until: WorldTime },
    WarEnded { attacker: TerritoryId, defender: TerritoryId },
    SiegeStarted { cell: Cell, attacker: TerritoryId },
    CellCaptured { cell: Cell, attacker: TerritoryId },
    SiegeRepelled { cell: Cell },
    Disbanded { territory_id: TerritoryId, name: String },
    Merged { survivor: TerritoryId, absorbed_name: String },
    AutoExpanded { cell: Cell },
}

/// Notification fan-out seam. Delivery, presence and formatting live
/// outside the core.
pub trait Notifier: Send + Sync {
    fn notify(&self, territory_id: &str, notice: Notice);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _territory_id: &str, _notice: Notice) {}
}

/// Captures notices for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    entries: Arc<Mutex<Vec<(TerritoryId, Notice)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(TerritoryId, Notice)> {
        self.entries.lock().expect("lock notices").clone()
    }

    pub fn take(&self) -> Vec<(TerritoryId, Notice)> {
        std::mem::take(&mut *self.entries.lock().expect("lock notices"))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, territory_id: &str, notice: Notice) {
        self.entries
            .lock()
            .expect("lock notices")
            .push((territory_id.to_string(), notice));
    }
}
