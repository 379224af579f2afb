//! Error types for territory operations.

use std::io;

use crate::grid::Cell;
use crate::types::{Coins, TerritoryId, WorldTime};

/// Errors that can occur in claim, registry and transfer operations.
/// Expected business-rule failures are returned, never panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DominionError {
    InvalidName { name: String },
    TerritoryExists { name: String },
    TerritoryNotFound { territory_id: TerritoryId },
    ActorAlreadyEnrolled { actor_id: String },
    ActorNotMember { actor_id: String },
    AlreadyClaimed { cell: Cell },
    RealmDisabled { realm: String },
    TooCloseToOther { cell: Cell, distance: u64, required: u64 },
    NotAdjacent { cell: Cell },
    CapacityExceeded { current: u32, max: u32 },
    CellNotClaimed { cell: Cell },
    NotOwner { cell: Cell, owner: TerritoryId },
    InsufficientFunds { account: TerritoryId, amount: Coins },
    InvalidAmount { amount: Coins },
    DuplicateListing { cell: Cell },
    ListingNotFound { cell: Cell },
    AuctionNotFound { cell: Cell },
    AuctionExpired { cell: Cell },
    BidTooLow { bid: Coins, floor: Coins },
    RentOccupied { cell: Cell },
    NoActiveWar { attacker: TerritoryId, defender: TerritoryId },
    WarAlreadyActive { attacker: TerritoryId, defender: TerritoryId },
    CeasefireActive { until: WorldTime },
    SiegeInProgress { cell: Cell },
    SiegeNotFound { cell: Cell },
    SelfTransfer { territory_id: TerritoryId },
    Persistence { reason: String },
    Io(String),
    Serde(String),
}

impl From<serde_json::Error> for DominionError {
    fn from(error: serde_json::Error) -> Self {
        DominionError::Serde(error.to_string())
    }
}

impl From<io::Error> for DominionError {
    fn from(error: io::Error) -> Self {
        DominionError::Io(error.to_string())
    }
}
