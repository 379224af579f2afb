pub mod allocator;
pub mod config;
pub mod core;
pub mod error;
pub mod grid;
pub mod index;
pub mod ledger;
pub mod market;
pub mod notify;
pub mod persist;
pub mod registry;
pub mod routines;
pub mod siege;
pub mod state;
pub mod territory;
pub mod types;
pub mod util;

pub use config::{
    CapacityPolicy, DominionConfig, EconomyPolicy, LifecyclePolicy, ProgressionPolicy, RealmRules,
    SiegePolicy, DEFAULT_BASE_CELLS, DEFAULT_BUFFER_ZONE, DEFAULT_CELLS_PER_LEVEL,
    DEFAULT_LOOKUP_CACHE_CAPACITY, DEFAULT_XP_PER_CLAIM, DEFAULT_XP_PER_LEVEL, TICKS_PER_DAY,
};
pub use self::core::Dominion;
pub use error::DominionError;
pub use grid::{cells_within_radius, Cell};
pub use index::{LookupCache, TerritoryIndex};
pub use ledger::{InMemoryLedger, Ledger};
pub use market::{Auction, Bid, RentGrant, SaleListing};
pub use notify::{Notice, Notifier, NullNotifier, RecordingNotifier};
pub use persist::{
    JsonDirGateway, MemoryGateway, PersistPolicy, PersistQueue, PersistStatus, PersistenceGateway,
    Snapshot,
};
pub use registry::TerritoryRegistry;
pub use routines::MaintenanceReport;
pub use siege::{Siege, SiegeTickOutcome, WarState};
pub use state::{DominionState, TransferBook};
pub use territory::{CellSettings, ClaimGroup, Territory};
pub use types::{ActorId, Coins, RealmId, TerritoryId, WorldTime};

#[cfg(test)]
mod tests;
