//! The `Dominion` facade: serialized access to the claim core, notice
//! fan-out and persistence scheduling.

use std::sync::{Arc, Mutex};

use crate::config::DominionConfig;
use crate::error::DominionError;
use crate::grid::Cell;
use crate::ledger::Ledger;
use crate::notify::Notifier;
use crate::persist::{PersistPolicy, PersistQueue, PersistStatus, PersistenceGateway, Snapshot};
use crate::routines::MaintenanceReport;
use crate::siege::SiegeTickOutcome;
use crate::state::DominionState;
use crate::territory::{CellSettings, Territory};
use crate::types::{Coins, TerritoryId, WorldTime};

/// Owns the core state behind a single mutex. Every deciding operation
/// runs inside the exclusive section and validates against the
/// authoritative index there; the lookup cache only serves display reads.
/// Structural mutations mark the persistence queue dirty; writes are
/// coalesced and pushed out by `pump_persistence`.
pub struct Dominion {
    config: DominionConfig,
    state: Mutex<DominionState>,
    persist: Mutex<PersistQueue>,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    gateway: Arc<dyn PersistenceGateway>,
}

impl Dominion {
    pub fn new(
        config: DominionConfig,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        let cache_capacity = config.lookup_cache_capacity;
        Self {
            config,
            state: Mutex::new(DominionState::new(cache_capacity)),
            persist: Mutex::new(PersistQueue::new(PersistPolicy::default())),
            ledger,
            notifier,
            gateway,
        }
    }

    /// Builds a core from the gateway's stored snapshot, or a fresh one
    /// when nothing was persisted yet.
    pub fn restore(
        config: DominionConfig,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Result<Self, DominionError> {
        let cache_capacity = config.lookup_cache_capacity;
        let state = match gateway.load()? {
            Some(snapshot) => snapshot.into_state(cache_capacity),
            None => DominionState::new(cache_capacity),
        };
        Ok(Self {
            config,
            state: Mutex::new(state),
            persist: Mutex::new(PersistQueue::new(PersistPolicy::default())),
            ledger,
            notifier,
            gateway,
        })
    }

    pub fn config(&self) -> &DominionConfig {
        &self.config
    }

    /// Runs a mutating operation: exclusive section, notice fan-out, and
    /// a dirty mark for the persistence queue.
    fn mutate<R>(
        &self,
        op: impl FnOnce(&mut DominionState) -> Result<R, DominionError>,
    ) -> Result<R, DominionError> {
        let mut state = self.state.lock().expect("lock state");
        let result = op(&mut state);
        let notices = state.drain_notices();
        drop(state);
        if !notices.is_empty() {
            self.persist.lock().expect("lock persist queue").mark_dirty();
            for (territory_id, notice) in notices {
                self.notifier.notify(&territory_id, notice);
            }
        } else if result.is_ok() {
            self.persist.lock().expect("lock persist queue").mark_dirty();
        }
        result
    }

    fn read<R>(&self, op: impl FnOnce(&DominionState) -> R) -> R {
        let state = self.state.lock().expect("lock state");
        op(&state)
    }

    // -------------------------------------------------------------------------
    // Registry operations
    // -------------------------------------------------------------------------

    /// Founds a territory, optionally seeding its first claim group. The
    /// founding claim failing unwinds the creation.
    pub fn create_territory(
        &self,
        name: &str,
        leader: &str,
        founding_cell: Option<Cell>,
        now: WorldTime,
    ) -> Result<TerritoryId, DominionError> {
        let config = &self.config;
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| {
            let territory_id = state.registry.create(name, leader, now)?;
            if let Some(cell) = founding_cell {
                if let Err(error) = state.claim(config, ledger.as_ref(), &territory_id, cell, now) {
                    state.registry.remove_entry(&territory_id)?;
                    return Err(error);
                }
            }
            Ok(territory_id)
        })
    }

    pub fn territory(&self, territory_id: &str) -> Result<Territory, DominionError> {
        self.read(|state| state.registry.get(territory_id).cloned())
    }

    pub fn find_by_name(&self, name: &str) -> Option<Territory> {
        self.read(|state| state.registry.find_by_name(name).cloned())
    }

    pub fn territory_of(&self, actor_id: &str) -> Option<TerritoryId> {
        self.read(|state| state.registry.territory_of(actor_id).cloned())
    }

    pub fn rename_territory(&self, territory_id: &str, name: &str) -> Result<(), DominionError> {
        self.mutate(|state| state.registry.rename(territory_id, name))
    }

    pub fn add_member(
        &self,
        territory_id: &str,
        actor_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.mutate(|state| state.registry.add_member(territory_id, actor_id, now))
    }

    pub fn remove_member(
        &self,
        territory_id: &str,
        actor_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.mutate(|state| state.registry.remove_member(territory_id, actor_id, now))
    }

    pub fn transfer_leadership(
        &self,
        territory_id: &str,
        actor_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.mutate(|state| state.registry.transfer_leadership(territory_id, actor_id, now))
    }

    pub fn dissolve(&self, territory_id: &str) -> Result<(), DominionError> {
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| state.dissolve(ledger.as_ref(), territory_id))
    }

    // -------------------------------------------------------------------------
    // Claims
    // -------------------------------------------------------------------------

    pub fn claim(
        &self,
        territory_id: &str,
        cell: Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let config = &self.config;
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| state.claim(config, ledger.as_ref(), territory_id, cell, now))
    }

    pub fn unclaim(
        &self,
        territory_id: &str,
        cell: &Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let config = &self.config;
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| state.unclaim(config, ledger.as_ref(), territory_id, cell, now))
    }

    pub fn claim_radius(
        &self,
        territory_id: &str,
        center: &Cell,
        radius: u32,
        now: WorldTime,
    ) -> Result<Vec<Cell>, DominionError> {
        let config = &self.config;
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| {
            state.claim_radius(config, ledger.as_ref(), territory_id, center, radius, now)
        })
    }

    /// Display lookup through the bounded cache.
    pub fn owner_of(&self, cell: &Cell) -> Option<TerritoryId> {
        let mut state = self.state.lock().expect("lock state");
        state.index.get(cell)
    }

    pub fn set_cell_settings(
        &self,
        territory_id: &str,
        cell: &Cell,
        settings: CellSettings,
    ) -> Result<(), DominionError> {
        self.mutate(|state| {
            state.require_owner(territory_id, cell)?;
            let territory = state.registry.get_mut(territory_id)?;
            territory.cell_settings.insert(cell.clone(), settings);
            Ok(())
        })
    }

    pub fn cell_settings(&self, cell: &Cell) -> Option<CellSettings> {
        self.read(|state| {
            let owner = state.index.peek(cell)?;
            let territory = state.registry.get(owner).ok()?;
            territory.cell_settings.get(cell).cloned()
        })
    }

    // -------------------------------------------------------------------------
    // Transfers
    // -------------------------------------------------------------------------

    pub fn list_for_sale(
        &self,
        territory_id: &str,
        cell: Cell,
        price: Coins,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.mutate(|state| state.list_for_sale(territory_id, cell, price, now))
    }

    pub fn cancel_sale(&self, territory_id: &str, cell: &Cell) -> Result<(), DominionError> {
        self.mutate(|state| state.cancel_sale(territory_id, cell))
    }

    pub fn buy_cell(
        &self,
        buyer_id: &str,
        cell: &Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let config = &self.config;
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| state.buy_cell(config, ledger.as_ref(), buyer_id, cell, now))
    }

    pub fn open_auction(
        &self,
        territory_id: &str,
        cell: Cell,
        min_bid: Coins,
        duration: WorldTime,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.mutate(|state| state.open_auction(territory_id, cell, min_bid, duration, now))
    }

    pub fn place_bid(
        &self,
        bidder_id: &str,
        cell: &Cell,
        amount: Coins,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| state.place_bid(ledger.as_ref(), bidder_id, cell, amount, now))
    }

    pub fn start_rent(
        &self,
        renter_id: &str,
        cell: &Cell,
        daily_rate: Coins,
        days: u32,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| state.start_rent(ledger.as_ref(), renter_id, cell, daily_rate, days, now))
    }

    pub fn rent_active(&self, cell: &Cell, renter_id: &str, now: WorldTime) -> bool {
        self.read(|state| state.rent_active(cell, renter_id, now))
    }

    // -------------------------------------------------------------------------
    // Wars and sieges
    // -------------------------------------------------------------------------

    pub fn declare_war(
        &self,
        attacker_id: &str,
        defender_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.mutate(|state| state.declare_war(attacker_id, defender_id, now))
    }

    pub fn declare_ceasefire(&self, a: &str, b: &str, until: WorldTime) -> Result<(), DominionError> {
        self.mutate(|state| state.declare_ceasefire(a, b, until))
    }

    pub fn end_war(&self, a: &str, b: &str) -> Result<(), DominionError> {
        self.mutate(|state| state.end_war(a, b))
    }

    pub fn start_siege(
        &self,
        attacker_id: &str,
        cell: &Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let config = &self.config;
        self.mutate(|state| state.start_siege(config, attacker_id, cell, now))
    }

    pub fn siege_tick(
        &self,
        cell: &Cell,
        attackers_present: bool,
        defenders_present: bool,
        now: WorldTime,
    ) -> Result<SiegeTickOutcome, DominionError> {
        let config = &self.config;
        self.mutate(|state| {
            state.siege_tick(config, cell, attackers_present, defenders_present, now)
        })
    }

    // -------------------------------------------------------------------------
    // Maintenance and persistence
    // -------------------------------------------------------------------------

    /// Periodic system sweep; see [`MaintenanceReport`].
    pub fn run_maintenance(&self, now: WorldTime) -> Result<MaintenanceReport, DominionError> {
        let config = &self.config;
        let ledger = Arc::clone(&self.ledger);
        self.mutate(|state| state.run_maintenance(config, ledger.as_ref(), now))
    }

    pub fn snapshot(&self, now: WorldTime) -> Snapshot {
        self.read(|state| Snapshot::of(state, now))
    }

    /// Writes a snapshot when the queue has coalesced work due now.
    pub fn pump_persistence(&self, now: WorldTime) -> bool {
        let mut queue = self.persist.lock().expect("lock persist queue");
        if !queue.status().dirty {
            return false;
        }
        let snapshot = self.snapshot(now);
        queue.pump(now, self.gateway.as_ref(), &snapshot)
    }

    /// Synchronous save for shutdown.
    pub fn flush_now(&self, now: WorldTime) -> Result<(), DominionError> {
        let snapshot = self.snapshot(now);
        let mut queue = self.persist.lock().expect("lock persist queue");
        queue.flush(self.gateway.as_ref(), &snapshot)
    }

    pub fn persist_status(&self) -> PersistStatus {
        self.persist.lock().expect("lock persist queue").status()
    }
}
