//! System-driven lifecycle routines: dissolve, disband, merge and
//! auto-expand, plus the periodic maintenance sweep that also settles
//! expired auctions, rents and sieges.

use std::collections::BTreeSet;

use crate::config::DominionConfig;
use crate::error::DominionError;
use crate::grid::{cells_within_radius, Cell};
use crate::ledger::Ledger;
use crate::notify::Notice;
use crate::state::DominionState;
use crate::types::{TerritoryId, WorldTime};

/// What one maintenance sweep did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaintenanceReport {
    pub settled_auctions: Vec<Cell>,
    pub expired_rents: Vec<Cell>,
    pub expired_sieges: Vec<Cell>,
    pub disbanded: Vec<TerritoryId>,
    pub merged: Vec<(TerritoryId, TerritoryId)>,
    pub auto_expanded: Vec<(TerritoryId, Cell)>,
}

impl DominionState {
    /// Removes a territory entirely: every cell released, every membership
    /// cleared, every transfer record touching it resolved or dropped.
    pub fn dissolve(
        &mut self,
        ledger: &dyn Ledger,
        territory_id: &str,
    ) -> Result<(), DominionError> {
        self.registry.get(territory_id)?;
        self.release_all_claims(territory_id);
        self.purge_transfers_for(ledger, territory_id);
        let territory = self.registry.remove_entry(territory_id)?;
        self.push_notice(
            territory_id,
            Notice::Disbanded {
                territory_id: territory_id.to_string(),
                name: territory.name,
            },
        );
        Ok(())
    }

    /// Drops every transfer record referencing the territory. Standing
    /// auction bids are refunded; rent money already changed hands and
    /// stays where it is.
    pub(crate) fn purge_transfers_for(&mut self, ledger: &dyn Ledger, territory_id: &str) {
        self.book
            .sales
            .retain(|_, listing| listing.seller != territory_id);

        let auction_cells: Vec<Cell> = self.book.auctions.keys().cloned().collect();
        for cell in auction_cells {
            let Some(auction) = self.book.auctions.get_mut(&cell) else {
                continue;
            };
            if auction.seller == territory_id {
                if let Some(bid) = auction.current.take() {
                    ledger.credit(&bid.bidder, bid.amount);
                }
                self.book.auctions.remove(&cell);
            } else if auction
                .current
                .as_ref()
                .is_some_and(|bid| bid.bidder == territory_id)
            {
                let bid = auction.current.take();
                if let Some(bid) = bid {
                    ledger.credit(&bid.bidder, bid.amount);
                }
            }
        }

        self.book
            .rents
            .retain(|_, grant| grant.owner != territory_id && grant.renter != territory_id);
        self.book
            .sieges
            .retain(|_, siege| siege.attacker != territory_id && siege.defender != territory_id);
        self.book.wars.retain(|war| !war.involves(territory_id));
    }

    /// Periodic sweep: settle expired auctions, lapse rents and sieges,
    /// disband hollow territories, merge small neighbors, auto-expand.
    pub fn run_maintenance(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        now: WorldTime,
    ) -> Result<MaintenanceReport, DominionError> {
        let mut report = MaintenanceReport::default();

        let expired_auctions: Vec<Cell> = self
            .book
            .auctions
            .values()
            .filter(|auction| auction.is_expired(now))
            .map(|auction| auction.cell.clone())
            .collect();
        for cell in expired_auctions {
            self.settle_auction(config, ledger, &cell, now)?;
            report.settled_auctions.push(cell);
        }

        report.expired_rents = self.expire_rents(now);
        report.expired_sieges = self.expire_sieges(now);
        report.disbanded = self.disband_inactive(config, ledger, now)?;
        report.merged = self.merge_small_neighbors(config, ledger, now)?;
        if config.lifecycle.auto_expand_enabled {
            report.auto_expanded = self.auto_expand(config, ledger, now)?;
        }
        Ok(report)
    }

    fn disband_inactive(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        now: WorldTime,
    ) -> Result<Vec<TerritoryId>, DominionError> {
        let mut disbanded = Vec::new();
        for territory_id in self.registry.territory_ids() {
            let territory = self.registry.get(&territory_id)?;
            let hollow = territory.roster_len() < config.lifecycle.min_members;
            let idle = now.saturating_sub(territory.last_active_at)
                >= config.lifecycle.inactivity_disband_ticks;
            if hollow && idle {
                self.dissolve(ledger, &territory_id)?;
                disbanded.push(territory_id);
            }
        }
        Ok(disbanded)
    }

    fn merge_small_neighbors(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        now: WorldTime,
    ) -> Result<Vec<(TerritoryId, TerritoryId)>, DominionError> {
        let ids = self.registry.territory_ids();
        let mut consumed: BTreeSet<TerritoryId> = BTreeSet::new();
        let mut merged = Vec::new();

        for (i, a) in ids.iter().enumerate() {
            for b in ids.iter().skip(i + 1) {
                if consumed.contains(a) || consumed.contains(b) {
                    continue;
                }
                if !self.merge_eligible(config, a, b)? {
                    continue;
                }
                let (survivor, absorbed) = self.merge_order(a, b)?;
                self.merge_into(config, ledger, &survivor, &absorbed, now)?;
                consumed.insert(absorbed.clone());
                merged.push((survivor, absorbed));
            }
        }
        Ok(merged)
    }

    fn merge_eligible(
        &self,
        config: &DominionConfig,
        a: &str,
        b: &str,
    ) -> Result<bool, DominionError> {
        let lifecycle = &config.lifecycle;
        for id in [a, b] {
            let territory = self.registry.get(id)?;
            if territory.roster_len() > lifecycle.merge_max_members
                || territory.current_cells > lifecycle.merge_max_cells
            {
                return Ok(false);
            }
        }
        let cells_a = self.index.owned_by(a);
        let cells_b = self.index.owned_by(b);
        if cells_a.is_empty() || cells_b.is_empty() {
            return Ok(false);
        }
        let within = cells_a.iter().any(|ca| {
            cells_b
                .iter()
                .any(|cb| matches!(ca.chebyshev_distance(cb), Some(d) if d <= lifecycle.merge_distance))
        });
        Ok(within)
    }

    /// The older territory survives; creation-time ties fall back to id
    /// order.
    fn merge_order(
        &self,
        a: &str,
        b: &str,
    ) -> Result<(TerritoryId, TerritoryId), DominionError> {
        let ta = self.registry.get(a)?;
        let tb = self.registry.get(b)?;
        if (ta.created_at, &ta.id) <= (tb.created_at, &tb.id) {
            Ok((a.to_string(), b.to_string()))
        } else {
            Ok((b.to_string(), a.to_string()))
        }
    }

    fn merge_into(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        survivor_id: &str,
        absorbed_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let absorbed = self.registry.get(absorbed_id)?.clone();

        for cell in self.index.owned_by(absorbed_id) {
            self.index.put(cell, survivor_id);
        }

        {
            let survivor = self.registry.get_mut(survivor_id)?;
            survivor.groups.extend(absorbed.groups.iter().cloned());
            survivor.current_cells += absorbed.current_cells;
            survivor
                .cell_settings
                .extend(absorbed.cell_settings.clone());
            survivor.xp = survivor.xp.saturating_add(absorbed.xp);
            if config.progression.xp_per_level > 0 {
                survivor.level = (survivor.xp / config.progression.xp_per_level) as u32;
            }
            survivor.last_active_at = now;
        }

        self.registry.absorb_roster(&absorbed, survivor_id)?;
        self.registry.remove_entry(absorbed_id)?;

        let balance = ledger.balance(absorbed_id);
        if balance > 0 && ledger.debit(absorbed_id, balance) {
            ledger.credit(survivor_id, balance);
        }
        self.purge_transfers_for(ledger, absorbed_id);

        self.push_notice(
            survivor_id,
            Notice::Merged {
                survivor: survivor_id.to_string(),
                absorbed_name: absorbed.name,
            },
        );
        Ok(())
    }

    /// Claims one adjacent unclaimed cell per eligible territory, through
    /// the normal claim path so every invariant still applies. The expand
    /// cost is refunded when no candidate is claimable.
    fn auto_expand(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        now: WorldTime,
    ) -> Result<Vec<(TerritoryId, Cell)>, DominionError> {
        let mut expanded = Vec::new();
        for territory_id in self.registry.territory_ids() {
            let territory = self.registry.get(&territory_id)?;
            let due = match territory.last_auto_expand_at {
                None => true,
                Some(last) => {
                    now.saturating_sub(last) >= config.lifecycle.auto_expand_cooldown_ticks
                }
            };
            if !due || territory.current_cells >= territory.max_cells(&config.capacity) {
                continue;
            }

            let cost = config.economy.auto_expand_cost;
            if cost > 0 && !ledger.debit(&territory_id, cost) {
                continue;
            }

            let mut candidates: BTreeSet<Cell> = BTreeSet::new();
            for cell in self.index.owned_by(&territory_id) {
                for neighbor in cells_within_radius(&cell, 1) {
                    if self.index.peek(&neighbor).is_none() {
                        candidates.insert(neighbor);
                    }
                }
            }

            let mut claimed = None;
            for candidate in candidates {
                if self
                    .claim_transferred(config, &territory_id, candidate.clone(), None, now)
                    .is_ok()
                {
                    claimed = Some(candidate);
                    break;
                }
            }

            match claimed {
                Some(cell) => {
                    let territory = self.registry.get_mut(&territory_id)?;
                    territory.last_auto_expand_at = Some(now);
                    self.push_notice(&territory_id, Notice::AutoExpanded { cell: cell.clone() });
                    expanded.push((territory_id, cell));
                }
                None => {
                    if cost > 0 {
                        ledger.credit(&territory_id, cost);
                    }
                }
            }
        }
        Ok(expanded)
    }
}
