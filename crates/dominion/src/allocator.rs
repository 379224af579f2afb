//! Claim allocation: contiguous growth, buffer zones and capacity.

use crate::config::DominionConfig;
use crate::error::DominionError;
use crate::grid::{cells_within_radius, Cell};
use crate::ledger::Ledger;
use crate::notify::Notice;
use crate::state::DominionState;
use crate::territory::ClaimGroup;
use crate::types::WorldTime;

const MIN_CLAIM_RADIUS: u32 = 1;
const MAX_CLAIM_RADIUS: u32 = 10;

/// Undo token for an exact group-structure restore after a failed
/// transfer. `remove_cell_for` hands one out; `restore_removed` consumes
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemovedCell {
    group_index: usize,
    group_was_removed: bool,
}

impl DominionState {
    /// Claims `cell` for the territory, charging the realm's claim cost.
    ///
    /// Failure order: already claimed, realm disabled, too close to a
    /// foreign territory, capacity, then seed-or-adjacency. Nothing is
    /// mutated unless every check passes.
    pub fn claim(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        territory_id: &str,
        cell: Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.claim_checked(config, territory_id, &cell, None)?;
        let cost = config.economy.claim_cost;
        if cost > 0 && !ledger.debit(territory_id, cost) {
            return Err(DominionError::InsufficientFunds {
                account: territory_id.to_string(),
                amount: cost,
            });
        }
        self.attach_cell(config, territory_id, cell, now)
    }

    /// Claim path for protocol transfers (sale, auction, siege): no charge,
    /// optionally exempting one territory from the buffer check.
    pub(crate) fn claim_transferred(
        &mut self,
        config: &DominionConfig,
        territory_id: &str,
        cell: Cell,
        buffer_exempt: Option<&str>,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.claim_checked(config, territory_id, &cell, buffer_exempt)?;
        self.attach_cell(config, territory_id, cell, now)
    }

    /// Runs every claim check without mutating anything.
    fn claim_checked(
        &self,
        config: &DominionConfig,
        territory_id: &str,
        cell: &Cell,
        buffer_exempt: Option<&str>,
    ) -> Result<(), DominionError> {
        let territory = self.registry.get(territory_id)?;

        if self.index.peek(cell).is_some() {
            return Err(DominionError::AlreadyClaimed { cell: cell.clone() });
        }
        if !config.claiming_enabled(&cell.realm) {
            return Err(DominionError::RealmDisabled {
                realm: cell.realm.clone(),
            });
        }

        let buffer = config.buffer_zone(&cell.realm);
        for (neighbor, owner) in self.index.claimed_near(cell, buffer) {
            if owner == territory_id || buffer_exempt == Some(owner.as_str()) {
                continue;
            }
            let distance = cell.chebyshev_distance(&neighbor).unwrap_or(u64::MAX);
            return Err(DominionError::TooCloseToOther {
                cell: cell.clone(),
                distance,
                required: buffer + 1,
            });
        }

        let max = territory.max_cells(&config.capacity);
        if territory.current_cells >= max {
            return Err(DominionError::CapacityExceeded {
                current: territory.current_cells,
                max,
            });
        }

        if !territory.groups.is_empty() && territory.adjacent_group(cell).is_none() {
            return Err(DominionError::NotAdjacent { cell: cell.clone() });
        }
        Ok(())
    }

    /// Attaches an already-validated cell: seed a fresh group or join the
    /// first adjacent one, then update the index, counters and XP.
    fn attach_cell(
        &mut self,
        config: &DominionConfig,
        territory_id: &str,
        cell: Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let territory = self.registry.get_mut(territory_id)?;
        match territory.adjacent_group(&cell) {
            Some(group_index) => territory.groups[group_index].insert(cell.clone()),
            None => territory.groups.push(ClaimGroup::seeded(cell.clone())),
        }
        territory.current_cells += 1;
        territory.last_active_at = now;
        self.index.put(cell.clone(), territory_id);

        if let Some(level) = self.registry.award_xp(
            territory_id,
            config.progression.xp_per_claim,
            &config.progression,
        )? {
            self.push_notice(territory_id, Notice::LevelReached { level });
        }
        self.push_notice(territory_id, Notice::CellClaimed { cell });
        Ok(())
    }

    /// Releases a cell the territory owns. Fails cleanly, with no side
    /// effects, when it does not.
    pub fn unclaim(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        territory_id: &str,
        cell: &Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.require_owner(territory_id, cell)?;
        self.remove_cell_for(territory_id, cell)?;
        let territory = self.registry.get_mut(territory_id)?;
        territory.cell_settings.remove(cell);
        territory.last_active_at = now;

        let refund = config.economy.unclaim_refund;
        if refund > 0 {
            ledger.credit(territory_id, refund);
        }
        self.push_notice(territory_id, Notice::CellUnclaimed { cell: cell.clone() });
        Ok(())
    }

    /// Best-effort bulk claim around `center`. Radius is clamped to
    /// [1, 10]; cells are visited by ascending Chebyshev distance and the
    /// sweep stops at capacity. Returns the cells that actually succeeded.
    pub fn claim_radius(
        &mut self,
        config: &DominionConfig,
        ledger: &dyn Ledger,
        territory_id: &str,
        center: &Cell,
        radius: u32,
        now: WorldTime,
    ) -> Result<Vec<Cell>, DominionError> {
        self.registry.get(territory_id)?;
        let radius = radius.clamp(MIN_CLAIM_RADIUS, MAX_CLAIM_RADIUS);
        let mut claimed = Vec::new();
        for cell in cells_within_radius(center, radius) {
            let territory = self.registry.get(territory_id)?;
            if territory.current_cells >= territory.max_cells(&config.capacity) {
                break;
            }
            if self
                .claim(config, ledger, territory_id, cell.clone(), now)
                .is_ok()
            {
                claimed.push(cell);
            }
        }
        Ok(claimed)
    }

    /// Detaches a cell from its group and the index without refunds or
    /// notices. Transfer protocols use the returned token to restore the
    /// exact prior structure when the receiving side's claim fails.
    pub(crate) fn remove_cell_for(
        &mut self,
        territory_id: &str,
        cell: &Cell,
    ) -> Result<RemovedCell, DominionError> {
        let territory = self.registry.get_mut(territory_id)?;
        let group_index =
            territory
                .group_of(cell)
                .ok_or_else(|| DominionError::CellNotClaimed {
                    cell: cell.clone(),
                })?;
        territory.groups[group_index].remove(cell);
        let group_was_removed = territory.groups[group_index].is_empty();
        if group_was_removed {
            territory.groups.remove(group_index);
        }
        territory.current_cells = territory.current_cells.saturating_sub(1);
        self.index.remove(cell);
        Ok(RemovedCell {
            group_index,
            group_was_removed,
        })
    }

    /// Exact inverse of `remove_cell_for`.
    pub(crate) fn restore_removed(
        &mut self,
        territory_id: &str,
        cell: Cell,
        removed: RemovedCell,
    ) -> Result<(), DominionError> {
        let territory = self.registry.get_mut(territory_id)?;
        if removed.group_was_removed {
            let index = removed.group_index.min(territory.groups.len());
            territory
                .groups
                .insert(index, ClaimGroup::seeded(cell.clone()));
        } else {
            territory.groups[removed.group_index].insert(cell.clone());
        }
        territory.current_cells += 1;
        self.index.put(cell, territory_id);
        Ok(())
    }

    /// Releases every cell a territory owns, across all realms. Used by
    /// dissolve; no refunds, no per-cell notices.
    pub(crate) fn release_all_claims(&mut self, territory_id: &str) -> Vec<Cell> {
        let cells = self.index.owned_by(territory_id);
        for cell in &cells {
            self.index.remove(cell);
        }
        if let Ok(territory) = self.registry.get_mut(territory_id) {
            territory.groups.clear();
            territory.current_cells = 0;
            territory.cell_settings.clear();
        }
        cells
    }
}
