//! Wars, ceasefires and wartime sieges.

use serde::{Deserialize, Serialize};

use crate::config::DominionConfig;
use crate::error::DominionError;
use crate::grid::Cell;
use crate::notify::Notice;
use crate::state::DominionState;
use crate::types::{TerritoryId, WorldTime};

/// A declared war between two territories. A ceasefire suspends sieges
/// until its deadline; the deadline is re-checked on access, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarState {
    pub attacker: TerritoryId,
    pub defender: TerritoryId,
    pub declared_at: WorldTime,
    pub active: bool,
    #[serde(default)]
    pub ceasefire_until: Option<WorldTime>,
}

impl WarState {
    pub fn involves_pair(&self, a: &str, b: &str) -> bool {
        (self.attacker == a && self.defender == b) || (self.attacker == b && self.defender == a)
    }

    pub fn involves(&self, territory_id: &str) -> bool {
        self.attacker == territory_id || self.defender == territory_id
    }

    pub fn ceasefire_active(&self, now: WorldTime) -> bool {
        matches!(self.ceasefire_until, Some(until) if now < until)
    }
}

/// A wartime capture attempt on one cell. Attacker presence raises
/// progress, defender presence lowers it at double the rate; reaching the
/// threshold before the deadline forces the transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Siege {
    pub cell: Cell,
    pub attacker: TerritoryId,
    pub defender: TerritoryId,
    pub progress: i64,
    pub started_at: WorldTime,
    pub deadline: WorldTime,
}

impl Siege {
    pub fn is_expired(&self, now: WorldTime) -> bool {
        now >= self.deadline
    }
}

/// What a single siege tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiegeTickOutcome {
    Progressed { progress: i64 },
    /// Threshold reached and the forced transfer went through.
    Captured,
    /// Threshold reached but the attacker's claim failed; the capture
    /// silently fails and the siege ends.
    CaptureFailed,
    /// Deadline reached with no capture.
    Repelled,
    /// A ceasefire is in effect; progress is frozen.
    Paused,
}

impl DominionState {
    pub fn declare_war(
        &mut self,
        attacker_id: &str,
        defender_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.registry.get(attacker_id)?;
        self.registry.get(defender_id)?;
        if attacker_id == defender_id {
            return Err(DominionError::SelfTransfer {
                territory_id: attacker_id.to_string(),
            });
        }
        if self.war_between(attacker_id, defender_id).is_some() {
            return Err(DominionError::WarAlreadyActive {
                attacker: attacker_id.to_string(),
                defender: defender_id.to_string(),
            });
        }
        self.book.wars.push(WarState {
            attacker: attacker_id.to_string(),
            defender: defender_id.to_string(),
            declared_at: now,
            active: true,
            ceasefire_until: None,
        });
        let notice = Notice::WarDeclared {
            attacker: attacker_id.to_string(),
            defender: defender_id.to_string(),
        };
        self.push_notice(attacker_id, notice.clone());
        self.push_notice(defender_id, notice);
        Ok(())
    }

    pub fn war_between(&self, a: &str, b: &str) -> Option<&WarState> {
        self.book
            .wars
            .iter()
            .find(|war| war.active && war.involves_pair(a, b))
    }

    /// Suspends sieges between the two territories until `until`.
    pub fn declare_ceasefire(
        &mut self,
        a: &str,
        b: &str,
        until: WorldTime,
    ) -> Result<(), DominionError> {
        let war = self
            .book
            .wars
            .iter_mut()
            .find(|war| war.active && war.involves_pair(a, b))
            .ok_or_else(|| DominionError::NoActiveWar {
                attacker: a.to_string(),
                defender: b.to_string(),
            })?;
        war.ceasefire_until = Some(until);
        let (attacker, defender) = (war.attacker.clone(), war.defender.clone());
        self.push_notice(&attacker, Notice::CeasefireDeclared { until });
        self.push_notice(&defender, Notice::CeasefireDeclared { until });
        Ok(())
    }

    /// Ends the war and drops any sieges still running between the pair.
    pub fn end_war(&mut self, a: &str, b: &str) -> Result<(), DominionError> {
        let war = self
            .book
            .wars
            .iter_mut()
            .find(|war| war.active && war.involves_pair(a, b))
            .ok_or_else(|| DominionError::NoActiveWar {
                attacker: a.to_string(),
                defender: b.to_string(),
            })?;
        war.active = false;
        let (attacker, defender) = (war.attacker.clone(), war.defender.clone());
        self.book
            .sieges
            .retain(|_, siege| !(siege.attacker == attacker && siege.defender == defender)
                && !(siege.attacker == defender && siege.defender == attacker));
        let notice = Notice::WarEnded {
            attacker: attacker.clone(),
            defender: defender.clone(),
        };
        self.push_notice(&attacker, notice.clone());
        self.push_notice(&defender, notice);
        Ok(())
    }

    /// Opens a siege on a cell of a territory the attacker is at war with.
    pub fn start_siege(
        &mut self,
        config: &DominionConfig,
        attacker_id: &str,
        cell: &Cell,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        self.registry.get(attacker_id)?;
        let defender = self
            .index
            .peek(cell)
            .cloned()
            .ok_or_else(|| DominionError::CellNotClaimed { cell: cell.clone() })?;
        if defender == attacker_id {
            return Err(DominionError::SelfTransfer {
                territory_id: attacker_id.to_string(),
            });
        }
        let war = self.war_between(attacker_id, &defender).ok_or_else(|| {
            DominionError::NoActiveWar {
                attacker: attacker_id.to_string(),
                defender: defender.clone(),
            }
        })?;
        if war.ceasefire_active(now) {
            return Err(DominionError::CeasefireActive {
                until: war.ceasefire_until.unwrap_or(now),
            });
        }
        // A lapsed siege no sweep has collected yet counts as absent.
        if let Some(existing) = self.book.sieges.get(cell).cloned() {
            if !existing.is_expired(now) {
                return Err(DominionError::SiegeInProgress { cell: cell.clone() });
            }
            self.book.sieges.remove(cell);
            self.push_notice(
                &existing.attacker,
                Notice::SiegeRepelled { cell: cell.clone() },
            );
            self.push_notice(
                &existing.defender,
                Notice::SiegeRepelled { cell: cell.clone() },
            );
        }

        self.book.sieges.insert(
            cell.clone(),
            Siege {
                cell: cell.clone(),
                attacker: attacker_id.to_string(),
                defender: defender.clone(),
                progress: 0,
                started_at: now,
                deadline: now.saturating_add(config.siege.duration_ticks),
            },
        );
        let notice = Notice::SiegeStarted {
            cell: cell.clone(),
            attacker: attacker_id.to_string(),
        };
        self.push_notice(attacker_id, notice.clone());
        self.push_notice(&defender, notice);
        Ok(())
    }

    /// Advances one siege by one tick of presence observations.
    pub fn siege_tick(
        &mut self,
        config: &DominionConfig,
        cell: &Cell,
        attackers_present: bool,
        defenders_present: bool,
        now: WorldTime,
    ) -> Result<SiegeTickOutcome, DominionError> {
        let siege = self
            .book
            .sieges
            .get(cell)
            .cloned()
            .ok_or_else(|| DominionError::SiegeNotFound { cell: cell.clone() })?;

        if siege.is_expired(now) {
            self.book.sieges.remove(cell);
            self.push_notice(&siege.attacker, Notice::SiegeRepelled { cell: cell.clone() });
            self.push_notice(&siege.defender, Notice::SiegeRepelled { cell: cell.clone() });
            return Ok(SiegeTickOutcome::Repelled);
        }

        match self.war_between(&siege.attacker, &siege.defender) {
            None => {
                // The war ended out from under the siege.
                self.book.sieges.remove(cell);
                return Ok(SiegeTickOutcome::Repelled);
            }
            Some(war) if war.ceasefire_active(now) => {
                return Ok(SiegeTickOutcome::Paused);
            }
            Some(_) => {}
        }

        let rate = config.siege.attacker_rate;
        let mut progress = siege.progress;
        if attackers_present {
            progress = progress.saturating_add(rate);
        }
        if defenders_present {
            progress = progress.saturating_sub(rate.saturating_mul(2));
        }
        progress = progress.max(0);

        if progress < config.siege.completion_threshold {
            let entry = self
                .book
                .sieges
                .get_mut(cell)
                .ok_or_else(|| DominionError::SiegeNotFound { cell: cell.clone() })?;
            entry.progress = progress;
            return Ok(SiegeTickOutcome::Progressed { progress });
        }

        // Threshold reached: forced transfer, no payment. The buffer check
        // ignores the defender's cells; a contested cell is by nature
        // adjacent to them.
        self.book.sieges.remove(cell);
        // Stale siege: the defender let go of the cell mid-siege.
        if self.index.peek(cell).map(String::as_str) != Some(siege.defender.as_str()) {
            return Ok(SiegeTickOutcome::CaptureFailed);
        }
        let removed = self.remove_cell_for(&siege.defender, cell)?;
        match self.claim_transferred(
            config,
            &siege.attacker,
            cell.clone(),
            Some(&siege.defender),
            now,
        ) {
            Ok(()) => {
                let notice = Notice::CellCaptured {
                    cell: cell.clone(),
                    attacker: siege.attacker.clone(),
                };
                self.push_notice(&siege.attacker, notice.clone());
                self.push_notice(&siege.defender, notice);
                Ok(SiegeTickOutcome::Captured)
            }
            Err(_) => {
                self.restore_removed(&siege.defender, cell.clone(), removed)?;
                Ok(SiegeTickOutcome::CaptureFailed)
            }
        }
    }

    pub(crate) fn expire_sieges(&mut self, now: WorldTime) -> Vec<Cell> {
        let expired: Vec<Siege> = self
            .book
            .sieges
            .values()
            .filter(|siege| siege.is_expired(now))
            .cloned()
            .collect();
        let mut cells = Vec::new();
        for siege in expired {
            self.book.sieges.remove(&siege.cell);
            self.push_notice(
                &siege.attacker,
                Notice::SiegeRepelled {
                    cell: siege.cell.clone(),
                },
            );
            self.push_notice(
                &siege.defender,
                Notice::SiegeRepelled {
                    cell: siege.cell.clone(),
                },
            );
            cells.push(siege.cell);
        }
        cells
    }
}
