//! Tests for the dominion core.

use std::sync::Arc;

use crate::config::DominionConfig;
use crate::core::Dominion;
use crate::grid::Cell;
use crate::ledger::InMemoryLedger;
use crate::notify::RecordingNotifier;
use crate::persist::MemoryGateway;
use crate::types::TerritoryId;

pub(super) fn cell(x: i32, z: i32) -> Cell {
    Cell::new("overworld", x, z)
}

pub(super) fn cell_in(realm: &str, x: i32, z: i32) -> Cell {
    Cell::new(realm, x, z)
}

/// A core wired to in-memory collaborators the tests can inspect.
pub(super) struct Harness {
    pub dominion: Dominion,
    pub ledger: Arc<InMemoryLedger>,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<MemoryGateway>,
}

impl Harness {
    pub fn with_config(config: DominionConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let gateway = Arc::new(MemoryGateway::new());
        let dominion = Dominion::new(
            config,
            ledger.clone(),
            notifier.clone(),
            gateway.clone(),
        );
        Self {
            dominion,
            ledger,
            notifier,
            gateway,
        }
    }

    pub fn new() -> Self {
        Self::with_config(DominionConfig::default())
    }

    /// Config with no buffer zone and no automatic disband or merge, so
    /// small single-member fixtures can sit side by side and survive
    /// maintenance sweeps.
    pub fn open_borders() -> Self {
        let mut config = DominionConfig::default();
        config.default_buffer_zone = 0;
        config.lifecycle.min_members = 1;
        config.lifecycle.merge_max_cells = 0;
        Self::with_config(config)
    }

    pub fn found(&self, name: &str, leader: &str, seed: Cell) -> TerritoryId {
        self.dominion
            .create_territory(name, leader, Some(seed), 0)
            .expect("found territory")
    }
}

mod persistence;
mod siege;
