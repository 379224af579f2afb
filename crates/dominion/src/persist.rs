//! Snapshot persistence: the gateway seam and the coalescing save queue.
//!
//! In-memory state stays authoritative regardless of persistence lag; a
//! failed save is retried with backoff and never rolls back an applied
//! mutation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::DominionError;
use crate::index::TerritoryIndex;
use crate::registry::TerritoryRegistry;
use crate::state::{DominionState, TransferBook};
use crate::types::WorldTime;
use crate::util::{hash_json, read_json_from_path, write_json_to_path};

const SNAPSHOT_FILE: &str = "snapshot.json";

/// A complete snapshot of the claim core at a point in time. The lookup
/// cache is rebuilt cold on restore, not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: WorldTime,
    pub index: TerritoryIndex,
    pub registry: TerritoryRegistry,
    pub book: TransferBook,
}

impl Snapshot {
    pub fn of(state: &DominionState, now: WorldTime) -> Self {
        Self {
            saved_at: now,
            index: state.index.clone(),
            registry: state.registry.clone(),
            book: state.book.clone(),
        }
    }

    pub fn into_state(self, cache_capacity: usize) -> DominionState {
        let mut state = DominionState::from_parts(self.index, self.registry, self.book);
        state.index.reset_cache(cache_capacity);
        state
    }

    pub fn content_hash(&self) -> Result<String, DominionError> {
        hash_json(self)
    }

    pub fn to_json(&self) -> Result<String, DominionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, DominionError> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Durable storage seam. The on-disk encoding is the gateway's business,
/// not the core's.
pub trait PersistenceGateway: Send + Sync {
    fn save(&self, snapshot: &Snapshot) -> Result<(), DominionError>;
    fn load(&self) -> Result<Option<Snapshot>, DominionError>;
}

/// Stores the snapshot as pretty JSON in a directory, written to a temp
/// file and renamed so a crash never leaves a torn snapshot behind.
#[derive(Debug, Clone)]
pub struct JsonDirGateway {
    dir: PathBuf,
}

impl JsonDirGateway {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }
}

impl PersistenceGateway for JsonDirGateway {
    fn save(&self, snapshot: &Snapshot) -> Result<(), DominionError> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        write_json_to_path(snapshot, &tmp)?;
        fs::rename(&tmp, self.snapshot_path())?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, DominionError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_json_from_path(&path)?))
    }
}

/// In-process gateway for tests; can be told to fail the next N saves.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    slot: Arc<Mutex<Option<Snapshot>>>,
    fail_remaining: Arc<Mutex<u32>>,
    saves: Arc<Mutex<u64>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_saves(&self, count: u32) {
        *self.fail_remaining.lock().expect("lock failures") = count;
    }

    pub fn save_count(&self) -> u64 {
        *self.saves.lock().expect("lock saves")
    }

    pub fn stored(&self) -> Option<Snapshot> {
        self.slot.lock().expect("lock slot").clone()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn save(&self, snapshot: &Snapshot) -> Result<(), DominionError> {
        {
            let mut fail_remaining = self.fail_remaining.lock().expect("lock failures");
            if *fail_remaining > 0 {
                *fail_remaining -= 1;
                return Err(DominionError::Persistence {
                    reason: "injected save failure".to_string(),
                });
            }
        }
        *self.slot.lock().expect("lock slot") = Some(snapshot.clone());
        *self.saves.lock().expect("lock saves") += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, DominionError> {
        Ok(self.slot.lock().expect("lock slot").clone())
    }
}

/// Retry pacing for failed saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistPolicy {
    pub retry_base_ticks: WorldTime,
    pub retry_max_ticks: WorldTime,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        Self {
            retry_base_ticks: 20,
            retry_max_ticks: 1_200,
        }
    }
}

/// Observable queue state, for shutdown checks and tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistStatus {
    pub dirty: bool,
    pub attempts: u32,
    pub next_retry_at: WorldTime,
    pub last_error: Option<String>,
    pub saves: u64,
}

/// Coalescing save queue: any number of mutations set one dirty flag, and
/// the next pump writes a single snapshot. Failures back off
/// exponentially up to the policy ceiling; the flag stays set until a
/// save lands.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    policy: PersistPolicy,
    dirty: bool,
    attempts: u32,
    next_retry_at: WorldTime,
    last_error: Option<String>,
    saves: u64,
}

impl PersistQueue {
    pub fn new(policy: PersistPolicy) -> Self {
        Self {
            policy,
            dirty: false,
            attempts: 0,
            next_retry_at: 0,
            last_error: None,
            saves: 0,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn status(&self) -> PersistStatus {
        PersistStatus {
            dirty: self.dirty,
            attempts: self.attempts,
            next_retry_at: self.next_retry_at,
            last_error: self.last_error.clone(),
            saves: self.saves,
        }
    }

    /// Attempts a save when one is due. Returns whether a snapshot was
    /// written.
    pub fn pump(
        &mut self,
        now: WorldTime,
        gateway: &dyn PersistenceGateway,
        snapshot: &Snapshot,
    ) -> bool {
        if !self.dirty || (self.attempts > 0 && now < self.next_retry_at) {
            return false;
        }
        match gateway.save(snapshot) {
            Ok(()) => {
                self.dirty = false;
                self.attempts = 0;
                self.last_error = None;
                self.saves += 1;
                true
            }
            Err(error) => {
                self.attempts += 1;
                let shift = self.attempts.min(16) - 1;
                let backoff = self
                    .policy
                    .retry_base_ticks
                    .saturating_mul(1 << shift)
                    .min(self.policy.retry_max_ticks);
                self.next_retry_at = now.saturating_add(backoff.max(1));
                self.last_error = Some(format!("{error:?}"));
                false
            }
        }
    }

    /// Synchronous save for shutdown; ignores backoff and propagates the
    /// error to the caller.
    pub fn flush(
        &mut self,
        gateway: &dyn PersistenceGateway,
        snapshot: &Snapshot,
    ) -> Result<(), DominionError> {
        gateway.save(snapshot)?;
        self.dirty = false;
        self.attempts = 0;
        self.last_error = None;
        self.saves += 1;
        Ok(())
    }
}

impl Default for PersistQueue {
    fn default() -> Self {
        Self::new(PersistPolicy::default())
    }
}
