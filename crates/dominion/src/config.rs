//! Configuration for realms, capacity, economy, lifecycle and sieges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Coins, RealmId, WorldTime};

/// One in-game day in world ticks; rent windows are quoted in days.
pub const TICKS_PER_DAY: WorldTime = 24_000;

pub const DEFAULT_BUFFER_ZONE: u64 = 5;
pub const DEFAULT_BASE_CELLS: u32 = 9;
pub const DEFAULT_CELLS_PER_LEVEL: u32 = 6;
pub const DEFAULT_XP_PER_LEVEL: u64 = 100;
pub const DEFAULT_XP_PER_CLAIM: u64 = 5;
pub const DEFAULT_LOOKUP_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_MIN_MEMBERS: u32 = 2;
pub const DEFAULT_INACTIVITY_DISBAND_TICKS: WorldTime = 30_000;
pub const DEFAULT_MERGE_DISTANCE: u64 = 8;
pub const DEFAULT_MERGE_MAX_MEMBERS: u32 = 2;
pub const DEFAULT_MERGE_MAX_CELLS: u32 = 16;
pub const DEFAULT_AUTO_EXPAND_COOLDOWN_TICKS: WorldTime = 600;
pub const DEFAULT_AUTO_EXPAND_COST: Coins = 25;
pub const DEFAULT_SIEGE_ATTACKER_RATE: i64 = 1;
pub const DEFAULT_SIEGE_THRESHOLD: i64 = 100;
pub const DEFAULT_SIEGE_DURATION_TICKS: WorldTime = 200;

/// Per-realm claim rules. `buffer_zone = None` falls back to the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmRules {
    pub claiming_enabled: bool,
    pub buffer_zone: Option<u64>,
}

impl Default for RealmRules {
    fn default() -> Self {
        Self {
            claiming_enabled: true,
            buffer_zone: None,
        }
    }
}

/// How `max_cells` grows with territory level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    pub base_cells: u32,
    pub cells_per_level: u32,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            base_cells: DEFAULT_BASE_CELLS,
            cells_per_level: DEFAULT_CELLS_PER_LEVEL,
        }
    }
}

/// XP progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionPolicy {
    pub xp_per_level: u64,
    pub xp_per_claim: u64,
}

impl Default for ProgressionPolicy {
    fn default() -> Self {
        Self {
            xp_per_level: DEFAULT_XP_PER_LEVEL,
            xp_per_claim: DEFAULT_XP_PER_CLAIM,
        }
    }
}

/// Ledger charges around claims. Zero values make the operation free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyPolicy {
    pub claim_cost: Coins,
    pub unclaim_refund: Coins,
    pub auto_expand_cost: Coins,
}

impl Default for EconomyPolicy {
    fn default() -> Self {
        Self {
            claim_cost: 0,
            unclaim_refund: 0,
            auto_expand_cost: DEFAULT_AUTO_EXPAND_COST,
        }
    }
}

/// Automated disband/merge/auto-expand thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    pub min_members: u32,
    pub inactivity_disband_ticks: WorldTime,
    pub merge_distance: u64,
    pub merge_max_members: u32,
    pub merge_max_cells: u32,
    pub auto_expand_enabled: bool,
    pub auto_expand_cooldown_ticks: WorldTime,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            min_members: DEFAULT_MIN_MEMBERS,
            inactivity_disband_ticks: DEFAULT_INACTIVITY_DISBAND_TICKS,
            merge_distance: DEFAULT_MERGE_DISTANCE,
            merge_max_members: DEFAULT_MERGE_MAX_MEMBERS,
            merge_max_cells: DEFAULT_MERGE_MAX_CELLS,
            auto_expand_enabled: false,
            auto_expand_cooldown_ticks: DEFAULT_AUTO_EXPAND_COOLDOWN_TICKS,
        }
    }
}

/// Siege pacing. Defender presence works against progress at twice the
/// attacker rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiegePolicy {
    pub attacker_rate: i64,
    pub completion_threshold: i64,
    pub duration_ticks: WorldTime,
}

impl Default for SiegePolicy {
    fn default() -> Self {
        Self {
            attacker_rate: DEFAULT_SIEGE_ATTACKER_RATE,
            completion_threshold: DEFAULT_SIEGE_THRESHOLD,
            duration_ticks: DEFAULT_SIEGE_DURATION_TICKS,
        }
    }
}

/// Root configuration for a dominion core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominionConfig {
    pub default_buffer_zone: u64,
    pub realm_rules: BTreeMap<RealmId, RealmRules>,
    pub capacity: CapacityPolicy,
    pub progression: ProgressionPolicy,
    pub economy: EconomyPolicy,
    pub lifecycle: LifecyclePolicy,
    pub siege: SiegePolicy,
    pub lookup_cache_capacity: usize,
}

impl Default for DominionConfig {
    fn default() -> Self {
        Self {
            default_buffer_zone: DEFAULT_BUFFER_ZONE,
            realm_rules: BTreeMap::new(),
            capacity: CapacityPolicy::default(),
            progression: ProgressionPolicy::default(),
            economy: EconomyPolicy::default(),
            lifecycle: LifecyclePolicy::default(),
            siege: SiegePolicy::default(),
            lookup_cache_capacity: DEFAULT_LOOKUP_CACHE_CAPACITY,
        }
    }
}

impl DominionConfig {
    pub fn buffer_zone(&self, realm: &str) -> u64 {
        self.realm_rules
            .get(realm)
            .and_then(|rules| rules.buffer_zone)
            .unwrap_or(self.default_buffer_zone)
    }

    pub fn claiming_enabled(&self, realm: &str) -> bool {
        self.realm_rules
            .get(realm)
            .map(|rules| rules.claiming_enabled)
            .unwrap_or(true)
    }

    pub fn set_realm_rules(&mut self, realm: impl Into<String>, rules: RealmRules) {
        self.realm_rules.insert(realm.into(), rules);
    }
}
