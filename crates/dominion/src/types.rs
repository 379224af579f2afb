//! Type aliases shared across the crate.

pub type WorldTime = u64;
pub type RealmId = String;
pub type ActorId = String;
pub type TerritoryId = String;
pub type Coins = i64;
