//! Monetary ledger seam consumed by the transfer protocols.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::types::Coins;

/// External balance service. Both calls are atomic and must never drive a
/// balance negative; `false` reports refusal (insufficient funds, bad
/// amount), not an infrastructure failure.
pub trait Ledger: Send + Sync {
    fn debit(&self, account: &str, amount: Coins) -> bool;
    fn credit(&self, account: &str, amount: Coins) -> bool;
    fn balance(&self, account: &str) -> Coins;
}

/// Process-local ledger used by tests and single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: Arc<Mutex<BTreeMap<String, Coins>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(account: impl Into<String>, amount: Coins) -> Self {
        let ledger = Self::new();
        ledger.credit(&account.into(), amount);
        ledger
    }

    pub fn set_balance(&self, account: &str, amount: Coins) {
        let mut balances = self.balances.lock().expect("lock balances");
        balances.insert(account.to_string(), amount.max(0));
    }
}

impl Ledger for InMemoryLedger {
    fn debit(&self, account: &str, amount: Coins) -> bool {
        if amount < 0 {
            return false;
        }
        let mut balances = self.balances.lock().expect("lock balances");
        let current = balances.get(account).copied().unwrap_or(0);
        if current < amount {
            return false;
        }
        balances.insert(account.to_string(), current - amount);
        true
    }

    fn credit(&self, account: &str, amount: Coins) -> bool {
        if amount < 0 {
            return false;
        }
        let mut balances = self.balances.lock().expect("lock balances");
        let entry = balances.entry(account.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
        true
    }

    fn balance(&self, account: &str) -> Coins {
        let balances = self.balances.lock().expect("lock balances");
        balances.get(account).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_refuses_overdraft() {
        let ledger = InMemoryLedger::with_balance("terr-1", 50);
        assert!(!ledger.debit("terr-1", 51));
        assert_eq!(ledger.balance("terr-1"), 50);
        assert!(ledger.debit("terr-1", 50));
        assert_eq!(ledger.balance("terr-1"), 0);
    }

    #[test]
    fn negative_amounts_refused() {
        let ledger = InMemoryLedger::new();
        assert!(!ledger.credit("terr-1", -5));
        assert!(!ledger.debit("terr-1", -5));
        assert_eq!(ledger.balance("terr-1"), 0);
    }
}
