use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{cell, Harness};
use crate::config::DominionConfig;
use crate::core::Dominion;
use crate::notify::NullNotifier;
use crate::persist::{JsonDirGateway, PersistenceGateway, Snapshot};

fn temp_dir(prefix: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("duration")
        .as_nanos();
    std::env::temp_dir().join(format!("dominion-{prefix}-{unique}"))
}

#[test]
fn mutations_coalesce_into_one_save() {
    let harness = Harness::new();
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    harness.dominion.claim(&alpha, cell(1, 0), 1).unwrap();
    harness.dominion.claim(&alpha, cell(2, 0), 2).unwrap();

    assert!(harness.dominion.persist_status().dirty);
    assert!(harness.dominion.pump_persistence(3));
    assert_eq!(harness.gateway.save_count(), 1);
    assert!(!harness.dominion.persist_status().dirty);

    // A clean queue writes nothing.
    assert!(!harness.dominion.pump_persistence(4));
    assert_eq!(harness.gateway.save_count(), 1);
}

#[test]
fn failed_saves_back_off_exponentially() {
    let harness = Harness::new();
    harness.found("Alpha", "alice", cell(0, 0));
    harness.gateway.fail_next_saves(2);

    assert!(!harness.dominion.pump_persistence(0));
    let status = harness.dominion.persist_status();
    assert!(status.dirty);
    assert_eq!(status.attempts, 1);
    assert_eq!(status.next_retry_at, 20);

    // Retries are held back until the backoff window passes.
    assert!(!harness.dominion.pump_persistence(10));
    assert_eq!(harness.dominion.persist_status().attempts, 1);

    assert!(!harness.dominion.pump_persistence(20));
    let status = harness.dominion.persist_status();
    assert_eq!(status.attempts, 2);
    assert_eq!(status.next_retry_at, 60);

    assert!(harness.dominion.pump_persistence(60));
    let status = harness.dominion.persist_status();
    assert!(!status.dirty);
    assert_eq!(status.attempts, 0);
    assert_eq!(harness.gateway.save_count(), 1);
}

#[test]
fn flush_propagates_gateway_errors() {
    let harness = Harness::new();
    harness.found("Alpha", "alice", cell(0, 0));

    harness.gateway.fail_next_saves(1);
    assert!(harness.dominion.flush_now(1).is_err());
    assert!(harness.dominion.flush_now(1).is_ok());
    assert!(harness.gateway.stored().is_some());
}

#[test]
fn restore_round_trips_claims_and_transfers() {
    let harness = Harness::open_borders();
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.claim(&alpha, cell(0, 1), 1).unwrap();
    harness
        .dominion
        .list_for_sale(&alpha, cell(0, 0), 40, 2)
        .unwrap();
    harness.dominion.declare_war(&beta, &alpha, 3).unwrap();
    harness.dominion.flush_now(4).unwrap();

    let mut config = DominionConfig::default();
    config.default_buffer_zone = 0;
    let restored = Dominion::restore(
        config,
        harness.ledger.clone(),
        Arc::new(NullNotifier),
        harness.gateway.clone(),
    )
    .unwrap();

    assert_eq!(restored.owner_of(&cell(0, 0)), Some(alpha.clone()));
    assert_eq!(restored.owner_of(&cell(0, 1)), Some(alpha.clone()));
    assert_eq!(restored.owner_of(&cell(1, 0)), Some(beta.clone()));
    assert_eq!(restored.territory_of("alice"), Some(alpha.clone()));
    let territory = restored.territory(&alpha).unwrap();
    assert_eq!(territory.current_cells, 2);
    assert_eq!(territory.name, "Alpha");

    // The sale listing and the war survive the round trip.
    harness.ledger.set_balance(&beta, 40);
    restored.buy_cell(&beta, &cell(0, 0), 5).unwrap();
    assert_eq!(restored.owner_of(&cell(0, 0)), Some(beta.clone()));
    restored.start_siege(&beta, &cell(0, 1), 6).unwrap();
}

#[test]
fn restore_from_an_empty_gateway_starts_fresh() {
    let harness = Harness::new();
    let restored = Dominion::restore(
        DominionConfig::default(),
        harness.ledger.clone(),
        Arc::new(NullNotifier),
        harness.gateway.clone(),
    )
    .unwrap();
    assert_eq!(restored.owner_of(&cell(0, 0)), None);
    restored
        .create_territory("Alpha", "alice", Some(cell(0, 0)), 0)
        .unwrap();
}

#[test]
fn snapshots_hash_their_content() {
    let harness = Harness::new();
    harness.found("Alpha", "alice", cell(0, 0));

    let before = harness.dominion.snapshot(1);
    let same = harness.dominion.snapshot(1);
    assert_eq!(
        before.content_hash().unwrap(),
        same.content_hash().unwrap()
    );

    let alpha = harness.dominion.territory_of("alice").unwrap();
    harness.dominion.claim(&alpha, cell(1, 0), 2).unwrap();
    let after = harness.dominion.snapshot(1);
    assert_ne!(
        before.content_hash().unwrap(),
        after.content_hash().unwrap()
    );
}

#[test]
fn json_dir_gateway_round_trips_snapshots() {
    let dir = temp_dir("gateway");
    let gateway = JsonDirGateway::new(&dir);
    assert_eq!(gateway.load().unwrap(), None);

    let harness = Harness::new();
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let snapshot = harness.dominion.snapshot(7);
    gateway.save(&snapshot).unwrap();

    let loaded = gateway.load().unwrap().expect("stored snapshot");
    assert_eq!(loaded.saved_at, 7);
    assert_eq!(
        loaded.content_hash().unwrap(),
        snapshot.content_hash().unwrap()
    );
    let state = loaded.into_state(16);
    assert_eq!(state.index.peek(&cell(0, 0)), Some(&alpha));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn snapshot_json_is_stable() {
    let harness = Harness::new();
    harness.found("Alpha", "alice", cell(0, 0));
    let snapshot = harness.dominion.snapshot(9);

    let json = snapshot.to_json().unwrap();
    let parsed = Snapshot::from_json(&json).unwrap();
    assert_eq!(parsed, snapshot);
}
