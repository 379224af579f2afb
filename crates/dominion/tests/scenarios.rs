//! End-to-end scenario: a world of territories claims, trades, fights and
//! survives a restart from disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dominion::{
    Cell, Dominion, DominionConfig, InMemoryLedger, JsonDirGateway, Ledger, RecordingNotifier,
    SiegeTickOutcome,
};

fn temp_dir(prefix: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("duration")
        .as_nanos();
    std::env::temp_dir().join(format!("dominion-{prefix}-{unique}"))
}

fn cell(x: i32, z: i32) -> Cell {
    Cell::new("overworld", x, z)
}

#[test]
fn a_world_survives_trade_war_and_restart() {
    let dir = temp_dir("scenario");
    let config = {
        let mut config = DominionConfig::default();
        config.default_buffer_zone = 0;
        config.lifecycle.min_members = 1;
        config.lifecycle.merge_max_cells = 0;
        config.siege.completion_threshold = 5;
        config.siege.duration_ticks = 50;
        config
    };
    let ledger = Arc::new(InMemoryLedger::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let gateway = Arc::new(JsonDirGateway::new(&dir));

    let world = Dominion::new(
        config.clone(),
        ledger.clone(),
        notifier.clone(),
        gateway.clone(),
    );

    // Two neighbors grow toward each other.
    let alpha = world
        .create_territory("Alpha", "alice", Some(cell(0, 0)), 0)
        .unwrap();
    let beta = world
        .create_territory("Beta", "bob", Some(cell(4, 0)), 0)
        .unwrap();
    world.claim(&alpha, cell(1, 0), 1).unwrap();
    world.claim(&beta, cell(3, 0), 1).unwrap();
    world.claim(&beta, cell(2, 0), 1).unwrap();

    // Alpha sells its frontier cell to Beta.
    ledger.set_balance(&beta, 100);
    world.list_for_sale(&alpha, cell(1, 0), 60, 2).unwrap();
    world.buy_cell(&beta, &cell(1, 0), 3).unwrap();
    assert_eq!(world.owner_of(&cell(1, 0)), Some(beta.clone()));
    assert_eq!(ledger.balance(&alpha), 60);

    // Relations sour; Beta besieges Alpha's last cell and is repelled.
    world.declare_war(&beta, &alpha, 4).unwrap();
    world.start_siege(&beta, &cell(0, 0), 4).unwrap();
    for tick in 5..=8 {
        world.siege_tick(&cell(0, 0), true, true, tick).unwrap();
    }
    let outcome = world.siege_tick(&cell(0, 0), true, false, 54).unwrap();
    assert_eq!(outcome, SiegeTickOutcome::Repelled);
    assert_eq!(world.owner_of(&cell(0, 0)), Some(alpha.clone()));

    // The day's changes land on disk in one coalesced write.
    assert!(world.pump_persistence(60));
    world.end_war(&beta, &alpha).unwrap();
    world.flush_now(61).unwrap();

    // A fresh process picks up exactly where the old one stopped.
    let revived = Dominion::restore(config, ledger.clone(), notifier, gateway).unwrap();
    assert_eq!(revived.owner_of(&cell(0, 0)), Some(alpha.clone()));
    assert_eq!(revived.owner_of(&cell(1, 0)), Some(beta.clone()));
    assert_eq!(revived.territory_of("bob"), Some(beta.clone()));
    assert_eq!(revived.territory(&beta).unwrap().current_cells, 4);

    // The war ended before shutdown, so no new siege can open.
    assert!(revived.start_siege(&beta, &cell(0, 0), 62).is_err());

    // Life goes on in the revived world.
    revived.claim(&alpha, cell(0, 1), 63).unwrap();
    let report = revived.run_maintenance(64).unwrap();
    assert!(report.disbanded.is_empty());
    revived.flush_now(65).unwrap();

    std::fs::remove_dir_all(&dir).ok();
}
