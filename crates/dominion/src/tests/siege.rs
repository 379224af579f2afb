use super::{cell, Harness};
use crate::config::DominionConfig;
use crate::error::DominionError;
use crate::ledger::InMemoryLedger;
use crate::notify::Notice;
use crate::siege::SiegeTickOutcome;
use crate::state::DominionState;

fn war_config() -> DominionConfig {
    let mut config = DominionConfig::default();
    config.default_buffer_zone = 0;
    config.lifecycle.min_members = 1;
    config.lifecycle.merge_max_cells = 0;
    config.siege.completion_threshold = 3;
    config.siege.duration_ticks = 10;
    config
}

#[test]
fn sieges_require_an_active_war() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));

    let err = harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap_err();
    assert_eq!(
        err,
        DominionError::NoActiveWar {
            attacker: beta,
            defender: alpha,
        }
    );
}

#[test]
fn uncontested_siege_captures_the_cell() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));

    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();
    harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap();

    for tick in 1..=2 {
        let outcome = harness
            .dominion
            .siege_tick(&cell(0, 0), true, false, tick)
            .unwrap();
        assert_eq!(
            outcome,
            SiegeTickOutcome::Progressed {
                progress: tick as i64,
            }
        );
    }
    let outcome = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 3)
        .unwrap();
    assert_eq!(outcome, SiegeTickOutcome::Captured);

    assert_eq!(harness.dominion.owner_of(&cell(0, 0)), Some(beta.clone()));
    assert!(harness.notifier.entries().iter().any(|(id, notice)| {
        id == &alpha
            && *notice
                == Notice::CellCaptured {
                    cell: cell(0, 0),
                    attacker: beta.clone(),
                }
    }));
    // The siege is consumed by the capture.
    let err = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 4)
        .unwrap_err();
    assert_eq!(err, DominionError::SiegeNotFound { cell: cell(0, 0) });
}

#[test]
fn defender_presence_holds_the_line() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();
    harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap();

    // Both sides present: the defender pushes back twice as hard and
    // progress pins at zero.
    for tick in 1..=9 {
        let outcome = harness
            .dominion
            .siege_tick(&cell(0, 0), true, true, tick)
            .unwrap();
        assert_eq!(outcome, SiegeTickOutcome::Progressed { progress: 0 });
    }
    let outcome = harness
        .dominion
        .siege_tick(&cell(0, 0), true, true, 10)
        .unwrap();
    assert_eq!(outcome, SiegeTickOutcome::Repelled);

    assert_eq!(harness.dominion.owner_of(&cell(0, 0)), Some(alpha.clone()));
    assert!(harness
        .notifier
        .entries()
        .iter()
        .any(|(id, notice)| id == &alpha && *notice == Notice::SiegeRepelled { cell: cell(0, 0) }));
}

#[test]
fn ceasefire_freezes_progress() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    harness.dominion.claim(&alpha, cell(0, 1), 0).unwrap();
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();
    harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap();

    harness.dominion.declare_ceasefire(&beta, &alpha, 5).unwrap();
    let outcome = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 1)
        .unwrap();
    assert_eq!(outcome, SiegeTickOutcome::Paused);

    // No new siege can open while the guns are silent.
    let err = harness
        .dominion
        .start_siege(&beta, &cell(0, 1), 2)
        .unwrap_err();
    assert_eq!(err, DominionError::CeasefireActive { until: 5 });

    // After the ceasefire lapses the clock runs again.
    let outcome = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 6)
        .unwrap();
    assert_eq!(outcome, SiegeTickOutcome::Progressed { progress: 1 });
}

#[test]
fn ending_the_war_drops_its_sieges() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();
    harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap();

    harness.dominion.end_war(&beta, &alpha).unwrap();
    let err = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 1)
        .unwrap_err();
    assert_eq!(err, DominionError::SiegeNotFound { cell: cell(0, 0) });
    assert_eq!(harness.dominion.owner_of(&cell(0, 0)), Some(alpha));
}

#[test]
fn expired_sieges_lapse_during_maintenance() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();
    harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap();

    let report = harness.dominion.run_maintenance(10).unwrap();
    assert_eq!(report.expired_sieges, vec![cell(0, 0)]);
    assert_eq!(harness.dominion.owner_of(&cell(0, 0)), Some(alpha));
}

#[test]
fn a_lapsed_siege_does_not_block_a_new_one() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();
    harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap();

    // The first siege lapsed at tick 10 but no tick or sweep collected
    // it; reopening treats the dead record as absent.
    harness.dominion.start_siege(&beta, &cell(0, 0), 20).unwrap();
    assert!(harness
        .notifier
        .entries()
        .iter()
        .any(|(id, notice)| id == &alpha && *notice == Notice::SiegeRepelled { cell: cell(0, 0) }));
    let outcome = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 21)
        .unwrap();
    assert_eq!(outcome, SiegeTickOutcome::Progressed { progress: 1 });
}

#[test]
fn capture_resolves_cleanly_when_the_defender_let_go() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    harness.dominion.claim(&alpha, cell(0, 1), 0).unwrap();
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();
    harness.dominion.start_siege(&beta, &cell(0, 0), 0).unwrap();

    harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 1)
        .unwrap();
    harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 2)
        .unwrap();
    // The defender abandons the contested cell before the threshold tick.
    harness.dominion.unclaim(&alpha, &cell(0, 0), 2).unwrap();

    let outcome = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 3)
        .unwrap();
    assert_eq!(outcome, SiegeTickOutcome::CaptureFailed);
    assert_eq!(harness.dominion.owner_of(&cell(0, 0)), None);
    let err = harness
        .dominion
        .siege_tick(&cell(0, 0), true, false, 4)
        .unwrap_err();
    assert_eq!(err, DominionError::SiegeNotFound { cell: cell(0, 0) });
}

#[test]
fn double_declarations_are_rejected() {
    let harness = Harness::with_config(war_config());
    let alpha = harness.found("Alpha", "alice", cell(0, 0));
    let beta = harness.found("Beta", "bob", cell(1, 0));
    harness.dominion.declare_war(&beta, &alpha, 0).unwrap();

    let err = harness.dominion.declare_war(&alpha, &beta, 1).unwrap_err();
    assert!(matches!(err, DominionError::WarAlreadyActive { .. }));
    let err = harness.dominion.declare_war(&beta, &beta, 1).unwrap_err();
    assert!(matches!(err, DominionError::SelfTransfer { .. }));
}

// Captures land on cells that sit inside the defender's buffer zone; the
// wartime exemption only covers the defender, never third parties.
#[test]
fn capture_ignores_the_defenders_buffer() {
    let config = DominionConfig::default();
    let mut open = config.clone();
    open.default_buffer_zone = 0;
    let ledger = InMemoryLedger::new();
    let mut state = DominionState::new(16);

    let alpha = state.registry.create("Alpha", "alice", 0).unwrap();
    let beta = state.registry.create("Beta", "bob", 0).unwrap();
    state.claim(&open, &ledger, &alpha, cell(0, 0), 0).unwrap();
    state.claim(&open, &ledger, &alpha, cell(1, 0), 0).unwrap();
    state.claim(&open, &ledger, &beta, cell(2, 0), 0).unwrap();

    state.declare_war(&beta, &alpha, 0).unwrap();
    state.start_siege(&config, &beta, &cell(1, 0), 0).unwrap();
    let mut outcome = SiegeTickOutcome::Paused;
    for tick in 1..=config.siege.completion_threshold as u64 {
        outcome = state
            .siege_tick(&config, &cell(1, 0), true, false, tick)
            .unwrap();
    }
    // Alpha's remaining cell at (0, 0) is well inside the default buffer
    // of (1, 0); the capture still goes through.
    assert_eq!(outcome, SiegeTickOutcome::Captured);
    assert_eq!(state.index.peek(&cell(1, 0)), Some(&beta));
    assert_eq!(state.index.peek(&cell(0, 0)), Some(&alpha));
}

#[test]
fn capture_still_respects_third_party_buffers() {
    let config = DominionConfig::default();
    let mut open = config.clone();
    open.default_buffer_zone = 0;
    let ledger = InMemoryLedger::new();
    let mut state = DominionState::new(16);

    let alpha = state.registry.create("Alpha", "alice", 0).unwrap();
    let beta = state.registry.create("Beta", "bob", 0).unwrap();
    let gamma = state.registry.create("Gamma", "carol", 0).unwrap();
    state.claim(&open, &ledger, &alpha, cell(1, 0), 0).unwrap();
    state.claim(&open, &ledger, &beta, cell(2, 0), 0).unwrap();
    state.claim(&open, &ledger, &gamma, cell(0, 1), 0).unwrap();

    state.declare_war(&beta, &alpha, 0).unwrap();
    state.start_siege(&config, &beta, &cell(1, 0), 0).unwrap();
    let mut outcome = SiegeTickOutcome::Paused;
    for tick in 1..=config.siege.completion_threshold as u64 {
        outcome = state
            .siege_tick(&config, &cell(1, 0), true, false, tick)
            .unwrap();
    }
    // Gamma is uninvolved and too close; the forced transfer fails and
    // the defender keeps the cell.
    assert_eq!(outcome, SiegeTickOutcome::CaptureFailed);
    assert_eq!(state.index.peek(&cell(1, 0)), Some(&alpha));
}
