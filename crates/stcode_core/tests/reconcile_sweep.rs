mod common;

use common::InMemoryRecordRepository;
use rusqlite::Connection;
use stcode_core::db::open_db_in_memory;
use stcode_core::{
    ensure_code_index, has_code_index, AllocatorConfig, CodeWindow, NewRecord, RecordDraft,
    RecordRepository, ReconcileService, RepoError, SequenceCode, SqliteRecordRepository,
};
use std::collections::HashSet;

/// Opens a store whose unique code index was lost, as with legacy imports.
fn legacy_store() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP INDEX idx_records_code;").unwrap();
    conn
}

fn insert(repo: &impl RecordRepository, code: &str) -> uuid::Uuid {
    let code = SequenceCode::parse(code).unwrap();
    repo.insert_record(&NewRecord::new(code, &RecordDraft::new("legacy")))
        .unwrap()
}

#[test]
fn triple_duplicate_keeps_first_and_reassigns_rest_distinctly() {
    let conn = legacy_store();
    let repo = SqliteRecordRepository::new(&conn);
    let keeper = insert(&repo, "ST200");
    let second = insert(&repo, "ST200");
    let third = insert(&repo, "ST200");

    let summary = ReconcileService::new(&repo).reconcile().unwrap();

    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.duplicate_groups, 1);
    assert_eq!(summary.fixed, 2);
    assert_eq!(summary.unresolved, 0);

    let code_of = |id| repo.get_record(id).unwrap().unwrap().code.to_string();
    assert_eq!(code_of(keeper), "ST200");
    let (b, c) = (code_of(second), code_of(third));
    assert_ne!(b, "ST200");
    assert_ne!(c, "ST200");
    assert_ne!(b, c);
    assert_eq!((b.as_str(), c.as_str()), ("ST110", "ST111"));

    let moved: Vec<_> = summary
        .reassignments
        .iter()
        .map(|item| item.record_id)
        .collect();
    assert_eq!(moved, vec![second, third]);
}

#[test]
fn second_run_finds_nothing_to_fix() {
    let conn = legacy_store();
    let repo = SqliteRecordRepository::new(&conn);
    for code in ["ST110", "ST110", "ST300", "ST300", "ST300", "ST120"] {
        insert(&repo, code);
    }
    let sweep = ReconcileService::new(&repo);

    let first = sweep.reconcile().unwrap();
    assert_eq!(first.duplicate_groups, 2);
    assert_eq!(first.fixed, 3);

    let second = sweep.reconcile().unwrap();
    assert_eq!(second.scanned, 6);
    assert_eq!(second.duplicate_groups, 0);
    assert_eq!(second.fixed, 0);
    assert_eq!(second.unresolved, 0);

    let codes: HashSet<_> = repo
        .list_codes()
        .unwrap()
        .into_iter()
        .map(|row| row.code)
        .collect();
    assert_eq!(codes.len(), 6);
}

#[test]
fn reassignments_skip_codes_already_held_elsewhere() {
    let conn = legacy_store();
    let repo = SqliteRecordRepository::new(&conn);
    insert(&repo, "ST110");
    insert(&repo, "ST112");
    insert(&repo, "ST110");
    insert(&repo, "ST112");

    let summary = ReconcileService::new(&repo).reconcile().unwrap();

    let targets: Vec<&str> = summary
        .reassignments
        .iter()
        .map(|item| item.to.as_str())
        .collect();
    assert_eq!(targets, vec!["ST111", "ST113"]);
}

#[test]
fn unique_index_can_be_restored_only_after_sweep() {
    let conn = legacy_store();
    let repo = SqliteRecordRepository::new(&conn);
    insert(&repo, "ST150");
    insert(&repo, "ST150");
    assert!(!has_code_index(&conn).unwrap());

    let err = ensure_code_index(&conn).unwrap_err();
    assert!(matches!(err, RepoError::DuplicateCodesPresent));

    ReconcileService::new(&repo).reconcile().unwrap();
    ensure_code_index(&conn).unwrap();
    assert!(has_code_index(&conn).unwrap());
}

#[test]
fn failed_reassignment_is_counted_and_sweep_continues() {
    let repo = InMemoryRecordRepository::without_unique_index();
    repo.seed("ST200");
    let stuck = repo.seed("ST200");
    repo.seed("ST300");
    let movable = repo.seed("ST300");
    repo.fail_updates_for(stuck);

    let summary = ReconcileService::new(&repo).reconcile().unwrap();

    assert_eq!(summary.duplicate_groups, 2);
    assert_eq!(summary.fixed, 1);
    assert_eq!(summary.unresolved, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].record_id, stuck);
    assert!(summary.failures[0].reason.contains("injected"));
    assert_eq!(repo.code_of(stuck), "ST200");
    assert_ne!(repo.code_of(movable), "ST300");

    let rerun = ReconcileService::new(&repo).reconcile().unwrap();
    assert_eq!(rerun.duplicate_groups, 1);
    assert_eq!(rerun.unresolved, 1);
}

#[test]
fn exhausted_windows_fall_back_during_sweep() {
    let repo = InMemoryRecordRepository::without_unique_index();
    let config = AllocatorConfig {
        gap_window: CodeWindow::new(1, 1),
        primary_window: CodeWindow::new(2, 2),
        max_attempts: 1,
    };
    repo.seed("ST1");
    repo.seed("ST2");
    let dup_a = repo.seed("ST2");
    let dup_b = repo.seed("ST2");
    let dup_c = repo.seed("ST2");

    let summary = ReconcileService::with_config(&repo, config)
        .reconcile()
        .unwrap();

    assert_eq!(summary.fixed, 3);
    let replaced: HashSet<String> = [dup_a, dup_b, dup_c]
        .into_iter()
        .map(|id| repo.code_of(id))
        .collect();
    assert_eq!(replaced.len(), 3);
    for code in replaced {
        let parsed = SequenceCode::parse(&code).unwrap();
        assert!(parsed.is_fallback(), "expected fallback, got {code}");
    }
}

#[test]
fn empty_store_sweeps_cleanly() {
    let repo = InMemoryRecordRepository::new();
    let summary = ReconcileService::new(&repo).reconcile().unwrap();
    assert_eq!(summary.scanned, 0);
    assert_eq!(summary.duplicate_groups, 0);
    assert!(summary.reassignments.is_empty());
}

#[test]
fn summary_serializes_counters() {
    let repo = InMemoryRecordRepository::without_unique_index();
    repo.seed("ST110");
    repo.seed("ST110");
    let summary = ReconcileService::new(&repo).reconcile().unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["scanned"], 2);
    assert_eq!(json["duplicate_groups"], 1);
    assert_eq!(json["fixed"], 1);
    assert_eq!(json["unresolved"], 0);
    assert_eq!(json["reassignments"][0]["from"], "ST110");
    assert_eq!(json["reassignments"][0]["to"], "ST111");
}
