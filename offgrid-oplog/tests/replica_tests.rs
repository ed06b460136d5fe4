use offgrid_crypto::Owner;
use offgrid_merkle::BucketRange;
use offgrid_oplog::{OplogError, Replica, WipeConfirmation};
use offgrid_types::{CellValue, CellWrite, MutationRecord, RowId};
use pretty_assertions::assert_eq;

fn owner_pair() -> (Owner, Owner) {
    let a = Owner::create().unwrap();
    let b = Owner::restore(&a.recovery_phrase()).unwrap();
    (a, b)
}

// ── Local writes ─────────────────────────────────────────────────

#[test]
fn local_write_updates_snapshot_and_log() {
    let mut replica = Replica::in_memory(Owner::create().unwrap());
    let row = RowId::new();

    let commit = replica
        .apply_local(vec![CellWrite::set("todo", row, "title", "buy milk")])
        .unwrap();

    assert_eq!(commit.records.len(), 1);
    assert_eq!(commit.changes.len(), 1);
    assert_eq!(replica.log().len(), 1);
    assert_eq!(
        replica.snapshot().get("todo", row, "title"),
        Some(&CellValue::Text("buy milk".into()))
    );
}

#[test]
fn local_records_are_signed_by_the_owner() {
    let mut replica = Replica::in_memory(Owner::create().unwrap());
    let commit = replica
        .apply_local(vec![CellWrite::set("todo", RowId::new(), "title", "x")])
        .unwrap();

    let record = &commit.records[0];
    let bytes = record.signing_bytes().unwrap();
    assert!(replica
        .owner()
        .verifying_key()
        .verify_bytes(&bytes, &record.signature)
        .is_ok());
}

#[test]
fn successive_writes_to_one_cell_keep_the_latest() {
    let mut replica = Replica::in_memory(Owner::create().unwrap());
    let row = RowId::new();
    replica
        .apply_local(vec![
            CellWrite::set("todo", row, "title", "first"),
            CellWrite::set("todo", row, "title", "second"),
        ])
        .unwrap();

    assert_eq!(
        replica.snapshot().get("todo", row, "title"),
        Some(&CellValue::Text("second".into()))
    );
    // Both writes stay in the log.
    assert_eq!(replica.log().len(), 2);
}

#[test]
fn empty_table_name_is_malformed() {
    let mut replica = Replica::in_memory(Owner::create().unwrap());
    let err = replica
        .apply_local(vec![CellWrite::set("", RowId::new(), "title", "x")])
        .unwrap_err();
    assert!(matches!(err, OplogError::MalformedRecord(_)));
}

#[test]
fn tombstone_marks_row_deleted() {
    let mut replica = Replica::in_memory(Owner::create().unwrap());
    let row = RowId::new();
    replica
        .apply_local(vec![CellWrite::set("todo", row, "title", "x")])
        .unwrap();
    assert!(!replica.snapshot().is_deleted("todo", row));

    replica
        .apply_local(vec![CellWrite::delete("todo", row)])
        .unwrap();
    assert!(replica.snapshot().is_deleted("todo", row));
    // Deletion is a log append, not a log removal.
    assert_eq!(replica.log().len(), 2);
}

// ── Remote merge ─────────────────────────────────────────────────

#[test]
fn offline_edit_reconciles_to_later_writer() {
    // Node A creates r1 with title="x"; node B, offline, later sets
    // title="y". After exchanging logs both replicas show "y".
    let (owner_a, owner_b) = owner_pair();
    let mut a = Replica::in_memory(owner_a);
    let mut b = Replica::in_memory(owner_b);
    let r1 = RowId::new();

    let commit_a = a
        .apply_local(vec![CellWrite::set("note", r1, "title", "x")])
        .unwrap();
    b.apply_remote(commit_a.records.clone()).unwrap();
    assert_eq!(
        b.snapshot().get("note", r1, "title"),
        Some(&CellValue::Text("x".into()))
    );

    let commit_b = b
        .apply_local(vec![CellWrite::set("note", r1, "title", "y")])
        .unwrap();
    a.apply_remote(commit_b.records).unwrap();

    for replica in [&a, &b] {
        assert_eq!(
            replica.snapshot().get("note", r1, "title"),
            Some(&CellValue::Text("y".into()))
        );
    }
}

#[test]
fn concurrent_edits_converge_to_one_winner() {
    let (owner_a, owner_b) = owner_pair();
    let mut a = Replica::in_memory(owner_a);
    let mut b = Replica::in_memory(owner_b);
    let row = RowId::new();

    // Both edit the same cell while disconnected.
    let from_a = a
        .apply_local(vec![CellWrite::set("note", row, "title", "from-a")])
        .unwrap()
        .records;
    let from_b = b
        .apply_local(vec![CellWrite::set("note", row, "title", "from-b")])
        .unwrap()
        .records;

    a.apply_remote(from_b.clone()).unwrap();
    b.apply_remote(from_a.clone()).unwrap();

    let winner_on_a = a.snapshot().get("note", row, "title").cloned();
    let winner_on_b = b.snapshot().get("note", row, "title").cloned();
    assert_eq!(winner_on_a, winner_on_b);

    // The winner is determined by the timestamp total order, so replaying
    // the exchange in the opposite order changes nothing.
    let (owner_c, owner_d) = owner_pair();
    let mut c = Replica::in_memory(owner_c);
    let mut d = Replica::in_memory(owner_d);
    c.apply_remote(from_a.clone()).unwrap();
    c.apply_remote(from_b.clone()).unwrap();
    d.apply_remote(from_b).unwrap();
    d.apply_remote(from_a).unwrap();
    assert_eq!(
        c.snapshot().get("note", row, "title"),
        winner_on_a.as_ref()
    );
    assert_eq!(
        c.snapshot().get("note", row, "title"),
        d.snapshot().get("note", row, "title")
    );
}

#[test]
fn merge_is_idempotent() {
    let (owner_a, owner_b) = owner_pair();
    let mut a = Replica::in_memory(owner_a);
    let mut b = Replica::in_memory(owner_b);

    let records = a
        .apply_local(vec![CellWrite::set("todo", RowId::new(), "title", "x")])
        .unwrap()
        .records;

    let first = b.apply_remote(records.clone()).unwrap();
    assert_eq!(first.applied, 1);

    let snapshot_after_first = b.snapshot().clone();
    let second = b.apply_remote(records).unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(b.snapshot(), &snapshot_after_first);
    assert_eq!(b.log().len(), 1);
}

#[test]
fn unknown_tables_and_columns_are_stored_not_rejected() {
    // A peer running a newer schema can replicate rows this device has
    // never heard of; they merge into the snapshot and wait for the
    // schema to catch up.
    let (owner_a, owner_b) = owner_pair();
    let mut newer = Replica::in_memory(owner_a);
    let mut older = Replica::in_memory(owner_b);
    let row = RowId::new();

    let records = newer
        .apply_local(vec![CellWrite::set(
            "table_from_the_future",
            row,
            "column_from_the_future",
            "payload",
        )])
        .unwrap()
        .records;

    let outcome = older.apply_remote(records).unwrap();
    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.rejected, 0);
    assert_eq!(
        older
            .snapshot()
            .get("table_from_the_future", row, "column_from_the_future"),
        Some(&CellValue::Text("payload".into()))
    );
}

#[test]
fn tampered_record_is_rejected_before_insertion() {
    let (owner_a, owner_b) = owner_pair();
    let mut a = Replica::in_memory(owner_a);
    let mut b = Replica::in_memory(owner_b);

    let mut record = a
        .apply_local(vec![CellWrite::set("todo", RowId::new(), "title", "real")])
        .unwrap()
        .records
        .remove(0);
    record.value = CellValue::Text("forged".into());

    let err = b.ingest_record(record).unwrap_err();
    assert!(matches!(err, OplogError::SignatureMismatch));
    assert!(b.log().is_empty());
}

#[test]
fn foreign_owner_record_is_rejected() {
    let mut ours = Replica::in_memory(Owner::create().unwrap());
    let mut theirs = Replica::in_memory(Owner::create().unwrap());

    let record = theirs
        .apply_local(vec![CellWrite::set("todo", RowId::new(), "title", "x")])
        .unwrap()
        .records
        .remove(0);

    let outcome = ours.apply_remote(vec![record]).unwrap();
    assert_eq!(outcome.rejected, 1);
    assert_eq!(outcome.applied, 0);
    assert!(ours.log().is_empty());
}

#[test]
fn truncated_signature_is_malformed() {
    let (owner_a, owner_b) = owner_pair();
    let mut a = Replica::in_memory(owner_a);
    let mut b = Replica::in_memory(owner_b);

    let mut record = a
        .apply_local(vec![CellWrite::set("todo", RowId::new(), "title", "x")])
        .unwrap()
        .records
        .remove(0);
    record.signature.truncate(10);

    assert!(matches!(
        b.ingest_record(record),
        Err(OplogError::MalformedRecord(_))
    ));
}

#[test]
fn far_future_record_is_rejected_by_drift_guard() {
    let (owner_a, owner_b) = owner_pair();
    let a = Replica::in_memory(owner_a);
    let mut b = Replica::in_memory(owner_b);

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    let far_future = offgrid_types::Timestamp::new(now + 3_600_000, 0, a.node_id());
    let record = MutationRecord::new(
        "todo",
        RowId::new(),
        "title",
        CellValue::Text("x".into()),
        far_future,
    );
    let bytes = record.signing_bytes().unwrap();
    let record = record.with_signature(a.owner().sign(&bytes).to_bytes().to_vec());

    let outcome = b.apply_remote(vec![record]).unwrap();
    assert_eq!(outcome.rejected, 1);
    assert!(b.log().is_empty());
}

// ── Merkle integration ───────────────────────────────────────────

#[test]
fn converged_replicas_share_a_root() {
    let (owner_a, owner_b) = owner_pair();
    let mut a = Replica::in_memory(owner_a);
    let mut b = Replica::in_memory(owner_b);

    let records = a
        .apply_local(vec![
            CellWrite::set("todo", RowId::new(), "title", "one"),
            CellWrite::set("todo", RowId::new(), "title", "two"),
        ])
        .unwrap()
        .records;
    b.apply_remote(records).unwrap();

    assert_eq!(a.merkle().root(), b.merkle().root());
}

#[test]
fn records_in_buckets_selects_by_range() {
    let mut replica = Replica::in_memory(Owner::create().unwrap());
    let commit = replica
        .apply_local(vec![CellWrite::set("todo", RowId::new(), "title", "x")])
        .unwrap();
    let ts = commit.records[0].timestamp;
    let bucket = replica.merkle().bucket_of(&ts);

    let hit = replica.records_in_buckets(&[BucketRange::single(bucket)]);
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].timestamp, ts);

    let miss = replica.records_in_buckets(&[BucketRange::single(bucket + 10)]);
    assert!(miss.is_empty());
}

// ── Reset ────────────────────────────────────────────────────────

#[test]
fn reset_erases_everything_and_rotates_node_id() {
    let mut replica = Replica::in_memory(Owner::create().unwrap());
    replica
        .apply_local(vec![CellWrite::set("todo", RowId::new(), "title", "x")])
        .unwrap();
    let old_node = replica.node_id();

    replica.reset(WipeConfirmation::EraseLocalData).unwrap();

    assert!(replica.log().is_empty());
    assert!(replica.snapshot().is_empty());
    assert_eq!(replica.merkle().root(), None);
    assert_ne!(replica.node_id(), old_node);
}
