use offgrid_types::{ClockError, HlcClock, NodeId, Timestamp};

fn node(b: u8) -> NodeId {
    NodeId::from_bytes([b; 8])
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

// ── next() ───────────────────────────────────────────────────────

#[test]
fn burst_of_ticks_stays_monotonic() {
    let mut clock = HlcClock::new(node(1));
    let mut seen = Vec::with_capacity(50_000);
    for _ in 0..50_000 {
        seen.push(clock.next());
    }
    for pair in seen.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn same_millisecond_increments_counter() {
    let n = node(1);
    let future = now_millis() + 10_000;
    let mut clock = HlcClock::with_last(n, Timestamp::new(future, 0, n));
    let ts = clock.next();
    assert_eq!(ts.millis(), future);
    assert_eq!(ts.counter(), 1);
}

// ── observe() ────────────────────────────────────────────────────

#[test]
fn next_never_regresses_below_observed() {
    let mut clock = HlcClock::new(node(1));
    let remote = Timestamp::new(now_millis() + 1_000, 500, node(2));
    clock.observe(&remote).unwrap();
    for _ in 0..100 {
        assert!(clock.next() > remote);
    }
}

#[test]
fn observe_ignores_older_timestamps() {
    let n = node(1);
    let mark = Timestamp::new(now_millis() + 5_000, 9, n);
    let mut clock = HlcClock::with_last(n, mark);
    clock.observe(&Timestamp::new(10, 0, node(2))).unwrap();
    assert_eq!(clock.last(), mark);
}

#[test]
fn observe_within_drift_is_accepted() {
    let mut clock = HlcClock::new(node(1)).with_max_drift(60_000);
    let remote = Timestamp::new(now_millis() + 30_000, 0, node(2));
    assert!(clock.observe(&remote).is_ok());
}

#[test]
fn observe_far_future_is_rejected_and_clock_unchanged() {
    let mut clock = HlcClock::new(node(1)).with_max_drift(1_000);
    let before = clock.last();
    let remote = Timestamp::new(now_millis() + 3_600_000, 0, node(2));
    assert!(matches!(
        clock.observe(&remote),
        Err(ClockError::DriftExceeded { .. })
    ));
    assert_eq!(clock.last(), before);
}

// ── Persistence ──────────────────────────────────────────────────

#[test]
fn restored_clock_continues_past_saved_mark() {
    let n = node(1);
    let mut clock = HlcClock::new(n);
    let issued = clock.next();

    // Simulate a restart: persist last(), restore, keep issuing.
    let mut restored = HlcClock::with_last(n, clock.last());
    assert!(restored.next() > issued);
}

#[test]
fn restored_clock_survives_wall_clock_standing_still() {
    let n = node(1);
    let frozen = now_millis() + 50_000;
    let mut restored = HlcClock::with_last(n, Timestamp::new(frozen, 3, n));
    let a = restored.next();
    let b = restored.next();
    assert_eq!(a, Timestamp::new(frozen, 4, n));
    assert_eq!(b, Timestamp::new(frozen, 5, n));
}
