use offgrid_types::{NodeId, Timestamp};

fn node(b: u8) -> NodeId {
    NodeId::from_bytes([b; 8])
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn ordering_by_millis() {
    let a = Timestamp::new(100, 5, node(9));
    let b = Timestamp::new(200, 0, node(1));
    assert!(a < b);
}

#[test]
fn ordering_by_counter_when_millis_equal() {
    let a = Timestamp::new(100, 0, node(9));
    let b = Timestamp::new(100, 1, node(1));
    assert!(a < b);
}

#[test]
fn ordering_by_node_when_millis_and_counter_equal() {
    let a = Timestamp::new(100, 1, node(1));
    let b = Timestamp::new(100, 1, node(2));
    assert!(a < b);
    assert!(b.is_after(&a));
}

#[test]
fn equal_timestamps() {
    let a = Timestamp::new(100, 5, node(3));
    let b = Timestamp::new(100, 5, node(3));
    assert_eq!(a, b);
    assert!(!a.is_before(&b));
    assert!(!a.is_after(&b));
}

// ── Canonical form ───────────────────────────────────────────────

#[test]
fn canonical_form_is_sortable() {
    let a = Timestamp::new(999, 0xffff, node(0xff));
    let b = Timestamp::new(1000, 0, node(0));
    assert!(a < b);
    assert!(a.to_string() < b.to_string());
}

#[test]
fn canonical_roundtrip() {
    let ts = Timestamp::new(1_726_000_000_123, 42, node(0xab));
    let parsed: Timestamp = ts.to_string().parse().unwrap();
    assert_eq!(parsed, ts);
}

#[test]
fn parse_rejects_garbage() {
    assert!("not-a-timestamp".parse::<Timestamp>().is_err());
    assert!("123".parse::<Timestamp>().is_err());
    assert!("123-zz-0101010101010101".parse::<Timestamp>().is_err());
    assert!("123-0001-xyz".parse::<Timestamp>().is_err());
}

#[test]
fn node_id_hex_roundtrip() {
    let n = NodeId::from_bytes([0xde, 0xad, 0xbe, 0xef, 0, 1, 2, 3]);
    assert_eq!(n.to_string(), "deadbeef00010203");
    assert_eq!("deadbeef00010203".parse::<NodeId>().unwrap(), n);
    assert!("deadbeef".parse::<NodeId>().is_err());
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn timestamp_json_roundtrip() {
    let ts = Timestamp::new(5_000, 3, node(7));
    let json = serde_json::to_string(&ts).unwrap();
    let back: Timestamp = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ts);
}
