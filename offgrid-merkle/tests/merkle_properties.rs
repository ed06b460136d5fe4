//! Property tests for tree determinism and diff exactness.

use offgrid_merkle::{diff_children, MerkleTree, NodeRef};
use offgrid_types::{NodeId, Timestamp};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    // Spread across ~2 hours of buckets so sets share some buckets and
    // miss others.
    (0u64..7_200_000, 0u16..4, 0u8..3)
        .prop_map(|(millis, counter, node)| {
            Timestamp::new(millis, counter, NodeId::from_bytes([node; 8]))
        })
}

fn stamp_set() -> impl Strategy<Value = Vec<Timestamp>> {
    prop::collection::vec(timestamp_strategy(), 0..200)
}

/// Walks two trees from the root and returns the divergent leaf buckets.
fn walk_divergent(a: &mut MerkleTree, b: &mut MerkleTree) -> BTreeSet<u64> {
    let mut divergent = BTreeSet::new();
    if a.root() == b.root() {
        return divergent;
    }
    let mut frontier = vec![NodeRef::root()];
    while let Some(node) = frontier.pop() {
        let diff = diff_children(&a.child_summaries(node), &b.child_summaries(node));
        let one_sided = diff.local_only.into_iter().chain(diff.remote_only);
        for child in one_sided {
            let range = a.node_range(child);
            divergent.extend(a.buckets_in_range(&range));
            divergent.extend(b.buckets_in_range(&range));
        }
        for child in diff.differing {
            if child.level == a.leaf_level() {
                divergent.insert(child.index);
            } else {
                frontier.push(child);
            }
        }
    }
    divergent
}

proptest! {
    /// Identical logs yield identical roots, whatever the insertion order.
    #[test]
    fn same_set_same_root(stamps in stamp_set(), seed in any::<u64>()) {
        let unique: BTreeSet<Timestamp> = stamps.iter().copied().collect();

        let mut forward = MerkleTree::new();
        for ts in &unique {
            forward.insert(ts);
        }

        // Deterministic shuffle driven by the seed.
        let mut shuffled: Vec<Timestamp> = unique.iter().copied().collect();
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state % (i as u64 + 1)) as usize);
        }
        let mut scrambled = MerkleTree::new();
        for ts in &shuffled {
            scrambled.insert(ts);
        }

        prop_assert_eq!(forward.root(), scrambled.root());
    }

    /// The narrowing walk finds exactly the buckets whose contents differ.
    #[test]
    fn diff_finds_exactly_differing_buckets(xs in stamp_set(), ys in stamp_set()) {
        let set_a: BTreeSet<Timestamp> = xs.into_iter().collect();
        let set_b: BTreeSet<Timestamp> = ys.into_iter().collect();

        let mut a = MerkleTree::new();
        for ts in &set_a {
            a.insert(ts);
        }
        let mut b = MerkleTree::new();
        for ts in &set_b {
            b.insert(ts);
        }

        let expected: BTreeSet<u64> = set_a
            .symmetric_difference(&set_b)
            .map(|ts| a.bucket_of(ts))
            .collect();

        prop_assert_eq!(walk_divergent(&mut a, &mut b), expected);
    }

    /// Inserting any new record identity changes the root.
    #[test]
    fn new_record_changes_root(stamps in stamp_set(), extra in timestamp_strategy()) {
        let mut tree = MerkleTree::new();
        for ts in &stamps {
            tree.insert(ts);
        }
        let before = tree.root();
        if tree.insert(&extra) {
            prop_assert_ne!(tree.root(), before);
        } else {
            prop_assert_eq!(tree.root(), before);
        }
    }
}
