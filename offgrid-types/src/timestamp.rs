//! Hybrid Logical Clock timestamps for causal ordering.
//!
//! A timestamp combines physical time with a logical counter and the
//! issuing replica's node id:
//! - Monotonicity (always increasing per node)
//! - Causality (if A happens-before B, then ts(A) < ts(B))
//! - A strict total order (cross-node ties broken by node id)
//!
//! Based on the HLC algorithm from "Logical Physical Clocks" (Kulkarni et
//! al.). Because each replica's clock never issues the same timestamp
//! twice, the timestamp doubles as a mutation record's global identity.

use crate::{Error, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A Hybrid Logical Clock timestamp.
///
/// Consists of:
/// - `millis`: Milliseconds since Unix epoch (physical component)
/// - `counter`: Logical counter for events at the same wall time
/// - `node`: The replica that issued the timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    millis: u64,
    counter: u16,
    node: NodeId,
}

impl Timestamp {
    /// Creates a timestamp from components.
    #[must_use]
    pub const fn new(millis: u64, counter: u16, node: NodeId) -> Self {
        Self {
            millis,
            counter,
            node,
        }
    }

    /// Returns the wall time component in milliseconds since Unix epoch.
    #[must_use]
    pub const fn millis(&self) -> u64 {
        self.millis
    }

    /// Returns the logical counter.
    #[must_use]
    pub const fn counter(&self) -> u16 {
        self.counter
    }

    /// Returns the issuing replica's node id.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Returns true if this timestamp is causally before the other.
    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Returns true if this timestamp is causally after the other.
    #[must_use]
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.millis
            .cmp(&other.millis)
            .then_with(|| self.counter.cmp(&other.counter))
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// The canonical form is `<millis:013>-<counter:04x>-<node:16 hex>`.
///
/// Zero-padding keeps lexicographic order of the string equal to the
/// timestamp's total order, which the log store relies on for its
/// primary-key ordering.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:013}-{:04x}-{}", self.millis, self.counter, self.node)
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (millis, counter, node) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(c), Some(n)) => (m, c, n),
            _ => {
                return Err(Error::InvalidTimestamp(format!(
                    "expected <millis>-<counter>-<node>, got {s:?}"
                )));
            }
        };

        let millis = millis
            .parse::<u64>()
            .map_err(|_| Error::InvalidTimestamp(format!("invalid millis: {millis:?}")))?;
        let counter = u16::from_str_radix(counter, 16)
            .map_err(|_| Error::InvalidTimestamp(format!("invalid counter: {counter:?}")))?;
        let node = NodeId::parse(node)?;

        Ok(Self {
            millis,
            counter,
            node,
        })
    }
}
