use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::model::lsa::Cost;

/// One entry of the configured neighbor set: immutable after startup
/// (spec.md §3).
#[derive(Debug, Clone)]
pub struct NeighborConfig {
    pub name: String,
    pub ip: Ipv4Addr,
    pub static_cost: u32,
}

/// A snapshot of neighbors judged alive during one probe cycle, keyed by
/// configured name. This is `live` in spec.md §4.A's prober contract.
pub type LiveSnapshot = BTreeMap<String, (Ipv4Addr, Cost)>;

/// Compares two snapshots for the "changed" test of spec.md §4.A: the key
/// set differs, or any `(ip, cost)` value differs. Measured costs are
/// expected to already be quantized by the caller (rounded to the
/// millisecond) before being placed in a snapshot, so this is a plain
/// structural comparison.
pub fn snapshot_changed(previous: &LiveSnapshot, current: &LiveSnapshot) -> bool {
    if previous.len() != current.len() {
        return true;
    }
    for (name, (ip, cost)) in current {
        match previous.get(name) {
            Some((prev_ip, prev_cost)) if prev_ip == ip && *prev_cost == *cost => continue,
            _ => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn unchanged_snapshot_is_not_changed() {
        let mut a = LiveSnapshot::new();
        a.insert("r1".to_string(), (ip("172.20.1.3"), Cost::Int(1)));
        let b = a.clone();
        assert!(!snapshot_changed(&a, &b));
    }

    #[test]
    fn added_neighbor_is_changed() {
        let a = LiveSnapshot::new();
        let mut b = LiveSnapshot::new();
        b.insert("r1".to_string(), (ip("172.20.1.3"), Cost::Int(1)));
        assert!(snapshot_changed(&a, &b));
    }

    #[test]
    fn cost_change_is_changed() {
        let mut a = LiveSnapshot::new();
        a.insert("r1".to_string(), (ip("172.20.1.3"), Cost::Float(2.0)));
        let mut b = LiveSnapshot::new();
        b.insert("r1".to_string(), (ip("172.20.1.3"), Cost::Float(3.0)));
        assert!(snapshot_changed(&a, &b));
    }
}
