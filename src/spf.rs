//! Graph construction from the LSDB and Dijkstra shortest-path computation,
//! per spec.md §4.D.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::net::Ipv4Addr;

use crate::model::lsa::RouterId;
use crate::model::lsdb::Lsdb;
use crate::model::neighbor::LiveSnapshot;
use crate::model::routing::RouteTable;

/// Directed graph keyed by router id; `graph[u]` holds `u`'s outgoing
/// edges as `(neighbor_id, cost)`.
pub type Graph = BTreeMap<RouterId, Vec<(RouterId, f64)>>;

/// Builds the SPF graph from the LSDB. An edge `u -> ip` is added only if
/// `ip` is itself a key of the LSDB — i.e. that neighbor has also
/// advertised its own view — per spec.md §4.D. This deliberately excludes
/// routing through a node that hasn't reciprocated, preventing transient
/// black holes during startup.
pub fn build_graph(lsdb: &Lsdb) -> Graph {
    let origins: std::collections::BTreeSet<RouterId> =
        lsdb.iter().map(|lsa| lsa.id.clone()).collect();

    let mut graph: Graph = Graph::new();
    for lsa in lsdb.iter() {
        let edges = graph.entry(lsa.id.clone()).or_default();
        for (ip, cost) in lsa.vizinhos.values() {
            let neighbor_id = RouterId::from(ip.clone());
            if origins.contains(&neighbor_id) {
                edges.push((neighbor_id, cost.as_f64()));
            }
        }
    }
    // Ensure every origin has a (possibly empty) adjacency list so
    // Dijkstra can visit it even if it has no reciprocated edges yet.
    for origin in origins {
        graph.entry(origin).or_default();
    }
    graph
}

/// Result of one Dijkstra run rooted at `self`: distances and
/// predecessors for every vertex in the graph.
pub struct SpfResult {
    pub dist: BTreeMap<RouterId, f64>,
    pub prev: BTreeMap<RouterId, RouterId>,
}

/// Runs Dijkstra from `src` over `graph`. Iterates each vertex's edges in
/// a fixed (insertion/lexicographic) order and breaks distance ties by
/// preferring the lexicographically smaller candidate predecessor, so the
/// result is deterministic and reproducible across runs, per spec.md
/// §4.D's tie-break rule.
pub fn dijkstra(graph: &Graph, src: &RouterId) -> SpfResult {
    let mut dist: BTreeMap<RouterId, f64> = BTreeMap::new();
    let mut prev: BTreeMap<RouterId, RouterId> = BTreeMap::new();
    let mut heap: BinaryHeap<Reverse<(u64, RouterId)>> = BinaryHeap::new();

    dist.insert(src.clone(), 0.0);
    heap.push(Reverse((ordered_float_bits(0.0), src.clone())));

    while let Some(Reverse((bits, u))) = heap.pop() {
        let d_u = from_ordered_float_bits(bits);
        if dist.get(&u).copied().unwrap_or(f64::INFINITY) < d_u {
            // Stale heap entry superseded by a shorter path already found.
            continue;
        }

        let Some(edges) = graph.get(&u) else {
            continue;
        };
        let mut sorted_edges = edges.clone();
        sorted_edges.sort_by(|a, b| a.0.cmp(&b.0));

        for (v, cost) in sorted_edges {
            let candidate = d_u + cost;
            let best = dist.get(&v).copied().unwrap_or(f64::INFINITY);
            let improves = candidate < best
                || (candidate == best
                    && prev
                        .get(&v)
                        .map(|current_prev| u < *current_prev)
                        .unwrap_or(true));
            if improves {
                dist.insert(v.clone(), candidate);
                prev.insert(v.clone(), u.clone());
                heap.push(Reverse((ordered_float_bits(candidate), v)));
            }
        }
    }

    SpfResult { dist, prev }
}

fn ordered_float_bits(v: f64) -> u64 {
    // f64 -> monotonic u64 mapping, so a max-heap-of-Reverse behaves like a
    // min-heap over floats without requiring `Ord` on `f64` directly.
    let bits = v.to_bits();
    if v.is_sign_negative() {
        !bits
    } else {
        bits | (1 << 63)
    }
}

fn from_ordered_float_bits(bits: u64) -> f64 {
    if bits & (1 << 63) != 0 {
        f64::from_bits(bits & !(1 << 63))
    } else {
        f64::from_bits(!bits)
    }
}

/// Extracts next-hops from a Dijkstra result per spec.md §4.D: for each
/// reachable destination `d != self`, walk `prev` back until the
/// predecessor equals `self`; that vertex is the next-hop router. A
/// next-hop that is not a currently live directly attached neighbor is an
/// inconsistency — the route is omitted (the caller is expected to log
/// it).
pub fn extract_routes(
    self_id: &RouterId,
    result: &SpfResult,
    live: &LiveSnapshot,
) -> (RouteTable, Vec<RouterId>) {
    let live_ips: std::collections::BTreeSet<Ipv4Addr> =
        live.values().map(|(ip, _)| *ip).collect();

    let mut routes = RouteTable::new();
    let mut inconsistent = Vec::new();

    for (dest, dist) in &result.dist {
        if dest == self_id || !dist.is_finite() {
            continue;
        }

        let mut walker = dest.clone();
        let next_hop_id = loop {
            let Some(predecessor) = result.prev.get(&walker) else {
                break None;
            };
            if *predecessor == *self_id {
                break Some(walker.clone());
            }
            walker = predecessor.clone();
        };

        let Some(next_hop_id) = next_hop_id else {
            continue;
        };

        let Ok(next_hop_ip): Result<Ipv4Addr, _> = next_hop_id.0.parse() else {
            inconsistent.push(dest.clone());
            continue;
        };

        if !live_ips.contains(&next_hop_ip) {
            inconsistent.push(dest.clone());
            continue;
        }

        routes.insert(dest.clone(), next_hop_ip);
    }

    (routes, inconsistent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lsa::{Cost, Lsa};
    use std::collections::BTreeMap as Map;

    fn lsa(id: &str, neighbors: &[(&str, &str, i64)]) -> Lsa {
        let mut vizinhos = Map::new();
        for (name, ip, cost) in neighbors {
            vizinhos.insert(name.to_string(), (ip.to_string(), Cost::Int(*cost)));
        }
        Lsa::new(RouterId::from(id), vizinhos, 1)
    }

    fn live(pairs: &[(&str, &str)]) -> LiveSnapshot {
        let mut m = LiveSnapshot::new();
        for (name, ip) in pairs {
            m.insert(name.to_string(), (ip.parse().unwrap(), Cost::Int(1)));
        }
        m
    }

    #[test]
    fn linear_three_node_s1() {
        // A=172.20.1.3, B=172.20.2.3, C=172.20.3.3, A-B-C.
        let mut db = Lsdb::new();
        db.accept(lsa(
            "172.20.1.3",
            &[("router2", "172.20.2.3", 1)],
        ));
        db.accept(lsa(
            "172.20.2.3",
            &[
                ("router1", "172.20.1.3", 1),
                ("router3", "172.20.3.3", 1),
            ],
        ));
        db.accept(lsa(
            "172.20.3.3",
            &[("router2", "172.20.2.3", 1)],
        ));

        let graph = build_graph(&db);
        let self_id = RouterId::from("172.20.1.3");
        let result = dijkstra(&graph, &self_id);
        let live = live(&[("router2", "172.20.2.3")]);
        let (routes, inconsistent) = extract_routes(&self_id, &result, &live);

        assert!(inconsistent.is_empty());
        assert_eq!(
            routes.get(&RouterId::from("172.20.2.3")),
            Some(&"172.20.2.3".parse().unwrap())
        );
        assert_eq!(
            routes.get(&RouterId::from("172.20.3.3")),
            Some(&"172.20.2.3".parse().unwrap())
        );
    }

    #[test]
    fn ring_of_five_s2_ties_break_lexicographically() {
        // Nodes 172.20.{1..5}.3 forming a ring: 1-2-3-4-5-1.
        let ids = ["172.20.1.3", "172.20.2.3", "172.20.3.3", "172.20.4.3", "172.20.5.3"];
        let mut db = Lsdb::new();
        for i in 0..5 {
            let left = ids[(i + 4) % 5];
            let right = ids[(i + 1) % 5];
            db.accept(lsa(
                ids[i],
                &[("left", left, 1), ("right", right, 1)],
            ));
        }

        let graph = build_graph(&db);
        let self_id = RouterId::from(ids[0]);
        let result = dijkstra(&graph, &self_id);
        let live = live(&[("router2", ids[1]), ("router5", ids[4])]);
        let (routes, _) = extract_routes(&self_id, &result, &live);

        // In a 5-ring there is no equal-cost tie for an odd-length ring:
        // node 3 is two hops via node 2 (cost 2) versus three hops via
        // node 5 (cost 3), and node 4 is the mirror image, two hops via
        // node 5 (cost 2) versus three hops via node 2 (cost 3).
        assert_eq!(
            routes.get(&RouterId::from(ids[2])),
            Some(&ids[1].parse().unwrap())
        );
        assert_eq!(
            routes.get(&RouterId::from(ids[3])),
            Some(&ids[4].parse().unwrap())
        );
    }

    #[test]
    fn ring_of_four_has_a_genuine_equal_cost_tie() {
        // Nodes 172.20.{1..4}.3 forming a ring: 1-2-3-4-1. From node 1,
        // destination 3 is reachable in two hops either way — via node 2
        // or via node 4, both cost 2 — a genuine tie.
        let ids = ["172.20.1.3", "172.20.2.3", "172.20.3.3", "172.20.4.3"];
        let mut db = Lsdb::new();
        for i in 0..4 {
            let left = ids[(i + 3) % 4];
            let right = ids[(i + 1) % 4];
            db.accept(lsa(ids[i], &[("left", left, 1), ("right", right, 1)]));
        }

        let graph = build_graph(&db);
        let self_id = RouterId::from(ids[0]);
        let result = dijkstra(&graph, &self_id);
        let live = live(&[("router2", ids[1]), ("router4", ids[3])]);
        let (routes, _) = extract_routes(&self_id, &result, &live);

        // Both predecessors give equal total cost; the tie is broken in
        // favor of the lexicographically smaller next-hop, 172.20.2.3.
        assert_eq!(
            routes.get(&RouterId::from(ids[2])),
            Some(&ids[1].parse().unwrap())
        );
    }

    #[test]
    fn next_hop_not_live_is_flagged_inconsistent() {
        let mut db = Lsdb::new();
        db.accept(lsa("172.20.1.3", &[("router2", "172.20.2.3", 1)]));
        db.accept(lsa("172.20.2.3", &[("router1", "172.20.1.3", 1)]));

        let graph = build_graph(&db);
        let self_id = RouterId::from("172.20.1.3");
        let result = dijkstra(&graph, &self_id);
        // Adjacency dropped the neighbor even though the LSDB hasn't
        // caught up yet.
        let live = LiveSnapshot::new();
        let (routes, inconsistent) = extract_routes(&self_id, &result, &live);

        assert!(routes.is_empty());
        assert_eq!(inconsistent, vec![RouterId::from("172.20.2.3")]);
    }

    #[test]
    fn single_node_topology_yields_empty_table() {
        let mut db = Lsdb::new();
        db.accept(lsa("172.20.1.3", &[]));
        let graph = build_graph(&db);
        let self_id = RouterId::from("172.20.1.3");
        let result = dijkstra(&graph, &self_id);
        let (routes, inconsistent) = extract_routes(&self_id, &result, &LiveSnapshot::new());
        assert!(routes.is_empty());
        assert!(inconsistent.is_empty());
    }

    #[test]
    fn unreciprocated_neighbor_is_excluded_from_graph() {
        // Only node 1 has spoken; it claims a neighbor that hasn't
        // advertised anything of its own yet.
        let mut db = Lsdb::new();
        db.accept(lsa("172.20.1.3", &[("router2", "172.20.2.3", 1)]));
        let graph = build_graph(&db);
        assert!(graph
            .get(&RouterId::from("172.20.1.3"))
            .unwrap()
            .is_empty());
    }
}
