//! Neighbor liveness probing, per spec.md §4.A.
//!
//! Liveness and cost are both derived from a single ICMP echo per
//! neighbor per cycle, run as a subprocess rather than a raw socket —
//! this avoids requiring `CAP_NET_RAW` and matches how connectivity is
//! checked elsewhere in this deployment's lineage.

use std::net::Ipv4Addr;
use std::process::Command;
use std::time::Duration;

use crate::model::lsa::Cost;
use crate::model::neighbor::{LiveSnapshot, NeighborConfig};

/// Probes one neighbor by shelling out to the system `ping` binary.
/// Returns `Some(rtt_ms)` on a successful echo, `None` if the process
/// failed, timed out, or produced unparseable output.
pub fn probe_once(ip: Ipv4Addr, timeout: Duration) -> Option<f64> {
    let timeout_secs = timeout.as_secs().max(1).to_string();
    let output = Command::new("ping")
        .arg("-c")
        .arg("1")
        .arg("-W")
        .arg(&timeout_secs)
        .arg(ip.to_string())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_rtt_ms(&stdout)
}

/// Extracts the `time=<ms>` field from `ping`'s stdout. `ping`
/// implementations differ slightly in units (`ms` is universal on
/// Linux); anything else is treated as unparseable.
fn parse_rtt_ms(stdout: &str) -> Option<f64> {
    let marker = "time=";
    let start = stdout.find(marker)? + marker.len();
    let rest = &stdout[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok()
}

/// Rounds a measured RTT to the nearest whole millisecond, per spec.md
/// §4.A's quantization requirement: this is the only anti-churn
/// mechanism applied to measured costs, so sub-millisecond jitter does
/// not trigger a re-origination on every cycle.
pub fn quantize_ms(rtt_ms: f64) -> f64 {
    rtt_ms.round()
}

/// Probes every configured neighbor concurrently, one OS thread per
/// neighbor, and returns the snapshot of those that answered. Cycle
/// duration is bounded by the slowest probe, not the sum of all probes.
pub fn probe_all(neighbors: &[NeighborConfig], timeout: Duration) -> LiveSnapshot {
    let mut snapshot = LiveSnapshot::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = neighbors
            .iter()
            .map(|n| {
                scope.spawn(move || {
                    let rtt = probe_once(n.ip, timeout);
                    (n.name.clone(), n.ip, rtt)
                })
            })
            .collect();

        for handle in handles {
            if let Ok((name, ip, Some(rtt))) = handle.join() {
                snapshot.insert(name, (ip, Cost::Float(quantize_ms(rtt))));
            }
        }
    });
    snapshot
}
