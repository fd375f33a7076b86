use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::model::lsa::RouterId;

/// The logical routing table produced by the SPF engine: destination
/// router id -> next-hop IPv4. Derived state — recomputed, never mutated
/// directly (spec.md §3).
pub type RouteTable = BTreeMap<RouterId, Ipv4Addr>;

/// A `/24` prefix, represented as its network address (host bits zeroed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prefix24(pub Ipv4Addr);

impl Prefix24 {
    /// `first_three_octets(d).0/24` from spec.md §4.E.
    pub fn containing(addr: Ipv4Addr) -> Self {
        let octets = addr.octets();
        Prefix24(Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
    }
}

impl std::fmt::Display for Prefix24 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/24", self.0)
    }
}

/// One entry the Route Installer wants installed: the kernel-facing unit
/// of spec.md §4.E ("Mapping to prefixes").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRoute {
    pub prefix: Prefix24,
    pub next_hop: Ipv4Addr,
    pub interface: String,
}

/// What the Route Installer last pushed to the kernel for a given prefix,
/// so reconciliation can diff without re-reading the full kernel table
/// every cycle (spec.md §3's "Kernel route cache").
pub type KernelRouteCache = BTreeMap<Prefix24, (Ipv4Addr, String)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_containing_zeroes_host_octet() {
        let addr: Ipv4Addr = "172.20.3.3".parse().unwrap();
        assert_eq!(
            Prefix24::containing(addr).0,
            "172.20.3.0".parse::<Ipv4Addr>().unwrap()
        );
    }
}
