//! Route Installer: reconciles the SPF output against the kernel's
//! routing table, per spec.md §4.E and the abstract interface of §6.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::model::lsa::RouterId;
use crate::model::neighbor::LiveSnapshot;
use crate::model::routing::{DesiredRoute, KernelRouteCache, Prefix24, RouteTable};

/// The abstract downward dependency of spec.md §6: `list_managed_routes`,
/// `add`, `replace`, `delete`. A typical Linux host implements this by
/// invoking `ip route …`; any equivalent (netlink, BSD route socket) is
/// conforming.
pub trait RouteInstaller: Send {
    fn list_managed_routes(&self) -> Vec<(Prefix24, Ipv4Addr, String)>;
    fn add(&mut self, prefix: Prefix24, next_hop: Ipv4Addr, iface: &str) -> Result<()>;
    fn replace(&mut self, prefix: Prefix24, next_hop: Ipv4Addr, iface: &str) -> Result<()>;
    fn delete(&mut self, prefix: Prefix24) -> Result<()>;
}

/// No-op installer for tests and dry, protocol-only runs.
#[derive(Debug, Default)]
pub struct NullRouteInstaller {
    cache: KernelRouteCache,
}

impl RouteInstaller for NullRouteInstaller {
    fn list_managed_routes(&self) -> Vec<(Prefix24, Ipv4Addr, String)> {
        self.cache
            .iter()
            .map(|(prefix, (next_hop, iface))| (*prefix, *next_hop, iface.clone()))
            .collect()
    }

    fn add(&mut self, prefix: Prefix24, next_hop: Ipv4Addr, iface: &str) -> Result<()> {
        self.cache.insert(prefix, (next_hop, iface.to_string()));
        Ok(())
    }

    fn replace(&mut self, prefix: Prefix24, next_hop: Ipv4Addr, iface: &str) -> Result<()> {
        self.cache.insert(prefix, (next_hop, iface.to_string()));
        Ok(())
    }

    fn delete(&mut self, prefix: Prefix24) -> Result<()> {
        self.cache.remove(&prefix);
        Ok(())
    }
}

/// Shells out to `ip route add|replace|del`, matching this crate's
/// teacher lineage's `LinuxForwardingApplier`. `dry_run` logs the command
/// instead of executing it.
pub struct LinuxRouteInstaller {
    dry_run: bool,
    cache: KernelRouteCache,
}

impl LinuxRouteInstaller {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            cache: KernelRouteCache::new(),
        }
    }

    fn run(&self, args: &[String]) -> Result<bool> {
        if self.dry_run {
            info!("route dry-run: ip {}", args.join(" "));
            return Ok(true);
        }

        let output = Command::new("ip")
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: ip {}", args.join(" ")))?;

        if output.status.success() {
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // Kernel refusal taxonomy (spec.md §7.5): a pre-existing route
        // reported as "File exists" is converted into a replace by the
        // caller; other refusals are logged and leave the cache alone.
        if stderr.contains("File exists") {
            return Ok(false);
        }
        warn!("ip route command failed: ip {} -> {stderr}", args.join(" "));
        Ok(true)
    }
}

impl RouteInstaller for LinuxRouteInstaller {
    fn list_managed_routes(&self) -> Vec<(Prefix24, Ipv4Addr, String)> {
        self.cache
            .iter()
            .map(|(prefix, (next_hop, iface))| (*prefix, *next_hop, iface.clone()))
            .collect()
    }

    fn add(&mut self, prefix: Prefix24, next_hop: Ipv4Addr, iface: &str) -> Result<()> {
        let args = vec![
            "route".to_string(),
            "add".to_string(),
            prefix.to_string(),
            "via".to_string(),
            next_hop.to_string(),
            "dev".to_string(),
            iface.to_string(),
        ];
        if self.run(&args)? {
            self.cache.insert(prefix, (next_hop, iface.to_string()));
        } else {
            // "File exists": fall back to replace per spec.md §7.5.
            self.replace(prefix, next_hop, iface)?;
        }
        Ok(())
    }

    fn replace(&mut self, prefix: Prefix24, next_hop: Ipv4Addr, iface: &str) -> Result<()> {
        let args = vec![
            "route".to_string(),
            "replace".to_string(),
            prefix.to_string(),
            "via".to_string(),
            next_hop.to_string(),
            "dev".to_string(),
            iface.to_string(),
        ];
        self.run(&args)?;
        self.cache.insert(prefix, (next_hop, iface.to_string()));
        Ok(())
    }

    fn delete(&mut self, prefix: Prefix24) -> Result<()> {
        let args = vec!["route".to_string(), "del".to_string(), prefix.to_string()];
        self.run(&args)?;
        self.cache.remove(&prefix);
        Ok(())
    }
}

/// Resolves the egress interface for a next-hop: the local interface
/// whose own IP shares the next-hop's `/24` (spec.md §4.E). Returns
/// `None`, logged by the caller as an inconsistency, if no interface
/// qualifies.
pub fn resolve_interface(next_hop: Ipv4Addr, local_interfaces: &[(String, Ipv4Addr)]) -> Option<String> {
    let target = Prefix24::containing(next_hop);
    local_interfaces
        .iter()
        .find(|(_, ip)| Prefix24::containing(*ip) == target)
        .map(|(name, _)| name.clone())
}

/// Builds the desired-route set from SPF output: maps each destination to
/// its `/24` (spec.md §4.E "Mapping to prefixes"), resolves its egress
/// interface, and filters out anything whose next-hop is not currently a
/// live neighbor. Destinations with no resolvable interface are returned
/// separately so the caller can log them as inconsistencies.
pub fn build_desired(
    routes: &RouteTable,
    live: &LiveSnapshot,
    local_interfaces: &[(String, Ipv4Addr)],
) -> (Vec<DesiredRoute>, Vec<RouterId>) {
    let live_ips: BTreeSet<Ipv4Addr> = live.values().map(|(ip, _)| *ip).collect();

    let mut desired = Vec::new();
    let mut inconsistent = Vec::new();

    for (dest, next_hop) in routes {
        if !live_ips.contains(next_hop) {
            inconsistent.push(dest.clone());
            continue;
        }
        let Ok(dest_ip) = dest.0.parse::<Ipv4Addr>() else {
            inconsistent.push(dest.clone());
            continue;
        };
        match resolve_interface(*next_hop, local_interfaces) {
            Some(iface) => desired.push(DesiredRoute {
                prefix: Prefix24::containing(dest_ip),
                next_hop: *next_hop,
                interface: iface,
            }),
            None => inconsistent.push(dest.clone()),
        }
    }

    desired.sort_by_key(|r| r.prefix.0);
    (desired, inconsistent)
}

/// Diffs `desired` against the installer's current cache and applies
/// delete, then add, then replace, in that order (spec.md §4.E). A
/// prefix that is already directly connected (i.e. one of the local
/// interfaces' own `/24`) is never touched, matching the "directly
/// connected routes are never touched" rule.
pub fn reconcile(
    installer: &mut dyn RouteInstaller,
    desired: &[DesiredRoute],
    directly_connected: &BTreeSet<Prefix24>,
) -> Result<()> {
    let current: KernelRouteCache = installer
        .list_managed_routes()
        .into_iter()
        .map(|(prefix, next_hop, iface)| (prefix, (next_hop, iface)))
        .collect();

    let desired_by_prefix: KernelRouteCache = desired
        .iter()
        .map(|r| (r.prefix, (r.next_hop, r.interface.clone())))
        .collect();

    let to_delete: Vec<Prefix24> = current
        .keys()
        .filter(|prefix| !desired_by_prefix.contains_key(prefix))
        .copied()
        .collect();
    for prefix in to_delete {
        debug!("route delete: {prefix}");
        installer.delete(prefix)?;
    }

    for route in desired {
        if directly_connected.contains(&route.prefix) {
            continue;
        }
        match current.get(&route.prefix) {
            None => {
                debug!(
                    "route add: {} via {} dev {}",
                    route.prefix, route.next_hop, route.interface
                );
                installer.add(route.prefix, route.next_hop, &route.interface)?;
            }
            Some((next_hop, iface)) if *next_hop != route.next_hop || *iface != route.interface => {
                debug!(
                    "route replace: {} via {} dev {}",
                    route.prefix, route.next_hop, route.interface
                );
                installer.replace(route.prefix, route.next_hop, &route.interface)?;
            }
            Some(_) => {}
        }
    }

    Ok(())
}
