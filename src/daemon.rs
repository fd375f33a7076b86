//! Orchestrates the probe loop, the receive/flood loop, LSA emission, and
//! the SPF-trigger/install path, per spec.md §2's data-flow table and
//! §5's concurrency discipline.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::model::lsa::{Cost, Lsa, RouterId};
use crate::model::lsdb::Lsdb;
use crate::model::neighbor::{snapshot_changed, LiveSnapshot, NeighborConfig};
use crate::model::routing::Prefix24;
use crate::net::prober::probe_all;
use crate::net::transport::UdpTransport;
use crate::route_installer::{build_desired, reconcile, LinuxRouteInstaller, RouteInstaller};
use crate::spf::{build_graph, dijkstra, extract_routes};

/// Shared mutable state behind a single coarse lock (spec.md §5): the
/// LSDB, the current live-adjacency snapshot, and the local seq counter.
/// Critical sections touching this are short — map updates and small
/// allocations — so one `Mutex` is sufficient; sends, receives, and
/// route-installer calls all happen outside it.
struct Core {
    lsdb: Lsdb,
    live: LiveSnapshot,
    local_seq: u64,
}

pub struct RouterDaemon {
    self_id: RouterId,
    self_name: String,
    neighbors: Vec<NeighborConfig>,
    local_interfaces: Vec<(String, Ipv4Addr)>,
    directly_connected: BTreeSet<Prefix24>,
    probe_interval: Duration,
    probe_timeout: Duration,
    refresh_interval: Option<Duration>,
    lsa_port: u16,
    transport: UdpTransport,
    core: Mutex<Core>,
    installer: Mutex<Box<dyn RouteInstaller>>,
    running: AtomicBool,
}

impl RouterDaemon {
    pub fn new(cfg: Config) -> Result<Self> {
        let transport = UdpTransport::bind(&cfg.bind_address, cfg.lsa_port, cfg.recv_buf_size)
            .with_context(|| {
                format!(
                    "failed to bind LSA socket on {}:{}",
                    cfg.bind_address, cfg.lsa_port
                )
            })?;

        let directly_connected = cfg
            .local_interfaces
            .iter()
            .map(|(_, ip)| Prefix24::containing(*ip))
            .collect();

        let installer: Box<dyn RouteInstaller> = Box::new(LinuxRouteInstaller::new(cfg.dry_run));

        Ok(Self {
            self_id: cfg.self_id,
            self_name: cfg.self_name,
            neighbors: cfg.neighbors,
            local_interfaces: cfg.local_interfaces,
            directly_connected,
            probe_interval: cfg.probe_interval,
            probe_timeout: cfg.probe_timeout,
            refresh_interval: cfg.refresh_interval,
            lsa_port: cfg.lsa_port,
            transport,
            core: Mutex::new(Core {
                lsdb: Lsdb::new(),
                live: LiveSnapshot::new(),
                local_seq: 0,
            }),
            installer: Mutex::new(installer),
            running: AtomicBool::new(true),
        })
    }

    /// Runs until a Ctrl-C/SIGTERM flips `running` to false. Spawns the
    /// receive/flood loop on its own thread and runs the probe loop on
    /// the calling thread (spec.md §5: probe loop, receive loop, and
    /// send/SPF trigger are three concurrent activities of equal
    /// priority; the latter two are merged here since emission and SPF
    /// both happen synchronously from whichever loop observed the
    /// triggering event).
    pub fn run_forever(self: Arc<Self>) -> Result<()> {
        info!(
            self_id = %self.self_id,
            self_name = %self.self_name,
            neighbors = self.neighbors.len(),
            "lsrd starting"
        );

        let shutdown_target = self.clone();
        ctrlc::set_handler(move || shutdown_target.running.store(false, Ordering::SeqCst))
            .context("failed to install signal handler")?;

        {
            let me = self.clone();
            thread::spawn(move || me.receive_loop());
        }

        self.probe_loop();
        Ok(())
    }

    fn probe_loop(&self) {
        let mut last_refresh = Instant::now();
        while self.running.load(Ordering::Relaxed) {
            let new_live = probe_all(&self.neighbors, self.probe_timeout);
            let changed = {
                let core = self.core.lock().unwrap();
                snapshot_changed(&core.live, &new_live)
            };
            let due_refresh = self
                .refresh_interval
                .map(|period| last_refresh.elapsed() >= period)
                .unwrap_or(false);

            if changed {
                {
                    let mut core = self.core.lock().unwrap();
                    core.live = new_live;
                }
                self.emit_and_flood();
                self.run_spf_and_install();
                last_refresh = Instant::now();
            } else if due_refresh {
                debug!("periodic LSA refresh");
                self.emit_and_flood();
                self.run_spf_and_install();
                last_refresh = Instant::now();
            }

            thread::sleep(self.probe_interval);
        }
    }

    fn receive_loop(&self) {
        loop {
            if !self.running.load(Ordering::Relaxed) {
                return;
            }

            let (raw, addr) = match self.transport.recv() {
                Ok(v) => v,
                Err(err) => {
                    warn!(error = %err, "LSA socket receive failed");
                    continue;
                }
            };

            let lsa = match Lsa::decode(&raw) {
                Ok(lsa) => lsa,
                Err(err) => {
                    warn!(error = %err, from = %addr, "dropping malformed LSA");
                    continue;
                }
            };

            let accepted = {
                let mut core = self.core.lock().unwrap();
                core.lsdb.accept(lsa)
            };
            if !accepted {
                continue;
            }

            let live = {
                let core = self.core.lock().unwrap();
                core.live.clone()
            };

            // Split-horizon: forward the exact received bytes to every
            // live neighbor except the one it arrived from (spec.md
            // §4.C). Byte-identical forwarding keeps hop-by-hop
            // duplicate suppression cheap downstream.
            for (_, ip) in live.values() {
                if addr.ip() == IpAddr::V4(*ip) {
                    continue;
                }
                if let Err(err) = self.transport.send(&raw, &ip.to_string(), self.lsa_port) {
                    warn!(error = %err, neighbor = %ip, "failed to forward LSA");
                }
            }

            self.run_spf_and_install();
        }
    }

    /// Forms a new LSA from the current live snapshot, bumps the local
    /// seq counter, installs it into the LSDB under `self`, and unicasts
    /// it to every live neighbor (spec.md §4.B).
    fn emit_and_flood(&self) {
        let built = {
            let mut core = self.core.lock().unwrap();
            core.local_seq += 1;

            let vizinhos: BTreeMap<String, (String, Cost)> = core
                .live
                .iter()
                .map(|(name, (ip, cost))| (name.clone(), (ip.to_string(), *cost)))
                .collect();
            let lsa = Lsa::new(self.self_id.clone(), vizinhos, core.local_seq);

            match lsa.encode() {
                Ok(raw) => {
                    core.lsdb.accept(lsa);
                    Some((raw, core.live.clone()))
                }
                Err(err) => {
                    warn!(error = %err, "failed to encode local LSA");
                    None
                }
            }
        };

        let Some((raw, live)) = built else { return };
        for (_, ip) in live.values() {
            if let Err(err) = self.transport.send(&raw, &ip.to_string(), self.lsa_port) {
                warn!(error = %err, neighbor = %ip, "failed to send LSA");
            }
        }
    }

    /// Rebuilds the SPF graph from the current LSDB, runs Dijkstra
    /// rooted at `self`, maps the result to desired kernel routes, and
    /// reconciles them against the installer's cache (spec.md §4.D–E).
    /// The shared lock is released before the (possibly slow) installer
    /// call, per spec.md §5.
    fn run_spf_and_install(&self) {
        let (routes, spf_inconsistent, live) = {
            let core = self.core.lock().unwrap();
            let graph = build_graph(&core.lsdb);
            let result = dijkstra(&graph, &self.self_id);
            let (routes, inconsistent) = extract_routes(&self.self_id, &result, &core.live);
            (routes, inconsistent, core.live.clone())
        };

        for dest in &spf_inconsistent {
            warn!(destination = %dest, "SPF next-hop is not a live neighbor; route omitted");
        }

        let (desired, install_inconsistent) =
            build_desired(&routes, &live, &self.local_interfaces);
        for dest in &install_inconsistent {
            warn!(
                destination = %dest,
                "no local interface shares the next-hop's /24; route omitted"
            );
        }

        let mut installer = self.installer.lock().unwrap();
        if let Err(err) = reconcile(installer.as_mut(), &desired, &self.directly_connected) {
            warn!(error = %err, "route installer reconciliation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            self_id: RouterId::from("172.20.1.3"),
            self_name: "router1".to_string(),
            neighbors: vec![NeighborConfig {
                name: "router2".to_string(),
                ip: "172.20.2.3".parse::<Ipv4Addr>().unwrap(),
                static_cost: 1,
            }],
            local_interfaces: Vec::new(),
            bind_address: "127.0.0.1".to_string(),
            lsa_port: 0,
            recv_buf_size: 4096,
            probe_interval: Duration::from_millis(10),
            probe_timeout: Duration::from_millis(10),
            refresh_interval: None,
            dry_run: true,
        }
    }

    #[test]
    fn new_binds_socket_and_starts_with_empty_lsdb() {
        let daemon = RouterDaemon::new(base_config()).expect("daemon should construct");
        let core = daemon.core.lock().unwrap();
        assert!(core.lsdb.is_empty());
        assert_eq!(core.local_seq, 0);
    }

    #[test]
    fn emit_and_flood_installs_local_lsa_with_seq_one() {
        let daemon = RouterDaemon::new(base_config()).expect("daemon should construct");
        daemon.emit_and_flood();
        let core = daemon.core.lock().unwrap();
        assert_eq!(core.lsdb.seq_of(&daemon.self_id), Some(1));
    }

    #[test]
    fn repeated_emit_strictly_increases_seq() {
        let daemon = RouterDaemon::new(base_config()).expect("daemon should construct");
        daemon.emit_and_flood();
        daemon.emit_and_flood();
        daemon.emit_and_flood();
        let core = daemon.core.lock().unwrap();
        assert_eq!(core.lsdb.seq_of(&daemon.self_id), Some(3));
    }
}
