//! Process-start configuration, per spec.md §6.
//!
//! Three pieces are required from the ambient environment: the router's
//! own id, a human-readable name for logs, and the configured neighbor
//! set. A handful of tuning knobs are optional and fall back to the
//! defaults recommended by spec.md. Parsing happens in two stages
//! (`RawConfig` -> `Config`), the same shape as this crate's teacher
//! lineage's `RawDaemonConfig` -> `DaemonConfig`, generalized from a YAML
//! file read to `std::env::var` reads.

use std::env;
use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::model::lsa::RouterId;
use crate::model::neighbor::NeighborConfig;

/// Default UDP port LSAs are exchanged on (spec.md §6).
pub const DEFAULT_LSA_PORT: u16 = 5000;
/// Recommended receive buffer size; larger payloads are truncated and
/// dropped as malformed (spec.md §4.C).
pub const DEFAULT_RECV_BUF_SIZE: usize = 4096;
/// Default periodic LSA refresh period (spec.md §4.B/§9, SPEC_FULL.md §D).
pub const DEFAULT_REFRESH_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub self_id: RouterId,
    pub self_name: String,
    pub neighbors: Vec<NeighborConfig>,
    /// Local interfaces as `(name, ip)`, used by the Route Installer to
    /// resolve a next-hop's egress interface (spec.md §4.E). Not part of
    /// the three required configuration pieces in spec.md §6, but needed
    /// to realize the interface-resolution contract without a raw
    /// netlink/interface-enumeration dependency.
    pub local_interfaces: Vec<(String, Ipv4Addr)>,
    pub bind_address: String,
    pub lsa_port: u16,
    pub recv_buf_size: usize,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// Periodic refresh tick (spec.md §4.B, optional); `None` disables it.
    pub refresh_interval: Option<Duration>,
    /// When set, the Route Installer logs kernel commands instead of
    /// executing them (spec.md §7 error taxonomy item 5 is moot in this
    /// mode).
    pub dry_run: bool,
}

impl Config {
    /// Reads `ROUTER_ID`, `ROUTER_NAME`, `ROUTER_NEIGHBORS`, and optional
    /// tuning knobs from the process environment. A missing id, an
    /// unparseable neighbor list, or an invalid IP/cost is a fatal
    /// configuration error (spec.md §7 taxonomy item 3) — this function
    /// returns `Err` rather than panicking so `main` can report it and
    /// exit cleanly.
    pub fn from_env(dry_run_override: bool) -> Result<Self> {
        let raw = RawConfig::from_env()?;
        raw.validate(dry_run_override)
    }
}

struct RawConfig {
    self_id: Option<String>,
    self_name: Option<String>,
    neighbors: Option<String>,
    interfaces: Option<String>,
    bind_address: Option<String>,
    lsa_port: Option<String>,
    probe_interval_ms: Option<String>,
    probe_timeout_ms: Option<String>,
    refresh_interval_s: Option<String>,
    dry_run: Option<String>,
}

impl RawConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            self_id: env::var("ROUTER_ID").ok(),
            self_name: env::var("ROUTER_NAME").ok(),
            neighbors: env::var("ROUTER_NEIGHBORS").ok(),
            interfaces: env::var("ROUTER_INTERFACES").ok(),
            bind_address: env::var("ROUTER_BIND_ADDRESS").ok(),
            lsa_port: env::var("LSA_PORT").ok(),
            probe_interval_ms: env::var("PROBE_INTERVAL_MS").ok(),
            probe_timeout_ms: env::var("PROBE_TIMEOUT_MS").ok(),
            refresh_interval_s: env::var("LSA_REFRESH_SECS").ok(),
            dry_run: env::var("ROUTE_TABLE_DRY_RUN").ok(),
        })
    }

    fn validate(self, dry_run_override: bool) -> Result<Config> {
        let self_id = self
            .self_id
            .filter(|s| !s.is_empty())
            .context("ROUTER_ID is required")?;
        self_id
            .parse::<Ipv4Addr>()
            .with_context(|| format!("ROUTER_ID {self_id:?} is not a valid IPv4 address"))?;

        let self_name = self.self_name.unwrap_or_else(|| self_id.clone());

        let neighbors = match self.neighbors {
            Some(raw) => parse_neighbors(&raw)?,
            None => Vec::new(),
        };

        let local_interfaces = match self.interfaces {
            Some(raw) => parse_interfaces(&raw)?,
            None => Vec::new(),
        };

        let bind_address = self.bind_address.unwrap_or_else(|| "0.0.0.0".to_string());

        let lsa_port = match self.lsa_port {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("LSA_PORT {raw:?} is not a valid port"))?,
            None => DEFAULT_LSA_PORT,
        };

        let probe_interval = match self.probe_interval_ms {
            Some(raw) => Duration::from_millis(
                raw.parse()
                    .with_context(|| format!("PROBE_INTERVAL_MS {raw:?} is not an integer"))?,
            ),
            None => Duration::from_millis(1_000),
        };

        let probe_timeout = match self.probe_timeout_ms {
            Some(raw) => Duration::from_millis(
                raw.parse()
                    .with_context(|| format!("PROBE_TIMEOUT_MS {raw:?} is not an integer"))?,
            ),
            None => Duration::from_millis(500),
        };

        let refresh_interval = match self.refresh_interval_s {
            Some(raw) if raw.is_empty() || raw == "0" => None,
            Some(raw) => Some(Duration::from_secs(raw.parse().with_context(|| {
                format!("LSA_REFRESH_SECS {raw:?} is not an integer")
            })?)),
            None => Some(Duration::from_secs(DEFAULT_REFRESH_SECS)),
        };

        let dry_run = dry_run_override
            || self
                .dry_run
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false);

        Ok(Config {
            self_id: RouterId::from(self_id),
            self_name,
            neighbors,
            local_interfaces,
            bind_address,
            lsa_port,
            recv_buf_size: DEFAULT_RECV_BUF_SIZE,
            probe_interval,
            probe_timeout,
            refresh_interval,
            dry_run,
        })
    }
}

/// Parses the bracketed-list neighbor grammar of spec.md §6:
/// `[name, ip, cost],[name, ip, cost]`. Grounded on
/// `original_source/router/formater.py::Formatter::formatar_vizinhos`'s
/// `strip("[]").split("],[")` shape.
fn parse_neighbors(raw: &str) -> Result<Vec<NeighborConfig>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let body = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .with_context(|| format!("ROUTER_NEIGHBORS {raw:?} must be a bracketed list"))?;

    body.split("],[")
        .map(|entry| {
            let parts: Vec<&str> = entry.split(',').map(|p| p.trim()).collect();
            if parts.len() != 3 {
                bail!("neighbor entry {entry:?} must have exactly 3 fields: name, ip, cost");
            }
            let name = parts[0].to_string();
            let ip: Ipv4Addr = parts[1]
                .parse()
                .with_context(|| format!("neighbor {name:?} has invalid ip {:?}", parts[1]))?;
            let static_cost: u32 = parts[2]
                .parse()
                .with_context(|| format!("neighbor {name:?} has invalid cost {:?}", parts[2]))?;
            Ok(NeighborConfig {
                name,
                ip,
                static_cost,
            })
        })
        .collect()
}

/// Parses the same bracketed-list grammar as `parse_neighbors`, but with
/// two fields per entry: `[name, ip]`. Used for `ROUTER_INTERFACES`.
fn parse_interfaces(raw: &str) -> Result<Vec<(String, Ipv4Addr)>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let body = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .with_context(|| format!("ROUTER_INTERFACES {raw:?} must be a bracketed list"))?;

    body.split("],[")
        .map(|entry| {
            let parts: Vec<&str> = entry.split(',').map(|p| p.trim()).collect();
            if parts.len() != 2 {
                bail!("interface entry {entry:?} must have exactly 2 fields: name, ip");
            }
            let name = parts[0].to_string();
            let ip: Ipv4Addr = parts[1]
                .parse()
                .with_context(|| format!("interface {name:?} has invalid ip {:?}", parts[1]))?;
            Ok((name, ip))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_neighbors() {
        let neighbors =
            parse_neighbors("[router1, 172.20.1.3, 1],[router3, 172.20.3.3, 1]").unwrap();
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].name, "router1");
        assert_eq!(neighbors[0].ip, "172.20.1.3".parse::<Ipv4Addr>().unwrap());
        assert_eq!(neighbors[0].static_cost, 1);
        assert_eq!(neighbors[1].name, "router3");
    }

    #[test]
    fn empty_neighbor_string_yields_no_neighbors() {
        assert!(parse_neighbors("").unwrap().is_empty());
    }

    #[test]
    fn malformed_neighbor_list_is_rejected() {
        assert!(parse_neighbors("router1, 172.20.1.3, 1").is_err());
        assert!(parse_neighbors("[router1, 172.20.1.3]").is_err());
        assert!(parse_neighbors("[router1, not-an-ip, 1]").is_err());
        assert!(parse_neighbors("[router1, 172.20.1.3, not-a-number]").is_err());
    }

    #[test]
    fn missing_router_id_is_a_validation_error() {
        let raw = RawConfig {
            self_id: None,
            self_name: None,
            neighbors: None,
            interfaces: None,
            bind_address: None,
            lsa_port: None,
            probe_interval_ms: None,
            probe_timeout_ms: None,
            refresh_interval_s: None,
            dry_run: None,
        };
        assert!(raw.validate(false).is_err());
    }

    #[test]
    fn self_name_defaults_to_self_id() {
        let raw = RawConfig {
            self_id: Some("172.20.1.3".to_string()),
            self_name: None,
            neighbors: None,
            interfaces: None,
            bind_address: None,
            lsa_port: None,
            probe_interval_ms: None,
            probe_timeout_ms: None,
            refresh_interval_s: None,
            dry_run: None,
        };
        let cfg = raw.validate(false).unwrap();
        assert_eq!(cfg.self_name, "172.20.1.3");
        assert_eq!(cfg.lsa_port, DEFAULT_LSA_PORT);
    }
}
