use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Stable router identifier: the router's own IPv4 address on the fabric.
/// Kept as a string (not `Ipv4Addr`) because the wire format and the
/// original deployment treat it as an opaque, printable key — see
/// spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterId(pub String);

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RouterId {
    fn from(value: &str) -> Self {
        RouterId(value.to_string())
    }
}

impl From<String> for RouterId {
    fn from(value: String) -> Self {
        RouterId(value)
    }
}

/// Link cost as carried on the wire: either an integer (static-cost mode)
/// or a float (measured-RTT mode). Recipients MUST accept both (spec.md
/// §6); this type preserves that distinction instead of collapsing it to
/// a single float so a static-cost neighbor's `1` round-trips as `1`, not
/// `1.0`, while still comparing correctly against measured costs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cost {
    Int(i64),
    Float(f64),
}

impl Cost {
    pub fn as_f64(self) -> f64 {
        match self {
            Cost::Int(v) => v as f64,
            Cost::Float(v) => v,
        }
    }
}

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.as_f64() == other.as_f64()
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_f64().partial_cmp(&other.as_f64())
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Int(v) => write!(f, "{v}"),
            Cost::Float(v) => write!(f, "{v:.3}"),
        }
    }
}

/// One router's local view, as flooded to the rest of the topology.
/// Field names match the wire format of spec.md §6 exactly — `vizinhos`
/// is the literal JSON key, carried over from the original deployment's
/// wire format rather than translated, since it is a protocol detail and
/// not an internal naming choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lsa {
    pub id: RouterId,
    pub vizinhos: BTreeMap<String, (String, Cost)>,
    pub seq: u64,
}

impl Lsa {
    pub fn new(id: RouterId, neighbors: BTreeMap<String, (String, Cost)>, seq: u64) -> Self {
        Self {
            id,
            vizinhos: neighbors,
            seq,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to encode LSA")
    }

    /// Decodes an LSA from a raw UDP payload. Malformed input is the
    /// caller's responsibility to log-and-drop per spec.md §4.C rule 1.
    pub fn decode(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context("failed to decode LSA")
    }
}
