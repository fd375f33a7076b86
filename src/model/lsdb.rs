use std::collections::BTreeMap;

use crate::model::lsa::{Lsa, RouterId};

/// Mapping `RouterId -> Lsa`, holding at most one LSA per origin: the one
/// with the highest observed `seq` (spec.md §3 invariant 1). LSAs carry no
/// timestamp or lifetime field, so unlike this crate's teacher lineage
/// there is no age-out pass here — an accepted LSA lives until a
/// higher-seq one from the same origin replaces it.
#[derive(Debug, Default)]
pub struct Lsdb {
    entries: BTreeMap<RouterId, Lsa>,
}

impl Lsdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the accept rule of spec.md §4.C rule 2: accept iff absent
    /// or strictly newer. Returns whether the LSA was accepted.
    pub fn accept(&mut self, lsa: Lsa) -> bool {
        match self.entries.get(&lsa.id) {
            Some(existing) if lsa.seq <= existing.seq => false,
            _ => {
                self.entries.insert(lsa.id.clone(), lsa);
                true
            }
        }
    }

    pub fn get(&self, id: &RouterId) -> Option<&Lsa> {
        self.entries.get(id)
    }

    pub fn seq_of(&self, id: &RouterId) -> Option<u64> {
        self.entries.get(id).map(|lsa| lsa.seq)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lsa> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
