use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::predicator::{ArcKey, MatchKind, Predicator};
use crate::types::VertexId;

use super::multi::MultiArc;

/// Arcs from one owner to one neighbor inside an array cell.
#[derive(Clone, Debug, PartialEq)]
pub enum ArcEntry {
    /// Exactly one arc to the neighbor.
    Simple(Predicator),
    /// Two or more arcs to the neighbor, distinct by key.
    Multi(MultiArc),
}

impl ArcEntry {
    /// Number of logical arcs in the entry.
    pub fn degree(&self) -> u64 {
        match self {
            ArcEntry::Simple(_) => 1,
            ArcEntry::Multi(multi) => multi.len() as u64,
        }
    }

    /// All predicators of the entry.
    pub fn predicators(&self) -> &[Predicator] {
        match self {
            ArcEntry::Simple(pred) => std::slice::from_ref(pred),
            ArcEntry::Multi(multi) => multi.as_slice(),
        }
    }

    /// Predicator stored under `key`.
    pub fn get(&self, key: ArcKey) -> Option<&Predicator> {
        match self {
            ArcEntry::Simple(pred) if pred.key() == key => Some(pred),
            ArcEntry::Simple(_) => None,
            ArcEntry::Multi(multi) => multi.get(key),
        }
    }

    /// Returns true if the entry is a multi-arc chain.
    pub fn is_multi(&self) -> bool {
        matches!(self, ArcEntry::Multi(_))
    }

    pub(crate) fn get_mut(&mut self, key: ArcKey) -> Option<&mut Predicator> {
        match self {
            ArcEntry::Simple(pred) if pred.key() == key => Some(pred),
            ArcEntry::Simple(_) => None,
            ArcEntry::Multi(multi) => multi.get_mut(key),
        }
    }

    /// Number of predicators matching `probe`.
    pub fn count_matching(&self, probe: &Predicator, kind: MatchKind) -> u64 {
        match self {
            ArcEntry::Simple(pred) => kind.matches(probe, pred) as u64,
            ArcEntry::Multi(multi) => multi.count_matching(probe, kind),
        }
    }
}

/// Hash-indexed per-neighbor entries with an incrementally maintained degree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArcArray {
    entries: FxHashMap<VertexId, ArcEntry>,
    degree: u64,
}

impl ArcArray {
    /// Entry for `head`.
    pub fn lookup(&self, head: VertexId) -> Option<&ArcEntry> {
        self.entries.get(&head)
    }

    /// Total number of arcs across all entries.
    pub fn degree(&self) -> u64 {
        self.degree
    }

    /// Number of distinct neighbors.
    pub fn neighbors(&self) -> usize {
        self.entries.len()
    }

    /// Iterates `(neighbor, entry)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (VertexId, &ArcEntry)> + '_ {
        self.entries.iter().map(|(head, entry)| (*head, entry))
    }

    /// Recomputes the degree by full scan.
    pub fn recount(&self) -> u64 {
        self.entries.values().map(ArcEntry::degree).sum()
    }

    pub(crate) fn heads(&self) -> Vec<VertexId> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn insert(&mut self, head: VertexId, entry: ArcEntry) {
        self.degree += entry.degree();
        if let Some(old) = self.entries.insert(head, entry) {
            self.degree -= old.degree();
        }
    }

    pub(crate) fn get_mut(&mut self, head: VertexId, key: ArcKey) -> Option<&mut Predicator> {
        self.entries.get_mut(&head)?.get_mut(key)
    }

    /// Adds a predicator whose key is not yet present toward `head`.
    pub(crate) fn push(&mut self, head: VertexId, pred: Predicator, capacity: usize) -> Result<()> {
        match self.entries.remove(&head) {
            None => {
                self.entries.insert(head, ArcEntry::Simple(pred));
            }
            Some(ArcEntry::Simple(existing)) => {
                self.entries
                    .insert(head, ArcEntry::Multi(MultiArc::pair(existing, pred)));
            }
            Some(ArcEntry::Multi(mut multi)) => {
                let pushed = multi.push(pred, capacity);
                self.entries.insert(head, ArcEntry::Multi(multi));
                pushed?;
            }
        }
        self.degree += 1;
        Ok(())
    }

    /// Removes predicators toward `head` matching `probe` and restores the
    /// minimal entry shape: a chain of one becomes Simple, an empty entry is
    /// dropped.
    pub(crate) fn remove_matching(
        &mut self,
        head: VertexId,
        probe: &Predicator,
        kind: MatchKind,
    ) -> u64 {
        let Some(entry) = self.entries.remove(&head) else {
            return 0;
        };
        let (removed, rest) = match entry {
            ArcEntry::Simple(pred) if kind.matches(probe, &pred) => (1, None),
            simple @ ArcEntry::Simple(_) => (0, Some(simple)),
            ArcEntry::Multi(mut multi) => {
                let removed = multi.remove_matching(probe, kind);
                let rest = match (multi.len(), multi.single()) {
                    (0, _) => None,
                    (_, Some(only)) => Some(ArcEntry::Simple(only)),
                    _ => Some(ArcEntry::Multi(multi)),
                };
                (removed, rest)
            }
        };
        if let Some(rest) = rest {
            self.entries.insert(head, rest);
        }
        self.degree -= removed;
        removed
    }

    /// The only arc of a degree-one array.
    pub(crate) fn sole_arc(&self) -> Option<(VertexId, Predicator)> {
        if self.degree != 1 {
            return None;
        }
        self.entries.iter().find_map(|(head, entry)| match entry {
            ArcEntry::Simple(pred) => Some((*head, *pred)),
            ArcEntry::Multi(_) => None,
        })
    }
}
