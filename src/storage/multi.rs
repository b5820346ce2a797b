use smallvec::SmallVec;

use crate::error::{ArcError, Result};
use crate::predicator::{ArcKey, MatchKind, Predicator};

/// Two or more predicators between the same ordered vertex pair.
///
/// Kept in insertion order; no two predicators share an [`ArcKey`].
#[derive(Clone, Debug, PartialEq)]
pub struct MultiArc {
    preds: SmallVec<[Predicator; 4]>,
}

impl MultiArc {
    pub(crate) fn pair(first: Predicator, second: Predicator) -> Self {
        debug_assert_ne!(first.key(), second.key());
        let mut preds = SmallVec::new();
        preds.push(first);
        preds.push(second);
        Self { preds }
    }

    pub(crate) fn from_vec(preds: Vec<Predicator>) -> Self {
        Self {
            preds: SmallVec::from_vec(preds),
        }
    }

    /// Number of predicators in the chain.
    pub fn len(&self) -> usize {
        self.preds.len()
    }

    /// Always false for a chain reachable from a cell.
    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    /// Predicators in insertion order.
    pub fn as_slice(&self) -> &[Predicator] {
        &self.preds
    }

    /// Predicator stored under `key`.
    pub fn get(&self, key: ArcKey) -> Option<&Predicator> {
        self.preds.iter().find(|p| p.key() == key)
    }

    pub(crate) fn get_mut(&mut self, key: ArcKey) -> Option<&mut Predicator> {
        self.preds.iter_mut().find(|p| p.key() == key)
    }

    pub(crate) fn push(&mut self, pred: Predicator, capacity: usize) -> Result<()> {
        if self.preds.len() >= capacity {
            return Err(ArcError::Capacity { capacity });
        }
        self.preds.push(pred);
        Ok(())
    }

    /// Number of predicators matching `probe`.
    pub fn count_matching(&self, probe: &Predicator, kind: MatchKind) -> u64 {
        self.preds.iter().filter(|p| kind.matches(probe, p)).count() as u64
    }

    /// Removes every predicator matching `probe`, returning how many were removed.
    pub(crate) fn remove_matching(&mut self, probe: &Predicator, kind: MatchKind) -> u64 {
        let before = self.preds.len();
        self.preds.retain(|p| !kind.matches(probe, p));
        (before - self.preds.len()) as u64
    }

    /// The remaining predicator once the chain has shrunk to one.
    pub(crate) fn single(&self) -> Option<Predicator> {
        match self.preds.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}
