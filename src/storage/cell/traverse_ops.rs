use crate::error::Result;
use crate::predicator::{MatchKind, Predicator};
use crate::storage::filter::{ArcCollector, ArcFilter, ArcView, Collect, FirstMatch};
use crate::types::{ArcDir, VertexId};

use super::ArcCell;

/// Neighbor condition of [`ArcCell::has_arc`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadSet {
    /// Any neighbor.
    Any,
    /// One neighbor.
    Vertex(VertexId),
    /// At least one of the listed neighbors.
    AnyOf(Vec<VertexId>),
    /// Every listed neighbor; an empty list never matches.
    AllOf(Vec<VertexId>),
}

impl ArcCell {
    /// Predicators stored toward `head`.
    pub fn arcs_toward(&self, head: VertexId) -> &[Predicator] {
        match self {
            ArcCell::Simple { head: h, pred } if *h == head => std::slice::from_ref(pred),
            ArcCell::Array(array) => array
                .lookup(head)
                .map(|entry| entry.predicators())
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Stored predicator toward `head` accepted by `probe`.
    ///
    /// Returns the first match in entry order, or `None` when no arc matches.
    pub fn get_arc_value(&self, head: VertexId, probe: &Predicator) -> Option<Predicator> {
        let kind = MatchKind::select(probe);
        self.arcs_toward(head)
            .iter()
            .find(|pred| kind.matches(probe, pred))
            .copied()
    }

    fn visit(
        &self,
        mut visit: impl FnMut(VertexId, &[Predicator]) -> Result<Collect>,
    ) -> Result<()> {
        match self {
            ArcCell::Simple { head, pred } => {
                visit(*head, std::slice::from_ref(pred))?;
            }
            ArcCell::Array(array) => {
                for (head, entry) in array.iter() {
                    if visit(head, entry.predicators())? == Collect::Stop {
                        break;
                    }
                }
            }
            ArcCell::Empty | ArcCell::DegreeCounter(_) => {}
        }
        Ok(())
    }

    /// Reports every arc accepted by `filter` to `collector`, multi-arc chains
    /// flattened, and returns the number reported.
    pub fn get_arcs(
        &self,
        tail: VertexId,
        filter: &dyn ArcFilter,
        collector: &mut dyn ArcCollector,
    ) -> Result<u64> {
        let mut hits = 0;
        self.visit(|head, preds| {
            for pred in preds {
                let arc = ArcView { tail, head, pred: *pred };
                if filter.check(&arc)? {
                    hits += 1;
                    if collector.collect(arc) == Collect::Stop {
                        return Ok(Collect::Stop);
                    }
                }
            }
            Ok(Collect::Continue)
        })?;
        Ok(hits)
    }

    /// Reports each neighbor with at least one accepted arc once, through its
    /// first accepted arc, and returns the number of neighbors reported.
    pub fn get_vertices(
        &self,
        tail: VertexId,
        filter: &dyn ArcFilter,
        collector: &mut dyn ArcCollector,
    ) -> Result<u64> {
        let mut hits = 0;
        self.visit(|head, preds| {
            for pred in preds {
                let arc = ArcView { tail, head, pred: *pred };
                if filter.check(&arc)? {
                    hits += 1;
                    return Ok(collector.collect(arc));
                }
            }
            Ok(Collect::Continue)
        })?;
        Ok(hits)
    }

    /// Returns true if an arc accepted by `filter` leads to the neighbors
    /// described by `heads`.
    pub fn has_arc(&self, tail: VertexId, heads: &HeadSet, filter: &dyn ArcFilter) -> Result<bool> {
        match heads {
            HeadSet::Any => {
                let mut first = FirstMatch::default();
                self.get_arcs(tail, filter, &mut first)?;
                Ok(first.found().is_some())
            }
            HeadSet::Vertex(head) => self.has_arc_toward(tail, *head, filter),
            HeadSet::AnyOf(list) => {
                for head in list {
                    if self.has_arc_toward(tail, *head, filter)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            HeadSet::AllOf(list) => {
                if list.is_empty() {
                    return Ok(false);
                }
                for head in list {
                    if !self.has_arc_toward(tail, *head, filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn has_arc_toward(
        &self,
        tail: VertexId,
        head: VertexId,
        filter: &dyn ArcFilter,
    ) -> Result<bool> {
        for pred in self.arcs_toward(head) {
            if filter.check(&ArcView { tail, head, pred: *pred })? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Walks the smaller of a vertex's two cells and pairs each accepted arc with
/// an accepted arc of the same key toward the same neighbor on the other side.
fn visit_pairs(
    outarcs: &ArcCell,
    inarcs: &ArcCell,
    tail: VertexId,
    filter: &dyn ArcFilter,
    mut pair: impl FnMut(ArcView, ArcView) -> Collect,
) -> Result<()> {
    let (scan, other) = if inarcs.degree() < outarcs.degree() {
        (inarcs, outarcs)
    } else {
        (outarcs, inarcs)
    };
    scan.visit(|head, preds| {
        for pred in preds {
            let near = ArcView { tail, head, pred: *pred };
            if !filter.check(&near)? {
                continue;
            }
            let key = pred.key();
            let Some(far_pred) = other.arcs_toward(head).iter().find(|p| p.key() == key) else {
                continue;
            };
            let far = ArcView { tail, head, pred: *far_pred };
            if !filter.check(&far)? {
                continue;
            }
            let (out, inc) = if near.pred.dir == ArcDir::In { (far, near) } else { (near, far) };
            if pair(out, inc) == Collect::Stop {
                return Ok(Collect::Stop);
            }
        }
        Ok(Collect::Continue)
    })
}

/// Reports arcs present in both directions between `tail` and a neighbor.
///
/// A pair with identical relationship, modifier and value is reported once
/// with direction [`ArcDir::Both`]; otherwise the out-arc and the in-arc are
/// reported separately. Returns the number of arcs reported.
pub fn get_arcs_bidirectional(
    outarcs: &ArcCell,
    inarcs: &ArcCell,
    tail: VertexId,
    filter: &dyn ArcFilter,
    collector: &mut dyn ArcCollector,
) -> Result<u64> {
    let mut hits = 0;
    visit_pairs(outarcs, inarcs, tail, filter, |out, inc| {
        if out.pred.same_data(&inc.pred) {
            hits += 1;
            return collector.collect(ArcView {
                pred: out.pred.with_dir(ArcDir::Both),
                ..out
            });
        }
        hits += 1;
        if collector.collect(out) == Collect::Stop {
            return Collect::Stop;
        }
        hits += 1;
        collector.collect(inc)
    })?;
    Ok(hits)
}

/// Reports each neighbor connected to `tail` in both directions once.
pub fn get_vertices_bidirectional(
    outarcs: &ArcCell,
    inarcs: &ArcCell,
    tail: VertexId,
    filter: &dyn ArcFilter,
    collector: &mut dyn ArcCollector,
) -> Result<u64> {
    let mut last = None;
    let mut hits = 0;
    visit_pairs(outarcs, inarcs, tail, filter, |out, _| {
        if last == Some(out.head) {
            return Collect::Continue;
        }
        last = Some(out.head);
        hits += 1;
        collector.collect(ArcView {
            pred: out.pred.with_dir(ArcDir::Both),
            ..out
        })
    })?;
    Ok(hits)
}

/// Returns true if some neighbor is connected to `tail` in both directions by
/// an accepted key.
pub fn has_arc_bidirectional(
    outarcs: &ArcCell,
    inarcs: &ArcCell,
    tail: VertexId,
    filter: &dyn ArcFilter,
) -> Result<bool> {
    let mut found = false;
    visit_pairs(outarcs, inarcs, tail, filter, |_, _| {
        found = true;
        Collect::Stop
    })?;
    Ok(found)
}
