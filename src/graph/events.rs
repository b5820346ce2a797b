use crate::error::{ArcError, Result};
use crate::primitives::concurrency::{lock_within, TimingBudget};
use crate::storage::{ArcCell, ArcEvents, ArcQuery, ArcSpec};
use crate::types::ArcDir;

use super::{Graph, Vertex};

/// Applies the reverse half of a mutation on the neighbor's cell while the
/// owner's cell is locked.
pub(crate) struct ReverseEvents<'a> {
    graph: &'a Graph,
    owner: &'a Vertex,
    connect_budget: TimingBudget,
}

impl<'a> ReverseEvents<'a> {
    /// `connect_budget` bounds the wait for the neighbor's in-cell during adds.
    pub(crate) fn new(graph: &'a Graph, owner: &'a Vertex, connect_budget: TimingBudget) -> Self {
        Self {
            graph,
            owner,
            connect_budget,
        }
    }

    pub(crate) fn connect_budget(&self) -> &TimingBudget {
        &self.connect_budget
    }
}

impl ArcEvents for ReverseEvents<'_> {
    fn connect(&mut self, arc: &ArcSpec, expected: u64) -> Result<u64> {
        let rev = arc.reversed();
        let vertex = self.graph.vertex(rev.tail)?;
        let side = rev.pred.dir;
        let mut cell = lock_within(vertex.cell(side), &mut self.connect_budget, rev.tail)?;
        if let ArcCell::DegreeCounter(count) = &mut *cell {
            if *count == 0 && expected > 0 {
                vertex.set_has_arcs(side, true);
            }
            *count += expected;
            self.graph.size.inc(side, expected);
            return Ok(expected);
        }
        let outcome = cell.add(&self.graph.ctx(), &rev, &mut Mirror(&vertex))?;
        Ok(outcome.delta())
    }

    fn disconnect(
        &mut self,
        query: &ArcQuery,
        expected: u64,
        budget: &mut TimingBudget,
    ) -> Result<u64> {
        let rev = query
            .reversed()
            .ok_or_else(|| ArcError::InvalidArgument("disconnect needs a concrete head".into()))?;
        let vertex = self.graph.lookup(rev.tail)?;
        let side = rev.pred.dir;
        let mut cell = if side == ArcDir::Out {
            // Against lock order: never wait while holding the in-cell.
            let mut attempt = TimingBudget::zero();
            lock_within(vertex.cell(side), &mut attempt, rev.tail)
                .inspect_err(|_| budget.halt(attempt.reason(), Some(rev.tail)))?
        } else {
            lock_within(vertex.cell(side), budget, rev.tail)?
        };
        if let ArcCell::DegreeCounter(count) = &mut *cell {
            if *count < expected {
                return Err(ArcError::InvalidState("degree counter underflow"));
            }
            *count -= expected;
            if *count == 0 {
                vertex.set_has_arcs(side, false);
            }
            self.graph.size.sub(side, expected)?;
            return Ok(expected);
        }
        cell.remove(&self.graph.ctx(), &rev, &mut TimingBudget::infinite(), &mut Mirror(&vertex))
    }

    fn set_has_arcs(&mut self, side: ArcDir, present: bool) {
        self.owner.set_has_arcs(side, present);
    }
}

/// Events for the reverse cell itself: nothing further to mirror, only the
/// vertex flags to maintain.
struct Mirror<'v>(&'v Vertex);

impl ArcEvents for Mirror<'_> {
    fn connect(&mut self, _arc: &ArcSpec, expected: u64) -> Result<u64> {
        Ok(expected)
    }

    fn disconnect(
        &mut self,
        _query: &ArcQuery,
        expected: u64,
        _budget: &mut TimingBudget,
    ) -> Result<u64> {
        Ok(expected)
    }

    fn set_has_arcs(&mut self, side: ArcDir, present: bool) {
        self.0.set_has_arcs(side, present);
    }
}
