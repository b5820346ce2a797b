use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{ArcError, Result};
use crate::predicator::Predicator;
use crate::primitives::concurrency::TimingBudget;
use crate::types::{ArcDir, VertexId};

use super::metrics::{ArcMetrics, NoopMetrics};
use super::options::ArcVectorOptions;

/// A concrete arc to insert: `tail` owns the cell selected by `pred.dir`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ArcSpec {
    /// Vertex whose cell is mutated.
    pub tail: VertexId,
    /// Neighbor referenced by the stored arc.
    pub head: VertexId,
    /// Arc payload; `dir` selects the tail cell.
    pub pred: Predicator,
}

impl ArcSpec {
    /// Creates an arc spec.
    pub fn new(tail: VertexId, head: VertexId, pred: Predicator) -> Self {
        Self { tail, head, pred }
    }

    /// The same arc as recorded on the neighbor.
    pub fn reversed(&self) -> Self {
        Self {
            tail: self.head,
            head: self.tail,
            pred: self.pred.with_dir(self.pred.dir.reverse()),
        }
    }
}

/// A removal or lookup probe. `head == None` addresses every neighbor.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ArcQuery {
    /// Vertex whose cell is probed.
    pub tail: VertexId,
    /// Neighbor restriction.
    pub head: Option<VertexId>,
    /// Probe predicator; `dir` selects the tail cell.
    pub pred: Predicator,
}

impl ArcQuery {
    /// Creates a probe.
    pub fn new(tail: VertexId, head: Option<VertexId>, pred: Predicator) -> Self {
        Self { tail, head, pred }
    }

    /// The probe as seen from `head`. Only defined for a concrete neighbor.
    pub fn reversed(&self) -> Option<Self> {
        let head = self.head?;
        Some(Self {
            tail: head,
            head: Some(self.tail),
            pred: self.pred.with_dir(self.pred.dir.reverse()),
        })
    }
}

/// Collaborator that mirrors each forward mutation on the neighbor's cell.
///
/// `connect` and `disconnect` report how many reverse arcs they affected. The
/// cell treats any count other than `expected` as an asymmetric failure.
pub trait ArcEvents {
    /// Installs (or refreshes, when `expected == 0`) the reverse arc of `arc`.
    fn connect(&mut self, arc: &ArcSpec, expected: u64) -> Result<u64>;

    /// Removes the reverse arcs matching `query`, whose head is always concrete.
    fn disconnect(&mut self, query: &ArcQuery, expected: u64, budget: &mut TimingBudget)
        -> Result<u64>;

    /// Called when the owner's cell on `side` gains its first arc or loses its last.
    fn set_has_arcs(&mut self, _side: ArcDir, _present: bool) {}
}

/// Events for a cell whose far side is not materialized.
///
/// Used for the reverse half of a mutation and for standalone cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct Terminal;

impl ArcEvents for Terminal {
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
}

/// Graph-wide arc totals: `size` counts out-arcs, `rev_size` counts in-arcs.
#[derive(Debug, Default)]
pub struct GraphSize {
    size: AtomicI64,
    rev_size: AtomicI64,
}

impl GraphSize {
    fn counter(&self, side: ArcDir) -> &AtomicI64 {
        match side {
            ArcDir::In => &self.rev_size,
            _ => &self.size,
        }
    }

    /// Adds `n` arcs on `side`.
    pub fn inc(&self, side: ArcDir, n: u64) {
        self.counter(side).fetch_add(n as i64, Ordering::AcqRel);
    }

    /// Subtracts `n` arcs on `side`; going negative means the books are corrupt.
    pub fn sub(&self, side: ArcDir, n: u64) -> Result<()> {
        let previous = self.counter(side).fetch_sub(n as i64, Ordering::AcqRel);
        if previous < n as i64 {
            return Err(ArcError::InvalidState("negative graph size"));
        }
        Ok(())
    }

    /// Number of out-arcs.
    pub fn size(&self) -> i64 {
        self.size.load(Ordering::Acquire)
    }

    /// Number of in-arcs.
    pub fn rev_size(&self) -> i64 {
        self.rev_size.load(Ordering::Acquire)
    }
}

static NOOP_METRICS: NoopMetrics = NoopMetrics;

/// Everything a cell operation needs beyond the cell itself.
#[derive(Clone, Copy)]
pub struct ArcContext<'a> {
    /// Tuning and policies.
    pub options: &'a ArcVectorOptions,
    /// Counters to settle after each mutation.
    pub size: &'a GraphSize,
}

impl<'a> ArcContext<'a> {
    /// Bundles options and counters.
    pub fn new(options: &'a ArcVectorOptions, size: &'a GraphSize) -> Self {
        Self { options, size }
    }

    /// Configured metrics sink, or a no-op sink.
    pub fn metrics(&self) -> &'a dyn ArcMetrics {
        match self.options.metrics.as_deref() {
            Some(metrics) => metrics,
            None => &NOOP_METRICS,
        }
    }
}
