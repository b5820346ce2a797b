use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use tracing::debug;

use crate::error::{ArcError, Result};
use crate::predicator::Predicator;
use crate::primitives::concurrency::{lock_within, AccessReason, TimingBudget};
use crate::storage::{
    get_arcs_bidirectional, get_vertices_bidirectional, has_arc_bidirectional, AddOutcome,
    ArcCollector, ArcFilter, ArcQuery, ArcSpec, ArcView, CellSnapshot, CellType, Expiration,
    FnFilter, HeadSet,
};
use crate::types::{ArcDir, VertexId};

use super::events::ReverseEvents;
use super::{Graph, Vertex};

fn with_removed(err: ArcError, total: u64) -> ArcError {
    match err {
        ArcError::Timeout { reason, removed } => ArcError::Timeout {
            reason,
            removed: removed + total,
        },
        other => other,
    }
}

fn cell_side(dir: ArcDir) -> ArcDir {
    match dir {
        ArcDir::In => ArcDir::In,
        _ => ArcDir::Out,
    }
}

impl Graph {
    /// Adds the arc `tail -pred-> head`: an out-arc on `tail` and the matching
    /// in-arc on `head`. Waits for locks without limit.
    pub fn add_arc(&self, tail: VertexId, head: VertexId, pred: Predicator) -> Result<AddOutcome> {
        self.add_arc_within(tail, head, pred, &mut TimingBudget::infinite())
    }

    /// Adds an arc, waiting for locks at most as long as `budget` allows.
    pub fn add_arc_within(
        &self,
        tail: VertexId,
        head: VertexId,
        pred: Predicator,
        budget: &mut TimingBudget,
    ) -> Result<AddOutcome> {
        let owner = self.vertex(tail)?;
        if !self.contains(head) {
            return Err(ArcError::NotFound(format!("vertex {head}")));
        }
        budget.start();
        let arc = ArcSpec::new(tail, head, pred.with_dir(ArcDir::Out));
        let mut cell = lock_within(&owner.out, budget, tail)?;
        let mut events = ReverseEvents::new(self, &owner, budget.clone());
        let outcome = cell.add(&self.ctx(), &arc, &mut events);
        if let Err(err) = &outcome {
            if err.is_transient() {
                let blocked = events.connect_budget();
                budget.halt(blocked.reason(), blocked.blocked_on());
            }
        }
        let outcome = outcome?;
        if outcome != AddOutcome::Rejected {
            if let Some(tmx) = arc.pred.expires_at() {
                owner.lower_deadline(tmx);
            }
        }
        Ok(outcome)
    }

    /// Removes the arcs of `tail` matching `probe` toward `head`, or toward
    /// every neighbor when `head` is `None`. `probe.dir` selects the cell; any
    /// direction other than [`ArcDir::In`] means the out-cell.
    ///
    /// On timeout the error carries the number of arcs removed before the
    /// budget ran out.
    pub fn remove_arcs(
        &self,
        tail: VertexId,
        head: Option<VertexId>,
        probe: Predicator,
        budget: &mut TimingBudget,
    ) -> Result<u64> {
        let vertex = self.vertex(tail)?;
        self.remove_arcs_on(&vertex, head, probe.with_dir(cell_side(probe.dir)), budget)
    }

    pub(crate) fn remove_arcs_on(
        &self,
        vertex: &Vertex,
        head: Option<VertexId>,
        probe: Predicator,
        budget: &mut TimingBudget,
    ) -> Result<u64> {
        let query = ArcQuery::new(vertex.id, head, probe);
        budget.start();
        if probe.dir == ArcDir::Out {
            let mut cell = lock_within(&vertex.out, budget, vertex.id)?;
            let mut events = ReverseEvents::new(self, vertex, TimingBudget::infinite());
            return cell.remove(&self.ctx(), &query, budget, &mut events);
        }

        // In-side removal never waits on a neighbor while holding its own
        // cell; contended passes release the cell and start over.
        let mut total = 0;
        loop {
            let attempt = {
                let mut cell = lock_within(&vertex.inc, budget, vertex.id)
                    .map_err(|err| with_removed(err, total))?;
                let mut events = ReverseEvents::new(self, vertex, TimingBudget::infinite());
                cell.remove(&self.ctx(), &query, &mut TimingBudget::zero(), &mut events)
            };
            match attempt {
                Ok(n) => return Ok(total + n),
                Err(ArcError::Timeout { removed, .. }) => {
                    total += removed;
                    if budget.is_zero() || budget.is_expired() {
                        let reason = if budget.is_zero() {
                            AccessReason::Locked
                        } else {
                            AccessReason::Timeout
                        };
                        budget.halt(reason, None);
                        return Err(ArcError::Timeout {
                            reason,
                            removed: total,
                        });
                    }
                    self.ctx().metrics().removal_retry();
                    debug!(vertex = %vertex.id, removed = total, "arcvector.graph.remove_retry");
                    let pause = budget
                        .remaining()
                        .map_or(self.options.retry_interval, |left| {
                            left.min(self.options.retry_interval)
                        });
                    thread::sleep(pause);
                }
                Err(err) => return Err(with_removed(err, total)),
            }
        }
    }

    /// Runs one expiration sweep over the out-arcs of `id` and records the
    /// next deadline on the vertex.
    pub fn expire_vertex(&self, id: VertexId, now: u32) -> Result<Expiration> {
        let vertex = self.lookup(id)?;
        self.expire_on(&vertex, now)
    }

    fn expire_on(&self, vertex: &Vertex, now: u32) -> Result<Expiration> {
        let mut cell = vertex.out.lock();
        let mut events = ReverseEvents::new(self, vertex, TimingBudget::infinite());
        let sweep = cell.expire(&self.ctx(), vertex.id, ArcDir::Out, now, &mut events)?;
        vertex.set_deadline(sweep.next_deadline);
        Ok(sweep)
    }

    /// Sweeps every vertex whose recorded deadline has passed and returns the
    /// number of arcs expired.
    pub fn expire_arcs(&self, now: u32) -> Result<u64> {
        let due: Vec<Arc<Vertex>> = self
            .vertices
            .read()
            .values()
            .filter(|v| v.next_deadline() <= now)
            .cloned()
            .collect();
        let mut expired = 0;
        for vertex in due {
            expired += self.expire_on(&vertex, now)?.expired;
        }
        if expired > 0 {
            debug!(now, expired, "arcvector.graph.expired");
        }
        Ok(expired)
    }

    /// Degree of `id` on `side`; [`ArcDir::Any`] and [`ArcDir::Both`] sum both cells.
    pub fn degree(&self, id: VertexId, side: ArcDir) -> Result<u64> {
        let vertex = self.vertex(id)?;
        Ok(match side {
            ArcDir::Out => vertex.out.lock().degree(),
            ArcDir::In => vertex.inc.lock().degree(),
            ArcDir::Any | ArcDir::Both => vertex.out.lock().degree() + vertex.inc.lock().degree(),
        })
    }

    /// Representation of one cell of `id`.
    pub fn cell_type(&self, id: VertexId, side: ArcDir) -> Result<CellType> {
        let vertex = self.vertex(id)?;
        let cell_type = vertex.cell(cell_side(side)).lock().cell_type();
        Ok(cell_type)
    }

    /// Stored arc from `tail` toward `head` accepted by `probe`, looked up in
    /// the cell selected by `probe.dir`.
    pub fn get_arc_value(
        &self,
        tail: VertexId,
        head: VertexId,
        probe: &Predicator,
    ) -> Result<Option<Predicator>> {
        let vertex = self.vertex(tail)?;
        let value = vertex.cell(cell_side(probe.dir)).lock().get_arc_value(head, probe);
        Ok(value)
    }

    /// Reports the arcs of `id` accepted by `filter`.
    ///
    /// `Out` and `In` scan one cell, `Any` scans both one after the other, and
    /// `Both` reports neighbors linked in both directions.
    pub fn get_arcs(
        &self,
        id: VertexId,
        side: ArcDir,
        filter: &dyn ArcFilter,
        collector: &mut dyn ArcCollector,
    ) -> Result<u64> {
        let vertex = self.vertex(id)?;
        self.ctx().metrics().scan(side.as_str());
        match side {
            ArcDir::Out | ArcDir::In => vertex.cell(side).lock().get_arcs(id, filter, collector),
            ArcDir::Any => {
                let out = vertex.out.lock().get_arcs(id, filter, collector)?;
                let inc = vertex.inc.lock().get_arcs(id, filter, collector)?;
                Ok(out + inc)
            }
            ArcDir::Both => {
                let out = vertex.out.lock();
                let inc = vertex.inc.lock();
                get_arcs_bidirectional(&out, &inc, id, filter, collector)
            }
        }
    }

    /// Reports each neighbor of `id` with an accepted arc once per scanned cell.
    pub fn get_vertices(
        &self,
        id: VertexId,
        side: ArcDir,
        filter: &dyn ArcFilter,
        collector: &mut dyn ArcCollector,
    ) -> Result<u64> {
        let vertex = self.vertex(id)?;
        self.ctx().metrics().scan(side.as_str());
        match side {
            ArcDir::Out | ArcDir::In => {
                vertex.cell(side).lock().get_vertices(id, filter, collector)
            }
            ArcDir::Any => {
                let out = vertex.out.lock().get_vertices(id, filter, collector)?;
                let inc = vertex.inc.lock().get_vertices(id, filter, collector)?;
                Ok(out + inc)
            }
            ArcDir::Both => {
                let out = vertex.out.lock();
                let inc = vertex.inc.lock();
                get_vertices_bidirectional(&out, &inc, id, filter, collector)
            }
        }
    }

    /// Returns true if `id` has an accepted arc toward the neighbors in `heads`.
    pub fn has_arc(
        &self,
        id: VertexId,
        side: ArcDir,
        heads: &HeadSet,
        filter: &dyn ArcFilter,
    ) -> Result<bool> {
        let vertex = self.vertex(id)?;
        self.ctx().metrics().scan(side.as_str());
        match side {
            ArcDir::Out | ArcDir::In => vertex.cell(side).lock().has_arc(id, heads, filter),
            ArcDir::Any => {
                if vertex.out.lock().has_arc(id, heads, filter)? {
                    return Ok(true);
                }
                vertex.inc.lock().has_arc(id, heads, filter)
            }
            ArcDir::Both => {
                let out = vertex.out.lock();
                let inc = vertex.inc.lock();
                let toward = |allowed: &dyn Fn(VertexId) -> bool| -> Result<bool> {
                    let scoped = FnFilter(|arc: &ArcView| -> Result<bool> {
                        Ok(allowed(arc.head) && filter.check(arc)?)
                    });
                    has_arc_bidirectional(&out, &inc, id, &scoped)
                };
                match heads {
                    HeadSet::Any => toward(&|_: VertexId| true),
                    HeadSet::Vertex(head) => toward(&|v: VertexId| v == *head),
                    HeadSet::AnyOf(list) => toward(&|v: VertexId| list.contains(&v)),
                    HeadSet::AllOf(list) => {
                        if list.is_empty() {
                            return Ok(false);
                        }
                        for head in list {
                            if !toward(&|v: VertexId| v == *head)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                }
            }
        }
    }

    /// Word stream of one cell of `id`.
    pub fn serialize_cell(&self, id: VertexId, side: ArcDir) -> Result<Vec<u64>> {
        let vertex = self.vertex(id)?;
        let words = vertex.cell(cell_side(side)).lock().to_words();
        Ok(words)
    }

    /// Checksummed byte envelope of one cell of `id`.
    pub fn encode_cell(&self, id: VertexId, side: ArcDir) -> Result<Bytes> {
        let vertex = self.vertex(id)?;
        let side = cell_side(side);
        let bytes = vertex.cell(side).lock().encode(id, side);
        Ok(bytes)
    }

    /// JSON-friendly view of one cell of `id`.
    pub fn snapshot(&self, id: VertexId, side: ArcDir) -> Result<CellSnapshot> {
        let vertex = self.vertex(id)?;
        let snapshot = vertex.cell(cell_side(side)).lock().snapshot();
        Ok(snapshot)
    }

    /// Hex word dump of one cell of `id`.
    pub fn debug_dump(&self, id: VertexId, side: ArcDir) -> Result<String> {
        let vertex = self.vertex(id)?;
        let dump = vertex.cell(cell_side(side)).lock().debug_dump();
        Ok(dump)
    }
}
