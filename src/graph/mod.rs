//! In-memory reference vertex store.
//!
//! [`Graph`] owns two [`ArcCell`]s per vertex behind separate mutexes and
//! mirrors every arc on its head through [`ArcEvents`]. Lock order is out-cell
//! before in-cell: out-side mutations wait on the neighbor's in-cell within the
//! caller's budget, in-side mutations only ever try the neighbor's out-cell
//! without waiting and retry after releasing their own lock.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::{ArcError, Result};
use crate::predicator::{Predicator, TIME_EXPIRES_NEVER};
use crate::primitives::concurrency::TimingBudget;
use crate::storage::{ArcCell, ArcContext, ArcVectorOptions, GraphSize};
use crate::types::{ArcDir, VertexId};

mod arc_ops;
mod events;
mod verify;


pub use verify::VerifyReport;

const HAS_OUTARCS: u8 = 0x01;
const HAS_INARCS: u8 = 0x02;
const DELETED: u8 = 0x04;

/// One vertex: its two arc cells plus bookkeeping read without locking.
#[derive(Debug)]
pub struct Vertex {
    id: VertexId,
    out: Mutex<ArcCell>,
    inc: Mutex<ArcCell>,
    flags: AtomicU8,
    deadline: AtomicU32,
}

impl Vertex {
    fn new(id: VertexId) -> Self {
        Self {
            id,
            out: Mutex::new(ArcCell::Empty),
            inc: Mutex::new(ArcCell::Empty),
            flags: AtomicU8::new(0),
            deadline: AtomicU32::new(TIME_EXPIRES_NEVER),
        }
    }

    /// Identity of the vertex.
    pub fn id(&self) -> VertexId {
        self.id
    }

    pub(crate) fn cell(&self, side: ArcDir) -> &Mutex<ArcCell> {
        match side {
            ArcDir::In => &self.inc,
            _ => &self.out,
        }
    }

    /// Returns true if the out-cell holds at least one arc.
    pub fn has_outarcs(&self) -> bool {
        self.flags.load(Ordering::Acquire) & HAS_OUTARCS != 0
    }

    /// Returns true if the in-cell holds at least one arc.
    pub fn has_inarcs(&self) -> bool {
        self.flags.load(Ordering::Acquire) & HAS_INARCS != 0
    }

    pub(crate) fn set_has_arcs(&self, side: ArcDir, present: bool) {
        let bit = match side {
            ArcDir::In => HAS_INARCS,
            _ => HAS_OUTARCS,
        };
        if present {
            self.flags.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.flags.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    fn is_deleted(&self) -> bool {
        self.flags.load(Ordering::Acquire) & DELETED != 0
    }

    /// Earliest expiration deadline of the out-arcs, as last recorded.
    pub fn next_deadline(&self) -> u32 {
        self.deadline.load(Ordering::Acquire)
    }

    pub(crate) fn lower_deadline(&self, tmx: u32) {
        self.deadline.fetch_min(tmx, Ordering::AcqRel);
    }

    pub(crate) fn set_deadline(&self, tmx: u32) {
        self.deadline.store(tmx, Ordering::Release);
    }
}

/// Reference graph: a vertex table plus the graph-wide arc counters.
pub struct Graph {
    vertices: RwLock<FxHashMap<VertexId, Arc<Vertex>>>,
    next_id: AtomicU64,
    size: GraphSize,
    options: ArcVectorOptions,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new(options: ArcVectorOptions) -> Self {
        Self {
            vertices: RwLock::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
            size: GraphSize::default(),
            options,
        }
    }

    /// Options shared by every cell of the graph.
    pub fn options(&self) -> &ArcVectorOptions {
        &self.options
    }

    pub(crate) fn ctx(&self) -> ArcContext<'_> {
        ArcContext::new(&self.options, &self.size)
    }

    /// Number of out-arcs in the graph.
    pub fn size(&self) -> i64 {
        self.size.size()
    }

    /// Number of in-arcs in the graph, counters included.
    pub fn rev_size(&self) -> i64 {
        self.size.rev_size()
    }

    /// Creates a vertex with a fresh id.
    pub fn create_vertex(&self) -> VertexId {
        let mut table = self.vertices.write();
        let mut id = VertexId(self.next_id.fetch_add(1, Ordering::Relaxed));
        while table.contains_key(&id) {
            id = VertexId(self.next_id.fetch_add(1, Ordering::Relaxed));
        }
        table.insert(id, Arc::new(Vertex::new(id)));
        id
    }

    /// Creates a vertex with a caller-chosen id.
    pub fn create_vertex_with(&self, id: VertexId) -> Result<()> {
        let mut table = self.vertices.write();
        if table.contains_key(&id) {
            return Err(ArcError::InvalidArgument(format!("vertex {id} already exists")));
        }
        table.insert(id, Arc::new(Vertex::new(id)));
        Ok(())
    }

    /// Returns true if `id` names a live vertex.
    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.read().get(&id).is_some_and(|v| !v.is_deleted())
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.read().len()
    }

    /// Live vertex ids in ascending order.
    pub fn vertex_ids(&self) -> Vec<VertexId> {
        let mut ids: Vec<_> = self.vertices.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Handle to a live vertex.
    pub fn vertex(&self, id: VertexId) -> Result<Arc<Vertex>> {
        match self.vertices.read().get(&id) {
            Some(vertex) if !vertex.is_deleted() => Ok(Arc::clone(vertex)),
            _ => Err(ArcError::NotFound(format!("vertex {id}"))),
        }
    }

    /// Handle to a vertex, including one being torn down.
    pub(crate) fn lookup(&self, id: VertexId) -> Result<Arc<Vertex>> {
        self.vertices
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| ArcError::NotFound(format!("vertex {id}")))
    }

    /// Replaces the materialized in-arcs of `id` with a degree counter and
    /// returns the count.
    ///
    /// The neighbors keep their out-arcs. Later connects and disconnects
    /// against the vertex only adjust the count, and in-side removals on it
    /// match nothing.
    pub fn convert_inarcs_to_counter(&self, id: VertexId) -> Result<u64> {
        let vertex = self.vertex(id)?;
        let mut cell = vertex.inc.lock();
        let degree = cell.degree();
        if !matches!(*cell, ArcCell::DegreeCounter(_)) {
            *cell = ArcCell::degree_counter(degree);
            self.ctx().metrics().cell_converted("counter");
            debug!(vertex = %id, degree, "arcvector.graph.inarcs_to_counter");
        }
        Ok(degree)
    }

    /// Disconnects every arc of `id` on both sides, then drops the vertex.
    /// Returns the number of arcs removed.
    ///
    /// Fails with [`ArcError::InvalidState`] if the in-arcs were converted to
    /// a counter, since the tails of those arcs are unknown.
    pub fn remove_vertex(&self, id: VertexId, budget: &mut TimingBudget) -> Result<u64> {
        let vertex = self.vertex(id)?;
        if matches!(*vertex.inc.lock(), ArcCell::DegreeCounter(n) if n > 0) {
            return Err(ArcError::InvalidState("vertex has unmaterialized inarcs"));
        }
        vertex.flags.fetch_or(DELETED, Ordering::AcqRel);
        let result = self
            .remove_arcs_on(&vertex, None, Predicator::wildcard().with_dir(ArcDir::Out), budget)
            .and_then(|out| {
                let probe = Predicator::wildcard().with_dir(ArcDir::In);
                self.remove_arcs_on(&vertex, None, probe, budget).map(|inc| out + inc)
            });
        let removed = match result {
            Ok(removed) => removed,
            Err(err) => {
                vertex.flags.fetch_and(!DELETED, Ordering::AcqRel);
                return Err(err);
            }
        };
        self.vertices.write().remove(&id);
        info!(vertex = %id, removed, "arcvector.graph.vertex_removed");
        Ok(removed)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(ArcVectorOptions::default())
    }
}
