//! Arc filters and result collectors used by traversals.

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::error::Result;
use crate::predicator::{MatchKind, Predicator};
use crate::types::VertexId;

/// One arc as seen by a traversal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub struct ArcView {
    /// Vertex owning the scanned cell.
    pub tail: VertexId,
    /// Neighbor.
    pub head: VertexId,
    /// Stored predicator; `dir` is the side it was found on, or
    /// [`ArcDir::Both`](crate::types::ArcDir::Both) for a collapsed pair.
    pub pred: Predicator,
}

/// Decides which arcs a traversal reports.
pub trait ArcFilter {
    /// Returns true to report `arc`. Errors abort the traversal.
    fn check(&self, arc: &ArcView) -> Result<bool>;
}

/// Filter that applies a predicator probe, optionally restricted to neighbors.
#[derive(Clone, Debug)]
pub struct PredicatorFilter {
    probe: Predicator,
    kind: MatchKind,
    heads: Option<FxHashSet<VertexId>>,
}

impl PredicatorFilter {
    /// Filter matching arcs accepted by `probe`.
    pub fn new(probe: Predicator) -> Self {
        Self {
            probe,
            kind: MatchKind::select(&probe),
            heads: None,
        }
    }

    /// Filter accepting every arc.
    pub fn any() -> Self {
        Self::new(Predicator::wildcard())
    }

    /// Restricts the filter to arcs toward one of `heads`.
    pub fn heads(mut self, heads: impl IntoIterator<Item = VertexId>) -> Self {
        self.heads = Some(heads.into_iter().collect());
        self
    }
}

impl ArcFilter for PredicatorFilter {
    fn check(&self, arc: &ArcView) -> Result<bool> {
        if let Some(heads) = &self.heads {
            if !heads.contains(&arc.head) {
                return Ok(false);
            }
        }
        Ok(self.kind.matches(&self.probe, &arc.pred))
    }
}

/// Adapter turning a closure into an [`ArcFilter`].
pub struct FnFilter<F>(pub F);

impl<F> ArcFilter for FnFilter<F>
where
    F: Fn(&ArcView) -> Result<bool>,
{
    fn check(&self, arc: &ArcView) -> Result<bool> {
        (self.0)(arc)
    }
}

/// Whether a traversal continues after a collected arc.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Collect {
    /// Keep scanning.
    Continue,
    /// Stop the scan.
    Stop,
}

/// Receives the arcs accepted by a filter.
pub trait ArcCollector {
    /// Takes one arc.
    fn collect(&mut self, arc: ArcView) -> Collect;
}

/// Collects arcs into a list, optionally up to a limit.
#[derive(Debug, Default)]
pub struct ArcList {
    arcs: Vec<ArcView>,
    limit: Option<usize>,
}

impl ArcList {
    /// Unbounded list.
    pub fn new() -> Self {
        Self::default()
    }

    /// List that stops the scan after `limit` arcs.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            arcs: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Collected arcs in scan order.
    pub fn arcs(&self) -> &[ArcView] {
        &self.arcs
    }

    /// Consumes the list.
    pub fn into_arcs(self) -> Vec<ArcView> {
        self.arcs
    }

    /// Number of collected arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Returns true if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }
}

impl ArcCollector for ArcList {
    fn collect(&mut self, arc: ArcView) -> Collect {
        self.arcs.push(arc);
        match self.limit {
            Some(limit) if self.arcs.len() >= limit => Collect::Stop,
            _ => Collect::Continue,
        }
    }
}

/// Collects distinct neighbors.
#[derive(Debug, Default)]
pub struct VertexList {
    vertices: Vec<VertexId>,
    seen: FxHashSet<VertexId>,
}

impl VertexList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Neighbors in first-seen order.
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    /// Consumes the list.
    pub fn into_vertices(self) -> Vec<VertexId> {
        self.vertices
    }
}

impl ArcCollector for VertexList {
    fn collect(&mut self, arc: ArcView) -> Collect {
        if self.seen.insert(arc.head) {
            self.vertices.push(arc.head);
        }
        Collect::Continue
    }
}

/// Keeps the first accepted arc and stops.
#[derive(Debug, Default)]
pub struct FirstMatch {
    found: Option<ArcView>,
}

impl FirstMatch {
    /// Arc found, if any.
    pub fn found(&self) -> Option<&ArcView> {
        self.found.as_ref()
    }
}

impl ArcCollector for FirstMatch {
    fn collect(&mut self, arc: ArcView) -> Collect {
        self.found = Some(arc);
        Collect::Stop
    }
}
