//! The per-vertex arc cell.
//!
//! Every vertex owns two cells, one for out-arcs and one for in-arcs. A cell
//! always uses the smallest representation for its content:
//!
//! | arcs                   | variant                 |
//! |------------------------|-------------------------|
//! | 0                      | [`ArcCell::Empty`]      |
//! | 1                      | [`ArcCell::Simple`]     |
//! | 2 or more              | [`ArcCell::Array`]      |
//! | reverse side not kept  | [`ArcCell::DegreeCounter`] |
//!
//! Inside an array, an entry toward a neighbor is a single predicator or a
//! multi-arc chain of two or more. Mutations are applied by the thread holding
//! the owner's write lock; the far endpoint is reached through
//! [`ArcEvents`](super::events::ArcEvents).

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ArcError;
use crate::predicator::Predicator;
use crate::types::VertexId;

use super::array::{ArcArray, ArcEntry};
use super::events::ArcContext;

mod add_ops;
mod expire_ops;
mod remove_ops;
mod ser;
mod traverse_ops;


pub use add_ops::AddOutcome;
pub use expire_ops::Expiration;
pub use ser::{
    ArcRecord, CellSnapshot, TAG_ARRAY, TAG_DEGREE_COUNTER, TAG_MULTIPLE_ARC, TAG_NO_ARCS,
    TAG_SIMPLE, WORD_END, WORD_TERM,
};
pub use traverse_ops::{
    get_arcs_bidirectional, get_vertices_bidirectional, has_arc_bidirectional, HeadSet,
};

/// Representation of a cell.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    /// No arcs.
    NoArcs,
    /// One inline arc.
    Simple,
    /// Hash-indexed arcs.
    Array,
    /// Count of unmaterialized reverse arcs.
    DegreeCounterOnly,
}

/// Arcs held by one side of one vertex.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ArcCell {
    /// No arcs.
    #[default]
    Empty,
    /// Exactly one arc.
    Simple {
        /// Neighbor.
        head: VertexId,
        /// Arc payload.
        pred: Predicator,
    },
    /// Two or more arcs.
    Array(Box<ArcArray>),
    /// Count of reverse arcs whose individual entries are not kept.
    DegreeCounter(u64),
}

impl ArcCell {
    /// Cell holding only a degree count.
    pub fn degree_counter(count: u64) -> Self {
        ArcCell::DegreeCounter(count)
    }

    /// Representation of the cell.
    pub fn cell_type(&self) -> CellType {
        match self {
            ArcCell::Empty => CellType::NoArcs,
            ArcCell::Simple { .. } => CellType::Simple,
            ArcCell::Array(_) => CellType::Array,
            ArcCell::DegreeCounter(_) => CellType::DegreeCounterOnly,
        }
    }

    /// Number of logical arcs.
    pub fn degree(&self) -> u64 {
        match self {
            ArcCell::Empty => 0,
            ArcCell::Simple { .. } => 1,
            ArcCell::Array(array) => array.degree(),
            ArcCell::DegreeCounter(count) => *count,
        }
    }

    /// Returns true if the cell holds no arcs.
    pub fn has_no_arc(&self) -> bool {
        matches!(self, ArcCell::Empty)
    }

    /// Drops all content without touching the far side. Used by vertex teardown
    /// after the arcs have been disconnected.
    pub fn set_no_arc(&mut self) {
        *self = ArcCell::Empty;
    }

    /// Entry toward `head`, for array cells.
    pub fn entry(&self, head: VertexId) -> Option<&ArcEntry> {
        match self {
            ArcCell::Array(array) => array.lookup(head),
            _ => None,
        }
    }

    /// Number of arcs toward `head`.
    pub fn degree_toward(&self, head: VertexId) -> u64 {
        match self {
            ArcCell::Simple { head: h, .. } if *h == head => 1,
            ArcCell::Array(array) => array.lookup(head).map_or(0, ArcEntry::degree),
            _ => 0,
        }
    }

    /// Visits every materialized arc; multi-arc chains are flattened.
    pub fn for_each_arc(&self, mut visit: impl FnMut(VertexId, &Predicator)) {
        match self {
            ArcCell::Simple { head, pred } => visit(*head, pred),
            ArcCell::Array(array) => {
                for (head, entry) in array.iter() {
                    for pred in entry.predicators() {
                        visit(head, pred);
                    }
                }
            }
            ArcCell::Empty | ArcCell::DegreeCounter(_) => {}
        }
    }

    /// Checks the minimal-representation invariant and the tracked degree.
    pub fn check_invariants(&self) -> Result<(), ArcError> {
        let ArcCell::Array(array) = self else {
            return Ok(());
        };
        if array.degree() != array.recount() {
            return Err(ArcError::InvalidState("array degree out of sync"));
        }
        if array.degree() < 2 {
            return Err(ArcError::InvalidState("array with fewer than two arcs"));
        }
        for (_, entry) in array.iter() {
            if let ArcEntry::Multi(multi) = entry {
                if multi.len() < 2 {
                    return Err(ArcError::InvalidState("multi-arc with fewer than two arcs"));
                }
                let mut keys: Vec<_> = multi
                    .as_slice()
                    .iter()
                    .map(|p| (p.rel, p.modifier.code()))
                    .collect();
                keys.sort_unstable();
                keys.dedup();
                if keys.len() != multi.len() {
                    return Err(ArcError::InvalidState("duplicate key in multi-arc"));
                }
            }
        }
        Ok(())
    }

    /// Collapses an array that has dropped below two arcs.
    fn compact(&mut self, ctx: &ArcContext<'_>) {
        let collapsed = match &*self {
            ArcCell::Array(array) => match array.degree() {
                0 => Some(ArcCell::Empty),
                1 => array
                    .sole_arc()
                    .map(|(head, pred)| ArcCell::Simple { head, pred }),
                _ => None,
            },
            _ => None,
        };
        if let Some(cell) = collapsed {
            ctx.metrics().cell_converted(match cell {
                ArcCell::Empty => "empty",
                _ => "simple",
            });
            *self = cell;
        }
    }

    /// Logs a diagnostic dump of the cell for a fatal error and passes the error on.
    fn fail(
        &self,
        ctx: &ArcContext<'_>,
        op: &'static str,
        owner: VertexId,
        err: ArcError,
    ) -> ArcError {
        if err.is_fatal() && ctx.options.dump_on_error {
            error!(
                op,
                vertex = %owner,
                cell = ?self.cell_type(),
                degree = self.degree(),
                dump = %self.debug_dump(),
                error = %err,
                "arcvector.cell.fatal"
            );
        }
        err
    }
}
