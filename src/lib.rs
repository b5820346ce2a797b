//! Arcvector: per-vertex adjacency storage for a graph engine.
//!
//! Each vertex owns an out-cell and an in-cell ([`ArcCell`]). A cell changes
//! representation as arcs come and go (empty, one inline arc, a neighbor
//! indexed array whose entries may hold multi-relationship chains) and keeps
//! both endpoints of every arc in agreement through [`ArcEvents`].
//! [`Graph`] is an in-memory vertex store built on top of the cells.

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod predicator;
pub mod primitives;
pub mod storage;
pub mod types;

pub use error::{ArcError, Result};
pub use graph::{Graph, Vertex, VerifyReport};
pub use predicator::{
    AccumulatorKind, ArcKey, MatchKind, Modifier, PredValue, Predicator, RelId, ValueCondition,
    TIME_EXPIRES_NEVER,
};
pub use primitives::concurrency::{AccessReason, TimingBudget};
pub use storage::{
    AddOutcome, ArcCell, ArcEvents, ArcList, ArcVectorConfig, ArcVectorOptions, ArcView, CellType,
    HeadSet, PredicatorFilter, VertexList,
};
pub use types::{ArcDir, VertexId};
