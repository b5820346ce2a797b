//! Arc storage: per-vertex cells and the collaborators they mutate through.
//!
//! A cell never reaches into another vertex directly. Reverse-side updates go
//! through [`ArcEvents`], counters through [`GraphSize`], and tuning through
//! [`ArcVectorOptions`].

/// Neighbor-indexed arc arrays.
pub mod array;
/// Per-vertex arc cells and their operations.
pub mod cell;
/// Reverse-side collaborators and graph counters.
pub mod events;
/// Traversal filters and collectors.
pub mod filter;
/// Operation metrics.
pub mod metrics;
/// Multi-arc chains.
pub mod multi;
/// Tuning and file configuration.
pub mod options;

pub use array::{ArcArray, ArcEntry};
pub use cell::{
    get_arcs_bidirectional, get_vertices_bidirectional, has_arc_bidirectional, AddOutcome,
    ArcCell, ArcRecord, CellSnapshot, CellType, Expiration, HeadSet, TAG_ARRAY, TAG_DEGREE_COUNTER,
    TAG_MULTIPLE_ARC, TAG_NO_ARCS, TAG_SIMPLE, WORD_END, WORD_TERM,
};
pub use events::{ArcContext, ArcEvents, ArcQuery, ArcSpec, GraphSize, Terminal};
pub use filter::{
    ArcCollector, ArcFilter, ArcList, ArcView, Collect, FirstMatch, FnFilter, PredicatorFilter,
    VertexList,
};
pub use metrics::{default_metrics, ArcMetrics, CounterMetrics, NoopMetrics};
pub use multi::MultiArc;
pub use options::{ArcVectorConfig, ArcVectorOptions, DEFAULT_RETRY_INTERVAL, MULTI_ARC_CAPACITY};
