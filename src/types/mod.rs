//! Identifier and direction types shared by every layer of the arc engine.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod checksum;

/// Stable identity of a vertex as seen by its arc cells.
///
/// Cells hold weak references only: the vertex lifetime is managed by the
/// owning store, which must clear arcs referencing a vertex before dropping it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct VertexId(pub u64);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for VertexId {
    fn from(value: u64) -> Self {
        VertexId(value)
    }
}

impl From<VertexId> for u64 {
    fn from(value: VertexId) -> Self {
        value.0
    }
}

/// Arc direction, encoded in two bits of a predicator word.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ArcDir {
    /// Direction unspecified; only meaningful in probes.
    #[default]
    Any,
    /// Arc stored in the inarcs cell of its owner.
    In,
    /// Arc stored in the outarcs cell of its owner.
    Out,
    /// Collapsed bidirectional arc, produced by bidirectional collection.
    Both,
}

impl ArcDir {
    /// Two-bit encoding used in the predicator word.
    pub const fn bits(self) -> u64 {
        match self {
            ArcDir::Any => 0,
            ArcDir::In => 1,
            ArcDir::Out => 2,
            ArcDir::Both => 3,
        }
    }

    /// Decodes the two low bits of `bits`.
    pub const fn from_bits(bits: u64) -> Self {
        match bits & 0x3 {
            1 => ArcDir::In,
            2 => ArcDir::Out,
            3 => ArcDir::Both,
            _ => ArcDir::Any,
        }
    }

    /// Direction as seen from the other endpoint.
    pub const fn reverse(self) -> Self {
        match self {
            ArcDir::In => ArcDir::Out,
            ArcDir::Out => ArcDir::In,
            other => other,
        }
    }

    /// Short label used by metrics and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            ArcDir::Any => "any",
            ArcDir::In => "in",
            ArcDir::Out => "out",
            ArcDir::Both => "both",
        }
    }

    /// Returns true if this is one of the two cell-selecting directions.
    pub const fn is_cell_side(self) -> bool {
        matches!(self, ArcDir::In | ArcDir::Out)
    }
}

impl fmt::Display for ArcDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
