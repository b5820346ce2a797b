use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::warn;

use crate::error::{ArcError, Result};
use crate::storage::ArcCell;
use crate::types::{ArcDir, VertexId};

use super::Graph;

/// Totals gathered by [`Graph::verify`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Vertices checked.
    pub vertices: usize,
    /// Sum of out-degrees.
    pub out_arcs: u64,
    /// Sum of in-degrees, counters included.
    pub in_arcs: u64,
    /// In-cells kept as degree counters.
    pub counters: usize,
}

impl Graph {
    /// Checks the whole graph: minimal representation of every cell, the
    /// has-arcs flags, a matching reverse arc for every materialized arc, and
    /// the graph counters against the summed degrees.
    ///
    /// Cells are copied one vertex at a time, so the result is only meaningful
    /// while no mutation is running.
    pub fn verify(&self) -> Result<VerifyReport> {
        let result = self.verify_inner();
        if let Err(err) = &result {
            warn!(error = %err, "arcvector.graph.verify_failed");
        }
        result
    }

    fn verify_inner(&self) -> Result<VerifyReport> {
        let vertices: Vec<_> = self.vertices.read().values().cloned().collect();
        let mut cells: FxHashMap<VertexId, (ArcCell, ArcCell)> = FxHashMap::default();
        for vertex in &vertices {
            let out = vertex.out.lock().clone();
            let inc = vertex.inc.lock().clone();
            if vertex.has_outarcs() != (out.degree() > 0)
                || vertex.has_inarcs() != (inc.degree() > 0)
            {
                return Err(ArcError::InvalidState("has-arcs flag out of sync"));
            }
            cells.insert(vertex.id, (out, inc));
        }

        let mut report = VerifyReport {
            vertices: cells.len(),
            ..VerifyReport::default()
        };
        for (id, (out, inc)) in &cells {
            out.check_invariants()?;
            inc.check_invariants()?;
            report.out_arcs += out.degree();
            report.in_arcs += inc.degree();
            if matches!(inc, ArcCell::DegreeCounter(_)) {
                report.counters += 1;
            }
            check_reverse(&cells, *id, out, ArcDir::Out)?;
            check_reverse(&cells, *id, inc, ArcDir::In)?;
        }

        if report.out_arcs != report.in_arcs {
            return Err(ArcError::Asymmetric {
                op: "verify",
                forward: report.out_arcs,
                reverse: report.in_arcs,
            });
        }
        if self.size() != report.out_arcs as i64 || self.rev_size() != report.in_arcs as i64 {
            return Err(ArcError::InvalidState("graph size counters out of sync"));
        }
        Ok(report)
    }
}

fn check_reverse(
    cells: &FxHashMap<VertexId, (ArcCell, ArcCell)>,
    id: VertexId,
    cell: &ArcCell,
    side: ArcDir,
) -> Result<()> {
    let mut missing = None;
    cell.for_each_arc(|head, pred| {
        if missing.is_some() {
            return;
        }
        let far = match cells.get(&head) {
            Some((out, inc)) => match side {
                ArcDir::Out => inc,
                _ => out,
            },
            None => {
                missing = Some(format!("{id} has an arc toward missing vertex {head}"));
                return;
            }
        };
        if matches!(far, ArcCell::DegreeCounter(_)) {
            return;
        }
        let mirrored = far
            .arcs_toward(id)
            .iter()
            .any(|p| p.key() == pred.key() && p.same_data(pred) && p.dir == side.reverse());
        if !mirrored {
            missing = Some(format!("{side} arc {id}->{head} {pred} has no reverse"));
        }
    });
    match missing {
        Some(msg) => Err(ArcError::Corruption(msg)),
        None => Ok(()),
    }
}
