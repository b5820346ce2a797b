use std::thread;

use tracing::{debug, warn};

use crate::error::{ArcError, Result};
use crate::predicator::{MatchKind, Predicator};
use crate::primitives::concurrency::{AccessReason, TimingBudget};
use crate::storage::array::ArcArray;
use crate::storage::events::{ArcContext, ArcEvents, ArcQuery};
use crate::types::{ArcDir, VertexId};

use super::{ArcCell, CellType};

impl ArcCell {
    /// Removes the arcs of this cell matching `query` and returns how many
    /// were removed.
    ///
    /// With a concrete head only the arcs toward that neighbor are examined.
    /// With `head == None` every neighbor is visited; neighbors whose reverse
    /// side is busy are retried until `budget` runs out, after which the call
    /// fails with [`ArcError::Timeout`] carrying the number of arcs that were
    /// removed before giving up. Counters are settled in both cases.
    pub fn remove(
        &mut self,
        ctx: &ArcContext<'_>,
        query: &ArcQuery,
        budget: &mut TimingBudget,
        events: &mut dyn ArcEvents,
    ) -> Result<u64> {
        let side = query.pred.dir;
        if !side.is_cell_side() {
            return Err(ArcError::InvalidArgument(format!(
                "probe direction {side} does not select a cell"
            )));
        }
        budget.start();
        let kind = MatchKind::select(&query.pred);
        let mut removed = 0;
        let outcome = match (self.cell_type(), query.head) {
            (CellType::Simple, _) => self.remove_simple(query, kind, budget, events, &mut removed),
            (CellType::Array, Some(head)) => {
                self.remove_toward(ctx, query, head, kind, budget, events, &mut removed)
            }
            (CellType::Array, None) => {
                self.remove_all(ctx, query, kind, budget, events, &mut removed)
            }
            _ => Ok(()),
        };
        self.settle_removal(ctx, side, query.tail, removed, events)?;
        match outcome {
            Ok(()) => Ok(removed),
            Err(ArcError::Timeout { reason, .. }) => {
                budget.halt(reason, None);
                Err(ArcError::Timeout { reason, removed })
            }
            Err(err) => Err(self.fail(ctx, "remove", query.tail, err)),
        }
    }

    fn remove_simple(
        &mut self,
        query: &ArcQuery,
        kind: MatchKind,
        budget: &mut TimingBudget,
        events: &mut dyn ArcEvents,
        removed: &mut u64,
    ) -> Result<()> {
        let ArcCell::Simple { head, pred } = *self else {
            return Ok(());
        };
        if query.head.is_some_and(|h| h != head) || !kind.matches(&query.pred, &pred) {
            return Ok(());
        }
        let reverse = ArcQuery::new(query.tail, Some(head), query.pred);
        let n = events.disconnect(&reverse, 1, budget)?;
        if n != 1 {
            return Err(ArcError::Asymmetric {
                op: "disconnect",
                forward: 1,
                reverse: n,
            });
        }
        *self = ArcCell::Empty;
        *removed += 1;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn remove_toward(
        &mut self,
        ctx: &ArcContext<'_>,
        query: &ArcQuery,
        head: VertexId,
        kind: MatchKind,
        budget: &mut TimingBudget,
        events: &mut dyn ArcEvents,
        removed: &mut u64,
    ) -> Result<()> {
        if let ArcCell::Array(array) = self {
            *removed +=
                remove_in_array(array, query.tail, head, &query.pred, kind, budget, events)?;
        }
        self.compact(ctx);
        Ok(())
    }

    fn remove_all(
        &mut self,
        ctx: &ArcContext<'_>,
        query: &ArcQuery,
        kind: MatchKind,
        budget: &mut TimingBudget,
        events: &mut dyn ArcEvents,
        removed: &mut u64,
    ) -> Result<()> {
        let mut outcome = Ok(());
        if let ArcCell::Array(array) = self {
            let mut pending = array.heads();
            'passes: loop {
                let mut busy = Vec::new();
                for head in pending {
                    let mut attempt = TimingBudget::zero();
                    let (tail, pred) = (query.tail, &query.pred);
                    match remove_in_array(array, tail, head, pred, kind, &mut attempt, events) {
                        Ok(n) => *removed += n,
                        Err(err) if err.is_transient() => busy.push(head),
                        Err(err) => {
                            outcome = Err(err);
                            break 'passes;
                        }
                    }
                }
                if busy.is_empty() {
                    break;
                }
                ctx.metrics().removal_retry();
                if budget.is_zero() || budget.is_expired() {
                    let reason = if budget.is_zero() {
                        AccessReason::Locked
                    } else {
                        AccessReason::Timeout
                    };
                    budget.halt(reason, busy.first().copied());
                    warn!(
                        vertex = %query.tail,
                        pending = busy.len(),
                        removed = *removed,
                        %reason,
                        "arcvector.remove.halted"
                    );
                    outcome = Err(ArcError::timeout(reason));
                    break;
                }
                debug!(vertex = %query.tail, pending = busy.len(), "arcvector.remove.pending");
                let pause = budget
                    .remaining()
                    .map_or(ctx.options.retry_interval, |left| {
                        left.min(ctx.options.retry_interval)
                    });
                thread::sleep(pause);
                pending = busy;
            }
        }
        self.compact(ctx);
        outcome
    }

    pub(super) fn settle_removal(
        &self,
        ctx: &ArcContext<'_>,
        side: ArcDir,
        owner: VertexId,
        removed: u64,
        events: &mut dyn ArcEvents,
    ) -> Result<()> {
        if removed == 0 {
            return Ok(());
        }
        ctx.size
            .sub(side, removed)
            .map_err(|err| self.fail(ctx, "remove", owner, err))?;
        ctx.metrics().arcs_removed(side.as_str(), removed);
        if self.has_no_arc() {
            events.set_has_arcs(side, false);
        }
        Ok(())
    }
}

/// Removes the arcs toward `head` matching `probe`, reverse side first.
pub(super) fn remove_in_array(
    array: &mut ArcArray,
    tail: VertexId,
    head: VertexId,
    probe: &Predicator,
    kind: MatchKind,
    budget: &mut TimingBudget,
    events: &mut dyn ArcEvents,
) -> Result<u64> {
    let matched = array
        .lookup(head)
        .map_or(0, |entry| entry.count_matching(probe, kind));
    if matched == 0 {
        return Ok(0);
    }
    let reverse = ArcQuery::new(tail, Some(head), *probe);
    let n = events.disconnect(&reverse, matched, budget)?;
    if n != matched {
        return Err(ArcError::Asymmetric {
            op: "disconnect",
            forward: matched,
            reverse: n,
        });
    }
    Ok(array.remove_matching(head, probe, kind))
}
