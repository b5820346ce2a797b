use smallvec::SmallVec;
use tracing::trace;

use crate::error::{ArcError, Result};
use crate::predicator::{MatchKind, Predicator, TIME_EXPIRES_NEVER};
use crate::primitives::concurrency::TimingBudget;
use crate::storage::events::{ArcContext, ArcEvents, ArcQuery};
use crate::types::{ArcDir, VertexId};

use super::remove_ops::remove_in_array;
use super::{ArcCell, CellType};

/// Result of one expiration sweep over a cell.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Expiration {
    /// Arcs removed by the sweep.
    pub expired: u64,
    /// Earliest deadline among the surviving expiring arcs, or
    /// [`TIME_EXPIRES_NEVER`]. Equal to the sweep time when an expired arc
    /// could not be removed and the sweep should run again.
    pub next_deadline: u32,
}

impl Expiration {
    /// Returns true if a later sweep is needed.
    pub fn has_pending(&self) -> bool {
        self.next_deadline < TIME_EXPIRES_NEVER
    }
}

/// Probe addressing exactly the stored arc `pred` on `side`.
fn key_probe(pred: &Predicator, side: ArcDir) -> Predicator {
    Predicator::new(pred.rel, pred.modifier, pred.value).with_dir(side)
}

impl ArcCell {
    /// Removes every arc whose expiration deadline is at or before `now`.
    ///
    /// Each removal tries the reverse side once without waiting. An arc whose
    /// neighbor is busy stays in place and `now` is reported as the next
    /// deadline so the caller retries it.
    pub fn expire(
        &mut self,
        ctx: &ArcContext<'_>,
        tail: VertexId,
        side: ArcDir,
        now: u32,
        events: &mut dyn ArcEvents,
    ) -> Result<Expiration> {
        let mut sweep = Expiration {
            expired: 0,
            next_deadline: TIME_EXPIRES_NEVER,
        };
        let outcome = match self.cell_type() {
            CellType::Simple => self.expire_simple(tail, side, now, events, &mut sweep),
            CellType::Array => self.expire_array(ctx, tail, side, now, events, &mut sweep),
            _ => Ok(()),
        };
        self.settle_removal(ctx, side, tail, sweep.expired, events)?;
        if sweep.expired > 0 {
            ctx.metrics().arcs_expired(sweep.expired);
            trace!(
                vertex = %tail,
                expired = sweep.expired,
                next = sweep.next_deadline,
                "arcvector.expire.swept"
            );
        }
        outcome.map_err(|err| self.fail(ctx, "expire", tail, err))?;
        Ok(sweep)
    }

    fn expire_simple(
        &mut self,
        tail: VertexId,
        side: ArcDir,
        now: u32,
        events: &mut dyn ArcEvents,
        sweep: &mut Expiration,
    ) -> Result<()> {
        let ArcCell::Simple { head, pred } = *self else {
            return Ok(());
        };
        let Some(tmx) = pred.expires_at() else {
            return Ok(());
        };
        if tmx > now {
            sweep.next_deadline = sweep.next_deadline.min(tmx);
            return Ok(());
        }
        let query = ArcQuery::new(tail, Some(head), key_probe(&pred, side));
        let mut attempt = TimingBudget::zero();
        match events.disconnect(&query, 1, &mut attempt) {
            Ok(1) => {
                *self = ArcCell::Empty;
                sweep.expired += 1;
                Ok(())
            }
            Ok(n) => Err(ArcError::Asymmetric {
                op: "disconnect",
                forward: 1,
                reverse: n,
            }),
            Err(err) if err.is_transient() => {
                sweep.next_deadline = sweep.next_deadline.min(now);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn expire_array(
        &mut self,
        ctx: &ArcContext<'_>,
        tail: VertexId,
        side: ArcDir,
        now: u32,
        events: &mut dyn ArcEvents,
        sweep: &mut Expiration,
    ) -> Result<()> {
        let mut outcome = Ok(());
        if let ArcCell::Array(array) = self {
            'heads: for head in array.heads() {
                let mut doomed: SmallVec<[Predicator; 4]> = SmallVec::new();
                if let Some(entry) = array.lookup(head) {
                    for pred in entry.predicators() {
                        match pred.expires_at() {
                            Some(tmx) if tmx <= now => doomed.push(*pred),
                            Some(tmx) => sweep.next_deadline = sweep.next_deadline.min(tmx),
                            None => {}
                        }
                    }
                }
                for pred in doomed {
                    let probe = key_probe(&pred, side);
                    let mut attempt = TimingBudget::zero();
                    let key = MatchKind::Key;
                    match remove_in_array(array, tail, head, &probe, key, &mut attempt, events) {
                        Ok(n) => sweep.expired += n,
                        Err(err) if err.is_transient() => {
                            sweep.next_deadline = sweep.next_deadline.min(now);
                        }
                        Err(err) => {
                            outcome = Err(err);
                            break 'heads;
                        }
                    }
                }
            }
        }
        self.compact(ctx);
        outcome
    }
}
