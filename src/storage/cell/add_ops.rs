use tracing::{debug, trace};

use crate::error::{ArcError, Result};
use crate::predicator::{ArcKey, PredValue, Predicator, RelId};
use crate::storage::array::{ArcArray, ArcEntry};
use crate::storage::events::{ArcContext, ArcEvents, ArcSpec};
use crate::types::VertexId;

use super::ArcCell;

/// What [`ArcCell::add`] did.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AddOutcome {
    /// A new logical arc was stored.
    Inserted,
    /// The key already existed; its value was refreshed or accumulated.
    Updated,
    /// The arc names no relationship and was ignored.
    Rejected,
}

impl AddOutcome {
    /// Change in degree caused by the add.
    pub fn delta(self) -> u64 {
        match self {
            AddOutcome::Inserted => 1,
            AddOutcome::Updated | AddOutcome::Rejected => 0,
        }
    }
}

impl ArcCell {
    /// Adds `arc` to this cell, which must be the cell of `arc.tail` selected
    /// by `arc.pred.dir`.
    ///
    /// The reverse side is installed through `events` before the forward side
    /// is committed, so a failed connect leaves this cell untouched. Adding an
    /// existing key reports [`AddOutcome::Updated`] and mirrors the value
    /// change on the reverse side with an expected count of zero.
    pub fn add(
        &mut self,
        ctx: &ArcContext<'_>,
        arc: &ArcSpec,
        events: &mut dyn ArcEvents,
    ) -> Result<AddOutcome> {
        if arc.pred.rel.is_wildcard() {
            debug!(tail = %arc.tail, head = %arc.head, "arcvector.add.no_relationship");
            return Ok(AddOutcome::Rejected);
        }
        if arc.pred.rel.0 > RelId::MAX.0 {
            return Err(ArcError::InvalidArgument(format!(
                "relationship {:#06x} exceeds {:#06x}",
                arc.pred.rel.0,
                RelId::MAX.0
            )));
        }
        let side = arc.pred.dir;
        if !side.is_cell_side() {
            return Err(ArcError::InvalidArgument(format!(
                "arc direction {side} does not select a cell"
            )));
        }
        if arc.pred.modifier.is_wildcard() {
            return Err(ArcError::InvalidArgument(
                "wildcard modifier cannot be stored".into(),
            ));
        }
        if let ArcCell::DegreeCounter(_) = self {
            let err = ArcError::InvalidState("add on degree-counter cell");
            return Err(self.fail(ctx, "add", arc.tail, err));
        }

        let stored = arc.pred.stored(side);
        let key = stored.key();
        let existing = self.find(arc.head, key);
        let expected = match existing {
            Some(_) => 0,
            None => {
                let capacity = ctx.options.multi_arc_capacity;
                if self.degree_toward(arc.head) as usize >= capacity {
                    return Err(self.fail(ctx, "add", arc.tail, ArcError::Capacity { capacity }));
                }
                1
            }
        };

        let forward = ArcSpec { pred: stored, ..*arc };
        let connected = events.connect(&forward, expected)?;
        if connected != expected {
            let err = ArcError::Asymmetric {
                op: "connect",
                forward: expected,
                reverse: connected,
            };
            return Err(self.fail(ctx, "add", arc.tail, err));
        }

        match existing {
            Some(previous) => {
                let value = if stored.modifier.is_accumulating() {
                    ctx.options
                        .accumulator
                        .combine(stored.modifier, previous.value, stored.value)
                } else {
                    stored.value
                };
                self.set_value(arc.head, key, value);
                ctx.metrics().arc_updated(side.as_str());
                trace!(tail = %arc.tail, head = %arc.head, pred = %stored, "arcvector.add.updated");
                Ok(AddOutcome::Updated)
            }
            None => {
                let was_empty = self.has_no_arc();
                self.insert_new(ctx, arc.head, stored)
                    .map_err(|err| self.fail(ctx, "add", arc.tail, err))?;
                if was_empty {
                    events.set_has_arcs(side, true);
                }
                ctx.size.inc(side, 1);
                ctx.metrics().arc_added(side.as_str());
                Ok(AddOutcome::Inserted)
            }
        }
    }

    fn find(&self, head: VertexId, key: ArcKey) -> Option<Predicator> {
        match self {
            ArcCell::Simple { head: h, pred } if *h == head && pred.key() == key => Some(*pred),
            ArcCell::Array(array) => array.lookup(head).and_then(|e| e.get(key)).copied(),
            _ => None,
        }
    }

    fn set_value(&mut self, head: VertexId, key: ArcKey, value: PredValue) {
        let slot = match self {
            ArcCell::Simple { head: h, pred } if *h == head && pred.key() == key => Some(pred),
            ArcCell::Array(array) => array.get_mut(head, key),
            _ => None,
        };
        if let Some(pred) = slot {
            pred.value = value;
        }
    }

    fn insert_new(&mut self, ctx: &ArcContext<'_>, head: VertexId, pred: Predicator) -> Result<()> {
        let capacity = ctx.options.multi_arc_capacity;
        match std::mem::take(self) {
            ArcCell::Empty => {
                *self = ArcCell::Simple { head, pred };
                ctx.metrics().cell_converted("simple");
            }
            ArcCell::Simple {
                head: first_head,
                pred: first,
            } => {
                let mut array = ArcArray::default();
                array.insert(first_head, ArcEntry::Simple(first));
                array.push(head, pred, capacity)?;
                *self = ArcCell::Array(Box::new(array));
                ctx.metrics().cell_converted("array");
            }
            ArcCell::Array(mut array) => {
                let pushed = array.push(head, pred, capacity);
                *self = ArcCell::Array(array);
                pushed?;
            }
            ArcCell::DegreeCounter(count) => {
                *self = ArcCell::DegreeCounter(count);
                return Err(ArcError::InvalidState("add on degree-counter cell"));
            }
        }
        Ok(())
    }
}
