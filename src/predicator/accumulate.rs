use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Modifier, PredValue};

/// Combines the stored value of an existing arc with the value of a repeated add.
///
/// Invoked only for modifiers of the accumulating class. The modifier is passed
/// so a policy can treat counters and aggregates differently.
pub trait AccumulatorPolicy: Send + Sync + fmt::Debug {
    /// Returns the value to store.
    fn combine(&self, modifier: Modifier, previous: PredValue, incoming: PredValue) -> PredValue;
}

/// Adds the incoming value. Integer results saturate into the range of the
/// modifier: signed for [`Modifier::Integer`], unsigned otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct SaturatingSum;

impl AccumulatorPolicy for SaturatingSum {
    fn combine(&self, modifier: Modifier, previous: PredValue, incoming: PredValue) -> PredValue {
        if modifier.is_float() {
            return PredValue::float(previous.as_float() + incoming.as_float());
        }
        if modifier == Modifier::Integer {
            return PredValue::int(previous.as_int().saturating_add(incoming.as_int()));
        }
        let sum = previous.as_uint() as i64 + incoming.as_int() as i64;
        PredValue::uint(sum.clamp(0, u32::MAX as i64) as u32)
    }
}

/// Overwrites the stored value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Replace;

impl AccumulatorPolicy for Replace {
    fn combine(&self, _modifier: Modifier, _previous: PredValue, incoming: PredValue) -> PredValue {
        incoming
    }
}

/// Keeps the larger of the two values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Max;

impl AccumulatorPolicy for Max {
    fn combine(&self, modifier: Modifier, previous: PredValue, incoming: PredValue) -> PredValue {
        if modifier.is_float() {
            PredValue::float(previous.as_float().max(incoming.as_float()))
        } else {
            PredValue::uint(previous.as_uint().max(incoming.as_uint()))
        }
    }
}

/// Named accumulator policy, as written in configuration files.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorKind {
    /// [`SaturatingSum`].
    #[default]
    SaturatingSum,
    /// [`Replace`].
    Replace,
    /// [`Max`].
    Max,
}

impl AccumulatorKind {
    /// Instantiates the policy.
    pub fn policy(self) -> Arc<dyn AccumulatorPolicy> {
        match self {
            AccumulatorKind::SaturatingSum => Arc::new(SaturatingSum),
            AccumulatorKind::Replace => Arc::new(Replace),
            AccumulatorKind::Max => Arc::new(Max),
        }
    }
}
