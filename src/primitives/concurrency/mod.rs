//! Timing budgets and budget-bounded lock acquisition.
//!
//! A [`TimingBudget`] travels by mutable reference through every operation
//! that may wait on the far endpoint of an arc. The budget records when the
//! first wait started, how long the caller is willing to block in total, and
//! why the operation halted if it did.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ArcError, Result};
use crate::types::VertexId;

/// Why a budgeted operation stopped early.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum AccessReason {
    /// The operation has not halted.
    #[default]
    None,
    /// A non-blocking attempt found the resource locked.
    Locked,
    /// The caller's deadline passed while waiting.
    Timeout,
    /// A structural arc error aborted the operation.
    ArcError,
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessReason::None => "none",
            AccessReason::Locked => "locked",
            AccessReason::Timeout => "timeout",
            AccessReason::ArcError => "arc error",
        })
    }
}

/// Deadline and status carried through a budgeted operation.
#[derive(Clone, Debug)]
pub struct TimingBudget {
    timeout: Option<Duration>,
    started: Option<Instant>,
    reason: AccessReason,
    blocked_on: Option<VertexId>,
}

impl TimingBudget {
    /// Budget that never times out.
    pub fn infinite() -> Self {
        Self {
            timeout: None,
            started: None,
            reason: AccessReason::None,
            blocked_on: None,
        }
    }

    /// Non-blocking budget: any contention halts immediately.
    pub fn zero() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Budget allowing up to `timeout` of blocking in total.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::infinite()
        }
    }

    /// Budget allowing up to `ms` milliseconds of blocking.
    pub fn millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Starts the clock if it is not already running.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Returns true for a non-blocking budget.
    pub fn is_zero(&self) -> bool {
        self.timeout == Some(Duration::ZERO)
    }

    /// Returns true for a budget without deadline.
    pub fn is_infinite(&self) -> bool {
        self.timeout.is_none()
    }

    /// Time left before the deadline, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        let timeout = self.timeout?;
        let elapsed = self.started.map(|t0| t0.elapsed()).unwrap_or_default();
        Some(timeout.saturating_sub(elapsed))
    }

    /// Returns true once the deadline has passed. Unbounded budgets never expire.
    pub fn is_expired(&self) -> bool {
        match self.remaining() {
            Some(left) => left.is_zero(),
            None => false,
        }
    }

    /// Records why the operation halted.
    pub fn halt(&mut self, reason: AccessReason, blocked_on: Option<VertexId>) {
        self.reason = reason;
        if blocked_on.is_some() {
            self.blocked_on = blocked_on;
        }
    }

    /// Returns true if a halt reason has been recorded.
    pub fn is_halted(&self) -> bool {
        self.reason != AccessReason::None
    }

    /// Reason recorded by the last halt.
    pub fn reason(&self) -> AccessReason {
        self.reason
    }

    /// Vertex that blocked the operation, if known.
    pub fn blocked_on(&self) -> Option<VertexId> {
        self.blocked_on
    }

    /// Clears the halt state and restarts the clock.
    pub fn reset(&mut self) {
        self.reason = AccessReason::None;
        self.blocked_on = None;
        self.started = None;
    }
}

impl Default for TimingBudget {
    fn default() -> Self {
        Self::infinite()
    }
}

/// Acquires `mutex` within what is left of `budget`.
///
/// On failure the budget is halted with [`AccessReason::Locked`] for a
/// non-blocking budget or [`AccessReason::Timeout`] otherwise, and a transient
/// [`ArcError::Timeout`] is returned.
pub fn lock_within<'a, T>(
    mutex: &'a Mutex<T>,
    budget: &mut TimingBudget,
    owner: VertexId,
) -> Result<MutexGuard<'a, T>> {
    budget.start();
    let guard = match budget.remaining() {
        None => Some(mutex.lock()),
        Some(left) if left.is_zero() => mutex.try_lock(),
        Some(left) => mutex.try_lock_for(left),
    };
    match guard {
        Some(guard) => Ok(guard),
        None => {
            let reason = if budget.is_zero() {
                AccessReason::Locked
            } else {
                AccessReason::Timeout
            };
            trace!(vertex = %owner, %reason, "arcvector.lock.busy");
            budget.halt(reason, Some(owner));
            Err(ArcError::timeout(reason))
        }
    }
}
