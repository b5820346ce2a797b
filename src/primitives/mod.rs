//! Low-level primitives shared by the arc engine.

/// Timing budgets and budget-bounded lock acquisition.
///
/// Governs how long an operation may block on the far endpoint of an arc.
pub mod concurrency;
