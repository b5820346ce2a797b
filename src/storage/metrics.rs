use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking arc cell operations.
///
/// Implementations collect statistics about inserts, removals, expirations,
/// representation changes and scans. Hooks are called after the cell has
/// been mutated, never while a reverse-side lock is being acquired.
pub trait ArcMetrics: Send + Sync {
    /// Records a new logical arc.
    ///
    /// # Parameters
    /// * `side` - "out" or "in".
    fn arc_added(&self, side: &'static str);

    /// Records a re-add of an existing arc (value refresh or accumulation).
    fn arc_updated(&self, side: &'static str);

    /// Records `count` arcs removed from one cell.
    fn arcs_removed(&self, side: &'static str, count: u64);

    /// Records `count` arcs dropped by expiration.
    fn arcs_expired(&self, count: u64);

    /// Records a change of cell representation.
    ///
    /// # Parameters
    /// * `to` - "simple", "array", "empty" or "counter".
    fn cell_converted(&self, to: &'static str);

    /// Records a traversal over a cell.
    fn scan(&self, kind: &'static str);

    /// Records a mass-removal pass deferred by reverse-side contention.
    fn removal_retry(&self);
}

/// A no-op implementation of [`ArcMetrics`].
#[derive(Default)]
pub struct NoopMetrics;

impl ArcMetrics for NoopMetrics {
    fn arc_added(&self, _side: &'static str) {}
    fn arc_updated(&self, _side: &'static str) {}
    fn arcs_removed(&self, _side: &'static str, _count: u64) {}
    fn arcs_expired(&self, _count: u64) {}
    fn cell_converted(&self, _to: &'static str) {}
    fn scan(&self, _kind: &'static str) {}
    fn removal_retry(&self) {}
}

/// Thread-safe counter-based implementation of [`ArcMetrics`].
#[derive(Default, Debug)]
pub struct CounterMetrics {
    /// Out-arcs inserted.
    pub out_added: AtomicU64,
    /// In-arcs inserted.
    pub in_added: AtomicU64,
    /// Existing arcs refreshed.
    pub updated: AtomicU64,
    /// Out-arcs removed.
    pub out_removed: AtomicU64,
    /// In-arcs removed.
    pub in_removed: AtomicU64,
    /// Arcs dropped by expiration.
    pub expired: AtomicU64,
    /// Conversions to a single inline arc.
    pub to_simple: AtomicU64,
    /// Conversions to an array.
    pub to_array: AtomicU64,
    /// Conversions to empty.
    pub to_empty: AtomicU64,
    /// Conversions to a degree counter.
    pub to_counter: AtomicU64,
    /// Traversals.
    pub scans: AtomicU64,
    /// Deferred mass-removal passes.
    pub retries: AtomicU64,
}

impl ArcMetrics for CounterMetrics {
    fn arc_added(&self, side: &'static str) {
        match side {
            "out" => {
                self.out_added.fetch_add(1, Ordering::Relaxed);
            }
            "in" => {
                self.in_added.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn arc_updated(&self, _side: &'static str) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    fn arcs_removed(&self, side: &'static str, count: u64) {
        match side {
            "out" => {
                self.out_removed.fetch_add(count, Ordering::Relaxed);
            }
            "in" => {
                self.in_removed.fetch_add(count, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn arcs_expired(&self, count: u64) {
        self.expired.fetch_add(count, Ordering::Relaxed);
    }

    fn cell_converted(&self, to: &'static str) {
        let counter = match to {
            "simple" => &self.to_simple,
            "array" => &self.to_array,
            "counter" => &self.to_counter,
            _ => &self.to_empty,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn scan(&self, _kind: &'static str) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    fn removal_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
pub fn default_metrics() -> Arc<dyn ArcMetrics> {
    Arc::new(NoopMetrics)
}
