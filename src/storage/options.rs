use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ArcError, Result};
use crate::predicator::{AccumulatorKind, AccumulatorPolicy, RelId};

/// Default number of keys one neighbor entry may hold: one per assignable
/// relationship code.
pub const MULTI_ARC_CAPACITY: usize = (RelId::USER_END.0 - RelId::SYSTEM_START.0 + 1) as usize;

/// Default pause between mass-removal passes blocked by reverse-side locks.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration shared by every cell operation.
#[derive(Clone)]
pub struct ArcVectorOptions {
    /// Maximum number of keys per neighbor entry.
    pub multi_arc_capacity: usize,
    /// Pause between mass-removal passes.
    pub retry_interval: Duration,
    /// Policy applied when an accumulating arc is added again.
    pub accumulator: Arc<dyn AccumulatorPolicy>,
    /// Optional metrics collection implementation.
    pub metrics: Option<Arc<dyn super::metrics::ArcMetrics>>,
    /// Whether fatal errors log a word dump of the affected cell.
    pub dump_on_error: bool,
}

impl ArcVectorOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            multi_arc_capacity: MULTI_ARC_CAPACITY,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            accumulator: AccumulatorKind::default().policy(),
            metrics: None,
            dump_on_error: true,
        }
    }

    /// Sets the per-neighbor key capacity. Values below 2 are raised to 2.
    pub fn multi_arc_capacity(mut self, capacity: usize) -> Self {
        self.multi_arc_capacity = capacity.max(2);
        self
    }

    /// Sets the pause between mass-removal passes.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the accumulator policy.
    pub fn accumulator(mut self, policy: Arc<dyn AccumulatorPolicy>) -> Self {
        self.accumulator = policy;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn super::metrics::ArcMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables or disables diagnostic dumps on fatal errors.
    pub fn dump_on_error(mut self, enabled: bool) -> Self {
        self.dump_on_error = enabled;
        self
    }
}

impl Default for ArcVectorOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// File form of [`ArcVectorOptions`]. Absent keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArcVectorConfig {
    /// See [`ArcVectorOptions::multi_arc_capacity`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_arc_capacity: Option<usize>,
    /// Retry interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval_ms: Option<u64>,
    /// Named accumulator policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accumulator: Option<AccumulatorKind>,
    /// See [`ArcVectorOptions::dump_on_error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_on_error: Option<bool>,
}

impl ArcVectorConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| ArcError::InvalidArgument(format!("config: {err}")))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| ArcError::InvalidArgument(format!("config: {err}")))
    }

    /// Applies the configured values on top of `base`.
    pub fn apply(&self, mut base: ArcVectorOptions) -> ArcVectorOptions {
        if let Some(capacity) = self.multi_arc_capacity {
            base = base.multi_arc_capacity(capacity);
        }
        if let Some(ms) = self.retry_interval_ms {
            base = base.retry_interval(Duration::from_millis(ms));
        }
        if let Some(kind) = self.accumulator {
            base = base.accumulator(kind.policy());
        }
        if let Some(dump) = self.dump_on_error {
            base = base.dump_on_error(dump);
        }
        base
    }
}
