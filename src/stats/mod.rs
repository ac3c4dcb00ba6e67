/// Routing statistics aggregation
use std::collections::HashMap;
use std::sync::Mutex;

/// Kind of routed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

/// Process-wide routing aggregate, reset only by explicit call
#[derive(Debug, Clone, Default)]
pub struct RoutingStats {
    pub total_ops: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    /// Operation count per endpoint id; primary-routed operations land
    /// under the reserved `"primary"` key
    pub distribution: HashMap<String, u64>,
    /// Smoothed moving average across all routed operations
    pub average_latency_ms: f64,
    /// Reads attempted on a replica that ultimately completed on the primary
    pub failover_count: u64,
}

/// Bookkeeping for routed operations. Pure in-memory accounting with no
/// failure modes; the lock is never held across I/O.
pub struct StatsAggregator {
    inner: Mutex<RoutingStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RoutingStats::default()),
        }
    }

    pub fn record(&self, kind: OpKind, endpoint_id: &str, latency_ms: f64, is_failover: bool) {
        let mut stats = self.inner.lock().expect("stats lock poisoned");
        stats.average_latency_ms = if stats.total_ops == 0 {
            latency_ms
        } else {
            (stats.average_latency_ms + latency_ms) / 2.0
        };
        stats.total_ops += 1;
        match kind {
            OpKind::Read => stats.read_ops += 1,
            OpKind::Write => stats.write_ops += 1,
        }
        *stats.distribution.entry(endpoint_id.to_string()).or_insert(0) += 1;
        if is_failover {
            stats.failover_count += 1;
        }
    }

    /// Snapshot copy of the current aggregate
    pub fn report(&self) -> RoutingStats {
        self.inner.lock().expect("stats lock poisoned").clone()
    }

    /// Zero all counters. Operator-facing, never called by the router.
    pub fn reset(&self) {
        let mut stats = self.inner.lock().expect("stats lock poisoned");
        *stats = RoutingStats::default();
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
