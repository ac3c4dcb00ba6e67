/// Replica selection policies and the load-balancing selector
use crate::endpoint::Endpoint;
use crate::health::EndpointHealth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Selection policy, switchable at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    RoundRobin,
    LeastConnections,
    LatencyBased,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::LatencyBased
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::RoundRobin => write!(f, "round-robin"),
            SelectionPolicy::LeastConnections => write!(f, "least-connections"),
            SelectionPolicy::LatencyBased => write!(f, "latency-based"),
        }
    }
}

/// One replica as seen by a selection algorithm: static config, current
/// health, and the number of in-flight operations.
#[derive(Debug, Clone)]
pub struct ReplicaCandidate {
    pub endpoint: Endpoint,
    pub health: EndpointHealth,
    pub in_flight: usize,
}

/// Selection algorithm over the routable candidate set. Candidates arrive
/// in registration order; the returned value is an index into the slice.
pub trait SelectionAlgorithm: Send + Sync {
    fn select(&self, candidates: &[ReplicaCandidate]) -> Option<usize>;
}

/// Cycles through the candidate set in registration order. The cursor is
/// monotonically increasing and persists across calls.
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionAlgorithm for RoundRobin {
    fn select(&self, candidates: &[ReplicaCandidate]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(index)
    }
}

/// Prefers the candidate with the fewest in-flight operations; ties go to
/// the earliest registered.
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionAlgorithm for LeastConnections {
    fn select(&self, candidates: &[ReplicaCandidate]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let better = match best {
                None => true,
                Some(current) => candidate.in_flight < candidates[current].in_flight,
            };
            if better {
                best = Some(index);
            }
        }
        best
    }
}

/// Prefers the lowest smoothed latency; equal latencies fall back to the
/// lower priority value, then registration order.
pub struct LatencyBased;

impl LatencyBased {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionAlgorithm for LatencyBased {
    fn select(&self, candidates: &[ReplicaCandidate]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let better = match best {
                None => true,
                Some(current) => {
                    let incumbent = &candidates[current];
                    candidate.health.latency_ms < incumbent.health.latency_ms
                        || (candidate.health.latency_ms == incumbent.health.latency_ms
                            && candidate.endpoint.config.priority
                                < incumbent.endpoint.config.priority)
                }
            };
            if better {
                best = Some(index);
            }
        }
        best
    }
}

fn algorithm_for(policy: SelectionPolicy) -> Box<dyn SelectionAlgorithm> {
    match policy {
        SelectionPolicy::RoundRobin => Box::new(RoundRobin::new()),
        SelectionPolicy::LeastConnections => Box::new(LeastConnections::new()),
        SelectionPolicy::LatencyBased => Box::new(LatencyBased::new()),
    }
}

/// Tracks in-flight operations per endpoint for the least-connections
/// policy. Counts are mutated through RAII guards so a panicking or
/// cancelled operation still releases its slot.
pub struct InFlightTracker {
    counts: Mutex<HashMap<String, usize>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn count(&self, endpoint_id: &str) -> usize {
        let counts = self.counts.lock().expect("in-flight lock poisoned");
        counts.get(endpoint_id).copied().unwrap_or(0)
    }

    fn begin(self: &Arc<Self>, endpoint_id: &str) -> InFlightGuard {
        let mut counts = self.counts.lock().expect("in-flight lock poisoned");
        *counts.entry(endpoint_id.to_string()).or_insert(0) += 1;
        InFlightGuard {
            tracker: Arc::clone(self),
            endpoint_id: endpoint_id.to_string(),
        }
    }

    fn finish(&self, endpoint_id: &str) {
        let mut counts = self.counts.lock().expect("in-flight lock poisoned");
        if let Some(count) = counts.get_mut(endpoint_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(endpoint_id);
            }
        }
    }
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the in-flight slot on drop
pub struct InFlightGuard {
    tracker: Arc<InFlightTracker>,
    endpoint_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.finish(&self.endpoint_id);
    }
}

/// Picks one replica for a read operation from a health snapshot.
///
/// Disabled and unhealthy candidates are filtered out first. A preferred
/// locality narrows the set when at least one routable member matches;
/// otherwise selection runs over the full routable set. An empty routable
/// set yields `None`, which is a valid outcome, not an error.
pub struct ReplicaSelector {
    policy: Mutex<SelectionPolicy>,
    algorithm: RwLock<Box<dyn SelectionAlgorithm>>,
    in_flight: Arc<InFlightTracker>,
}

impl ReplicaSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy: Mutex::new(policy),
            algorithm: RwLock::new(algorithm_for(policy)),
            in_flight: Arc::new(InFlightTracker::new()),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        *self.policy.lock().expect("policy lock poisoned")
    }

    /// Swap the selection policy at runtime. The round-robin cursor
    /// starts fresh after a swap.
    pub fn set_policy(&self, policy: SelectionPolicy) {
        *self.policy.lock().expect("policy lock poisoned") = policy;
        *self.algorithm.write().expect("algorithm lock poisoned") = algorithm_for(policy);
    }

    /// Current in-flight count for an endpoint
    pub fn in_flight_count(&self, endpoint_id: &str) -> usize {
        self.in_flight.count(endpoint_id)
    }

    /// Reserve an in-flight slot for the duration of one attempt
    pub fn track(&self, endpoint_id: &str) -> InFlightGuard {
        self.in_flight.begin(endpoint_id)
    }

    /// Attach live in-flight counts to a candidate set
    pub fn with_in_flight(&self, candidates: &mut [ReplicaCandidate]) {
        for candidate in candidates.iter_mut() {
            candidate.in_flight = self.in_flight.count(&candidate.endpoint.id);
        }
    }

    pub fn select(
        &self,
        candidates: &[ReplicaCandidate],
        preferred_locality: Option<&str>,
    ) -> Option<Endpoint> {
        let routable: Vec<ReplicaCandidate> = candidates
            .iter()
            .filter(|c| c.endpoint.config.enabled && c.health.status.is_routable())
            .cloned()
            .collect();
        if routable.is_empty() {
            return None;
        }

        let pool: Vec<ReplicaCandidate> = match preferred_locality {
            Some(locality) => {
                let local: Vec<ReplicaCandidate> = routable
                    .iter()
                    .filter(|c| c.endpoint.locality() == locality)
                    .cloned()
                    .collect();
                if local.is_empty() {
                    routable
                } else {
                    local
                }
            }
            None => routable,
        };

        let algorithm = self.algorithm.read().expect("algorithm lock poisoned");
        algorithm
            .select(&pool)
            .map(|index| pool[index].endpoint.clone())
    }
}
