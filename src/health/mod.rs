/// Health monitoring for registered endpoints
pub mod probe;

use crate::endpoint::EndpointRegistry;
use crate::events::{EventSink, RouterEvent};
use probe::EndpointProbe;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{watch, RwLock};
use tokio::time::{timeout, MissedTickBehavior};

/// Penalty added to the error counter per failed outcome. Three
/// consecutive failures push a fresh endpoint below the unhealthy
/// threshold.
const FAILURE_PENALTY: u32 = 25;
/// Reward subtracted per successful outcome; recovery is slower than decay.
const SUCCESS_REWARD: u32 = 5;
/// Saturation cap on the error counter (rolling window of 100 operations).
const ERROR_WINDOW: u32 = 100;

/// Derived health classification of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl HealthStatus {
    /// Classify a success rate: `< 50` unhealthy, `< 80` degraded,
    /// otherwise healthy.
    pub fn from_success_rate(success_rate: u32) -> Self {
        if success_rate < 50 {
            HealthStatus::Unhealthy
        } else if success_rate < 80 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Whether the endpoint stays in the selection set. Degraded
    /// endpoints remain routable; only unhealthy ones are excluded.
    pub fn is_routable(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }
}

/// Mutable runtime health state, one record per endpoint
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub endpoint_id: String,
    pub status: HealthStatus,
    /// Exponentially smoothed round-trip time
    pub latency_ms: f64,
    /// Saturating penalty counter, capped at the rolling window size
    pub error_count: u32,
    /// `100 - min(error_count, 100)`
    pub success_rate: u32,
    pub last_checked_at: Option<SystemTime>,
}

impl EndpointHealth {
    pub fn new<S: Into<String>>(endpoint_id: S) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            status: HealthStatus::Healthy,
            latency_ms: 0.0,
            error_count: 0,
            success_rate: 100,
            last_checked_at: None,
        }
    }

    /// Apply one probe or live-traffic outcome. Latency is blended as
    /// `(old + new) / 2`; the status invariant is recomputed from the
    /// resulting success rate.
    fn apply_outcome(&mut self, latency_ms: f64, success: bool) {
        self.latency_ms = if self.last_checked_at.is_none() {
            latency_ms
        } else {
            (self.latency_ms + latency_ms) / 2.0
        };
        self.error_count = if success {
            self.error_count.saturating_sub(SUCCESS_REWARD)
        } else {
            (self.error_count + FAILURE_PENALTY).min(ERROR_WINDOW)
        };
        self.success_rate = 100 - self.error_count.min(ERROR_WINDOW);
        self.status = HealthStatus::from_success_rate(self.success_rate);
        self.last_checked_at = Some(SystemTime::now());
    }
}

/// Background health monitor
///
/// Owns the per-endpoint health map and keeps it current independently of
/// application traffic: a global tick probes every registered endpoint
/// concurrently, and the router funnels live-traffic outcomes through the
/// same `record_outcome` entry point.
pub struct HealthMonitor {
    registry: Arc<EndpointRegistry>,
    probe: Arc<dyn EndpointProbe>,
    events: Arc<dyn EventSink>,
    interval: Duration,
    probe_timeout: Duration,
    records: RwLock<HashMap<String, EndpointHealth>>,
    shutdown: StdMutex<Option<watch::Sender<bool>>>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        probe: Arc<dyn EndpointProbe>,
        events: Arc<dyn EventSink>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            probe,
            events,
            interval,
            probe_timeout,
            records: RwLock::new(HashMap::new()),
            shutdown: StdMutex::new(None),
        }
    }

    /// Begin the periodic probe loop. No-op if already running.
    pub fn start(self: &Arc<Self>) {
        let mut shutdown = self.shutdown.lock().expect("shutdown lock poisoned");
        if shutdown.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        *shutdown = Some(tx);

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => monitor.probe_all().await,
                    _ = rx.changed() => {
                        tracing::debug!("health monitor stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Cancel the probe loop; idempotent. A tick already in progress
    /// completes naturally before the loop exits.
    pub fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().expect("shutdown lock poisoned").take() {
            let _ = tx.send(true);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown
            .lock()
            .expect("shutdown lock poisoned")
            .is_some()
    }

    /// Probe every registered endpoint concurrently. Each probe is
    /// isolated: one slow or broken endpoint never blocks the others,
    /// and a timeout counts as a failure.
    pub async fn probe_all(&self) {
        let endpoints = self.registry.all_endpoints().await;
        let probes = endpoints.iter().map(|endpoint| async {
            let started = Instant::now();
            let result = timeout(self.probe_timeout, self.probe.probe(endpoint)).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            let success = matches!(result, Ok(Ok(())));
            match &result {
                Ok(Err(reason)) => {
                    tracing::debug!(endpoint = %endpoint.id, %reason, "probe failed")
                }
                Err(_) => tracing::debug!(endpoint = %endpoint.id, "probe timed out"),
                Ok(Ok(())) => {}
            }
            self.events.emit(&RouterEvent::ProbeCompleted {
                endpoint: endpoint.id.clone(),
                success,
                latency_ms,
            });
            self.record_outcome(&endpoint.id, latency_ms, success).await;
        });
        futures::future::join_all(probes).await;
    }

    /// Single mutation entry point, shared by the probe loop and the
    /// router's live-traffic reporting. Outcomes for endpoints no longer
    /// registered are dropped so a removal stays atomic.
    pub async fn record_outcome(&self, endpoint_id: &str, latency_ms: f64, success: bool) {
        if self.registry.get(endpoint_id).await.is_none() {
            tracing::debug!(endpoint = endpoint_id, "outcome for unregistered endpoint dropped");
            return;
        }
        let mut records = self.records.write().await;
        let record = records
            .entry(endpoint_id.to_string())
            .or_insert_with(|| EndpointHealth::new(endpoint_id));
        let previous = record.status;
        record.apply_outcome(latency_ms, success);
        if record.status != previous {
            tracing::warn!(
                endpoint = endpoint_id,
                from = %previous,
                to = %record.status,
                success_rate = record.success_rate,
                "endpoint health transition"
            );
            self.events.emit(&RouterEvent::StatusChanged {
                endpoint: endpoint_id.to_string(),
                from: previous,
                to: record.status,
            });
        }
    }

    /// Read-only copy of every endpoint's health, primary first then
    /// replicas in registration order. Endpoints without a recorded
    /// outcome yet report the fresh-healthy default.
    pub async fn snapshot(&self) -> Vec<EndpointHealth> {
        let endpoints = self.registry.all_endpoints().await;
        let records = self.records.read().await;
        endpoints
            .iter()
            .map(|endpoint| {
                records
                    .get(&endpoint.id)
                    .cloned()
                    .unwrap_or_else(|| EndpointHealth::new(&endpoint.id))
            })
            .collect()
    }

    /// Health of one endpoint, defaulting to fresh-healthy if registered
    /// but not yet probed
    pub async fn health_of(&self, endpoint_id: &str) -> Option<EndpointHealth> {
        self.registry.get(endpoint_id).await?;
        let records = self.records.read().await;
        Some(
            records
                .get(endpoint_id)
                .cloned()
                .unwrap_or_else(|| EndpointHealth::new(endpoint_id)),
        )
    }

    /// Drop the health record for a removed endpoint
    pub async fn deregister(&self, endpoint_id: &str) {
        let mut records = self.records.write().await;
        records.remove(endpoint_id);
    }
}
