/// Query routing with bounded retries and primary failover
///
/// `QueryRouter` is the public entry point of the crate. Reads are
/// dispatched to a selected replica with bounded retries and an optional
/// final primary attempt; writes go unconditionally to the primary. Every
/// attempt's outcome feeds the health monitor and the stats aggregator.
use crate::balance::{ReplicaCandidate, ReplicaSelector, SelectionPolicy};
use crate::config::{RoutingConfig, Settings};
use crate::endpoint::{Endpoint, EndpointConfig, EndpointRegistry, PRIMARY_ID};
use crate::error::{BoxError, RouterError, RouterResult};
use crate::events::{EventSink, RouterEvent, TracingSink};
use crate::health::probe::TcpProbe;
use crate::health::HealthMonitor;
use crate::stats::{OpKind, RoutingStats, StatsAggregator};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Per-call options for `execute_read`
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Narrow selection to this locality when it has a routable member
    pub preferred_locality: Option<String>,
    /// Replica attempts before fallback
    pub max_retries: u32,
    /// Whether exhausted reads fall back to the primary
    pub fallback_to_primary: bool,
    /// Per-attempt timeout override
    pub timeout: Option<Duration>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            preferred_locality: None,
            max_retries: 2,
            fallback_to_primary: true,
            timeout: None,
        }
    }
}

impl ReadOptions {
    pub fn with_locality<S: Into<String>>(mut self, locality: S) -> Self {
        self.preferred_locality = Some(locality.into());
        self
    }
}

/// Health-aware read/write router over a primary and its replicas
pub struct QueryRouter {
    registry: Arc<EndpointRegistry>,
    monitor: Arc<HealthMonitor>,
    selector: ReplicaSelector,
    stats: StatsAggregator,
    events: Arc<dyn EventSink>,
    routing: RoutingConfig,
    operation_timeout: Duration,
}

impl QueryRouter {
    /// Compose a router from explicitly constructed components. The
    /// monitor is not started here; call `monitor().start()` once the
    /// application is ready to probe.
    pub fn new(
        registry: Arc<EndpointRegistry>,
        monitor: Arc<HealthMonitor>,
        routing: RoutingConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            selector: ReplicaSelector::new(routing.policy),
            operation_timeout: Duration::from_millis(routing.operation_timeout_ms),
            registry,
            monitor,
            stats: StatsAggregator::new(),
            events,
            routing,
        }
    }

    /// Build the full component stack from settings: registry with the
    /// configured replicas, TCP-probing health monitor, tracing event sink.
    pub async fn from_settings(settings: &Settings) -> RouterResult<Self> {
        settings.validate()?;
        let registry = EndpointRegistry::new(settings.primary.clone())?.into_shared();
        for replica in &settings.replicas {
            registry.add_replica(replica.clone()).await?;
        }
        let events: Arc<dyn EventSink> = Arc::new(TracingSink);
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::new(TcpProbe::new()),
            Arc::clone(&events),
            Duration::from_millis(settings.health.interval_ms),
            Duration::from_millis(settings.health.probe_timeout_ms),
        ));
        Ok(Self::new(registry, monitor, settings.routing.clone(), events))
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Read options seeded from the routing configuration
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            preferred_locality: None,
            max_retries: self.routing.max_retries,
            fallback_to_primary: self.routing.fallback_to_primary,
            timeout: None,
        }
    }

    /// Snapshot of the routing statistics
    pub fn stats(&self) -> RoutingStats {
        self.stats.report()
    }

    /// Zero the routing statistics. Operator-facing.
    pub fn reset_stats(&self) {
        self.stats.reset()
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.selector.policy()
    }

    /// Switch the replica selection policy at runtime
    pub fn set_policy(&self, policy: SelectionPolicy) {
        self.selector.set_policy(policy);
        self.events.emit(&RouterEvent::PolicyChanged { policy });
    }

    /// Register a replica at runtime
    pub async fn add_replica(&self, config: EndpointConfig) -> RouterResult<String> {
        let locality = config.locality.clone();
        let id = self.registry.add_replica(config).await?;
        self.events.emit(&RouterEvent::EndpointAdded {
            endpoint: id.clone(),
            locality,
        });
        Ok(id)
    }

    /// Remove a replica and its health record. Returns false if not
    /// found. Operations already dispatched to it are unaffected.
    pub async fn remove_replica(&self, id: &str) -> bool {
        let removed = self.registry.remove_replica(id).await;
        if removed {
            self.monitor.deregister(id).await;
            self.events.emit(&RouterEvent::EndpointRemoved {
                endpoint: id.to_string(),
            });
        }
        removed
    }

    /// Toggle routing participation for a replica
    pub async fn set_replica_enabled(&self, id: &str, enabled: bool) -> bool {
        self.registry.set_enabled(id, enabled).await
    }

    /// Execute a read operation. Up to `max_retries` replica attempts;
    /// when the routable set is empty the router skips straight to
    /// fallback. With fallback enabled there is exactly one primary
    /// attempt afterwards, whose failure is fatal.
    pub async fn execute_read<T, F, Fut>(&self, options: ReadOptions, operation: F) -> RouterResult<T>
    where
        F: Fn(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let op_timeout = options.timeout.unwrap_or(self.operation_timeout);
        let mut last_error: Option<RouterError> = None;
        let mut replica_attempts = 0u32;

        for attempt in 1..=options.max_retries {
            let candidates = self.replica_candidates().await;
            let Some(endpoint) = self
                .selector
                .select(&candidates, options.preferred_locality.as_deref())
            else {
                break;
            };

            replica_attempts += 1;
            let guard = self.selector.track(&endpoint.id);
            let started = Instant::now();
            let outcome = timeout(op_timeout, operation(endpoint.clone())).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            drop(guard);

            match outcome {
                Ok(Ok(value)) => {
                    self.monitor
                        .record_outcome(&endpoint.id, latency_ms, true)
                        .await;
                    self.stats.record(OpKind::Read, &endpoint.id, latency_ms, false);
                    self.events.emit(&RouterEvent::ReadRouted {
                        endpoint: endpoint.id.clone(),
                        latency_ms,
                    });
                    return Ok(value);
                }
                Ok(Err(source)) => {
                    self.monitor
                        .record_outcome(&endpoint.id, latency_ms, false)
                        .await;
                    self.events.emit(&RouterEvent::ReplicaAttemptFailed {
                        endpoint: endpoint.id.clone(),
                        attempt,
                        error: source.to_string(),
                    });
                    last_error = Some(RouterError::replica(&endpoint.id, source));
                }
                Err(_) => {
                    self.monitor
                        .record_outcome(&endpoint.id, latency_ms, false)
                        .await;
                    let timeout_ms = op_timeout.as_millis() as u64;
                    self.events.emit(&RouterEvent::ReplicaAttemptFailed {
                        endpoint: endpoint.id.clone(),
                        attempt,
                        error: format!("timed out after {}ms", timeout_ms),
                    });
                    last_error = Some(RouterError::replica_timeout(&endpoint.id, timeout_ms));
                }
            }
        }

        if !options.fallback_to_primary {
            return Err(last_error.unwrap_or(RouterError::EndpointUnavailable));
        }

        // Exactly one primary attempt; its failure propagates verbatim.
        let primary = self.registry.primary().clone();
        let started = Instant::now();
        let outcome = timeout(op_timeout, operation(primary)).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(Ok(value)) => {
                self.monitor.record_outcome(PRIMARY_ID, latency_ms, true).await;
                // Only a read that actually touched a replica counts as a failover
                self.stats
                    .record(OpKind::Read, PRIMARY_ID, latency_ms, replica_attempts > 0);
                self.events.emit(&RouterEvent::FailedOver {
                    replica_attempts,
                    latency_ms,
                });
                Ok(value)
            }
            Ok(Err(source)) => {
                self.monitor
                    .record_outcome(PRIMARY_ID, latency_ms, false)
                    .await;
                Err(RouterError::primary(source))
            }
            Err(_) => {
                self.monitor
                    .record_outcome(PRIMARY_ID, latency_ms, false)
                    .await;
                Err(RouterError::primary_timeout(op_timeout.as_millis() as u64))
            }
        }
    }

    /// Execute a write operation directly against the primary. No retry,
    /// no replica involvement; failures propagate unchanged.
    pub async fn execute_write<T, F, Fut>(&self, operation: F) -> RouterResult<T>
    where
        F: FnOnce(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let primary = self.registry.primary().clone();
        let started = Instant::now();
        let outcome = timeout(self.operation_timeout, operation(primary)).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(Ok(value)) => {
                self.monitor.record_outcome(PRIMARY_ID, latency_ms, true).await;
                self.stats.record(OpKind::Write, PRIMARY_ID, latency_ms, false);
                self.events.emit(&RouterEvent::WriteExecuted { latency_ms });
                Ok(value)
            }
            Ok(Err(source)) => {
                self.monitor
                    .record_outcome(PRIMARY_ID, latency_ms, false)
                    .await;
                Err(RouterError::primary(source))
            }
            Err(_) => {
                self.monitor
                    .record_outcome(PRIMARY_ID, latency_ms, false)
                    .await;
                Err(RouterError::primary_timeout(
                    self.operation_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Join registry, health, and in-flight state into the selector's
    /// candidate view, in registration order.
    async fn replica_candidates(&self) -> Vec<ReplicaCandidate> {
        let replicas = self.registry.list_replicas().await;
        let mut candidates = Vec::with_capacity(replicas.len());
        for endpoint in replicas {
            if let Some(health) = self.monitor.health_of(&endpoint.id).await {
                candidates.push(ReplicaCandidate {
                    endpoint,
                    health,
                    in_flight: 0,
                });
            }
        }
        self.selector.with_in_flight(&mut candidates);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_support::CollectingSink;
    use crate::health::probe::MockProbe;
    use crate::health::HealthStatus;
    use std::sync::Mutex;

    struct Harness {
        router: QueryRouter,
        sink: Arc<CollectingSink>,
        replica_ids: Vec<String>,
    }

    async fn harness(replica_count: usize) -> Harness {
        let registry = EndpointRegistry::new(EndpointConfig::new(
            "postgres://primary:5432/app",
            "us-east-1",
        ))
        .unwrap()
        .into_shared();

        let mut replica_ids = Vec::new();
        for i in 0..replica_count {
            let id = registry
                .add_replica(EndpointConfig::new(
                    format!("postgres://replica-{}:5432/app", i),
                    "us-east-1".to_string(),
                ))
                .await
                .unwrap();
            replica_ids.push(id);
        }

        let sink = Arc::new(CollectingSink::default());
        let events: Arc<dyn EventSink> = Arc::clone(&sink) as Arc<dyn EventSink>;
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::new(MockProbe::always_ok()),
            Arc::clone(&events),
            Duration::from_millis(20),
            Duration::from_millis(10),
        ));
        let router = QueryRouter::new(registry, monitor, RoutingConfig::default(), events);
        Harness {
            router,
            sink,
            replica_ids,
        }
    }

    fn call_log() -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (Arc::clone(&calls), calls)
    }

    #[tokio::test]
    async fn test_read_routes_to_replica_and_records_stats() {
        let h = harness(1).await;
        let (calls, log) = call_log();

        let value = h
            .router
            .execute_read(ReadOptions::default(), move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Ok::<_, BoxError>(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(*log.lock().unwrap(), vec![h.replica_ids[0].clone()]);

        let stats = h.router.stats();
        assert_eq!(stats.total_ops, 1);
        assert_eq!(stats.read_ops, 1);
        assert_eq!(stats.distribution[&h.replica_ids[0]], 1);
        assert_eq!(stats.failover_count, 0);
        assert!(h
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, RouterEvent::ReadRouted { .. })));
    }

    #[tokio::test]
    async fn test_retry_bound_and_failover_accounting() {
        let h = harness(1).await;
        let (calls, log) = call_log();

        let value = h
            .router
            .execute_read(ReadOptions::default(), move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    if endpoint.id == PRIMARY_ID {
                        Ok::<_, BoxError>("from-primary")
                    } else {
                        Err("replica down".into())
                    }
                }
            })
            .await
            .unwrap();

        // Exactly max_retries replica attempts, then exactly one primary attempt
        assert_eq!(value, "from-primary");
        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                h.replica_ids[0].clone(),
                h.replica_ids[0].clone(),
                PRIMARY_ID.to_string()
            ]
        );

        let stats = h.router.stats();
        assert_eq!(stats.failover_count, 1);
        assert_eq!(stats.distribution[PRIMARY_ID], 1);
        assert!(h
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, RouterEvent::FailedOver { replica_attempts: 2, .. })));
    }

    #[tokio::test]
    async fn test_no_fallback_propagates_last_replica_error() {
        let h = harness(1).await;
        let (calls, log) = call_log();
        let options = ReadOptions {
            fallback_to_primary: false,
            ..Default::default()
        };

        let error = h
            .router
            .execute_read(options, move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    let attempt = {
                        let mut log = calls.lock().unwrap();
                        log.push(endpoint.id.clone());
                        log.len()
                    };
                    Err::<(), BoxError>(format!("boom-{}", attempt).into())
                }
            })
            .await
            .unwrap_err();

        // Primary never invoked; the caller sees the last replica failure
        assert!(!log.lock().unwrap().contains(&PRIMARY_ID.to_string()));
        match error {
            RouterError::ReplicaExecutionFailed { endpoint, source } => {
                assert_eq!(endpoint, h.replica_ids[0]);
                assert_eq!(source.to_string(), "boom-2");
            }
            other => panic!("expected replica failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_healthy_set_skips_straight_to_fallback() {
        let h = harness(2).await;
        // Drive both replicas unhealthy through recorded failures
        for id in &h.replica_ids {
            for _ in 0..3 {
                h.router.monitor().record_outcome(id, 5.0, false).await;
            }
        }
        let (calls, log) = call_log();

        let value = h
            .router
            .execute_read(ReadOptions::default(), move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Ok::<_, BoxError>(1)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 1);
        // No wasted replica attempt, and no failover counted
        assert_eq!(*log.lock().unwrap(), vec![PRIMARY_ID.to_string()]);
        let stats = h.router.stats();
        assert_eq!(stats.failover_count, 0);
        assert_eq!(stats.distribution[PRIMARY_ID], 1);
    }

    #[tokio::test]
    async fn test_no_replicas_no_fallback_is_endpoint_unavailable() {
        let h = harness(0).await;
        let options = ReadOptions {
            fallback_to_primary: false,
            ..Default::default()
        };

        let error = h
            .router
            .execute_read(options, |_endpoint| async move { Ok::<_, BoxError>(1) })
            .await
            .unwrap_err();
        assert!(matches!(error, RouterError::EndpointUnavailable));
    }

    #[tokio::test]
    async fn test_primary_failure_in_fallback_is_fatal() {
        let h = harness(1).await;

        let error = h
            .router
            .execute_read(ReadOptions::default(), |_endpoint| async move {
                Err::<(), BoxError>("everything is down".into())
            })
            .await
            .unwrap_err();

        assert!(matches!(error, RouterError::PrimaryExecutionFailed { .. }));
        assert!(!error.is_recoverable());
    }

    #[tokio::test]
    async fn test_replica_timeout_counts_as_failure_and_falls_back() {
        let h = harness(1).await;
        let options = ReadOptions {
            timeout: Some(Duration::from_millis(20)),
            max_retries: 1,
            ..Default::default()
        };

        let value = h
            .router
            .execute_read(options, |endpoint| async move {
                if endpoint.id == PRIMARY_ID {
                    Ok::<_, BoxError>(9)
                } else {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(0)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 9);
        let health = h
            .router
            .monitor()
            .health_of(&h.replica_ids[0])
            .await
            .unwrap();
        assert!(health.error_count > 0);
    }

    #[tokio::test]
    async fn test_write_goes_to_primary_only() {
        let h = harness(2).await;
        let (calls, log) = call_log();

        h.router
            .execute_write(move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Ok::<_, BoxError>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec![PRIMARY_ID.to_string()]);
        let stats = h.router.stats();
        assert_eq!(stats.write_ops, 1);
        assert_eq!(stats.distribution[PRIMARY_ID], 1);

        // Replica health records untouched by the write path
        for id in &h.replica_ids {
            let health = h.router.monitor().health_of(id).await.unwrap();
            assert!(health.last_checked_at.is_none());
            assert_eq!(health.error_count, 0);
        }
    }

    #[tokio::test]
    async fn test_write_failure_propagates_without_retry() {
        let h = harness(1).await;
        let (calls, log) = call_log();

        let error = h
            .router
            .execute_write(move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Err::<(), BoxError>("disk full".into())
                }
            })
            .await
            .unwrap_err();

        assert_eq!(log.lock().unwrap().len(), 1);
        match error {
            RouterError::PrimaryExecutionFailed { source } => {
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("expected primary failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_latency_based_selection_follows_health_transitions() {
        let h = harness(2).await;
        let (r1, r2) = (h.replica_ids[0].clone(), h.replica_ids[1].clone());
        let monitor = h.router.monitor();
        monitor.record_outcome(&r1, 10.0, true).await;
        monitor.record_outcome(&r2, 50.0, true).await;

        let (calls, log) = call_log();
        let outer = Arc::clone(&calls);
        h.router
            .execute_read(ReadOptions::default(), move |endpoint| {
                let calls = Arc::clone(&outer);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Ok::<_, BoxError>(())
                }
            })
            .await
            .unwrap();
        assert_eq!(log.lock().unwrap().last().unwrap(), &r1);

        // Three consecutive failures eject the fast replica
        for _ in 0..3 {
            monitor.record_outcome(&r1, 10.0, false).await;
        }
        assert_eq!(
            monitor.health_of(&r1).await.unwrap().status,
            HealthStatus::Unhealthy
        );

        let outer = Arc::clone(&calls);
        h.router
            .execute_read(ReadOptions::default(), move |endpoint| {
                let calls = Arc::clone(&outer);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Ok::<_, BoxError>(())
                }
            })
            .await
            .unwrap();
        assert_eq!(log.lock().unwrap().last().unwrap(), &r2);
    }

    #[tokio::test]
    async fn test_preferred_locality_is_honored() {
        let h = harness(0).await;
        h.router
            .add_replica(EndpointConfig::new("postgres://east:5432", "us-east-1"))
            .await
            .unwrap();
        let west = h
            .router
            .add_replica(EndpointConfig::new("postgres://west:5432", "us-west-2"))
            .await
            .unwrap();

        let options = ReadOptions::default().with_locality("us-west-2");
        let (calls, log) = call_log();
        h.router
            .execute_read(options, move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Ok::<_, BoxError>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec![west]);
    }

    #[tokio::test]
    async fn test_admin_api_emits_events() {
        let h = harness(0).await;

        let id = h
            .router
            .add_replica(EndpointConfig::new("postgres://r1:5432", "eu-west-1"))
            .await
            .unwrap();
        h.router.set_policy(SelectionPolicy::RoundRobin);
        assert_eq!(h.router.policy(), SelectionPolicy::RoundRobin);
        assert!(h.router.set_replica_enabled(&id, false).await);
        assert!(h.router.remove_replica(&id).await);
        assert!(!h.router.remove_replica(&id).await);

        let events = h.sink.events();
        assert!(events.iter().any(|e| matches!(
            e,
            RouterEvent::EndpointAdded { locality, .. } if locality == "eu-west-1"
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, RouterEvent::PolicyChanged { policy: SelectionPolicy::RoundRobin })));
        assert!(events
            .iter()
            .any(|e| matches!(e, RouterEvent::EndpointRemoved { .. })));
    }

    #[tokio::test]
    async fn test_removed_replica_health_is_dropped() {
        let h = harness(1).await;
        let id = h.replica_ids[0].clone();
        h.router.monitor().record_outcome(&id, 5.0, true).await;

        assert!(h.router.remove_replica(&id).await);
        assert!(h.router.monitor().health_of(&id).await.is_none());
        // A late outcome from an in-flight operation does not resurrect it
        h.router.monitor().record_outcome(&id, 5.0, false).await;
        assert!(h.router.monitor().health_of(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_from_settings_builds_configured_replicas() {
        let mut settings = Settings::default();
        settings
            .replicas
            .push(EndpointConfig::new("postgres://r1:5432/app", "us-east-1"));
        settings
            .replicas
            .push(EndpointConfig::new("postgres://r2:5432/app", "eu-west-1"));

        let router = QueryRouter::from_settings(&settings).await.unwrap();
        assert_eq!(router.registry().list_replicas().await.len(), 2);
        assert_eq!(router.policy(), SelectionPolicy::LatencyBased);
        assert_eq!(router.read_options().max_retries, 2);
        assert!(!router.monitor().is_running());
    }

    #[tokio::test]
    async fn test_monitor_loop_drives_reads_off_failing_replicas() {
        // Full-loop integration: a probe that always fails marks the
        // replica unhealthy, after which reads go straight to the primary.
        let registry = EndpointRegistry::new(EndpointConfig::new(
            "postgres://primary:5432/app",
            "us-east-1",
        ))
        .unwrap()
        .into_shared();
        registry
            .add_replica(EndpointConfig::new("postgres://r1:5432/app", "us-east-1"))
            .await
            .unwrap();

        let sink = Arc::new(CollectingSink::default());
        let events: Arc<dyn EventSink> = Arc::clone(&sink) as Arc<dyn EventSink>;
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::new(MockProbe::always_failing()),
            Arc::clone(&events),
            Duration::from_millis(10),
            Duration::from_millis(5),
        ));
        let router = QueryRouter::new(registry, Arc::clone(&monitor), RoutingConfig::default(), events);

        monitor.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        monitor.stop();

        let (calls, log) = call_log();
        router
            .execute_read(ReadOptions::default(), move |endpoint| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(endpoint.id.clone());
                    Ok::<_, BoxError>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec![PRIMARY_ID.to_string()]);
    }
}
