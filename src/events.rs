/// Structured routing and health events
///
/// The router and health monitor emit events through an injected sink
/// instead of logging ad hoc, so operational consumers and tests can
/// observe routing decisions directly.
use crate::balance::SelectionPolicy;
use crate::health::HealthStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    /// A health probe finished for one endpoint
    ProbeCompleted {
        endpoint: String,
        success: bool,
        latency_ms: f64,
    },
    /// An endpoint crossed a health classification boundary
    StatusChanged {
        endpoint: String,
        from: HealthStatus,
        to: HealthStatus,
    },
    /// A read completed on a replica
    ReadRouted { endpoint: String, latency_ms: f64 },
    /// A replica attempt failed; the router may retry or fall back
    ReplicaAttemptFailed {
        endpoint: String,
        attempt: u32,
        error: String,
    },
    /// A read completed on the primary after replica attempts were exhausted
    FailedOver {
        replica_attempts: u32,
        latency_ms: f64,
    },
    /// A write completed on the primary
    WriteExecuted { latency_ms: f64 },
    EndpointAdded { endpoint: String, locality: String },
    EndpointRemoved { endpoint: String },
    PolicyChanged { policy: SelectionPolicy },
}

/// Sink for router events. Implementations must be cheap and non-blocking.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RouterEvent);
}

/// Production sink forwarding events to `tracing`
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RouterEvent) {
        match event {
            RouterEvent::ProbeCompleted {
                endpoint,
                success,
                latency_ms,
            } => {
                tracing::debug!(%endpoint, success, latency_ms, "probe completed");
            }
            RouterEvent::StatusChanged { endpoint, from, to } => {
                tracing::warn!(%endpoint, %from, %to, "endpoint status changed");
            }
            RouterEvent::ReadRouted {
                endpoint,
                latency_ms,
            } => {
                tracing::debug!(%endpoint, latency_ms, "read routed");
            }
            RouterEvent::ReplicaAttemptFailed {
                endpoint,
                attempt,
                error,
            } => {
                tracing::warn!(%endpoint, attempt, %error, "replica attempt failed");
            }
            RouterEvent::FailedOver {
                replica_attempts,
                latency_ms,
            } => {
                tracing::warn!(replica_attempts, latency_ms, "read failed over to primary");
            }
            RouterEvent::WriteExecuted { latency_ms } => {
                tracing::debug!(latency_ms, "write executed on primary");
            }
            RouterEvent::EndpointAdded { endpoint, locality } => {
                tracing::info!(%endpoint, %locality, "replica endpoint added");
            }
            RouterEvent::EndpointRemoved { endpoint } => {
                tracing::info!(%endpoint, "replica endpoint removed");
            }
            RouterEvent::PolicyChanged { policy } => {
                tracing::info!(%policy, "selection policy changed");
            }
        }
    }
}
