//! Rumbo - health-aware query router for replicated database clusters
//!
//! Rumbo holds a primary database endpoint plus a dynamic set of read
//! replicas, monitors replica health on a background tick, selects a
//! replica per read under a pluggable load-balancing policy, retries and
//! fails over to the primary on replica failure, and aggregates routing
//! statistics for operational visibility.
//!
//! Reads and writes enter through two calls on [`QueryRouter`]:
//! `execute_read` dispatches an opaque operation closure to a selected
//! replica with bounded retries and primary fallback; `execute_write`
//! goes unconditionally to the primary.

pub mod balance;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod health;
pub mod router;
pub mod stats;
pub mod utils;

pub use balance::{ReplicaSelector, SelectionPolicy};
pub use config::Settings;
pub use endpoint::{Endpoint, EndpointConfig, EndpointRegistry, EndpointRole, PRIMARY_ID};
pub use error::{BoxError, RouterError, RouterResult};
pub use events::{EventSink, RouterEvent, TracingSink};
pub use health::probe::{EndpointProbe, TcpProbe};
pub use health::{EndpointHealth, HealthMonitor, HealthStatus};
pub use router::{QueryRouter, ReadOptions};
pub use stats::{RoutingStats, StatsAggregator};
