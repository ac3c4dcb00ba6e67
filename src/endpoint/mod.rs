/// Endpoint registry: the primary endpoint plus the dynamic replica set
use crate::config::ConfigError;
use crate::utils::generate_id;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Reserved identifier for the primary endpoint, also used as the
/// distribution key for primary-routed operations.
pub const PRIMARY_ID: &str = "primary";

/// Static description of a database endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Connection URL handed to operation closures
    pub url: String,
    /// Region/locality tag used for affinity routing
    pub locality: String,
    /// Lower value preferred when endpoints are otherwise equal
    #[serde(default)]
    pub priority: u32,
    /// Capacity hint, advisory only
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Advisory per-endpoint probe interval; the monitor runs one global tick
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// Whether the endpoint currently participates in routing
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_connections() -> usize {
    100
}

fn default_health_check_interval_ms() -> u64 {
    30_000
}

fn default_enabled() -> bool {
    true
}

impl EndpointConfig {
    pub fn new<S: Into<String>>(url: S, locality: S) -> Self {
        Self {
            url: url.into(),
            locality: locality.into(),
            priority: 0,
            max_connections: default_max_connections(),
            health_check_interval_ms: default_health_check_interval_ms(),
            enabled: true,
        }
    }

    /// Validate the configuration before registration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint url cannot be empty".to_string(),
            ));
        }
        if self.locality.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint locality cannot be empty".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "endpoint max_connections must be greater than 0".to_string(),
            ));
        }
        if self.health_check_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "endpoint health_check_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Role of an endpoint in the cluster, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Primary,
    Replica,
}

/// A routable database endpoint. Cloned copies of this value are the
/// opaque handle passed to operation closures.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub id: String,
    pub role: EndpointRole,
    pub config: EndpointConfig,
}

impl Endpoint {
    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn locality(&self) -> &str {
        &self.config.locality
    }

    pub fn is_replica(&self) -> bool {
        self.role == EndpointRole::Replica
    }
}

/// Registry holding the primary endpoint and the dynamic replica set.
/// Shared-read by the monitor, selector, and router; mutated only through
/// the registration API.
pub struct EndpointRegistry {
    primary: Endpoint,
    replicas: RwLock<Vec<Endpoint>>,
}

impl EndpointRegistry {
    /// Create a registry with a validated primary endpoint
    pub fn new(primary: EndpointConfig) -> Result<Self, ConfigError> {
        primary.validate()?;
        Ok(Self {
            primary: Endpoint {
                id: PRIMARY_ID.to_string(),
                role: EndpointRole::Primary,
                config: primary,
            },
            replicas: RwLock::new(Vec::new()),
        })
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn primary(&self) -> &Endpoint {
        &self.primary
    }

    /// Register a replica. The id is derived from locality and
    /// registration time to avoid collisions.
    pub async fn add_replica(&self, config: EndpointConfig) -> Result<String, ConfigError> {
        config.validate()?;
        let id = generate_id(&config.locality);
        let endpoint = Endpoint {
            id: id.clone(),
            role: EndpointRole::Replica,
            config,
        };
        let mut replicas = self.replicas.write().await;
        replicas.push(endpoint);
        Ok(id)
    }

    /// Remove a replica. Returns false if not found. Operations already
    /// dispatched to the endpoint are unaffected.
    pub async fn remove_replica(&self, id: &str) -> bool {
        let mut replicas = self.replicas.write().await;
        let before = replicas.len();
        replicas.retain(|e| e.id != id);
        replicas.len() != before
    }

    /// Toggle routing participation for a replica
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut replicas = self.replicas.write().await;
        match replicas.iter_mut().find(|e| e.id == id) {
            Some(endpoint) => {
                endpoint.config.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Replicas in registration order
    pub async fn list_replicas(&self) -> Vec<Endpoint> {
        let replicas = self.replicas.read().await;
        replicas.clone()
    }

    /// Every registered endpoint, primary first
    pub async fn all_endpoints(&self) -> Vec<Endpoint> {
        let replicas = self.replicas.read().await;
        let mut endpoints = Vec::with_capacity(replicas.len() + 1);
        endpoints.push(self.primary.clone());
        endpoints.extend(replicas.iter().cloned());
        endpoints
    }

    pub async fn get(&self, id: &str) -> Option<Endpoint> {
        if id == self.primary.id {
            return Some(self.primary.clone());
        }
        let replicas = self.replicas.read().await;
        replicas.iter().find(|e| e.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(EndpointConfig::new("postgres://primary:5432/app", "us-east-1"))
            .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(EndpointConfig::new("postgres://db:5432", "us-east-1")
            .validate()
            .is_ok());
        assert!(EndpointConfig::new("", "us-east-1").validate().is_err());
        assert!(EndpointConfig::new("postgres://db:5432", "")
            .validate()
            .is_err());

        let mut config = EndpointConfig::new("postgres://db:5432", "us-east-1");
        config.health_check_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_add_and_list_preserves_registration_order() {
        let registry = registry();
        let id1 = registry
            .add_replica(EndpointConfig::new("postgres://r1:5432", "us-east-1"))
            .await
            .unwrap();
        let id2 = registry
            .add_replica(EndpointConfig::new("postgres://r2:5432", "eu-west-1"))
            .await
            .unwrap();

        assert_ne!(id1, id2);
        let replicas = registry.list_replicas().await;
        assert_eq!(replicas.len(), 2);
        assert_eq!(replicas[0].id, id1);
        assert_eq!(replicas[1].id, id2);
        assert!(replicas.iter().all(|r| r.is_replica()));
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_config() {
        let registry = registry();
        let result = registry
            .add_replica(EndpointConfig::new("postgres://r1:5432", ""))
            .await;
        assert!(result.is_err());
        assert!(registry.list_replicas().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_replica() {
        let registry = registry();
        let id = registry
            .add_replica(EndpointConfig::new("postgres://r1:5432", "us-east-1"))
            .await
            .unwrap();

        assert!(registry.remove_replica(&id).await);
        assert!(!registry.remove_replica(&id).await);
        assert!(registry.list_replicas().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_enabled() {
        let registry = registry();
        let id = registry
            .add_replica(EndpointConfig::new("postgres://r1:5432", "us-east-1"))
            .await
            .unwrap();

        assert!(registry.set_enabled(&id, false).await);
        let replicas = registry.list_replicas().await;
        assert!(!replicas[0].config.enabled);
        assert!(!registry.set_enabled("missing", false).await);
    }

    #[tokio::test]
    async fn test_all_endpoints_puts_primary_first() {
        let registry = registry();
        registry
            .add_replica(EndpointConfig::new("postgres://r1:5432", "us-east-1"))
            .await
            .unwrap();

        let all = registry.all_endpoints().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, PRIMARY_ID);
        assert_eq!(all[0].role, EndpointRole::Primary);
    }
}
