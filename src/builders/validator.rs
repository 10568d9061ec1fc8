//! Builder pattern for RegistryValidator

use crate::config::RegistryConfig;
use crate::errors::{ConfigError, Result};
use crate::registry::{
    OnchainRegistry, OperationsDatabase, RegistryBackend, RegistrySnapshotCache, RegistryValidator,
    RetryPolicy,
};
use crate::utils::Network;
use std::sync::Arc;

/// Builder for creating RegistryValidator instances with a fluent API
#[derive(Default)]
pub struct RegistryValidatorBuilder {
    config: Option<RegistryConfig>,
    network: Option<Network>,
    backend: Option<Arc<dyn RegistryBackend>>,
    database: Option<Arc<OperationsDatabase>>,
    cache: Option<Arc<RegistrySnapshotCache>>,
    retry: Option<RetryPolicy>,
}

impl RegistryValidatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the registries described by `config`, over RPC.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            network: Some(config.network),
            retry: Some(config.retry.clone()),
            config: Some(config.clone()),
            ..Self::default()
        }
    }

    /// Validate against an explicit backend, e.g. an `InMemoryRegistry`.
    pub fn with_backend(mut self, network: Network, backend: Arc<dyn RegistryBackend>) -> Self {
        self.network = Some(network);
        self.backend = Some(backend);
        self
    }

    /// Reuse an already built database instead of building one.
    pub fn with_database(mut self, database: Arc<OperationsDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    /// Share a snapshot cache with other validators.
    pub fn with_cache(mut self, cache: Arc<RegistrySnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the RegistryValidator
    ///
    /// # Errors
    ///
    /// Returns an error if neither a configuration nor a backend was provided,
    /// if a provided database belongs to another network, or if connecting
    /// to the configured registries fails.
    pub fn build(self) -> Result<RegistryValidator> {
        let network = self.network.ok_or_else(|| ConfigError::Incomplete {
            message: "a registry configuration or backend is required to build RegistryValidator"
                .to_string(),
        })?;

        let backend: Arc<dyn RegistryBackend> = match (self.backend, &self.config) {
            (Some(backend), _) => backend,
            (None, Some(config)) => Arc::new(OnchainRegistry::connect(config)?),
            (None, None) => {
                return Err(ConfigError::Incomplete {
                    message: "no registry backend configured".to_string(),
                }
                .into())
            }
        };

        let database = match self.database {
            Some(database) if database.network() != network => {
                return Err(ConfigError::Incomplete {
                    message: format!(
                        "database for {} cannot validate registries on {}",
                        database.network(),
                        network
                    ),
                }
                .into())
            }
            Some(database) => database,
            None => Arc::new(OperationsDatabase::for_network(network)),
        };

        tracing::debug!(
            network = %network,
            operations = database.operations().count(),
            "Built registry validator"
        );

        Ok(RegistryValidator::new(
            database,
            backend,
            self.cache.unwrap_or_default(),
            self.retry.unwrap_or_default(),
        ))
    }
}
