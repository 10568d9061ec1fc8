//! Configuration loading and validation.
//!
//! Two sources feed the registry tooling:
//!
//! - `RegistryConfig`: how to reach one network's deployed registries (RPC
//!   endpoint, registry addresses, optional signer, retry policy), loaded from
//!   `OPS_*` environment variables.
//! - `DeploymentConfig`: the network-keyed deployment records of every
//!   contract, used to resolve the addresses services are expected at.

use crate::errors::{ConfigError, Result};
use crate::registry::RetryPolicy;
use crate::utils::Network;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Record key of the operations registry in a deployment file.
pub const OPERATIONS_REGISTRY_KEY: &str = "OperationsRegistry";
/// Record key of the service registry in a deployment file.
pub const SERVICE_REGISTRY_KEY: &str = "ServiceRegistry";

/// Connection settings for one network's deployed registries.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub network: Network,
    pub rpc_url: Url,
    pub operations_registry: Address,
    pub service_registry: Address,
    /// Signer for pushes. Without one the registries are read-only.
    pub signer: Option<PrivateKeySigner>,
    pub retry: RetryPolicy,
}

impl RegistryConfig {
    /// Read-only configuration with the default retry policy.
    pub fn new(
        network: Network,
        rpc_url: Url,
        operations_registry: Address,
        service_registry: Address,
    ) -> Self {
        Self {
            network,
            rpc_url,
            operations_registry,
            service_registry,
            signer: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_signer(mut self, signer: PrivateKeySigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registry addresses taken from a deployment file instead of the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingNetwork` / `MissingContract` when the
    /// file lacks the network or either registry record.
    pub fn from_deployment(network: Network, rpc_url: Url, deployment: &DeploymentConfig) -> Result<Self> {
        Ok(Self::new(
            network,
            rpc_url,
            deployment.address(network, OPERATIONS_REGISTRY_KEY)?,
            deployment.address(network, SERVICE_REGISTRY_KEY)?,
        ))
    }

    /// Load the configuration for `network` from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `OPS_RPC_URL`: JSON-RPC endpoint of the network
    /// - `OPS_OPERATIONS_REGISTRY`: address of the operations registry
    /// - `OPS_SERVICE_REGISTRY`: address of the service registry
    ///
    /// ## Optional
    /// - `OPS_SIGNER_PRIVATE_KEY`: key used to push (read-only without it)
    /// - `OPS_MAX_RETRIES`: transport retries per read (default: 3)
    /// - `OPS_RETRY_DELAY_MS`: first retry delay (default: 200)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - The URL, an address or the private key is malformed
    /// - Retry settings are not valid integers
    pub fn from_env(network: Network) -> Result<Self> {
        tracing::info!(network = %network, "Loading registry configuration from environment");

        let rpc_url = Self::parse_url(&Self::required("OPS_RPC_URL")?, "OPS_RPC_URL")?;
        tracing::debug!(host = ?rpc_url.host_str(), "RPC endpoint loaded");

        let operations_registry = Self::parse_and_validate_address(
            &Self::required("OPS_OPERATIONS_REGISTRY")?,
            "OPS_OPERATIONS_REGISTRY",
        )?;
        let service_registry = Self::parse_and_validate_address(
            &Self::required("OPS_SERVICE_REGISTRY")?,
            "OPS_SERVICE_REGISTRY",
        )?;

        let mut config = Self::new(network, rpc_url, operations_registry, service_registry);

        if let Ok(key_str) = env::var("OPS_SIGNER_PRIVATE_KEY") {
            let signer = Self::parse_and_validate_private_key(&key_str, "OPS_SIGNER_PRIVATE_KEY")?;
            tracing::debug!(signer = %signer.address(), "Signer loaded; pushes enabled");
            config.signer = Some(signer);
        } else {
            tracing::debug!("No signer configured; registries are read-only");
        }

        if let Some(max_retries) = Self::optional_number::<u32>("OPS_MAX_RETRIES")? {
            config.retry.max_retries = max_retries;
        }
        if let Some(delay_ms) = Self::optional_number::<u64>("OPS_RETRY_DELAY_MS")? {
            config.retry.initial_delay_ms = delay_ms;
        }

        tracing::info!(
            network = %network,
            operations_registry = %config.operations_registry,
            service_registry = %config.service_registry,
            can_write = config.signer.is_some(),
            max_retries = config.retry.max_retries,
            "Registry configuration loaded successfully"
        );

        Ok(config)
    }

    fn required(name: &str) -> Result<String> {
        env::var(name).map_err(|_| {
            tracing::error!(variable = name, "Required environment variable not found");
            ConfigError::MissingVariable {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn optional_number<T: FromStr>(name: &str) -> Result<Option<T>> {
        match env::var(name) {
            Err(_) => Ok(None),
            Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: format!("'{raw}' is not a valid non-negative integer"),
                }
                .into()
            }),
        }
    }

    fn parse_url(raw: &str, var_name: &str) -> Result<Url> {
        if raw.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: var_name.to_string(),
                reason: "cannot be empty".to_string(),
            }
            .into());
        }
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
            name: var_name.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                name: var_name.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            }
            .into());
        }
        Ok(url)
    }

    /// Parse and validate a private key from a string
    fn parse_and_validate_private_key(key_str: &str, var_name: &str) -> Result<PrivateKeySigner> {
        let clean_key = key_str.trim().trim_start_matches("0x");

        if clean_key.len() != 64 {
            return Err(ConfigError::InvalidPrivateKey {
                message: format!("{var_name} must be 64 hex characters (32 bytes)"),
            }
            .into());
        }

        if !clean_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidPrivateKey {
                message: format!("{var_name} contains invalid hex characters"),
            }
            .into());
        }

        PrivateKeySigner::from_str(clean_key).map_err(|e| {
            ConfigError::InvalidPrivateKey {
                message: format!("Failed to parse {var_name}: {e}"),
            }
            .into()
        })
    }

    fn parse_and_validate_address(address_str: &str, var_name: &str) -> Result<Address> {
        let address = crate::utils::string_to_h160(address_str.trim()).map_err(|e| {
            ConfigError::InvalidValue {
                name: var_name.to_string(),
                reason: e.to_string(),
            }
        })?;
        if address.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: var_name.to_string(),
                reason: "zero address".to_string(),
            }
            .into());
        }
        Ok(address)
    }
}

/// One deployed (or externally provided) contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub name: String,
    pub address: Address,
    /// Whether the deploy task deploys this contract or only references it.
    pub deploy: bool,
    /// Name the contract is registered under in the service registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_registry_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor_args: Option<Vec<serde_json::Value>>,
    /// Earlier addresses, most recent last.
    #[serde(default)]
    pub history: Vec<Address>,
}

/// Deployment records of one network, keyed by record name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkDeployment {
    records: BTreeMap<String, ContractRecord>,
}

impl NetworkDeployment {
    pub fn record(&self, key: &str) -> Option<&ContractRecord> {
        self.records.get(key)
    }

    /// Current address of the record under `key`; `None` when the record is
    /// absent or holds the zero address.
    pub fn address(&self, key: &str) -> Option<Address> {
        self.record(key)
            .map(|record| record.address)
            .filter(|address| !address.is_zero())
    }

    /// Service registry name → address of every record that registers
    /// itself as a service.
    pub fn services(&self) -> BTreeMap<&str, Address> {
        self.records
            .values()
            .filter(|record| !record.address.is_zero())
            .filter_map(|record| {
                record
                    .service_registry_name
                    .as_deref()
                    .map(|service| (service, record.address))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Deployment records of every network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentConfig {
    networks: BTreeMap<Network, NetworkDeployment>,
}

impl DeploymentConfig {
    /// Parse a deployment file's JSON content.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        tracing::debug!(
            networks = config.networks.len(),
            "Parsed deployment configuration"
        );
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "Loading deployment configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MissingNetwork` when the file has no section for
    /// `network`.
    pub fn network(&self, network: Network) -> Result<&NetworkDeployment> {
        self.networks.get(&network).ok_or_else(|| {
            ConfigError::MissingNetwork {
                network: network.to_string(),
            }
            .into()
        })
    }

    /// Address of record `key` on `network`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingNetwork` or `ConfigError::MissingContract`.
    pub fn address(&self, network: Network, key: &str) -> Result<Address> {
        self.network(network)?.address(key).ok_or_else(|| {
            ConfigError::MissingContract {
                network: network.to_string(),
                name: key.to_string(),
            }
            .into()
        })
    }

    /// Service names expected on `network` that the file gives no address for.
    pub fn missing_services<'a>(&self, network: Network, expected: &[&'a str]) -> Vec<&'a str> {
        let services = self
            .networks
            .get(&network)
            .map(NetworkDeployment::services)
            .unwrap_or_default();
        expected
            .iter()
            .copied()
            .filter(|name| !services.contains_key(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Use a mutex to ensure tests don't interfere with each other's environment variables
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    const TEST_KEY: &str = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

    fn clear_env() {
        for name in [
            "OPS_RPC_URL",
            "OPS_OPERATIONS_REGISTRY",
            "OPS_SERVICE_REGISTRY",
            "OPS_SIGNER_PRIVATE_KEY",
            "OPS_MAX_RETRIES",
            "OPS_RETRY_DELAY_MS",
        ] {
            env::remove_var(name);
        }
    }

    fn set_required_env() {
        env::set_var("OPS_RPC_URL", "http://localhost:8545");
        env::set_var(
            "OPS_OPERATIONS_REGISTRY",
            "0x1111111111111111111111111111111111111111",
        );
        env::set_var(
            "OPS_SERVICE_REGISTRY",
            "0x2222222222222222222222222222222222222222",
        );
    }

    const DEPLOYMENT: &str = r#"{
        "mainnet": {
            "ServiceRegistry": {
                "name": "ServiceRegistry",
                "address": "0x2222222222222222222222222222222222222222",
                "deploy": true,
                "constructorArgs": [0],
                "history": []
            },
            "OperationsRegistry": {
                "name": "OperationsRegistry",
                "address": "0x1111111111111111111111111111111111111111",
                "deploy": true,
                "serviceRegistryName": "OperationsRegistry_2",
                "history": ["0x3333333333333333333333333333333333333333"]
            },
            "MCD_FLASH": {
                "name": "MCD_FLASH",
                "address": "0x60744434d6339a6b27d73d9eda62b6f66a0a04fa",
                "deploy": false,
                "serviceRegistryName": "MCD_FLASH"
            },
            "Swap": {
                "name": "Swap",
                "address": "0x0000000000000000000000000000000000000000",
                "deploy": true,
                "serviceRegistryName": "Swap"
            }
        }
    }"#;

    #[test]
    fn test_config_from_env_missing_rpc_url() {
        let _guard = TEST_MUTEX.lock().unwrap();
        clear_env();

        let result = RegistryConfig::from_env(Network::Mainnet);
        assert!(result.unwrap_err().to_string().contains("OPS_RPC_URL"));
    }

    #[test]
    fn test_config_from_env_read_only() {
        let _guard = TEST_MUTEX.lock().unwrap();
        clear_env();
        set_required_env();

        let config = RegistryConfig::from_env(Network::Base).unwrap();
        assert_eq!(config.network, Network::Base);
        assert!(config.signer.is_none());
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.operations_registry, Address::repeat_byte(0x11));

        clear_env();
    }

    #[test]
    fn test_config_from_env_with_signer_and_retries() {
        let _guard = TEST_MUTEX.lock().unwrap();
        clear_env();
        set_required_env();
        env::set_var("OPS_SIGNER_PRIVATE_KEY", format!("0x{TEST_KEY}"));
        env::set_var("OPS_MAX_RETRIES", "5");
        env::set_var("OPS_RETRY_DELAY_MS", "50");

        let config = RegistryConfig::from_env(Network::Mainnet).unwrap();
        assert!(config.signer.is_some());
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 50);

        clear_env();
    }

    #[test]
    fn test_config_from_env_invalid_values() {
        let _guard = TEST_MUTEX.lock().unwrap();
        clear_env();
        set_required_env();

        env::set_var("OPS_SIGNER_PRIVATE_KEY", "invalid_key");
        let result = RegistryConfig::from_env(Network::Mainnet);
        assert!(result.unwrap_err().to_string().contains("64 hex characters"));
        env::remove_var("OPS_SIGNER_PRIVATE_KEY");

        env::set_var("OPS_MAX_RETRIES", "-1");
        assert!(RegistryConfig::from_env(Network::Mainnet).is_err());
        env::remove_var("OPS_MAX_RETRIES");

        env::set_var("OPS_RPC_URL", "ws://localhost:8546");
        assert!(RegistryConfig::from_env(Network::Mainnet).is_err());

        env::set_var("OPS_RPC_URL", "http://localhost:8545");
        env::set_var("OPS_SERVICE_REGISTRY", "0x0000000000000000000000000000000000000000");
        assert!(RegistryConfig::from_env(Network::Mainnet).is_err());

        clear_env();
    }

    #[test]
    fn test_parse_private_key_validation() {
        let invalid_keys = vec![
            ("", "empty key"),
            ("123", "too short"),
            ("1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdefgg", "invalid hex"),
        ];

        for (key, description) in invalid_keys {
            let result = RegistryConfig::parse_and_validate_private_key(key, "TEST_KEY");
            assert!(result.is_err(), "Expected error for {}: {}", description, key);
        }
        assert!(RegistryConfig::parse_and_validate_private_key(TEST_KEY, "TEST_KEY").is_ok());
    }

    #[test]
    fn test_signer_rejection_is_a_config_error() {
        // Well-formed hex, but zero is not a valid secp256k1 scalar.
        let zero_key = "0".repeat(64);
        assert!(matches!(
            RegistryConfig::parse_and_validate_private_key(&zero_key, "TEST_KEY"),
            Err(crate::errors::OpsError::Config(ConfigError::InvalidPrivateKey { .. }))
        ));
    }

    #[test]
    fn test_deployment_records() {
        let deployment = DeploymentConfig::from_json(DEPLOYMENT).unwrap();
        let mainnet = deployment.network(Network::Mainnet).unwrap();

        assert_eq!(mainnet.len(), 4);
        let registry = mainnet.record(OPERATIONS_REGISTRY_KEY).unwrap();
        assert_eq!(registry.history, vec![Address::repeat_byte(0x33)]);
        assert_eq!(
            mainnet.record(SERVICE_REGISTRY_KEY).unwrap().constructor_args,
            Some(vec![serde_json::json!(0)])
        );

        // Zero addresses are not deployed yet and do not count as services.
        let services = mainnet.services();
        assert_eq!(services.len(), 2);
        assert!(services.contains_key("MCD_FLASH"));
        assert!(deployment.address(Network::Mainnet, "Swap").is_err());

        assert_eq!(
            deployment.missing_services(Network::Mainnet, &["MCD_FLASH", "Swap", "WETH"]),
            vec!["Swap", "WETH"]
        );
        assert!(deployment.network(Network::Base).is_err());
    }

    #[test]
    fn test_registry_config_from_deployment_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEPLOYMENT.as_bytes()).unwrap();

        let deployment = DeploymentConfig::from_file(file.path()).unwrap();
        let url = Url::parse("https://rpc.example.org").unwrap();
        let config = RegistryConfig::from_deployment(Network::Mainnet, url.clone(), &deployment).unwrap();

        assert_eq!(config.operations_registry, Address::repeat_byte(0x11));
        assert_eq!(config.service_registry, Address::repeat_byte(0x22));
        assert!(RegistryConfig::from_deployment(Network::Optimism, url, &deployment).is_err());
    }
}
