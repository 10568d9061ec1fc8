//! Registry backend over an alloy provider.
//!
//! The operations registry reverts with `Op-Registry/operation-doesnt-exist`
//! for unknown names. That revert is decoded here, once, and turned into
//! `Ok(None)`; every other failure is classified into a `RegistryError`.

use crate::actions::abi::{IOperationsRegistry, IServiceRegistry};
use crate::config::RegistryConfig;
use crate::errors::{RegistryError, Result};
use crate::operations::OperationDefinition;
use crate::registry::backend::{DeployedOperation, RegistryBackend};
use alloy::network::EthereumWallet;
use alloy::primitives::{keccak256, Address};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol_types::{Revert, SolError};
use alloy::transports::RpcError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Revert reason of `getOperation` for names that were never added.
pub const OPERATION_NOT_FOUND: &str = "Op-Registry/operation-doesnt-exist";

/// Deployed operations and service registries reached over JSON-RPC.
#[derive(Clone)]
pub struct OnchainRegistry {
    provider: DynProvider,
    operations_registry: Address,
    service_registry: Address,
    can_write: bool,
    /// Shared by clones of this backend.
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for OnchainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnchainRegistry")
            .field("operations_registry", &self.operations_registry)
            .field("service_registry", &self.service_registry)
            .field("can_write", &self.can_write)
            .finish()
    }
}

impl OnchainRegistry {
    pub fn new(
        provider: DynProvider,
        operations_registry: Address,
        service_registry: Address,
        can_write: bool,
    ) -> Self {
        Self {
            provider,
            operations_registry,
            service_registry,
            can_write,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Connect over HTTP. Without a signer in the config the backend is
    /// read-only and writes fail with `RegistryError::ReadOnly`.
    pub fn connect(config: &RegistryConfig) -> Result<Self> {
        let url = config.rpc_url.clone();
        let (provider, can_write) = match &config.signer {
            Some(signer) => {
                let wallet = EthereumWallet::from(signer.clone());
                let provider = ProviderBuilder::new().wallet(wallet).connect_http(url).erased();
                (provider, true)
            }
            None => (ProviderBuilder::new().connect_http(url).erased(), false),
        };

        tracing::info!(
            network = %config.network,
            operations_registry = %config.operations_registry,
            service_registry = %config.service_registry,
            can_write = can_write,
            "Connected to deployed registries"
        );

        Ok(Self::new(
            provider,
            config.operations_registry,
            config.service_registry,
            can_write,
        ))
    }

    fn ensure_writable(&self, operation: &str) -> std::result::Result<(), RegistryError> {
        if self.can_write {
            Ok(())
        } else {
            Err(RegistryError::ReadOnly {
                operation: operation.to_string(),
            })
        }
    }
}

/// Revert reason carried by a contract error, if the call reverted with
/// `Error(string)`.
fn revert_reason(error: &alloy::contract::Error) -> Option<String> {
    let data = error.as_revert_data()?;
    Revert::abi_decode(&data).ok().map(|revert| revert.reason)
}

fn classify(operation: &str, error: alloy::contract::Error) -> RegistryError {
    if let Some(reason) = revert_reason(&error) {
        return RegistryError::Reverted {
            operation: operation.to_string(),
            reason,
        };
    }
    if error.as_revert_data().is_some() {
        return RegistryError::Reverted {
            operation: operation.to_string(),
            reason: "custom error".to_string(),
        };
    }

    match error {
        alloy::contract::Error::TransportError(RpcError::Transport(kind)) => RegistryError::Transport {
            operation: operation.to_string(),
            cause: kind.to_string(),
        },
        other => RegistryError::Rpc {
            operation: operation.to_string(),
            cause: other.to_string(),
        },
    }
}

#[async_trait]
impl RegistryBackend for OnchainRegistry {
    async fn get_operation(
        &self,
        name: &str,
    ) -> std::result::Result<Option<DeployedOperation>, RegistryError> {
        let registry = IOperationsRegistry::new(self.operations_registry, self.provider.clone());

        match registry.getOperation(name.to_string()).call().await {
            Ok(stored) => Ok(Some(DeployedOperation {
                actions: stored.actions,
                optional: stored.optional,
            })),
            Err(error) => {
                if revert_reason(&error).as_deref() == Some(OPERATION_NOT_FOUND) {
                    tracing::debug!(operation = name, "Operation not registered");
                    return Ok(None);
                }
                Err(classify("getOperation", error))
            }
        }
    }

    async fn add_operation(
        &self,
        definition: &OperationDefinition,
    ) -> std::result::Result<(), RegistryError> {
        self.ensure_writable("addOperation")?;
        let registry = IOperationsRegistry::new(self.operations_registry, self.provider.clone());

        let stored = IOperationsRegistry::StoredOperation {
            actions: definition.hashes(),
            optional: definition.optional_flags(),
            name: definition.name.clone(),
        };

        let pending = registry
            .addOperation(stored)
            .send()
            .await
            .map_err(|error| classify("addOperation", error))?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(
            operation = %definition.name,
            tx_hash = %tx_hash,
            "Submitted addOperation, waiting for receipt"
        );

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|error| RegistryError::ConfirmationFailed {
                operation: "addOperation".to_string(),
                cause: error.to_string(),
            })?;

        if !receipt.status() {
            return Err(RegistryError::TransactionFailed {
                operation: "addOperation".to_string(),
                tx_hash: tx_hash.to_string(),
            });
        }
        Ok(())
    }

    async fn get_service(&self, name: &str) -> std::result::Result<Option<Address>, RegistryError> {
        let registry = IServiceRegistry::new(self.service_registry, self.provider.clone());
        let address = registry
            .getRegisteredService(name.to_string())
            .call()
            .await
            .map_err(|error| classify("getRegisteredService", error))?;

        Ok((!address.is_zero()).then_some(address))
    }

    async fn add_service(
        &self,
        name: &str,
        address: Address,
    ) -> std::result::Result<(), RegistryError> {
        self.ensure_writable("addNamedService")?;
        let registry = IServiceRegistry::new(self.service_registry, self.provider.clone());

        let pending = registry
            .addNamedService(keccak256(name.as_bytes()), address)
            .send()
            .await
            .map_err(|error| classify("addNamedService", error))?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(
            service = name,
            address = %address,
            tx_hash = %tx_hash,
            "Submitted addNamedService, waiting for receipt"
        );

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|error| RegistryError::ConfirmationFailed {
                operation: "addNamedService".to_string(),
                cause: error.to_string(),
            })?;

        if !receipt.status() {
            return Err(RegistryError::TransactionFailed {
                operation: "addNamedService".to_string(),
                tx_hash: tx_hash.to_string(),
            });
        }
        Ok(())
    }

    fn registry_id(&self) -> String {
        format!("{}/{}", self.operations_registry, self.service_registry)
    }

    fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;

    #[test]
    fn test_not_found_revert_decodes() {
        let revert = Revert {
            reason: OPERATION_NOT_FOUND.to_string(),
        };
        let data = Bytes::from(revert.abi_encode());
        let decoded = Revert::abi_decode(&data).unwrap();
        assert_eq!(decoded.reason, OPERATION_NOT_FOUND);
    }

    #[test]
    fn test_read_only_backend_refuses_writes() {
        let provider = ProviderBuilder::new()
            .connect_http("http://localhost:8545".parse().unwrap())
            .erased();
        let registry = OnchainRegistry::new(provider, Address::ZERO, Address::ZERO, false);

        assert!(matches!(
            registry.ensure_writable("addOperation"),
            Err(RegistryError::ReadOnly { .. })
        ));
    }

    #[tokio::test]
    async fn test_identity_and_write_lock_follow_deployment() {
        let provider = ProviderBuilder::new()
            .connect_http("http://localhost:8545".parse().unwrap())
            .erased();
        let registry = OnchainRegistry::new(
            provider.clone(),
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            false,
        );
        let staging = OnchainRegistry::new(
            provider,
            Address::repeat_byte(0x03),
            Address::repeat_byte(0x02),
            false,
        );
        assert_ne!(registry.registry_id(), staging.registry_id());

        let clone = registry.clone();
        assert_eq!(clone.registry_id(), registry.registry_id());
        let _guard = registry.write_lock().lock().await;
        assert!(clone.write_lock().try_lock().is_err());
        assert!(staging.write_lock().try_lock().is_ok());
    }
}
