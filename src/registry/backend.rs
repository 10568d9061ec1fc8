//! Access to a deployed registry pair (operations + services).
//!
//! Reads return `Ok(None)` when the entry is not registered, so callers never
//! inspect error messages to tell "missing" from "failed". Writes return once
//! the change is confirmed.

use crate::errors::RegistryError;
use crate::operations::OperationDefinition;
use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

/// An operation as stored by the operations registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedOperation {
    pub actions: Vec<B256>,
    pub optional: Vec<bool>,
}

impl From<&OperationDefinition> for DeployedOperation {
    fn from(definition: &OperationDefinition) -> Self {
        Self {
            actions: definition.hashes(),
            optional: definition.optional_flags(),
        }
    }
}

#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Deployed action hashes and optional flags of `name`.
    async fn get_operation(&self, name: &str) -> Result<Option<DeployedOperation>, RegistryError>;

    /// Register `definition` and wait for confirmation.
    async fn add_operation(&self, definition: &OperationDefinition) -> Result<(), RegistryError>;

    /// Address registered for a service name.
    async fn get_service(&self, name: &str) -> Result<Option<Address>, RegistryError>;

    /// Register a service address and wait for confirmation.
    async fn add_service(&self, name: &str, address: Address) -> Result<(), RegistryError>;

    /// Identity of the deployed registries behind this backend. Snapshot
    /// cache keys include it.
    fn registry_id(&self) -> String;

    /// Lock held across every write and its confirmation. Validators sharing
    /// a backend serialize on it; separate connections to the same deployed
    /// registry do not.
    fn write_lock(&self) -> &Mutex<()>;
}

static NEXT_MEMORY_REGISTRY: AtomicUsize = AtomicUsize::new(0);

/// Registry held in memory, for dry runs and tests.
///
/// Failures can be queued with `fail_next`; each queued error is returned by
/// the next backend call, reads and writes alike.
#[derive(Debug)]
pub struct InMemoryRegistry {
    id: usize,
    operations: RwLock<HashMap<String, DeployedOperation>>,
    services: RwLock<HashMap<B256, Address>>,
    failures: Mutex<VecDeque<RegistryError>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    write_lock: Mutex<()>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self {
            id: NEXT_MEMORY_REGISTRY.fetch_add(1, Ordering::Relaxed),
            operations: RwLock::default(),
            services: RwLock::default(),
            failures: Mutex::default(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            write_lock: Mutex::new(()),
        }
    }
}

impl InMemoryRegistry {
    /// A new, empty registry. Every instance has its own identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw entry, bypassing any check.
    pub async fn insert_operation(&self, name: &str, operation: DeployedOperation) {
        self.operations.write().await.insert(name.to_string(), operation);
    }

    /// Replace the action hash at `index` of a stored operation.
    ///
    /// Returns `false` when the operation or index does not exist.
    pub async fn tamper_action(&self, name: &str, index: usize, hash: B256) -> bool {
        let mut operations = self.operations.write().await;
        match operations.get_mut(name).and_then(|op| op.actions.get_mut(index)) {
            Some(slot) => {
                *slot = hash;
                true
            }
            None => false,
        }
    }

    pub async fn fail_next(&self, error: RegistryError) {
        self.failures.lock().await.push_back(error);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn injected_failure(&self) -> Result<(), RegistryError> {
        match self.failures.lock().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryBackend for InMemoryRegistry {
    async fn get_operation(&self, name: &str) -> Result<Option<DeployedOperation>, RegistryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.injected_failure().await?;
        Ok(self.operations.read().await.get(name).cloned())
    }

    async fn add_operation(&self, definition: &OperationDefinition) -> Result<(), RegistryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.injected_failure().await?;
        self.operations
            .write()
            .await
            .insert(definition.name.clone(), DeployedOperation::from(definition));
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Option<Address>, RegistryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.injected_failure().await?;
        let hash = keccak256(name.as_bytes());
        Ok(self
            .services
            .read()
            .await
            .get(&hash)
            .copied()
            .filter(|address| !address.is_zero()))
    }

    async fn add_service(&self, name: &str, address: Address) -> Result<(), RegistryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.injected_failure().await?;
        self.services
            .write()
            .await
            .insert(keccak256(name.as_bytes()), address);
        Ok(())
    }

    fn registry_id(&self) -> String {
        format!("memory-{}", self.id)
    }

    fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }
}
