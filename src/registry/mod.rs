//! Registries: the local database and the deployed registries it shadows.
//!
//! - `OperationsDatabase`: expected names, hashes and operation definitions
//!   of one network
//! - `RegistryBackend`: reads and confirmed writes against a deployed
//!   registry pair, over RPC (`OnchainRegistry`) or in memory
//!   (`InMemoryRegistry`)
//! - `RegistryValidator`: compares the two and pushes missing entries
//! - `RegistrySnapshotCache`: caller-owned cache of registry reads
//! - `RetryPolicy`: backoff for transport failures

pub mod backend;
pub mod cache;
pub mod database;
pub mod names;
pub mod onchain;
pub mod retry;
pub mod validator;

pub use backend::{DeployedOperation, InMemoryRegistry, RegistryBackend};
pub use cache::{RegistrySnapshotCache, SnapshotKey};
pub use database::OperationsDatabase;
pub use onchain::OnchainRegistry;
pub use retry::RetryPolicy;
pub use validator::{
    MismatchDetail, RegistryValidator, ServiceOutcome, ServiceReport, ValidationOutcome,
    ValidationReport,
};
