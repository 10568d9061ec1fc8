//! Lending Operations Library
//!
//! Composition, encoding and registry verification of atomic multi-step
//! lending operations: opening, closing and adjusting leveraged positions on
//! Aave v2, Aave v3 and Spark in a single all-or-nothing transaction executed
//! by an on-chain operation executor.
//!
//! # Architecture Overview
//!
//! - **`actions`**: the wire call of one step, the action encoder, positional
//!   parameter mapping and typed constructors for every executor action
//! - **`operations`**: operation definitions, the operation builder and the
//!   per-transaction strategies
//! - **`registry`**: the local operations database and the validator that
//!   compares it against deployed registries
//! - **`leverage`**: closed-form solver for leverage changes
//! - **`protocols`**: protocol/version/category dispatch
//! - **`config`**: environment and deployment file configuration
//! - **`builders`**: builder patterns for validators and strategy contexts
//! - **`errors`**: error handling and reporting
//! - **`utils`**: network identity and numeric conversions
//!
//! # Core Concepts
//!
//! - **Action**: one registered capability of the executor, addressed by the
//!   `keccak256` hash of its name. A step is either a leaf call or a flashloan
//!   wrapping nested steps.
//! - **Parameter mapping**: per input slot, either the literal argument or the
//!   stored output of an earlier step (1-indexed, pre-order over the tree).
//! - **Operation**: a named, ordered list of actions with optional flags. Its
//!   fingerprint is the hash of the concatenated action hashes.
//! - **Validation**: a deployed registry entry either matches the local
//!   definition element for element or is reported as drifted.
//!
//! # Thread Safety
//!
//! Building is synchronous and pure; databases are immutable once built and
//! can be shared across threads. Validation is async; writes through one
//! registry backend are serialized on its write lock.

pub mod actions;
pub mod builders;
pub mod config;
pub mod errors;
pub mod leverage;
pub mod operations;
pub mod protocols;
pub mod registry;
pub mod utils;

// Re-export the main Result type and error enum for convenience
pub use errors::{OpsError, Result};

// Re-export builder patterns for convenience
pub use builders::{RegistryValidatorBuilder, StrategyContextBuilder};

pub use actions::{Action, ActionCall, ActionEncoder, ActionHash, ParamSource};
pub use operations::{BuiltOperation, OperationBuilder, OperationDefinition, StepSpec};
pub use protocols::{PositionType, ProtocolVersion};
pub use registry::{OperationsDatabase, RegistryValidator, ValidationOutcome};
pub use utils::Network;

