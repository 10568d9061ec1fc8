//! Error handling and reporting for the lending operations library.
//!
//! Each major component owns a domain-specific error enum. The top-level
//! `OpsError` converts from all of them, so library functions return a single
//! `Result<T>` and callers still match on the domain variant they care about.
//!
//! # Error Hierarchy
//!
//! - **`ActionError`**: unknown action names and argument encoding failures
//! - **`MappingError`**: invalid parameter mapping references
//! - **`BuildError`**: operation composition failures (flashloan balance,
//!   skipped mandatory steps, drift from the static definition)
//! - **`RegistryError`**: reads and writes against a deployed registry
//! - **`LeverageError`**: infeasible or invalid solver inputs
//! - **`ResolverError`**: protocol/category dispatch misuse
//! - **`ConfigError`**: environment and deployment file configuration
//! - **`UtilityError`**: conversions and network lookups
//!
//! # Construction vs. validation
//!
//! Everything raised while building a transaction is a hard error and is
//! returned synchronously. Registry drift found by the validator is *not* an
//! error: it is reported through `registry::ValidationOutcome`. Only
//! `RegistryError::is_transient` failures are retried.

pub mod action;
pub mod config;
pub mod leverage;
pub mod operation;
pub mod registry;
pub mod resolver;
pub mod utility;

pub use action::{ActionError, MappingError};
pub use config::ConfigError;
pub use leverage::LeverageError;
pub use operation::BuildError;
pub use registry::RegistryError;
pub use resolver::ResolverError;
pub use utility::UtilityError;

/// Main result type for the library
pub type Result<T> = std::result::Result<T, OpsError>;

/// Top-level error enum that encompasses all possible errors in the library.
///
/// Domain errors convert automatically through `#[from]`, as do the external
/// errors that can cross the public API.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    /// Action lookup or argument encoding failed.
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// A parameter mapping pointed somewhere it must not.
    #[error("Parameter mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// An operation could not be composed into a valid wire payload.
    #[error("Operation build failed: {0}")]
    Build(#[from] BuildError),

    /// Reading from or writing to the deployed registry failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The leverage solver has no valid answer for the inputs.
    #[error("Leverage solver error: {0}")]
    Leverage(#[from] LeverageError),

    /// Protocol resolution failed.
    #[error("Protocol resolution failed: {0}")]
    Resolver(#[from] ResolverError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error in utility functions or type conversions.
    #[error("Utility error: {0}")]
    Utility(#[from] UtilityError),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File system error while reading configuration or writing reports.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for cases not covered by specific error types.
    #[error("Generic error: {0}")]
    Other(#[from] anyhow::Error),
}
