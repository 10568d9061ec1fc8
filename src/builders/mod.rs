//! Builder patterns for complex object construction.
//!
//! Both builders assemble their target from configuration: a validator from
//! a `RegistryConfig` (or an explicit backend), a strategy context from the
//! deployment records of one network.
//!
//! # Available Builders
//!
//! - **`RegistryValidatorBuilder`**: database, backend, cache and retry policy
//!   for one network's deployed registries
//! - **`StrategyContextBuilder`**: addresses the strategies compose against
//!
//! # Error Handling
//!
//! Missing inputs surface as `ConfigError::Incomplete` from `build`, missing
//! deployment records as `ConfigError::MissingContract`.

pub mod strategy;
pub mod validator;

// Re-export builders for convenience
pub use strategy::StrategyContextBuilder;
pub use validator::RegistryValidatorBuilder;
