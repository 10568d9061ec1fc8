//! Utility function errors

use thiserror::Error;

/// Errors that can occur in utility functions
#[derive(Debug, Error)]
pub enum UtilityError {
    #[error("Failed to parse address from string '{input}': {source}")]
    AddressParsingFailed {
        input: String,
        #[source]
        source: alloy::primitives::AddressError,
    },

    #[error("BigUint value too large to fit in U256")]
    ValueTooLarge,

    #[error("Negative amount {value} cannot be converted to base units")]
    NegativeAmount { value: String },

    #[error("Unsupported network: {network}")]
    UnsupportedNetwork { network: String },
}
