//! Operation composition errors.

use alloy::primitives::Address;

/// Errors that can occur while composing an operation
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Operation {operation} has no steps")]
    EmptyOperation { operation: String },

    #[error(
        "Flashloan of {amount} {asset} is not repaid: nested calls leave {available}, required {required}"
    )]
    UnbalancedFlashloan {
        asset: Address,
        amount: String,
        required: String,
        available: String,
    },

    #[error("Mandatory action {name} at position {position} cannot be skipped")]
    MandatoryActionSkipped { position: usize, name: String },

    #[error("Duplicate step label '{label}'")]
    DuplicateLabel { label: String },

    #[error(
        "Built operation {operation} drifts from its definition at index {index}: expected {expected:?}, built {built:?}"
    )]
    DefinitionMismatch {
        operation: String,
        index: usize,
        expected: Option<String>,
        built: Option<String>,
    },

    #[error("Call sequence does not match definition {operation} at index {index}")]
    SequenceMismatch { operation: String, index: usize },

    #[error("Operation {operation} exceeds {max} flat actions")]
    TooManyActions { operation: String, max: usize },

    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },
}
