//! Registry read/write errors.

/// Errors that can occur while talking to a deployed registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Transport failure during {operation}: {cause}")]
    Transport { operation: String, cause: String },

    #[error("Call {operation} reverted: {reason}")]
    Reverted { operation: String, reason: String },

    #[error("RPC error during {operation}: {cause}")]
    Rpc { operation: String, cause: String },

    #[error("Transaction for {operation} was not confirmed: {cause}")]
    ConfirmationFailed { operation: String, cause: String },

    #[error("Transaction {tx_hash} for {operation} failed on chain")]
    TransactionFailed { operation: String, tx_hash: String },

    #[error("Registry is read-only: {operation} requires a signer")]
    ReadOnly { operation: String },

    #[error("Operation {name} is not defined locally")]
    UnknownOperation { name: String },

    #[error("Refusing to overwrite {name}: deployed entry differs at index {index}")]
    RefusedOverwrite { name: String, index: usize },

    #[error("Refusing to overwrite service {name}: registered at {registered}")]
    RefusedServiceOverwrite { name: String, registered: String },

    #[error("{name} is still not configured after push: {outcome}")]
    PushNotConfirmed { name: String, outcome: String },
}

impl RegistryError {
    /// Whether the failure happened in the transport layer and may succeed on
    /// retry. Business outcomes and reverts are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Transport { .. })
    }
}
