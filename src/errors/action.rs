//! Action encoding and parameter mapping errors.

/// Errors raised while turning an action name and arguments into a call.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown action: {name}")]
    UnknownAction { name: String },

    #[error("Failed to encode arguments for {name}: {reason}")]
    Encoding { name: String, reason: String },
}

/// Errors raised while resolving a parameter mapping slot.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Action at position {position} cannot reference position {reference}: {reason}")]
    InvalidReference {
        position: usize,
        reference: usize,
        reason: String,
    },

    #[error("Action at position {position} references unknown step label '{label}'")]
    UnknownLabel { position: usize, label: String },
}
