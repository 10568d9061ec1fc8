//! Leverage solver errors.

/// Errors that can occur while solving leverage parameters
#[derive(Debug, thiserror::Error)]
pub enum LeverageError {
    #[error("Target is infeasible: {reason}")]
    InfeasibleTarget { reason: String },

    #[error("Invalid solver input {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}
