//! Configuration errors.

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {name}")]
    MissingVariable { name: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid private key format: {message}")]
    InvalidPrivateKey { message: String },

    #[error("No deployment record for {name} on {network}")]
    MissingContract { network: String, name: String },

    #[error("Deployment file has no section for network {network}")]
    MissingNetwork { network: String },

    #[error("Incomplete configuration: {message}")]
    Incomplete { message: String },
}
