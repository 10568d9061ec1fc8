//! Protocol resolution errors.

/// Errors that can occur while resolving a protocol to its operations
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Protocol {protocol} is versioned; a version is required")]
    MissingVersion { protocol: String },

    #[error("Unknown protocol label: {label}")]
    UnknownProtocol { label: String },

    #[error("Unsupported version {version} for protocol {protocol}")]
    UnsupportedVersion { protocol: String, version: String },

    #[error("No operations for {protocol} {category}")]
    NoOperationsForCategory { protocol: String, category: String },

    #[error("Unknown position type: {label}")]
    UnknownPositionType { label: String },
}
