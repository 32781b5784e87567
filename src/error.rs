//! Error types for resperm

use thiserror::Error;

/// The main error type for resperm operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed subject id, unknown permission level, bad request data
    #[error("validation failed: {0}")]
    Validation(String),

    /// The evaluator protecting the operation denied the caller
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The inherited-scope solver failed; the request is denied
    #[error("inherited scopes could not be resolved: {0}")]
    InheritanceResolution(String),

    /// Opaque storage failure
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION",
            Error::NotAuthorized(_) => "NOT_AUTHORIZED",
            Error::InheritanceResolution(_) => "INHERITANCE_RESOLUTION",
            Error::Persistence(_) => "PERSISTENCE",
        }
    }
}

/// Result type alias for resperm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Convert a storage-level error into an opaque persistence error
pub fn err<E: std::error::Error>(e: E) -> Error {
    Error::Persistence(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::validation("x").code(), "VALIDATION");
        assert_eq!(Error::NotAuthorized("x".into()).code(), "NOT_AUTHORIZED");
        assert_eq!(Error::InheritanceResolution("x".into()).code(), "INHERITANCE_RESOLUTION");
        assert_eq!(err(std::io::Error::other("disk")).code(), "PERSISTENCE");
    }

    #[test]
    fn persistence_keeps_source_message() {
        let e = err(std::io::Error::other("disk full"));
        assert_eq!(e.to_string(), "persistence failure: disk full");
    }
}
