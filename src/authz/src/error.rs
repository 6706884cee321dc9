//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
///
/// A negative access decision is data (`Ok(false)`), never one of these.
/// Only [`AccessDenied`](AuthzError::AccessDenied) represents a refusal, and it
/// is produced solely by `Authorizer::require_access`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthzError {
    /// The identity lacks the permission on the securable
    #[error("Access denied: {identity} may not '{permission}' on {securable}")]
    AccessDenied {
        /// Securable the check ran against
        securable: String,
        /// Requested permission
        permission: String,
        /// Identity that was refused
        identity: String,
    },

    /// A non-anonymous identity was required
    #[error("Authentication required")]
    Unauthenticated,

    /// Role or ACL data refers to something that does not exist
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A role graph traversal revisited a role still on its path
    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    /// Malformed access control entry
    #[error("Invalid access control entry: {0}")]
    InvalidAce(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Role repository failure
    #[error("Repository error: {0}")]
    Repository(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
