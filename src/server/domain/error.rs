//! Error types for sandbox domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing sandbox domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxDomainError {
    /// The database name is empty after trimming.
    #[error("database name must not be empty")]
    EmptyDatabaseName,

    /// The database name exceeds the server's 64-byte limit.
    #[error("database name exceeds 64 byte limit: {0}")]
    DatabaseNameTooLong(String),

    /// The database name contains a character the server rejects.
    #[error("database name '{name}' contains invalid character {character:?}")]
    InvalidDatabaseName {
        /// Offending database name.
        name: String,
        /// First rejected character.
        character: char,
    },

    /// Port zero cannot address a listening server.
    #[error("server port must be non-zero")]
    ZeroPort,

    /// A launch was requested before a port was assigned.
    #[error("server port has not been assigned")]
    PortNotAssigned,

    /// Transitioning between two lifecycle states is invalid.
    #[error("invalid server lifecycle transition: {from} -> {to}")]
    InvalidLifecycleTransition {
        /// Current lifecycle state.
        from: String,
        /// Requested target lifecycle state.
        to: String,
    },
}

/// Error returned while parsing a lifecycle state name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown server lifecycle state: {0}")]
pub struct ParseServerLifecycleStateError(pub String);

/// Error returned while parsing a storage mode name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown storage mode: {0}")]
pub struct ParseStorageModeError(pub String);
