//! Identifier and validated-name types for sandbox servers.

use super::SandboxDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum database name length accepted by the server, in bytes.
const MAX_DATABASE_NAME_LENGTH: usize = 64;

/// Characters the server refuses in database names.
const FORBIDDEN_DATABASE_NAME_CHARACTERS: [char; 7] = ['/', '\\', '.', ' ', '"', '$', '\0'];

/// Unique identifier for one launched server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerInstanceId(Uuid);

impl ServerInstanceId {
    /// Creates a new random instance identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ServerInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerInstanceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Non-zero TCP port a sandbox server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct ServerPort(u16);

impl ServerPort {
    /// Creates a validated server port.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxDomainError::ZeroPort`] for port `0`, which asks the
    /// operating system for an arbitrary port rather than naming one.
    pub const fn new(value: u16) -> Result<Self, SandboxDomainError> {
        if value == 0 {
            return Err(SandboxDomainError::ZeroPort);
        }
        Ok(Self(value))
    }

    /// Returns the raw port number.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for ServerPort {
    type Error = SandboxDomainError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServerPort> for u16 {
    fn from(port: ServerPort) -> Self {
        port.0
    }
}

impl fmt::Display for ServerPort {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated logical database name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Creates a validated database name.
    ///
    /// Names must be non-empty, at most 64 bytes long, and free of
    /// whitespace, `/\."$` and NUL. Input is taken verbatim, so `" orders"`
    /// is rejected rather than folded into `"orders"`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, SandboxDomainError> {
        let normalized = value.into();

        if normalized.is_empty() {
            return Err(SandboxDomainError::EmptyDatabaseName);
        }

        if let Some(character) = normalized
            .chars()
            .find(|character| {
                character.is_whitespace() || FORBIDDEN_DATABASE_NAME_CHARACTERS.contains(character)
            })
        {
            return Err(SandboxDomainError::InvalidDatabaseName {
                name: normalized,
                character,
            });
        }

        if normalized.len() > MAX_DATABASE_NAME_LENGTH {
            return Err(SandboxDomainError::DatabaseNameTooLong(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the database name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DatabaseName {
    type Error = SandboxDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatabaseName> for String {
    fn from(name: DatabaseName) -> Self {
        name.0
    }
}

impl AsRef<str> for DatabaseName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
