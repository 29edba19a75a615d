//! Free-port discovery port.

use crate::server::domain::ServerPort;
use std::sync::Arc;
use thiserror::Error;

/// Result type for port discovery.
pub type PortSourceResult<T> = Result<T, PortAllocationError>;

/// Supplies a free TCP port from the operating system.
pub trait PortSource: Send + Sync {
    /// Acquires a port that is free at the time of the call.
    ///
    /// # Errors
    ///
    /// Returns [`PortAllocationError`] when no port can be obtained.
    fn acquire(&self) -> PortSourceResult<ServerPort>;
}

/// The operating system could not supply a free port.
#[derive(Debug, Clone, Error)]
#[error("no free TCP port available: {0}")]
pub struct PortAllocationError(Arc<dyn std::error::Error + Send + Sync>);

impl PortAllocationError {
    /// Wraps the underlying allocation failure.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
