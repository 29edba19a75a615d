//! Domain model for sandbox server configuration and lifecycle.
//!
//! The domain covers server configuration, the validated identifiers used to
//! address a server and its databases, and the lifecycle state machine.
//! Process management and network clients remain outside this boundary.

mod config;
mod error;
mod ids;
mod lifecycle;

pub use config::{ConnectionUri, DEFAULT_DATABASE_NAME, ServerConfig, StorageMode};
pub use error::{ParseServerLifecycleStateError, ParseStorageModeError, SandboxDomainError};
pub use ids::{DatabaseName, ServerInstanceId, ServerPort};
pub use lifecycle::{ServerLifecycleState, ServerStatus};
