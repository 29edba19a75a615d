//! Application services coordinating the sandbox server lifecycle.

mod orchestrator;
mod registry;

pub use orchestrator::{MockServerError, MockServerOrchestrator, MockServerResult};
pub use registry::{
    Connection, ConnectionRegistry, ConnectionRegistryError, ConnectionRegistryResult,
    ShutdownError,
};
