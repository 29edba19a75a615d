//! Port contracts for sandbox server orchestration.

mod client;
mod port_source;
mod supervisor;

pub use client::{DatabaseClient, DatabaseClientError, DatabaseClientResult, DatabaseConnector};
pub use port_source::{PortAllocationError, PortSource, PortSourceResult};
pub use supervisor::{LaunchError, LaunchParameters, LaunchResult, ProcessHandle, ProcessSupervisor};
