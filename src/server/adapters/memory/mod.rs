//! In-memory adapters for deterministic sandbox orchestration.
//!
//! These adapters model the server process and its network clients without
//! spawning anything. A shared [`InMemoryDeployment`] ties them together so a
//! connector can only reach ports a supervisor has bound.

mod client;
mod deployment;
mod supervisor;

pub use client::{InMemoryClient, InMemoryCollection, InMemoryConnector, InMemoryDatabase};
pub use deployment::InMemoryDeployment;
pub use supervisor::{InMemoryProcessSupervisor, ScriptedLaunch};
