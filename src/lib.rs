//! Mongo sandbox: ephemeral `MongoDB` servers for test suites.
//!
//! This crate starts a throwaway, memory-backed database server on a free
//! local port, hands out one cached connection per logical database, and
//! tears everything down in a fixed order when the suite is done.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: configuration, identifiers, and lifecycle state
//! - **Ports**: port discovery, process supervision, and database clients
//! - **Adapters**: the OS port source, a `mongod` supervisor, a `mongodb`
//!   driver connector, and an in-memory deployment for deterministic tests
//! - **Services**: the connection registry and the lifecycle orchestrator
//!
//! # Modules
//!
//! - [`server`]: server lifecycle and connection management

pub mod server;
