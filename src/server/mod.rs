//! Ephemeral database server lifecycle and connection management.
//!
//! This module provisions a throwaway `mongod` instance for a test suite and
//! hands out one cached connection per logical database. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
