//! Adapter implementations for sandbox orchestration ports.

pub mod memory;

mod driver;
mod port;
mod process;

pub use driver::{MongoDriverClient, MongoDriverConnector};
pub use port::OsPortSource;
pub use process::MongodSupervisor;
