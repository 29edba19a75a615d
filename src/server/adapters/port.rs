//! Operating-system backed free-port discovery.

use crate::server::{
    domain::ServerPort,
    ports::{PortAllocationError, PortSource, PortSourceResult},
};
use std::net::{Ipv4Addr, TcpListener};

/// Asks the operating system for an ephemeral loopback port.
///
/// The temporary listener is released before returning, so the port is only
/// known to be free at the time of the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsPortSource;

impl PortSource for OsPortSource {
    fn acquire(&self) -> PortSourceResult<ServerPort> {
        let listener =
            TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(PortAllocationError::new)?;
        let port = listener
            .local_addr()
            .map_err(PortAllocationError::new)?
            .port();
        drop(listener);
        ServerPort::new(port).map_err(PortAllocationError::new)
    }
}
