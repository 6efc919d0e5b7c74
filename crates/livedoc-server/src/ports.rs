//! Port allocation.
//!
//! Probes a port range by binding and immediately releasing a loopback
//! listener. The port may be taken by another process between the probe and
//! the caller's own bind; that window is accepted for a local tool.

use std::net::{Ipv4Addr, TcpListener};

use livedoc_config::PortRange;

use crate::error::{PreviewError, Result};

/// Return the first port in `range`, ascending, that can be bound on loopback.
///
/// # Errors
///
/// Returns [`PreviewError::NoPortAvailable`] if every port in the range is taken.
pub fn allocate_port(range: PortRange) -> Result<u16> {
    (range.min..=range.max)
        .find(|&port| port_is_free(port))
        .inspect(|port| tracing::debug!(port, %range, "Allocated port"))
        .ok_or(PreviewError::NoPortAvailable {
            min: range.min,
            max: range.max,
        })
}

/// Check whether a loopback listener can be bound on `port`.
fn port_is_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}
