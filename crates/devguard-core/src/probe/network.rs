// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Devguard

//! Loopback port probe for instrumentation servers (frida-server listens on
//! 27042/27043 by default).

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use super::Observation;
use crate::catalog::DEFAULT_NETWORK_TIMEOUT;

/// Positive if any port accepts a TCP connection on 127.0.0.1.
///
/// Refusal, timeout and any other connect error count as "not listening".
pub(crate) fn loopback_ports(ports: &[u16], timeout: Option<Duration>) -> Observation {
    let timeout = timeout.unwrap_or(DEFAULT_NETWORK_TIMEOUT);

    let open: Vec<String> = ports
        .iter()
        .copied()
        .filter(|&port| probe_port(port, timeout))
        .map(|port| port.to_string())
        .collect();

    if open.is_empty() {
        Observation::negative()
    } else {
        Observation::positive(format!("loopback port open: {}", open.join(", ")))
    }
}

fn probe_port(port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match TcpStream::connect_timeout(&addr, timeout) {
        Ok(stream) => {
            // Close immediately; nothing is sent.
            drop(stream);
            true
        }
        Err(e) => {
            debug!(port, error = %e, "loopback port closed");
            false
        }
    }
}
