//! Network infrastructure: implements `PortProbe` by binding a listener.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;

use crate::application::ports::PortProbe;

/// Upper bound for a single bind attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Production implementation that performs real bind checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpPortProbe;

impl PortProbe for TcpPortProbe {
    async fn is_free(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        // The listener is dropped straight away, releasing the port.
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, TcpListener::bind(addr)).await,
            Ok(Ok(_))
        )
    }
}
