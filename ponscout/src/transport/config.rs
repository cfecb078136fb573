//! Telnet connection configuration.

use std::time::Duration;

/// Telnet connection configuration.
#[derive(Debug, Clone)]
pub struct TelnetConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Telnet port (default: 23).
    pub port: u16,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Read chunk size for the socket.
    pub read_chunk_size: usize,
}

impl TelnetConfig {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            read_chunk_size: 4096,
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
