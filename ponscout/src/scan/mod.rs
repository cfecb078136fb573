//! Device scans: port enumeration, SNMP polling and the merge into one
//! [`ScanResult`](crate::model::ScanResult).

mod enumerator;
mod orchestrator;
#[cfg(test)]
pub(crate) mod testing;

pub use enumerator::{PortEnumerator, PortScan};
pub use orchestrator::DiscoveryOrchestrator;

use std::time::Duration;

/// Tunables for a scan.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use ponscout::ScanOptions;
///
/// let options = ScanOptions::default()
///     .with_command_timeout(Duration::from_secs(30))
///     .with_details(false)
///     .with_concurrency(4);
/// assert_eq!(options.concurrency, 4);
/// ```
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// TCP connect, and separately the login handshake.
    pub connect_timeout: Duration,

    /// Per CLI command.
    pub command_timeout: Duration,

    /// Per SNMP subtree walk, across all its requests.
    pub snmp_timeout: Duration,

    /// Leading ports that must not all time out.
    pub bootstrap_window: usize,

    /// Retry a timed-out port once after the bootstrap window.
    pub retry_timed_out_ports: bool,

    /// Run detail-info for every discovered ONU.
    pub fetch_details: bool,

    /// Run the unconfigured-ONU listing.
    pub fetch_unconfigured: bool,

    /// Devices scanned in parallel by [`DiscoveryOrchestrator::scan_all`].
    pub concurrency: usize,

    /// Bytes from the end of the buffer searched for prompts.
    pub search_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(15),
            snmp_timeout: Duration::from_secs(30),
            bootstrap_window: 3,
            retry_timed_out_ports: true,
            fetch_details: true,
            fetch_unconfigured: true,
            concurrency: 8,
            search_depth: 1000,
        }
    }
}

impl ScanOptions {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_snmp_timeout(mut self, timeout: Duration) -> Self {
        self.snmp_timeout = timeout;
        self
    }

    pub fn with_bootstrap_window(mut self, ports: usize) -> Self {
        self.bootstrap_window = ports;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry_timed_out_ports = retry;
        self
    }

    pub fn with_details(mut self, fetch: bool) -> Self {
        self.fetch_details = fetch;
        self
    }

    pub fn with_unconfigured(mut self, fetch: bool) -> Self {
        self.fetch_unconfigured = fetch;
        self
    }

    /// Devices scanned in parallel; at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }
}
