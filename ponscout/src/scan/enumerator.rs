//! Walks the PON port layout of a device over the CLI.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::device::Device;
use crate::driver::{CommandExecutor, Response};
use crate::error::{Result, ScanError};
use crate::model::{Diagnostic, DiagnosticContext, DiagnosticKind, OnuRecord, PonPortAddress};
use crate::parser::ResponseParser;
use crate::platform::Dialect;

use super::ScanOptions;

/// ONUs found by one enumeration pass.
#[derive(Debug, Default)]
pub struct PortScan {
    /// In port visit order, duplicates removed.
    pub records: Vec<OnuRecord>,
    pub diagnostics: Vec<Diagnostic>,
    /// Every port a command was sent for, in order.
    pub visited: Vec<PonPortAddress>,
}

/// Queries every candidate port, slot-major.
///
/// The first `bootstrap_window` ports double as a liveness check: if each of
/// them times out the device is reported unreachable instead of burning one
/// command timeout per remaining port.
pub struct PortEnumerator<'a> {
    device: &'a Device,
    dialect: &'a Dialect,
    parser: ResponseParser,
    options: &'a ScanOptions,
}

impl<'a> PortEnumerator<'a> {
    pub fn new(device: &'a Device, options: &'a ScanOptions) -> Self {
        Self {
            device,
            dialect: device.vendor.dialect(),
            parser: device.vendor.parser(),
            options,
        }
    }

    pub async fn enumerate<E: CommandExecutor>(&self, executor: &mut E) -> Result<PortScan> {
        let mut scan = PortScan::default();
        let mut seen = HashSet::new();
        let window = self.options.bootstrap_window;
        let mut leading_timeouts = 0;

        for (index, port) in self.device.port_addresses().enumerate() {
            scan.visited.push(port);
            let command = self.dialect.onu_states_command(port);
            let bootstrapping = index < window && leading_timeouts == index;

            let response = match executor.execute(&command, self.options.command_timeout).await {
                Ok(response) => Some(response),
                Err(e) if e.is_command_timeout() && bootstrapping => {
                    leading_timeouts += 1;
                    if leading_timeouts == window {
                        return Err(self.unreachable(leading_timeouts));
                    }
                    debug!("Port {} on {} timed out during bootstrap", port, self.device.host);
                    scan.diagnostics.push(timeout_diagnostic(port, &command));
                    None
                }
                Err(e) if e.is_command_timeout() => self.retry(executor, port, &command, &mut scan).await?,
                Err(e) if !e.is_fatal() => {
                    warn!("Port {} on {}: {}", port, self.device.host, e);
                    scan.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::CommandError,
                        DiagnosticContext::Port { port },
                        e.to_string(),
                    ));
                    None
                }
                Err(e) => return Err(e),
            };

            if let Some(response) = response {
                self.absorb(port, response, &mut seen, &mut scan);
            }
        }

        // Fewer candidate ports than the window, all silent.
        if window > 0 && !scan.visited.is_empty() && leading_timeouts == scan.visited.len() {
            return Err(self.unreachable(leading_timeouts));
        }

        info!(
            "Enumerated {} ports on {}: {} ONUs, {} diagnostics",
            scan.visited.len(),
            self.device.host,
            scan.records.len(),
            scan.diagnostics.len()
        );
        Ok(scan)
    }

    async fn retry<E: CommandExecutor>(
        &self,
        executor: &mut E,
        port: PonPortAddress,
        command: &str,
        scan: &mut PortScan,
    ) -> Result<Option<Response>> {
        if self.options.retry_timed_out_ports {
            debug!("Retrying port {} on {}", port, self.device.host);
            match executor.execute(command, self.options.command_timeout).await {
                Ok(response) => {
                    info!("Port {} on {} answered on retry", port, self.device.host);
                    scan.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::CommandTimeout,
                        DiagnosticContext::Port { port },
                        format!("'{}' timed out, recovered on retry", command),
                    ));
                    return Ok(Some(response));
                }
                Err(e) if e.is_command_timeout() => {}
                Err(e) => return Err(e),
            }
        }
        warn!("Port {} on {} timed out", port, self.device.host);
        scan.diagnostics.push(timeout_diagnostic(port, command));
        Ok(None)
    }

    fn absorb(
        &self,
        port: PonPortAddress,
        response: Response,
        seen: &mut HashSet<(PonPortAddress, u16)>,
        scan: &mut PortScan,
    ) {
        if let Some(marker) = &response.failure_message {
            warn!("Device {} rejected '{}' ({})", self.device.host, response.command, marker);
            scan.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::CommandError,
                DiagnosticContext::Port { port },
                format!("'{}' rejected: {}", response.command, response.result),
            ));
            return;
        }
        if response.is_empty() || self.dialect.is_empty_response(&response.result) {
            debug!("No ONUs on port {}", port);
            return;
        }

        match self.parser.parse_onu_states(port, &response.result) {
            Ok(records) => {
                for record in records {
                    if !seen.insert((record.port, record.onu_id)) {
                        warn!("Duplicate ONU {} on {}", record.key(), self.device.host);
                        scan.diagnostics.push(Diagnostic::warning(
                            DiagnosticKind::DuplicateOnu,
                            DiagnosticContext::Onu { key: record.key() },
                            "ONU listed more than once; keeping the first row",
                        ));
                        continue;
                    }
                    scan.records.push(record);
                }
            }
            Err(e) => {
                warn!("Port {} on {}: {}", port, self.device.host, e);
                scan.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::ParseError,
                    DiagnosticContext::Port { port },
                    e.to_string(),
                ));
            }
        }
    }

    fn unreachable(&self, timeouts: usize) -> crate::error::Error {
        warn!(
            "Device {} did not answer the first {} port queries",
            self.device.host, timeouts
        );
        ScanError::DeviceUnreachable {
            host: self.device.host.clone(),
            timeouts,
            cards: vec![],
        }
        .into()
    }
}

fn timeout_diagnostic(port: PonPortAddress, command: &str) -> Diagnostic {
    Diagnostic::warning(
        DiagnosticKind::CommandTimeout,
        DiagnosticContext::Port { port },
        format!("'{}' timed out", command),
    )
}
