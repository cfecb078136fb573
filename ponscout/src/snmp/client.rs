//! SNMP subtree walking.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use log::{debug, trace};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::error::SnmpError;

use super::ber::{PduKind, Response, Varbind, decode_response, encode_request};
use super::oid::Oid;

/// Default GETBULK max-repetitions.
pub const DEFAULT_MAX_REPETITIONS: u32 = 10;

/// Default time to wait for one response before retransmitting.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Walks one OID subtree.
///
/// The scan pipeline only depends on this trait, so tests can substitute a
/// canned agent.
pub trait SnmpWalker: Send + Sync {
    /// Return every varbind under `base`, in agent order.
    ///
    /// `timeout` bounds the whole walk, not each request.
    fn walk(
        &self,
        base: &Oid,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<Varbind>, SnmpError>> + Send;
}

/// SNMPv2c client over UDP.
pub struct UdpSnmpClient {
    host: String,
    port: u16,
    community: SecretString,
    max_repetitions: u32,
    retry_interval: Duration,
    request_id: AtomicI32,
}

impl UdpSnmpClient {
    pub fn new(host: impl Into<String>, port: u16, community: SecretString) -> Self {
        Self {
            host: host.into(),
            port,
            community,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            request_id: AtomicI32::new(1),
        }
    }

    /// Rows requested per GETBULK. `0` walks with GETNEXT instead, for
    /// agents whose bulk implementation is broken.
    pub fn with_max_repetitions(mut self, max_repetitions: u32) -> Self {
        self.max_repetitions = max_repetitions;
        self
    }

    fn pdu_kind(&self) -> PduKind {
        match self.max_repetitions {
            0 => PduKind::GetNext,
            max_repetitions => PduKind::GetBulk { max_repetitions },
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    fn next_request_id(&self) -> i32 {
        // Keep ids positive so they encode the same on every agent.
        self.request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }

    async fn resolve(&self) -> Result<SocketAddr, SnmpError> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                SnmpError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}", self.host),
                ))
            })
    }

    /// Send `request` and wait for the response carrying `request_id`,
    /// retransmitting every `retry_interval` until `deadline`.
    async fn exchange(
        &self,
        socket: &UdpSocket,
        request: &[u8],
        request_id: i32,
        deadline: Instant,
        buf: &mut [u8],
    ) -> Result<Option<Response>, SnmpError> {
        loop {
            socket.send(request).await?;
            let attempt_deadline = (Instant::now() + self.retry_interval).min(deadline);

            loop {
                let n = match tokio::time::timeout_at(attempt_deadline, socket.recv(buf)).await {
                    Ok(n) => n?,
                    Err(_) => break,
                };
                let response = decode_response(&buf[..n])?;
                if response.request_id == request_id {
                    return Ok(Some(response));
                }
                trace!("Dropping stale SNMP response id {}", response.request_id);
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            trace!("Retransmitting SNMP request {}", request_id);
        }
    }
}

impl SnmpWalker for UdpSnmpClient {
    async fn walk(&self, base: &Oid, timeout: Duration) -> Result<Vec<Varbind>, SnmpError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || SnmpError::Timeout {
            oid: base.to_string(),
            timeout,
        };

        let peer = tokio::time::timeout_at(deadline, self.resolve())
            .await
            .map_err(|_| timed_out())??;
        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;

        debug!("Walking {} on {}", base, peer);

        let mut results = Vec::new();
        let mut current = base.clone();
        let mut buf = vec![0u8; 65_535];

        'walk: loop {
            let request_id = self.next_request_id();
            let request = encode_request(
                self.community.expose_secret().as_bytes(),
                request_id,
                self.pdu_kind(),
                &current,
            );

            let response = self
                .exchange(&socket, &request, request_id, deadline, &mut buf)
                .await?
                .ok_or_else(timed_out)?;

            if response.error_status != 0 {
                return Err(SnmpError::ErrorStatus {
                    status: response.error_status,
                    index: response.error_index,
                });
            }
            if response.varbinds.is_empty() {
                break;
            }

            for varbind in response.varbinds {
                // Leaving the subtree, hitting the end of the MIB or an agent
                // that does not advance all end the walk.
                if varbind.value.is_exception()
                    || !varbind.oid.starts_with(base)
                    || varbind.oid <= current
                {
                    break 'walk;
                }
                current = varbind.oid.clone();
                results.push(varbind);
            }
        }

        debug!("Walk of {} returned {} varbinds", base, results.len());
        Ok(results)
    }
}
