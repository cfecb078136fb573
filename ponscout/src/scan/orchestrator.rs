//! Full device scans.

use std::future::Future;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::device::Device;
use crate::driver::{CommandExecutor, Response};
use crate::error::{Error, Result, ScanError};
use crate::model::{
    CardStatus, Diagnostic, DiagnosticContext, DiagnosticKind, OnuKey, OnuRecord, ScanResult,
};
use crate::session::Session;
use crate::snmp::{SnmpPoller, SnmpWalker, UdpSnmpClient};

use super::{PortEnumerator, ScanOptions};

/// What the CLI phase produced.
#[derive(Default)]
struct CliInventory {
    cards: Vec<CardStatus>,
    records: Vec<OnuRecord>,
    diagnostics: Vec<Diagnostic>,
}

/// Runs the whole discovery pipeline for one or many devices.
///
/// CLI first (cards, port enumeration, per-ONU details, unconfigured ONUs),
/// then SNMP, then a merge in which CLI values win.
///
/// # Example
///
/// ```rust,no_run
/// use ponscout::{DeviceBuilder, DiscoveryOrchestrator, ScanOptions, Vendor};
///
/// # async fn example() -> Result<(), ponscout::Error> {
/// let device = DeviceBuilder::new("olt-1", "10.0.0.2")
///     .vendor(Vendor::ZteGpon)
///     .telnet("monitor", std::env::var("OLT_PASSWORD").unwrap_or_default())
///     .snmp("public")
///     .pon_layout(2, 16)
///     .build()?;
///
/// let orchestrator = DiscoveryOrchestrator::new(ScanOptions::default());
/// let result = orchestrator.scan(&device).await?;
/// println!("{} ONUs, {} warnings", result.onus.len(), result.warnings().count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOrchestrator {
    options: ScanOptions,
}

impl DiscoveryOrchestrator {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan one device over the transports it has enabled.
    pub async fn scan(&self, device: &Device) -> Result<ScanResult> {
        device.validate()?;

        let mut session = match device.telnet() {
            Some(_) => Some(Session::open(device, &self.options).await?),
            None => None,
        };
        let walker = device
            .snmp()
            .map(|snmp| UdpSnmpClient::new(device.host.clone(), snmp.port, snmp.community.clone()));

        self.scan_using(device, session.as_mut(), walker.as_ref())
            .await
    }

    /// Scan with caller-supplied transports.
    ///
    /// `executor` must already be logged in; it is closed once the CLI
    /// phase ends, whatever the outcome.
    pub async fn scan_using<E, W>(
        &self,
        device: &Device,
        executor: Option<&mut E>,
        walker: Option<&W>,
    ) -> Result<ScanResult>
    where
        E: CommandExecutor,
        W: SnmpWalker,
    {
        device.validate()?;
        let started_at = Utc::now();
        info!("Scanning {} ({}, {})", device.id, device.host, device.vendor);

        let mut cli = CliInventory::default();
        if let Some(executor) = executor {
            let outcome = self.collect_cli(device, executor).await;
            if let Err(e) = executor.close().await {
                debug!("Closing session to {} failed: {}", device.host, e);
            }
            cli = outcome?;
        }

        let mut diagnostics = cli.diagnostics;
        let mut snmp_records = Vec::new();
        if let Some(walker) = walker {
            match device.vendor.dialect().oid_map.as_ref() {
                Some(map) => {
                    let poll = SnmpPoller::new(map, device, self.options.snmp_timeout)
                        .poll(walker)
                        .await;
                    snmp_records = poll.records;
                    diagnostics.extend(poll.diagnostics);
                }
                None => diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Unsupported,
                    DiagnosticContext::Device,
                    format!("no SNMP mapping for {}", device.vendor),
                )),
            }
        }

        let onus = merge(cli.records, snmp_records);
        Ok(self.finish(device, started_at, cli.cards, onus, diagnostics))
    }

    /// [`scan`](Self::scan) that gives up as soon as `cancel` resolves.
    ///
    /// Cancelling drops the session, which closes its socket.
    pub async fn scan_with_cancel<C>(&self, device: &Device, cancel: C) -> Result<ScanResult>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                warn!("Scan of {} cancelled", device.host);
                Err(ScanError::Cancelled {
                    host: device.host.clone(),
                }
                .into())
            }
            result = self.scan(device) => result,
        }
    }

    /// Scan many devices, at most `options.concurrency` at a time.
    ///
    /// Results come back in completion order, keyed by device id.
    pub async fn scan_all(&self, devices: &[Device]) -> Vec<(String, Result<ScanResult>)> {
        stream::iter(devices)
            .map(|device| async move { (device.id.clone(), self.scan(device).await) })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await
    }

    async fn collect_cli<E: CommandExecutor>(
        &self,
        device: &Device,
        executor: &mut E,
    ) -> Result<CliInventory> {
        let dialect = device.vendor.dialect();
        let parser = device.vendor.parser();
        let mut diagnostics = Vec::new();

        let cards = match self
            .run(executor, dialect.cards_command(), DiagnosticContext::Device, &mut diagnostics)
            .await?
        {
            Some(response) => match parser.parse_cards(&response.result) {
                Ok(cards) => cards,
                Err(e) => {
                    warn!("Card listing on {}: {}", device.host, e);
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::ParseError,
                        DiagnosticContext::Device,
                        e.to_string(),
                    ));
                    vec![]
                }
            },
            None => vec![],
        };
        debug!("{} cards on {}", cards.len(), device.host);

        let scan = match PortEnumerator::new(device, &self.options)
            .enumerate(executor)
            .await
        {
            Ok(scan) => scan,
            Err(Error::Scan(ScanError::DeviceUnreachable { host, timeouts, .. })) => {
                return Err(ScanError::DeviceUnreachable {
                    host,
                    timeouts,
                    cards,
                }
                .into());
            }
            Err(e) => return Err(e),
        };
        diagnostics.extend(scan.diagnostics);
        let mut records = scan.records;

        if self.options.fetch_details {
            for record in records.iter_mut() {
                let Some(command) = dialect.onu_detail_command(record.port, record.onu_id) else {
                    break;
                };
                let context = DiagnosticContext::Onu { key: record.key() };
                if let Some(response) = self.run(executor, &command, context, &mut diagnostics).await? {
                    if !dialect.is_empty_response(&response.result) {
                        parser.parse_onu_detail(&response.result).apply_to(record);
                    }
                }
            }
        }

        if self.options.fetch_unconfigured {
            if let Some(command) = dialect.unconfigured_command() {
                if let Some(response) = self
                    .run(executor, command, DiagnosticContext::Device, &mut diagnostics)
                    .await?
                {
                    if !dialect.is_empty_response(&response.result) {
                        match parser.parse_unconfigured(&response.result) {
                            Ok(onus) => {
                                for onu in onus {
                                    diagnostics.push(Diagnostic::info(
                                        DiagnosticKind::UnconfiguredOnu,
                                        DiagnosticContext::Serial {
                                            port: onu.port,
                                            serial: onu.serial.clone(),
                                        },
                                        format!("{} is waiting to be provisioned", onu.serial),
                                    ));
                                }
                            }
                            Err(e) => diagnostics.push(Diagnostic::warning(
                                DiagnosticKind::ParseError,
                                DiagnosticContext::Device,
                                e.to_string(),
                            )),
                        }
                    }
                }
            }
        }

        Ok(CliInventory {
            cards,
            records,
            diagnostics,
        })
    }

    /// Execute one command, downgrading non-fatal failures to diagnostics.
    async fn run<E: CommandExecutor>(
        &self,
        executor: &mut E,
        command: &str,
        context: DiagnosticContext,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Option<Response>> {
        match executor.execute(command, self.options.command_timeout).await {
            Ok(response) if response.is_success() => Ok(Some(response)),
            Ok(response) => {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::CommandError,
                    context,
                    format!("'{}' rejected: {}", command, response.result),
                ));
                Ok(None)
            }
            Err(e) if e.is_command_timeout() => {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::CommandTimeout,
                    context,
                    format!("'{}' timed out", command),
                ));
                Ok(None)
            }
            Err(e) if !e.is_fatal() => {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::CommandError,
                    context,
                    e.to_string(),
                ));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn finish(
        &self,
        device: &Device,
        started_at: DateTime<Utc>,
        cards: Vec<CardStatus>,
        onus: Vec<OnuRecord>,
        diagnostics: Vec<Diagnostic>,
    ) -> ScanResult {
        let result = ScanResult {
            device_id: device.id.clone(),
            host: device.host.clone(),
            vendor: device.vendor,
            started_at,
            finished_at: Utc::now(),
            cards,
            onus,
            diagnostics,
        };
        info!(
            "Scanned {}: {} cards, {} ONUs, {} warnings",
            device.host,
            result.cards.len(),
            result.onus.len(),
            result.warnings().count()
        );
        result
    }
}

/// CLI values win; SNMP only fills gaps and adds ONUs the CLI missed.
fn merge(cli: Vec<OnuRecord>, snmp: Vec<OnuRecord>) -> Vec<OnuRecord> {
    let mut merged: IndexMap<OnuKey, OnuRecord> =
        cli.into_iter().map(|record| (record.key(), record)).collect();

    for record in snmp {
        match merged.get_mut(&record.key()) {
            Some(existing) => existing.fill_missing_from(&record),
            None => {
                merged.insert(record.key(), record);
            }
        }
    }

    let mut onus: Vec<OnuRecord> = merged.into_values().collect();
    onus.sort_by_key(OnuRecord::key);
    onus
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::device::DeviceBuilder;
    use crate::model::{OnuStatus, PonPortAddress, Severity};
    use crate::platform::Vendor;
    use crate::scan::testing::{MapWalker, Reply, ScriptedExecutor};
    use crate::snmp::{OnuField, Value, Varbind};

    const CARDS: &str = "\
Shelf Slot CfgType RealType Port  HardVer SoftVer         Status
-------------------------------------------------------------------------------
1     1    GTGO    GTGOG    8     V1.0    V2.1.0          INSERVICE
";

    const PORT_1_3: &str = "\
OnuIndex   Admin State  OMCC State  Phase State  Channel   SN
--------------------------------------------------------------------------
1/1/3:1    enable       enable      working      1(GPON)   ZTEGC8A10001
1/1/3:2    enable       disable     LOS          1(GPON)   ZTEGC8A10002
ONU Number: 2/2
";

    const UNCFG: &str = "\
OnuIndex                 Sn                  State
---------------------------------------------------------------------
gpon-onu_1/1/3:1         ZTEGC8A1FFFF        unknown
";

    /// `ifIndex` of gpon-olt_1/<slot>/<port>.
    fn if_index(slot: u32, port: u32) -> u32 {
        0x1000_0000 | (slot << 16) | (port << 8)
    }

    fn device() -> Device {
        DeviceBuilder::new("olt-1", "192.0.2.10")
            .telnet("monitor", "s3cret")
            .snmp("public")
            .pon_layout(1, 4)
            .build()
            .unwrap()
    }

    fn column(field: OnuField) -> crate::snmp::Oid {
        Vendor::ZteGpon
            .dialect()
            .oid_map
            .as_ref()
            .unwrap()
            .columns()
            .into_iter()
            .find(|(f, _)| *f == field)
            .map(|(_, oid)| oid)
            .unwrap()
    }

    fn cli() -> ScriptedExecutor {
        ScriptedExecutor::new(Vendor::ZteGpon)
            .output("show card", CARDS)
            .output("show gpon onu state gpon-olt_1/1/3", PORT_1_3)
            .output("show gpon onu uncfg", UNCFG)
    }

    fn options() -> ScanOptions {
        ScanOptions::default().with_details(false)
    }

    #[tokio::test]
    async fn test_cli_wins_and_snmp_fills_gaps() {
        let device = device();
        let mut executor = cli();

        let status = column(OnuField::Status);
        let rx = column(OnuField::RxPower);
        let mut walker = MapWalker::default();
        walker.columns.insert(
            status.clone(),
            vec![
                // CLI says working; SNMP disagrees and must lose.
                Varbind::new(status.child(&[if_index(1, 3), 1]), Value::Integer(2)),
                Varbind::new(status.child(&[if_index(1, 4), 2]), Value::Integer(4)),
            ],
        );
        walker.columns.insert(
            rx.clone(),
            vec![Varbind::new(rx.child(&[if_index(1, 3), 1, 1]), Value::Integer(4250))],
        );

        let result = DiscoveryOrchestrator::new(options())
            .scan_using(&device, Some(&mut executor), Some(&walker))
            .await
            .unwrap();

        assert!(executor.closed);
        assert_eq!(result.cards.len(), 1);
        assert_eq!(result.onus.len(), 3);

        let first = result.onu(PonPortAddress::new(1, 3), 1).unwrap();
        assert_eq!(first.status, Some(OnuStatus::Online));
        assert!((first.rx_power.unwrap() + 21.5).abs() < 1e-9);

        let snmp_only = result.onu(PonPortAddress::new(1, 4), 2).unwrap();
        assert_eq!(snmp_only.status, Some(OnuStatus::Online));
        assert!(snmp_only.serial.is_none());

        let keys: Vec<_> = result.onus.iter().map(|o| o.key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        // The serial column was never answered.
        assert!(result
            .warnings()
            .any(|d| d.kind == DiagnosticKind::SnmpError));

        let uncfg: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnconfiguredOnu)
            .collect();
        assert_eq!(uncfg.len(), 1);
        assert_eq!(uncfg[0].severity, Severity::Info);
        assert!(result.started_at <= result.finished_at);
    }

    #[tokio::test]
    async fn test_details_override_listing() {
        let device = device();
        let detail = "\
ONU interface:          gpon-onu_1/1/3:1
Name:                   cust-0042
Type:                   ZTE-F660
Serial number:          ZTEGC8A10001
ONU Distance:           1.52km
";
        let mut executor = cli().output("show gpon onu detail-info gpon-onu_1/1/3:1", detail);

        let result = DiscoveryOrchestrator::new(ScanOptions::default())
            .scan_using(&device, Some(&mut executor), None::<&MapWalker>)
            .await
            .unwrap();

        let onu = result.onu(PonPortAddress::new(1, 3), 1).unwrap();
        assert_eq!(onu.name.as_deref(), Some("cust-0042"));
        assert_eq!(onu.model.as_deref(), Some("ZTE-F660"));
        assert_eq!(onu.distance, Some(1520));
        assert!(executor
            .log
            .contains(&"show gpon onu detail-info gpon-onu_1/1/3:2".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_carries_cards() {
        let device = device();
        let mut executor = ScriptedExecutor::new(Vendor::ZteGpon)
            .output("show card", CARDS)
            .with_default(Reply::Timeout);

        let err = DiscoveryOrchestrator::new(options())
            .scan_using(&device, Some(&mut executor), None::<&MapWalker>)
            .await
            .unwrap_err();

        match err {
            Error::Scan(ScanError::DeviceUnreachable { timeouts, cards, .. }) => {
                assert_eq!(timeouts, 3);
                assert_eq!(cards.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(executor.closed);
    }

    #[tokio::test]
    async fn test_snmp_only_device() {
        let device = DeviceBuilder::new("olt-2", "192.0.2.11")
            .snmp("public")
            .pon_layout(1, 4)
            .build()
            .unwrap();
        let status = column(OnuField::Status);
        let serial = column(OnuField::Serial);
        let mut walker = MapWalker::default();
        walker.columns.insert(
            status.clone(),
            vec![Varbind::new(status.child(&[if_index(1, 2), 9]), Value::Integer(4))],
        );
        walker.columns.insert(
            serial.clone(),
            vec![Varbind::new(
                serial.child(&[if_index(1, 2), 9]),
                Value::OctetString(b"ZTEGC8A10099".to_vec()),
            )],
        );
        walker
            .columns
            .insert(column(OnuField::RxPower), vec![]);

        let result = DiscoveryOrchestrator::default()
            .scan_using(&device, None::<&mut ScriptedExecutor>, Some(&walker))
            .await
            .unwrap();

        assert!(result.cards.is_empty());
        assert_eq!(result.onus.len(), 1);
        assert_eq!(result.onus[0].serial.as_deref(), Some("ZTEGC8A10099"));
        assert!(result.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_card_listing_is_a_warning() {
        let device = device();
        let mut executor = ScriptedExecutor::new(Vendor::ZteGpon)
            .output("show card", "%Error 20200: Invalid input detected")
            .output("show gpon onu state gpon-olt_1/1/3", PORT_1_3);

        let result = DiscoveryOrchestrator::new(options().with_unconfigured(false))
            .scan_using(&device, Some(&mut executor), None::<&MapWalker>)
            .await
            .unwrap();

        assert!(result.cards.is_empty());
        assert_eq!(result.onus.len(), 2);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::CommandError);
        assert_eq!(result.diagnostics[0].context, DiagnosticContext::Device);
        assert!(!executor.log.iter().any(|c| c.contains("uncfg")));
    }

    #[tokio::test]
    async fn test_cancel_before_connect() {
        let device = device();
        let err = DiscoveryOrchestrator::default()
            .scan_with_cancel(&device, std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Scan(ScanError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_cancel_mid_login_closes_socket() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Sends a login prompt, then never answers; finishes once the peer hangs up.
        let olt = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"\r\nUsername:").await.unwrap();
            let mut buf = [0u8; 256];
            let mut received = 0;
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => return received,
                    Ok(n) => received += n,
                }
            }
        });

        let device = DeviceBuilder::new("olt-1", "127.0.0.1")
            .telnet("monitor", "s3cret")
            .telnet_port(port)
            .pon_layout(1, 4)
            .build()
            .unwrap();
        let options = ScanOptions::default();
        assert!(options.command_timeout > Duration::from_secs(2));

        let err = DiscoveryOrchestrator::new(options)
            .scan_with_cancel(&device, tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Scan(ScanError::Cancelled { .. })));

        let received = tokio::time::timeout(Duration::from_secs(2), olt)
            .await
            .expect("socket still open after cancellation")
            .unwrap();
        // the username went out before the cancel
        assert!(received > 0);
    }

    #[tokio::test]
    async fn test_scan_all_reports_every_device() {
        // Silent agents: every walk times out, which only produces warnings.
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let devices: Vec<Device> = ["olt-a", "olt-b"]
            .iter()
            .map(|id| {
                DeviceBuilder::new(*id, "127.0.0.1")
                    .snmp("public")
                    .snmp_port(port)
                    .pon_layout(1, 1)
                    .build()
                    .unwrap()
            })
            .collect();

        let options = ScanOptions::default()
            .with_snmp_timeout(Duration::from_millis(100))
            .with_concurrency(2);
        let results = DiscoveryOrchestrator::new(options).scan_all(&devices).await;

        let by_id: HashMap<_, _> = results.into_iter().collect();
        assert_eq!(by_id.len(), 2);
        for id in ["olt-a", "olt-b"] {
            let result = by_id[id].as_ref().unwrap();
            assert!(result.onus.is_empty());
            assert!(result.warnings().all(|d| d.kind == DiagnosticKind::SnmpError));
            assert_eq!(result.warnings().count(), 3);
        }
    }

    #[test]
    fn test_invalid_device_is_rejected_before_io() {
        let mut device = device();
        device.host.clear();
        let err = tokio_test::block_on(
            DiscoveryOrchestrator::default().scan_using(
                &device,
                None::<&mut ScriptedExecutor>,
                None::<&MapWalker>,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Scan(ScanError::InvalidDevice { .. })));
    }
}
