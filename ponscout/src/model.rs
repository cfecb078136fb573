//! Inventory types produced by a scan.
//!
//! These are the only values the rest of an application needs to depend on.
//! They do not record which transport (Telnet or SNMP) produced a field.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::platform::Vendor;

/// A physical PON interface on a device, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PonPortAddress {
    pub slot: u8,
    pub port: u8,
}

impl PonPortAddress {
    pub fn new(slot: u8, port: u8) -> Self {
        Self { slot, port }
    }
}

impl fmt::Display for PonPortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.slot, self.port)
    }
}

/// Identity of an ONU within a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OnuKey {
    pub port: PonPortAddress,
    pub onu_id: u16,
}

impl fmt::Display for OnuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.port, self.onu_id)
    }
}

/// Operational state of an ONU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnuStatus {
    Online,
    Offline,
    Silent,
    Unconfigured,
}

impl OnuStatus {
    /// Map a vendor state keyword (`working`, `LOS`, `DyingGasp`, ...) to a status.
    ///
    /// Returns `None` for words that are not state keywords at all.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let word = word.trim().to_ascii_lowercase();
        match word.as_str() {
            "working" | "ready" | "online" | "up" | "registered" => Some(OnuStatus::Online),
            "los" | "offline" | "dyinggasp" | "dying-gasp" | "dying_gasp" | "poweroff"
            | "power-off" | "down" | "deregistered" => Some(OnuStatus::Offline),
            "logging" | "syncmib" | "authfailed" | "auth-failed" | "silent" => {
                Some(OnuStatus::Silent)
            }
            "unconfigured" | "uncfg" | "unauthorized" => Some(OnuStatus::Unconfigured),
            _ => None,
        }
    }
}

/// One ONU as discovered on a device.
///
/// Everything except the address is optional: a field that no transport
/// reported stays `None` rather than being guessed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnuRecord {
    pub port: PonPortAddress,
    pub onu_id: u16,
    pub serial: Option<String>,
    pub mac_address: Option<String>,
    pub status: Option<OnuStatus>,
    pub name: Option<String>,
    pub model: Option<String>,
    /// Received optical power at the OLT, dBm.
    pub rx_power: Option<f64>,
    /// Transmitted optical power, dBm.
    pub tx_power: Option<f64>,
    /// Fiber distance in meters.
    pub distance: Option<u32>,
    pub vlan_id: Option<u16>,
    pub bandwidth_profile: Option<String>,
    pub registration_date: Option<NaiveDateTime>,
    pub last_online: Option<NaiveDateTime>,
}

impl OnuRecord {
    pub fn new(port: PonPortAddress, onu_id: u16) -> Self {
        Self {
            port,
            onu_id,
            serial: None,
            mac_address: None,
            status: None,
            name: None,
            model: None,
            rx_power: None,
            tx_power: None,
            distance: None,
            vlan_id: None,
            bandwidth_profile: None,
            registration_date: None,
            last_online: None,
        }
    }

    pub fn key(&self) -> OnuKey {
        OnuKey {
            port: self.port,
            onu_id: self.onu_id,
        }
    }

    /// Fill every field still unset on `self` from `other`.
    ///
    /// Fields already present on `self` are never overwritten.
    pub fn fill_missing_from(&mut self, other: &OnuRecord) {
        fn fill<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if dst.is_none() {
                dst.clone_from(src);
            }
        }
        fill(&mut self.serial, &other.serial);
        fill(&mut self.mac_address, &other.mac_address);
        fill(&mut self.status, &other.status);
        fill(&mut self.name, &other.name);
        fill(&mut self.model, &other.model);
        fill(&mut self.rx_power, &other.rx_power);
        fill(&mut self.tx_power, &other.tx_power);
        fill(&mut self.distance, &other.distance);
        fill(&mut self.vlan_id, &other.vlan_id);
        fill(&mut self.bandwidth_profile, &other.bandwidth_profile);
        fill(&mut self.registration_date, &other.registration_date);
        fill(&mut self.last_online, &other.last_online);
    }
}

/// Operational state of a chassis card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CardState {
    InService,
    Offline,
    Standby,
    Other(String),
}

impl CardState {
    pub fn from_keyword(word: &str) -> Self {
        match word.trim().to_ascii_uppercase().as_str() {
            "INSERVICE" | "IN-SERVICE" | "NORMAL" | "ONLINE" | "UP" | "ACTIVE" => {
                CardState::InService
            }
            "OFFLINE" | "DOWN" | "ABSENT" | "NOTPRESENT" => CardState::Offline,
            "STANDBY" => CardState::Standby,
            _ => CardState::Other(word.trim().to_string()),
        }
    }
}

/// One row of the card listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardStatus {
    pub slot: u8,
    /// Configured card type.
    pub card_type: String,
    /// Type reported by the inserted hardware, when it differs or is shown.
    pub real_type: Option<String>,
    pub port_count: Option<u8>,
    pub state: CardState,
}

/// An ONU seen on the fiber but not yet provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnconfiguredOnu {
    pub port: Option<PonPortAddress>,
    /// Serial number for GPON, MAC address for EPON.
    pub serial: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    CommandTimeout,
    CommandError,
    ParseError,
    SnmpError,
    UnconfiguredOnu,
    DuplicateOnu,
    Unsupported,
}

/// What a diagnostic is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticContext {
    Device,
    Port { port: PonPortAddress },
    Onu { key: OnuKey },
    Oid { oid: String },
    Serial {
        port: Option<PonPortAddress>,
        serial: String,
    },
}

/// A non-fatal finding recorded during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub context: DiagnosticContext,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, context: DiagnosticContext, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            context,
            message: message.into(),
        }
    }

    pub fn info(kind: DiagnosticKind, context: DiagnosticContext, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            kind,
            context,
            message: message.into(),
        }
    }
}

/// Inventory snapshot of one device.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub device_id: String,
    pub host: String,
    pub vendor: Vendor,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cards: Vec<CardStatus>,
    /// Sorted by port, then ONU id.
    pub onus: Vec<OnuRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ScanResult {
    /// Look up an ONU by address.
    pub fn onu(&self, port: PonPortAddress, onu_id: u16) -> Option<&OnuRecord> {
        self.onus
            .iter()
            .find(|o| o.port == port && o.onu_id == onu_id)
    }

    /// Diagnostics with warning severity.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}
