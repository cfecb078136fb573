//! # Ponscout
//!
//! Async Telnet/SNMP inventory discovery for PON optical line terminals.
//!
//! Ponscout logs into an OLT over Telnet, walks its PON port layout with
//! vendor CLI commands, polls the ONU tables over SNMPv2c and merges both
//! into one [`ScanResult`] per device.
//!
//! ## Features
//!
//! - Async Telnet sessions with IAC negotiation and pager handling
//! - Tail-searched prompt matching over a bounded buffer
//! - ZTE GPON and HIOSO EPON dialects, addable through [`Dialect`]
//! - SNMP GETBULK walks joined by table index
//! - Per-port timeouts and parse failures reported as diagnostics, not errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ponscout::{DeviceBuilder, DiscoveryOrchestrator, ScanOptions, Vendor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ponscout::Error> {
//!     let password = std::env::var("OLT_PASSWORD").unwrap_or_default();
//!     let device = DeviceBuilder::new("olt-1", "10.0.0.2")
//!         .vendor(Vendor::ZteGpon)
//!         .telnet("monitor", password)
//!         .snmp("public")
//!         .pon_layout(2, 16)
//!         .build()?;
//!
//!     let result = DiscoveryOrchestrator::new(ScanOptions::default())
//!         .scan(&device)
//!         .await?;
//!
//!     for onu in &result.onus {
//!         println!("{}/{}:{} {:?}", onu.port.slot, onu.port.port, onu.onu_id, onu.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod device;
pub mod driver;
pub mod error;
pub mod model;
pub mod parser;
pub mod platform;
pub mod scan;
pub mod session;
pub mod snmp;
pub mod transport;

// Re-export main types for convenience
pub use device::{Device, DeviceBuilder, SnmpSettings, TelnetSettings};
pub use driver::{CommandExecutor, Response};
pub use error::{Error, Result};
pub use model::{
    CardState, CardStatus, Diagnostic, DiagnosticContext, DiagnosticKind, OnuKey, OnuRecord,
    OnuStatus, PonPortAddress, ScanResult, Severity, UnconfiguredOnu,
};
pub use platform::{Dialect, Vendor};
pub use scan::{DiscoveryOrchestrator, PortEnumerator, ScanOptions};
pub use session::{Session, SessionState};
pub use snmp::{SnmpWalker, UdpSnmpClient};
pub use transport::TelnetConfig;
