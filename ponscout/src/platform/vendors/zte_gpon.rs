//! ZTE GPON (C300/C320/C600 family) dialect.
//!
//! Ports are addressed as `gpon-olt_1/<slot>/<port>` and ONUs as
//! `gpon-onu_1/<slot>/<port>:<id>`, shelf always 1.

use crate::model::OnuStatus;
use crate::platform::{CommandSet, Dialect, EnableLevel};
use crate::snmp::{IndexLayout, OidMap, PowerEncoding};

/// `zxAnPonOnu` subtree.
const SNMP_BASE: [u32; 9] = [1, 3, 6, 1, 4, 1, 3902, 1012, 3];

/// Phase state values of `zxAnGponOnuPhaseState`.
const PHASE_STATES: [(i64, OnuStatus); 7] = [
    (1, OnuStatus::Silent),  // logging
    (2, OnuStatus::Offline), // los
    (3, OnuStatus::Silent),  // syncMib
    (4, OnuStatus::Online),  // working
    (5, OnuStatus::Offline), // dyingGasp
    (6, OnuStatus::Silent),  // authFailed
    (7, OnuStatus::Offline), // offline
];

fn oid_map() -> OidMap {
    OidMap::new(
        &SNMP_BASE,
        IndexLayout::IfIndexOnu,
        PowerEncoding {
            scale: 0.002,
            offset: -30.0,
            invalid: Some(65535),
        },
    )
    .with_status(&[28, 2, 1, 4], &PHASE_STATES)
    .with_serial(&[28, 1, 1, 5])
    .with_rx_power(&[50, 12, 1, 1, 10])
}

/// Create the ZTE GPON dialect.
pub fn dialect() -> Result<Dialect, regex::Error> {
    let enable = EnableLevel::new("enable", r"(?m)^[\w.\-]+>")?.with_auth(r"(?i)password\s*:")?;

    let dialect = Dialect::new(
        "ZTE-GPON",
        r"(?m)^[\w.\-]+(\([\w.\-]+\))?[#>]",
        CommandSet {
            cards: "show card".to_string(),
            onu_states: "show gpon onu state {interface}".to_string(),
            onu_detail: Some("show gpon onu detail-info {interface}".to_string()),
            unconfigured: Some("show gpon onu uncfg".to_string()),
        },
    )?
    .with_pager(r"-+\s?More\s?-+")?
    .with_enable(enable)
    .with_address_templates("gpon-olt_1/{slot}/{port}", "gpon-onu_1/{slot}/{port}:{onu}")
    .with_auth_failure_marker("Username or password")
    .with_auth_failure_marker("Bad password")
    .with_auth_failure_marker("Authentication failed")
    .with_auth_failure_marker("Login incorrect")
    .with_failure_pattern("%Error")
    .with_failure_pattern("%Code")
    .with_failure_pattern("Invalid input")
    .with_failure_pattern("Unrecognized command")
    .with_empty_marker("No related information to show")
    .with_empty_marker("No ONU")
    .with_on_open_command("terminal length 0")
    .with_on_close_command("exit")
    .with_oid_map(oid_map());

    Ok(dialect)
}
