//! HIOSO EPON dialect.
//!
//! Single line card; ports are addressed as `0/<port>`, ONUs as
//! `0/<port>:<id>`. The slot part of a [`PonPortAddress`](crate::model::PonPortAddress)
//! is always 1 and does not appear in commands.

use crate::model::OnuStatus;
use crate::platform::{CommandSet, Dialect, EnableLevel};
use crate::snmp::{IndexLayout, OidMap, PowerEncoding};

const SNMP_BASE: [u32; 10] = [1, 3, 6, 1, 4, 1, 25355, 3, 2, 6];

const ONUS_PER_PORT: u32 = 64;

const ONU_STATES: [(i64, OnuStatus); 3] = [
    (1, OnuStatus::Online),
    (2, OnuStatus::Offline),
    (3, OnuStatus::Silent),
];

fn oid_map() -> OidMap {
    OidMap::new(
        &SNMP_BASE,
        IndexLayout::Sequential {
            onus_per_port: ONUS_PER_PORT,
        },
        PowerEncoding {
            scale: 0.01,
            offset: 0.0,
            invalid: None,
        },
    )
    .with_status(&[3, 2, 1, 39], &ONU_STATES)
    .with_mac_address(&[3, 2, 1, 5])
    .with_rx_power(&[14, 2, 1, 8])
    .with_tx_power(&[14, 2, 1, 7])
}

/// Create the HIOSO EPON dialect.
pub fn dialect() -> Result<Dialect, regex::Error> {
    let enable = EnableLevel::new("enable", r"(?m)^[\w.\-]+>")?.with_auth(r"(?i)password\s*:")?;

    let dialect = Dialect::new(
        "HIOSO-EPON",
        r"(?m)^[\w.\-]+(\([\w.\-]+\))?[#>]",
        CommandSet {
            cards: "show card".to_string(),
            onu_states: "show onu info {interface}".to_string(),
            onu_detail: Some("show onu detail-info {interface}".to_string()),
            unconfigured: Some("show onu unauthorized".to_string()),
        },
    )?
    .with_login_prompt(r"(?i)(user\s?name|login|user)\s*:")?
    .with_pager(r"-+\s?[Mm]ore\s?-+")?
    .with_enable(enable)
    .with_address_templates("epon 0/{port}", "epon 0/{port}:{onu}")
    .with_max_slots(1)
    .with_auth_failure_marker("Bad username or password")
    .with_auth_failure_marker("Login failed")
    .with_auth_failure_marker("Access denied")
    .with_failure_pattern("Unknown command")
    .with_failure_pattern("Invalid")
    .with_failure_pattern("Error:")
    .with_empty_marker("No ONU")
    .with_empty_marker("not exist")
    .with_on_open_command("terminal length 0")
    .with_on_close_command("exit")
    .with_oid_map(oid_map());

    Ok(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PonPortAddress;

    #[test]
    fn test_hioso_commands() {
        let dialect = dialect().unwrap();
        let port = PonPortAddress::new(1, 4);
        assert_eq!(dialect.onu_states_command(port), "show onu info epon 0/4");
        assert_eq!(
            dialect.onu_detail_command(port, 2).as_deref(),
            Some("show onu detail-info epon 0/4:2")
        );
        assert_eq!(dialect.unconfigured_command(), Some("show onu unauthorized"));
    }

    #[test]
    fn test_hioso_prompts() {
        let dialect = dialect().unwrap();
        assert!(dialect.shell_prompt.is_match(b"\nEPON>"));
        assert!(dialect.shell_prompt.is_match(b"\nEPON# "));
        assert!(dialect.login_prompt.is_match(b"\nUsername:"));
    }

    #[test]
    fn test_hioso_oid_map_is_sequential() {
        let dialect = dialect().unwrap();
        let map = dialect.oid_map.as_ref().unwrap();
        assert_eq!(map.index.len(), 1);
        let key = map.index.decode(&[70]).unwrap();
        assert_eq!(key.port, PonPortAddress::new(1, 2));
        assert_eq!(key.onu_id, 6);
        assert_eq!(map.columns().len(), 4);
    }
}
