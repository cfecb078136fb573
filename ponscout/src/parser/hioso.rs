//! HIOSO EPON output parsers.
//!
//! EPON ONUs are identified by MAC address; the serial column of the
//! unauthorized listing carries the MAC as well.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::error::ParseError;
use crate::model::{CardState, CardStatus, OnuRecord, OnuStatus, PonPortAddress, UnconfiguredOnu};

use super::common::{ensure_recognized, is_missing, normalize_mac};
use super::detail::{DetailField, LabelTable};

pub(super) const DETAIL_LABELS: LabelTable = LabelTable::new(&[
    (DetailField::Name, &["Name", "Description"]),
    (DetailField::Model, &["Model", "ONU type"]),
    (DetailField::Status, &["Status", "State"]),
    (DetailField::Serial, &["Serial number"]),
    (DetailField::MacAddress, &["MAC address", "MAC"]),
    (DetailField::Distance, &["Distance"]),
    (DetailField::RxPower, &["Rx power"]),
    (DetailField::TxPower, &["Tx power"]),
    (DetailField::Vlan, &["VLAN"]),
    (DetailField::BandwidthProfile, &["Bandwidth profile"]),
    (DetailField::RegistrationDate, &["Register time"]),
    (DetailField::LastOnline, &["Last online"]),
]);

// `0     EPON-4P     4      Normal`
static CARD_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s+([A-Za-z]\S*)\s+(\d+)\s+(\S+)").expect("card row pattern")
});

static CARD_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\s+\S").expect("card identifier pattern"));

// `0/1:1  00:1a:2b:3c:4d:5e  online  1200  casa-01`
static ONU_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:epon\s*)?\d+/(\d+):(\d+)\s+(\S+)\s+(\S+)(?:\s+(\d+))?(?:\s+(\S+))?\s*$")
        .expect("onu row pattern")
});

static ONU_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:epon\s*)?\d+/\d+").expect("onu identifier pattern"));

// `0/1    00:1a:2b:3c:4d:99   2024-03-01 09:12:44`
static UNAUTH_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:epon\s*)?\d+/(\d+)\s+([0-9A-Fa-f][0-9A-Fa-f:.\-]{10,16})\b")
        .expect("unauthorized row pattern")
});

pub(super) fn parse_cards(text: &str) -> Result<Vec<CardStatus>, ParseError> {
    let mut cards = Vec::new();

    for line in text.lines() {
        let Some(caps) = CARD_ROW.captures(line) else {
            continue;
        };
        let Ok(slot) = caps[1].parse::<u8>() else {
            continue;
        };
        cards.push(CardStatus {
            slot,
            card_type: caps[2].to_string(),
            real_type: None,
            port_count: caps[3].parse().ok(),
            state: CardState::from_keyword(&caps[4]),
        });
    }

    ensure_recognized("card", text, cards.len(), &CARD_IDENTIFIER)?;
    Ok(cards)
}

pub(super) fn parse_onu_states(port: PonPortAddress, text: &str) -> Result<Vec<OnuRecord>, ParseError> {
    let mut records = Vec::new();
    let mut matched = 0;

    for line in text.lines() {
        let Some(caps) = ONU_ROW.captures(line) else {
            continue;
        };
        matched += 1;

        let (Ok(row_port), Ok(onu_id)) = (caps[1].parse::<u8>(), caps[2].parse::<u16>()) else {
            continue;
        };
        // Single-slot chassis: only the port number is meaningful.
        if row_port != port.port {
            debug!("Skipping row for port {} while parsing {}", row_port, port);
            continue;
        }

        let mut record = OnuRecord::new(port, onu_id);
        record.mac_address = normalize_mac(&caps[3]);
        record.status = OnuStatus::from_keyword(&caps[4]);
        record.distance = caps.get(5).and_then(|m| m.as_str().parse().ok());
        record.name = caps
            .get(6)
            .map(|m| m.as_str())
            .filter(|name| !is_missing(name))
            .map(str::to_string);
        records.push(record);
    }

    ensure_recognized("onu state", text, matched, &ONU_IDENTIFIER)?;
    Ok(records)
}

pub(super) fn parse_unconfigured(text: &str) -> Result<Vec<UnconfiguredOnu>, ParseError> {
    let mut onus = Vec::new();

    for line in text.lines() {
        let Some(caps) = UNAUTH_ROW.captures(line) else {
            continue;
        };
        let Some(mac) = normalize_mac(&caps[2]) else {
            continue;
        };
        let port = caps[1].parse::<u8>().ok().map(|p| PonPortAddress::new(1, p));
        onus.push(UnconfiguredOnu { port, serial: mac });
    }

    ensure_recognized("unconfigured onu", text, onus.len(), &ONU_IDENTIFIER)?;
    Ok(onus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onu_info_rows() {
        let text = "\
OnuId  MAC                Status    Distance(m)  Name
------------------------------------------------------
0/2:1  00:1a:2b:3c:4d:5e  online    1200         casa-01
0/2:2  001a.2b3c.4d60     offline   0            -
0/2:3  001A2B3C4D61       silent
";
        let port = PonPortAddress::new(1, 2);
        let records = parse_onu_states(port, text).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].mac_address.as_deref(), Some("00:1a:2b:3c:4d:5e"));
        assert_eq!(records[0].status, Some(OnuStatus::Online));
        assert_eq!(records[0].distance, Some(1200));
        assert_eq!(records[0].name.as_deref(), Some("casa-01"));

        assert_eq!(records[1].mac_address.as_deref(), Some("00:1a:2b:3c:4d:60"));
        assert_eq!(records[1].name, None);

        assert_eq!(records[2].status, Some(OnuStatus::Silent));
        assert_eq!(records[2].distance, None);
        assert!(records.iter().all(|r| r.serial.is_none()));
    }

    #[test]
    fn test_cards() {
        let text = "Slot  Type        Ports  Status\n----------------------------------\n0     EPON-4P     4      Normal\n";
        let cards = parse_cards(text).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].card_type, "EPON-4P");
        assert_eq!(cards[0].port_count, Some(4));
        assert_eq!(cards[0].state, CardState::InService);
    }

    #[test]
    fn test_unauthorized() {
        let text = "Port   MAC                Time\n-------------------------------\n0/1    00-1A-2B-3C-4D-99  2024-03-01 09:12:44\n";
        let onus = parse_unconfigured(text).unwrap();
        assert_eq!(onus.len(), 1);
        assert_eq!(onus[0].port, Some(PonPortAddress::new(1, 1)));
        assert_eq!(onus[0].serial, "00:1a:2b:3c:4d:99");
    }
}
