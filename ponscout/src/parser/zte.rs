//! ZTE GPON output parsers.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::error::ParseError;
use crate::model::{CardState, CardStatus, OnuRecord, OnuStatus, PonPortAddress, UnconfiguredOnu};

use super::common::ensure_recognized;
use super::detail::{DetailField, LabelTable};

pub(super) const DETAIL_LABELS: LabelTable = LabelTable::new(&[
    (DetailField::Name, &["Name"]),
    (DetailField::Model, &["Type"]),
    (DetailField::Status, &["Phase state"]),
    (DetailField::Serial, &["Serial number", "SN"]),
    (DetailField::MacAddress, &["MAC address"]),
    (DetailField::Distance, &["ONU Distance"]),
    (DetailField::RxPower, &["Rx optical power", "ONU Rx power"]),
    (DetailField::TxPower, &["Tx optical power", "ONU Tx power"]),
    (DetailField::Vlan, &["VLAN", "Vlan id"]),
    (DetailField::BandwidthProfile, &["Line Profile", "Bandwidth profile"]),
    (DetailField::RegistrationDate, &["Register time", "Registration time"]),
    (DetailField::LastOnline, &["Last online time", "Last online"]),
]);

// `1  1  GTGO  GTGOG  8  V1.0  V2.1.0  INSERVICE`
static CARD_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s+(\d+)\s+([A-Za-z]\S*)\s+(.*\S)\s*$").expect("card row pattern")
});

static CARD_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\s+\d+\s").expect("card identifier pattern"));

// `1/1/3:1  enable  enable  working  1(GPON)  ZTEGC8A10001`
static ONU_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:gpon-onu_)?(\d+)/(\d+)/(\d+):(\d+)\s+(.*?)\s*$").expect("onu row pattern")
});

static ONU_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:gpon-(?:onu|olt)_)?\d+/\d+/\d+").expect("onu identifier pattern")
});

static SERIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:SN:)?([A-Z0-9]{4}[0-9A-Fa-f]{8})$").expect("serial pattern")
});

// `gpon-onu_1/1/3:1  ZTEGC8A1FFFF  unknown`
static UNCFG_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*gpon-(?:onu|olt)_\d+/(\d+)/(\d+)(?::\d+)?\s+(?:SN:)?(\S+)")
        .expect("uncfg row pattern")
});

static UNCFG_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*gpon-").expect("uncfg identifier pattern"));

pub(super) fn parse_cards(text: &str) -> Result<Vec<CardStatus>, ParseError> {
    let mut cards = Vec::new();

    for line in text.lines() {
        let Some(caps) = CARD_ROW.captures(line) else {
            continue;
        };
        let Ok(slot) = caps[2].parse::<u8>() else {
            continue;
        };

        let rest: Vec<&str> = caps[4].split_whitespace().collect();
        let Some((state, middle)) = rest.split_last() else {
            continue;
        };
        let real_type = middle
            .first()
            .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
            .map(|t| t.to_string());
        let port_count = middle
            .iter()
            .find(|t| t.chars().all(|c| c.is_ascii_digit()))
            .and_then(|t| t.parse().ok());

        cards.push(CardStatus {
            slot,
            card_type: caps[3].to_string(),
            real_type,
            port_count,
            state: CardState::from_keyword(state),
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

        let (Ok(slot), Ok(row_port), Ok(onu_id)) = (
            caps[2].parse::<u8>(),
            caps[3].parse::<u8>(),
            caps[4].parse::<u16>(),
        ) else {
            continue;
        };
        if PonPortAddress::new(slot, row_port) != port {
            debug!("Skipping row for {}/{} while parsing {}", slot, row_port, port);
            continue;
        }

        let mut record = OnuRecord::new(port, onu_id);
        for token in caps[5].split_whitespace() {
            if let Some(status) = OnuStatus::from_keyword(token) {
                // Phase state is the last state column.
                record.status = Some(status);
            } else if let Some(serial) = SERIAL.captures(token) {
                record.serial = Some(serial[1].to_string());
            }
        }
        records.push(record);
    }

    ensure_recognized("onu state", text, matched, &ONU_IDENTIFIER)?;
    Ok(records)
}

pub(super) fn parse_unconfigured(text: &str) -> Result<Vec<UnconfiguredOnu>, ParseError> {
    let mut onus = Vec::new();

    for line in text.lines() {
        let Some(caps) = UNCFG_ROW.captures(line) else {
            continue;
        };
        let port = match (caps[1].parse::<u8>(), caps[2].parse::<u8>()) {
            (Ok(slot), Ok(port)) => Some(PonPortAddress::new(slot, port)),
            _ => None,
        };
        onus.push(UnconfiguredOnu {
            port,
            serial: caps[3].to_string(),
        });
    }

    ensure_recognized("unconfigured onu", text, onus.len(), &UNCFG_IDENTIFIER)?;
    Ok(onus)
}
