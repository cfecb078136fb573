//! "Label : value" detail blocks.

use indexmap::IndexMap;

use crate::model::{OnuRecord, OnuStatus};

use super::common::{
    is_missing, normalize_mac, parse_distance, parse_leading_u16, parse_power, parse_timestamp,
};

/// ONU attributes a detail block can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailField {
    Name,
    Model,
    Status,
    Serial,
    MacAddress,
    Distance,
    RxPower,
    TxPower,
    Vlan,
    BandwidthProfile,
    RegistrationDate,
    LastOnline,
}

/// Vendor labels per field. The first label of each entry is the one
/// [`DetailBlock::render`] writes.
#[derive(Debug, Clone, Copy)]
pub struct LabelTable {
    entries: &'static [(DetailField, &'static [&'static str])],
}

impl LabelTable {
    pub const fn new(entries: &'static [(DetailField, &'static [&'static str])]) -> Self {
        Self { entries }
    }

    /// Field for a label, ignoring case and runs of whitespace.
    pub fn field_for(&self, label: &str) -> Option<DetailField> {
        let label = collapse(label);
        self.entries.iter().find_map(|(field, labels)| {
            labels
                .iter()
                .any(|l| l.eq_ignore_ascii_case(&label))
                .then_some(*field)
        })
    }

    pub fn label_for(&self, field: DetailField) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, labels)| labels.first().copied())
    }
}

fn collapse(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Recognized fields of one detail response, raw values in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailBlock {
    values: IndexMap<DetailField, String>,
}

impl DetailBlock {
    /// Collect every recognized `Label: value` line.
    ///
    /// Unknown labels, blank values and placeholders such as `N/A` are
    /// skipped. When a label repeats, the first occurrence wins.
    pub fn parse(table: &LabelTable, text: &str) -> Self {
        let mut values = IndexMap::new();
        for line in text.lines() {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let Some(field) = table.field_for(label) else {
                continue;
            };
            let value = value.trim();
            if is_missing(value) {
                continue;
            }
            values.entry(field).or_insert_with(|| value.to_string());
        }
        Self { values }
    }

    pub fn get(&self, field: DetailField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = DetailField> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write the block back as `Label: value` lines.
    pub fn render(&self, table: &LabelTable) -> String {
        let mut out = String::new();
        for (field, value) in &self.values {
            if let Some(label) = table.label_for(*field) {
                out.push_str(label);
                out.push_str(": ");
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }

    /// Overwrite `record` fields with every value that parses.
    pub fn apply_to(&self, record: &mut OnuRecord) {
        for (field, value) in &self.values {
            let value = value.as_str();
            match field {
                DetailField::Name => record.name = Some(value.to_string()),
                DetailField::Model => record.model = Some(value.to_string()),
                DetailField::Status => {
                    let keyword = value.split_whitespace().next().unwrap_or(value);
                    if let Some(status) = OnuStatus::from_keyword(keyword) {
                        record.status = Some(status);
                    }
                }
                DetailField::Serial => {
                    // "ZTEGC8A10001" or "SN:ZTEGC8A10001"
                    let serial = value.trim_start_matches("SN:").trim();
                    record.serial = Some(serial.to_string());
                }
                DetailField::MacAddress => {
                    if let Some(mac) = normalize_mac(value) {
                        record.mac_address = Some(mac);
                    }
                }
                DetailField::Distance => {
                    if let Some(distance) = parse_distance(value) {
                        record.distance = Some(distance);
                    }
                }
                DetailField::RxPower => {
                    if let Some(power) = parse_power(value) {
                        record.rx_power = Some(power);
                    }
                }
                DetailField::TxPower => {
                    if let Some(power) = parse_power(value) {
                        record.tx_power = Some(power);
                    }
                }
                DetailField::Vlan => {
                    if let Some(vlan) = parse_leading_u16(value) {
                        record.vlan_id = Some(vlan);
                    }
                }
                DetailField::BandwidthProfile => {
                    record.bandwidth_profile = Some(value.to_string());
                }
                DetailField::RegistrationDate => {
                    if let Some(ts) = parse_timestamp(value) {
                        record.registration_date = Some(ts);
                    }
                }
                DetailField::LastOnline => {
                    if let Some(ts) = parse_timestamp(value) {
                        record.last_online = Some(ts);
                    }
                }
            }
        }
    }
}
