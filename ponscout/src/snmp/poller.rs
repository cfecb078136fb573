//! Turns a vendor OID map into ONU records.
//!
//! Each configured column is walked separately. Rows from different
//! columns are joined on the leading index components after the column
//! OID; the join never relies on the order agents return rows in.

use std::collections::HashSet;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::device::Device;
use crate::model::{Diagnostic, DiagnosticContext, DiagnosticKind, OnuKey, OnuRecord};
use crate::parser::normalize_mac;

use super::ber::Value;
use super::client::SnmpWalker;
use super::oid::{OidMap, OnuField};

/// Outcome of polling one device.
#[derive(Debug, Default)]
pub struct SnmpPoll {
    /// Sorted by port, then ONU id.
    pub records: Vec<OnuRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Polls ONU tables over SNMP.
pub struct SnmpPoller<'a> {
    map: &'a OidMap,
    device: &'a Device,
    walk_timeout: Duration,
}

impl<'a> SnmpPoller<'a> {
    pub fn new(map: &'a OidMap, device: &'a Device, walk_timeout: Duration) -> Self {
        Self {
            map,
            device,
            walk_timeout,
        }
    }

    /// Walk every column and join the rows.
    ///
    /// Walk failures and rows whose index does not decode to a port of this
    /// device become warnings; they never fail the poll.
    pub async fn poll<W: SnmpWalker>(&self, walker: &W) -> SnmpPoll {
        let index_len = self.map.index.len();
        let mut joined: IndexMap<Vec<u32>, OnuRecord> = IndexMap::new();
        let mut rejected: HashSet<Vec<u32>> = HashSet::new();
        let mut diagnostics = Vec::new();

        for (field, column) in self.map.columns() {
            let varbinds = match walker.walk(&column, self.walk_timeout).await {
                Ok(varbinds) => varbinds,
                Err(e) => {
                    warn!("SNMP walk of {} ({}) on {} failed: {}", column, field, self.device.host, e);
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::SnmpError,
                        DiagnosticContext::Oid {
                            oid: column.to_string(),
                        },
                        format!("{} walk failed: {}", field, e),
                    ));
                    continue;
                }
            };
            debug!("{} rows for {} on {}", varbinds.len(), field, self.device.host);

            for varbind in varbinds {
                let Some(suffix) = varbind.oid.suffix_after(&column) else {
                    continue;
                };
                if suffix.len() < index_len {
                    continue;
                }
                let index = &suffix[..index_len];

                if !joined.contains_key(index) {
                    if rejected.contains(index) {
                        continue;
                    }
                    match self.decode_index(index) {
                        Some(key) => {
                            joined.insert(index.to_vec(), OnuRecord::new(key.port, key.onu_id));
                        }
                        None => {
                            let oid = varbind.oid.to_string();
                            diagnostics.push(Diagnostic::warning(
                                DiagnosticKind::SnmpError,
                                DiagnosticContext::Oid { oid: oid.clone() },
                                format!("index of {} does not map to a PON port on this device", oid),
                            ));
                            rejected.insert(index.to_vec());
                            continue;
                        }
                    }
                }

                if let Some(record) = joined.get_mut(index) {
                    self.apply(record, field, &varbind.value);
                }
            }
        }

        let mut records: Vec<OnuRecord> = joined.into_values().collect();
        records.sort_by_key(|r| r.key());

        SnmpPoll {
            records,
            diagnostics,
        }
    }

    fn decode_index(&self, index: &[u32]) -> Option<OnuKey> {
        self.map
            .index
            .decode(index)
            .filter(|key| self.device.contains(key.port))
    }

    fn apply(&self, record: &mut OnuRecord, field: OnuField, value: &Value) {
        if value.is_exception() {
            return;
        }
        match field {
            OnuField::Status => {
                if let Some(status) = value.as_i64().and_then(|raw| self.map.status_for(raw)) {
                    record.status = Some(status);
                }
            }
            OnuField::Serial => {
                if let Some(serial) = value.as_bytes().and_then(decode_serial) {
                    record.serial = Some(serial);
                }
            }
            OnuField::MacAddress => {
                if let Some(mac) = value.as_bytes().and_then(decode_mac) {
                    record.mac_address = Some(mac);
                }
            }
            OnuField::RxPower => {
                record.rx_power = value.as_i64().and_then(|raw| self.map.power.decode(raw));
            }
            OnuField::TxPower => {
                record.tx_power = value.as_i64().and_then(|raw| self.map.power.decode(raw));
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Serial numbers arrive either as text or as the 8-byte GPON form
/// (4-byte vendor id + 4-byte vendor-specific number).
fn decode_serial(bytes: &[u8]) -> Option<String> {
    let trimmed: &[u8] = {
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        &bytes[..end]
    };
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.iter().all(|b| b.is_ascii_graphic()) {
        return Some(String::from_utf8_lossy(trimmed).into_owned());
    }
    if bytes.len() == 8 && bytes[..4].iter().all(u8::is_ascii_alphanumeric) {
        return Some(format!("{}{}", String::from_utf8_lossy(&bytes[..4]), hex(&bytes[4..])));
    }
    Some(hex(bytes))
}

fn decode_mac(bytes: &[u8]) -> Option<String> {
    if bytes.len() == 6 {
        let parts: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        return Some(parts.join(":"));
    }
    std::str::from_utf8(bytes).ok().and_then(normalize_mac)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::device::DeviceBuilder;
    use crate::model::{OnuStatus, PonPortAddress};
    use crate::scan::testing::MapWalker;
    use crate::snmp::ber::Varbind;
    use crate::snmp::oid::{IndexLayout, PowerEncoding};

    fn map() -> OidMap {
        OidMap::new(
            &[1, 3, 6, 1, 4, 1, 9999],
            IndexLayout::PortOnu,
            PowerEncoding {
                scale: 0.01,
                offset: 0.0,
                invalid: None,
            },
        )
        .with_status(&[1], &[(1, OnuStatus::Online), (2, OnuStatus::Offline)])
        .with_serial(&[2])
        .with_rx_power(&[3])
    }

    fn device() -> Device {
        DeviceBuilder::new("olt", "192.0.2.1")
            .snmp("public".to_string())
            .pon_layout(1, 4)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_join_by_index_suffix() {
        let map = map();
        let status = map.base.child(&[1]);
        let serial = map.base.child(&[2]);
        let rx = map.base.child(&[3]);

        // Rows arrive in different orders per column; port 2 ONU 7 must end
        // up as a single record regardless.
        let mut columns = HashMap::new();
        columns.insert(
            status.clone(),
            vec![
                Varbind::new(status.child(&[2, 7]), Value::Integer(1)),
                Varbind::new(status.child(&[1, 3]), Value::Integer(2)),
            ],
        );
        columns.insert(
            serial.clone(),
            vec![
                Varbind::new(serial.child(&[1, 3]), Value::OctetString(b"HSGQ00000003".to_vec())),
                Varbind::new(serial.child(&[2, 7]), Value::OctetString(b"HSGQ00000007".to_vec())),
            ],
        );
        columns.insert(
            rx.clone(),
            vec![Varbind::new(rx.child(&[2, 7]), Value::Integer(-2150))],
        );

        let device = device();
        let poll = SnmpPoller::new(&map, &device, Duration::from_secs(1))
            .poll(&MapWalker { columns })
            .await;

        assert!(poll.diagnostics.is_empty());
        assert_eq!(poll.records.len(), 2);
        assert_eq!(poll.records[0].key().port, PonPortAddress::new(1, 1));
        assert_eq!(poll.records[0].serial.as_deref(), Some("HSGQ00000003"));
        // 1/3 has no rx row
        assert!(poll.records[0].rx_power.is_none());

        let onu = &poll.records[1];
        assert_eq!((onu.port, onu.onu_id), (PonPortAddress::new(1, 2), 7));
        assert_eq!(onu.status, Some(OnuStatus::Online));
        assert_eq!(onu.serial.as_deref(), Some("HSGQ00000007"));
        assert_eq!(onu.rx_power, Some(-21.5));
    }

    #[tokio::test]
    async fn test_failed_walk_is_a_warning() {
        let map = map();
        let status = map.base.child(&[1]);
        let mut columns = HashMap::new();
        columns.insert(
            status.clone(),
            vec![
                Varbind::new(status.child(&[1, 1]), Value::Integer(1)),
                // port 9 is outside the 1x4 layout
                Varbind::new(status.child(&[9, 1]), Value::Integer(1)),
            ],
        );

        let device = device();
        let poll = SnmpPoller::new(&map, &device, Duration::from_secs(1))
            .poll(&MapWalker { columns })
            .await;

        assert_eq!(poll.records.len(), 1);
        // serial and rx columns time out, port 9 is rejected
        assert_eq!(poll.diagnostics.len(), 3);
        assert!(
            poll.diagnostics
                .iter()
                .all(|d| d.kind == DiagnosticKind::SnmpError)
        );
    }

    #[test]
    fn test_decode_serial_binary_form() {
        let bytes = [b'Z', b'T', b'E', b'G', 0xC0, 0x12, 0x34, 0x56];
        assert_eq!(decode_serial(&bytes).as_deref(), Some("ZTEGC0123456"));
        assert_eq!(decode_serial(b"ZTEGC0000001").as_deref(), Some("ZTEGC0000001"));
        assert_eq!(decode_serial(&[0, 0]), None);
    }

    #[test]
    fn test_decode_mac() {
        assert_eq!(
            decode_mac(&[0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]).as_deref(),
            Some("00:1a:2b:3c:4d:5e")
        );
        assert_eq!(decode_mac(b"001a.2b3c.4d5e").as_deref(), Some("00:1a:2b:3c:4d:5e"));
    }
}
