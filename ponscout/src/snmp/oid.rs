//! Object identifiers and the per-vendor OID map.

use std::fmt;
use std::str::FromStr;

use crate::model::{OnuKey, OnuStatus, PonPortAddress};

/// A numeric SNMP object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(pub Vec<u32>);

impl Oid {
    pub fn from_slice(components: &[u32]) -> Self {
        Oid(components.to_vec())
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// `self` followed by `suffix`.
    pub fn child(&self, suffix: &[u32]) -> Oid {
        let mut components = self.0.clone();
        components.extend_from_slice(suffix);
        Oid(components)
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Components after `prefix`, if `self` lies under it.
    pub fn suffix_after(&self, prefix: &Oid) -> Option<&[u32]> {
        if self.starts_with(prefix) {
            Some(&self.0[prefix.0.len()..])
        } else {
            None
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('.')
            .split('.')
            .map(str::parse)
            .collect::<Result<Vec<u32>, _>>()
            .map(Oid)
    }
}

/// How the table index after a column OID maps to an ONU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLayout {
    /// `<ifIndex>.<onuId>`, slot and port packed into the PON ifIndex
    /// (ZTE: `slot = (ifIndex >> 16) & 0xff`, `port = (ifIndex >> 8) & 0xff`).
    IfIndexOnu,

    /// `<port>.<onuId>` on a single-slot chassis.
    PortOnu,

    /// One running index, `onus_per_port` ONUs per port, single slot.
    Sequential { onus_per_port: u32 },
}

impl IndexLayout {
    /// Number of leading suffix components that form the index.
    ///
    /// Columns may append further components (e.g. a UNI number); those are
    /// not part of the join key.
    pub fn len(&self) -> usize {
        match self {
            IndexLayout::IfIndexOnu | IndexLayout::PortOnu => 2,
            IndexLayout::Sequential { .. } => 1,
        }
    }

    /// Decode the join key into an ONU address.
    pub fn decode(&self, index: &[u32]) -> Option<OnuKey> {
        let (slot, port, onu) = match (*self, index) {
            (IndexLayout::IfIndexOnu, [if_index, onu, ..]) => {
                ((if_index >> 16) & 0xff, (if_index >> 8) & 0xff, *onu)
            }
            (IndexLayout::PortOnu, [port, onu, ..]) => (1, *port, *onu),
            (IndexLayout::Sequential { onus_per_port }, [n, ..]) => {
                if *n == 0 || onus_per_port == 0 {
                    return None;
                }
                (1, (n - 1) / onus_per_port + 1, (n - 1) % onus_per_port + 1)
            }
            _ => return None,
        };

        Some(OnuKey {
            port: PonPortAddress::new(u8::try_from(slot).ok()?, u8::try_from(port).ok()?),
            onu_id: u16::try_from(onu).ok()?,
        })
    }
}

/// Linear conversion from a raw optical power integer to dBm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerEncoding {
    pub scale: f64,
    pub offset: f64,
    /// Raw value the agent reports when no reading is available.
    pub invalid: Option<i64>,
}

impl PowerEncoding {
    pub fn decode(&self, raw: i64) -> Option<f64> {
        if self.invalid == Some(raw) {
            return None;
        }
        let dbm = raw as f64 * self.scale + self.offset;
        Some((dbm * 1000.0).round() / 1000.0)
    }
}

/// ONU fields that can be walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnuField {
    Status,
    Serial,
    MacAddress,
    RxPower,
    TxPower,
}

impl fmt::Display for OnuField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnuField::Status => "status",
            OnuField::Serial => "serial",
            OnuField::MacAddress => "mac address",
            OnuField::RxPower => "rx power",
            OnuField::TxPower => "tx power",
        })
    }
}

/// Vendor OID table: a base subtree plus a leaf per walkable field.
#[derive(Debug, Clone)]
pub struct OidMap {
    pub base: Oid,
    pub status: Option<Vec<u32>>,
    pub serial: Option<Vec<u32>>,
    pub mac_address: Option<Vec<u32>>,
    pub rx_power: Option<Vec<u32>>,
    pub tx_power: Option<Vec<u32>>,
    /// Integer status values and what they mean.
    pub status_values: Vec<(i64, OnuStatus)>,
    pub power: PowerEncoding,
    pub index: IndexLayout,
}

impl OidMap {
    pub fn new(base: &[u32], index: IndexLayout, power: PowerEncoding) -> Self {
        Self {
            base: Oid::from_slice(base),
            status: None,
            serial: None,
            mac_address: None,
            rx_power: None,
            tx_power: None,
            status_values: vec![],
            power,
            index,
        }
    }

    pub fn with_status(mut self, leaf: &[u32], values: &[(i64, OnuStatus)]) -> Self {
        self.status = Some(leaf.to_vec());
        self.status_values = values.to_vec();
        self
    }

    pub fn with_serial(mut self, leaf: &[u32]) -> Self {
        self.serial = Some(leaf.to_vec());
        self
    }

    pub fn with_mac_address(mut self, leaf: &[u32]) -> Self {
        self.mac_address = Some(leaf.to_vec());
        self
    }

    pub fn with_rx_power(mut self, leaf: &[u32]) -> Self {
        self.rx_power = Some(leaf.to_vec());
        self
    }

    pub fn with_tx_power(mut self, leaf: &[u32]) -> Self {
        self.tx_power = Some(leaf.to_vec());
        self
    }

    /// Full column OIDs for every configured field, in walk order.
    pub fn columns(&self) -> Vec<(OnuField, Oid)> {
        [
            (OnuField::Status, &self.status),
            (OnuField::Serial, &self.serial),
            (OnuField::MacAddress, &self.mac_address),
            (OnuField::RxPower, &self.rx_power),
            (OnuField::TxPower, &self.tx_power),
        ]
        .into_iter()
        .filter_map(|(field, leaf)| leaf.as_ref().map(|leaf| (field, self.base.child(leaf))))
        .collect()
    }

    pub fn status_for(&self, raw: i64) -> Option<OnuStatus> {
        self.status_values
            .iter()
            .find(|(value, _)| *value == raw)
            .map(|(_, status)| *status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_parse_and_display() {
        let oid: Oid = ".1.3.6.1.4.1.3902".parse().unwrap();
        assert_eq!(oid.components(), &[1, 3, 6, 1, 4, 1, 3902]);
        assert_eq!(oid.to_string(), "1.3.6.1.4.1.3902");
        assert!("1.3.x".parse::<Oid>().is_err());
    }

    #[test]
    fn test_suffix_after() {
        let base = Oid::from_slice(&[1, 3, 6, 1]);
        let child = base.child(&[4, 7]);
        assert_eq!(child.suffix_after(&base), Some(&[4u32, 7][..]));
        assert_eq!(base.suffix_after(&child), None);
    }

    #[test]
    fn test_zte_if_index_decode() {
        // gpon-olt_1/1/3 is 0x10010300
        let key = IndexLayout::IfIndexOnu.decode(&[0x1001_0300, 5]).unwrap();
        assert_eq!(key.port, PonPortAddress::new(1, 3));
        assert_eq!(key.onu_id, 5);

        // trailing UNI component ignored
        let key = IndexLayout::IfIndexOnu.decode(&[268_501_248, 12, 1]).unwrap();
        assert_eq!(key.port, PonPortAddress::new(1, 1));
        assert_eq!(key.onu_id, 12);
    }

    #[test]
    fn test_sequential_decode() {
        let layout = IndexLayout::Sequential { onus_per_port: 64 };
        assert_eq!(layout.decode(&[7]).unwrap().onu_id, 7);
        let key = layout.decode(&[65]).unwrap();
        assert_eq!(key.port, PonPortAddress::new(1, 2));
        assert_eq!(key.onu_id, 1);
        assert!(layout.decode(&[0]).is_none());
        assert!(layout.decode(&[]).is_none());
    }

    #[test]
    fn test_power_decode() {
        let zte = PowerEncoding {
            scale: 0.002,
            offset: -30.0,
            invalid: Some(65535),
        };
        assert_eq!(zte.decode(5000), Some(-20.0));
        assert_eq!(zte.decode(65535), None);
    }

    #[test]
    fn test_columns_in_walk_order() {
        let map = OidMap::new(&[1, 3, 6, 1, 4, 1, 9], IndexLayout::PortOnu, PowerEncoding {
            scale: 1.0,
            offset: 0.0,
            invalid: None,
        })
        .with_rx_power(&[3])
        .with_status(&[1], &[(1, OnuStatus::Online)]);

        let columns = map.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].0, OnuField::Status);
        assert_eq!(columns[0].1.to_string(), "1.3.6.1.4.1.9.1");
        assert_eq!(columns[1].0, OnuField::RxPower);
        assert_eq!(map.status_for(1), Some(OnuStatus::Online));
        assert_eq!(map.status_for(9), None);
    }
}
