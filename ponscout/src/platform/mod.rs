//! Vendor dialects.
//!
//! A dialect is a table: prompts, command and address templates, error
//! markers and the SNMP OID map. The session, executor and enumerator are
//! written once and driven by these tables; only response parsing branches
//! per vendor (see [`ResponseParser`](crate::parser::ResponseParser)).

mod dialect;
pub mod vendors;

pub use dialect::{CommandSet, Dialect, EnableLevel, INTERFACE};

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ResponseParser;

static ZTE_GPON: LazyLock<Dialect> = LazyLock::new(|| {
    vendors::zte_gpon::dialect().expect("built-in ZTE-GPON dialect patterns compile")
});

static HIOSO_EPON: LazyLock<Dialect> = LazyLock::new(|| {
    vendors::hioso_epon::dialect().expect("built-in HIOSO-EPON dialect patterns compile")
});

/// Supported OLT families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    #[serde(rename = "ZTE-GPON")]
    ZteGpon,
    #[serde(rename = "HIOSO-EPON")]
    HiosoEpon,
}

impl Vendor {
    pub fn name(&self) -> &'static str {
        match self {
            Vendor::ZteGpon => "ZTE-GPON",
            Vendor::HiosoEpon => "HIOSO-EPON",
        }
    }

    /// The immutable dialect table for this vendor.
    pub fn dialect(&self) -> &'static Dialect {
        match self {
            Vendor::ZteGpon => &ZTE_GPON,
            Vendor::HiosoEpon => &HIOSO_EPON,
        }
    }

    pub fn parser(&self) -> ResponseParser {
        match self {
            Vendor::ZteGpon => ResponseParser::ZteGpon,
            Vendor::HiosoEpon => ResponseParser::HiosoEpon,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown vendor '{0}' (expected ZTE-GPON or HIOSO-EPON)")]
pub struct UnknownVendor(pub String);

impl FromStr for Vendor {
    type Err = UnknownVendor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "ZTE-GPON" | "ZTE" => Ok(Vendor::ZteGpon),
            "HIOSO-EPON" | "HIOSO" => Ok(Vendor::HiosoEpon),
            _ => Err(UnknownVendor(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_names() {
        assert_eq!("zte-gpon".parse::<Vendor>().unwrap(), Vendor::ZteGpon);
        assert_eq!("HIOSO_EPON".parse::<Vendor>().unwrap(), Vendor::HiosoEpon);
        assert!("huawei".parse::<Vendor>().is_err());
        assert_eq!(Vendor::HiosoEpon.to_string(), "HIOSO-EPON");
    }

    #[test]
    fn test_builtin_dialects_load() {
        assert_eq!(Vendor::ZteGpon.dialect().name, "ZTE-GPON");
        assert_eq!(Vendor::HiosoEpon.dialect().name, "HIOSO-EPON");
        assert!(std::ptr::eq(Vendor::ZteGpon.dialect(), Vendor::ZteGpon.dialect()));
    }

    #[test]
    fn test_vendor_serde_names() {
        let json = serde_json::to_string(&Vendor::ZteGpon).unwrap();
        assert_eq!(json, "\"ZTE-GPON\"");
    }
}
