//! Device descriptors handed to the engine by the device registry.
//!
//! A [`Device`] is treated as opaque input: the engine never stores it
//! beyond one scan and never logs its secrets.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::{Result, ScanError};
use crate::model::PonPortAddress;
use crate::platform::Vendor;

/// Default Telnet port.
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Default SNMP agent port.
pub const DEFAULT_SNMP_PORT: u16 = 161;

/// Telnet transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelnetSettings {
    #[serde(default = "enabled")]
    pub enabled: bool,

    #[serde(default = "default_telnet_port")]
    pub port: u16,

    pub username: String,

    #[serde(deserialize_with = "secret")]
    pub password: SecretString,
}

/// SNMP transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SnmpSettings {
    #[serde(default = "enabled")]
    pub enabled: bool,

    #[serde(default = "default_snmp_port")]
    pub port: u16,

    #[serde(deserialize_with = "secret")]
    pub community: SecretString,
}

/// An OLT to scan.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    /// Identity reported back on the scan result.
    pub id: String,

    pub vendor: Vendor,

    pub host: String,

    #[serde(default)]
    pub telnet: Option<TelnetSettings>,

    #[serde(default)]
    pub snmp: Option<SnmpSettings>,

    /// Number of PON line-card slots to scan.
    pub total_pon_slots: u8,

    /// PON ports per slot.
    pub ports_per_slot: u8,
}

impl Device {
    /// Telnet settings, if the transport is enabled.
    pub fn telnet(&self) -> Option<&TelnetSettings> {
        self.telnet.as_ref().filter(|t| t.enabled)
    }

    /// SNMP settings, if the transport is enabled.
    pub fn snmp(&self) -> Option<&SnmpSettings> {
        self.snmp.as_ref().filter(|s| s.enabled)
    }

    /// Whether `address` lies inside this device's slot/port layout.
    pub fn contains(&self, address: PonPortAddress) -> bool {
        (1..=self.total_pon_slots).contains(&address.slot)
            && (1..=self.ports_per_slot).contains(&address.port)
    }

    /// Candidate port addresses in slot-major order.
    pub fn port_addresses(&self) -> impl Iterator<Item = PonPortAddress> + '_ {
        (1..=self.total_pon_slots).flat_map(move |slot| {
            (1..=self.ports_per_slot).map(move |port| PonPortAddress::new(slot, port))
        })
    }

    /// Check the descriptor before any socket is opened.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> {
            Err(ScanError::InvalidDevice {
                id: self.id.clone(),
                message: message.to_string(),
            }
            .into())
        };

        if self.host.trim().is_empty() {
            return invalid("host is empty");
        }
        if self.total_pon_slots == 0 || self.ports_per_slot == 0 {
            return invalid("slot and port counts must be at least 1");
        }
        if let Some(max) = self.vendor.dialect().max_slots {
            if self.total_pon_slots > max {
                return invalid(&format!(
                    "{} addresses at most {} PON slot(s), got {}",
                    self.vendor, max, self.total_pon_slots
                ));
            }
        }
        if self.telnet().is_none() && self.snmp().is_none() {
            return invalid("no transport enabled");
        }
        if let Some(telnet) = self.telnet() {
            if telnet.username.is_empty() {
                return invalid("telnet username is empty");
            }
        }
        Ok(())
    }
}

fn enabled() -> bool {
    true
}

fn default_telnet_port() -> u16 {
    DEFAULT_TELNET_PORT
}

fn default_snmp_port() -> u16 {
    DEFAULT_SNMP_PORT
}

fn secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Builder for constructing device descriptors in code.
///
/// # Example
///
/// ```rust
/// use ponscout::{DeviceBuilder, Vendor};
///
/// # fn example(password: String) -> Result<(), ponscout::Error> {
/// let device = DeviceBuilder::new("olt-1", "10.0.0.10")
///     .vendor(Vendor::ZteGpon)
///     .telnet("monitor", password)
///     .pon_layout(2, 16)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceBuilder {
    id: String,
    host: String,
    vendor: Vendor,
    telnet: Option<TelnetSettings>,
    snmp: Option<SnmpSettings>,
    total_pon_slots: u8,
    ports_per_slot: u8,
}

impl DeviceBuilder {
    /// Create a new builder for the specified host.
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            vendor: Vendor::ZteGpon,
            telnet: None,
            snmp: None,
            total_pon_slots: 1,
            ports_per_slot: 16,
        }
    }

    /// Set the vendor dialect (default: ZTE GPON).
    pub fn vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self
    }

    /// Enable Telnet with the given credentials.
    pub fn telnet(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let port = self
            .telnet
            .as_ref()
            .map(|t| t.port)
            .unwrap_or(DEFAULT_TELNET_PORT);
        self.telnet = Some(TelnetSettings {
            enabled: true,
            port,
            username: username.into(),
            password: SecretString::from(password.into()),
        });
        self
    }

    /// Set the Telnet port (default: 23). Has no effect until [`telnet`](Self::telnet) is set.
    pub fn telnet_port(mut self, port: u16) -> Self {
        if let Some(telnet) = self.telnet.as_mut() {
            telnet.port = port;
        }
        self
    }

    /// Enable SNMP with the given community.
    pub fn snmp(mut self, community: impl Into<String>) -> Self {
        let port = self
            .snmp
            .as_ref()
            .map(|s| s.port)
            .unwrap_or(DEFAULT_SNMP_PORT);
        self.snmp = Some(SnmpSettings {
            enabled: true,
            port,
            community: SecretString::from(community.into()),
        });
        self
    }

    /// Set the SNMP port (default: 161). Has no effect until [`snmp`](Self::snmp) is set.
    pub fn snmp_port(mut self, port: u16) -> Self {
        if let Some(snmp) = self.snmp.as_mut() {
            snmp.port = port;
        }
        self
    }

    /// Set the slot/port capacity to enumerate.
    pub fn pon_layout(mut self, total_pon_slots: u8, ports_per_slot: u8) -> Self {
        self.total_pon_slots = total_pon_slots;
        self.ports_per_slot = ports_per_slot;
        self
    }

    /// Build and validate the device.
    pub fn build(self) -> Result<Device> {
        let device = Device {
            id: self.id,
            vendor: self.vendor,
            host: self.host,
            telnet: self.telnet,
            snmp: self.snmp,
            total_pon_slots: self.total_pon_slots,
            ports_per_slot: self.ports_per_slot,
        };
        device.validate()?;
        Ok(device)
    }
}
