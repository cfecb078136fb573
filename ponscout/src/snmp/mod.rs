//! SNMP polling: a small BER codec, a v2c walker and the per-vendor
//! OID maps that turn walked columns into ONU records.

mod ber;
mod client;
mod oid;
mod poller;

pub use ber::{Value, Varbind};
pub use client::{DEFAULT_MAX_REPETITIONS, SnmpWalker, UdpSnmpClient};
pub use oid::{IndexLayout, Oid, OidMap, OnuField, PowerEncoding};
pub use poller::{SnmpPoll, SnmpPoller};
