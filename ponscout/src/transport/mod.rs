//! Telnet transport layer.
//!
//! This module provides the raw connection to a device: TCP connect with
//! a bounded timeout, Telnet option refusal and line writes.

pub mod config;
mod telnet;

pub use config::TelnetConfig;
pub use telnet::{RawStream, TelnetCodec, TelnetTransport};
