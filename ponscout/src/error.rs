//! Error types for ponscout.
//!
//! Only a handful of these abort a scan (see [`Error::is_fatal`]). Everything
//! else is recovered by the caller and downgraded to a
//! [`Diagnostic`](crate::model::Diagnostic) on the scan result.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::model::CardStatus;

/// Main error type for ponscout operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Socket-level errors (the `ConnectionError` kind).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Pattern buffer and read loop errors.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Login handshake and command execution errors.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Response text could not be mapped onto a known schema.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// SNMP walk failures.
    #[error("SNMP error: {0}")]
    Snmp(#[from] SnmpError),

    /// Scan-level failures.
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
}

impl Error {
    /// Whether this error terminates a device scan.
    ///
    /// Connection failures, rejected logins, an unreachable device and
    /// caller-side problems (invalid descriptor, cancellation) are fatal.
    /// Timeouts, error echoes, parse and SNMP failures are not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Channel(ChannelError::Closed) => true,
            Error::Channel(_) => false,
            Error::Session(SessionError::AuthenticationFailed { .. }) => true,
            Error::Session(SessionError::NotAuthenticated { .. }) => true,
            Error::Session(SessionError::CommandTimeout { .. }) => false,
            Error::Parse(_) | Error::Snmp(_) => false,
            Error::Scan(_) => true,
        }
    }

    /// Whether this error is a per-command timeout.
    pub fn is_command_timeout(&self) -> bool {
        matches!(self, Error::Session(SessionError::CommandTimeout { .. }))
    }
}

/// Transport layer errors (TCP connect, socket I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete in time
    #[error("Connection to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// I/O error on an established socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching over the byte stream).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Peer closed the connection
    #[error("Channel closed")]
    Closed,

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors (login handshake, command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Credentials rejected or prompts never matched
    #[error("Authentication failed for user '{user}' on {host}: {reason}")]
    AuthenticationFailed {
        user: String,
        host: String,
        reason: String,
    },

    /// Command issued on a session that is not authenticated
    #[error("Session is {state}, not authenticated")]
    NotAuthenticated { state: String },

    /// No prompt boundary within the deadline
    #[error("Command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },
}

/// Response parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Output looked like a table but no row matched a known schema
    #[error("Unrecognized {what} output near '{line}'")]
    UnrecognizedShape { what: &'static str, line: String },
}

/// SNMP walk errors.
#[derive(Error, Debug)]
pub enum SnmpError {
    /// Agent did not answer in time (unreachable host, wrong community or port)
    #[error("SNMP walk of {oid} timed out after {timeout:?}")]
    Timeout { oid: String, timeout: Duration },

    /// Socket error talking to the agent
    #[error("SNMP transport error: {0}")]
    Io(#[from] io::Error),

    /// Malformed BER in a response
    #[error("SNMP decode error: {0}")]
    Decode(String),

    /// Agent returned a non-zero error-status
    #[error("SNMP agent returned error status {status} (index {index})")]
    ErrorStatus { status: i64, index: i64 },
}

/// Scan-level errors.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The first candidate ports all timed out
    #[error("Device {host} unreachable: first {timeouts} port queries timed out")]
    DeviceUnreachable {
        host: String,
        timeouts: usize,
        /// Card listing obtained before enumeration started, if any.
        cards: Vec<CardStatus>,
    },

    /// Device descriptor failed validation
    #[error("Invalid device '{id}': {message}")]
    InvalidDevice { id: String, message: String },

    /// The caller cancelled the scan
    #[error("Scan of {host} cancelled")]
    Cancelled { host: String },
}

/// Result type alias using ponscout's Error.
pub type Result<T> = std::result::Result<T, Error>;
