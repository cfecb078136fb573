//! Command execution over an authenticated session.

mod response;

pub use response::Response;

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Runs one CLI command at a time and returns its normalized output.
///
/// Implemented by [`Session`](crate::session::Session); the scan pipeline
/// only depends on this trait so it can be driven by scripted fakes.
pub trait CommandExecutor: Send {
    /// Send `command` and wait up to `timeout` for the shell prompt.
    ///
    /// A device error echo is not an `Err`: it comes back as a
    /// [`Response`] with `failure_message` set. Timeouts surface as
    /// [`SessionError::CommandTimeout`](crate::error::SessionError::CommandTimeout)
    /// and leave the executor usable.
    fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Response>> + Send;

    /// End the session. Calling this again is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Strip the echoed command from the start of `raw`.
///
/// `raw` must already end before the prompt.
pub(crate) fn normalize_output(raw: &str, command: &str) -> String {
    let output = raw.trim_start_matches(['\r', '\n', ' ']);
    let output = output
        .strip_prefix(command)
        .unwrap_or(output)
        .trim_start_matches(['\r', '\n']);
    output.trim_end().to_string()
}
