//! Authenticated Telnet sessions to an OLT shell.
//!
//! A [`Session`] owns one TCP connection. It logs in, optionally escalates
//! with `enable`, turns pagination off and then executes commands one at a
//! time through [`CommandExecutor`]. Dropping a session closes the socket.

mod state;

pub use state::SessionState;

use std::time::Duration;

use log::{debug, info, trace, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use crate::channel::Channel;
use crate::device::Device;
use crate::driver::{CommandExecutor, Response, normalize_output};
use crate::error::{ChannelError, Error, Result, ScanError, SessionError};
use crate::platform::Dialect;
use crate::scan::ScanOptions;
use crate::transport::{RawStream, TelnetConfig, TelnetTransport};

/// An interactive CLI session.
pub struct Session {
    channel: Channel,
    dialect: &'static Dialect,
    state: SessionState,
    host: String,
    username: String,
    password: SecretString,
}

impl Session {
    /// Connect to `device` over Telnet and log in.
    ///
    /// The TCP connect and the whole login handshake are each bounded by
    /// `options.connect_timeout`.
    pub async fn open(device: &Device, options: &ScanOptions) -> Result<Self> {
        let telnet = device.telnet().ok_or_else(|| ScanError::InvalidDevice {
            id: device.id.clone(),
            message: "telnet is not enabled".to_string(),
        })?;

        debug!(
            "{}: {} -> {}",
            device.host,
            SessionState::Disconnected,
            SessionState::Connecting
        );
        let config = TelnetConfig::new(&device.host, telnet.port, options.connect_timeout);
        let transport = TelnetTransport::connect(&config).await?;

        Self::login(transport, device, options).await
    }

    /// Log in over an already-connected byte stream.
    pub async fn open_with_stream<S: RawStream + 'static>(
        stream: S,
        device: &Device,
        options: &ScanOptions,
    ) -> Result<Self> {
        let transport = TelnetTransport::from_stream(stream, device.host.clone());
        Self::login(transport, device, options).await
    }

    async fn login(transport: TelnetTransport, device: &Device, options: &ScanOptions) -> Result<Self> {
        let telnet = device.telnet().ok_or_else(|| ScanError::InvalidDevice {
            id: device.id.clone(),
            message: "telnet is not enabled".to_string(),
        })?;
        let dialect = device.vendor.dialect();

        let channel = Channel::new(transport, options.search_depth).with_pager(dialect.pager.clone());
        let mut session = Self {
            channel,
            dialect,
            state: SessionState::Connecting,
            host: device.host.clone(),
            username: telnet.username.clone(),
            password: telnet.password.clone(),
        };

        if let Err(e) = session.handshake(options).await {
            session.state = SessionState::Error;
            let _ = session.channel.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn handshake(&mut self, options: &ScanOptions) -> Result<()> {
        let deadline = Instant::now() + options.connect_timeout;
        self.transition(SessionState::AwaitingUsername);

        let dialect = self.dialect;
        let prompts = [
            &dialect.login_prompt,
            &dialect.password_prompt,
            &dialect.shell_prompt,
        ];
        let mut sent_username = false;
        let mut sent_password = false;

        loop {
            let found = match self
                .channel
                .read_until(&prompts, remaining(deadline))
                .await
            {
                Ok(found) => found,
                Err(Error::Channel(ChannelError::PatternTimeout(_))) => {
                    return Err(self.auth_failed(format!(
                        "no login prompt within {:?}",
                        options.connect_timeout
                    )));
                }
                Err(e) => return Err(e),
            };

            if let Some(marker) = self.channel.tail_contains_any(&dialect.auth_failure_markers) {
                return Err(self.auth_failed(format!("device reported '{}'", marker)));
            }

            match found.index {
                0 => {
                    if sent_username {
                        return Err(self.auth_failed("login prompt reappeared"));
                    }
                    self.channel.clear_buffer();
                    let username = self.username.clone();
                    self.channel.send_line(&username, &dialect.line_terminator).await?;
                    sent_username = true;
                    self.transition(SessionState::AwaitingPassword);
                }
                1 => {
                    if sent_password {
                        return Err(self.auth_failed("password prompt reappeared"));
                    }
                    self.channel.clear_buffer();
                    self.send_password().await?;
                    sent_password = true;
                    self.transition(SessionState::AwaitingPassword);
                }
                _ => break,
            }
        }

        if let Some(enable) = &dialect.enable {
            if self.channel.buffer().tail_contains(&enable.unprivileged_prompt) {
                self.escalate(options, deadline).await?;
            }
        }

        self.transition(SessionState::Authenticated);
        info!("Logged in to {} as {}", self.host, self.username);

        for command in &dialect.on_open_commands {
            match self.execute(command, options.command_timeout).await {
                Ok(response) if !response.is_success() => {
                    warn!("{}: '{}' rejected by device", self.host, command);
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{}: '{}' failed: {}", self.host, command, e),
            }
        }

        Ok(())
    }

    /// Escalate from the unprivileged prompt, answering a password prompt
    /// with the login password if one appears.
    async fn escalate(&mut self, options: &ScanOptions, deadline: Instant) -> Result<()> {
        let dialect = self.dialect;
        let Some(enable) = &dialect.enable else {
            return Ok(());
        };
        debug!("{}: escalating with '{}'", self.host, enable.command);

        self.channel.clear_buffer();
        self.channel
            .send_line(&enable.command, &dialect.line_terminator)
            .await?;

        let mut patterns: Vec<&Regex> = vec![&dialect.shell_prompt];
        if let Some(prompt) = &enable.password_prompt {
            patterns.push(prompt);
        }

        let found = match self.channel.read_until(&patterns, remaining(deadline)).await {
            Ok(found) => found,
            Err(Error::Channel(ChannelError::PatternTimeout(_))) => {
                warn!("{}: no prompt after '{}', staying unprivileged", self.host, enable.command);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if found.index == 1 {
            self.channel.clear_buffer();
            self.send_password().await?;
            match self
                .channel
                .read_until(&[&dialect.shell_prompt], remaining(deadline))
                .await
            {
                Ok(_) => {}
                Err(Error::Channel(ChannelError::PatternTimeout(_))) => {
                    return Err(self.auth_failed(format!(
                        "no prompt after enable password within {:?}",
                        options.connect_timeout
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        if self.channel.buffer().tail_contains(&enable.unprivileged_prompt) {
            warn!("{}: enable rejected, staying unprivileged", self.host);
        }
        Ok(())
    }

    async fn send_password(&mut self) -> Result<()> {
        trace!("{}: sending password", self.host);
        let terminator = &self.dialect.line_terminator;
        self.channel
            .send_line(self.password.expose_secret(), terminator)
            .await
    }

    fn auth_failed(&mut self, reason: impl Into<String>) -> Error {
        self.state = SessionState::Error;
        SessionError::AuthenticationFailed {
            user: self.username.clone(),
            host: self.host.clone(),
            reason: reason.into(),
        }
        .into()
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("{}: {} -> {}", self.host, self.state, next);
            self.state = next;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl CommandExecutor for Session {
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<Response> {
        if self.state != SessionState::Authenticated {
            return Err(SessionError::NotAuthenticated {
                state: self.state.to_string(),
            }
            .into());
        }

        let dialect = self.dialect;
        self.channel.drain()?;
        debug!("{} -> {}", self.host, command);
        let start = std::time::Instant::now();

        self.channel
            .send_line(command, &dialect.line_terminator)
            .await?;

        // Output belongs to this command only once its echo has been seen.
        // A prompt with no echo before it closes a previous command that
        // timed out; drop it and keep reading.
        let deadline = Instant::now() + timeout;
        let (echo, found) = loop {
            let found = match self
                .channel
                .read_until(&[&dialect.shell_prompt], remaining(deadline))
                .await
            {
                Ok(found) => found,
                Err(Error::Channel(ChannelError::PatternTimeout(_))) => {
                    // Late output is dropped by the next drain or echo check.
                    self.channel.clear_buffer();
                    warn!("{}: '{}' timed out after {:?}", self.host, command, timeout);
                    return Err(SessionError::CommandTimeout {
                        command: command.to_string(),
                        timeout,
                    }
                    .into());
                }
                Err(e) => {
                    if e.is_fatal() {
                        self.state = SessionState::Error;
                    }
                    return Err(e);
                }
            };

            let before = &self.channel.buffer().as_slice()[..found.start];
            match memchr::memmem::rfind(before, command.as_bytes()) {
                Some(echo) => break (echo, found),
                None => {
                    debug!("{}: discarding {} stale bytes before '{}'", self.host, found.end, command);
                    self.channel.discard_through(found.end);
                }
            }
        };

        let data = self.channel.take_buffer();
        let elapsed = start.elapsed();
        let raw_result = String::from_utf8_lossy(&data[echo..]).into_owned();
        let prompt = String::from_utf8_lossy(&data[found.start..found.end])
            .trim()
            .to_string();
        let result = normalize_output(&String::from_utf8_lossy(&data[echo..found.start]), command);
        trace!("{} <- {} bytes in {:?}", self.host, result.len(), elapsed);

        if let Some(marker) = dialect.detect_failure(&result) {
            debug!("{}: '{}' rejected ({})", self.host, command, marker);
            return Ok(Response::failed(command, result, raw_result, prompt, elapsed, marker));
        }

        Ok(Response::new(command, result, raw_result, prompt, elapsed))
    }

    /// Send the dialect's logout commands and close the socket.
    ///
    /// Logout is best-effort. Calling this more than once is a no-op.
    async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        let dialect = self.dialect;
        if self.state == SessionState::Authenticated {
            for command in &dialect.on_close_commands {
                if let Err(e) = self
                    .channel
                    .send_line(command, &dialect.line_terminator)
                    .await
                {
                    debug!("{}: '{}' on close failed: {}", self.host, command, e);
                    break;
                }
            }
        }

        self.transition(SessionState::Closed);
        self.channel.close().await
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::device::DeviceBuilder;

    fn device() -> Device {
        DeviceBuilder::new("olt-1", "mock")
            .telnet("monitor", "s3cret")
            .pon_layout(1, 4)
            .build()
            .unwrap()
    }

    fn logged_in_script(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"\r\nUsername:")
            .write(b"monitor\r\n")
            .read(b"monitor\r\nPassword:")
            .write(b"s3cret\r\n")
            .read(b"\r\n\r\nZXAN#")
            .write(b"terminal length 0\r\n")
            .read(b"terminal length 0\r\nZXAN#")
    }

    #[tokio::test]
    async fn test_login_and_execute() {
        let mock = logged_in_script(&mut Builder::new())
            .write(b"show card\r\n")
            .read(b"show card\r\nShelf Slot CfgType\r\n1     1    GTGO\r\n")
            .read(b"ZXAN#")
            .write(b"exit\r\n")
            .build();

        let device = device();
        let mut session = Session::open_with_stream(mock, &device, &ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);

        let response = session
            .execute("show card", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.result, "Shelf Slot CfgType\n1     1    GTGO");
        assert_eq!(response.prompt, "ZXAN#");

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_bad_password() {
        let mock = Builder::new()
            .read(b"Username:")
            .write(b"monitor\r\n")
            .read(b"Password:")
            .write(b"s3cret\r\n")
            .read(b"\r\n%Error 20203: Username or password is wrong\r\nUsername:")
            .build();

        let err = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Session(SessionError::AuthenticationFailed { .. })
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_login_prompt_reappears() {
        let mock = Builder::new()
            .read(b"login: ")
            .write(b"monitor\r\n")
            .read(b"Password: ")
            .write(b"s3cret\r\n")
            .read(b"\r\n\r\nlogin: ")
            .build();

        let err = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .err()
            .unwrap();
        match err {
            Error::Session(SessionError::AuthenticationFailed { reason, .. }) => {
                assert!(reason.contains("reappeared"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_prompt_is_auth_failure() {
        let mock = Builder::new()
            .read(b"Welcome\r\n")
            .wait(Duration::from_secs(120))
            .build();

        let err = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Session(SessionError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_enable_escalation() {
        let mock = Builder::new()
            .read(b"Username:")
            .write(b"monitor\r\n")
            .read(b"Password:")
            .write(b"s3cret\r\n")
            .read(b"\r\nZXAN>")
            .write(b"enable\r\n")
            .read(b"enable\r\nPassword:")
            .write(b"s3cret\r\n")
            .read(b"\r\nZXAN#")
            .write(b"terminal length 0\r\n")
            .read(b"terminal length 0\r\nZXAN#")
            .build();

        let session = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_timeout_keeps_session() {
        let mock = logged_in_script(&mut Builder::new())
            .write(b"show gpon onu state gpon-olt_1/1/1\r\n")
            .read(b"show gpon onu state gpon-olt_1/1/1\r\n")
            .wait(Duration::from_secs(120))
            .build();

        let mut session = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .unwrap();
        let err = session
            .execute("show gpon onu state gpon-olt_1/1/1", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_command_timeout());
        assert!(!err.is_fatal());
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.channel.buffer().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_output_not_attributed_to_next_command() {
        let first = "show gpon onu detail-info gpon-onu_1/1/1:1";
        let second = "show gpon onu detail-info gpon-onu_1/1/1:2";
        let mock = logged_in_script(&mut Builder::new())
            .write(format!("{first}\r\n").as_bytes())
            .read(format!("{first}\r\n").as_bytes())
            .wait(Duration::from_secs(6))
            .write(format!("{second}\r\n").as_bytes())
            // the first command's answer only arrives now
            .read(b"Name: onu-ONE\r\nZXAN#")
            .read(format!("{second}\r\nName: onu-TWO\r\nZXAN#").as_bytes())
            .build();

        let mut session = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .unwrap();
        let err = session
            .execute(first, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_command_timeout());

        let response = session
            .execute(second, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.result, "Name: onu-TWO");
        assert!(!response.raw_result.contains("onu-ONE"));
    }

    #[tokio::test]
    async fn test_stale_prompt_in_same_chunk_is_skipped() {
        let mock = logged_in_script(&mut Builder::new())
            .write(b"show card\r\n")
            .read(b"Name: onu-ONE\r\nZXAN#show card\r\n1     1    GTGO\r\nZXAN#")
            .build();

        let mut session = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .unwrap();
        let response = session
            .execute("show card", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.result, "1     1    GTGO");
    }

    #[tokio::test]
    async fn test_error_echo_is_tagged() {
        let mock = logged_in_script(&mut Builder::new())
            .write(b"show gpon onu state gpon-olt_1/9/1\r\n")
            .read(b"show gpon onu state gpon-olt_1/9/1\r\n%Code 32310-GPONSRV : Invalid parameter\r\nZXAN#")
            .build();

        let mut session = Session::open_with_stream(mock, &device(), &ScanOptions::default())
            .await
            .unwrap();
        let response = session
            .execute("show gpon onu state gpon-olt_1/9/1", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.failure_message.as_deref(), Some("%Code"));
    }
}
