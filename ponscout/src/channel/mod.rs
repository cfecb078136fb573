//! Channel layer: pattern-based reads over a Telnet transport.
//!
//! This module handles output accumulation, escape stripping, pager
//! prompts and bounded waits for prompt patterns.

mod ansi;
mod buffer;
mod patterns;

pub use ansi::AnsiStripper;
pub use buffer::PatternBuffer;
pub use patterns::compile_prompt_pattern;

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::time::Instant;

use crate::error::{ChannelError, Result};
use crate::transport::TelnetTransport;

/// Which of several patterns matched, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    /// Index into the pattern slice passed to [`Channel::read_until`].
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// Interactive channel to a device shell.
pub struct Channel {
    transport: TelnetTransport,
    buffer: PatternBuffer,
    pager: Option<Regex>,
}

impl Channel {
    /// Create a channel over `transport`, searching the last `search_depth`
    /// bytes for prompts.
    pub fn new(transport: TelnetTransport, search_depth: usize) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(search_depth),
            pager: None,
        }
    }

    /// Answer output matching `pager` with a space and erase it from the buffer.
    pub fn with_pager(mut self, pager: Option<Regex>) -> Self {
        self.pager = pager;
        self
    }

    /// Read until one of `patterns` matches the buffer tail.
    ///
    /// Patterns are tried in order on every chunk; the first match wins.
    /// Fails with [`ChannelError::PatternTimeout`] once `timeout` has
    /// elapsed; the buffer is left untouched so the caller can inspect or
    /// discard it.
    pub async fn read_until(&mut self, patterns: &[&Regex], timeout: Duration) -> Result<PatternMatch> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(found) = self.find_any(patterns) {
                return Ok(found);
            }

            if let Some(pager) = &self.pager {
                if let Some((start, end)) = self.buffer.search_tail(pager) {
                    trace!("pager prompt at {}..{}, continuing", start, end);
                    self.buffer.remove(start, end);
                    self.transport.write_line(" ", "").await?;
                    continue;
                }
            }

            let chunk = match tokio::time::timeout_at(deadline, self.transport.read()).await {
                Ok(chunk) => chunk?,
                Err(_) => return Err(ChannelError::PatternTimeout(timeout).into()),
            };
            self.buffer.extend(&chunk);
        }
    }

    fn find_any(&self, patterns: &[&Regex]) -> Option<PatternMatch> {
        patterns.iter().enumerate().find_map(|(index, pattern)| {
            self.buffer
                .search_tail(pattern)
                .map(|(start, end)| PatternMatch { index, start, end })
        })
    }

    /// Discard anything the device has already sent and reset the buffer.
    ///
    /// Late output from a timed-out command must never leak into the next
    /// command's response.
    pub fn drain(&mut self) -> Result<usize> {
        let mut discarded = self.buffer.len();
        while let Some(chunk) = self.transport.try_read()? {
            discarded += chunk.len();
        }
        if discarded > 0 {
            debug!("Discarded {} stale bytes from {}", discarded, self.transport.peer());
        }
        self.buffer.clear();
        Ok(discarded)
    }

    /// Send one line to the device.
    pub async fn send_line(&mut self, line: &str, terminator: &str) -> Result<()> {
        self.transport.write_line(line, terminator).await
    }

    /// Literal markers present in the buffer tail.
    pub fn tail_contains_any(&self, markers: &[String]) -> Option<String> {
        self.buffer.tail_contains_any(markers)
    }

    pub fn buffer(&self) -> &PatternBuffer {
        &self.buffer
    }

    pub fn take_buffer(&mut self) -> Vec<u8> {
        self.buffer.take()
    }

    /// Drop the first `end` bytes of the buffer.
    pub fn discard_through(&mut self, end: usize) {
        self.buffer.remove(0, end);
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    pub fn peer(&self) -> &str {
        self.transport.peer()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Close the underlying socket (idempotent).
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}
