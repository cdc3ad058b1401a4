//! Buffered channel reader over a [`Transport`].

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::{ChannelError, Error, Result};
use crate::sanitize;
use crate::transport::Transport;

/// Configuration for channel read behavior.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Sleep between polls in bounded waits.
    pub poll_interval: Duration,

    /// Maximum bytes held in the session buffer.
    pub buffer_limit: usize,

    /// Strip cataloged control sequences from each chunk as it arrives.
    pub strip_ansi: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            buffer_limit: 1024 * 1024,
            strip_ansi: false,
        }
    }
}

/// Timing-read parameters.
#[derive(Debug, Clone, Copy)]
pub struct TimingRead {
    /// Sleep before the first read.
    pub initial_delay: Duration,

    /// Silence that ends the read once some output has arrived.
    pub quiet_period: Duration,

    /// Ceiling on poll iterations.
    pub max_loops: usize,
}

/// Session channel: a transport plus the accumulating read buffer.
///
/// All reads append to the buffer. Successful pattern waits and timing
/// reads drain what they return; [`clear_buffer`](Self::clear_buffer) is the
/// only operation that discards.
pub struct SessionChannel<T> {
    transport: T,
    buffer: PatternBuffer,
    config: ChannelConfig,
    /// Trailing bytes of a UTF-8 sequence split across reads.
    pending: Vec<u8>,
}

impl<T: Transport> SessionChannel<T> {
    /// Create a new session channel.
    pub fn new(transport: T, config: ChannelConfig) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(config.buffer_limit),
            config,
            pending: Vec::new(),
        }
    }

    /// Send text unchanged.
    pub async fn write(&mut self, text: &str) -> Result<()> {
        trace!("write: {:?}", text);
        self.write_raw(text.as_bytes()).await
    }

    /// Send text without logging it (passwords, secrets).
    pub async fn write_hidden(&mut self, text: &str) -> Result<()> {
        trace!("write: <{} hidden bytes>", text.len());
        self.write_raw(text.as_bytes()).await
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        match self.transport.write(data).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.map_closed(e)),
        }
    }

    /// Append whatever arrives within `timeout` and return it.
    ///
    /// Never waits past `timeout`. Returns an empty string when nothing
    /// arrived.
    pub async fn read_available(&mut self, timeout: Duration) -> Result<String> {
        let data = match self.transport.read_available(timeout).await {
            Ok(data) => data,
            Err(e) => return Err(self.map_closed(e)),
        };
        if data.is_empty() {
            return Ok(String::new());
        }

        trace!("read: {:?}", String::from_utf8_lossy(&data));
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(&data);
        let complete = bytes.len() - incomplete_tail(&bytes);
        self.pending = bytes.split_off(complete);

        let text = String::from_utf8_lossy(&bytes);
        let text = if self.config.strip_ansi {
            sanitize::strip_ansi_escape_codes(&text).into_owned()
        } else {
            text.into_owned()
        };
        self.buffer.extend(text.as_bytes());
        Ok(text)
    }

    /// Poll until `pattern` matches the accumulated buffer.
    ///
    /// On success, drains and returns the buffer up to the end of the match;
    /// anything after the match stays buffered. On expiry, fails with
    /// [`ChannelError::ReadTimeout`] carrying everything read so far, which
    /// stays in the buffer.
    pub async fn read_until_pattern(&mut self, pattern: &Regex, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(end) = self.buffer.find_end(pattern) {
                let output = self.buffer.split_to(end);
                trace!("pattern {:?} matched after {} bytes", pattern.as_str(), output.len());
                return Ok(output);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("timed out waiting for {:?}", pattern.as_str());
                return Err(ChannelError::ReadTimeout {
                    pattern: pattern.as_str().to_string(),
                    timeout,
                    partial: self.buffer.as_str_lossy().into_owned(),
                }
                .into());
            }

            let wait = self.config.poll_interval.min(deadline - now);
            let started = Instant::now();
            let chunk = self.read_available(wait).await?;
            if chunk.is_empty() {
                // Transports may return early; never spin.
                let elapsed = started.elapsed();
                if elapsed < wait {
                    tokio::time::sleep(wait - elapsed).await;
                }
            }
        }
    }

    /// Read until output stops growing, then drain and return it.
    ///
    /// Sleeps `initial_delay`, then polls. Once any output is buffered, a
    /// silence of `quiet_period` ends the read. `max_loops` bounds the
    /// iterations either way; whatever accumulated is returned.
    pub async fn read_timing(&mut self, timing: TimingRead) -> Result<String> {
        if !timing.initial_delay.is_zero() {
            tokio::time::sleep(timing.initial_delay).await;
        }

        let mut last_data = Instant::now();
        for _ in 0..timing.max_loops.max(1) {
            let started = Instant::now();
            let chunk = self.read_available(self.config.poll_interval).await?;
            if !chunk.is_empty() {
                last_data = Instant::now();
                continue;
            }
            if !self.buffer.is_empty() && last_data.elapsed() >= timing.quiet_period {
                break;
            }
            let elapsed = started.elapsed();
            if elapsed < self.config.poll_interval {
                tokio::time::sleep(self.config.poll_interval - elapsed).await;
            }
        }

        Ok(self.buffer.take())
    }

    /// Discard the buffer and anything immediately readable.
    ///
    /// Returns whether anything was discarded.
    pub async fn clear_buffer(&mut self) -> Result<bool> {
        let mut found = !self.buffer.is_empty() || !self.pending.is_empty();
        loop {
            let chunk = self.read_available(Duration::ZERO).await?;
            if chunk.is_empty() {
                break;
            }
            found = true;
        }
        if found {
            trace!("cleared {} bytes", self.buffer.len() + self.pending.len());
        }
        self.buffer.clear();
        self.pending.clear();
        Ok(found)
    }

    /// Drain and return the buffer.
    pub fn take_buffer(&mut self) -> String {
        self.buffer.take()
    }

    /// Get a reference to the buffer.
    pub fn buffer(&self) -> &PatternBuffer {
        &self.buffer
    }

    /// Whether the transport is still usable.
    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Close the transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Rewrap a transport disconnect as a channel-closed error carrying the
    /// buffered output.
    fn map_closed(&self, error: Error) -> Error {
        if error.is_channel_closed() {
            ChannelError::Closed {
                partial: self.buffer.as_str_lossy().into_owned(),
            }
            .into()
        } else {
            error
        }
    }
}

/// Length of an unfinished UTF-8 sequence at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xF0.. => 4,
            0xE0.. => 3,
            0xC0.. => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn channel(mock: &MockTransport) -> SessionChannel<MockTransport> {
        SessionChannel::new(mock.clone(), ChannelConfig::default())
    }

    #[tokio::test]
    async fn test_read_until_pattern_keeps_remainder() {
        let mock = MockTransport::new();
        mock.push_output("show clock\r\n12:00:00\r\nrouter#");
        let mut channel = channel(&mock);

        let echo = Regex::new("show clock").unwrap();
        let out = channel
            .read_until_pattern(&echo, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, "show clock");
        assert_eq!(channel.buffer().as_str_lossy(), "\r\n12:00:00\r\nrouter#");
    }

    #[tokio::test]
    async fn test_read_until_pattern_timeout_carries_partial() {
        let mock = MockTransport::new();
        mock.push_output("partial output");
        let mut channel = channel(&mock);

        let timeout = Duration::from_millis(100);
        let started = std::time::Instant::now();
        let err = channel
            .read_until_pattern(&Regex::new("never").unwrap(), timeout)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_recoverable());
        assert_eq!(err.partial_output(), Some("partial output"));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_clear_buffer_reports_presence() {
        let mock = MockTransport::new();
        mock.push_output("stale banner\r\n");
        let mut channel = channel(&mock);

        assert!(channel.clear_buffer().await.unwrap());
        assert!(!channel.clear_buffer().await.unwrap());
        assert!(channel.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_closed_transport_surfaces_channel_closed() {
        let mock = MockTransport::new();
        mock.push_output("last words");
        let mut channel = channel(&mock);
        channel.read_available(Duration::ZERO).await.unwrap();
        mock.disconnect();

        let err = channel
            .read_until_pattern(&Regex::new("#").unwrap(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_channel_closed());
        assert_eq!(err.partial_output(), Some("last words"));
    }

    #[tokio::test]
    async fn test_strip_ansi_on_read() {
        let mock = MockTransport::new();
        mock.push_output("\x1b[2Krouter#");
        let mut channel = SessionChannel::new(
            mock.clone(),
            ChannelConfig {
                strip_ansi: true,
                ..Default::default()
            },
        );
        let out = channel.read_available(Duration::ZERO).await.unwrap();
        assert_eq!(out, "router#");
    }

    #[tokio::test]
    async fn test_multibyte_split_across_reads() {
        let mock = MockTransport::new();
        mock.push_bytes_after(Duration::ZERO, b"caf\xc3");
        mock.push_bytes_after(Duration::from_millis(20), b"\xa9\r\nrouter#");
        let mut channel = channel(&mock);

        let first = channel.read_available(Duration::ZERO).await.unwrap();
        assert_eq!(first, "caf");

        let out = channel
            .read_until_pattern(&Regex::new("#").unwrap(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, "caf\u{e9}\r\nrouter#");
    }

    #[tokio::test]
    async fn test_unfinished_sequence_waits_for_next_read() {
        let mock = MockTransport::new();
        mock.push_bytes_after(Duration::ZERO, b"tail\xe2\x82");
        let mut channel = channel(&mock);

        channel.read_available(Duration::ZERO).await.unwrap();
        assert_eq!(channel.take_buffer(), "tail");

        mock.push_bytes_after(Duration::ZERO, b"\xac");
        let out = channel.read_available(Duration::ZERO).await.unwrap();
        assert_eq!(out, "\u{20ac}");
    }

    #[test]
    fn test_incomplete_tail() {
        assert_eq!(incomplete_tail(b"router#"), 0);
        assert_eq!(incomplete_tail(b"caf\xc3"), 1);
        assert_eq!(incomplete_tail(b"caf\xc3\xa9"), 0);
        assert_eq!(incomplete_tail(b"\xe2\x82"), 2);
        assert_eq!(incomplete_tail(b"\xf0\x9f\x98"), 3);
        assert_eq!(incomplete_tail(b""), 0);
    }
}
