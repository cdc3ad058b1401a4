//! In-memory transport and device simulator for tests.
//!
//! Available with the `testing` feature.
//!
//! ```ignore
//! let mock = FakeDevice::new("router").with_output("show version", "IOS 15.2").into_transport();
//! let mut session = SessionBuilder::new().profile("cisco_ios").build(mock.clone())?;
//! session.open().await?;
//! let response = session.send_command("show version").await?;
//! assert_eq!(response.result, "IOS 15.2");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, TransportError};
use crate::transport::Transport;

type Responder = Box<dyn FnMut(&str) -> Vec<Reply> + Send>;

/// Output produced in response to one input line.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Delay after the input line was written.
    pub delay: Duration,
    /// Text delivered.
    pub data: String,
}

impl Reply {
    /// Deliver immediately.
    pub fn now(data: impl Into<String>) -> Self {
        Self::after(Duration::ZERO, data)
    }

    /// Deliver after `delay`.
    pub fn after(delay: Duration, data: impl Into<String>) -> Self {
        Self {
            delay,
            data: data.into(),
        }
    }
}

#[derive(Default)]
struct MockState {
    pending: VecDeque<(Instant, Vec<u8>)>,
    written: Vec<u8>,
    lines: Vec<String>,
    line: String,
    last_was_cr: bool,
    responder: Option<Responder>,
    closed: bool,
}

impl MockState {
    fn schedule(&mut self, delay: Duration, data: &[u8]) {
        let mut ready_at = Instant::now() + delay;
        // Keep delivery order even when a later reply has a shorter delay.
        if let Some((last, _)) = self.pending.back() {
            ready_at = ready_at.max(*last);
        }
        self.pending.push_back((ready_at, data.to_vec()));
    }

    fn feed(&mut self, data: &[u8]) {
        for ch in String::from_utf8_lossy(data).chars() {
            match ch {
                '\n' if self.last_was_cr => self.last_was_cr = false,
                '\r' | '\n' => {
                    self.last_was_cr = ch == '\r';
                    let line = std::mem::take(&mut self.line);
                    self.lines.push(line.clone());
                    if let Some(responder) = self.responder.as_mut() {
                        let replies = responder(&line);
                        for reply in replies {
                            self.schedule(reply.delay, reply.data.as_bytes());
                        }
                    }
                }
                _ => {
                    self.last_was_cr = false;
                    self.line.push(ch);
                }
            }
        }
    }
}

/// Scriptable in-memory [`Transport`].
///
/// Clones share state, so a test can keep a handle after moving one into a
/// session.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Empty transport with no responder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport answering each written line with `responder`'s replies.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<Reply> + Send + 'static,
    {
        let mock = Self::new();
        mock.lock().responder = Some(Box::new(responder));
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread poisons the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue output that is readable immediately.
    pub fn push_output(&self, data: &str) {
        self.lock().schedule(Duration::ZERO, data.as_bytes());
    }

    /// Queue output that becomes readable after `delay`.
    pub fn push_output_after(&self, delay: Duration, data: &str) {
        self.lock().schedule(delay, data.as_bytes());
    }

    /// Queue raw bytes, which need not be valid UTF-8 on their own.
    pub fn push_bytes_after(&self, delay: Duration, data: &[u8]) {
        self.lock().schedule(delay, data);
    }

    /// Everything written so far.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// Complete input lines written so far.
    pub fn lines_written(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Simulate the remote side closing the channel.
    pub fn disconnect(&self) {
        self.lock().closed = true;
    }
}

impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Disconnected.into());
        }
        state.written.extend_from_slice(data);
        state.feed(data);
        Ok(())
    }

    async fn read_available(&mut self, max_wait: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + max_wait;
        loop {
            let next = {
                let mut state = self.lock();
                let now = Instant::now();
                let mut out = Vec::new();
                while state.pending.front().is_some_and(|(at, _)| *at <= now) {
                    if let Some((_, data)) = state.pending.pop_front() {
                        out.extend_from_slice(&data);
                    }
                }
                if !out.is_empty() {
                    return Ok(out);
                }
                if state.closed && state.pending.is_empty() {
                    return Err(TransportError::Disconnected.into());
                }
                state.pending.front().map(|(at, _)| *at)
            };

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let wake = next.map_or(deadline, |at| at.min(deadline));
            tokio::time::sleep_until(wake).await;
        }
    }

    fn is_alive(&self) -> bool {
        !self.lock().closed
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FakeMode {
    User,
    Enable,
    Config { depth: usize },
}

/// Cisco-style device simulator driving a [`MockTransport`].
///
/// Understands `enable` (optionally with a secret), `disable`,
/// `configure terminal`, `interface ...`, `exit`, `end`, paging and width
/// commands, `write memory`, and canned `show` outputs.
pub struct FakeDevice {
    hostname: String,
    mode: FakeMode,
    echo: bool,
    secret: Option<String>,
    awaiting_password: bool,
    config_depth: usize,
    banner: Option<String>,
    outputs: HashMap<String, Vec<Reply>>,
    echo_delay: Duration,
}

impl FakeDevice {
    /// Device at the privileged prompt `hostname#`.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            mode: FakeMode::Enable,
            echo: true,
            secret: None,
            awaiting_password: false,
            config_depth: 1,
            banner: None,
            outputs: HashMap::new(),
            echo_delay: Duration::ZERO,
        }
    }

    /// Start at the unprivileged `hostname>` prompt.
    pub fn unprivileged(mut self) -> Self {
        self.mode = FakeMode::User;
        self
    }

    /// Require `secret` after `enable`.
    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// `configure terminal` lands `depth` levels deep, so leaving with
    /// `exit` takes `depth` attempts.
    pub fn with_config_depth(mut self, depth: usize) -> Self {
        self.config_depth = depth.max(1);
        self
    }

    /// Do not echo input.
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Delay the echo and everything after it.
    pub fn with_echo_delay(mut self, delay: Duration) -> Self {
        self.echo_delay = delay;
        self
    }

    /// Text printed before the first prompt.
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    /// Canned output for `command`.
    pub fn with_output(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs
            .insert(command.into(), vec![Reply::now(output.into())]);
        self
    }

    /// Output for `command` delivered in `chunks`, one per `interval`.
    pub fn with_chunked_output(
        mut self,
        command: impl Into<String>,
        chunks: &[&str],
        interval: Duration,
    ) -> Self {
        let replies = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| Reply::after(interval * (i as u32 + 1), *chunk))
            .collect();
        self.outputs.insert(command.into(), replies);
        self
    }

    /// Current prompt.
    pub fn prompt(&self) -> String {
        match self.mode {
            FakeMode::User => format!("{}>", self.hostname),
            FakeMode::Enable => format!("{}#", self.hostname),
            FakeMode::Config { depth: 1 } => format!("{}(config)#", self.hostname),
            FakeMode::Config { .. } => format!("{}(config-if)#", self.hostname),
        }
    }

    /// Wire the simulator into a transport with the banner and first prompt
    /// already queued.
    pub fn into_transport(mut self) -> MockTransport {
        let mut greeting = self.banner.take().unwrap_or_default();
        greeting.push_str(&self.prompt());
        let mock = MockTransport::with_responder(move |line| self.respond(line));
        mock.push_output(&greeting);
        mock
    }

    fn respond(&mut self, line: &str) -> Vec<Reply> {
        if self.awaiting_password {
            self.awaiting_password = false;
            let text = if Some(line) == self.secret.as_deref() {
                self.mode = FakeMode::Enable;
                format!("\r\n{}", self.prompt())
            } else {
                format!("\r\n% Access denied\r\n\r\n{}", self.prompt())
            };
            return vec![Reply::after(self.echo_delay, text)];
        }

        let echo = if self.echo {
            format!("{line}\r\n")
        } else {
            "\r\n".to_string()
        };
        let mut replies = vec![Reply::after(self.echo_delay, echo)];
        let command = line.trim();

        let output: Option<String> = match (command, self.mode) {
            ("", _) => None,
            ("enable", FakeMode::User) => {
                if self.secret.is_some() {
                    self.awaiting_password = true;
                    replies.push(Reply::after(self.echo_delay, "Password: "));
                    return replies;
                }
                self.mode = FakeMode::Enable;
                None
            }
            ("enable", _) => None,
            ("disable", FakeMode::Enable) => {
                self.mode = FakeMode::User;
                None
            }
            ("configure terminal", FakeMode::Enable) => {
                self.mode = FakeMode::Config {
                    depth: self.config_depth,
                };
                Some("Enter configuration commands, one per line.  End with CNTL/Z.".into())
            }
            ("exit", FakeMode::Config { depth }) => {
                self.mode = if depth <= 1 {
                    FakeMode::Enable
                } else {
                    FakeMode::Config { depth: depth - 1 }
                };
                None
            }
            ("end", FakeMode::Config { .. }) => {
                self.mode = FakeMode::Enable;
                None
            }
            (cmd, FakeMode::Config { depth }) if cmd.starts_with("interface ") => {
                self.mode = FakeMode::Config { depth: depth + 1 };
                None
            }
            ("terminal length 0" | "terminal width 511", _) => None,
            ("write memory" | "write mem", FakeMode::Enable) => Some("Building configuration...\r\n[OK]".into()),
            (cmd, _) if self.outputs.contains_key(cmd) => {
                let chunks = self.outputs.get(cmd).cloned().unwrap_or_default();
                let last = chunks.last().map_or(Duration::ZERO, |r| r.delay);
                for chunk in chunks {
                    replies.push(Reply::after(self.echo_delay + chunk.delay, chunk.data));
                }
                replies.push(Reply::after(
                    self.echo_delay + last,
                    format!("\r\n{}", self.prompt()),
                ));
                return replies;
            }
            (cmd, FakeMode::Config { .. }) if !cmd.starts_with("bogus") => None,
            _ => Some("% Invalid input detected at '^' marker.".into()),
        };

        let mut text = String::new();
        if let Some(output) = output {
            text.push_str(&output);
            text.push_str("\r\n");
        }
        text.push_str(&self.prompt());
        replies.push(Reply::after(self.echo_delay, text));
        replies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_delivers_in_order() {
        let mut mock = MockTransport::new();
        mock.push_output_after(Duration::from_millis(20), "second");
        mock.push_output("first");

        let first = mock.read_available(Duration::ZERO).await.unwrap();
        assert!(first.is_empty());
        let both = mock.read_available(Duration::from_millis(100)).await.unwrap();
        assert_eq!(both, b"secondfirst");
    }

    #[tokio::test]
    async fn test_fake_device_modes() {
        let mut mock = FakeDevice::new("router").unprivileged().into_transport();
        let greeting = mock.read_available(Duration::ZERO).await.unwrap();
        assert_eq!(greeting, b"router>");

        mock.write(b"enable\n").await.unwrap();
        let out = mock.read_available(Duration::ZERO).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out), "enable\r\nrouter#");

        mock.write(b"configure terminal\n").await.unwrap();
        let out = mock.read_available(Duration::ZERO).await.unwrap();
        assert!(String::from_utf8_lossy(&out).ends_with("router(config)#"));
        assert_eq!(mock.lines_written(), vec!["enable", "configure terminal"]);
    }

    #[tokio::test]
    async fn test_crlf_is_one_line() {
        let mut mock = FakeDevice::new("r1").into_transport();
        mock.read_available(Duration::ZERO).await.unwrap();
        mock.write(b"\r\n").await.unwrap();
        let out = mock.read_available(Duration::ZERO).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out), "\r\nr1#");
    }
}
