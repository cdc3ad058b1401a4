//! Transport layer: the raw byte channel to the device.
//!
//! The session engine only needs a writable channel with a bounded,
//! poll-able read. [`Transport`] is that boundary; [`SshTransport`] is the
//! russh-backed implementation and tests use `testing::MockTransport`
//! (`testing` feature).

pub mod config;
mod ssh;

use std::future::Future;
use std::time::Duration;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;

use crate::error::Result;

/// A bidirectional byte channel to a remote CLI.
pub trait Transport: Send {
    /// Send bytes unchanged. The caller supplies any line terminator.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Return whatever arrives within `max_wait`, possibly nothing.
    ///
    /// Must not block past `max_wait`. A closed channel with no pending data
    /// is reported as [`TransportError::Disconnected`](crate::error::TransportError::Disconnected).
    fn read_available(&mut self, max_wait: Duration)
    -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Whether the channel is still usable.
    fn is_alive(&self) -> bool;

    /// Close the channel.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
