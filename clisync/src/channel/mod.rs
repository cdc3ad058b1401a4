//! Channel layer: buffered reads and pattern waits over a transport.
//!
//! This module owns the session read buffer and every bounded wait the
//! session engine performs.

mod buffer;
pub mod patterns;
mod reader;

pub use buffer::PatternBuffer;
pub use reader::{ChannelConfig, SessionChannel, TimingRead};
