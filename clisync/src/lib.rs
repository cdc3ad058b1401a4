//! # clisync
//!
//! Async session automaton for driving interactive network device CLIs.
//!
//! clisync keeps a buffered channel to a device in step with its prompt:
//! it detects the base prompt, moves between unprivileged, privileged and
//! configuration modes, runs commands with pattern or timing
//! synchronization, and returns sanitized output.
//!
//! ## Features
//!
//! - Async SSH transport via russh, or any [`Transport`]
//! - Data-driven device profiles ([`DeviceProfile`]) with a global registry
//! - Pattern and timing read strategies with bounded waits
//! - Output sanitization (ANSI removal, echo and prompt stripping)
//! - Optional structured parsing through [`OutputParser`]s (TextFSM with
//!   the `textfsm` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clisync::{AuthMethod, SessionBuilder, SshConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), clisync::Error> {
//!     let ssh = SshConfig::new("192.168.1.1", "admin", AuthMethod::password("secret"));
//!     let mut session = SessionBuilder::new()
//!         .profile("cisco_ios")
//!         .connect_ssh(&ssh)
//!         .await?;
//!
//!     session.open().await?;
//!
//!     let response = session.send_command("show version").await?;
//!     println!("{}", response.result);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod parse;
pub mod profile;
pub mod sanitize;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use driver::{
    CommandOptions, ConfigSetOptions, Mode, Response, Session, SessionBuilder, SessionConfig,
};
pub use error::{Error, Result};
pub use parse::{Output, OutputParser, ParserChain};
pub use profile::{DeviceProfile, ProfileRegistry};
pub use transport::{AuthMethod, SshConfig, Transport};
