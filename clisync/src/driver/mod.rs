//! Session layer: prompt detection, modes and command execution.
//!
//! A [`Session`] wraps a transport with a compiled device profile and
//! exposes the command API. [`SessionBuilder`] resolves the profile and
//! settings; [`ModeController`] tracks which mode the CLI is in.

mod builder;
pub mod mode;
mod options;
mod response;
mod session;

pub use builder::SessionBuilder;
pub use mode::{Mode, ModeController};
pub use options::{CommandOptions, ConfigSetOptions, SessionConfig, Strategy};
pub use response::Response;
pub use session::Session;
