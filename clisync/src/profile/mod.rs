//! Device profiles.
//!
//! A [`DeviceProfile`] describes one vendor/platform's prompts, mode
//! commands, paging and save commands, and error markers as data. Sessions
//! compile a profile once into a [`CompiledProfile`] and never branch on
//! vendor names.

mod compiled;
mod definition;
mod mode_spec;
mod registry;
pub mod vendors;

pub use compiled::CompiledProfile;
pub(crate) use compiled::CompiledMode;
pub use definition::{CommitSpec, DeviceProfile, SaveConfigSpec, SystemShellSpec, TerminalCommand};
pub use mode_spec::ModeSpec;
pub use registry::ProfileRegistry;
