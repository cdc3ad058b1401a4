//! Mellanox MLNX-OS profile.
//!
//! Nested configuration contexts each consume one `exit`; there is no
//! single command that leaves configuration mode.

use crate::driver::Mode;
use crate::profile::{DeviceProfile, ModeSpec, SaveConfigSpec, TerminalCommand};

/// Create the Mellanox MLNX-OS profile.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("mellanox_mlnxos")
        .with_terminators('#', Some('>'))
        .with_privileged(
            ModeSpec::new("enable", "disable", "#")
                .with_enter_pattern("#")
                .with_password_prompt(r"(?i)ssword"),
        )
        .with_configuration(
            ModeSpec::new("config term", "exit", "(config")
                .with_enter_pattern("#")
                .with_exit_pattern("#"),
        )
        .with_exit_config_retries(12)
        .with_paging(TerminalCommand::new("no cli session paging enable"))
        .with_save_config(SaveConfigSpec::new("configuration write").in_mode(Mode::Configuration))
        .with_failure_pattern("% Unrecognized command")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mellanox_exits_one_level_at_a_time() {
        let profile = profile();
        let config = profile.configuration.as_ref().unwrap();
        assert_eq!(config.exit_command, "exit");
        assert_eq!(profile.exit_config_retries, 12);
        assert!(config.matches("switch (config interface ethernet 1/1) #"));
    }

    #[test]
    fn test_save_runs_in_configuration() {
        let save = profile().save_config.unwrap();
        assert_eq!(save.mode, Mode::Configuration);
    }
}
