//! Cisco IOS profile.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                  # unprivileged
//! router#                  # privileged
//! router(config)#          # configuration
//! router(config-if)#       # configuration sub-mode
//! ```

use crate::profile::{DeviceProfile, ModeSpec, SaveConfigSpec, TerminalCommand};

/// Create the Cisco IOS profile.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("cisco_ios")
        .with_terminators('#', Some('>'))
        .with_privileged(
            ModeSpec::new("enable", "disable", "#").with_password_prompt(r"(?i)ssword"),
        )
        .with_configuration(ModeSpec::new("configure terminal", "end", ")#").with_exit_pattern("#"))
        .with_terminal_width(TerminalCommand::new("terminal width 511"))
        .with_paging(TerminalCommand::new("terminal length 0"))
        .with_save_config(SaveConfigSpec::new("write mem"))
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Unknown command")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cisco_profile() {
        let profile = profile();
        assert_eq!(profile.name, "cisco_ios");
        assert!(profile.has_privileged_tier);
        assert!(profile.privileged.matches("router#"));
        assert!(!profile.privileged.matches("router>"));

        let config = profile.configuration.as_ref().unwrap();
        assert!(config.matches("router(config-if)#"));
        assert!(!config.matches("router#"));
    }
}
