//! HP Comware profile.
//!
//! Comware has no enable tier; `system-view` is configuration mode. The
//! surrounding `<`/`[` is stripped from the base prompt:
//!
//! ```text
//! <HPE>                     # user view
//! [HPE]                     # system view
//! [HPE-GigabitEthernet1/0/1]
//! ```

use crate::profile::{DeviceProfile, ModeSpec, SaveConfigSpec, TerminalCommand};

/// Create the HP Comware profile.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("hp_comware")
        .with_terminators('>', Some(']'))
        .with_prompt_strip_leading("<[")
        // "Press Y or ENTER to continue, N to exit."
        .with_banner_returns(4)
        .with_configuration(ModeSpec::new("system-view", "return", "]").with_exit_pattern(">"))
        .with_paging(TerminalCommand::new("screen-length disable"))
        .with_save_config(SaveConfigSpec::new("save force"))
        .with_failure_pattern("% Unrecognized command")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Wrong parameter")
        // No terminal width command, so echoes of long commands wrap.
        .with_global_cmd_verify(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comware_profile() {
        let profile = profile();
        assert!(!profile.has_privileged_tier);
        assert_eq!(profile.terminators(), vec!['>', ']']);
        assert_eq!(profile.global_cmd_verify, Some(false));

        let config = profile.configuration.as_ref().unwrap();
        assert!(config.matches("[HPE]"));
        assert!(!config.matches("<HPE>"));
    }
}
