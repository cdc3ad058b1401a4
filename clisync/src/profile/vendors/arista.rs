//! Arista EOS profile.
//!
//! EOS may insert a session marker into the prompt, which is ignored for
//! mode checks:
//!
//! ```text
//! switch>                   # unprivileged
//! switch#                   # privileged
//! switch(s1)#               # privileged, session marker
//! switch(s1)(config)#       # configuration
//! switch(config-if-Et1)#    # configuration sub-mode
//! ```

use crate::profile::{DeviceProfile, ModeSpec, SaveConfigSpec, SystemShellSpec, TerminalCommand};

/// Create the Arista EOS profile.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("arista_eos")
        .with_terminators('#', Some('>'))
        .with_prompt_ignore("(s1)")
        .with_prompt_ignore("(s2)")
        .with_privileged(
            ModeSpec::new("enable", "disable", "#").with_password_prompt(r"(?i)ssword"),
        )
        // EOS echoes before it really answers; read through to the config prompt.
        .with_configuration(
            ModeSpec::new("configure terminal", "end", ")#")
                .with_enter_pattern(r"\)#")
                .with_exit_pattern("#"),
        )
        .with_terminal_width(TerminalCommand::new("terminal width 511").with_pattern("Width set to"))
        .with_paging(
            TerminalCommand::new("terminal length 0")
                .with_pattern("Pagination disabled")
                .without_cmd_verify(),
        )
        .with_save_config(SaveConfigSpec::new("write memory"))
        .with_system_shell(SystemShellSpec::new("bash", r"[\$#]", "[#>]"))
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Error")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Cannot commit")
        .with_failure_pattern("% Unavailable command")
        .with_fast_cli(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_marker_is_ignored() {
        let profile = profile();
        let config = profile.configuration.as_ref().unwrap();

        // "(s1)#" would look like configuration mode without the ignore list
        assert!(config.matches("core01(s1)#"));
        assert!(!config.matches(&profile.clean_prompt("core01(s1)#")));
        assert!(config.matches(&profile.clean_prompt("core01(s1)(config)#")));
    }

    #[test]
    fn test_paging_skips_echo() {
        let profile = profile();
        let paging = profile.paging.as_ref().unwrap();
        assert!(!paging.cmd_verify);
        assert_eq!(paging.pattern.as_deref(), Some("Pagination disabled"));
    }

    #[test]
    fn test_system_shell() {
        let shell = profile().system_shell.unwrap();
        assert_eq!(shell.enter_command, "bash");
        assert_eq!(shell.exit_command, "exit");
        assert_eq!(shell.exit_pattern, "[#>]");
    }
}
