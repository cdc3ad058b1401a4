//! F5 TMSH profile.
//!
//! The login shell is bash; preparation enters `tmsh` and detects the
//! prompt again inside it.

use crate::profile::{DeviceProfile, TerminalCommand};

/// Create the F5 TMSH profile.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("f5_tmsh")
        .with_terminators('#', Some('>'))
        .with_shell_command("tmsh")
        .with_terminal_width(
            TerminalCommand::new(r#"run /util bash -c "stty cols 255""#).with_pattern("run"),
        )
        .with_paging(TerminalCommand::new(
            "modify cli preference pager disabled display-threshold 0",
        ))
        .with_failure_pattern("Syntax Error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f5_profile() {
        let profile = profile();
        assert_eq!(profile.shell_command.as_deref(), Some("tmsh"));
        assert!(profile.configuration.is_none());
        assert!(profile.save_config.is_none());
    }
}
