//! OneAccess OneOS profile.

use crate::profile::{DeviceProfile, ModeSpec, SaveConfigSpec, TerminalCommand};

/// Create the OneAccess OneOS profile. Cisco-like, with CRLF line endings.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("oneaccess_oneos")
        .with_terminators('#', Some('>'))
        .with_return_char("\r\n")
        .with_privileged(
            ModeSpec::new("enable", "disable", "#").with_password_prompt(r"(?i)ssword"),
        )
        .with_configuration(ModeSpec::new("configure terminal", "end", ")#").with_exit_pattern("#"))
        .with_terminal_width(TerminalCommand::new("stty columns 255").with_pattern("stty"))
        .with_paging(TerminalCommand::new("term len 0"))
        .with_save_config(SaveConfigSpec::new("write mem"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oneaccess_uses_crlf() {
        assert_eq!(profile().return_char, "\r\n");
    }
}
