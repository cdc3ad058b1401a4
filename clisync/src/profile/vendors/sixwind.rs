//! 6WIND OS profile.

use crate::profile::{CommitSpec, DeviceProfile, ModeSpec, SaveConfigSpec};

/// Create the 6WIND OS profile.
///
/// No enable tier and no paging command. Configuration is a candidate that
/// must be committed.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("sixwind_os")
        .with_terminators('>', Some('#'))
        .with_ansi_escape_codes()
        .with_configuration(ModeSpec::new("edit running", "exit", "#").with_exit_pattern(">"))
        .with_save_config(SaveConfigSpec::new("copy running startup").with_confirm("y"))
        .with_commit(
            CommitSpec::new("commit")
                .with_expect("#")
                .with_error_marker("Failed to generate committed config"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixwind_profile() {
        let profile = profile();
        assert!(!profile.has_privileged_tier);
        assert!(profile.ansi_escape_codes);
        assert!(profile.paging.is_none());
        let commit = profile.commit.unwrap();
        assert_eq!(commit.error_markers, vec!["Failed to generate committed config"]);
    }
}
