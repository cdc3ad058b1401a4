//! Linux profile.
//!
//! Standard shells with `$` (user) and `#` (root) prompts. Privileged mode
//! is a root shell via `sudo`.

use crate::profile::{DeviceProfile, ModeSpec};

/// Create the Linux profile.
pub fn profile() -> DeviceProfile {
    DeviceProfile::new("linux")
        .with_terminators('$', Some('#'))
        .with_privileged(
            ModeSpec::new("sudo -s", "exit", "#").with_password_prompt(r"(?i)password[:\s]*$"),
        )
        .with_failure_pattern("command not found")
        .with_failure_pattern("No such file or directory")
        .with_failure_pattern("Permission denied")
        .with_failure_pattern("Operation not permitted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_profile() {
        let profile = profile();
        assert_eq!(profile.name, "linux");
        assert_eq!(profile.terminators(), vec!['$', '#']);
        assert!(profile.configuration.is_none());
    }

    #[test]
    fn test_root_prompt_is_privileged() {
        let profile = profile();
        assert!(profile.privileged.matches("root@host:~#"));
        assert!(!profile.privileged.matches("user@host:~$"));
    }

    #[test]
    fn test_failed_when_contains() {
        let profile = profile();
        assert_eq!(
            profile.detect_failure("bash: foo: command not found"),
            Some("command not found")
        );
        assert_eq!(profile.detect_failure("total 0"), None);
    }
}
