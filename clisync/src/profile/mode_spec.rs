//! Mode transition descriptions.

use serde::{Deserialize, Serialize};

/// How to enter, leave and recognise one device mode.
///
/// Patterns are regex source strings, compiled once when a session is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeSpec {
    /// Command that enters the mode (e.g. `enable`, `configure terminal`).
    pub enter_command: String,

    /// Pattern read after the enter command. Defaults to the base prompt.
    pub enter_pattern: Option<String>,

    /// Command that leaves the mode (e.g. `disable`, `end`, `exit`).
    pub exit_command: String,

    /// Pattern read after the exit command. Defaults to the base prompt.
    pub exit_pattern: Option<String>,

    /// Substring whose presence in the prompt means the mode is active.
    pub check_string: String,

    /// Pattern the mode probe reads until. Defaults to any terminator.
    pub check_pattern: Option<String>,

    /// Pattern of a password prompt that may follow the enter command.
    pub password_pattern: Option<String>,
}

impl ModeSpec {
    /// Create a mode spec from its enter command, exit command and check
    /// string.
    pub fn new(
        enter_command: impl Into<String>,
        exit_command: impl Into<String>,
        check_string: impl Into<String>,
    ) -> Self {
        Self {
            enter_command: enter_command.into(),
            exit_command: exit_command.into(),
            check_string: check_string.into(),
            ..Default::default()
        }
    }

    /// Set the pattern read after entering.
    pub fn with_enter_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.enter_pattern = Some(pattern.into());
        self
    }

    /// Set the pattern read after exiting.
    pub fn with_exit_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exit_pattern = Some(pattern.into());
        self
    }

    /// Set the pattern the mode probe reads until.
    pub fn with_check_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.check_pattern = Some(pattern.into());
        self
    }

    /// Expect a password prompt matching `pattern` after the enter command.
    pub fn with_password_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.password_pattern = Some(pattern.into());
        self
    }

    /// Whether `prompt` shows this mode.
    pub fn matches(&self, prompt: &str) -> bool {
        !self.check_string.is_empty() && prompt.contains(&self.check_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_by_substring() {
        let config = ModeSpec::new("configure terminal", "end", ")#");
        assert!(config.matches("router(config)#"));
        assert!(config.matches("router(config-if)#"));
        assert!(!config.matches("router#"));
    }

    #[test]
    fn test_empty_check_string_never_matches() {
        let spec = ModeSpec::default();
        assert!(!spec.matches("router#"));
    }

    #[test]
    fn test_deserialize_partial() {
        let spec: ModeSpec = serde_json::from_str(
            r##"{"enter_command": "enable", "check_string": "#", "password_pattern": "ssword"}"##,
        )
        .unwrap();
        assert_eq!(spec.enter_command, "enable");
        assert_eq!(spec.exit_command, "");
        assert_eq!(spec.password_pattern.as_deref(), Some("ssword"));
    }
}
