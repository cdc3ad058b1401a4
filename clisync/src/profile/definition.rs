//! Device profile definition.

use serde::{Deserialize, Serialize};

use super::mode_spec::ModeSpec;
use crate::driver::Mode;
use crate::error::{Error, ProfileError, Result};

/// Immutable description of one vendor/platform's CLI.
///
/// Everything vendor-specific (prompt characters, mode commands, paging and
/// save commands, error markers) lives here as data. Profiles can be built in
/// code or deserialized from JSON/YAML; unset fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Profile name (e.g. "cisco_ios", "arista_eos").
    pub name: String,

    /// Primary prompt terminator (e.g. `>`).
    pub primary_terminator: char,

    /// Alternate prompt terminator (e.g. `#`).
    pub alternate_terminator: Option<char>,

    /// Characters trimmed from the start of a detected base prompt
    /// (`<`/`[` on Comware).
    pub prompt_strip_leading: String,

    /// Substrings deleted from a prompt before mode checks (`(s1)` on EOS).
    pub prompt_ignore: Vec<String>,

    /// Line terminator appended to commands.
    pub return_char: String,

    /// Strip control sequences from every chunk as it is read.
    pub ansi_escape_codes: bool,

    /// Returns written during preparation to get past "press ENTER" banners.
    pub banner_returns: usize,

    /// Sub-shell entered during preparation (F5 `tmsh`).
    pub shell_command: Option<String>,

    /// Operating-system shell reachable from the CLI on demand (EOS `bash`).
    pub system_shell: Option<SystemShellSpec>,

    /// Terminal width command run during preparation.
    pub terminal_width: Option<TerminalCommand>,

    /// Paging disable command run during preparation.
    pub paging: Option<TerminalCommand>,

    /// Whether the device has an enable tier between unprivileged and
    /// configuration. Without one, the privileged check always holds and
    /// entering or leaving it does nothing.
    pub has_privileged_tier: bool,

    /// Privileged (enable) mode.
    pub privileged: ModeSpec,

    /// Configuration mode, if the device has one.
    pub configuration: Option<ModeSpec>,

    /// Ceiling on exit attempts when leaving configuration mode.
    pub exit_config_retries: usize,

    /// How to persist the running configuration.
    pub save_config: Option<SaveConfigSpec>,

    /// How to commit a candidate configuration.
    pub commit: Option<CommitSpec>,

    /// Output substrings that mark a failed command.
    pub failed_when_contains: Vec<String>,

    /// Profile default for the session-wide echo verification override.
    pub global_cmd_verify: Option<bool>,

    /// Profile default for fast mode (minimum delay factor).
    pub fast_cli: Option<bool>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            primary_terminator: '#',
            alternate_terminator: Some('>'),
            prompt_strip_leading: String::new(),
            prompt_ignore: vec![],
            return_char: "\n".to_string(),
            ansi_escape_codes: false,
            banner_returns: 0,
            shell_command: None,
            system_shell: None,
            terminal_width: None,
            paging: None,
            has_privileged_tier: false,
            privileged: ModeSpec::default(),
            configuration: None,
            exit_config_retries: 12,
            save_config: None,
            commit: None,
            failed_when_contains: vec![],
            global_cmd_verify: None,
            fast_cli: None,
        }
    }
}

impl DeviceProfile {
    /// Create a profile with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the prompt terminators.
    pub fn with_terminators(mut self, primary: char, alternate: Option<char>) -> Self {
        self.primary_terminator = primary;
        self.alternate_terminator = alternate;
        self
    }

    /// Trim these characters from the start of the base prompt.
    pub fn with_prompt_strip_leading(mut self, chars: impl Into<String>) -> Self {
        self.prompt_strip_leading = chars.into();
        self
    }

    /// Ignore a prompt substring during mode checks.
    pub fn with_prompt_ignore(mut self, text: impl Into<String>) -> Self {
        self.prompt_ignore.push(text.into());
        self
    }

    /// Set the line terminator.
    pub fn with_return_char(mut self, return_char: impl Into<String>) -> Self {
        self.return_char = return_char.into();
        self
    }

    /// Strip control sequences on read.
    pub fn with_ansi_escape_codes(mut self) -> Self {
        self.ansi_escape_codes = true;
        self
    }

    /// Write `count` returns during preparation.
    pub fn with_banner_returns(mut self, count: usize) -> Self {
        self.banner_returns = count;
        self
    }

    /// Enter a sub-shell during preparation.
    pub fn with_shell_command(mut self, command: impl Into<String>) -> Self {
        self.shell_command = Some(command.into());
        self
    }

    /// Make the system shell reachable with [`Session::enter_shell`].
    ///
    /// [`Session::enter_shell`]: crate::Session::enter_shell
    pub fn with_system_shell(mut self, spec: SystemShellSpec) -> Self {
        self.system_shell = Some(spec);
        self
    }

    /// Set the terminal width command.
    pub fn with_terminal_width(mut self, command: TerminalCommand) -> Self {
        self.terminal_width = Some(command);
        self
    }

    /// Set the paging disable command.
    pub fn with_paging(mut self, command: TerminalCommand) -> Self {
        self.paging = Some(command);
        self
    }

    /// Add a privileged tier.
    pub fn with_privileged(mut self, spec: ModeSpec) -> Self {
        self.has_privileged_tier = true;
        self.privileged = spec;
        self
    }

    /// Set the configuration mode.
    pub fn with_configuration(mut self, spec: ModeSpec) -> Self {
        self.configuration = Some(spec);
        self
    }

    /// Set the exit attempt ceiling.
    pub fn with_exit_config_retries(mut self, retries: usize) -> Self {
        self.exit_config_retries = retries;
        self
    }

    /// Set the save command.
    pub fn with_save_config(mut self, spec: SaveConfigSpec) -> Self {
        self.save_config = Some(spec);
        self
    }

    /// Set the commit command.
    pub fn with_commit(mut self, spec: CommitSpec) -> Self {
        self.commit = Some(spec);
        self
    }

    /// Add a failure marker.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Set the default echo verification override.
    pub fn with_global_cmd_verify(mut self, verify: bool) -> Self {
        self.global_cmd_verify = Some(verify);
        self
    }

    /// Default to fast mode.
    pub fn with_fast_cli(mut self, fast: bool) -> Self {
        self.fast_cli = Some(fast);
        self
    }

    /// Prompt terminators, primary first.
    pub fn terminators(&self) -> Vec<char> {
        let mut terminators = vec![self.primary_terminator];
        if let Some(alt) = self.alternate_terminator {
            terminators.push(alt);
        }
        terminators
    }

    /// `prompt` with every ignored substring removed.
    pub fn clean_prompt(&self, prompt: &str) -> String {
        self.prompt_ignore
            .iter()
            .fold(prompt.to_string(), |acc, ignore| acc.replace(ignore.as_str(), ""))
    }

    /// First failure marker contained in `output`.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|marker| output.contains(marker.as_str()))
            .map(String::as_str)
    }

    /// Check structural consistency. Regexes are checked when compiled.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Error {
            ProfileError::InvalidProfile {
                name: self.name.clone(),
                message: message.to_string(),
            }
            .into()
        };

        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.alternate_terminator == Some(self.primary_terminator) {
            return Err(invalid("alternate terminator equals primary terminator"));
        }
        if self.return_char.is_empty() {
            return Err(invalid("return_char is empty"));
        }
        if self.has_privileged_tier
            && (self.privileged.enter_command.is_empty() || self.privileged.check_string.is_empty())
        {
            return Err(invalid("privileged tier needs enter_command and check_string"));
        }
        if let Some(config) = &self.configuration
            && (config.enter_command.is_empty()
                || config.exit_command.is_empty()
                || config.check_string.is_empty())
        {
            return Err(invalid(
                "configuration mode needs enter_command, exit_command and check_string",
            ));
        }
        if let Some(shell) = &self.system_shell
            && (shell.enter_command.is_empty() || shell.exit_command.is_empty())
        {
            return Err(invalid("system shell needs enter_command and exit_command"));
        }
        if let Some(save) = &self.save_config
            && save.mode == Mode::Configuration
            && self.configuration.is_none()
        {
            return Err(invalid("save_config runs in configuration mode but none is defined"));
        }
        Ok(())
    }
}

/// A preparation command (paging disable, terminal width).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalCommand {
    /// Command text.
    pub command: String,

    /// Pattern that marks completion. Defaults to the base prompt.
    pub pattern: Option<String>,

    /// Wait for the command echo before the completion pattern.
    pub cmd_verify: bool,
}

impl Default for TerminalCommand {
    fn default() -> Self {
        Self {
            command: String::new(),
            pattern: None,
            cmd_verify: true,
        }
    }
}

impl TerminalCommand {
    /// Command completed by the base prompt, echo verified.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the completion pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Skip echo verification.
    pub fn without_cmd_verify(mut self) -> Self {
        self.cmd_verify = false;
        self
    }
}

/// Commands to drop into the operating-system shell and back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemShellSpec {
    /// Command that starts the shell.
    pub enter_command: String,

    /// Pattern that marks the shell prompt.
    pub enter_pattern: String,

    /// Command that returns to the CLI.
    pub exit_command: String,

    /// Pattern that marks the CLI prompt again.
    pub exit_pattern: String,
}

impl SystemShellSpec {
    /// Shell entered with `enter_command` until `enter_pattern`, left with
    /// `exit` until `exit_pattern`.
    pub fn new(
        enter_command: impl Into<String>,
        enter_pattern: impl Into<String>,
        exit_pattern: impl Into<String>,
    ) -> Self {
        Self {
            enter_command: enter_command.into(),
            enter_pattern: enter_pattern.into(),
            exit_command: "exit".to_string(),
            exit_pattern: exit_pattern.into(),
        }
    }
}

/// How to save the running configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfigSpec {
    /// Save command.
    pub command: String,

    /// Mode the save command runs in.
    pub mode: Mode,

    /// The device asks for confirmation.
    pub confirm: bool,

    /// Answer to the confirmation. Empty sends a bare return.
    pub confirm_response: String,
}

impl Default for SaveConfigSpec {
    fn default() -> Self {
        Self {
            command: String::new(),
            mode: Mode::Privileged,
            confirm: false,
            confirm_response: String::new(),
        }
    }
}

impl SaveConfigSpec {
    /// Save from privileged mode without confirmation.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Run the save from `mode`.
    pub fn in_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Answer a confirmation with `response`.
    pub fn with_confirm(mut self, response: impl Into<String>) -> Self {
        self.confirm = true;
        self.confirm_response = response.into();
        self
    }
}

/// How to commit a candidate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitSpec {
    /// Commit command, sent from configuration mode.
    pub command: String,

    /// Pattern that marks the commit finished. Defaults to the base prompt.
    pub expect: Option<String>,

    /// Output substrings that mean the commit failed.
    pub error_markers: Vec<String>,
}

impl Default for CommitSpec {
    fn default() -> Self {
        Self {
            command: "commit".to_string(),
            expect: None,
            error_markers: vec![],
        }
    }
}

impl CommitSpec {
    /// Commit with `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the completion pattern.
    pub fn with_expect(mut self, pattern: impl Into<String>) -> Self {
        self.expect = Some(pattern.into());
        self
    }

    /// Add an error marker.
    pub fn with_error_marker(mut self, marker: impl Into<String>) -> Self {
        self.error_markers.push(marker.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let profile = DeviceProfile::new("generic");
        assert_eq!(profile.terminators(), vec!['#', '>']);
        assert_eq!(profile.exit_config_retries, 12);
        assert_eq!(profile.return_char, "\n");
        assert!(!profile.has_privileged_tier);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_clean_prompt() {
        let profile = DeviceProfile::new("eos")
            .with_prompt_ignore("(s1)")
            .with_prompt_ignore("(s2)");
        assert_eq!(profile.clean_prompt("core01(s1)(config)#"), "core01(config)#");
        assert_eq!(profile.clean_prompt("core01(s2)#"), "core01#");
    }

    #[test]
    fn test_detect_failure() {
        let profile = DeviceProfile::new("ios").with_failure_pattern("% Invalid input");
        assert_eq!(
            profile.detect_failure("  ^\r\n% Invalid input detected at '^' marker."),
            Some("% Invalid input")
        );
        assert_eq!(profile.detect_failure("IOS 15.2"), None);
    }

    #[test]
    fn test_validate_rejects_incomplete_tiers() {
        let mut profile = DeviceProfile::new("broken");
        profile.has_privileged_tier = true;
        assert!(profile.validate().is_err());

        let profile = DeviceProfile::new("broken").with_configuration(ModeSpec::default());
        assert!(profile.validate().is_err());

        let profile = DeviceProfile::new("broken").with_terminators('#', Some('#'));
        assert!(profile.validate().is_err());

        let profile = DeviceProfile::new("broken")
            .with_save_config(SaveConfigSpec::new("write").in_mode(Mode::Configuration));
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let profile: DeviceProfile = serde_json::from_str(
            r##"{
                "name": "lab_switch",
                "primary_terminator": ">",
                "alternate_terminator": "#",
                "paging": {"command": "terminal length 0"},
                "configuration": {
                    "enter_command": "configure",
                    "exit_command": "end",
                    "check_string": ")#"
                },
                "save_config": {"command": "write", "confirm": true, "confirm_response": "y"}
            }"##,
        )
        .unwrap();

        assert_eq!(profile.primary_terminator, '>');
        assert_eq!(profile.exit_config_retries, 12);
        assert!(profile.paging.as_ref().unwrap().cmd_verify);
        assert_eq!(profile.save_config.as_ref().unwrap().mode, Mode::Privileged);
        assert!(profile.validate().is_ok());
    }
}
