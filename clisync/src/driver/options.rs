//! Session and per-call options.

use std::time::Duration;

use log::warn;
use secrecy::SecretString;

/// Synchronization strategy for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Wait for the echo, then for the prompt (or an expected pattern).
    Pattern,
    /// Wait a delay, then read until output stops growing.
    Timing,
}

impl Strategy {
    /// Whether the strategy verifies the echo when nothing overrides it.
    pub fn default_cmd_verify(self) -> bool {
        match self {
            Strategy::Pattern => true,
            Strategy::Timing => false,
        }
    }
}

/// Session-wide timing and policy settings.
#[derive(Debug)]
pub struct SessionConfig {
    /// Default read timeout for pattern waits.
    pub timeout: Duration,

    /// Sleep between polls.
    pub poll_interval: Duration,

    /// Multiplier applied to every delay.
    pub global_delay_factor: f64,

    /// Use the smaller of the per-call and global delay factors instead of
    /// the larger. `None` takes the profile's default, else `false`.
    pub fast_cli: Option<bool>,

    /// Base delay before the first read of a timing command.
    pub timing_delay: Duration,

    /// Silence that ends a timing read.
    pub timing_quiet_period: Duration,

    /// Ceiling on timing-read iterations.
    pub max_loops: usize,

    /// Force echo verification on or off for every call. `None` takes the
    /// profile's default, else each call decides.
    pub global_cmd_verify: Option<bool>,

    /// Extra waits for a missing echo before giving up.
    pub echo_retries: usize,

    /// Maximum bytes held in the read buffer.
    pub buffer_limit: usize,

    /// Returns written while probing for the prompt.
    pub prompt_probe_attempts: usize,

    /// Enable secret, sent when a mode transition asks for a password.
    pub secret: Option<SecretString>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
            global_delay_factor: 1.0,
            fast_cli: None,
            timing_delay: Duration::from_millis(100),
            timing_quiet_period: Duration::from_secs(2),
            max_loops: 500,
            global_cmd_verify: None,
            echo_retries: 3,
            buffer_limit: 1024 * 1024,
            prompt_probe_attempts: 3,
            secret: None,
        }
    }
}

impl SessionConfig {
    /// Effective delay factor for a call.
    ///
    /// In fast mode the smaller of `call` and the global factor wins,
    /// otherwise the larger.
    pub fn select_delay_factor(&self, call: Option<f64>) -> f64 {
        let global = self.global_delay_factor;
        let call = match call {
            Some(factor) if valid_factor(factor) => factor,
            Some(factor) => {
                warn!("ignoring delay factor {}, using {}", factor, global);
                global
            }
            None => global,
        };
        if self.fast_cli.unwrap_or(false) {
            call.min(global)
        } else {
            call.max(global)
        }
    }

    /// Check the settings that feed delay and timeout arithmetic.
    pub fn validate(&self) -> Result<(), String> {
        if !valid_factor(self.global_delay_factor) {
            return Err(format!(
                "global_delay_factor must be a finite, non-negative number (got {})",
                self.global_delay_factor
            ));
        }
        for (name, value) in [
            ("echo_retries", self.echo_retries),
            ("prompt_probe_attempts", self.prompt_probe_attempts),
        ] {
            if u32::try_from(value).is_err() {
                return Err(format!("{} is too large ({})", name, value));
            }
        }
        Ok(())
    }

    /// Whether a call verifies its echo.
    ///
    /// Precedence: the session override, then the call's own value, then
    /// the strategy default.
    pub fn resolve_cmd_verify(&self, call: Option<bool>, strategy: Strategy) -> bool {
        self.global_cmd_verify
            .or(call)
            .unwrap_or_else(|| strategy.default_cmd_verify())
    }
}

fn valid_factor(factor: f64) -> bool {
    factor.is_finite() && factor >= 0.0
}

/// Per-call options for [`send_command_with`] and
/// [`send_command_timing_with`].
///
/// [`send_command_with`]: crate::Session::send_command_with
/// [`send_command_timing_with`]: crate::Session::send_command_timing_with
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Regex that ends the read instead of the base prompt (pattern
    /// strategy only).
    pub expect_string: Option<String>,

    /// Read timeout; defaults to the session timeout.
    pub read_timeout: Option<Duration>,

    /// Per-call delay factor.
    pub delay_factor: Option<f64>,

    /// Timing-read iteration ceiling.
    pub max_loops: Option<usize>,

    /// Remove the trailing prompt line.
    pub strip_prompt: bool,

    /// Remove the echoed command line.
    pub strip_command: bool,

    /// Append the profile's return to the command.
    pub normalize: bool,

    /// Verify the echo; subject to the session override.
    pub cmd_verify: Option<bool>,

    /// Run the output through the registered parsers.
    pub parse: bool,

    /// Template for the parsers, overriding their own lookup.
    pub template: Option<std::path::PathBuf>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            expect_string: None,
            read_timeout: None,
            delay_factor: None,
            max_loops: None,
            strip_prompt: true,
            strip_command: true,
            normalize: true,
            cmd_verify: None,
            parse: false,
            template: None,
        }
    }
}

impl CommandOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// End the read on `pattern` instead of the prompt.
    pub fn expect_string(mut self, pattern: impl Into<String>) -> Self {
        self.expect_string = Some(pattern.into());
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the delay factor.
    pub fn delay_factor(mut self, factor: f64) -> Self {
        self.delay_factor = Some(factor);
        self
    }

    /// Set the timing-read iteration ceiling.
    pub fn max_loops(mut self, loops: usize) -> Self {
        self.max_loops = Some(loops);
        self
    }

    /// Keep or strip the trailing prompt.
    pub fn strip_prompt(mut self, strip: bool) -> Self {
        self.strip_prompt = strip;
        self
    }

    /// Keep or strip the echoed command.
    pub fn strip_command(mut self, strip: bool) -> Self {
        self.strip_command = strip;
        self
    }

    /// Append the return or send the command as is.
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Request or skip echo verification.
    pub fn cmd_verify(mut self, verify: bool) -> Self {
        self.cmd_verify = Some(verify);
        self
    }

    /// Parse the output into structured data.
    pub fn parse(mut self) -> Self {
        self.parse = true;
        self
    }

    /// Parse with the template at `path`.
    pub fn template(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.parse = true;
        self.template = Some(path.into());
        self
    }
}

/// Options for [`send_config_set`](crate::Session::send_config_set).
#[derive(Debug, Clone)]
pub struct ConfigSetOptions {
    /// Enter configuration mode first.
    pub enter_config_mode: bool,

    /// Leave configuration mode afterwards.
    pub exit_config_mode: bool,

    /// Verify each line's echo; subject to the session override. Without
    /// verification all lines are written, then read with the timing
    /// strategy.
    pub cmd_verify: Option<bool>,

    /// Regex that marks a rejected line; aborts the set.
    pub error_pattern: Option<String>,

    /// Per-line read timeout; defaults to the session timeout.
    pub read_timeout: Option<Duration>,

    /// Per-call delay factor.
    pub delay_factor: Option<f64>,

    /// Remove the trailing prompt line from the combined output.
    pub strip_prompt: bool,

    /// Remove the first echoed command from the combined output.
    pub strip_command: bool,
}

impl Default for ConfigSetOptions {
    fn default() -> Self {
        Self {
            enter_config_mode: true,
            exit_config_mode: true,
            cmd_verify: None,
            error_pattern: None,
            read_timeout: None,
            delay_factor: None,
            strip_prompt: false,
            strip_command: false,
        }
    }
}

impl ConfigSetOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort on lines whose output matches `pattern`.
    pub fn error_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.error_pattern = Some(pattern.into());
        self
    }

    /// Stay in configuration mode afterwards.
    pub fn stay_in_config(mut self) -> Self {
        self.exit_config_mode = false;
        self
    }

    /// Assume configuration mode is already active.
    pub fn skip_enter(mut self) -> Self {
        self.enter_config_mode = false;
        self
    }

    /// Request or skip per-line echo verification.
    pub fn cmd_verify(mut self, verify: bool) -> Self {
        self.cmd_verify = Some(verify);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_factor_selection() {
        let mut config = SessionConfig {
            global_delay_factor: 2.0,
            ..Default::default()
        };
        assert_eq!(config.select_delay_factor(Some(1.0)), 2.0);
        assert_eq!(config.select_delay_factor(Some(4.0)), 4.0);
        assert_eq!(config.select_delay_factor(None), 2.0);

        config.fast_cli = Some(true);
        assert_eq!(config.select_delay_factor(Some(1.0)), 1.0);
        assert_eq!(config.select_delay_factor(Some(4.0)), 2.0);
    }

    #[test]
    fn test_unusable_call_factor_falls_back_to_global() {
        let config = SessionConfig {
            global_delay_factor: 2.0,
            ..Default::default()
        };
        assert_eq!(config.select_delay_factor(Some(-1.0)), 2.0);
        assert_eq!(config.select_delay_factor(Some(f64::NAN)), 2.0);
    }

    #[test]
    fn test_validate() {
        assert!(SessionConfig::default().validate().is_ok());

        let config = SessionConfig {
            global_delay_factor: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            global_delay_factor: -0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cmd_verify_precedence() {
        let mut config = SessionConfig::default();
        assert!(config.resolve_cmd_verify(None, Strategy::Pattern));
        assert!(!config.resolve_cmd_verify(None, Strategy::Timing));
        assert!(config.resolve_cmd_verify(Some(true), Strategy::Timing));
        assert!(!config.resolve_cmd_verify(Some(false), Strategy::Pattern));

        config.global_cmd_verify = Some(false);
        assert!(!config.resolve_cmd_verify(Some(true), Strategy::Pattern));
        assert!(!config.resolve_cmd_verify(None, Strategy::Pattern));

        config.global_cmd_verify = Some(true);
        assert!(config.resolve_cmd_verify(Some(false), Strategy::Timing));
    }

    #[test]
    fn test_command_options_defaults() {
        let opts = CommandOptions::default();
        assert!(opts.strip_prompt);
        assert!(opts.strip_command);
        assert!(opts.normalize);
        assert!(!opts.parse);

        let opts = CommandOptions::new().template("/tmp/show_version.textfsm");
        assert!(opts.parse);
    }
}
