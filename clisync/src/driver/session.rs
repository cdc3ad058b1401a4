//! Session automaton: prompt detection, mode transitions and command
//! execution over a [`SessionChannel`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use regex::bytes::Regex;
use secrecy::ExposeSecret;

use super::mode::{Mode, ModeController};
use super::options::{CommandOptions, ConfigSetOptions, SessionConfig, Strategy};
use super::response::Response;
use crate::channel::{SessionChannel, TimingRead, patterns};
use crate::error::{ChannelError, DriverError, Error, Result};
use crate::parse::{ParseInput, ParserChain};
use crate::profile::{CompiledProfile, TerminalCommand};
use crate::sanitize::{self, SanitizeOptions};
use crate::transport::Transport;

/// A live CLI session over one transport.
///
/// Owns the read buffer, the detected base prompt and the current mode. One
/// command is in flight at a time; every wait is bounded.
pub struct Session<T: Transport> {
    channel: SessionChannel<T>,
    profile: Arc<CompiledProfile>,
    config: SessionConfig,
    modes: ModeController,
    parsers: ParserChain,
    base_prompt: Option<String>,
    prompt_pattern: Option<Regex>,
    open: bool,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(
        channel: SessionChannel<T>,
        profile: Arc<CompiledProfile>,
        config: SessionConfig,
        parsers: ParserChain,
    ) -> Self {
        let modes = ModeController::new(&profile);
        Self {
            channel,
            profile,
            config,
            modes,
            parsers,
            base_prompt: None,
            prompt_pattern: None,
            open: false,
            closed: false,
        }
    }

    /// Prepare the session.
    ///
    /// Waits for the first prompt, pushes through banners, enters the
    /// profile's shell, detects the base prompt, sets the terminal width,
    /// disables paging and clears the buffer.
    pub async fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(DriverError::AlreadyOpen.into());
        }

        self.test_channel_read().await?;

        let banner_returns = self.profile.profile().banner_returns;
        if banner_returns > 0 {
            let pause = self.scaled(Duration::from_millis(500), None);
            for _ in 0..banner_returns {
                tokio::time::sleep(pause).await;
                self.write_return().await?;
            }
            tokio::time::sleep(self.scaled(Duration::from_millis(300), None)).await;
            self.channel.clear_buffer().await?;
        }

        self.detect_base_prompt().await?;

        if let Some(shell) = self.profile.profile().shell_command.clone() {
            self.start_shell(&shell).await?;
            self.detect_base_prompt().await?;
        }

        self.set_terminal_width().await?;
        self.disable_paging().await?;
        self.channel.clear_buffer().await?;

        self.open = true;
        debug!(
            "{}: session open at {:?} ({} mode)",
            self.profile.name(),
            self.base_prompt.as_deref().unwrap_or_default(),
            self.modes.current()
        );
        Ok(())
    }

    /// Wait for any prompt to show up, nudging with returns.
    async fn test_channel_read(&mut self) -> Result<()> {
        let attempts = self.config.prompt_probe_attempts.max(1);
        let wait = split_timeout(self.config.timeout, attempts);
        let pattern = self.profile.any_prompt.clone();

        for attempt in 1..=attempts {
            match self.channel.read_until_pattern(&pattern, wait).await {
                Ok(output) => {
                    trace!("initial read: {:?}", output);
                    return Ok(());
                }
                Err(e) if e.is_recoverable() && attempt < attempts => {
                    debug!("no prompt yet (attempt {}/{}), sending return", attempt, attempts);
                    self.write_return().await?;
                }
                Err(Error::Channel(ChannelError::ReadTimeout { partial, .. })) => {
                    return Err(DriverError::PromptDetection { output: partial }.into());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn start_shell(&mut self, shell: &str) -> Result<()> {
        debug!("{}: entering shell {:?}", self.profile.name(), shell);
        self.channel.clear_buffer().await?;
        let return_char = self.profile.profile().return_char.clone();
        self.channel
            .write(&format!("{return_char}{shell}{return_char}"))
            .await?;
        tokio::time::sleep(self.scaled(Duration::from_secs(1), None)).await;
        self.channel.clear_buffer().await?;
        Ok(())
    }

    /// Probe the device and return the current prompt line, terminator
    /// included. Updates the tracked mode.
    pub async fn find_prompt(&mut self) -> Result<String> {
        let pattern = self.profile.any_prompt.clone();
        self.probe_prompt(&pattern).await
    }

    async fn probe_prompt(&mut self, pattern: &Regex) -> Result<String> {
        self.channel.clear_buffer().await?;

        let attempts = self.config.prompt_probe_attempts.max(1);
        let wait = split_timeout(self.config.timeout, attempts);

        for attempt in 1..=attempts {
            self.write_return().await?;
            match self.channel.read_until_pattern(pattern, wait).await {
                Ok(matched) => {
                    // Keep reading while more arrives, within the timeout;
                    // the last line wins if it is still a prompt.
                    let deadline = Instant::now() + self.config.timeout;
                    for _ in 0..self.config.max_loops.max(1) {
                        if Instant::now() >= deadline {
                            debug!("output still arriving after {:?}", self.config.timeout);
                            break;
                        }
                        let more = self.channel.read_available(self.config.poll_interval).await?;
                        if more.is_empty() {
                            break;
                        }
                    }
                    let settled = format!("{}{}", matched, self.channel.take_buffer());

                    let terminators = self.profile.profile().terminators();
                    let settled = sanitize::sanitize(&settled);
                    let mut prompt = last_line(&settled).to_string();
                    if !ends_with_terminator(&prompt, &terminators) {
                        prompt = last_line(&sanitize::sanitize(&matched)).to_string();
                    }
                    if prompt.is_empty() {
                        continue;
                    }
                    let mode = self.modes.observe(&self.profile, &prompt);
                    trace!("prompt {:?} ({} mode)", prompt, mode);
                    return Ok(prompt);
                }
                Err(e) if e.is_recoverable() => {
                    debug!("prompt probe {}/{} timed out", attempt, attempts);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DriverError::PromptDetection {
            output: self.channel.take_buffer(),
        }
        .into())
    }

    /// Detect and record the base prompt: the prompt line without its
    /// terminator (and without the profile's leading characters).
    ///
    /// Fails with [`DriverError::PromptDetection`] when the prompt does not
    /// end in one of the profile's terminators.
    pub async fn detect_base_prompt(&mut self) -> Result<String> {
        let prompt = self.find_prompt().await?;
        let base = base_prompt_from(self.profile.profile(), &prompt)
            .ok_or_else(|| DriverError::PromptDetection {
                output: prompt.clone(),
            })?;

        let pattern = patterns::base_prompt_pattern(&base, &self.profile.profile().terminators())
            .map_err(ChannelError::from)?;
        debug!("{}: base prompt {:?}", self.profile.name(), base);
        self.base_prompt = Some(base.clone());
        self.prompt_pattern = Some(pattern);
        Ok(base)
    }

    /// Probe the prompt and check it against `mode`.
    pub async fn check_mode(&mut self, mode: Mode) -> Result<bool> {
        if mode == Mode::Privileged && self.profile.privileged.is_none() {
            return Ok(true);
        }
        let check = match mode {
            Mode::Unprivileged => None,
            Mode::Privileged => self.profile.privileged.as_ref().and_then(|m| m.check.clone()),
            Mode::Configuration => self
                .profile
                .configuration
                .as_ref()
                .and_then(|m| m.check.clone()),
        };
        // A mode's check pattern ends the probe read early; any prompt still does.
        let pattern = match check {
            Some(check) => patterns::either(check.as_str(), self.profile.any_prompt.as_str())
                .map_err(ChannelError::from)?,
            None => self.profile.any_prompt.clone(),
        };
        self.probe_prompt(&pattern).await?;
        Ok(self.modes.check(&self.profile, mode))
    }

    /// Move to `target`, one hop at a time.
    ///
    /// Each hop writes the profile's command, reads until its pattern (or
    /// the base prompt), answers a password prompt with the session secret,
    /// then re-probes the prompt to validate. Entering the privileged tier on
    /// a profile without one does nothing.
    pub async fn enter_mode(&mut self, target: Mode) -> Result<String> {
        if target == Mode::Privileged && self.profile.privileged.is_none() {
            return Ok(String::new());
        }
        if target == Mode::Configuration && self.profile.configuration.is_none() {
            return Err(self.unsupported("configuration mode"));
        }

        let current = {
            self.find_prompt().await?;
            self.modes.current()
        };
        if current == target || (target == Mode::Privileged && current == Mode::Configuration) {
            return Ok(String::new());
        }

        let path = self.modes.find_path(current, target)?;
        let mut output = String::new();
        for hop in path.windows(2) {
            output.push_str(&self.transition(hop[0], hop[1]).await?);
        }
        Ok(output)
    }

    /// Leave the current mode for the one below it.
    ///
    /// Leaving configuration goes through [`exit_configuration`]. Leaving
    /// the privileged tier on a profile without one does nothing.
    ///
    /// [`exit_configuration`]: Self::exit_configuration
    pub async fn exit_mode(&mut self, mode: Mode) -> Result<String> {
        match mode {
            Mode::Configuration => self.exit_configuration().await,
            Mode::Privileged if self.profile.privileged.is_none() => Ok(String::new()),
            Mode::Privileged => {
                let mut output = self.exit_configuration().await?;
                if self.check_mode(Mode::Privileged).await? {
                    output.push_str(&self.transition(Mode::Privileged, Mode::Unprivileged).await?);
                }
                Ok(output)
            }
            Mode::Unprivileged => Ok(String::new()),
        }
    }

    async fn transition(&mut self, from: Mode, to: Mode) -> Result<String> {
        let profile = self.profile.clone();
        let hop = self.modes.transition(&profile, from, to).ok_or_else(|| {
            Error::from(DriverError::ModeTransition {
                mode: to.to_string(),
                attempts: 0,
                output: format!("no transition from {from} mode"),
            })
        })?;
        debug!("{}: {} -> {} via {:?}", profile.name(), from, hop.to, hop.command());

        let prompt = self.require_prompt_pattern()?.clone();
        let done = hop.pattern().cloned().unwrap_or(prompt.clone());
        let wait_for = match hop.password() {
            Some(password) => patterns::either(password.as_str(), done.as_str())
                .map_err(ChannelError::from)?,
            None => done.clone(),
        };

        self.write_command(hop.command()).await?;
        let mut output = self.channel.read_until_pattern(&wait_for, self.config.timeout).await?;

        if let Some(password) = hop.password()
            && password.is_match(output.as_bytes())
            && !done.is_match(output.as_bytes())
        {
            let secret = self
                .config
                .secret
                .as_ref()
                .map(|s| s.expose_secret().to_string())
                .unwrap_or_default();
            let return_char = &profile.profile().return_char;
            self.channel.write_hidden(&format!("{secret}{return_char}")).await?;
            output.push_str(&self.channel.read_until_pattern(&prompt, self.config.timeout).await?);
        }

        self.find_prompt().await?;
        let reached = self.modes.check(&profile, to)
            && (to != Mode::Privileged || !self.modes.check(&profile, Mode::Configuration));
        if !reached {
            return Err(DriverError::ModeTransition {
                mode: to.to_string(),
                attempts: 1,
                output: format!("{}{}", output, self.modes.last_prompt()),
            }
            .into());
        }
        Ok(output)
    }

    /// Leave configuration mode.
    ///
    /// Sends the exit command while the configuration check holds, up to the
    /// profile's `exit_config_retries`, then checks once more. Nested
    /// contexts that each consume one exit are handled the same way as a
    /// single `end`.
    pub async fn exit_configuration(&mut self) -> Result<String> {
        let Some(config) = self.profile.configuration.clone() else {
            return Ok(String::new());
        };
        let prompt = self.require_prompt_pattern()?.clone();
        let done = config.exit.clone().unwrap_or(prompt);
        let ceiling = self.profile.profile().exit_config_retries;

        let mut output = String::new();
        let mut attempts = 0;
        while attempts < ceiling && self.check_mode(Mode::Configuration).await? {
            attempts += 1;
            trace!("exit attempt {}/{}", attempts, ceiling);
            self.write_command(&config.spec.exit_command).await?;
            output.push_str(&self.channel.read_until_pattern(&done, self.config.timeout).await?);
        }

        if self.check_mode(Mode::Configuration).await? {
            return Err(DriverError::ModeTransition {
                mode: Mode::Privileged.to_string(),
                attempts,
                output: format!("{}{}", output, self.modes.last_prompt()),
            }
            .into());
        }
        debug!("{}: left configuration after {} exit(s)", self.profile.name(), attempts);
        Ok(output)
    }

    /// Send a command with the pattern strategy and default options.
    pub async fn send_command(&mut self, command: &str) -> Result<Response> {
        self.send_command_with(command, &CommandOptions::default())
            .await
    }

    /// Send a command with the pattern strategy.
    ///
    /// Writes the command, waits for its echo (unless verification is off),
    /// then reads until the base prompt or `expect_string`. A wait that
    /// expires fails with [`ChannelError::ReadTimeout`] carrying everything
    /// read for this command.
    pub async fn send_command_with(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> Result<Response> {
        let expect = options
            .expect_string
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(ChannelError::from)?;
        self.execute_pattern(command, options, expect).await
    }

    async fn execute_pattern(
        &mut self,
        command: &str,
        options: &CommandOptions,
        expect: Option<Regex>,
    ) -> Result<Response> {
        self.require_open()?;
        let start = Instant::now();
        let search = match expect {
            Some(pattern) => pattern,
            None => self.require_prompt_pattern()?.clone(),
        };
        let verify = self.config.resolve_cmd_verify(options.cmd_verify, Strategy::Pattern);
        let factor = self.config.select_delay_factor(options.delay_factor);
        let timeout = options
            .read_timeout
            .unwrap_or(self.config.timeout)
            .mul_f64(factor);
        debug!("send_command {:?} (verify={}, timeout={:?})", command, verify, timeout);

        self.write_for(command, options.normalize).await?;
        let mut raw = String::new();
        if verify {
            raw.push_str(&self.wait_for_echo(command, timeout).await?);
        }
        match self.channel.read_until_pattern(&search, timeout).await {
            Ok(output) => raw.push_str(&output),
            Err(Error::Channel(ChannelError::ReadTimeout {
                pattern,
                timeout,
                partial,
            })) => {
                return Err(ChannelError::ReadTimeout {
                    pattern,
                    timeout,
                    partial: format!("{raw}{partial}"),
                }
                .into());
            }
            Err(e) => return Err(e),
        }

        Ok(self.finish(command, raw, options, start))
    }

    /// Send a command with the timing strategy and default options.
    pub async fn send_command_timing(&mut self, command: &str) -> Result<Response> {
        self.send_command_timing_with(command, &CommandOptions::default())
            .await
    }

    /// Send a command with the timing strategy.
    ///
    /// Writes the command, optionally waits for its echo, sleeps the base
    /// delay, then reads until output stops growing for the quiet period or
    /// `max_loops` polls pass. Usable before the base prompt is known.
    pub async fn send_command_timing_with(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> Result<Response> {
        let start = Instant::now();
        let verify = self.config.resolve_cmd_verify(options.cmd_verify, Strategy::Timing);
        let factor = self.config.select_delay_factor(options.delay_factor);
        debug!("send_command_timing {:?} (verify={}, factor={})", command, verify, factor);

        self.write_for(command, options.normalize).await?;
        let mut raw = String::new();
        if verify {
            let timeout = options.read_timeout.unwrap_or(self.config.timeout);
            raw.push_str(&self.wait_for_echo(command, timeout.mul_f64(factor)).await?);
        }
        raw.push_str(&self.channel.read_timing(self.timing(options, factor)).await?);

        Ok(self.finish(command, raw, options, start))
    }

    /// Send several commands in order with the pattern strategy.
    pub async fn send_commands(&mut self, commands: &[&str]) -> Result<Vec<Response>> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.send_command(command).await?);
        }
        Ok(responses)
    }

    /// Apply configuration lines.
    ///
    /// Enters configuration mode, sends each line and leaves again. With echo
    /// verification each line is read through its echo and the next prompt,
    /// and a line whose output matches `error_pattern` aborts with
    /// [`DriverError::ConfigCommandFailed`]. Without verification all lines
    /// are written, then read with the timing strategy.
    pub async fn send_config_set(
        &mut self,
        commands: &[&str],
        options: &ConfigSetOptions,
    ) -> Result<Response> {
        self.require_open()?;
        let start = Instant::now();
        let error_pattern = options
            .error_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(ChannelError::from)?;
        let verify = self.config.resolve_cmd_verify(options.cmd_verify, Strategy::Pattern);
        let factor = self.config.select_delay_factor(options.delay_factor);
        let timeout = options
            .read_timeout
            .unwrap_or(self.config.timeout)
            .mul_f64(factor);

        let mut raw = String::new();
        if options.enter_config_mode {
            raw.push_str(&self.enter_mode(Mode::Configuration).await?);
        }

        if verify {
            let prompt = self.require_prompt_pattern()?.clone();
            for command in commands {
                self.write_command(command).await?;
                let mut output = self.wait_for_echo(command, timeout).await?;
                output.push_str(&self.channel.read_until_pattern(&prompt, timeout).await?);
                if let Some(error) = &error_pattern
                    && error.is_match(output.as_bytes())
                {
                    return Err(DriverError::ConfigCommandFailed {
                        command: command.to_string(),
                        output: sanitize::sanitize(&output),
                    }
                    .into());
                }
                raw.push_str(&output);
            }
        } else {
            let pause = self.scaled(Duration::from_millis(50), options.delay_factor);
            for command in commands {
                self.write_command(command).await?;
                tokio::time::sleep(pause).await;
            }
            let timing = self.timing(&CommandOptions::default(), factor);
            let output = self.channel.read_timing(timing).await?;
            if let Some(error) = &error_pattern
                && error.is_match(output.as_bytes())
            {
                return Err(DriverError::ConfigCommandFailed {
                    command: commands.join("\n"),
                    output: sanitize::sanitize(&output),
                }
                .into());
            }
            raw.push_str(&output);
        }

        if options.exit_config_mode {
            raw.push_str(&self.exit_configuration().await?);
        }

        let joined = commands.join("\n");
        let result = sanitize::sanitize_output(
            &raw,
            &SanitizeOptions {
                command: options.strip_command.then_some(joined.as_str()),
                base_prompt: if options.strip_prompt {
                    self.base_prompt.as_deref()
                } else {
                    None
                },
            },
        );
        let failure = self.profile.profile().detect_failure(&result).map(str::to_string);
        Ok(Response::new(
            joined,
            result,
            raw,
            self.modes.last_prompt(),
            start.elapsed(),
        )
        .with_failure(failure))
    }

    /// Save the running configuration the profile's way.
    pub async fn save_config(&mut self) -> Result<Response> {
        self.require_open()?;
        let Some(spec) = self.profile.profile().save_config.clone() else {
            return Err(self.unsupported("save_config"));
        };
        let start = Instant::now();

        let mut raw = self.enter_mode(spec.mode).await?;
        let response = if spec.confirm {
            let first = self.send_command_timing(&spec.command).await?;
            let second = self.send_command_timing(&spec.confirm_response).await?;
            format!("{}\n{}", first.result, second.result)
        } else {
            self.send_command(&spec.command).await?.result
        };
        raw.push_str(&response);
        if spec.mode == Mode::Configuration {
            raw.push_str(&self.exit_configuration().await?);
        }

        let failure = self.profile.profile().detect_failure(&response).map(str::to_string);
        Ok(Response::new(
            spec.command,
            response,
            raw,
            self.modes.last_prompt(),
            start.elapsed(),
        )
        .with_failure(failure))
    }

    /// Commit the candidate configuration.
    ///
    /// Enters configuration mode, sends the commit command, leaves
    /// configuration mode, and fails with [`DriverError::CommitFailed`] if
    /// the output contains one of the profile's error markers.
    pub async fn commit(&mut self) -> Result<Response> {
        self.require_open()?;
        let Some(spec) = self.profile.profile().commit.clone() else {
            return Err(self.unsupported("commit"));
        };
        let start = Instant::now();

        let mut raw = self.enter_mode(Mode::Configuration).await?;
        let options = CommandOptions::new().strip_prompt(false).strip_command(false);
        let expect = self.profile.commit_expect.clone();
        let response = self.execute_pattern(&spec.command, &options, expect).await?;
        raw.push_str(&response.raw_result);
        raw.push_str(&self.exit_configuration().await?);

        if let Some(marker) = spec.error_markers.iter().find(|m| raw.contains(m.as_str())) {
            warn!("{}: commit failed ({:?})", self.profile.name(), marker);
            return Err(DriverError::CommitFailed {
                output: sanitize::sanitize(&raw),
            }
            .into());
        }

        Ok(Response::new(
            spec.command,
            response.result,
            raw,
            self.modes.last_prompt(),
            start.elapsed(),
        ))
    }

    /// Drop from the CLI into the device's operating-system shell.
    ///
    /// Fails with [`DriverError::UnsupportedOperation`] when the profile has
    /// no system shell. [`return_cli`] refreshes the tracked mode.
    ///
    /// [`return_cli`]: Self::return_cli
    pub async fn enter_shell(&mut self) -> Result<Response> {
        self.require_open()?;
        let Some(spec) = self.profile.profile().system_shell.clone() else {
            return Err(self.unsupported("enter_shell"));
        };
        let expect = self.profile.shell_enter.clone();
        let options = CommandOptions::new().strip_prompt(false);
        self.execute_pattern(&spec.enter_command, &options, expect).await
    }

    /// Leave the operating-system shell and re-read the CLI prompt.
    pub async fn return_cli(&mut self) -> Result<Response> {
        self.require_open()?;
        let Some(spec) = self.profile.profile().system_shell.clone() else {
            return Err(self.unsupported("return_cli"));
        };
        let expect = self.profile.shell_exit.clone();
        let options = CommandOptions::new().strip_prompt(false);
        let response = self.execute_pattern(&spec.exit_command, &options, expect).await?;
        self.find_prompt().await?;
        Ok(response)
    }

    /// Run the profile's paging disable command, if it has one.
    pub async fn disable_paging(&mut self) -> Result<String> {
        let Some(command) = self.profile.profile().paging.clone() else {
            return Ok(String::new());
        };
        let pattern = self.profile.paging.clone();
        self.terminal_command(&command, pattern).await
    }

    /// Run the profile's terminal width command, if it has one.
    pub async fn set_terminal_width(&mut self) -> Result<String> {
        let Some(command) = self.profile.profile().terminal_width.clone() else {
            return Ok(String::new());
        };
        let pattern = self.profile.terminal_width.clone();
        self.terminal_command(&command, pattern).await
    }

    async fn terminal_command(
        &mut self,
        command: &TerminalCommand,
        pattern: Option<Regex>,
    ) -> Result<String> {
        debug!("{}: {:?}", self.profile.name(), command.command);
        let verify = command.cmd_verify && self.config.global_cmd_verify != Some(false);

        self.write_command(&command.command).await?;
        let mut output = String::new();
        if verify {
            output.push_str(&self.wait_for_echo(&command.command, self.config.timeout).await?);
        }
        let done = match pattern {
            Some(pattern) => pattern,
            None => self.require_prompt_pattern()?.clone(),
        };
        output.push_str(&self.channel.read_until_pattern(&done, self.config.timeout).await?);
        Ok(output)
    }

    /// Write raw text without logging it.
    pub async fn write_channel_hidden(&mut self, text: &str) -> Result<()> {
        self.channel.write_hidden(text).await
    }

    /// Write raw text unchanged.
    pub async fn write_channel(&mut self, text: &str) -> Result<()> {
        self.channel.write(text).await
    }

    /// Read whatever arrives within `timeout`.
    pub async fn read_channel(&mut self, timeout: Duration) -> Result<String> {
        self.channel.read_available(timeout).await?;
        Ok(self.channel.take_buffer())
    }

    /// Discard pending output. Returns whether there was any.
    pub async fn clear_buffer(&mut self) -> Result<bool> {
        self.channel.clear_buffer().await
    }

    /// Leave configuration mode if possible and close the transport.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.open && self.channel.is_alive() && self.modes.current() == Mode::Configuration {
            if let Err(e) = self.exit_configuration().await {
                warn!("{}: could not leave configuration mode: {}", self.profile.name(), e);
            }
        }
        self.closed = true;
        self.open = false;
        self.channel.close().await
    }

    /// Detected base prompt.
    pub fn base_prompt(&self) -> Option<&str> {
        self.base_prompt.as_deref()
    }

    /// Mode shown by the last observed prompt.
    pub fn mode(&self) -> Mode {
        self.modes.current()
    }

    /// Whether the session was prepared and not closed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the transport is still usable.
    pub fn is_alive(&self) -> bool {
        self.channel.is_alive()
    }

    /// Profile the session was built with.
    pub fn profile(&self) -> &CompiledProfile {
        &self.profile
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Set the session-wide echo verification override.
    pub fn set_global_cmd_verify(&mut self, verify: Option<bool>) {
        self.config.global_cmd_verify = verify;
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        self.channel.transport()
    }

    async fn wait_for_echo(&mut self, command: &str, timeout: Duration) -> Result<String> {
        let pattern = patterns::echo_pattern(command).map_err(ChannelError::from)?;
        let attempts = self.config.echo_retries.max(1);
        let per_attempt = split_timeout(timeout, attempts);

        for attempt in 1..=attempts {
            match self.channel.read_until_pattern(&pattern, per_attempt).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_recoverable() => {
                    warn!("echo of {:?} not seen (attempt {}/{})", command, attempt, attempts);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DriverError::CommandEcho {
            command: command.to_string(),
            attempts,
            partial: self.channel.buffer().as_str_lossy().into_owned(),
        }
        .into())
    }

    fn finish(
        &mut self,
        command: &str,
        raw: String,
        options: &CommandOptions,
        start: Instant,
    ) -> Response {
        let normalized = sanitize::sanitize(&raw);
        let prompt = last_line(&normalized).to_string();
        if ends_with_terminator(&prompt, &self.profile.profile().terminators()) {
            self.modes.observe(&self.profile, &prompt);
        }

        let result = sanitize::sanitize_output(
            &raw,
            &SanitizeOptions {
                command: options.strip_command.then_some(command),
                base_prompt: if options.strip_prompt {
                    self.base_prompt.as_deref()
                } else {
                    None
                },
            },
        );
        debug!("{:?} -> {} bytes", command, result.len());

        let failure = self.profile.profile().detect_failure(&result).map(str::to_string);
        let structured = if options.parse {
            let mut input = ParseInput::new(&result)
                .platform(self.profile.name())
                .command(command.trim());
            if let Some(template) = options.template.as_deref() {
                input = input.template(template);
            }
            self.parsers.apply(&input)
        } else {
            None
        };

        Response::new(command, result, raw, prompt, start.elapsed())
            .with_failure(failure)
            .with_structured(structured)
    }

    fn timing(&self, options: &CommandOptions, factor: f64) -> TimingRead {
        TimingRead {
            initial_delay: self.config.timing_delay.mul_f64(factor),
            quiet_period: self.config.timing_quiet_period.mul_f64(factor),
            max_loops: options.max_loops.unwrap_or(self.config.max_loops),
        }
    }

    fn scaled(&self, delay: Duration, call: Option<f64>) -> Duration {
        delay.mul_f64(self.config.select_delay_factor(call))
    }

    async fn write_for(&mut self, command: &str, normalize: bool) -> Result<()> {
        if normalize {
            self.write_command(command).await
        } else {
            self.channel.write(command).await
        }
    }

    /// Write `command` with trailing whitespace replaced by the return.
    async fn write_command(&mut self, command: &str) -> Result<()> {
        let return_char = &self.profile.profile().return_char;
        let line = format!("{}{}", command.trim_end(), return_char);
        self.channel.write(&line).await
    }

    async fn write_return(&mut self) -> Result<()> {
        let return_char = self.profile.profile().return_char.clone();
        self.channel.write(&return_char).await
    }

    fn require_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::NotOpen.into())
        }
    }

    fn require_prompt_pattern(&self) -> Result<&Regex> {
        self.prompt_pattern
            .as_ref()
            .ok_or_else(|| DriverError::NotOpen.into())
    }

    fn unsupported(&self, operation: &str) -> Error {
        DriverError::UnsupportedOperation {
            operation: operation.to_string(),
            profile: self.profile.name().to_string(),
        }
        .into()
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.open && !self.closed {
            warn!(
                "{}: session dropped without close()",
                self.profile.name()
            );
        }
    }
}

/// Share of `timeout` for each of `attempts` tries.
fn split_timeout(timeout: Duration, attempts: usize) -> Duration {
    timeout / u32::try_from(attempts.max(1)).unwrap_or(u32::MAX)
}

/// Last non-empty line, trimmed.
fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

fn ends_with_terminator(line: &str, terminators: &[char]) -> bool {
    line.chars().last().is_some_and(|c| terminators.contains(&c))
}

/// Base prompt from a full prompt line, or `None` if it lacks a terminator.
fn base_prompt_from(profile: &crate::profile::DeviceProfile, prompt: &str) -> Option<String> {
    let prompt = prompt.trim();
    let terminator = prompt.chars().last()?;
    if !profile.terminators().contains(&terminator) {
        return None;
    }
    let base = &prompt[..prompt.len() - terminator.len_utf8()];
    let strip: Vec<char> = profile.prompt_strip_leading.chars().collect();
    let base = base.trim_start_matches(strip.as_slice()).trim();
    if base.is_empty() { None } else { Some(base.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::vendors;

    #[test]
    fn test_base_prompt_from() {
        let cisco = vendors::cisco::profile();
        assert_eq!(base_prompt_from(&cisco, "router#").as_deref(), Some("router"));
        assert_eq!(base_prompt_from(&cisco, "router> ").as_deref(), Some("router"));
        assert_eq!(base_prompt_from(&cisco, "router$"), None);
        assert_eq!(base_prompt_from(&cisco, "#"), None);

        let comware = vendors::hp_comware::profile();
        assert_eq!(base_prompt_from(&comware, "<HPE>").as_deref(), Some("HPE"));
        assert_eq!(base_prompt_from(&comware, "[HPE]").as_deref(), Some("HPE"));
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("banner\n\nrouter# \n\n"), "router#");
        assert_eq!(last_line(""), "");
    }

    #[test]
    fn test_split_timeout() {
        let timeout = Duration::from_secs(3);
        assert_eq!(split_timeout(timeout, 3), Duration::from_secs(1));
        assert_eq!(split_timeout(timeout, 0), timeout);
        assert!(split_timeout(timeout, usize::MAX) < Duration::from_millis(1));
    }

    #[test]
    fn test_ends_with_terminator() {
        assert!(ends_with_terminator("router#", &['#', '>']));
        assert!(!ends_with_terminator("IOS 15.2", &['#', '>']));
    }
}
