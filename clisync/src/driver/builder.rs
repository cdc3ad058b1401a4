//! Builder for creating sessions.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use super::options::SessionConfig;
use super::session::Session;
use crate::channel::{ChannelConfig, SessionChannel};
use crate::error::{DriverError, ProfileError, Result};
use crate::parse::{OutputParser, ParserChain};
use crate::profile::{CompiledProfile, DeviceProfile, ProfileRegistry};
use crate::transport::{SshConfig, SshTransport, Transport};

/// Builder for constructing sessions.
///
/// # Example
///
/// ```rust,no_run
/// use clisync::{AuthMethod, SessionBuilder, SshConfig};
///
/// # async fn example() -> Result<(), clisync::Error> {
/// let ssh = SshConfig::new("192.168.1.1", "admin", AuthMethod::password("secret"));
/// let mut session = SessionBuilder::new()
///     .profile("cisco_ios")
///     .secret("enable-secret")
///     .connect_ssh(&ssh)
///     .await?;
///
/// session.open().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SessionBuilder {
    profile_name: Option<String>,
    custom_profile: Option<DeviceProfile>,
    config: SessionConfig,
    parsers: ParserChain,
}

impl SessionBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a registered profile by name (e.g. "cisco_ios", "linux").
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.profile_name = Some(name.into());
        self
    }

    /// Use a profile that is not in the registry.
    pub fn custom_profile(mut self, profile: DeviceProfile) -> Self {
        self.custom_profile = Some(profile);
        self
    }

    /// Replace all session settings.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Default read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sleep between polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Multiplier applied to every delay.
    pub fn global_delay_factor(mut self, factor: f64) -> Self {
        self.config.global_delay_factor = factor;
        self
    }

    /// Prefer the smaller delay factor.
    pub fn fast_cli(mut self, fast: bool) -> Self {
        self.config.fast_cli = Some(fast);
        self
    }

    /// Base delay of timing reads.
    pub fn timing_delay(mut self, delay: Duration) -> Self {
        self.config.timing_delay = delay;
        self
    }

    /// Silence that ends a timing read.
    pub fn timing_quiet_period(mut self, period: Duration) -> Self {
        self.config.timing_quiet_period = period;
        self
    }

    /// Timing-read iteration ceiling.
    pub fn max_loops(mut self, loops: usize) -> Self {
        self.config.max_loops = loops;
        self
    }

    /// Force echo verification on or off for every call.
    pub fn global_cmd_verify(mut self, verify: bool) -> Self {
        self.config.global_cmd_verify = Some(verify);
        self
    }

    /// Waits for a missing echo before giving up.
    pub fn echo_retries(mut self, retries: usize) -> Self {
        self.config.echo_retries = retries;
        self
    }

    /// Maximum bytes held in the read buffer.
    pub fn buffer_limit(mut self, limit: usize) -> Self {
        self.config.buffer_limit = limit;
        self
    }

    /// Returns written while probing for the prompt.
    pub fn prompt_probe_attempts(mut self, attempts: usize) -> Self {
        self.config.prompt_probe_attempts = attempts;
        self
    }

    /// Enable secret for password-protected mode transitions.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Append an output parser; parsers are tried in the order added.
    pub fn parser(mut self, parser: Arc<dyn OutputParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    /// Build a session over an already connected transport.
    ///
    /// Resolves and compiles the profile; settings left unset take the
    /// profile's defaults. Call `open()` on the result before sending
    /// commands.
    pub fn build<T: Transport>(self, transport: T) -> Result<Session<T>> {
        let profile = if let Some(custom) = self.custom_profile {
            custom
        } else if let Some(name) = self.profile_name {
            ProfileRegistry::lookup(&name)?
        } else {
            return Err(ProfileError::InvalidProfile {
                name: String::new(),
                message: "profile must be specified".to_string(),
            }
            .into());
        };

        let mut config = self.config;
        config.validate().map_err(DriverError::InvalidConfig)?;
        config.fast_cli = config.fast_cli.or(profile.fast_cli);
        config.global_cmd_verify = config.global_cmd_verify.or(profile.global_cmd_verify);

        let channel_config = ChannelConfig {
            poll_interval: config.poll_interval,
            buffer_limit: config.buffer_limit,
            strip_ansi: profile.ansi_escape_codes,
        };
        let profile = Arc::new(CompiledProfile::compile(profile)?);
        log::debug!("built session for profile {}", profile.name());

        Ok(Session::new(
            SessionChannel::new(transport, channel_config),
            profile,
            config,
            self.parsers,
        ))
    }

    /// Connect over SSH and build a session on the resulting transport.
    pub async fn connect_ssh(self, ssh: &SshConfig) -> Result<Session<SshTransport>> {
        let transport = SshTransport::connect(ssh).await?;
        self.build(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mode;
    use crate::error::Error;
    use crate::testing::MockTransport;

    #[test]
    fn test_profile_required() {
        let err = SessionBuilder::new().build(MockTransport::new()).err().unwrap();
        assert!(matches!(err, Error::Profile(ProfileError::InvalidProfile { .. })));
    }

    #[test]
    fn test_unknown_profile() {
        let err = SessionBuilder::new()
            .profile("no_such_os")
            .build(MockTransport::new())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Profile(ProfileError::UnknownProfile { .. })));
    }

    #[test]
    fn test_profile_defaults_fill_unset_settings() {
        let session = SessionBuilder::new()
            .profile("arista_eos")
            .build(MockTransport::new())
            .unwrap();
        assert_eq!(session.config().fast_cli, Some(true));
        assert_eq!(session.mode(), Mode::Unprivileged);

        let session = SessionBuilder::new()
            .profile("arista_eos")
            .fast_cli(false)
            .build(MockTransport::new())
            .unwrap();
        assert_eq!(session.config().fast_cli, Some(false));
    }

    #[test]
    fn test_global_cmd_verify_from_profile() {
        let session = SessionBuilder::new()
            .profile("hp_comware")
            .build(MockTransport::new())
            .unwrap();
        assert_eq!(session.config().global_cmd_verify, Some(false));
    }

    #[test]
    fn test_rejects_unusable_delay_factor() {
        let err = SessionBuilder::new()
            .profile("cisco_ios")
            .global_delay_factor(-1.0)
            .build(MockTransport::new())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Driver(DriverError::InvalidConfig(_))));
    }
}
