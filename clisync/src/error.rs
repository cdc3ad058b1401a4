//! Error types for clisync.
//!
//! Errors are layered the same way the session is: transport, channel
//! (buffered reads), driver (prompt/mode/command protocol) and profile.
//! Every failure kind a caller may want to branch on is its own variant.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for clisync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel read/write errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session protocol errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Device profile errors
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl Error {
    /// Whether retrying the operation (e.g. with a larger timeout) can succeed.
    ///
    /// Only read timeouts qualify. Closed channels, failed mode transitions
    /// and missing echoes indicate a broken or desynchronized session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::ReadTimeout { .. }))
    }

    /// Output accumulated before the failure, if the error carries any.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Error::Channel(ChannelError::ReadTimeout { partial, .. })
            | Error::Channel(ChannelError::Closed { partial })
            | Error::Driver(DriverError::CommandEcho { partial, .. }) => Some(partial),
            Error::Driver(DriverError::PromptDetection { output })
            | Error::Driver(DriverError::ModeTransition { output, .. })
            | Error::Driver(DriverError::CommitFailed { output })
            | Error::Driver(DriverError::ConfigCommandFailed { output, .. }) => Some(output),
            _ => None,
        }
    }

    /// Whether the underlying channel is gone.
    pub fn is_channel_closed(&self) -> bool {
        matches!(
            self,
            Error::Channel(ChannelError::Closed { .. })
                | Error::Transport(TransportError::Disconnected)
        )
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host not present in known_hosts while running in strict mode
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (buffered reads and pattern waits).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// A bounded wait expired before the pattern appeared.
    #[error("Pattern {pattern:?} not found within {timeout:?}")]
    ReadTimeout {
        pattern: String,
        timeout: Duration,
        /// Everything accumulated in the session buffer so far.
        partial: String,
    },

    /// The channel reported closed or broken mid-operation.
    #[error("Channel closed")]
    Closed { partial: String },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (prompt detection, modes, command protocol).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Session not prepared
    #[error("Session not open - call open() first")]
    NotOpen,

    /// Session already prepared
    #[error("Session already open")]
    AlreadyOpen,

    /// Session settings out of range.
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// No prompt terminator found in the probed output.
    #[error("Unable to detect base prompt from output: {output:?}")]
    PromptDetection { output: String },

    /// A mode check did not hold after attempting a transition.
    #[error("Failed to reach {mode} mode after {attempts} attempt(s)")]
    ModeTransition {
        mode: String,
        attempts: usize,
        output: String,
    },

    /// The device never echoed the command back.
    #[error("Command {command:?} was not echoed after {attempts} attempt(s)")]
    CommandEcho {
        command: String,
        attempts: usize,
        partial: String,
    },

    /// A commit produced one of the profile's error markers.
    #[error("Commit failed: {output}")]
    CommitFailed { output: String },

    /// A configuration line matched the caller's error pattern.
    #[error("Configuration command {command:?} failed: {output}")]
    ConfigCommandFailed { command: String, output: String },

    /// The profile does not describe this operation.
    #[error("Operation '{operation}' not supported by profile '{profile}'")]
    UnsupportedOperation { operation: String, profile: String },
}

/// Device profile errors.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Invalid profile definition
    #[error("Invalid profile '{name}': {message}")]
    InvalidProfile { name: String, message: String },

    /// No profile registered under that name
    #[error("Unknown profile '{name}'")]
    UnknownProfile { name: String },

    /// A profile with that name already exists
    #[error("Profile '{name}' already registered")]
    AlreadyRegistered { name: String },
}

/// Result type alias using clisync's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_are_recoverable() {
        let timeout: Error = ChannelError::ReadTimeout {
            pattern: "router#".into(),
            timeout: Duration::from_secs(1),
            partial: "show ver".into(),
        }
        .into();
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.partial_output(), Some("show ver"));

        let closed: Error = ChannelError::Closed {
            partial: String::new(),
        }
        .into();
        assert!(!closed.is_recoverable());
        assert!(closed.is_channel_closed());

        let echo: Error = DriverError::CommandEcho {
            command: "show clock".into(),
            attempts: 3,
            partial: "sh".into(),
        }
        .into();
        assert!(!echo.is_recoverable());
        assert_eq!(echo.partial_output(), Some("sh"));
    }

    #[test]
    fn test_mode_transition_message() {
        let err: Error = DriverError::ModeTransition {
            mode: "configuration".into(),
            attempts: 12,
            output: "router(config-if)#".into(),
        }
        .into();
        assert!(err.to_string().contains("configuration"));
        assert!(err.to_string().contains("12"));
    }
}
