//! Mode state machine.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};
use crate::profile::{CompiledMode, CompiledProfile};

/// CLI mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// User EXEC (`router>`).
    Unprivileged,
    /// Enable (`router#`).
    Privileged,
    /// Configuration (`router(config)#`).
    Configuration,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Unprivileged => write!(f, "unprivileged"),
            Mode::Privileged => write!(f, "privileged"),
            Mode::Configuration => write!(f, "configuration"),
        }
    }
}

/// Which way a transition goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// Send the target mode's enter command.
    Enter,
    /// Send the current mode's exit command.
    Exit,
}

/// One hop between adjacent modes.
#[derive(Debug, Clone)]
pub(crate) struct Transition<'a> {
    pub direction: Direction,
    pub to: Mode,
    pub mode: &'a CompiledMode,
}

impl Transition<'_> {
    /// Command that performs the hop.
    pub fn command(&self) -> &str {
        match self.direction {
            Direction::Enter => &self.mode.spec.enter_command,
            Direction::Exit => &self.mode.spec.exit_command,
        }
    }

    /// Pattern to read after the command, if the profile set one.
    pub fn pattern(&self) -> Option<&regex::bytes::Regex> {
        match self.direction {
            Direction::Enter => self.mode.enter.as_ref(),
            Direction::Exit => self.mode.exit.as_ref(),
        }
    }

    /// Password prompt pattern, for entering modes that may ask for one.
    pub fn password(&self) -> Option<&regex::bytes::Regex> {
        match self.direction {
            Direction::Enter => self.mode.password.as_ref(),
            Direction::Exit => None,
        }
    }
}

/// Tracks the current mode and plans transitions.
///
/// Classification is a pure function of the last observed prompt and the
/// profile's check strings. The mode graph is
/// `Unprivileged - Privileged - Configuration`, or
/// `Unprivileged - Configuration` for profiles without a privileged tier.
#[derive(Debug)]
pub struct ModeController {
    graph: HashMap<Mode, HashSet<Mode>>,
    current: Mode,
    last_prompt: String,
}

impl ModeController {
    /// Create a controller for `profile`.
    pub fn new(profile: &CompiledProfile) -> Self {
        Self {
            graph: Self::build_graph(profile),
            current: Mode::Unprivileged,
            last_prompt: String::new(),
        }
    }

    fn build_graph(profile: &CompiledProfile) -> HashMap<Mode, HashSet<Mode>> {
        let mut graph: HashMap<Mode, HashSet<Mode>> = HashMap::new();
        let mut link = |a: Mode, b: Mode| {
            graph.entry(a).or_default().insert(b);
            graph.entry(b).or_default().insert(a);
        };

        let tiered = profile.privileged.is_some();
        if tiered {
            link(Mode::Unprivileged, Mode::Privileged);
        }
        if profile.configuration.is_some() {
            if tiered {
                link(Mode::Privileged, Mode::Configuration);
            } else {
                // Without an enable tier the base mode reports as privileged.
                link(Mode::Privileged, Mode::Configuration);
                link(Mode::Unprivileged, Mode::Configuration);
            }
        }
        graph
    }

    /// Classify a prompt.
    pub fn classify(&self, profile: &CompiledProfile, prompt: &str) -> Mode {
        let prompt = profile.profile().clean_prompt(prompt);
        if profile
            .configuration
            .as_ref()
            .is_some_and(|config| config.spec.matches(&prompt))
        {
            return Mode::Configuration;
        }
        match &profile.privileged {
            None => Mode::Privileged,
            Some(privileged) if privileged.spec.matches(&prompt) => Mode::Privileged,
            Some(_) => Mode::Unprivileged,
        }
    }

    /// Record a freshly observed prompt and return the mode it shows.
    pub fn observe(&mut self, profile: &CompiledProfile, prompt: &str) -> Mode {
        self.current = self.classify(profile, prompt);
        self.last_prompt = prompt.to_string();
        self.current
    }

    /// Whether the last observed prompt satisfies `mode`'s check.
    ///
    /// The privileged check holds in configuration mode too (the prompt
    /// still carries the privileged marker), and always holds for profiles
    /// without a privileged tier.
    pub fn check(&self, profile: &CompiledProfile, mode: Mode) -> bool {
        let prompt = profile.profile().clean_prompt(&self.last_prompt);
        match mode {
            Mode::Configuration => profile
                .configuration
                .as_ref()
                .is_some_and(|config| config.spec.matches(&prompt)),
            Mode::Privileged => match &profile.privileged {
                None => true,
                Some(privileged) => privileged.spec.matches(&prompt),
            },
            Mode::Unprivileged => self.current == Mode::Unprivileged,
        }
    }

    /// Current mode as last observed.
    pub fn current(&self) -> Mode {
        self.current
    }

    /// Last observed prompt.
    pub fn last_prompt(&self) -> &str {
        &self.last_prompt
    }

    /// Shortest sequence of modes from `from` to `to`, both included.
    pub fn find_path(&self, from: Mode, to: Mode) -> Result<Vec<Mode>> {
        if from == to {
            return Ok(vec![from]);
        }

        let mut queue = VecDeque::from([from]);
        let mut parent: HashMap<Mode, Mode> = HashMap::new();
        let mut visited = HashSet::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;
                while let Some(&prev) = parent.get(&node) {
                    path.push(prev);
                    node = prev;
                }
                path.reverse();
                return Ok(path);
            }

            for &next in self.graph.get(&current).into_iter().flatten() {
                if visited.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        Err(DriverError::ModeTransition {
            mode: to.to_string(),
            attempts: 0,
            output: format!("no transition path from {from} mode"),
        }
        .into())
    }

    /// The hop between two adjacent modes.
    pub(crate) fn transition<'p>(
        &self,
        profile: &'p CompiledProfile,
        from: Mode,
        to: Mode,
    ) -> Option<Transition<'p>> {
        let spec = |mode: Mode| match mode {
            Mode::Unprivileged => None,
            Mode::Privileged => profile.privileged.as_ref(),
            Mode::Configuration => profile.configuration.as_ref(),
        };

        if !self.graph.get(&from)?.contains(&to) {
            return None;
        }
        if rank(to) > rank(from) {
            spec(to).map(|mode| Transition {
                direction: Direction::Enter,
                to,
                mode,
            })
        } else {
            spec(from).map(|mode| Transition {
                direction: Direction::Exit,
                to,
                mode,
            })
        }
    }
}

fn rank(mode: Mode) -> u8 {
    match mode {
        Mode::Unprivileged => 0,
        Mode::Privileged => 1,
        Mode::Configuration => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{DeviceProfile, ModeSpec, vendors};

    fn compiled(profile: DeviceProfile) -> CompiledProfile {
        CompiledProfile::compile(profile).unwrap()
    }

    #[test]
    fn test_classify_cisco() {
        let profile = compiled(vendors::cisco::profile());
        let modes = ModeController::new(&profile);

        assert_eq!(modes.classify(&profile, "router>"), Mode::Unprivileged);
        assert_eq!(modes.classify(&profile, "router#"), Mode::Privileged);
        assert_eq!(modes.classify(&profile, "router(config)#"), Mode::Configuration);
        assert_eq!(modes.classify(&profile, "router(config-if)#"), Mode::Configuration);
    }

    #[test]
    fn test_classify_ignores_session_marker() {
        let profile = compiled(vendors::arista::profile());
        let modes = ModeController::new(&profile);
        assert_eq!(modes.classify(&profile, "core01(s1)#"), Mode::Privileged);
        assert_eq!(modes.classify(&profile, "core01(s1)(config)#"), Mode::Configuration);
    }

    #[test]
    fn test_check_after_observe() {
        let profile = compiled(vendors::cisco::profile());
        let mut modes = ModeController::new(&profile);

        modes.observe(&profile, "router(config)#");
        assert!(modes.check(&profile, Mode::Configuration));
        assert!(modes.check(&profile, Mode::Privileged));
        assert!(!modes.check(&profile, Mode::Unprivileged));

        modes.observe(&profile, "router>");
        assert!(!modes.check(&profile, Mode::Privileged));
        assert!(modes.check(&profile, Mode::Unprivileged));
    }

    #[test]
    fn test_no_privileged_tier_always_privileged() {
        let profile = compiled(vendors::sixwind::profile());
        let mut modes = ModeController::new(&profile);
        modes.observe(&profile, "vrouter>");
        assert!(modes.check(&profile, Mode::Privileged));
        assert_eq!(modes.current(), Mode::Privileged);
    }

    #[test]
    fn test_find_path() {
        let profile = compiled(vendors::cisco::profile());
        let modes = ModeController::new(&profile);

        let path = modes
            .find_path(Mode::Unprivileged, Mode::Configuration)
            .unwrap();
        assert_eq!(
            path,
            vec![Mode::Unprivileged, Mode::Privileged, Mode::Configuration]
        );

        let path = modes
            .find_path(Mode::Configuration, Mode::Unprivileged)
            .unwrap();
        assert_eq!(
            path,
            vec![Mode::Configuration, Mode::Privileged, Mode::Unprivileged]
        );
    }

    #[test]
    fn test_direct_path_without_tier() {
        let profile = compiled(vendors::hp_comware::profile());
        let modes = ModeController::new(&profile);
        let path = modes
            .find_path(Mode::Unprivileged, Mode::Configuration)
            .unwrap();
        assert_eq!(path, vec![Mode::Unprivileged, Mode::Configuration]);
    }

    #[test]
    fn test_no_configuration_mode_has_no_path() {
        let profile = compiled(vendors::linux::profile());
        let modes = ModeController::new(&profile);
        assert!(modes.find_path(Mode::Privileged, Mode::Configuration).is_err());
    }

    #[test]
    fn test_transition_commands() {
        let profile = compiled(
            DeviceProfile::new("lab")
                .with_privileged(ModeSpec::new("enable", "disable", "#").with_password_prompt("ssword"))
                .with_configuration(ModeSpec::new("configure terminal", "end", ")#")),
        );
        let modes = ModeController::new(&profile);

        let up = modes
            .transition(&profile, Mode::Unprivileged, Mode::Privileged)
            .unwrap();
        assert_eq!(up.direction, Direction::Enter);
        assert_eq!(up.command(), "enable");
        assert!(up.password().is_some());

        let down = modes
            .transition(&profile, Mode::Configuration, Mode::Privileged)
            .unwrap();
        assert_eq!(down.direction, Direction::Exit);
        assert_eq!(down.command(), "end");
        assert!(down.password().is_none());

        assert!(
            modes
                .transition(&profile, Mode::Unprivileged, Mode::Configuration)
                .is_none()
        );
    }
}
