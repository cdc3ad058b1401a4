//! Validated profile with its patterns compiled.

use regex::bytes::Regex;

use super::definition::DeviceProfile;
use super::mode_spec::ModeSpec;
use crate::channel::patterns;
use crate::error::{ProfileError, Result};

/// Compiled patterns of one [`ModeSpec`].
#[derive(Debug, Clone)]
pub(crate) struct CompiledMode {
    pub spec: ModeSpec,
    pub enter: Option<Regex>,
    pub exit: Option<Regex>,
    pub check: Option<Regex>,
    pub password: Option<Regex>,
}

/// A [`DeviceProfile`] that passed validation, with every pattern compiled.
///
/// Built once per session; all regex errors surface here as
/// [`ProfileError::InvalidProfile`] rather than mid-session.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    profile: DeviceProfile,
    pub(crate) privileged: Option<CompiledMode>,
    pub(crate) configuration: Option<CompiledMode>,
    pub(crate) any_prompt: Regex,
    pub(crate) paging: Option<Regex>,
    pub(crate) terminal_width: Option<Regex>,
    pub(crate) commit_expect: Option<Regex>,
    pub(crate) shell_enter: Option<Regex>,
    pub(crate) shell_exit: Option<Regex>,
}

impl CompiledProfile {
    /// Validate `profile` and compile its patterns.
    pub fn compile(profile: DeviceProfile) -> Result<Self> {
        profile.validate()?;

        let compile = |field: &str, source: Option<&String>| -> Result<Option<Regex>> {
            source
                .map(|s| Regex::new(s))
                .transpose()
                .map_err(|e| {
                    ProfileError::InvalidProfile {
                        name: profile.name.clone(),
                        message: format!("{}: {}", field, e),
                    }
                    .into()
                })
        };

        let compile_mode = |field: &str, spec: &ModeSpec| -> Result<CompiledMode> {
            Ok(CompiledMode {
                spec: spec.clone(),
                enter: compile(&format!("{field}.enter_pattern"), spec.enter_pattern.as_ref())?,
                exit: compile(&format!("{field}.exit_pattern"), spec.exit_pattern.as_ref())?,
                check: compile(&format!("{field}.check_pattern"), spec.check_pattern.as_ref())?,
                password: compile(
                    &format!("{field}.password_pattern"),
                    spec.password_pattern.as_ref(),
                )?,
            })
        };

        let privileged = if profile.has_privileged_tier {
            Some(compile_mode("privileged", &profile.privileged)?)
        } else {
            None
        };
        let configuration = profile
            .configuration
            .as_ref()
            .map(|spec| compile_mode("configuration", spec))
            .transpose()?;

        let any_prompt = patterns::terminator_at_end(&profile.terminators()).map_err(|e| {
            ProfileError::InvalidProfile {
                name: profile.name.clone(),
                message: format!("terminators: {}", e),
            }
        })?;
        let paging = compile(
            "paging.pattern",
            profile.paging.as_ref().and_then(|p| p.pattern.as_ref()),
        )?;
        let terminal_width = compile(
            "terminal_width.pattern",
            profile.terminal_width.as_ref().and_then(|p| p.pattern.as_ref()),
        )?;
        let commit_expect = compile(
            "commit.expect",
            profile.commit.as_ref().and_then(|c| c.expect.as_ref()),
        )?;

        let shell = profile.system_shell.as_ref();
        let shell_enter = compile("system_shell.enter_pattern", shell.map(|s| &s.enter_pattern))?;
        let shell_exit = compile("system_shell.exit_pattern", shell.map(|s| &s.exit_pattern))?;

        Ok(Self {
            profile,
            privileged,
            configuration,
            any_prompt,
            paging,
            terminal_width,
            commit_expect,
            shell_enter,
            shell_exit,
        })
    }

    /// The source profile.
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Profile name.
    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::vendors;

    #[test]
    fn test_builtin_profiles_compile() {
        for profile in vendors::builtin() {
            let name = profile.name.clone();
            assert!(CompiledProfile::compile(profile).is_ok(), "{name} failed to compile");
        }
    }

    #[test]
    fn test_bad_regex_is_invalid_profile() {
        let profile = DeviceProfile::new("bad")
            .with_configuration(ModeSpec::new("conf t", "end", ")#").with_enter_pattern("(unclosed"));
        let err = CompiledProfile::compile(profile).unwrap_err();
        assert!(err.to_string().contains("configuration.enter_pattern"));
    }

    #[test]
    fn test_no_privileged_tier_compiles_none() {
        let compiled = CompiledProfile::compile(vendors::sixwind::profile()).unwrap();
        assert!(compiled.privileged.is_none());
        assert!(compiled.configuration.is_some());
    }
}
