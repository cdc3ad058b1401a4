//! Global profile registry for looking up device profiles by name.

use std::sync::RwLock;

use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;

use super::definition::DeviceProfile;
use super::vendors;
use crate::error::{ProfileError, Result};

/// Global profile registry.
static REGISTRY: Lazy<RwLock<ProfileRegistry>> = Lazy::new(|| RwLock::new(ProfileRegistry::with_builtin()));

/// Registry of device profiles, in registration order.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: IndexMap<String, DeviceProfile>,
}

impl ProfileRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in profiles.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for profile in vendors::builtin() {
            registry.profiles.insert(profile.name.clone(), profile);
        }
        registry
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<ProfileRegistry> {
        &REGISTRY
    }

    /// Clone a profile out of the global registry.
    pub fn lookup(name: &str) -> Result<DeviceProfile> {
        let registry = REGISTRY.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.get(name).cloned().ok_or_else(|| {
            ProfileError::UnknownProfile {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Validate and add a profile to the global registry.
    pub fn register_global(profile: DeviceProfile) -> Result<()> {
        let mut registry = REGISTRY.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.register(profile)
    }

    /// Validate and add a profile.
    pub fn register(&mut self, profile: DeviceProfile) -> Result<()> {
        if self.profiles.contains_key(&profile.name) {
            return Err(ProfileError::AlreadyRegistered {
                name: profile.name.clone(),
            }
            .into());
        }
        profile.validate()?;
        debug!("registered profile {}", profile.name);
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Get a profile by name.
    pub fn get(&self, name: &str) -> Option<&DeviceProfile> {
        self.profiles.get(name)
    }

    /// Check if a profile is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// List all registered profile names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_in_order() {
        let registry = ProfileRegistry::with_builtin();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "cisco_ios",
                "arista_eos",
                "hp_comware",
                "mellanox_mlnxos",
                "sixwind_os",
                "oneaccess_oneos",
                "f5_tmsh",
                "linux"
            ]
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ProfileRegistry::with_builtin();
        let err = registry.register(vendors::linux::profile()).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Profile(ProfileError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_register_validates() {
        let mut registry = ProfileRegistry::new();
        assert!(registry.register(DeviceProfile::new("")).is_err());
        assert!(registry.register(DeviceProfile::new("lab")).is_ok());
        assert!(registry.contains("lab"));
    }

    #[test]
    fn test_global_lookup() {
        let profile = ProfileRegistry::lookup("arista_eos").unwrap();
        assert_eq!(profile.name, "arista_eos");

        let err = ProfileRegistry::lookup("no_such_os").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Profile(ProfileError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn test_register_global() {
        let profile = DeviceProfile::new("registry_test_device");
        ProfileRegistry::register_global(profile).unwrap();
        assert!(ProfileRegistry::lookup("registry_test_device").is_ok());
    }
}
