//! Write protection for services that must never be modified.
//!
//! `init` records the source apikey used for cloning in
//! `.wa-cli/readonly_services.txt`. Every command that mutates a service
//! declares [`Capability::Mutates`] and is checked here before it touches
//! anything.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, WaError};

pub const READONLY_REGISTRY_FILE: &str = "readonly_services.txt";

/// What an entry point is allowed to do to the service it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadOnly,
    Mutates,
}

/// Credentials marked read-only, one per line.
#[derive(Debug, Clone)]
pub struct ReadonlyRegistry {
    path: PathBuf,
    entries: Vec<String>,
}

impl ReadonlyRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(WaError::MissingConfig(format!(
                "{} is required for this operation",
                path.display()
            )));
        }
        let entries = fs::read_to_string(path)?
            .lines()
            .map(str::to_string)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Whether `credential` appears inside any registry line.
    ///
    /// Substring match: a credential that is a fragment of a registered one
    /// is also treated as protected.
    #[must_use]
    pub fn contains(&self, credential: &str) -> bool {
        if credential.is_empty() {
            return false;
        }
        self.entries.iter().any(|line| line.contains(credential))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Pre-flight check run at the start of every mutating entry point.
#[derive(Debug, Clone)]
pub struct ReadonlyGuard {
    registry_path: PathBuf,
}

impl ReadonlyGuard {
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
        }
    }

    /// Fail with `ReadOnly` if `capability` mutates and `credential` is
    /// registered. Reads only the registry file.
    pub fn authorize(&self, capability: Capability, credential: Option<&str>) -> Result<()> {
        if capability == Capability::ReadOnly {
            return Ok(());
        }
        let Some(credential) = credential.filter(|c| !c.is_empty()) else {
            return Ok(());
        };
        let registry = ReadonlyRegistry::load(&self.registry_path)?;
        if registry.contains(credential) {
            warn!(registry = %registry.path().display(), "refusing to modify write-protected service");
            return Err(WaError::ReadOnly {
                credential: credential.to_string(),
                registry: self.registry_path.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn guard_with(contents: &str) -> (tempfile::TempDir, ReadonlyGuard) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(READONLY_REGISTRY_FILE);
        fs::write(&path, contents).unwrap();
        (dir, ReadonlyGuard::new(path))
    }

    #[test]
    fn registered_credential_is_denied() {
        let (_dir, guard) = guard_with("prod-key\nother-key");
        let err = guard
            .authorize(Capability::Mutates, Some("prod-key"))
            .unwrap_err();
        assert!(matches!(err, WaError::ReadOnly { .. }));
    }

    #[test]
    fn unregistered_credential_passes() {
        let (_dir, guard) = guard_with("prod-key");
        guard.authorize(Capability::Mutates, Some("dev-key")).unwrap();
    }

    #[test]
    fn fragment_of_registered_credential_is_denied() {
        let (_dir, guard) = guard_with("prod-key-123");
        assert!(guard.authorize(Capability::Mutates, Some("key-1")).is_err());
    }

    #[test]
    fn missing_registry_is_configuration_error() {
        let dir = tempdir().unwrap();
        let guard = ReadonlyGuard::new(dir.path().join(READONLY_REGISTRY_FILE));
        let err = guard.authorize(Capability::Mutates, Some("k")).unwrap_err();
        assert!(matches!(err, WaError::MissingConfig(_)));
    }

    #[test]
    fn no_credential_or_read_only_skips_registry() {
        let dir = tempdir().unwrap();
        let guard = ReadonlyGuard::new(dir.path().join(READONLY_REGISTRY_FILE));
        guard.authorize(Capability::Mutates, None).unwrap();
        guard.authorize(Capability::Mutates, Some("")).unwrap();
        guard.authorize(Capability::ReadOnly, Some("k")).unwrap();
    }
}
