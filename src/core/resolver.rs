//! Skill name resolution.
//!
//! Names are user-chosen and not unique on the service side, so anything
//! that needs an id goes through [`SkillResolver::resolve_unique`], which
//! refuses to guess.

use glob::Pattern;
use tracing::debug;

use crate::core::skill::SkillRecord;
use crate::error::{Result, WaError};
use crate::service::SkillService;

/// Shell-glob match of a skill name. Empty pattern and `*` match everything;
/// a malformed pattern only matches itself literally.
#[must_use]
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }
    Pattern::new(pattern).map_or_else(|_| name == pattern, |glob| glob.matches(name))
}

/// Pick the single record named exactly `name`.
pub fn select_unique(records: Vec<SkillRecord>, name: &str) -> Result<SkillRecord> {
    let mut matching: Vec<SkillRecord> = records
        .into_iter()
        .filter(|record| record.name == name)
        .collect();
    match matching.len() {
        0 => Err(WaError::NotFound {
            name: name.to_string(),
        }),
        1 => Ok(matching.remove(0)),
        count => Err(WaError::Ambiguous {
            name: name.to_string(),
            count,
        }),
    }
}

pub struct SkillResolver<'a> {
    service: &'a dyn SkillService,
}

impl<'a> SkillResolver<'a> {
    pub fn new(service: &'a dyn SkillService) -> Self {
        Self { service }
    }

    /// All skills whose name matches `pattern`.
    pub fn resolve(&self, pattern: &str) -> Result<Vec<SkillRecord>> {
        self.service.list(pattern)
    }

    /// The one skill named exactly `name`.
    pub fn resolve_unique(&self, name: &str) -> Result<SkillRecord> {
        let record = select_unique(self.service.list("")?, name)?;
        debug!(name, id = %record.id, "resolved skill");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(names: &[&str]) -> Vec<SkillRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| SkillRecord::new(i.to_string(), *name, "2024-01-01T00:00:00Z"))
            .collect()
    }

    #[test]
    fn glob_matching() {
        assert!(matches_pattern("billing", ""));
        assert!(matches_pattern("billing", "*"));
        assert!(matches_pattern("topic__billing", "*__billing"));
        assert!(matches_pattern("billing", "bill?ng"));
        assert!(!matches_pattern("support", "bill*"));
        assert!(matches_pattern("[oops", "[oops"));
    }

    #[test]
    fn unique_match_is_returned() {
        let found = select_unique(records(&["foo", "bar"]), "foo").unwrap();
        assert_eq!(found.id, "0");
    }

    #[test]
    fn zero_matches_is_not_found() {
        let err = select_unique(records(&["bar"]), "foo").unwrap_err();
        assert!(matches!(err, WaError::NotFound { .. }));
    }

    #[test]
    fn several_matches_are_ambiguous() {
        let err = select_unique(records(&["foo", "foo", "bar"]), "foo").unwrap_err();
        assert!(matches!(err, WaError::Ambiguous { count: 2, .. }));
    }

    #[test]
    fn exact_match_ignores_glob_characters() {
        let err = select_unique(records(&["foo"]), "f*").unwrap_err();
        assert!(matches!(err, WaError::NotFound { .. }));
    }
}
