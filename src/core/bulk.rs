//! Service-wide operations: delete, download or clone every skill.
//!
//! A failure on one skill is logged and recorded in the report; the batch
//! carries on with the next one.

use serde::Serialize;
use tracing::{info, warn};

use crate::core::cache::CacheStore;
use crate::core::skill::SkillRecord;
use crate::error::{Result, WaError};
use crate::service::SkillService;

/// A skill that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub skill: String,
    pub error: String,
}

/// Outcome of a batch operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, skill: &SkillRecord, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.succeeded.push(skill.label()),
            Err(err) => {
                warn!(skill = %skill.label(), error = %err, "batch item failed");
                self.failed.push(BatchFailure {
                    skill: skill.label(),
                    error: err.to_string(),
                });
            }
        }
    }
}

/// Delete every skill in the service.
pub fn delete_all(service: &dyn SkillService) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for skill in service.list("")? {
        info!(skill = %skill.label(), "deleting skill");
        let outcome = service.delete(&skill.id).and_then(|deleted| {
            if deleted {
                Ok(())
            } else {
                Err(WaError::remote("delete_workspace", "skill was not deleted"))
            }
        });
        report.record(&skill, outcome);
    }
    Ok(report)
}

/// Fetch every skill accepted by `filter` into the cache.
pub fn download_all(
    service: &dyn SkillService,
    cache: &CacheStore,
    mut filter: impl FnMut(&SkillRecord) -> bool,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for skill in service.list("")? {
        if !filter(&skill) {
            report.skipped.push(skill.label());
            continue;
        }
        let outcome = cache.get_or_fetch(service, &skill).map(|artifact| {
            info!(skill = %skill.label(), path = %artifact.path.display(), "downloaded skill");
        });
        report.record(&skill, outcome);
    }
    Ok(report)
}

/// Copy every skill accepted by `filter` from `source` into `target`.
///
/// Copies are always created, never merged into a same-named target skill.
pub fn clone_all(
    source: &dyn SkillService,
    target: &dyn SkillService,
    cache: &CacheStore,
    mut filter: impl FnMut(&SkillRecord) -> bool,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for skill in source.list("")? {
        if !filter(&skill) {
            report.skipped.push(skill.label());
            continue;
        }
        let outcome = clone_one(source, target, cache, &skill);
        report.record(&skill, outcome);
    }
    Ok(report)
}

fn clone_one(
    source: &dyn SkillService,
    target: &dyn SkillService,
    cache: &CacheStore,
    skill: &SkillRecord,
) -> Result<()> {
    let mut document = cache.get_or_fetch(source, skill)?.document;
    document.description = format!(
        "{} - Cloned from {}-{}",
        document.description, skill.id, skill.name
    );
    document.prepare_for_deploy();
    document.id = None;
    if !target.create(&document)? {
        return Err(WaError::remote("create_workspace", "skill was not created"));
    }
    info!(skill = %skill.label(), "cloned skill");
    Ok(())
}
