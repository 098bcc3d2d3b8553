//! Create-or-update of a skill document by name.

use tracing::info;

use crate::core::resolver::select_unique;
use crate::core::skill::{SkillDocument, SkillRecord};
use crate::error::{Result, WaError};
use crate::service::SkillService;

/// Deploy `document` under its own name.
///
/// With no skill of that name the document is created. With exactly one it
/// is updated in place, provided `confirm_overwrite` agrees. Several
/// same-named skills is an `Ambiguous` error.
pub fn deploy_document(
    service: &dyn SkillService,
    mut document: SkillDocument,
    confirm_overwrite: impl FnOnce(&SkillRecord) -> bool,
) -> Result<bool> {
    document.prepare_for_deploy();
    let existing = match select_unique(service.list("")?, &document.name) {
        Ok(record) => Some(record),
        Err(WaError::NotFound { .. }) => None,
        Err(err) => return Err(err),
    };

    if let Some(record) = existing {
        if !confirm_overwrite(&record) {
            return Err(WaError::Precondition(format!(
                "Skill {}-{} already exists; not overwritten",
                record.id, record.name
            )));
        }
        info!(id = %record.id, name = %record.name, "updating skill");
        document.id = Some(record.id);
        service.update(&document)
    } else {
        info!(name = %document.name, "creating skill");
        document.id = None;
        service.create(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fakes::FakeSkillService;

    #[test]
    fn creates_when_absent() {
        let service = FakeSkillService::new();
        let mut doc = SkillDocument::new("billing", "");
        doc.id = Some("stale".into());
        doc.updated = Some("m1".into());
        assert!(deploy_document(&service, doc, |_| false).unwrap());
        let (id, _) = service.skill_named("billing").unwrap();
        assert_ne!(id, "stale");
    }

    #[test]
    fn updates_when_confirmed() {
        let service = FakeSkillService::new();
        let id = service.insert(SkillDocument::new("billing", "old"), "m1");
        let doc = SkillDocument::new("billing", "new");
        assert!(deploy_document(&service, doc, |_| true).unwrap());
        assert_eq!(service.document(&id).unwrap().description, "new");
        assert_eq!(service.len(), 1);
    }

    #[test]
    fn refuses_overwrite_without_confirmation() {
        let service = FakeSkillService::new();
        service.insert(SkillDocument::new("billing", "old"), "m1");
        let err = deploy_document(&service, SkillDocument::new("billing", "new"), |_| false)
            .unwrap_err();
        assert!(matches!(err, WaError::Precondition(_)));
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        let service = FakeSkillService::new();
        service.insert(SkillDocument::new("billing", ""), "m1");
        service.insert(SkillDocument::new("billing", ""), "m1");
        let err = deploy_document(&service, SkillDocument::new("billing", ""), |_| true)
            .unwrap_err();
        assert!(matches!(err, WaError::Ambiguous { count: 2, .. }));
    }
}
