//! In-memory collaborators for exercising the core without a network,
//! a git checkout or the toolkit scripts.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;

use crate::core::cache::CachedArtifact;
use crate::core::resolver::matches_pattern;
use crate::core::skill::{SkillDocument, SkillRecord, with_lineage};
use crate::error::{Result, WaError};
use crate::service::SkillService;
use crate::vcs::VersionControl;
use crate::workbench::{Decomposer, SkillMeta};

struct StoredSkill {
    document: SkillDocument,
    marker: String,
}

/// Skill service backed by a map, with call counters and injectable
/// failures.
#[derive(Default)]
pub struct FakeSkillService {
    skills: RefCell<BTreeMap<String, StoredSkill>>,
    statuses: RefCell<BTreeMap<String, VecDeque<String>>>,
    failing: RefCell<BTreeSet<String>>,
    rejecting_writes: Cell<bool>,
    next_id: Cell<usize>,
    pub gets: Cell<usize>,
    pub status_calls: Cell<usize>,
}

impl FakeSkillService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        format!("ws-{id}")
    }

    /// Add a skill with the given `updated` marker; returns its id.
    pub fn insert(&self, mut document: SkillDocument, marker: &str) -> String {
        let id = self.allocate_id();
        document.id = Some(id.clone());
        document.updated = Some(marker.to_string());
        self.skills.borrow_mut().insert(
            id.clone(),
            StoredSkill {
                document,
                marker: marker.to_string(),
            },
        );
        id
    }

    /// Statuses returned by successive `status` calls; the last one repeats.
    pub fn script_status(&self, id: &str, statuses: &[&str]) {
        self.statuses.borrow_mut().insert(
            id.to_string(),
            statuses.iter().map(|s| (*s).to_string()).collect(),
        );
    }

    /// Make every remote call touching a skill with this name fail.
    pub fn fail_on(&self, name: &str) {
        self.failing.borrow_mut().insert(name.to_string());
    }

    /// Answer `create`/`update` with `Ok(false)`, as a service that
    /// refuses the document without raising an error.
    pub fn reject_writes(&self) {
        self.rejecting_writes.set(true);
    }

    fn check(&self, action: &str, name: &str) -> Result<()> {
        if self.failing.borrow().contains(name) {
            return Err(WaError::remote(action, format!("injected failure for {name}")));
        }
        Ok(())
    }

    #[must_use]
    pub fn skill_named(&self, name: &str) -> Option<(String, SkillDocument)> {
        self.skills
            .borrow()
            .iter()
            .find(|(_, skill)| skill.document.name == name)
            .map(|(id, skill)| (id.clone(), skill.document.clone()))
    }

    #[must_use]
    pub fn document(&self, id: &str) -> Option<SkillDocument> {
        self.skills.borrow().get(id).map(|s| s.document.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SkillService for FakeSkillService {
    fn list(&self, pattern: &str) -> Result<Vec<SkillRecord>> {
        Ok(self
            .skills
            .borrow()
            .iter()
            .filter(|(_, skill)| matches_pattern(&skill.document.name, pattern))
            .map(|(id, skill)| SkillRecord::new(id.clone(), skill.document.name.clone(), skill.marker.clone()))
            .collect())
    }

    fn get(&self, id: &str) -> Result<SkillDocument> {
        self.gets.set(self.gets.get() + 1);
        let skills = self.skills.borrow();
        let skill = skills
            .get(id)
            .ok_or_else(|| WaError::remote("get_workspace", format!("no skill {id}")))?;
        self.check("get_workspace", &skill.document.name)?;
        Ok(skill.document.clone())
    }

    fn status(&self, id: &str) -> Result<String> {
        self.status_calls.set(self.status_calls.get() + 1);
        let mut statuses = self.statuses.borrow_mut();
        let Some(queue) = statuses.get_mut(id) else {
            return Ok("Available".to_string());
        };
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap_or_default())
        } else {
            Ok(queue.front().cloned().unwrap_or_default())
        }
    }

    fn create(&self, document: &SkillDocument) -> Result<bool> {
        self.check("create_workspace", &document.name)?;
        if self.rejecting_writes.get() {
            return Ok(false);
        }
        let marker = format!("created-{}", self.next_id.get() + 1);
        self.insert(document.clone(), &marker);
        Ok(true)
    }

    fn update(&self, document: &SkillDocument) -> Result<bool> {
        self.check("update_workspace", &document.name)?;
        if self.rejecting_writes.get() {
            return Ok(false);
        }
        let id = document
            .id
            .clone()
            .ok_or_else(|| WaError::remote("update_workspace", "missing id"))?;
        let mut skills = self.skills.borrow_mut();
        let Some(stored) = skills.get_mut(&id) else {
            return Ok(false);
        };
        stored.document = document.clone();
        stored.marker = format!("{}+", stored.marker);
        stored.document.updated = Some(stored.marker.clone());
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let name = self.document(id).map(|d| d.name).unwrap_or_default();
        self.check("delete_workspace", &name)?;
        Ok(self.skills.borrow_mut().remove(id).is_some())
    }
}

/// Version control with a fixed branch and a set of committed paths.
pub struct FakeVcs {
    pub branch: String,
    committed: BTreeSet<(String, String)>,
}

impl FakeVcs {
    pub fn on(branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            committed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_committed(mut self, branch: &str, path: &str) -> Self {
        self.committed.insert((branch.to_string(), path.to_string()));
        self
    }
}

impl VersionControl for FakeVcs {
    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn path_exists_in(&self, branch: &str, path: &str) -> Result<bool> {
        Ok(self.committed.contains(&(branch.to_string(), path.to_string())))
    }
}

/// Decomposer that keeps decomposed skills as their meta only.
#[derive(Default)]
pub struct FakeDecomposer {
    pub folders: RefCell<BTreeMap<String, SkillMeta>>,
    pub decomposed_from: RefCell<Vec<(PathBuf, String)>>,
}

impl FakeDecomposer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_folder(self, name: &str, description: &str) -> Self {
        self.folders.borrow_mut().insert(
            name.to_string(),
            SkillMeta {
                description: description.to_string(),
                language: "en".to_string(),
                name: name.to_string(),
                ..SkillMeta::default()
            },
        );
        self
    }
}

impl Decomposer for FakeDecomposer {
    fn decompose(&self, artifact: &CachedArtifact, target_name: &str) -> Result<PathBuf> {
        self.decomposed_from
            .borrow_mut()
            .push((artifact.path.clone(), target_name.to_string()));
        self.folders
            .borrow_mut()
            .insert(target_name.to_string(), SkillMeta::from_document(&artifact.document));
        Ok(PathBuf::from("waw").join(target_name))
    }

    fn reassemble(&self, source_name: &str, target_name: &str) -> Result<SkillDocument> {
        let meta = self.load_meta(source_name)?;
        let description = if source_name == target_name {
            meta.description
        } else {
            with_lineage(&meta.description, source_name)
        };
        let mut document = SkillDocument::new(target_name, description);
        document.language = Some(meta.language);
        Ok(document)
    }

    fn is_decomposed(&self, name: &str) -> bool {
        self.folders.borrow().contains_key(name)
    }

    fn load_meta(&self, name: &str) -> Result<SkillMeta> {
        self.folders
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| WaError::Precondition(format!("no meta for {name}")))
    }

    fn save_meta(&self, name: &str, meta: &SkillMeta) -> Result<()> {
        self.folders.borrow_mut().insert(name.to_string(), meta.clone());
        Ok(())
    }
}
