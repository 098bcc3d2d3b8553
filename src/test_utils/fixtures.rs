use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::cache::CacheStore;
use crate::core::skill::{SkillDocument, SkillRecord};
use crate::project::{InitOptions, Project, initialize};

/// An initialised wa-cli project in a temporary directory.
pub struct ProjectFixture {
    pub temp_dir: TempDir,
    pub project: Project,
}

impl ProjectFixture {
    /// Project on `main_branch` with `readonly` registered as write-protected.
    #[must_use]
    pub fn new(main_branch: &str, readonly: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let options = InitOptions {
            main_branch: main_branch.to_string(),
            src_apikey: readonly.to_string(),
            ..InitOptions::default()
        };
        let project = initialize(temp_dir.path(), &options).expect("Failed to init project");
        println!("[FIXTURE] Created project: {:?}", temp_dir.path());
        Self { temp_dir, project }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file below the project root.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.root().join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Store an export in `skills/` as if it had been downloaded.
    #[must_use]
    pub fn cache_skill(&self, id: &str, name: &str, marker: &str) -> PathBuf {
        let mut document = SkillDocument::new(name, format!("{name} skill"));
        document.id = Some(id.to_string());
        document.updated = Some(marker.to_string());
        let cache = CacheStore::new(self.project.skills_dir());
        let path = cache.artifact_path(&SkillRecord::new(id, name, marker));
        CacheStore::store(&path, &document).expect("Failed to store skill");
        path
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new("master", "")
    }
}
