//! Version control queries used by the sandbox preconditions.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository};
use tracing::debug;

use crate::error::Result;

pub trait VersionControl {
    /// Checked-out branch, or empty when not under version control.
    fn current_branch(&self) -> Result<String>;

    /// Whether `path` is a non-empty directory in `branch`'s tip commit.
    fn path_exists_in(&self, branch: &str, path: &str) -> Result<bool>;
}

/// Branch information provided by a CI runner, which checks out a detached
/// HEAD in a shallow clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiEnvironment {
    pub pull_request_branch: Option<String>,
    pub branch: Option<String>,
    pub travis: bool,
}

impl CiEnvironment {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            pull_request_branch: std::env::var("TRAVIS_PULL_REQUEST_BRANCH").ok(),
            branch: std::env::var("TRAVIS_BRANCH").ok(),
            travis: std::env::var("TRAVIS").is_ok_and(|v| v == "true"),
        }
    }

    fn branch_override(&self) -> Option<String> {
        if let Some(pr) = self.pull_request_branch.as_deref().filter(|b| !b.is_empty()) {
            return Some(format!("PR_{pr}"));
        }
        self.branch.clone()
    }
}

/// git repository containing the project.
pub struct GitRepository {
    root: PathBuf,
    ci: CiEnvironment,
}

impl GitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_ci(root, CiEnvironment::from_env())
    }

    pub fn with_ci(root: impl Into<PathBuf>, ci: CiEnvironment) -> Self {
        Self {
            root: root.into(),
            ci,
        }
    }

    fn open(&self) -> Option<Repository> {
        Repository::discover(&self.root).ok()
    }
}

impl VersionControl for GitRepository {
    fn current_branch(&self) -> Result<String> {
        if let Some(branch) = self.ci.branch_override() {
            return Ok(branch);
        }
        let Some(repo) = self.open() else {
            return Ok(String::new());
        };
        let head = match repo.head() {
            Ok(head) => head,
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(String::new());
            }
            Err(err) => return Err(err.into()),
        };
        if !head.is_branch() {
            return Ok(String::new());
        }
        Ok(head.shorthand().unwrap_or_default().to_string())
    }

    fn path_exists_in(&self, branch: &str, path: &str) -> Result<bool> {
        if self.ci.travis {
            return Ok(true);
        }
        let Some(repo) = self.open() else {
            return Ok(false);
        };
        let revspec = format!("{branch}:{}", normalize(Path::new(path)));
        let Ok(object) = repo.revparse_single(&revspec) else {
            debug!(%revspec, "path not in branch");
            return Ok(false);
        };
        Ok(object.peel_to_tree().is_ok_and(|tree| !tree.is_empty()))
    }
}

fn normalize(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::tempdir;

    fn commit_skill(dir: &Path) -> (Repository, String) {
        let repo = Repository::init(dir).unwrap();
        fs::create_dir_all(dir.join("waw/billing")).unwrap();
        fs::write(dir.join("waw/billing/meta.json"), "{}").unwrap();
        let tree_id = {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("waw/billing/meta.json")).unwrap();
            index.write().unwrap();
            index.write_tree().unwrap()
        };
        {
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
                .unwrap();
        }
        let main = repo.head().unwrap().shorthand().unwrap().to_string();
        (repo, main)
    }

    #[test]
    fn not_a_repository_has_empty_branch() {
        let dir = tempdir().unwrap();
        let git = GitRepository::with_ci(dir.path(), CiEnvironment::default());
        assert_eq!(git.current_branch().unwrap(), "");
        assert!(!git.path_exists_in("master", "waw/billing").unwrap());
    }

    #[test]
    fn branch_and_committed_paths() {
        let dir = tempdir().unwrap();
        let (repo, main) = commit_skill(dir.path());
        let git = GitRepository::with_ci(dir.path(), CiEnvironment::default());
        assert_eq!(git.current_branch().unwrap(), main);

        let tip = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("topic", &tip, false).unwrap();
        repo.set_head("refs/heads/topic").unwrap();
        assert_eq!(git.current_branch().unwrap(), "topic");

        assert!(git.path_exists_in(&main, "waw/billing").unwrap());
        assert!(!git.path_exists_in(&main, "waw/support").unwrap());
        assert!(!git.path_exists_in("nonexistent", "waw/billing").unwrap());
    }

    #[test]
    fn ci_variables_override_checkout() {
        let dir = tempdir().unwrap();
        let pr = GitRepository::with_ci(
            dir.path(),
            CiEnvironment {
                pull_request_branch: Some("feature".into()),
                branch: Some("master".into()),
                travis: true,
            },
        );
        assert_eq!(pr.current_branch().unwrap(), "PR_feature");
        assert!(pr.path_exists_in("master", "waw/anything").unwrap());

        let push = GitRepository::with_ci(
            dir.path(),
            CiEnvironment {
                pull_request_branch: Some(String::new()),
                branch: Some("topic".into()),
                travis: true,
            },
        );
        assert_eq!(push.current_branch().unwrap(), "topic");
    }
}
