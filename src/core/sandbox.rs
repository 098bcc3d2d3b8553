//! Branch-scoped skill sandboxes.
//!
//! On the main branch a skill is worked on under its own name. On any other
//! branch the remote copy is named `<branch>__<name>`, so several people can
//! each deploy their own variant of the same decomposed skill:
//!
//! ```text
//! $ git checkout master
//! $ wa-cli sandbox init billing       # download + decompose, commit waw/billing
//! $ git checkout -b topic
//! $ wa-cli sandbox push billing       # deploys topic__billing
//! $ wa-cli sandbox pull billing       # brings GUI edits back into waw/billing
//! $ git diff
//! ```

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::core::cache::CacheStore;
use crate::core::deploy::deploy_document;
use crate::core::resolver::SkillResolver;
use crate::core::skill::{SkillDocument, SkillRecord, strip_lineage};
use crate::error::{Result, WaError};
use crate::project::WAW_FOLDER;
use crate::service::{STATUS_AVAILABLE, SkillService, TERMINAL_STATUSES};
use crate::vcs::VersionControl;
use crate::workbench::Decomposer;

pub const PREFIX_SEPARATOR: &str = "__";

/// Default interval between readiness polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Names of a skill as seen from one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxIdentity {
    pub branch: String,
    pub base_name: String,
    pub prefix: String,
    pub sandbox_name: String,
}

impl SandboxIdentity {
    /// Derive the sandbox name for `requested_name` on `branch`.
    ///
    /// An already prefixed name is accepted and not prefixed twice.
    #[must_use]
    pub fn derive(branch: &str, main_branch: &str, requested_name: &str) -> Self {
        let prefix = if branch == main_branch {
            String::new()
        } else {
            format!("{branch}{PREFIX_SEPARATOR}")
        };
        let base_name = if prefix.is_empty() {
            requested_name
        } else {
            requested_name
                .strip_prefix(prefix.as_str())
                .unwrap_or(requested_name)
        }
        .to_string();
        Self {
            branch: branch.to_string(),
            sandbox_name: format!("{prefix}{base_name}"),
            base_name,
            prefix,
        }
    }

    #[must_use]
    pub fn is_main(&self) -> bool {
        self.prefix.is_empty()
    }

    /// `name` without this identity's branch prefix.
    #[must_use]
    pub fn strip_prefix<'a>(&self, name: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            return name;
        }
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    /// On the main branch, skill not decomposed locally yet.
    Uninitialized,
    /// On the main branch with a decomposed base skill.
    Main,
    /// On a feature branch; the prefixed remote copy may or may not exist.
    Sandboxed,
    /// The prefixed remote copy was deleted by this `Sandbox`.
    ///
    /// Only observed within one process. A later invocation starts in
    /// `Sandboxed` and finds out from the remote listing, where the missing
    /// sandbox resolves to `NotFound`.
    Deleted,
}

/// Sandbox operations for one skill on the current branch.
pub struct Sandbox<'a> {
    identity: SandboxIdentity,
    main_branch: String,
    state: SandboxState,
    service: &'a dyn SkillService,
    vcs: &'a dyn VersionControl,
    decomposer: &'a dyn Decomposer,
    cache: &'a CacheStore,
    poll_interval: Duration,
}

impl<'a> Sandbox<'a> {
    pub fn new(
        skill_name: &str,
        main_branch: &str,
        service: &'a dyn SkillService,
        vcs: &'a dyn VersionControl,
        decomposer: &'a dyn Decomposer,
        cache: &'a CacheStore,
    ) -> Result<Self> {
        let branch = vcs.current_branch()?;
        let identity = SandboxIdentity::derive(&branch, main_branch, skill_name);
        let state = if !identity.is_main() {
            SandboxState::Sandboxed
        } else if decomposer.is_decomposed(&identity.base_name) {
            SandboxState::Main
        } else {
            SandboxState::Uninitialized
        };
        debug!(
            branch = %identity.branch,
            base = %identity.base_name,
            sandbox = %identity.sandbox_name,
            ?state,
            "sandbox"
        );
        Ok(Self {
            identity,
            main_branch: main_branch.to_string(),
            state,
            service,
            vcs,
            decomposer,
            cache,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &SandboxIdentity {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> SandboxState {
        self.state
    }

    fn require_vcs(&self) -> Result<()> {
        if self.identity.branch.is_empty() {
            return Err(WaError::Precondition(
                "Your wa-cli project needs to be under git version control to create a sandbox."
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn require_branch(&self, must_be_main: bool) -> Result<()> {
        self.require_vcs()?;
        let on_main = self.identity.is_main();
        if must_be_main && !on_main {
            return Err(WaError::Precondition(format!(
                "This needs to run on the main git branch ({}).\n\
                 Create the branch for your sandbox with git checkout -b branch_name",
                self.main_branch
            )));
        }
        if !must_be_main && on_main {
            return Err(WaError::Precondition(
                "A sandbox cannot be pushed, pulled or deleted while on the main git branch.\n\
                 Create the branch for your sandbox with git checkout -b branch_name"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// In-process guard; see [`SandboxState::Deleted`].
    fn require_not_deleted(&self) -> Result<()> {
        if self.state == SandboxState::Deleted {
            return Err(WaError::Precondition(format!(
                "Sandbox {} has been deleted",
                self.identity.sandbox_name
            )));
        }
        Ok(())
    }

    fn require_decomposed(&self) -> Result<()> {
        let base = &self.identity.base_name;
        if !self.decomposer.is_decomposed(base) {
            return Err(WaError::Precondition(format!(
                "No folder named {base} in <project_root>/{WAW_FOLDER}"
            )));
        }
        Ok(())
    }

    fn require_committed_to_main(&self) -> Result<()> {
        let path = format!("{WAW_FOLDER}/{}", self.identity.base_name);
        if !self.vcs.path_exists_in(&self.main_branch, &path)? {
            return Err(WaError::Precondition(format!(
                "The skill does not exist in the main branch '{}'",
                self.main_branch
            )));
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<SkillRecord> {
        SkillResolver::new(self.service).resolve_unique(name)
    }

    /// Download the base skill and decompose it. Main branch only.
    pub fn init(&mut self) -> Result<()> {
        self.require_branch(true)?;
        let record = self.resolve(&self.identity.base_name)?;
        let artifact = self.cache.get_or_fetch(self.service, &record)?;
        self.decomposer.decompose(&artifact, &self.identity.base_name)?;
        info!(skill = %self.identity.base_name, "sandbox initialized");
        self.state = SandboxState::Main;
        Ok(())
    }

    /// Reassemble the decomposed base skill and deploy it as the sandbox.
    pub fn push(&mut self) -> Result<()> {
        self.require_branch(false)?;
        self.require_decomposed()?;
        self.require_committed_to_main()?;
        let mut document = self
            .decomposer
            .reassemble(&self.identity.base_name, &self.identity.sandbox_name)?;
        document.name.clone_from(&self.identity.sandbox_name);
        self.deploy_reassembled(document)?;
        info!(sandbox = %self.identity.sandbox_name, "sandbox pushed");
        self.state = SandboxState::Sandboxed;
        Ok(())
    }

    /// Reassemble and deploy the base skill itself. Main branch only.
    pub fn deploy(&mut self) -> Result<()> {
        self.require_branch(true)?;
        self.require_decomposed()?;
        let base = self.identity.base_name.clone();
        let document = self.decomposer.reassemble(&base, &base)?;
        self.deploy_reassembled(document)?;
        info!(skill = %base, "skill deployed");
        self.state = SandboxState::Main;
        Ok(())
    }

    /// Create or overwrite the remote skill; a refusal is a remote error.
    fn deploy_reassembled(&self, document: SkillDocument) -> Result<()> {
        let name = document.name.clone();
        if !deploy_document(self.service, document, |_| true)? {
            return Err(WaError::remote(
                "deploy_workspace",
                format!("service did not accept {name}"),
            ));
        }
        Ok(())
    }

    /// Overwrite the decomposed base skill with the remote sandbox contents.
    pub fn pull(&mut self) -> Result<()> {
        self.require_branch(false)?;
        self.require_not_deleted()?;
        let record = self.resolve(&self.identity.sandbox_name)?;
        let artifact = self.cache.get_or_fetch(self.service, &record)?;
        self.decomposer.decompose(&artifact, &self.identity.base_name)?;
        self.revert_metadata()?;
        info!(sandbox = %self.identity.sandbox_name, "sandbox pulled");
        Ok(())
    }

    /// Make the pulled files read as the un-prefixed skill again.
    fn revert_metadata(&self) -> Result<()> {
        let base = &self.identity.base_name;
        let mut meta = self.decomposer.load_meta(base)?;
        meta.name.clone_from(base);
        meta.description = strip_lineage(&meta.description, base).to_string();
        self.decomposer.save_meta(base, &meta)
    }

    /// Delete the remote sandbox. Local files are left alone.
    pub fn delete(&mut self) -> Result<()> {
        self.require_branch(false)?;
        self.require_not_deleted()?;
        let record = self.resolve(&self.identity.sandbox_name)?;
        if !self.service.delete(&record.id)? {
            return Err(WaError::remote(
                "delete_workspace",
                format!("service did not delete {}", record.label()),
            ));
        }
        info!(sandbox = %self.identity.sandbox_name, "sandbox deleted");
        self.state = SandboxState::Deleted;
        Ok(())
    }

    /// Block until the sandbox finishes training, fails, or `timeout` passes.
    pub fn wait_for_ready(&self, timeout: Duration) -> Result<()> {
        self.require_vcs()?;
        self.require_not_deleted()?;
        let record = self.resolve(&self.identity.sandbox_name)?;
        wait_until_available(self.service, &record, timeout, self.poll_interval)
    }
}

/// Poll `record`'s status every `interval` until it is `Available`.
pub fn wait_until_available(
    service: &dyn SkillService,
    record: &SkillRecord,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let started = Instant::now();
    loop {
        let status = service.status(&record.id)?;
        debug!(skill = %record.name, %status, "status poll");
        if status == STATUS_AVAILABLE {
            info!(skill = %record.name, waited = ?started.elapsed(), "skill available");
            return Ok(());
        }
        if TERMINAL_STATUSES.contains(&status.as_str()) {
            return Err(WaError::NotReady {
                name: record.name.clone(),
                status,
            });
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(WaError::Timeout {
                name: record.name.clone(),
                waited,
                last_status: status,
            });
        }
        thread::sleep(interval.min(timeout - waited));
    }
}
