use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::core::cache::CacheStore;
use crate::core::readonly::{Capability, ReadonlyGuard};
use crate::error::{Result, WaError};
use crate::project::Project;
use crate::service::{WatsonService, WatsonServiceConfig};
use crate::testing::TestingTool;
use crate::vcs::GitRepository;
use crate::workbench::WorkbenchDecomposer;

/// Everything a command needs, resolved once at startup.
pub struct AppContext {
    pub project: Project,
    pub config: Config,
    pub main_branch: String,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let project = Project::discover(&cwd)?;
        let mut config = Config::load(cli.config.as_deref(), &project.state_dir())?;
        if let Some(apikey) = &cli.apikey {
            config.service.apikey.clone_from(apikey);
        }
        if let Some(url) = &cli.url {
            config.service.url.clone_from(url);
        }
        Self::new(project, config, cli.output_format(), cli.verbose)
    }

    pub fn new(
        project: Project,
        config: Config,
        output_format: OutputFormat,
        verbosity: u8,
    ) -> Result<Self> {
        let main_branch = project.main_branch()?;
        Ok(Self {
            project,
            config,
            main_branch,
            output_format,
            verbosity,
        })
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.output_format == OutputFormat::Json
    }

    #[must_use]
    pub fn cache(&self) -> CacheStore {
        CacheStore::new(self.project.skills_dir())
    }

    #[must_use]
    pub fn guard(&self) -> ReadonlyGuard {
        ReadonlyGuard::new(self.project.readonly_registry_path())
    }

    /// Refuse to go on if the target service is write-protected.
    pub fn authorize_mutation(&self) -> Result<()> {
        self.guard()
            .authorize(Capability::Mutates, Some(&self.config.service.apikey))
    }

    /// Service that commands act on (`WA_APIKEY`/`WA_URL`).
    pub fn target_service(&self) -> Result<WatsonService> {
        let service = &self.config.service;
        WatsonService::new(&WatsonServiceConfig {
            apikey: service.apikey.clone(),
            url: service.url.clone(),
            api_version: service.api_version.clone(),
            timeout_secs: service.timeout_secs,
        })
    }

    /// Service skills are cloned from (`WA_APIKEY_SRC`/`WA_URL_SRC`), unless
    /// given explicitly.
    pub fn source_service(&self, apikey: Option<&str>, url: Option<&str>) -> Result<WatsonService> {
        let service = &self.config.service;
        let apikey = apikey.unwrap_or(&service.src_apikey);
        let url = url.unwrap_or(&service.src_url);
        if apikey.is_empty() || url.is_empty() {
            return Err(WaError::MissingConfig(
                "WA_APIKEY_SRC and WA_URL_SRC are required to clone skills".to_string(),
            ));
        }
        WatsonService::new(&WatsonServiceConfig {
            apikey: apikey.to_string(),
            url: url.to_string(),
            api_version: service.api_version.clone(),
            timeout_secs: service.timeout_secs,
        })
    }

    #[must_use]
    pub fn vcs(&self) -> GitRepository {
        GitRepository::new(self.project.root())
    }

    pub fn decomposer(&self) -> Result<WorkbenchDecomposer> {
        Ok(WorkbenchDecomposer::new(
            self.project.waw_dir(),
            self.config.waw_path()?,
            self.python()?,
        ))
    }

    pub fn testing_tool(&self) -> Result<TestingTool> {
        Ok(TestingTool::new(
            self.config.test_tool_path()?,
            self.python()?,
            self.config.service.apikey.clone(),
            self.config.service.url.clone(),
        ))
    }

    /// Interpreter for the toolkit scripts, looked up on `PATH`.
    pub fn python(&self) -> Result<PathBuf> {
        let python = &self.config.tools.python;
        which::which(python).map_err(|err| {
            WaError::MissingConfig(format!("python interpreter {python} ({err}); set WA_PYTHON"))
        })
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.sandbox.poll_interval_secs)
    }

    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.config.sandbox.ready_timeout_secs)
    }
}
