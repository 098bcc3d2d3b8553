use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaError};
use crate::service::watson::DEFAULT_API_VERSION;

/// Name of the config file inside `.wa-cli/`.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl Config {
    /// Load `.wa-cli/config.toml` (or the explicit path / `WA_CLI_CONFIG`),
    /// then apply environment overrides.
    pub fn load(explicit_path: Option<&Path>, state_dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        let path = explicit_path
            .map(PathBuf::from)
            .or_else(|| env_string("WA_CLI_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| state_dir.join(CONFIG_FILE));

        if let Some(patch) = Self::load_patch(&path)? {
            config.merge_patch(patch);
        }

        config.apply_env_overrides(env_string)?;

        Ok(config)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| WaError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| WaError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.service {
            self.service.merge(patch);
        }
        if let Some(patch) = patch.tools {
            self.tools.merge(patch);
        }
        if let Some(patch) = patch.sandbox {
            self.sandbox.merge(patch);
        }
    }

    /// Apply `WA_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(value) = lookup("WA_APIKEY") {
            self.service.apikey = value;
        }
        if let Some(value) = lookup("WA_URL") {
            self.service.url = value;
        }
        if let Some(value) = lookup("WA_APIKEY_SRC") {
            self.service.src_apikey = value;
        }
        if let Some(value) = lookup("WA_URL_SRC") {
            self.service.src_url = value;
        }
        if let Some(value) = lookup("WA_API_VERSION") {
            self.service.api_version = value;
        }
        if let Some(value) = parse_u64(&lookup, "WA_TIMEOUT_SECS")? {
            self.service.timeout_secs = value;
        }

        if let Some(value) = lookup("WAW_PATH") {
            self.tools.waw_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("WA_TEST_TOOL_PATH") {
            self.tools.test_tool_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("WA_PYTHON") {
            self.tools.python = value;
        }

        if let Some(value) = parse_u64(&lookup, "WA_POLL_INTERVAL_SECS")? {
            self.sandbox.poll_interval_secs = value;
        }
        if let Some(value) = parse_u64(&lookup, "WA_READY_TIMEOUT_SECS")? {
            self.sandbox.ready_timeout_secs = value;
        }

        Ok(())
    }

    /// Toolkit checkout used to decompose and reassemble skills.
    pub fn waw_path(&self) -> Result<&Path> {
        self.tools.waw_path.as_deref().ok_or_else(|| {
            WaError::MissingConfig("WAW_PATH (checkout of the workbench toolkit)".to_string())
        })
    }

    /// Checkout of the testing tool.
    pub fn test_tool_path(&self) -> Result<&Path> {
        self.tools.test_tool_path.as_deref().ok_or_else(|| {
            WaError::MissingConfig("WA_TEST_TOOL_PATH (checkout of the testing tool)".to_string())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub apikey: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub src_apikey: String,
    #[serde(default)]
    pub src_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            apikey: String::new(),
            url: String::new(),
            src_apikey: String::new(),
            src_url: String::new(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    fn merge(&mut self, patch: ServicePatch) {
        if let Some(value) = patch.apikey {
            self.apikey = value;
        }
        if let Some(value) = patch.url {
            self.url = value;
        }
        if let Some(value) = patch.src_apikey {
            self.src_apikey = value;
        }
        if let Some(value) = patch.src_url {
            self.src_url = value;
        }
        if let Some(value) = patch.api_version {
            self.api_version = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub waw_path: Option<PathBuf>,
    #[serde(default)]
    pub test_tool_path: Option<PathBuf>,
    #[serde(default = "default_python")]
    pub python: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            waw_path: None,
            test_tool_path: None,
            python: default_python(),
        }
    }
}

impl ToolsConfig {
    fn merge(&mut self, patch: ToolsPatch) {
        if let Some(value) = patch.waw_path {
            self.waw_path = Some(value);
        }
        if let Some(value) = patch.test_tool_path {
            self.test_tool_path = Some(value);
        }
        if let Some(value) = patch.python {
            self.python = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

impl SandboxConfig {
    fn merge(&mut self, patch: SandboxPatch) {
        if let Some(value) = patch.poll_interval_secs {
            self.poll_interval_secs = value;
        }
        if let Some(value) = patch.ready_timeout_secs {
            self.ready_timeout_secs = value;
        }
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

fn default_python() -> String {
    "python3".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    15
}

const fn default_ready_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub service: Option<ServicePatch>,
    pub tools: Option<ToolsPatch>,
    pub sandbox: Option<SandboxPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServicePatch {
    pub apikey: Option<String>,
    pub url: Option<String>,
    pub src_apikey: Option<String>,
    pub src_url: Option<String>,
    pub api_version: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ToolsPatch {
    pub waw_path: Option<PathBuf>,
    pub test_tool_path: Option<PathBuf>,
    pub python: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SandboxPatch {
    pub poll_interval_secs: Option<u64>,
    pub ready_timeout_secs: Option<u64>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        Some(value) => value.trim().parse::<u64>().map(Some).map_err(|err| {
            WaError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}
