//! Runner for the external assistant testing tool.
//!
//! k-fold and blind tests are driven by `<tool>/run.py` and an INI file
//! written next to the results. Flow tests run `<tool>/dialog_test/flowtest.py`
//! once per `.tsv` conversation script.
//!
//! Results live under `test/<kind>/<skill>/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::error::{Result, WaError};

pub const TOOL_CONFIG_FILE: &str = "wa-testing-tool.ini";
pub const TOOL_API_VERSION: &str = "2019-02-28";
pub const BLIND_INPUT_FILE: &str = "input.csv";
pub const BLIND_REPORT_FILE: &str = "blind-out.csv";
pub const BLIND_PREVIOUS_REPORT_FILE: &str = "blind-out-previous.csv";

const CONF_THRESHOLD: f64 = 0.2;
const MAX_TEST_RATE: u32 = 100;
const TEMPORARY_FOLDERS: [&str; 2] = ["blind", "kfold"];
const TEMPORARY_FILES: [&str; 4] = [
    TOOL_CONFIG_FILE,
    "workspace_base.json",
    "intent-train.csv",
    "entity-train.csv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Kfold,
    Blind,
    Flow,
}

impl TestKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kfold => "kfold",
            Self::Blind => "blind",
            Self::Flow => "flow",
        }
    }
}

/// `test/<kind>/<skill>` below `test_root`.
#[must_use]
pub fn output_dir(test_root: &Path, kind: TestKind, skill_name: &str) -> PathBuf {
    test_root.join(kind.as_str()).join(skill_name)
}

pub struct TestingTool {
    root: PathBuf,
    python: PathBuf,
    apikey: String,
    url: String,
}

impl TestingTool {
    pub fn new(
        root: impl Into<PathBuf>,
        python: impl Into<PathBuf>,
        apikey: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            python: python.into(),
            apikey: apikey.into(),
            url: url.into(),
        }
    }

    /// k-fold test of `workspace`, a skill id or the path of a skill file.
    pub fn kfold(&self, workspace: &str, folds: u32, output_dir: &Path) -> Result<()> {
        let output_dir = prepare_dir(output_dir)?;
        let mode = format!(
            "mode = kfold\nworkspace_id = {workspace}\n\nfold_num = {folds}\n{}",
            common_settings(&output_dir)
        );
        self.run_mode(&output_dir, &mode)
    }

    /// Blind test of the skill `workspace_id` against `input.csv`.
    ///
    /// A previous `blind-out.csv` is kept as `blind-out-previous.csv` so the
    /// tool can chart the difference.
    pub fn blind(&self, workspace_id: &str, output_dir: &Path) -> Result<()> {
        let output_dir = prepare_dir(output_dir)?;
        let input = output_dir.join(BLIND_INPUT_FILE);
        if !input.is_file() {
            return Err(WaError::Precondition(format!(
                "Blind test input file \"{}\" not found",
                input.display()
            )));
        }
        let report = output_dir.join(BLIND_REPORT_FILE);
        let previous_info = if report.is_file() {
            let previous = output_dir.join(BLIND_PREVIOUS_REPORT_FILE);
            fs::copy(&report, &previous)?;
            format!("previous_blind_out = {}", previous.display())
        } else {
            String::new()
        };
        let mode = format!(
            "mode = blind\nworkspace_id = {workspace_id}\n\ntest_input_file = {}\n{previous_info}\n{}",
            input.display(),
            common_settings(&output_dir)
        );
        self.run_mode(&output_dir, &mode)
    }

    /// Run every flow script in `output_dir` against `workspace_id`.
    ///
    /// Returns the exit code of the last failing script, 0 if all passed,
    /// and 1 if there was nothing to run.
    pub fn flow(&self, workspace_id: &str, output_dir: &Path) -> Result<i32> {
        let output_dir = prepare_dir(output_dir)?;
        let script = self.root.join("dialog_test").join("flowtest.py");
        let workdir = tempfile::tempdir()?;

        let mut scripts: Vec<PathBuf> = glob::glob(&output_dir.join("*.tsv").to_string_lossy())
            .map_err(|err| WaError::Config(format!("bad flow folder pattern: {err}")))?
            .flatten()
            .filter(|path| !path.to_string_lossy().ends_with("_report.tsv"))
            .collect();
        scripts.sort();

        let mut final_rc = 0;
        for path in &scripts {
            let test_name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!("Launching {} {} {}", self.python.display(), script.display(), path.display());
            let status = Command::new(&self.python)
                .arg(&script)
                .arg(path)
                .current_dir(workdir.path())
                .env("ASSISTANT_PASSWORD", &self.apikey)
                .env("ASSISTANT_URL", &self.url)
                .env("WORKSPACE_ID", workspace_id)
                .status()
                .map_err(|err| WaError::Config(format!("run {}: {err}", self.python.display())))?;
            for extension in ["json", "tsv"] {
                let report = workdir
                    .path()
                    .join("results")
                    .join(format!("{test_name}_report.{extension}"));
                if report.is_file() {
                    fs::copy(&report, output_dir.join(format!("{test_name}_report.{extension}")))?;
                }
            }
            if !status.success() {
                final_rc = status.code().unwrap_or(1);
                warn!(test = %test_name, code = final_rc, "flow test failed");
            }
        }
        if scripts.is_empty() {
            warn!(folder = %output_dir.display(), "no flow tests have been executed");
            final_rc = 1;
        }
        Ok(final_rc)
    }

    fn credentials(&self) -> String {
        format!(
            "[ASSISTANT CREDENTIALS]\niam_apikey = {}\nurl = {}\nversion={TOOL_API_VERSION}\n",
            self.apikey, self.url
        )
    }

    fn run_mode(&self, output_dir: &Path, mode: &str) -> Result<()> {
        let config_path = output_dir.join(TOOL_CONFIG_FILE);
        let outcome = fs::write(&config_path, format!("{}\n[DEFAULT]\n{mode}", self.credentials()))
            .map_err(WaError::from)
            .and_then(|()| self.run_tool(&config_path));
        cleanup(output_dir);
        outcome
    }

    fn run_tool(&self, config_path: &Path) -> Result<()> {
        let script = self.root.join("run.py");
        info!(
            "Launching {} {} --config_file {}",
            self.python.display(),
            script.display(),
            config_path.display()
        );
        let status = Command::new(&self.python)
            .arg(&script)
            .arg("--config_file")
            .arg(config_path)
            .status()
            .map_err(|err| WaError::Config(format!("run {}: {err}", self.python.display())))?;
        if !status.success() {
            return Err(WaError::Subprocess {
                program: script.display().to_string(),
                code: status.code().unwrap_or(1),
            });
        }
        Ok(())
    }
}

fn common_settings(output_dir: &Path) -> String {
    format!(
        "output_directory = {}\nconf_thres = {CONF_THRESHOLD}\nkeep_workspace_after_test = no\nmax_test_rate = {MAX_TEST_RATE}\n",
        output_dir.display()
    )
}

fn prepare_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(fs::canonicalize(dir)?)
}

/// Remove the tool's scratch files. Failures are only logged.
fn cleanup(output_dir: &Path) {
    for folder in TEMPORARY_FOLDERS {
        let path = output_dir.join(folder);
        if path.is_dir() {
            if let Err(err) = fs::remove_dir_all(&path) {
                warn!(path = %path.display(), error = %err, "cleanup failed");
            }
        }
    }
    for file in TEMPORARY_FILES {
        let path = output_dir.join(file);
        if path.is_file() {
            if let Err(err) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %err, "cleanup failed");
            }
        }
    }
}
