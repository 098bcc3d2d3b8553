//! On-disk layout of a wa-cli project.
//!
//! ```text
//! <root>/
//!   .env                       service credentials, sourced by the shell
//!   .wa-cli/
//!     config.toml              optional settings
//!     main_branch.txt          trunk branch name
//!     readonly_services.txt    write-protected apikeys
//!   skills/                    cached skill exports ({id}-{name}.json)
//!   test/                      testing tool inputs and results
//!   waw/                       decomposed skills
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::readonly::READONLY_REGISTRY_FILE;
use crate::error::{Result, WaError};

pub const STATE_FOLDER: &str = ".wa-cli";
pub const SKILLS_FOLDER: &str = "skills";
pub const TEST_FOLDER: &str = "test";
pub const WAW_FOLDER: &str = "waw";
pub const MAIN_BRANCH_FILE: &str = "main_branch.txt";
pub const ENV_FILE: &str = ".env";
pub const GITIGNORE_FILE: &str = ".gitignore";

/// Shell line exporting the variables kept in `.env`.
pub const ENV_SETUP_LINE: &str = "set -o allexport; source .env; set +o allexport";

/// Variables `init` manages in `.env`, in the order they are appended.
pub const MANAGED_ENV_VARS: [&str; 4] = ["WA_APIKEY", "WA_URL", "WA_APIKEY_SRC", "WA_URL_SRC"];

const GITIGNORE_ENTRIES: &[&str] = &[
    "/.env",
    "/.wa-cli/readonly_services.txt",
    "/waw/re-assembled",
    "/test/*/data/kfold/*",
    "/test/*/data/workspace_base.json",
    "/test/*/data/*-train.csv",
    "wa_json",
    "log.log",
    ".DS_Store",
    "",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the closest ancestor of `start` holding a `.wa-cli/` folder.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(STATE_FOLDER).is_dir() {
                debug!(root = %dir.display(), "found project root");
                return Ok(Self::at(dir));
            }
            current = dir.parent();
        }
        Err(WaError::NotInitialized(start.to_path_buf()))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_FOLDER)
    }

    #[must_use]
    pub fn skills_dir(&self) -> PathBuf {
        self.root.join(SKILLS_FOLDER)
    }

    #[must_use]
    pub fn test_dir(&self) -> PathBuf {
        self.root.join(TEST_FOLDER)
    }

    #[must_use]
    pub fn waw_dir(&self) -> PathBuf {
        self.root.join(WAW_FOLDER)
    }

    #[must_use]
    pub fn readonly_registry_path(&self) -> PathBuf {
        self.state_dir().join(READONLY_REGISTRY_FILE)
    }

    #[must_use]
    pub fn main_branch_path(&self) -> PathBuf {
        self.state_dir().join(MAIN_BRANCH_FILE)
    }

    /// Trunk branch: first non-empty, non-comment line of `main_branch.txt`.
    pub fn main_branch(&self) -> Result<String> {
        let path = self.main_branch_path();
        if !path.is_file() {
            return Err(WaError::Config(format!(
                "The {STATE_FOLDER} folder is missing the {MAIN_BRANCH_FILE} file. \
                 You'll need to run wa-cli init."
            )));
        }
        fs::read_to_string(&path)?
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .ok_or_else(|| {
                WaError::Config(format!(
                    "Wrong contents in {}. You'll need to run wa-cli init.",
                    path.display()
                ))
            })
    }
}

/// Values collected by `wa-cli init`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub main_branch: String,
    pub apikey: String,
    pub url: String,
    pub src_apikey: String,
    pub src_url: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            main_branch: "master".to_string(),
            apikey: String::new(),
            url: String::new(),
            src_apikey: String::new(),
            src_url: String::new(),
        }
    }
}

/// Turn `root` into a wa-cli project. Safe to run again on an existing one.
pub fn initialize(root: &Path, options: &InitOptions) -> Result<Project> {
    if options.main_branch.trim().is_empty() {
        return Err(WaError::Config("main branch must not be empty".to_string()));
    }
    let project = Project::at(root);

    let env_path = root.join(ENV_FILE);
    let vars = [
        (MANAGED_ENV_VARS[0], options.apikey.as_str()),
        (MANAGED_ENV_VARS[1], options.url.as_str()),
        (MANAGED_ENV_VARS[2], options.src_apikey.as_str()),
        (MANAGED_ENV_VARS[3], options.src_url.as_str()),
    ];
    let env = update_env_contents(
        &read_lines(&env_path)?,
        &vars,
        &format!("# {ENV_SETUP_LINE}"),
    );
    write_lines(&env_path, &env)?;

    let gitignore_path = root.join(GITIGNORE_FILE);
    let gitignore = update_gitignore_contents(read_lines(&gitignore_path)?);
    write_lines(&gitignore_path, &gitignore)?;

    for folder in [
        project.state_dir(),
        project.skills_dir(),
        project.test_dir(),
        project.waw_dir(),
    ] {
        fs::create_dir_all(folder)?;
    }

    let registry_path = project.readonly_registry_path();
    let mut registry = read_lines(&registry_path)?;
    if !options.src_apikey.is_empty() && !registry.iter().any(|l| *l == options.src_apikey) {
        registry.push(options.src_apikey.clone());
    }
    write_lines(&registry_path, &registry)?;

    fs::write(project.main_branch_path(), options.main_branch.trim())?;

    info!(root = %root.display(), main_branch = %options.main_branch, "project initialized");
    Ok(project)
}

/// Merge `vars` into the lines of an `.env` file.
///
/// A previous non-empty assignment of a managed variable is kept as a
/// comment right above the new value. Unmanaged lines stay where they are.
/// Managed variables that were absent are appended in order.
#[must_use]
pub fn update_env_contents(existing: &[String], vars: &[(&str, &str)], header: &str) -> Vec<String> {
    let mut pending: Vec<(&str, &str)> = vars.to_vec();
    let mut lines = Vec::with_capacity(existing.len() + vars.len() + 1);

    if !header.is_empty() && !existing.iter().any(|line| line == header) {
        lines.push(header.to_string());
    }
    for line in existing {
        let position = pending
            .iter()
            .position(|(name, _)| line.starts_with(&format!("{name}=")));
        let Some(position) = position else {
            lines.push(line.clone());
            continue;
        };
        let (name, value) = pending.remove(position);
        if *line != format!("{name}=") {
            lines.push(format!("# {line}"));
        }
        lines.push(format!("{name}={value}"));
    }
    for (name, value) in pending {
        lines.push(format!("{name}={value}"));
    }
    lines
}

/// Append the ignore entries wa-cli needs that are not already listed.
#[must_use]
pub fn update_gitignore_contents(mut existing: Vec<String>) -> Vec<String> {
    for entry in GITIGNORE_ENTRIES {
        if !existing.iter().any(|line| line.trim() == *entry) {
            existing.push((*entry).to_string());
        }
    }
    existing
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    Ok(fs::read_to_string(path)?
        .lines()
        .map(|line| line.trim().to_string())
        .collect())
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    fs::write(path, lines.join("\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "# set -o allexport; source .env; set +o allexport";

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn vars<'a>(apikey: &'a str, url: &'a str, src: &'a str, src_url: &'a str) -> [(&'a str, &'a str); 4] {
        [
            ("WA_APIKEY", apikey),
            ("WA_URL", url),
            ("WA_APIKEY_SRC", src),
            ("WA_URL_SRC", src_url),
        ]
    }

    #[test]
    fn env_from_scratch() {
        let updated = update_env_contents(&[], &vars("1", "2", "3", "4"), HEADER);
        assert_eq!(
            updated,
            lines(&[HEADER, "WA_APIKEY=1", "WA_URL=2", "WA_APIKEY_SRC=3", "WA_URL_SRC=4"])
        );
    }

    #[test]
    fn env_from_scratch_with_blank_value() {
        let updated = update_env_contents(&[], &vars("1", "2", "", "4"), HEADER);
        assert_eq!(
            updated,
            lines(&[HEADER, "WA_APIKEY=1", "WA_URL=2", "WA_APIKEY_SRC=", "WA_URL_SRC=4"])
        );
    }

    #[test]
    fn env_existing_file_keeps_history_and_unmanaged_lines() {
        let existing = lines(&[
            "WA_APIKEY=old_1",
            "WA_URL=",
            "",
            "# random comment",
            "RANDOM_VAR=33",
            "WA_APIKEY_SRC=old_3",
            "WA_URL_SRC=old_4",
        ]);
        let updated = update_env_contents(&existing, &vars("1", "2", "", "4"), HEADER);
        assert_eq!(
            updated,
            lines(&[
                HEADER,
                "# WA_APIKEY=old_1",
                "WA_APIKEY=1",
                "WA_URL=2",
                "",
                "# random comment",
                "RANDOM_VAR=33",
                "# WA_APIKEY_SRC=old_3",
                "WA_APIKEY_SRC=",
                "# WA_URL_SRC=old_4",
                "WA_URL_SRC=4",
            ])
        );
    }

    #[test]
    fn env_header_is_not_repeated() {
        let existing = lines(&[HEADER, "WA_APIKEY=1"]);
        let updated = update_env_contents(&existing, &[("WA_APIKEY", "1")], HEADER);
        assert_eq!(updated, lines(&[HEADER, "# WA_APIKEY=1", "WA_APIKEY=1"]));
    }

    #[test]
    fn gitignore_appends_missing_entries() {
        let updated = update_gitignore_contents(lines(&["# random comment", "# /.env"]));
        assert_eq!(
            updated[..4],
            lines(&["# random comment", "# /.env", "/.env", "/.wa-cli/readonly_services.txt"])[..]
        );
    }

    #[test]
    fn gitignore_keeps_existing_entries_once() {
        let updated = update_gitignore_contents(lines(&[
            "# random comment",
            "/.env",
            "/.wa-cli/readonly_services.txt",
        ]));
        assert_eq!(updated.iter().filter(|l| *l == "/.env").count(), 1);
        assert_eq!(updated[2], "/.wa-cli/readonly_services.txt");
        assert_eq!(updated[3], "/waw/re-assembled");
    }

    #[test]
    fn gitignore_from_scratch() {
        let updated = update_gitignore_contents(Vec::new());
        assert_eq!(updated[..2], lines(&["/.env", "/.wa-cli/readonly_services.txt"])[..]);
        assert_eq!(updated.last().map(String::as_str), Some(""));
    }

    #[test]
    fn discover_walks_up() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(STATE_FOLDER)).unwrap();
        let nested = dir.path().join("waw/billing/intents");
        fs::create_dir_all(&nested).unwrap();
        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.root(), dir.path());
    }

    #[test]
    fn discover_outside_project_fails() {
        let dir = tempdir().unwrap();
        let err = Project::discover(dir.path()).unwrap_err();
        assert!(matches!(err, WaError::NotInitialized(_)));
    }

    #[test]
    fn main_branch_skips_comments() {
        let dir = tempdir().unwrap();
        let project = Project::at(dir.path());
        fs::create_dir_all(project.state_dir()).unwrap();
        fs::write(project.main_branch_path(), "# trunk\n\n  develop  \n").unwrap();
        assert_eq!(project.main_branch().unwrap(), "develop");
    }

    #[test]
    fn main_branch_missing_or_empty_is_config_error() {
        let dir = tempdir().unwrap();
        let project = Project::at(dir.path());
        fs::create_dir_all(project.state_dir()).unwrap();
        assert!(matches!(project.main_branch(), Err(WaError::Config(_))));
        fs::write(project.main_branch_path(), "# nothing\n").unwrap();
        assert!(matches!(project.main_branch(), Err(WaError::Config(_))));
    }

    #[test]
    fn initialize_scaffolds_project() {
        let dir = tempdir().unwrap();
        let options = InitOptions {
            main_branch: "main".into(),
            apikey: "rw-key".into(),
            url: "https://target".into(),
            src_apikey: "ro-key".into(),
            src_url: "https://source".into(),
        };
        let project = initialize(dir.path(), &options).unwrap();
        for folder in [STATE_FOLDER, SKILLS_FOLDER, TEST_FOLDER, WAW_FOLDER] {
            assert!(dir.path().join(folder).is_dir(), "{folder}");
        }
        assert_eq!(project.main_branch().unwrap(), "main");
        let env = fs::read_to_string(dir.path().join(ENV_FILE)).unwrap();
        assert!(env.contains("WA_APIKEY=rw-key"));
        assert!(env.contains("WA_URL_SRC=https://source"));

        initialize(dir.path(), &options).unwrap();
        let registry = fs::read_to_string(project.readonly_registry_path()).unwrap();
        assert_eq!(registry.lines().filter(|l| *l == "ro-key").count(), 1);
        let gitignore = fs::read_to_string(dir.path().join(GITIGNORE_FILE)).unwrap();
        assert_eq!(gitignore.lines().filter(|l| *l == "/.env").count(), 1);
    }
}
