//! Decompose skills into diff-friendly files and reassemble them.
//!
//! The heavy lifting is done by the workbench toolkit's Python scripts
//! (`<waw_path>/scripts`). A decomposed skill lives in `waw/<name>/`:
//!
//! ```text
//! waw/<name>/meta.json           name, description, language, settings
//! waw/<name>/wa_json/*.json      intermediate JSON split by the toolkit
//! waw/<name>/intents/*.csv
//! waw/<name>/counterexamples/*.csv
//! waw/<name>/entities/*.csv
//! waw/<name>/dialog/dialog.xml
//! ```
//!
//! Reassembly writes `waw/re-assembled/<new_name>/skill.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::core::cache::{CachedArtifact, write_pretty};
use crate::core::skill::{SkillDocument, with_lineage};
use crate::error::{Result, WaError};

pub const META_FILE: &str = "meta.json";
pub const REASSEMBLED_FOLDER: &str = "re-assembled";
const DECOMPOSED_SUBFOLDERS: [&str; 5] = ["wa_json", "counterexamples", "intents", "entities", "dialog"];

pub trait Decomposer {
    /// Split `artifact` into `waw/<target_name>/`, replacing what was there.
    fn decompose(&self, artifact: &CachedArtifact, target_name: &str) -> Result<PathBuf>;

    /// Rebuild a skill document from `waw/<source_name>/`, named `target_name`.
    fn reassemble(&self, source_name: &str, target_name: &str) -> Result<SkillDocument>;

    /// Whether `waw/<name>/` exists.
    fn is_decomposed(&self, name: &str) -> bool;

    fn load_meta(&self, name: &str) -> Result<SkillMeta>;

    fn save_meta(&self, name: &str, meta: &SkillMeta) -> Result<()>;
}

/// Skill-level fields that the toolkit does not carry through its CSV/XML
/// files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillMeta {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub learning_opt_out: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub system_settings: Value,
}

impl SkillMeta {
    #[must_use]
    pub fn from_document(document: &SkillDocument) -> Self {
        Self {
            description: document.description.clone(),
            language: document.language.clone().unwrap_or_default(),
            learning_opt_out: document.learning_opt_out.unwrap_or(false),
            name: document.name.clone(),
            system_settings: document.system_settings.clone().unwrap_or(Value::Null),
        }
    }
}

/// Reassembled skill, with its keys in the order the toolkit output is
/// committed in.
#[derive(Debug, Serialize)]
struct ReassembledSkill {
    #[serde(skip_serializing_if = "Option::is_none")]
    intents: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entities: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dialog_nodes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counterexamples: Option<Value>,
    system_settings: Value,
    learning_opt_out: bool,
    name: String,
    language: String,
    description: String,
}

/// Merge the composed skill JSON with `meta` into the final document layout.
fn finalize_reassembled(mut composed: serde_json::Map<String, Value>, meta: &SkillMeta) -> ReassembledSkill {
    let text = |composed: &mut serde_json::Map<String, Value>, key: &str, fallback: &str| {
        composed
            .remove(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| fallback.to_string())
    };
    ReassembledSkill {
        intents: composed.remove("intents"),
        entities: composed.remove("entities"),
        metadata: composed.remove("metadata"),
        dialog_nodes: composed.remove("dialog_nodes"),
        counterexamples: composed.remove("counterexamples"),
        system_settings: meta.system_settings.clone(),
        learning_opt_out: meta.learning_opt_out,
        name: text(&mut composed, "name", &meta.name),
        language: text(&mut composed, "language", &meta.language),
        description: text(&mut composed, "description", &meta.description),
    }
}

/// [`Decomposer`] backed by the workbench toolkit scripts.
pub struct WorkbenchDecomposer {
    root: PathBuf,
    toolkit: PathBuf,
    python: PathBuf,
}

impl WorkbenchDecomposer {
    /// `root` is the project's `waw/` folder, `toolkit` the toolkit checkout.
    pub fn new(root: impl Into<PathBuf>, toolkit: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            toolkit: toolkit.into(),
            python: python.into(),
        }
    }

    fn scripts(&self) -> PathBuf {
        self.toolkit.join("scripts")
    }

    fn skill_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn wa_json(&self, name: &str, file: &str) -> String {
        path_arg(&self.skill_dir(name).join("wa_json").join(file))
    }

    fn run_script(&self, script: &str, args: &[String]) -> Result<()> {
        let script_path = self.scripts().join(script);
        let mut cmd = Command::new(&self.python);
        cmd.arg(&script_path).args(args);
        info!("===> {} {} {}", self.python.display(), script_path.display(), args.join(" "));
        let status = cmd.status().map_err(|err| {
            WaError::Config(format!("run {}: {err}", self.python.display()))
        })?;
        if !status.success() {
            return Err(WaError::Subprocess {
                program: script.to_string(),
                code: status.code().unwrap_or(1),
            });
        }
        Ok(())
    }

    fn make_decompose_folders(&self, name: &str) -> Result<()> {
        let dir = self.skill_dir(name);
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
        }
        for sub in DECOMPOSED_SUBFOLDERS {
            fs::create_dir_all(dir.join(sub))?;
        }
        Ok(())
    }

    /// Where [`Decomposer::reassemble`] writes the skill named `name`.
    #[must_use]
    pub fn reassembled_file(&self, name: &str) -> PathBuf {
        self.root.join(REASSEMBLED_FOLDER).join(name).join("skill.json")
    }

    fn reassembled_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.root.join(REASSEMBLED_FOLDER).join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn split_json(&self, source: &Path, name: &str) -> Result<()> {
        self.run_script(
            "workspace_decompose.py",
            &[
                path_arg(source),
                "-i".into(),
                self.wa_json(name, "intents.json"),
                "-c".into(),
                self.wa_json(name, "counterexamples.json"),
                "-e".into(),
                self.wa_json(name, "entities.json"),
                "-d".into(),
                self.wa_json(name, "dialog.json"),
            ],
        )
    }

    fn json_to_files(&self, name: &str) -> Result<()> {
        for (script, kinds) in [
            ("intents_json2csv.py", &["intents", "counterexamples"][..]),
            ("entities_json2csv.py", &["entities"][..]),
        ] {
            for kind in kinds {
                self.run_script(
                    script,
                    &[
                        self.wa_json(name, &format!("{kind}.json")),
                        path_arg(&self.skill_dir(name).join(kind)),
                    ],
                )?;
            }
        }
        self.run_script(
            "dialog_json2xml.py",
            &[
                self.wa_json(name, "dialog.json"),
                "--dialogDir".into(),
                path_arg(&self.skill_dir(name).join("dialog")),
            ],
        )
    }

    fn files_to_json(&self, name: &str, target: &Path) -> Result<()> {
        let out = path_arg(target);
        let schema = self.toolkit.join("data_spec").join("dialog_schema.xml");
        self.run_script(
            "dialog_xml2json.py",
            &[
                "--common_dialog_main".into(),
                path_arg(&self.skill_dir(name).join("dialog").join("dialog.xml")),
                "--common_outputs_directory".into(),
                out.clone(),
                "--common_outputs_dialogs".into(),
                "dialog.json".into(),
                "--common_schema".into(),
                path_arg(&schema),
            ],
        )?;
        self.run_script(
            "entities_csv2json.py",
            &[
                "--common_entities".into(),
                path_arg(&self.skill_dir(name).join("entities")),
                "--common_outputs_directory".into(),
                out.clone(),
                "--common_outputs_entities".into(),
                "entities.json".into(),
                "--common_soft".into(),
            ],
        )?;
        for kind in ["intents", "counterexamples"] {
            self.run_script(
                "intents_csv2json.py",
                &[
                    "--common_intents".into(),
                    path_arg(&self.skill_dir(name).join(kind)),
                    "--common_outputs_directory".into(),
                    out.clone(),
                    "--common_outputs_intents".into(),
                    format!("{kind}.json"),
                ],
            )?;
        }
        Ok(())
    }

    fn compose(&self, target: &Path, target_name: &str, meta: &SkillMeta) -> Result<PathBuf> {
        self.run_script(
            "workspace_compose.py",
            &[
                "--common_outputs_directory".into(),
                path_arg(target),
                "--common_outputs_workspace".into(),
                "skill.json".into(),
                "--common_outputs_intents".into(),
                "intents.json".into(),
                "--common_outputs_counterexamples".into(),
                "counterexamples.json".into(),
                "--common_outputs_entities".into(),
                "entities.json".into(),
                "--common_outputs_dialogs".into(),
                "dialog.json".into(),
                "--conversation_workspace_name".into(),
                target_name.to_string(),
                "--conversation_language".into(),
                meta.language.clone(),
                "--conversation_description".into(),
                meta.description.clone(),
            ],
        )?;
        Ok(target.join("skill.json"))
    }

    /// Decompose every cached export found in `skills_folder`, into a folder
    /// named after the skill. `confirm` may veto individual files.
    pub fn decompose_all(
        &self,
        skills_folder: &Path,
        mut confirm: impl FnMut(&Path, &str) -> bool,
    ) -> Result<Vec<PathBuf>> {
        let pattern = skills_folder.join("*.json");
        let pattern = pattern.to_string_lossy();
        let mut decomposed = Vec::new();
        let paths = glob::glob(&pattern)
            .map_err(|err| WaError::Config(format!("bad skills folder pattern: {err}")))?;
        for path in paths.flatten() {
            let artifact = CachedArtifact::from_file(&path)?;
            if !confirm(&path, &artifact.document.name) {
                continue;
            }
            let name = artifact.document.name.clone();
            decomposed.push(self.decompose(&artifact, &name)?);
        }
        Ok(decomposed)
    }
}

impl Decomposer for WorkbenchDecomposer {
    fn decompose(&self, artifact: &CachedArtifact, target_name: &str) -> Result<PathBuf> {
        let name = if target_name.is_empty() {
            artifact.document.name.as_str()
        } else {
            target_name
        };
        let source = fs::canonicalize(&artifact.path)?;
        self.make_decompose_folders(name)?;
        self.split_json(&source, name)?;
        self.save_meta(name, &SkillMeta::from_document(&artifact.document))?;
        self.json_to_files(name)?;
        Ok(self.skill_dir(name))
    }

    fn reassemble(&self, source_name: &str, target_name: &str) -> Result<SkillDocument> {
        let target_name = if target_name.is_empty() {
            source_name
        } else {
            target_name
        };
        let target = self.reassembled_dir(target_name)?;
        let skill_file = target.join("skill.json");
        if skill_file.is_file() {
            fs::remove_file(&skill_file)?;
        }

        let mut meta = self.load_meta(source_name)?;
        if source_name != target_name {
            meta.description = with_lineage(&meta.description, source_name);
        }

        self.files_to_json(source_name, &target)?;
        let skill_file = self.compose(&target, target_name, &meta)?;

        let composed: serde_json::Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(&skill_file)?)?;
        let finalized = finalize_reassembled(composed, &meta);
        let file = fs::File::create(&skill_file)?;
        write_pretty(file, &finalized, b"  ")?;

        let document: SkillDocument = serde_json::from_value(serde_json::to_value(&finalized)?)?;
        Ok(document)
    }

    fn is_decomposed(&self, name: &str) -> bool {
        self.skill_dir(name).is_dir()
    }

    fn load_meta(&self, name: &str) -> Result<SkillMeta> {
        let path = self.skill_dir(name).join(META_FILE);
        if !path.is_file() {
            return Err(WaError::Precondition(format!(
                "No {META_FILE} in {}",
                self.skill_dir(name).display()
            )));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn save_meta(&self, name: &str, meta: &SkillMeta) -> Result<()> {
        let path = self.skill_dir(name).join(META_FILE);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        write_pretty(file, meta, b"    ")
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
